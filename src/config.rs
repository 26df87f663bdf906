// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Configuration from the environment.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `TANA_INBOX_NODE_ID` | Node that receives the conversations (required) |
//! | `TANA_TIMEZONE` | IANA time zone for conversation titles (default: local) |
//! | `TANA_PAYLOAD_BUDGET` | Maximum bytes per event node (default: 4800) |
//!
//! Command-line flags take precedence over these values.

use crate::converter::{ConvertOptions, Zone};
use crate::payload::MAX_PAYLOAD_BYTES;
use snafu::prelude::*;

/// Environment variable holding the destination node id.
pub const DESTINATION_VAR: &str = "TANA_INBOX_NODE_ID";

/// Environment variable holding the time zone name.
pub const TIMEZONE_VAR: &str = "TANA_TIMEZONE";

/// Environment variable holding the payload budget.
pub const BUDGET_VAR: &str = "TANA_PAYLOAD_BUDGET";

/// Error type for configuration problems.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[snafu(display("missing required setting: set {name} or pass the matching option"))]
    MissingVar {
        /// Name of the missing variable.
        name: &'static str,
    },

    /// The time zone is not a known IANA name.
    #[snafu(display("unknown time zone: {value}"))]
    InvalidTimezone {
        /// The rejected value.
        value: String,
    },

    /// The budget is not a positive integer.
    #[snafu(display("payload budget must be a positive number of bytes, got {value}"))]
    InvalidBudget {
        /// The rejected value.
        value: String,
    },
}

/// Settings gathered from the environment, before command-line overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Destination node id, if set.
    pub destination: Option<String>,

    /// Time zone for conversation titles, if set.
    pub timezone: Option<String>,

    /// Payload budget, if set.
    pub budget: Option<String>,
}

impl Config {
    /// Reads the configuration from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, treating empty values as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            destination: get(DESTINATION_VAR),
            timezone: get(TIMEZONE_VAR),
            budget: get(BUDGET_VAR),
        }
    }

    /// Resolves the settings into conversion options.
    ///
    /// # Errors
    ///
    /// Returns an error if no destination is set, or if the time zone or
    /// budget cannot be parsed.
    pub fn into_options(self) -> Result<ConvertOptions, ConfigError> {
        let destination = self.destination.context(MissingVarSnafu {
            name: DESTINATION_VAR,
        })?;
        let zone = self.timezone.as_deref().map_or(Ok(Zone::Local), parse_zone)?;
        let budget = self
            .budget
            .as_deref()
            .map_or(Ok(MAX_PAYLOAD_BYTES), parse_budget)?;

        Ok(ConvertOptions {
            destination,
            budget,
            zone,
        })
    }
}

/// Parses an IANA time zone name. `local` selects the system zone.
///
/// # Errors
///
/// Returns an error if the name is not a known time zone.
pub fn parse_zone(value: &str) -> Result<Zone, ConfigError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("local") {
        return Ok(Zone::Local);
    }
    value
        .parse::<chrono_tz::Tz>()
        .ok()
        .map(Zone::Named)
        .context(InvalidTimezoneSnafu { value })
}

/// Parses a payload budget in bytes.
///
/// # Errors
///
/// Returns an error unless the value is a positive integer.
pub fn parse_budget(value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|&budget| budget > 0)
        .context(InvalidBudgetSnafu { value })
}
