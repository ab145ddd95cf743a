//! Configuration management for the circulation core

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Hard bounds on the caller-supplied reservation TTL, in days.
pub const RESERVATION_TTL_MIN_DAYS: i64 = 1;
pub const RESERVATION_TTL_MAX_DAYS: i64 = 14;

#[derive(Debug, Deserialize, Clone)]
pub struct LoanConfig {
    /// Loan duration in days; `due_at = borrowed_at + period_days`.
    pub period_days: i64,
    /// How far a single extension pushes `due_at`.
    pub extension_period_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationConfig {
    /// Default TTL for a freshly queued reservation, in days.
    pub ttl_days: i64,
    /// Pickup window granted when a freed copy is earmarked for the
    /// reservation at the head of the queue.
    pub pickup_window_days: i64,
    /// Maximum simultaneous ACTIVE reservations per patron.
    pub max_active_per_patron: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CirculationConfig {
    #[serde(default)]
    pub loan: LoanConfig,
    #[serde(default)]
    pub reservation: ReservationConfig,
}

impl CirculationConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add environment variables (with prefix CIRCULATION_)
            .add_source(
                Environment::with_prefix("CIRCULATION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for CirculationConfig {
    fn default() -> Self {
        Self {
            loan: LoanConfig::default(),
            reservation: ReservationConfig::default(),
        }
    }
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            period_days: 14,
            extension_period_days: 14,
        }
    }
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            ttl_days: 3,
            pickup_window_days: 2,
            max_active_per_patron: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CirculationConfig::default();
        assert_eq!(config.loan.period_days, 14);
        assert_eq!(config.loan.extension_period_days, 14);
        assert_eq!(config.reservation.ttl_days, 3);
        assert_eq!(config.reservation.pickup_window_days, 2);
        assert_eq!(config.reservation.max_active_per_patron, 5);
    }
}
