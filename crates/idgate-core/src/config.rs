//! Core Configuration
//!
//! Windows, capacities and clock tolerances used by the identity cache,
//! the throttled emitter and the key ring.

use core::time::Duration;

use crate::throttle::DEFAULT_THROTTLE_WINDOW;

/// Communication keys kept per owner by default
pub const DEFAULT_COMMUNICATION_KEY_CAPACITY: usize = 3;

/// How far ahead of local time a document may be stamped (30 minutes)
pub const DEFAULT_FUTURE_TIME_TOLERANCE: Duration = Duration::from_secs(1800);

// ----------------------------------------------------------------------------
// Core Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CoreConfig {
    /// Minimum interval between queries for the same identifier
    pub query_expires: Duration,
    /// Minimum interval between visa responses to the same receiver
    pub respond_expires: Duration,
    /// Communication keys retained per owner
    pub communication_key_capacity: usize,
    /// Documents stamped further ahead than this are rejected
    pub future_time_tolerance: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            query_expires: DEFAULT_THROTTLE_WINDOW,
            respond_expires: DEFAULT_THROTTLE_WINDOW,
            communication_key_capacity: DEFAULT_COMMUNICATION_KEY_CAPACITY,
            future_time_tolerance: DEFAULT_FUTURE_TIME_TOLERANCE,
        }
    }
}

impl CoreConfig {
    /// Short windows for tests driven by a mock clock
    pub fn testing() -> Self {
        Self {
            query_expires: Duration::from_secs(1),
            respond_expires: Duration::from_secs(1),
            communication_key_capacity: DEFAULT_COMMUNICATION_KEY_CAPACITY,
            future_time_tolerance: Duration::from_secs(60),
        }
    }

    /// Fewer queries, fewer retained keys, tight clock tolerance
    pub fn strict() -> Self {
        Self {
            query_expires: Duration::from_secs(1800),
            respond_expires: Duration::from_secs(1800),
            communication_key_capacity: 2,
            future_time_tolerance: Duration::from_secs(300),
        }
    }

    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::new()
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.query_expires.is_zero() {
            return Err("Query expiry cannot be zero".into());
        }
        if self.respond_expires.is_zero() {
            return Err("Respond expiry cannot be zero".into());
        }
        if self.communication_key_capacity == 0 {
            return Err("Communication key capacity cannot be zero".into());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Configuration Builder
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CoreConfigBuilder {
    query_expires: Option<Duration>,
    respond_expires: Option<Duration>,
    communication_key_capacity: Option<usize>,
    future_time_tolerance: Option<Duration>,
}

/// Error type for configuration building
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBuilderError {
    pub message: String,
}

impl core::fmt::Display for ConfigBuilderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Configuration builder error: {}", self.message)
    }
}

impl std::error::Error for ConfigBuilderError {}

impl CoreConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query_expires(mut self, window: Duration) -> Self {
        self.query_expires = Some(window);
        self
    }

    pub fn respond_expires(mut self, window: Duration) -> Self {
        self.respond_expires = Some(window);
        self
    }

    pub fn communication_key_capacity(mut self, capacity: usize) -> Self {
        self.communication_key_capacity = Some(capacity);
        self
    }

    pub fn future_time_tolerance(mut self, tolerance: Duration) -> Self {
        self.future_time_tolerance = Some(tolerance);
        self
    }

    /// Build the configuration with validation
    pub fn build(self) -> Result<CoreConfig, ConfigBuilderError> {
        let config = self.build_unchecked();
        config
            .validate()
            .map_err(|message| ConfigBuilderError { message })?;
        Ok(config)
    }

    /// Build the configuration without validation
    pub fn build_unchecked(self) -> CoreConfig {
        let defaults = CoreConfig::default();
        CoreConfig {
            query_expires: self.query_expires.unwrap_or(defaults.query_expires),
            respond_expires: self.respond_expires.unwrap_or(defaults.respond_expires),
            communication_key_capacity: self
                .communication_key_capacity
                .unwrap_or(defaults.communication_key_capacity),
            future_time_tolerance: self
                .future_time_tolerance
                .unwrap_or(defaults.future_time_tolerance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(CoreConfig::default().validate().is_ok());
        assert!(CoreConfig::testing().validate().is_ok());
        assert!(CoreConfig::strict().validate().is_ok());
    }

    #[test]
    fn test_default_windows() {
        let config = CoreConfig::default();
        assert_eq!(config.query_expires, Duration::from_secs(600));
        assert_eq!(config.respond_expires, Duration::from_secs(600));
        assert_eq!(config.communication_key_capacity, 3);
    }

    #[test]
    fn test_builder_rejects_zero_capacity() {
        let err = CoreConfig::builder()
            .communication_key_capacity(0)
            .build()
            .unwrap_err();
        assert!(err.message.contains("capacity"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = CoreConfig::builder()
            .query_expires(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(config.query_expires, Duration::from_secs(5));
        assert_eq!(config.respond_expires, DEFAULT_THROTTLE_WINDOW);
    }
}
