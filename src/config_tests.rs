// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::config::ControllerConfig;
    use crate::constants::{DEFAULT_OUTPUT_DIR, DEFAULT_PROBE_CONCURRENCY};
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.probe_concurrency, DEFAULT_PROBE_CONCURRENCY);
        assert!(!config.geoip.enabled);
        assert_eq!(config.output_dir.to_str().unwrap(), DEFAULT_OUTPUT_DIR);
        assert!(config.reload_command.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_record_ttl_follows_interval() {
        let mut config = ControllerConfig::default();
        assert_eq!(config.record_ttl(), 10);

        // The test deployments run with a 5 second interval.
        config.interval = Duration::from_secs(5);
        assert_eq!(config.record_ttl(), 5);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = ControllerConfig {
            interval: Duration::ZERO,
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ControllerConfig {
            timeout: Duration::ZERO,
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_timeout_not_below_interval() {
        let config = ControllerConfig {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(2),
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = ControllerConfig {
            probe_concurrency: 0,
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
