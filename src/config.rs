use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::logging::LoggingConfig;
use crate::volume_profile::{
    AlertConfig, AlertSink, LevelAlerts, VolumeProfileConfig, VolumeProfileEngine, VolumeProfileError,
};

/// Engine configuration as read from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub volume_profile: VolumeProfileConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

impl EngineConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, VolumeProfileError> {
        let config_content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&config_content)?;
        info!(path = %path.as_ref().display(), instrument = %config.volume_profile.instrument, "Configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, VolumeProfileError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VolumeProfileError> {
        self.volume_profile.validate()?;
        if self.alerts.enabled && self.alerts.channel.trim().is_empty() {
            return Err(VolumeProfileError::InvalidConfig(
                "alerts.channel must not be empty when alerts are enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Engine for this configuration; alerts are attached when enabled
    pub fn build_engine(&self, sink: Arc<dyn AlertSink>) -> Result<VolumeProfileEngine, VolumeProfileError> {
        let engine = VolumeProfileEngine::new(self.volume_profile.clone())?;
        if !self.alerts.enabled {
            return Ok(engine);
        }

        let alerts = LevelAlerts::new(self.alerts.clone(), self.volume_profile.instrument.clone(), sink);
        Ok(engine.with_alerts(alerts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume_profile::{PeriodType, TracingAlertSink, ValueProjection};
    use rust_decimal_macros::dec;

    const FULL_CONFIG: &str = r#"
        [logging]
        level = "info,volume_profile_engine=debug"

        [volume_profile]
        instrument = "ES"
        tick_size = "0.25"
        period = { type = "fixed_hours", hours = 4 }
        projection = "delta"
        max_periods = 6

        [volume_profile.value_area]
        percent = "68.5"
        expansion_step = 2
        cache_ttl_ms = 250
        use_cache = false

        [alerts]
        enabled = true
        channel = "alert2"
    "#;

    #[test]
    fn test_full_config() {
        let config = EngineConfig::from_toml_str(FULL_CONFIG).unwrap();

        assert_eq!(config.logging.level, "info,volume_profile_engine=debug");
        assert_eq!(config.volume_profile.instrument, "ES");
        assert_eq!(config.volume_profile.tick_size, dec!(0.25));
        assert_eq!(config.volume_profile.period, PeriodType::FixedHours { hours: 4 });
        assert_eq!(config.volume_profile.projection, ValueProjection::Delta);
        assert_eq!(config.volume_profile.max_periods, Some(6));
        assert_eq!(config.volume_profile.value_area.percent, dec!(68.5));
        assert_eq!(config.volume_profile.value_area.expansion_step, 2);
        assert!(!config.volume_profile.value_area.use_cache);
        assert!(config.alerts.enabled);
        assert_eq!(config.alerts.channel, "alert2");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.volume_profile.period, PeriodType::Session);
        assert_eq!(config.volume_profile.value_area.percent, dec!(70));
        assert!(!config.alerts.enabled);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_percent = "[volume_profile.value_area]\npercent = \"120\"\nexpansion_step = 1\ncache_ttl_ms = 0\nuse_cache = true\n";
        assert!(matches!(
            EngineConfig::from_toml_str(bad_percent),
            Err(VolumeProfileError::InvalidPercentage(_))
        ));

        let bad_toml = "[volume_profile\n";
        assert!(matches!(
            EngineConfig::from_toml_str(bad_toml),
            Err(VolumeProfileError::ConfigParse(_))
        ));

        let empty_channel = "[alerts]\nenabled = true\nchannel = \" \"\n";
        assert!(matches!(
            EngineConfig::from_toml_str(empty_channel),
            Err(VolumeProfileError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_build_engine_attaches_alerts() {
        let config = EngineConfig::from_toml_str(FULL_CONFIG).unwrap();
        let engine = config.build_engine(Arc::new(TracingAlertSink)).unwrap();

        assert_eq!(engine.config().instrument, "ES");
        assert_eq!(engine.statistics().alerts_sent, 0);
    }
}
