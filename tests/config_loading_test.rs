use std::io::Write;
use std::sync::Arc;

use rust_decimal_macros::dec;
use tempfile::NamedTempFile;

use volume_profile_engine::logging::LogRotation;
use volume_profile_engine::volume_profile::{
    AlertColor, PeriodType, SessionFlags, TracingAlertSink, ValueProjection, VolumeProfileError,
};
use volume_profile_engine::EngineConfig;

mod fixtures;
use fixtures::{fixture_path, load_candles_csv};

const CONFIG: &str = r#"
[logging]
level = "info,volume_profile_engine=debug"
log_dir = "logs"
file_logging = false
json = true
rotation = "hourly"

[volume_profile]
instrument = "ES"
tick_size = "0.25"
period = { type = "session" }
projection = "volume"
max_periods = 6

[volume_profile.value_area]
percent = "70"
expansion_step = 1
cache_ttl_ms = 500
use_cache = true

[alerts]
enabled = true
channel = "alert1"
period_index = 1
poc = true
vah = true
val = false
background = [0, 0, 0]
foreground = [255, 255, 255]
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_config_from_file() {
    let file = write_config(CONFIG);
    let config = EngineConfig::from_toml(file.path()).unwrap();

    assert_eq!(config.logging.rotation, LogRotation::Hourly);
    assert_eq!(config.volume_profile.tick_size, dec!(0.25));
    assert_eq!(config.volume_profile.period, PeriodType::Session);
    assert_eq!(config.volume_profile.projection, ValueProjection::Volume);
    assert_eq!(config.volume_profile.max_periods, Some(6));
    assert_eq!(config.alerts.period_index, 1);
    assert!(!config.alerts.val);
    assert_eq!(config.alerts.foreground, AlertColor::WHITE);
}

#[test]
fn test_engine_built_from_config_replays_fixture() {
    let file = write_config(CONFIG);
    let config = EngineConfig::from_toml(file.path()).unwrap();
    let mut engine = config.build_engine(Arc::new(TracingAlertSink)).unwrap();

    for (bar, candle) in load_candles_csv(fixture_path("two_sessions.csv")) {
        let flags = SessionFlags { new_session: bar == 3, ..SessionFlags::default() };
        engine.replay_bar(bar, &candle, &flags).unwrap();
    }

    assert_eq!(engine.period_count(), 2);
    assert_eq!(engine.poc(1), Some(dec!(100.50)));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = EngineConfig::from_toml(dir.path().join("absent.toml"));

    assert!(matches!(result, Err(VolumeProfileError::Io(_))));
}

#[test]
fn test_invalid_file_contents_rejected() {
    let zero_tick = write_config("[volume_profile]\ntick_size = \"0\"\n");
    assert!(matches!(
        EngineConfig::from_toml(zero_tick.path()),
        Err(VolumeProfileError::InvalidTickSize(_))
    ));

    let zero_window = write_config("[volume_profile]\nperiod = { type = \"custom_minutes\", minutes = 0 }\n");
    assert!(matches!(
        EngineConfig::from_toml(zero_window.path()),
        Err(VolumeProfileError::InvalidConfig(_))
    ));

    let unknown_projection = write_config("[volume_profile]\nprojection = \"vwap\"\n");
    assert!(matches!(
        EngineConfig::from_toml(unknown_projection.path()),
        Err(VolumeProfileError::ConfigParse(_))
    ));
}
