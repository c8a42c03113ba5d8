pub mod config;
pub mod logging;
pub mod market_data;
pub mod volume_profile;

pub use config::EngineConfig;
pub use market_data::{Candle, PriceVolumeSample, TimestampMS, Trade, TradeDirection};
pub use volume_profile::{
    SessionCalendar, SharedVolumeProfile, ValueArea, ValueAreaSettings, VolumeProfileActor,
    VolumeProfileConfig, VolumeProfileEngine, VolumeProfileError,
};
