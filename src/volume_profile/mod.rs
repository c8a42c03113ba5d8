/// Volume Profile Module
///
/// Incremental per-period volume profiles over a bar stream: price level
/// accumulation, point of control tracking, value area expansion and the
/// replay/live gate around them.
pub mod actor;
pub mod alerts;
pub mod boundary;
pub mod calculator;
pub mod engine;
pub mod errors;
pub mod output_cache;
pub mod precision;
pub mod sequence;
pub mod structs;
pub mod validation;
pub mod value_area;

pub use actor::{VolumeProfileActor, VolumeProfileAsk, VolumeProfileReply, VolumeProfileTell};
pub use alerts::{AlertColor, AlertConfig, AlertLevel, AlertSink, LevelAlerts, TracingAlertSink, WatchedLevels};
pub use boundary::{BoundaryPolicy, NoSessionCalendar, SessionCalendar, SessionFlags};
pub use calculator::PeriodProfile;
pub use engine::{EngineStatistics, SharedVolumeProfile, VolumeProfileEngine};
pub use errors::VolumeProfileError;
pub use output_cache::{CacheMetrics, ValueAreaCache};
pub use precision::{PrecisionError, PricePrecisionManager};
pub use sequence::PeriodSequence;
pub use structs::{
    PeriodType, PriceKey, PriceLevel, ProfileSnapshot, ValueArea, ValueAreaSettings, ValueProjection,
    VolumeProfileConfig,
};
pub use validation::{ProfileValidationError, ProfileValidator, ValidationReport};
pub use value_area::ValueAreaCalculator;
