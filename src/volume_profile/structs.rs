use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::market_data::TimestampMS;
use super::errors::VolumeProfileError;
use super::precision::{PrecisionError, PricePrecisionManager};

fn default_instrument() -> String {
    "UNKNOWN".to_string()
}

fn default_tick_size() -> Decimal {
    dec!(0.01)
}

/// Volume profile configuration for one engine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeProfileConfig {
    #[serde(default = "default_instrument")]
    pub instrument: String,
    #[serde(default = "default_tick_size")]
    pub tick_size: Decimal,
    #[serde(default)]
    pub period: PeriodType,
    #[serde(default)]
    pub projection: ValueProjection,
    /// Number of periods kept for lookback; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_periods: Option<usize>,
    #[serde(default)]
    pub value_area: ValueAreaSettings,
}

impl Default for VolumeProfileConfig {
    fn default() -> Self {
        Self {
            instrument: default_instrument(),
            tick_size: default_tick_size(),
            period: PeriodType::default(),
            projection: ValueProjection::default(),
            max_periods: None,
            value_area: ValueAreaSettings::default(),
        }
    }
}

impl VolumeProfileConfig {
    pub fn new(instrument: impl Into<String>, tick_size: Decimal, period: PeriodType) -> Self {
        Self {
            instrument: instrument.into(),
            tick_size,
            period,
            ..Self::default()
        }
    }

    pub fn with_projection(mut self, projection: ValueProjection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_max_periods(mut self, max_periods: usize) -> Self {
        self.max_periods = Some(max_periods);
        self
    }

    pub fn with_value_area(mut self, value_area: ValueAreaSettings) -> Self {
        self.value_area = value_area;
        self
    }

    /// Validate configuration for consistency and reasonable values
    pub fn validate(&self) -> Result<(), VolumeProfileError> {
        if self.tick_size <= Decimal::ZERO {
            return Err(VolumeProfileError::InvalidTickSize(self.tick_size));
        }

        match self.period {
            PeriodType::FixedHours { hours: 0 } => {
                return Err(VolumeProfileError::InvalidConfig(
                    "fixed_hours period must span at least one hour".to_string(),
                ));
            }
            PeriodType::CustomMinutes { minutes: 0 } => {
                return Err(VolumeProfileError::InvalidConfig(
                    "custom_minutes period must span at least one minute".to_string(),
                ));
            }
            _ => {}
        }

        if self.max_periods == Some(0) {
            return Err(VolumeProfileError::InvalidConfig(
                "max_periods must keep at least the current period".to_string(),
            ));
        }

        self.value_area.validate()
    }
}

/// How the bar stream is segmented into periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeriodType {
    /// Every bar is its own period
    Bar,
    /// Trading session, as reported by the host calendar
    #[default]
    Session,
    Week,
    Month,
    /// UTC hour-of-day
    Hour,
    /// Consecutive windows of `hours`, anchored at the first bar
    FixedHours { hours: u32 },
    /// Windows of `minutes` aligned to the Unix epoch
    CustomMinutes { minutes: u32 },
}

/// Level statistic ranked when tracking the point of control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueProjection {
    Bid,
    Ask,
    /// Ask minus bid
    Delta,
    #[default]
    Volume,
    Ticks,
}

/// Parameters of a value area request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueAreaSettings {
    /// Share of total volume the area must contain, in percent
    pub percent: Decimal,
    /// Levels considered per side on each expansion step
    pub expansion_step: usize,
    pub cache_ttl_ms: u64,
    pub use_cache: bool,
}

impl Default for ValueAreaSettings {
    fn default() -> Self {
        Self {
            percent: dec!(70),
            expansion_step: 1,
            cache_ttl_ms: 500,
            use_cache: true,
        }
    }
}

impl ValueAreaSettings {
    pub fn new(percent: Decimal, expansion_step: usize) -> Result<Self, VolumeProfileError> {
        let settings = Self {
            percent,
            expansion_step,
            ..Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_cache(mut self, cache_ttl_ms: u64, use_cache: bool) -> Self {
        self.cache_ttl_ms = cache_ttl_ms;
        self.use_cache = use_cache;
        self
    }

    pub fn validate(&self) -> Result<(), VolumeProfileError> {
        if self.percent <= Decimal::ZERO || self.percent > dec!(100) {
            return Err(VolumeProfileError::InvalidPercentage(self.percent));
        }
        if self.expansion_step == 0 {
            return Err(VolumeProfileError::InvalidExpansionStep);
        }
        Ok(())
    }
}

/// Price band around the point of control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValueArea {
    pub high: Decimal,
    pub low: Decimal,
}

impl ValueArea {
    pub fn new(high: Decimal, low: Decimal) -> Self {
        Self { high, low }
    }

    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.low && price <= self.high
    }

    /// Whether this is the zero-volume sentinel
    pub fn is_empty(&self) -> bool {
        self.high.is_zero() && self.low.is_zero()
    }
}

/// Integer tick index of a price, used as the ordered level key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriceKey(i64);

impl PriceKey {
    pub fn from_raw(key: i64) -> Self {
        Self(key)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn from_price(
        price: Decimal,
        tick_size: Decimal,
        precision_manager: &PricePrecisionManager,
    ) -> Result<Self, PrecisionError> {
        precision_manager.price_to_key(price, tick_size).map(Self)
    }

    /// Tick keys are only built from validated tick sizes, so the product
    /// stays within range for any key produced by `from_price`.
    pub fn to_price(self, tick_size: Decimal) -> Decimal {
        Decimal::from(self.0) * tick_size
    }

    /// Get next price key (higher price by one tick)
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Get previous price key (lower price by one tick)
    pub fn previous(self) -> Self {
        Self(self.0 - 1)
    }
}

/// Running totals for a single price level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub volume: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub ticks: u64,
}

impl PriceLevel {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            volume: Decimal::ZERO,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            ticks: 0,
        }
    }

    /// Deltas are trusted non-negative.
    pub fn add_volume(&mut self, bid_delta: Decimal, ask_delta: Decimal, tick_delta: u64) {
        self.bid += bid_delta;
        self.ask += ask_delta;
        self.volume += bid_delta + ask_delta;
        self.ticks += tick_delta;
    }

    pub fn delta(&self) -> Decimal {
        self.ask - self.bid
    }

    pub fn value(&self, projection: ValueProjection) -> Decimal {
        match projection {
            ValueProjection::Bid => self.bid,
            ValueProjection::Ask => self.ask,
            ValueProjection::Delta => self.delta(),
            ValueProjection::Volume => self.volume,
            ValueProjection::Ticks => Decimal::from(self.ticks),
        }
    }
}

/// Serializable view of one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub start_bar: usize,
    pub end_bar: usize,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub total_volume: Decimal,
    pub poc: Option<Decimal>,
    pub projection: ValueProjection,
    /// Ascending by price
    pub price_levels: Vec<PriceLevel>,
    pub candle_count: u32,
    pub trade_count: u64,
    pub last_updated: TimestampMS,
}
