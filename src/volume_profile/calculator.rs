use std::collections::BTreeMap;
use std::time::Instant;

use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::market_data::{Candle, TimestampMS, Trade};
use super::errors::VolumeProfileError;
use super::output_cache::{CacheMetrics, ValueAreaCache};
use super::precision::PricePrecisionManager;
use super::structs::{
    PriceKey, PriceLevel, ProfileSnapshot, ValueArea, ValueAreaSettings, ValueProjection,
};
use super::value_area::ValueAreaCalculator;

/// Volume profile of a single period with incremental POC tracking
#[derive(Debug, Clone)]
pub struct PeriodProfile {
    pub start_bar: usize,
    pub end_bar: usize,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    /// Whether any candle or trade has set the OHLC fields
    has_range: bool,
    tick_size: Decimal,
    projection: ValueProjection,
    levels: BTreeMap<PriceKey, PriceLevel>,
    poc_key: Option<PriceKey>,
    /// Largest |projected value| seen so far
    poc_abs_value: Decimal,
    total_volume: Decimal,
    pub candle_count: u32,
    pub trade_count: u64,
    last_updated: TimestampMS,
    precision_manager: PricePrecisionManager,
    cache: ValueAreaCache,
}

impl PeriodProfile {
    pub fn new(start_bar: usize, tick_size: Decimal, projection: ValueProjection) -> Self {
        Self {
            start_bar,
            end_bar: start_bar,
            open: Decimal::ZERO,
            high: Decimal::ZERO,
            low: Decimal::ZERO,
            close: Decimal::ZERO,
            has_range: false,
            tick_size,
            projection,
            levels: BTreeMap::new(),
            poc_key: None,
            poc_abs_value: Decimal::ZERO,
            total_volume: Decimal::ZERO,
            candle_count: 0,
            trade_count: 0,
            last_updated: 0,
            precision_manager: PricePrecisionManager::default(),
            cache: ValueAreaCache::new(),
        }
    }

    /// Add a replayed candle, walking its range one tick at a time.
    ///
    /// Prices without a registered sample are skipped.
    pub fn add_candle(&mut self, bar: usize, candle: &Candle) -> Result<(), VolumeProfileError> {
        let low_key = PriceKey::from_price(candle.low, self.tick_size, &self.precision_manager)?;
        let high_key = PriceKey::from_price(candle.high, self.tick_size, &self.precision_manager)?;

        if self.is_untouched() {
            self.open = candle.open;
        }
        self.update_range(low_key.to_price(self.tick_size), high_key.to_price(self.tick_size));
        self.close = candle.close;
        self.touch(bar);

        let mut touched = 0usize;
        for raw in low_key.raw()..=high_key.raw() {
            let key = PriceKey::from_raw(raw);
            let price = key.to_price(self.tick_size);
            let Some(sample) = candle.price_volume_info(price) else {
                continue;
            };
            self.accumulate(key, price, sample.bid, sample.ask, sample.ticks);
            touched += 1;
        }

        self.candle_count += 1;
        self.last_updated = candle.last_time;

        trace!(
            bar,
            touched,
            total_volume = %self.total_volume,
            "Candle added to period profile"
        );
        Ok(())
    }

    /// Add a single live trade at its tick-quantized price
    pub fn add_tick(&mut self, bar: usize, trade: &Trade) -> Result<(), VolumeProfileError> {
        let key = PriceKey::from_price(trade.price, self.tick_size, &self.precision_manager)?;
        let price = key.to_price(self.tick_size);
        let (bid, ask) = trade.bid_ask_split();

        if self.is_untouched() {
            self.open = price;
        }
        self.update_range(price, price);
        self.close = price;
        self.touch(bar);

        self.accumulate(key, price, bid, ask, 1);
        self.trade_count += 1;
        self.last_updated = trade.time;
        Ok(())
    }

    /// Extend the period to cover `bar` without adding volume
    pub fn touch(&mut self, bar: usize) {
        self.end_bar = self.end_bar.max(bar);
    }

    /// Update one level and re-evaluate the POC (first found wins on ties)
    fn accumulate(&mut self, key: PriceKey, price: Decimal, bid: Decimal, ask: Decimal, ticks: u64) {
        let level = self.levels.entry(key).or_insert_with(|| PriceLevel::new(price));
        level.add_volume(bid, ask, ticks);
        let value = level.value(self.projection).abs();

        self.total_volume += bid + ask;

        if self.poc_key.is_none() || value > self.poc_abs_value {
            if self.poc_key != Some(key) {
                debug!(poc = %price, value = %value, "Point of control moved");
            }
            self.poc_key = Some(key);
            self.poc_abs_value = value;
        }
    }

    fn update_range(&mut self, low: Decimal, high: Decimal) {
        if self.has_range {
            self.low = self.low.min(low);
            self.high = self.high.max(high);
        } else {
            self.low = low;
            self.high = high;
            self.has_range = true;
        }
    }

    fn is_untouched(&self) -> bool {
        !self.has_range
    }

    /// Value area for the requested settings, served from the cache when allowed
    pub fn value_area(&mut self, settings: &ValueAreaSettings) -> ValueArea {
        self.value_area_at(settings, Instant::now())
    }

    /// As [`value_area`](Self::value_area) with an explicit clock reading
    pub fn value_area_at(&mut self, settings: &ValueAreaSettings, now: Instant) -> ValueArea {
        if let Some(cached) = self.cache.lookup(self.total_volume, settings, now) {
            return cached;
        }

        let value_area = ValueAreaCalculator::new(settings.percent, settings.expansion_step).calculate(self);
        self.cache.store(self.total_volume, settings, value_area, now);
        value_area
    }

    /// Reset profile to its initial empty state
    pub fn clear(&mut self) {
        self.end_bar = self.start_bar;
        self.open = Decimal::ZERO;
        self.high = Decimal::ZERO;
        self.low = Decimal::ZERO;
        self.close = Decimal::ZERO;
        self.has_range = false;
        self.levels.clear();
        self.poc_key = None;
        self.poc_abs_value = Decimal::ZERO;
        self.total_volume = Decimal::ZERO;
        self.candle_count = 0;
        self.trade_count = 0;
        self.last_updated = 0;
        self.cache.invalidate();
    }

    pub fn poc(&self) -> Option<Decimal> {
        self.poc_key.map(|key| key.to_price(self.tick_size))
    }

    pub fn poc_key(&self) -> Option<PriceKey> {
        self.poc_key
    }

    /// Projected value of the current POC level
    pub fn poc_value(&self) -> Option<Decimal> {
        self.poc_key
            .and_then(|key| self.levels.get(&key))
            .map(|level| level.value(self.projection))
    }

    pub fn total_volume(&self) -> Decimal {
        self.total_volume
    }

    pub fn open(&self) -> Decimal {
        self.open
    }

    pub fn high(&self) -> Decimal {
        self.high
    }

    pub fn low(&self) -> Decimal {
        self.low
    }

    pub fn close(&self) -> Decimal {
        self.close
    }

    pub fn tick_size(&self) -> Decimal {
        self.tick_size
    }

    pub fn projection(&self) -> ValueProjection {
        self.projection
    }

    pub fn last_updated(&self) -> TimestampMS {
        self.last_updated
    }

    pub fn level(&self, price: Decimal) -> Option<&PriceLevel> {
        let key = PriceKey::from_price(price, self.tick_size, &self.precision_manager).ok()?;
        self.levels.get(&key)
    }

    /// Levels in ascending price order
    pub fn levels(&self) -> impl DoubleEndedIterator<Item = (PriceKey, &PriceLevel)> + '_ {
        self.levels.iter().map(|(key, level)| (*key, level))
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            start_bar: self.start_bar,
            end_bar: self.end_bar,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            total_volume: self.total_volume,
            poc: self.poc(),
            projection: self.projection,
            price_levels: self.levels.values().cloned().collect(),
            candle_count: self.candle_count,
            trade_count: self.trade_count,
            last_updated: self.last_updated,
        }
    }
}
