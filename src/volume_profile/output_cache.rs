//! Per-profile value area memoization.
//!
//! Under bursty tick arrival the value area would otherwise be rebuilt on
//! every read. The cache trades a bounded amount of staleness (the TTL) for
//! skipping those rebuilds.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;

use super::structs::{ValueArea, ValueAreaSettings};

#[derive(Debug, Clone)]
struct CachedValueArea {
    total_volume: Decimal,
    percent: Decimal,
    expansion_step: usize,
    value_area: ValueArea,
    computed_at: Instant,
}

/// Cache performance metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

/// Last computed value area of one profile
#[derive(Debug, Clone, Default)]
pub struct ValueAreaCache {
    entry: Option<CachedValueArea>,
    metrics: CacheMetrics,
}

impl ValueAreaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value area for a request, if still usable.
    ///
    /// A hit requires the same percent and expansion step, and either an
    /// unchanged total volume or (with `use_cache`) an entry younger than the TTL.
    pub fn lookup(
        &mut self,
        total_volume: Decimal,
        settings: &ValueAreaSettings,
        now: Instant,
    ) -> Option<ValueArea> {
        let hit = self.entry.as_ref().and_then(|entry| {
            if entry.percent != settings.percent || entry.expansion_step != settings.expansion_step {
                return None;
            }

            let unchanged = entry.total_volume == total_volume;
            let fresh = settings.use_cache
                && now.saturating_duration_since(entry.computed_at)
                    < Duration::from_millis(settings.cache_ttl_ms);

            (unchanged || fresh).then_some(entry.value_area)
        });

        if hit.is_some() {
            self.metrics.hits += 1;
        } else {
            self.metrics.misses += 1;
        }
        hit
    }

    pub fn store(
        &mut self,
        total_volume: Decimal,
        settings: &ValueAreaSettings,
        value_area: ValueArea,
        now: Instant,
    ) {
        self.entry = Some(CachedValueArea {
            total_volume,
            percent: settings.percent,
            expansion_step: settings.expansion_step,
            value_area,
            computed_at: now,
        });
    }

    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            self.metrics.invalidations += 1;
        }
    }

    pub fn is_populated(&self) -> bool {
        self.entry.is_some()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.metrics
    }
}
