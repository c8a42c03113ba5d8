use std::collections::VecDeque;
use std::ops::Index;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::market_data::{Candle, Trade};
use super::boundary::{BoundaryPolicy, SessionCalendar};
use super::calculator::PeriodProfile;
use super::errors::VolumeProfileError;
use super::precision::PricePrecisionManager;
use super::structs::{PriceKey, ValueProjection, VolumeProfileConfig};

/// Bar stream segmented into period profiles.
///
/// Periods are stored oldest first; lookups take an index counted back from
/// the developing period (0).
#[derive(Debug, Clone)]
pub struct PeriodSequence {
    periods: VecDeque<PeriodProfile>,
    policy: BoundaryPolicy,
    tick_size: Decimal,
    projection: ValueProjection,
    max_periods: Option<usize>,
    last_bar: Option<usize>,
    precision_manager: PricePrecisionManager,
}

impl PeriodSequence {
    pub fn new(config: &VolumeProfileConfig) -> Self {
        Self {
            periods: VecDeque::new(),
            policy: BoundaryPolicy::new(config.period),
            tick_size: config.tick_size,
            projection: config.projection,
            max_periods: config.max_periods,
            last_bar: None,
            precision_manager: PricePrecisionManager::default(),
        }
    }

    /// Replay one historical bar. Returns whether it opened a new period.
    pub fn add_bar(
        &mut self,
        bar: usize,
        candle: &Candle,
        calendar: &dyn SessionCalendar,
    ) -> Result<bool, VolumeProfileError> {
        if let Some(last) = self.last_bar {
            if bar <= last {
                return Err(VolumeProfileError::OutOfOrderBar { bar, last });
            }
        }

        // Nothing is committed until the candle's range maps onto tick keys
        self.check_range(candle)?;

        let opened = self.roll(bar, candle, calendar);
        self.last_bar = Some(bar);

        let current = self.current_mut_or_err()?;
        current.add_candle(bar, candle)?;
        Ok(opened)
    }

    /// Open a live bar: boundary check only, volume arrives through `add_tick`.
    ///
    /// Re-opening the current bar is a no-op.
    pub fn open_bar(
        &mut self,
        bar: usize,
        candle: &Candle,
        calendar: &dyn SessionCalendar,
    ) -> Result<bool, VolumeProfileError> {
        match self.last_bar {
            Some(last) if bar == last => return Ok(false),
            Some(last) if bar < last => {
                return Err(VolumeProfileError::OutOfOrderBar { bar, last });
            }
            _ => {}
        }

        let opened = self.roll(bar, candle, calendar);
        self.last_bar = Some(bar);
        self.current_mut_or_err()?.touch(bar);
        Ok(opened)
    }

    /// Add a live trade to the developing period
    pub fn add_tick(&mut self, trade: &Trade) -> Result<(), VolumeProfileError> {
        let bar = self.last_bar.ok_or(VolumeProfileError::NoActivePeriod)?;
        self.current_mut_or_err()?.add_tick(bar, trade)
    }

    fn check_range(&self, candle: &Candle) -> Result<(), VolumeProfileError> {
        PriceKey::from_price(candle.low, self.tick_size, &self.precision_manager)?;
        PriceKey::from_price(candle.high, self.tick_size, &self.precision_manager)?;
        Ok(())
    }

    fn roll(&mut self, bar: usize, candle: &Candle, calendar: &dyn SessionCalendar) -> bool {
        let boundary = self.policy.is_new_period(bar, candle.time, calendar);
        if !boundary && !self.periods.is_empty() {
            return false;
        }

        self.periods
            .push_back(PeriodProfile::new(bar, self.tick_size, self.projection));
        info!(
            bar,
            time = candle.time,
            periods = self.periods.len(),
            "New volume profile period started"
        );

        if let Some(max_periods) = self.max_periods {
            while self.periods.len() > max_periods {
                if let Some(dropped) = self.periods.pop_front() {
                    debug!(start_bar = dropped.start_bar, "Dropped oldest period");
                }
            }
        }
        true
    }

    fn current_mut_or_err(&mut self) -> Result<&mut PeriodProfile, VolumeProfileError> {
        self.periods.back_mut().ok_or(VolumeProfileError::NoActivePeriod)
    }

    /// The i-th most recent period (0 = developing)
    pub fn get(&self, index: usize) -> Option<&PeriodProfile> {
        let position = self.periods.len().checked_sub(index + 1)?;
        self.periods.get(position)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut PeriodProfile> {
        let position = self.periods.len().checked_sub(index + 1)?;
        self.periods.get_mut(position)
    }

    pub fn current(&self) -> Option<&PeriodProfile> {
        self.periods.back()
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Most recent first
    pub fn iter(&self) -> impl Iterator<Item = &PeriodProfile> + '_ {
        self.periods.iter().rev()
    }

    pub fn last_bar(&self) -> Option<usize> {
        self.last_bar
    }

    pub fn boundary_disagreements(&self) -> u64 {
        self.policy.disagreements()
    }

    /// Drop every period and forget the boundary anchor
    pub fn clear(&mut self) {
        for profile in self.periods.iter_mut() {
            profile.clear();
        }
        self.periods.clear();
        self.policy.reset();
        self.last_bar = None;
    }
}

impl Index<usize> for PeriodSequence {
    type Output = PeriodProfile;

    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Some(profile) => profile,
            None => panic!(
                "period index {index} out of range for {} periods",
                self.periods.len()
            ),
        }
    }
}
