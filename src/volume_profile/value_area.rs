//! Value area construction.
//!
//! Starting from the point of control, the band grows one window of
//! `expansion_step` populated levels at a time toward whichever side adds
//! more volume, until it holds `percent` of the period's total volume.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::trace;

use super::calculator::PeriodProfile;
use super::structs::{PriceKey, ValueArea};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Above,
    Below,
}

/// Next unclaimed window on one side of the band
#[derive(Debug, Clone, Copy)]
struct Window {
    volume: Decimal,
    /// Outermost level of the window; `None` once the side is exhausted
    frontier: Option<PriceKey>,
    /// Ladder index the cursor moves to if the window is taken
    end: usize,
}

/// Position of one edge of the band in the level ladder.
///
/// The pending window is summed once and reused until its side is taken,
/// so each level is visited at most once per calculation.
#[derive(Debug)]
struct ExpansionCursor {
    side: Side,
    index: usize,
    pending: Option<Window>,
}

impl ExpansionCursor {
    fn new(side: Side, index: usize) -> Self {
        Self { side, index, pending: None }
    }

    fn peek(&mut self, ladder: &[(PriceKey, Decimal)], step: usize) -> Window {
        if let Some(window) = self.pending {
            return window;
        }

        let range = match self.side {
            Side::Above => {
                let first = self.index + 1;
                let last = (self.index + step).min(ladder.len().saturating_sub(1));
                first..last + 1
            }
            Side::Below => self.index.saturating_sub(step)..self.index,
        };

        let mut window = Window {
            volume: Decimal::ZERO,
            frontier: None,
            end: self.index,
        };
        if !range.is_empty() {
            window.volume = ladder[range.clone()].iter().map(|(_, volume)| *volume).sum();
            let edge = match self.side {
                Side::Above => range.end - 1,
                Side::Below => range.start,
            };
            window.frontier = Some(ladder[edge].0);
            window.end = edge;
        }

        self.pending = Some(window);
        window
    }

    fn advance(&mut self) {
        if let Some(window) = self.pending.take() {
            self.index = window.end;
        }
    }
}

/// Greedy market-profile value area over a [`PeriodProfile`]
#[derive(Debug, Clone, Copy)]
pub struct ValueAreaCalculator {
    percent: Decimal,
    expansion_step: usize,
}

impl ValueAreaCalculator {
    /// `percent` in (0, 100]; `expansion_step` of zero is treated as one.
    pub fn new(percent: Decimal, expansion_step: usize) -> Self {
        Self {
            percent,
            expansion_step: expansion_step.max(1),
        }
    }

    pub fn calculate(&self, profile: &PeriodProfile) -> ValueArea {
        let total_volume = profile.total_volume();
        let (period_high, period_low) = (profile.high(), profile.low());

        if total_volume.is_zero() || (period_high.is_zero() && period_low.is_zero()) {
            return ValueArea::default();
        }
        let Some(poc_key) = profile.poc_key() else {
            return ValueArea::default();
        };

        let ladder: Vec<(PriceKey, Decimal)> = profile
            .levels()
            .map(|(key, level)| (key, level.volume))
            .collect();
        let Ok(poc_index) = ladder.binary_search_by_key(&poc_key, |(key, _)| *key) else {
            return ValueArea::default();
        };

        let tick_size = profile.tick_size();
        let target = total_volume * self.percent / dec!(100);
        let mut accumulated = ladder[poc_index].1;
        let mut vah = poc_key.to_price(tick_size);
        let mut val = vah;

        let mut upper = ExpansionCursor::new(Side::Above, poc_index);
        let mut lower = ExpansionCursor::new(Side::Below, poc_index);
        let mut iterations = 0u32;

        while accumulated < target && !(vah >= period_high && val <= period_low) {
            iterations += 1;
            let above = upper.peek(&ladder, self.expansion_step);
            let below = lower.peek(&ladder, self.expansion_step);
            let upper_frontier = above.frontier.map_or(vah, |key| key.to_price(tick_size));
            let lower_frontier = below.frontier.map_or(val, |key| key.to_price(tick_size));

            if above.volume.is_zero() && below.volume.is_zero() {
                vah = upper_frontier.min(period_high);
                val = lower_frontier.max(period_low);
                break;
            }

            if above.volume >= below.volume {
                vah = upper_frontier;
                accumulated += above.volume;
                upper.advance();
            } else {
                val = lower_frontier;
                accumulated += below.volume;
                lower.advance();
            }
        }

        trace!(
            iterations,
            vah = %vah,
            val = %val,
            accumulated = %accumulated,
            target = %target,
            "Value area expanded"
        );

        ValueArea::new(vah, val)
    }
}
