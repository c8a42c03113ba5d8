use chrono::{DateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::market_data::TimestampMS;
use super::structs::PeriodType;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Host calendar answering session, week and month boundaries per bar
#[cfg_attr(test, mockall::automock)]
pub trait SessionCalendar {
    fn is_new_session(&self, bar: usize) -> bool;
    fn is_new_week(&self, bar: usize) -> bool;
    fn is_new_month(&self, bar: usize) -> bool;
}

/// Calendar for hosts that only use timestamp-derived periods
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSessionCalendar;

impl SessionCalendar for NoSessionCalendar {
    fn is_new_session(&self, _bar: usize) -> bool {
        false
    }

    fn is_new_week(&self, _bar: usize) -> bool {
        false
    }

    fn is_new_month(&self, _bar: usize) -> bool {
        false
    }
}

/// Boundary answers for a single bar, computed by the host ahead of time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFlags {
    pub new_session: bool,
    pub new_week: bool,
    pub new_month: bool,
}

impl SessionCalendar for SessionFlags {
    fn is_new_session(&self, _bar: usize) -> bool {
        self.new_session
    }

    fn is_new_week(&self, _bar: usize) -> bool {
        self.new_week
    }

    fn is_new_month(&self, _bar: usize) -> bool {
        self.new_month
    }
}

/// Decides whether a bar opens a new period.
///
/// Session, week and month defer to the host calendar; the remaining period
/// types are derived from bar timestamps. When the calendar and the elapsed
/// time disagree the bar is still segmented by the calendar, and the
/// disagreement is logged and counted.
#[derive(Debug, Clone)]
pub struct BoundaryPolicy {
    period: PeriodType,
    last_bar_time: Option<TimestampMS>,
    period_start: Option<TimestampMS>,
    next_fixed_boundary: Option<TimestampMS>,
    flagged: bool,
    disagreements: u64,
}

impl BoundaryPolicy {
    pub fn new(period: PeriodType) -> Self {
        Self {
            period,
            last_bar_time: None,
            period_start: None,
            next_fixed_boundary: None,
            flagged: false,
            disagreements: 0,
        }
    }

    /// Anchor the policy on the first bar of the stream
    pub fn start(&mut self, time: TimestampMS) {
        self.last_bar_time = Some(time);
        self.open_period(time);
        self.next_fixed_boundary = match self.period {
            PeriodType::FixedHours { hours } => Some(time + i64::from(hours) * HOUR_MS),
            _ => None,
        };
    }

    pub fn is_started(&self) -> bool {
        self.last_bar_time.is_some()
    }

    /// Whether `bar` starts a new period. At most one boundary is reported per
    /// call; periods skipped by a feed gap are not back-filled.
    pub fn is_new_period(
        &mut self,
        bar: usize,
        time: TimestampMS,
        calendar: &dyn SessionCalendar,
    ) -> bool {
        let Some(previous) = self.last_bar_time else {
            self.start(time);
            return true;
        };
        // Span of the developing period, not the gap since the previous bar
        let elapsed = time - self.period_start.unwrap_or(previous);

        let new_period = match self.period {
            PeriodType::Bar => true,
            PeriodType::Session => {
                let fired = calendar.is_new_session(bar);
                self.check_elapsed(bar, fired, elapsed, DAY_MS, "session");
                fired
            }
            PeriodType::Week => {
                let fired = calendar.is_new_week(bar);
                self.check_elapsed(bar, fired, elapsed, 7 * DAY_MS, "week");
                fired
            }
            PeriodType::Month => {
                let fired = calendar.is_new_month(bar);
                self.check_elapsed(bar, fired, elapsed, 31 * DAY_MS, "month");
                fired
            }
            PeriodType::Hour => {
                let fired = hour_of_day(time) != hour_of_day(previous);
                // Same hour-of-day a whole number of days later
                self.check_elapsed(bar, fired, elapsed, HOUR_MS - 1, "hour");
                fired
            }
            PeriodType::FixedHours { hours } => {
                self.roll_fixed_window(bar, time, i64::from(hours) * HOUR_MS)
            }
            PeriodType::CustomMinutes { minutes } => {
                let span = i64::from(minutes) * MINUTE_MS;
                time.div_euclid(span) != previous.div_euclid(span)
            }
        };

        if new_period {
            self.open_period(time);
        }
        if time >= previous {
            self.last_bar_time = Some(time);
        }
        new_period
    }

    fn open_period(&mut self, time: TimestampMS) {
        self.period_start = Some(time);
        self.flagged = false;
    }

    fn roll_fixed_window(&mut self, bar: usize, time: TimestampMS, span: i64) -> bool {
        let next = self.next_fixed_boundary.unwrap_or(time + span);
        if time < next {
            return false;
        }

        // Stay on the anchor's grid: the boundary only ever moves in whole spans.
        let mut boundary = next + span;
        let mut skipped = 0u64;
        while boundary <= time {
            boundary += span;
            skipped += 1;
        }
        self.next_fixed_boundary = Some(boundary);

        if skipped > 0 {
            self.disagreements += 1;
            warn!(
                bar,
                skipped,
                disagreements = self.disagreements,
                "Feed gap spans several fixed windows; opening a single period without back-fill"
            );
        }
        true
    }

    fn check_elapsed(&mut self, bar: usize, fired: bool, elapsed: i64, max_span: i64, kind: &str) {
        if !fired && !self.flagged && elapsed > max_span {
            self.flagged = true;
            self.disagreements += 1;
            warn!(
                bar,
                kind,
                period_ms = elapsed,
                disagreements = self.disagreements,
                "Boundary predicate reports no new period although the period outlasts its span"
            );
        }
    }

    pub fn disagreements(&self) -> u64 {
        self.disagreements
    }

    pub fn period(&self) -> PeriodType {
        self.period
    }

    pub fn reset(&mut self) {
        self.last_bar_time = None;
        self.period_start = None;
        self.next_fixed_boundary = None;
        self.flagged = false;
        self.disagreements = 0;
    }
}

fn hour_of_day(time: TimestampMS) -> Option<u32> {
    DateTime::from_timestamp_millis(time).map(|datetime| datetime.hour())
}
