#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use volume_profile_engine::volume_profile::SessionCalendar;
use volume_profile_engine::{Candle, PriceVolumeSample, TimestampMS};

pub const MINUTE_MS: i64 = 60_000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;
/// 2025-01-16 00:00:00 UTC
pub const T0: TimestampMS = 1_736_985_600_000;

/// One-minute candle at `T0 + minute` with the given (price, volume) samples,
/// volume split evenly between bid and ask
pub fn create_sample_candle(minute: i64, levels: &[(Decimal, Decimal)]) -> Candle {
    let time = T0 + minute * MINUTE_MS;
    let low = levels.iter().map(|(price, _)| *price).min().unwrap_or_default();
    let high = levels.iter().map(|(price, _)| *price).max().unwrap_or_default();
    let open = levels.first().map(|(price, _)| *price).unwrap_or_default();
    let close = levels.last().map(|(price, _)| *price).unwrap_or_default();

    let mut candle = Candle::new(time, time + MINUTE_MS - 1, open, high, low, close);
    for (price, volume) in levels {
        candle.add_sample(*price, PriceVolumeSample::new(*volume / Decimal::TWO, *volume / Decimal::TWO, 1));
    }
    candle
}

/// Candle with no samples, as handed over when a live bar opens
pub fn create_empty_candle(minute: i64, price: Decimal) -> Candle {
    let time = T0 + minute * MINUTE_MS;
    Candle::new(time, time + MINUTE_MS - 1, price, price, price, price)
}

/// Calendar answering from fixed lists of boundary bars
#[derive(Debug, Clone, Default)]
pub struct ScriptedCalendar {
    sessions: HashSet<usize>,
    weeks: HashSet<usize>,
    months: HashSet<usize>,
}

impl ScriptedCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(mut self, bars: &[usize]) -> Self {
        self.sessions.extend(bars.iter().copied());
        self
    }

    pub fn with_weeks(mut self, bars: &[usize]) -> Self {
        self.weeks.extend(bars.iter().copied());
        self
    }

    pub fn with_months(mut self, bars: &[usize]) -> Self {
        self.months.extend(bars.iter().copied());
        self
    }
}

impl SessionCalendar for ScriptedCalendar {
    fn is_new_session(&self, bar: usize) -> bool {
        self.sessions.contains(&bar)
    }

    fn is_new_week(&self, bar: usize) -> bool {
        self.weeks.contains(&bar)
    }

    fn is_new_month(&self, bar: usize) -> bool {
        self.months.contains(&bar)
    }
}

#[derive(Debug, Deserialize)]
struct LevelRow {
    bar: usize,
    minute: i64,
    price: String,
    bid: String,
    ask: String,
    ticks: u64,
}

fn parse_decimal(value: &str) -> Decimal {
    Decimal::from_str(value.trim()).unwrap_or_else(|e| panic!("bad decimal {value:?}: {e}"))
}

/// Load `bar,minute,price,bid,ask,ticks` rows into one candle per bar, in bar order
pub fn load_candles_csv(path: impl AsRef<Path>) -> Vec<(usize, Candle)> {
    let mut reader = csv::Reader::from_path(path.as_ref()).expect("Failed to open CSV fixture");
    let mut bars: BTreeMap<usize, (i64, Vec<(Decimal, PriceVolumeSample)>)> = BTreeMap::new();

    for row in reader.deserialize::<LevelRow>() {
        let row = row.expect("Failed to parse CSV row");
        let sample = PriceVolumeSample::new(parse_decimal(&row.bid), parse_decimal(&row.ask), row.ticks);
        bars.entry(row.bar)
            .or_insert_with(|| (row.minute, Vec::new()))
            .1
            .push((parse_decimal(&row.price), sample));
    }

    bars.into_iter()
        .map(|(bar, (minute, samples))| {
            let time = T0 + minute * MINUTE_MS;
            let prices: Vec<Decimal> = samples.iter().map(|(price, _)| *price).collect();
            let low = prices.iter().copied().min().unwrap_or_default();
            let high = prices.iter().copied().max().unwrap_or_default();
            let open = prices.first().copied().unwrap_or_default();
            let close = prices.last().copied().unwrap_or_default();

            let mut candle = Candle::new(time, time + MINUTE_MS - 1, open, high, low, close);
            for (price, sample) in samples {
                candle.add_sample(price, sample);
            }
            (bar, candle)
        })
        .collect()
}

pub fn fixture_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

/// Deterministic pseudo-random candles on a `tick` grid around `start_price`
pub fn create_random_walk_candles(count: usize, start_price: Decimal, tick: Decimal, seed: u64) -> Vec<Candle> {
    let mut state = seed.max(1);
    let mut next = move |bound: u64| {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state % bound
    };

    let mut price = start_price;
    (0..count)
        .map(|i| {
            let step = Decimal::from(next(5) as i64 - 2) * tick;
            price = (price + step).max(tick);

            let width = next(6) as i64 + 1;
            let mut levels = Vec::new();
            for offset in 0..width {
                if next(4) == 0 {
                    continue;
                }
                let level_price = price + Decimal::from(offset) * tick;
                levels.push((level_price, Decimal::from(next(50) + 1)));
            }
            if levels.is_empty() {
                levels.push((price, Decimal::ONE));
            }
            create_sample_candle(i as i64, &levels)
        })
        .collect()
}
