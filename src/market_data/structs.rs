use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub type TimestampMS = i64;

/// Traded volume registered at one price inside a candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceVolumeSample {
    /// Volume traded by sellers hitting the bid
    pub bid: Decimal,
    /// Volume traded by buyers lifting the ask
    pub ask: Decimal,
    /// Number of trades
    pub ticks: u64,
}

impl PriceVolumeSample {
    pub fn new(bid: Decimal, ask: Decimal, ticks: u64) -> Self {
        Self { bid, ask, ticks }
    }

    pub fn volume(&self) -> Decimal {
        self.bid + self.ask
    }
}

/// Host candle with its per-price volume table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub time: TimestampMS,
    pub last_time: TimestampMS,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    price_volume: FxHashMap<Decimal, PriceVolumeSample>,
}

impl Candle {
    pub fn new(
        time: TimestampMS,
        last_time: TimestampMS,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Self {
        Self {
            time,
            last_time,
            open,
            high,
            low,
            close,
            volume: Decimal::ZERO,
            price_volume: FxHashMap::default(),
        }
    }

    /// Register a sample at `price`, merging with any sample already there.
    pub fn with_sample(mut self, price: Decimal, sample: PriceVolumeSample) -> Self {
        self.add_sample(price, sample);
        self
    }

    pub fn add_sample(&mut self, price: Decimal, sample: PriceVolumeSample) {
        let entry = self.price_volume.entry(price).or_default();
        entry.bid += sample.bid;
        entry.ask += sample.ask;
        entry.ticks += sample.ticks;
        self.volume += sample.volume();
    }

    /// Per-price lookup; `None` when nothing traded at `price`.
    pub fn price_volume_info(&self, price: Decimal) -> Option<&PriceVolumeSample> {
        self.price_volume.get(&price)
    }

    pub fn sample_count(&self) -> usize {
        self.price_volume.len()
    }
}

/// Aggressor side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
    Between,
}

/// Single trade from the live tick stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub time: TimestampMS,
    pub price: Decimal,
    pub volume: Decimal,
    pub direction: TradeDirection,
    /// Best bid size at the time of the trade
    pub bid_volume: Decimal,
    /// Best ask size at the time of the trade
    pub ask_volume: Decimal,
}

impl Trade {
    pub fn new(time: TimestampMS, price: Decimal, volume: Decimal, direction: TradeDirection) -> Self {
        Self {
            time,
            price,
            volume,
            direction,
            bid_volume: Decimal::ZERO,
            ask_volume: Decimal::ZERO,
        }
    }

    /// Split of the traded volume into (bid, ask) contributions.
    /// Trades without an aggressor are split evenly.
    pub fn bid_ask_split(&self) -> (Decimal, Decimal) {
        match self.direction {
            TradeDirection::Buy => (Decimal::ZERO, self.volume),
            TradeDirection::Sell => (self.volume, Decimal::ZERO),
            TradeDirection::Between => {
                let bid = self.volume / Decimal::TWO;
                (bid, self.volume - bid)
            }
        }
    }
}
