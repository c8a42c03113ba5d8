//! Host-side market data consumed by the volume profile engine: candles with
//! their price-volume tables, and trades from the live tick stream.
pub mod structs;

pub use structs::{Candle, PriceVolumeSample, TimestampMS, Trade, TradeDirection};
