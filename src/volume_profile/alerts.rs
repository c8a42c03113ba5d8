use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::structs::ValueArea;

/// RGB colour handed to the alert transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertColor(pub u8, pub u8, pub u8);

impl AlertColor {
    pub const BLACK: Self = Self(0, 0, 0);
    pub const WHITE: Self = Self(255, 255, 255);
}

/// Host alert transport, fire-and-forget
#[cfg_attr(test, mockall::automock)]
pub trait AlertSink: Send + Sync {
    fn add_alert(
        &self,
        channel: &str,
        instrument: &str,
        message: &str,
        background: AlertColor,
        foreground: AlertColor,
    );
}

/// Sink that only writes alerts to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn add_alert(
        &self,
        channel: &str,
        instrument: &str,
        message: &str,
        _background: AlertColor,
        _foreground: AlertColor,
    ) {
        info!(channel, instrument, "{}", message);
    }
}

fn default_channel() -> String {
    "alert1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_background() -> AlertColor {
    AlertColor::BLACK
}

fn default_foreground() -> AlertColor {
    AlertColor::WHITE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Period whose levels are watched (0 = developing)
    #[serde(default)]
    pub period_index: usize,
    #[serde(default = "default_true")]
    pub poc: bool,
    #[serde(default = "default_true")]
    pub vah: bool,
    #[serde(default = "default_true")]
    pub val: bool,
    #[serde(default = "default_background")]
    pub background: AlertColor,
    #[serde(default = "default_foreground")]
    pub foreground: AlertColor,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel: default_channel(),
            period_index: 0,
            poc: true,
            vah: true,
            val: true,
            background: default_background(),
            foreground: default_foreground(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Poc,
    Vah,
    Val,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Poc => "POC",
            Self::Vah => "VAH",
            Self::Val => "VAL",
        };
        f.write_str(name)
    }
}

/// Levels of one period at the time of a trade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchedLevels {
    pub poc: Option<Decimal>,
    pub value_area: Option<ValueArea>,
}

/// Fires an alert when live prices cross the watched levels
pub struct LevelAlerts {
    config: AlertConfig,
    instrument: String,
    sink: Arc<dyn AlertSink>,
    last_price: Option<Decimal>,
    alerts_sent: u64,
}

impl fmt::Debug for LevelAlerts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelAlerts")
            .field("config", &self.config)
            .field("instrument", &self.instrument)
            .field("last_price", &self.last_price)
            .field("alerts_sent", &self.alerts_sent)
            .finish()
    }
}

impl LevelAlerts {
    pub fn new(config: AlertConfig, instrument: impl Into<String>, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            config,
            instrument: instrument.into(),
            sink,
            last_price: None,
            alerts_sent: 0,
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn period_index(&self) -> usize {
        self.config.period_index
    }

    pub fn alerts_sent(&self) -> u64 {
        self.alerts_sent
    }

    /// Compare a new trade price against the watched levels and fire for each
    /// crossing. Returns the number of alerts sent.
    pub fn on_price(&mut self, price: Decimal, levels: &WatchedLevels) -> usize {
        if !self.config.enabled {
            return 0;
        }

        let previous = self.last_price.replace(price);
        let value_area = levels.value_area.filter(|area| !area.is_empty());

        let candidates = [
            (AlertLevel::Poc, self.config.poc, levels.poc),
            (AlertLevel::Vah, self.config.vah, value_area.map(|area| area.high)),
            (AlertLevel::Val, self.config.val, value_area.map(|area| area.low)),
        ];

        let mut fired = 0;
        for (kind, enabled, level) in candidates {
            let Some(level) = level.filter(|_| enabled) else {
                continue;
            };
            if !crossed(previous, price, level) {
                continue;
            }

            let message = format!("{} {} touched at {}", self.instrument, kind, level);
            debug!(level = %kind, price = %price, "Level alert fired");
            self.sink.add_alert(
                &self.config.channel,
                &self.instrument,
                &message,
                self.config.background,
                self.config.foreground,
            );
            fired += 1;
        }

        self.alerts_sent += fired as u64;
        fired
    }

    /// Forget the last seen price, e.g. after a recalculation
    pub fn reset(&mut self) {
        self.last_price = None;
    }
}

fn crossed(previous: Option<Decimal>, price: Decimal, level: Decimal) -> bool {
    match previous {
        None => price == level,
        Some(previous) if previous == level => false,
        Some(previous) => previous.min(price) <= level && level <= previous.max(price),
    }
}
