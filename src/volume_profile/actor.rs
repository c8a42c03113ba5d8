use std::sync::Arc;

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::{ActorStopReason, BoxError};
use kameo::message::{Context, Message};
use kameo::{Actor, mailbox::unbounded::UnboundedMailbox};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::market_data::{Candle, Trade};
use super::boundary::SessionFlags;
use super::engine::{EngineStatistics, VolumeProfileEngine};
use super::structs::{ProfileSnapshot, ValueArea, ValueAreaSettings};

/// Volume Profile Actor messages for telling (fire-and-forget)
#[derive(Debug, Clone)]
pub enum VolumeProfileTell {
    /// Replay one historical bar
    ReplayBar {
        bar: usize,
        candle: Candle,
        flags: SessionFlags,
    },
    /// Last historical bar has been replayed
    HistoryLoaded,
    /// Open a live bar; volume follows as trades
    LiveBar {
        bar: usize,
        candle: Candle,
        flags: SessionFlags,
    },
    /// Live trade
    Trade(Trade),
    /// Drop all periods and start a new replay
    Recalculate,
}

/// Volume Profile Actor messages for asking (request-response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VolumeProfileAsk {
    GetPoc { period: usize },
    /// Value area with explicit settings, or the configured ones
    GetValueArea {
        period: usize,
        settings: Option<ValueAreaSettings>,
    },
    GetTotalVolume { period: usize },
    GetSnapshot { period: usize },
    GetHealthStatus,
    GetStatistics,
}

/// Volume Profile Actor responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VolumeProfileReply {
    Poc(Option<Decimal>),
    ValueArea(Option<ValueArea>),
    TotalVolume(Option<Decimal>),
    Snapshot(Option<Box<ProfileSnapshot>>),
    HealthStatus {
        is_healthy: bool,
        history_loaded: bool,
        period_count: usize,
        last_error: Option<String>,
    },
    Statistics(EngineStatistics),
}

/// Actor owning one volume profile engine; tells mutate, asks read
pub struct VolumeProfileActor {
    engine: VolumeProfileEngine,
    /// Last error message
    last_error: Option<Arc<String>>,
    errors: u64,
}

impl VolumeProfileActor {
    pub fn new(engine: VolumeProfileEngine) -> Self {
        Self {
            engine,
            last_error: None,
            errors: 0,
        }
    }

    fn record_error(&mut self, context: &str, message: String) {
        error!("Failed to {}: {}", context, message);
        self.errors += 1;
        self.last_error = Some(Arc::new(message));
    }

    fn get_health_status(&self) -> VolumeProfileReply {
        VolumeProfileReply::HealthStatus {
            is_healthy: self.last_error.is_none(),
            history_loaded: self.engine.is_history_loaded(),
            period_count: self.engine.period_count(),
            last_error: self.last_error.as_ref().map(|s| (**s).clone()),
        }
    }
}

impl Actor for VolumeProfileActor {
    type Mailbox = UnboundedMailbox<Self>;

    fn name() -> &'static str {
        "VolumeProfileActor"
    }

    async fn on_start(&mut self, _actor_ref: ActorRef<Self>) -> Result<(), BoxError> {
        let config = self.engine.config();
        info!(
            instrument = %config.instrument,
            period = ?config.period,
            percent = %config.value_area.percent,
            "Starting Volume Profile Actor"
        );
        Ok(())
    }

    async fn on_stop(&mut self, _actor_ref: WeakActorRef<Self>, reason: ActorStopReason) -> Result<(), BoxError> {
        let stats = self.engine.statistics();
        info!(
            ?reason,
            periods = stats.period_count,
            bars = stats.bars_replayed,
            trades = stats.trades_applied,
            errors = self.errors,
            "Stopping Volume Profile Actor"
        );
        Ok(())
    }
}

impl Message<VolumeProfileTell> for VolumeProfileActor {
    type Reply = ();

    async fn handle(&mut self, msg: VolumeProfileTell, _ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        match msg {
            VolumeProfileTell::ReplayBar { bar, candle, flags } => {
                if let Err(e) = self.engine.replay_bar(bar, &candle, &flags) {
                    self.record_error("replay bar", e.to_string());
                }
            }
            VolumeProfileTell::HistoryLoaded => {
                self.engine.mark_history_loaded();
            }
            VolumeProfileTell::LiveBar { bar, candle, flags } => {
                debug!(bar, "VolumeProfileActor received LiveBar");
                if let Err(e) = self.engine.open_live_bar(bar, &candle, &flags) {
                    self.record_error("open live bar", e.to_string());
                }
            }
            VolumeProfileTell::Trade(trade) => {
                if let Err(e) = self.engine.on_trade(&trade) {
                    self.record_error("apply trade", e.to_string());
                }
            }
            VolumeProfileTell::Recalculate => {
                self.engine.recalculate();
                self.last_error = None;
            }
        }
    }
}

impl Message<VolumeProfileAsk> for VolumeProfileActor {
    type Reply = Result<VolumeProfileReply, String>;

    async fn handle(&mut self, msg: VolumeProfileAsk, _ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        match msg {
            VolumeProfileAsk::GetPoc { period } => Ok(VolumeProfileReply::Poc(self.engine.poc(period))),
            VolumeProfileAsk::GetValueArea { period, settings } => {
                let value_area = match settings {
                    Some(settings) => self
                        .engine
                        .value_area(period, &settings)
                        .map_err(|e| e.to_string())?,
                    None => self.engine.default_value_area(period),
                };
                Ok(VolumeProfileReply::ValueArea(value_area))
            }
            VolumeProfileAsk::GetTotalVolume { period } => {
                Ok(VolumeProfileReply::TotalVolume(self.engine.total_volume(period)))
            }
            VolumeProfileAsk::GetSnapshot { period } => {
                Ok(VolumeProfileReply::Snapshot(self.engine.snapshot(period).map(Box::new)))
            }
            VolumeProfileAsk::GetHealthStatus => Ok(self.get_health_status()),
            VolumeProfileAsk::GetStatistics => Ok(VolumeProfileReply::Statistics(self.engine.statistics())),
        }
    }
}
