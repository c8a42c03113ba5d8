use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::market_data::{Candle, Trade};
use super::alerts::{LevelAlerts, WatchedLevels};
use super::boundary::SessionCalendar;
use super::calculator::PeriodProfile;
use super::errors::VolumeProfileError;
use super::sequence::PeriodSequence;
use super::structs::{ProfileSnapshot, ValueArea, ValueAreaSettings, VolumeProfileConfig};

/// Counters describing the engine's lifetime so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatistics {
    pub instrument: String,
    pub period_count: usize,
    pub history_loaded: bool,
    pub bars_replayed: u64,
    pub live_bars_opened: u64,
    pub trades_applied: u64,
    pub trades_ignored: u64,
    pub recalculations: u64,
    pub boundary_disagreements: u64,
    pub alerts_sent: u64,
    pub current_total_volume: Decimal,
    pub current_level_count: usize,
}

/// Volume profile engine for one instrument.
///
/// Historical bars are replayed first; once the host marks history as
/// loaded, live bars and trades take over. The two regimes never mix:
/// replaying after the switch is an error and trades before it are dropped.
#[derive(Debug)]
pub struct VolumeProfileEngine {
    config: VolumeProfileConfig,
    sequence: PeriodSequence,
    history_loaded: bool,
    alerts: Option<LevelAlerts>,
    bars_replayed: u64,
    live_bars_opened: u64,
    trades_applied: u64,
    trades_ignored: u64,
    recalculations: u64,
}

impl VolumeProfileEngine {
    pub fn new(config: VolumeProfileConfig) -> Result<Self, VolumeProfileError> {
        config.validate()?;
        info!(
            instrument = %config.instrument,
            tick_size = %config.tick_size,
            period = ?config.period,
            projection = ?config.projection,
            "Volume profile engine created"
        );

        Ok(Self {
            sequence: PeriodSequence::new(&config),
            config,
            history_loaded: false,
            alerts: None,
            bars_replayed: 0,
            live_bars_opened: 0,
            trades_applied: 0,
            trades_ignored: 0,
            recalculations: 0,
        })
    }

    pub fn with_alerts(mut self, alerts: LevelAlerts) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn config(&self) -> &VolumeProfileConfig {
        &self.config
    }

    /// Replay one historical bar. Returns whether a new period started.
    pub fn replay_bar(
        &mut self,
        bar: usize,
        candle: &Candle,
        calendar: &dyn SessionCalendar,
    ) -> Result<bool, VolumeProfileError> {
        if self.history_loaded {
            return Err(VolumeProfileError::ReplayAfterHistoryLoaded(bar));
        }

        let opened = self.sequence.add_bar(bar, candle, calendar)?;
        self.bars_replayed += 1;
        Ok(opened)
    }

    /// Close the replay phase; live data is accepted from here on
    pub fn mark_history_loaded(&mut self) {
        if self.history_loaded {
            return;
        }
        self.history_loaded = true;
        info!(
            instrument = %self.config.instrument,
            bars = self.bars_replayed,
            periods = self.sequence.len(),
            "History loaded, switching to live updates"
        );
    }

    pub fn is_history_loaded(&self) -> bool {
        self.history_loaded
    }

    /// Open a live bar. Only the boundary check runs; volume comes from trades.
    pub fn open_live_bar(
        &mut self,
        bar: usize,
        candle: &Candle,
        calendar: &dyn SessionCalendar,
    ) -> Result<bool, VolumeProfileError> {
        if !self.history_loaded {
            return Err(VolumeProfileError::HistoryNotLoaded(bar));
        }

        let previous = self.sequence.last_bar();
        let opened = self.sequence.open_bar(bar, candle, calendar)?;
        if previous != Some(bar) {
            self.live_bars_opened += 1;
        }
        Ok(opened)
    }

    /// Apply a live trade. Returns `false` when the trade was dropped because
    /// history is still loading.
    pub fn on_trade(&mut self, trade: &Trade) -> Result<bool, VolumeProfileError> {
        if !self.history_loaded {
            self.trades_ignored += 1;
            debug!(
                time = trade.time,
                price = %trade.price,
                ignored = self.trades_ignored,
                "Trade ignored while history is loading"
            );
            return Ok(false);
        }

        self.sequence.add_tick(trade)?;
        self.trades_applied += 1;

        if let Some(alerts) = self.alerts.as_mut().filter(|alerts| alerts.config().enabled) {
            let settings = self.config.value_area;
            let levels = self
                .sequence
                .get_mut(alerts.period_index())
                .map(|profile| WatchedLevels {
                    poc: profile.poc(),
                    value_area: Some(profile.value_area(&settings)),
                })
                .unwrap_or_default();
            alerts.on_price(trade.price, &levels);
        }
        Ok(true)
    }

    /// Drop every period and reopen the replay phase
    pub fn recalculate(&mut self) {
        self.sequence.clear();
        self.history_loaded = false;
        if let Some(alerts) = self.alerts.as_mut() {
            alerts.reset();
        }
        self.recalculations += 1;
        info!(
            instrument = %self.config.instrument,
            recalculations = self.recalculations,
            "Volume profile reset for recalculation"
        );
    }

    pub fn poc(&self, period: usize) -> Option<Decimal> {
        self.sequence.get(period).and_then(PeriodProfile::poc)
    }

    /// Value area with caller-supplied settings, rejected when out of range
    pub fn value_area(
        &mut self,
        period: usize,
        settings: &ValueAreaSettings,
    ) -> Result<Option<ValueArea>, VolumeProfileError> {
        settings.validate()?;
        Ok(self
            .sequence
            .get_mut(period)
            .map(|profile| profile.value_area(settings)))
    }

    /// Value area with the configured settings
    pub fn default_value_area(&mut self, period: usize) -> Option<ValueArea> {
        let settings = self.config.value_area;
        self.sequence
            .get_mut(period)
            .map(|profile| profile.value_area(&settings))
    }

    pub fn total_volume(&self, period: usize) -> Option<Decimal> {
        self.sequence.get(period).map(PeriodProfile::total_volume)
    }

    pub fn period(&self, index: usize) -> Option<&PeriodProfile> {
        self.sequence.get(index)
    }

    pub fn period_count(&self) -> usize {
        self.sequence.len()
    }

    pub fn periods(&self) -> &PeriodSequence {
        &self.sequence
    }

    pub fn snapshot(&self, period: usize) -> Option<ProfileSnapshot> {
        self.sequence.get(period).map(PeriodProfile::snapshot)
    }

    pub fn statistics(&self) -> EngineStatistics {
        let current = self.sequence.current();
        EngineStatistics {
            instrument: self.config.instrument.clone(),
            period_count: self.sequence.len(),
            history_loaded: self.history_loaded,
            bars_replayed: self.bars_replayed,
            live_bars_opened: self.live_bars_opened,
            trades_applied: self.trades_applied,
            trades_ignored: self.trades_ignored,
            recalculations: self.recalculations,
            boundary_disagreements: self.sequence.boundary_disagreements(),
            alerts_sent: self.alerts.as_ref().map_or(0, LevelAlerts::alerts_sent),
            current_total_volume: current.map_or(Decimal::ZERO, PeriodProfile::total_volume),
            current_level_count: current.map_or(0, PeriodProfile::level_count),
        }
    }
}

/// Engine behind a single mutex, for synchronous multi-threaded hosts
#[derive(Debug, Clone)]
pub struct SharedVolumeProfile {
    inner: Arc<Mutex<VolumeProfileEngine>>,
}

impl SharedVolumeProfile {
    pub fn new(engine: VolumeProfileEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// A panicking writer leaves the engine usable; the poison flag is ignored.
    pub fn lock(&self) -> MutexGuard<'_, VolumeProfileEngine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn replay_bar(
        &self,
        bar: usize,
        candle: &Candle,
        calendar: &dyn SessionCalendar,
    ) -> Result<bool, VolumeProfileError> {
        self.lock().replay_bar(bar, candle, calendar)
    }

    pub fn mark_history_loaded(&self) {
        self.lock().mark_history_loaded();
    }

    pub fn open_live_bar(
        &self,
        bar: usize,
        candle: &Candle,
        calendar: &dyn SessionCalendar,
    ) -> Result<bool, VolumeProfileError> {
        self.lock().open_live_bar(bar, candle, calendar)
    }

    pub fn on_trade(&self, trade: &Trade) -> Result<bool, VolumeProfileError> {
        self.lock().on_trade(trade)
    }

    pub fn recalculate(&self) {
        self.lock().recalculate();
    }

    pub fn poc(&self, period: usize) -> Option<Decimal> {
        self.lock().poc(period)
    }

    pub fn value_area(
        &self,
        period: usize,
        settings: &ValueAreaSettings,
    ) -> Result<Option<ValueArea>, VolumeProfileError> {
        self.lock().value_area(period, settings)
    }

    pub fn total_volume(&self, period: usize) -> Option<Decimal> {
        self.lock().total_volume(period)
    }

    pub fn snapshot(&self, period: usize) -> Option<ProfileSnapshot> {
        self.lock().snapshot(period)
    }

    pub fn statistics(&self) -> EngineStatistics {
        self.lock().statistics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{PriceVolumeSample, TradeDirection};
    use crate::volume_profile::alerts::{AlertConfig, MockAlertSink};
    use crate::volume_profile::boundary::{NoSessionCalendar, SessionFlags};
    use crate::volume_profile::structs::PeriodType;
    use rust_decimal_macros::dec;

    const MINUTE_MS: i64 = 60_000;

    fn candle(minute: i64, levels: &[(Decimal, Decimal)]) -> Candle {
        let low = levels.iter().map(|(price, _)| *price).min().unwrap_or_default();
        let high = levels.iter().map(|(price, _)| *price).max().unwrap_or_default();
        let time = minute * MINUTE_MS;
        let mut candle = Candle::new(time, time + MINUTE_MS - 1, low, high, low, high);
        for (price, volume) in levels {
            candle.add_sample(*price, PriceVolumeSample::new(Decimal::ZERO, *volume, 1));
        }
        candle
    }

    fn engine() -> VolumeProfileEngine {
        let config = VolumeProfileConfig::new("ES", dec!(0.25), PeriodType::Session);
        VolumeProfileEngine::new(config).unwrap()
    }

    fn replay_reference(engine: &mut VolumeProfileEngine) {
        engine
            .replay_bar(0, &candle(0, &[(dec!(100.00), dec!(30)), (dec!(100.25), dec!(50))]), &SessionFlags::default())
            .unwrap();
        engine
            .replay_bar(
                1,
                &candle(1, &[(dec!(100.50), dec!(80)), (dec!(100.75), dec!(20)), (dec!(101.00), dec!(10))]),
                &SessionFlags::default(),
            )
            .unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = VolumeProfileConfig::new("ES", dec!(-1), PeriodType::Session);
        assert!(matches!(
            VolumeProfileEngine::new(config),
            Err(VolumeProfileError::InvalidTickSize(_))
        ));
    }

    #[test]
    fn test_replay_then_query() {
        let mut engine = engine();
        replay_reference(&mut engine);

        assert_eq!(engine.period_count(), 1);
        assert_eq!(engine.poc(0), Some(dec!(100.50)));
        assert_eq!(engine.total_volume(0), Some(dec!(190)));
        assert_eq!(
            engine.default_value_area(0),
            Some(ValueArea::new(dec!(100.50), dec!(100.00)))
        );
        assert_eq!(engine.poc(1), None);
        assert_eq!(engine.value_area(1, &ValueAreaSettings::default()).unwrap(), None);
    }

    #[test]
    fn test_out_of_range_settings_rejected() {
        let mut engine = engine();
        replay_reference(&mut engine);

        let mut settings = ValueAreaSettings::default();
        settings.percent = dec!(0);
        assert!(matches!(
            engine.value_area(0, &settings),
            Err(VolumeProfileError::InvalidPercentage(_))
        ));

        settings.percent = dec!(101);
        assert!(matches!(
            engine.value_area(0, &settings),
            Err(VolumeProfileError::InvalidPercentage(_))
        ));

        let zero_step = ValueAreaSettings { expansion_step: 0, ..ValueAreaSettings::default() };
        let shared = SharedVolumeProfile::new(engine);
        assert!(matches!(
            shared.value_area(0, &zero_step),
            Err(VolumeProfileError::InvalidExpansionStep)
        ));
        assert_eq!(
            shared.value_area(0, &ValueAreaSettings::default()).unwrap(),
            Some(ValueArea::new(dec!(100.50), dec!(100.00)))
        );
    }

    #[test]
    fn test_gate_rejects_replay_after_history() {
        let mut engine = engine();
        replay_reference(&mut engine);
        engine.mark_history_loaded();

        let err = engine
            .replay_bar(2, &candle(2, &[(dec!(100), dec!(1))]), &NoSessionCalendar)
            .unwrap_err();
        assert!(matches!(err, VolumeProfileError::ReplayAfterHistoryLoaded(2)));
    }

    #[test]
    fn test_trades_before_gate_are_ignored() {
        let mut engine = engine();
        replay_reference(&mut engine);

        let trade = Trade::new(2 * MINUTE_MS, dec!(100.50), dec!(5), TradeDirection::Buy);
        assert!(!engine.on_trade(&trade).unwrap());
        assert_eq!(engine.total_volume(0), Some(dec!(190)));
        assert_eq!(engine.statistics().trades_ignored, 1);

        assert!(matches!(
            engine.open_live_bar(2, &candle(2, &[]), &NoSessionCalendar),
            Err(VolumeProfileError::HistoryNotLoaded(2))
        ));
    }

    #[test]
    fn test_live_trades_extend_developing_period() {
        let mut engine = engine();
        replay_reference(&mut engine);
        engine.mark_history_loaded();

        engine.open_live_bar(2, &candle(2, &[]), &SessionFlags::default()).unwrap();
        let trade = Trade::new(2 * MINUTE_MS + 1, dec!(100.26), dec!(40), TradeDirection::Sell);
        assert!(engine.on_trade(&trade).unwrap());

        let level = engine.period(0).unwrap().level(dec!(100.25)).unwrap();
        assert_eq!(level.volume, dec!(90));
        assert_eq!(level.bid, dec!(40));
        assert_eq!(engine.total_volume(0), Some(dec!(230)));
        assert_eq!(engine.period(0).unwrap().end_bar, 2);

        let stats = engine.statistics();
        assert_eq!(stats.trades_applied, 1);
        assert_eq!(stats.live_bars_opened, 1);
        assert_eq!(stats.current_level_count, 5);
    }

    #[test]
    fn test_recalculate_reopens_replay() {
        let mut engine = engine();
        replay_reference(&mut engine);
        engine.mark_history_loaded();

        engine.recalculate();

        assert!(!engine.is_history_loaded());
        assert_eq!(engine.period_count(), 0);
        assert_eq!(engine.poc(0), None);

        replay_reference(&mut engine);
        assert_eq!(engine.poc(0), Some(dec!(100.50)));
        assert_eq!(engine.statistics().recalculations, 1);
    }

    #[test]
    fn test_live_trade_alerts_on_poc_cross() {
        let mut sink = MockAlertSink::new();
        sink.expect_add_alert().times(1).return_const(());
        let alerts = LevelAlerts::new(
            AlertConfig { enabled: true, vah: false, val: false, ..AlertConfig::default() },
            "ES",
            Arc::new(sink),
        );

        let mut engine = engine().with_alerts(alerts);
        replay_reference(&mut engine);
        engine.mark_history_loaded();
        engine.open_live_bar(2, &candle(2, &[]), &SessionFlags::default()).unwrap();

        engine.on_trade(&Trade::new(2 * MINUTE_MS, dec!(100.00), dec!(1), TradeDirection::Buy)).unwrap();
        engine.on_trade(&Trade::new(2 * MINUTE_MS + 1, dec!(100.75), dec!(1), TradeDirection::Buy)).unwrap();

        assert_eq!(engine.statistics().alerts_sent, 1);
    }

    #[test]
    fn test_disabled_alerts_skip_level_tracking() {
        let mut sink = MockAlertSink::new();
        sink.expect_add_alert().never();
        let alerts = LevelAlerts::new(AlertConfig::default(), "ES", Arc::new(sink));

        let mut engine = engine().with_alerts(alerts);
        replay_reference(&mut engine);
        engine.mark_history_loaded();
        engine.open_live_bar(2, &candle(2, &[]), &SessionFlags::default()).unwrap();
        engine.default_value_area(0);
        let lookups = |engine: &VolumeProfileEngine| {
            let metrics = engine.period(0).unwrap().cache_metrics();
            metrics.hits + metrics.misses
        };
        let before = lookups(&engine);

        engine.on_trade(&Trade::new(2 * MINUTE_MS, dec!(100.50), dec!(1), TradeDirection::Buy)).unwrap();
        engine.on_trade(&Trade::new(2 * MINUTE_MS + 1, dec!(99.00), dec!(1), TradeDirection::Buy)).unwrap();

        assert_eq!(lookups(&engine), before);
        assert_eq!(engine.statistics().alerts_sent, 0);
    }

    #[test]
    fn test_shared_engine_across_threads() {
        let shared = SharedVolumeProfile::new(engine());
        replay_reference(&mut shared.lock());
        shared.mark_history_loaded();
        shared.open_live_bar(2, &candle(2, &[]), &SessionFlags::default()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    let trade = Trade::new(2 * MINUTE_MS + i, dec!(101.00), dec!(1), TradeDirection::Between);
                    shared.on_trade(&trade).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        assert_eq!(shared.total_volume(0), Some(dec!(194)));
        assert_eq!(shared.statistics().trades_applied, 4);
    }
}
