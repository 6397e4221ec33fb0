//! Session store - single shared home for all per-session state
//!
//! One writer (the running loop) mutates it between awaits; readers take
//! cheap snapshots. The lock is never held across an await point.

use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::config::{ChainControls, LlmControls};
use crate::ledger::{MarketLedger, PollOutcome, DEFAULT_RETENTION};
use crate::types::{
    Candle, LogLine, Mode, OnChainEntry, OpenOrder, Session, StateResponse, TradeRecord, Wallet,
};

/// Most recent log lines kept
pub const LOG_CAPACITY: usize = 100;
/// Most recent dispatched trades kept
pub const TRADE_HISTORY_CAPACITY: usize = 50;
/// Most recent on-chain attempts kept
pub const ONCHAIN_CAPACITY: usize = 50;

/// Read snapshot of the market, decoupled from the lock
#[derive(Debug, Clone)]
pub struct MarketView {
    pub price: Option<f64>,
    pub wallet: Option<Wallet>,
    pub open_orders: Vec<OpenOrder>,
    pub candles: Vec<Candle>,
    pub last_candle_time: Option<DateTime<Utc>>,
    pub data_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

struct Inner {
    epoch: u64,
    session: Option<Session>,
    ledger: MarketLedger,
    logs: VecDeque<LogLine>,
    onchain: VecDeque<OnChainEntry>,
    trades: VecDeque<TradeRecord>,
    insight: Option<String>,
    llm: LlmControls,
    chain: ChainControls,
}

pub struct SessionStore {
    inner: RwLock<Inner>,
}

impl SessionStore {
    pub fn new(llm: LlmControls, chain: ChainControls) -> Self {
        Self {
            inner: RwLock::new(Inner {
                epoch: 0,
                session: None,
                ledger: MarketLedger::new(Mode::Backtest, DEFAULT_RETENTION),
                logs: VecDeque::new(),
                onchain: VecDeque::new(),
                trades: VecDeque::new(),
                insight: None,
                llm,
                chain,
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("store lock poisoned")
    }

    /// Epoch bumps on every session switch; loops capture the epoch at
    /// start and stop once it moves on.
    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    pub fn session(&self) -> Option<Session> {
        self.read().session.clone()
    }

    /// Switch to a new session: bump the epoch and drop every piece of
    /// state derived from the previous one. Operator controls survive.
    pub fn reset_for(&self, session: Session, retention: usize) {
        let mut inner = self.write();
        inner.epoch += 1;
        inner.ledger = MarketLedger::new(session.mode, retention);
        inner.session = Some(session);
        inner.logs.clear();
        inner.onchain.clear();
        inner.trades.clear();
        inner.insight = None;
    }

    pub fn apply_poll(&self, poll: &StateResponse, now: Instant) -> PollOutcome {
        self.write().ledger.apply_poll(poll, now)
    }

    pub fn market_view(&self) -> MarketView {
        let inner = self.read();
        MarketView {
            price: inner.ledger.price(),
            wallet: inner.ledger.wallet().cloned(),
            open_orders: inner.ledger.open_orders().to_vec(),
            candles: inner.ledger.candles().iter().cloned().collect(),
            last_candle_time: inner.ledger.last_candle().map(|c| c.close_time),
            data_window: inner.ledger.data_window(),
        }
    }

    pub fn append_log(&self, line: LogLine) {
        let mut inner = self.write();
        inner.logs.push_back(line);
        while inner.logs.len() > LOG_CAPACITY {
            inner.logs.pop_front();
        }
    }

    pub fn logs(&self) -> Vec<LogLine> {
        self.read().logs.iter().cloned().collect()
    }

    pub fn push_onchain(&self, entry: OnChainEntry) {
        let mut inner = self.write();
        inner.onchain.push_back(entry);
        while inner.onchain.len() > ONCHAIN_CAPACITY {
            inner.onchain.pop_front();
        }
    }

    pub fn onchain_log(&self) -> Vec<OnChainEntry> {
        self.read().onchain.iter().cloned().collect()
    }

    pub fn push_trade(&self, record: TradeRecord) {
        let mut inner = self.write();
        inner.trades.push_back(record);
        while inner.trades.len() > TRADE_HISTORY_CAPACITY {
            inner.trades.pop_front();
        }
    }

    pub fn trade_history(&self) -> Vec<TradeRecord> {
        self.read().trades.iter().cloned().collect()
    }

    pub fn set_insight(&self, insight: impl Into<String>) {
        self.write().insight = Some(insight.into());
    }

    pub fn insight(&self) -> Option<String> {
        self.read().insight.clone()
    }

    pub fn llm_controls(&self) -> LlmControls {
        self.read().llm.clone()
    }

    pub fn set_llm_controls(&self, llm: LlmControls) {
        self.write().llm = llm;
    }

    pub fn chain_controls(&self) -> ChainControls {
        self.read().chain.clone()
    }

    pub fn set_chain_controls(&self, chain: ChainControls) {
        self.write().chain = chain;
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(LlmControls::default(), ChainControls::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Decision, DecisionAction};

    fn store() -> SessionStore {
        SessionStore::default()
    }

    #[test]
    fn log_sink_keeps_most_recent_100() {
        let store = store();
        for i in 0..150 {
            store.append_log(LogLine::info(format!("line {i}")));
        }
        let logs = store.logs();
        assert_eq!(logs.len(), LOG_CAPACITY);
        assert_eq!(logs[0].thought.as_deref(), Some("line 50"));
        assert_eq!(logs[99].thought.as_deref(), Some("line 149"));
    }

    #[test]
    fn trade_history_keeps_most_recent_50() {
        let store = store();
        let decision = Decision {
            action: DecisionAction::Buy,
            size_pct: Some(0.1),
            price: None,
            stop_loss: None,
            take_profit: None,
            order_id: None,
            note: None,
        };
        for _ in 0..60 {
            store.push_trade(TradeRecord::new(&decision, None, None));
        }
        assert_eq!(store.trade_history().len(), TRADE_HISTORY_CAPACITY);
    }

    #[test]
    fn onchain_ring_keeps_most_recent_50() {
        let store = store();
        for i in 0..60 {
            store.push_onchain(OnChainEntry::sent(
                DecisionAction::Buy,
                rust_decimal::Decimal::new(1, 2),
                format!("0x{i:x}"),
            ));
        }
        let ring = store.onchain_log();
        assert_eq!(ring.len(), ONCHAIN_CAPACITY);
        assert_eq!(ring[0].tx_hash.as_deref(), Some("0xa"));
    }

    #[test]
    fn reset_bumps_epoch_and_clears_session_state() {
        let store = store();
        store.append_log(LogLine::info("before"));
        store.set_insight("stale thought");
        let mut llm = store.llm_controls();
        llm.auto_trading = true;
        store.set_llm_controls(llm);

        let before = store.epoch();
        store.reset_for(
            Session {
                id: "s-2".to_string(),
                mode: Mode::Live,
            },
            DEFAULT_RETENTION,
        );

        assert_eq!(store.epoch(), before + 1);
        assert!(store.logs().is_empty());
        assert!(store.insight().is_none());
        assert_eq!(store.session().unwrap().id, "s-2");
        // Operator controls are not session state.
        assert!(store.llm_controls().auto_trading);
    }
}
