//! Market Ledger - rolling, deduplicated market read model
//!
//! Holds the candle window, the latest wallet snapshot and the open-order
//! list from the most recent poll. Mutated only from inside one loop
//! iteration; the presentation layer reads snapshots.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::types::{Candle, Mode, OpenOrder, StateResponse, Wallet};

/// Minimum wall-clock gap between candle admissions once live polling has
/// caught up to real time; stops redundant re-renders when polls outrun
/// bar closes.
pub const ADMIT_THROTTLE: Duration = Duration::from_millis(200);

/// Default candle retention
pub const DEFAULT_RETENTION: usize = 1000;

/// What one `apply_poll` did, for the controller's scheduling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub admitted: usize,
    pub throttled: usize,
    /// Server-reported backlog has reached zero at some point
    pub caught_up: bool,
    /// The response carried at least one candle
    pub saw_candle: bool,
}

pub struct MarketLedger {
    mode: Mode,
    retention: usize,
    candles: VecDeque<Candle>,
    wallet: Option<Wallet>,
    open_orders: Vec<OpenOrder>,
    caught_up: bool,
    last_admitted_at: Option<Instant>,
}

impl MarketLedger {
    pub fn new(mode: Mode, retention: usize) -> Self {
        Self {
            mode,
            retention,
            candles: VecDeque::new(),
            wallet: None,
            open_orders: Vec::new(),
            caught_up: false,
            last_admitted_at: None,
        }
    }

    /// Drop everything derived from the previous session.
    pub fn reset(&mut self, mode: Mode) {
        self.mode = mode;
        self.candles.clear();
        self.wallet = None;
        self.open_orders.clear();
        self.caught_up = false;
        self.last_admitted_at = None;
    }

    /// Admit one poll response: candles (deduplicated, throttled,
    /// truncated to retention), wallet and open orders (replaced
    /// wholesale when present).
    pub fn apply_poll(&mut self, poll: &StateResponse, now: Instant) -> PollOutcome {
        if let Some(backlog) = poll.backlog_remaining {
            self.caught_up = backlog == 0;
        }

        let mut saw_candle = false;

        // Batch candles first, then the single latest; upstream delivers
        // in non-decreasing time order.
        let incoming = poll.candles.iter().flatten().chain(poll.candle.iter());
        let mut fresh: Vec<&Candle> = Vec::new();
        for candle in incoming {
            saw_candle = true;
            let last_key = fresh
                .last()
                .map(|c| c.key())
                .or_else(|| self.candles.back().map(|c| c.key()));
            if last_key == Some(candle.key()) {
                continue;
            }
            let last_open = fresh
                .last()
                .map(|c| c.open_time)
                .or_else(|| self.candles.back().map(|c| c.open_time));
            if last_open.is_some_and(|open| candle.open_time < open) {
                continue;
            }
            fresh.push(candle);
        }

        // The throttle suppresses the rapid-fire single-bar updates a
        // caught-up live poll produces. A batch of distinct bars is a
        // backlog drain; dropping any of it would leave a permanent gap
        // since polls deliver each bar at most once.
        let mut throttled = 0;
        if self.mode == Mode::Live && self.caught_up && fresh.len() == 1 {
            if let Some(at) = self.last_admitted_at {
                if now.duration_since(at) < ADMIT_THROTTLE {
                    throttled = 1;
                    fresh.clear();
                }
            }
        }

        let admitted = fresh.len();
        if admitted > 0 {
            for candle in fresh {
                self.candles.push_back(candle.clone());
            }
            self.last_admitted_at = Some(now);
        }

        while self.candles.len() > self.retention {
            self.candles.pop_front();
        }

        if let Some(wallet) = &poll.wallet {
            self.wallet = Some(wallet.clone());
        }
        if let Some(orders) = &poll.open_orders {
            self.open_orders = orders
                .iter()
                .cloned()
                .filter_map(|o| o.into_open_order())
                .collect();
        }

        PollOutcome {
            admitted,
            throttled,
            caught_up: self.caught_up,
            saw_candle,
        }
    }

    pub fn candles(&self) -> &VecDeque<Candle> {
        &self.candles
    }

    /// Last admitted close
    pub fn price(&self) -> Option<f64> {
        self.candles.back().map(|c| c.close)
    }

    pub fn last_candle(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn wallet(&self) -> Option<&Wallet> {
        self.wallet.as_ref()
    }

    pub fn open_orders(&self) -> &[OpenOrder] {
        &self.open_orders
    }

    /// Time range of the held candles
    pub fn data_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.candles.front(), self.candles.back()) {
            (Some(first), Some(last)) => Some((first.open_time, last.close_time)),
            _ => None,
        }
    }
}
