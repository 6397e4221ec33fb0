//! Cross-module tests for the store and ledger working together

use std::time::Instant;

use chrono::{TimeZone, Utc};

use crate::store::SessionStore;
use crate::types::{Candle, LogLine, Mode, Session, StateResponse, Wallet};

fn candle(minute: i64) -> Candle {
    let open_time = Utc.timestamp_millis_opt(minute * 60_000).single().unwrap();
    let close_time = Utc
        .timestamp_millis_opt((minute + 1) * 60_000 - 1)
        .single()
        .unwrap();
    Candle {
        open_time,
        close_time,
        open: 100.0,
        high: 101.0,
        low: 99.0,
        close: 100.5 + minute as f64,
        volume: 1.0,
    }
}

fn session(id: &str, mode: Mode) -> Session {
    Session {
        id: id.to_string(),
        mode,
    }
}

#[test]
fn market_view_reflects_admitted_state() {
    let store = SessionStore::default();
    store.reset_for(session("s-1", Mode::Backtest), 1000);

    let poll = StateResponse {
        candles: Some(vec![candle(0), candle(1)]),
        wallet: Some(Wallet {
            cash: 9_000.0,
            position_qty: 0.1,
            position_avg_price: 100.0,
            equity: 10_010.0,
            max_drawdown: 0.01,
        }),
        ..Default::default()
    };
    store.apply_poll(&poll, Instant::now());

    let view = store.market_view();
    assert_eq!(view.candles.len(), 2);
    assert_eq!(view.price, Some(candle(1).close));
    assert_eq!(view.wallet.unwrap().equity, 10_010.0);
    assert_eq!(view.last_candle_time, Some(candle(1).close_time));
}

#[test]
fn session_switch_does_not_leak_market_state() {
    let store = SessionStore::default();
    store.reset_for(session("s-a", Mode::Backtest), 1000);

    let poll = StateResponse {
        candles: Some(vec![candle(0), candle(1), candle(2)]),
        ..Default::default()
    };
    store.apply_poll(&poll, Instant::now());
    store.append_log(LogLine::info("from session a"));
    assert_eq!(store.market_view().candles.len(), 3);

    store.reset_for(session("s-b", Mode::Live), 1000);
    let view = store.market_view();
    assert!(view.candles.is_empty());
    assert!(view.price.is_none());
    assert!(store.logs().is_empty());
}

#[test]
fn reapplying_a_poll_through_the_store_stays_idempotent() {
    let store = SessionStore::default();
    store.reset_for(session("s-1", Mode::Backtest), 1000);

    let poll = StateResponse {
        candles: Some(vec![candle(0), candle(1)]),
        ..Default::default()
    };
    let now = Instant::now();
    assert_eq!(store.apply_poll(&poll, now).admitted, 2);
    assert_eq!(store.apply_poll(&poll, now).admitted, 0);
    assert_eq!(store.market_view().candles.len(), 2);
}
