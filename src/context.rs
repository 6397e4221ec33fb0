//! Decision-context assembly and prompt rendering
//!
//! The model sees a bounded JSON snapshot of the market, never the full
//! ledger. Timestamps go out as epoch milliseconds.

use serde::Serialize;

use crate::store::MarketView;
use crate::types::{OpenOrder, Wallet};

/// Placeholder in the operator prompt replaced with the open-order list
const OPEN_ORDERS_SLOT: &str = "{{open_orders}}";

/// Flat OHLCV record in the shape the model is prompted with
#[derive(Debug, Clone, Serialize)]
pub struct BarRecord {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataWindow {
    pub start: i64,
    pub end: i64,
}

/// JSON payload sent to the oracle as the user message
#[derive(Debug, Clone, Serialize)]
pub struct DecisionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<Wallet>,
    pub open_orders: Vec<OpenOrder>,
    pub recent_bars: Vec<BarRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_window: Option<DataWindow>,
}

/// Snapshot the market view down to the most recent `recent_bars` bars.
pub fn build_context(view: &MarketView, recent_bars: usize) -> DecisionContext {
    let skip = view.candles.len().saturating_sub(recent_bars);
    let bars = view.candles[skip..]
        .iter()
        .map(|c| BarRecord {
            open_time: c.open_time.timestamp_millis(),
            close_time: c.close_time.timestamp_millis(),
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
        })
        .collect();

    DecisionContext {
        price: view.price,
        wallet: view.wallet.clone(),
        open_orders: view.open_orders.clone(),
        recent_bars: bars,
        data_window: view.data_window.map(|(start, end)| DataWindow {
            start: start.timestamp_millis(),
            end: end.timestamp_millis(),
        }),
    }
}

/// Substitute the open-order list into the operator's system prompt.
pub fn render_prompt(template: &str, open_orders: &[OpenOrder]) -> String {
    if !template.contains(OPEN_ORDERS_SLOT) {
        return template.to_string();
    }
    let rendered =
        serde_json::to_string(open_orders).unwrap_or_else(|_| "[]".to_string());
    template.replace(OPEN_ORDERS_SLOT, &rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candle, Side};
    use chrono::{TimeZone, Utc};

    fn view_with_candles(count: i64) -> MarketView {
        let candles: Vec<Candle> = (0..count)
            .map(|minute| {
                let open_time = Utc.timestamp_millis_opt(minute * 60_000).single().unwrap();
                let close_time = Utc
                    .timestamp_millis_opt((minute + 1) * 60_000 - 1)
                    .single()
                    .unwrap();
                Candle {
                    open_time,
                    close_time,
                    open: 1.0,
                    high: 2.0,
                    low: 0.5,
                    close: 1.5,
                    volume: 10.0,
                }
            })
            .collect();
        MarketView {
            price: candles.last().map(|c| c.close),
            wallet: None,
            open_orders: vec![],
            last_candle_time: candles.last().map(|c| c.close_time),
            data_window: candles
                .first()
                .zip(candles.last())
                .map(|(f, l)| (f.open_time, l.close_time)),
            candles,
        }
    }

    #[test]
    fn context_is_bounded_to_recent_bars() {
        let view = view_with_candles(300);
        let ctx = build_context(&view, 200);
        assert_eq!(ctx.recent_bars.len(), 200);
        // Keeps the newest, drops the oldest.
        assert_eq!(ctx.recent_bars[0].open_time, 100 * 60_000);
        assert_eq!(ctx.recent_bars[199].open_time, 299 * 60_000);
    }

    #[test]
    fn short_history_is_passed_whole() {
        let view = view_with_candles(5);
        let ctx = build_context(&view, 200);
        assert_eq!(ctx.recent_bars.len(), 5);
    }

    #[test]
    fn data_window_spans_the_held_range() {
        let view = view_with_candles(10);
        let ctx = build_context(&view, 200);
        let window = ctx.data_window.unwrap();
        assert_eq!(window.start, 0);
        assert_eq!(window.end, 10 * 60_000 - 1);
    }

    #[test]
    fn prompt_substitution_inlines_open_orders() {
        let orders = vec![OpenOrder {
            id: "o-1".to_string(),
            side: Side::Buy,
            order_type: None,
            price: 100.0,
            size: 0.5,
            timestamp: 0,
            stop_loss: None,
            take_profit: None,
        }];
        let rendered = render_prompt("Orders: {{open_orders}}", &orders);
        assert!(rendered.contains("\"o-1\""));
        assert!(rendered.contains("\"BUY\""));
        assert!(!rendered.contains("{{open_orders}}"));
    }

    #[test]
    fn prompt_without_slot_is_unchanged() {
        let rendered = render_prompt("Just trade well.", &[]);
        assert_eq!(rendered, "Just trade well.");
    }
}
