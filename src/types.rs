//! Core types shared between the session-service wire and the runner
//!
//! These types define the contract between the runner and the gym
//! session service, plus the records surfaced to the presentation layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::{Decision, DecisionAction};

/// Session mode, fixed for the session's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Backtest,
    Live,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Backtest => write!(f, "backtest"),
            Mode::Live => write!(f, "live"),
        }
    }
}

/// Identity of the attached run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub mode: Mode,
}

/// OHLCV bar for a fixed interval, identified by (open_time, close_time)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn key(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.open_time, self.close_time)
    }
}

/// Account snapshot, replaced wholesale on every poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub cash: f64,
    pub position_qty: f64,
    pub position_avg_price: f64,
    pub equity: f64,
    pub max_drawdown: f64,
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// Open order as held by the ledger and shown to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenOrder {
    pub id: String,
    pub side: Side,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    pub price: f64,
    pub size: f64,
    /// Creation time, ms since epoch
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
}

/// Open order as delivered by the session service
#[derive(Debug, Clone, Deserialize)]
pub struct WireOrder {
    pub id: String,
    pub side: String,
    #[serde(default, rename = "type")]
    pub order_type: Option<OrderType>,
    pub price: f64,
    pub quantity: f64,
    pub created_at: i64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
}

impl WireOrder {
    /// Map the wire shape onto the ledger shape; orders with an
    /// unrecognized side are dropped rather than guessed at.
    pub fn into_open_order(self) -> Option<OpenOrder> {
        let side = match self.side.to_uppercase().as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            other => {
                tracing::warn!(order_id = %self.id, side = %other, "dropping order with unknown side");
                return None;
            }
        };
        Some(OpenOrder {
            id: self.id,
            side,
            order_type: self.order_type,
            price: self.price,
            size: self.quantity,
            timestamp: self.created_at,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
        })
    }
}

/// One poll response from `GET state/{session_id}?steps=N`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateResponse {
    pub candle: Option<Candle>,
    pub candles: Option<Vec<Candle>>,
    pub wallet: Option<Wallet>,
    pub open_orders: Option<Vec<WireOrder>>,
    pub backlog_remaining: Option<u64>,
    pub error: Option<String>,
}

impl StateResponse {
    /// Absence of any candle signals backtest exhaustion or a live gap.
    pub fn has_candle(&self) -> bool {
        self.candle.is_some() || self.candles.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// `POST session` request body
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub mode: Mode,
    pub symbol: String,
    pub initial_cash: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,
}

/// `POST action/{session_id}` request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRequest {
    pub action: String,
    pub size_pct: f64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub order_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

/// Log line classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Trade,
    Error,
}

/// One append-only log line; the sink keeps the most recent 100
#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(rename = "type")]
    pub kind: LogKind,
}

impl LogLine {
    pub fn info(thought: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            thought: Some(thought.into()),
            action: None,
            kind: LogKind::Info,
        }
    }

    pub fn error(thought: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            thought: Some(thought.into()),
            action: None,
            kind: LogKind::Error,
        }
    }

    pub fn trade(thought: Option<String>, action: DecisionAction) -> Self {
        Self {
            time: Utc::now(),
            thought,
            action: Some(action.to_string()),
            kind: LogKind::Trade,
        }
    }
}

/// Outcome of an on-chain transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnChainStatus {
    Sent,
    Failed,
}

/// Record of one on-chain mirror attempt; kept in its own bounded ring,
/// never merged with the main log
#[derive(Debug, Clone, Serialize)]
pub struct OnChainEntry {
    pub time: DateTime<Utc>,
    pub action: String,
    pub amount: Decimal,
    #[serde(rename = "txHash", skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub status: OnChainStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl OnChainEntry {
    pub fn sent(action: DecisionAction, amount: Decimal, tx_hash: String) -> Self {
        Self {
            time: Utc::now(),
            action: action.to_string(),
            amount,
            tx_hash: Some(tx_hash),
            status: OnChainStatus::Sent,
            note: None,
        }
    }

    pub fn failed(action: DecisionAction, amount: Decimal, note: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            action: action.to_string(),
            amount,
            tx_hash: None,
            status: OnChainStatus::Failed,
            note: Some(note.into()),
        }
    }
}

/// Dispatched non-HOLD decision, tagged with the candle time and equity
/// at dispatch for audit/chart markers; most recent 50 kept
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub action: DecisionAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candle_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity: Option<f64>,
}

impl TradeRecord {
    pub fn new(
        decision: &Decision,
        candle_time: Option<DateTime<Utc>>,
        equity: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            time: Utc::now(),
            action: decision.action,
            size_pct: decision.size_pct,
            price: decision.price,
            note: decision.note.clone(),
            candle_time,
            equity,
        }
    }
}
