//! Runner configuration, sourced from the environment
//!
//! Everything has a workable localhost default so `cargo run` against a
//! local gym works with no setup beyond an LLM API key.

use std::env;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::decision::MAX_SIZE_PCT;
use crate::ledger::DEFAULT_RETENTION;
use crate::types::{CreateSessionRequest, Mode};

/// Bars handed to the model per decision
pub const DEFAULT_RECENT_BARS: usize = 200;
/// Candles pulled per poll while a live session drains its backlog
pub const DEFAULT_LIVE_BATCH: u32 = 50;
/// Poll cadence once a live session is caught up
pub const DEFAULT_LIVE_POLL_INTERVAL: Duration = Duration::from_millis(1000);
/// Preloaded history window for live sessions
pub const DEFAULT_WINDOW: usize = 500;

/// Burn address used when no transfer destination is configured
const DEAD_ADDRESS: &str = "0x000000000000000000000000000000000000dEaD";

/// Operator-tunable LLM settings, mutable mid-session
#[derive(Debug, Clone)]
pub struct LlmControls {
    pub system_prompt: String,
    pub model: String,
    pub api_key: String,
    pub auto_trading: bool,
}

impl Default for LlmControls {
    fn default() -> Self {
        Self {
            system_prompt: "You are a cautious trader.".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: String::new(),
            auto_trading: false,
        }
    }
}

/// Operator-tunable on-chain mirroring settings
#[derive(Debug, Clone)]
pub struct ChainControls {
    pub wallet: Option<String>,
    pub auto_send: bool,
    pub destination_buy: String,
    pub destination_sell: String,
    pub amount: Decimal,
}

impl Default for ChainControls {
    fn default() -> Self {
        Self {
            wallet: None,
            auto_send: false,
            destination_buy: DEAD_ADDRESS.to_string(),
            destination_sell: DEAD_ADDRESS.to_string(),
            // 0.01 of the native token per mirrored trade
            amount: Decimal::new(1, 2),
        }
    }
}

/// What session to create when none is attached
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub mode: Mode,
    pub symbol: String,
    pub initial_cash: f64,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub window: usize,
}

impl SessionSpec {
    pub fn to_request(&self) -> CreateSessionRequest {
        // A backtest with an explicit range replays it; otherwise the
        // service seeds from the trailing window. Live sessions always
        // preload the window.
        let ranged = self.start_ms.is_some() && self.end_ms.is_some();
        CreateSessionRequest {
            mode: self.mode,
            symbol: self.symbol.clone(),
            initial_cash: self.initial_cash,
            start_ms: if ranged { self.start_ms } else { None },
            end_ms: if ranged { self.end_ms } else { None },
            window: if !ranged || self.mode == Mode::Live {
                Some(self.window)
            } else {
                None
            },
        }
    }
}

impl Default for SessionSpec {
    fn default() -> Self {
        Self {
            mode: Mode::Backtest,
            symbol: "BTCUSDT".to_string(),
            initial_cash: 10_000.0,
            start_ms: None,
            end_ms: None,
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub gym_url: String,
    pub oracle_url: String,
    pub chain_url: String,
    /// Attach to this session instead of creating one
    pub session_id: Option<String>,
    pub spec: SessionSpec,
    pub retention: usize,
    pub recent_bars: usize,
    pub live_batch: u32,
    pub live_poll_interval: Duration,
    pub max_size_pct: f64,
    pub llm: LlmControls,
    pub chain: ChainControls,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            gym_url: "http://localhost:3001".to_string(),
            oracle_url: "http://localhost:3000/api/llm".to_string(),
            chain_url: "http://localhost:3000/api".to_string(),
            session_id: None,
            spec: SessionSpec::default(),
            retention: DEFAULT_RETENTION,
            recent_bars: DEFAULT_RECENT_BARS,
            live_batch: DEFAULT_LIVE_BATCH,
            live_poll_interval: DEFAULT_LIVE_POLL_INTERVAL,
            max_size_pct: MAX_SIZE_PCT,
            llm: LlmControls::default(),
            chain: ChainControls::default(),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mode = match env_string("MODE", "backtest").to_lowercase().as_str() {
            "live" => Mode::Live,
            _ => Mode::Backtest,
        };

        let spec = SessionSpec {
            mode,
            symbol: env_string("SYMBOL", "BTCUSDT"),
            initial_cash: env_parse("INITIAL_CASH", 10_000.0),
            start_ms: env_opt("START_MS").and_then(|v| v.parse().ok()),
            end_ms: env_opt("END_MS").and_then(|v| v.parse().ok()),
            window: env_parse("WINDOW", DEFAULT_WINDOW),
        };

        let llm = LlmControls {
            system_prompt: env_string("SYSTEM_PROMPT", &defaults.llm.system_prompt),
            model: env_string("LLM_MODEL", &defaults.llm.model),
            api_key: env_string("LLM_API_KEY", ""),
            auto_trading: env_bool("AUTO_TRADING", false),
        };

        let chain = ChainControls {
            wallet: env_opt("CHAIN_WALLET"),
            auto_send: env_bool("AUTO_SEND_ONCHAIN", false),
            destination_buy: env_string("DEST_BUY", DEAD_ADDRESS),
            destination_sell: env_string("DEST_SELL", DEAD_ADDRESS),
            amount: env_opt("ONCHAIN_AMOUNT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.chain.amount),
        };

        Self {
            gym_url: env_string("GYM_URL", &defaults.gym_url),
            oracle_url: env_string("ORACLE_URL", &defaults.oracle_url),
            chain_url: env_string("CHAIN_URL", &defaults.chain_url),
            session_id: env_opt("SESSION_ID"),
            spec,
            retention: env_parse("RETENTION", DEFAULT_RETENTION),
            recent_bars: env_parse("RECENT_BARS", DEFAULT_RECENT_BARS),
            live_batch: env_parse("LIVE_BATCH", DEFAULT_LIVE_BATCH),
            live_poll_interval: defaults.live_poll_interval,
            max_size_pct: MAX_SIZE_PCT,
            llm,
            chain,
        }
    }
}
