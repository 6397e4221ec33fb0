//! The poll loop: fetch state, admit it, decide, act, schedule the next
//! iteration
//!
//! One runner drives one session. A session switch bumps the store epoch;
//! a runner that sees the epoch move on discards any in-flight response
//! and stops without writing anything more.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::chain::TransferSigner;
use crate::client::SessionService;
use crate::config::RunnerConfig;
use crate::context::{build_context, render_prompt};
use crate::decision::{validate, DecisionAction};
use crate::dispatch::Dispatcher;
use crate::oracle::{DecisionOracle, OracleError, OracleRequest};
use crate::store::SessionStore;
use crate::types::{LogLine, Mode, Session};

/// What one iteration decided about the loop's future
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue { delay: Duration },
    /// Backtest ran out of candles
    Exhausted,
    /// Stop was requested or the session moved on
    Stopped,
}

/// Cooperative cancellation handle shared with the shutdown path
#[derive(Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct ArenaRunner<S: SessionService, O: DecisionOracle, W: TransferSigner> {
    client: Arc<S>,
    oracle: Arc<O>,
    dispatcher: Dispatcher<S, W>,
    store: Arc<SessionStore>,
    config: RunnerConfig,
    stop: StopToken,
    /// Store epoch captured at construction; moving past it ends the loop
    epoch: u64,
    caught_up: bool,
}

impl<S: SessionService, O: DecisionOracle, W: TransferSigner> ArenaRunner<S, O, W> {
    pub fn new(
        client: Arc<S>,
        oracle: Arc<O>,
        signer: Arc<W>,
        store: Arc<SessionStore>,
        config: RunnerConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&client), signer, Arc::clone(&store));
        let epoch = store.epoch();
        Self {
            client,
            oracle,
            dispatcher,
            store,
            config,
            stop: StopToken::default(),
            epoch,
            caught_up: false,
        }
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    fn is_stale(&self) -> bool {
        self.stop.is_stopped() || self.store.epoch() != self.epoch
    }

    /// Drive the session until exhaustion or stop.
    pub async fn run(mut self) {
        info!("runner started");
        loop {
            match self.run_once().await {
                Outcome::Continue { delay } => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Outcome::Exhausted => {
                    info!("backtest exhausted, runner stopping");
                    break;
                }
                Outcome::Stopped => {
                    info!("runner stopped");
                    break;
                }
            }
        }
    }

    /// One iteration: poll, admit, optionally decide and act.
    pub async fn run_once(&mut self) -> Outcome {
        if self.is_stale() {
            return Outcome::Stopped;
        }
        let Some(session) = self.store.session() else {
            warn!("no session attached, runner stopping");
            return Outcome::Stopped;
        };

        // A live loop that was caught up may have accrued backlog while
        // paused; a batch fetch fast-forwards through it. Otherwise step
        // one candle at a time.
        let steps = if session.mode == Mode::Live && self.caught_up {
            self.config.live_batch
        } else {
            1
        };

        match self.client.fetch_state(&session.id, steps).await {
            Ok(poll) => {
                // The session may have been switched while the fetch was
                // in flight; a stale response must not touch the store.
                if self.is_stale() {
                    return Outcome::Stopped;
                }

                let outcome = self.store.apply_poll(&poll, Instant::now());
                self.caught_up = outcome.caught_up;
                debug!(
                    admitted = outcome.admitted,
                    throttled = outcome.throttled,
                    caught_up = outcome.caught_up,
                    "poll applied"
                );

                if session.mode == Mode::Backtest && !outcome.saw_candle {
                    self.store
                        .append_log(LogLine::info("backtest complete, no more candles"));
                    return Outcome::Exhausted;
                }

                if self.store.llm_controls().auto_trading {
                    self.decide_and_act(&session).await;
                }
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "state fetch failed");
                self.store
                    .append_log(LogLine::error(format!("state fetch failed: {e}")));
            }
        }

        if self.is_stale() {
            return Outcome::Stopped;
        }

        let delay = match session.mode {
            Mode::Backtest => Duration::ZERO,
            Mode::Live => {
                if self.caught_up {
                    self.config.live_poll_interval
                } else {
                    Duration::ZERO
                }
            }
        };
        Outcome::Continue { delay }
    }

    /// Ask the oracle for a decision on the current market and act on it.
    /// Every failure path downgrades to HOLD and logs; the loop itself
    /// never dies to a bad decision.
    async fn decide_and_act(&self, session: &Session) {
        let view = self.store.market_view();
        let context = build_context(&view, self.config.recent_bars);
        let user = match serde_json::to_string(&context) {
            Ok(json) => json,
            Err(e) => {
                self.store
                    .append_log(LogLine::error(format!("context serialization failed: {e}")));
                return;
            }
        };

        let llm = self.store.llm_controls();
        let system = render_prompt(&llm.system_prompt, &view.open_orders);
        let api_key = if llm.api_key.is_empty() {
            None
        } else {
            Some(llm.api_key)
        };
        let request = OracleRequest::new(system, user, llm.model, api_key);

        let raw = match self.oracle.complete(request).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "oracle request failed, holding");
                self.store
                    .append_log(LogLine::error(format!("oracle request failed: {e}")));
                return;
            }
        };
        self.store.set_insight(raw.clone());

        let validated = match validate(&raw, self.config.max_size_pct) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "invalid decision, holding");
                self.store
                    .append_log(LogLine::error(format!("invalid decision, holding: {e}")));
                return;
            }
        };
        if let Some(clamp) = validated.clamp {
            self.store.append_log(LogLine::info(format!(
                "size_pct {} clamped to {}",
                clamp.requested, clamp.applied
            )));
        }
        if validated.dropped_cancel {
            self.store
                .append_log(LogLine::info("cancel without order_id, holding"));
        }

        let decision = validated.decision;
        if decision.action == DecisionAction::Hold {
            debug!("decision is HOLD, nothing to dispatch");
            return;
        }

        let equity = view.wallet.as_ref().map(|w| w.equity);
        if let Err(e) = self
            .dispatcher
            .dispatch(session, &decision, view.last_candle_time, equity)
            .await
        {
            warn!(error = %e, "action dispatch failed");
            self.store
                .append_log(LogLine::error(format!("action dispatch failed: {e}")));
        }
    }

    /// One-shot analysis: same context and prompt as a trading turn, but
    /// nothing is dispatched. The insight lands in the store.
    pub async fn think_once(&self) -> Result<String, OracleError> {
        let view = self.store.market_view();
        let context = build_context(&view, self.config.recent_bars);
        let user = serde_json::to_string(&context)
            .map_err(|e| OracleError::Service(format!("context serialization failed: {e}")))?;

        let llm = self.store.llm_controls();
        let system = render_prompt(&llm.system_prompt, &view.open_orders);
        let api_key = if llm.api_key.is_empty() {
            None
        } else {
            Some(llm.api_key)
        };

        let content = self
            .oracle
            .complete(OracleRequest::new(system, user, llm.model, api_key))
            .await?;
        self.store.set_insight(content.clone());
        self.store.append_log(LogLine::info("analysis updated"));
        Ok(content)
    }
}
