//! Action dispatch: validated decision to gym wire format, plus the
//! best-effort on-chain mirror
//!
//! The gym wire has no CANCEL verb; a cancel rides a HOLD action carrying
//! the order id. The on-chain transfer is spawned off the loop so a slow
//! or failing signer never delays the next poll.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::chain::{TransferRequest, TransferSigner};
use crate::client::{ClientError, SessionService};
use crate::decision::{Decision, DecisionAction};
use crate::store::SessionStore;
use crate::types::{ActionRequest, LogLine, OnChainEntry, Session, TradeRecord};

pub struct Dispatcher<S: SessionService, W: TransferSigner> {
    client: Arc<S>,
    signer: Arc<W>,
    store: Arc<SessionStore>,
}

fn to_wire(decision: &Decision) -> ActionRequest {
    match decision.action {
        DecisionAction::Cancel => ActionRequest {
            action: "HOLD".to_string(),
            size_pct: 0.0,
            order_type: None,
            price: None,
            stop_loss: None,
            take_profit: None,
            order_id: decision.order_id.clone(),
        },
        DecisionAction::Limit => ActionRequest {
            action: "LIMIT".to_string(),
            size_pct: decision.size_pct.unwrap_or(0.0),
            order_type: Some("LIMIT".to_string()),
            price: decision.price,
            stop_loss: decision.stop_loss,
            take_profit: decision.take_profit,
            order_id: None,
        },
        action => ActionRequest {
            action: action.to_string(),
            size_pct: decision.size_pct.unwrap_or(0.0),
            order_type: None,
            price: None,
            stop_loss: None,
            take_profit: None,
            order_id: None,
        },
    }
}

impl<S: SessionService, W: TransferSigner> Dispatcher<S, W> {
    pub fn new(client: Arc<S>, signer: Arc<W>, store: Arc<SessionStore>) -> Self {
        Self {
            client,
            signer,
            store,
        }
    }

    /// Submit a non-HOLD decision to the gym; on success record it and
    /// kick off the on-chain mirror for BUY/SELL.
    pub async fn dispatch(
        &self,
        session: &Session,
        decision: &Decision,
        candle_time: Option<DateTime<Utc>>,
        equity: Option<f64>,
    ) -> Result<(), ClientError> {
        let wire = to_wire(decision);
        self.client.submit_action(&session.id, &wire).await?;

        self.store
            .append_log(LogLine::trade(decision.note.clone(), decision.action));
        self.store
            .push_trade(TradeRecord::new(decision, candle_time, equity));
        debug!(session_id = %session.id, action = %decision.action, "decision dispatched");

        if matches!(decision.action, DecisionAction::Buy | DecisionAction::Sell) {
            self.mirror(decision.action);
        }
        Ok(())
    }

    /// Fire-and-forget transfer mirroring the trade direction. The result
    /// lands in the on-chain ring; trading state is never touched.
    fn mirror(&self, action: DecisionAction) {
        let controls = self.store.chain_controls();
        if !controls.auto_send {
            return;
        }

        let to = match action {
            DecisionAction::Buy => controls.destination_buy.clone(),
            _ => controls.destination_sell.clone(),
        };
        let amount = controls.amount;
        let request = TransferRequest::new(action.to_string(), to, amount, controls.wallet.clone());

        let signer = Arc::clone(&self.signer);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match signer.send_transfer(request).await {
                Ok(receipt) => {
                    store.push_onchain(OnChainEntry::sent(action, amount, receipt.tx_hash));
                }
                Err(e) => {
                    warn!(%action, error = %e, "on-chain mirror failed");
                    store.push_onchain(OnChainEntry::failed(action, amount, e.to_string()));
                    store.append_log(LogLine::error(format!("on-chain transfer failed: {e}")));
                }
            }
        });
    }
}
