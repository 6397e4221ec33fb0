//! Decision parsing, validation and clamping
//!
//! The oracle is an untrusted free-text generator; everything it returns
//! passes through `validate` before it can reach the dispatcher.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position-size ceiling as a fraction of equity. Oversized decisions are
/// clamped to this value, never rejected.
pub const MAX_SIZE_PCT: f64 = 0.2;

/// Canonical decision actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionAction {
    Buy,
    Sell,
    Hold,
    Limit,
    Cancel,
}

impl std::fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionAction::Buy => write!(f, "BUY"),
            DecisionAction::Sell => write!(f, "SELL"),
            DecisionAction::Hold => write!(f, "HOLD"),
            DecisionAction::Limit => write!(f, "LIMIT"),
            DecisionAction::Cancel => write!(f, "CANCEL"),
        }
    }
}

/// A validated, bounds-checked decision
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub action: DecisionAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Decision {
    pub fn hold() -> Self {
        Self {
            action: DecisionAction::Hold,
            size_pct: None,
            price: None,
            stop_loss: None,
            take_profit: None,
            order_id: None,
            note: None,
        }
    }
}

/// Oracle output as deserialized, before any checking
#[derive(Debug, Default, Deserialize)]
struct RawDecision {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    size_pct: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    stop_loss: Option<f64>,
    #[serde(default)]
    take_profit: Option<f64>,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("decision is not a JSON object: {0}")]
    Parse(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("limit decision requires price and size_pct")]
    InvalidLimitPayload,
}

/// Applied size_pct clamp, reported so the caller can log it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clamp {
    pub requested: f64,
    pub applied: f64,
}

/// Validation output: the decision plus what was adjusted on the way
#[derive(Debug, Clone)]
pub struct ValidatedDecision {
    pub decision: Decision,
    pub clamp: Option<Clamp>,
    /// CANCEL arrived without an order_id and was downgraded to HOLD
    pub dropped_cancel: bool,
}

/// Parse and bound raw oracle text against the decision schema.
///
/// Checks run in order: JSON-object parse, action membership, LIMIT
/// payload completeness, size_pct bound to [0, ceiling], CANCEL
/// order_id presence.
/// `stop_loss`/`take_profit` are optional even on LIMIT.
pub fn validate(raw: &str, max_size_pct: f64) -> Result<ValidatedDecision, DecisionError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| DecisionError::Parse(e.to_string()))?;
    if !value.is_object() {
        return Err(DecisionError::Parse("expected a JSON object".to_string()));
    }
    let raw: RawDecision =
        serde_json::from_value(value).map_err(|e| DecisionError::Parse(e.to_string()))?;

    let action_text = raw.action.unwrap_or_default().trim().to_uppercase();
    let action = match action_text.as_str() {
        "BUY" => DecisionAction::Buy,
        "SELL" => DecisionAction::Sell,
        "HOLD" => DecisionAction::Hold,
        "LIMIT" => DecisionAction::Limit,
        "CANCEL" => DecisionAction::Cancel,
        "" => return Err(DecisionError::UnknownAction("(missing)".to_string())),
        other => return Err(DecisionError::UnknownAction(other.to_string())),
    };

    if action == DecisionAction::Limit && (raw.price.is_none() || raw.size_pct.is_none()) {
        return Err(DecisionError::InvalidLimitPayload);
    }

    let mut clamp = None;
    let size_pct = raw.size_pct.map(|requested| {
        let applied = requested.clamp(0.0, max_size_pct);
        if applied != requested {
            clamp = Some(Clamp { requested, applied });
        }
        applied
    });

    let mut dropped_cancel = false;
    let action = if action == DecisionAction::Cancel && raw.order_id.is_none() {
        dropped_cancel = true;
        DecisionAction::Hold
    } else {
        action
    };

    Ok(ValidatedDecision {
        decision: Decision {
            action,
            size_pct,
            price: raw.price,
            stop_loss: raw.stop_loss,
            take_profit: raw.take_profit,
            order_id: raw.order_id,
            note: raw.note,
        },
        clamp,
        dropped_cancel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_json() {
        let err = validate("{not json", MAX_SIZE_PCT).unwrap_err();
        assert!(matches!(err, DecisionError::Parse(_)));
    }

    #[test]
    fn rejects_non_object() {
        let err = validate("[1, 2]", MAX_SIZE_PCT).unwrap_err();
        assert!(matches!(err, DecisionError::Parse(_)));

        let err = validate("\"BUY\"", MAX_SIZE_PCT).unwrap_err();
        assert!(matches!(err, DecisionError::Parse(_)));
    }

    #[test]
    fn rejects_unknown_action() {
        let err = validate(r#"{"action":"FOO"}"#, MAX_SIZE_PCT).unwrap_err();
        assert!(matches!(err, DecisionError::UnknownAction(a) if a == "FOO"));

        let err = validate(r#"{"note":"no action"}"#, MAX_SIZE_PCT).unwrap_err();
        assert!(matches!(err, DecisionError::UnknownAction(_)));
    }

    #[test]
    fn action_is_case_insensitive() {
        let v = validate(r#"{"action":"buy","size_pct":0.1}"#, MAX_SIZE_PCT).unwrap();
        assert_eq!(v.decision.action, DecisionAction::Buy);
    }

    #[test]
    fn clamp_law() {
        // Above the ceiling: clamped, and the clamp is reported.
        let v = validate(r#"{"action":"BUY","size_pct":0.5}"#, MAX_SIZE_PCT).unwrap();
        assert_eq!(v.decision.size_pct, Some(MAX_SIZE_PCT));
        let clamp = v.clamp.expect("clamp note");
        assert_eq!(clamp.requested, 0.5);
        assert_eq!(clamp.applied, MAX_SIZE_PCT);

        // At or below the ceiling: unchanged, no note.
        let v = validate(r#"{"action":"BUY","size_pct":0.2}"#, MAX_SIZE_PCT).unwrap();
        assert_eq!(v.decision.size_pct, Some(0.2));
        assert!(v.clamp.is_none());

        let v = validate(r#"{"action":"SELL","size_pct":0.05}"#, MAX_SIZE_PCT).unwrap();
        assert_eq!(v.decision.size_pct, Some(0.05));
        assert!(v.clamp.is_none());
    }

    #[test]
    fn negative_size_pct_is_floored_at_zero() {
        let v = validate(r#"{"action":"SELL","size_pct":-0.3}"#, MAX_SIZE_PCT).unwrap();
        assert_eq!(v.decision.size_pct, Some(0.0));
        let clamp = v.clamp.expect("clamp note");
        assert_eq!(clamp.requested, -0.3);
        assert_eq!(clamp.applied, 0.0);
    }

    #[test]
    fn limit_requires_price_and_size() {
        let err = validate(r#"{"action":"LIMIT","size_pct":0.1}"#, MAX_SIZE_PCT).unwrap_err();
        assert!(matches!(err, DecisionError::InvalidLimitPayload));

        let err = validate(r#"{"action":"LIMIT","price":100.0}"#, MAX_SIZE_PCT).unwrap_err();
        assert!(matches!(err, DecisionError::InvalidLimitPayload));
    }

    #[test]
    fn limit_stop_loss_and_take_profit_are_optional() {
        let v = validate(
            r#"{"action":"LIMIT","price":100.0,"size_pct":0.1}"#,
            MAX_SIZE_PCT,
        )
        .unwrap();
        assert_eq!(v.decision.action, DecisionAction::Limit);
        assert!(v.decision.stop_loss.is_none());
        assert!(v.decision.take_profit.is_none());
    }

    #[test]
    fn cancel_without_order_id_becomes_hold() {
        let v = validate(r#"{"action":"CANCEL"}"#, MAX_SIZE_PCT).unwrap();
        assert_eq!(v.decision.action, DecisionAction::Hold);
        assert!(v.dropped_cancel);

        let v = validate(r#"{"action":"CANCEL","order_id":"o-1"}"#, MAX_SIZE_PCT).unwrap();
        assert_eq!(v.decision.action, DecisionAction::Cancel);
        assert!(!v.dropped_cancel);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let v = validate(
            r#"{"action":"HOLD","confidence":0.9,"reasoning":"flat market"}"#,
            MAX_SIZE_PCT,
        )
        .unwrap();
        assert_eq!(v.decision.action, DecisionAction::Hold);
    }
}
