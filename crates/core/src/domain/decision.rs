use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::hypothesis::RootCause;
use crate::domain::metrics::WindowId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Reroute,
    RetryPolicy,
    Suppress,
    NoOp,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reroute => "reroute",
            Self::RetryPolicy => "retry_policy",
            Self::Suppress => "suppress",
            Self::NoOp => "no_op",
        }
    }

    /// Fixed tie-break order for candidate selection: reroute wins over
    /// retry_policy wins over suppress wins over no_op.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Reroute => 0,
            Self::RetryPolicy => 1,
            Self::Suppress => 2,
            Self::NoOp => 3,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "id")]
pub enum ActionTarget {
    Issuer(String),
    Merchant(String),
    Gateway,
}

impl ActionTarget {
    /// Blast radius rank: single-issuer and single-merchant actions are
    /// narrower than a gateway-wide one.
    pub fn breadth(&self) -> u8 {
        match self {
            Self::Issuer(_) | Self::Merchant(_) => 0,
            Self::Gateway => 1,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Issuer(name) => format!("issuer:{name}"),
            Self::Merchant(name) => format!("merchant:{name}"),
            Self::Gateway => "gateway".to_string(),
        }
    }
}

impl std::fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: ActionKind,
    pub target: Option<ActionTarget>,
    pub cause: RootCause,
    pub confidence: f64,
    pub risk: f64,
    pub requires_human_approval: bool,
    pub approval_reason: Option<String>,
    pub rationale: String,
    pub window: WindowId,
    pub decided_at: DateTime<Utc>,
}

impl Decision {
    pub fn target_label(&self) -> String {
        self.target
            .as_ref()
            .map(ActionTarget::label)
            .unwrap_or_else(|| "-".to_string())
    }
}
