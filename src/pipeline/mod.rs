pub mod admission;
pub mod cache;
pub mod engine;
pub mod features;
pub mod scorer;
pub mod signature;
pub mod static_rules;

pub use admission::*;
pub use cache::*;
pub use engine::*;
pub use features::*;
pub use scorer::*;
pub use signature::*;
pub use static_rules::*;

use serde::{Deserialize, Serialize};

/// Risk classification level, ordered from benign to hostile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Medium-or-high risk terminates the request.
    pub fn blocks(self) -> bool {
        self >= RiskLevel::Medium
    }
}

/// Result of classifying one request: a risk level plus the scorer's
/// confidence in it.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub level: RiskLevel,
    pub score: f64,
}

/// Two verdicts are interchangeable for cache purposes when their levels
/// agree, whatever the exact scores.
impl PartialEq for Verdict {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level
    }
}

/// Origin of a terminal decision, written into audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    StaticRule,
    RateLimited,
    AiCache,
    AiModel,
    AiErrorFailOpen,
    AiErrorFailClose,
    InternalFault,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::StaticRule => "STATIC_RULE",
            ReasonCode::RateLimited => "RATE_LIMITED",
            ReasonCode::AiCache => "AI_CACHE",
            ReasonCode::AiModel => "AI_MODEL",
            ReasonCode::AiErrorFailOpen => "AI_ERROR_FAILOPEN",
            ReasonCode::AiErrorFailClose => "AI_ERROR_FAILCLOSE",
            ReasonCode::InternalFault => "INTERNAL_FAULT",
        }
    }
}

/// Terminal outcome for one request. `Allow` means "continue to the next
/// handler"; `Block` carries the HTTP status the host should answer with.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow,
    Block { status: u16, reason: ReasonCode },
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Decision::Allow => None,
            Decision::Block { status, .. } => Some(*status),
        }
    }

    /// Generic client-facing error message for blocked requests. The host
    /// puts this in its response body; the status code is what matters.
    pub fn client_message(&self) -> Option<&'static str> {
        match self {
            Decision::Allow => None,
            Decision::Block { reason, .. } => Some(match reason {
                ReasonCode::StaticRule => "Blocked by MicroShield (static rule)",
                ReasonCode::RateLimited => "Too many requests",
                ReasonCode::AiCache => "Blocked by MicroShield (AI - cached)",
                ReasonCode::AiModel => "Blocked by MicroShield (AI detection)",
                ReasonCode::AiErrorFailClose => "Security engine unavailable",
                _ => "Request blocked",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }

    #[test]
    fn test_medium_and_high_block() {
        assert!(!RiskLevel::Low.blocks());
        assert!(RiskLevel::Medium.blocks());
        assert!(RiskLevel::High.blocks());
    }

    #[test]
    fn test_verdict_equality_ignores_score() {
        let a = Verdict {
            level: RiskLevel::Low,
            score: 0.1,
        };
        let b = Verdict {
            level: RiskLevel::Low,
            score: 0.4,
        };
        let c = Verdict {
            level: RiskLevel::High,
            score: 0.4,
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_decision_status() {
        assert_eq!(Decision::Allow.status(), None);
        let blocked = Decision::Block {
            status: 403,
            reason: ReasonCode::StaticRule,
        };
        assert_eq!(blocked.status(), Some(403));
        assert!(!blocked.is_allow());
    }

    #[test]
    fn test_client_message_only_for_blocks() {
        assert_eq!(Decision::Allow.client_message(), None);
        let blocked = Decision::Block {
            status: 503,
            reason: ReasonCode::AiErrorFailClose,
        };
        assert_eq!(blocked.client_message(), Some("Security engine unavailable"));
    }

    #[test]
    fn test_risk_level_wire_names() {
        let level: RiskLevel = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(level, RiskLevel::Medium);
        assert!(serde_json::from_str::<RiskLevel>("\"critical\"").is_err());
    }
}
