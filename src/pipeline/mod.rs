pub mod redact;
pub mod gateway;
pub mod classify;
pub mod synthesis;
pub mod rehydrate;
pub mod terminology;
pub mod explain;
pub mod orchestrator;

use std::fmt;

use crate::pipeline::classify::DischargeDecision;
use crate::pipeline::gateway::GatewayError;

/// Pipeline stage labels, used in error context and audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Redaction,
    Classification,
    Drafting,
    Rehydration,
    Explanation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Redaction => "redaction",
            Stage::Classification => "classification",
            Stage::Drafting => "drafting",
            Stage::Rehydration => "rehydration",
            Stage::Explanation => "explanation",
        };
        f.write_str(s)
    }
}

/// Errors that abort a discharge pipeline run.
///
/// Explanation-stage failures never appear here: the terminology lookup and
/// the explanation synthesis are supplementary, and the orchestrator degrades
/// them to "no explanation" instead of aborting.
#[derive(Debug, thiserror::Error)]
pub enum DischargeError {
    /// The input record is not a JSON object and cannot be traversed.
    /// Raised before any external call is made.
    #[error("Patient record is not a traversable mapping (found {found})")]
    InvalidRecordShape { found: &'static str },

    /// A gateway call failed during a mandatory stage. Carries any decision
    /// already computed so the caller still receives the partial result.
    #[error("Gateway unavailable during {stage}: {source}")]
    GatewayUnavailable {
        stage: Stage,
        /// Populated when classification completed before the failure.
        decision: Option<DischargeDecision>,
        source: GatewayError,
    },
}

impl DischargeError {
    /// The decision computed before the run aborted, if any.
    pub fn partial_decision(&self) -> Option<&DischargeDecision> {
        match self {
            DischargeError::GatewayUnavailable { decision, .. } => decision.as_ref(),
            DischargeError::InvalidRecordShape { .. } => None,
        }
    }
}
