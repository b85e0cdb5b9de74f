//! Discharge eligibility classification.
//!
//! One prompt, one gateway call, and a strict three-valued parse of the
//! free-text answer. Anything that is not recognizably "Yes" or "No" is
//! `Indeterminate` and carries the raw response; callers must never coerce
//! it to either extreme.

use super::gateway::{CompletionGateway, GatewayError};
use super::redact::DeidentifiedRecord;

/// Three-valued discharge verdict.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum DischargeDecision {
    Eligible,
    NotEligible,
    /// The gateway answered something other than Yes/No. The raw text is
    /// preserved so the caller can report it verbatim.
    Indeterminate { raw: String },
}

impl DischargeDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, DischargeDecision::Eligible)
    }
}

/// Prompt template for the eligibility question.
fn build_classification_prompt(record: &DeidentifiedRecord) -> String {
    format!(
        "You are a physician deciding whether to discharge a patient. \
         Decide whether the given patient is safe to discharge.\n\
         Consider all information provided, particularly the doctors' notes.\n\
         Write the output in this format: Yes/No\n\
         Data: {}",
        record.to_prompt_json()
    )
}

/// Ask the gateway the discharge-safety question and parse its answer.
///
/// Exactly one gateway request; transport failures surface to the caller
/// without retry.
pub fn classify<G: CompletionGateway>(
    gateway: &G,
    record: &DeidentifiedRecord,
) -> Result<DischargeDecision, GatewayError> {
    let prompt = build_classification_prompt(record);
    let response = gateway.complete(&prompt)?;
    let decision = parse_decision(&response);

    tracing::info!(decision = ?decision, "Eligibility classified");
    Ok(decision)
}

/// Parse a free-text answer into a decision.
///
/// Tolerates surrounding whitespace, case, and trailing punctuation, but
/// nothing beyond a bare Yes or No.
pub fn parse_decision(response: &str) -> DischargeDecision {
    let normalized = response
        .trim()
        .trim_end_matches(['.', '!'])
        .to_ascii_lowercase();

    match normalized.as_str() {
        "yes" => DischargeDecision::Eligible,
        "no" => DischargeDecision::NotEligible,
        _ => DischargeDecision::Indeterminate {
            raw: response.trim().to_string(),
        },
    }
}
