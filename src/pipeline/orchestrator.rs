//! Discharge pipeline orchestrator.
//!
//! Drives one record through the fixed stage sequence:
//! de-identify → classify → (if eligible) draft → rehydrate → explain.
//! Each stage's result gates the next; there is no retry-and-reenter. A
//! failed gateway call in a mandatory stage aborts the run and carries any
//! decision already computed, so the caller still gets the partial result.
//!
//! Uses trait-based DI for both external clients so the orchestrator is
//! fully testable with mocks.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::classify::{self, DischargeDecision};
use super::explain;
use super::gateway::CompletionGateway;
use super::redact;
use super::rehydrate::rehydrate;
use super::synthesis;
use super::terminology::TerminologyLookup;
use super::{DischargeError, Stage};

/// Everything one pipeline run returns to the caller.
///
/// `letter` is present only on an Eligible decision; `explanation` is
/// best-effort and may be absent even when a letter exists.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub decision: DischargeDecision,
    pub letter: Option<String>,
    pub explanation: Option<String>,
    pub generated_at: chrono::NaiveDateTime,
}

/// Full discharge pipeline over a completion gateway and a terminology
/// service.
///
/// Holds no request state: every `run` call is independent, so one pipeline
/// value can serve concurrent invocations when the clients allow it.
pub struct DischargePipeline<'a, G: CompletionGateway, T: TerminologyLookup> {
    gateway: &'a G,
    terminology: &'a T,
    instructions: String,
    additional_prompts: String,
}

impl<'a, G: CompletionGateway, T: TerminologyLookup> DischargePipeline<'a, G, T> {
    pub fn new(gateway: &'a G, terminology: &'a T, instructions: &str) -> Self {
        Self {
            gateway,
            terminology,
            instructions: instructions.to_string(),
            additional_prompts: crate::instructions::DEFAULT_ADDITIONAL_PROMPTS.to_string(),
        }
    }

    /// Override the formatting directives appended to the synthesis prompt.
    pub fn with_additional_prompts(mut self, additional_prompts: &str) -> Self {
        self.additional_prompts = additional_prompts.to_string();
        self
    }

    /// Run one record through the full pipeline.
    pub fn run(&self, record: &Value) -> Result<PipelineOutcome, DischargeError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("discharge_run", run_id = %run_id);
        let _guard = span.enter();

        // Step 1: De-identify. Everything sent to the gateway from here on
        // is the redacted copy; the ledger stays in this frame.
        let (deidentified, ledger) = redact::redact(record)?;

        // Step 2: Classify eligibility.
        let decision = classify::classify(self.gateway, &deidentified).map_err(|source| {
            DischargeError::GatewayUnavailable {
                stage: Stage::Classification,
                decision: None,
                source,
            }
        })?;

        // Step 3: NotEligible and Indeterminate both end the run here, each
        // reported as itself. No letter is drafted.
        if !decision.is_eligible() {
            tracing::info!(decision = ?decision, "No letter drafted");
            return Ok(self.outcome(run_id, decision, None, None));
        }

        // Step 4: Draft the letter. A failure here still delivers the
        // computed decision alongside the error.
        let draft = synthesis::synthesize(
            self.gateway,
            &deidentified,
            &self.instructions,
            &self.additional_prompts,
        )
        .map_err(|source| DischargeError::GatewayUnavailable {
            stage: Stage::Drafting,
            decision: Some(decision.clone()),
            source,
        })?;

        // Step 5: Rehydrate with the name captured during redaction.
        let letter = match ledger.display_name() {
            Some(name) => {
                let rehydrated = rehydrate(&draft.0, &name);
                tracing::info!(
                    replacements = rehydrated.replacements,
                    "Letter re-identified"
                );
                rehydrated.text
            }
            None => {
                tracing::warn!("Record carried no patient name; letter keeps its placeholder");
                draft.0
            }
        };

        // Step 6: Best-effort explanation. Any failure here is absorbed —
        // the decision and letter are the primary deliverable.
        let explanation = match explain::explain(self.gateway, self.terminology, &deidentified) {
            Ok(explanation) => explanation,
            Err(e) => {
                tracing::warn!(error = %e, stage = %Stage::Explanation, "Explanation skipped");
                None
            }
        };

        Ok(self.outcome(run_id, decision, Some(letter), explanation))
    }

    fn outcome(
        &self,
        run_id: Uuid,
        decision: DischargeDecision,
        letter: Option<String>,
        explanation: Option<String>,
    ) -> PipelineOutcome {
        PipelineOutcome {
            run_id,
            decision,
            letter,
            explanation,
            generated_at: chrono::Local::now().naive_local(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gateway::MockGateway;
    use crate::pipeline::terminology::MockTerminology;
    use serde_json::json;

    fn jane_doe_record() -> Value {
        json!({
            "patient_demographics": { "name": "Jane Doe" },
            "patient_id": "123",
            "notes": "stable, afebrile"
        })
    }

    fn pipeline<'a>(
        gateway: &'a MockGateway,
        terminology: &'a MockTerminology,
    ) -> DischargePipeline<'a, MockGateway, MockTerminology> {
        DischargePipeline::new(gateway, terminology, "guideline text")
    }

    #[test]
    fn end_to_end_eligible_run() {
        let gateway = MockGateway::script(vec![
            "Yes".into(),
            "Dear Healthcare Provider, YYYYY is stable and ready to go home. Sincerely,".into(),
            "Pneumonia".into(),
            "Terminology: Pneumonia\nExplanation: An infection of the lungs.".into(),
        ]);
        let terminology =
            MockTerminology::with_concept("C0032285", "Pneumonia", "Lung inflammation.");

        let outcome = pipeline(&gateway, &terminology)
            .run(&jane_doe_record())
            .unwrap();

        assert_eq!(outcome.decision, DischargeDecision::Eligible);
        let letter = outcome.letter.unwrap();
        assert!(letter.contains("Jane Doe is stable"));
        assert!(!letter.to_lowercase().contains("yyyyy"));
        assert!(outcome.explanation.unwrap().contains("infection of the lungs"));
    }

    #[test]
    fn prompts_never_contain_identifying_values() {
        let gateway = MockGateway::script(vec![
            "Yes".into(),
            "Dear Healthcare Provider, YYYYY is stable. Sincerely,".into(),
            "Pneumonia".into(),
            "Terminology: Pneumonia\nExplanation: ...".into(),
        ]);
        let terminology = MockTerminology::with_concept("C0032285", "Pneumonia", "def");

        pipeline(&gateway, &terminology)
            .run(&jane_doe_record())
            .unwrap();

        for prompt in gateway.prompts() {
            assert!(!prompt.contains("Jane Doe"));
            assert!(!prompt.contains("123"));
        }
    }

    #[test]
    fn not_eligible_returns_decision_alone() {
        let gateway = MockGateway::new("No");
        let terminology = MockTerminology::empty();

        let outcome = pipeline(&gateway, &terminology)
            .run(&jane_doe_record())
            .unwrap();

        assert_eq!(outcome.decision, DischargeDecision::NotEligible);
        assert!(outcome.letter.is_none());
        assert!(outcome.explanation.is_none());
        // Only the classification call happened.
        assert_eq!(gateway.prompts().len(), 1);
    }

    #[test]
    fn indeterminate_is_surfaced_verbatim_not_coerced() {
        let gateway = MockGateway::new("Needs senior review");
        let terminology = MockTerminology::empty();

        let outcome = pipeline(&gateway, &terminology)
            .run(&jane_doe_record())
            .unwrap();

        assert_eq!(
            outcome.decision,
            DischargeDecision::Indeterminate {
                raw: "Needs senior review".to_string()
            }
        );
        assert!(outcome.letter.is_none());
    }

    #[test]
    fn empty_terminology_degrades_to_no_explanation() {
        let gateway = MockGateway::script(vec![
            "Yes".into(),
            "Dear Healthcare Provider, YYYYY is stable. Sincerely,".into(),
            "Pneumonia".into(),
        ]);
        let terminology = MockTerminology::empty();

        let outcome = pipeline(&gateway, &terminology)
            .run(&jane_doe_record())
            .unwrap();

        assert_eq!(outcome.decision, DischargeDecision::Eligible);
        assert!(outcome.letter.is_some());
        assert!(outcome.explanation.is_none());
    }

    #[test]
    fn classification_failure_aborts_with_no_partial_decision() {
        let gateway = MockGateway::unavailable();
        let terminology = MockTerminology::empty();

        let err = pipeline(&gateway, &terminology)
            .run(&jane_doe_record())
            .unwrap_err();

        match err {
            DischargeError::GatewayUnavailable {
                stage, decision, ..
            } => {
                assert_eq!(stage, Stage::Classification);
                assert!(decision.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn drafting_failure_carries_the_computed_decision() {
        // First call answers the classification, then the gateway dies.
        let gateway = MockGateway::script_then_fail(vec!["Yes".into()]);
        let terminology = MockTerminology::empty();

        let err = pipeline(&gateway, &terminology)
            .run(&jane_doe_record())
            .unwrap_err();

        match &err {
            DischargeError::GatewayUnavailable {
                stage, decision, ..
            } => {
                assert_eq!(*stage, Stage::Drafting);
                assert_eq!(decision.as_ref(), Some(&DischargeDecision::Eligible));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.partial_decision(), Some(&DischargeDecision::Eligible));
    }

    #[test]
    fn gateway_failure_during_explanation_still_delivers_letter() {
        // Classification and drafting succeed, then the script runs dry and
        // the query-extraction call fails.
        let gateway = MockGateway::script_then_fail(vec![
            "Yes".into(),
            "Dear Healthcare Provider, YYYYY is stable. Sincerely,".into(),
        ]);
        let terminology = MockTerminology::with_concept("C1", "X", "def");

        let outcome = pipeline(&gateway, &terminology)
            .run(&jane_doe_record())
            .unwrap();

        assert_eq!(outcome.decision, DischargeDecision::Eligible);
        assert!(outcome.letter.unwrap().contains("Jane Doe"));
        assert!(outcome.explanation.is_none());
    }

    #[test]
    fn invalid_record_shape_aborts_before_any_gateway_call() {
        let gateway = MockGateway::new("Yes");
        let terminology = MockTerminology::empty();

        let err = pipeline(&gateway, &terminology)
            .run(&json!("not a mapping"))
            .unwrap_err();

        assert!(matches!(err, DischargeError::InvalidRecordShape { .. }));
        assert!(gateway.prompts().is_empty());
    }

    #[test]
    fn record_without_name_keeps_placeholder_but_completes() {
        let gateway = MockGateway::script(vec![
            "Yes".into(),
            "Dear Healthcare Provider, YYYYY is stable. Sincerely,".into(),
            "Pneumonia".into(),
        ]);
        let terminology = MockTerminology::empty();

        let outcome = pipeline(&gateway, &terminology)
            .run(&json!({ "notes": "stable" }))
            .unwrap();

        assert!(outcome.letter.unwrap().contains("YYYYY"));
    }

    #[test]
    fn outcome_serializes_for_the_caller() {
        let gateway = MockGateway::new("No");
        let terminology = MockTerminology::empty();

        let outcome = pipeline(&gateway, &terminology)
            .run(&jane_doe_record())
            .unwrap();

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["decision"]["verdict"], "not_eligible");
        assert_eq!(json["letter"], serde_json::Value::Null);
    }
}
