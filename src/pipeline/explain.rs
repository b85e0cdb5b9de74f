//! Retrieval-augmented disease explanation.
//!
//! Four steps: extract a one-word condition query from the record, search the
//! terminology service for it, fetch the top concept's definition, then ask
//! the gateway for a plain-language explanation grounded in that definition.
//!
//! The explanation is supplementary to the decision and letter, so every
//! terminology failure — and an empty result set at any step — collapses
//! cleanly to "no explanation" instead of aborting the run.

use super::gateway::{CompletionGateway, GatewayError};
use super::redact::DeidentifiedRecord;
use super::terminology::TerminologyLookup;

fn build_query_prompt(record: &DeidentifiedRecord) -> String {
    format!(
        "Suppose you are a physician writing a discharge letter for a patient. \
         You will include a short paragraph explaining the disease for the patient. \
         You will use a medical terminology knowledge base for retrieval augmented generation.\n\
         Based on the patient data, generate a one-word query for the knowledge base. \
         Only display the word.\n\
         Write the output in this format: one word for the disease\n\
         Example: Diabetes\n\
         Data: {}",
        record.to_prompt_json()
    )
}

fn build_explanation_prompt(record: &DeidentifiedRecord, definition: &str) -> String {
    format!(
        "Suppose you are a physician writing a discharge letter for a patient. \
         You will include a short paragraph explaining the disease for the patient. \
         Based on the patient data and the retrieved terminology definition, generate a \
         brief explanation (100-200 words) of the disease for the patient.\n\
         Do not use unnecessary medical terminology, so the patient can understand \
         the disease.\n\
         Data: {}\n\
         Definition: {}\n\
         Format:\n  Terminology:\n  Explanation:",
        record.to_prompt_json(),
        definition,
    )
}

/// Reduce a free-text answer to the single bare word the prompt asked for.
///
/// The model occasionally answers in a sentence anyway; keep the first
/// whitespace-delimited token, stripped of surrounding punctuation.
fn normalize_query(raw: &str) -> Option<String> {
    let word: String = raw
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string();

    if word.is_empty() {
        None
    } else {
        Some(word)
    }
}

/// Ask the gateway for the single disease term to look up.
pub fn extract_query<G: CompletionGateway>(
    gateway: &G,
    record: &DeidentifiedRecord,
) -> Result<Option<String>, GatewayError> {
    let response = gateway.complete(&build_query_prompt(record))?;
    let query = normalize_query(&response);

    if query.is_none() {
        tracing::warn!(raw = %response, "Query extraction produced no usable term");
    }
    Ok(query)
}

/// Produce a grounded plain-language explanation of the patient's condition.
///
/// `Ok(None)` means no explanation is available — no concept matched, no
/// definition on file, or the terminology service was unreachable. Gateway
/// failures surface to the caller; the orchestrator absorbs them because
/// this stage is best-effort.
pub fn explain<G: CompletionGateway, T: TerminologyLookup>(
    gateway: &G,
    terminology: &T,
    record: &DeidentifiedRecord,
) -> Result<Option<String>, GatewayError> {
    // Step 1: extract the search term.
    let Some(query) = extract_query(gateway, record)? else {
        return Ok(None);
    };

    // Step 2: search, best match first.
    let concept = match terminology.search(&query) {
        Ok(hits) => match hits.into_iter().next() {
            Some(concept) => concept,
            None => {
                tracing::info!(query, "No terminology match; skipping explanation");
                return Ok(None);
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, query, "Terminology search failed; skipping explanation");
            return Ok(None);
        }
    };

    // Step 3: fetch the definition.
    let definition = match terminology.definition(&concept.concept_id) {
        Ok(Some(text)) => text,
        Ok(None) => {
            tracing::info!(
                concept_id = %concept.concept_id,
                "No definition on file; skipping explanation"
            );
            return Ok(None);
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                concept_id = %concept.concept_id,
                "Definition fetch failed; skipping explanation"
            );
            return Ok(None);
        }
    };

    // Step 4: grounded synthesis.
    let explanation = gateway.complete(&build_explanation_prompt(record, &definition))?;

    tracing::info!(
        concept_id = %concept.concept_id,
        label = %concept.label,
        "Disease explanation generated"
    );
    Ok(Some(explanation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gateway::MockGateway;
    use crate::pipeline::redact::redact;
    use crate::pipeline::terminology::MockTerminology;
    use serde_json::json;

    fn deidentified() -> DeidentifiedRecord {
        let (record, _) = redact(&json!({ "notes": "elevated glucose, polyuria" })).unwrap();
        record
    }

    #[test]
    fn normalize_keeps_a_bare_word() {
        assert_eq!(normalize_query("Diabetes"), Some("Diabetes".to_string()));
    }

    #[test]
    fn normalize_takes_first_token_and_strips_punctuation() {
        assert_eq!(
            normalize_query("Diabetes. The patient shows..."),
            Some("Diabetes".to_string())
        );
        assert_eq!(normalize_query("  \"Sepsis\"\n"), Some("Sepsis".to_string()));
    }

    #[test]
    fn normalize_rejects_empty_answers() {
        assert_eq!(normalize_query(""), None);
        assert_eq!(normalize_query("   "), None);
        assert_eq!(normalize_query("..."), None);
    }

    #[test]
    fn full_protocol_produces_grounded_explanation() {
        let gateway = MockGateway::script(vec![
            "Diabetes".into(),
            "Terminology: Diabetes Mellitus\nExplanation: Your body has trouble using sugar."
                .into(),
        ]);
        let terminology =
            MockTerminology::with_concept("C0011849", "Diabetes Mellitus", "A metabolic disorder.");

        let explanation = explain(&gateway, &terminology, &deidentified()).unwrap();
        assert!(explanation.unwrap().contains("Explanation:"));

        // Second gateway prompt is grounded in the fetched definition.
        let prompts = gateway.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("one-word query"));
        assert!(prompts[1].contains("A metabolic disorder."));
        assert!(prompts[1].contains("100-200 words"));
    }

    #[test]
    fn empty_search_terminates_cleanly() {
        let gateway = MockGateway::new("Diabetes");
        let terminology = MockTerminology::empty();

        let explanation = explain(&gateway, &terminology, &deidentified()).unwrap();
        assert!(explanation.is_none());
        // Only the extraction call happened.
        assert_eq!(gateway.prompts().len(), 1);
    }

    #[test]
    fn missing_definition_terminates_cleanly() {
        let gateway = MockGateway::new("Diabetes");
        let terminology = MockTerminology::without_definition("C0011849", "Diabetes Mellitus");

        let explanation = explain(&gateway, &terminology, &deidentified()).unwrap();
        assert!(explanation.is_none());
        // Extraction happened, grounded synthesis did not.
        assert_eq!(gateway.prompts().len(), 1);
    }

    #[test]
    fn search_failure_degrades_to_no_explanation() {
        let gateway = MockGateway::new("Diabetes");
        let terminology = MockTerminology::search_unavailable();

        let explanation = explain(&gateway, &terminology, &deidentified()).unwrap();
        assert!(explanation.is_none());
    }

    #[test]
    fn definition_failure_degrades_to_no_explanation() {
        let gateway = MockGateway::new("Diabetes");
        let terminology = MockTerminology::definition_unavailable("C0011849", "Diabetes Mellitus");

        let explanation = explain(&gateway, &terminology, &deidentified()).unwrap();
        assert!(explanation.is_none());
    }

    #[test]
    fn unusable_extracted_term_skips_lookup() {
        let gateway = MockGateway::new("...");
        let terminology = MockTerminology::with_concept("C1", "X", "def");

        let explanation = explain(&gateway, &terminology, &deidentified()).unwrap();
        assert!(explanation.is_none());
        assert_eq!(gateway.prompts().len(), 1);
    }

    #[test]
    fn gateway_failure_surfaces_to_caller() {
        let gateway = MockGateway::unavailable();
        let terminology = MockTerminology::with_concept("C1", "X", "def");

        let err = explain(&gateway, &terminology, &deidentified()).unwrap_err();
        assert!(matches!(err, GatewayError::Connection(_)));
    }
}
