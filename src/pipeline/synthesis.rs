//! Multi-perspective discharge letter synthesis.
//!
//! A single prompt asks the gateway to simulate three deliberating experts
//! reviewing the letter as it is written: the physician who will see the
//! patient next, the nurse in charge of medication and hospital course, and
//! the laboratory personnel who documented the reports. Each expert reasons
//! one step at a time and consults the others when a guideline gap appears.
//!
//! The draft uses a fixed placeholder in place of the patient's name; the
//! rehydrator substitutes the real name afterwards.

use crate::config::PLACEHOLDER_TOKEN;

use super::gateway::{CompletionGateway, GatewayError};
use super::redact::DeidentifiedRecord;

/// A synthesized letter still carrying the placeholder token.
#[derive(Debug, Clone)]
pub struct DraftLetter(pub String);

fn build_synthesis_prompt(
    record: &DeidentifiedRecord,
    instructions: &str,
    additional_prompts: &str,
) -> String {
    format!(
        "There are experts in this room reviewing the letter you are generating: \
         another doctor who is going to look after the patient in the future, \
         the nurse who was in charge of the medication and the hospital course, and \
         the lab personnel who documented the reports for this patient. \
         All experts will write down 1 step of their thinking, then share it with the group. \
         Then all experts will go on to the next step, and so on. \
         If any expert realises they are missing an essential component of the discharge \
         letter guideline, they will consult the others to fill the gap.\n\
         The task is: you are writing a discharge letter for a patient. \
         Use patient data from context only. \
         Focus on precision and minimize any assumptions or hallucinations not directly \
         supported by the data. \
         Very important: this should be in a letter format and focus on the patient's \
         comprehension ability.\n\
         {additional_prompts}\n\
         Guideline to write the letter to the patient: {instructions}\n\
         Address the patient in the third person and replace the patient's name with \
         {placeholder}.\n\
         Data: {data}",
        additional_prompts = additional_prompts,
        instructions = instructions,
        placeholder = PLACEHOLDER_TOKEN,
        data = record.to_prompt_json(),
    )
}

/// Draft the discharge letter. Only called once eligibility is confirmed.
///
/// One gateway request, no streaming; the raw response is the draft.
pub fn synthesize<G: CompletionGateway>(
    gateway: &G,
    record: &DeidentifiedRecord,
    instructions: &str,
    additional_prompts: &str,
) -> Result<DraftLetter, GatewayError> {
    let prompt = build_synthesis_prompt(record, instructions, additional_prompts);
    let text = gateway.complete(&prompt)?;

    tracing::info!(length = text.len(), "Discharge letter drafted");
    Ok(DraftLetter(text))
}
