//! Letter-writing instruction source.
//!
//! The synthesis stage consumes a guideline text and formatting directives
//! as opaque strings. They normally come from a plain-text file next to the
//! process; when the file is absent the compiled-in defaults apply.

use std::path::Path;

/// Default discharge-letter guideline, used when no instructions file exists.
pub const DEFAULT_GUIDELINE: &str = "\
General Principle:
- Write the principle if possible or not to discharge
Discharge Condition:
- Write the pertinent information you would want to know if you were the \
outpatient MD seeing the patient again 2 weeks after discharge. For example:
  - In hypertensive urgency, give discharge BP (or 24 hr range)
  - In CHF, give discharge weight
";

/// Default formatting directives appended to the synthesis prompt.
pub const DEFAULT_ADDITIONAL_PROMPTS: &str = "\
Make sure that the important components of the guideline for the letter are \
captured and it seems professional and well structured. Consider the expert \
inputs and also generate the final letter.
Start with \"Dear Healthcare Provider,\".
End with \"Sincerely,
Healthcare AI Assistant\".";

/// Load the guideline from `path`, falling back to the default.
pub fn load_guideline(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Using built-in guideline");
            DEFAULT_GUIDELINE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_contents_win_over_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "custom guideline").unwrap();

        assert_eq!(load_guideline(file.path()), "custom guideline");
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let guideline = load_guideline(Path::new("/nonexistent/instructions.txt"));
        assert_eq!(guideline, DEFAULT_GUIDELINE);
    }

    #[test]
    fn default_additional_prompts_frame_the_letter() {
        assert!(DEFAULT_ADDITIONAL_PROMPTS.contains("Dear Healthcare Provider,"));
        assert!(DEFAULT_ADDITIONAL_PROMPTS.contains("Sincerely,"));
    }
}
