//! Re-identification of the drafted letter.
//!
//! Replaces every case-insensitive occurrence of the placeholder token with
//! the real patient name captured during redaction. Pure text transform, no
//! external calls.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::PLACEHOLDER_TOKEN;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){}", regex::escape(PLACEHOLDER_TOKEN)))
        .expect("placeholder regex must compile")
});

/// A rehydrated letter plus how many substitutions were made.
#[derive(Debug, Clone)]
pub struct Rehydrated {
    pub text: String,
    /// Number of placeholder occurrences replaced. Zero is valid but is a
    /// quality signal: the model ignored the placeholder instruction.
    pub replacements: usize,
}

/// Substitute the real patient name for every placeholder occurrence.
pub fn rehydrate(letter: &str, name: &str) -> Rehydrated {
    let replacements = PLACEHOLDER_RE.find_iter(letter).count();
    if replacements == 0 {
        tracing::warn!("Draft letter contains no placeholder token");
        return Rehydrated {
            text: letter.to_string(),
            replacements: 0,
        };
    }

    Rehydrated {
        // NoExpand: the name is a literal, `$` in it must not expand.
        text: PLACEHOLDER_RE
            .replace_all(letter, regex::NoExpand(name))
            .into_owned(),
        replacements,
    }
}
