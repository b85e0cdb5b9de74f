//! Medical terminology lookup service client.
//!
//! Wraps a UMLS-style REST API: a search endpoint that ranks concepts for a
//! term, and a definitions endpoint keyed by concept identifier. Empty result
//! sets are normal outcomes, not errors — the explainer degrades to "no
//! explanation" on anything else.

use serde::Deserialize;

use crate::config::Config;

/// Errors from a terminology service call.
#[derive(Debug, thiserror::Error)]
pub enum TerminologyError {
    #[error("Cannot connect to terminology service at {0}")]
    Connection(String),

    #[error("Terminology request timed out after {0}s")]
    Timeout(u64),

    #[error("Terminology service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// A concept candidate returned by search, in service ranking order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminologyConcept {
    pub concept_id: String,
    pub label: String,
}

/// Concept search + definition fetch.
///
/// Implementations must be safe for concurrent use across pipeline runs.
pub trait TerminologyLookup {
    /// Search concepts matching `term`, best match first. An empty list is a
    /// normal no-match outcome.
    fn search(&self, term: &str) -> Result<Vec<TerminologyConcept>, TerminologyError>;

    /// Fetch the definition text for a concept. `None` means the service has
    /// no definition on file, which is a normal outcome.
    fn definition(&self, concept_id: &str) -> Result<Option<String>, TerminologyError>;
}

/// HTTP client for the UMLS REST API.
pub struct UmlsClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl UmlsClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        }
    }

    /// Build a client from process configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.terminology_base_url,
            &config.credentials.umls_api_key,
            config.terminology_timeout_secs,
        )
    }

    fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<reqwest::blocking::Response, TerminologyError> {
        self.client.get(url).query(params).send().map_err(|e| {
            if e.is_connect() {
                TerminologyError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                TerminologyError::Timeout(self.timeout_secs)
            } else {
                TerminologyError::HttpClient(e.to_string())
            }
        })
    }
}

/// Response envelope from /search/current
#[derive(Deserialize)]
struct SearchEnvelope {
    result: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    ui: String,
    name: String,
}

/// Response envelope from /content/current/CUI/{id}/definitions
#[derive(Deserialize)]
struct DefinitionEnvelope {
    #[serde(default)]
    result: Vec<DefinitionEntry>,
}

#[derive(Deserialize)]
struct DefinitionEntry {
    value: String,
}

impl TerminologyLookup for UmlsClient {
    fn search(&self, term: &str) -> Result<Vec<TerminologyConcept>, TerminologyError> {
        let url = format!("{}/search/current", self.base_url);

        tracing::info!(target: "audit", term, "terminology search");

        let response = self.get(&url, &[("string", term), ("apiKey", &self.api_key)])?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(vec![]);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TerminologyError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchEnvelope = response
            .json()
            .map_err(|e| TerminologyError::HttpClient(e.to_string()))?;

        let concepts: Vec<TerminologyConcept> = parsed
            .result
            .results
            .into_iter()
            .map(|hit| TerminologyConcept {
                concept_id: hit.ui,
                label: hit.name,
            })
            .collect();

        tracing::info!(target: "audit", term, candidates = concepts.len(), "terminology search result");
        Ok(concepts)
    }

    fn definition(&self, concept_id: &str) -> Result<Option<String>, TerminologyError> {
        let url = format!("{}/content/current/CUI/{}/definitions", self.base_url, concept_id);

        tracing::info!(target: "audit", concept_id, "terminology definition fetch");

        let response = self.get(&url, &[("apiKey", &self.api_key)])?;
        let status = response.status();
        // UMLS answers 404 for concepts with no definitions on file.
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TerminologyError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DefinitionEnvelope = response
            .json()
            .map_err(|e| TerminologyError::HttpClient(e.to_string()))?;

        Ok(parsed.result.into_iter().next().map(|entry| entry.value))
    }
}

/// In-memory terminology service for tests.
pub struct MockTerminology {
    hits: Vec<TerminologyConcept>,
    definition: Option<String>,
    fail_search: bool,
    fail_definition: bool,
}

impl MockTerminology {
    /// A service with one concept and a definition for it.
    pub fn with_concept(concept_id: &str, label: &str, definition: &str) -> Self {
        Self {
            hits: vec![TerminologyConcept {
                concept_id: concept_id.to_string(),
                label: label.to_string(),
            }],
            definition: Some(definition.to_string()),
            fail_search: false,
            fail_definition: false,
        }
    }

    /// A service that matches nothing.
    pub fn empty() -> Self {
        Self {
            hits: vec![],
            definition: None,
            fail_search: false,
            fail_definition: false,
        }
    }

    /// A service with one concept but no definition on file for it.
    pub fn without_definition(concept_id: &str, label: &str) -> Self {
        Self {
            hits: vec![TerminologyConcept {
                concept_id: concept_id.to_string(),
                label: label.to_string(),
            }],
            definition: None,
            fail_search: false,
            fail_definition: false,
        }
    }

    /// A service whose search endpoint is down.
    pub fn search_unavailable() -> Self {
        Self {
            hits: vec![],
            definition: None,
            fail_search: true,
            fail_definition: false,
        }
    }

    /// A service whose definition endpoint is down.
    pub fn definition_unavailable(concept_id: &str, label: &str) -> Self {
        Self {
            hits: vec![TerminologyConcept {
                concept_id: concept_id.to_string(),
                label: label.to_string(),
            }],
            definition: None,
            fail_search: false,
            fail_definition: true,
        }
    }
}

impl TerminologyLookup for MockTerminology {
    fn search(&self, _term: &str) -> Result<Vec<TerminologyConcept>, TerminologyError> {
        if self.fail_search {
            return Err(TerminologyError::Connection("mock://terminology".to_string()));
        }
        Ok(self.hits.clone())
    }

    fn definition(&self, _concept_id: &str) -> Result<Option<String>, TerminologyError> {
        if self.fail_definition {
            return Err(TerminologyError::Connection("mock://terminology".to_string()));
        }
        Ok(self.definition.clone())
    }
}
