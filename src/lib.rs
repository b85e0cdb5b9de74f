//! Exeat: clinical discharge document generation.
//!
//! Turns a structured patient record into a discharge-eligibility verdict and
//! a narrative discharge letter, optionally enriched with a plain-language
//! disease explanation retrieved from a medical terminology service.
//!
//! The pipeline de-identifies the record, asks an LLM completion gateway the
//! discharge-safety question, drafts the letter through a multi-perspective
//! deliberation prompt, re-identifies the patient, and grounds the disease
//! explanation in a terminology definition. See
//! [`pipeline::orchestrator::DischargePipeline`].

pub mod config;
pub mod instructions;
pub mod pipeline;

pub use pipeline::classify::DischargeDecision;
pub use pipeline::orchestrator::{DischargePipeline, PipelineOutcome};
pub use pipeline::DischargeError;
