//! Thin CLI around the discharge pipeline.
//!
//! Usage: `exeat <record.json>`. Reads credentials from `credentials.json`
//! (override with EXEAT_CREDENTIALS) and the letter guideline from
//! `instructions.txt` (override with EXEAT_INSTRUCTIONS), runs one pipeline
//! invocation, and prints the outcome as JSON on stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use exeat::config::{self, Config};
use exeat::instructions;
use exeat::pipeline::gateway::OpenAiGateway;
use exeat::pipeline::terminology::UmlsClient;
use exeat::DischargePipeline;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let record_path = std::env::args()
        .nth(1)
        .ok_or("usage: exeat <record.json>")?;

    let credentials_path = env_path("EXEAT_CREDENTIALS", "credentials.json");
    let instructions_path = env_path("EXEAT_INSTRUCTIONS", "instructions.txt");

    let config = Config::load(&credentials_path)?;
    let guideline = instructions::load_guideline(&instructions_path);

    // Malformed input is rejected here, before the pipeline is entered.
    let raw = std::fs::read_to_string(&record_path)?;
    let record: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| format!("{record_path} is not valid JSON: {e}"))?;

    let gateway = OpenAiGateway::from_config(&config);
    let terminology = UmlsClient::from_config(&config);
    let pipeline = DischargePipeline::new(&gateway, &terminology, &guideline);

    match pipeline.run(&record) {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(e) => {
            // A mandatory-stage failure may still carry a computed decision.
            if let Some(decision) = e.partial_decision() {
                eprintln!(
                    "partial result: {}",
                    serde_json::to_string(decision).unwrap_or_default()
                );
            }
            Err(e.into())
        }
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}
