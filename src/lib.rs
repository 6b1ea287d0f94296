pub mod clients;
pub mod config;
pub mod deserializers;
pub mod error;
pub mod fallback;
pub mod http;
pub mod mailer;
pub mod narrative;
pub mod orchestrator;
pub mod prompts;
pub mod risk;
pub mod schemas;

pub use error::{ChangeMetisError, Result};
pub use narrative::{Mitigation, MitigationEntry, NarrativeSection, StrategyNarrative};
pub use orchestrator::{StrategyOrchestrator, StrategyResult};
pub use risk::{
    ImpactMatrix, ImpactSummary, RiskStatus, StakeholderImpact, StakeholderResult, build_impact,
    normalize,
};
pub use schemas::{Assessment, StakeholderInput};

/// Initialise tracing from RUST_LOG, falling back to `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
