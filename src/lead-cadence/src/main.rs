//! LeadCadence — lead-nurturing and trial-conversion email sequencing.
//!
//! Entry point that wires configuration, the sequence catalog, a delivery
//! transport, and the periodic queue sweep.

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use cadence_channels::{HttpEmailProvider, SmtpRelayProvider};
use cadence_core::config::AppConfig;
use cadence_core::delivery::{EmailProvider, InMemoryResolver, LogProvider};
use cadence_sequencing::SequenceEngine;

#[derive(Parser, Debug)]
#[command(name = "lead-cadence")]
#[command(about = "Lead-nurturing email sequencing engine")]
#[command(version)]
struct Cli {
    /// Sweep interval in milliseconds (overrides config)
    #[arg(long, env = "LEAD_CADENCE__ENGINE__SWEEP_INTERVAL_MS")]
    sweep_interval_ms: Option<u64>,

    /// Delivery transport: log, smtp, or api (overrides config)
    #[arg(long, env = "LEAD_CADENCE__EMAIL__TRANSPORT")]
    transport: Option<String>,

    /// Seed a demo lead and trigger the trial-nurture sequence on startup
    #[arg(long, default_value_t = false)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_cadence=info,cadence_sequencing=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("LeadCadence starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(interval) = cli.sweep_interval_ms {
        config.engine.sweep_interval_ms = interval;
    }
    if let Some(transport) = cli.transport {
        config.email.transport = transport;
    }

    info!(
        node_id = %config.node_id,
        transport = %config.email.transport,
        sweep_interval_ms = config.engine.sweep_interval_ms,
        max_attempts = config.engine.max_attempts,
        "Configuration loaded"
    );

    let provider: Arc<dyn EmailProvider> = match config.email.transport.as_str() {
        "smtp" => Arc::new(SmtpRelayProvider::new(config.email.clone())),
        "api" => Arc::new(HttpEmailProvider::new(config.email.clone())),
        "log" => Arc::new(LogProvider),
        other => {
            warn!(transport = %other, "Unknown transport, falling back to log sink");
            Arc::new(LogProvider)
        }
    };

    let resolver = Arc::new(InMemoryResolver::new());
    let engine = SequenceEngine::new(resolver.clone(), provider, config.engine.max_attempts);
    engine.catalog().seed_builtin();

    if cli.demo {
        resolver.insert(
            "lead-demo",
            HashMap::from([
                ("firstName".to_string(), "Ada".to_string()),
                ("email".to_string(), "ada@example.com".to_string()),
                ("company".to_string(), "Lovelace Ltd".to_string()),
                ("product".to_string(), "LeadCadence".to_string()),
            ]),
        );
        let job_ids = engine.start_sequence("lead-demo", "trial-nurture", HashMap::new())?;
        info!(jobs = job_ids.len(), "Demo sequence triggered");
    }

    info!("LeadCadence is ready, sweeping for due jobs");

    let mut interval = tokio::time::interval(std::time::Duration::from_millis(
        config.engine.sweep_interval_ms.max(1),
    ));
    loop {
        interval.tick().await;
        let processed = engine.sweep();
        let status = engine.status();
        if processed > 0 {
            info!(
                processed,
                pending = status.pending,
                sent = status.sent,
                failed = status.failed,
                "Sweep dispatched jobs"
            );
        }
    }
}
