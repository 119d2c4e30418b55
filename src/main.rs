// src/main.rs

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod core;
mod logging;
mod report;

use crate::config::Config;
use crate::core::classifier::Classifier;
use crate::core::scanner::{Dependencies, Orchestrator};

/// Web reconnaissance, fuzzing and phishing URL classification.
#[derive(Debug, Parser)]
#[command(name = "webguard", version, about)]
struct Cli {
    /// IP address, domain, email address or URL to analyze.
    target: String,

    /// JSON configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Classifier model artifact.
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,

    /// Print the full report as JSON.
    #[arg(long)]
    json: bool,

    /// Concurrent probes per sweep.
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Add registration, ASN and redirect features from network lookups.
    #[arg(long)]
    enrich: bool,

    /// Try common credentials against this login form.
    #[arg(long, value_name = "URL")]
    login_url: Option<String>,
}

impl Cli {
    fn apply_to(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.enrich {
            config.enrich_features = true;
        }
        if let Some(url) = &self.login_url {
            config.login_url = Some(url.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    if let Err(e) = logging::initialize_logging() {
        eprintln!("File logging disabled: {}", e);
    }

    let mut config = Config::load(cli.config.as_deref()).wrap_err("Failed to load configuration")?;
    cli.apply_to(&mut config);

    let classifier = match Classifier::load(&config.model_path) {
        Ok(classifier) => {
            info!(features = classifier.features().len(), "Classifier ready.");
            Arc::new(classifier)
        }
        Err(e) => {
            error!(path = %config.model_path.display(), error = %e, "Model could not be loaded.");
            return Err(e).wrap_err_with(|| format!("Failed to load model {}", config.model_path.display()));
        }
    };

    let deps = Dependencies::from_config(&config, classifier).wrap_err("Failed to build the HTTP clients")?;
    let orchestrator = Orchestrator::new(deps, config.workers, config.login_target());

    let Some(report) = orchestrator.run(&cli.target).await else {
        eprintln!("Nothing to analyze: the target is empty.");
        return Ok(());
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::render_text(&report));
    }
    if let Ok(Some(verdict)) = &report.classification_results.verdict {
        if verdict.is_malicious() {
            warn!(target = %report.target.raw, "Target classified as malicious.");
        }
    }
    info!(target = %report.target.raw, "Report printed.");
    Ok(())
}
