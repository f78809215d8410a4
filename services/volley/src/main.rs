use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use volley::run::{execute, RunReport};
use volley_core::{RateProfile, VolleyConfig};

#[derive(Parser, Debug)]
#[command(name = "volley")]
#[command(about = "Synthetic load generator for financial transfer APIs", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a configuration file
    #[arg(long, env = "VOLLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Target API base URL (overrides configuration)
    #[arg(long, env = "VOLLEY_BASE_URL")]
    base_url: Option<String>,

    /// Shortcut: constant arrival rate in events per second
    #[arg(long)]
    rate: Option<f64>,

    /// Duration in seconds for the --rate shortcut
    #[arg(long, default_value_t = 60.0, requires = "rate")]
    duration: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => VolleyConfig::from_file(path)?,
        None => VolleyConfig::load()?,
    };
    if let Some(base_url) = cli.base_url {
        config.target.base_url = base_url;
    }
    if let Some(rate) = cli.rate {
        config.profile = RateProfile::constant(rate, cli.duration);
    }

    let report = match execute(&config).await {
        Ok(report) => report,
        Err(err) => {
            error!(%err, "run aborted");
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    };

    print_summary(&config, &report);

    if !report.verdict.passed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(config: &VolleyConfig, report: &RunReport) {
    let snapshot = &report.snapshot;

    println!("Run summary");
    println!("  target: {}", config.target.base_url);
    println!("  {}", report.setup);
    println!(
        "  iterations: {} scheduled, {} executed, {} dropped",
        snapshot.total + snapshot.dropped,
        snapshot.total,
        snapshot.dropped
    );
    println!(
        "  error rate: {:.4} ({} failed)",
        snapshot.error_rate(),
        snapshot.failed
    );
    println!(
        "  latency: p95={}ms max={}ms mean={:.1}ms",
        snapshot.p95_ms(),
        snapshot.max_ms(),
        snapshot.mean_ms()
    );

    let mut operations: Vec<_> = snapshot.per_op.iter().collect();
    operations.sort_by_key(|(name, _)| *name);
    for (name, counters) in operations {
        println!(
            "    {name}: {} requests, {} failed",
            counters.total, counters.failed
        );
    }

    println!("\nThresholds");
    for rule in &config.thresholds {
        let observed = rule.observed(snapshot);
        let mark = if rule.passes(snapshot) { "✅" } else { "❌" };
        println!("  {mark} {rule} (observed {observed:.4})");
    }

    if !report.teardown.succeeded {
        println!("\n⚠️  {}", report.teardown);
    }

    if report.verdict.passed {
        println!("\n✅ PASS");
    } else {
        println!("\n❌ FAIL: {} threshold(s) violated", report.verdict.violations.len());
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_target(false).init();
}
