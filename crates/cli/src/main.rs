//! Main entry point for the voxlink CLI
//!
//! Plays one call scenario between in-process participants with mock
//! microphones and prints how each participant's call ended.

mod scenarios;

use anyhow::Result;
use clap::Parser;
use scenarios::{Outcome, Scenario};
use std::time::Duration;
use voxlink_call_core::CallConfig;
use voxlink_infra_common::{log_welcome, parse_log_level, setup_logging, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "voxlink")]
#[command(about = "Play peer-to-peer call scenarios over an in-process signaling relay")]
#[command(version)]
struct Cli {
    /// Scenario to play
    #[arg(value_enum)]
    scenario: Scenario,

    /// Seconds the caller waits for an answer
    #[arg(short, long, default_value = "30", env = "VOXLINK_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// How long answered calls stay up, in milliseconds
    #[arg(long, default_value = "500")]
    talk_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "VOXLINK_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print outcomes as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::new(parse_log_level(&cli.log_level)?, "voxlink");
    if cli.json_logs {
        logging = logging.with_json();
    }
    setup_logging(logging)?;
    log_welcome("voxlink", env!("CARGO_PKG_VERSION"));

    let config = CallConfig::new()
        .with_answer_timeout(Duration::from_secs(cli.timeout_secs))
        .with_display_name("voxlink demo");
    config.validate()?;

    let outcomes = scenarios::run(cli.scenario, config, Duration::from_millis(cli.talk_ms)).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        print_outcomes(cli.scenario, &outcomes);
    }
    Ok(())
}

fn print_outcomes(scenario: Scenario, outcomes: &[Outcome]) {
    println!("Scenario: {}", scenario.name());
    for outcome in outcomes {
        let duration = outcome
            .talk_time_ms
            .map(|ms| format!(" after {} ms", ms))
            .unwrap_or_default();
        match &outcome.error {
            Some(error) => println!("  {:<6} ended: {}{} ({})", outcome.participant, outcome.reason, duration, error),
            None => println!("  {:<6} ended: {}{}", outcome.participant, outcome.reason, duration),
        }
    }
}
