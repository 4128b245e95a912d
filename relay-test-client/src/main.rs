use anyhow::Result;
use clap::Parser;
use colored::*;

mod api_client;
mod output;
mod scenarios;
mod sse_client;

use api_client::ApiClient;
use output::print_test_summary;

#[derive(Parser)]
#[command(name = "relay-test-client")]
#[command(about = "SSE Relay Integration Testing Tool")]
struct Cli {
    /// Base URL of the relay endpoints (e.g., http://localhost:8080/api/sse)
    #[arg(long, default_value = "http://localhost:8080/api/sse")]
    base_url: String,

    /// Test scenario to run
    #[arg(long, value_enum, default_value = "all")]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Notify while nobody is subscribed; the relay must decline
    NotifyWithoutSubscribers,
    /// Open one stream and receive a published value
    ConnectionTest,
    /// Store a value and republish it to two subscribers
    Republish,
    /// Drop one of two subscribers and publish to the remaining one
    NotifyAfterDisconnect,
    /// Run every scenario, starting with the one that needs an idle relay
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let base_url = cli.base_url.trim_end_matches('/').to_string();
    println!("{}", "=== SETUP PHASE ===".bright_white().bold());
    println!("{} Targeting relay at {}", "→".blue(), base_url);

    let api_client = ApiClient::new(reqwest::Client::new(), base_url.clone());

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::NotifyWithoutSubscribers => {
            results.push(scenarios::test_notify_without_subscribers(&api_client).await?);
        }
        ScenarioChoice::ConnectionTest => {
            results.push(scenarios::test_connection(&base_url, &api_client).await?);
        }
        ScenarioChoice::Republish => {
            results.push(scenarios::test_republish(&base_url, &api_client).await?);
        }
        ScenarioChoice::NotifyAfterDisconnect => {
            results.push(scenarios::test_notify_after_disconnect(&base_url, &api_client).await?);
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_notify_without_subscribers(&api_client).await?);
            results.push(scenarios::test_connection(&base_url, &api_client).await?);
            results.push(scenarios::test_republish(&base_url, &api_client).await?);
            results.push(scenarios::test_notify_after_disconnect(&base_url, &api_client).await?);
        }
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
