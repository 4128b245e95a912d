use anyhow::Result;
use colored::*;
use std::time::{Duration, Instant};

use crate::api_client::ApiClient;
use crate::output::{print_event, TestResult};
use crate::sse_client::Connection;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
// Time for the relay to register a freshly opened stream, or notice a closed one
const SETTLE: Duration = Duration::from_millis(300);

async fn connect(base_url: &str, label: &str) -> Result<Connection> {
    let connection = Connection::establish(base_url, label.to_string()).await?;
    println!("{} {} connected", "✓".green(), label);
    Ok(connection)
}

pub async fn test_notify_without_subscribers(api_client: &ApiClient) -> Result<TestResult> {
    let start = Instant::now();
    let scenario = "notify_without_subscribers";

    println!(
        "\n{}",
        "=== TEST: Notify Without Subscribers ===".bright_cyan().bold()
    );
    println!("{} Sending notify with nobody listening...", "→".blue());

    let response = api_client.notify(1).await?;

    if response.accepted() {
        println!("{} Notify was accepted: {}", "✗".red(), response.body);
        return Ok(TestResult::fail(
            scenario,
            format!("Expected a decline, got {} {}", response.status, response.body),
            start.elapsed(),
        ));
    }

    println!(
        "{} Notify declined ({}: {})",
        "✓".green(),
        response.status,
        response.body
    );
    Ok(TestResult::pass(scenario, start.elapsed()))
}

pub async fn test_connection(base_url: &str, api_client: &ApiClient) -> Result<TestResult> {
    let start = Instant::now();
    let scenario = "connection";

    println!("\n{}", "=== TEST: Connection ===".bright_cyan().bold());

    let mut subscriber = connect(base_url, "Subscriber A").await?;
    tokio::time::sleep(SETTLE).await;

    println!("{} Publishing 11...", "→".blue());
    let response = api_client.notify(11).await?;
    if !response.accepted() {
        subscriber.disconnect();
        return Ok(TestResult::fail(
            scenario,
            format!("Notify declined: {} {}", response.status, response.body),
            start.elapsed(),
        ));
    }

    let result = match subscriber.next_value(EVENT_TIMEOUT).await {
        Ok(11) => {
            println!("{} Subscriber A received 11", "✓".green());
            TestResult::pass(scenario, start.elapsed())
        }
        Ok(other) => TestResult::fail(
            scenario,
            format!("Expected 11, got {}", other),
            start.elapsed(),
        ),
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            TestResult::fail(scenario, e.to_string(), start.elapsed())
        }
    };

    subscriber.disconnect();
    Ok(result)
}

pub async fn test_republish(base_url: &str, api_client: &ApiClient) -> Result<TestResult> {
    let start = Instant::now();
    let scenario = "republish";

    println!("\n{}", "=== TEST: Republish To Two Subscribers ===".bright_cyan().bold());

    let mut first = connect(base_url, "Subscriber A").await?;
    let mut second = connect(base_url, "Subscriber B").await?;
    tokio::time::sleep(SETTLE).await;

    println!("{} Storing 5 and requesting a republish...", "→".blue());
    api_client.update(5).await?;
    let stored = api_client.client_data().await?;
    if stored != 5 {
        first.disconnect();
        second.disconnect();
        return Ok(TestResult::fail(
            scenario,
            format!("Expected stored value 5, read {}", stored),
            start.elapsed(),
        ));
    }

    let response = api_client.republish().await?;
    if !response.accepted() {
        first.disconnect();
        second.disconnect();
        return Ok(TestResult::fail(
            scenario,
            format!("Republish declined: {} {}", response.status, response.body),
            start.elapsed(),
        ));
    }

    let mut failures = Vec::new();
    for connection in [&mut first, &mut second] {
        match connection.next_event(EVENT_TIMEOUT).await {
            Ok(event) if event.value() == Some(5) => {
                print_event(&connection.label, &event);
            }
            Ok(event) => failures.push(format!("{} got {}", connection.label, event.data)),
            Err(e) => failures.push(format!("{}: {}", connection.label, e)),
        }
    }

    first.disconnect();
    second.disconnect();

    if failures.is_empty() {
        println!("{} Both subscribers received 5", "✓".green());
        Ok(TestResult::pass(scenario, start.elapsed()))
    } else {
        Ok(TestResult::fail(scenario, failures.join("; "), start.elapsed()))
    }
}

pub async fn test_notify_after_disconnect(
    base_url: &str,
    api_client: &ApiClient,
) -> Result<TestResult> {
    let start = Instant::now();
    let scenario = "notify_after_disconnect";

    println!("\n{}", "=== TEST: Notify After Disconnect ===".bright_cyan().bold());

    let mut staying = connect(base_url, "Subscriber A").await?;
    let leaving = connect(base_url, "Subscriber B").await?;
    tokio::time::sleep(SETTLE).await;

    println!("{} Subscriber B disconnecting...", "→".blue());
    leaving.disconnect();
    tokio::time::sleep(SETTLE).await;

    println!("{} Publishing 7...", "→".blue());
    let response = api_client.notify(7).await?;
    if !response.accepted() {
        staying.disconnect();
        return Ok(TestResult::fail(
            scenario,
            format!("Notify declined: {} {}", response.status, response.body),
            start.elapsed(),
        ));
    }

    let result = match staying.next_value(EVENT_TIMEOUT).await {
        Ok(7) => {
            println!("{} Subscriber A still receives updates", "✓".green());
            TestResult::pass(scenario, start.elapsed())
        }
        Ok(other) => TestResult::fail(
            scenario,
            format!("Expected 7, got {}", other),
            start.elapsed(),
        ),
        Err(e) => TestResult::fail(scenario, e.to_string(), start.elapsed()),
    };

    staying.disconnect();
    Ok(result)
}
