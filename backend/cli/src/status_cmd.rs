//! CLI Status Command
//!
//! Queries a running relay's health endpoint.

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Health {
    status: String,
    version: String,
    sessions: usize,
    keyed_sessions: usize,
}

pub async fn run(port: u16) -> Result<()> {
    let url = format!("http://localhost:{port}/api/health");
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) => {
            let health: Health = resp.error_for_status()?.json().await?;
            println!("KeyRelay v{} is {}", health.version, health.status);
            println!("  Sessions: {} ({} keyed)", health.sessions, health.keyed_sessions);
        }
        Err(_) => {
            println!("KeyRelay is not running on port {port}");
        }
    }

    Ok(())
}
