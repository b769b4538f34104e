//! Lists chat sessions and prints the history of the most recent one.
//!
//! Run with:
//! ```bash
//! cargo run --example sessions
//! ```

use maichat::{ChatApi, ChatClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = ChatClient::from_env()?;
    let sessions = client.list_sessions().await?;

    if sessions.is_empty() {
        println!("No sessions yet.");
        return Ok(());
    }

    for session in &sessions {
        println!(
            "{}  {}",
            session.id,
            session.created_at.as_deref().unwrap_or("-")
        );
    }

    let latest = &sessions[0];
    println!("\n=== History of {} ===", latest.id);
    for message in client.get_messages(&latest.id).await? {
        if let Some(thinking) = &message.thinking {
            println!("({}) thinking: {}", message.role, thinking);
        }
        println!("{}: {}", message.role, message.content);
    }

    Ok(())
}
