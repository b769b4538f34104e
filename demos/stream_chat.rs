//! Streaming chat example.
//!
//! Run with:
//! ```bash
//! export MAICHAT_BASE_URL="http://127.0.0.1:8000/mai_chat/api/chat"
//! cargo run --example stream_chat -- "아델 스킬 트리 알려줘"
//! ```
//!
//! Press Ctrl-C to cancel the reply mid-stream.

use std::io::Write;
use std::sync::Arc;

use maichat::{spawn_stream, ChatApi, ChatClient, EventKind, StreamUpdate};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Hello!".to_string());

    let client = Arc::new(ChatClient::from_env()?);
    let session = client.create_session().await?;
    println!("Session {}\n", session.id);

    let mut handle = spawn_stream(client.clone(), session.id.clone(), question);
    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(update) = handle.next_update().await {
        match update {
            StreamUpdate::Chunk(event) => match event.kind {
                EventKind::Token => {
                    print!("{}", event.content);
                    std::io::stdout().flush()?;
                }
                EventKind::Error => eprintln!("\n[server error] {}", event.content),
                EventKind::Other(kind) => eprintln!("\n[{}] {}", kind, event.content),
            },
            StreamUpdate::Done => println!("\n\n=== Stream Complete ==="),
            StreamUpdate::Error(e) => {
                eprintln!("\nError in stream: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}
