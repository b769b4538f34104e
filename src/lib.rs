//! # maichat - client for the MAI chat backend
//!
//! An async client for the MapleStory fan-site chat service: session
//! management over REST and incremental reply streaming over Server-Sent
//! Events.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Stateful SSE decoding that survives arbitrary chunking (split UTF-8
//!   characters, split frame delimiters)
//! - Malformed frames are skipped without ending the stream
//! - Exactly one terminal notification per streamed send
//! - Cancellation through `tokio_util`'s `CancellationToken`
//!
//! ## Architecture
//!
//! - [`sse`]: bytes to frames
//! - [`stream`]: frames to [`StreamEvent`]s, observer dispatch, spawned handles
//! - [`client`]: the [`ChatApi`] trait and [`ClientError`]
//! - [`backend`]: [`ChatClient`], the HTTP implementation
//! - [`conversation`]: message list and busy state of one chat view
//!
//! ## Example
//! ```no_run
//! use maichat::{ChatApi, ChatClient, Callbacks, ClientError, StreamEvent};
//! use maichat::options::ClientOptions;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::new(ClientOptions::default())?;
//!     let session = client.create_session().await?;
//!
//!     let mut observer = Callbacks::new(
//!         |event: StreamEvent| print!("{}", event.content),
//!         || println!(),
//!         |error: ClientError| eprintln!("stream failed: {}", error),
//!     );
//!
//!     client
//!         .stream_message(&session.id, "추천 사냥터 알려줘", &mut observer, &CancellationToken::new())
//!         .await;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod client;
pub mod conversation;
pub mod http;
pub mod model;
pub mod options;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use backend::ChatClient;
pub use client::{ChatApi, ClientError};
pub use conversation::{Conversation, ConversationError};
pub use model::{EventKind, Session, SessionMessage, StreamEvent};
pub use stream::{spawn_stream, Callbacks, StreamHandle, StreamObserver, StreamOutcome, StreamUpdate};
