//! Dispatch of streamed chat events.
//!
//! [`drive`] consumes the frames produced by [`crate::sse`], parses each
//! payload into a [`StreamEvent`] and reports to a [`StreamObserver`]. A
//! frame whose payload is not valid JSON is logged and skipped; it never ends
//! the stream. Whatever happens, the observer receives exactly one terminal
//! call: `on_done` or `on_error`.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::error::Category;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::client::{ChatApi, ClientError};
use crate::model::StreamEvent;
use crate::sse::SseFrame;

/// Receiver of streaming progress.
pub trait StreamObserver {
    /// A parsed event, in stream order.
    fn on_chunk(&mut self, event: StreamEvent);

    /// The stream finished normally.
    fn on_done(&mut self);

    /// The stream failed. Nothing else is reported afterwards.
    fn on_error(&mut self, error: ClientError);
}

/// How a streaming call terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `on_done` was called.
    Done,
    /// `on_error` was called.
    Failed,
}

/// Adapts three closures to [`StreamObserver`].
///
/// # Example
/// ```
/// use maichat::stream::Callbacks;
/// use maichat::{ClientError, StreamEvent};
///
/// let mut reply = String::new();
/// let observer = Callbacks::new(
///     |event: StreamEvent| reply.push_str(&event.content),
///     || println!("done"),
///     |error: ClientError| eprintln!("failed: {}", error),
/// );
/// # drop(observer);
/// ```
pub struct Callbacks<C, D, E> {
    on_chunk: C,
    on_done: D,
    on_error: E,
}

impl<C, D, E> Callbacks<C, D, E>
where
    C: FnMut(StreamEvent),
    D: FnMut(),
    E: FnMut(ClientError),
{
    pub fn new(on_chunk: C, on_done: D, on_error: E) -> Self {
        Self {
            on_chunk,
            on_done,
            on_error,
        }
    }
}

impl<C, D, E> StreamObserver for Callbacks<C, D, E>
where
    C: FnMut(StreamEvent),
    D: FnMut(),
    E: FnMut(ClientError),
{
    fn on_chunk(&mut self, event: StreamEvent) {
        (self.on_chunk)(event)
    }

    fn on_done(&mut self) {
        (self.on_done)()
    }

    fn on_error(&mut self, error: ClientError) {
        (self.on_error)(error)
    }
}

/// Parse one frame payload.
pub fn parse_event(payload: &str) -> Result<StreamEvent, serde_json::Error> {
    serde_json::from_str(payload)
}

fn skip_reason(error: &serde_json::Error) -> &'static str {
    match error.classify() {
        Category::Data => "payload is JSON but not a stream event",
        _ => "payload is not valid JSON",
    }
}

/// Drive a frame stream to completion, reporting to `observer`.
///
/// The only suspension point is the wait for the next frame, raced against
/// `cancel`. Returns without polling `frames` again once a terminal call has
/// been made.
pub async fn drive<S, O>(frames: S, observer: &mut O, cancel: &CancellationToken) -> StreamOutcome
where
    S: Stream<Item = Result<SseFrame, ClientError>>,
    O: StreamObserver + ?Sized,
{
    futures::pin_mut!(frames);
    let mut dispatched = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(dispatched, "chat stream cancelled");
                observer.on_error(ClientError::StreamCancelled);
                return StreamOutcome::Failed;
            }
            next = frames.next() => next,
        };

        match next {
            Some(Ok(SseFrame::Data(payload))) => match parse_event(&payload) {
                Ok(event) => {
                    dispatched += 1;
                    observer.on_chunk(event);
                }
                Err(e) => warn!(
                    error = %e,
                    payload = %payload,
                    reason = skip_reason(&e),
                    "skipping malformed stream frame"
                ),
            },
            Some(Ok(SseFrame::Done)) => {
                debug!(dispatched, "chat stream finished");
                observer.on_done();
                return StreamOutcome::Done;
            }
            Some(Err(e)) => {
                warn!(error = %e, dispatched, "chat stream failed");
                observer.on_error(e);
                return StreamOutcome::Failed;
            }
            None => {
                debug!(dispatched, "chat stream closed without done marker");
                observer.on_done();
                return StreamOutcome::Done;
            }
        }
    }
}

/// Observer that buffers every event, used by `ChatApi::stream_events`.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<StreamEvent>,
    error: Option<ClientError>,
}

impl EventCollector {
    pub fn into_result(self) -> Result<Vec<StreamEvent>, ClientError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.events),
        }
    }
}

impl StreamObserver for EventCollector {
    fn on_chunk(&mut self, event: StreamEvent) {
        self.events.push(event);
    }

    fn on_done(&mut self) {}

    fn on_error(&mut self, error: ClientError) {
        self.error = Some(error);
    }
}

/// Progress of a spawned stream, see [`spawn_stream`].
#[derive(Debug)]
pub enum StreamUpdate {
    Chunk(StreamEvent),
    Done,
    Error(ClientError),
}

impl StreamUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamUpdate::Chunk(_))
    }
}

struct ChannelObserver {
    tx: mpsc::UnboundedSender<StreamUpdate>,
}

impl StreamObserver for ChannelObserver {
    // A closed receiver means the handle is gone; its drop guard cancels the stream.
    fn on_chunk(&mut self, event: StreamEvent) {
        let _ = self.tx.send(StreamUpdate::Chunk(event));
    }

    fn on_done(&mut self) {
        let _ = self.tx.send(StreamUpdate::Done);
    }

    fn on_error(&mut self, error: ClientError) {
        let _ = self.tx.send(StreamUpdate::Error(error));
    }
}

/// Handle to a stream running on the tokio runtime.
///
/// Dropping the handle cancels the stream and releases its connection.
pub struct StreamHandle {
    updates: mpsc::UnboundedReceiver<StreamUpdate>,
    cancel: CancellationToken,
    guard: DropGuard,
    task: JoinHandle<StreamOutcome>,
}

impl StreamHandle {
    /// Next update. Returns `None` after the terminal update has been received.
    pub async fn next_update(&mut self) -> Option<StreamUpdate> {
        self.updates.recv().await
    }

    /// Stop the stream. The observer side reports `StreamCancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the stream task to finish, discarding undelivered updates.
    pub async fn join(self) -> Result<StreamOutcome, JoinError> {
        let StreamHandle { guard, task, .. } = self;
        let outcome = task.await;
        let _token = guard.disarm();
        outcome
    }
}

/// Run `stream_message` on a background task and expose its progress as a
/// channel of [`StreamUpdate`]s.
pub fn spawn_stream<A>(api: Arc<A>, session_id: String, content: String) -> StreamHandle
where
    A: ChatApi + ?Sized + 'static,
{
    let (tx, updates) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    let task = tokio::spawn(async move {
        let mut observer = ChannelObserver { tx };
        api.stream_message(&session_id, &content, &mut observer, &task_cancel)
            .await
    });

    StreamHandle {
        updates,
        guard: cancel.clone().drop_guard(),
        cancel,
        task,
    }
}
