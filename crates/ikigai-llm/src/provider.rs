//! The provider abstraction (spec §6 "HTTP transport").
//!
//! The spec describes the transport as a libcurl-multi-style surface:
//! `fdset`/`timeout`/`perform`/`info_read` driven from a `select()` loop,
//! plus `start_request`/`start_stream`/`cancel`/`cleanup`. This crate's
//! event loop is built on `tokio::select!` rather than raw `select(2)`, so
//! that surface is expressed the idiomatic-async way: `start_stream`
//! returns a `Stream` the event loop polls as one of its `select!`
//! branches (the `fdset`/`perform`/`info_read` triad collapses into
//! `Stream::poll_next`), and `cancel` is a [`CancellationToken`] the
//! provider checks between chunks (the async-signal-safe, non-blocking
//! primitive the spec requires). This mirrors `arawn-agent::stream`'s use
//! of `tokio_util::sync::CancellationToken` for the same purpose.

use std::pin::Pin;

use async_stream::stream as async_stream_ready;
use futures::Stream;
use ikigai_types::{Request, Response, StreamEvent};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A boxed stream of stream events for one request.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// A concrete LLM provider (one "provider family", e.g. Gemini).
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Provider name, for logging and persistence (`response_metadata.model`
    /// is reported separately, by the response itself).
    fn name(&self) -> &str;

    /// Non-streaming request (spec §6 `start_request`).
    async fn complete(&self, request: Request) -> Result<Response>;

    /// Start a streaming request (spec §6 `start_stream`). Returns a stream
    /// of [`StreamEvent`]s and the [`CancellationToken`] that stands in for
    /// `cancel()` — cancelling it causes the stream to end with no further
    /// events, non-blockingly, from any task (spec §4.5, §5 "Cancellation").
    fn stream(&self, request: Request) -> (EventStream, CancellationToken);
}

/// Helper used by provider implementations to build a cancellable stream
/// from an inner stream, short-circuiting once the token fires.
pub fn with_cancellation(
    token: CancellationToken,
    inner: EventStream,
) -> EventStream {
    Box::pin(async_stream_ready! {
        use futures::StreamExt;
        tokio::pin!(inner);
        loop {
            tokio::select! {
                _ = token.cancelled() => { break; }
                maybe = inner.next() => {
                    match maybe {
                        Some(event) => yield event,
                        None => break,
                    }
                }
            }
        }
    })
}
