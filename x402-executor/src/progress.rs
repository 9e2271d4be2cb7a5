//! Progress events and the channel that carries them from an execution to its caller.
//!
//! One producer ([`ProgressSink`]) and one consumer ([`ProgressStream`]). The consumer can stop
//! at any time, by calling [`ProgressStream::cancel`] or by dropping the stream; the producer
//! observes that through the shared [`CancellationToken`] and stops before its next network call.
//!
//! Across HTTP the same events travel as NDJSON, one event per line: see [`encode_frame`] and
//! [`NdjsonDecoder`].

use std::{
    pin::Pin,
    task::{Context, Poll},
    time::{SystemTime, UNIX_EPOCH},
};

use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use x402_core::types::AnyJson;

use crate::errors::ExecutionError;

/// Events buffered between producer and consumer before the producer waits.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressEventKind {
    Progress,
    PaymentRequired,
    Signing,
    Settled,
    Error,
}

impl ProgressEventKind {
    /// `settled` and `error` end an execution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEventKind::Settled | ProgressEventKind::Error)
    }
}

/// One step of an execution, as shown on the caller's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressEventKind,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<AnyJson>,
}

impl ProgressEvent {
    pub fn new(kind: ProgressEventKind, message: impl Into<String>) -> Self {
        ProgressEvent {
            kind,
            message: message.into(),
            timestamp: now_millis(),
            payload: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ProgressEventKind::Error, message)
    }

    pub fn with_payload(mut self, payload: AnyJson) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Create a connected producer/consumer pair.
pub fn progress_channel() -> (ProgressSink, ProgressStream) {
    let (sender, receiver) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let token = CancellationToken::new();
    let sink = ProgressSink {
        sender,
        token: token.clone(),
    };
    let stream = ProgressStream {
        receiver,
        token,
        finished: false,
    };
    (sink, stream)
}

/// Producer half, held by whoever drives the execution.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    sender: mpsc::Sender<ProgressEvent>,
    token: CancellationToken,
}

impl ProgressSink {
    /// Deliver one event. Fails with [`ExecutionError::Cancelled`] once the consumer is gone.
    pub async fn emit(&self, event: ProgressEvent) -> Result<(), ExecutionError> {
        if self.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ExecutionError::Cancelled),
            sent = self.sender.send(event) => sent.map_err(|_| ExecutionError::Cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.sender.is_closed()
    }

    /// Resolves once the consumer cancels or goes away.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = self.sender.closed() => {}
        }
    }
}

/// Consumer half: a [`Stream`] of events in production order.
///
/// The stream ends after a terminal event, when the producer finishes, or on cancellation.
/// Dropping it cancels the execution.
#[derive(Debug)]
pub struct ProgressStream {
    receiver: mpsc::Receiver<ProgressEvent>,
    token: CancellationToken,
    finished: bool,
}

impl ProgressStream {
    /// A stream that yields `event` and ends. Used to report failures detected before any
    /// execution starts.
    pub fn once(event: ProgressEvent) -> Self {
        let (sink, stream) = progress_channel();
        // Capacity is never zero, so the first send always fits.
        let _ = sink.sender.try_send(event);
        stream
    }

    /// Stop the execution. Events not yet received are discarded.
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.receiver.close();
        self.finished = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A handle that cancels this stream's execution when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        if self.token.is_cancelled() {
            self.cancel();
            return Poll::Ready(None);
        }

        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    self.finished = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Serialize one event as an NDJSON line.
pub fn encode_frame(event: &ProgressEvent) -> Result<Bytes, serde_json::Error> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Incremental NDJSON reader. Chunks may split lines anywhere.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: BytesMut,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event completed by it.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<ProgressEvent>, ExecutionError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(newline + 1);
            if let Some(event) = parse_line(&line[..newline])? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Parse whatever is left once the body has ended; a final line needs no newline.
    pub fn finish(mut self) -> Result<Option<ProgressEvent>, ExecutionError> {
        let rest = self.buffer.split();
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Result<Option<ProgressEvent>, ExecutionError> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(line)
        .map(Some)
        .map_err(|err| ExecutionError::Protocol(format!("Invalid progress frame: {err}")))
}
