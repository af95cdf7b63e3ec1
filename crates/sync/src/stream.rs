//! Bounded, cancellable chunk streams.
//!
//! Each remote request is served by a producer task writing into a bounded
//! channel. The consumer half owns a cancellation token: cancelling it, or
//! dropping the stream, makes the producer's next send fail so the task
//! exits instead of blocking forever.

#[cfg(test)]
#[path = "tests/stream.rs"]
mod tests;

use core::pin::Pin;
use core::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Creates a connected producer/consumer pair. A zero capacity is raised to
/// one.
#[must_use]
pub fn channel<T>(capacity: usize) -> (ChunkSender<T>, ChunkStream<T>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let token = CancellationToken::new();

    (
        ChunkSender {
            sender,
            token: token.clone(),
        },
        ChunkStream { receiver, token },
    )
}

/// Consumer half. Yields chunks in the order they were produced and ends
/// when the producer finishes.
#[derive(Debug)]
pub struct ChunkStream<T> {
    receiver: mpsc::Receiver<T>,
    token: CancellationToken,
}

impl<T> ChunkStream<T> {
    /// A stream that is already closed and yields nothing.
    #[must_use]
    pub fn closed() -> Self {
        let (_, stream) = channel(1);
        stream
    }

    /// Waits for the next chunk. `None` once the stream is exhausted or
    /// cancelled.
    pub async fn next_chunk(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Stops the producer. Chunks already buffered are discarded.
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token observed by the producer; cancelling it has the same effect as
    /// [`cancel`](Self::cancel) minus the buffer drain.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl<T> Stream for ChunkStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl<T> Drop for ChunkStream<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Producer half.
#[derive(Debug)]
pub struct ChunkSender<T> {
    sender: mpsc::Sender<T>,
    token: CancellationToken,
}

impl<T: Send> ChunkSender<T> {
    /// Delivers `chunk`, waiting for buffer space. Returns `false` when the
    /// consumer has cancelled or gone away; the producer should stop.
    pub async fn send(&self, chunk: T) -> bool {
        if self.token.is_cancelled() {
            return false;
        }

        tokio::select! {
            biased;
            () = self.token.cancelled() => false,
            sent = self.sender.send(chunk) => sent.is_ok(),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.sender.is_closed()
    }
}
