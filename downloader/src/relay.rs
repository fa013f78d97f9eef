/// Stream relay: adapts a push-style upstream byte source into the
/// pull-style body stream an HTTP layer drains chunk by chunk.
///
/// The bridge is a bounded channel plus a pump task. The pump owns the
/// source and the session, so data/end/error handling is strictly
/// sequential and the `finished` flag needs no lock. A full channel
/// suspends the pump, which therefore stops pulling from upstream until
/// the consumer catches up.
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use vidpipe_shared::errors::StreamError;

/// Chunks buffered between the pump and the response body.
pub const RELAY_BUFFER_CHUNKS: usize = 8;

/// One event from an upstream byte source.
#[derive(Debug)]
pub enum SourceEvent {
    Data(Bytes),
    End,
    Error(StreamError),
}

/// A push-style byte producer: emits data chunks at its own pace until an
/// end or error event.
#[async_trait]
pub trait ByteSource: Send {
    /// Wait for the next upstream event. After `End` or `Error` the source
    /// keeps returning `End`.
    async fn next_event(&mut self) -> SourceEvent;

    /// Release the underlying transport immediately. Called when the
    /// downstream consumer disconnects before the source finishes; this is
    /// the only teardown path that bypasses the end/error events.
    fn destroy(&mut self);
}

#[async_trait]
impl ByteSource for Box<dyn ByteSource> {
    async fn next_event(&mut self) -> SourceEvent {
        (**self).next_event().await
    }

    fn destroy(&mut self) {
        (**self).destroy();
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// [`ByteSource`] over a live reqwest response body.
pub struct HttpByteSource {
    inner: Option<ByteStream>,
}

impl HttpByteSource {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            inner: Some(Box::pin(response.bytes_stream())),
        }
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn next_event(&mut self) -> SourceEvent {
        let Some(stream) = self.inner.as_mut() else {
            return SourceEvent::End;
        };
        match stream.next().await {
            Some(Ok(chunk)) => SourceEvent::Data(chunk),
            Some(Err(e)) => {
                self.inner = None;
                SourceEvent::Error(StreamError::Upstream(e.to_string()))
            }
            None => {
                self.inner = None;
                SourceEvent::End
            }
        }
    }

    fn destroy(&mut self) {
        // Dropping the stream drops the connection with it.
        self.inner = None;
    }
}

/// One relay session, scoped to a single HTTP response.
///
/// The `finished` flag is the single-writer transition guard: exactly one
/// of close / error-terminate reaches the outbound channel, and nothing is
/// sent after it. Close itself is dropping the sender with the session.
pub struct RelaySession {
    tx: mpsc::Sender<Result<Bytes, StreamError>>,
    finished: bool,
}

impl RelaySession {
    pub fn new(tx: mpsc::Sender<Result<Bytes, StreamError>>) -> Self {
        Self { tx, finished: false }
    }

    /// Forward one chunk downstream. Returns `false` when the session is
    /// already finished or the consumer has gone away.
    pub async fn forward(&mut self, chunk: Bytes) -> bool {
        if self.finished {
            return false;
        }
        if self.tx.send(Ok(chunk)).await.is_err() {
            self.finished = true;
            return false;
        }
        true
    }

    /// Mark the session cleanly finished. Idempotent.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Propagate a terminal upstream failure. After the first terminal
    /// action every later signal is a no-op.
    pub async fn fail(&mut self, err: StreamError) {
        if self.finished {
            return;
        }
        self.finished = true;
        let _ = self.tx.send(Err(err)).await;
    }

    /// Resolves once the consumer side of the channel is gone.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Bridge an upstream source onto a bounded channel and return the pull
/// side, suitable for `Body::from_stream`.
///
/// Exactly one of three things ends the session: upstream end (clean
/// close), upstream error (terminal failure on the body), or consumer
/// disconnect (upstream destroyed without touching the channel).
pub fn relay<S>(mut source: S) -> ReceiverStream<Result<Bytes, StreamError>>
where
    S: ByteSource + 'static,
{
    let (tx, rx) = mpsc::channel(RELAY_BUFFER_CHUNKS);
    tokio::spawn(async move {
        let mut session = RelaySession::new(tx);
        loop {
            // Race the pull against channel closure so a stalled upstream
            // cannot keep the transport alive after the consumer hangs up.
            let event = tokio::select! {
                _ = session.closed() => None,
                event = source.next_event() => Some(event),
            };
            let Some(event) = event else {
                source.destroy();
                return;
            };
            match event {
                SourceEvent::Data(chunk) => {
                    if !session.forward(chunk).await {
                        // Consumer hung up mid-transfer; release upstream
                        // before anything else happens.
                        source.destroy();
                        return;
                    }
                }
                SourceEvent::End => {
                    session.finish();
                    return;
                }
                SourceEvent::Error(err) => {
                    session.fail(err).await;
                    return;
                }
            }
        }
    });
    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Source driven by a fixed script of events.
    struct ScriptedSource {
        events: VecDeque<SourceEvent>,
        /// When set, produce data forever once the script runs out.
        endless: bool,
        /// When set, never resolve once the script runs out.
        stall: bool,
        destroyed: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(events: Vec<SourceEvent>) -> (Self, Arc<AtomicUsize>) {
            let destroyed = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    events: events.into(),
                    endless: false,
                    stall: false,
                    destroyed: destroyed.clone(),
                },
                destroyed,
            )
        }

        fn endless() -> (Self, Arc<AtomicUsize>) {
            let (mut src, destroyed) = Self::new(Vec::new());
            src.endless = true;
            (src, destroyed)
        }

        fn stalled_after(events: Vec<SourceEvent>) -> (Self, Arc<AtomicUsize>) {
            let (mut src, destroyed) = Self::new(events);
            src.stall = true;
            (src, destroyed)
        }
    }

    #[async_trait]
    impl ByteSource for ScriptedSource {
        async fn next_event(&mut self) -> SourceEvent {
            match self.events.pop_front() {
                Some(event) => event,
                None if self.endless => SourceEvent::Data(Bytes::from_static(b"x")),
                None if self.stall => std::future::pending().await,
                None => SourceEvent::End,
            }
        }

        fn destroy(&mut self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            self.events.clear();
            self.endless = false;
            self.stall = false;
        }
    }

    #[tokio::test]
    async fn forwards_chunks_in_order_then_closes() {
        let (source, _) = ScriptedSource::new(vec![
            SourceEvent::Data(Bytes::from_static(b"one-")),
            SourceEvent::Data(Bytes::from_static(b"two-")),
            SourceEvent::Data(Bytes::from_static(b"three")),
            SourceEvent::End,
        ]);

        let mut stream = relay(source);
        let mut collected = Vec::new();
        while let Some(item) = stream.next().await {
            collected.extend_from_slice(&item.expect("no stream error expected"));
        }
        assert_eq!(collected, b"one-two-three");
    }

    #[tokio::test]
    async fn upstream_error_terminates_the_body() {
        let (source, _) = ScriptedSource::new(vec![
            SourceEvent::Data(Bytes::from_static(b"partial")),
            SourceEvent::Error(StreamError::Upstream("connection reset".into())),
            // Anything after the error must never reach the consumer.
            SourceEvent::Data(Bytes::from_static(b"late")),
            SourceEvent::End,
        ]);

        let mut stream = relay(source);
        assert!(matches!(stream.next().await, Some(Ok(b)) if b == "partial"));
        assert!(matches!(stream.next().await, Some(Err(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn consumer_disconnect_destroys_upstream_once() {
        let (source, destroyed) = ScriptedSource::endless();

        let mut stream = relay(source);
        // Drain one chunk to prove the relay is live, then hang up.
        assert!(stream.next().await.is_some());
        drop(stream);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while destroyed.load(Ordering::SeqCst) == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_during_a_stalled_pull_destroys_upstream() {
        // The pump must not wait for the next chunk to notice the hangup.
        let (source, destroyed) =
            ScriptedSource::stalled_after(vec![SourceEvent::Data(Bytes::from_static(b"head"))]);

        let mut stream = relay(source);
        assert!(matches!(stream.next().await, Some(Ok(b)) if b == "head"));
        drop(stream);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while destroyed.load(Ordering::SeqCst) == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_terminal_signal_is_a_noop() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = RelaySession::new(tx);

        assert!(session.forward(Bytes::from_static(b"a")).await);
        session.fail(StreamError::Upstream("boom".into())).await;
        session.finish();
        assert!(!session.forward(Bytes::from_static(b"b")).await);
        assert!(session.is_finished());
        drop(session);

        assert!(matches!(rx.recv().await, Some(Ok(b)) if b == "a"));
        assert!(matches!(rx.recv().await, Some(Err(_))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn error_after_finish_is_a_noop() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = RelaySession::new(tx);

        session.finish();
        session.fail(StreamError::Upstream("too late".into())).await;
        drop(session);

        // The channel closes without a single event reaching it.
        assert!(rx.recv().await.is_none());
    }
}
