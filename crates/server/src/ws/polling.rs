use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt, future::BoxFuture};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{error, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(15);

pub type SnapshotFetcher<T, E> = Box<dyn FnMut() -> BoxFuture<'static, Result<T, E>> + Send>;

enum PollStep {
    Continue,
    Close,
}

/// Per-connection polling engine. Repeatedly invokes a fetcher and forwards
/// the payload over the socket only when its fingerprint changed since the
/// last send, so an idle task costs no bandwidth. A keepalive ping runs on
/// its own cadence, unaffected by slow fetches.
///
/// The loop owns all of its timers; every exit path (peer close, close
/// predicate, fatal fetch error) drops them with the loop, so nothing keeps
/// firing after the connection is gone.
pub struct PollingChannel<T, E> {
    fetch: SnapshotFetcher<T, E>,
    should_close: Option<Box<dyn Fn(&T) -> bool + Send>>,
    fingerprint: Option<Box<dyn Fn(&T) -> String + Send>>,
    is_non_fatal: Option<Box<dyn Fn(&E) -> bool + Send>>,
    poll_interval: Duration,
    ping_interval: Duration,
    last_fingerprint: Option<String>,
}

impl<T, E> PollingChannel<T, E>
where
    T: Serialize,
    E: std::fmt::Display,
{
    pub fn new(fetch: SnapshotFetcher<T, E>) -> Self {
        Self {
            fetch,
            should_close: None,
            fingerprint: None,
            is_non_fatal: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ping_interval: DEFAULT_PING_INTERVAL,
            last_fingerprint: None,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Close the connection once this predicate holds for a fetched payload.
    /// The closing payload is still sent first if it changed.
    pub fn should_close(mut self, predicate: impl Fn(&T) -> bool + Send + 'static) -> Self {
        self.should_close = Some(Box::new(predicate));
        self
    }

    /// Overrides the change-detection key. Defaults to serialized equality
    /// of the whole payload.
    pub fn fingerprint(mut self, f: impl Fn(&T) -> String + Send + 'static) -> Self {
        self.fingerprint = Some(Box::new(f));
        self
    }

    /// Fetch errors matching this classifier are logged and polling
    /// continues; all others close the connection.
    pub fn non_fatal_errors(mut self, classifier: impl Fn(&E) -> bool + Send + 'static) -> Self {
        self.is_non_fatal = Some(Box::new(classifier));
        self
    }

    /// Drives the connection until it closes. The first fetch starts
    /// immediately, so subscribers get an initial frame without waiting a
    /// full poll interval.
    ///
    /// The fetch in flight is held as its own select arm rather than awaited
    /// inline, so a slow fetch never stalls keepalive pings or inbound close
    /// handling. A new fetch only starts once the previous one resolved.
    pub async fn run<S>(mut self, socket: S)
    where
        S: Stream<Item = Result<Message, axum::Error>> + Sink<Message> + Unpin + Send,
    {
        let (mut sender, mut receiver) = socket.split();

        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ping = tokio::time::interval(self.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval's first tick resolves immediately; the fetch started below
        // covers it, and the first ping is not due yet.
        poll.tick().await;
        ping.tick().await;

        let mut in_flight: Option<BoxFuture<'static, Result<T, E>>> = Some((self.fetch)());

        loop {
            tokio::select! {
                _ = poll.tick(), if in_flight.is_none() => {
                    in_flight = Some((self.fetch)());
                }
                result = resolve(&mut in_flight), if in_flight.is_some() => {
                    if matches!(self.handle_fetched(result, &mut sender).await, PollStep::Close) {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                msg = receiver.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }

        let _ = sender.send(Message::Close(None)).await;
    }

    async fn handle_fetched<W>(&mut self, result: Result<T, E>, sender: &mut W) -> PollStep
    where
        W: Sink<Message> + Unpin + Send,
    {
        let payload = match result {
            Ok(payload) => payload,
            Err(e) if self.is_non_fatal.as_ref().is_some_and(|f| f(&e)) => {
                warn!("status poll failed, retrying: {}", e);
                return PollStep::Continue;
            }
            Err(e) => {
                error!("status poll failed: {}", e);
                return PollStep::Close;
            }
        };

        let serialized = match serde_json::to_string(&payload) {
            Ok(serialized) => serialized,
            Err(e) => {
                error!("failed to serialize status payload: {}", e);
                return PollStep::Close;
            }
        };

        let fingerprint = match &self.fingerprint {
            Some(f) => f(&payload),
            None => serialized.clone(),
        };

        if self.last_fingerprint.as_deref() != Some(fingerprint.as_str()) {
            if sender.send(Message::Text(serialized.into())).await.is_err() {
                return PollStep::Close;
            }
            self.last_fingerprint = Some(fingerprint);
        }

        if self.should_close.as_ref().is_some_and(|f| f(&payload)) {
            return PollStep::Close;
        }

        PollStep::Continue
    }
}

/// Awaits the fetch held in the slot and clears it once resolved. An empty
/// slot pends forever; the select arm guard keeps it disabled in that case.
async fn resolve<T, E>(slot: &mut Option<BoxFuture<'static, Result<T, E>>>) -> Result<T, E> {
    match slot {
        Some(fetch) => {
            let result = fetch.await;
            *slot = None;
            result
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::testing::TestSocket;
    use futures_util::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fetcher_from(
        values: Vec<Result<serde_json::Value, String>>,
    ) -> (SnapshotFetcher<serde_json::Value, String>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fetch: SnapshotFetcher<serde_json::Value, String> = Box::new(move || {
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let result = values
                .get(index.min(values.len() - 1))
                .cloned()
                .unwrap_or(Err("exhausted".to_string()));
            async move { result }.boxed()
        });
        (fetch, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_payload_is_sent_exactly_once() {
        let socket = TestSocket::new();
        let (fetch, _calls) = fetcher_from(vec![Ok(serde_json::json!({"status": "running"}))]);

        let channel = PollingChannel::new(fetch);
        let handle = tokio::spawn(channel.run(socket.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.abort();

        assert_eq!(socket.texts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn change_then_revert_sends_three_frames() {
        let socket = TestSocket::new();
        let a = serde_json::json!({"status": "a"});
        let b = serde_json::json!({"status": "b"});
        let (fetch, _calls) = fetcher_from(vec![Ok(a.clone()), Ok(b), Ok(a)]);

        let channel = PollingChannel::new(fetch);
        let handle = tokio::spawn(channel.run(socket.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.abort();

        let texts = socket.texts();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("\"a\""));
        assert!(texts[1].contains("\"b\""));
        assert!(texts[2].contains("\"a\""));
    }

    #[tokio::test(start_paused = true)]
    async fn close_predicate_stops_fetching_and_closes() {
        let socket = TestSocket::new();
        let (fetch, calls) = fetcher_from(vec![Ok(serde_json::json!({"status": "completed"}))]);

        let channel = PollingChannel::new(fetch)
            .should_close(|payload: &serde_json::Value| payload["status"] == "completed");
        channel.run(socket.clone()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(socket.texts().len(), 1);
        assert_eq!(socket.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_fatal_errors_keep_the_connection_polling() {
        let socket = TestSocket::new();
        let (fetch, _calls) = fetcher_from(vec![
            Err("transient".to_string()),
            Err("transient".to_string()),
            Ok(serde_json::json!({"status": "running"})),
        ]);

        let channel =
            PollingChannel::new(fetch).non_fatal_errors(|e: &String| e.contains("transient"));
        let handle = tokio::spawn(channel.run(socket.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.abort();

        assert_eq!(socket.texts().len(), 1);
        assert_eq!(socket.close_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_closes_without_sending() {
        let socket = TestSocket::new();
        let (fetch, calls) = fetcher_from(vec![Err("gone".to_string())]);

        let channel = PollingChannel::new(fetch);
        channel.run(socket.clone()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(socket.texts().is_empty());
        assert_eq!(socket.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pings_run_on_their_own_cadence() {
        let socket = TestSocket::new();
        let (fetch, _calls) = fetcher_from(vec![Ok(serde_json::json!({"status": "running"}))]);

        let channel = PollingChannel::new(fetch);
        let handle = tokio::spawn(channel.run(socket.clone()));

        tokio::time::sleep(Duration::from_secs(31)).await;
        handle.abort();

        assert!(socket.ping_count() >= 2);
        assert_eq!(socket.texts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_does_not_starve_keepalive_pings() {
        let socket = TestSocket::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fetch: SnapshotFetcher<serde_json::Value, String> = Box::new(move || {
            let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
            async move {
                if first {
                    tokio::time::sleep(Duration::from_secs(40)).await;
                }
                Ok(serde_json::json!({"status": "running"}))
            }
            .boxed()
        });

        let channel = PollingChannel::new(fetch);
        let handle = tokio::spawn(channel.run(socket.clone()));

        // 15s ping cadence must keep firing while the first fetch hangs.
        tokio::time::sleep(Duration::from_secs(39)).await;
        assert!(socket.ping_count() >= 2);
        assert!(socket.texts().is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(socket.texts().len(), 1);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn custom_fingerprint_controls_resends() {
        let socket = TestSocket::new();
        let (fetch, _calls) = fetcher_from(vec![
            Ok(serde_json::json!({"status": "running", "noise": 1})),
            Ok(serde_json::json!({"status": "running", "noise": 2})),
            Ok(serde_json::json!({"status": "running", "noise": 3})),
        ]);

        let channel = PollingChannel::new(fetch)
            .fingerprint(|payload: &serde_json::Value| payload["status"].to_string());
        let handle = tokio::spawn(channel.run(socket.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.abort();

        assert_eq!(socket.texts().len(), 1);
    }
}
