// Push-channel client: subscribes to the server's SSE stream.
//
// Wraps a reqwest-eventsource `EventSource`, which reconnects on its own
// using the configured exponential backoff. Every transport-level change
// and raw message is forwarded as a `PushEvent`; decoding happens in the
// session loop.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest_eventsource::retry::ExponentialBackoff;
use reqwest_eventsource::{Event, RequestBuilderExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;

/// Events emitted by the push channel to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// The stream (re)opened.
    Opened,
    /// A raw SSE message: `event:` name and `data:` body.
    Message { event: String, data: String },
    /// The stream failed. The transport retries after a backoff delay.
    Lost { reason: String },
}

/// Build the retry policy the event source uses between reconnect attempts.
pub fn retry_policy(cfg: &ReconnectConfig) -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(cfg.initial_delay_ms),
        cfg.factor,
        Some(Duration::from_millis(cfg.max_delay_ms)),
        None,
    )
}

/// Subscribe to `url` and forward events through `tx`.
///
/// Runs until the receiver is dropped or the event source gives up.
pub async fn run(
    http: reqwest::Client,
    url: String,
    reconnect: ReconnectConfig,
    tx: mpsc::Sender<PushEvent>,
) -> anyhow::Result<()> {
    let mut es = http
        .get(&url)
        .eventsource()
        .map_err(|e| anyhow::anyhow!("failed to create event source for {url}: {e}"))?;
    es.set_retry_policy(Box::new(retry_policy(&reconnect)));
    info!("Subscribing to push channel at {url}");

    while let Some(event) = es.next().await {
        let forwarded = match event {
            Ok(Event::Open) => {
                debug!("SSE connection opened");
                PushEvent::Opened
            }
            Ok(Event::Message(msg)) => {
                debug!(event = %msg.event, bytes = msg.data.len(), "SSE message");
                PushEvent::Message {
                    event: msg.event,
                    data: msg.data,
                }
            }
            Err(e) => {
                let reason = describe_error(&e);
                warn!("Push channel error: {reason}");
                PushEvent::Lost { reason }
            }
        };
        if tx.send(forwarded).await.is_err() {
            debug!("push receiver dropped, closing event source");
            es.close();
            return Ok(());
        }
    }

    info!("Push channel closed");
    Ok(())
}

/// A human-readable reason for a stream failure.
fn describe_error(err: &reqwest_eventsource::Error) -> String {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, _response) => {
            format!("server returned status {status}")
        }
        reqwest_eventsource::Error::Transport(e) => format!("network error: {e}"),
        reqwest_eventsource::Error::StreamEnded => "stream ended".to_string(),
        other => format!("stream error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const SSE_HEADERS: &str = concat!(
        "HTTP/1.1 200 OK\r\n",
        "Content-Type: text/event-stream\r\n",
        "Cache-Control: no-cache\r\n",
        "\r\n",
    );

    fn fast_reconnect() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay_ms: 10,
            factor: 2.0,
            max_delay_ms: 50,
        }
    }

    async fn next(rx: &mut mpsc::Receiver<PushEvent>) -> PushEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for push event")
            .expect("push channel closed")
    }

    #[tokio::test]
    async fn forwards_messages_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            for round in 0..2 {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 4096];
                let _ = socket.read(&mut buf).await;

                let body = format!(
                    "event: game_state\r\ndata: {{\"game_status\":\"COOLDOWN\",\"round\":{round}}}\r\n\r\n"
                );
                socket.write_all(SSE_HEADERS.as_bytes()).await.unwrap();
                socket.write_all(body.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
                // Dropping the socket ends the stream.
            }
        });

        let (tx, mut rx) = mpsc::channel(32);
        let client = tokio::spawn(run(
            reqwest::Client::new(),
            format!("http://{addr}/events"),
            fast_reconnect(),
            tx,
        ));

        assert_eq!(next(&mut rx).await, PushEvent::Opened);
        assert_eq!(
            next(&mut rx).await,
            PushEvent::Message {
                event: "game_state".into(),
                data: r#"{"game_status":"COOLDOWN","round":0}"#.into(),
            }
        );
        assert!(matches!(next(&mut rx).await, PushEvent::Lost { .. }));
        assert_eq!(next(&mut rx).await, PushEvent::Opened);
        match next(&mut rx).await {
            PushEvent::Message { event, data } => {
                assert_eq!(event, "game_state");
                assert!(data.contains("\"round\":1"));
            }
            other => panic!("expected Message, got {other:?}"),
        }

        drop(rx);
        server.await.unwrap();
        client.abort();
    }

    #[tokio::test]
    async fn error_status_is_reported_as_lost() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n";
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
        });

        let (tx, mut rx) = mpsc::channel(8);
        let client = tokio::spawn(run(
            reqwest::Client::new(),
            format!("http://{addr}/events"),
            fast_reconnect(),
            tx,
        ));

        match next(&mut rx).await {
            PushEvent::Lost { reason } => assert!(reason.contains("503"), "reason: {reason}"),
            other => panic!("expected Lost, got {other:?}"),
        }
        client.abort();
    }
}
