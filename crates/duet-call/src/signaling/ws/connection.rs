//! Background WebSocket connection loop with auto-reconnect.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, error, info, warn};

use super::types::{WsCommand, WsSignalingConfig};
use crate::protocol::SignalMessage;
use crate::signaling::SubscriberRegistry;

type Outbox = Arc<Mutex<VecDeque<SignalMessage>>>;

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Background task owning the socket. Exits on `Disconnect` or when every
/// handle has been dropped.
pub(crate) async fn connection_loop(
    config: WsSignalingConfig,
    connected: Arc<RwLock<bool>>,
    registry: SubscriberRegistry,
    command_rx: mpsc::UnboundedReceiver<WsCommand>,
) {
    let command_rx = Arc::new(Mutex::new(command_rx));
    let outbox: Outbox = Arc::new(Mutex::new(VecDeque::new()));
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut reconnect_delay = config.reconnect_delay;

    loop {
        info!(url = %config.url, "Connecting to signaling relay");

        match tokio::time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(config.url.as_str()),
        )
        .await
        {
            Ok(Ok((ws_stream, _))) => {
                reconnect_delay = config.reconnect_delay;
                *connected.write().await = true;
                info!("Signaling relay connected");

                let (ws_write, ws_read) = ws_stream.split();
                let ws_write = Arc::new(Mutex::new(ws_write));

                flush_outbox(&ws_write, &outbox).await;

                let ping_handle =
                    tokio::spawn(ping_task(Arc::clone(&ws_write), config.ping_interval));

                let mut cmd_handle = tokio::spawn(command_forwarder(
                    Arc::clone(&command_rx),
                    Arc::clone(&ws_write),
                    Arc::clone(&outbox),
                    Arc::clone(&shutdown),
                ));

                // The forwarder only finishes when asked to shut down.
                tokio::select! {
                    _ = read_loop(ws_read, &registry) => {}
                    _ = &mut cmd_handle => {}
                }

                ping_handle.abort();
                cmd_handle.abort();
                *connected.write().await = false;
                info!("Signaling relay disconnected");
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to signaling relay");
            }
            Err(_elapsed) => {
                error!(
                    timeout_secs = config.connect_timeout.as_secs(),
                    "Signaling connection timed out"
                );
            }
        }

        if shutdown.load(Ordering::Acquire) {
            return;
        }

        info!(
            delay_ms = reconnect_delay.as_millis() as u64,
            "Reconnecting to signaling relay"
        );
        if !wait_for_reconnect(reconnect_delay, &command_rx, &outbox).await {
            info!("Signaling connection shut down");
            return;
        }
        reconnect_delay = config.next_delay(reconnect_delay);
    }
}

/// Sleep out the backoff while holding published messages. Returns `false`
/// if the handle asked to disconnect in the meantime.
async fn wait_for_reconnect(
    delay: Duration,
    command_rx: &Mutex<mpsc::UnboundedReceiver<WsCommand>>,
    outbox: &Outbox,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    let mut rx = command_rx.lock().await;
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = rx.recv() => match cmd {
                Some(WsCommand::Publish(msg)) => {
                    debug!(event = msg.event_name(), "Holding signal until reconnect");
                    outbox.lock().await.push_back(msg);
                }
                Some(WsCommand::Disconnect) | None => return false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

async fn read_loop<R>(mut ws_read: R, registry: &SubscriberRegistry)
where
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    while let Some(msg_result) = ws_read.next().await {
        match msg_result {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<SignalMessage>(&text) {
                Ok(signal) => {
                    registry.dispatch(&signal);
                }
                Err(_) => {
                    debug!(text = %text, "Unrecognized message from relay");
                }
            },
            Ok(WsMessage::Close(_)) => {
                info!("Relay closed connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

async fn send_signal<S>(ws_write: &Mutex<S>, msg: &SignalMessage) -> bool
where
    S: Sink<WsMessage> + Unpin,
{
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to encode signal");
            return true;
        }
    };
    let mut writer = ws_write.lock().await;
    writer.send(WsMessage::Text(json.into())).await.is_ok()
}

async fn flush_outbox<S>(ws_write: &Mutex<S>, outbox: &Outbox)
where
    S: Sink<WsMessage> + Unpin,
{
    let mut held = outbox.lock().await;
    while let Some(msg) = held.pop_front() {
        if !send_signal(ws_write, &msg).await {
            held.push_front(msg);
            break;
        }
    }
}

async fn ping_task<S>(ws_write: Arc<Mutex<S>>, interval: Duration)
where
    S: Sink<WsMessage> + Unpin,
{
    let mut interval = tokio::time::interval(interval);
    interval.tick().await;
    loop {
        interval.tick().await;
        let mut writer = ws_write.lock().await;
        if writer.send(WsMessage::Ping(Default::default())).await.is_err() {
            break;
        }
    }
}

async fn command_forwarder<S>(
    cmd_rx: Arc<Mutex<mpsc::UnboundedReceiver<WsCommand>>>,
    cmd_write: Arc<Mutex<S>>,
    outbox: Outbox,
    shutdown: Arc<AtomicBool>,
) where
    S: Sink<WsMessage> + Unpin,
{
    let mut rx = cmd_rx.lock().await;
    loop {
        match rx.recv().await {
            Some(WsCommand::Publish(msg)) => {
                if !send_signal(&cmd_write, &msg).await {
                    // Socket is going down; resend after reconnect.
                    outbox.lock().await.push_back(msg);
                }
            }
            Some(WsCommand::Disconnect) | None => {
                shutdown.store(true, Ordering::Release);
                let mut writer = cmd_write.lock().await;
                let _ = writer.send(WsMessage::Close(None)).await;
                return;
            }
        }
    }
}
