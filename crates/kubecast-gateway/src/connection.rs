//! Per-connection delivery.
//!
//! A connection runs two tasks: the write loop, which alone sends envelopes,
//! and the heartbeat loop, which reads every inbound frame and only ever
//! writes pings. The heartbeat is the only place a dead peer is noticed, so it
//! is also the one that unsubscribes on read failure.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use kubecast_core::{Broadcaster, CancelSignal, Subscription, SubscriptionId};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::lifecycle::{ConnectionState, Lifecycle};
use crate::settings::HeartbeatSettings;

type SharedSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Serve one upgraded socket until either side goes away.
///
/// Binds the socket to a fresh subscription; if the broadcaster has expired
/// the socket is closed straight away with a normal closure.
pub async fn handle_connection(
    socket: WebSocket,
    broadcaster: Broadcaster,
    settings: HeartbeatSettings,
) {
    let conn_id = Uuid::new_v4();
    let lifecycle = Arc::new(Lifecycle::new());
    lifecycle.advance(ConnectionState::Upgraded);

    let (sink, stream) = socket.split();
    let sink: SharedSink = Arc::new(Mutex::new(sink));

    let subscription = match broadcaster.subscribe() {
        Ok(subscription) => subscription,
        Err(e) => {
            info!(conn_id = %conn_id, error = %e, "Broadcaster unavailable, closing connection");
            lifecycle.advance(ConnectionState::Closing);
            close(&sink, &lifecycle, settings.close_timeout, conn_id).await;
            return;
        }
    };
    let subscription_id = subscription.id();
    lifecycle.advance(ConnectionState::Active);
    info!(
        conn_id = %conn_id,
        subscription_id = %subscription_id,
        "Resource stream connected"
    );

    let heartbeat = Heartbeat {
        conn_id,
        stream,
        sink: Arc::clone(&sink),
        cancel: subscription.cancel_signal(),
        settings,
    };
    let heartbeat_handle = tokio::spawn({
        let broadcaster = broadcaster.clone();
        let lifecycle = Arc::clone(&lifecycle);
        async move {
            match heartbeat.run().await {
                Liveness::Cancelled => return,
                Liveness::PeerClosed => {
                    info!(conn_id = %conn_id, "Connection closed by client");
                }
                Liveness::Lost(e) if lifecycle.is_closing() => {
                    debug!(conn_id = %conn_id, error = %e, "Read ended during teardown");
                }
                Liveness::Lost(e) => {
                    warn!(conn_id = %conn_id, code = e.code(), error = %e, "Connection to client lost");
                }
            }
            release(&broadcaster, subscription_id, &lifecycle, conn_id);
        }
    });

    if let Err(e) = write_loop(&sink, subscription).await {
        warn!(conn_id = %conn_id, code = e.code(), error = %e, "Failed to deliver envelope");
    }
    release(&broadcaster, subscription_id, &lifecycle, conn_id);
    close(&sink, &lifecycle, settings.close_timeout, conn_id).await;

    if let Err(e) = heartbeat_handle.await {
        warn!(conn_id = %conn_id, error = %e, "Heartbeat task failed");
    }
    info!(conn_id = %conn_id, state = %lifecycle.state(), "Resource stream disconnected");
}

/// Forward envelopes until the subscription ends or a send fails.
///
/// A send stuck on a peer that stopped reading is abandoned as soon as the
/// subscription is cancelled.
async fn write_loop(sink: &SharedSink, mut subscription: Subscription) -> Result<()> {
    let cancel = subscription.cancel_signal();
    while let Some(envelope) = subscription.next().await {
        let text = envelope.to_json()?;
        tokio::select! {
            sent = async { sink.lock().await.send(Message::Text(text)).await } => sent?,
            () = cancel.cancelled() => break,
        }
    }
    Ok(())
}

/// Start teardown and drop the subscription. Only the first caller does
/// anything; the subscription may already be gone through expiry.
fn release(
    broadcaster: &Broadcaster,
    subscription_id: SubscriptionId,
    lifecycle: &Lifecycle,
    conn_id: Uuid,
) {
    if !lifecycle.advance(ConnectionState::Closing) {
        return;
    }
    match broadcaster.unsubscribe(subscription_id) {
        Ok(()) => debug!(conn_id = %conn_id, subscription_id = %subscription_id, "Unsubscribed"),
        Err(e) => debug!(
            conn_id = %conn_id,
            subscription_id = %subscription_id,
            code = e.code(),
            "Subscription already released"
        ),
    }
}

/// Send a normal-closure frame and close the sink, at most once.
async fn close(sink: &SharedSink, lifecycle: &Lifecycle, limit: Duration, conn_id: Uuid) {
    if !lifecycle.advance(ConnectionState::Closed) {
        return;
    }
    match timeout(limit, send_close(sink)).await {
        Ok(Ok(())) => trace!(conn_id = %conn_id, "Close frame sent"),
        Ok(Err(e)) => debug!(conn_id = %conn_id, error = %e, "Close frame not delivered"),
        Err(_) => debug!(conn_id = %conn_id, "Timed out sending close frame"),
    }
}

async fn send_close(sink: &SharedSink) -> Result<()> {
    let mut sink = sink.lock().await;
    sink.send(Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: Cow::Borrowed("stream closed"),
    })))
    .await?;
    sink.close().await?;
    Ok(())
}

/// Why the heartbeat loop stopped.
#[derive(Debug)]
enum Liveness {
    /// Subscription ended elsewhere (engine expiry or write failure)
    Cancelled,
    /// Peer sent a close frame or ended the stream
    PeerClosed,
    /// Read failed or the deadline passed without a pong
    Lost(GatewayError),
}

struct Heartbeat {
    conn_id: Uuid,
    stream: SplitStream<WebSocket>,
    sink: SharedSink,
    cancel: CancelSignal,
    settings: HeartbeatSettings,
}

impl Heartbeat {
    async fn run(mut self) -> Liveness {
        let mut deadline = Instant::now() + self.settings.read_deadline;
        let next_ping = tokio::time::sleep(self.settings.ping_delay);
        tokio::pin!(next_ping);
        let mut ping_due = true;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Liveness::Cancelled,
                () = &mut next_ping, if ping_due => {
                    ping_due = false;
                    match timeout_at(deadline, self.ping()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => return Liveness::Lost(e),
                        Err(_) => {
                            return Liveness::Lost(GatewayError::HeartbeatTimeout(
                                self.settings.read_deadline,
                            ));
                        }
                    }
                }
                frame = timeout_at(deadline, self.stream.next()) => match frame {
                    Err(_) => {
                        return Liveness::Lost(GatewayError::HeartbeatTimeout(
                            self.settings.read_deadline,
                        ));
                    }
                    Ok(None) => return Liveness::PeerClosed,
                    Ok(Some(Err(e))) => return Liveness::Lost(e.into()),
                    Ok(Some(Ok(Message::Pong(_)))) => {
                        let now = Instant::now();
                        deadline = now + self.settings.read_deadline;
                        next_ping.as_mut().reset(now + self.settings.ping_interval);
                        ping_due = true;
                        trace!(conn_id = %self.conn_id, "Pong received");
                    }
                    Ok(Some(Ok(Message::Close(frame)))) => {
                        debug!(conn_id = %self.conn_id, frame = ?frame, "Close frame received");
                        return Liveness::PeerClosed;
                    }
                    Ok(Some(Ok(_))) => {
                        trace!(conn_id = %self.conn_id, "Inbound frame discarded");
                    }
                },
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        trace!(conn_id = %self.conn_id, "Sending ping");
        self.sink.lock().await.send(Message::Ping(Vec::new())).await?;
        Ok(())
    }
}
