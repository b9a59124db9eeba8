//! Per-connection session: the handshake gate and the event loop.
//!
//! A connection must present a valid credential in its first frame or
//! it is closed without touching any other state. Once bound, the
//! resolved identity never changes for the connection's lifetime; all
//! later events are attributed to it. Teardown is synchronous with the
//! socket ending: memberships and the hub registration are gone before
//! the next event is routed anywhere.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};

use agora_core::CoreError;
use agora_protocol::{
    current_timestamp_secs, verify_credential, ChatMessage, ChatSender, ClientEvent, Identity,
    RejectReason, ServerEvent, MAX_CHAT_TEXT_LEN,
};

use crate::http::AppState;
use crate::hub::ConnId;
use crate::limiter::ChatLimiter;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// State for one authenticated connection.
pub struct Session {
    conn_id: ConnId,
    identity: Identity,
    current_room: Option<String>,
    chat_limiter: ChatLimiter,
}

impl Session {
    pub fn new(conn_id: ConnId, identity: Identity, app: &AppState) -> Self {
        Self {
            conn_id,
            identity,
            current_room: None,
            chat_limiter: ChatLimiter::new(app.chat_burst, app.chat_refill_per_sec),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Apply one client event to the shared state.
    pub async fn handle_event(&mut self, app: &AppState, event: ClientEvent) {
        match event {
            ClientEvent::Handshake { .. } => {
                // Identity is fixed at bind time; repeats are noise.
                tracing::debug!(conn_id = self.conn_id, "repeat handshake ignored");
            }
            ClientEvent::VoteSubmit {
                agenda_id,
                option_id,
            } => self.on_vote(app, agenda_id, option_id).await,
            ClientEvent::JoinRoom { agenda_id } => self.on_join(app, agenda_id).await,
            ClientEvent::LeaveRoom { agenda_id } => self.on_leave(app, agenda_id).await,
            ClientEvent::ChatMessage { agenda_id, text } => self.on_chat(app, agenda_id, text).await,
        }
    }

    async fn on_vote(&self, app: &AppState, agenda_id: String, option_id: String) {
        let result = app
            .ledger
            .submit_vote(
                &agenda_id,
                self.identity.user_id.clone(),
                &option_id,
                Utc::now(),
            )
            .await;
        match result {
            // The accepted vote reaches everyone through the commit feed.
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(
                    conn_id = self.conn_id,
                    agenda_id = %agenda_id,
                    error = %err,
                    "vote rejected"
                );
                let reason = reject_reason(&err);
                app.hub
                    .send_to(self.conn_id, ServerEvent::VoteRejected { agenda_id, reason })
                    .await;
            }
        }
    }

    async fn on_join(&mut self, app: &AppState, agenda_id: String) {
        // One room per connection: joining implies leaving the previous.
        if let Some(previous) = self.current_room.take() {
            if previous != agenda_id {
                app.rooms.leave(&previous, self.conn_id).await;
            }
        }
        app.rooms.join(&agenda_id, self.conn_id).await;
        self.current_room = Some(agenda_id);
    }

    async fn on_leave(&mut self, app: &AppState, agenda_id: String) {
        app.rooms.leave(&agenda_id, self.conn_id).await;
        if self.current_room.as_deref() == Some(agenda_id.as_str()) {
            self.current_room = None;
        }
    }

    async fn on_chat(&mut self, app: &AppState, agenda_id: String, text: String) {
        if !self.chat_limiter.allow() {
            tracing::debug!(conn_id = self.conn_id, "chat rate limit hit, message dropped");
            return;
        }
        let text = text.trim();
        if text.is_empty() || text.len() > MAX_CHAT_TEXT_LEN {
            tracing::debug!(conn_id = self.conn_id, "blank or oversize chat dropped");
            return;
        }
        // No relay without membership; chat carries no history either.
        if !app.rooms.is_member(&agenda_id, self.conn_id).await {
            tracing::debug!(
                conn_id = self.conn_id,
                agenda_id = %agenda_id,
                "chat from non-member dropped"
            );
            return;
        }

        let message = ChatMessage::new(
            agenda_id.clone(),
            ChatSender {
                id: self.identity.user_id.clone(),
                name: self.identity.display_name.clone(),
            },
            text.to_string(),
        );
        let mut targets = app.rooms.members(&agenda_id).await;
        targets.remove(&self.conn_id);
        let delivered = app
            .hub
            .send_to_set(&targets, &ServerEvent::ChatMessage(message))
            .await;
        tracing::debug!(
            conn_id = self.conn_id,
            agenda_id = %agenda_id,
            delivered,
            "chat relayed"
        );
    }

    /// Teardown shared by every exit path. After this returns the
    /// connection holds no memberships and receives nothing further.
    pub async fn finish(&mut self, app: &AppState) {
        app.rooms.drop_connection(self.conn_id).await;
        app.hub.unregister(self.conn_id).await;
        self.current_room = None;
        tracing::info!(
            conn_id = self.conn_id,
            user_id = %self.identity.user_id,
            "session closed"
        );
    }
}

// The ledger's submit path surfaces nothing else but store trouble.
fn reject_reason(err: &CoreError) -> RejectReason {
    match err {
        CoreError::AgendaNotFound(_) => RejectReason::AgendaNotFound,
        CoreError::NotOpen { .. } => RejectReason::NotOpen,
        CoreError::InvalidOption { .. } => RejectReason::InvalidOption,
        _ => RejectReason::StoreUnavailable,
    }
}

/// Drive one upgraded socket to completion.
pub async fn run(socket: WebSocket, app: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let identity = match await_handshake(&mut ws_rx, &app).await {
        Ok(identity) => identity,
        Err(reason) => {
            tracing::info!(reason = %reason, "handshake refused");
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };

    let (conn_id, mut outbound) = app.hub.register().await;
    let mut session = Session::new(conn_id, identity.clone(), &app);

    // Single writer per socket: queue order is delivery order.
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    app.hub
        .send_to(
            conn_id,
            ServerEvent::HandshakeAck {
                user_id: identity.user_id.clone(),
                display_name: identity.display_name.clone(),
            },
        )
        .await;
    tracing::info!(conn_id, user_id = %identity.user_id, "session established");

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => session.handle_event(&app, event).await,
                Err(e) => {
                    tracing::debug!(conn_id, error = %e, "unparseable frame dropped");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id, error = %e, "socket error");
                break;
            }
        }
    }

    session.finish(&app).await;
    // Unregistering dropped the queue sender, so the writer drains out.
    let _ = writer.await;
}

async fn await_handshake(
    ws_rx: &mut SplitStream<WebSocket>,
    app: &AppState,
) -> Result<Identity, String> {
    let frame = match tokio::time::timeout(HANDSHAKE_TIMEOUT, ws_rx.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(_))) => return Err("first frame must be a handshake".into()),
        Ok(Some(Err(e))) => return Err(format!("socket error: {e}")),
        Ok(None) => return Err("socket closed before handshake".into()),
        Err(_) => return Err("handshake timed out".into()),
    };
    let event: ClientEvent =
        serde_json::from_str(&frame).map_err(|e| format!("invalid handshake frame: {e}"))?;
    let ClientEvent::Handshake { credential } = event else {
        return Err("first frame must be a handshake".into());
    };
    verify_credential(&credential, &app.verifying_key, current_timestamp_secs())
        .map_err(|e| e.to_string())
}
