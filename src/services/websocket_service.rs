use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    state::{
        SharedState,
        broadcaster::{ConnectionId, Participant, SessionHub},
    },
};

/// Handle the full lifecycle of one live-state websocket connection.
///
/// The connection may join any number of session groups. Whatever the hub
/// relays is serialized by a dedicated writer task; on close the connection
/// leaves every group it joined.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let connection_id: ConnectionId = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Message>();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                biased;
                control = control_rx.recv() => match control {
                    Some(frame) => frame,
                    None => break,
                },
                Some(event) = events_rx.recv() => match serde_json::to_string(&event) {
                    Ok(payload) => Message::Text(payload.into()),
                    Err(err) => {
                        warn!(error = %err, "failed to serialize outbound message");
                        continue;
                    }
                },
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    info!(connection = %connection_id, "live client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(message) => {
                    dispatch_client_message(state.hub(), connection_id, &events_tx, message)
                }
                Err(err) => {
                    warn!(connection = %connection_id, error = %err, "ignoring malformed frame");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = control_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = control_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.hub().leave(connection_id);
    info!(connection = %connection_id, "live client disconnected");

    finalize(writer_task, control_tx).await;
}

/// Route one parsed client frame to the hub.
pub(crate) fn dispatch_client_message(
    hub: &SessionHub,
    connection_id: ConnectionId,
    events_tx: &mpsc::UnboundedSender<ServerMessage>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::JoinSession(code) => {
            debug!(connection = %connection_id, code = %code, "join-session");
            hub.join(
                Participant {
                    id: connection_id,
                    tx: events_tx.clone(),
                },
                &code,
            );
        }
        ClientMessage::UpdateState(payload) => {
            hub.publish(
                connection_id,
                &payload.session_code,
                payload.state,
                payload.is_undo,
            );
        }
        ClientMessage::SyncTimer(payload) => {
            debug!(connection = %connection_id, code = %payload.session_code, "sync-timer");
            hub.sync_timer(&payload.session_code, payload.timer_state);
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, control_tx: mpsc::UnboundedSender<Message>) {
    drop(control_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{
        dto::ws::UpdateStatePayload,
        state::{
            live::{LiveMatchState, MatchPhase},
            timer::ManualClock,
        },
    };

    async fn next(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> ServerMessage {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("message in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn frames_reach_the_other_member() {
        let hub = SessionHub::new(ManualClock::starting_at(0), 1);
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        dispatch_client_message(&hub, a, &a_tx, ClientMessage::JoinSession("abc123".into()));
        dispatch_client_message(&hub, b, &b_tx, ClientMessage::JoinSession("ABC123".into()));

        let mut state = LiveMatchState::default();
        state.phase = MatchPhase::Paused;
        state.score_a = 1;
        dispatch_client_message(
            &hub,
            a,
            &a_tx,
            ClientMessage::UpdateState(UpdateStatePayload {
                session_code: "ABC123".into(),
                state: state.clone(),
                is_undo: false,
            }),
        );

        match next(&mut b_rx).await {
            ServerMessage::StateUpdated(received) => assert_eq!(*received, state),
            other => panic!("unexpected message {other:?}"),
        }
        assert!(matches!(next(&mut b_rx).await, ServerMessage::TimerSync(_)));
        // The publisher only sees the clock created by its own update.
        assert!(matches!(next(&mut a_rx).await, ServerMessage::TimerSync(_)));
        assert!(a_rx.try_recv().is_err());
    }
}
