//! Per-socket loop: decode client messages, dispatch them to the services, and forward
//! room events back to the client.
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::ClientMessage,
    error::ServiceError,
    services::{
        answer_service, room_events,
        session_service::{self, JoinReceipt},
    },
    state::{ClientConnection, RoomEvent, SharedState, game::Player},
};

/// Outbound halves of one socket: room events and raw control frames.
struct Outbound {
    events: mpsc::UnboundedSender<RoomEvent>,
    control: mpsc::UnboundedSender<Message>,
}

impl Outbound {
    fn reply(&self, event: Option<RoomEvent>) {
        if let Some(event) = event {
            let _ = self.events.send(event);
        }
    }

    fn reply_error(&self, err: &ServiceError, action: &str) {
        err.log(action);
        self.reply(room_events::error_event(err.client_message()));
    }
}

/// Per-connection context handed to every inbound message.
struct Connection<'a> {
    state: &'a SharedState,
    id: Uuid,
    /// Identity used for room membership; anonymous sockets get a throwaway id.
    room_player: String,
    player: Option<&'a Player>,
    outbound: &'a Outbound,
}

impl Connection<'_> {
    fn connection(&self) -> ClientConnection {
        ClientConnection {
            id: self.id,
            player_id: self.room_player.clone(),
            tx: self.outbound.events.clone(),
        }
    }

    async fn enter(&self, session_id: &str) -> Result<(), ServiceError> {
        session_service::enter_room(self.state, self.player, session_id, self.connection()).await
    }
}

/// Handle the full lifecycle of a player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, player: Option<Player>) {
    let (mut sender, mut receiver) = socket.split();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<RoomEvent>();
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps room pushes flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(event) = events_rx.recv() => match serde_json::to_string(&event) {
                    Ok(text) => Message::Text(text.into()),
                    Err(err) => {
                        warn!(error = %err, event = %event.event, "failed to serialize room event");
                        continue;
                    }
                },
                Some(message) = control_rx.recv() => message,
                else => break,
            };
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let outbound = Outbound {
        events: events_tx,
        control: control_tx,
    };
    let conn = Connection {
        state: &state,
        id: Uuid::new_v4(),
        room_player: player
            .as_ref()
            .map_or_else(|| Uuid::new_v4().to_string(), |player| player.id.clone()),
        player: player.as_ref(),
        outbound: &outbound,
    };
    info!(connection = %conn.id, player = %conn.room_player, "player socket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(message) => handle_message(&conn, message).await,
                Err(err) => {
                    warn!(connection = %conn.id, error = %err, "failed to parse or validate client message");
                    let err = ServiceError::InvalidInput(err.to_string());
                    outbound.reply_error(&err, "ws_message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound.control.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection = %conn.id, "player socket closed");
                let _ = outbound.control.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %conn.id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.hub().disconnect(conn.id);
    info!(connection = %conn.id, "player socket disconnected");

    finalize(writer_task, outbound).await;
}

async fn handle_message(conn: &Connection<'_>, message: ClientMessage) {
    let session_id = message.game_id().to_owned();
    debug!(connection = %conn.id, session_id = %session_id, message = ?message, "client message");

    let (action, result) = match message {
        ClientMessage::JoinGame { team_name, .. } => {
            ("join_game", join(conn, &session_id, team_name.as_deref()).await)
        }
        ClientMessage::StartGame { .. } => ("start_game", start(conn, &session_id).await),
        ClientMessage::SendAnswer {
            question_index,
            option_index,
            ..
        } => (
            "send_answer",
            answer(conn, &session_id, question_index, option_index).await,
        ),
        ClientMessage::GetQuestionInformations { .. } => {
            ("resync", resync(conn, &session_id).await)
        }
        ClientMessage::SwitchTeam { team_name, .. } => (
            "switch_team",
            session_service::switch_team(conn.state, conn.player, &session_id, &team_name)
                .await
                .map(|_| ()),
        ),
        ClientMessage::LeaveGame { .. } => ("leave_game", leave(conn, &session_id).await),
    };

    if let Err(err) = result {
        debug!(connection = %conn.id, session_id = %session_id, action, error = %err, "client action refused");
        conn.outbound.reply_error(&err, action);
    }
}

async fn join(
    conn: &Connection<'_>,
    session_id: &str,
    team_name: Option<&str>,
) -> Result<(), ServiceError> {
    let JoinReceipt { team_name } =
        session_service::join_session(conn.state, conn.player, session_id, team_name).await?;
    conn.enter(session_id).await?;
    conn.outbound
        .reply(room_events::joined_game_event(session_id, &team_name));
    Ok(())
}

async fn start(conn: &Connection<'_>, session_id: &str) -> Result<(), ServiceError> {
    conn.enter(session_id).await?;
    session_service::start_session(conn.state, conn.player, session_id).await
}

async fn answer(
    conn: &Connection<'_>,
    session_id: &str,
    question_index: u32,
    option_index: u32,
) -> Result<(), ServiceError> {
    conn.enter(session_id).await?;
    answer_service::submit_answer(
        conn.state,
        session_id,
        conn.player,
        question_index,
        option_index,
    )
    .await
    .map(|_| ())
}

/// Rejoin the room and replay whatever the session currently shows.
async fn resync(conn: &Connection<'_>, session_id: &str) -> Result<(), ServiceError> {
    conn.enter(session_id).await?;
    let view = room_events::current_view(conn.state, session_id, conn.player).await?;
    debug!(connection = %conn.id, session_id, phase = view.phase(), "resync");
    for event in view.into_events() {
        conn.outbound.reply(Some(event));
    }
    Ok(())
}

async fn leave(conn: &Connection<'_>, session_id: &str) -> Result<(), ServiceError> {
    session_service::leave_session(conn.state, conn.player, session_id).await?;
    conn.state.hub().leave(session_id, conn.id);
    Ok(())
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound: Outbound) {
    drop(outbound);
    let _ = writer_task.await;
}
