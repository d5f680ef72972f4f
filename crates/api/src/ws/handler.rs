use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use flowguard_core::presence::UserInfo;
use flowguard_core::protocol::{SessionMessage, WorkflowUser};
use flowguard_core::types::UserId;
use flowguard_events::CollabEvent;

use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// managed by two tasks (sender + receiver).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Processes inbound session messages on the current task.
///   4. Runs the disconnect cascade and cleans up on close.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let socket_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(socket_id = %socket_id, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = state.ws_manager.add(socket_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_socket_id = socket_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(socket_id = %sender_socket_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // The user bound to this socket once identified.
    let mut current_user: Option<UserId> = None;

    // Receiver loop: process inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                // Pongs count as liveness for the bound user.
                if let Some(user_id) = &current_user {
                    state.coordinator.touch_user(user_id).await;
                }
            }
            Ok(Message::Text(text)) => {
                handle_session_message(&state, &socket_id, &mut current_user, text.as_str()).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(socket_id = %socket_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Disconnect cascade: release the user's locks and drop their session,
    // then tell everyone what changed.
    let session = state.coordinator.get_user_by_socket_id(&socket_id).await;
    if let Some(summary) = state.coordinator.disconnect_socket(&socket_id).await {
        for (workflow_id, user_id) in &summary.released_locks {
            state.event_bus.publish(
                CollabEvent::new("lock.released")
                    .with_workflow(workflow_id.clone())
                    .with_actor(user_id.clone())
                    .with_payload(serde_json::json!({ "reason": "disconnect" })),
            );
        }
        state
            .event_bus
            .publish(CollabEvent::new("presence.left").with_actor(summary.user_id));

        if let Some(workflow_id) = session.and_then(|s| s.workflow_id) {
            broadcast_workflow_roster(&state, &workflow_id).await;
        }
    }

    state.ws_manager.remove(&socket_id).await;
    send_task.abort();
    tracing::info!(socket_id = %socket_id, "WebSocket disconnected");
}

/// Dispatch one parsed client message. Malformed or rejected messages get a
/// `session.error` reply on the same socket; they never kill the connection.
async fn handle_session_message(
    state: &AppState,
    socket_id: &str,
    current_user: &mut Option<UserId>,
    text: &str,
) {
    let message: SessionMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(socket_id = %socket_id, error = %e, "Unparseable session message");
            send_session_message(
                state,
                socket_id,
                &SessionMessage::Error {
                    code: "VALIDATION".to_string(),
                    message: "Unrecognized message".to_string(),
                },
            )
            .await;
            return;
        }
    };

    match message {
        SessionMessage::Identify {
            user_id,
            user_name,
            email,
            workflow_id,
            metadata,
        } => {
            if user_id.trim().is_empty() || user_name.trim().is_empty() {
                send_session_message(
                    state,
                    socket_id,
                    &SessionMessage::Error {
                        code: "VALIDATION".to_string(),
                        message: "user_id and user_name must not be empty".to_string(),
                    },
                )
                .await;
                return;
            }

            let info = UserInfo {
                socket_id: socket_id.to_owned(),
                user_name,
                email,
                workflow_id: workflow_id.clone(),
                metadata: metadata.unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            };
            state.coordinator.register_user(&user_id, info).await;
            state.ws_manager.bind_user(socket_id, &user_id).await;
            *current_user = Some(user_id.clone());

            tracing::info!(socket_id = %socket_id, user_id = %user_id, "User identified");
            state
                .event_bus
                .publish(CollabEvent::new("presence.joined").with_actor(user_id.clone()));

            send_session_message(
                state,
                socket_id,
                &SessionMessage::Identified {
                    user_id,
                    socket_id: socket_id.to_owned(),
                },
            )
            .await;

            if let Some(workflow_id) = workflow_id {
                broadcast_workflow_roster(state, &workflow_id).await;
            }
        }

        SessionMessage::Activity => {
            if let Some(user_id) = current_user {
                state.coordinator.touch_user(user_id).await;
            }
        }

        SessionMessage::WorkflowJoin { workflow_id } => {
            let Some(user_id) = current_user else {
                send_unidentified_error(state, socket_id).await;
                return;
            };
            state
                .coordinator
                .set_user_workflow(user_id, Some(workflow_id.clone()))
                .await;
            broadcast_workflow_roster(state, &workflow_id).await;
        }

        SessionMessage::WorkflowLeave => {
            let Some(user_id) = current_user else {
                send_unidentified_error(state, socket_id).await;
                return;
            };
            let previous = state
                .coordinator
                .get_user(user_id)
                .await
                .and_then(|session| session.workflow_id);
            state.coordinator.set_user_workflow(user_id, None).await;
            if let Some(workflow_id) = previous {
                broadcast_workflow_roster(state, &workflow_id).await;
            }
        }

        // Server-to-client messages arriving inbound are client bugs.
        other => {
            tracing::debug!(socket_id = %socket_id, message = ?other, "Ignoring server-bound message from client");
        }
    }
}

/// Broadcast the current roster of users viewing a workflow.
async fn broadcast_workflow_roster(state: &AppState, workflow_id: &str) {
    let users: Vec<WorkflowUser> = state
        .coordinator
        .get_workflow_users(workflow_id)
        .await
        .into_iter()
        .map(|session| WorkflowUser {
            user_id: session.user_id,
            user_name: session.user_name,
            last_activity: session.last_activity,
        })
        .collect();

    let message = SessionMessage::WorkflowUsers {
        workflow_id: workflow_id.to_owned(),
        users,
    };
    match serde_json::to_string(&message) {
        Ok(json) => state.ws_manager.broadcast(Message::Text(json.into())).await,
        Err(e) => tracing::error!(error = %e, "Failed to serialize workflow roster"),
    }
}

/// Reply with a single protocol message on one socket.
async fn send_session_message(state: &AppState, socket_id: &str, message: &SessionMessage) {
    match serde_json::to_string(message) {
        Ok(json) => {
            state.ws_manager.send_to(socket_id, Message::Text(json.into())).await;
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize session message"),
    }
}

async fn send_unidentified_error(state: &AppState, socket_id: &str) {
    send_session_message(
        state,
        socket_id,
        &SessionMessage::Error {
            code: "VALIDATION".to_string(),
            message: "Identify before joining a workflow".to_string(),
        },
    )
    .await;
}
