//! WebSocket upgrade + message loop. Each connection owns one private wizard
//! session; it is dropped when the socket closes. Each client message is
//! parsed as JSON and forwarded to core logic. We reply with a single JSON
//! message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::logic::*;
use crate::protocol::{to_view, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;
use crate::util::trunc_for_log;
use crate::wizard::WizardSession;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "challenge_wizard", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let mut session = WizardSession::new();
  info!(target: "challenge_wizard", session = %session.id, "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "challenge_wizard", session = %session.id, "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &mut session)
          }
          Err(e) => {
            debug!(target: "challenge_wizard", session = %session.id, raw = %trunc_for_log(&txt, 200), "WS message rejected");
            ServerWsMessage::Error { message: format!("Invalid JSON: {}", e), notifications: Vec::new() }
          }
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "challenge_wizard", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "challenge_wizard", session = %session.id, "WebSocket disconnected; session dropped");
}

fn failure_msg(f: Failure) -> ServerWsMessage {
  ServerWsMessage::Error { message: f.error.to_string(), notifications: f.notifications }
}

#[instrument(level = "info", skip(state, session), fields(session = %session.id))]
fn handle_client_ws(msg: ClientWsMessage, state: &AppState, session: &mut WizardSession) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Snapshot => ServerWsMessage::View { view: to_view(session) },

    ClientWsMessage::Dispatch { action } => match dispatch_action(state, session, action) {
      Ok(view) => ServerWsMessage::View { view },
      Err(f) => failure_msg(f),
    },

    ClientWsMessage::Submit => match submit_session(state, session) {
      Ok(result) => {
        info!(target: "wizard", receipt = %result.receipt.id, "WS submission accepted");
        ServerWsMessage::Submitted { result }
      }
      Err(f) => failure_msg(f),
    },

    ClientWsMessage::Review => ServerWsMessage::Review { review: session.review() },

    ClientWsMessage::InviteCode => match invite_code(state, session) {
      Ok(result) => ServerWsMessage::InviteCode { result },
      Err(f) => failure_msg(f),
    },

    ClientWsMessage::Preview => match preview(session) {
      Ok(result) => ServerWsMessage::Preview { result },
      Err(f) => failure_msg(f),
    },
  }
}
