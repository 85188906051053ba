//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Each function works on one session the caller already holds (under the
//! store lock for HTTP, owned by the connection for WebSocket) and returns
//! a protocol DTO plus any notifications the wizard raised.

use rand::thread_rng;
use tracing::{info, instrument, warn};

use crate::collab::{Notification, Outbox};
use crate::error::WizardError;
use crate::protocol::{to_view, ChanceOut, InviteCodeOut, PreviewOut, SessionView, SubmitOut};
use crate::rewards::Rewards;
use crate::state::AppState;
use crate::wizard::{WizardAction, WizardSession};

/// A wizard error together with the notifications raised before it.
#[derive(Debug)]
pub struct Failure {
  pub error: WizardError,
  pub notifications: Vec<Notification>,
}

impl From<WizardError> for Failure {
  fn from(error: WizardError) -> Self {
    Self { error, notifications: Vec::new() }
  }
}

#[instrument(level = "info", skip(state, session, action), fields(session = %session.id, action = action.name()))]
pub fn dispatch_action(state: &AppState, session: &mut WizardSession, action: WizardAction) -> Result<SessionView, Failure> {
  let name = action.name();
  match session.apply(action, &state.config) {
    Ok(()) => Ok(to_view(session)),
    Err(e) => {
      warn!(target: "wizard", session = %session.id, action = name, error = %e, "Action rejected");
      Err(e.into())
    }
  }
}

#[instrument(level = "info", skip(state, session), fields(session = %session.id))]
pub fn submit_session(state: &AppState, session: &mut WizardSession) -> Result<SubmitOut, Failure> {
  let outbox = Outbox::new(state.notifier.as_ref());
  let result = session.submit(&state.config, &outbox, state.sink.as_ref());
  let notifications = outbox.into_sent();
  match result {
    Ok(sub) => {
      info!(target: "wizard", session = %session.id, receipt = %sub.receipt.id, kind = %sub.record.kind, "Submission accepted");
      Ok(SubmitOut { receipt: sub.receipt, record: sub.record, notifications, view: to_view(session) })
    }
    Err(error) => Err(Failure { error, notifications }),
  }
}

#[instrument(level = "info", skip(state, session), fields(session = %session.id))]
pub fn invite_code(state: &AppState, session: &WizardSession) -> Result<InviteCodeOut, Failure> {
  let outbox = Outbox::new(state.notifier.as_ref());
  let result = session.render_invite_code(&state.config, &outbox, state.renderer.as_ref());
  let notifications = outbox.into_sent();
  match result {
    Ok(code) => Ok(InviteCodeOut { code, notifications }),
    Err(error) => Err(Failure { error, notifications }),
  }
}

#[instrument(level = "debug", skip(session), fields(session = %session.id))]
pub fn preview(session: &WizardSession) -> Result<PreviewOut, Failure> {
  let drawn = session.preview_draw(&mut thread_rng())?;
  let chances = match session.draft.active_rewards() {
    Some(Rewards::SpinTheWheel(t)) | Some(Rewards::ScratchCard(t)) => {
      t.chances().into_iter().map(|(id, chance)| ChanceOut { id, chance }).collect()
    }
    _ => Vec::new(),
  };
  let (outcome_id, outcome) = match drawn {
    Some((id, o)) => (Some(id), Some(o)),
    None => (None, None),
  };
  Ok(PreviewOut { outcome_id, outcome, chances })
}
