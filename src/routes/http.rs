//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs the session id and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::WizardError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;
use crate::wizard::WizardAction;

/// Error response: status derived from the wizard error, body carries the
/// notifications raised on the way.
pub struct ApiError {
  status: StatusCode,
  body: ErrorOut,
}

impl ApiError {
  fn unknown_session(id: Uuid) -> Self {
    Self {
      status: StatusCode::NOT_FOUND,
      body: ErrorOut { error: format!("Unknown session: {}", id), notifications: Vec::new() },
    }
  }
}

pub fn status_for(e: &WizardError) -> StatusCode {
  match e {
    WizardError::Validation(_) | WizardError::InvalidRewards(_) => StatusCode::UNPROCESSABLE_ENTITY,
    WizardError::NotAtFinalStep | WizardError::IncompatibleReward { .. } => StatusCode::CONFLICT,
    WizardError::ItemNotFound(_) => StatusCode::NOT_FOUND,
    WizardError::Collaborator(_) => StatusCode::BAD_GATEWAY,
  }
}

impl From<Failure> for ApiError {
  fn from(f: Failure) -> Self {
    Self {
      status: status_for(&f.error),
      body: ErrorOut { error: f.error.to_string(), notifications: f.notifications },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status, Json(self.body)).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info")]
pub async fn http_challenge_kinds() -> impl IntoResponse { Json(challenge_kinds()) }

#[instrument(level = "info", skip(state))]
pub async fn http_companies(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(CompaniesOut { companies: state.config.companies.clone() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_open_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let session = state.open_session().await;
  (StatusCode::CREATED, Json(to_view(&session)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
  let session = state.get_session(id).await.ok_or_else(|| ApiError::unknown_session(id))?;
  Ok(Json(to_view(&session)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_discard_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  if state.discard_session(id).await {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::unknown_session(id))
  }
}

#[instrument(level = "info", skip(state, action), fields(action = action.name()))]
pub async fn http_post_action(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(action): Json<WizardAction>,
) -> Result<Json<SessionView>, ApiError> {
  let view = state
    .with_session(id, |s| dispatch_action(&state, s, action))
    .await
    .ok_or_else(|| ApiError::unknown_session(id))??;
  info!(target: "wizard", %id, step = view.step, "HTTP action applied");
  Ok(Json(view))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_submit(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SubmitOut>, ApiError> {
  let out = state
    .with_session(id, |s| submit_session(&state, s))
    .await
    .ok_or_else(|| ApiError::unknown_session(id))??;
  info!(target: "wizard", %id, receipt = %out.receipt.id, "HTTP submission accepted");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_review(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<crate::wizard::ReviewSummary>, ApiError> {
  let session = state.get_session(id).await.ok_or_else(|| ApiError::unknown_session(id))?;
  Ok(Json(session.review()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_invite_code(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<InviteCodeOut>, ApiError> {
  let session = state.get_session(id).await.ok_or_else(|| ApiError::unknown_session(id))?;
  Ok(Json(invite_code(&state, &session)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_preview(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<PreviewOut>, ApiError> {
  let session = state.get_session(id).await.ok_or_else(|| ApiError::unknown_session(id))?;
  Ok(Json(preview(&session)?))
}
