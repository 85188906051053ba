//! Boundary collaborators of the wizard: notifications, submission, and
//! invite-code rendering. Each is a trait so the service can swap the
//! defaults below.

use std::sync::Mutex;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::FinalizedChallenge;

#[derive(Debug, thiserror::Error)]
pub enum CollabError {
  #[error("submission rejected: {0}")]
  Rejected(String),
  #[error("invite code rendering failed: {0}")]
  Render(String),
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Default,
  Destructive,
}

/// Transient message for the admin (a toast in the front end).
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Notification {
  pub title: String,
  pub description: String,
  pub severity: Severity,
}

impl Notification {
  pub fn info(title: &str, description: &str) -> Self {
    Self { title: title.into(), description: description.into(), severity: Severity::Default }
  }

  pub fn destructive(title: &str, description: &str) -> Self {
    Self { title: title.into(), description: description.into(), severity: Severity::Destructive }
  }
}

pub trait Notifier: Send + Sync {
  fn notify(&self, notification: &Notification);
}

/// Default notifier: notifications end up in the service log.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  fn notify(&self, n: &Notification) {
    match n.severity {
      Severity::Default => info!(target: "wizard", title = %n.title, description = %n.description, "notify"),
      Severity::Destructive => warn!(target: "wizard", title = %n.title, description = %n.description, "notify"),
    }
  }
}

/// Forwards to another notifier and keeps a copy of everything sent, so a
/// request handler can return the notifications to its caller.
pub struct Outbox<'a> {
  inner: &'a dyn Notifier,
  sent: Mutex<Vec<Notification>>,
}

impl<'a> Outbox<'a> {
  pub fn new(inner: &'a dyn Notifier) -> Self {
    Self { inner, sent: Mutex::new(Vec::new()) }
  }

  pub fn into_sent(self) -> Vec<Notification> {
    self.sent.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl Notifier for Outbox<'_> {
  fn notify(&self, n: &Notification) {
    self.inner.notify(n);
    match self.sent.lock() {
      Ok(mut sent) => sent.push(n.clone()),
      Err(poisoned) => poisoned.into_inner().push(n.clone()),
    }
  }
}

/// Acknowledgement from the submission sink.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Receipt {
  pub id: Uuid,
  pub accepted_at: DateTime<Utc>,
}

/// Receives finalized challenges. Called synchronously, at most once per
/// successful submission; a failed call leaves the draft intact for retry.
pub trait SubmissionSink: Send + Sync {
  fn accept(&self, record: &FinalizedChallenge) -> Result<Receipt, CollabError>;
}

/// Default sink: logs the record as JSON and acknowledges it.
pub struct LogSink;

impl SubmissionSink for LogSink {
  fn accept(&self, record: &FinalizedChallenge) -> Result<Receipt, CollabError> {
    let json = serde_json::to_string(record).map_err(|e| CollabError::Rejected(e.to_string()))?;
    let receipt = Receipt { id: Uuid::new_v4(), accepted_at: Utc::now() };
    info!(target: "wizard", receipt = %receipt.id, kind = %record.kind, record = %json, "Challenge submitted");
    Ok(receipt)
  }
}

/// Image payload for an invite link.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RenderedCode {
  pub link: String,
  pub mime: String,
  pub data_uri: String,
}

pub trait InviteCodeRenderer: Send + Sync {
  fn render(&self, link: &str) -> Result<RenderedCode, CollabError>;
}

/// Placeholder renderer: wraps the link itself in a base64 data URI.
/// A QR renderer plugs in behind the same trait.
pub struct DataUriRenderer;

impl InviteCodeRenderer for DataUriRenderer {
  fn render(&self, link: &str) -> Result<RenderedCode, CollabError> {
    let link = link.trim();
    if link.is_empty() {
      return Err(CollabError::Render("invite link is empty".into()));
    }
    let mime = "text/plain".to_string();
    let data_uri = format!("data:{};base64,{}", mime, STANDARD.encode(link.as_bytes()));
    Ok(RenderedCode { link: link.to_string(), mime, data_uri })
  }
}
