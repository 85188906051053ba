//! Errors raised by the wizard controller.

use uuid::Uuid;

use crate::collab::CollabError;

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
  /// Required fields missing at submission. The only error shown to the
  /// admin as a notification.
  #[error("validation failed: {0}")]
  Validation(String),

  /// A wholesale reward replacement that the field-wise edits could never
  /// have produced.
  #[error("invalid rewards: {0}")]
  InvalidRewards(String),

  #[error("submission is only available on the last step")]
  NotAtFinalStep,

  #[error("{action} needs a {expected} challenge, but the selected type is {active}")]
  IncompatibleReward {
    action: &'static str,
    expected: &'static str,
    active: String,
  },

  #[error("no item with id {0}")]
  ItemNotFound(Uuid),

  #[error(transparent)]
  Collaborator(#[from] CollabError),
}
