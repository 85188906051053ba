//! Wizard state controller.
//!
//! A `WizardSession` owns one `ChallengeDraft`, the step cursor, and the
//! transient input buffers of the rewards step. Every mutation goes
//! through `apply(WizardAction)`; submission is a separate operation that
//! is only available on the last step.
//!
//! Step progression is an unguarded counter clamped to `[0, last]`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::collab::{InviteCodeRenderer, Notification, Notifier, Receipt, RenderedCode, SubmissionSink};
use crate::config::WizardConfig;
use crate::domain::{
  ChallengeDraft, ChallengeKind, ChallengePatch, FinalizedChallenge, KeyedList, Timing, Visibility,
};
use crate::error::WizardError;
use crate::rewards::{Outcome, OutcomePatch, OutcomeTable, Product, QuizQuestion, Rewards, QUIZ_CHOICES};

/// The wizard's sections, in order.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Section {
  Basics,
  Mechanics,
  Rewards,
  Review,
}

impl Section {
  pub const ALL: [Section; 4] = [Section::Basics, Section::Mechanics, Section::Rewards, Section::Review];

  pub fn title(self) -> &'static str {
    match self {
      Section::Basics => "Challenge Basics",
      Section::Mechanics => "Mechanics & Settings",
      Section::Rewards => "Rewards Configuration",
      Section::Review => "Review & Schedule",
    }
  }
}

pub const TOTAL_STEPS: usize = Section::ALL.len();

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductInput {
  pub product_name: String,
  pub points: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionInput {
  pub question: String,
  pub choices: [String; QUIZ_CHOICES],
  pub correct_answer: usize,
  pub points: u32,
}

/// Half-typed entries of the rewards step, not yet part of the draft.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct InputBuffers {
  pub outcome: String,
  pub product: ProductInput,
  pub question: QuestionInput,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChoiceInput {
  pub index: usize,
  pub text: String,
}

/// Everything a client can do to a session short of submitting it.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WizardAction {
  Update(ChallengePatch),
  Advance,
  Retreat,

  // Wheel / scratch outcomes
  SetOutcomeInput { value: String },
  AddOutcome,
  RemoveOutcome { id: Uuid },
  EditOutcome { id: Uuid, patch: OutcomePatch },
  AddOutcomeCompany { id: Uuid, company: String },
  RemoveOutcomeCompany { id: Uuid, company: String },

  // Buy products
  SetProductInput {
    #[serde(default)] product_name: Option<String>,
    #[serde(default)] points: Option<u32>,
  },
  AddProduct,
  RemoveProduct { id: Uuid },
  EditProduct {
    id: Uuid,
    #[serde(default)] product_name: Option<String>,
    #[serde(default)] points: Option<u32>,
    #[serde(default)] label: Option<String>,
  },

  // Quiz
  SetQuestionInput {
    #[serde(default)] question: Option<String>,
    #[serde(default)] choice: Option<ChoiceInput>,
    #[serde(default)] correct_answer: Option<usize>,
    #[serde(default)] points: Option<u32>,
  },
  AddQuestion,
  RemoveQuestion { id: Uuid },

  // Fixed payouts
  SetSlotMachine {
    #[serde(default)] points: Option<u32>,
    #[serde(default)] jackpot_probability: Option<u8>,
  },
  SetShareToEarn {
    #[serde(default)] points: Option<u32>,
    #[serde(default)] share_link: Option<String>,
  },

  ReplaceRewards { rewards: Rewards },

  // Invite list
  AddParticipant { identifier: String },
  RemoveParticipant { id: Uuid },
  GenerateInviteLink,
}

impl WizardAction {
  pub fn name(&self) -> &'static str {
    match self {
      WizardAction::Update(_) => "update",
      WizardAction::Advance => "advance",
      WizardAction::Retreat => "retreat",
      WizardAction::SetOutcomeInput { .. } => "set_outcome_input",
      WizardAction::AddOutcome => "add_outcome",
      WizardAction::RemoveOutcome { .. } => "remove_outcome",
      WizardAction::EditOutcome { .. } => "edit_outcome",
      WizardAction::AddOutcomeCompany { .. } => "add_outcome_company",
      WizardAction::RemoveOutcomeCompany { .. } => "remove_outcome_company",
      WizardAction::SetProductInput { .. } => "set_product_input",
      WizardAction::AddProduct => "add_product",
      WizardAction::RemoveProduct { .. } => "remove_product",
      WizardAction::EditProduct { .. } => "edit_product",
      WizardAction::SetQuestionInput { .. } => "set_question_input",
      WizardAction::AddQuestion => "add_question",
      WizardAction::RemoveQuestion { .. } => "remove_question",
      WizardAction::SetSlotMachine { .. } => "set_slot_machine",
      WizardAction::SetShareToEarn { .. } => "set_share_to_earn",
      WizardAction::ReplaceRewards { .. } => "replace_rewards",
      WizardAction::AddParticipant { .. } => "add_participant",
      WizardAction::RemoveParticipant { .. } => "remove_participant",
      WizardAction::GenerateInviteLink => "generate_invite_link",
    }
  }
}

/// Result of an acknowledged submission.
#[derive(Clone, Debug, Serialize)]
pub struct Submission {
  pub receipt: Receipt,
  pub record: FinalizedChallenge,
}

/// Read-only digest shown on the review step.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ReviewSummary {
  pub name: String,
  pub kind: Option<ChallengeKind>,
  pub description: String,
  pub banner: Option<String>,
  pub visibility: Visibility,
  pub participants: usize,
  pub reward_lines: usize,
  pub publish: Timing,
  pub start: Timing,
  pub end_at: Option<chrono::DateTime<chrono::Utc>>,
  /// Non-blocking issues; submission does not check these.
  pub warnings: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct WizardSession {
  pub id: Uuid,
  step: usize,
  pub draft: ChallengeDraft,
  pub buffers: InputBuffers,
}

impl Default for WizardSession {
  fn default() -> Self {
    Self::new()
  }
}

impl WizardSession {
  pub fn new() -> Self {
    Self { id: Uuid::new_v4(), step: 0, draft: ChallengeDraft::default(), buffers: InputBuffers::default() }
  }

  pub fn step(&self) -> usize { self.step }
  pub fn section(&self) -> Section { Section::ALL[self.step] }
  pub fn is_final_step(&self) -> bool { self.step == TOTAL_STEPS - 1 }

  pub fn progress_fraction(&self) -> f32 {
    (self.step + 1) as f32 / TOTAL_STEPS as f32
  }

  /// Apply one action. Merges and step moves never fail; reward edits fail
  /// when they don't fit the selected challenge type or name a missing id.
  #[instrument(level = "debug", skip(self, cfg, action), fields(session = %self.id, action = action.name()))]
  pub fn apply(&mut self, action: WizardAction, cfg: &WizardConfig) -> Result<(), WizardError> {
    match action {
      WizardAction::Update(patch) => {
        debug!(target: "wizard", session = %self.id, fields = ?patch.touched(), "merge");
        self.draft.merge(patch);
      }
      WizardAction::Advance => self.step = (self.step + 1).min(TOTAL_STEPS - 1),
      WizardAction::Retreat => self.step = self.step.saturating_sub(1),

      WizardAction::SetOutcomeInput { value } => self.buffers.outcome = value,
      WizardAction::AddOutcome => {
        if self.buffers.outcome.trim().is_empty() {
          return Ok(());
        }
        let outcome = Outcome::new(self.buffers.outcome.clone(), cfg.default_outcome_weight);
        let id = self.outcome_table_mut("add_outcome")?.push(outcome);
        self.buffers.outcome.clear();
        debug!(target: "wizard", session = %self.id, %id, "outcome added");
      }
      WizardAction::RemoveOutcome { id } => {
        self.outcome_table_mut("remove_outcome")?.remove(&id).ok_or(WizardError::ItemNotFound(id))?;
      }
      WizardAction::EditOutcome { id, patch } => {
        self.outcome_mut("edit_outcome", id)?.apply(patch);
      }
      WizardAction::AddOutcomeCompany { id, company } => {
        if !cfg.knows_company(&company) {
          debug!(target: "wizard", session = %self.id, %company, "company not in catalog; ignored");
          return Ok(());
        }
        if !self.outcome_mut("add_outcome_company", id)?.add_company(&company) {
          debug!(target: "wizard", session = %self.id, %id, %company, "company not attached");
        }
      }
      WizardAction::RemoveOutcomeCompany { id, company } => {
        self.outcome_mut("remove_outcome_company", id)?.remove_company(&company);
      }

      WizardAction::SetProductInput { product_name, points } => {
        if let Some(n) = product_name { self.buffers.product.product_name = n; }
        if let Some(p) = points { self.buffers.product.points = p; }
      }
      WizardAction::AddProduct => {
        if self.buffers.product.product_name.trim().is_empty() {
          return Ok(());
        }
        let input = self.buffers.product.clone();
        self.products_mut("add_product")?.push(Product {
          product_name: input.product_name,
          points: input.points,
          label: String::new(),
        });
        self.buffers.product = ProductInput::default();
      }
      WizardAction::RemoveProduct { id } => {
        self.products_mut("remove_product")?.remove(&id).ok_or(WizardError::ItemNotFound(id))?;
      }
      WizardAction::EditProduct { id, product_name, points, label } => {
        let product = self.products_mut("edit_product")?.get_mut(&id).ok_or(WizardError::ItemNotFound(id))?;
        if let Some(n) = product_name { product.product_name = n; }
        if let Some(p) = points { product.points = p; }
        if let Some(l) = label { product.label = l; }
      }

      WizardAction::SetQuestionInput { question, choice, correct_answer, points } => {
        let q = &mut self.buffers.question;
        if let Some(text) = question { q.question = text; }
        if let Some(ChoiceInput { index, text }) = choice {
          if let Some(slot) = q.choices.get_mut(index) {
            *slot = text;
          }
        }
        if let Some(i) = correct_answer {
          if i < QUIZ_CHOICES { q.correct_answer = i; }
        }
        if let Some(p) = points { q.points = p; }
      }
      WizardAction::AddQuestion => {
        if self.buffers.question.question.trim().is_empty() {
          return Ok(());
        }
        let input = self.buffers.question.clone();
        self.questions_mut("add_question")?.push(QuizQuestion {
          question: input.question,
          choices: input.choices,
          correct_answer: input.correct_answer,
          points: input.points,
        });
        self.buffers.question = QuestionInput::default();
      }
      WizardAction::RemoveQuestion { id } => {
        self.questions_mut("remove_question")?.remove(&id).ok_or(WizardError::ItemNotFound(id))?;
      }

      WizardAction::SetSlotMachine { points, jackpot_probability } => {
        let err = self.mismatch("set_slot_machine", "Slot Machine");
        match self.active_slot() {
          Some(Rewards::SlotMachine(payout)) => {
            if let Some(p) = points { payout.points = p; }
            if let Some(pr) = jackpot_probability { payout.jackpot_probability = pr.min(100); }
          }
          _ => return Err(err),
        }
      }
      WizardAction::SetShareToEarn { points, share_link } => {
        let err = self.mismatch("set_share_to_earn", "Share to Earn");
        match self.active_slot() {
          Some(Rewards::ShareToEarn(share)) => {
            if let Some(p) = points { share.points = p; }
            if let Some(l) = share_link { share.share_link = l; }
          }
          _ => return Err(err),
        }
      }
      WizardAction::ReplaceRewards { mut rewards } => {
        rewards.normalize(&cfg.companies).map_err(WizardError::InvalidRewards)?;
        self.draft.rewards.replace(rewards);
      }

      WizardAction::AddParticipant { identifier } => {
        let identifier = identifier.trim();
        let participants = &mut self.draft.invite.participants;
        if !identifier.is_empty() && !participants.values().any(|p| p == identifier) {
          participants.push(identifier.to_string());
        }
      }
      WizardAction::RemoveParticipant { id } => {
        self.draft.invite.participants.remove(&id).ok_or(WizardError::ItemNotFound(id))?;
      }
      WizardAction::GenerateInviteLink => {
        self.draft.invite.link = format!("{}/{}", cfg.invite_base_url.trim_end_matches('/'), self.id);
        info!(target: "wizard", session = %self.id, link = %self.draft.invite.link, "invite link generated");
      }
    }
    Ok(())
  }

  /// Validate required fields and hand the record to the sink. On success
  /// the session starts over with a fresh draft; on any failure the draft
  /// is left as it was.
  #[instrument(level = "info", skip_all, fields(session = %self.id))]
  pub fn submit(
    &mut self,
    cfg: &WizardConfig,
    notifier: &dyn Notifier,
    sink: &dyn SubmissionSink,
  ) -> Result<Submission, WizardError> {
    if !self.is_final_step() {
      return Err(WizardError::NotAtFinalStep);
    }
    let notices = &cfg.notices;
    let record = match self.draft.finalize() {
      Ok(r) => r,
      Err(reason) => {
        notifier.notify(&Notification::destructive(&notices.missing_info_title, &notices.missing_info_description));
        warn!(target: "wizard", session = %self.id, %reason, "submission rejected");
        return Err(WizardError::Validation(reason));
      }
    };

    match sink.accept(&record) {
      Ok(receipt) => {
        notifier.notify(&Notification::info(&notices.created_title, &notices.created_description));
        info!(target: "wizard", session = %self.id, receipt = %receipt.id, "submission acknowledged");
        self.reset();
        Ok(Submission { receipt, record })
      }
      Err(e) => {
        notifier.notify(&Notification::destructive(&notices.submit_failed_title, &e.to_string()));
        warn!(target: "wizard", session = %self.id, error = %e, "submission sink failed");
        Err(e.into())
      }
    }
  }

  /// Render the current invite link and report the outcome.
  #[instrument(level = "info", skip_all, fields(session = %self.id))]
  pub fn render_invite_code(
    &self,
    cfg: &WizardConfig,
    notifier: &dyn Notifier,
    renderer: &dyn InviteCodeRenderer,
  ) -> Result<RenderedCode, WizardError> {
    let notices = &cfg.notices;
    match renderer.render(&self.draft.invite.link) {
      Ok(code) => {
        notifier.notify(&Notification::info(&notices.invite_ready_title, &notices.invite_ready_description));
        Ok(code)
      }
      Err(e) => {
        notifier.notify(&Notification::destructive(&notices.invite_failed_title, &notices.invite_failed_description));
        warn!(target: "wizard", session = %self.id, error = %e, "invite code rendering failed");
        Err(WizardError::Collaborator(e))
      }
    }
  }

  /// Weighted sample from the active wheel/scratch table. Never mutates.
  pub fn preview_draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Option<(Uuid, Outcome)>, WizardError> {
    let err = self.mismatch("preview", "Spin the Wheel or Scratch Card");
    let kind = self.draft.kind.filter(|k| k.uses_outcomes()).ok_or(err)?;
    Ok(match self.draft.rewards.get(kind) {
      Some(Rewards::SpinTheWheel(t)) | Some(Rewards::ScratchCard(t)) => t.draw(rng).map(|(id, o)| (id, o.clone())),
      _ => None,
    })
  }

  pub fn review(&self) -> ReviewSummary {
    let d = &self.draft;
    let mut warnings = Vec::new();
    match (d.schedule.end_at, d.schedule.known_start()) {
      (None, _) => warnings.push("End date is not set".to_string()),
      (Some(end), Some(start)) if end <= start => warnings.push("End date must be after the start date".to_string()),
      _ => {}
    }
    if d.visibility == Visibility::Private && d.invite.participants.is_empty() {
      warnings.push("Private challenge has no invited participants".to_string());
    }
    let active = d.active_rewards();
    if let Some(Rewards::SpinTheWheel(t)) | Some(Rewards::ScratchCard(t)) = &active {
      if !t.is_empty() && t.total_weight() == 0 {
        warnings.push("All outcome weights are zero".to_string());
      }
    }
    for stale in d.rewards.populated_kinds().filter(|k| Some(*k) != d.kind) {
      warnings.push(format!("Rewards entered for {stale} will not be submitted"));
    }

    ReviewSummary {
      name: d.name.clone(),
      kind: d.kind,
      description: d.description.clone(),
      banner: d.banner.as_ref().map(|b| b.label()),
      visibility: d.visibility,
      participants: d.invite.participants.len(),
      reward_lines: active.as_ref().map(Rewards::line_count).unwrap_or(0),
      publish: d.schedule.publish_timing(),
      start: d.schedule.start_timing(),
      end_at: d.schedule.end_at,
      warnings,
    }
  }

  fn reset(&mut self) {
    self.step = 0;
    self.draft = ChallengeDraft::default();
    self.buffers = InputBuffers::default();
  }

  fn mismatch(&self, action: &'static str, expected: &'static str) -> WizardError {
    WizardError::IncompatibleReward {
      action,
      expected,
      active: self.draft.kind.map(|k| k.to_string()).unwrap_or_else(|| "unset".into()),
    }
  }

  fn active_slot(&mut self) -> Option<&mut Rewards> {
    let kind = self.draft.kind?;
    Some(self.draft.rewards.slot_mut(kind))
  }

  fn outcome_table_mut(&mut self, action: &'static str) -> Result<&mut OutcomeTable, WizardError> {
    let err = self.mismatch(action, "Spin the Wheel or Scratch Card");
    match self.active_slot() {
      Some(Rewards::SpinTheWheel(t)) | Some(Rewards::ScratchCard(t)) => Ok(t),
      _ => Err(err),
    }
  }

  fn outcome_mut(&mut self, action: &'static str, id: Uuid) -> Result<&mut Outcome, WizardError> {
    self.outcome_table_mut(action)?.get_mut(&id).ok_or(WizardError::ItemNotFound(id))
  }

  fn products_mut(&mut self, action: &'static str) -> Result<&mut KeyedList<Product>, WizardError> {
    let err = self.mismatch(action, "Buy Products");
    match self.active_slot() {
      Some(Rewards::BuyProducts(p)) => Ok(p),
      _ => Err(err),
    }
  }

  fn questions_mut(&mut self, action: &'static str) -> Result<&mut KeyedList<QuizQuestion>, WizardError> {
    let err = self.mismatch(action, "Quiz Challenge");
    match self.active_slot() {
      Some(Rewards::Quiz(q)) => Ok(q),
      _ => Err(err),
    }
  }
}
