//! Reward variants, one shape per challenge kind, plus the weighted outcome
//! table shared by the wheel and scratch-card mechanics.
//!
//! Every list in here is a `KeyedList`, so edits address items by a stable
//! id instead of by position.

use std::collections::BTreeMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ChallengeKind, KeyedList};

/// What a single wheel/scratch outcome pays out.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutcomeKind {
  Points,
  Text,
  Offers {
    #[serde(default)] description: String,
    #[serde(default)] companies: Vec<String>,
  },
  Discount {
    #[serde(default)] product_name: String,
    #[serde(default)] percentage: u8,
    #[serde(default)] companies: Vec<String>,
  },
}

/// Payload-free tag of an `OutcomeKind`, used when retagging an outcome.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTag {
  Points,
  Text,
  Offers,
  Discount,
}

impl OutcomeKind {
  pub fn tag(&self) -> OutcomeTag {
    match self {
      OutcomeKind::Points => OutcomeTag::Points,
      OutcomeKind::Text => OutcomeTag::Text,
      OutcomeKind::Offers { .. } => OutcomeTag::Offers,
      OutcomeKind::Discount { .. } => OutcomeTag::Discount,
    }
  }

  /// Switch to another tag. Company lists survive a switch between offers
  /// and discounts; everything else starts empty.
  pub fn retag(self, tag: OutcomeTag) -> OutcomeKind {
    if self.tag() == tag {
      return self;
    }
    let companies = match self {
      OutcomeKind::Offers { companies, .. } | OutcomeKind::Discount { companies, .. } => companies,
      _ => Vec::new(),
    };
    match tag {
      OutcomeTag::Points => OutcomeKind::Points,
      OutcomeTag::Text => OutcomeKind::Text,
      OutcomeTag::Offers => OutcomeKind::Offers { description: String::new(), companies },
      OutcomeTag::Discount => OutcomeKind::Discount { product_name: String::new(), percentage: 0, companies },
    }
  }

  fn companies_mut(&mut self) -> Option<&mut Vec<String>> {
    match self {
      OutcomeKind::Offers { companies, .. } | OutcomeKind::Discount { companies, .. } => Some(companies),
      _ => None,
    }
  }
}

/// One possible result of a spin or scratch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
  #[serde(flatten)]
  pub kind: OutcomeKind,
  pub value: String,
  /// Relative selection weight. Not normalized.
  pub weight: u32,
}

/// Field-wise edit of one outcome. Absent fields are left alone; payload
/// fields that don't belong to the outcome's kind are ignored.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutcomePatch {
  pub kind: Option<OutcomeTag>,
  pub value: Option<String>,
  pub weight: Option<u32>,
  pub product_name: Option<String>,
  pub discount_percentage: Option<u8>,
  pub offer_description: Option<String>,
}

impl Outcome {
  pub fn new(value: impl Into<String>, weight: u32) -> Self {
    Self { kind: OutcomeKind::Points, value: value.into(), weight }
  }

  pub fn apply(&mut self, patch: OutcomePatch) {
    if let Some(tag) = patch.kind {
      let kind = std::mem::replace(&mut self.kind, OutcomeKind::Points);
      self.kind = kind.retag(tag);
    }
    if let Some(v) = patch.value { self.value = v; }
    if let Some(w) = patch.weight { self.weight = w; }
    match &mut self.kind {
      OutcomeKind::Discount { product_name, percentage, .. } => {
        if let Some(p) = patch.product_name { *product_name = p; }
        if let Some(pct) = patch.discount_percentage { *percentage = pct.min(100); }
      }
      OutcomeKind::Offers { description, .. } => {
        if let Some(d) = patch.offer_description { *description = d; }
      }
      _ => {}
    }
  }

  /// Returns false when the outcome kind carries no company list or the
  /// company is already attached.
  pub fn add_company(&mut self, company: &str) -> bool {
    match self.kind.companies_mut() {
      Some(list) if !list.iter().any(|c| c == company) => {
        list.push(company.to_string());
        true
      }
      _ => false,
    }
  }

  pub fn remove_company(&mut self, company: &str) -> bool {
    match self.kind.companies_mut() {
      Some(list) => {
        let before = list.len();
        list.retain(|c| c != company);
        list.len() != before
      }
      None => false,
    }
  }
}

/// Ordered, identity-keyed outcomes with weighted selection.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct OutcomeTable(pub KeyedList<Outcome>);

impl OutcomeTable {
  pub fn push(&mut self, outcome: Outcome) -> Uuid { self.0.push(outcome) }
  pub fn remove(&mut self, id: &Uuid) -> Option<Outcome> { self.0.remove(id) }
  pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Outcome> { self.0.get_mut(id) }
  pub fn len(&self) -> usize { self.0.len() }
  pub fn is_empty(&self) -> bool { self.0.is_empty() }
  pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &Outcome)> { self.0.iter() }

  pub fn total_weight(&self) -> u64 {
    self.0.values().map(|o| u64::from(o.weight)).sum()
  }

  /// Each outcome's share of the total weight, in list order.
  /// All zeros when the total is zero.
  pub fn chances(&self) -> Vec<(Uuid, f64)> {
    let total = self.total_weight();
    self
      .iter()
      .map(|(id, o)| {
        let share = if total == 0 { 0.0 } else { f64::from(o.weight) / total as f64 };
        (*id, share)
      })
      .collect()
  }

  /// Weighted draw. `None` for an empty table or when every weight is zero.
  pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(Uuid, &Outcome)> {
    // Summed as u64 so that large u32 weights cannot overflow the running total.
    let dist = WeightedIndex::new(self.0.values().map(|o| u64::from(o.weight))).ok()?;
    let idx = dist.sample(rng);
    self.iter().nth(idx).map(|(id, o)| (*id, o))
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
  pub product_name: String,
  pub points: u32,
  #[serde(default)]
  pub label: String,
}

pub const QUIZ_CHOICES: usize = 4;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestion {
  pub question: String,
  pub choices: [String; QUIZ_CHOICES],
  /// Index into `choices`.
  pub correct_answer: usize,
  pub points: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotPayout {
  pub points: u32,
  /// Percent, 0..=100.
  pub jackpot_probability: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareIncentive {
  pub points: u32,
  pub share_link: String,
}

/// Reward configuration for exactly one challenge kind.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "config")]
pub enum Rewards {
  #[serde(rename = "Spin the Wheel")]
  SpinTheWheel(OutcomeTable),
  #[serde(rename = "Scratch Card")]
  ScratchCard(OutcomeTable),
  #[serde(rename = "Buy Products")]
  BuyProducts(KeyedList<Product>),
  #[serde(rename = "Quiz Challenge")]
  Quiz(KeyedList<QuizQuestion>),
  #[serde(rename = "Slot Machine")]
  SlotMachine(SlotPayout),
  #[serde(rename = "Share to Earn")]
  ShareToEarn(ShareIncentive),
}

impl Rewards {
  pub fn empty_for(kind: ChallengeKind) -> Self {
    match kind {
      ChallengeKind::SpinTheWheel => Rewards::SpinTheWheel(OutcomeTable::default()),
      ChallengeKind::ScratchCard => Rewards::ScratchCard(OutcomeTable::default()),
      ChallengeKind::BuyProducts => Rewards::BuyProducts(KeyedList::default()),
      ChallengeKind::QuizChallenge => Rewards::Quiz(KeyedList::default()),
      ChallengeKind::SlotMachine => Rewards::SlotMachine(SlotPayout::default()),
      ChallengeKind::ShareToEarn => Rewards::ShareToEarn(ShareIncentive::default()),
    }
  }

  pub fn kind(&self) -> ChallengeKind {
    match self {
      Rewards::SpinTheWheel(_) => ChallengeKind::SpinTheWheel,
      Rewards::ScratchCard(_) => ChallengeKind::ScratchCard,
      Rewards::BuyProducts(_) => ChallengeKind::BuyProducts,
      Rewards::Quiz(_) => ChallengeKind::QuizChallenge,
      Rewards::SlotMachine(_) => ChallengeKind::SlotMachine,
      Rewards::ShareToEarn(_) => ChallengeKind::ShareToEarn,
    }
  }

  /// Bring a wholesale replacement in line with what the field-wise edits
  /// allow: percentages are capped at 100 and outcome companies are limited
  /// to `catalog` without duplicates. A quiz answer index outside the
  /// choices cannot be repaired and is an error.
  pub fn normalize(&mut self, catalog: &[String]) -> Result<(), String> {
    match self {
      Rewards::SpinTheWheel(t) | Rewards::ScratchCard(t) => {
        for outcome in t.0.values_mut() {
          if let OutcomeKind::Discount { percentage, .. } = &mut outcome.kind {
            *percentage = (*percentage).min(100);
          }
          if let Some(companies) = outcome.kind.companies_mut() {
            keep_catalog_companies(companies, catalog);
          }
        }
      }
      Rewards::Quiz(questions) => {
        if let Some(q) = questions.values().find(|q| q.correct_answer >= QUIZ_CHOICES) {
          return Err(format!(
            "question {:?} has answer index {}, expected one below {}",
            q.question, q.correct_answer, QUIZ_CHOICES
          ));
        }
      }
      Rewards::SlotMachine(payout) => payout.jackpot_probability = payout.jackpot_probability.min(100),
      Rewards::BuyProducts(_) | Rewards::ShareToEarn(_) => {}
    }
    Ok(())
  }

  /// True while nothing has been entered beyond the empty variant.
  pub fn is_blank(&self) -> bool {
    *self == Rewards::empty_for(self.kind())
  }

  /// Number of configured entries; fixed-payout variants count as one.
  pub fn line_count(&self) -> usize {
    match self {
      Rewards::SpinTheWheel(t) | Rewards::ScratchCard(t) => t.len(),
      Rewards::BuyProducts(p) => p.len(),
      Rewards::Quiz(q) => q.len(),
      Rewards::SlotMachine(_) | Rewards::ShareToEarn(_) => 1,
    }
  }
}

fn keep_catalog_companies(companies: &mut Vec<String>, catalog: &[String]) {
  let mut seen: Vec<String> = Vec::with_capacity(companies.len());
  companies.retain(|c| {
    let keep = catalog.contains(c) && !seen.contains(c);
    if keep {
      seen.push(c.clone());
    }
    keep
  });
}

/// Per-kind reward slots kept in a draft. Switching challenge kind leaves
/// other slots untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RewardDrafts {
  slots: BTreeMap<ChallengeKind, Rewards>,
}

impl RewardDrafts {
  pub fn get(&self, kind: ChallengeKind) -> Option<&Rewards> {
    self.slots.get(&kind)
  }

  /// Slot for `kind`, created empty on first access.
  pub fn slot_mut(&mut self, kind: ChallengeKind) -> &mut Rewards {
    self.slots.entry(kind).or_insert_with(|| Rewards::empty_for(kind))
  }

  pub fn replace(&mut self, rewards: Rewards) {
    self.slots.insert(rewards.kind(), rewards);
  }

  /// Slot contents for `kind`, or an empty variant when nothing was entered.
  pub fn resolved(&self, kind: ChallengeKind) -> Rewards {
    self.get(kind).cloned().unwrap_or_else(|| Rewards::empty_for(kind))
  }

  /// Kinds whose slot holds something other than the empty variant.
  pub fn populated_kinds(&self) -> impl Iterator<Item = ChallengeKind> + '_ {
    self.slots.iter().filter(|(_, r)| !r.is_blank()).map(|(k, _)| *k)
  }
}
