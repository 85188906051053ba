//! Domain models: challenge kinds, the draft configuration record and its
//! partial-update patch, the schedule, and the record handed to submission.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{de::Error as _, ser::SerializeSeq, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::rewards::{RewardDrafts, Rewards};
use crate::util::{deserialize_some, mb_label};

/// Which challenge mechanic is being configured?
/// Serialized with the names shown to admins ("Spin the Wheel", ...).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChallengeKind {
  #[serde(rename = "Spin the Wheel")]
  SpinTheWheel,
  #[serde(rename = "Scratch Card")]
  ScratchCard,
  #[serde(rename = "Share to Earn")]
  ShareToEarn,
  #[serde(rename = "Quiz Challenge")]
  QuizChallenge,
  #[serde(rename = "Slot Machine")]
  SlotMachine,
  #[serde(rename = "Buy Products")]
  BuyProducts,
}

impl ChallengeKind {
  pub const ALL: [ChallengeKind; 6] = [
    ChallengeKind::SpinTheWheel,
    ChallengeKind::ScratchCard,
    ChallengeKind::ShareToEarn,
    ChallengeKind::QuizChallenge,
    ChallengeKind::SlotMachine,
    ChallengeKind::BuyProducts,
  ];

  pub fn display_name(self) -> &'static str {
    match self {
      ChallengeKind::SpinTheWheel => "Spin the Wheel",
      ChallengeKind::ScratchCard => "Scratch Card",
      ChallengeKind::ShareToEarn => "Share to Earn",
      ChallengeKind::QuizChallenge => "Quiz Challenge",
      ChallengeKind::SlotMachine => "Slot Machine",
      ChallengeKind::BuyProducts => "Buy Products",
    }
  }

  /// Wheel and scratch mechanics pay out from a weighted outcome table.
  pub fn uses_outcomes(self) -> bool {
    matches!(self, ChallengeKind::SpinTheWheel | ChallengeKind::ScratchCard)
  }
}

impl fmt::Display for ChallengeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.display_name())
  }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
  #[default]
  Public,
  Private,
}

/// Ordered list whose items are addressed by a generated id rather than by
/// position. Serialized as `[{ "id": .., "item": .. }, ...]` in list order.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyedList<T> {
  items: IndexMap<Uuid, T>,
}

impl<T> Default for KeyedList<T> {
  fn default() -> Self {
    Self { items: IndexMap::new() }
  }
}

impl<T> KeyedList<T> {
  /// Append and return the new item's id.
  pub fn push(&mut self, item: T) -> Uuid {
    let id = Uuid::new_v4();
    self.items.insert(id, item);
    id
  }

  /// Remove by id, keeping the relative order of the rest.
  pub fn remove(&mut self, id: &Uuid) -> Option<T> {
    self.items.shift_remove(id)
  }

  pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut T> { self.items.get_mut(id) }
  pub fn len(&self) -> usize { self.items.len() }
  pub fn is_empty(&self) -> bool { self.items.is_empty() }
  pub fn values(&self) -> impl Iterator<Item = &T> { self.items.values() }
  pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> { self.items.values_mut() }
  pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &T)> { self.items.iter() }

  #[cfg(test)]
  pub fn get(&self, id: &Uuid) -> Option<&T> { self.items.get(id) }
  #[cfg(test)]
  pub fn ids(&self) -> impl Iterator<Item = &Uuid> { self.items.keys() }
}

#[derive(Serialize)]
struct EntryRef<'a, T> {
  id: &'a Uuid,
  item: &'a T,
}

#[derive(Deserialize)]
struct Entry<T> {
  id: Uuid,
  item: T,
}

impl<T: Serialize> Serialize for KeyedList<T> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
    for (id, item) in &self.items {
      seq.serialize_element(&EntryRef { id, item })?;
    }
    seq.end()
  }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for KeyedList<T> {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let entries = Vec::<Entry<T>>::deserialize(deserializer)?;
    let mut items = IndexMap::with_capacity(entries.len());
    for Entry { id, item } in entries {
      if items.insert(id, item).is_some() {
        return Err(D::Error::custom(format!("duplicate id {id} in list")));
      }
    }
    Ok(Self { items })
  }
}

/// Banner reference handed over by the file picker. The image bytes never
/// pass through here.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BannerImage {
  pub file_name: String,
  pub size_bytes: u64,
  #[serde(default)] pub content_type: Option<String>,
  pub blob_ref: String,
}

impl BannerImage {
  /// "banner.png (1.23 MB)"
  pub fn label(&self) -> String {
    format!("{} ({})", self.file_name, mb_label(self.size_bytes))
  }
}

/// Invite list for private challenges.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct InviteSettings {
  #[serde(default)] pub participants: KeyedList<String>,
  #[serde(default)] pub link: String,
}

/// When something happens, once the schedule flags are resolved.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", content = "at", rename_all = "snake_case")]
pub enum Timing {
  Immediately,
  OnPublish,
  At(DateTime<Utc>),
  Unscheduled,
}

/// Publish/start flags win over their dates; the dates are kept so that
/// toggling a flag back doesn't lose them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
  pub publish_now: bool,
  pub publish_at: Option<DateTime<Utc>>,
  pub start_on_publish: bool,
  pub start_at: Option<DateTime<Utc>>,
  pub end_at: Option<DateTime<Utc>>,
}

impl Default for Schedule {
  fn default() -> Self {
    Self { publish_now: true, publish_at: None, start_on_publish: true, start_at: None, end_at: None }
  }
}

impl Schedule {
  pub fn publish_timing(&self) -> Timing {
    if self.publish_now {
      Timing::Immediately
    } else {
      self.publish_at.map(Timing::At).unwrap_or(Timing::Unscheduled)
    }
  }

  pub fn start_timing(&self) -> Timing {
    if self.start_on_publish {
      Timing::OnPublish
    } else {
      self.start_at.map(Timing::At).unwrap_or(Timing::Unscheduled)
    }
  }

  /// Concrete start instant, when one can be known ahead of time.
  pub fn known_start(&self) -> Option<DateTime<Utc>> {
    match self.start_timing() {
      Timing::At(t) => Some(t),
      Timing::OnPublish => match self.publish_timing() {
        Timing::At(t) => Some(t),
        _ => None,
      },
      _ => None,
    }
  }
}

/// The record a wizard session accumulates.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChallengeDraft {
  // Basics
  pub name: String,
  pub kind: Option<ChallengeKind>,
  pub description: String,
  pub banner: Option<BannerImage>,

  // Mechanics
  pub instructions: String,
  pub max_attempts_per_day: Option<u32>,
  pub total_attempts: Option<u32>,
  pub visibility: Visibility,
  pub invite: InviteSettings,

  pub rewards: RewardDrafts,
  pub schedule: Schedule,
}

/// Partial update of a draft. A missing key leaves the field alone; for
/// nullable fields an explicit `null` clears it.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChallengePatch {
  #[serde(default)] pub name: Option<String>,
  #[serde(default, deserialize_with = "deserialize_some")] pub kind: Option<Option<ChallengeKind>>,
  #[serde(default)] pub description: Option<String>,
  #[serde(default, deserialize_with = "deserialize_some")] pub banner: Option<Option<BannerImage>>,

  #[serde(default)] pub instructions: Option<String>,
  #[serde(default, deserialize_with = "deserialize_some")] pub max_attempts_per_day: Option<Option<u32>>,
  #[serde(default, deserialize_with = "deserialize_some")] pub total_attempts: Option<Option<u32>>,
  #[serde(default)] pub visibility: Option<Visibility>,
  #[serde(default)] pub invite: Option<InviteSettings>,

  #[serde(default)] pub publish_now: Option<bool>,
  #[serde(default, deserialize_with = "deserialize_some")] pub publish_at: Option<Option<DateTime<Utc>>>,
  #[serde(default)] pub start_on_publish: Option<bool>,
  #[serde(default, deserialize_with = "deserialize_some")] pub start_at: Option<Option<DateTime<Utc>>>,
  #[serde(default, deserialize_with = "deserialize_some")] pub end_at: Option<Option<DateTime<Utc>>>,
}

impl ChallengePatch {
  /// Names of the fields this patch touches, for logging.
  pub fn touched(&self) -> Vec<&'static str> {
    let mut out = Vec::new();
    if self.name.is_some() { out.push("name"); }
    if self.kind.is_some() { out.push("kind"); }
    if self.description.is_some() { out.push("description"); }
    if self.banner.is_some() { out.push("banner"); }
    if self.instructions.is_some() { out.push("instructions"); }
    if self.max_attempts_per_day.is_some() { out.push("max_attempts_per_day"); }
    if self.total_attempts.is_some() { out.push("total_attempts"); }
    if self.visibility.is_some() { out.push("visibility"); }
    if self.invite.is_some() { out.push("invite"); }
    if self.publish_now.is_some() { out.push("publish_now"); }
    if self.publish_at.is_some() { out.push("publish_at"); }
    if self.start_on_publish.is_some() { out.push("start_on_publish"); }
    if self.start_at.is_some() { out.push("start_at"); }
    if self.end_at.is_some() { out.push("end_at"); }
    out
  }
}

impl ChallengeDraft {
  /// Shallow merge. No validation.
  pub fn merge(&mut self, patch: ChallengePatch) {
    if let Some(v) = patch.name { self.name = v; }
    if let Some(v) = patch.kind { self.kind = v; }
    if let Some(v) = patch.description { self.description = v; }
    if let Some(v) = patch.banner { self.banner = v; }
    if let Some(v) = patch.instructions { self.instructions = v; }
    if let Some(v) = patch.max_attempts_per_day { self.max_attempts_per_day = v; }
    if let Some(v) = patch.total_attempts { self.total_attempts = v; }
    if let Some(v) = patch.visibility { self.visibility = v; }
    if let Some(v) = patch.invite { self.invite = v; }
    if let Some(v) = patch.publish_now { self.schedule.publish_now = v; }
    if let Some(v) = patch.publish_at { self.schedule.publish_at = v; }
    if let Some(v) = patch.start_on_publish { self.schedule.start_on_publish = v; }
    if let Some(v) = patch.start_at { self.schedule.start_at = v; }
    if let Some(v) = patch.end_at { self.schedule.end_at = v; }
  }

  /// Reward variant for the selected kind, if a kind is selected.
  pub fn active_rewards(&self) -> Option<Rewards> {
    self.kind.map(|k| self.rewards.resolved(k))
  }

  /// Check required fields and build the submitted record. The error is
  /// the reason shown to the admin.
  pub fn finalize(&self) -> Result<FinalizedChallenge, String> {
    let kind = match (self.name.trim().is_empty(), self.kind) {
      (false, Some(kind)) => kind,
      (true, _) => return Err("challenge name is required".into()),
      (false, None) => return Err("challenge type is required".into()),
    };
    Ok(FinalizedChallenge {
      name: self.name.clone(),
      kind,
      description: self.description.clone(),
      banner: self.banner.clone(),
      instructions: self.instructions.clone(),
      max_attempts_per_day: self.max_attempts_per_day,
      total_attempts: self.total_attempts,
      visibility: self.visibility,
      invite: (self.visibility == Visibility::Private).then(|| self.invite.clone()),
      rewards: self.rewards.resolved(kind),
      publish: self.schedule.publish_timing(),
      start: self.schedule.start_timing(),
      end_at: self.schedule.end_at,
    })
  }
}

/// What submission hands to the sink: only the active reward variant, the
/// invite list only for private challenges, and resolved timings.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FinalizedChallenge {
  pub name: String,
  pub kind: ChallengeKind,
  pub description: String,
  pub banner: Option<BannerImage>,
  pub instructions: String,
  pub max_attempts_per_day: Option<u32>,
  pub total_attempts: Option<u32>,
  pub visibility: Visibility,
  pub invite: Option<InviteSettings>,
  pub rewards: Rewards,
  pub publish: Timing,
  pub start: Timing,
  pub end_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn patch(json: serde_json::Value) -> ChallengePatch {
    serde_json::from_value(json).expect("patch")
  }

  #[test]
  fn merge_leaves_untouched_fields_alone() {
    let mut d = ChallengeDraft::default();
    d.merge(patch(serde_json::json!({ "name": "Spring Sale", "description": "d" })));
    d.invite.participants.push("ana@example.com".into());
    d.merge(patch(serde_json::json!({ "kind": "Spin the Wheel" })));
    d.merge(patch(serde_json::json!({ "visibility": "private" })));

    assert_eq!(d.name, "Spring Sale");
    assert_eq!(d.description, "d");
    assert_eq!(d.kind, Some(ChallengeKind::SpinTheWheel));
    assert_eq!(d.invite.participants.len(), 1);
    assert!(d.schedule.publish_now);
  }

  #[test]
  fn explicit_invite_replaces_nested_record() {
    let mut d = ChallengeDraft::default();
    d.invite.participants.push("a".into());
    d.merge(patch(serde_json::json!({ "invite": { "link": "https://x/1" } })));
    assert!(d.invite.participants.is_empty());
    assert_eq!(d.invite.link, "https://x/1");
  }

  #[test]
  fn null_clears_and_absent_keeps() {
    let mut d = ChallengeDraft::default();
    d.merge(patch(serde_json::json!({ "max_attempts_per_day": 3, "kind": "Quiz Challenge" })));
    d.merge(patch(serde_json::json!({ "name": "x" })));
    assert_eq!(d.max_attempts_per_day, Some(3));
    d.merge(patch(serde_json::json!({ "max_attempts_per_day": null, "kind": null })));
    assert_eq!(d.max_attempts_per_day, None);
    assert_eq!(d.kind, None);
  }

  #[test]
  fn finalize_requires_name_and_kind() {
    let mut d = ChallengeDraft::default();
    d.kind = Some(ChallengeKind::SlotMachine);
    d.name = "   ".into();
    assert!(d.finalize().is_err());
    d.name = "Lucky 7".into();
    d.kind = None;
    assert!(d.finalize().is_err());
    d.kind = Some(ChallengeKind::SlotMachine);
    let f = d.finalize().expect("valid");
    assert_eq!(f.kind, ChallengeKind::SlotMachine);
    assert!(f.invite.is_none());
  }

  #[test]
  fn schedule_flags_win_over_dates() {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let mut s = Schedule { publish_at: Some(at), ..Schedule::default() };
    assert_eq!(s.publish_timing(), Timing::Immediately);
    assert_eq!(s.known_start(), None);
    s.publish_now = false;
    assert_eq!(s.publish_timing(), Timing::At(at));
    assert_eq!(s.known_start(), Some(at));
    s.start_on_publish = false;
    assert_eq!(s.start_timing(), Timing::Unscheduled);
  }

  #[test]
  fn keyed_list_remove_preserves_order() {
    let mut l = KeyedList::default();
    let ids: Vec<Uuid> = ["a", "b", "c", "d"].iter().map(|s| l.push(s.to_string())).collect();
    assert_eq!(l.remove(&ids[1]), Some("b".to_string()));
    let left: Vec<&String> = l.values().collect();
    assert_eq!(left, ["a", "c", "d"]);
    assert!(l.get(&ids[1]).is_none());
  }

  #[test]
  fn keyed_list_serializes_in_order_with_ids() {
    let mut l = KeyedList::default();
    let first = l.push("x".to_string());
    l.push("y".to_string());
    let v = serde_json::to_value(&l).unwrap();
    assert_eq!(v[0]["id"], serde_json::json!(first));
    assert_eq!(v[1]["item"], "y");
    let back: KeyedList<String> = serde_json::from_value(v).unwrap();
    assert_eq!(back.ids().next(), Some(&first));
  }

  #[test]
  fn keyed_list_rejects_duplicate_ids() {
    let id = Uuid::new_v4();
    let raw = serde_json::json!([{ "id": id, "item": "first" }, { "id": id, "item": "dup" }]);
    let err = serde_json::from_value::<KeyedList<String>>(raw).unwrap_err();
    assert!(err.to_string().contains("duplicate id"));
  }

  #[test]
  fn banner_can_be_set_and_cleared() {
    let mut d = ChallengeDraft::default();
    d.merge(patch(serde_json::json!({
      "banner": { "file_name": "hero.jpg", "size_bytes": 2048, "blob_ref": "blob:9" }
    })));
    assert_eq!(d.banner.as_ref().map(|b| b.file_name.as_str()), Some("hero.jpg"));
    d.merge(patch(serde_json::json!({ "name": "kept" })));
    assert!(d.banner.is_some());
    d.merge(patch(serde_json::json!({ "banner": null })));
    assert!(d.banner.is_none());
  }

  #[test]
  fn banner_label_in_megabytes() {
    let b = BannerImage { file_name: "banner.png".into(), size_bytes: 1_289_748, content_type: None, blob_ref: "blob:1".into() };
    assert_eq!(b.label(), "banner.png (1.23 MB)");
  }
}
