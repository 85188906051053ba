//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collab::{Notification, Receipt, RenderedCode};
use crate::domain::{ChallengeDraft, ChallengeKind, FinalizedChallenge};
use crate::rewards::{Outcome, Rewards};
use crate::wizard::{InputBuffers, ReviewSummary, Section, WizardAction, WizardSession, TOTAL_STEPS};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Snapshot,
    Dispatch { action: WizardAction },
    Submit,
    Review,
    InviteCode,
    Preview,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    View {
        view: SessionView,
    },
    Submitted {
        result: SubmitOut,
    },
    Review {
        review: ReviewSummary,
    },
    InviteCode {
        result: InviteCodeOut,
    },
    Preview {
        result: PreviewOut,
    },
    Error {
        message: String,
        notifications: Vec<Notification>,
    },
}

/// DTO used by both WS and HTTP to show where a session stands.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub step: usize,
    pub total_steps: usize,
    pub section: Section,
    pub section_title: &'static str,
    pub progress: f32,
    pub can_submit: bool,
    pub draft: ChallengeDraft,
    /// Reward variant of the selected kind (empty when nothing entered yet).
    pub active_rewards: Option<Rewards>,
    pub buffers: InputBuffers,
}

/// Convert a session (internal) to the public view.
pub fn to_view(s: &WizardSession) -> SessionView {
    SessionView {
        session_id: s.id,
        step: s.step(),
        total_steps: TOTAL_STEPS,
        section: s.section(),
        section_title: s.section().title(),
        progress: s.progress_fraction(),
        can_submit: s.is_final_step(),
        draft: s.draft.clone(),
        active_rewards: s.draft.active_rewards(),
        buffers: s.buffers.clone(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Serialize)]
pub struct SubmitOut {
    pub receipt: Receipt,
    pub record: FinalizedChallenge,
    pub notifications: Vec<Notification>,
    /// The session after the reset that follows an acknowledged submission.
    pub view: SessionView,
}

#[derive(Debug, Serialize)]
pub struct InviteCodeOut {
    pub code: RenderedCode,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct PreviewOut {
    pub outcome_id: Option<Uuid>,
    pub outcome: Option<Outcome>,
    /// Share of total weight per outcome id, in list order.
    pub chances: Vec<ChanceOut>,
}

#[derive(Debug, Serialize)]
pub struct ChanceOut {
    pub id: Uuid,
    pub chance: f64,
}

#[derive(Debug, Serialize)]
pub struct KindOut {
    pub kind: ChallengeKind,
    pub name: &'static str,
    pub uses_outcomes: bool,
}

pub fn challenge_kinds() -> Vec<KindOut> {
    ChallengeKind::ALL
        .iter()
        .map(|k| KindOut { kind: *k, name: k.display_name(), uses_outcomes: k.uses_outcomes() })
        .collect()
}

#[derive(Serialize)]
pub struct CompaniesOut {
    pub companies: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
    pub notifications: Vec<Notification>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse() {
        let m: ClientWsMessage = serde_json::from_str(
            r#"{"type":"dispatch","action":{"action":"update","name":"Spring Sale","kind":"Spin the Wheel"}}"#,
        )
        .expect("dispatch");
        match m {
            ClientWsMessage::Dispatch { action: WizardAction::Update(p) } => {
                assert_eq!(p.name.as_deref(), Some("Spring Sale"));
                assert_eq!(p.kind, Some(Some(ChallengeKind::SpinTheWheel)));
                assert!(p.banner.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"dispatch","action":{"action":"advance"}}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::Dispatch { action: WizardAction::Advance }));
        assert!(serde_json::from_str::<ClientWsMessage>(r#"{"type":"dance"}"#).is_err());
    }

    #[test]
    fn view_reports_progress() {
        let s = WizardSession::new();
        let v = serde_json::to_value(to_view(&s)).unwrap();
        assert_eq!(v["section_title"], "Challenge Basics");
        assert_eq!(v["progress"], 0.25);
        assert_eq!(v["can_submit"], false);
        assert!(v["active_rewards"].is_null());
    }

    #[test]
    fn kinds_listed_with_display_names() {
        let kinds = challenge_kinds();
        assert_eq!(kinds.len(), 6);
        assert_eq!(kinds[0].name, "Spin the Wheel");
        assert!(kinds[0].uses_outcomes);
    }
}
