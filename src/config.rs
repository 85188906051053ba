//! Loading wizard configuration (outcome defaults, invite links, company
//! catalog, notification texts) from TOML.
//!
//! See `WizardConfig` and `Notices` for the expected schema. Every key is
//! optional; missing keys fall back to the defaults below.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
  /// Weight given to a freshly added wheel/scratch outcome.
  pub default_outcome_weight: u32,
  /// Invite links are `{invite_base_url}/{session id}`.
  pub invite_base_url: String,
  /// Companies that discount/offer outcomes may be restricted to.
  pub companies: Vec<String>,
  pub notices: Notices,
  /// HTTP sessions untouched for this long are dropped when a new one opens.
  pub session_idle_minutes: u64,
  /// Upper bound on live HTTP sessions; the least recently used goes first.
  pub max_sessions: usize,
}

impl Default for WizardConfig {
  fn default() -> Self {
    Self {
      default_outcome_weight: 10,
      invite_base_url: "https://challenges.example.com/join".into(),
      companies: vec!["Puma".into(), "Nike".into(), "Nestle Store".into(), "Uniqlo".into()],
      notices: Notices::default(),
      session_idle_minutes: 60,
      max_sessions: 10_000,
    }
  }
}

impl WizardConfig {
  pub fn knows_company(&self, company: &str) -> bool {
    self.companies.iter().any(|c| c == company)
  }

  pub fn session_idle(&self) -> Duration {
    Duration::from_secs(self.session_idle_minutes.saturating_mul(60))
  }
}

/// Titles and descriptions of the notifications the wizard raises.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Notices {
  pub missing_info_title: String,
  pub missing_info_description: String,
  pub created_title: String,
  pub created_description: String,
  pub submit_failed_title: String,
  pub invite_ready_title: String,
  pub invite_ready_description: String,
  pub invite_failed_title: String,
  pub invite_failed_description: String,
}

impl Default for Notices {
  fn default() -> Self {
    Self {
      missing_info_title: "Missing Information".into(),
      missing_info_description: "Please fill in all required fields".into(),
      created_title: "Challenge Created!".into(),
      created_description: "Your challenge has been successfully created and scheduled.".into(),
      submit_failed_title: "Challenge Not Saved".into(),
      invite_ready_title: "Invite code ready".into(),
      invite_ready_description: "Share the code or link with your participants.".into(),
      invite_failed_title: "Could not generate invite code".into(),
      invite_failed_description: "Please try again.".into(),
    }
  }
}

/// Attempt to load `WizardConfig` from WIZARD_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_wizard_config_from_env() -> Option<WizardConfig> {
  let path = std::env::var("WIZARD_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_wizard_config(&s) {
      Ok(cfg) => {
        info!(target: "challenge_wizard", %path, companies = cfg.companies.len(), "Loaded wizard config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "challenge_wizard", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "challenge_wizard", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_wizard_config(s: &str) -> Result<WizardConfig, toml::de::Error> {
  toml::from_str::<WizardConfig>(s)
}
