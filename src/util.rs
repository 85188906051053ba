//! Small utility helpers used across modules.

use serde::{Deserialize, Deserializer};

/// Serde helper for tri-state patch fields (`Option<Option<T>>`).
/// Combined with `#[serde(default)]`: missing key -> `None`,
/// `null` -> `Some(None)`, value -> `Some(Some(v))`.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>,
{
  T::deserialize(deserializer).map(Some)
}

/// Byte count as megabytes with two decimals, e.g. "1.23 MB".
pub fn mb_label(bytes: u64) -> String {
  format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}
