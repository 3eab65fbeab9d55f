//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available and
//! parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub app_title: String,
  pub detail_title_prefix: String,

  // Remote movie database
  pub default_base_url: String,
  pub default_timeout_secs: u64,
  pub default_debounce_ms: u64,
  pub min_query_len: usize,

  // Persistence
  pub default_storage_key: String,

  // Rating
  pub max_rating: u8,

  // Detail pane
  pub poster_width: u16,

  // Status line
  pub error_dismiss_secs: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed every test below fails.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.min_query_len, 3);
    assert_eq!(c.max_rating, 10);
    assert_eq!(c.default_storage_key, "watched");
    assert!(c.default_base_url.starts_with("http"));
  }
}
