use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single row of a search result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieSummary {
  pub id: String,
  pub title: String,
  pub year: String,
  pub poster_url: String,
}

/// Full metadata for one movie, shown in the detail pane.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieDetail {
  pub id: String,
  pub title: String,
  pub year: String,
  pub poster_url: String,
  pub runtime_minutes: u32,
  /// Raw runtime text as the database reports it, e.g. `142 min`.
  pub runtime_label: String,
  pub external_rating: f64,
  pub plot: String,
  pub released_date: String,
  pub actors: String,
  pub director: String,
  pub genre: String,
}

/// A rated movie in the persisted watched list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedEntry {
  pub id: String,
  pub title: String,
  pub year: String,
  pub poster_url: String,
  pub external_rating: f64,
  pub runtime_minutes: u32,
  pub user_rating: u8,
  /// How many times the rating changed before it was committed.
  pub rating_revisions: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub added_at: Option<DateTime<Utc>>,
}

impl MovieDetail {
  /// Downloadable poster address. The database reports a missing poster as `N/A`.
  pub fn poster_link(&self) -> Option<&str> {
    let url = self.poster_url.trim();
    (url.starts_with("http://") || url.starts_with("https://")).then_some(url)
  }
}

impl WatchedEntry {
  pub fn from_detail(detail: &MovieDetail, user_rating: u8, rating_revisions: u32) -> Self {
    Self {
      id: detail.id.clone(),
      title: detail.title.clone(),
      year: detail.year.clone(),
      poster_url: detail.poster_url.clone(),
      external_rating: detail.external_rating,
      runtime_minutes: detail.runtime_minutes,
      user_rating,
      rating_revisions,
      added_at: Some(Utc::now()),
    }
  }
}
