use tracing::debug;

use crate::constants::constants;
use crate::error::RatingError;
use crate::movie::{MovieDetail, WatchedEntry};

/// The rating being composed for the open movie.
///
/// Owned by the detail view and rebuilt whenever a different movie opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingDraft {
  movie_id: String,
  rating: Option<u8>,
  revisions: u32,
}

impl RatingDraft {
  pub fn new(movie_id: &str) -> Self {
    Self { movie_id: movie_id.to_string(), rating: None, revisions: 0 }
  }

  pub fn movie_id(&self) -> &str {
    &self.movie_id
  }

  pub fn rating(&self) -> Option<u8> {
    self.rating
  }

  pub fn revisions(&self) -> u32 {
    self.revisions
  }

  /// Set or clear the rating. `Some(0)` counts as clearing; values above the
  /// scale are clamped. Each change to a new non-empty value is one revision.
  pub fn set(&mut self, rating: Option<u8>) {
    let rating = rating.filter(|r| *r > 0).map(|r| r.min(constants().max_rating));
    if rating == self.rating {
      return;
    }
    self.rating = rating;
    if rating.is_some() {
      self.revisions += 1;
    }
    debug!(movie = %self.movie_id, rating = ?self.rating, revisions = self.revisions, "rating changed");
  }

  /// Move the rating by `delta` stars. From unset, moving up lands on the first star.
  pub fn step(&mut self, delta: i8) {
    let current = i16::from(self.rating.unwrap_or(0));
    let next = (current + i16::from(delta)).clamp(0, i16::from(constants().max_rating));
    self.set(Some(next as u8));
  }

  pub fn can_commit(&self) -> bool {
    self.rating.is_some_and(|r| r > 0)
  }

  /// Build the watched entry for `detail`. Refused without a rating, for a
  /// different movie, or when the movie is already in `watched`.
  pub fn commit(&self, detail: &MovieDetail, watched: &[WatchedEntry]) -> Result<WatchedEntry, RatingError> {
    if detail.id != self.movie_id {
      return Err(RatingError::DetailNotLoaded);
    }
    let Some(rating) = self.rating.filter(|r| *r > 0) else {
      return Err(RatingError::NoRating);
    };
    if is_watched(watched, &detail.id) {
      return Err(RatingError::AlreadyWatched);
    }
    Ok(WatchedEntry::from_detail(detail, rating, self.revisions))
  }
}

// --- Derived values over the watched list ---

pub fn is_watched(watched: &[WatchedEntry], id: &str) -> bool {
  watched.iter().any(|m| m.id == id)
}

/// The rating stored when `id` was committed, if it was.
pub fn watched_rating(watched: &[WatchedEntry], id: &str) -> Option<u8> {
  watched.iter().find(|m| m.id == id).map(|m| m.user_rating)
}

/// Arithmetic mean, 0.0 for an empty input.
pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
  let (sum, count) = values.into_iter().fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
  if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Aggregates shown in the watched summary. Computed on read, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchedStats {
  pub count: usize,
  pub avg_external_rating: f64,
  pub avg_user_rating: f64,
  pub avg_runtime: f64,
}

impl WatchedStats {
  pub fn compute(watched: &[WatchedEntry]) -> Self {
    Self {
      count: watched.len(),
      avg_external_rating: mean(watched.iter().map(|m| m.external_rating)),
      avg_user_rating: mean(watched.iter().map(|m| f64::from(m.user_rating))),
      avg_runtime: mean(watched.iter().map(|m| f64::from(m.runtime_minutes))),
    }
  }
}
