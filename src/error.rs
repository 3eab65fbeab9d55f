use thiserror::Error;

/// Failure of a remote movie-database call.
///
/// The `Display` text is what the affected panel shows to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// Query below the minimum length. Never shown; the result list is just cleared.
  #[error("query too short")]
  QueryTooShort,
  /// The database answered but had nothing matching.
  #[error("Movie not found")]
  NotFound,
  /// Transport failure, non-success status, timeout or an undecodable body.
  #[error("fetching failed")]
  FetchFailed,
  /// Superseded by a newer request. Silently discarded.
  #[error("request cancelled")]
  Cancelled,
}

impl FetchError {
  /// Whether this error should ever reach the screen.
  pub fn is_user_visible(&self) -> bool {
    matches!(self, FetchError::NotFound | FetchError::FetchFailed)
  }
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    tracing::warn!(err = %err, timeout = err.is_timeout(), "remote request failed");
    FetchError::FetchFailed
  }
}

/// Failure of the persisted-state backend.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("storage I/O failed: {0}")]
  Io(#[from] std::io::Error),
  /// Stored data exists but can't be decoded (corrupt or from an incompatible version).
  #[error("stored value under '{key}' could not be decoded: {source}")]
  Decode {
    key: String,
    #[source]
    source: serde_json::Error,
  },
  #[error("value could not be encoded: {0}")]
  Encode(#[source] serde_json::Error),
  #[error("'{0}' is not a valid storage key (use letters, digits, '-' and '_')")]
  InvalidKey(String),
}

/// A commit from the detail view was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RatingError {
  #[error("rate the movie before adding it")]
  NoRating,
  #[error("this movie is already in your list")]
  AlreadyWatched,
  #[error("movie details are not loaded yet")]
  DetailNotLoaded,
}
