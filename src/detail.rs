use image::DynamicImage;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::movie::MovieDetail;
use crate::omdb::MovieApi;

type DetailResult = Result<MovieDetail, FetchError>;
type PosterResult = Result<DynamicImage, FetchError>;

/// A background request whose result is picked up by polling.
struct Pending<T> {
  rx: oneshot::Receiver<T>,
  handle: JoinHandle<()>,
}

impl<T: Send + 'static> Pending<T> {
  fn spawn(request: impl Future<Output = T> + Send + 'static) -> Self {
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
      let _ = tx.send(request.await);
    });
    Self { rx, handle }
  }

  /// `None` while still running; `Some(None)` if the task died without a result.
  fn try_take(&mut self) -> Option<Option<T>> {
    match self.rx.try_recv() {
      Ok(value) => Some(Some(value)),
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => Some(None),
    }
  }
}

/// Loads full metadata, then the poster, for the movie open in the detail pane.
///
/// Opening another id replaces the pending requests, so only the latest
/// selection can land.
pub struct DetailService {
  api: Arc<dyn MovieApi>,
  selected_id: Option<String>,
  detail: Option<MovieDetail>,
  loading: bool,
  error: Option<FetchError>,
  poster: Option<DynamicImage>,
  pending: Option<Pending<DetailResult>>,
  pending_poster: Option<Pending<PosterResult>>,
}

impl DetailService {
  pub fn new(api: Arc<dyn MovieApi>) -> Self {
    Self {
      api,
      selected_id: None,
      detail: None,
      loading: false,
      error: None,
      poster: None,
      pending: None,
      pending_poster: None,
    }
  }

  pub fn selected_id(&self) -> Option<&str> {
    self.selected_id.as_deref()
  }

  pub fn detail(&self) -> Option<&MovieDetail> {
    self.detail.as_ref()
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.error.as_ref()
  }

  pub fn poster(&self) -> Option<&DynamicImage> {
    self.poster.as_ref()
  }

  pub fn is_poster_loading(&self) -> bool {
    self.pending_poster.is_some()
  }

  /// Start loading `id`, dropping whatever was loaded or pending before.
  pub fn open(&mut self, id: &str) {
    self.abort();
    info!(id, "detail requested");
    self.selected_id = Some(id.to_string());
    self.detail = None;
    self.error = None;
    self.poster = None;
    self.loading = true;
    self.pending = Some(Pending::spawn(self.api.detail(id)));
  }

  pub fn close(&mut self) {
    self.abort();
    self.selected_id = None;
    self.detail = None;
    self.error = None;
    self.poster = None;
    self.loading = false;
  }

  fn abort(&mut self) {
    if let Some(pending) = self.pending.take() {
      pending.handle.abort();
    }
    if let Some(pending) = self.pending_poster.take() {
      pending.handle.abort();
    }
  }

  /// Apply finished loads. Returns whether anything changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    if let Some(done) = self.pending.as_mut().and_then(Pending::try_take) {
      self.pending = None;
      let result = done.unwrap_or_else(|| {
        warn!(id = ?self.selected_id, "detail task ended without a result");
        Err(FetchError::FetchFailed)
      });
      self.apply(result);
      changed = true;
    }
    if let Some(done) = self.pending_poster.as_mut().and_then(Pending::try_take) {
      self.pending_poster = None;
      self.apply_poster(done.unwrap_or(Err(FetchError::FetchFailed)));
      changed = true;
    }
    changed
  }

  fn apply(&mut self, result: DetailResult) {
    self.loading = false;
    match result {
      Ok(detail) => {
        info!(id = %detail.id, title = %detail.title, "detail loaded");
        if let Some(url) = detail.poster_link() {
          debug!(url, "poster requested");
          self.pending_poster = Some(Pending::spawn(self.api.poster(url)));
        }
        self.detail = Some(detail);
        self.error = None;
      }
      Err(err) => {
        warn!(id = ?self.selected_id, err = %err, "detail failed");
        self.error = Some(err);
      }
    }
  }

  /// A missing poster leaves the pane text-only; it is never an error.
  fn apply_poster(&mut self, result: PosterResult) {
    match result {
      Ok(image) => {
        debug!(id = ?self.selected_id, width = image.width(), height = image.height(), "poster loaded");
        self.poster = Some(image);
      }
      Err(err) => warn!(id = ?self.selected_id, err = %err, "poster unavailable"),
    }
  }

  /// Wait for the pending detail load and the poster it triggers, if any.
  #[cfg(test)]
  pub async fn settle(&mut self) {
    if let Some(pending) = self.pending.take() {
      let result = pending.rx.await.unwrap_or(Err(FetchError::FetchFailed));
      self.apply(result);
    }
    if let Some(pending) = self.pending_poster.take() {
      let result = pending.rx.await.unwrap_or(Err(FetchError::FetchFailed));
      self.apply_poster(result);
    }
  }
}

impl Drop for DetailService {
  fn drop(&mut self) {
    self.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::omdb::mock::{MockApi, shawshank};

  #[tokio::test]
  async fn loads_detail_and_clears_loading() {
    let api = Arc::new(MockApi::default().with_detail("tt0111161", Ok(shawshank())));
    let mut detail = DetailService::new(api);
    detail.open("tt0111161");
    assert!(detail.is_loading());
    detail.settle().await;

    assert!(!detail.is_loading());
    let movie = detail.detail().unwrap();
    assert_eq!(movie.runtime_minutes, 142);
    assert_eq!(detail.selected_id(), Some("tt0111161"));
  }

  #[tokio::test]
  async fn failure_surfaces_fetch_failed() {
    let api = Arc::new(MockApi::default().with_detail("tt9", Err(FetchError::FetchFailed)));
    let mut detail = DetailService::new(api);
    detail.open("tt9");
    detail.settle().await;
    assert_eq!(detail.error(), Some(&FetchError::FetchFailed));
    assert!(detail.detail().is_none());
    assert_eq!(detail.error().map(ToString::to_string).as_deref(), Some("fetching failed"));
  }

  #[tokio::test]
  async fn reopening_drops_the_earlier_load() {
    let api = Arc::new(MockApi::default().with_detail("tt0111161", Ok(shawshank())));
    let held = api.hold_detail("tt0068646");
    let mut detail = DetailService::new(api.clone());
    detail.open("tt0068646");
    detail.open("tt0111161");
    let _ = held.send(Err(FetchError::FetchFailed));
    detail.settle().await;

    assert_eq!(detail.detail().map(|d| d.id.as_str()), Some("tt0111161"));
    assert!(detail.error().is_none());
  }

  #[tokio::test]
  async fn close_resets_everything() {
    let api = Arc::new(MockApi::default().with_detail("tt0111161", Ok(shawshank())));
    let mut detail = DetailService::new(api);
    detail.open("tt0111161");
    detail.settle().await;
    detail.close();
    assert!(detail.selected_id().is_none());
    assert!(detail.detail().is_none());
    assert!(!detail.poll());
  }

  // --- posters ---

  const POSTER: &str = "https://img.example/shawshank.jpg";

  fn with_poster() -> MovieDetail {
    MovieDetail { poster_url: POSTER.to_string(), ..shawshank() }
  }

  #[tokio::test]
  async fn poster_loads_after_detail() {
    let api = Arc::new(
      MockApi::default()
        .with_detail("tt0111161", Ok(with_poster()))
        .with_poster(POSTER, Ok(DynamicImage::new_rgb8(30, 44))),
    );
    let mut detail = DetailService::new(api.clone());
    detail.open("tt0111161");
    detail.settle().await;

    assert_eq!(detail.poster().map(|p| p.width()), Some(30));
    assert!(!detail.is_poster_loading());
    assert_eq!(*api.poster_calls.lock().unwrap(), vec![POSTER.to_string()]);

    detail.close();
    assert!(detail.poster().is_none());
  }

  #[tokio::test]
  async fn missing_poster_is_not_requested() {
    let api = Arc::new(MockApi::default().with_detail("tt0111161", Ok(shawshank())));
    let mut detail = DetailService::new(api.clone());
    detail.open("tt0111161");
    detail.settle().await;

    assert!(detail.poster().is_none());
    assert!(api.poster_calls.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn failed_poster_keeps_the_detail() {
    let api = Arc::new(MockApi::default().with_detail("tt0111161", Ok(with_poster())));
    let mut detail = DetailService::new(api);
    detail.open("tt0111161");
    detail.settle().await;

    assert!(detail.poster().is_none());
    assert!(detail.detail().is_some());
    assert!(detail.error().is_none());
  }

  #[tokio::test]
  async fn poll_applies_detail_then_poster() {
    let api = Arc::new(
      MockApi::default()
        .with_detail("tt0111161", Ok(with_poster()))
        .with_poster(POSTER, Ok(DynamicImage::new_rgb8(2, 2))),
    );
    let mut detail = DetailService::new(api);
    detail.open("tt0111161");
    for _ in 0..50 {
      detail.poll();
      if detail.poster().is_some() {
        break;
      }
      tokio::task::yield_now().await;
    }
    assert!(detail.detail().is_some());
    assert!(detail.poster().is_some());
  }
}
