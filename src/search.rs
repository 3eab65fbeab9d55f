use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::error::FetchError;
use crate::movie::MovieSummary;
use crate::omdb::MovieApi;

/// What the result pane renders from.
#[derive(Debug, Default, Clone)]
pub struct SearchState {
  pub query: String,
  pub results: Vec<MovieSummary>,
  pub loading: bool,
  pub error: Option<FetchError>,
}

/// A finished search task, tagged with the generation that issued it.
#[derive(Debug)]
struct SearchOutcome {
  generation: u64,
  result: Result<Vec<MovieSummary>, FetchError>,
}

/// Remote search with at most one live request.
///
/// Every query change bumps `generation` and cancels the previous task's token.
/// Outcomes are only applied when their generation still matches, so a response
/// that slips past cancellation can never overwrite a newer one.
pub struct SearchService {
  api: Arc<dyn MovieApi>,
  debounce: Duration,
  state: SearchState,
  generation: u64,
  in_flight: Option<CancellationToken>,
  tx: mpsc::UnboundedSender<SearchOutcome>,
  rx: mpsc::UnboundedReceiver<SearchOutcome>,
}

impl SearchService {
  pub fn new(api: Arc<dyn MovieApi>, debounce: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { api, debounce, state: SearchState::default(), generation: 0, in_flight: None, tx, rx }
  }

  pub fn state(&self) -> &SearchState {
    &self.state
  }

  pub fn query(&self) -> &str {
    &self.state.query
  }

  /// React to a changed query. No-op when the query is unchanged.
  pub fn set_query(&mut self, query: &str) {
    if query == self.state.query {
      return;
    }
    self.state.query = query.to_string();
    self.cancel_in_flight();
    self.generation += 1;

    if query.chars().count() < constants().min_query_len {
      debug!(error = %FetchError::QueryTooShort, "clearing results");
      self.state.results.clear();
      self.state.error = None;
      self.state.loading = false;
      return;
    }

    self.state.loading = true;
    self.state.error = None;

    let token = CancellationToken::new();
    let cancelled = token.clone();
    let api = Arc::clone(&self.api);
    let tx = self.tx.clone();
    let generation = self.generation;
    let debounce = self.debounce;
    let query = query.to_string();
    info!(query = %query, generation, "search issued");

    tokio::spawn(async move {
      let request = async {
        if !debounce.is_zero() {
          tokio::time::sleep(debounce).await;
        }
        api.search(&query).await
      };
      let result = tokio::select! {
        biased;
        _ = cancelled.cancelled() => Err(FetchError::Cancelled),
        result = request => result,
      };
      let _ = tx.send(SearchOutcome { generation, result });
    });
    self.in_flight = Some(token);
  }

  /// Apply every finished outcome. Returns whether the visible state changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    while let Ok(outcome) = self.rx.try_recv() {
      changed |= self.apply(outcome);
    }
    changed
  }

  fn apply(&mut self, outcome: SearchOutcome) -> bool {
    if outcome.generation != self.generation {
      debug!(stale = outcome.generation, current = self.generation, "discarding superseded search");
      return false;
    }
    if matches!(outcome.result, Err(FetchError::Cancelled)) {
      return false;
    }
    self.in_flight = None;
    self.state.loading = false;
    match outcome.result {
      Ok(results) => {
        info!(query = %self.state.query, count = results.len(), "search complete");
        self.state.results = results;
        self.state.error = None;
      }
      Err(err) => {
        warn!(query = %self.state.query, err = %err, "search failed");
        self.state.error = Some(err);
      }
    }
    true
  }

  fn cancel_in_flight(&mut self) {
    if let Some(token) = self.in_flight.take() {
      token.cancel();
    }
    self.state.loading = false;
  }

  /// Cancel any outstanding request. Late outcomes are discarded.
  pub fn shutdown(&mut self) {
    self.cancel_in_flight();
    self.generation += 1;
  }

  /// Wait until the current request (if any) has been applied.
  #[cfg(test)]
  pub async fn settle(&mut self) {
    while self.state.loading {
      match self.rx.recv().await {
        Some(outcome) => {
          self.apply(outcome);
        }
        None => break,
      }
    }
  }
}

impl Drop for SearchService {
  fn drop(&mut self) {
    if let Some(token) = self.in_flight.take() {
      token.cancel();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::omdb::mock::{MockApi, summary};

  fn service(api: MockApi) -> (SearchService, Arc<MockApi>) {
    let api = Arc::new(api);
    (SearchService::new(api.clone(), Duration::ZERO), api)
  }

  fn batman_pair() -> Vec<MovieSummary> {
    vec![summary("tt0372784", "Batman Begins", "2005"), summary("tt1877830", "The Batman", "2022")]
  }

  #[tokio::test]
  async fn short_queries_never_hit_the_network() {
    let (mut search, api) = service(MockApi::default());
    for q in ["", "b", "ba", "日本"] {
      search.set_query(q);
      assert!(search.state().results.is_empty());
      assert!(search.state().error.is_none());
      assert!(!search.state().loading);
    }
    tokio::task::yield_now().await;
    assert_eq!(api.search_count(), 0);
  }

  #[tokio::test]
  async fn batman_returns_two_results() {
    let (mut search, api) = service(MockApi::default().with_search("batman", Ok(batman_pair())));
    search.set_query("batman");
    assert!(search.state().loading);
    search.settle().await;

    assert_eq!(search.state().results.len(), 2);
    assert!(!search.state().loading);
    assert!(search.state().error.is_none());
    assert_eq!(api.search_count(), 1);
  }

  #[tokio::test]
  async fn no_match_surfaces_not_found() {
    let (mut search, _) = service(MockApi::default().with_search("xyznomatch", Err(FetchError::NotFound)));
    search.set_query("xyznomatch");
    search.settle().await;

    let state = search.state();
    assert_eq!(state.error.as_ref().map(|e| e.to_string()).as_deref(), Some("Movie not found"));
    assert!(state.results.is_empty());
    assert!(!state.loading);
  }

  #[tokio::test]
  async fn transport_failure_surfaces_fetch_failed() {
    let (mut search, _) = service(MockApi::default().with_search("offline", Err(FetchError::FetchFailed)));
    search.set_query("offline");
    search.settle().await;
    assert_eq!(search.state().error, Some(FetchError::FetchFailed));
  }

  #[tokio::test]
  async fn error_leaves_previous_results_untouched() {
    let api = MockApi::default().with_search("batman", Ok(batman_pair())).with_search("batmanx", Err(FetchError::NotFound));
    let (mut search, _) = service(api);
    search.set_query("batman");
    search.settle().await;
    search.set_query("batmanx");
    search.settle().await;

    assert_eq!(search.state().error, Some(FetchError::NotFound));
    assert_eq!(search.state().results.len(), 2);
  }

  #[tokio::test]
  async fn shortening_the_query_clears_results() {
    let (mut search, _) = service(MockApi::default().with_search("batman", Ok(batman_pair())));
    search.set_query("batman");
    search.settle().await;
    search.set_query("ba");
    assert!(search.state().results.is_empty());
    assert!(search.state().error.is_none());
  }

  #[tokio::test]
  async fn superseded_request_never_overwrites_newer_result() {
    let (mut search, api) = service(MockApi::default());
    let first = api.hold_search("bat");
    let second = api.hold_search("batman");

    search.set_query("bat");
    tokio::task::yield_now().await;
    search.set_query("batman");
    tokio::task::yield_now().await;

    // Newer request resolves first, older one afterwards.
    let _ = second.send(Ok(batman_pair()));
    search.settle().await;
    let _ = first.send(Ok(vec![summary("tt0000001", "Bat", "1999")]));
    for _ in 0..5 {
      tokio::task::yield_now().await;
    }
    search.poll();

    assert_eq!(search.state().results, batman_pair());
    assert!(search.state().error.is_none());
    assert!(!search.state().loading);
  }

  #[tokio::test]
  async fn stale_generation_is_discarded_even_if_it_arrives() {
    let (mut search, _) = service(MockApi::default());
    search.set_query("first");
    search.set_query("second");
    let applied = search.apply(SearchOutcome { generation: 1, result: Ok(batman_pair()) });
    assert!(!applied);
    assert!(search.state().results.is_empty());
    assert!(search.state().loading);
  }

  #[tokio::test]
  async fn cancellation_is_silent() {
    let (mut search, api) = service(MockApi::default());
    let held = api.hold_search("batman");
    search.set_query("batman");
    tokio::task::yield_now().await;
    search.set_query("ba");
    drop(held);
    for _ in 0..5 {
      tokio::task::yield_now().await;
    }
    assert!(!search.poll());
    assert!(search.state().error.is_none());
    assert!(!search.state().loading);
  }

  #[tokio::test]
  async fn rapid_typing_only_reflects_last_query() {
    let api = MockApi::default()
      .with_search("the", Ok(vec![summary("tt1", "The", "2000")]))
      .with_search("the m", Ok(vec![summary("tt2", "The M", "2001")]))
      .with_search("the matrix", Ok(vec![summary("tt0133093", "The Matrix", "1999")]));
    let (mut search, _) = service(api);
    for q in ["the", "the m", "the matrix"] {
      search.set_query(q);
    }
    search.settle().await;
    for _ in 0..5 {
      tokio::task::yield_now().await;
    }
    search.poll();
    assert_eq!(search.state().results.len(), 1);
    assert_eq!(search.state().results[0].id, "tt0133093");
  }

  #[tokio::test(start_paused = true)]
  async fn debounce_skips_superseded_keystrokes() {
    let api = Arc::new(MockApi::default().with_search("matrix", Ok(vec![summary("tt0133093", "The Matrix", "1999")])));
    let mut search = SearchService::new(api.clone(), Duration::from_millis(250));
    search.set_query("mat");
    tokio::time::advance(Duration::from_millis(100)).await;
    search.set_query("matrix");
    search.settle().await;

    assert_eq!(api.search_calls.lock().unwrap().as_slice(), ["matrix".to_string()]);
    assert_eq!(search.state().results.len(), 1);
  }
}
