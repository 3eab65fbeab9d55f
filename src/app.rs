use ratatui::crossterm::event::KeyCode;
use ratatui::widgets::ListState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{Config, Settings};
use crate::constants::constants;
use crate::detail::DetailService;
use crate::error::RatingError;
use crate::keys::{KeyBus, KeyListener};
use crate::movie::WatchedEntry;
use crate::omdb::MovieApi;
use crate::rating::{self, RatingDraft, WatchedStats};
use crate::search::SearchService;
use crate::store::PersistedValue;
use crate::theme::{THEMES, theme_index};

/// Which pane receives ordinary key presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
  Search,
  Results,
  Detail,
  Watched,
}

/// Actions bound through the global [`KeyBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
  FocusSearch,
  CloseDetail,
}

/// Session state of the open detail pane. Dropping it releases its Escape binding.
pub struct DetailView {
  pub draft: RatingDraft,
  close_on_escape: KeyListener<KeyAction>,
}

pub struct App {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub focus: Focus,
  pub theme_index: usize,
  pub(crate) search: SearchService,
  pub(crate) details: DetailService,
  pub detail_view: Option<DetailView>,
  pub(crate) watched: PersistedValue<Vec<WatchedEntry>>,
  pub results_state: ListState,
  pub watched_state: ListState,
  pub results_open: bool,
  pub watched_open: bool,
  pub(crate) keys: KeyBus<KeyAction>,
  _focus_search: KeyListener<KeyAction>,
  pub last_error: Option<String>,
  pub info_message: Option<String>,
  pub should_quit: bool,
  config: Config,
  error_time: Option<Instant>,
}

impl App {
  pub fn new(
    api: Arc<dyn MovieApi>,
    watched: PersistedValue<Vec<WatchedEntry>>,
    settings: &Settings,
    config: Config,
  ) -> Self {
    let keys = KeyBus::new();
    let focus_search = keys.listen("/", KeyAction::FocusSearch);
    let mut watched_state = ListState::default();
    if !watched.get().is_empty() {
      watched_state.select(Some(0));
    }
    Self {
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      focus: Focus::Search,
      theme_index: theme_index(config.theme_name.as_deref()),
      search: SearchService::new(Arc::clone(&api), settings.debounce),
      details: DetailService::new(api),
      detail_view: None,
      watched,
      results_state: ListState::default(),
      watched_state,
      results_open: true,
      watched_open: true,
      keys,
      _focus_search: focus_search,
      last_error: None,
      info_message: None,
      should_quit: false,
      config,
      error_time: None,
    }
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    &THEMES[self.theme_index % THEMES.len()]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.save();
  }

  // --- Messages ---

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_dismiss_secs)
    {
      self.clear_error();
    }
  }

  // --- Read-only views for rendering ---

  pub fn search_service(&self) -> &SearchService {
    &self.search
  }

  pub fn detail_service(&self) -> &DetailService {
    &self.details
  }

  pub fn watched(&self) -> &[WatchedEntry] {
    self.watched.get()
  }

  pub fn stats(&self) -> WatchedStats {
    WatchedStats::compute(self.watched.get())
  }

  /// Stored rating of the open movie when it is already in the watched list.
  pub fn open_movie_watched_rating(&self) -> Option<u8> {
    let id = self.details.selected_id()?;
    rating::watched_rating(self.watched.get(), id)
  }

  /// Terminal title: the open movie's title, or the app name.
  pub fn window_title(&self) -> String {
    match self.details.detail() {
      Some(detail) if self.detail_view.is_some() && !detail.title.is_empty() => {
        format!("{}{}", constants().detail_title_prefix, detail.title)
      }
      _ => constants().app_title.clone(),
    }
  }

  // --- Search ---

  /// Push the edited input into the search service.
  pub fn on_input_changed(&mut self) {
    self.search.set_query(&self.input);
    self.results_state.select(None);
  }

  pub fn focus_search(&mut self) {
    self.focus = Focus::Search;
    self.input.clear();
    self.cursor_position = 0;
    self.input_scroll = 0;
    self.on_input_changed();
  }

  // --- Detail ---

  /// Open `id`, or close the pane when `id` is already open.
  pub fn select_movie(&mut self, id: &str) {
    if self.details.selected_id() == Some(id) {
      self.close_detail();
      return;
    }
    // Switching movies keeps the Escape subscription and only resets the draft.
    let close_on_escape = match self.detail_view.take() {
      Some(view) => {
        let mut listener = view.close_on_escape;
        listener.rebind("Escape", KeyAction::CloseDetail);
        listener
      }
      None => self.keys.listen("Escape", KeyAction::CloseDetail),
    };
    self.details.open(id);
    self.detail_view = Some(DetailView { draft: RatingDraft::new(id), close_on_escape });
    debug!(id, listeners = self.keys.active(), "detail view opened");
    self.watched_open = true;
    self.focus = Focus::Detail;
  }

  pub fn select_highlighted_result(&mut self) {
    let Some(i) = self.results_state.selected() else { return };
    let Some(id) = self.search.state().results.get(i).map(|m| m.id.clone()) else { return };
    self.select_movie(&id);
  }

  pub fn close_detail(&mut self) {
    if self.detail_view.is_none() {
      return;
    }
    info!(id = ?self.details.selected_id(), "detail closed");
    self.details.close();
    self.detail_view = None;
    if self.focus == Focus::Detail {
      self.focus = if self.search.state().results.is_empty() { Focus::Search } else { Focus::Results };
    }
  }

  pub fn set_rating(&mut self, rating: Option<u8>) {
    if self.open_movie_watched_rating().is_some() {
      return;
    }
    if let Some(view) = self.detail_view.as_mut() {
      view.draft.set(rating);
    }
  }

  pub fn step_rating(&mut self, delta: i8) {
    if self.open_movie_watched_rating().is_some() {
      return;
    }
    if let Some(view) = self.detail_view.as_mut() {
      view.draft.step(delta);
    }
  }

  /// Commit the open movie with the drafted rating, then close the pane.
  pub fn add_watched(&mut self) -> Result<(), RatingError> {
    let view = self.detail_view.as_ref().ok_or(RatingError::DetailNotLoaded)?;
    let detail = self.details.detail().ok_or(RatingError::DetailNotLoaded)?;
    let entry = view.draft.commit(detail, self.watched.get())?;
    info!(id = %entry.id, rating = entry.user_rating, revisions = entry.rating_revisions, "adding to watched list");
    self.info_message = Some(format!("Added '{}' with {} ★", entry.title, entry.user_rating));
    if let Err(e) = self.watched.update(|list| list.push(entry)) {
      warn!(err = %e, "watched list not saved");
      self.set_error(format!("Could not save watched list: {}", e));
    }
    if self.watched_state.selected().is_none() {
      self.watched_state.select(Some(0));
    }
    self.close_detail();
    Ok(())
  }

  // --- Watched list ---

  pub fn delete_watched(&mut self, id: &str) {
    info!(id, key = self.watched.key(), "removing from watched list");
    let remaining: Vec<WatchedEntry> = self.watched.get().iter().filter(|m| m.id != id).cloned().collect();
    if let Err(e) = self.watched.set(remaining) {
      warn!(err = %e, "watched list not saved");
      self.set_error(format!("Could not save watched list: {}", e));
    }
    let len = self.watched.get().len();
    match self.watched_state.selected() {
      _ if len == 0 => self.watched_state.select(None),
      Some(i) if i >= len => self.watched_state.select(Some(len - 1)),
      _ => {}
    }
  }

  pub fn delete_highlighted_watched(&mut self) {
    let Some(i) = self.watched_state.selected() else { return };
    let Some(id) = self.watched.get().get(i).map(|m| m.id.clone()) else { return };
    self.delete_watched(&id);
  }

  pub fn open_highlighted_watched(&mut self) {
    let Some(i) = self.watched_state.selected() else { return };
    let Some(id) = self.watched.get().get(i).map(|m| m.id.clone()) else { return };
    self.select_movie(&id);
  }

  // --- Focus & panes ---

  fn focus_order(&self) -> Vec<Focus> {
    let mut order = vec![Focus::Search];
    if self.results_open && !self.search.state().results.is_empty() {
      order.push(Focus::Results);
    }
    if self.detail_view.is_some() {
      if self.watched_open {
        order.push(Focus::Detail);
      }
    } else if self.watched_open && !self.watched.get().is_empty() {
      order.push(Focus::Watched);
    }
    order
  }

  pub fn cycle_focus(&mut self) {
    let order = self.focus_order();
    let i = order.iter().position(|f| *f == self.focus).map_or(0, |i| (i + 1) % order.len());
    self.focus = order[i];
    if self.focus == Focus::Results && self.results_state.selected().is_none() {
      self.results_state.select(Some(0));
    }
    if self.focus == Focus::Watched && self.watched_state.selected().is_none() {
      self.watched_state.select(Some(0));
    }
  }

  pub fn toggle_results_pane(&mut self) {
    self.results_open = !self.results_open;
    if !self.results_open && self.focus == Focus::Results {
      self.focus = Focus::Search;
    }
  }

  pub fn toggle_watched_pane(&mut self) {
    self.watched_open = !self.watched_open;
    if !self.watched_open && matches!(self.focus, Focus::Detail | Focus::Watched) {
      self.focus = Focus::Search;
    }
  }

  // --- Global keys ---

  /// Run the global listeners for `code`. Returns whether one of them consumed it.
  pub fn dispatch_global(&mut self, code: KeyCode) -> bool {
    let mut consumed = false;
    for action in self.keys.dispatch(code) {
      match action {
        KeyAction::FocusSearch if self.focus != Focus::Search => {
          self.focus_search();
          consumed = true;
        }
        KeyAction::FocusSearch => {}
        KeyAction::CloseDetail => {
          self.close_detail();
          consumed = true;
        }
      }
    }
    consumed
  }

  // --- Background work ---

  /// Apply finished background requests. Called once per UI tick.
  pub fn check_pending(&mut self) {
    self.search.poll();
    let len = self.search.state().results.len();
    match self.results_state.selected() {
      _ if len == 0 => self.results_state.select(None),
      Some(i) if i >= len => self.results_state.select(Some(len - 1)),
      _ => {}
    }
    self.details.poll();
    self.expire_error();
  }

  pub fn shutdown(&mut self) {
    self.search.shutdown();
    self.detail_view = None;
    self.details.close();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::FetchError;
  use crate::movie::MovieDetail;
  use crate::omdb::mock::{MockApi, shawshank, summary};
  use crate::store::MemoryStorage;

  fn settings() -> Settings {
    Config { api_key: Some("test".into()), debounce_ms: Some(0), ..Default::default() }.settings().unwrap()
  }

  fn app_with(api: MockApi) -> App {
    let watched = PersistedValue::load(Box::new(MemoryStorage::default()), "watched", Vec::new());
    App::new(Arc::new(api), watched, &settings(), Config::default())
  }

  fn shawshank_api() -> MockApi {
    MockApi::default()
      .with_search("shawshank", Ok(vec![summary("tt0111161", "The Shawshank Redemption", "1994")]))
      .with_detail("tt0111161", Ok(shawshank()))
  }

  async fn open_shawshank(app: &mut App) {
    app.select_movie("tt0111161");
    app.details.settle().await;
  }

  #[tokio::test]
  async fn rate_and_commit_adds_one_entry() {
    let mut app = app_with(shawshank_api());
    open_shawshank(&mut app).await;
    assert_eq!(app.details.detail().unwrap().runtime_minutes, 142);

    app.set_rating(Some(9));
    app.add_watched().unwrap();

    assert_eq!(app.watched().len(), 1);
    assert_eq!(app.watched()[0].user_rating, 9);
    assert_eq!(app.watched()[0].rating_revisions, 1);
    assert!(app.detail_view.is_none());
    assert!(app.details.selected_id().is_none());
  }

  #[tokio::test]
  async fn commit_without_rating_is_refused() {
    let mut app = app_with(shawshank_api());
    open_shawshank(&mut app).await;
    assert_eq!(app.add_watched(), Err(RatingError::NoRating));
    assert!(app.watched().is_empty());
    assert!(app.detail_view.is_some());
  }

  #[tokio::test]
  async fn commit_before_detail_loads_is_refused() {
    let api = MockApi::default();
    let _held = api.hold_detail("tt0111161");
    let mut app = app_with(api);
    app.select_movie("tt0111161");
    app.set_rating(Some(7));
    assert_eq!(app.add_watched(), Err(RatingError::DetailNotLoaded));
  }

  #[tokio::test]
  async fn watched_movie_shows_stored_rating_and_ignores_new_ones() {
    let mut app = app_with(shawshank_api());
    open_shawshank(&mut app).await;
    app.set_rating(Some(9));
    app.add_watched().unwrap();

    open_shawshank(&mut app).await;
    assert_eq!(app.open_movie_watched_rating(), Some(9));
    app.set_rating(Some(3));
    assert_eq!(app.detail_view.as_ref().unwrap().draft.rating(), None);
    assert_eq!(app.add_watched(), Err(RatingError::NoRating));
    assert_eq!(app.watched().len(), 1);
  }

  #[tokio::test]
  async fn selecting_the_open_movie_closes_it() {
    let mut app = app_with(shawshank_api());
    open_shawshank(&mut app).await;
    app.select_movie("tt0111161");
    assert!(app.detail_view.is_none());
  }

  #[tokio::test]
  async fn opening_another_movie_resets_the_draft() {
    let api = shawshank_api().with_detail("tt0068646", Err(FetchError::FetchFailed));
    let mut app = app_with(api);
    open_shawshank(&mut app).await;
    app.set_rating(Some(4));
    app.set_rating(Some(6));
    app.select_movie("tt0068646");
    let draft = &app.detail_view.as_ref().unwrap().draft;
    assert_eq!(draft.movie_id(), "tt0068646");
    assert_eq!(draft.revisions(), 0);
    assert_eq!(draft.rating(), None);
  }

  #[tokio::test]
  async fn escape_closes_detail_and_releases_its_listener() {
    let mut app = app_with(shawshank_api());
    let baseline = app.keys.active();
    open_shawshank(&mut app).await;
    assert_eq!(app.keys.active(), baseline + 1);

    // Switching movies must not stack Escape listeners.
    app.select_movie("tt0068646");
    assert_eq!(app.keys.active(), baseline + 1);

    assert!(app.dispatch_global(KeyCode::Esc));
    assert!(app.detail_view.is_none());
    assert_eq!(app.keys.active(), baseline);
    assert!(!app.dispatch_global(KeyCode::Esc));
  }

  #[tokio::test]
  async fn slash_focuses_search_and_clears_query() {
    let mut app = app_with(shawshank_api());
    app.input = "shawshank".to_string();
    app.on_input_changed();
    app.search.settle().await;
    app.check_pending();
    app.focus = Focus::Results;

    assert!(app.dispatch_global(KeyCode::Char('/')));
    assert_eq!(app.focus, Focus::Search);
    assert!(app.input.is_empty());
    assert!(app.search.state().results.is_empty());

    // Inside the search box the key is plain text.
    assert!(!app.dispatch_global(KeyCode::Char('/')));
  }

  #[tokio::test]
  async fn delete_removes_entry_and_recomputes_stats() {
    let godfather = MovieDetail { id: "tt0068646".into(), runtime_minutes: 175, external_rating: 9.2, ..shawshank() };
    let api = shawshank_api().with_detail("tt0068646", Ok(godfather));
    let mut app = app_with(api);
    open_shawshank(&mut app).await;
    app.set_rating(Some(9));
    app.add_watched().unwrap();
    app.select_movie("tt0068646");
    app.details.settle().await;
    app.set_rating(Some(7));
    app.add_watched().unwrap();
    assert_eq!(app.stats().count, 2);
    assert_eq!(app.stats().avg_user_rating, 8.0);

    app.delete_watched("tt0111161");
    assert_eq!(app.watched().len(), 1);
    assert!(!rating::is_watched(app.watched(), "tt0111161"));
    assert_eq!(app.stats().avg_user_rating, 7.0);
    assert_eq!(app.stats().avg_runtime, 175.0);

    app.delete_highlighted_watched();
    assert!(app.watched().is_empty());
    assert_eq!(app.watched_state.selected(), None);
    assert_eq!(app.stats().avg_runtime, 0.0);
  }

  #[tokio::test]
  async fn collapsed_detail_pane_is_skipped_by_tab() {
    let mut app = app_with(shawshank_api());
    open_shawshank(&mut app).await;
    app.toggle_watched_pane();
    assert_eq!(app.focus, Focus::Search);

    app.cycle_focus();
    assert_eq!(app.focus, Focus::Search);
    assert_eq!(app.detail_view.as_ref().unwrap().draft.rating(), None);

    app.toggle_watched_pane();
    app.cycle_focus();
    assert_eq!(app.focus, Focus::Detail);

    // Opening a movie expands the pane it is shown in.
    app.toggle_watched_pane();
    app.select_movie("tt0068646");
    assert!(app.watched_open);
    assert_eq!(app.focus, Focus::Detail);
  }

  #[tokio::test]
  async fn window_title_follows_open_movie() {
    let mut app = app_with(shawshank_api());
    assert_eq!(app.window_title(), "usePopcorn");
    open_shawshank(&mut app).await;
    assert_eq!(app.window_title(), "Movie | The Shawshank Redemption");
    app.close_detail();
    assert_eq!(app.window_title(), "usePopcorn");
  }

  #[tokio::test]
  async fn search_results_select_first_row() {
    let mut app = app_with(shawshank_api());
    app.input = "shawshank".to_string();
    app.on_input_changed();
    app.search.settle().await;
    app.check_pending();
    assert_eq!(app.results_state.selected(), None);
    app.cycle_focus();
    assert_eq!(app.focus, Focus::Results);
    assert_eq!(app.results_state.selected(), Some(0));
    app.select_highlighted_result();
    assert_eq!(app.details.selected_id(), Some("tt0111161"));
    assert_eq!(app.focus, Focus::Detail);
  }
}
