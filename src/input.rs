use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Focus};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Star value for a digit key: `1`..`9`, and `0` for ten.
fn digit_rating(c: char) -> Option<u8> {
  match c.to_digit(10)? {
    0 => Some(10),
    d => Some(d as u8),
  }
}

fn move_selection(state: &mut ratatui::widgets::ListState, count: usize, down: bool) {
  if count == 0 {
    return;
  }
  let i = match (state.selected(), down) {
    (None, _) => 0,
    (Some(i), true) => (i + 1) % count,
    (Some(0), false) => count - 1,
    (Some(i), false) => i - 1,
  };
  state.select(Some(i));
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) {
    match key.code {
      KeyCode::Char('c') => app.should_quit = true,
      KeyCode::Char('t') => app.next_theme(),
      KeyCode::Char('r') => app.toggle_results_pane(),
      KeyCode::Char('w') => app.toggle_watched_pane(),
      _ => {}
    }
    return;
  }

  app.info_message = None;
  if app.dispatch_global(key.code) {
    return;
  }

  if key.code == KeyCode::Tab {
    app.cycle_focus();
    return;
  }

  match app.focus {
    Focus::Search => handle_search_key(app, key),
    Focus::Results => handle_results_key(app, key),
    Focus::Detail => handle_detail_key(app, key),
    Focus::Watched => handle_watched_key(app, key),
  }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
      app.on_input_changed();
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.on_input_changed();
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.on_input_changed();
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    KeyCode::Esc => {
      if !app.input.is_empty() {
        app.input.clear();
        app.cursor_position = 0;
        app.input_scroll = 0;
        app.on_input_changed();
      } else {
        app.should_quit = true;
      }
    }
    KeyCode::Down | KeyCode::Enter => {
      if app.results_open && !app.search_service().state().results.is_empty() {
        app.focus = Focus::Results;
        if app.results_state.selected().is_none() {
          app.results_state.select(Some(0));
        }
      }
    }
    _ => {}
  }
}

fn handle_results_key(app: &mut App, key: KeyEvent) {
  let count = app.search_service().state().results.len();
  match key.code {
    KeyCode::Enter => app.select_highlighted_result(),
    KeyCode::Down | KeyCode::Char('j') => move_selection(&mut app.results_state, count, true),
    KeyCode::Up | KeyCode::Char('k') => move_selection(&mut app.results_state, count, false),
    KeyCode::Esc => app.focus = Focus::Search,
    _ => {}
  }
}

fn handle_detail_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Char(c) if c.is_ascii_digit() => app.set_rating(digit_rating(c)),
    KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('+') => app.step_rating(1),
    KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('-') => app.step_rating(-1),
    KeyCode::Backspace | KeyCode::Delete => app.set_rating(None),
    KeyCode::Enter | KeyCode::Char('a') => {
      let ready = app.detail_view.as_ref().is_some_and(|v| v.draft.can_commit());
      if ready && let Err(e) = app.add_watched() {
        app.set_error(e.to_string());
      }
    }
    _ => {}
  }
}

fn handle_watched_key(app: &mut App, key: KeyEvent) {
  let count = app.watched().len();
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => move_selection(&mut app.watched_state, count, true),
    KeyCode::Up | KeyCode::Char('k') => move_selection(&mut app.watched_state, count, false),
    KeyCode::Char('d') | KeyCode::Delete => app.delete_highlighted_watched(),
    KeyCode::Enter => app.open_highlighted_watched(),
    KeyCode::Esc => app.focus = Focus::Search,
    _ => {}
  }
}
