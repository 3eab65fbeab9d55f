use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, List, ListItem, Padding, Paragraph, Wrap},
};

use crate::app::{App, Focus};
use crate::constants::constants;
use crate::poster::PosterWidget;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

/// `★★★☆☆…` for `rating` out of `max`.
pub fn star_bar(rating: u8, max: u8) -> String {
  (1..=max).map(|i| if i <= rating { '★' } else { '☆' }).collect()
}

fn pane_block<'a>(title: &'a str, theme: &Theme, focused: bool, open: bool) -> Block<'a> {
  let color = if focused { theme.accent } else { theme.border };
  let toggle = if open { "–" } else { "+" };
  Block::bordered()
    .title(Line::from(vec![
      Span::styled(format!(" {} ", title), Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
      Span::styled(format!("[{}] ", toggle), Style::default().fg(theme.muted)),
    ]))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(color))
    .padding(Padding::horizontal(1))
}

fn centered_message(frame: &mut Frame, block: Block, text: Line, area: Rect) {
  let paragraph = Paragraph::new(vec![Line::from(""), text]).alignment(Alignment::Center).block(block);
  frame.render_widget(paragraph, area);
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();
  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, input_area, main_area, status_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Min(5),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  render_input(frame, app, input_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let left = Line::from(Span::styled(
    format!(" 🍿 {} ", constants().app_title),
    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
  ));
  frame.render_widget(left, area);

  let count = app.search_service().state().results.len();
  let right = Line::from(vec![
    Span::styled("Found ", Style::default().fg(theme.muted)),
    Span::styled(count.to_string(), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD)),
    Span::styled(" results ", Style::default().fg(theme.muted)),
  ]);
  let width = right.width() as u16;
  let right_area = Rect { x: area.x + area.width.saturating_sub(width), width: width.min(area.width), ..area };
  frame.render_widget(right, right_area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let focused = app.focus == Focus::Search;
  let border_color = if focused { theme.accent } else { theme.border };
  let input_block = Block::bordered()
    .title(" Search movies ")
    .title_style(Style::default().fg(border_color))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = (cursor_col + 1).saturating_sub(inner_w.max(1));
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = if app.input.is_empty() && !focused {
    Paragraph::new(Span::styled("Press / to search…", Style::default().fg(theme.muted)))
  } else {
    Paragraph::new(visible).style(Style::default().fg(theme.fg))
  };
  frame.render_widget(paragraph.block(input_block), area);

  if focused {
    let cursor_x = area.x + 2 + cursor_col.saturating_sub(app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  let left_len = if app.results_open { Constraint::Percentage(50) } else { Constraint::Length(14) };
  let right_len = if app.watched_open { Constraint::Min(20) } else { Constraint::Length(14) };
  let [left, right] = Layout::horizontal([left_len, right_len]).areas(area);

  render_results(frame, app, left);
  if app.detail_view.is_some() {
    render_detail(frame, app, right);
  } else {
    render_watched(frame, app, right);
  }
}

fn render_results(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let block = pane_block("Results", theme, app.focus == Focus::Results, app.results_open);
  if !app.results_open {
    frame.render_widget(block, area);
    return;
  }

  let state = app.search_service().state();
  if state.loading {
    centered_message(frame, block, Line::styled("⏳ Loading ...⏳", Style::default().fg(theme.status)), area);
    return;
  }
  if let Some(err) = state.error.as_ref().filter(|e| e.is_user_visible()) {
    centered_message(frame, block, Line::styled(format!("⛔ {}", err), Style::default().fg(theme.error)), area);
    return;
  }
  if state.results.is_empty() {
    let hint = if app.search_service().query().is_empty() { "Start typing to search" } else { "Keep typing…" };
    centered_message(frame, block, Line::styled(hint, Style::default().fg(theme.muted)), area);
    return;
  }

  let inner_w = area.width.saturating_sub(6) as usize;
  let open_id = app.detail_service().selected_id();
  let items: Vec<ListItem> = state
    .results
    .iter()
    .enumerate()
    .map(|(i, movie)| {
      let bg = if i % 2 == 1 { theme.stripe_bg } else { theme.bg };
      let marker = if open_id == Some(movie.id.as_str()) { "● " } else { "  " };
      let year = format!("🗓 {}", movie.year);
      let title_max = inner_w.saturating_sub(year.chars().count() + 4);
      let title = truncate_str(&movie.title, title_max);
      let gap = inner_w.saturating_sub(title.chars().count() + year.chars().count() + 2);
      ListItem::new(Line::from(vec![
        Span::styled(marker, Style::default().fg(theme.accent)),
        Span::styled(title, Style::default().fg(theme.fg)),
        Span::raw(" ".repeat(gap)),
        Span::styled(year, Style::default().fg(theme.muted)),
      ]))
      .bg(bg)
    })
    .collect();

  let highlight = if app.focus == Focus::Results {
    Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
  } else {
    Style::default()
  };
  let list = List::new(items).block(block).highlight_symbol("▶ ").highlight_style(highlight);
  frame.render_stateful_widget(list, area, &mut app.results_state);
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let block = pane_block("Details", theme, app.focus == Focus::Detail, app.watched_open);
  if !app.watched_open {
    frame.render_widget(block, area);
    return;
  }

  let service = app.detail_service();
  if service.is_loading() {
    centered_message(frame, block, Line::styled("⏳ Loading ...⏳", Style::default().fg(theme.status)), area);
    return;
  }
  if let Some(err) = service.error() {
    centered_message(frame, block, Line::styled(format!("⛔ {}", err), Style::default().fg(theme.error)), area);
    return;
  }
  let Some(movie) = service.detail() else {
    frame.render_widget(block, area);
    return;
  };

  let muted = Style::default().fg(theme.muted);
  let fg = Style::default().fg(theme.fg);
  let mut lines = vec![
    Line::from(Span::styled(movie.title.as_str(), fg.add_modifier(Modifier::BOLD))),
    Line::from(Span::styled(format!("{} • {}", movie.released_date, movie.runtime_label), muted)),
    Line::from(Span::styled(movie.genre.as_str(), muted)),
    Line::from(vec![
      Span::styled("⭐ ", Style::default().fg(theme.star)),
      Span::styled(format!("{} IMDb rating", movie.external_rating), fg),
    ]),
    Line::from(""),
  ];

  match app.open_movie_watched_rating() {
    Some(stored) => lines.push(Line::from(vec![
      Span::styled(format!("You rated this movie with {} ", stored), fg),
      Span::styled("⭐", Style::default().fg(theme.star)),
    ])),
    None => {
      let draft = app.detail_view.as_ref().map(|v| &v.draft).filter(|d| d.movie_id() == movie.id);
      let rating = draft.and_then(|d| d.rating()).unwrap_or(0);
      let mut stars = vec![
        Span::styled(star_bar(rating, constants().max_rating), Style::default().fg(theme.star)),
        Span::styled(format!("  {}", if rating > 0 { rating.to_string() } else { String::new() }), fg),
      ];
      if let Some(changes) = draft.map(|d| d.revisions()).filter(|n| *n > 1) {
        stars.push(Span::styled(format!("  ({} changes)", changes), muted));
      }
      if draft.is_some_and(|d| d.can_commit()) {
        stars.push(Span::raw("   "));
        stars.push(Span::styled(" + Add to list ", Style::default().fg(theme.key_fg).bg(theme.accent)));
      }
      lines.push(Line::from(stars));
    }
  }

  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled(movie.plot.as_str(), fg.add_modifier(Modifier::ITALIC))));
  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled(format!("Starring: {}", movie.actors), fg)));
  lines.push(Line::from(Span::styled(format!("Directed by {}", movie.director), fg)));

  let inner = block.inner(area);
  frame.render_widget(block, area);
  let text_area = if movie.poster_link().is_some() {
    let [poster_area, text_area] =
      Layout::horizontal([Constraint::Length(constants().poster_width), Constraint::Min(10)]).spacing(1).areas(inner);
    match service.poster() {
      Some(image) => frame.render_widget(PosterWidget { image }, poster_area),
      None => {
        let label = if service.is_poster_loading() { "⏳" } else { "🎬" };
        let placeholder = Paragraph::new(vec![Line::from(""), Line::styled(label, muted)]).alignment(Alignment::Center);
        frame.render_widget(placeholder, poster_area);
      }
    }
    text_area
  } else {
    inner
  };
  frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), text_area);
}

fn render_watched(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let block = pane_block("Watched", theme, app.focus == Focus::Watched, app.watched_open);
  if !app.watched_open {
    frame.render_widget(block, area);
    return;
  }
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let [summary_area, list_area] = Layout::vertical([Constraint::Length(3), Constraint::Min(1)]).areas(inner);

  let stats = app.stats();
  let muted = Style::default().fg(theme.muted);
  let fg = Style::default().fg(theme.fg);
  let summary = vec![
    Line::from(Span::styled("MOVIES YOU WATCHED", fg.add_modifier(Modifier::BOLD))),
    Line::from(vec![
      Span::styled("#️⃣ ", muted),
      Span::styled(format!("{} movies   ", stats.count), fg),
      Span::styled("⭐️ ", muted),
      Span::styled(format!("{:.2}   ", stats.avg_external_rating), fg),
      Span::styled("🌟 ", muted),
      Span::styled(format!("{:.2}   ", stats.avg_user_rating), fg),
      Span::styled("⏳ ", muted),
      Span::styled(format!("{:.0} min", stats.avg_runtime), fg),
    ]),
  ];
  frame.render_widget(Paragraph::new(summary), summary_area);

  let items: Vec<ListItem> = app
    .watched()
    .iter()
    .enumerate()
    .map(|(i, movie)| {
      let bg = if i % 2 == 1 { theme.stripe_bg } else { theme.bg };
      let added = movie.added_at.map(|t| t.format("%Y-%m-%d").to_string()).unwrap_or_default();
      ListItem::new(vec![
        Line::from(Span::styled(truncate_str(&movie.title, list_area.width.saturating_sub(4) as usize), fg)),
        Line::from(vec![
          Span::styled(format!("  ⭐️ {}", movie.external_rating), muted),
          Span::styled(format!("   🌟 {}", movie.user_rating), Style::default().fg(theme.star)),
          Span::styled(format!("   ⏳ {} min", movie.runtime_minutes), muted),
          Span::styled(format!("   {}", added), muted),
        ]),
      ])
      .bg(bg)
    })
    .collect();

  let highlight = if app.focus == Focus::Watched {
    Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg)
  } else {
    Style::default()
  };
  let list = List::new(items).highlight_symbol("▶ ").highlight_style(highlight);
  frame.render_stateful_widget(list, list_area, &mut app.watched_state);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(info) = &app.info_message {
    (format!(" ✓ {}", info), Style::default().fg(theme.status))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys: Vec<(&str, &str)> = match app.focus {
    Focus::Search => vec![("Enter", "Results"), ("Tab", "Next"), ("Esc", "Clear/Quit"), ("^t", "Theme")],
    Focus::Results => vec![("Enter", "Open"), ("j/k", "Navigate"), ("/", "Search"), ("^r", "Collapse")],
    Focus::Detail => {
      vec![("1-9,0", "Rate"), ("←/→", "Adjust"), ("Enter", "Add"), ("Esc", "Close"), ("^w", "Collapse")]
    }
    Focus::Watched => vec![("j/k", "Navigate"), ("d", "Delete"), ("Enter", "Open"), ("/", "Search")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::omdb::mock::{MockApi, shawshank};
  use crate::store::{MemoryStorage, PersistedValue};
  use ratatui::{Terminal, backend::TestBackend};
  use std::sync::Arc;

  #[test]
  fn truncate_str_adds_ellipsis() {
    assert_eq!(truncate_str("short", 10), "short");
    assert_eq!(truncate_str("a long title", 6), "a lon…");
  }

  #[test]
  fn star_bar_fills_from_left() {
    assert_eq!(star_bar(3, 5), "★★★☆☆");
    assert_eq!(star_bar(0, 3), "☆☆☆");
  }

  #[test]
  fn display_width_counts_wide_chars() {
    assert_eq!(display_width("ab", 2), 2);
    assert_eq!(display_width("日本", 2), 4);
  }

  fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
    terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
  }

  #[tokio::test]
  async fn renders_empty_summary_without_nan() {
    let settings = Config { api_key: Some("k".into()), ..Default::default() }.settings().unwrap();
    let watched = PersistedValue::load(Box::new(MemoryStorage::default()), "watched", Vec::new());
    let mut app = App::new(Arc::new(MockApi::default()), watched, &settings, Config::default());

    let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
    terminal.draw(|f| ui(f, &mut app)).unwrap();
    let text = buffer_text(&terminal);
    assert!(text.contains("0 movies"));
    assert!(text.contains("0.00"));
    assert!(!text.contains("NaN"));
  }

  #[tokio::test]
  async fn renders_detail_with_rating_control() {
    let settings = Config { api_key: Some("k".into()), ..Default::default() }.settings().unwrap();
    let watched = PersistedValue::load(Box::new(MemoryStorage::default()), "watched", Vec::new());
    let api = MockApi::default().with_detail("tt0111161", Ok(shawshank()));
    let mut app = App::new(Arc::new(api), watched, &settings, Config::default());
    app.select_movie("tt0111161");
    app.details.settle().await;
    app.set_rating(Some(9));

    let mut terminal = Terminal::new(TestBackend::new(140, 30)).unwrap();
    terminal.draw(|f| ui(f, &mut app)).unwrap();
    let text = buffer_text(&terminal);
    assert!(text.contains("Directed by Frank Darabont"));
    assert!(text.contains("Add to list"));
    assert!(!text.contains("changes"));

    app.set_rating(Some(7));
    terminal.draw(|f| ui(f, &mut app)).unwrap();
    assert!(buffer_text(&terminal).contains("(2 changes)"));
  }

  #[tokio::test]
  async fn detail_pane_shows_the_poster() {
    let url = "https://img.example/shawshank.jpg";
    let detail = crate::movie::MovieDetail { poster_url: url.to_string(), ..shawshank() };
    let api = MockApi::default()
      .with_detail("tt0111161", Ok(detail))
      .with_poster(url, Ok(image::DynamicImage::new_rgb8(20, 30)));
    let settings = Config { api_key: Some("k".into()), ..Default::default() }.settings().unwrap();
    let watched = PersistedValue::load(Box::new(MemoryStorage::default()), "watched", Vec::new());
    let mut app = App::new(Arc::new(api), watched, &settings, Config::default());
    app.select_movie("tt0111161");
    app.details.settle().await;

    let mut terminal = Terminal::new(TestBackend::new(140, 30)).unwrap();
    terminal.draw(|f| ui(f, &mut app)).unwrap();
    let text = buffer_text(&terminal);
    assert!(text.contains("▀"));
    assert!(text.contains("Directed by Frank Darabont"));
  }
}
