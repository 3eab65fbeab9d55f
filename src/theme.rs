use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub star: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "Popcorn",
    bg: Color::Rgb(33, 37, 41),
    fg: Color::Rgb(222, 226, 230),
    accent: Color::Rgb(103, 65, 217),
    muted: Color::Rgb(134, 142, 150),
    border: Color::Rgb(52, 58, 64),
    highlight_fg: Color::Rgb(248, 249, 250),
    highlight_bg: Color::Rgb(52, 58, 64),
    stripe_bg: Color::Rgb(38, 42, 47),
    status: Color::Rgb(151, 117, 250),
    error: Color::Rgb(250, 82, 82),
    star: Color::Rgb(252, 196, 25),
    key_fg: Color::Rgb(33, 37, 41),
    key_bg: Color::Rgb(134, 142, 150),
  },
  Theme {
    name: "Mocha",
    bg: Color::Rgb(30, 30, 46),
    fg: Color::Rgb(205, 214, 244),
    accent: Color::Rgb(203, 166, 247),
    muted: Color::Rgb(127, 132, 156),
    border: Color::Rgb(69, 71, 90),
    highlight_fg: Color::Rgb(30, 30, 46),
    highlight_bg: Color::Rgb(203, 166, 247),
    stripe_bg: Color::Rgb(36, 36, 54),
    status: Color::Rgb(137, 180, 250),
    error: Color::Rgb(243, 139, 168),
    star: Color::Rgb(249, 226, 175),
    key_fg: Color::Rgb(30, 30, 46),
    key_bg: Color::Rgb(166, 173, 200),
  },
  Theme {
    name: "Paper",
    bg: Color::Rgb(250, 248, 243),
    fg: Color::Rgb(51, 51, 51),
    accent: Color::Rgb(196, 80, 40),
    muted: Color::Rgb(140, 135, 125),
    border: Color::Rgb(210, 205, 195),
    highlight_fg: Color::Rgb(250, 248, 243),
    highlight_bg: Color::Rgb(196, 80, 40),
    stripe_bg: Color::Rgb(242, 239, 232),
    status: Color::Rgb(40, 110, 160),
    error: Color::Rgb(190, 30, 45),
    star: Color::Rgb(214, 150, 0),
    key_fg: Color::Rgb(250, 248, 243),
    key_bg: Color::Rgb(110, 105, 95),
  },
];

/// Index of the theme called `name`, or the first theme.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(n))).unwrap_or(0)
}
