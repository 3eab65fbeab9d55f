use image::{DynamicImage, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};

// --- Poster Widget ---

/// Draws a poster with half-block cells: each cell holds two pixel rows,
/// the upper one as foreground and the lower one as background.
pub struct PosterWidget<'a> {
  pub image: &'a DynamicImage,
}

impl Widget for PosterWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    // Fit inside `width x 2*height` pixels, keeping the aspect ratio.
    let fitted = self.image.resize(u32::from(area.width), u32::from(area.height) * 2, FilterType::Triangle).to_rgb8();
    let img_w = fitted.width().min(u32::from(area.width));
    let img_h = fitted.height();
    let cell_h = img_h.div_ceil(2).min(u32::from(area.height));
    let offset_x = (u32::from(area.width) - img_w) / 2;
    let offset_y = (u32::from(area.height) - cell_h) / 2;

    for y in 0..cell_h {
      for x in 0..img_w {
        let upper = fitted.get_pixel(x, y * 2);
        let lower_y = y * 2 + 1;
        let fg = Color::Rgb(upper[0], upper[1], upper[2]);
        let bg = if lower_y < img_h {
          let lower = fitted.get_pixel(x, lower_y);
          Color::Rgb(lower[0], lower[1], lower[2])
        } else {
          Color::Reset
        };
        buf.set_string(
          area.x + (offset_x + x) as u16,
          area.y + (offset_y + y) as u16,
          "▀",
          Style::default().fg(fg).bg(bg),
        );
      }
    }
  }
}
