// SPDX-License-Identifier: GPL-3.0-only

//! Terminal preview
//!
//! Renders the color image and the depth grayscale side by side using
//! Unicode half-block characters for improved vertical resolution, with a
//! status bar on the bottom line. Keys are read through crossterm.

use crate::constants::KEY_HINT;
use crate::media::NormalizedPair;
use crate::media::encoders::ImageRef;
use crate::pipelines::capture::{PreviewSurface, StatusLine};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::Widget,
};
use std::io::{self, Stdout, stdout};
use std::time::Duration;
use tracing::warn;

/// Full-screen preview owning the terminal until dropped
pub struct TerminalPreview {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    restored: bool,
}

impl TerminalPreview {
    /// Switch the terminal to raw mode on the alternate screen
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self {
            terminal,
            restored: false,
        })
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for TerminalPreview {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(error = %e, "Failed to restore terminal");
        }
    }
}

impl PreviewSurface for TerminalPreview {
    fn render(&mut self, frame: Option<&NormalizedPair>, status: &StatusLine) -> io::Result<()> {
        self.terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let preview_area = Rect {
                height: area.height.saturating_sub(1),
                ..area
            };
            let status_area = Rect {
                y: area.y + area.height.saturating_sub(1),
                height: area.height.min(1),
                ..area
            };

            let [color_area, depth_area] =
                Layout::horizontal([Constraint::Fill(1), Constraint::Fill(1)]).areas(preview_area);
            f.render_widget(
                ImageView {
                    image: frame.map(|p| ImageRef::Rgb(&p.color)),
                },
                color_area,
            );
            f.render_widget(
                ImageView {
                    image: frame.map(|p| ImageRef::Gray(&p.depth_gray)),
                },
                depth_area,
            );

            let message = status_text(status);
            f.render_widget(StatusBar { message: &message }, status_area);
        })?;
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<char>> {
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            // Raw mode swallows SIGINT, treat Ctrl+C like 'q'
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                return Ok(Some('q'));
            }
            if let KeyCode::Char(c) = key.code {
                return Ok(Some(c));
            }
        }
        Ok(None)
    }
}

/// Status bar text: toggles, frame counter, key help and the last message
pub fn status_text(status: &StatusLine) -> String {
    let mut text = format!(
        "video: {} | png: {} | frame {}",
        if status.toggles.video { "REC" } else { "off" },
        if status.toggles.png { "REC" } else { "off" },
        status.iteration
    );
    if status.failed_writes > 0 {
        text.push_str(&format!(" ({} failed writes)", status.failed_writes));
    }
    text.push_str(" | ");
    text.push_str(KEY_HINT);
    if !status.message.is_empty() {
        text.push_str(" | ");
        text.push_str(&status.message);
    }
    text
}

/// Widget that renders an image using half-block characters
struct ImageView<'a> {
    image: Option<ImageRef<'a>>,
}

impl Widget for ImageView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(image) = self.image else {
            // No frame yet - show placeholder
            let msg = "Waiting for sensor...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || area.width == 0 || area.height == 0 {
            return;
        }

        // Each terminal cell displays 2 vertical pixels
        let frame_aspect = width as f64 / height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let w = term_height * frame_aspect;
            (w as u16, area.height)
        } else {
            // Terminal is taller - fit to width
            let h = term_width / frame_aspect;
            (area.width, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = width as f64 / display_width as f64;
        let y_scale = height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(sample(&image, src_x, src_y_top));
                    cell.set_bg(sample(&image, src_x, src_y_bottom));
                }
            }
        }
    }
}

fn sample(image: &ImageRef<'_>, x: u32, y: u32) -> Color {
    match image {
        ImageRef::Rgb(img) => {
            let [r, g, b] = img
                .get_pixel(x.min(img.width() - 1), y.min(img.height() - 1))
                .0;
            Color::Rgb(r, g, b)
        }
        ImageRef::Gray(img) => {
            let [v] = img
                .get_pixel(x.min(img.width() - 1), y.min(img.height() - 1))
                .0;
            Color::Rgb(v, v, v)
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        let style = Style::default().fg(Color::White).bg(Color::DarkGray);
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }
        buf.set_stringn(area.x, area.y, self.message, area.width as usize, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::capture::ToggleSnapshot;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn status(video: bool, message: &str) -> StatusLine {
        StatusLine {
            toggles: ToggleSnapshot {
                video,
                png: false,
                screenshot_pending: false,
                running: true,
            },
            iteration: 42,
            failed_writes: 0,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_status_text() {
        let text = status_text(&status(true, "Screenshot saved."));
        assert!(text.starts_with("video: REC | png: off | frame 42"));
        assert!(text.ends_with("| Screenshot saved."));
        assert!(text.contains(KEY_HINT));
        assert!(!status_text(&status(false, "")).ends_with("| "));
    }

    #[test]
    fn test_image_view_fills_cells() {
        let img = RgbImage::from_pixel(8, 8, Rgb([200, 10, 20]));
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        ImageView {
            image: Some(ImageRef::Rgb(&img)),
        }
        .render(area, &mut buf);

        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(200, 10, 20));
    }

    #[test]
    fn test_gray_image_is_rendered_gray() {
        let img = GrayImage::from_pixel(4, 4, Luma([77]));
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        ImageView {
            image: Some(ImageRef::Gray(&img)),
        }
        .render(area, &mut buf);
        assert_eq!(buf[(1, 1)].bg, Color::Rgb(77, 77, 77));
    }
}
