use crate::framebuffer::{HEIGHT, WIDTH};
use log::warn;
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

/// Display is used by the interpreter to show the framebuffer. It should
/// abstract the implementation details, so a variety of kinds of screen would
/// work. `data` is the packed frame: one bit per pixel, row-major, MSB first.
pub trait Display {
    /// draw data based on internal resolution of display
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error>;
}

// store useful metadata about the terminal
struct Resolution(usize, usize);

impl Resolution {
    fn pixel_count(&self) -> usize {
        self.0 * self.1
    }

    fn byte_count(&self) -> usize {
        self.pixel_count() / 8
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }

    /// (x, y) canvas coords of every pixel whose bit equals `bitplane`; y is
    /// negated so row 0 ends up at the top
    fn bitplane_from_data<'a>(
        &self,
        data: &'a [u8],
        bitplane: u8,
    ) -> impl std::iter::Iterator<Item = (f64, f64)> + 'a {
        let mut count = self.pixel_count();
        let w = self.0;
        std::iter::from_fn(move || {
            while count > 0 {
                count -= 1;
                let bit = 1 & (data[count / 8] >> (7 - count % 8));
                if bit == bitplane {
                    return Some((
                        (count % w) as f64,        // x
                        -1.0 * (count / w) as f64, // y
                    ));
                }
            }
            None
        })
    }
}

/// monochrome display in a terminal, rendered using TUI and crossterm
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    resolution: Resolution,
}

impl MonoTermDisplay {
    pub fn new() -> Result<MonoTermDisplay, io::Error> {
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(MonoTermDisplay {
            terminal,
            resolution: Resolution(WIDTH, HEIGHT),
        })
    }
}

impl Drop for MonoTermDisplay {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.show_cursor() {
            warn!("couldn't restore cursor: {}", e);
        }
    }
}

impl Display for MonoTermDisplay {
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error> {
        if data.len() != self.resolution.byte_count() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "MonoTermDisplay needs {} bytes to draw, got {}",
                    self.resolution.byte_count(),
                    data.len()
                ),
            ));
        }

        // for now this assumes a 1:1 ratio between terminal, chip8 and the
        // internal TUI canvas
        let resolution = &self.resolution;
        self.terminal.draw(|f| {
            let size = Rect::new(0, 0, 2 + resolution.0 as u16, 2 + resolution.1 as u16);

            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title("CHIP-8")
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(resolution.x_bounds())
                .y_bounds(resolution.y_bounds())
                .marker(Marker::Block)
                .paint(|ctx| {
                    // blocky points, one per lit pixel
                    ctx.draw(&Points {
                        coords: &resolution.bitplane_from_data(data, 1).collect::<Vec<_>>(),
                        color: Color::White,
                    });
                });
            f.render_widget(canvas, size);
        })?;
        Ok(())
    }
}

/// useful for testing non-display routines; remembers the last frame
#[derive(Default)]
pub struct DummyDisplay {
    pub frames: usize,
    pub last: Vec<u8>,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        Self::default()
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error> {
        self.frames += 1;
        self.last = data.to_vec();
        Ok(())
    }
}
