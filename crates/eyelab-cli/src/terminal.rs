use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use eyelab_lib::calibration::{CalibrationSurface, HeadlessSurface, Key, KeySource};
use eyelab_lib::plot::Figure;
use log::warn;
use std::io::Write;
use std::time::Duration;

/// Live key presses from the controlling terminal, read in raw mode.
pub struct TerminalKeys {
    closed: bool,
}

impl TerminalKeys {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self { closed: false })
    }
}

fn map_key(code: KeyCode) -> Key {
    match code {
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Esc => Key::Escape,
        KeyCode::Char(ch) => Key::Char(ch.to_ascii_lowercase()),
        other => Key::Other(format!("{:?}", other)),
    }
}

impl KeySource for TerminalKeys {
    fn poll_keys(&mut self) -> Vec<Key> {
        let mut keys = Vec::new();
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    warn!("terminal input failed: {}", err);
                    self.closed = true;
                    break;
                }
            }
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    keys.push(map_key(key.code))
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("terminal input failed: {}", err);
                    self.closed = true;
                    break;
                }
            }
        }
        keys
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Calibration surface for a text terminal. Drawing is recorded headlessly;
/// whenever a flipped frame carries different messages than the last one
/// shown, they are written out with `\r\n` endings so raw mode lines up.
pub struct PromptSurface {
    inner: HeadlessSurface,
    out: Box<dyn Write>,
    frame_texts: Vec<String>,
    shown: Vec<String>,
}

impl PromptSurface {
    pub fn new(out: Box<dyn Write>, width: f64, height: f64) -> Self {
        Self {
            inner: HeadlessSurface::new(width, height),
            out,
            frame_texts: Vec::new(),
            shown: Vec::new(),
        }
    }

    pub fn headless(&self) -> &HeadlessSurface {
        &self.inner
    }

    fn show(&mut self, texts: &[String]) -> std::io::Result<()> {
        for text in texts {
            write!(self.out, "{}\r\n", text)?;
        }
        self.out.flush()
    }
}

impl CalibrationSurface for PromptSurface {
    fn size(&self) -> (f64, f64) {
        self.inner.size()
    }

    fn draw_target(&mut self, center: (f64, f64), outer_radius: f64, inner_radius: f64) {
        self.inner.draw_target(center, outer_radius, inner_radius);
    }

    fn draw_text(&mut self, text: &str, position: (f64, f64)) {
        self.inner.draw_text(text, position);
        self.frame_texts.push(text.to_string());
    }

    fn draw_figure(&mut self, figure: &Figure) {
        self.inner.draw_figure(figure);
    }

    fn flip(&mut self) {
        self.inner.flip();
        let texts = std::mem::take(&mut self.frame_texts);
        if texts != self.shown {
            if let Err(err) = self.show(&texts) {
                warn!("could not show prompt: {}", err);
            }
            self.shown = texts;
        }
    }
}
