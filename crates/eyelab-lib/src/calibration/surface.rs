//! Presentation-layer seams used during calibration, plus headless
//! implementations for scripted runs.

use crate::plot::Figure;
use std::collections::VecDeque;

/// Key names as reported by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Space,
    Escape,
    Char(char),
    Other(String),
}

impl Key {
    /// Parse a key name such as `space`, `escape`, `a`.
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "space" => Key::Space,
            "escape" | "esc" => Key::Escape,
            _ => {
                let mut chars = trimmed.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Key::Char(ch.to_ascii_lowercase()),
                    _ => Key::Other(trimmed.to_string()),
                }
            }
        }
    }
}

/// Something that reports key presses since the last poll.
pub trait KeySource {
    fn poll_keys(&mut self) -> Vec<Key>;

    /// Drop presses made while nothing is listening for input.
    fn discard(&mut self) {
        let _ = self.poll_keys();
    }

    /// True once no further keys can ever arrive.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Render surface with a centre origin for targets and text, y pointing up.
/// Figures use their own top-left pixel space.
pub trait CalibrationSurface {
    fn size(&self) -> (f64, f64);
    fn draw_target(&mut self, center: (f64, f64), outer_radius: f64, inner_radius: f64);
    fn draw_text(&mut self, text: &str, position: (f64, f64));
    fn draw_figure(&mut self, figure: &Figure);
    fn flip(&mut self);
}

/// Replays a fixed key script, one key per poll.
#[derive(Debug, Default)]
pub struct ScriptedKeys {
    keys: VecDeque<Key>,
}

impl ScriptedKeys {
    pub fn new<I: IntoIterator<Item = Key>>(keys: I) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Comma separated key names, e.g. `space,r,space,a`.
    pub fn parse(script: &str) -> Self {
        Self::new(
            script
                .split(',')
                .filter(|name| !name.trim().is_empty())
                .map(Key::from_name),
        )
    }

    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl KeySource for ScriptedKeys {
    fn poll_keys(&mut self) -> Vec<Key> {
        self.keys.pop_front().into_iter().collect()
    }

    // scripted presses belong to the prompts that follow
    fn discard(&mut self) {}

    fn is_closed(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Target {
        center: (f64, f64),
        outer_radius: f64,
        inner_radius: f64,
    },
    Text {
        text: String,
        position: (f64, f64),
    },
    Figure,
}

/// Surface that only records what would have been drawn.
#[derive(Debug)]
pub struct HeadlessSurface {
    width: f64,
    height: f64,
    frame: Vec<DrawOp>,
    shown: Vec<DrawOp>,
    frames: usize,
    texts: Vec<String>,
    last_figure: Option<Figure>,
}

impl HeadlessSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            frame: Vec::new(),
            shown: Vec::new(),
            frames: 0,
            texts: Vec::new(),
            last_figure: None,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Every distinct text drawn, in first-drawn order.
    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn last_figure(&self) -> Option<&Figure> {
        self.last_figure.as_ref()
    }

    /// Operations of the most recently flipped frame.
    pub fn last_frame(&self) -> &[DrawOp] {
        &self.shown
    }
}

impl CalibrationSurface for HeadlessSurface {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn draw_target(&mut self, center: (f64, f64), outer_radius: f64, inner_radius: f64) {
        self.frame.push(DrawOp::Target {
            center,
            outer_radius,
            inner_radius,
        });
    }

    fn draw_text(&mut self, text: &str, position: (f64, f64)) {
        if !self.texts.iter().any(|t| t == text) {
            self.texts.push(text.to_string());
        }
        self.frame.push(DrawOp::Text {
            text: text.to_string(),
            position,
        });
    }

    fn draw_figure(&mut self, figure: &Figure) {
        self.last_figure = Some(figure.clone());
        self.frame.push(DrawOp::Figure);
    }

    fn flip(&mut self) {
        self.shown = std::mem::take(&mut self.frame);
        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_names() {
        assert_eq!(Key::from_name("space"), Key::Space);
        assert_eq!(Key::from_name("ESC"), Key::Escape);
        assert_eq!(Key::from_name("A"), Key::Char('a'));
        assert_eq!(Key::from_name("f12"), Key::Other("f12".into()));
    }

    #[test]
    fn scripted_keys_replay_in_order() {
        let mut keys = ScriptedKeys::parse("space, r,,a");
        assert_eq!(keys.remaining(), 3);
        assert_eq!(keys.poll_keys(), vec![Key::Space]);
        assert_eq!(keys.poll_keys(), vec![Key::Char('r')]);
        assert_eq!(keys.poll_keys(), vec![Key::Char('a')]);
        assert!(keys.poll_keys().is_empty());
        assert!(keys.is_closed());
    }

    #[test]
    fn flip_shows_the_drawn_frame() {
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        surface.draw_target((1.0, 2.0), 10.0, 2.0);
        surface.draw_text("hello", (0.0, 0.0));
        assert!(surface.last_frame().is_empty());
        surface.flip();
        assert_eq!(surface.frames(), 1);
        assert_eq!(surface.last_frame().len(), 2);
        assert!(matches!(
            &surface.last_frame()[1],
            DrawOp::Text { text, .. } if text == "hello"
        ));
        surface.flip();
        assert!(surface.last_frame().is_empty());
    }
}
