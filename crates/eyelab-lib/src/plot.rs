use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const RED: Color = Color(0xFF0000);
    pub const GREEN: Color = Color(0x00FF00);
    pub const BLACK: Color = Color(0x000000);

    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Outline circle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircleSeries {
    pub name: String,
    pub center: [f64; 2],
    pub radius: f64,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Circle(CircleSeries),
}

/// Figure in pixel coordinates of a `width` x `height` canvas, origin top-left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub width: f64,
    pub height: f64,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>, width: f64, height: f64) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    pub fn lines(&self) -> impl Iterator<Item = &LineSeries> {
        self.series.iter().filter_map(|series| match series {
            Series::Line(line) => Some(line),
            Series::Circle(_) => None,
        })
    }

    pub fn circles(&self) -> impl Iterator<Item = &CircleSeries> {
        self.series.iter().filter_map(|series| match series {
            Series::Circle(circle) => Some(circle),
            Series::Line(_) => None,
        })
    }
}
