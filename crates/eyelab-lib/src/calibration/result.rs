use crate::device::{CalibrationData, CalibrationSample, ErrorCode, Point2D};
use crate::plot::{CircleSeries, Color, Figure, LineSeries, Series, Style};
use serde::Serialize;

pub const MSG_INSUFFICIENT_DATA: &str = "Not enough data was collected (Retry:r/Abort:ESC)";
pub const MSG_NO_CALIBRATION_DATA: &str = "No calibration data (Retry:r/Abort:ESC)";
pub const MSG_NO_TRUE_CALIBRATION_DATA: &str = "No true calibration data (Retry:r/Abort:ESC)";
pub const MSG_ACCEPT_PROMPT: &str = "Accept calibration results (Accept:a/Retry:r/Abort:ESC)";

const TRUE_POINT_RADIUS: f64 = 10.0;

/// How the device answered the compute request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComputeOutcome {
    Success,
    InsufficientData,
    ServerError(ErrorCode),
}

impl ComputeOutcome {
    pub fn from_status(status: Result<(), ErrorCode>) -> Self {
        match status {
            Ok(()) => ComputeOutcome::Success,
            Err(code) if code == ErrorCode::INSUFFICIENT_DATA => ComputeOutcome::InsufficientData,
            Err(code) => ComputeOutcome::ServerError(code),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, ComputeOutcome::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EyePair {
    pub left: CalibrationSample,
    pub right: CalibrationSample,
}

/// Per true point results of one calibration run, in the device's order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalibrationResult {
    points: Vec<(Point2D, EyePair)>,
}

impl CalibrationResult {
    /// Group the device's plot data by true point; a repeated true point
    /// replaces the earlier entry.
    pub fn from_data(data: &CalibrationData) -> Self {
        let mut points: Vec<(Point2D, EyePair)> = Vec::with_capacity(data.plot_data.len());
        for item in &data.plot_data {
            let pair = EyePair {
                left: item.left,
                right: item.right,
            };
            match points.iter_mut().find(|(p, _)| *p == item.true_point) {
                Some(entry) => entry.1 = pair,
                None => points.push((item.true_point, pair)),
            }
        }
        Self { points }
    }

    pub fn points(&self) -> &[(Point2D, EyePair)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// What the operator is shown once a calibration run has finished.
#[derive(Debug, Clone)]
pub enum CalibrationOutcome {
    ComputeFailed(ComputeOutcome),
    NoCalibrationData,
    NoTrueCalibrationData,
    Ready {
        result: CalibrationResult,
        figure: Figure,
    },
}

impl CalibrationOutcome {
    /// Resolve in precedence order: compute failure, missing data, empty
    /// data, then the accuracy plot.
    pub fn resolve(
        compute: ComputeOutcome,
        result: Option<CalibrationResult>,
        size: (f64, f64),
    ) -> Self {
        if !compute.succeeded() {
            return CalibrationOutcome::ComputeFailed(compute);
        }
        match result {
            None => CalibrationOutcome::NoCalibrationData,
            Some(result) if result.is_empty() => CalibrationOutcome::NoTrueCalibrationData,
            Some(result) => {
                let figure = accuracy_figure(&result, size);
                CalibrationOutcome::Ready { result, figure }
            }
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            CalibrationOutcome::ComputeFailed(_) => MSG_INSUFFICIENT_DATA,
            CalibrationOutcome::NoCalibrationData => MSG_NO_CALIBRATION_DATA,
            CalibrationOutcome::NoTrueCalibrationData => MSG_NO_TRUE_CALIBRATION_DATA,
            CalibrationOutcome::Ready { .. } => MSG_ACCEPT_PROMPT,
        }
    }

    /// Only a plotted result may be accepted.
    pub fn can_accept(&self) -> bool {
        matches!(self, CalibrationOutcome::Ready { .. })
    }

    pub fn figure(&self) -> Option<&Figure> {
        match self {
            CalibrationOutcome::Ready { figure, .. } => Some(figure),
            _ => None,
        }
    }
}

/// Lines from each true point to the valid eyes' mapped points (left red,
/// right green) and a circle on every true point.
pub fn accuracy_figure(result: &CalibrationResult, (width, height): (f64, f64)) -> Figure {
    let mut fig = Figure::new(Some("Calibration accuracy".to_string()), width, height);
    let scale = |p: &Point2D| [p.x * width, p.y * height];
    for (true_point, pair) in result.points() {
        let origin = scale(true_point);
        for (name, sample, color) in [
            ("left", &pair.left, Color::RED),
            ("right", &pair.right, Color::GREEN),
        ] {
            if sample.is_valid() {
                fig.add_series(Series::Line(LineSeries {
                    name: name.into(),
                    points: vec![origin, scale(&sample.map_point)],
                    style: Style { width: 1.0, color },
                }));
            }
        }
        fig.add_series(Series::Circle(CircleSeries {
            name: "true point".into(),
            center: origin,
            radius: TRUE_POINT_RADIUS,
            style: Style {
                width: 1.0,
                color: Color::BLACK,
            },
        }));
    }
    fig
}
