//! Tab-separated gaze record: 13 fixed gaze columns followed by one column
//! per declared event, aligned by sample index.

use super::events::EventLog;
use crate::device::{EyeGaze, GazeSample, Point2D, Point3D};
use crate::error::Result;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::io::Write;

pub const GAZE_COLUMNS: [&str; 13] = [
    "Timestamp",
    "LeftEyePosition3D",
    "LeftEyePosition3DRelative",
    "LeftGazePoint3D",
    "LeftGazePoint2D",
    "LeftPupil",
    "LeftValidity",
    "RightEyePosition3D",
    "RightEyePosition3DRelative",
    "RightGazePoint3D",
    "RightGazePoint2D",
    "RightPupil",
    "RightValidity",
];

const MISSING_3D: Point3D = Point3D::new(-1.0, -1.0, -1.0);
const MISSING_2D: Point2D = Point2D::new(-1.0, -1.0);
const MISSING_PUPIL: f64 = -1.0;

fn eye_fields(eye: &EyeGaze) -> [String; 6] {
    let has_data = eye.has_data();
    let p3 = |p: Point3D| (if has_data { p } else { MISSING_3D }).to_string();
    [
        p3(eye.eye_position_3d),
        p3(eye.eye_position_3d_relative),
        p3(eye.gaze_point_3d),
        (if has_data { eye.gaze_point_2d } else { MISSING_2D }).to_string(),
        format!("{:.2}", if has_data { eye.pupil } else { MISSING_PUPIL }),
        eye.validity.to_string(),
    ]
}

/// The 13 gaze fields of one sample. Eyes reporting "no data" get
/// placeholder values instead of the device's raw output.
pub fn gaze_fields(sample: &GazeSample) -> Vec<String> {
    let mut fields = Vec::with_capacity(GAZE_COLUMNS.len());
    fields.push(format!("{:.1}", sample.timestamp as f64));
    fields.extend(eye_fields(&sample.left));
    fields.extend(eye_fields(&sample.right));
    fields
}

/// Write header and rows; returns the number of sample rows written.
pub fn write_tsv<W: Write>(writer: W, samples: &[GazeSample], events: &EventLog) -> Result<usize> {
    let mut tsv = WriterBuilder::new()
        .delimiter(b'\t')
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Necessary)
        .from_writer(writer);
    let mut header: Vec<&str> = GAZE_COLUMNS.to_vec();
    header.extend(events.names().iter().map(String::as_str));
    tsv.write_record(&header)?;
    for (index, sample) in samples.iter().enumerate() {
        let mut row = gaze_fields(sample);
        for name in events.names() {
            row.push(
                events
                    .value_at(name, index)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        tsv.write_record(&row)?;
    }
    tsv.flush()?;
    Ok(samples.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::VALIDITY_NO_DATA;

    fn eye(validity: u8) -> EyeGaze {
        EyeGaze {
            eye_position_3d: Point3D::new(-32.5, 10.0, 650.25),
            eye_position_3d_relative: Point3D::new(0.45, 0.5, 0.5),
            gaze_point_3d: Point3D::new(12.0, -3.5, 0.0),
            gaze_point_2d: Point2D::new(0.25, 0.75),
            pupil: 3.456,
            validity,
        }
    }

    fn sample(ts: i64, left: u8, right: u8) -> GazeSample {
        GazeSample {
            timestamp: ts,
            left: eye(left),
            right: eye(right),
        }
    }

    #[test]
    fn formats_fields_with_fixed_precision() {
        let fields = gaze_fields(&sample(1_234_567, 0, 1));
        assert_eq!(fields.len(), 13);
        assert_eq!(fields[0], "1234567.0");
        assert_eq!(fields[1], "(-32.5, 10.0, 650.25)");
        assert_eq!(fields[4], "(0.25, 0.75)");
        assert_eq!(fields[5], "3.46");
        assert_eq!(fields[6], "0");
        assert_eq!(fields[12], "1");
    }

    #[test]
    fn no_data_eye_is_replaced_by_placeholders() {
        let fields = gaze_fields(&sample(10, VALIDITY_NO_DATA, 2));
        assert_eq!(fields[1], "(-1.0, -1.0, -1.0)");
        assert_eq!(fields[2], "(-1.0, -1.0, -1.0)");
        assert_eq!(fields[3], "(-1.0, -1.0, -1.0)");
        assert_eq!(fields[4], "(-1.0, -1.0)");
        assert_eq!(fields[5], "-1.00");
        assert_eq!(fields[6], "4");
        // validity 2 is left untouched
        assert_eq!(fields[8], "(0.45, 0.5, 0.5)");
        assert_eq!(fields[11], "3.46");
    }

    #[test]
    fn event_columns_pad_by_row_index() {
        let mut events = EventLog::new();
        events.configure(["stim", "trial"]);
        events.append("stim", 1_000_042i64.into()).unwrap();
        events.set("trial", "practice".into()).unwrap();
        events.append("trial", "main".into()).unwrap();
        let samples = vec![sample(1, 0, 0), sample(2, 0, 0), sample(3, 0, 0)];
        let mut out = Vec::new();
        let rows = write_tsv(&mut out, &samples, &events).unwrap();
        assert_eq!(rows, 3);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        let header: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(header.len(), 15);
        assert_eq!(&header[13..], ["stim", "trial"]);
        let row0: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(&row0[13..], ["1000042", "practice"]);
        let row1: Vec<&str> = lines[2].split('\t').collect();
        assert_eq!(&row1[13..], ["", "main"]);
        let row2: Vec<&str> = lines[3].split('\t').collect();
        assert_eq!(row2.len(), 15);
        assert_eq!(&row2[13..], ["", ""]);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn longer_event_columns_never_add_rows() {
        let mut events = EventLog::new();
        events.configure(["marker"]);
        for i in 0..5i64 {
            events.append("marker", i.into()).unwrap();
        }
        let mut out = Vec::new();
        write_tsv(&mut out, &[sample(1, 0, 0)], &events).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }
}
