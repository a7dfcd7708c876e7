use serde::Serialize;
use std::fmt;

/// Experiment tasks reachable from the menu once calibration is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskKind {
    DarkTest,
    LightTest,
    Pst,
    RevLearn,
    Oddball,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::DarkTest,
        TaskKind::LightTest,
        TaskKind::Pst,
        TaskKind::RevLearn,
        TaskKind::Oddball,
    ];

    /// Directory (and file prefix) the task's data is written under.
    pub fn dir_name(&self) -> &'static str {
        match self {
            TaskKind::DarkTest => "darktest",
            TaskKind::LightTest => "lighttest",
            TaskKind::Pst => "PST",
            TaskKind::RevLearn => "revlearn",
            TaskKind::Oddball => "oddball",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            TaskKind::DarkTest => "2",
            TaskKind::LightTest => "3",
            TaskKind::Pst => "4",
            TaskKind::RevLearn => "5",
            TaskKind::Oddball => "6",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Calibrate,
    Task(TaskKind),
    Settings,
    ResetSettings,
    Quit,
    Invalid(String),
}

impl Action {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match input {
            "1" => Action::Calibrate,
            "s" => Action::Settings,
            "r" => Action::ResetSettings,
            "q" => Action::Quit,
            other => TaskKind::ALL
                .iter()
                .find(|task| task.key() == other)
                .map(|task| Action::Task(*task))
                .unwrap_or_else(|| Action::Invalid(other.to_string())),
        }
    }
}

const BEFORE_CALIBRATION: [&str; 4] = [
    "1) Calibrate",
    "s) Settings",
    "r) Reset to Default Settings",
    "q) Quit",
];

const AFTER_CALIBRATION: [&str; 9] = [
    "1) Re-Calibrate",
    "2) Dark Test",
    "3) Light Test",
    "4) PST",
    "5) RevLearn",
    "6) Oddball",
    "s) Settings",
    "r) Reset to Default Settings",
    "q) Quit",
];

/// Menu entries on offer; tasks appear only after calibration.
pub fn menu_lines(calibrated: bool) -> &'static [&'static str] {
    if calibrated {
        &AFTER_CALIBRATION
    } else {
        &BEFORE_CALIBRATION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_menu_key() {
        assert_eq!(Action::parse("1"), Action::Calibrate);
        assert_eq!(Action::parse(" 4 "), Action::Task(TaskKind::Pst));
        assert_eq!(Action::parse("6"), Action::Task(TaskKind::Oddball));
        assert_eq!(Action::parse("s"), Action::Settings);
        assert_eq!(Action::parse("r"), Action::ResetSettings);
        assert_eq!(Action::parse("q"), Action::Quit);
        assert_eq!(Action::parse("7"), Action::Invalid("7".into()));
    }

    #[test]
    fn tasks_are_offered_only_after_calibration() {
        assert!(!menu_lines(false).iter().any(|l| l.starts_with('2')));
        assert_eq!(menu_lines(true).len(), 9);
        assert_eq!(menu_lines(true)[0], "1) Re-Calibrate");
    }
}
