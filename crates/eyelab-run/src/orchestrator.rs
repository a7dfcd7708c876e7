//! Menu loop sequencing calibration and tasks around one tracker controller.

use crate::menu::{menu_lines, Action, TaskKind};
use crate::settings::{Settings, SettingsMap};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use eyelab_lib::calibration::{CalibrationDecision, CalibrationSurface, KeySource};
use eyelab_lib::TrackerController;
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const MSG_INVALID_ACTION: &str = "Please enter a valid action";

/// One menu choice, optionally renaming the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub action: String,
    pub subject: Option<String>,
}

/// Where menu choices come from.
pub trait ActionSource {
    /// Offer `menu` and return the choice, or `None` when the operator cancels.
    fn select(&mut self, menu: &[&str], subject: &str) -> Option<Selection>;

    fn notify(&mut self, message: &str);
}

/// Runs one experiment task against the tracker. Stimulus presentation lives
/// behind this trait.
pub trait TaskRunner {
    fn run(&mut self, task: TaskKind, tracker: &mut TrackerController, settings: &Settings)
        -> Result<()>;
}

/// Edits settings in place; returns true when they should be saved.
pub trait SettingsEditor {
    fn edit(&mut self, settings: &mut SettingsMap) -> bool;
}

/// Menu choices replayed from a list such as `1,2@alice,q`.
#[derive(Debug, Default)]
pub struct ScriptedActions {
    queue: VecDeque<Selection>,
    notices: Vec<String>,
    echo: Option<&'static str>,
}

impl ScriptedActions {
    pub fn parse(script: &str) -> Self {
        let queue = script
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once('@') {
                Some((action, subject)) => Selection {
                    action: action.trim().to_string(),
                    subject: Some(subject.trim().to_string()),
                },
                None => Selection {
                    action: entry.to_string(),
                    subject: None,
                },
            })
            .collect();
        Self {
            queue,
            notices: Vec::new(),
            echo: None,
        }
    }

    /// Print menus and notices to stdout as they are shown, ending each line
    /// with `line_end` (`"\r\n"` while the terminal is in raw mode).
    pub fn with_echo(mut self, line_end: &'static str) -> Self {
        self.echo = Some(line_end);
        self
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }
}

impl ActionSource for ScriptedActions {
    fn select(&mut self, menu: &[&str], subject: &str) -> Option<Selection> {
        if let Some(line_end) = self.echo {
            print!("{}", menu_text(menu, subject, line_end));
        }
        self.queue.pop_front()
    }

    fn notify(&mut self, message: &str) {
        if let Some(line_end) = self.echo {
            print!("{}{}", message, line_end);
        }
        self.notices.push(message.to_string());
    }
}

fn menu_text(menu: &[&str], subject: &str, line_end: &str) -> String {
    let mut text = format!("Choose Action from:{}", line_end);
    for line in menu {
        text.push_str(&format!("  {}{}", line, line_end));
    }
    text.push_str(&format!("Subject Name: {}{}", subject, line_end));
    text
}

/// Settings edits given up front as `key=value` pairs.
#[derive(Debug, Default)]
pub struct PresetEdits {
    pub values: SettingsMap,
}

impl SettingsEditor for PresetEdits {
    fn edit(&mut self, settings: &mut SettingsMap) -> bool {
        if self.values.is_empty() {
            return false;
        }
        for (key, value) in &self.values {
            settings.insert(key.clone(), value.clone());
        }
        true
    }
}

/// `<data>/<subject>/<task>/<task>_<YYYYmmdd_HHMMSS>.tsv`
pub fn data_file_path(data_dir: &Path, subject: &str, task: TaskKind, at: NaiveDateTime) -> PathBuf {
    let dir = task.dir_name();
    data_dir.join(subject).join(dir).join(format!(
        "{}_{}.tsv",
        dir,
        at.format("%Y%m%d_%H%M%S")
    ))
}

/// The display and input the orchestrator drives calibration and tasks with.
pub struct Frontend {
    pub surface: Box<dyn CalibrationSurface>,
    pub keys: Box<dyn KeySource>,
    pub runner: Box<dyn TaskRunner>,
    pub editor: Box<dyn SettingsEditor>,
}

pub struct Orchestrator {
    data_dir: PathBuf,
    settings_dir: PathBuf,
    subject: String,
    settings: Settings,
    controller: TrackerController,
    frontend: Frontend,
    calibrated: bool,
    last_data_file: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(root: &Path, controller: TrackerController, frontend: Frontend) -> Result<Self> {
        let settings = Settings::load(root)?;
        Ok(Self {
            data_dir: root.join("data"),
            settings_dir: root.join("settings"),
            subject: "subject_name".to_string(),
            settings,
            controller,
            frontend,
            calibrated: false,
            last_data_file: None,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn controller(&mut self) -> &mut TrackerController {
        &mut self.controller
    }

    pub fn last_data_file(&self) -> Option<&Path> {
        self.last_data_file.as_deref()
    }

    /// Loop over menu selections until quit or the source runs dry.
    pub fn run(&mut self, source: &mut dyn ActionSource) -> Result<()> {
        fs::create_dir_all(&self.settings_dir)
            .with_context(|| format!("creating {}", self.settings_dir.display()))?;
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;
        loop {
            let menu = menu_lines(self.calibrated);
            let Some(selection) = source.select(menu, &self.subject) else {
                break;
            };
            if let Some(subject) = selection.subject {
                if self.calibrated {
                    debug!("subject is fixed after calibration; ignoring '{}'", subject);
                } else if !subject.is_empty() {
                    self.subject = subject;
                }
            }
            if !self.execute(&Action::parse(&selection.action), source)? {
                break;
            }
        }
        info!("Session finished for subject {}", self.subject);
        Ok(())
    }

    /// Execute one action; returns false once the session should end.
    pub fn execute(&mut self, action: &Action, source: &mut dyn ActionSource) -> Result<bool> {
        match action {
            Action::Quit => return Ok(false),
            Action::Calibrate => self.calibrate(),
            Action::Task(task) if self.calibrated => self.run_task(*task)?,
            Action::Task(task) => {
                warn!("{} requested before calibration", task);
                source.notify(MSG_INVALID_ACTION);
            }
            Action::Settings => {
                if self.frontend.editor.edit(self.settings.values_mut()) {
                    self.settings.save()?;
                }
            }
            Action::ResetSettings => self.settings.reset()?,
            Action::Invalid(input) => {
                debug!("invalid action '{}'", input);
                source.notify(MSG_INVALID_ACTION);
            }
        }
        Ok(true)
    }

    /// Calibrate until the operator accepts or aborts.
    fn calibrate(&mut self) {
        let points = self.controller.config().points();
        loop {
            let decision = self.controller.do_calibration(
                &points,
                self.frontend.surface.as_mut(),
                self.frontend.keys.as_mut(),
            );
            match decision {
                Ok(CalibrationDecision::Accept) => {
                    self.calibrated = true;
                    info!("Calibration accepted");
                    return;
                }
                Ok(CalibrationDecision::Retry) => info!("Retrying calibration"),
                Ok(CalibrationDecision::Abort) => {
                    info!("Calibration aborted");
                    return;
                }
                Err(err) => {
                    error!("Calibration failed: {}", err);
                    return;
                }
            }
        }
    }

    fn run_task(&mut self, task: TaskKind) -> Result<()> {
        let now = chrono::Local::now().naive_local();
        let path = data_file_path(&self.data_dir, &self.subject, task, now);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let file =
            File::create(&path).with_context(|| format!("creating data file {}", path.display()))?;
        info!("Running {} into {}", task, path.display());
        self.controller.set_data_file(Box::new(BufWriter::new(file)));

        let outcome = self
            .frontend
            .runner
            .run(task, &mut self.controller, &self.settings);
        if let Err(err) = &outcome {
            error!("{} failed: {:#}", task, err);
        }
        if self.controller.is_tracking() {
            warn!("{} left tracking running; stopping it", task);
            self.controller.stop_tracking()?;
        }
        self.controller
            .close_data_file()
            .with_context(|| format!("closing data file {}", path.display()))?;
        self.last_data_file = Some(path);
        Ok(())
    }
}

/// Wait for discovery and activate the first tracker found.
pub fn connect_first(controller: &mut TrackerController) -> Result<String> {
    let devices = controller
        .wait_for_device()
        .context("waiting for an eye tracker")?;
    let id = devices
        .first()
        .map(|device| device.product_id.clone())
        .context("discovery returned no devices")?;
    controller
        .activate(&id)
        .with_context(|| format!("activating eye tracker {}", id))?;
    Ok(id)
}
