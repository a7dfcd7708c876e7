//! Stand-in task used when no stimulus frontend is attached: it records a
//! timed series of trial markers while gaze is being sampled.

use crate::menu::TaskKind;
use crate::orchestrator::TaskRunner;
use crate::settings::Settings;
use anyhow::Result;
use eyelab_lib::TrackerController;
use log::info;
use std::thread;
use std::time::Duration;

pub const CHANNEL_TASK: &str = "task";
pub const CHANNEL_TRIAL_ONSET: &str = "trial_onset";
pub const CHANNEL_TRIAL: &str = "trial";

#[derive(Debug, Clone)]
pub struct MarkerTask {
    pub trials: usize,
    pub trial_interval: Duration,
}

impl Default for MarkerTask {
    fn default() -> Self {
        Self {
            trials: 5,
            trial_interval: Duration::from_millis(100),
        }
    }
}

impl TaskRunner for MarkerTask {
    fn run(
        &mut self,
        task: TaskKind,
        tracker: &mut TrackerController,
        settings: &Settings,
    ) -> Result<()> {
        let interval = settings
            .get_f64("marker_interval_ms")
            .map(|ms| Duration::from_secs_f64(ms.max(0.0) / 1000.0))
            .unwrap_or(self.trial_interval);
        tracker.configure_channels([CHANNEL_TASK, CHANNEL_TRIAL_ONSET, CHANNEL_TRIAL]);
        tracker.start_tracking()?;
        tracker.set_param(CHANNEL_TASK, task.dir_name())?;
        for trial in 0..self.trials {
            tracker.record_event(CHANNEL_TRIAL_ONSET)?;
            tracker.append_param(CHANNEL_TRIAL, trial as i64 + 1)?;
            thread::sleep(interval);
        }
        let report = tracker.stop_tracking()?;
        info!("{}: {} trials recorded ({:?})", task, self.trials, report);
        Ok(())
    }
}
