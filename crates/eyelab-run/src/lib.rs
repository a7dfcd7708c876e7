pub mod config;
pub mod marker;
pub mod menu;
pub mod orchestrator;
pub mod settings;

pub use config::{load_session_config, read_session_config};
pub use marker::MarkerTask;
pub use menu::{menu_lines, Action, TaskKind};
pub use orchestrator::{
    connect_first, data_file_path, ActionSource, Frontend, Orchestrator, PresetEdits,
    ScriptedActions, Selection, SettingsEditor, TaskRunner,
};
pub use settings::{Settings, SettingsMap};
