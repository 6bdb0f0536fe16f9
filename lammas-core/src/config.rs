//! Configuration: embedded defaults merged with an optional user override.

use std::path::PathBuf;

use serde::Deserialize;

use lammas_types::Temperament;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    undo: UndoConfig,
    #[serde(default)]
    export: ExportConfig,
    #[serde(default)]
    defaults: DefaultsConfig,
    #[serde(default)]
    runtime: RuntimeConfig,
}

#[derive(Deserialize, Default)]
struct UndoConfig {
    max_units: Option<usize>,
}

#[derive(Deserialize, Default)]
struct ExportConfig {
    flat_tuplet_fade: Option<bool>,
}

#[derive(Deserialize, Default)]
struct DefaultsConfig {
    temperament: Option<String>,
}

#[derive(Deserialize, Default)]
struct RuntimeConfig {
    autosave: Option<bool>,
}

pub struct Config {
    undo: UndoConfig,
    export: ExportConfig,
    defaults: DefaultsConfig,
    runtime: RuntimeConfig,
}

impl Config {
    pub fn load() -> Self {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => merge(&mut base, user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Config {
            undo: base.undo,
            export: base.export,
            defaults: base.defaults,
            runtime: base.runtime,
        }
    }

    /// Total undo history budget, in action size units.
    pub fn undo_max_units(&self) -> usize {
        self.undo.max_units.unwrap_or(crate::undo::DEFAULT_MAX_UNITS)
    }

    /// When set, tuplet sub-events keep a flat velocity on export instead
    /// of the default fade.
    pub fn flat_tuplet_fade(&self) -> bool {
        self.export.flat_tuplet_fade.unwrap_or(false)
    }

    /// The temperament new projects start with.
    pub fn default_temperament(&self) -> Temperament {
        let wanted = self.defaults.temperament.as_deref().unwrap_or("12edo");
        Temperament::built_in()
            .into_iter()
            .find(|t| t.id() == wanted)
            .unwrap_or_default()
    }

    pub fn autosave_enabled(&self) -> bool {
        self.runtime.autosave.unwrap_or(true)
    }
}

impl Default for Config {
    fn default() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Config {
            undo: base.undo,
            export: base.export,
            defaults: base.defaults,
            runtime: base.runtime,
        }
    }
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    if user.undo.max_units.is_some() {
        base.undo.max_units = user.undo.max_units;
    }
    if user.export.flat_tuplet_fade.is_some() {
        base.export.flat_tuplet_fade = user.export.flat_tuplet_fade;
    }
    if user.defaults.temperament.is_some() {
        base.defaults.temperament = user.defaults.temperament;
    }
    if user.runtime.autosave.is_some() {
        base.runtime.autosave = user.runtime.autosave;
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lammas").join("config.toml"))
}
