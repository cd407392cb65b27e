//! Configuration manager for userstore.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_DATABASE_PATH: &str = "a.db";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Related to SQLite configuration.
    #[serde(default)]
    pub database: Database,
    #[serde(skip)]
    path: PathBuf,
}

/// SQLite configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    /// File holding the `users` table. `:memory:` keeps it in RAM.
    pub path: String,
    /// Drop and recreate the `users` table when the store opens.
    /// Destroys every existing record.
    pub reset_schema_on_start: bool,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            path: DEFAULT_DATABASE_PATH.to_owned(),
            reset_schema_on_start: false,
        }
    }
}

impl Database {
    /// Whether the database lives in memory instead of a file.
    pub fn in_memory(&self) -> bool {
        self.path == ":memory:" || self.path == "sqlite::memory:"
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    ///
    /// A missing or malformed file is logged and replaced by defaults.
    pub fn read(self) -> Self {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(&file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file) {
                Ok(config) => config.path(file_path),
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, path = %self.path.display(), "cannot read configuration file, using defaults");
        Self::default()
    }
}
