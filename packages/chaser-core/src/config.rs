//! Runtime configuration loading.
//!
//! The persisted state lives in three JSON files under the data directory:
//! `fixtures.json`, `environments.json`, `programs.json` — each an array of
//! the corresponding model objects. Editing and persistence of these files is
//! the editor's job; the core only reads them at startup.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::ConfigError;
use crate::model::{Environment, FixtureType, Program};

/// Fixture catalog file name.
pub const FIXTURES_FILE: &str = "fixtures.json";
/// Environments file name.
pub const ENVIRONMENTS_FILE: &str = "environments.json";
/// Programs file name.
pub const PROGRAMS_FILE: &str = "programs.json";

/// Parsed runtime configuration: catalog, environments, and programs.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Fixture type catalog.
    pub fixtures: Vec<FixtureType>,
    /// Environments.
    pub environments: Vec<Environment>,
    /// Programs, in file order.
    pub programs: Vec<Program>,
}

impl RuntimeConfig {
    /// Looks up a fixture type by id.
    #[must_use]
    pub fn fixture_type(&self, id: &str) -> Option<&FixtureType> {
        self.fixtures.iter().find(|f| f.id == id)
    }

    /// Looks up an environment by id.
    #[must_use]
    pub fn environment(&self, id: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.id == id)
    }

    /// Looks up a program by id.
    #[must_use]
    pub fn program(&self, id: &str) -> Option<&Program> {
        self.programs.iter().find(|p| p.id == id)
    }
}

/// Loads the three runtime config files from `data_dir`.
///
/// A missing file is treated as an empty collection (fresh install); anything
/// else — unreadable file, malformed JSON — is an error for the embedding
/// process to report. Fixture types violating catalog invariants are dropped
/// with a warning rather than failing the whole load.
pub fn load_runtime_config(data_dir: &Path) -> Result<RuntimeConfig, ConfigError> {
    let mut fixtures: Vec<FixtureType> = load_array(data_dir, FIXTURES_FILE)?;
    fixtures.retain(|ft| match ft.validate() {
        Ok(()) => true,
        Err(reason) => {
            log::warn!("[Config] Dropping invalid fixture type: {reason}");
            false
        }
    });

    let environments = load_array(data_dir, ENVIRONMENTS_FILE)?;
    let programs = load_array(data_dir, PROGRAMS_FILE)?;

    log::info!(
        "[Config] Loaded {} fixture type(s), {} environment(s), {} program(s) from {}",
        fixtures.len(),
        environments.len(),
        programs.len(),
        data_dir.display()
    );

    Ok(RuntimeConfig {
        fixtures,
        environments,
        programs,
    })
}

fn load_array<T: serde::de::DeserializeOwned>(
    data_dir: &Path,
    file: &'static str,
) -> Result<Vec<T>, ConfigError> {
    let path = data_dir.join(file);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log::warn!("[Config] {} not found, starting empty", path.display());
            return Ok(Vec::new());
        }
        Err(source) => return Err(ConfigError::Io { file, source }),
    };
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse { file, source })
}
