//! League registry
//!
//! Maps league ids to display names. The text format is one league per
//! line, `Name: ID` (or `ID Name`), with `#` comments and blank lines
//! ignored. Malformed lines are logged and skipped.

use once_cell::sync::Lazy;
use std::path::Path;
use tracing::{debug, warn};

use crate::League;

/// Embedded registry data
const LEAGUES_TXT: &str = include_str!("leagues.txt");

/// Global registry instance (loaded once)
static REGISTRY: Lazy<LeagueRegistry> = Lazy::new(|| LeagueRegistry::parse(LEAGUES_TXT));

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// League file could not be read
    #[error("failed to read league file {path}: {message}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        message: String,
    },

    /// Lookup failed
    #[error("unknown league: {0}")]
    NotFound(String),
}

/// Ordered set of known leagues
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeagueRegistry {
    entries: Vec<League>,
}

impl LeagueRegistry {
    /// The embedded default registry.
    pub fn load() -> &'static Self {
        &REGISTRY
    }

    /// Owned copy of the embedded registry
    pub fn load_embedded() -> Self {
        REGISTRY.clone()
    }

    /// Read a registry file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::parse(&text))
    }

    /// Parse registry text. A repeated id keeps its first position and
    /// takes the later name.
    pub fn parse(text: &str) -> Self {
        let mut entries: Vec<League> = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(league) = parse_line(line) else {
                warn!(line = number + 1, content = line, "Invalid league entry");
                continue;
            };
            match entries.iter_mut().find(|l| l.id == league.id) {
                Some(existing) => existing.name = league.name,
                None => entries.push(league),
            }
        }
        debug!(leagues = entries.len(), "League registry loaded");
        Self { entries }
    }

    /// Leagues in file order.
    pub fn entries(&self) -> &[League] {
        &self.entries
    }

    /// Display name of a league id.
    pub fn name(&self, id: u64) -> Option<&str> {
        self.entries
            .iter()
            .find(|l| l.id == id)
            .map(|l| l.name.as_str())
    }

    /// Id of a league name, case-insensitive.
    pub fn id(&self, name: &str) -> Option<u64> {
        let name = name.trim();
        self.entries
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
            .map(|l| l.id)
    }

    /// Resolve a CLI argument that is either an id or a league name.
    pub fn resolve(&self, value: &str) -> Result<u64, RegistryError> {
        if let Ok(id) = value.trim().parse::<u64>() {
            return Ok(id);
        }
        self.id(value)
            .ok_or_else(|| RegistryError::NotFound(value.to_string()))
    }
}

fn parse_line(line: &str) -> Option<League> {
    let (name, id) = match line.split_once(':') {
        Some((name, id)) => (name.trim(), id.trim()),
        None => {
            let (id, name) = line.split_once(char::is_whitespace)?;
            (name.trim(), id.trim())
        }
    };
    if name.is_empty() {
        return None;
    }
    Some(League {
        id: id.parse().ok()?,
        name: name.to_string(),
    })
}
