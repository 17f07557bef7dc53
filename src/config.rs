//! Per-venue settings store.
//!
//! Venues read and write their credentials and bookkeeping values
//! (`apikey`, `apisecret`, `lastnonce`) through a generic get/set-by-key
//! contract, keyed by venue name. The store is shared between a venue
//! adapter and its trading session, so access is internally synchronized.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::RwLock;

use crate::error::{Error, Result};

type Sections = BTreeMap<String, BTreeMap<String, String>>;

/// Thread-safe key/value settings, one section per venue, TOML on disk.
///
/// Absent keys are not an error: a venue without credentials simply
/// degrades to market data only.
#[derive(Debug, Default)]
pub struct Settings {
    sections: RwLock<Sections>,
}

impl Settings {
    /// Create an empty in-memory settings store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file.
    ///
    /// Scalar values of any TOML type are accepted and normalized to
    /// strings; nested tables below the venue level are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read settings file: {e}")))?;

        let table: toml::Table = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse settings: {e}")))?;

        let mut sections = Sections::new();
        for (venue, value) in table {
            let toml::Value::Table(entries) = value else {
                return Err(Error::Config(format!(
                    "expected a table for venue '{venue}'"
                )));
            };
            let section = sections.entry(venue.clone()).or_default();
            for (key, value) in entries {
                let rendered = match value {
                    toml::Value::String(s) => s,
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    other => {
                        return Err(Error::Config(format!(
                            "unsupported value for {venue}.{key}: {other}"
                        )))
                    }
                };
                section.insert(key, rendered);
            }
        }

        Ok(Self {
            sections: RwLock::new(sections),
        })
    }

    /// Write the current settings to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on serialization or I/O failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let rendered = toml::to_string(&*self.sections.read())
            .map_err(|e| Error::Config(format!("failed to serialize settings: {e}")))?;
        std::fs::write(path, rendered)
            .map_err(|e| Error::Config(format!("failed to write settings file: {e}")))
    }

    /// Look up a value for a venue.
    #[must_use]
    pub fn get(&self, venue: &str, key: &str) -> Option<String> {
        self.sections.read().get(venue)?.get(key).cloned()
    }

    /// Look up an integer value for a venue. Non-numeric values read as absent.
    #[must_use]
    pub fn get_i64(&self, venue: &str, key: &str) -> Option<i64> {
        self.get(venue, key)?.parse().ok()
    }

    /// Store a value for a venue, creating the venue section if needed.
    pub fn set(&self, venue: &str, key: &str, value: &str) {
        self.sections
            .write()
            .entry(venue.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }
}
