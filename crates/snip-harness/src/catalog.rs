//! TOML example catalogs.
//!
//! A catalog is one TOML document with an `[[example]]` table per snippet.
//! A document that does not parse is fatal. Individual entries that fail
//! validation are rejected one by one and left out of the run.

use std::collections::HashSet;

use log::{debug, warn};
use serde::Deserialize;
use snip_types::ErrorKind;
use thiserror::Error;

use crate::example::{Example, MalformedExampleError};

/// The catalog compiled into the binary.
pub const BUILTIN: &str = include_str!("../catalog/builtin.toml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    example: Vec<RawExample>,
}

#[derive(Debug, Deserialize)]
struct RawExample {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    expected_output: Vec<String>,
    #[serde(default)]
    expected_error: Option<String>,
}

/// An entry that was refused at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// The entry's id, or `#<n>` (1-based position) when it has none.
    pub id: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error(transparent)]
    Malformed(#[from] MalformedExampleError),
    #[error("expected_error: {0}")]
    UnknownErrorKind(#[from] snip_types::UnknownErrorKind),
}

/// The accepted examples, in document order, plus what was rejected.
#[derive(Debug, Clone, Default)]
pub struct LoadedCatalog {
    pub examples: Vec<Example>,
    pub rejected: Vec<Rejected>,
}

impl LoadedCatalog {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Example> {
        self.examples.iter().find(|e| e.id() == id)
    }

    /// Examples whose id contains `filter`, or all of them.
    pub fn select(&self, filter: Option<&str>) -> Vec<&Example> {
        self.examples
            .iter()
            .filter(|e| filter.map_or(true, |f| e.id().contains(f)))
            .collect()
    }
}

pub struct Catalog;

impl Catalog {
    /// Parse and validate a catalog document.
    pub fn load(text: &str) -> Result<LoadedCatalog, CatalogError> {
        let file: CatalogFile = toml::from_str(text)?;
        let mut loaded = LoadedCatalog::default();
        let mut seen = HashSet::new();

        for (index, raw) in file.example.into_iter().enumerate() {
            let label = if raw.id.trim().is_empty() {
                format!("#{}", index + 1)
            } else {
                raw.id.clone()
            };
            match validate(raw, &mut seen) {
                Ok(example) => loaded.examples.push(example),
                Err(reason) => {
                    warn!("rejecting catalog entry {label}: {reason}");
                    loaded.rejected.push(Rejected { id: label, reason });
                }
            }
        }

        debug!(
            "catalog loaded: {} examples, {} rejected",
            loaded.examples.len(),
            loaded.rejected.len()
        );
        Ok(loaded)
    }

    pub fn builtin() -> Result<LoadedCatalog, CatalogError> {
        Self::load(BUILTIN)
    }
}

fn validate(raw: RawExample, seen: &mut HashSet<String>) -> Result<Example, RejectReason> {
    let expected_error = raw
        .expected_error
        .as_deref()
        .map(str::parse::<ErrorKind>)
        .transpose()?;
    let mut example = Example::new(raw.id, raw.source, raw.expected_output, expected_error)?;
    if let Some(title) = raw.title {
        example = example.with_title(title);
    }
    if !seen.insert(example.id().to_string()) {
        return Err(MalformedExampleError::DuplicateId(example.id().to_string()).into());
    }
    Ok(example)
}
