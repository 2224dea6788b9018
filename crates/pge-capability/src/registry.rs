//! Capability registry with bundled defaults and project overrides

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;

use crate::types::{CapabilityLevel, Language, MechanicalOperation};

/// Two-level mapping `language -> operation -> level`
///
/// This is the exact shape of both the bundled default document and a
/// project-level override document.
pub type CapabilityDocument = BTreeMap<Language, BTreeMap<MechanicalOperation, CapabilityLevel>>;

/// Bundled default capability document
///
/// Shipped with the binary; a project override replaces individual
/// `(language, operation)` entries, never whole languages.
const DEFAULT_DOCUMENT: &str = include_str!("default_capabilities.json");

static BUNDLED: Lazy<CapabilityDocument> = Lazy::new(|| {
    serde_json::from_str(DEFAULT_DOCUMENT).expect("bundled capability document parses")
});

/// Errors raised while loading an override document
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Override file could not be read
    #[error("failed to read capability override {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Override file is not a valid capability document
    #[error("invalid capability override {path}: {message}")]
    InvalidDocument { path: String, message: String },
}

/// Strict, fail-closed capability lookup table
///
/// Constructed once at process start from the bundled default plus an
/// optional project override, then passed explicitly into each executor.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    table: CapabilityDocument,
}

impl CapabilityRegistry {
    /// Registry backed by the bundled default document only
    #[must_use]
    pub fn bundled() -> Self {
        Self {
            table: BUNDLED.clone(),
        }
    }

    /// Registry with a project override merged over the bundled default
    ///
    /// The merge is a two-level deep merge keyed by `(language,
    /// operation)`: the override's explicit entries replace the default's,
    /// and entries the override does not mention inherit from the default.
    #[must_use]
    pub fn with_override(overrides: CapabilityDocument) -> Self {
        let mut table = BUNDLED.clone();
        for (language, operations) in overrides {
            let entry = table.entry(language).or_default();
            for (operation, level) in operations {
                entry.insert(operation, level);
            }
        }
        Self { table }
    }

    /// Load an override document from a JSON or YAML file and merge it
    ///
    /// # Errors
    /// Returns [`CapabilityError`] if the file cannot be read or does not
    /// parse as a capability document.
    pub fn from_override_file(path: &Path) -> Result<Self, CapabilityError> {
        let text = std::fs::read_to_string(path).map_err(|source| CapabilityError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        let overrides: CapabilityDocument = if is_yaml {
            serde_yaml::from_str(&text).map_err(|e| CapabilityError::InvalidDocument {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            serde_json::from_str(&text).map_err(|e| CapabilityError::InvalidDocument {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        };

        Ok(Self::with_override(overrides))
    }

    /// Raw level for a `(language, operation)` pair, if any entry exists
    #[inline]
    #[must_use]
    pub fn level(
        &self,
        operation: MechanicalOperation,
        language: Language,
    ) -> Option<CapabilityLevel> {
        self.table.get(&language)?.get(&operation).copied()
    }

    /// Strict check: true only for an explicit `Supported` entry
    ///
    /// Missing language, missing operation and `partial` all fail.
    #[inline]
    #[must_use]
    pub fn check(&self, operation: MechanicalOperation, language: Language) -> bool {
        self.level(operation, language)
            .is_some_and(|level| level.is_supported())
    }

    /// Every operation in `operations` that fails the strict check
    ///
    /// Executors call this before any mutation so a mixed
    /// supported/unsupported operation set fails as a whole.
    #[must_use]
    pub fn unsupported(
        &self,
        operations: &[MechanicalOperation],
        language: Language,
    ) -> Vec<MechanicalOperation> {
        operations
            .iter()
            .copied()
            .filter(|op| !self.check(*op, language))
            .collect()
    }

    /// Languages with at least one entry
    #[must_use]
    pub fn languages(&self) -> Vec<Language> {
        self.table.keys().copied().collect()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::bundled()
    }
}
