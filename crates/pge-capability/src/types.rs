//! Closed vocabularies for capability lookups
//!
//! [`Language`], [`MechanicalOperation`] and [`CapabilityLevel`] are all
//! closed enums so capability decisions are matched exhaustively at
//! compile time rather than compared against open string constants.

use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target languages the registry knows about
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    TypeScript,
    Go,
}

impl Language {
    /// Stable lowercase identifier used in registry documents
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::Go => "go",
        }
    }

    /// Detect language from a file path extension
    ///
    /// Returns `None` for unknown extensions; callers treat that as
    /// fail-closed.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "rs" => Some(Self::Rust),
            "py" => Some(Self::Python),
            "ts" | "tsx" => Some(Self::TypeScript),
            "go" => Some(Self::Go),
            _ => None,
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rust" => Ok(Self::Rust),
            "python" => Ok(Self::Python),
            "typescript" => Ok(Self::TypeScript),
            "go" => Ok(Self::Go),
            other => Err(UnknownName(other.to_string())),
        }
    }
}

/// Mechanical operations an executor may request
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MechanicalOperation {
    CreateFile,
    ApplyDiff,
    MoveFile,
    RenameSymbol,
    ExtractInterface,
}

impl MechanicalOperation {
    /// Stable snake_case identifier used in registry documents
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateFile => "create_file",
            Self::ApplyDiff => "apply_diff",
            Self::MoveFile => "move_file",
            Self::RenameSymbol => "rename_symbol",
            Self::ExtractInterface => "extract_interface",
        }
    }
}

impl Display for MechanicalOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MechanicalOperation {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create_file" => Ok(Self::CreateFile),
            "apply_diff" => Ok(Self::ApplyDiff),
            "move_file" => Ok(Self::MoveFile),
            "rename_symbol" => Ok(Self::RenameSymbol),
            "extract_interface" => Ok(Self::ExtractInterface),
            other => Err(UnknownName(other.to_string())),
        }
    }
}

/// Name outside the closed vocabulary
#[derive(Debug, thiserror::Error)]
#[error("unknown name: {0}")]
pub struct UnknownName(pub String);

/// Support level for a `(language, operation)` pair
///
/// Registry documents encode this as JSON `true`, `false` or the string
/// `"partial"`. `Partial` fails the strict check exactly like
/// `Unsupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityLevel {
    Supported,
    Unsupported,
    Partial,
}

impl CapabilityLevel {
    /// True only for an explicit `Supported` entry
    #[inline]
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        matches!(self, Self::Supported)
    }
}

impl Serialize for CapabilityLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Supported => serializer.serialize_bool(true),
            Self::Unsupported => serializer.serialize_bool(false),
            Self::Partial => serializer.serialize_str("partial"),
        }
    }
}

impl<'de> Deserialize<'de> for CapabilityLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct LevelVisitor;

        impl serde::de::Visitor<'_> for LevelVisitor {
            type Value = CapabilityLevel;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("true, false, or the string \"partial\"")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(if value {
                    CapabilityLevel::Supported
                } else {
                    CapabilityLevel::Unsupported
                })
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match value {
                    "partial" => Ok(CapabilityLevel::Partial),
                    other => Err(serde::de::Error::unknown_variant(
                        other,
                        &["true", "false", "partial"],
                    )),
                }
            }
        }

        deserializer.deserialize_any(LevelVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn language_from_path_known_extensions() {
        assert_eq!(Language::from_path(Path::new("src/lib.rs")), Some(Language::Rust));
        assert_eq!(Language::from_path(Path::new("app/main.py")), Some(Language::Python));
        assert_eq!(Language::from_path(Path::new("ui/app.tsx")), Some(Language::TypeScript));
        assert_eq!(Language::from_path(Path::new("pkg/server.go")), Some(Language::Go));
    }

    #[test]
    fn language_from_path_unknown_is_none() {
        assert_eq!(Language::from_path(Path::new("README.md")), None);
        assert_eq!(Language::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn language_display_and_parse_round_trip() {
        for lang in [Language::Rust, Language::Python, Language::TypeScript, Language::Go] {
            let parsed: Language = lang.as_str().parse().unwrap();
            assert_eq!(parsed, lang);
        }
    }

    #[test]
    fn operation_display_and_parse_round_trip() {
        let ops = [
            MechanicalOperation::CreateFile,
            MechanicalOperation::ApplyDiff,
            MechanicalOperation::MoveFile,
            MechanicalOperation::RenameSymbol,
            MechanicalOperation::ExtractInterface,
        ];
        for op in ops {
            let parsed: MechanicalOperation = op.as_str().parse().unwrap();
            assert_eq!(parsed, op);
        }
    }

    #[test]
    fn level_serde_bool_and_partial() {
        assert_eq!(serde_json::to_string(&CapabilityLevel::Supported).unwrap(), "true");
        assert_eq!(serde_json::to_string(&CapabilityLevel::Unsupported).unwrap(), "false");
        assert_eq!(serde_json::to_string(&CapabilityLevel::Partial).unwrap(), "\"partial\"");

        let level: CapabilityLevel = serde_json::from_str("\"partial\"").unwrap();
        assert_eq!(level, CapabilityLevel::Partial);
        let level: CapabilityLevel = serde_json::from_str("true").unwrap();
        assert_eq!(level, CapabilityLevel::Supported);
    }

    #[test]
    fn level_serde_rejects_other_strings() {
        let result: Result<CapabilityLevel, _> = serde_json::from_str("\"maybe\"");
        assert!(result.is_err());
    }

    #[test]
    fn partial_is_not_supported() {
        assert!(!CapabilityLevel::Partial.is_supported());
        assert!(!CapabilityLevel::Unsupported.is_supported());
        assert!(CapabilityLevel::Supported.is_supported());
    }
}
