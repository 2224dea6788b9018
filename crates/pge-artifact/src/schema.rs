//! Per-kind payload schema validation
//!
//! Each artifact kind carries a bundled JSON Schema. Payloads are opaque
//! [`serde_json::Value`]s everywhere else; this module is the only place
//! that looks inside them, and only to check shape, never semantics.

use std::collections::BTreeMap;

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;

use crate::envelope::ArtifactKind;

const SCHEMA_DOCUMENT: &str = include_str!("payload_schemas.json");

static SCHEMAS: Lazy<BTreeMap<ArtifactKind, serde_json::Value>> = Lazy::new(|| {
    let by_slug: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(SCHEMA_DOCUMENT).expect("bundled payload schemas parse");
    ArtifactKind::all()
        .into_iter()
        .map(|kind| {
            let schema = by_slug
                .get(kind.slug())
                .cloned()
                .expect("bundled schema exists for every kind");
            (kind, schema)
        })
        .collect()
});

/// Payload failed schema validation
#[derive(Debug, thiserror::Error)]
#[error("payload for {kind} violates schema: {}", violations.join("; "))]
pub struct SchemaError {
    /// The kind whose schema was violated
    pub kind: ArtifactKind,
    /// One message per violation, in schema order
    pub violations: Vec<String>,
}

/// Validate a payload against its kind's bundled schema
///
/// # Errors
/// Returns [`SchemaError`] listing every violation.
pub fn validate_payload(
    kind: ArtifactKind,
    payload: &serde_json::Value,
) -> Result<(), SchemaError> {
    let schema = &SCHEMAS[&kind];
    let compiled = JSONSchema::compile(schema).map_err(|e| SchemaError {
        kind,
        violations: vec![e.to_string()],
    })?;

    if let Err(errors) = compiled.validate(payload) {
        let violations: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(SchemaError { kind, violations });
    }
    Ok(())
}
