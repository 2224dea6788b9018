//! PGE Capability Registry
//!
//! Static lookup of which mechanical operations (move file, rename symbol,
//! ...) are permitted per target language. A bundled default table is
//! merged with an optional project-level override; the override's explicit
//! entries win, missing entries inherit from the default.
//!
//! Checks are strict and fail-closed: only an explicit [`CapabilityLevel::
//! Supported`] entry passes. Unknown languages, unknown operations and
//! `partial` entries all fail.
//!
//! # Example
//!
//! ```rust,ignore
//! use pge_capability::{CapabilityRegistry, Language, MechanicalOperation};
//!
//! let registry = CapabilityRegistry::bundled();
//! assert!(registry.check(MechanicalOperation::MoveFile, Language::Python));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod registry;
mod types;

pub use registry::{CapabilityDocument, CapabilityError, CapabilityRegistry};
pub use types::{CapabilityLevel, Language, MechanicalOperation, UnknownName};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
