//! RegML - Versioned regulation changeset and diff engine.
//!
//! This crate models regulations as immutable, label-indexed document
//! trees and applies dated notices (changesets) to produce new versions,
//! sharing unaffected subtrees between versions. It also computes
//! structural diffs between versions and reconstructs the notice chain
//! for a regulation part.
//!
//! # Example
//!
//! ```
//! use regml::config;
//!
//! // Validate part numbers and notice document numbers
//! assert!(config::validate_part("1003").is_ok());
//! assert!(config::validate_document_number("2011-31712").is_ok());
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Data layout constants and input validation
//! - [`error`]: Error types and Result alias
//! - [`node`]: Tree nodes, markers, content fingerprints
//! - [`label`]: Derived label index and ordinal marker sequences
//! - [`tree`]: Immutable document tree snapshots and file I/O
//! - [`ops`]: Changeset operations
//! - [`notice`]: Notice model and file I/O
//! - [`changeset`]: Operation validation, conflict detection, ordering
//! - [`apply`]: Changeset application over a copy-on-write overlay
//! - [`diff`]: Structural diff and verification
//! - [`chain`]: Notice chain resolution
//! - [`validate`]: Structural validator
//! - [`terms`]: Unreferenced-term candidates
//! - [`convert`]: Agency XML conversion
//! - [`export`]: JSON export with pairwise diffs
//! - [`cli`]: Command-line interface

pub mod apply;
pub mod chain;
pub mod changeset;
pub mod cli;
pub mod config;
pub mod convert;
pub mod diff;
pub mod error;
pub mod export;
pub mod label;
pub mod node;
pub mod notice;
pub mod ops;
pub mod terms;
pub mod tree;
pub mod validate;

// Re-export main functions
pub use apply::{apply_notice, ApplyOutcome, Relabel};
pub use chain::{apply_chain, resolve_chain, resolve_chain_through};
pub use diff::{diff, verify, Change, ChangeKind};

// Re-export commonly used items
pub use error::{RegmlError, Result};
pub use node::{Marker, Node, NodeKind, NodeSpec};
pub use notice::{Notice, NoticeRef};
pub use ops::{OpKind, Operation, Position};
pub use tree::DocTree;
