//! Error types for the RegML engine.
//!
//! One crate-level error enum with enough context (operation index, label)
//! to localize a fault inside a notice, plus a `Result` alias.

use thiserror::Error;

/// Main error type for RegML operations.
#[derive(Debug, Error)]
pub enum RegmlError {
    /// A label does not exist in the tree's index.
    #[error("Label not found: {0}")]
    LabelNotFound(String),

    /// An operation's target label does not exist in the pre-rebuild tree.
    #[error("Operation {index} ({kind}): unresolved target '{label}'")]
    UnresolvedTarget {
        index: usize,
        kind: String,
        label: String,
    },

    /// A notice declares a prior version that does not match the input tree.
    #[error("Notice {document_number} applies to version {declared}, but the tree is at version {actual}")]
    VersionMismatch {
        document_number: String,
        declared: String,
        actual: String,
    },

    /// Applying an operation would leave the tree structurally inconsistent.
    #[error("Operation {index}: structural conflict at '{label}': {reason}")]
    StructuralConflict {
        index: usize,
        label: String,
        reason: String,
    },

    /// An operation is missing a field required for its kind.
    #[error("Operation {index} ({kind}) is malformed: {reason}")]
    MalformedOperation {
        index: usize,
        kind: String,
        reason: String,
    },

    /// Two operations in the same notice claim the same target or insertion
    /// point in conflicting ways.
    #[error("Operations {first} and {second} both claim '{label}'")]
    DuplicateTarget {
        first: usize,
        second: usize,
        label: String,
    },

    /// The version chain has a gap: no notice applies to the named version.
    #[error("Version chain broken: no notice applies to version {missing} (notice {next} declares prior version {declared})")]
    ChainBroken {
        missing: String,
        next: String,
        declared: String,
    },

    /// Applying a notice did not reproduce the expected target tree.
    #[error("Verification failed against {expected_version}: {count} discrepancies, first at '{first_label}'")]
    VerificationFailed {
        expected_version: String,
        count: usize,
        first_label: String,
    },

    /// A requested notice document number is not in the available set.
    #[error("Unknown notice: {0}")]
    UnknownNotice(String),

    /// Invalid CFR part number format.
    #[error("Invalid part number: '{0}'. Expected digits (e.g., 1003)")]
    InvalidPart(String),

    /// Invalid date format.
    #[error("Invalid date format: '{0}'. Expected YYYY-MM-DD (e.g., 2011-12-30)")]
    InvalidDate(String),

    /// Invalid notice document number format.
    #[error("Invalid document number: '{0}'")]
    InvalidDocumentNumber(String),

    /// XML parsing failed during source conversion.
    #[error("XML parsing failed: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// Missing required XML element during source conversion.
    #[error("Missing required XML element: {element} in {context}")]
    MissingElement { element: String, context: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for RegML operations.
pub type Result<T> = std::result::Result<T, RegmlError>;
