//! Configuration constants and validation functions for the RegML engine.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{RegmlError, Result};

/// Default data root for regulation and notice files.
pub const DEFAULT_DATA_ROOT: &str = "data";

/// Subdirectory holding regulation version files, one directory per part.
pub const REGULATION_DIR: &str = "regulation";

/// Subdirectory holding notice files, one directory per part.
pub const NOTICE_DIR: &str = "notice";

/// Part number pattern: 2-4 digits (e.g., 1003).
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PART_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2,4}$").expect("valid regex"));

/// Date pattern: YYYY-MM-DD.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));

/// Document number pattern: Federal Register style, e.g. 2011-31712,
/// optionally with a consolidation suffix (2013-22752_20140110).
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DOCUMENT_NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d+(_\d{8})?$").expect("valid regex"));

/// Validate a CFR part number.
///
/// # Examples
/// ```
/// use regml::config::validate_part;
///
/// assert!(validate_part("1003").is_ok());
/// assert!(validate_part("abc").is_err());
/// ```
pub fn validate_part(part: &str) -> Result<()> {
    if PART_PATTERN.is_match(part) {
        Ok(())
    } else {
        Err(RegmlError::InvalidPart(part.to_string()))
    }
}

/// Validate date format (YYYY-MM-DD) and that it is a real date.
///
/// # Examples
/// ```
/// use regml::config::validate_date;
///
/// assert!(validate_date("2011-12-30").is_ok());
/// assert!(validate_date("2011-13-01").is_err()); // Invalid month
/// assert!(validate_date("invalid").is_err());
/// ```
pub fn validate_date(date_str: &str) -> Result<()> {
    if !DATE_PATTERN.is_match(date_str) {
        return Err(RegmlError::InvalidDate(date_str.to_string()));
    }

    chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| RegmlError::InvalidDate(date_str.to_string()))?;

    Ok(())
}

/// Validate a Federal Register document number.
pub fn validate_document_number(document_number: &str) -> Result<()> {
    if DOCUMENT_NUMBER_PATTERN.is_match(document_number) {
        Ok(())
    } else {
        Err(RegmlError::InvalidDocumentNumber(
            document_number.to_string(),
        ))
    }
}

/// Directory holding regulation version files for a part.
#[must_use]
pub fn regulation_dir(data_root: &Path, part: &str) -> PathBuf {
    data_root.join(REGULATION_DIR).join(part)
}

/// Directory holding notice files for a part.
#[must_use]
pub fn notice_dir(data_root: &Path, part: &str) -> PathBuf {
    data_root.join(NOTICE_DIR).join(part)
}
