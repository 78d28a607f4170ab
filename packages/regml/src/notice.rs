//! Notice model: a dated, ordered changeset transforming one regulation
//! version into the next.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ops::Operation;

/// A notice file: preamble metadata plus its operations in authoring order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    /// Federal Register document number; becomes the resulting version.
    pub document_number: String,
    pub effective_date: NaiveDate,
    /// Version identifier of the tree this notice must be applied to.
    pub applies_to_version: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Notice {
    /// Load a notice file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write the notice file to disk as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// The listing tuple for this notice.
    #[must_use]
    pub fn to_ref(&self) -> NoticeRef {
        NoticeRef {
            document_number: self.document_number.clone(),
            effective_date: self.effective_date,
            applies_to_version: self.applies_to_version.clone(),
        }
    }
}

/// Listing tuple as returned by a notice listing source:
/// `(document_number, effective_date, appliesToVersion)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeRef {
    pub document_number: String,
    pub effective_date: NaiveDate,
    pub applies_to_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_notice_deserialization() {
        let notice: Notice = serde_json::from_str(
            r#"{
                "documentNumber": "2012-1728",
                "effectiveDate": "2012-03-01",
                "appliesToVersion": "2011-31712",
                "operations": [
                    {"kind": "delete", "targetLabel": "1003-2-a"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(notice.document_number, "2012-1728");
        assert_eq!(notice.applies_to_version, "2011-31712");
        assert_eq!(notice.operations.len(), 1);
    }

    #[test]
    fn test_empty_operations_default() {
        let notice: Notice = serde_json::from_str(
            r#"{
                "documentNumber": "2012-1728",
                "effectiveDate": "2012-03-01",
                "appliesToVersion": "2011-31712"
            }"#,
        )
        .unwrap();
        assert!(notice.operations.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2012-1728.json");
        let notice: Notice = serde_json::from_str(
            r#"{
                "documentNumber": "2012-1728",
                "effectiveDate": "2012-03-01",
                "appliesToVersion": "2011-31712"
            }"#,
        )
        .unwrap();
        notice.save(&path).unwrap();
        let reloaded = Notice::load(&path).unwrap();
        assert_eq!(reloaded.to_ref(), notice.to_ref());
    }
}
