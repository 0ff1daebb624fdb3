//! Canonical PDF information record.
//!
//! [`PdfInfo`] is produced by an engine and is immutable once built. The
//! permission set reported by the engine is the source of truth; the eight
//! `can_*` booleans are a view that is re-derived on every construction:
//! all `true` for unencrypted files, set membership otherwise.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PdfOpsError, Result};
use crate::utils::format_file_size;

/// A permission from the fixed eight-word vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Print the document.
    Print,
    /// Modify contents.
    Modify,
    /// Copy text and graphics.
    Copy,
    /// Add or modify annotations.
    Annotate,
    /// Fill in form fields.
    Fill,
    /// Extract text and graphics for accessibility.
    Extract,
    /// Insert, rotate or delete pages.
    Assemble,
    /// Print at full resolution.
    PrintHigh,
}

impl Permission {
    /// All permissions in vocabulary order.
    pub const ALL: [Permission; 8] = [
        Self::Print,
        Self::Modify,
        Self::Copy,
        Self::Annotate,
        Self::Fill,
        Self::Extract,
        Self::Assemble,
        Self::PrintHigh,
    ];

    /// Vocabulary word for this permission.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Modify => "modify",
            Self::Copy => "copy",
            Self::Annotate => "annotate",
            Self::Fill => "fill",
            Self::Extract => "extract",
            Self::Assemble => "assemble",
            Self::PrintHigh => "print_high",
        }
    }
}

impl FromStr for Permission {
    type Err = PdfOpsError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();

        match normalized.as_str() {
            "print" => Ok(Self::Print),
            "modify" => Ok(Self::Modify),
            "copy" => Ok(Self::Copy),
            "annotate" => Ok(Self::Annotate),
            "fill" => Ok(Self::Fill),
            "extract" => Ok(Self::Extract),
            "assemble" => Ok(Self::Assemble),
            "printhigh" => Ok(Self::PrintHigh),
            _ => Err(PdfOpsError::invalid_input(format!("Unknown permission: {s}"))),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-text document information fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetadataField {
    /// Document title.
    Title,
    /// Document author.
    Author,
    /// Document subject.
    Subject,
    /// Creating application.
    Creator,
    /// Producing library.
    Producer,
    /// Keywords.
    Keywords,
    /// Trapping state.
    Trapped,
}

impl MetadataField {
    /// All fields, in display order.
    pub const ALL: [MetadataField; 7] = [
        Self::Title,
        Self::Author,
        Self::Subject,
        Self::Creator,
        Self::Producer,
        Self::Keywords,
        Self::Trapped,
    ];

    /// Key as it appears in a PDF info dictionary.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Author => "Author",
            Self::Subject => "Subject",
            Self::Creator => "Creator",
            Self::Producer => "Producer",
            Self::Keywords => "Keywords",
            Self::Trapped => "Trapped",
        }
    }

    /// Case-insensitive lookup.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(key.trim()))
    }
}

/// Ordered set of granted permissions.
pub type PermissionSet = BTreeSet<Permission>;

/// Derived boolean view of a [`PermissionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionFlags {
    pub can_print: bool,
    pub can_modify: bool,
    pub can_copy: bool,
    pub can_annotate: bool,
    pub can_fill: bool,
    pub can_extract: bool,
    pub can_assemble: bool,
    pub can_print_high: bool,
}

impl PermissionFlags {
    fn all(value: bool) -> Self {
        Self {
            can_print: value,
            can_modify: value,
            can_copy: value,
            can_annotate: value,
            can_fill: value,
            can_extract: value,
            can_assemble: value,
            can_print_high: value,
        }
    }

    fn derive(encrypted: bool, set: &PermissionSet) -> Self {
        if !encrypted {
            return Self::all(true);
        }
        Self {
            can_print: set.contains(&Permission::Print),
            can_modify: set.contains(&Permission::Modify),
            can_copy: set.contains(&Permission::Copy),
            can_annotate: set.contains(&Permission::Annotate),
            can_fill: set.contains(&Permission::Fill),
            can_extract: set.contains(&Permission::Extract),
            can_assemble: set.contains(&Permission::Assemble),
            can_print_high: set.contains(&Permission::PrintHigh),
        }
    }

    /// Flag for one permission.
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::Print => self.can_print,
            Permission::Modify => self.can_modify,
            Permission::Copy => self.can_copy,
            Permission::Annotate => self.can_annotate,
            Permission::Fill => self.can_fill,
            Permission::Extract => self.can_extract,
            Permission::Assemble => self.can_assemble,
            Permission::PrintHigh => self.can_print_high,
        }
    }
}

/// Canonical metadata for one PDF file.
///
/// Deserialising goes through [`PdfInfoBuilder`], so a stored `flags` value
/// is ignored and re-derived from the permission set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PdfInfoBuilder")]
pub struct PdfInfo {
    path: PathBuf,
    file_size: u64,
    page_count: usize,
    version: String,
    encrypted: bool,
    encryption_method: Option<String>,
    key_length: Option<u32>,
    has_user_password: bool,
    has_owner_password: bool,
    permissions: PermissionSet,
    flags: PermissionFlags,
    metadata: BTreeMap<MetadataField, String>,
}

impl PdfInfo {
    /// Start building a record for `path`.
    pub fn builder(path: impl Into<PathBuf>) -> PdfInfoBuilder {
        PdfInfoBuilder::new(path)
    }

    /// File the record describes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// PDF version string, e.g. "1.7".
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether the file is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Encryption method reported by the engine.
    pub fn encryption_method(&self) -> Option<&str> {
        self.encryption_method.as_deref()
    }

    /// Key length in bits.
    pub fn key_length(&self) -> Option<u32> {
        self.key_length
    }

    /// Whether a user (open) password is set.
    pub fn has_user_password(&self) -> bool {
        self.has_user_password
    }

    /// Whether an owner password is set.
    pub fn has_owner_password(&self) -> bool {
        self.has_owner_password
    }

    /// Granted permissions as reported by the engine.
    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Derived permission booleans.
    pub fn flags(&self) -> PermissionFlags {
        self.flags
    }

    /// Whether printing is allowed.
    pub fn can_print(&self) -> bool {
        self.flags.can_print
    }

    /// Whether modification is allowed.
    pub fn can_modify(&self) -> bool {
        self.flags.can_modify
    }

    /// Whether copying is allowed.
    pub fn can_copy(&self) -> bool {
        self.flags.can_copy
    }

    /// One metadata field.
    pub fn metadata(&self, field: MetadataField) -> Option<&str> {
        self.metadata.get(&field).map(String::as_str)
    }

    /// All populated metadata fields.
    pub fn metadata_fields(&self) -> &BTreeMap<MetadataField, String> {
        &self.metadata
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{}: {} page(s), PDF {}, {}",
            self.path.display(),
            self.page_count,
            if self.version.is_empty() { "?" } else { &self.version },
            format_file_size(self.file_size)
        );
        if self.encrypted {
            out.push_str(", encrypted");
            if let Some(method) = &self.encryption_method {
                out.push_str(&format!(" ({method}"));
                if let Some(bits) = self.key_length {
                    out.push_str(&format!(", {bits} bit"));
                }
                out.push(')');
            }
        }
        out
    }
}

/// Builder for [`PdfInfo`]. `build` derives the permission flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfInfoBuilder {
    path: PathBuf,
    #[serde(default)]
    file_size: u64,
    #[serde(default)]
    page_count: usize,
    #[serde(default)]
    version: String,
    #[serde(default)]
    encrypted: bool,
    #[serde(default)]
    encryption_method: Option<String>,
    #[serde(default)]
    key_length: Option<u32>,
    #[serde(default)]
    has_user_password: bool,
    #[serde(default)]
    has_owner_password: bool,
    #[serde(default)]
    permissions: PermissionSet,
    #[serde(default)]
    metadata: BTreeMap<MetadataField, String>,
}

impl From<PdfInfoBuilder> for PdfInfo {
    fn from(builder: PdfInfoBuilder) -> Self {
        builder.build()
    }
}

impl PdfInfoBuilder {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_size: 0,
            page_count: 0,
            version: String::new(),
            encrypted: false,
            encryption_method: None,
            key_length: None,
            has_user_password: false,
            has_owner_password: false,
            permissions: PermissionSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn file_size(mut self, size: u64) -> Self {
        self.file_size = size;
        self
    }

    pub fn page_count(mut self, pages: usize) -> Self {
        self.page_count = pages;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn encryption_method(mut self, method: impl Into<String>) -> Self {
        self.encryption_method = Some(method.into());
        self
    }

    pub fn key_length(mut self, bits: u32) -> Self {
        self.key_length = Some(bits);
        self
    }

    pub fn user_password(mut self, present: bool) -> Self {
        self.has_user_password = present;
        self
    }

    pub fn owner_password(mut self, present: bool) -> Self {
        self.has_owner_password = present;
        self
    }

    pub fn permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    pub fn permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    /// Set a metadata field. Blank values are ignored.
    pub fn metadata(mut self, field: MetadataField, value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.metadata.insert(field, trimmed.to_string());
        }
        self
    }

    /// Finish the record.
    pub fn build(self) -> PdfInfo {
        let flags = PermissionFlags::derive(self.encrypted, &self.permissions);
        PdfInfo {
            path: self.path,
            file_size: self.file_size,
            page_count: self.page_count,
            version: self.version,
            encrypted: self.encrypted,
            encryption_method: self.encryption_method,
            key_length: self.key_length,
            has_user_password: self.has_user_password,
            has_owner_password: self.has_owner_password,
            permissions: self.permissions,
            flags,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unencrypted_grants_everything() {
        let info = PdfInfo::builder("a.pdf").page_count(3).build();
        for permission in Permission::ALL {
            assert!(info.flags().allows(permission), "{permission}");
        }
        assert!(info.permissions().is_empty());
    }

    #[test]
    fn test_encrypted_flags_follow_set() {
        let info = PdfInfo::builder("a.pdf")
            .encrypted(true)
            .permissions([Permission::Print, Permission::PrintHigh])
            .build();

        assert!(info.can_print());
        assert!(!info.can_modify());
        assert!(!info.can_copy());
        for permission in Permission::ALL {
            assert_eq!(
                info.flags().allows(permission),
                info.permissions().contains(&permission)
            );
        }
    }

    #[test]
    fn test_permission_parsing() {
        assert_eq!("PRINT".parse::<Permission>().unwrap(), Permission::Print);
        assert_eq!("print_high".parse::<Permission>().unwrap(), Permission::PrintHigh);
        assert_eq!("print-high".parse::<Permission>().unwrap(), Permission::PrintHigh);
        assert!("teleport".parse::<Permission>().is_err());
    }

    #[test]
    fn test_metadata_ignores_blank_values() {
        let info = PdfInfo::builder("a.pdf")
            .metadata(MetadataField::Title, "  Report  ")
            .metadata(MetadataField::Author, "   ")
            .build();

        assert_eq!(info.metadata(MetadataField::Title), Some("Report"));
        assert_eq!(info.metadata(MetadataField::Author), None);
        assert_eq!(MetadataField::parse("keywords"), Some(MetadataField::Keywords));
    }

    #[test]
    fn test_summary() {
        let info = PdfInfo::builder("doc.pdf")
            .page_count(12)
            .version("1.7")
            .file_size(2048)
            .encrypted(true)
            .encryption_method("AES")
            .key_length(256)
            .build();

        let summary = info.summary();
        assert!(summary.contains("12 page(s)"));
        assert!(summary.contains("PDF 1.7"));
        assert!(summary.contains("2.00 KB"));
        assert!(summary.contains("AES, 256 bit"));
    }

    #[test]
    fn test_serde_roundtrip_keeps_flags() {
        let info = PdfInfo::builder("doc.pdf")
            .encrypted(true)
            .permission(Permission::Copy)
            .build();
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"pageCount\""));
        let back: PdfInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_deserialized_flags_follow_permission_set() {
        let info = PdfInfo::builder("locked.pdf").encrypted(true).build();
        let mut json: serde_json::Value = serde_json::to_value(&info).unwrap();
        json["flags"]["canPrint"] = serde_json::Value::Bool(true);
        json["flags"]["canCopy"] = serde_json::Value::Bool(true);

        let back: PdfInfo = serde_json::from_value(json).unwrap();

        assert!(back.is_encrypted());
        assert!(back.permissions().is_empty());
        assert!(!back.can_print());
        assert!(!back.can_copy());
        assert_eq!(back, info);
    }
}
