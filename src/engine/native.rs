//! In-process engine backend built on `lopdf`.
//!
//! Every call loads the document from disk, does its work on a blocking
//! thread and writes results atomically (temporary sibling, then rename).

use async_trait::async_trait;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::PdfEngine;
use crate::error::{ErrorKind, PdfOpsError, Result};
use crate::info::{MetadataField, PdfInfo, PdfInfoBuilder, Permission};

const LOPDF_VERSION: &str = "0.38";

/// `/P` bit for each permission (PDF 32000-1, table 22).
const PERMISSION_BITS: [(Permission, i64); 8] = [
    (Permission::Print, 1 << 2),
    (Permission::Modify, 1 << 3),
    (Permission::Copy, 1 << 4),
    (Permission::Annotate, 1 << 5),
    (Permission::Fill, 1 << 8),
    (Permission::Extract, 1 << 9),
    (Permission::Assemble, 1 << 10),
    (Permission::PrintHigh, 1 << 11),
];

/// Engine backed by the `lopdf` library.
#[derive(Debug, Default)]
pub struct NativeEngine {
    lock: Mutex<()>,
}

impl NativeEngine {
    /// Create a new in-process engine.
    pub fn new() -> Self {
        Self::default()
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.lock.lock().await;
        tokio::task::spawn_blocking(work).await.map_err(|e| {
            PdfOpsError::processing(format!("engine task failed: {e}")).with_source(e)
        })?
    }
}

#[async_trait]
impl PdfEngine for NativeEngine {
    fn name(&self) -> &str {
        "lopdf"
    }

    async fn version(&self) -> Result<String> {
        Ok(format!("lopdf {LOPDF_VERSION}"))
    }

    async fn validate(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        self.blocking(move || {
            let doc = load(&path)?;
            if doc.get_pages().is_empty() {
                return Err(PdfOpsError::corrupted("document has no pages").with_path(&path));
            }
            Ok(())
        })
        .await
    }

    async fn info(&self, path: &Path) -> Result<PdfInfo> {
        let path = path.to_path_buf();
        self.blocking(move || read_info(&path)).await
    }

    async fn is_encrypted(&self, path: &Path) -> Result<bool> {
        let path = path.to_path_buf();
        self.blocking(move || match load(&path) {
            Ok(doc) => Ok(doc.is_encrypted() || doc.trailer.get(b"Encrypt").is_ok()),
            Err(err) if err.kind() == ErrorKind::Encrypted => Ok(true),
            Err(err) => Err(err),
        })
        .await
    }

    async fn decrypt(&self, src: &Path, dst: &Path, password: &str) -> Result<()> {
        let src = src.to_path_buf();
        let dst = dst.to_path_buf();
        let password = password.to_string();
        self.blocking(move || {
            let mut doc = load(&src)?;
            if doc.is_encrypted() {
                doc.decrypt(password.as_str()).map_err(|e| {
                    PdfOpsError::encrypted(format!("incorrect password: {e}"))
                        .with_path(&src)
                        .with_source(e)
                })?;
            }
            doc.trailer.remove(b"Encrypt");
            save_atomic(&mut doc, &dst)
        })
        .await
    }

    async fn merge(&self, inputs: &[PathBuf], dst: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(PdfOpsError::invalid_file("no files to merge"));
        }
        let inputs = inputs.to_vec();
        let dst = dst.to_path_buf();
        self.blocking(move || {
            let mut merged = merge_documents(&inputs)?;
            save_atomic(&mut merged, &dst)
        })
        .await
    }
}

fn load(path: &Path) -> Result<Document> {
    let metadata = std::fs::metadata(path).map_err(|e| PdfOpsError::from(e).with_path(path))?;
    if !metadata.is_file() {
        return Err(PdfOpsError::invalid_file("not a file").with_path(path));
    }
    if metadata.len() == 0 {
        return Err(PdfOpsError::corrupted("file is empty").with_path(path));
    }
    Document::load(path).map_err(|e| PdfOpsError::from(e).with_path(path))
}

fn read_info(path: &Path) -> Result<PdfInfo> {
    let file_size = std::fs::metadata(path)
        .map_err(|e| PdfOpsError::from(e).with_path(path))?
        .len();

    let doc = match load(path) {
        Ok(doc) => doc,
        // The structure is unreadable without the user password; report what
        // is known instead of failing.
        Err(err) if err.kind() == ErrorKind::Encrypted => {
            return Ok(PdfInfo::builder(path)
                .file_size(file_size)
                .encrypted(true)
                .user_password(true)
                .owner_password(true)
                .build());
        }
        Err(err) => return Err(err),
    };

    let mut builder = PdfInfo::builder(path)
        .file_size(file_size)
        .page_count(doc.get_pages().len())
        .version(doc.version.clone());

    if let Some(encrypt) = resolve_dict(&doc, doc.trailer.get(b"Encrypt").ok()) {
        builder = apply_encryption(builder, &doc, encrypt);
    } else if doc.is_encrypted() {
        builder = builder.encrypted(true).owner_password(true);
    }

    if let Some(info) = resolve_dict(&doc, doc.trailer.get(b"Info").ok()) {
        for field in MetadataField::ALL {
            if let Ok(value) = info.get(field.as_str().as_bytes()) {
                if let Some(text) = text_value(value) {
                    builder = builder.metadata(field, text);
                }
            }
        }
    }

    Ok(builder.build())
}

fn apply_encryption(builder: PdfInfoBuilder, doc: &Document, encrypt: &Dictionary) -> PdfInfoBuilder {
    let integer = |key: &[u8]| match encrypt.get(key) {
        Ok(Object::Integer(value)) => Some(*value),
        _ => None,
    };

    let revision = integer(b"V").unwrap_or(0);
    let uses_aes = revision >= 5 || encrypt_uses_aes(encrypt);
    let method = if uses_aes { "AES" } else { "RC4" };
    let key_length = match integer(b"Length") {
        Some(bits) if bits > 0 => bits as u32,
        _ if revision >= 5 => 256,
        _ if uses_aes => 128,
        _ => 40,
    };

    let granted = integer(b"P").unwrap_or(0);
    let permissions = PERMISSION_BITS
        .iter()
        .filter(|(_, bit)| granted & bit != 0)
        .map(|(permission, _)| *permission);

    // A document that opens with the empty password has no user password.
    let mut probe = doc.clone();
    let user_password = probe.decrypt("").is_err();

    builder
        .encrypted(true)
        .encryption_method(method)
        .key_length(key_length)
        .owner_password(true)
        .user_password(user_password)
        .permissions(permissions)
}

fn encrypt_uses_aes(encrypt: &Dictionary) -> bool {
    let Ok(Object::Dictionary(filters)) = encrypt.get(b"CF") else {
        return false;
    };
    filters.iter().any(|(_, filter)| match filter {
        Object::Dictionary(filter) => matches!(
            filter.get(b"CFM"),
            Ok(Object::Name(name)) if name.starts_with(b"AES")
        ),
        _ => false,
    })
}

fn resolve_dict<'a>(doc: &'a Document, object: Option<&'a Object>) -> Option<&'a Dictionary> {
    match object? {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        _ => None,
    }
}

fn text_value(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Object::Boolean(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with a byte-order mark, otherwise
/// single-byte.
fn decode_text(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(rest) => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Concatenate documents in order, splicing each page tree into the first.
fn merge_documents(paths: &[PathBuf]) -> Result<Document> {
    let mut merged = load(&paths[0])?;
    if paths.len() == 1 {
        return Ok(merged);
    }

    let pages_id = pages_root(&merged).map_err(|e| e.with_path(&paths[0]))?;
    let mut max_id = merged.max_id;

    for path in &paths[1..] {
        let mut doc = load(path)?;

        // Shift object ids past everything already in the output.
        doc.renumber_objects_with(max_id + 1);
        max_id = doc.max_id;

        let doc_pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        debug!(file = %path.display(), pages = doc_pages.len(), "splicing document");
        merged.objects.extend(doc.objects);

        for page_id in &doc_pages {
            if let Ok(Object::Dictionary(page)) = merged.get_object_mut(*page_id) {
                page.set("Parent", Object::Reference(pages_id));
            }
        }

        if let Ok(Object::Dictionary(pages)) = merged.get_object_mut(pages_id) {
            if let Ok(Object::Array(kids)) = pages.get_mut(b"Kids") {
                kids.extend(doc_pages.iter().map(|id| Object::Reference(*id)));
            }
            let count = match pages.get(b"Count") {
                Ok(Object::Integer(count)) => *count,
                _ => 0,
            };
            pages.set("Count", Object::Integer(count + doc_pages.len() as i64));
        }
    }

    merged.max_id = max_id;
    merged.renumber_objects();
    merged.compress();
    Ok(merged)
}

fn pages_root(doc: &Document) -> Result<ObjectId> {
    doc.catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| PdfOpsError::corrupted(format!("missing page tree: {e}")))
}

fn save_atomic(doc: &mut Document, dst: &Path) -> Result<()> {
    let mut partial = OsString::from(dst.as_os_str());
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let write = |doc: &mut Document| -> Result<()> {
        let file = File::create(&partial).map_err(|e| PdfOpsError::from(e).with_path(dst))?;
        let mut writer = BufWriter::new(file);
        doc.save_to(&mut writer)
            .map_err(|e| PdfOpsError::io(format!("failed to write PDF: {e}")).with_path(dst))?;
        writer
            .flush()
            .map_err(|e| PdfOpsError::from(e).with_path(dst))
    };

    if let Err(err) = write(doc) {
        let _ = std::fs::remove_file(&partial);
        return Err(err);
    }

    std::fs::rename(&partial, dst).map_err(|e| {
        let _ = std::fs::remove_file(&partial);
        PdfOpsError::from(e).with_path(dst)
    })
}
