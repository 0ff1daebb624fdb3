//! Deterministic synthetic PDFs.
//!
//! The documents are built object by object with a fixed layout and no
//! timestamps, so two calls with the same arguments produce identical bytes.
//! Integration tests, the merge bench and the `compare` subcommand use them
//! as engine input.

use lopdf::{Document, Object, Stream, StringFormat, dictionary};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{PdfOpsError, Result};

/// Write an A4 document with `pages` blank pages to `path`.
pub fn write_pdf(path: &Path, pages: u32) -> Result<()> {
    write_pdf_with_info(path, pages, None, None)
}

/// Write a document like [`write_pdf`], with an optional info dictionary.
pub fn write_pdf_with_info(
    path: &Path,
    pages: u32,
    title: Option<&str>,
    author: Option<&str>,
) -> Result<()> {
    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut doc = build_document(&label, pages);

    if title.is_some() || author.is_some() {
        let mut info = lopdf::Dictionary::new();
        if let Some(title) = title {
            info.set(
                "Title",
                Object::String(title.as_bytes().to_vec(), StringFormat::Literal),
            );
        }
        if let Some(author) = author {
            info.set(
                "Author",
                Object::String(author.as_bytes().to_vec(), StringFormat::Literal),
            );
        }
        info.set(
            "Producer",
            Object::String(b"pdfops fixtures".to_vec(), StringFormat::Literal),
        );
        let info_id = doc.add_object(Object::Dictionary(info));
        doc.trailer.set("Info", Object::Reference(info_id));
    }

    let file = File::create(path).map_err(|e| PdfOpsError::from(e).with_path(path))?;
    let mut writer = BufWriter::new(file);
    doc.save_to(&mut writer)
        .map_err(|e| PdfOpsError::io(format!("failed to write fixture: {e}")).with_path(path))?;
    writer
        .flush()
        .map_err(|e| PdfOpsError::from(e).with_path(path))?;
    Ok(())
}

/// Write `count` documents named `input_000.pdf`, `input_001.pdf`, ... into
/// `dir`, each with `pages` pages. Returns their paths in order.
pub fn synthetic_set(dir: &Path, count: usize, pages: u32) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| PdfOpsError::from(e).with_path(dir))?;

    (0..count)
        .map(|i| {
            let path = dir.join(format!("input_{i:03}.pdf"));
            write_pdf(&path, pages)?;
            Ok(path)
        })
        .collect()
}

fn build_document(label: &str, pages: u32) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let resources_id = doc.add_object(dictionary! {
        "ProcSet" => vec![Object::Name(b"PDF".to_vec())],
    });

    let mut kids = Vec::with_capacity(pages as usize);
    for n in 1..=pages {
        // A comment is a valid content stream and keeps pages distinguishable.
        let content = format!("% {label} page {n}\n").into_bytes();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc
}
