//! Small but structurally real PDF documents for validation paths.

use lopdf::{Document, Object, dictionary};

/// Serialized document with `page_count` blank A4 pages.
pub fn pdf_with_pages(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..page_count)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            })
            .into()
        })
        .collect();
    let count = i64::try_from(kids.len()).unwrap_or(0);
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// A one-page document.
pub fn sample_pdf() -> Vec<u8> {
    pdf_with_pages(1)
}

/// An HTML landing page long enough to pass the size check.
pub fn html_landing_page() -> Vec<u8> {
    format!("<html><body>{}</body></html>", "Sign in to read. ".repeat(20)).into_bytes()
}
