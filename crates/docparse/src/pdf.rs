use std::path::Path;

use lopdf::Document;

use crate::error::DocParseError;

pub fn load(path: &Path) -> Result<Document, DocParseError> {
    Ok(Document::load(path)?)
}

/// Page count without uploading anything.
pub fn page_count(path: &Path) -> Result<u32, DocParseError> {
    let doc = Document::load(path)?;
    Ok(doc.get_pages().len() as u32)
}

/// Writes pages `start..=end` (1-based, inclusive) of `source` to `dest`,
/// preserving page order.
pub fn write_page_range(
    source: &Document,
    start: u32,
    end: u32,
    dest: &Path,
) -> Result<(), DocParseError> {
    let mut chunk = source.clone();
    let outside: Vec<u32> = chunk
        .get_pages()
        .keys()
        .copied()
        .filter(|page| *page < start || *page > end)
        .collect();
    chunk.delete_pages(&outside);
    chunk.save(dest)?;
    Ok(())
}
