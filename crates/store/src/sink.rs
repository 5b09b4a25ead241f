use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::StoreError;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// Write a UTF-8 BOM when the file is created. Spreadsheet tools that
    /// consume these files downstream need it to pick the right encoding.
    pub bom: bool,
    /// Buffered rows are appended to disk once this many are pending.
    pub save_interval: usize,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            bom: true,
            save_interval: 10,
        }
    }
}

/// Append-only CSV sink with an in-memory buffer and a stable, keep-first
/// primary-key dedupe.
///
/// Headers are written once, when the file is created; appends after a
/// restart reuse the existing file headerless. Rows are positional and must
/// match the header arity.
pub struct TabularSink {
    path: PathBuf,
    columns: Vec<String>,
    options: SinkOptions,
    buffer: Vec<Vec<String>>,
}

impl TabularSink {
    /// Creates the sink file with headers, or reopens an existing one for
    /// appending.
    pub fn create(
        path: impl Into<PathBuf>,
        columns: Vec<String>,
        options: SinkOptions,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        if !path.exists() {
            let mut file = OpenOptions::new().create(true).write(true).open(&path)?;
            if options.bom {
                file.write_all(UTF8_BOM)?;
            }
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            writer.write_record(&columns)?;
            writer.flush()?;
        }
        Ok(Self {
            path,
            columns,
            options,
            buffer: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows_buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Buffers one row; spills to disk every `save_interval` rows.
    pub fn append(&mut self, row: Vec<String>) -> Result<(), StoreError> {
        if row.len() != self.columns.len() {
            return Err(StoreError::ArityMismatch {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.buffer.push(row);
        if self.buffer.len() >= self.options.save_interval {
            self.flush()?;
        }
        Ok(())
    }

    pub fn append_all<I>(&mut self, rows: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        for row in rows {
            self.append(row)?;
        }
        Ok(())
    }

    /// Appends all buffered rows to the file, headerless.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for row in self.buffer.drain(..) {
            writer.write_record(&row)?;
        }
        writer.flush()?;
        debug!(path = %self.path.display(), "sink buffer flushed");
        Ok(())
    }

    /// Reads the whole file back, drops duplicate rows by `column` keeping
    /// the first occurrence (stable), and rewrites atomically. Returns the
    /// number of rows removed.
    pub fn dedupe_by(&mut self, column: &str) -> Result<usize, StoreError> {
        self.flush()?;

        let key_index = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| StoreError::UnknownColumn(column.to_string()))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let mut seen: HashSet<String> = HashSet::new();
        let mut kept: Vec<csv::StringRecord> = Vec::new();
        let mut removed = 0usize;
        for record in reader.records() {
            let record = record?;
            let key = record.get(key_index).unwrap_or("").to_string();
            if seen.insert(key) {
                kept.push(record);
            } else {
                removed += 1;
            }
        }

        let parent = self.path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        if self.options.bom {
            tmp.write_all(UTF8_BOM)?;
        }
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&mut tmp);
            writer.write_record(&self.columns)?;
            for record in &kept {
                writer.write_record(record)?;
            }
            writer.flush()?;
        }
        tmp.persist(&self.path).map_err(|e| e.error)?;

        info!(
            path = %self.path.display(),
            kept = kept.len(),
            removed,
            key = column,
            "sink deduplicated"
        );
        Ok(removed)
    }

    /// Flushes any remaining buffered rows and consumes the sink.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink_in(dir: &std::path::Path, options: SinkOptions) -> TabularSink {
        TabularSink::create(
            dir.join("out.csv"),
            vec!["cert_no".into(), "name".into(), "issued".into()],
            options,
        )
        .unwrap()
    }

    fn read_lines(path: &std::path::Path) -> Vec<String> {
        let raw = std::fs::read(path).unwrap();
        let text = String::from_utf8(raw).unwrap();
        let text = text.trim_start_matches('\u{feff}');
        text.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_empty_sink_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_in(dir.path(), SinkOptions::default());
        let path = dir.path().join("out.csv");
        sink.close().unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines, vec!["cert_no,name,issued"]);
    }

    #[test]
    fn test_bom_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_in(dir.path(), SinkOptions::default());
        sink.append(vec!["1".into(), "가나다".into(), "2024".into()])
            .unwrap();
        sink.close().unwrap();

        let raw = std::fs::read(dir.path().join("out.csv")).unwrap();
        assert_eq!(&raw[..3], UTF8_BOM);
        // The BOM appears only at the start of the file.
        assert_eq!(
            raw.windows(3).filter(|w| *w == UTF8_BOM).count(),
            1,
            "BOM must not repeat on append"
        );
    }

    #[test]
    fn test_buffer_spills_at_save_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_in(
            dir.path(),
            SinkOptions {
                bom: false,
                save_interval: 2,
            },
        );
        sink.append(vec!["1".into(), "a".into(), "x".into()]).unwrap();
        assert_eq!(sink.rows_buffered(), 1);
        sink.append(vec!["2".into(), "b".into(), "y".into()]).unwrap();
        assert_eq!(sink.rows_buffered(), 0, "hit save_interval, spilled");

        let lines = read_lines(&dir.path().join("out.csv"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_in(dir.path(), SinkOptions {
            bom: true,
            save_interval: 100,
        });
        sink.append(vec!["C-1".into(), "first".into(), "2023".into()])
            .unwrap();
        sink.append(vec!["C-2".into(), "other".into(), "2023".into()])
            .unwrap();
        sink.append(vec!["C-1".into(), "second".into(), "2024".into()])
            .unwrap();

        let removed = sink.dedupe_by("cert_no").unwrap();
        assert_eq!(removed, 1);

        let lines = read_lines(&dir.path().join("out.csv"));
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("first"), "first occurrence wins: {}", lines[1]);
        assert!(lines[2].contains("other"));
    }

    #[test]
    fn test_dedupe_unknown_column_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_in(dir.path(), SinkOptions::default());
        let err = sink.dedupe_by("nope").unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn(_)));
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_in(dir.path(), SinkOptions::default());
        let err = sink.append(vec!["only-one".into()]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::ArityMismatch { expected: 3, got: 1 }
        ));
    }

    #[test]
    fn test_reopen_appends_without_second_header() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut sink = sink_in(dir.path(), SinkOptions::default());
            sink.append(vec!["1".into(), "a".into(), "x".into()]).unwrap();
            sink.close().unwrap();
        }
        {
            let mut sink = sink_in(dir.path(), SinkOptions::default());
            sink.append(vec!["2".into(), "b".into(), "y".into()]).unwrap();
            sink.close().unwrap();
        }
        let lines = read_lines(&dir.path().join("out.csv"));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "cert_no,name,issued");
        assert!(lines[1].starts_with('1'));
        assert!(lines[2].starts_with('2'));
    }
}
