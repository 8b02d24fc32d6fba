//! Row normalization: rewrite a delimited file so every line carries exactly
//! `column_count - 1` delimiters.
//!
//! BULK INSERT rejects whole batches over a single short or long row, so the
//! normalizer repairs rather than rejects: short rows gain trailing empty
//! fields, long rows keep their first `column_count` parsed fields. Splitting
//! is a plain single-byte delimiter split with no quoting support; a quoted
//! field containing the delimiter will be mis-split (documented limitation).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use tempfile::NamedTempFile;

use crate::error::ImportError;

const PROGRESS_EVERY: u64 = 10_000;

/// Scratch rewrite of the input file. The file on disk is deleted when this
/// handle drops, on success and failure paths alike.
#[derive(Debug)]
pub struct NormalizedFile {
    scratch: NamedTempFile,
    line_count: u64,
}

impl NormalizedFile {
    pub fn path(&self) -> &Path {
        self.scratch.path()
    }

    /// Data lines written (header excluded when skipped).
    pub fn line_count(&self) -> u64 {
        self.line_count
    }
}

/// Rewrites `source` into a scratch file whose every line has exactly
/// `column_count - 1` delimiter occurrences and a single `\n` terminator.
///
/// When `skip_header` is set the first line is dropped: not counted, not
/// written. Never fails on malformed data; only on unreadable input or an
/// uncreatable scratch file.
pub fn normalize(
    source: &Path,
    column_count: usize,
    delimiter: u8,
    skip_header: bool,
) -> Result<NormalizedFile, ImportError> {
    let input = File::open(source)?;
    let mut reader = BufReader::new(input);
    let mut scratch = tempfile::Builder::new()
        .prefix("sql-import-")
        .suffix(".csv")
        .tempfile()?;

    info!("Normalizing '{}' to {} column(s)", source.display(), column_count);

    let mut lines_written = 0u64;
    {
        let mut writer = BufWriter::new(scratch.as_file_mut());
        let mut raw = Vec::new();
        let mut first_line = true;
        loop {
            raw.clear();
            if reader.read_until(b'\n', &mut raw)? == 0 {
                break;
            }
            trim_line_terminator(&mut raw);
            if first_line {
                first_line = false;
                if skip_header {
                    info!("Skipping header row");
                    continue;
                }
            }
            let repaired = repair_line(&raw, column_count, delimiter)?;
            writer.write_all(&repaired)?;
            writer.write_all(b"\n")?;
            lines_written += 1;
            if lines_written % PROGRESS_EVERY == 0 {
                info!("Processed {lines_written} line(s)...");
            }
        }
        writer.flush()?;
    }

    info!(
        "Wrote {} normalized line(s) to {:?}",
        lines_written,
        scratch.path()
    );
    Ok(NormalizedFile {
        scratch,
        line_count: lines_written,
    })
}

fn trim_line_terminator(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}

/// Repairs one terminator-free line to exactly `column_count - 1` delimiters.
fn repair_line(line: &[u8], column_count: usize, delimiter: u8) -> Result<Vec<u8>, ImportError> {
    let expected = column_count.saturating_sub(1);
    let found = line.iter().filter(|&&byte| byte == delimiter).count();

    if found == expected {
        return Ok(line.to_vec());
    }

    if found < expected {
        let mut padded = line.to_vec();
        padded.extend(std::iter::repeat_n(delimiter, expected - found));
        return Ok(padded);
    }

    // Too many delimiters: re-parse and keep the first `column_count` fields.
    // Positions past the parsed field count become empty fields.
    let mut parser = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(line);
    let mut record = csv::ByteRecord::new();
    parser.read_byte_record(&mut record)?;

    let mut rebuilt = Vec::with_capacity(line.len());
    for index in 0..column_count {
        if index > 0 {
            rebuilt.push(delimiter);
        }
        if let Some(field) = record.get(index) {
            rebuilt.extend_from_slice(field);
        }
    }
    Ok(rebuilt)
}
