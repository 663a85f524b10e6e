//! Convert a line-oriented label corpus into a label set.
//!
//! Each line is either `<labelhash>\t<label>`, as produced by a PostgreSQL
//! `COPY ... TO` text dump, or a bare label. In the tab-separated form the
//! label uses COPY text escapes (`\\`, `\t`, `\n`, `\r`, ...) and its
//! labelhash must match. Bare labels are taken literally and hashed.
//!
//! Rows that cannot be parsed or whose labelhash does not match are
//! skipped and counted rather than aborting the conversion.

use std::io::BufRead;

use crate::codec::{LabelRecord, LabelSetSink};
use crate::error::CodecError;
use crate::labelhash::LabelHash;

/// Skipped rows logged individually before going quiet.
const MAX_LOGGED_SKIPS: u64 = 20;

const PROGRESS_LOG_INTERVAL: u64 = 1_000_000;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("failed reading corpus: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertStats {
    pub written: u64,
    pub skipped_mismatched: u64,
    pub skipped_malformed: u64,
}

impl ConvertStats {
    fn skipped(&self) -> u64 {
        self.skipped_mismatched + self.skipped_malformed
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Row {
    Record(LabelRecord),
    Mismatched(LabelHash),
    Malformed(&'static str),
}

/// Stream every row of `input` into `sink`. The sink is finished before
/// returning.
pub fn convert<R, S>(mut input: R, sink: &mut S) -> Result<ConvertStats, ConvertError>
where
    R: BufRead,
    S: LabelSetSink + ?Sized,
{
    let mut stats = ConvertStats::default();
    let mut line = Vec::new();
    let mut line_number = 0u64;

    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_number += 1;

        let row = strip_line_ending(&line);
        if row.is_empty() {
            continue;
        }

        match parse_row(row) {
            Row::Record(record) => {
                sink.write_record(&record)?;
                stats.written += 1;
                if stats.written % PROGRESS_LOG_INTERVAL == 0 {
                    tracing::info!(written = stats.written, "conversion progress");
                }
            }
            Row::Mismatched(hash) => {
                stats.skipped_mismatched += 1;
                if stats.skipped() <= MAX_LOGGED_SKIPS {
                    tracing::warn!(line = line_number, %hash, "label does not match labelhash, skipping");
                }
            }
            Row::Malformed(reason) => {
                stats.skipped_malformed += 1;
                if stats.skipped() <= MAX_LOGGED_SKIPS {
                    tracing::warn!(line = line_number, reason, "malformed row, skipping");
                }
            }
        }
    }

    sink.finish()?;
    tracing::info!(
        written = stats.written,
        skipped_mismatched = stats.skipped_mismatched,
        skipped_malformed = stats.skipped_malformed,
        "conversion complete"
    );
    Ok(stats)
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn parse_row(row: &[u8]) -> Row {
    let Ok(row) = std::str::from_utf8(row) else {
        return Row::Malformed("not valid UTF-8");
    };

    let Some((hash, escaped)) = row.split_once('\t') else {
        return Row::Record(LabelRecord::from_label(row));
    };
    if escaped.contains('\t') {
        return Row::Malformed("more than two columns");
    }

    let Ok(hash) = hash.parse::<LabelHash>() else {
        return Row::Malformed("invalid labelhash column");
    };
    let Some(label) = unescape_copy_text(escaped) else {
        return Row::Malformed("invalid escape or NULL label");
    };

    let record = LabelRecord::new(hash, label);
    if record.is_consistent() {
        Row::Record(record)
    } else {
        Row::Mismatched(hash)
    }
}

/// Undo PostgreSQL COPY text-format escaping. `\N` (NULL) and a dangling
/// backslash yield `None`.
fn unescape_copy_text(field: &str) -> Option<String> {
    if field == "\\N" {
        return None;
    }

    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{b}'),
            other => out.push(other),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{LabelSetHeader, LabelSetSource, RainbowReader, RainbowWriter};
    use crate::labelhash::labelhash;

    fn convert_to_records(input: &str) -> (ConvertStats, Vec<LabelRecord>) {
        let header = LabelSetHeader::new("subgraph", 0);
        let mut writer = RainbowWriter::new(Vec::new(), &header).unwrap();
        let stats = convert(input.as_bytes(), &mut writer).unwrap();

        let bytes = writer.into_inner();
        let reader = RainbowReader::new(bytes.as_slice()).unwrap();
        assert_eq!(reader.header(), &header);
        (stats, reader.collect::<Result<_, _>>().unwrap())
    }

    #[test]
    fn tab_separated_rows_are_checked_and_unescaped() {
        let input = format!(
            "{}\tvitalik\n{}\ttab\\there\n{}\tnot-eth\n",
            labelhash("vitalik"),
            labelhash("tab\there"),
            labelhash("eth"),
        );
        let (stats, records) = convert_to_records(&input);

        assert_eq!(stats.written, 2);
        assert_eq!(stats.skipped_mismatched, 1);
        assert_eq!(
            records,
            vec![
                LabelRecord::from_label("vitalik"),
                LabelRecord::from_label("tab\there"),
            ]
        );
    }

    #[test]
    fn bare_labels_are_hashed_and_blank_lines_ignored() {
        let (stats, records) = convert_to_records("ethereum\r\n\nvitalik");
        assert_eq!(stats.written, 2);
        assert_eq!(
            records,
            vec![
                LabelRecord::from_label("ethereum"),
                LabelRecord::from_label("vitalik"),
            ]
        );
    }

    #[test]
    fn malformed_rows_are_counted() {
        let input = format!("0x12\tshort\n{}\t\\N\na\tb\tc\n", labelhash("x"));
        let (stats, records) = convert_to_records(&input);
        assert_eq!(stats.skipped_malformed, 3);
        assert!(records.is_empty());
    }

    #[test]
    fn unescape_handles_copy_escapes() {
        assert_eq!(unescape_copy_text("a\\\\b").as_deref(), Some("a\\b"));
        assert_eq!(unescape_copy_text("line\\nbreak").as_deref(), Some("line\nbreak"));
        assert_eq!(unescape_copy_text("dangling\\"), None);
        assert_eq!(unescape_copy_text("\\N"), None);
    }
}
