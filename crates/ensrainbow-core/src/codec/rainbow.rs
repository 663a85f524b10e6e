//! Binary rainbow file format.
//!
//! ```text
//! header:  magic "ERBF" | format_version u32 | namespace_len u32 |
//!          namespace utf8 | label_set_version u32
//! record*: label_hash [u8; 32] | label_len u32 | label utf8
//! ```
//!
//! All integers are big-endian. Records run until end of file; a file that
//! ends partway through a record is reported as
//! [`CodecError::UnexpectedEof`].

use std::io::{self, Read, Write};

use crate::error::CodecError;
use crate::labelhash::{LabelHash, LABEL_HASH_LEN};

use super::{LabelRecord, LabelSetHeader, LabelSetSink, LabelSetSource};

pub const MAGIC: &[u8; 4] = b"ERBF";

/// Current header layout version.
pub const FORMAT_VERSION: u32 = 1;

pub const MAX_NAMESPACE_LEN: usize = 1024;

/// Upper bound on a single label, so a corrupt length prefix cannot make
/// the reader allocate unbounded memory.
pub const MAX_LABEL_LEN: usize = 16 * 1024 * 1024;

// ==============================================================================
// Reader
// ==============================================================================

pub struct RainbowReader<R> {
    inner: R,
    header: LabelSetHeader,
    records_read: u64,
}

impl<R: Read> RainbowReader<R> {
    /// Read and validate the header. The reader is left positioned at the
    /// first record.
    pub fn new(mut inner: R) -> Result<Self, CodecError> {
        let mut magic = [0u8; 4];
        read_exact(&mut inner, &mut magic, "magic")?;
        if &magic != MAGIC {
            return Err(CodecError::BadMagic);
        }

        let format_version = read_u32(&mut inner, "format version")?;
        if format_version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedFormatVersion(format_version));
        }

        let namespace_len = read_u32(&mut inner, "namespace length")? as usize;
        check_namespace_len(namespace_len)?;
        let namespace = read_string(&mut inner, namespace_len, "namespace")?;
        let label_set_version = read_u32(&mut inner, "label set version")?;

        Ok(Self {
            inner,
            header: LabelSetHeader {
                namespace,
                label_set_version,
            },
            records_read: 0,
        })
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_record(&mut self) -> Result<Option<LabelRecord>, CodecError> {
        let mut hash = [0u8; LABEL_HASH_LEN];
        match fill(&mut self.inner, &mut hash)? {
            0 => return Ok(None),
            LABEL_HASH_LEN => {}
            _ => return Err(CodecError::UnexpectedEof("label hash")),
        }

        let label_len = read_u32(&mut self.inner, "label length")? as usize;
        if label_len > MAX_LABEL_LEN {
            return Err(CodecError::TooLong {
                field: "label",
                len: label_len,
                max: MAX_LABEL_LEN,
            });
        }
        let label = read_string(&mut self.inner, label_len, "label")?;

        self.records_read += 1;
        Ok(Some(LabelRecord {
            hash: LabelHash::from_bytes(hash),
            label,
        }))
    }
}

impl<R: Read> LabelSetSource for RainbowReader<R> {
    fn header(&self) -> &LabelSetHeader {
        &self.header
    }

    fn next_record(&mut self) -> Result<Option<LabelRecord>, CodecError> {
        self.read_record()
    }
}

impl<R: Read> Iterator for RainbowReader<R> {
    type Item = Result<LabelRecord, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

// ==============================================================================
// Writer
// ==============================================================================

pub struct RainbowWriter<W: Write> {
    inner: W,
    records_written: u64,
}

impl<W: Write> RainbowWriter<W> {
    /// Write the header for `header` and return a writer ready for records.
    pub fn new(mut inner: W, header: &LabelSetHeader) -> Result<Self, CodecError> {
        if header.namespace.is_empty() {
            return Err(CodecError::EmptyNamespace);
        }
        check_namespace_len(header.namespace.len())?;

        inner.write_all(MAGIC)?;
        inner.write_all(&FORMAT_VERSION.to_be_bytes())?;
        inner.write_all(&(header.namespace.len() as u32).to_be_bytes())?;
        inner.write_all(header.namespace.as_bytes())?;
        inner.write_all(&header.label_set_version.to_be_bytes())?;

        Ok(Self {
            inner,
            records_written: 0,
        })
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> LabelSetSink for RainbowWriter<W> {
    fn write_record(&mut self, record: &LabelRecord) -> Result<(), CodecError> {
        let label = record.label.as_bytes();
        if label.len() > MAX_LABEL_LEN {
            return Err(CodecError::TooLong {
                field: "label",
                len: label.len(),
                max: MAX_LABEL_LEN,
            });
        }

        self.inner.write_all(record.hash.as_bytes())?;
        self.inner.write_all(&(label.len() as u32).to_be_bytes())?;
        self.inner.write_all(label)?;
        self.records_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CodecError> {
        self.inner.flush()?;
        Ok(())
    }
}

// ==============================================================================
// Helpers
// ==============================================================================

fn check_namespace_len(len: usize) -> Result<(), CodecError> {
    if len == 0 {
        return Err(CodecError::EmptyNamespace);
    }
    if len > MAX_NAMESPACE_LEN {
        return Err(CodecError::TooLong {
            field: "namespace",
            len,
            max: MAX_NAMESPACE_LEN,
        });
    }
    Ok(())
}

/// Read until `buf` is full or the stream ends. Returns bytes read.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize, CodecError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8], what: &'static str) -> Result<(), CodecError> {
    if fill(reader, buf)? != buf.len() {
        return Err(CodecError::UnexpectedEof(what));
    }
    Ok(())
}

fn read_u32(reader: &mut impl Read, what: &'static str) -> Result<u32, CodecError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf, what)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_string(
    reader: &mut impl Read,
    len: usize,
    what: &'static str,
) -> Result<String, CodecError> {
    let mut bytes = vec![0u8; len];
    read_exact(reader, &mut bytes, what)?;
    String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8(what))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(header: &LabelSetHeader, records: &[LabelRecord]) -> Vec<u8> {
        let mut writer = RainbowWriter::new(Vec::new(), header).expect("write header");
        for record in records {
            writer.write_record(record).expect("write record");
        }
        writer.finish().expect("flush");
        writer.into_inner()
    }

    #[test]
    fn header_and_records_survive_a_round_trip() {
        let header = LabelSetHeader::new("subgraph", 3);
        let records = vec![
            LabelRecord::from_label("vitalik"),
            LabelRecord::from_label(""),
            LabelRecord::from_label("nul\0inside"),
            LabelRecord::from_label("ünïcödé 🌈"),
        ];

        let bytes = encode(&header, &records);
        let reader = RainbowReader::new(bytes.as_slice()).expect("read header");
        assert_eq!(reader.header(), &header);

        let decoded: Vec<_> = reader
            .collect::<Result<_, _>>()
            .expect("decode records");
        assert_eq!(decoded, records);
    }

    #[test]
    fn record_layout_is_hash_then_big_endian_length_then_label() {
        let header = LabelSetHeader::new("ns", 0);
        let record = LabelRecord::from_label("abc");
        let bytes = encode(&header, std::slice::from_ref(&record));

        // magic(4) + version(4) + ns_len(4) + "ns"(2) + label_set_version(4)
        let body = &bytes[18..];
        assert_eq!(&body[..32], record.hash.as_bytes());
        assert_eq!(&body[32..36], &[0, 0, 0, 3]);
        assert_eq!(&body[36..], b"abc");
    }

    #[test]
    fn truncated_record_is_unexpected_eof() {
        let header = LabelSetHeader::new("ns", 0);
        let bytes = encode(&header, &[LabelRecord::from_label("ethereum")]);

        // Cut inside the hash, inside the length, and inside the label.
        for cut in [18 + 10, 18 + 34, bytes.len() - 1] {
            let mut reader = RainbowReader::new(&bytes[..cut]).expect("header intact");
            assert!(
                matches!(reader.next_record(), Err(CodecError::UnexpectedEof(_))),
                "cut at {cut} should be an unexpected EOF"
            );
        }
    }

    #[test]
    fn truncated_header_is_unexpected_eof() {
        let bytes = encode(&LabelSetHeader::new("namespace", 1), &[]);
        for cut in [2, 6, 10, 15, bytes.len() - 2] {
            assert!(matches!(
                RainbowReader::new(&bytes[..cut]),
                Err(CodecError::UnexpectedEof(_))
            ));
        }
    }

    #[test]
    fn empty_record_stream_ends_cleanly() {
        let bytes = encode(&LabelSetHeader::new("ns", 0), &[]);
        let mut reader = RainbowReader::new(bytes.as_slice()).expect("read header");
        assert!(reader.next_record().expect("clean end").is_none());
        assert_eq!(reader.records_read(), 0);
    }

    #[test]
    fn bad_magic_and_unknown_version_are_rejected() {
        let mut bytes = encode(&LabelSetHeader::new("ns", 0), &[]);
        bytes[0] = b'X';
        assert!(matches!(
            RainbowReader::new(bytes.as_slice()),
            Err(CodecError::BadMagic)
        ));

        let mut bytes = encode(&LabelSetHeader::new("ns", 0), &[]);
        bytes[4..8].copy_from_slice(&9u32.to_be_bytes());
        assert!(matches!(
            RainbowReader::new(bytes.as_slice()),
            Err(CodecError::UnsupportedFormatVersion(9))
        ));
    }

    #[test]
    fn oversized_label_length_is_rejected_before_allocating() {
        let mut bytes = encode(&LabelSetHeader::new("ns", 0), &[]);
        bytes.extend_from_slice(&[0u8; 32]);
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());

        let mut reader = RainbowReader::new(bytes.as_slice()).expect("read header");
        assert!(matches!(
            reader.next_record(),
            Err(CodecError::TooLong { field: "label", .. })
        ));
    }

    #[test]
    fn invalid_utf8_label_is_rejected() {
        let mut bytes = encode(&LabelSetHeader::new("ns", 0), &[]);
        bytes.extend_from_slice(&[0u8; 32]);
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&[0xff, 0xfe]);

        let mut reader = RainbowReader::new(bytes.as_slice()).expect("read header");
        assert!(matches!(
            reader.next_record(),
            Err(CodecError::InvalidUtf8("label"))
        ));
    }

    #[test]
    fn empty_namespace_cannot_be_written() {
        assert!(matches!(
            RainbowWriter::new(Vec::new(), &LabelSetHeader::new("", 0)),
            Err(CodecError::EmptyNamespace)
        ));
    }
}
