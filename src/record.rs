//! Line record codec.
//!
//! Every line of an input, run or output file has the form `<key>.<payload>`: a signed integer key, the first
//! `.` as a separator and an arbitrary payload (which may itself contain dots). Records are ordered by payload
//! (byte-wise) first and by key second.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::num::ParseIntError;
use std::str::{self, Utf8Error};

use memchr::memchr;

/// Key/payload separator.
pub const SEPARATOR: u8 = b'.';

/// Line parsing error. Lines that fail to parse are considered malformed and are skipped by the sorter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The line contains no separator.
    MissingSeparator,
    /// The part before the separator is not an integer.
    InvalidKey(ParseIntError),
    /// The line is not valid UTF-8.
    InvalidEncoding(Utf8Error),
}

impl Error for RecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            RecordError::MissingSeparator => None,
            RecordError::InvalidKey(err) => Some(err),
            RecordError::InvalidEncoding(err) => Some(err),
        }
    }
}

impl Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            RecordError::MissingSeparator => write!(f, "key separator not found"),
            RecordError::InvalidKey(err) => write!(f, "key is not an integer: {}", err),
            RecordError::InvalidEncoding(err) => write!(f, "line is not valid utf-8: {}", err),
        }
    }
}

/// A single `<key>.<payload>` line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    pub key: i64,
    pub payload: String,
}

impl Record {
    pub fn new(key: i64, payload: impl Into<String>) -> Self {
        Record {
            key,
            payload: payload.into(),
        }
    }

    /// Parses a line without its terminator.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        Self::parse_bytes(line.as_bytes())
    }

    /// Parses a raw line without its terminator.
    /// Only the first separator counts, everything after it is kept as the payload verbatim.
    pub fn parse_bytes(line: &[u8]) -> Result<Self, RecordError> {
        let (key, payload) = split_line(line)?;
        let payload = str::from_utf8(payload).map_err(RecordError::InvalidEncoding)?;

        return Ok(Record::new(key, payload));
    }

    /// Writes the record followed by a `\n` terminator.
    pub fn write_line<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_line(writer, self.key, &self.payload)
    }
}

/// Splits a raw line into its parsed key and raw payload bytes.
/// ASCII whitespace around the key is ignored; the payload is kept as is.
pub(crate) fn split_line(line: &[u8]) -> Result<(i64, &[u8]), RecordError> {
    let sep = memchr(SEPARATOR, line).ok_or(RecordError::MissingSeparator)?;
    let key = str::from_utf8(&line[..sep]).map_err(RecordError::InvalidEncoding)?;
    let key = key
        .trim_matches(|c: char| c.is_ascii_whitespace())
        .parse::<i64>()
        .map_err(RecordError::InvalidKey)?;

    return Ok((key, &line[sep + 1..]));
}

/// Writes `<key>.<payload>\n` without building an intermediate string.
pub(crate) fn write_line<W: io::Write>(writer: &mut W, key: i64, payload: &str) -> io::Result<()> {
    let mut key_buf = itoa::Buffer::new();
    writer.write_all(key_buf.format(key).as_bytes())?;
    writer.write_all(&[SEPARATOR])?;
    writer.write_all(payload.as_bytes())?;
    writer.write_all(b"\n")
}

impl Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.key, self.payload)
    }
}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Payload first (ordinal, not locale aware), key second.
/// Chunk grouping and run merging must agree on this order.
impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.payload
            .as_bytes()
            .cmp(other.payload.as_bytes())
            .then(self.key.cmp(&other.key))
    }
}

#[cfg(test)]
mod test {
    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{Record, RecordError};

    #[rstest]
    #[case("42.apple", 42, "apple")]
    #[case("-7.banana", -7, "banana")]
    #[case("+3.cherry", 3, "cherry")]
    #[case("5.", 5, "")]
    #[case("1.a.b.c", 1, "a.b.c")]
    #[case("0. leading space", 0, " leading space")]
    #[case(" 1.fruit", 1, "fruit")]
    #[case("1 .fruit", 1, "fruit")]
    #[case("\t-2 \t. fruit", -2, " fruit")]
    #[case("9223372036854775807.max", i64::MAX, "max")]
    fn test_parse(#[case] line: &str, #[case] key: i64, #[case] payload: &str) {
        assert_eq!(Record::parse(line), Ok(Record::new(key, payload)));
    }

    #[rstest]
    #[case("")]
    #[case("no separator")]
    fn test_parse_missing_separator(#[case] line: &str) {
        assert_eq!(Record::parse(line), Err(RecordError::MissingSeparator));
    }

    #[rstest]
    #[case("notanumber.fruit")]
    #[case(".fruit")]
    #[case("1 2.fruit")]
    #[case("- 1.fruit")]
    #[case("99999999999999999999.overflow")]
    fn test_parse_invalid_key(#[case] line: &str) {
        assert!(matches!(Record::parse(line), Err(RecordError::InvalidKey(_))));
    }

    #[test]
    fn test_parse_invalid_encoding() {
        assert!(matches!(
            Record::parse_bytes(b"1.\xff\xfe"),
            Err(RecordError::InvalidEncoding(_))
        ));
    }

    #[rstest]
    #[case(Record::new(42, "apple"), "42.apple")]
    #[case(Record::new(-1, "a.b"), "-1.a.b")]
    #[case(Record::new(5, ""), "5.")]
    fn test_format(#[case] record: Record, #[case] expected: &str) {
        assert_eq!(record.to_string(), expected);
        assert_eq!(Record::parse(expected), Ok(record.clone()));

        let mut line = Vec::new();
        record.write_line(&mut line).unwrap();
        assert_eq!(line, format!("{}\n", expected).into_bytes());
    }

    #[test]
    fn test_order() {
        let expected = vec![
            Record::new(5, ""),
            Record::new(3, "Zebra"),
            Record::new(42, "apple"),
            Record::new(100, "apple"),
            Record::new(-1, "apple pie"),
            Record::new(7, "banana"),
        ];

        let mut shuffled = expected.clone();
        shuffled.shuffle(&mut rand::thread_rng());
        shuffled.sort();

        assert_eq!(shuffled, expected);
    }
}
