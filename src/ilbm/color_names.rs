//! The `CNAM` chunk, which names a range of palette entries.

use std::fmt;
use smallvec::SmallVec;

use crate::chunk::{ChunkData, ReadChunk, print_line};
use crate::error::{Error, Result, UnitResult};
use crate::group::Scope;
use crate::io::{ChunkReader, ChunkWriter, MAX_STRING_LENGTH};


/// The raw bytes of a `Text`. Most names fit without allocating.
pub type TextBytes = SmallVec<[u8; 24]>;

/// A byte string with each byte being a Latin-1 char.
/// Stored without terminator, written null-terminated.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Text {
    bytes: TextBytes,
}

impl Text {

    /// Create a `Text` from a string.
    /// Returns `None` if the string contains chars outside of Latin-1 or a null char.
    pub fn new_or_none(string: impl AsRef<str>) -> Option<Self> {
        let bytes: Option<TextBytes> = string.as_ref().chars()
            .map(|character| u8::try_from(u32::from(character)).ok().filter(|&byte| byte != 0))
            .collect();

        bytes.map(Self::from_bytes_unchecked)
    }

    /// Create a `Text` from a string.
    /// Panics if the string contains unsupported chars.
    pub fn new_or_panic(string: impl AsRef<str>) -> Self {
        Self::new_or_none(string).expect("iff::Text contains unsupported characters")
    }

    /// Create a `Text` without checking for null bytes.
    pub fn from_bytes_unchecked(bytes: TextBytes) -> Self {
        Text { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// The number of bytes in a file, including the terminator.
    pub fn null_terminated_byte_size(&self) -> usize {
        self.bytes.len() + 1
    }

    /// Check for bytes that would corrupt the file.
    pub fn validate(&self) -> UnitResult {
        if self.bytes.contains(&0) {
            return Err(Error::invalid(format!("text \"{}\" contains a null byte", self)));
        }

        if self.null_terminated_byte_size() > MAX_STRING_LENGTH {
            return Err(Error::UnboundedString { max_length: MAX_STRING_LENGTH });
        }

        Ok(())
    }
}

impl<'s> From<&'s str> for Text {

    /// Panics if the string contains an unsupported char.
    fn from(string: &'s str) -> Self {
        Self::new_or_panic(string)
    }
}

impl PartialEq<str> for Text {
    fn eq(&self, other: &str) -> bool {
        Text::new_or_none(other).map_or(false, |other| &other == self)
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "iff::Text(\"{}\")", self)
    }
}

impl fmt::Display for Text {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        use std::fmt::Write;

        for &byte in self.bytes.iter() {
            formatter.write_char(char::from(byte))?;
        }

        Ok(())
    }
}


/// Names for the palette entries from `start` to `end`, inclusive.
/// Reading keeps every name until the chunk ends, so `names.len()` may disagree
/// with the index range of a damaged file until `validate` reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorNames {
    pub start: u16,
    pub end: u16,
    pub names: Vec<Text>,
}

impl ColorNames {

    /// Names starting at the palette entry `start`.
    /// The end index follows from the number of names.
    pub fn new(start: u16, names: Vec<Text>) -> Self {
        let end = (usize::from(start) + names.len()).saturating_sub(1);
        ColorNames { start, end: u16::try_from(end).unwrap_or(u16::MAX), names }
    }

    /// The number of names the index range requires, or `None` if the range is inverted.
    pub fn expected_count(&self) -> Option<usize> {
        self.end.checked_sub(self.start).map(|difference| usize::from(difference) + 1)
    }
}

impl ChunkData for ColorNames {
    fn byte_size(&self) -> usize {
        4 + self.names.iter().map(Text::null_terminated_byte_size).sum::<usize>()
    }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        write.write_field(self.start)?;
        write.write_field(self.end)?;

        for name in &self.names {
            write.write_null_terminated(name.as_slice())?;
        }

        Ok(())
    }

    fn validate(&self, _scope: &Scope<'_>) -> UnitResult {
        let expected_count = self.expected_count().ok_or_else(|| Error::invalid(format!(
            "first named color {} is after the last named color {}",
            self.start, self.end
        )))?;

        if expected_count != self.names.len() {
            return Err(Error::invalid(format!(
                "the color indices {} to {} need {} names, but {} are present",
                self.start, self.end, expected_count, self.names.len()
            )));
        }

        for name in &self.names {
            name.validate()?;
        }

        Ok(())
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("startingColor = {};", self.start))?;
        print_line(out, indent, format_args!("endingColor = {};", self.end))?;

        for name in &self.names {
            print_line(out, indent, format_args!("{{ \"{}\" }};", name))?;
        }

        Ok(())
    }
}

impl ReadChunk for ColorNames {

    /// Reads names until the chunk ends, so that a count
    /// that does not match the indices is reported by validation.
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        let start = read.read_field()?;
        let end = read.read_field()?;
        let mut names = Vec::new();

        while read.remaining() > 0 {
            let bytes = read.read_null_terminated(MAX_STRING_LENGTH)?;
            names.push(Text::from_bytes_unchecked(SmallVec::from_vec(bytes)));
        }

        Ok(ColorNames { start, end, names })
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::id::Id;
    use crate::registry::Registry;

    fn names(start: u16, end: u16, names: &[&str]) -> ColorNames {
        ColorNames { start, end, names: names.iter().map(|&name| Text::from(name)).collect() }
    }

    #[test]
    fn count_must_match_indices(){
        let registry = Registry::new();
        let scope = Scope::root(&registry);

        names(2, 4, &["red", "green", "blue"]).validate(&scope).unwrap();

        let error = names(2, 4, &["red", "green"]).validate(&scope).unwrap_err();
        assert!(matches!(error, Error::Invalid(_)));

        assert!(names(4, 2, &["red", "green", "blue"]).validate(&scope).is_err());
    }

    #[test]
    fn writer_counts_each_name_once(){
        let chunk = names(2, 4, &["red", "green", "blue"]);

        let mut bytes = Vec::new();
        let mut writer = ChunkWriter::new(&mut bytes);
        chunk.write(&mut writer).unwrap();

        assert_eq!(writer.written(), 4 + 4 + 6 + 5);
        assert_eq!(writer.written(), chunk.byte_size());
        assert_eq!(&bytes[4 ..], b"red\0green\0blue\0");
    }

    #[test]
    fn reads_until_chunk_ends(){
        let mut slice: &[u8] = b"\0\x02\0\x04red\0green\0";
        let mut reader = ChunkReader::new(&mut slice, Id(*b"CNAM"), 14);

        let chunk = ColorNames::read(&mut reader).unwrap();
        reader.finish().unwrap();

        assert_eq!(chunk, names(2, 4, &["red", "green"]));
        assert_ne!(chunk.names.len(), usize::from(chunk.end - chunk.start) + 1);
        assert!(chunk.validate(&Scope::root(&Registry::new())).is_err());
    }

    #[test]
    fn name_length_is_bounded(){
        let mut bytes = vec![0, 0, 0, 0];
        bytes.extend(std::iter::repeat(b'x').take(MAX_STRING_LENGTH + 10));
        bytes.push(0);

        let mut slice = bytes.as_slice();
        let mut reader = ChunkReader::new(&mut slice, Id(*b"CNAM"), bytes.len() as u32);
        assert!(matches!(ColorNames::read(&mut reader), Err(Error::UnboundedString { .. })));
    }

    #[test]
    fn end_follows_from_names(){
        let chunk = ColorNames::new(2, vec![ Text::from("red"), Text::from("green") ]);
        assert_eq!(chunk.end, 3);
        assert_eq!(chunk.expected_count(), Some(2));
    }

    #[test]
    fn latin1_text(){
        assert_eq!(Text::new_or_panic("grün").as_slice(), b"gr\xFCn");
        assert_eq!(Text::new_or_none("日本"), None);
        assert_eq!(Text::new_or_none("a\0b"), None);
        assert!(Text::from("blue") == *"blue");
    }
}
