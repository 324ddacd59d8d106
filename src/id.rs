//! The four-byte type identifiers that tag every chunk.

use crate::error::{Error, UnitResult};
use std::fmt;


/// A four character code identifying a chunk type or a form type.
/// Case-sensitive. Shorter names are padded with spaces, as in `"CAT "`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Id(pub [u8; 4]);

/// Generic group containing chunks of one form type.
pub const FORM: Id = Id(*b"FORM");

/// Group of forms that may share properties through `PROP` chunks.
pub const LIST: Id = Id(*b"LIST");

/// Plain concatenation of groups.
pub const CAT: Id = Id(*b"CAT ");

/// Shared properties for the forms of a `LIST`.
pub const PROP: Id = Id(*b"PROP");

/// All ids that introduce a group chunk.
pub const GROUP_IDS: [Id; 4] = [ FORM, LIST, CAT, PROP ];


impl Id {

    /// Build an id from up to four ascii chars, padding with spaces.
    /// Returns `None` for empty strings, strings longer than four bytes, or non-ascii chars.
    pub fn new_or_none(name: impl AsRef<str>) -> Option<Self> {
        let name = name.as_ref();
        if name.is_empty() || name.len() > 4 || !name.is_ascii() {
            return None;
        }

        let mut bytes = [b' '; 4];
        bytes[.. name.len()].copy_from_slice(name.as_bytes());
        Some(Id(bytes))
    }

    /// Build an id from up to four ascii chars, padding with spaces.
    /// Panics if the string cannot be an id.
    pub fn new_or_panic(name: impl AsRef<str>) -> Self {
        Self::new_or_none(name).expect("iff::Id must consist of one to four ascii chars")
    }

    /// The raw bytes of this id, as stored in a file.
    pub fn bytes(self) -> [u8; 4] { self.0 }

    /// Whether this id introduces a `FORM`, `LIST`, `CAT ` or `PROP` group.
    pub fn is_group(self) -> bool {
        GROUP_IDS.contains(&self)
    }

    /// An id must consist of printable ascii chars and must not start with a space.
    pub fn validate(self) -> UnitResult {
        if self.0.iter().any(|&byte| !(0x20 ..= 0x7E).contains(&byte)) {
            return Err(Error::invalid(format!("id {} contains non-printable characters", self)));
        }

        if self.0[0] == b' ' {
            return Err(Error::invalid(format!("id {} must not start with a space", self)));
        }

        Ok(())
    }

    /// A form type must be a valid id, and must not be mistaken for a group id.
    pub fn validate_form_type(self) -> UnitResult {
        self.validate()?;

        if self.is_group() {
            return Err(Error::invalid(format!("form type {} is reserved for groups", self)));
        }

        Ok(())
    }
}

impl From<[u8; 4]> for Id {
    fn from(bytes: [u8; 4]) -> Self { Id(bytes) }
}

impl From<&[u8; 4]> for Id {
    fn from(bytes: &[u8; 4]) -> Self { Id(*bytes) }
}

impl PartialEq<[u8; 4]> for Id {
    fn eq(&self, other: &[u8; 4]) -> bool { &self.0 == other }
}

impl fmt::Display for Id {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "'")?;
        for &byte in &self.0 {
            if (0x20 ..= 0x7E).contains(&byte) { write!(formatter, "{}", byte as char)?; }
            else { write!(formatter, "\\x{:02x}", byte)?; }
        }
        write!(formatter, "'")
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, formatter)
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pads_short_names(){
        assert_eq!(Id::new_or_panic("CAT"), CAT);
        assert_eq!(Id::new_or_panic("PBM"), Id(*b"PBM "));
        assert_eq!(Id::new_or_none(""), None);
        assert_eq!(Id::new_or_none("TOOLONG"), None);
    }

    #[test]
    fn validation(){
        assert!(Id(*b"ILBM").validate().is_ok());
        assert!(Id(*b"DPI ").validate().is_ok());
        assert!(Id(*b" ABC").validate().is_err());
        assert!(Id([b'A', 0, b'B', b'C']).validate().is_err());

        assert!(Id(*b"ILBM").validate_form_type().is_ok());
        assert!(LIST.validate_form_type().is_err());
    }

    #[test]
    fn display_escapes_binary(){
        assert_eq!(FORM.to_string(), "'FORM'");
        assert_eq!(Id([b'A', 0, b'B', b'C']).to_string(), "'A\\x00BC'");
    }
}
