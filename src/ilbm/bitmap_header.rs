//! The `BMHD` chunk, which describes the dimensions and encoding of the pixels.

use std::fmt;

use crate::chunk::{ChunkData, ReadChunk, print_line};
use crate::compression::Compression;
use crate::error::{Error, Result, UnitResult};
use crate::group::Scope;
use crate::io::{ChunkReader, ChunkWriter};


/// How the transparent parts of an image are specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Masking {

    /// The image is opaque.
    None,

    /// An additional plane after the color planes marks the opaque pixels.
    HasMask,

    /// Pixels with the transparent color index are transparent.
    HasTransparentColor,

    /// Only the area enclosed by a lasso is opaque.
    Lasso,
}

impl Masking {

    /// The value of the masking byte in a bitmap header.
    pub fn to_byte(self) -> u8 {
        match self {
            Masking::None => 0,
            Masking::HasMask => 1,
            Masking::HasTransparentColor => 2,
            Masking::Lasso => 3,
        }
    }

    /// Interpret the masking byte of a bitmap header.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Masking::None),
            1 => Some(Masking::HasMask),
            2 => Some(Masking::HasTransparentColor),
            3 => Some(Masking::Lasso),
            _ => None,
        }
    }
}


/// Dimensions, position and pixel encoding of an image.
/// Every image form must contain exactly one,
/// either directly or in a shared `PROP`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitMapHeader {

    /// Width of the image in pixels.
    pub width: u16,

    /// Height of the image in pixels.
    pub height: u16,

    /// Horizontal position of the image on the page.
    pub x: i16,

    /// Vertical position of the image on the page.
    pub y: i16,

    /// Number of color planes, excluding the mask plane.
    pub planes: u8,

    /// The raw masking byte. See `masking()`.
    pub masking: u8,

    /// The raw compression byte. See `compression()`.
    pub compression: u8,

    /// Unused, must be written as zero.
    pub pad: u8,

    /// The color index that is transparent, if masking has a transparent color.
    pub transparent_color: u16,

    /// Pixel aspect ratio numerator.
    pub x_aspect: u8,

    /// Pixel aspect ratio denominator.
    pub y_aspect: u8,

    /// Width of the source page in pixels.
    pub page_width: i16,

    /// Height of the source page in pixels.
    pub page_height: i16,
}

impl BitMapHeader {

    /// The number of body bytes of a bitmap header.
    pub const BYTE_SIZE: usize = 20;

    /// A header for an opaque image with square pixels, stored without compression.
    pub fn new(width: u16, height: u16, planes: u8) -> Self {
        BitMapHeader {
            width, height, planes,
            x_aspect: 1, y_aspect: 1,
            page_width: i16::try_from(width).unwrap_or(i16::MAX),
            page_height: i16::try_from(height).unwrap_or(i16::MAX),
            .. Self::default()
        }
    }

    /// The masking mode, if known.
    pub fn masking(&self) -> Option<Masking> {
        Masking::from_byte(self.masking)
    }

    /// The compression method of the body, or an error for unknown methods.
    pub fn compression(&self) -> Result<Compression> {
        Compression::from_byte_or_err(self.compression)
    }

    /// The number of planes stored in the body, including the mask plane.
    pub fn plane_count(&self) -> usize {
        usize::from(self.planes) + usize::from(self.masking() == Some(Masking::HasMask))
    }

    /// The number of colors the color planes can address.
    /// Returns `None` for deep images with more than 31 planes.
    pub fn color_count(&self) -> Option<u32> {
        1_u32.checked_shl(u32::from(self.planes))
    }
}

impl ChunkData for BitMapHeader {
    fn byte_size(&self) -> usize { Self::BYTE_SIZE }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        write.write_field(self.width)?;
        write.write_field(self.height)?;
        write.write_field(self.x)?;
        write.write_field(self.y)?;
        write.write_field(self.planes)?;
        write.write_field(self.masking)?;
        write.write_field(self.compression)?;
        write.write_field(self.pad)?;
        write.write_field(self.transparent_color)?;
        write.write_field(self.x_aspect)?;
        write.write_field(self.y_aspect)?;
        write.write_field(self.page_width)?;
        write.write_field(self.page_height)
    }

    fn validate(&self, _scope: &Scope<'_>) -> UnitResult {
        if self.masking().is_none() {
            return Err(Error::invalid(format!("unknown masking mode {}", self.masking)));
        }

        if Compression::from_byte(self.compression).is_none() {
            return Err(Error::invalid(format!("unknown compression method {}", self.compression)));
        }

        Ok(())
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("w = {};", self.width))?;
        print_line(out, indent, format_args!("h = {};", self.height))?;
        print_line(out, indent, format_args!("x = {};", self.x))?;
        print_line(out, indent, format_args!("y = {};", self.y))?;
        print_line(out, indent, format_args!("nPlanes = {};", self.planes))?;
        print_line(out, indent, format_args!("masking = {};", self.masking))?;
        print_line(out, indent, format_args!("compression = {};", self.compression))?;
        print_line(out, indent, format_args!("transparentColor = {};", self.transparent_color))?;
        print_line(out, indent, format_args!("xAspect = {};", self.x_aspect))?;
        print_line(out, indent, format_args!("yAspect = {};", self.y_aspect))?;
        print_line(out, indent, format_args!("pageWidth = {};", self.page_width))?;
        print_line(out, indent, format_args!("pageHeight = {};", self.page_height))
    }
}

impl ReadChunk for BitMapHeader {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        Ok(BitMapHeader {
            width: read.read_field()?,
            height: read.read_field()?,
            x: read.read_field()?,
            y: read.read_field()?,
            planes: read.read_field()?,
            masking: read.read_field()?,
            compression: read.read_field()?,
            pad: read.read_field()?,
            transparent_color: read.read_field()?,
            x_aspect: read.read_field()?,
            y_aspect: read.read_field()?,
            page_width: read.read_field()?,
            page_height: read.read_field()?,
        })
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::Registry;
    use crate::id::Id;

    #[test]
    fn layout(){
        let header = BitMapHeader {
            masking: 1, compression: 1, transparent_color: 0x0102,
            .. BitMapHeader::new(320, 200, 5)
        };

        let mut bytes = Vec::new();
        header.write(&mut ChunkWriter::new(&mut bytes)).unwrap();

        assert_eq!(bytes.len(), BitMapHeader::BYTE_SIZE);
        assert_eq!(bytes, [
            0x01, 0x40, 0x00, 0xC8, 0, 0, 0, 0,
            5, 1, 1, 0, 0x01, 0x02, 1, 1,
            0x01, 0x40, 0x00, 0xC8,
        ]);

        let mut slice = bytes.as_slice();
        let mut reader = ChunkReader::new(&mut slice, Id(*b"BMHD"), 20);
        assert_eq!(BitMapHeader::read(&mut reader).unwrap(), header);
        reader.finish().unwrap();
    }

    #[test]
    fn plane_count_includes_mask(){
        let mut header = BitMapHeader::new(16, 16, 4);
        assert_eq!(header.plane_count(), 4);
        assert_eq!(header.color_count(), Some(16));

        header.masking = Masking::HasMask.to_byte();
        assert_eq!(header.plane_count(), 5);

        header.masking = Masking::HasTransparentColor.to_byte();
        assert_eq!(header.plane_count(), 4);
    }

    #[test]
    fn unknown_modes_are_invalid(){
        let registry = Registry::new();
        let scope = Scope::root(&registry);

        let header = BitMapHeader { masking: 4, .. BitMapHeader::new(1, 1, 1) };
        assert!(header.validate(&scope).is_err());

        let header = BitMapHeader { compression: 2, .. BitMapHeader::new(1, 1, 1) };
        assert!(header.validate(&scope).is_err());
        assert!(matches!(header.compression(), Err(Error::NotSupported(_))));

        BitMapHeader::new(1, 1, 1).validate(&scope).unwrap();
    }
}
