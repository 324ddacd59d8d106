//! Small fixed-size properties of an image.

use std::fmt;
use bit_field::BitField;

use crate::chunk::{ChunkData, ReadChunk, print_line};
use crate::error::{Result, UnitResult};
use crate::io::{ChunkReader, ChunkWriter};


/// The `DPI ` chunk: resolution of the image when printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DpiHeader {
    pub dpi_x: u16,
    pub dpi_y: u16,
}

impl ChunkData for DpiHeader {
    fn byte_size(&self) -> usize { 4 }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        write.write_field(self.dpi_x)?;
        write.write_field(self.dpi_y)
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("dpi_x = {};", self.dpi_x))?;
        print_line(out, indent, format_args!("dpi_y = {};", self.dpi_y))
    }
}

impl ReadChunk for DpiHeader {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        Ok(DpiHeader { dpi_x: read.read_field()?, dpi_y: read.read_field()? })
    }
}


/// The `GRAB` chunk: the hotspot of a brush, relative to its top left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point2D {
    pub x: i16,
    pub y: i16,
}

impl ChunkData for Point2D {
    fn byte_size(&self) -> usize { 4 }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        write.write_field(self.x)?;
        write.write_field(self.y)
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("x = {};", self.x))?;
        print_line(out, indent, format_args!("y = {};", self.y))
    }
}

impl ReadChunk for Point2D {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        Ok(Point2D { x: read.read_field()?, y: read.read_field()? })
    }
}


/// The `DEST` chunk: how the planes of the image are merged into a deeper destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DestMerge {

    /// Number of planes of the destination.
    pub depth: u8,

    pub pad: u8,

    /// Which destination planes receive the image planes.
    pub plane_pick: u16,

    /// The value of the destination planes not picked.
    pub plane_on_off: u16,

    /// Which destination planes may be modified.
    pub plane_mask: u16,
}

impl ChunkData for DestMerge {
    fn byte_size(&self) -> usize { 8 }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        write.write_field(self.depth)?;
        write.write_field(self.pad)?;
        write.write_field(self.plane_pick)?;
        write.write_field(self.plane_on_off)?;
        write.write_field(self.plane_mask)
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("depth = {};", self.depth))?;
        print_line(out, indent, format_args!("pad1 = {};", self.pad))?;
        print_line(out, indent, format_args!("planePick = {};", self.plane_pick))?;
        print_line(out, indent, format_args!("planeOnOff = {};", self.plane_on_off))?;
        print_line(out, indent, format_args!("planeMask = {};", self.plane_mask))
    }
}

impl ReadChunk for DestMerge {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        Ok(DestMerge {
            depth: read.read_field()?,
            pad: read.read_field()?,
            plane_pick: read.read_field()?,
            plane_on_off: read.read_field()?,
            plane_mask: read.read_field()?,
        })
    }
}


/// The `SPRT` chunk: marks the image as a sprite. Lower precedence is drawn in front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Sprite {
    pub precedence: u16,
}

impl ChunkData for Sprite {
    fn byte_size(&self) -> usize { 2 }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        write.write_field(self.precedence)
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("spritePrecedence = {};", self.precedence))
    }
}

impl ReadChunk for Sprite {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        Ok(Sprite { precedence: read.read_field()? })
    }
}


/// The `CAMG` chunk: the Amiga display mode the image was made for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub mode: u32,
}

impl Viewport {
    const LACE_BIT: usize = 2;
    const EXTRA_HALFBRITE_BIT: usize = 7;
    const HOLD_AND_MODIFY_BIT: usize = 11;
    const HIRES_BIT: usize = 15;

    /// Interlaced: every pixel is half as high as wide.
    pub fn is_interlaced(&self) -> bool { self.mode.get_bit(Self::LACE_BIT) }

    /// The upper half of the palette is the lower half at half brightness.
    pub fn is_extra_halfbrite(&self) -> bool { self.mode.get_bit(Self::EXTRA_HALFBRITE_BIT) }

    /// Hold-and-modify: the upper two planes modify a channel of the previous pixel.
    pub fn is_hold_and_modify(&self) -> bool { self.mode.get_bit(Self::HOLD_AND_MODIFY_BIT) }

    /// High resolution: every pixel is half as wide as high.
    pub fn is_hires(&self) -> bool { self.mode.get_bit(Self::HIRES_BIT) }

    pub fn set_hold_and_modify(&mut self, enabled: bool) {
        self.mode.set_bit(Self::HOLD_AND_MODIFY_BIT, enabled);
    }

    pub fn set_extra_halfbrite(&mut self, enabled: bool) {
        self.mode.set_bit(Self::EXTRA_HALFBRITE_BIT, enabled);
    }
}

impl ChunkData for Viewport {
    fn byte_size(&self) -> usize { 4 }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        write.write_field(self.mode)
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("viewportMode = {:x};", self.mode))
    }
}

impl ReadChunk for Viewport {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        Ok(Viewport { mode: read.read_field()? })
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::id::Id;

    fn encode(data: &impl ChunkData) -> Vec<u8> {
        let mut bytes = Vec::new();
        data.write(&mut ChunkWriter::new(&mut bytes)).unwrap();
        assert_eq!(bytes.len(), data.byte_size());
        bytes
    }

    #[test]
    fn viewport_modes(){
        let mut viewport = Viewport { mode: 0x8004 };
        assert!(viewport.is_hires());
        assert!(viewport.is_interlaced());
        assert!(!viewport.is_hold_and_modify());

        viewport.set_hold_and_modify(true);
        assert_eq!(viewport.mode, 0x8804);
        assert_eq!(encode(&viewport), [0, 0, 0x88, 0x04]);

        viewport.set_extra_halfbrite(true);
        assert!(viewport.is_extra_halfbrite());
    }

    #[test]
    fn dest_merge_layout(){
        let dest = DestMerge { depth: 8, pad: 0, plane_pick: 0x00FF, plane_on_off: 1, plane_mask: 0xFFFF };
        let bytes = encode(&dest);
        assert_eq!(bytes, [8, 0, 0, 0xFF, 0, 1, 0xFF, 0xFF]);

        let mut slice = bytes.as_slice();
        let mut reader = ChunkReader::new(&mut slice, Id(*b"DEST"), 8);
        assert_eq!(DestMerge::read(&mut reader).unwrap(), dest);
    }

    #[test]
    fn small_properties(){
        assert_eq!(encode(&DpiHeader { dpi_x: 72, dpi_y: 300 }), [0, 72, 0x01, 0x2C]);
        assert_eq!(encode(&Point2D { x: -1, y: 2 }), [0xFF, 0xFF, 0, 2]);
        assert_eq!(encode(&Sprite { precedence: 3 }), [0, 3]);
    }
}
