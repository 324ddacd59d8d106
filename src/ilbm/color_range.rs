//! Color cycling: the palette entries between two indices rotate over time.
//! `CRNG` is the classic range, `DRNG` the extended range of later paint programs,
//! and `CCRT` the range format of the Graphicraft program.

use std::fmt;
use bit_field::BitField;

use crate::chunk::{ChunkData, ReadChunk, print_line};
use crate::error::{Error, Result, UnitResult};
use crate::group::Scope;
use crate::io::{ChunkReader, ChunkWriter};


/// A `CRNG` chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ColorRange {

    /// Unused, usually zero.
    pub pad: i16,

    /// Cycling speed. 16384 means 60 steps per second.
    pub rate: i16,

    /// Bit 0 enables cycling, bit 1 reverses the direction.
    pub flags: i16,

    /// First palette index of the range.
    pub low: u8,

    /// Last palette index of the range, inclusive.
    pub high: u8,
}

impl ColorRange {

    /// The rate value that cycles once per frame at 60 frames per second.
    pub const RATE_60_STEPS_PER_SECOND: i16 = 16384;

    const ACTIVE_BIT: usize = 0;
    const REVERSE_BIT: usize = 1;

    /// Whether the colors of this range should cycle.
    pub fn is_active(&self) -> bool {
        (self.flags as u16).get_bit(Self::ACTIVE_BIT)
    }

    /// Whether the colors cycle downwards.
    pub fn is_reversed(&self) -> bool {
        (self.flags as u16).get_bit(Self::REVERSE_BIT)
    }

    pub fn set_active(&mut self, active: bool) {
        self.set_flag(Self::ACTIVE_BIT, active);
    }

    pub fn set_reversed(&mut self, reversed: bool) {
        self.set_flag(Self::REVERSE_BIT, reversed);
    }

    fn set_flag(&mut self, bit: usize, value: bool) {
        let mut flags = self.flags as u16;
        flags.set_bit(bit, value);
        self.flags = flags as i16;
    }
}

impl ChunkData for ColorRange {
    fn byte_size(&self) -> usize { 8 }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        write.write_field(self.pad)?;
        write.write_field(self.rate)?;
        write.write_field(self.flags)?;
        write.write_field(self.low)?;
        write.write_field(self.high)
    }

    fn validate(&self, _scope: &Scope<'_>) -> UnitResult {
        if self.low > self.high {
            return Err(Error::invalid(format!(
                "color range starts at {}, after its end at {}",
                self.low, self.high
            )));
        }

        Ok(())
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("pad1 = {};", self.pad))?;
        print_line(out, indent, format_args!("rate = {};", self.rate))?;
        print_line(out, indent, format_args!("active = {};", self.flags))?;
        print_line(out, indent, format_args!("low = {};", self.low))?;
        print_line(out, indent, format_args!("high = {};", self.high))
    }
}

impl ReadChunk for ColorRange {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        Ok(ColorRange {
            pad: read.read_field()?,
            rate: read.read_field()?,
            flags: read.read_field()?,
            low: read.read_field()?,
            high: read.read_field()?,
        })
    }
}


/// A palette entry of a `DRNG` that is set to a fixed color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DColor {
    pub cell: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// A palette entry of a `DRNG` that is copied from another register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DIndex {
    pub cell: u8,
    pub index: u8,
}

/// A `DRNG` chunk.
/// The counts of true colors and of registers are written from the list lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DRange {
    pub min: u8,
    pub max: u8,
    pub rate: i16,
    pub flags: i16,
    pub colors: Vec<DColor>,
    pub indices: Vec<DIndex>,

    /// Bytes after the listed cells, as written by some programs.
    /// Kept as-is so that they survive writing the file again.
    pub extension: Vec<u8>,
}

impl DRange {
    const FIXED_BYTE_SIZE: usize = 8;

    /// Whether the colors of this range should cycle.
    pub fn is_active(&self) -> bool {
        (self.flags as u16).get_bit(0)
    }
}

impl ChunkData for DRange {
    fn byte_size(&self) -> usize {
        Self::FIXED_BYTE_SIZE + self.colors.len() * 4 + self.indices.len() * 2 + self.extension.len()
    }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        let color_count = u8::try_from(self.colors.len())
            .map_err(|_| Error::invalid("too many colors in DRNG"))?;

        let index_count = u8::try_from(self.indices.len())
            .map_err(|_| Error::invalid("too many registers in DRNG"))?;

        write.write_field(self.min)?;
        write.write_field(self.max)?;
        write.write_field(self.rate)?;
        write.write_field(self.flags)?;
        write.write_field(color_count)?;
        write.write_field(index_count)?;

        for color in &self.colors {
            write.write_bytes(&[ color.cell, color.red, color.green, color.blue ])?;
        }

        for index in &self.indices {
            write.write_bytes(&[ index.cell, index.index ])?;
        }

        write.write_bytes(&self.extension)
    }

    fn validate(&self, _scope: &Scope<'_>) -> UnitResult {
        if self.min > self.max {
            return Err(Error::invalid(format!("DRNG starts at {}, after its end at {}", self.min, self.max)));
        }

        if self.colors.len() > usize::from(u8::MAX) || self.indices.len() > usize::from(u8::MAX) {
            return Err(Error::invalid("DRNG lists more than 255 cells"));
        }

        Ok(())
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("min = {};", self.min))?;
        print_line(out, indent, format_args!("max = {};", self.max))?;
        print_line(out, indent, format_args!("rate = {};", self.rate))?;
        print_line(out, indent, format_args!("flags = {};", self.flags))?;
        print_line(out, indent, format_args!("ntrue = {};", self.colors.len()))?;
        print_line(out, indent, format_args!("nregs = {};", self.indices.len()))?;

        for color in &self.colors {
            print_line(out, indent, format_args!(
                "dcolor = {{ cell = {}; r = {:02x}; g = {:02x}; b = {:02x}; }};",
                color.cell, color.red, color.green, color.blue
            ))?;
        }

        for index in &self.indices {
            print_line(out, indent, format_args!("dindex = {{ cell = {}; index = {}; }};", index.cell, index.index))?;
        }

        Ok(())
    }
}

impl ReadChunk for DRange {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        let min = read.read_field()?;
        let max = read.read_field()?;
        let rate = read.read_field()?;
        let flags = read.read_field()?;
        let color_count: u8 = read.read_field()?;
        let index_count: u8 = read.read_field()?;

        let mut colors = Vec::with_capacity(usize::from(color_count));
        for _ in 0 .. color_count {
            colors.push(DColor {
                cell: read.read_field()?,
                red: read.read_field()?,
                green: read.read_field()?,
                blue: read.read_field()?,
            });
        }

        let mut indices = Vec::with_capacity(usize::from(index_count));
        for _ in 0 .. index_count {
            indices.push(DIndex { cell: read.read_field()?, index: read.read_field()? });
        }

        let extension = read.read_remaining()?;
        Ok(DRange { min, max, rate, flags, colors, indices, extension })
    }
}


/// A `CCRT` chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CycleInfo {

    /// 0 disables cycling, 1 cycles forwards, -1 cycles backwards.
    pub direction: i16,

    pub start: u8,
    pub end: u8,

    /// Seconds between two steps.
    pub seconds: i32,

    /// Microseconds between two steps, added to the seconds.
    pub microseconds: i32,

    pub pad: i16,
}

impl ChunkData for CycleInfo {
    fn byte_size(&self) -> usize { 14 }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        write.write_field(self.direction)?;
        write.write_field(self.start)?;
        write.write_field(self.end)?;
        write.write_field(self.seconds)?;
        write.write_field(self.microseconds)?;
        write.write_field(self.pad)
    }

    fn validate(&self, _scope: &Scope<'_>) -> UnitResult {
        if !(-1 ..= 1).contains(&self.direction) {
            return Err(Error::invalid(format!("cycle direction {} is not -1, 0 or 1", self.direction)));
        }

        if self.start > self.end {
            return Err(Error::invalid(format!("cycle starts at {}, after its end at {}", self.start, self.end)));
        }

        Ok(())
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("direction = {};", self.direction))?;
        print_line(out, indent, format_args!("start = {};", self.start))?;
        print_line(out, indent, format_args!("end = {};", self.end))?;
        print_line(out, indent, format_args!("seconds = {};", self.seconds))?;
        print_line(out, indent, format_args!("microseconds = {};", self.microseconds))?;
        print_line(out, indent, format_args!("pad = {};", self.pad))
    }
}

impl ReadChunk for CycleInfo {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        Ok(CycleInfo {
            direction: read.read_field()?,
            start: read.read_field()?,
            end: read.read_field()?,
            seconds: read.read_field()?,
            microseconds: read.read_field()?,
            pad: read.read_field()?,
        })
    }
}
