//! The palettes `CMAP` and `CMYK`.

use std::fmt;

use crate::chunk::{ChunkData, ReadChunk, print_line};
use crate::error::{Error, Result, UnitResult, u32_to_usize};
use crate::group::Scope;
use crate::io::{ChunkReader, ChunkWriter};
use super::BitMapHeader;


/// Palettes with more entries than this are rejected.
pub const MAX_COLOR_COUNT: usize = 256;


/// A single palette entry, eight bits per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ColorRegister {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl ColorRegister {
    pub fn new(red: u8, green: u8, blue: u8) -> Self { ColorRegister { red, green, blue } }

    /// An entry with the same value in all channels.
    pub fn gray(value: u8) -> Self { Self::new(value, value, value) }
}

/// The palette of an indexed image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorMap {
    pub registers: Vec<ColorRegister>,
}

impl ColorMap {
    pub fn new(registers: Vec<ColorRegister>) -> Self { ColorMap { registers } }
}

impl ChunkData for ColorMap {
    fn byte_size(&self) -> usize { self.registers.len() * 3 }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        for register in &self.registers {
            write.write_bytes(&[ register.red, register.green, register.blue ])?;
        }

        Ok(())
    }

    fn validate(&self, _scope: &Scope<'_>) -> UnitResult {
        if self.registers.len() > MAX_COLOR_COUNT {
            return Err(Error::invalid(format!(
                "palette has {} colors, but at most {} are allowed",
                self.registers.len(), MAX_COLOR_COUNT
            )));
        }

        Ok(())
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("colorRegister = ["))?;

        for register in &self.registers {
            print_line(out, indent + 1, format_args!(
                "{{ red = {:02x}; green = {:02x}; blue = {:02x}; }}",
                register.red, register.green, register.blue
            ))?;
        }

        print_line(out, indent, format_args!("];"))
    }
}

impl ReadChunk for ColorMap {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        let count = u32_to_usize(read.remaining()) / 3;
        let mut registers = Vec::with_capacity(count.min(MAX_COLOR_COUNT));

        for _ in 0 .. count {
            let [red, green, blue]: [u8; 3] = [ read.read_field()?, read.read_field()?, read.read_field()? ];
            registers.push(ColorRegister { red, green, blue });
        }

        Ok(ColorMap { registers })
    }
}


/// A single entry of a printing palette, eight bits per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CmykRegister {
    pub cyan: u8,
    pub magenta: u8,
    pub yellow: u8,
    pub black: u8,
}

/// A palette for printing, parallel to the `CMAP`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmykMap {
    pub registers: Vec<CmykRegister>,
}

impl ChunkData for CmykMap {
    fn byte_size(&self) -> usize { self.registers.len() * 4 }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        for register in &self.registers {
            write.write_bytes(&[ register.cyan, register.magenta, register.yellow, register.black ])?;
        }

        Ok(())
    }

    fn validate(&self, _scope: &Scope<'_>) -> UnitResult {
        if self.registers.len() > MAX_COLOR_COUNT {
            return Err(Error::invalid(format!("cmyk palette has {} colors", self.registers.len())));
        }

        Ok(())
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("cmykRegister = ["))?;

        for register in &self.registers {
            print_line(out, indent + 1, format_args!(
                "{{ cyan = {:02x}; magenta = {:02x}; yellow = {:02x}; black = {:02x}; }}",
                register.cyan, register.magenta, register.yellow, register.black
            ))?;
        }

        print_line(out, indent, format_args!("];"))
    }
}

impl ReadChunk for CmykMap {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        let bytes = read.read_bytes(u32_to_usize(read.remaining()) / 4 * 4)?;

        let registers = bytes.chunks_exact(4)
            .map(|channels| CmykRegister {
                cyan: channels[0], magenta: channels[1],
                yellow: channels[2], black: channels[3],
            })
            .collect();

        Ok(CmykMap { registers })
    }
}


/// A palette of evenly spaced grays, one for every color the header can address.
/// Useful for displaying images without a `CMAP`.
pub fn grayscale_color_map(header: &BitMapHeader) -> Result<ColorMap> {
    if header.planes == 0 || header.planes > 8 {
        return Err(Error::unsupported(format!("grayscale palette for {} planes", header.planes)));
    }

    let color_count = 1_u32 << header.planes;

    let registers = (0 .. color_count)
        .map(|index| ColorRegister::gray((index * 0xFF / (color_count - 1)) as u8))
        .collect();

    Ok(ColorMap { registers })
}
