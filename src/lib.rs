//! Read, validate, modify and write files in the chunked interchange file format,
//! including the interleaved bitmap image dialect.
//!
//! A file is a tree of chunks. Groups (`FORM`, `LIST`, `CAT `, `PROP`) contain
//! further chunks, all other chunks contain a payload. Which payload type
//! belongs to which chunk id is decided by a `Registry`. Chunk ids without
//! a registered type are kept as raw bytes, so every file can be written back.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]


pub mod io;
pub mod error;
pub mod id;
pub mod registry;
pub mod chunk;
pub mod group;
pub mod compression;
pub mod ilbm;

#[macro_use]
extern crate smallvec;


pub mod prelude {

    // core data types
    pub use crate::chunk::{Chunk, Content, ChunkData, ReadChunk, RawChunk};
    pub use crate::group::{Group, GroupKind, Scope};
    pub use crate::id::{Id, FORM, LIST, CAT, PROP};
    pub use crate::registry::{Registry, ChunkType};
    pub use crate::compression::Compression;
    pub use crate::io::{ChunkReader, ChunkWriter};

    // secondary data types
    pub use crate::ilbm;
    pub use crate::error::{self, Error, Result, UnitResult};
}
