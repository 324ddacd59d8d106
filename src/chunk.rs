//! The atomic element of every iff file: an id, a size, and a body.
//! The body is either a group of further chunks, or a payload
//! whose type is chosen by the registry.

use std::any::Any;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{Error, Result, UnitResult, usize_to_u32, u32_to_usize};
use crate::group::{Group, ReadContext, Scope};
use crate::id::{Id, FORM, LIST, CAT, PROP};
use crate::io::*;
use crate::registry::Registry;


/// Number of bytes of the id and size fields that precede every chunk body.
pub const HEADER_BYTE_SIZE: usize = 8;

/// Whether a body of this size is followed by a pad byte.
#[inline]
pub fn needs_pad_byte(body_byte_size: usize) -> bool {
    body_byte_size % 2 == 1
}

/// Number of bytes a chunk with this body size occupies in a file,
/// including header and pad byte.
#[inline]
pub fn total_byte_size(body_byte_size: usize) -> usize {
    HEADER_BYTE_SIZE + body_byte_size + needs_pad_byte(body_byte_size) as usize
}


/// The contents of a chunk that is not a group.
/// Implement this for each payload type of a file format,
/// and register the type for its chunk id.
pub trait ChunkData: fmt::Debug + Send + Sync + 'static {

    /// The number of body bytes `write` will produce, excluding the pad byte.
    fn byte_size(&self) -> usize;

    /// Write the body, exactly `byte_size()` bytes.
    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult;

    /// Check the contents, possibly considering the enclosing groups.
    fn validate(&self, _scope: &Scope<'_>) -> UnitResult {
        Ok(())
    }

    /// Print the fields of this payload, one per line.
    /// By default, prints the serialized bytes.
    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        let mut bytes = Vec::with_capacity(self.byte_size());

        match self.write(&mut ChunkWriter::new(&mut bytes)) {
            Ok(()) => print_bytes(out, indent, &bytes),
            Err(error) => print_line(out, indent, format_args!("/* cannot be printed: {} */", error)),
        }
    }
}

/// A payload that can be read from a chunk body.
/// The `Default` value is the empty payload used to build files programmatically.
pub trait ReadChunk: ChunkData + Default + Clone + PartialEq {

    /// Read the payload. Must not consume more than `read.remaining()` bytes,
    /// and should consume all of them.
    fn read(read: &mut ChunkReader<'_>) -> Result<Self>;
}

/// The object-safe form of a chunk payload, implemented for all payloads.
pub trait AnyChunkData: ChunkData {

    /// Access the concrete payload type.
    fn as_any(&self) -> &dyn Any;

    /// Access the concrete payload type.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Compare two payloads of possibly different types.
    fn eq_data(&self, other: &dyn AnyChunkData) -> bool;

    /// Deep copy of this payload.
    fn clone_data(&self) -> Box<dyn AnyChunkData>;
}

impl<T: ChunkData + Clone + PartialEq> AnyChunkData for T {
    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }

    fn eq_data(&self, other: &dyn AnyChunkData) -> bool {
        other.as_any().downcast_ref::<T>().map_or(false, |other| self == other)
    }

    fn clone_data(&self) -> Box<dyn AnyChunkData> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn AnyChunkData> {
    fn clone(&self) -> Self {
        self.clone_data()
    }
}


/// Chunk payload that keeps the bytes without interpreting them.
/// Used for all chunk ids that are not registered, and for
/// payloads that are plain bytes, such as compressed pixels.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawChunk {

    /// The body of the chunk, without pad byte.
    pub bytes: Vec<u8>,
}

impl RawChunk {
    pub fn new(bytes: Vec<u8>) -> Self { RawChunk { bytes } }
}

impl fmt::Debug for RawChunk {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "RawChunk({} bytes)", self.bytes.len())
    }
}

impl ChunkData for RawChunk {
    fn byte_size(&self) -> usize { self.bytes.len() }

    fn write(&self, write: &mut ChunkWriter<'_>) -> UnitResult {
        write.write_bytes(&self.bytes)
    }

    fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_bytes(out, indent, &self.bytes)
    }
}

impl ReadChunk for RawChunk {
    fn read(read: &mut ChunkReader<'_>) -> Result<Self> {
        Ok(RawChunk { bytes: read.read_remaining()? })
    }
}


/// The body of a chunk.
#[derive(Debug, Clone)]
pub enum Content {

    /// A `FORM`, `LIST`, `CAT ` or `PROP` containing further chunks.
    Group(Group),

    /// Any other payload, with a type chosen by the registry.
    Data(Box<dyn AnyChunkData>),
}

impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Content::Group(group), Content::Group(other)) => group == other,
            (Content::Data(data), Content::Data(other)) => data.eq_data(other.as_ref()),
            _ => false,
        }
    }
}


/// A tagged, length-prefixed unit of an iff file.
/// Owns its body, which may own further chunks.
/// Comparing two chunks ignores the cached size.
#[derive(Debug, Clone)]
pub struct Chunk {
    id: Id,

    /// The size of the body as it was read, or as it was last computed.
    declared_size: u32,

    content: Content,
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.content == other.content
    }
}

impl Chunk {

    /// A chunk with the specified payload.
    /// Panics if `id` is a group id, use `Chunk::group` for those.
    pub fn new(id: Id, data: impl AnyChunkData) -> Self {
        Self::from_boxed(id, Box::new(data))
    }

    /// A chunk with the specified payload.
    pub fn from_boxed(id: Id, data: Box<dyn AnyChunkData>) -> Self {
        assert!(!id.is_group(), "group ids must contain a group");

        let mut chunk = Chunk { id, declared_size: 0, content: Content::Data(data) };
        chunk.update_size();
        chunk
    }

    /// A chunk containing the specified group.
    pub fn group(group: Group) -> Self {
        let mut chunk = Chunk { id: group.id(), declared_size: 0, content: Content::Group(group) };
        chunk.update_size();
        chunk
    }

    /// Construct an empty chunk of the type registered for `id`,
    /// as it would appear inside a form of `form_type`.
    /// Group ids produce an empty group, where a `FORM` takes `form_type` as its type.
    pub fn create(registry: &Registry, form_type: Option<Id>, id: Id) -> Result<Self> {
        let group = match id {
            FORM => Group::form(form_type.ok_or_else(|| Error::invalid("an empty FORM needs a form type"))?),
            LIST => Group::list(),
            CAT => Group::cat(),
            PROP => Group::prop(),
            _ => return Ok(Self::from_boxed(id, registry.lookup_in(form_type, id).create())),
        };

        Ok(Self::group(group))
    }

    /// A chunk with raw bytes as payload.
    pub fn raw(id: Id, bytes: Vec<u8>) -> Self {
        Self::new(id, RawChunk::new(bytes))
    }

    /// The id of this chunk.
    pub fn id(&self) -> Id { self.id }

    /// The body size as it was read or last computed.
    /// Editing a nested chunk through `as_group_mut` leaves the sizes of its ancestors stale
    /// until `update_size` runs on the outermost chunk, or the edit goes through `modify_group`.
    /// Use `byte_size()` for the current size.
    pub fn declared_size(&self) -> u32 { self.declared_size }

    /// The body of this chunk.
    pub fn content(&self) -> &Content { &self.content }

    /// The group inside this chunk, if any.
    pub fn as_group(&self) -> Option<&Group> {
        match &self.content {
            Content::Group(group) => Some(group),
            Content::Data(_) => None,
        }
    }

    /// The group inside this chunk, if any.
    /// Call `update_size` after modifying the group, or use `modify_group` instead.
    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match &mut self.content {
            Content::Group(group) => Some(group),
            Content::Data(_) => None,
        }
    }

    /// Whether this chunk is a `FORM`, `LIST`, `CAT ` or `PROP`.
    pub fn is_group(&self) -> bool {
        self.as_group().is_some()
    }

    /// Whether this chunk is a `FORM` with the specified form type.
    pub fn is_form_of(&self, form_type: Id) -> bool {
        self.as_group().and_then(Group::form_type) == Some(form_type)
    }

    /// The payload, if this is not a group and the payload has type `T`.
    pub fn data<T: AnyChunkData>(&self) -> Option<&T> {
        match &self.content {
            Content::Data(data) => data.as_any().downcast_ref::<T>(),
            Content::Group(_) => None,
        }
    }

    /// The payload, if this is not a group and the payload has type `T`.
    /// Call `update_size` after modifying the payload.
    pub fn data_mut<T: AnyChunkData>(&mut self) -> Option<&mut T> {
        match &mut self.content {
            Content::Data(data) => data.as_any_mut().downcast_mut::<T>(),
            Content::Group(_) => None,
        }
    }

    /// Modify the payload of type `T` and update the size afterwards.
    /// Returns `None` if the payload has another type.
    pub fn modify<T: AnyChunkData, R>(&mut self, modify: impl FnOnce(&mut T) -> R) -> Option<R> {
        let result = self.data_mut::<T>().map(modify);
        self.update_size();
        result
    }

    /// The current number of body bytes, computed from the contents.
    pub fn byte_size(&self) -> usize {
        match &self.content {
            Content::Group(group) => group.byte_size(),
            Content::Data(data) => data.byte_size(),
        }
    }

    /// The current number of bytes in a file, including header and pad byte.
    pub fn total_byte_size(&self) -> usize {
        total_byte_size(self.byte_size())
    }

    /// Recompute the cached size of this chunk and all nested chunks, children first.
    /// Sizes that do not fit into the format saturate, and are reported when writing.
    pub fn update_size(&mut self) -> u32 {
        let byte_size = match &mut self.content {
            Content::Group(group) => group.update_sizes(),
            Content::Data(data) => data.byte_size(),
        };

        self.declared_size = u32::try_from(byte_size).unwrap_or(u32::MAX);
        self.declared_size
    }

    /// Append a chunk to the group in this chunk, updating the size.
    pub fn push(&mut self, chunk: Chunk) -> UnitResult {
        self.modify_group(|group| group.push(chunk))
    }

    /// Insert a chunk into the group in this chunk, updating the size.
    /// Panics if `index` is larger than the number of children.
    pub fn insert(&mut self, index: usize, chunk: Chunk) -> UnitResult {
        self.modify_group(|group| group.insert(index, chunk))
    }

    /// Remove a chunk from the group in this chunk, updating the size.
    pub fn remove(&mut self, index: usize) -> Result<Option<Chunk>> {
        self.modify_group(|group| group.remove(index))
    }

    /// Modify the group in this chunk, including any nested chunk,
    /// and update the sizes of this chunk and everything inside afterwards.
    /// Fails if this chunk is not a group.
    pub fn modify_group<R>(&mut self, modify: impl FnOnce(&mut Group) -> R) -> Result<R> {
        let id = self.id;
        let group = self.as_group_mut()
            .ok_or_else(|| Error::invalid(format!("chunk {} is not a group", id)))?;

        let result = modify(group);
        self.update_size();
        Ok(result)
    }

    /// Find all forms with one of the specified form types,
    /// including this chunk and all nested forms, in file order.
    pub fn search_forms(&self, form_types: &[Id]) -> Vec<&Group> {
        let mut forms = Vec::new();
        self.collect_forms(form_types, &mut forms);
        forms
    }

    fn collect_forms<'t>(&'t self, form_types: &[Id], forms: &mut Vec<&'t Group>) {
        if let Some(group) = self.as_group() {
            if group.form_type().map_or(false, |form_type| form_types.contains(&form_type)) {
                forms.push(group);
            }

            for chunk in group.children() {
                chunk.collect_forms(form_types, forms);
            }
        }
    }
}


// reading
impl Chunk {

    /// Read any single chunk, choosing the payload types from the registry.
    /// Does not validate the contents.
    pub fn read(read: impl Read, registry: &Registry) -> Result<Self> {
        let mut read = Tracking::new(read);
        Self::read_tracked(&mut read, registry, ReadContext::root())
    }

    /// Read an iff file, which contains a single group chunk. Does not validate the contents.
    /// Use `read_from_buffered` if your reader is an in-memory reader.
    pub fn read_from_file(path: impl AsRef<Path>, registry: &Registry) -> Result<Self> {
        Self::read_from_unbuffered(File::open(path)?, registry)
    }

    /// Buffer the reader and then read an iff file from it.
    /// Use `read_from_buffered` if your reader is an in-memory reader.
    /// Use `read_from_file` if you have a file path.
    pub fn read_from_unbuffered(unbuffered: impl Read, registry: &Registry) -> Result<Self> {
        Self::read_from_buffered(BufReader::new(unbuffered), registry)
    }

    /// Read an iff file from a reader that is already buffered or in memory.
    /// The outermost chunk must be a group. Bytes after it are ignored.
    pub fn read_from_buffered(buffered: impl Read, registry: &Registry) -> Result<Self> {
        let mut read = Tracking::new(PeekRead::new(buffered));
        let chunk = Self::read_top_level(&mut read, registry)?;

        if !read.is_exhausted()? {
            tracing::debug!(position = read.byte_position(), "ignoring bytes after the outermost chunk");
        }

        Ok(chunk)
    }

    /// Read all consecutive group chunks until the end of the stream,
    /// for files that concatenate multiple iff files.
    pub fn read_all_from_buffered(buffered: impl Read, registry: &Registry) -> Result<Vec<Self>> {
        let mut read = Tracking::new(PeekRead::new(buffered));
        let mut chunks = Vec::new();

        while !read.is_exhausted()? {
            chunks.push(Self::read_top_level(&mut read, registry)?);
        }

        Ok(chunks)
    }

    fn read_top_level<R: Read>(read: &mut Tracking<R>, registry: &Registry) -> Result<Self> {
        let offset = read.byte_position();
        let (id, declared_size) = read_outer_header(read)?;

        if !id.is_group() {
            return Err(Error::malformed(format!(
                "an iff file must start with a group, but starts with {}", id
            )));
        }

        read_body(read, registry, ReadContext::root(), id, declared_size)
            .map_err(|error| error.within(id, Some(offset)))
    }

    pub(crate) fn read_tracked<R: Read>(read: &mut Tracking<R>, registry: &Registry, context: ReadContext) -> Result<Self> {
        let offset = read.byte_position();
        let (id, declared_size) = read_outer_header(read)?;

        read_body(read, registry, context, id, declared_size)
            .map_err(|error| error.within(id, Some(offset)))
    }
}

/// Read the id and the size of the next chunk.
/// Inside a group, a stream that ends here is a `TruncatedStream`.
pub(crate) fn read_header(read: &mut impl Read) -> Result<(Id, u32)> {
    let id = Id::read(read)?;
    let size = u32::read(read)?;
    Ok((id, size))
}

/// Read the header of an outermost chunk.
/// Nothing promised more bytes yet, so a short header is malformed.
fn read_outer_header(read: &mut impl Read) -> Result<(Id, u32)> {
    read_header(read).map_err(|error| match error {
        Error::TruncatedStream => Error::malformed("stream ends within a chunk header"),
        other => other,
    })
}

/// Read the body of a chunk whose header has already been read, including the pad byte.
pub(crate) fn read_body<R: Read>(
    read: &mut Tracking<R>, registry: &Registry, context: ReadContext,
    id: Id, declared_size: u32
) -> Result<Chunk>
{
    tracing::trace!(%id, declared_size, position = read.byte_position(), "reading chunk");

    let content = if id.is_group() {
        Content::Group(Group::read_body(read, registry, context, id, declared_size)?)
    }
    else {
        let chunk_type = registry.lookup_in(context.form_type(), id);
        let mut body = ChunkReader::new(read, id, declared_size);
        let data = chunk_type.read(&mut body)?;
        body.finish()?;
        Content::Data(data)
    };

    if needs_pad_byte(u32_to_usize(declared_size)) {
        u8::read(read)?;
    }

    Ok(Chunk { id, declared_size, content })
}


// writing
impl Chunk {

    /// Write this chunk, recomputing all sizes.
    /// Returns the number of bytes written, including header and pad byte.
    /// Does not validate the contents.
    pub fn write(&self, write: &mut impl Write) -> Result<usize> {
        self.write_unannotated(write).map_err(|error| error.within(self.id, None))
    }

    /// Write this chunk to a new file, replacing any existing file.
    /// Does not validate the contents. If an error occurs, a partially written file remains.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> UnitResult {
        self.write_to_unbuffered(File::create(path)?)
    }

    /// Buffer the writer and then write this chunk to it.
    pub fn write_to_unbuffered(&self, unbuffered: impl Write) -> UnitResult {
        self.write_to_buffered(BufWriter::new(unbuffered))
    }

    /// Write this chunk to a writer that is already buffered or in memory.
    pub fn write_to_buffered(&self, mut buffered: impl Write) -> UnitResult {
        self.write(&mut buffered)?;
        buffered.flush()?;
        Ok(())
    }

    /// Write this chunk into a new byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.total_byte_size());
        self.write(&mut bytes)?;
        Ok(bytes)
    }

    pub(crate) fn write_unannotated(&self, write: &mut impl Write) -> Result<usize> {
        let byte_size = self.byte_size();
        tracing::trace!(id = %self.id, byte_size, "writing chunk");

        self.id.write(write)?;
        usize_to_u32(byte_size, self.id)?.write(write)?;

        match &self.content {
            Content::Group(group) => group.write_body(write)?,

            Content::Data(data) => {
                let mut body = ChunkWriter::new(write);
                data.write(&mut body)?;

                if body.written() != byte_size {
                    return Err(Error::size_mismatch(self.id, byte_size as u64, body.written() as u64));
                }
            },
        }

        if needs_pad_byte(byte_size) {
            0_u8.write(write)?;
        }

        Ok(total_byte_size(byte_size))
    }
}


// validating and printing
impl Chunk {

    /// Check the id and contents of this chunk and all nested chunks.
    /// Returns the first problem, annotated with the path to the chunk.
    pub fn validate(&self, registry: &Registry) -> UnitResult {
        self.validate_in(&Scope::root(registry))
    }

    pub(crate) fn validate_in(&self, scope: &Scope<'_>) -> UnitResult {
        let result = self.id.validate().and_then(|()| match &self.content {
            Content::Group(group) => group.validate(scope),
            Content::Data(data) => data.validate(scope),
        });

        result.map_err(|error| error.within(self.id, None))
    }

    /// Print this chunk and all nested chunks,
    /// increasing the indentation by one level per group.
    pub fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        print_line(out, indent, format_args!("{} = {{", self.id))?;
        print_line(out, indent + 1, format_args!("chunkSize = {};", self.byte_size()))?;

        match &self.content {
            Content::Group(group) => group.print(out, indent + 1)?,
            Content::Data(data) => data.print(out, indent + 1)?,
        }

        print_line(out, indent, format_args!("}};"))
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print(formatter, 0)
    }
}


/// Print a single line with the specified indentation level.
pub fn print_line(out: &mut dyn fmt::Write, indent: usize, line: fmt::Arguments<'_>) -> fmt::Result {
    for _ in 0 .. indent {
        out.write_str("  ")?;
    }

    out.write_fmt(line)?;
    out.write_char('\n')
}

/// Print bytes as hexadecimal numbers, sixteen per line.
pub fn print_bytes(out: &mut dyn fmt::Write, indent: usize, bytes: &[u8]) -> fmt::Result {
    if bytes.is_empty() {
        return print_line(out, indent, format_args!("bytes = {{}};"));
    }

    print_line(out, indent, format_args!("bytes = {{"))?;

    for line in bytes.chunks(16) {
        let mut text = String::with_capacity(line.len() * 3);

        for (index, byte) in line.iter().enumerate() {
            if index != 0 { text.push(' '); }
            text.push_str(&format!("{:02x}", byte));
        }

        print_line(out, indent + 1, format_args!("{}", text))?;
    }

    print_line(out, indent, format_args!("}};"))
}
