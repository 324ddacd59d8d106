//! Maps chunk ids to the code that reads them.
//! Chunk ids that are not registered are read as opaque bytes,
//! so a file with unknown extensions can always be parsed and written back.

use std::collections::HashMap;
use std::fmt;
use crate::chunk::{AnyChunkData, ReadChunk, RawChunk};
use crate::group::{Group, Scope};
use crate::error::{Result, UnitResult};
use crate::io::ChunkReader;
use crate::id::Id;


/// Additional structural rules for all forms of one form type,
/// for example "at most one palette". Called after all children have been validated.
pub type FormCheck = fn(&Group, &Scope<'_>) -> UnitResult;


/// The operations for one kind of chunk payload:
/// how to construct an empty payload and how to read one.
/// Writing, validating, printing, comparing and dropping
/// are methods of the payload itself.
#[derive(Clone, Copy)]
pub struct ChunkType {
    type_name: &'static str,
    create: fn() -> Box<dyn AnyChunkData>,
    read: fn(&mut ChunkReader<'_>) -> Result<Box<dyn AnyChunkData>>,
}

impl ChunkType {

    /// The operations for the payload type `T`.
    pub fn of<T: ReadChunk>() -> Self {
        ChunkType {
            type_name: std::any::type_name::<T>(),
            create: create_default::<T>,
            read: read_boxed::<T>,
        }
    }

    /// Keeps the bytes of the chunk without interpreting them.
    pub fn raw() -> Self {
        Self::of::<RawChunk>()
    }

    /// The name of the payload type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Construct an empty payload, to build a file programmatically.
    pub fn create(&self) -> Box<dyn AnyChunkData> {
        (self.create)()
    }

    /// Read a payload, consuming at most the declared size of the chunk.
    pub fn read(&self, read: &mut ChunkReader<'_>) -> Result<Box<dyn AnyChunkData>> {
        (self.read)(read)
    }
}

fn create_default<T: ReadChunk>() -> Box<dyn AnyChunkData> {
    Box::new(T::default())
}

fn read_boxed<T: ReadChunk>(read: &mut ChunkReader<'_>) -> Result<Box<dyn AnyChunkData>> {
    Ok(Box::new(T::read(read)?))
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "ChunkType({})", self.type_name)
    }
}


/// Knows which payload type belongs to which chunk id,
/// and which structural rules apply to which form type.
///
/// A registry is usually populated once before any file is read,
/// and is only read afterwards. Group ids (`FORM`, `LIST`, `CAT `, `PROP`)
/// are always read as groups and cannot be registered.
#[derive(Clone)]
pub struct Registry {

    /// Chunk types that apply inside forms of any form type.
    global: HashMap<Id, ChunkType>,

    /// Chunk types that only apply inside forms of a specific form type.
    scoped: HashMap<(Id, Id), ChunkType>,

    checks: HashMap<Id, FormCheck>,

    raw: ChunkType,
}

impl fmt::Debug for Registry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Registry")
            .field("global", &self.global)
            .field("scoped", &self.scoped)
            .field("checks", &self.checks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self { Self::new() }
}

impl Registry {

    /// A registry that reads every chunk as raw bytes.
    pub fn new() -> Self {
        Registry {
            global: HashMap::new(),
            scoped: HashMap::new(),
            checks: HashMap::new(),
            raw: ChunkType::raw(),
        }
    }

    /// Read chunks with this id using the specified type, regardless of the form type.
    /// Replaces any previous registration of this id.
    pub fn register(&mut self, id: Id, chunk_type: ChunkType) -> &mut Self {
        debug_assert!(!id.is_group(), "group ids cannot be registered");

        if let Some(previous) = self.global.insert(id, chunk_type) {
            tracing::debug!(%id, previous = previous.type_name, "chunk type replaced");
        }

        self
    }

    /// Read chunks with this id using the specified type, but only inside forms of `form_type`.
    /// Takes precedence over a registration without form type.
    pub fn register_in(&mut self, form_type: Id, id: Id, chunk_type: ChunkType) -> &mut Self {
        debug_assert!(!id.is_group(), "group ids cannot be registered");

        if let Some(previous) = self.scoped.insert((form_type, id), chunk_type) {
            tracing::debug!(%form_type, %id, previous = previous.type_name, "chunk type replaced");
        }

        self
    }

    /// Validate all forms of `form_type` with an additional rule.
    /// Replaces any previous rule for this form type.
    pub fn register_check(&mut self, form_type: Id, check: FormCheck) -> &mut Self {
        self.checks.insert(form_type, check);
        self
    }

    /// The chunk type for this id, regardless of the form type.
    /// Falls back to raw bytes, so this never fails.
    pub fn lookup(&self, id: Id) -> ChunkType {
        self.lookup_in(None, id)
    }

    /// The chunk type for this id inside a form of the specified type.
    /// Falls back to the registration without form type, and then to raw bytes.
    pub fn lookup_in(&self, form_type: Option<Id>, id: Id) -> ChunkType {
        let scoped = form_type.and_then(|form_type| self.scoped.get(&(form_type, id)));

        match scoped.or_else(|| self.global.get(&id)) {
            Some(&chunk_type) => chunk_type,
            None => {
                tracing::debug!(%id, "no chunk type registered, keeping raw bytes");
                self.raw
            }
        }
    }

    /// Whether a chunk type other than the raw fallback exists for this id.
    pub fn contains(&self, form_type: Option<Id>, id: Id) -> bool {
        form_type.map_or(false, |form_type| self.scoped.contains_key(&(form_type, id)))
            || self.global.contains_key(&id)
    }

    /// The additional rule for forms of this type, if any.
    pub fn check(&self, form_type: Id) -> Option<FormCheck> {
        self.checks.get(&form_type).copied()
    }
}
