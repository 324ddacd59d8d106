//! The group chunks `FORM`, `LIST`, `CAT ` and `PROP`,
//! which contain an ordered sequence of further chunks.
//! The order of the children is the order in the file.

use std::fmt;

use crate::chunk::{Chunk, AnyChunkData, read_header, read_body as read_chunk_body, total_byte_size, print_line, HEADER_BYTE_SIZE};
use crate::error::{Error, Result, UnitResult, u32_to_usize};
use crate::id::{Id, FORM, LIST, CAT, PROP};
use crate::io::*;
use crate::registry::Registry;


/// Groups nested deeper than this are rejected while reading,
/// so that a hostile file cannot exhaust the stack.
pub const MAX_NESTING_DEPTH: usize = 64;


/// The four kinds of groups. Only a `FORM` carries a type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {

    /// Chunks that together describe one object of the specified form type, for example an image.
    Form(Id),

    /// Forms that share the properties of the contained `PROP` groups.
    List,

    /// A plain concatenation of groups.
    Cat,

    /// Properties shared by the forms of the enclosing `LIST`.
    Prop,
}

impl GroupKind {

    /// The chunk id of this kind of group.
    pub fn id(self) -> Id {
        match self {
            GroupKind::Form(_) => FORM,
            GroupKind::List => LIST,
            GroupKind::Cat => CAT,
            GroupKind::Prop => PROP,
        }
    }

    /// The form type, if this is a `FORM`.
    pub fn form_type(self) -> Option<Id> {
        match self {
            GroupKind::Form(form_type) => Some(form_type),
            _ => None,
        }
    }
}


/// The body of a group chunk.
/// Comparing two groups compares the kind, the form type,
/// and every child by position.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    kind: GroupKind,
    chunks: Vec<Chunk>,
}

impl Group {

    /// An empty group of the specified kind.
    pub fn new(kind: GroupKind) -> Self {
        Self::from_chunks(kind, Vec::new())
    }

    /// A group with the specified children, in file order.
    pub fn from_chunks(kind: GroupKind, chunks: Vec<Chunk>) -> Self {
        Group { kind, chunks }
    }

    /// An empty `FORM` of the specified type.
    pub fn form(form_type: Id) -> Self { Self::new(GroupKind::Form(form_type)) }

    /// An empty `LIST`.
    pub fn list() -> Self { Self::new(GroupKind::List) }

    /// An empty `CAT `.
    pub fn cat() -> Self { Self::new(GroupKind::Cat) }

    /// An empty `PROP`.
    pub fn prop() -> Self { Self::new(GroupKind::Prop) }

    /// Append a child and return the group, for building files.
    pub fn with(mut self, chunk: Chunk) -> Self {
        self.push(chunk);
        self
    }

    /// Append a payload chunk and return the group, for building files.
    pub fn with_data(self, id: Id, data: impl AnyChunkData) -> Self {
        self.with(Chunk::new(id, data))
    }

    /// Append a nested group and return the group, for building files.
    pub fn with_group(self, group: Group) -> Self {
        self.with(Chunk::group(group))
    }

    pub fn kind(&self) -> GroupKind { self.kind }

    /// The chunk id of this group, for example `FORM`.
    pub fn id(&self) -> Id { self.kind.id() }

    /// The form type, if this is a `FORM`.
    pub fn form_type(&self) -> Option<Id> { self.kind.form_type() }

    /// All children, in file order.
    pub fn children(&self) -> &[Chunk] { &self.chunks }

    /// All children, in file order.
    /// The size of the enclosing chunk must be updated after modifying a child,
    /// see `Chunk::modify_group`.
    pub fn children_mut(&mut self) -> &mut [Chunk] { &mut self.chunks }

    /// Whether this group has no children.
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    /// Number of direct children.
    pub fn len(&self) -> usize { self.chunks.len() }

    /// Append a child.
    pub fn push(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    /// Insert a child before the child at `index`.
    /// Panics if `index` is larger than the number of children.
    pub fn insert(&mut self, index: usize, chunk: Chunk) {
        self.chunks.insert(index, chunk);
    }

    /// Remove the child at `index`, if it exists.
    pub fn remove(&mut self, index: usize) -> Option<Chunk> {
        if index < self.chunks.len() { Some(self.chunks.remove(index)) }
        else { None }
    }

    /// The first direct child with the specified id.
    pub fn chunk(&self, id: Id) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| chunk.id() == id)
    }

    /// The first direct child with the specified id.
    /// The size of the enclosing chunk must be updated after modifying the child.
    pub fn chunk_mut(&mut self, id: Id) -> Option<&mut Chunk> {
        self.chunks.iter_mut().find(|chunk| chunk.id() == id)
    }

    /// All direct children with the specified id, in file order.
    pub fn chunks(&self, id: Id) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(move |chunk| chunk.id() == id)
    }

    /// The payload of the first direct child with the specified id, if it has type `T`.
    pub fn data<T: AnyChunkData>(&self, id: Id) -> Option<&T> {
        self.chunk(id).and_then(Chunk::data::<T>)
    }

    /// The payloads of all direct children with the specified id and of type `T`.
    pub fn all_data<T: AnyChunkData>(&self, id: Id) -> impl Iterator<Item = &T> {
        self.chunks(id).filter_map(Chunk::data::<T>)
    }

    /// All direct children that are a `FORM`.
    pub fn forms(&self) -> impl Iterator<Item = &Group> {
        self.chunks.iter()
            .filter_map(Chunk::as_group)
            .filter(|group| group.form_type().is_some())
    }

    /// All direct children that are a `PROP`.
    pub fn props(&self) -> impl Iterator<Item = &Group> {
        self.chunks.iter()
            .filter_map(Chunk::as_group)
            .filter(|group| group.kind == GroupKind::Prop)
    }

    /// The current body size: the form type, if any,
    /// plus header, body and pad byte of every child.
    pub fn byte_size(&self) -> usize {
        let type_byte_size = if self.form_type().is_some() { Id::BYTE_SIZE } else { 0 };
        type_byte_size + self.chunks.iter().map(Chunk::total_byte_size).sum::<usize>()
    }

    /// Update the cached sizes of all children, then return the body size.
    pub(crate) fn update_sizes(&mut self) -> usize {
        for chunk in &mut self.chunks {
            chunk.update_size();
        }

        self.byte_size()
    }
}


/// What a group passes down to its children while reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadContext {
    form_type: Option<Id>,
    depth: usize,
}

impl ReadContext {
    pub fn root() -> Self { ReadContext { form_type: None, depth: 0 } }

    /// The type of the innermost enclosing form, used to look up scoped chunk types.
    pub fn form_type(self) -> Option<Id> { self.form_type }
}


// reading and writing
impl Group {

    /// Read the body of a group chunk whose header has already been read.
    /// Consumes exactly `declared_size` bytes, not including the pad byte.
    pub(crate) fn read_body<R: Read>(
        read: &mut Tracking<R>, registry: &Registry, context: ReadContext,
        id: Id, declared_size: u32
    ) -> Result<Self>
    {
        let depth = context.depth + 1;
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::malformed(format!("groups nested deeper than {} levels", MAX_NESTING_DEPTH)));
        }

        let declared_byte_size = u32_to_usize(declared_size);
        let start = read.byte_position();

        let kind = match id {
            FORM => {
                if declared_byte_size < Id::BYTE_SIZE {
                    return Err(Error::size_mismatch(id, declared_size, Id::BYTE_SIZE as u64));
                }

                GroupKind::Form(Id::read(read)?)
            },

            LIST => GroupKind::List,
            CAT => GroupKind::Cat,
            PROP => GroupKind::Prop,
            other => return Err(Error::malformed(format!("{} is not a group id", other))),
        };

        let context = ReadContext {
            form_type: kind.form_type().or(context.form_type),
            depth,
        };

        let mut chunks = Vec::new();

        loop {
            let child_offset = read.byte_position();
            let processed = child_offset - start;

            if processed == declared_byte_size {
                break;
            }

            if declared_byte_size - processed < HEADER_BYTE_SIZE {
                return Err(Error::size_mismatch(id, declared_size, (processed + HEADER_BYTE_SIZE) as u64));
            }

            let (child_id, child_size) = read_header(read)?;
            let end_of_child = processed + total_byte_size(u32_to_usize(child_size));

            if end_of_child > declared_byte_size {
                let error = Error::size_mismatch(id, declared_size, end_of_child as u64);
                return Err(error.within(child_id, Some(child_offset)));
            }

            let chunk = read_chunk_body(read, registry, context, child_id, child_size)
                .map_err(|error| error.within(child_id, Some(child_offset)))?;

            chunks.push(chunk);
        }

        Ok(Group { kind, chunks })
    }

    /// Write the form type, if any, followed by all children.
    pub(crate) fn write_body(&self, write: &mut impl Write) -> UnitResult {
        if let Some(form_type) = self.form_type() {
            form_type.write(write)?;
        }

        for chunk in &self.chunks {
            chunk.write(write)?;
        }

        Ok(())
    }
}


// validating and printing
impl Group {

    /// Check the form type, the placement of nested groups,
    /// every child, and finally the rules registered for the form type.
    /// The scope describes the groups enclosing this group.
    pub fn validate(&self, scope: &Scope<'_>) -> UnitResult {
        if let Some(form_type) = self.form_type() {
            form_type.validate_form_type()?;
        }

        if self.kind == GroupKind::Prop && scope.group().map(Group::kind) != Some(GroupKind::List) {
            return Err(Error::invalid("a PROP must be a direct child of a LIST"));
        }

        let inner = scope.enter(self);

        for chunk in &self.chunks {
            if !chunk.is_group() && matches!(self.kind, GroupKind::List | GroupKind::Cat) {
                let error = Error::invalid(format!("{} can only contain groups", self.id()));
                return Err(error.within(chunk.id(), None));
            }

            chunk.validate_in(&inner)?;
        }

        if let Some(check) = self.form_type().and_then(|form_type| scope.registry().check(form_type)) {
            check(self, &inner)?;
        }

        Ok(())
    }

    /// Print the form type, if any, and all children.
    pub fn print(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        if let Some(form_type) = self.form_type() {
            print_line(out, indent, format_args!("formType = {};", form_type))?;
        }

        print_line(out, indent, format_args!("chunks = {{"))?;

        for chunk in &self.chunks {
            chunk.print(out, indent + 1)?;
        }

        print_line(out, indent, format_args!("}};"))
    }
}


/// The chain of groups enclosing a chunk, passed down during validation.
/// Allows a chunk to inspect its siblings and the properties
/// shared by enclosing lists, without the tree storing parent references.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    group: Option<&'a Group>,
    parent: Option<&'a Scope<'a>>,
    registry: &'a Registry,
}

impl<'a> Scope<'a> {

    /// The scope outside of the outermost chunk.
    pub fn root(registry: &'a Registry) -> Self {
        Scope { group: None, parent: None, registry }
    }

    /// The scope of the children of `group`, which is inside this scope.
    pub fn enter<'s>(&'s self, group: &'s Group) -> Scope<'s> {
        Scope { group: Some(group), parent: Some(self), registry: self.registry }
    }

    /// The registry used for validation.
    pub fn registry(&self) -> &'a Registry { self.registry }

    /// The innermost enclosing group, which contains the siblings of the current chunk.
    pub fn group(&self) -> Option<&'a Group> { self.group }

    /// The scope enclosing the innermost group.
    pub fn parent(&self) -> Option<&'a Scope<'a>> { self.parent }

    /// The innermost enclosing `FORM`.
    pub fn form(&self) -> Option<&'a Group> {
        let mut scope = Some(self);

        while let Some(current) = scope {
            if let Some(group) = current.group.filter(|group| group.form_type().is_some()) {
                return Some(group);
            }

            scope = current.parent;
        }

        None
    }

    /// The type of the innermost enclosing `FORM`.
    pub fn form_type(&self) -> Option<Id> {
        self.form().and_then(Group::form_type)
    }

    /// Find a property chunk: first among the siblings,
    /// then in the `PROP` groups of all enclosing lists, innermost first.
    pub fn property(&self, id: Id) -> Option<&'a Chunk> {
        if let Some(chunk) = self.group.and_then(|group| group.chunk(id)) {
            return Some(chunk);
        }

        let mut enclosing = self.parent;

        while let Some(scope) = enclosing {
            if let Some(list) = scope.group.filter(|group| group.kind == GroupKind::List) {
                if let Some(shared) = list.props().find_map(|prop| prop.chunk(id)) {
                    return Some(shared);
                }
            }

            enclosing = scope.parent;
        }

        None
    }
}
