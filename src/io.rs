//! Specialized binary input and output.
//! Uses the error handling for this crate.
//! All numbers in iff files are stored in big-endian byte order.

pub use ::std::io::{Read, Write};
use lebe::prelude::*;
use crate::error::{Error, Result, UnitResult, IoResult, u32_to_usize};
use crate::id::Id;


/// Null-terminated texts longer than this, including the terminator, are rejected.
pub const MAX_STRING_LENGTH: usize = 1024;


/// Peek a single byte without consuming it.
#[derive(Debug)]
pub struct PeekRead<T> {

    /// Cannot be exposed as it will not contain peeked values anymore.
    inner: T,

    peeked: Option<IoResult<u8>>,
}

impl<T: Read> PeekRead<T> {

    #[inline]
    pub fn new(inner: T) -> Self {
        Self { inner, peeked: None }
    }

    /// Read a single byte and return that without consuming it.
    /// The next `read` call will include that byte.
    #[inline]
    pub fn peek_u8(&mut self) -> &IoResult<u8> {
        let inner = &mut self.inner;
        self.peeked.get_or_insert_with(|| u8::read_from_big_endian(inner))
    }

    /// Whether the inner reader has no more bytes.
    /// Consumes the peeked result if an error other than the end of the stream occurred.
    #[inline]
    pub fn is_exhausted(&mut self) -> IoResult<bool> {
        match self.peek_u8() {
            Ok(_) => Ok(false),
            Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => Ok(true),

            // we need to take() from self because io errors cannot be cloned.
            Err(_) => match self.peeked.take() {
                Some(Err(error)) => Err(error),
                _ => Ok(false),
            }
        }
    }
}

impl<T: Read> Read for PeekRead<T> {
    fn read(&mut self, target_buffer: &mut [u8]) -> IoResult<usize> {
        if target_buffer.is_empty() {
            return Ok(0)
        }

        match self.peeked.take() {
            None => self.inner.read(target_buffer),
            Some(peeked) => {
                target_buffer[0] = peeked?;

                // indexing [1..] is safe because an empty buffer already returned ok
                Ok(1 + self.inner.read(&mut target_buffer[1..])?)
            }
        }
    }
}


/// Keep track of what byte we are at.
/// Used to annotate errors with the offset of the failing chunk.
#[derive(Debug)]
pub struct Tracking<T> {

    /// Do not expose to prevent reading without updating position
    inner: T,

    position: usize,
}

impl<T: Read> Read for Tracking<T> {
    fn read(&mut self, buffer: &mut [u8]) -> IoResult<usize> {
        let count = self.inner.read(buffer)?;
        self.position += count;
        Ok(count)
    }
}

impl<T: Write> Write for Tracking<T> {
    fn write(&mut self, buffer: &[u8]) -> IoResult<usize> {
        let count = self.inner.write(buffer)?;
        self.position += count;
        Ok(count)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.inner.flush()
    }
}

impl<T> Tracking<T> {

    pub fn new(inner: T) -> Self {
        Tracking { inner, position: 0 }
    }

    /// Current number of bytes written or read.
    pub fn byte_position(&self) -> usize {
        self.position
    }

    /// Give back the wrapped reader or writer.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Tracking<PeekRead<T>> {

    /// Whether no more bytes follow. Does not advance the position.
    pub fn is_exhausted(&mut self) -> IoResult<bool> {
        self.inner.is_exhausted()
    }
}


/// Generic trait that defines common binary operations such as reading and writing for this type.
pub trait Data: Sized + Default + Clone {
    const BYTE_SIZE: usize = ::std::mem::size_of::<Self>();

    /// Read a value of type `Self`.
    fn read(read: &mut impl Read) -> Result<Self>;

    /// Read as many values of type `Self` as fit into the specified slice.
    /// If the slice cannot be filled completely, returns `Error::TruncatedStream`.
    fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> UnitResult;

    /// Read as many values of type `Self` as specified with `data_size`.
    ///
    /// This method will not allocate more memory than `soft_max` at once.
    /// If `hard_max` is specified, it will never read any more than that.
    #[inline]
    fn read_vec(read: &mut impl Read, data_size: usize, soft_max: usize, hard_max: Option<usize>) -> Result<Vec<Self>> {
        let mut vec = Vec::with_capacity(data_size.min(soft_max));
        Self::read_into_vec(read, &mut vec, data_size, soft_max, hard_max)?;
        Ok(vec)
    }

    /// Write this value to the writer.
    fn write(self, write: &mut impl Write) -> UnitResult;

    /// Write all values of that slice to the writer.
    fn write_slice(write: &mut impl Write, slice: &[Self]) -> UnitResult;

    /// Read as many values of type `Self` as specified with `data_size` into the provided vector.
    ///
    /// This method will not allocate more memory than `soft_max` at once,
    /// so that a corrupt size field does not allocate gigabytes before failing.
    #[inline]
    fn read_into_vec(read: &mut impl Read, data: &mut Vec<Self>, data_size: usize, soft_max: usize, hard_max: Option<usize>) -> UnitResult {
        if let Some(max) = hard_max {
            if data_size > max {
                return Err(Error::invalid("content size"))
            }
        }

        let soft_max = hard_max.unwrap_or(soft_max).min(soft_max).max(1);
        let end = data.len() + data_size;

        // (most of the time, this loop will run only once)
        while data.len() < end {
            let chunk_start = data.len();
            let chunk_end = (chunk_start + soft_max).min(end);

            data.resize(chunk_end, Self::default());
            Self::read_slice(read, &mut data[chunk_start .. chunk_end])?;
        }

        Ok(())
    }
}


macro_rules! implement_data_for_primitive {
    ($kind: ident) => {
        impl Data for $kind {
            #[inline]
            fn read(read: &mut impl Read) -> Result<Self> {
                Ok(read.read_from_big_endian()?)
            }

            #[inline]
            fn write(self, write: &mut impl Write) -> Result<()> {
                write.write_as_big_endian(&self)?;
                Ok(())
            }

            #[inline]
            fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> Result<()> {
                read.read_from_big_endian_into(slice)?;
                Ok(())
            }

            #[inline]
            fn write_slice(write: &mut impl Write, slice: &[Self]) -> Result<()> {
                write.write_as_big_endian(slice)?;
                Ok(())
            }
        }
    };
}

implement_data_for_primitive!(u8);
implement_data_for_primitive!(i8);
implement_data_for_primitive!(i16);
implement_data_for_primitive!(u16);
implement_data_for_primitive!(u32);
implement_data_for_primitive!(i32);

impl Data for Id {
    const BYTE_SIZE: usize = 4;

    #[inline]
    fn read(read: &mut impl Read) -> Result<Self> {
        let mut bytes = [0_u8; 4];
        u8::read_slice(read, &mut bytes)?;
        Ok(Id(bytes))
    }

    #[inline]
    fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> UnitResult {
        for id in slice { *id = Id::read(read)?; }
        Ok(())
    }

    #[inline]
    fn write(self, write: &mut impl Write) -> UnitResult {
        u8::write_slice(write, &self.0)
    }

    #[inline]
    fn write_slice(write: &mut impl Write, slice: &[Self]) -> UnitResult {
        for id in slice { id.write(write)?; }
        Ok(())
    }
}


/// The body of a single chunk, read field by field.
/// Knows the declared size of the chunk and refuses to read beyond it,
/// and counts the bytes processed so far.
pub struct ChunkReader<'r> {
    read: &'r mut dyn Read,
    id: Id,
    declared_size: u32,
    processed: u32,
}

impl<'r> ChunkReader<'r> {

    /// Read the body of the chunk `id` which has `declared_size` bytes.
    pub fn new(read: &'r mut dyn Read, id: Id, declared_size: u32) -> Self {
        ChunkReader { read, id, declared_size, processed: 0 }
    }

    /// The id of the chunk being read.
    pub fn id(&self) -> Id { self.id }

    /// The byte count from the chunk header, excluding the pad byte.
    pub fn declared_size(&self) -> u32 { self.declared_size }

    /// The number of body bytes consumed so far.
    pub fn processed(&self) -> u32 { self.processed }

    /// The number of body bytes not yet consumed.
    pub fn remaining(&self) -> u32 { self.declared_size - self.processed }

    /// Count `byte_count` bytes as consumed, if they are still available.
    fn consume(&mut self, byte_count: usize) -> UnitResult {
        let available = u32_to_usize(self.remaining());

        if byte_count > available {
            return Err(Error::size_mismatch(
                self.id, self.declared_size,
                u64::from(self.processed) + byte_count as u64
            ));
        }

        self.processed += byte_count as u32; // cannot overflow because it is at most `declared_size`
        Ok(())
    }

    /// Read a single fixed-width big-endian field.
    pub fn read_field<T: Data>(&mut self) -> Result<T> {
        self.consume(T::BYTE_SIZE)?;
        T::read(&mut self.read)
    }

    /// Read `count` consecutive fixed-width fields.
    pub fn read_fields<T: Data>(&mut self, count: usize) -> Result<Vec<T>> {
        self.consume(count.saturating_mul(T::BYTE_SIZE))?;
        T::read_vec(&mut self.read, count, 4096, None)
    }

    /// Read an opaque blob of `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.read_fields::<u8>(count)
    }

    /// Read all bytes of this chunk that have not been processed yet.
    pub fn read_remaining(&mut self) -> Result<Vec<u8>> {
        let remaining = u32_to_usize(self.remaining());
        self.read_bytes(remaining)
    }

    /// Read bytes until a null byte is found. The terminator is consumed but not returned.
    /// Fails if no terminator is found within `max_length` bytes, including the terminator.
    pub fn read_null_terminated(&mut self, max_length: usize) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();

        loop {
            if bytes.len() + 1 > max_length {
                return Err(Error::UnboundedString { max_length });
            }

            match self.read_field::<u8>()? {
                0 => break,
                non_terminator => bytes.push(non_terminator),
            }
        }

        Ok(bytes)
    }

    /// Check that the whole body was processed.
    pub fn finish(self) -> UnitResult {
        if self.processed != self.declared_size {
            return Err(Error::size_mismatch(self.id, self.declared_size, self.processed));
        }

        Ok(())
    }
}


/// The body of a single chunk, written field by field.
/// Counts the bytes written, such that the count can be compared
/// to the size that was announced in the chunk header.
pub struct ChunkWriter<'w> {
    write: &'w mut dyn Write,
    written: usize,
}

impl<'w> ChunkWriter<'w> {

    pub fn new(write: &'w mut dyn Write) -> Self {
        ChunkWriter { write, written: 0 }
    }

    /// The number of body bytes written so far.
    pub fn written(&self) -> usize { self.written }

    /// Write a single fixed-width big-endian field.
    pub fn write_field<T: Data>(&mut self, value: T) -> UnitResult {
        value.write(&mut self.write)?;
        self.written += T::BYTE_SIZE;
        Ok(())
    }

    /// Write consecutive fixed-width fields.
    pub fn write_fields<T: Data>(&mut self, values: &[T]) -> UnitResult {
        T::write_slice(&mut self.write, values)?;
        self.written += values.len() * T::BYTE_SIZE;
        Ok(())
    }

    /// Write an opaque blob.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> UnitResult {
        self.write_fields(bytes)
    }

    /// Write the text followed by a single null byte.
    pub fn write_null_terminated(&mut self, text: &[u8]) -> UnitResult {
        debug_assert!(!text.contains(&0), "text contains a null byte bug");

        self.write_bytes(text)?;
        self.write_field(0_u8)
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn peek(){
        let buffer: &[u8] = &[0,1,2,3];
        let mut peek = PeekRead::new(buffer);

        assert_eq!(peek.peek_u8().as_ref().unwrap(), &0);
        assert_eq!(peek.peek_u8().as_ref().unwrap(), &0);
        assert_eq!(u8::read_from_big_endian(&mut peek).unwrap(), 0_u8);

        assert_eq!(peek.read(&mut [0,0]).unwrap(), 2);

        assert!(!peek.is_exhausted().unwrap());
        assert_eq!(u8::read_from_big_endian(&mut peek).unwrap(), 3_u8);

        assert!(peek.is_exhausted().unwrap());
        assert!(peek.is_exhausted().unwrap());
        assert!(u8::read_from_big_endian(&mut peek).is_err());
    }

    #[test]
    fn tracking_counts_bytes(){
        let buffer: &[u8] = &[0,1,2,3,4];
        let mut read = Tracking::new(buffer);
        u16::read(&mut read).unwrap();
        assert_eq!(read.byte_position(), 2);
    }

    #[test]
    fn big_endian_fields(){
        let mut bytes: &[u8] = &[0x01, 0x40, 0xFF, 0xFE, b'I', b'L', b'B', b'M'];
        let mut reader = ChunkReader::new(&mut bytes, Id(*b"TEST"), 8);

        assert_eq!(reader.read_field::<u16>().unwrap(), 320);
        assert_eq!(reader.read_field::<i16>().unwrap(), -2);
        assert_eq!(reader.read_field::<Id>().unwrap(), Id(*b"ILBM"));
        assert_eq!(reader.remaining(), 0);
        reader.finish().unwrap();
    }

    #[test]
    fn reader_refuses_overrun(){
        let mut bytes: &[u8] = &[1, 2, 3, 4];
        let mut reader = ChunkReader::new(&mut bytes, Id(*b"TEST"), 3);

        assert_eq!(reader.read_field::<u16>().unwrap(), 0x0102);
        match reader.read_field::<u16>() {
            Err(Error::SizeMismatch { declared: 3, actual: 4, .. }) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn reader_reports_underrun(){
        let mut bytes: &[u8] = &[1, 2, 3, 4];
        let mut reader = ChunkReader::new(&mut bytes, Id(*b"TEST"), 4);
        reader.read_field::<u16>().unwrap();
        assert!(matches!(reader.finish(), Err(Error::SizeMismatch { declared: 4, actual: 2, .. })));
    }

    #[test]
    fn reader_reports_truncation(){
        let mut bytes: &[u8] = &[1, 2];
        let mut reader = ChunkReader::new(&mut bytes, Id(*b"TEST"), 4);
        assert!(matches!(reader.read_field::<u32>(), Err(Error::TruncatedStream)));
    }

    #[test]
    fn null_terminated_text(){
        let mut bytes: &[u8] = b"red\0green\0";
        let mut reader = ChunkReader::new(&mut bytes, Id(*b"TEST"), 10);
        assert_eq!(reader.read_null_terminated(16).unwrap(), b"red");
        assert_eq!(reader.read_null_terminated(16).unwrap(), b"green");
        assert_eq!(reader.processed(), 10);
    }

    #[test]
    fn null_terminated_text_is_bounded(){
        let mut bytes: &[u8] = b"abcdefgh\0";
        let mut reader = ChunkReader::new(&mut bytes, Id(*b"TEST"), 9);
        assert!(matches!(reader.read_null_terminated(4), Err(Error::UnboundedString { max_length: 4 })));
    }

    #[test]
    fn writer_counts(){
        let mut bytes = Vec::new();
        let mut writer = ChunkWriter::new(&mut bytes);
        writer.write_field(320_u16).unwrap();
        writer.write_null_terminated(b"red").unwrap();
        writer.write_field(Id(*b"ILBM")).unwrap();

        assert_eq!(writer.written(), 10);
        assert_eq!(bytes, [0x01, 0x40, b'r', b'e', b'd', 0, b'I', b'L', b'B', b'M']);
    }
}
