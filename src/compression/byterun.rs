//! The run-length encoding used for bitmap bodies.
//!
//! Each run starts with a signed control byte `n`:
//! `0 ..= 127` copies the next `n + 1` bytes literally,
//! `-127 ..= -1` repeats the next byte `1 - n` times,
//! and `-128` is a no-op.

use super::*;
use super::Error;
use super::Result;
use crate::error::UnitResult;

/// Runs of at least this many equal bytes are always stored as a replicate run.
const MIN_REPLICATE_LENGTH: usize = 2;

/// Neither a literal run nor a replicate run can be longer than this.
const MAX_RUN_LENGTH: usize = 128;

/// The control byte that is skipped when decoding.
const NO_OP: i8 = -128;


/// Decompress a single row, reading only as many bytes as the row requires.
/// Advances `remaining` to the start of the next row.
pub fn decompress_row(remaining: &mut Bytes<'_>, row_bytes: usize) -> Result<ByteVec> {
    let mut decompressed = Vec::with_capacity(row_bytes);
    decompress_into(remaining, &mut decompressed, row_bytes)?;
    Ok(decompressed)
}

/// Decompress `row_count` rows of `row_bytes` bytes each.
/// Bytes after the last row are ignored, as they may be padding.
pub fn decompress_rows(compressed: Bytes<'_>, row_bytes: usize, row_count: usize) -> Result<ByteVec> {
    let expected_byte_size = row_bytes.checked_mul(row_count)
        .ok_or_else(|| Error::invalid("row dimensions too large"))?;

    // a corrupt header should not allocate gigabytes before failing
    let mut decompressed = Vec::with_capacity(expected_byte_size.min(8 * 2048));
    let mut remaining = compressed;

    for _ in 0 .. row_count {
        decompress_into(&mut remaining, &mut decompressed, row_bytes)?;
    }

    debug_assert_eq!(decompressed.len(), expected_byte_size, "decompression size bug");
    Ok(decompressed)
}

/// Append exactly `expected_byte_size` decoded bytes to `decompressed`.
/// Fails instead of writing more than that, or reading past the end of `remaining`.
fn decompress_into(remaining: &mut Bytes<'_>, decompressed: &mut ByteVec, expected_byte_size: usize) -> UnitResult {
    let end = decompressed.len() + expected_byte_size;

    while decompressed.len() < end {
        let count = take_1(remaining)? as i8;
        let available = end - decompressed.len();

        if count == NO_OP {
            continue;
        }

        if count >= 0 {
            // take the next 'count + 1' bytes as-is
            let length = count as usize + 1;
            if length > available {
                return Err(run_too_long(length, available));
            }

            let values = take_n(remaining, length)?;
            decompressed.extend_from_slice(values);
        }
        else {
            // repeat the next value '1 - count' times
            let length = (1 - i32::from(count)) as usize;
            if length > available {
                return Err(run_too_long(length, available));
            }

            let value = take_1(remaining)?;
            decompressed.resize(decompressed.len() + length, value);
        }
    }

    Ok(())
}

fn run_too_long(length: usize, available: usize) -> Error {
    Error::compression_bounds(format!(
        "run of {} bytes exceeds the {} bytes left in the row",
        length, available
    ))
}


/// Compress a sequence of bytes, usually a single row.
/// Equal bytes are stored as a replicate run as soon as there are two of them.
/// Everything else is collected in literal runs.
pub fn compress_bytes(data: Bytes<'_>) -> ByteVec {
    let mut compressed = Vec::with_capacity(data.len() + data.len() / MAX_RUN_LENGTH + 1);
    let mut run_start = 0;

    while run_start < data.len() {
        let mut run_end = run_start + 1;

        while
            run_end < data.len()
                && data[run_start] == data[run_end]
                && run_end - run_start < MAX_RUN_LENGTH
            {
                run_end += 1;
            }

        if run_end - run_start >= MIN_REPLICATE_LENGTH {
            compressed.push((1 - (run_end - run_start) as i32) as i8 as u8);
            compressed.push(data[run_start]);
            run_start = run_end;
        }
        else {
            // extend the literal until a replicate run begins
            while
                run_end < data.len()
                    && run_end - run_start < MAX_RUN_LENGTH
                    && !(run_end + 1 < data.len() && data[run_end] == data[run_end + 1])
                {
                    run_end += 1;
                }

            compressed.push((run_end - run_start - 1) as u8);
            compressed.extend_from_slice(&data[run_start .. run_end]);
            run_start = run_end;
        }
    }

    compressed
}

/// Compress consecutive rows of `row_bytes` bytes each.
/// Each row is compressed on its own, such that a run never spans two rows.
pub fn compress_rows(rows: Bytes<'_>, row_bytes: usize) -> Result<ByteVec> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    if row_bytes == 0 || rows.len() % row_bytes != 0 {
        return Err(Error::invalid(format!(
            "{} bytes cannot be split into rows of {} bytes",
            rows.len(), row_bytes
        )));
    }

    Ok(compress_row_chunks(rows, row_bytes))
}

#[cfg(feature = "rayon")]
fn compress_row_chunks(rows: Bytes<'_>, row_bytes: usize) -> ByteVec {
    use rayon::prelude::*;

    let compressed_rows: Vec<ByteVec> = rows
        .par_chunks(row_bytes)
        .map(compress_bytes)
        .collect();

    compressed_rows.concat()
}

#[cfg(not(feature = "rayon"))]
fn compress_row_chunks(rows: Bytes<'_>, row_bytes: usize) -> ByteVec {
    rows.chunks(row_bytes).flat_map(compress_bytes).collect()
}


fn take_1(slice: &mut &[u8]) -> Result<u8> {
    if !slice.is_empty() {
        let result = slice[0];
        *slice = &slice[1..];
        Ok(result)

    } else {
        Err(Error::compression_bounds("compressed data ends within a row"))
    }
}

fn take_n<'s>(slice: &mut &'s [u8], n: usize) -> Result<&'s [u8]> {
    if n <= slice.len() {
        let (front, back) = slice.split_at(n);
        *slice = back;
        Ok(front)

    } else {
        Err(Error::compression_bounds("compressed data ends within a literal run"))
    }
}
