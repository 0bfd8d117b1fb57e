//! Delta encoding of record runs.
//!
//! A symbol's records are stored as a `_DATA_` header followed by
//! delta-compressed keys and tagged values. The header fixes a per-dimension
//! key range; from the range width each dimension gets an on-disk delta
//! width of one, two or four bytes. Every record starts with a selector
//! byte: `f+1` when dimensions `f..` changed, `dim+delta` as a fused fast
//! case for small steps on the last dimension, and 255 to end the run.

use std::io::{Read, Seek, Write};

use crate::error::{Error, ErrorKind, Result};
use crate::format::{END_OF_DATA, MARK_DATA, MAX_DIM, VM_NORMAL};
use crate::specials::SpecialValues;
use crate::stream::BufferedStream;

/// On-disk width of one dimension's key delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Byte,
    Word,
    Int,
}

fn width_for(min: i32, max: i32) -> Width {
    let diff = max as i64 - min as i64;
    if diff < 0 || diff >= 65536 {
        Width::Int
    } else if diff <= 255 {
        Width::Byte
    } else {
        Width::Word
    }
}

/// Streaming encoder for one symbol's record run.
#[derive(Debug)]
pub(crate) struct KeyEncoder {
    dim: usize,
    min: [i32; MAX_DIM],
    widths: [Width; MAX_DIM],
    last: [i32; MAX_DIM],
    started: bool,
}

impl KeyEncoder {
    /// Write the `_DATA_` header for the given key ranges and return the
    /// encoder for the run.
    pub fn begin<S: Read + Write + Seek>(
        stream: &mut BufferedStream<S>,
        dim: usize,
        min: &[i32],
        max: &[i32],
    ) -> Result<KeyEncoder> {
        stream.write_str(MARK_DATA)?;
        stream.write_u8(dim as u8)?;
        // Placeholder; readers skip it.
        stream.write_i32(-1)?;
        let mut enc = KeyEncoder {
            dim,
            min: [0; MAX_DIM],
            widths: [Width::Int; MAX_DIM],
            last: [0; MAX_DIM],
            started: false,
        };
        for d in 0..dim {
            stream.write_i32(min[d])?;
            stream.write_i32(max[d])?;
            enc.min[d] = min[d];
            enc.widths[d] = width_for(min[d], max[d]);
        }
        Ok(enc)
    }

    /// Encode one key. Keys must arrive in strictly increasing
    /// lexicographic order; violations leave the stream untouched.
    pub fn write_key<S: Read + Write + Seek>(
        &mut self,
        stream: &mut BufferedStream<S>,
        key: &[i32],
    ) -> Result<()> {
        if self.dim == 0 {
            if self.started {
                return Err(Error::new(ErrorKind::DuplicateKey));
            }
            self.started = true;
            return stream.write_u8(1);
        }
        let first = if self.started {
            let mut first = None;
            for d in 0..self.dim {
                if self.last[d] < key[d] {
                    first = Some(d);
                    break;
                }
                if self.last[d] > key[d] {
                    return Err(Error::new(ErrorKind::KeyOutOfOrder));
                }
            }
            first.ok_or_else(|| Error::new(ErrorKind::DuplicateKey))?
        } else {
            0
        };
        let delta = key[first] as i64 - self.last[first] as i64;
        if self.started && first == self.dim - 1 && delta < 255 - self.dim as i64 {
            stream.write_u8((self.dim as i64 + delta) as u8)?;
            self.last[self.dim - 1] = key[self.dim - 1];
            return Ok(());
        }
        self.started = true;
        stream.write_u8(first as u8 + 1)?;
        for d in first..self.dim {
            self.last[d] = key[d];
            let delta = key[d].wrapping_sub(self.min[d]);
            match self.widths[d] {
                Width::Byte => stream.write_u8(delta as u8)?,
                Width::Word => stream.write_u16(delta as u16)?,
                Width::Int => stream.write_i32(delta)?,
            }
        }
        Ok(())
    }

    /// Terminate the run.
    pub fn finish<S: Read + Write + Seek>(&mut self, stream: &mut BufferedStream<S>) -> Result<()> {
        stream.write_u8(END_OF_DATA)
    }
}

/// Streaming decoder for one symbol's record run.
#[derive(Debug)]
pub(crate) struct KeyDecoder {
    dim: usize,
    min: [i32; MAX_DIM],
    widths: [Width; MAX_DIM],
    last: [i32; MAX_DIM],
}

impl KeyDecoder {
    /// Parse the `_DATA_` header at the current position. `expect_dim` is
    /// the dimension recorded in the symbol table.
    pub fn begin<S: Read + Write + Seek>(
        stream: &mut BufferedStream<S>,
        expect_dim: usize,
    ) -> Result<KeyDecoder> {
        if stream.read_str()? != MARK_DATA {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        let dim = stream.read_u8()? as usize;
        if dim > MAX_DIM || dim != expect_dim {
            return Err(Error::new(ErrorKind::Corrupt));
        }
        stream.read_i32()?;
        let mut dec = KeyDecoder {
            dim,
            min: [0; MAX_DIM],
            widths: [Width::Int; MAX_DIM],
            last: [0; MAX_DIM],
        };
        for d in 0..dim {
            let min = stream.read_i32()?;
            let max = stream.read_i32()?;
            dec.min[d] = min;
            dec.widths[d] = width_for(min, max);
        }
        Ok(dec)
    }

    /// Decode the next key into `key`. Returns the 1-based first changed
    /// dimension (0 for scalars), or `None` at the end of the run.
    pub fn read_key<S: Read + Write + Seek>(
        &mut self,
        stream: &mut BufferedStream<S>,
        key: &mut [i32],
    ) -> Result<Option<usize>> {
        let selector = stream.read_u8()?;
        if selector == END_OF_DATA {
            return Ok(None);
        }
        let first;
        if selector as usize > self.dim {
            if self.dim == 0 {
                return Ok(Some(0));
            }
            self.last[self.dim - 1] += selector as i32 - self.dim as i32;
            first = self.dim;
        } else {
            if selector == 0 {
                return Err(Error::new(ErrorKind::Corrupt));
            }
            first = selector as usize;
            for d in first - 1..self.dim {
                let delta = match self.widths[d] {
                    Width::Byte => stream.read_u8()? as i32,
                    Width::Word => stream.read_u16()? as i32,
                    Width::Int => stream.read_i32()?,
                };
                self.last[d] = self.min[d].wrapping_add(delta);
            }
        }
        key[..self.dim].copy_from_slice(&self.last[..self.dim]);
        Ok(Some(first))
    }
}

/// Write one record's value slots.
pub(crate) fn write_values<S: Read + Write + Seek>(
    stream: &mut BufferedStream<S>,
    specials: &SpecialValues,
    values: &[f64],
) -> Result<()> {
    for &v in values {
        let (tag, raw) = specials.encode(v);
        stream.write_u8(tag)?;
        if let Some(raw) = raw {
            stream.write_f64(raw)?;
        }
    }
    Ok(())
}

/// Read one record's value slots.
pub(crate) fn read_values<S: Read + Write + Seek>(
    stream: &mut BufferedStream<S>,
    specials: &SpecialValues,
    values: &mut [f64],
) -> Result<()> {
    for slot in values {
        let tag = stream.read_u8()?;
        let raw = if tag == VM_NORMAL {
            Some(stream.read_f64()?)
        } else {
            None
        };
        *slot = specials.decode(tag, raw)?;
    }
    Ok(())
}
