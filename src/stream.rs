//! Buffered, endian-corrected, optionally compressed file I/O.
//!
//! All integers and doubles are written little-endian, preceded once per
//! file by a signature describing the layout; readers byte-swap on the fly
//! when the signature reads back reversed. While compression is active the
//! stream moves data in 32 KiB frames, each independently deflated with a
//! raw fallback when deflate does not shrink the payload.

use std::io::{Read, Seek, SeekFrom, Write};

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::{Error, ErrorKind, Result};
use crate::format::{FRAME_SIZE, MAX_TEXT_LEN, PATTERN_DOUBLE, PATTERN_INTEGER, PATTERN_WORD};

/// Per-frame header: flag byte plus big-endian payload length.
const FRAME_HEADER: usize = 3;

/// A positioned stream of typed values over `S`.
///
/// Reading and writing may be interleaved (append mode does both); the
/// caller is responsible for seeking between the two.
#[derive(Debug)]
pub(crate) struct BufferedStream<S> {
    inner: S,
    compress: bool,
    // Pending frame contents; write side fills `wbuf`, read side drains
    // `rbuf[rpos..]`. Both are in use only while compression is active.
    wbuf: Vec<u8>,
    rbuf: Vec<u8>,
    rpos: usize,
    scratch: Vec<u8>,
    swap_word: bool,
    swap_int: bool,
    swap_double: bool,
}

impl<S: Read + Write + Seek> BufferedStream<S> {
    /// Wrap a stream opened for writing and emit the endianness signature.
    pub fn create(inner: S) -> Result<Self> {
        let mut stream = BufferedStream::bare(inner);
        stream.write_signature()?;
        Ok(stream)
    }

    /// Wrap a stream opened for reading and consume the endianness
    /// signature, determining the per-type byte-swap flags.
    pub fn open(inner: S) -> Result<Self> {
        let mut stream = BufferedStream::bare(inner);
        stream.read_signature()?;
        Ok(stream)
    }

    fn bare(inner: S) -> Self {
        BufferedStream {
            inner,
            compress: false,
            wbuf: Vec::with_capacity(FRAME_SIZE),
            rbuf: Vec::new(),
            rpos: 0,
            scratch: Vec::new(),
            swap_word: false,
            swap_int: false,
            swap_double: false,
        }
    }

    fn write_signature(&mut self) -> Result<()> {
        self.write_u8(2)?;
        self.write_u16(PATTERN_WORD)?;
        self.write_u8(4)?;
        self.write_i32(PATTERN_INTEGER)?;
        self.write_u8(8)?;
        self.write_f64(PATTERN_DOUBLE)?;
        Ok(())
    }

    fn read_signature(&mut self) -> Result<()> {
        self.swap_word = self.check_pattern(2, &PATTERN_WORD.to_le_bytes())?;
        self.swap_int = self.check_pattern(4, &PATTERN_INTEGER.to_le_bytes())?;
        self.swap_double = self.check_pattern(8, &PATTERN_DOUBLE.to_le_bytes())?;
        Ok(())
    }

    fn check_pattern(&mut self, size: u8, expect: &[u8]) -> Result<bool> {
        if self.read_u8()? != size {
            return Err(Error::new(ErrorKind::IncompatibleEncoding));
        }
        let mut buf = [0u8; 8];
        let buf = &mut buf[..size as usize];
        self.read_bytes(buf)?;
        if *buf == *expect {
            return Ok(false);
        }
        buf.reverse();
        if *buf == *expect {
            return Ok(true);
        }
        Err(Error::new(ErrorKind::IncompatibleEncoding))
    }

    /// Switch frame compression on or off. Turning it off flushes any
    /// pending write frame; any undrained read frame is discarded.
    pub fn set_compression(&mut self, on: bool) -> Result<()> {
        if self.compress == on {
            return Ok(());
        }
        if self.compress {
            if !self.wbuf.is_empty() {
                self.flush_frame()?;
            }
            self.rbuf.clear();
            self.rpos = 0;
        }
        self.compress = on;
        Ok(())
    }

    /// The current position of the underlying stream.
    ///
    /// Only meaningful at frame boundaries; callers record positions after
    /// [`set_compression`](Self::set_compression) has flushed.
    pub fn position(&mut self) -> Result<u64> {
        debug_assert!(self.wbuf.is_empty());
        Ok(self.inner.seek(SeekFrom::Current(0))?)
    }

    /// Reposition the underlying stream, invalidating the read window.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        debug_assert!(self.wbuf.is_empty());
        self.inner.seek(SeekFrom::Start(pos))?;
        self.rbuf.clear();
        self.rpos = 0;
        Ok(())
    }

    /// Unwrap the stream, giving back the underlying source.
    #[cfg(test)]
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Flush any pending frame and the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        if !self.wbuf.is_empty() {
            self.flush_frame()?;
        }
        self.inner.flush()?;
        Ok(())
    }

    pub fn write_bytes(&mut self, mut data: &[u8]) -> Result<()> {
        if !self.compress {
            self.inner.write_all(data)?;
            return Ok(());
        }
        while !data.is_empty() {
            let free = FRAME_SIZE - self.wbuf.len();
            if free == 0 {
                self.flush_frame()?;
                continue;
            }
            let take = free.min(data.len());
            self.wbuf.extend_from_slice(&data[..take]);
            data = &data[take..];
        }
        Ok(())
    }

    fn flush_frame(&mut self) -> Result<()> {
        let mut deflate = Compress::new(Compression::default(), true);
        self.scratch.clear();
        self.scratch.resize(FRAME_SIZE, 0);
        let status = deflate.compress(&self.wbuf, &mut self.scratch, FlushCompress::Finish);
        let mut header = [0u8; FRAME_HEADER];
        match status {
            Ok(Status::StreamEnd) => {
                let n = deflate.total_out() as usize;
                header[0] = 1;
                header[1] = (n >> 8) as u8;
                header[2] = n as u8;
                self.inner.write_all(&header)?;
                self.inner.write_all(&self.scratch[..n])?;
            }
            // Deflate could not fit below the raw frame size; store raw.
            _ => {
                let n = self.wbuf.len();
                header[0] = 0;
                header[1] = (n >> 8) as u8;
                header[2] = n as u8;
                self.inner.write_all(&header)?;
                self.inner.write_all(&self.wbuf)?;
            }
        }
        self.wbuf.clear();
        Ok(())
    }

    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if !self.compress {
            self.inner.read_exact(buf)?;
            return Ok(());
        }
        let mut done = 0;
        while done < buf.len() {
            if self.rpos == self.rbuf.len() {
                self.load_frame()?;
            }
            let avail = self.rbuf.len() - self.rpos;
            let take = avail.min(buf.len() - done);
            buf[done..done + take].copy_from_slice(&self.rbuf[self.rpos..self.rpos + take]);
            self.rpos += take;
            done += take;
        }
        Ok(())
    }

    fn load_frame(&mut self) -> Result<()> {
        let mut header = [0u8; FRAME_HEADER];
        self.inner.read_exact(&mut header)?;
        let len = ((header[1] as usize) << 8) | header[2] as usize;
        self.scratch.clear();
        self.scratch.resize(len, 0);
        self.inner.read_exact(&mut self.scratch)?;
        self.rpos = 0;
        if header[0] == 0 {
            std::mem::swap(&mut self.rbuf, &mut self.scratch);
            return Ok(());
        }
        self.rbuf.clear();
        self.rbuf.reserve(FRAME_SIZE);
        let mut inflate = Decompress::new(true);
        inflate
            .decompress_vec(&self.scratch, &mut self.rbuf, FlushDecompress::Finish)
            .map_err(|_| Error::new(ErrorKind::Corrupt))?;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_bytes(&mut buf)?;
        let v = u16::from_le_bytes(buf);
        Ok(if self.swap_word { v.swap_bytes() } else { v })
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        let v = i32::from_le_bytes(buf);
        Ok(if self.swap_int { v.swap_bytes() } else { v })
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        let v = i64::from_le_bytes(buf);
        Ok(if self.swap_int { v.swap_bytes() } else { v })
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        if self.swap_double {
            buf.reverse();
        }
        Ok(f64::from_le_bytes(buf))
    }

    /// Write a length-prefixed short string (at most 255 bytes).
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        debug_assert!(bytes.len() <= MAX_TEXT_LEN);
        let len = bytes.len().min(MAX_TEXT_LEN);
        self.write_u8(len as u8)?;
        self.write_bytes(&bytes[..len])
    }

    /// Read a length-prefixed short string.
    pub fn read_str(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        let mut buf = [0u8; MAX_TEXT_LEN];
        self.read_bytes(&mut buf[..len])?;
        Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn typed_round_trip() {
        let mut stream = BufferedStream::create(Cursor::new(Vec::new())).unwrap();
        stream.write_u8(7).unwrap();
        stream.write_u16(0xBEEF).unwrap();
        stream.write_i32(-123_456).unwrap();
        stream.write_i64(1 << 40).unwrap();
        stream.write_f64(2.5).unwrap();
        stream.write_str("hello").unwrap();
        stream.flush().unwrap();

        let mut stream = BufferedStream::open(Cursor::new(stream.inner.into_inner())).unwrap();
        assert_eq!(stream.read_u8().unwrap(), 7);
        assert_eq!(stream.read_u16().unwrap(), 0xBEEF);
        assert_eq!(stream.read_i32().unwrap(), -123_456);
        assert_eq!(stream.read_i64().unwrap(), 1 << 40);
        assert_eq!(stream.read_f64().unwrap(), 2.5);
        assert_eq!(stream.read_str().unwrap(), "hello");
    }

    #[test]
    fn byte_swapped_signature() {
        // Build a big-endian image by hand: sizes are fine, patterns are
        // reversed, and a single swapped i32 payload follows.
        let mut image = Vec::new();
        image.push(2);
        image.extend_from_slice(&PATTERN_WORD.to_be_bytes());
        image.push(4);
        image.extend_from_slice(&PATTERN_INTEGER.to_be_bytes());
        image.push(8);
        image.extend_from_slice(&PATTERN_DOUBLE.to_be_bytes());
        image.extend_from_slice(&0x0102_0304i32.to_be_bytes());

        let mut stream = BufferedStream::open(Cursor::new(image)).unwrap();
        assert!(stream.swap_word && stream.swap_int && stream.swap_double);
        assert_eq!(stream.read_i32().unwrap(), 0x0102_0304);
    }

    #[test]
    fn bad_size_byte() {
        let image = vec![3u8, 0, 0, 0];
        let err = BufferedStream::open(Cursor::new(image)).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::IncompatibleEncoding));
    }

    #[test]
    fn compressed_frames_round_trip() {
        let mut stream = BufferedStream::create(Cursor::new(Vec::new())).unwrap();
        stream.set_compression(true).unwrap();
        // Spans multiple frames and compresses well.
        for i in 0..20_000u32 {
            stream.write_i32((i % 17) as i32).unwrap();
        }
        stream.set_compression(false).unwrap();
        stream.write_str("tail").unwrap();
        stream.flush().unwrap();

        let data = stream.inner.into_inner();
        let mut stream = BufferedStream::open(Cursor::new(data)).unwrap();
        stream.set_compression(true).unwrap();
        for i in 0..20_000u32 {
            assert_eq!(stream.read_i32().unwrap(), (i % 17) as i32);
        }
        stream.set_compression(false).unwrap();
        // The read window may have consumed whole frames only, so the tail
        // starts exactly after the last frame.
        assert_eq!(stream.read_str().unwrap(), "tail");
    }

    #[test]
    fn incompressible_frame_falls_back_to_raw() {
        let mut stream = BufferedStream::create(Cursor::new(Vec::new())).unwrap();
        stream.set_compression(true).unwrap();
        // A pseudo-random payload that deflate cannot shrink below a frame.
        let mut x = 0x12345678u32;
        let payload: Vec<u8> = (0..FRAME_SIZE)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                x as u8
            })
            .collect();
        stream.write_bytes(&payload).unwrap();
        stream.set_compression(false).unwrap();
        stream.flush().unwrap();

        let data = stream.inner.into_inner();
        // Flag byte of the first frame after the 17-byte signature.
        assert_eq!(data[17], 0);

        let mut stream = BufferedStream::open(Cursor::new(data)).unwrap();
        stream.set_compression(true).unwrap();
        let mut back = vec![0u8; FRAME_SIZE];
        stream.read_bytes(&mut back).unwrap();
        assert_eq!(back, payload);
    }
}
