//! The pool of set element explanatory texts.
//!
//! Set records can point one of their value slots at an entry of this
//! pool. The pool is append-only and content-addressed: adding a text that
//! is already present returns its existing index. Entry 0 is the empty
//! string and always exists. Each entry carries an integer node number
//! used by graph-structured callers; it defaults to 0 and is settable.

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result};
use crate::format::MARK_SETT;
use crate::stream::BufferedStream;
use std::io::{Read, Seek, Write};

#[derive(Debug)]
pub(crate) struct SetTextPool {
    texts: IndexMap<String, i32>,
}

impl Default for SetTextPool {
    fn default() -> Self {
        let mut texts = IndexMap::new();
        texts.insert(String::new(), 0);
        SetTextPool { texts }
    }
}

impl SetTextPool {
    /// Number of entries, counting the leading empty string.
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    /// Intern `text`, returning its index.
    pub fn add(&mut self, text: &str) -> i32 {
        if let Some(pos) = self.texts.get_index_of(text) {
            return pos as i32;
        }
        let pos = self.texts.len();
        self.texts.insert(text.to_owned(), 0);
        pos as i32
    }

    /// The text and node number at `index`.
    pub fn get(&self, index: i32) -> Option<(&str, i32)> {
        if index < 0 {
            return None;
        }
        let (text, &node) = self.texts.get_index(index as usize)?;
        Some((text, node))
    }

    /// Overwrite the node number at `index`.
    pub fn set_node(&mut self, index: i32, node: i32) -> Result<()> {
        if index < 0 {
            return Err(Error::new(ErrorKind::SetTextNotFound));
        }
        let (_, slot) = self
            .texts
            .get_index_mut(index as usize)
            .ok_or_else(|| Error::new(ErrorKind::SetTextNotFound))?;
        *slot = node;
        Ok(())
    }

    pub fn memory_used(&self) -> usize {
        self.texts
            .keys()
            .map(|t| t.len() + std::mem::size_of::<(String, i32)>())
            .sum()
    }

    /// Serialise the `_SETT_` section at the current stream position.
    /// The stored count includes the leading empty entry.
    pub fn write<S: Read + Write + Seek>(&self, stream: &mut BufferedStream<S>) -> Result<()> {
        stream.write_str(MARK_SETT)?;
        stream.write_i32(self.texts.len() as i32)?;
        for text in self.texts.keys() {
            stream.write_str(text)?;
        }
        stream.write_str(MARK_SETT)?;
        Ok(())
    }

    /// Load the `_SETT_` section at the current stream position.
    pub fn read<S: Read + Write + Seek>(stream: &mut BufferedStream<S>) -> Result<Self> {
        if stream.read_str()? != MARK_SETT {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        let count = stream.read_i32()?;
        if count < 1 {
            return Err(Error::new(ErrorKind::Corrupt));
        }
        let mut pool = SetTextPool::default();
        // Entry 0 is stored too; interning keeps it in place.
        for _ in 0..count {
            let text = stream.read_str()?;
            pool.add(&text);
        }
        if stream.read_str()? != MARK_SETT {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_entry_always_present() {
        let pool = SetTextPool::default();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(0), Some(("", 0)));
        assert_eq!(pool.get(1), None);
    }

    #[test]
    fn adding_is_idempotent() {
        let mut pool = SetTextPool::default();
        assert_eq!(pool.add("set text"), 1);
        assert_eq!(pool.add("set text"), 1);
        assert_eq!(pool.add("other"), 2);
        assert_eq!(pool.add(""), 0);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn node_numbers() {
        let mut pool = SetTextPool::default();
        pool.add("set text");
        assert_eq!(pool.get(1), Some(("set text", 0)));
        pool.set_node(1, 23).unwrap();
        assert_eq!(pool.get(1), Some(("set text", 23)));
        assert_eq!(
            pool.set_node(200, 42).unwrap_err().kind(),
            Some(ErrorKind::SetTextNotFound)
        );
    }

    #[test]
    fn section_round_trip() {
        let mut pool = SetTextPool::default();
        pool.add("first");
        pool.add("second");

        let mut stream = BufferedStream::create(Cursor::new(Vec::new())).unwrap();
        pool.write(&mut stream).unwrap();
        stream.flush().unwrap();

        let data = stream.into_inner().into_inner();
        let mut stream = BufferedStream::open(Cursor::new(data)).unwrap();
        let back = SetTextPool::read(&mut stream).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.get(2), Some(("second", 0)));
    }
}
