//! The acronym list and the encoding of acronym values.
//!
//! An acronym is a named symbolic constant carried in numeric value slots:
//! index `n` is stored as the double `n * 10.0e300` under the normal value
//! tag. The list maps indices to names and is serialised in the `_ACRO_`
//! section. Entries come from two paths: explicit registration, and
//! implicit allocation when the write path encounters an acronym-classed
//! value with no matching entry.

use crate::error::{Error, ErrorKind, Result};
use crate::format::{self, MARK_ACRO, SV_ACRONYM};
use crate::stream::BufferedStream;
use std::io::{Read, Seek, Write};

/// The double representing acronym index `index`, or 0.0 when the index is
/// not positive.
pub fn acronym_value(index: i32) -> f64 {
    if index <= 0 {
        0.0
    } else {
        index as f64 * SV_ACRONYM
    }
}

/// The acronym index carried by `v`, or 0 when `v` is not in the acronym
/// range.
pub fn acronym_index(v: f64) -> i32 {
    if v.is_finite() && v >= SV_ACRONYM {
        (v / SV_ACRONYM).round() as i32
    } else {
        0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AcronymEntry {
    pub name: String,
    pub text: String,
    /// The session-visible index.
    pub index: i32,
    /// The index the entry had in the file it was loaded from.
    pub stored_index: i32,
    /// True for entries allocated implicitly by the codec.
    pub auto: bool,
}

#[derive(Debug, Default)]
pub(crate) struct AcronymList {
    entries: Vec<AcronymEntry>,
    next_auto: i32,
}

impl AcronymList {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, pos: usize) -> Option<&AcronymEntry> {
        self.entries.get(pos)
    }

    /// Register an acronym. The name must be a fresh identifier and the
    /// index must not be bound yet.
    pub fn add(&mut self, name: &str, text: &str, index: i32) -> Result<usize> {
        if !format::good_ident(name) {
            return Err(Error::new(ErrorKind::BadName));
        }
        if self
            .entries
            .iter()
            .any(|e| e.index == index || (!e.auto && e.name.eq_ignore_ascii_case(name)))
        {
            return Err(Error::new(ErrorKind::AcronymCollision));
        }
        self.entries.push(AcronymEntry {
            name: name.to_owned(),
            text: text.to_owned(),
            index,
            stored_index: index,
            auto: false,
        });
        Ok(self.entries.len() - 1)
    }

    /// Overwrite an entry's name, text and index.
    pub fn set_info(&mut self, pos: usize, name: &str, text: &str, index: i32) -> Result<()> {
        if !format::good_ident(name) {
            return Err(Error::new(ErrorKind::BadName));
        }
        if self.entries.get(pos).is_none() {
            return Err(Error::new(ErrorKind::BadSymbolNumber));
        }
        let clash = self.entries.iter().enumerate().any(|(i, e)| {
            i != pos && (e.index == index || (!e.auto && e.name.eq_ignore_ascii_case(name)))
        });
        if clash {
            return Err(Error::new(ErrorKind::AcronymCollision));
        }
        let entry = &mut self.entries[pos];
        entry.name = name.to_owned();
        entry.text = text.to_owned();
        entry.index = index;
        entry.auto = false;
        Ok(())
    }

    pub fn find_index(&self, index: i32) -> Option<usize> {
        self.entries.iter().position(|e| e.index == index)
    }

    /// Make sure an entry for `index` exists, allocating an anonymous auto
    /// entry when the codec meets an unregistered acronym value.
    pub fn ensure(&mut self, index: i32) -> usize {
        if let Some(pos) = self.find_index(index) {
            return pos;
        }
        self.entries.push(AcronymEntry {
            name: String::new(),
            text: String::new(),
            index,
            stored_index: index,
            auto: true,
        });
        self.entries.len() - 1
    }

    /// Set the counter used for automatic index assignment, returning the
    /// previous value. A non-positive argument only queries the counter.
    pub fn next_nr(&mut self, next: i32) -> i32 {
        let prev = self.next_auto;
        if next > 0 {
            self.next_auto = next;
        }
        prev
    }

    fn take_auto_index(&mut self) -> i32 {
        let next = self.next_auto.max(1);
        self.next_auto = next + 1;
        next
    }

    /// Map an acronym index found in file data to its session index,
    /// allocating an auto entry on first sight. With a positive auto
    /// counter the new entry is renumbered from the counter; otherwise it
    /// keeps the stored index.
    pub fn remap_on_read(&mut self, stored: i32) -> i32 {
        if let Some(entry) = self.entries.iter().find(|e| e.stored_index == stored) {
            return entry.index;
        }
        let index = if self.next_auto > 0 {
            self.take_auto_index()
        } else {
            stored
        };
        self.entries.push(AcronymEntry {
            name: String::new(),
            text: String::new(),
            index,
            stored_index: stored,
            auto: true,
        });
        index
    }

    pub fn memory_used(&self) -> usize {
        self.entries
            .iter()
            .map(|e| std::mem::size_of::<AcronymEntry>() + e.name.len() + e.text.len())
            .sum()
    }

    /// Serialise the `_ACRO_` section at the current stream position.
    pub fn write<S: Read + Write + Seek>(&self, stream: &mut BufferedStream<S>) -> Result<()> {
        stream.write_str(MARK_ACRO)?;
        stream.write_i32(self.entries.len() as i32)?;
        for entry in &self.entries {
            stream.write_str(&entry.name)?;
            stream.write_str(&entry.text)?;
            stream.write_i32(entry.index)?;
        }
        stream.write_str(MARK_ACRO)?;
        Ok(())
    }

    /// Load the `_ACRO_` section at the current stream position.
    pub fn read<S: Read + Write + Seek>(stream: &mut BufferedStream<S>) -> Result<Self> {
        if stream.read_str()? != MARK_ACRO {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        let count = stream.read_i32()?;
        if count < 0 {
            return Err(Error::new(ErrorKind::Corrupt));
        }
        let mut list = AcronymList::default();
        for _ in 0..count {
            let name = stream.read_str()?;
            let text = stream.read_str()?;
            let index = stream.read_i32()?;
            list.entries.push(AcronymEntry {
                auto: name.is_empty(),
                name,
                text,
                index,
                stored_index: index,
            });
        }
        if stream.read_str()? != MARK_ACRO {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn value_codec() {
        assert_eq!(acronym_value(0), 0.0);
        assert_eq!(acronym_value(23), 23.0 * SV_ACRONYM);
        assert_eq!(acronym_index(acronym_value(23)), 23);
        assert_eq!(acronym_index(3.141), 0);
        assert_eq!(acronym_index(f64::INFINITY), 0);
    }

    #[test]
    fn add_and_collide() {
        let mut list = AcronymList::default();
        list.add("myacr", "my acronym", 23).unwrap();
        assert_eq!(list.len(), 1);
        let err = list.add("myacr", "again", 24).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::AcronymCollision));
        let err = list.add("other", "again", 23).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::AcronymCollision));
        list.add("other", "fine", 2).unwrap();

        list.set_info(0, "myacr_mod", "changed", 23).unwrap();
        assert_eq!(list.get(0).unwrap().name, "myacr_mod");
    }

    #[test]
    fn auto_entries() {
        let mut list = AcronymList::default();
        let pos = list.ensure(5);
        assert!(list.get(pos).unwrap().auto);
        assert_eq!(list.ensure(5), pos);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn section_round_trip() {
        let mut list = AcronymList::default();
        list.add("alpha", "first", 1).unwrap();
        list.add("beta", "second", 7).unwrap();

        let mut stream = BufferedStream::create(Cursor::new(Vec::new())).unwrap();
        list.write(&mut stream).unwrap();
        stream.flush().unwrap();

        let data = stream.into_inner().into_inner();
        let mut stream = BufferedStream::open(Cursor::new(data)).unwrap();
        let back = AcronymList::read(&mut stream).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.get(1).unwrap().index, 7);
    }
}
