//! The table of unique element labels.
//!
//! Every coordinate value in a GDX file is an interned label. A label
//! carries two numbers: its *raw* number, dense and assigned in
//! registration order, and an optional caller-supplied *user mapping*.
//! Labels are case-sensitive, never removed, and may be renamed as long as
//! the new name is free.

use hashbrown::HashMap;

use crate::error::{Error, ErrorKind, Result};
use crate::format::{self, MARK_UEL};
use crate::stream::BufferedStream;
use std::io::{Read, Seek, Write};

/// User-mapping value for labels without a mapping.
pub const UNMAPPED: i32 = -1;

#[derive(Debug)]
struct Entry {
    name: String,
    map: i32,
}

/// Insertion-ordered label table with hashed name lookup and a reverse
/// index over user mappings. Raw numbers are 1-based positions in
/// registration order.
#[derive(Debug, Default)]
pub(crate) struct UelTable {
    entries: Vec<Entry>,
    by_name: HashMap<String, u32>,
    by_map: HashMap<i32, u32>,
    max_map: i32,
    max_len: usize,
}

impl UelTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The highest user mapping handed out so far, 0 when none.
    pub fn high_map(&self) -> i32 {
        self.max_map
    }

    /// The length of the longest registered label.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn push(&mut self, name: &str, map: i32) -> i32 {
        let raw = self.entries.len() as u32;
        self.by_name.insert(name.to_owned(), raw);
        if map != UNMAPPED {
            self.by_map.insert(map, raw);
            self.max_map = self.max_map.max(map);
        }
        self.max_len = self.max_len.max(name.len());
        self.entries.push(Entry {
            name: name.to_owned(),
            map,
        });
        raw as i32 + 1
    }

    /// Register a label without a user mapping, failing on duplicates.
    /// Returns the raw number.
    pub fn register_raw(&mut self, name: &str) -> Result<i32> {
        if !format::good_uel_string(name) {
            return Err(Error::new(ErrorKind::BadUel));
        }
        if self.by_name.contains_key(name) {
            return Err(Error::new(ErrorKind::DuplicateUel));
        }
        Ok(self.push(name, UNMAPPED))
    }

    /// Register a label if it is new, returning its raw number either way.
    pub fn register_str(&mut self, name: &str) -> Result<i32> {
        if !format::good_uel_string(name) {
            return Err(Error::new(ErrorKind::BadUel));
        }
        if let Some(&raw) = self.by_name.get(name) {
            return Ok(raw as i32 + 1);
        }
        Ok(self.push(name, UNMAPPED))
    }

    /// Bind a user mapping to a label, registering the label when new.
    /// Fails when the mapping is bound to a different label or the label
    /// already has a different mapping.
    pub fn register_map(&mut self, map: i32, name: &str) -> Result<i32> {
        if !format::good_uel_string(name) {
            return Err(Error::new(ErrorKind::BadUel));
        }
        if map < 1 {
            return Err(Error::new(ErrorKind::UelMapCollision));
        }
        if let Some(&raw) = self.by_name.get(name) {
            let entry = &mut self.entries[raw as usize];
            if entry.map == map {
                return Ok(raw as i32 + 1);
            }
            if entry.map != UNMAPPED || self.by_map.contains_key(&map) {
                return Err(Error::new(ErrorKind::UelMapCollision));
            }
            entry.map = map;
            self.by_map.insert(map, raw);
            self.max_map = self.max_map.max(map);
            return Ok(raw as i32 + 1);
        }
        if self.by_map.contains_key(&map) {
            return Err(Error::new(ErrorKind::UelMapCollision));
        }
        Ok(self.push(name, map))
    }

    /// Bind a user mapping to an already registered label only.
    pub fn map_existing(&mut self, map: i32, name: &str) -> Result<i32> {
        if !self.by_name.contains_key(name) {
            return Err(Error::new(ErrorKind::BadUel));
        }
        self.register_map(map, name)
    }

    /// Assign the next free user mapping to the label with raw number
    /// `raw`, returning the mapping. Used by expanding reads.
    pub fn expand_map(&mut self, raw: i32) -> Result<i32> {
        let entry = self
            .entries
            .get_mut((raw - 1).max(0) as usize)
            .ok_or_else(|| Error::new(ErrorKind::BadElementIndex))?;
        if entry.map != UNMAPPED {
            return Ok(entry.map);
        }
        let map = self.max_map + 1;
        entry.map = map;
        self.by_map.insert(map, (raw - 1) as u32);
        self.max_map = map;
        Ok(map)
    }

    /// Look a label up by name.
    pub fn find(&self, name: &str) -> Option<(i32, i32)> {
        let &raw = self.by_name.get(name)?;
        Some((raw as i32 + 1, self.entries[raw as usize].map))
    }

    /// Look a label up by raw number.
    pub fn get(&self, raw: i32) -> Option<(&str, i32)> {
        if raw < 1 {
            return None;
        }
        let entry = self.entries.get(raw as usize - 1)?;
        Some((&entry.name, entry.map))
    }

    /// Look a label up by user mapping.
    pub fn get_mapped(&self, map: i32) -> Option<(i32, &str)> {
        let &raw = self.by_map.get(&map)?;
        Some((raw as i32 + 1, &self.entries[raw as usize].name))
    }

    /// The raw number bound to a user mapping.
    pub fn raw_for_map(&self, map: i32) -> Option<i32> {
        self.by_map.get(&map).map(|&raw| raw as i32 + 1)
    }

    /// Rename a label, keeping its numbers. Fails when the new name is
    /// taken or malformed.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if !format::good_uel_string(new) {
            return Err(Error::new(ErrorKind::BadUel));
        }
        if self.by_name.contains_key(new) {
            return Err(Error::new(ErrorKind::DuplicateUel));
        }
        let raw = *self
            .by_name
            .get(old)
            .ok_or_else(|| Error::new(ErrorKind::BadUel))?;
        self.by_name.remove(old);
        self.by_name.insert(new.to_owned(), raw);
        self.entries[raw as usize].name = new.to_owned();
        self.max_len = self.max_len.max(new.len());
        Ok(())
    }

    pub fn memory_used(&self) -> usize {
        self.entries
            .iter()
            .map(|e| std::mem::size_of::<Entry>() + 2 * e.name.len() + 16)
            .sum()
    }

    /// Serialise the `_UEL_` section at the current stream position.
    /// Mappings are session state and are not stored.
    pub fn write<S: Read + Write + Seek>(&self, stream: &mut BufferedStream<S>) -> Result<()> {
        stream.write_str(MARK_UEL)?;
        stream.write_i32(self.entries.len() as i32)?;
        for entry in &self.entries {
            stream.write_str(&entry.name)?;
        }
        stream.write_str(MARK_UEL)?;
        Ok(())
    }

    /// Load the `_UEL_` section at the current stream position.
    pub fn read<S: Read + Write + Seek>(stream: &mut BufferedStream<S>) -> Result<Self> {
        if stream.read_str()? != MARK_UEL {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        let count = stream.read_i32()?;
        if count < 0 {
            return Err(Error::new(ErrorKind::Corrupt));
        }
        let mut table = UelTable::default();
        for _ in 0..count {
            let name = stream.read_str()?;
            table.push(&name, UNMAPPED);
        }
        if stream.read_str()? != MARK_UEL {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_registration() {
        let mut table = UelTable::default();
        assert_eq!(table.register_raw("").unwrap(), 1);
        assert_eq!(table.register_raw("New-York").unwrap(), 2);
        assert_eq!(table.register_raw(&"i".repeat(63)).unwrap(), 3);
        assert!(table.register_raw(&"i".repeat(64)).is_err());
        assert_eq!(
            table.register_raw("New-York").unwrap_err().kind(),
            Some(ErrorKind::DuplicateUel)
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(2), Some(("New-York", UNMAPPED)));
        assert_eq!(table.find("New-York"), Some((2, UNMAPPED)));
        assert_eq!(table.max_len(), 63);
    }

    #[test]
    fn str_registration_is_idempotent() {
        let mut table = UelTable::default();
        assert_eq!(table.register_str("a").unwrap(), 1);
        assert_eq!(table.register_str("b").unwrap(), 2);
        assert_eq!(table.register_str("a").unwrap(), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn map_registration() {
        let mut table = UelTable::default();
        assert_eq!(table.register_map(3, "TheOnlyUEL").unwrap(), 1);
        assert_eq!(table.register_map(8, "another").unwrap(), 2);
        // Same pair again is fine.
        assert_eq!(table.register_map(3, "TheOnlyUEL").unwrap(), 1);
        // Same map, different label.
        assert_eq!(
            table.register_map(3, "intruder").unwrap_err().kind(),
            Some(ErrorKind::UelMapCollision)
        );
        assert_eq!(table.high_map(), 8);
        assert_eq!(table.get_mapped(8), Some((2, "another")));
        assert_eq!(table.raw_for_map(3), Some(1));
    }

    #[test]
    fn rename_keeps_numbers() {
        let mut table = UelTable::default();
        table.register_raw("a").unwrap();
        table.register_raw("b").unwrap();
        table.rename("a", "c").unwrap();
        assert_eq!(table.get(1), Some(("c", UNMAPPED)));
        assert_eq!(table.find("a"), None);
        assert_eq!(
            table.rename("c", "b").unwrap_err().kind(),
            Some(ErrorKind::DuplicateUel)
        );
    }

    #[test]
    fn expanding_maps() {
        let mut table = UelTable::default();
        table.register_raw("x").unwrap();
        table.register_map(5, "y").unwrap();
        assert_eq!(table.expand_map(1).unwrap(), 6);
        // Already mapped: keeps its mapping.
        assert_eq!(table.expand_map(2).unwrap(), 5);
        assert_eq!(table.high_map(), 6);
    }
}
