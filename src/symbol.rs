//! The symbol catalog.
//!
//! Symbols are numbered 1-based in write order; number 0 is the synthetic
//! universe set `*`. Lookup by name is case-insensitive in the way GAMS
//! identifiers are (ASCII case folding); display names keep their original
//! spelling.

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result};
use crate::format::{self, MARK_SYMB, MAX_DIM};
use crate::stream::BufferedStream;
use std::io::{Read, Seek, Write};

/// The type of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Set = 0,
    Parameter = 1,
    Variable = 2,
    Equation = 3,
    Alias = 4,
}

impl DataType {
    /// Number of value slots per record.
    pub fn value_count(self) -> usize {
        match self {
            DataType::Set | DataType::Parameter => 1,
            DataType::Variable | DataType::Equation => 5,
            DataType::Alias => 0,
        }
    }

    pub fn from_code(code: i32) -> Option<DataType> {
        Some(match code {
            0 => DataType::Set,
            1 => DataType::Parameter,
            2 => DataType::Variable,
            3 => DataType::Equation,
            4 => DataType::Alias,
            _ => return None,
        })
    }
}

/// One dimension of a strict domain link: resolved to a symbol number, or
/// still waiting for a set of that name to be defined. Number 0 is the
/// universe and never checks.
#[derive(Debug, Clone)]
pub(crate) enum DomainRef {
    Universe,
    Resolved(i32),
    Pending(String),
}

/// Catalog entry for one symbol.
#[derive(Debug)]
pub(crate) struct Symbol {
    pub name: String,
    pub dim: usize,
    pub typ: DataType,
    pub user_info: i32,
    pub expl_text: String,
    pub data_count: i32,
    /// Running total of rejected records, persisted in the file.
    pub error_count: i32,
    pub has_set_text: bool,
    /// Offset of the symbol's `_DATA_` section, −1 before it is written.
    pub position: i64,
    /// Whether the data section is stored in compressed frames.
    pub compressed: bool,
    /// Strict domain link, one entry per dimension.
    pub domain: Option<Vec<DomainRef>>,
    /// Relaxed domain names for the `_DOMS_` section.
    pub relaxed_domain: Option<Vec<String>>,
    pub comments: Vec<String>,
}

impl Symbol {
    pub fn new(name: &str, dim: usize, typ: DataType, user_info: i32, expl_text: &str) -> Symbol {
        Symbol {
            name: name.to_owned(),
            dim,
            typ,
            user_info,
            expl_text: expl_text.to_owned(),
            data_count: 0,
            error_count: 0,
            has_set_text: false,
            position: -1,
            compressed: false,
            domain: None,
            relaxed_domain: None,
            comments: Vec::new(),
        }
    }
}

/// Name-keyed catalog, also addressable by 1-based number.
#[derive(Debug, Default)]
pub(crate) struct SymbolTable {
    // Keyed by the ASCII-uppercased name.
    symbols: IndexMap<String, Symbol>,
}

impl SymbolTable {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Add a symbol, validating its name and uniqueness. Returns the new
    /// 1-based symbol number.
    pub fn add(&mut self, symbol: Symbol) -> Result<i32> {
        if !format::good_ident(&symbol.name) {
            return Err(Error::new(ErrorKind::BadName));
        }
        if symbol.dim > MAX_DIM {
            return Err(Error::new(ErrorKind::BadDimension));
        }
        let key = symbol.name.to_ascii_uppercase();
        if self.symbols.contains_key(&key) {
            return Err(Error::new(ErrorKind::DuplicateSymbol));
        }
        self.symbols.insert(key, symbol);
        Ok(self.symbols.len() as i32)
    }

    /// The 1-based number of a symbol, or 0 for the universe name.
    pub fn find(&self, name: &str) -> Option<i32> {
        if name == format::UNIVERSE_NAME {
            return Some(0);
        }
        self.symbols
            .get_index_of(&name.to_ascii_uppercase())
            .map(|pos| pos as i32 + 1)
    }

    pub fn get(&self, nr: i32) -> Option<&Symbol> {
        if nr < 1 {
            return None;
        }
        self.symbols.get_index(nr as usize - 1).map(|(_, s)| s)
    }

    pub fn get_mut(&mut self, nr: i32) -> Option<&mut Symbol> {
        if nr < 1 {
            return None;
        }
        self.symbols.get_index_mut(nr as usize - 1).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Symbol> {
        self.symbols.values_mut()
    }

    pub fn memory_used(&self) -> usize {
        self.symbols
            .values()
            .map(|s| {
                std::mem::size_of::<Symbol>()
                    + 2 * s.name.len()
                    + s.expl_text.len()
                    + s.comments.iter().map(|c| c.len()).sum::<usize>()
            })
            .sum()
    }

    /// Serialise the `_SYMB_` section at the current stream position.
    /// Pending strict domains must have been resolved or demoted first.
    pub fn write<S: Read + Write + Seek>(&self, stream: &mut BufferedStream<S>) -> Result<()> {
        stream.write_str(MARK_SYMB)?;
        stream.write_i32(self.symbols.len() as i32)?;
        for symbol in self.symbols.values() {
            stream.write_str(&symbol.name)?;
            stream.write_i64(symbol.position)?;
            stream.write_i32(symbol.dim as i32)?;
            stream.write_u8(symbol.typ as u8)?;
            stream.write_i32(symbol.user_info)?;
            stream.write_i32(symbol.data_count)?;
            stream.write_i32(symbol.error_count)?;
            stream.write_u8(symbol.has_set_text as u8)?;
            stream.write_str(&symbol.expl_text)?;
            stream.write_u8(symbol.compressed as u8)?;
            match &symbol.domain {
                Some(domain) => {
                    stream.write_u8(1)?;
                    for dom in domain {
                        let nr = match dom {
                            DomainRef::Universe => 0,
                            DomainRef::Resolved(nr) => *nr,
                            DomainRef::Pending(_) => {
                                return Err(Error::new(ErrorKind::Corrupt));
                            }
                        };
                        stream.write_i32(nr)?;
                    }
                }
                None => stream.write_u8(0)?,
            }
            stream.write_i32(symbol.comments.len() as i32)?;
            for comment in &symbol.comments {
                stream.write_str(comment)?;
            }
        }
        stream.write_str(MARK_SYMB)?;
        Ok(())
    }

    /// Load the `_SYMB_` section at the current stream position.
    pub fn read<S: Read + Write + Seek>(stream: &mut BufferedStream<S>) -> Result<Self> {
        if stream.read_str()? != MARK_SYMB {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        let count = stream.read_i32()?;
        if count < 0 {
            return Err(Error::new(ErrorKind::Corrupt));
        }
        let mut table = SymbolTable::default();
        for _ in 0..count {
            let name = stream.read_str()?;
            let position = stream.read_i64()?;
            let dim = stream.read_i32()?;
            if dim < 0 || dim as usize > MAX_DIM {
                return Err(Error::new(ErrorKind::Corrupt));
            }
            let typ = DataType::from_code(stream.read_u8()? as i32)
                .ok_or_else(|| Error::new(ErrorKind::Corrupt))?;
            let user_info = stream.read_i32()?;
            let data_count = stream.read_i32()?;
            let error_count = stream.read_i32()?;
            let has_set_text = stream.read_u8()? != 0;
            let expl_text = stream.read_str()?;
            let compressed = stream.read_u8()? != 0;
            let controlled = stream.read_u8()? != 0;
            let domain = if controlled {
                let mut refs = Vec::with_capacity(dim as usize);
                for _ in 0..dim {
                    let nr = stream.read_i32()?;
                    refs.push(if nr == 0 {
                        DomainRef::Universe
                    } else {
                        DomainRef::Resolved(nr)
                    });
                }
                Some(refs)
            } else {
                None
            };
            let comment_count = stream.read_i32()?;
            if comment_count < 0 {
                return Err(Error::new(ErrorKind::Corrupt));
            }
            let mut comments = Vec::with_capacity(comment_count as usize);
            for _ in 0..comment_count {
                comments.push(stream.read_str()?);
            }
            let mut symbol = Symbol::new(&name, dim as usize, typ, user_info, &expl_text);
            symbol.position = position;
            symbol.data_count = data_count;
            symbol.error_count = error_count;
            symbol.has_set_text = has_set_text;
            symbol.compressed = compressed;
            symbol.domain = domain;
            symbol.comments = comments;
            let key = symbol.name.to_ascii_uppercase();
            if table.symbols.insert(key, symbol).is_some() {
                return Err(Error::new(ErrorKind::Corrupt));
            }
        }
        if stream.read_str()? != MARK_SYMB {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn numbering_and_lookup() {
        let mut table = SymbolTable::default();
        let i = table
            .add(Symbol::new("i", 1, DataType::Set, 0, "canning plants"))
            .unwrap();
        let d = table
            .add(Symbol::new("d", 2, DataType::Parameter, 0, ""))
            .unwrap();
        assert_eq!((i, d), (1, 2));
        assert_eq!(table.find("i"), Some(1));
        assert_eq!(table.find("I"), Some(1));
        assert_eq!(table.find("*"), Some(0));
        assert_eq!(table.find("missing"), None);
        assert_eq!(table.get(2).unwrap().name, "d");
        assert_eq!(table.get(3).map(|s| &s.name), None);
    }

    #[test]
    fn name_validation() {
        let mut table = SymbolTable::default();
        for bad in ["", "2x", "a b", "x-y"] {
            assert_eq!(
                table
                    .add(Symbol::new(bad, 1, DataType::Set, 0, ""))
                    .unwrap_err()
                    .kind(),
                Some(ErrorKind::BadName)
            );
        }
        table
            .add(Symbol::new("ok", 1, DataType::Set, 0, ""))
            .unwrap();
        assert_eq!(
            table
                .add(Symbol::new("OK", 1, DataType::Set, 0, ""))
                .unwrap_err()
                .kind(),
            Some(ErrorKind::DuplicateSymbol)
        );
    }

    #[test]
    fn section_round_trip() {
        let mut table = SymbolTable::default();
        let mut sym = Symbol::new("supply", 1, DataType::Equation, 0, "observe supply limit");
        sym.position = 1234;
        sym.data_count = 2;
        sym.domain = Some(vec![DomainRef::Resolved(1)]);
        sym.comments.push("first comment".to_owned());
        table.add(sym).unwrap();

        let mut stream = BufferedStream::create(Cursor::new(Vec::new())).unwrap();
        table.write(&mut stream).unwrap();
        stream.flush().unwrap();

        let data = stream.into_inner().into_inner();
        let mut stream = BufferedStream::open(Cursor::new(data)).unwrap();
        let back = SymbolTable::read(&mut stream).unwrap();
        assert_eq!(back.len(), 1);
        let sym = back.get(1).unwrap();
        assert_eq!(sym.name, "supply");
        assert_eq!(sym.position, 1234);
        assert_eq!(sym.typ, DataType::Equation);
        assert!(matches!(
            sym.domain.as_ref().unwrap()[0],
            DomainRef::Resolved(1)
        ));
        assert_eq!(sym.comments, vec!["first comment".to_owned()]);
    }
}
