//! The write engine.
//!
//! A [`Writer`] owns an open file in write (or append) mode together with
//! the in-memory tables that describe it. Data sections are emitted while
//! symbols are written; the catalog sections and the section index are
//! emitted at close. Per-record failures (domain violations, unsorted or
//! duplicate keys) are captured in an error-record list and logged without
//! terminating the session.

use std::io::{Read, Seek, Write};

use hashbrown::HashMap;

use crate::acronym::{acronym_index, AcronymList};
use crate::data::LinkedData;
use crate::error::{Error, ErrorKind, Result};
use crate::format::{
    self, MARK_BOI, MARK_DOMS, MAX_DIM, SECTION_ACRONYMS, SECTION_COUNT, SECTION_NEXT_WRITE,
    SECTION_RELAXED_DOMAINS, SECTION_SET_TEXTS, SECTION_SYMBOLS, SECTION_UELS,
};
use crate::read::Reader;
use crate::records::{self, KeyEncoder};
use crate::settext::SetTextPool;
use crate::specials::{SpecialValues, ValueClass};
use crate::stream::BufferedStream;
use crate::symbol::{DataType, DomainRef, Symbol, SymbolTable};
use crate::uel::UelTable;

/// How many rejected records are retained for inspection; the running
/// total is tracked separately and persisted with the symbol.
pub(crate) const ERROR_RECORD_CAP: usize = 11;

/// The three key conventions of a data write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    Raw,
    Mapped,
    Str,
}

/// A rejected record, kept for the caller to inspect after `Done`.
#[derive(Debug)]
pub(crate) struct ErrorRecord {
    pub keys: Vec<i32>,
    pub values: Vec<f64>,
}

#[derive(Debug)]
struct ActiveWrite {
    sym: i32,
    mode: WriteMode,
    dim: usize,
    val_count: usize,
    /// Streaming state for raw mode; buffered modes encode at `Done`.
    encoder: Option<KeyEncoder>,
    buffer: Option<LinkedData>,
    start_pos: u64,
    records: i32,
    error_total: i32,
    has_text: bool,
    /// Per-dimension parent symbol to check against, when strict.
    checks: Vec<Option<i32>>,
    /// Membership of this symbol when it is a one-dimensional set.
    bitmap: Option<Vec<u64>>,
}

fn bitmap_set(bits: &mut Vec<u64>, nr: i32) {
    if nr < 1 {
        return;
    }
    let idx = (nr - 1) as usize;
    let word = idx / 64;
    if word >= bits.len() {
        bits.resize(word + 1, 0);
    }
    bits[word] |= 1 << (idx % 64);
}

fn bitmap_get(bits: &[u64], nr: i32) -> bool {
    if nr < 1 {
        return false;
    }
    let idx = (nr - 1) as usize;
    bits.get(idx / 64).map_or(false, |w| w & (1 << (idx % 64)) != 0)
}

/// The write half of an open GDX file.
#[derive(Debug)]
pub(crate) struct Writer<S> {
    stream: BufferedStream<S>,
    pub compress: bool,
    pub version: i32,
    pub audit: String,
    pub producer: String,
    index_pos: u64,
    sections: [i64; SECTION_COUNT],
    pub uels: UelTable,
    pub symbols: SymbolTable,
    pub texts: SetTextPool,
    pub acronyms: AcronymList,
    pub specials: SpecialValues,
    pub store_domain_sets: bool,
    pub allow_bogus_domains: bool,
    dom_sets: HashMap<i32, Vec<u64>>,
    active: Option<ActiveWrite>,
    /// Error records of the current or last data write.
    pub error_records: Vec<ErrorRecord>,
    /// Error codes produced by record-level recovery, drained by the
    /// facade into its queue.
    pub error_log: Vec<ErrorKind>,
}

impl<S: Read + Write + Seek> Writer<S> {
    /// Start a fresh file: endianness signature, header, zeroed index.
    pub fn create(
        inner: S,
        producer: &str,
        audit: &str,
        compress: bool,
        version: i32,
    ) -> Result<Writer<S>> {
        let mut stream = BufferedStream::create(inner)?;
        stream.write_u8(format::GDX_MAGIC)?;
        stream.write_str(format::GDX_HEADER_ID)?;
        stream.write_i32(version)?;
        stream.write_i32(compress as i32)?;
        stream.write_str(audit)?;
        stream.write_str(producer)?;
        let index_pos = stream.position()?;
        for _ in 0..10 {
            stream.write_i64(0)?;
        }
        log::debug!(
            "gdx: created file for {} (version {}, compressed {})",
            producer,
            version,
            compress
        );
        Ok(Writer {
            stream,
            compress,
            version,
            audit: audit.to_owned(),
            producer: producer.to_owned(),
            index_pos,
            sections: [-1; SECTION_COUNT],
            uels: UelTable::default(),
            symbols: SymbolTable::default(),
            texts: SetTextPool::default(),
            acronyms: AcronymList::default(),
            specials: SpecialValues::default(),
            store_domain_sets: true,
            allow_bogus_domains: true,
            dom_sets: HashMap::new(),
            active: None,
            error_records: Vec::new(),
            error_log: Vec::new(),
        })
    }

    /// Reopen an existing file for appending: all tables are loaded and
    /// writing continues from the stored next-write position.
    pub fn append(inner: S, producer: &str) -> Result<Writer<S>> {
        let reader = Reader::open(inner)?;
        let (stream, parts) = reader.into_parts();
        let mut writer = Writer {
            stream,
            compress: parts.compressed,
            version: parts.version,
            audit: parts.audit,
            producer: if producer.is_empty() {
                parts.producer
            } else {
                producer.to_owned()
            },
            index_pos: parts.index_pos,
            sections: parts.sections,
            uels: parts.uels,
            symbols: parts.symbols,
            texts: parts.texts,
            acronyms: parts.acronyms,
            specials: SpecialValues::default(),
            store_domain_sets: true,
            allow_bogus_domains: true,
            dom_sets: HashMap::new(),
            active: None,
            error_records: Vec::new(),
            error_log: Vec::new(),
        };
        let next = writer.sections[SECTION_NEXT_WRITE];
        if next < 0 {
            return Err(Error::new(ErrorKind::Corrupt));
        }
        // Rebuild membership bitmaps so appended symbols can be checked
        // against already stored sets.
        writer.rebuild_domain_sets()?;
        // The catalog sections are rewritten at close; writing resumes
        // where they used to start.
        for s in writer.sections.iter_mut() {
            *s = -1;
        }
        writer.stream.seek(next as u64)?;
        Ok(writer)
    }

    fn rebuild_domain_sets(&mut self) -> Result<()> {
        let mut sets = Vec::new();
        for nr in 1..=self.symbols.len() as i32 {
            let sym = self.symbols.get(nr).unwrap();
            if sym.typ == DataType::Set && sym.dim == 1 && sym.position >= 0 {
                sets.push((nr, sym.position as u64, sym.compressed));
            }
        }
        for (nr, pos, compressed) in sets {
            self.stream.set_compression(false)?;
            self.stream.seek(pos)?;
            self.stream.set_compression(compressed)?;
            let mut decoder = records::KeyDecoder::begin(&mut self.stream, 1)?;
            let mut bits = Vec::new();
            let mut key = [0i32; MAX_DIM];
            let mut value = [0.0f64];
            while decoder.read_key(&mut self.stream, &mut key)?.is_some() {
                records::read_values(&mut self.stream, &self.specials, &mut value)?;
                bitmap_set(&mut bits, key[0]);
            }
            self.stream.set_compression(false)?;
            self.dom_sets.insert(nr, bits);
        }
        Ok(())
    }

    /// The dimension of the symbol currently being written.
    pub fn current_dim(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.dim)
    }

    /// Begin a data write for a new symbol.
    pub fn data_start(
        &mut self,
        name: &str,
        expl_text: &str,
        dim: usize,
        typ: DataType,
        user_info: i32,
        mode: WriteMode,
    ) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::new(ErrorKind::WrongMode));
        }
        if typ == DataType::Alias {
            return Err(Error::new(ErrorKind::BadType));
        }
        if dim > MAX_DIM {
            return Err(Error::new(ErrorKind::BadDimension));
        }
        let mut symbol = Symbol::new(name, dim, typ, user_info, expl_text);
        symbol.compressed = self.compress && dim > 0;
        let sym = self.symbols.add(symbol)?;
        let val_count = typ.value_count().max(1);
        self.error_records.clear();
        let mut active = ActiveWrite {
            sym,
            mode,
            dim,
            val_count,
            encoder: None,
            buffer: None,
            start_pos: 0,
            records: 0,
            error_total: 0,
            has_text: false,
            checks: vec![None; dim],
            bitmap: if typ == DataType::Set && dim == 1 && self.store_domain_sets {
                Some(Vec::new())
            } else {
                None
            },
        };
        match mode {
            WriteMode::Raw => {
                self.stream.set_compression(self.compress && dim > 0)?;
                active.start_pos = self.stream.position()?;
                let min = [1i32; MAX_DIM];
                let max = [self.uels.len() as i32; MAX_DIM];
                active.encoder = Some(KeyEncoder::begin(
                    &mut self.stream,
                    dim,
                    &min[..dim],
                    &max[..dim],
                )?);
            }
            WriteMode::Mapped | WriteMode::Str => {
                active.buffer = Some(LinkedData::new(dim, val_count));
            }
        }
        self.active = Some(active);
        Ok(())
    }

    /// Attach a strict domain to the symbol currently being written.
    /// Unknown parents become pending links resolved at close.
    pub fn set_domain(&mut self, names: &[&str]) -> Result<()> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::WrongMode))?;
        if names.len() < active.dim {
            return Err(Error::new(ErrorKind::BadDimension));
        }
        let mut refs = Vec::with_capacity(active.dim);
        let mut checks = vec![None; active.dim];
        for (d, &name) in names.iter().take(active.dim).enumerate() {
            if name == format::UNIVERSE_NAME {
                refs.push(DomainRef::Universe);
                continue;
            }
            match self.symbols.find(name) {
                Some(nr) => {
                    let parent = self.symbols.get(nr).unwrap();
                    let target = match parent.typ {
                        DataType::Set => nr,
                        DataType::Alias => parent.user_info,
                        _ => return Err(Error::new(ErrorKind::BadType)),
                    };
                    refs.push(DomainRef::Resolved(nr));
                    if self.dom_sets.contains_key(&target) {
                        checks[d] = Some(target);
                    }
                }
                None => {
                    if !self.allow_bogus_domains {
                        return Err(Error::new(ErrorKind::BadSymbolNumber));
                    }
                    refs.push(DomainRef::Pending(name.to_owned()));
                }
            }
        }
        active.checks = checks;
        let sym = self.symbols.get_mut(active.sym).unwrap();
        sym.domain = Some(refs);
        Ok(())
    }

    /// Attach relaxed domain names to any symbol after its data is
    /// written.
    pub fn set_domain_relaxed(&mut self, sym: i32, names: &[&str]) -> Result<()> {
        let symbol = self
            .symbols
            .get_mut(sym)
            .ok_or_else(|| Error::new(ErrorKind::BadSymbolNumber))?;
        if names.len() < symbol.dim {
            return Err(Error::new(ErrorKind::BadDimension));
        }
        for &name in names.iter().take(symbol.dim) {
            if name != format::UNIVERSE_NAME && !format::good_ident(name) {
                return Err(Error::new(ErrorKind::BadName));
            }
        }
        symbol.relaxed_domain = Some(
            names
                .iter()
                .take(symbol.dim)
                .map(|&n| n.to_owned())
                .collect(),
        );
        Ok(())
    }

    /// Retain a rejected record. The matching error code is either logged
    /// separately (recovered errors) or returned to the caller, never
    /// both.
    fn capture_error(&mut self, keys: &[i32], values: &[f64]) {
        if let Some(active) = self.active.as_mut() {
            active.error_total += 1;
        }
        if self.error_records.len() < ERROR_RECORD_CAP {
            self.error_records.push(ErrorRecord {
                keys: keys.to_vec(),
                values: values.to_vec(),
            });
        }
    }

    /// Track acronym usage in a record's values.
    fn note_values(&mut self, values: &[f64]) {
        for &v in values {
            if self.specials.classify(v) == ValueClass::Acronym {
                self.acronyms.ensure(acronym_index(v));
            }
        }
    }

    fn check_domain(&self, active: &ActiveWrite, keys: &[i32]) -> bool {
        for (d, check) in active.checks.iter().enumerate() {
            if let Some(parent) = check {
                match self.dom_sets.get(parent) {
                    Some(bits) if bitmap_get(bits, keys[d]) => {}
                    _ => return false,
                }
            }
        }
        true
    }

    /// Write one record with raw element numbers. Raw keys must be sorted.
    pub fn write_raw(&mut self, keys: &[i32], values: &[f64]) -> Result<()> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::WrongMode))?;
        let dim = active.dim;
        if keys.len() < dim || values.len() < active.val_count {
            return Err(Error::new(ErrorKind::BadDimension));
        }
        let values = &values[..active.val_count];
        let uel_count = self.uels.len() as i32;
        for &k in &keys[..dim] {
            if k < 1 || k > uel_count {
                self.capture_error(&keys[..dim], values);
                return Err(Error::new(ErrorKind::BadElementIndex));
            }
        }
        let in_domain = self.check_domain(active, keys);
        let mut encoder = match self.active.as_mut().unwrap().encoder.take() {
            Some(encoder) => encoder,
            None => return Err(Error::new(ErrorKind::WrongMode)),
        };
        let result = encoder.write_key(&mut self.stream, &keys[..dim]);
        self.active.as_mut().unwrap().encoder = Some(encoder);
        if let Err(e) = result {
            self.capture_error(&keys[..dim], values);
            return Err(e);
        }
        records::write_values(&mut self.stream, &self.specials, values)?;
        self.note_values(values);
        let active = self.active.as_mut().unwrap();
        active.records += 1;
        if let Some(bits) = active.bitmap.as_mut() {
            bitmap_set(bits, keys[0]);
        }
        if active.val_count >= 1 && values[0] != 0.0 {
            active.has_text = true;
        }
        if !in_domain {
            self.capture_error(&keys[..dim], values);
            self.error_log.push(ErrorKind::DomainViolation);
        }
        Ok(())
    }

    /// Buffer one record keyed by user mapping numbers.
    pub fn write_mapped(&mut self, keys: &[i32], values: &[f64]) -> Result<()> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::WrongMode))?;
        let dim = active.dim;
        if keys.len() < dim || values.len() < active.val_count {
            return Err(Error::new(ErrorKind::BadDimension));
        }
        let mut raw = [0i32; MAX_DIM];
        for d in 0..dim {
            match self.uels.raw_for_map(keys[d]) {
                Some(r) => raw[d] = r,
                None => {
                    self.capture_error(&keys[..dim], values);
                    return Err(Error::new(ErrorKind::BadElementIndex));
                }
            }
        }
        self.push_buffered(&raw[..dim], values)
    }

    /// Buffer one record keyed by element labels, interning unknown ones.
    pub fn write_str(&mut self, labels: &[&str], values: &[f64]) -> Result<()> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::WrongMode))?;
        let dim = active.dim;
        if labels.len() < dim || values.len() < active.val_count {
            return Err(Error::new(ErrorKind::BadDimension));
        }
        let mut raw = [0i32; MAX_DIM];
        for d in 0..dim {
            raw[d] = self.uels.register_str(labels[d])?;
        }
        self.push_buffered(&raw[..dim], values)
    }

    fn push_buffered(&mut self, raw: &[i32], values: &[f64]) -> Result<()> {
        let active = self.active.as_ref().unwrap();
        let values = &values[..active.val_count];
        let in_domain = self.check_domain(active, raw);
        let active = self.active.as_mut().unwrap();
        active
            .buffer
            .as_mut()
            .expect("buffered write modes hold a record buffer")
            .push(raw, values);
        if let Some(bits) = active.bitmap.as_mut() {
            bitmap_set(bits, raw[0]);
        }
        if active.val_count >= 1 && values[0] != 0.0 {
            active.has_text = true;
        }
        self.note_values(values);
        if !in_domain {
            self.capture_error(raw, values);
            self.error_log.push(ErrorKind::DomainViolation);
        }
        Ok(())
    }

    /// Finish the current data write, flushing buffered modes through the
    /// codec in sorted order.
    pub fn data_done(&mut self) -> Result<()> {
        let mut active = self
            .active
            .take()
            .ok_or_else(|| Error::new(ErrorKind::WrongMode))?;
        match active.mode {
            WriteMode::Raw => {
                let mut encoder = active.encoder.take().unwrap();
                encoder.finish(&mut self.stream)?;
                self.stream.set_compression(false)?;
            }
            WriteMode::Mapped | WriteMode::Str => {
                let buffer = active.buffer.take().unwrap();
                self.stream
                    .set_compression(self.compress && active.dim > 0)?;
                active.start_pos = self.stream.position()?;
                let mut min = [0i32; MAX_DIM];
                let mut max = [0i32; MAX_DIM];
                for d in 0..active.dim {
                    let (lo, hi) = buffer.key_range(d);
                    min[d] = lo;
                    max[d] = hi;
                }
                let mut encoder = KeyEncoder::begin(
                    &mut self.stream,
                    active.dim,
                    &min[..active.dim],
                    &max[..active.dim],
                )?;
                let order = buffer.sorted_order();
                let mut prev: Option<usize> = None;
                for &nr in &order {
                    let (keys, values) = buffer.record(nr as usize);
                    if let Some(p) = prev {
                        if buffer.record(p).0 == keys {
                            active.error_total += 1;
                            if self.error_records.len() < ERROR_RECORD_CAP {
                                self.error_records.push(ErrorRecord {
                                    keys: keys.to_vec(),
                                    values: values.to_vec(),
                                });
                            }
                            self.error_log.push(ErrorKind::DuplicateKey);
                            continue;
                        }
                    }
                    encoder.write_key(&mut self.stream, keys)?;
                    records::write_values(&mut self.stream, &self.specials, values)?;
                    active.records += 1;
                    prev = Some(nr as usize);
                }
                encoder.finish(&mut self.stream)?;
                self.stream.set_compression(false)?;
            }
        }
        let symbol = self.symbols.get_mut(active.sym).unwrap();
        symbol.position = active.start_pos as i64;
        symbol.data_count = active.records;
        symbol.error_count = active.error_total;
        if symbol.typ == DataType::Set {
            symbol.has_set_text = active.has_text;
        }
        if let Some(bits) = active.bitmap {
            self.dom_sets.insert(active.sym, bits);
        }
        log::trace!(
            "gdx: symbol {} done, {} records",
            active.sym,
            active.records
        );
        Ok(())
    }

    /// Add an alias for an existing set. Exactly one of the two names must
    /// already exist.
    pub fn add_alias(&mut self, id1: &str, id2: &str) -> Result<()> {
        let (known, fresh) = match (self.symbols.find(id1), self.symbols.find(id2)) {
            (Some(nr), None) => (nr, id2),
            (None, Some(nr)) => (nr, id1),
            _ => return Err(Error::new(ErrorKind::DuplicateSymbol)),
        };
        let (dim, target_name) = if known == 0 {
            (1, format::UNIVERSE_NAME.to_owned())
        } else {
            let target = self.symbols.get(known).unwrap();
            match target.typ {
                DataType::Set | DataType::Alias => {}
                _ => return Err(Error::new(ErrorKind::BadType)),
            }
            (target.dim, target.name.clone())
        };
        let mut alias = Symbol::new(
            fresh,
            dim,
            DataType::Alias,
            known,
            &format!("Aliased with {}", target_name),
        );
        alias.position = -1;
        self.symbols.add(alias)?;
        Ok(())
    }

    pub fn memory_used(&self) -> usize {
        self.uels.memory_used()
            + self.symbols.memory_used()
            + self.texts.memory_used()
            + self.acronyms.memory_used()
            + self
                .active
                .as_ref()
                .and_then(|a| a.buffer.as_ref())
                .map_or(0, |b| b.memory_used())
    }

    fn resolve_pending_domains(&mut self) {
        let mut resolutions: Vec<(i32, Vec<DomainRef>)> = Vec::new();
        for nr in 1..=self.symbols.len() as i32 {
            let symbol = self.symbols.get(nr).unwrap();
            let domain = match &symbol.domain {
                Some(d) if d.iter().any(|r| matches!(r, DomainRef::Pending(_))) => d.clone(),
                _ => continue,
            };
            let resolved = domain
                .into_iter()
                .map(|r| match r {
                    DomainRef::Pending(name) => match self.symbols.find(&name) {
                        Some(p)
                            if p > 0
                                && matches!(
                                    self.symbols.get(p).unwrap().typ,
                                    DataType::Set | DataType::Alias
                                ) =>
                        {
                            DomainRef::Resolved(p)
                        }
                        // Never defined as a set: degrade to a relaxed
                        // reference kept by name only.
                        _ => {
                            log::debug!("gdx: domain {} unresolved, relaxing", name);
                            DomainRef::Pending(name)
                        }
                    },
                    other => other,
                })
                .collect();
            resolutions.push((nr, resolved));
        }
        for (nr, resolved) in resolutions {
            let still_pending = resolved
                .iter()
                .any(|r| matches!(r, DomainRef::Pending(_)));
            if still_pending {
                // The whole link demotes to names, but dimensions that did
                // resolve keep their parent's real name.
                let names: Vec<String> = resolved
                    .iter()
                    .map(|r| match r {
                        DomainRef::Pending(name) => name.clone(),
                        DomainRef::Universe => format::UNIVERSE_NAME.to_owned(),
                        DomainRef::Resolved(p) => self.symbols.get(*p).unwrap().name.clone(),
                    })
                    .collect();
                let symbol = self.symbols.get_mut(nr).unwrap();
                if symbol.relaxed_domain.is_none() {
                    symbol.relaxed_domain = Some(names);
                }
                symbol.domain = None;
            } else {
                let symbol = self.symbols.get_mut(nr).unwrap();
                symbol.domain = Some(resolved);
            }
        }
    }

    fn write_relaxed_domains(&mut self) -> Result<()> {
        let mut names: Vec<String> = Vec::new();
        let mut rows: Vec<(i32, Vec<i32>)> = Vec::new();
        for nr in 1..=self.symbols.len() as i32 {
            let symbol = self.symbols.get(nr).unwrap();
            if let Some(relaxed) = &symbol.relaxed_domain {
                let mut indices = Vec::with_capacity(relaxed.len());
                for name in relaxed {
                    let pos = match names.iter().position(|n| n == name) {
                        Some(pos) => pos,
                        None => {
                            names.push(name.clone());
                            names.len() - 1
                        }
                    };
                    indices.push(pos as i32 + 1);
                }
                rows.push((nr, indices));
            }
        }
        self.stream.write_str(MARK_DOMS)?;
        self.stream.write_i32(names.len() as i32)?;
        for name in &names {
            self.stream.write_str(name)?;
        }
        self.stream.write_str(MARK_DOMS)?;
        for (nr, indices) in &rows {
            self.stream.write_i32(*nr)?;
            for &ix in indices {
                self.stream.write_i32(ix)?;
            }
        }
        self.stream.write_i32(-1)?;
        self.stream.write_str(MARK_DOMS)?;
        Ok(())
    }

    /// Write every catalog section and rewrite the section index.
    pub fn close(&mut self) -> Result<()> {
        if self.active.is_some() {
            self.data_done()?;
        }
        self.resolve_pending_domains();
        let next_write = self.stream.position()?;
        self.sections[SECTION_NEXT_WRITE] = next_write as i64;

        self.stream.set_compression(self.compress)?;
        self.sections[SECTION_ACRONYMS] = self.stream.position()? as i64;
        self.acronyms.write(&mut self.stream)?;
        self.stream.set_compression(false)?;

        self.stream.set_compression(self.compress)?;
        self.sections[SECTION_RELAXED_DOMAINS] = self.stream.position()? as i64;
        self.write_relaxed_domains()?;
        self.stream.set_compression(false)?;

        self.stream.set_compression(self.compress)?;
        self.sections[SECTION_SET_TEXTS] = self.stream.position()? as i64;
        self.texts.write(&mut self.stream)?;
        self.stream.set_compression(false)?;

        self.stream.set_compression(self.compress)?;
        self.sections[SECTION_SYMBOLS] = self.stream.position()? as i64;
        self.symbols.write(&mut self.stream)?;
        self.stream.set_compression(false)?;

        self.stream.set_compression(self.compress)?;
        self.sections[SECTION_UELS] = self.stream.position()? as i64;
        self.uels.write(&mut self.stream)?;
        self.stream.set_compression(false)?;

        self.stream.seek(self.index_pos)?;
        self.stream.write_i32(MARK_BOI)?;
        for &section in self.sections.iter() {
            self.stream.write_i64(section)?;
        }
        self.stream.flush()?;
        log::debug!(
            "gdx: closed file, {} symbols, {} labels",
            self.symbols.len(),
            self.uels.len()
        );
        Ok(())
    }
}
