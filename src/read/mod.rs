//! The read engine.
//!
//! A [`Reader`] parses the header and eagerly loads the catalog sections
//! (labels, symbols, set texts, acronyms, relaxed domains); record data is
//! decoded on demand per symbol. Raw and string reads stream straight from
//! the file; mapped and filtered reads buffer the translated records so
//! they can be served sorted in user-mapping space.

use std::io::{Read, Seek, Write};

use crate::acronym::{acronym_index, acronym_value, AcronymList};
use crate::error::{Error, ErrorKind, Result};
use crate::filter::FilterSet;
use crate::format::{
    self, DOMC_EXPAND, DOMC_STRICT, DOMC_UNMAPPED, MARK_BOI, MARK_DOMS, MAX_DIM,
    SECTION_ACRONYMS, SECTION_COUNT, SECTION_RELAXED_DOMAINS, SECTION_SET_TEXTS, SECTION_SYMBOLS,
    SECTION_UELS,
};
use crate::records::{self, KeyDecoder};
use crate::settext::SetTextPool;
use crate::specials::{SpecialValues, ValueClass};
use crate::stream::BufferedStream;
use crate::symbol::{DataType, SymbolTable};
use crate::uel::UelTable;
use crate::write::{ErrorRecord, ERROR_RECORD_CAP};

/// The three key conventions of a data read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadMode {
    Raw,
    Mapped,
    Str,
}

/// Where the records of the active read come from.
#[derive(Debug)]
enum Source {
    /// Streaming straight out of the data section.
    Stream(KeyDecoder),
    /// Pre-translated records served in sorted order.
    Buffered(Vec<(Vec<i32>, Vec<f64>)>),
    /// The synthetic universe symbol: one record per label.
    Universe,
}

#[derive(Debug)]
struct ActiveRead {
    dim: usize,
    val_count: usize,
    source: Source,
    /// Position within a buffered or universe source.
    pos: usize,
    last_key: [i32; MAX_DIM],
    have_last: bool,
}

/// State of a slice read: the per-dimension coordinate systems built by
/// `slice_start`.
#[derive(Debug)]
struct SliceState {
    sym: i32,
    dim: usize,
    /// Per-dimension sorted distinct raw element numbers.
    elems: Vec<Vec<i32>>,
    /// Dimensions left free by the last `slice_read`.
    wildcards: Vec<usize>,
}

/// Catalog state handed over to the write engine when a file is reopened
/// for appending.
#[derive(Debug)]
pub(crate) struct ReaderParts {
    pub version: i32,
    pub compressed: bool,
    pub audit: String,
    pub producer: String,
    pub index_pos: u64,
    pub sections: [i64; SECTION_COUNT],
    pub uels: UelTable,
    pub symbols: SymbolTable,
    pub texts: SetTextPool,
    pub acronyms: AcronymList,
}

/// The read half of an open GDX file.
#[derive(Debug)]
pub(crate) struct Reader<S> {
    stream: BufferedStream<S>,
    pub version: i32,
    pub compressed: bool,
    pub audit: String,
    pub producer: String,
    index_pos: u64,
    sections: [i64; SECTION_COUNT],
    pub uels: UelTable,
    pub symbols: SymbolTable,
    pub texts: SetTextPool,
    pub acronyms: AcronymList,
    pub specials: SpecialValues,
    pub filters: FilterSet,
    pub map_acronyms_to_nan: bool,
    active: Option<ActiveRead>,
    slice: Option<SliceState>,
    pub error_records: Vec<ErrorRecord>,
}

impl<S: Read + Write + Seek> Reader<S> {
    /// Open a file: validate the signature, header and section index,
    /// then load every catalog section.
    pub fn open(inner: S) -> Result<Reader<S>> {
        let mut stream = BufferedStream::open(inner)?;
        if stream.read_u8()? != format::GDX_MAGIC {
            return Err(Error::new(ErrorKind::BadMagic));
        }
        if stream.read_str()? != format::GDX_HEADER_ID {
            return Err(Error::new(ErrorKind::BadMagic));
        }
        let version = stream.read_i32()?;
        if version > format::GDX_VERSION {
            return Err(Error::new(ErrorKind::VersionTooNew));
        }
        let compressed = stream.read_i32()? == 1;
        let audit = stream.read_str()?;
        let producer = stream.read_str()?;
        let index_pos = stream.position()?;
        if stream.read_i32()? != MARK_BOI {
            return Err(Error::new(ErrorKind::Corrupt));
        }
        let mut sections = [-1i64; SECTION_COUNT];
        for section in sections.iter_mut() {
            *section = stream.read_i64()?;
        }

        let mut reader = Reader {
            stream,
            version,
            compressed,
            audit,
            producer,
            index_pos,
            sections,
            uels: UelTable::default(),
            symbols: SymbolTable::default(),
            texts: SetTextPool::default(),
            acronyms: AcronymList::default(),
            specials: SpecialValues::default(),
            filters: FilterSet::default(),
            map_acronyms_to_nan: false,
            active: None,
            slice: None,
            error_records: Vec::new(),
        };
        reader.load_catalog()?;
        log::debug!(
            "gdx: opened file from {} (version {}, {} symbols, {} labels)",
            reader.producer,
            reader.version,
            reader.symbols.len(),
            reader.uels.len()
        );
        Ok(reader)
    }

    fn seek_section(&mut self, section: usize) -> Result<()> {
        let pos = self.sections[section];
        if pos < 0 {
            return Err(Error::new(ErrorKind::Corrupt));
        }
        self.stream.set_compression(false)?;
        self.stream.seek(pos as u64)?;
        self.stream.set_compression(self.compressed)?;
        Ok(())
    }

    fn load_catalog(&mut self) -> Result<()> {
        self.seek_section(SECTION_UELS)?;
        self.uels = UelTable::read(&mut self.stream)?;
        self.seek_section(SECTION_SYMBOLS)?;
        self.symbols = SymbolTable::read(&mut self.stream)?;
        self.seek_section(SECTION_SET_TEXTS)?;
        self.texts = SetTextPool::read(&mut self.stream)?;
        self.seek_section(SECTION_ACRONYMS)?;
        self.acronyms = AcronymList::read(&mut self.stream)?;
        self.load_relaxed_domains()?;
        self.stream.set_compression(false)?;
        Ok(())
    }

    fn load_relaxed_domains(&mut self) -> Result<()> {
        self.seek_section(SECTION_RELAXED_DOMAINS)?;
        if self.stream.read_str()? != MARK_DOMS {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        let count = self.stream.read_i32()?;
        if count < 0 {
            return Err(Error::new(ErrorKind::Corrupt));
        }
        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            names.push(self.stream.read_str()?);
        }
        if self.stream.read_str()? != MARK_DOMS {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        loop {
            let sym = self.stream.read_i32()?;
            if sym == -1 {
                break;
            }
            let dim = self
                .symbols
                .get(sym)
                .map(|s| s.dim)
                .ok_or_else(|| Error::new(ErrorKind::Corrupt))?;
            let mut domain = Vec::with_capacity(dim);
            for _ in 0..dim {
                let ix = self.stream.read_i32()?;
                let name = names
                    .get((ix - 1).max(0) as usize)
                    .ok_or_else(|| Error::new(ErrorKind::Corrupt))?;
                domain.push(name.clone());
            }
            self.symbols.get_mut(sym).unwrap().relaxed_domain = Some(domain);
        }
        if self.stream.read_str()? != MARK_DOMS {
            return Err(Error::new(ErrorKind::BadMarker));
        }
        Ok(())
    }

    /// Give the stream and catalog to the write engine (append mode).
    pub fn into_parts(self) -> (BufferedStream<S>, ReaderParts) {
        (
            self.stream,
            ReaderParts {
                version: self.version,
                compressed: self.compressed,
                audit: self.audit,
                producer: self.producer,
                index_pos: self.index_pos,
                sections: self.sections,
                uels: self.uels,
                symbols: self.symbols,
                texts: self.texts,
                acronyms: self.acronyms,
            },
        )
    }

    /// The dimension of the symbol currently being read.
    pub fn current_dim(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.dim)
    }

    /// Resolve a symbol number for reading, following aliases to their
    /// target set.
    fn resolve(&self, sym: i32) -> Result<i32> {
        let symbol = self
            .symbols
            .get(sym)
            .ok_or_else(|| Error::new(ErrorKind::BadSymbolNumber))?;
        if symbol.typ == DataType::Alias {
            // user_info 0 aliases the universe.
            return Ok(symbol.user_info);
        }
        Ok(sym)
    }

    /// Begin reading a symbol's records. Returns the stored record count.
    /// `actions` is the per-dimension mapping policy for mapped and
    /// filtered reads.
    pub fn data_start(
        &mut self,
        sym: i32,
        mode: ReadMode,
        actions: Option<&[i32]>,
    ) -> Result<i32> {
        self.active = None;
        self.error_records.clear();
        if let Some(actions) = actions {
            for &action in actions {
                if action >= 1 && !self.filters.exists(action) {
                    return Err(Error::new(ErrorKind::FilterUnknown));
                }
            }
        }
        let sym = if sym == 0 { 0 } else { self.resolve(sym)? };
        if sym == 0 {
            let count = self.uels.len() as i32;
            let mut active = ActiveRead {
                dim: 1,
                val_count: 1,
                source: Source::Universe,
                pos: 0,
                last_key: [0; MAX_DIM],
                have_last: false,
            };
            if mode == ReadMode::Mapped {
                let records = self.universe_records();
                active.source = Source::Buffered(self.translate(records, 1, actions));
            }
            self.active = Some(active);
            return Ok(count);
        }
        let (dim, val_count, count, position, data_compressed) = {
            let symbol = self
                .symbols
                .get(sym)
                .ok_or_else(|| Error::new(ErrorKind::BadSymbolNumber))?;
            (
                symbol.dim,
                symbol.typ.value_count().max(1),
                symbol.data_count,
                symbol.position,
                symbol.compressed,
            )
        };
        if position < 0 {
            return Err(Error::new(ErrorKind::Corrupt));
        }
        self.stream.set_compression(false)?;
        self.stream.seek(position as u64)?;
        self.stream.set_compression(data_compressed)?;
        let decoder = KeyDecoder::begin(&mut self.stream, dim)?;
        let mut active = ActiveRead {
            dim,
            val_count,
            source: Source::Stream(decoder),
            pos: 0,
            last_key: [0; MAX_DIM],
            have_last: false,
        };
        if mode == ReadMode::Mapped {
            let records = self.drain_stream(&mut active)?;
            active.source = Source::Buffered(self.translate(records, dim, actions));
        }
        self.active = Some(active);
        Ok(count)
    }

    fn universe_records(&self) -> Vec<(Vec<i32>, Vec<f64>)> {
        (1..=self.uels.len() as i32)
            .map(|raw| (vec![raw], vec![0.0]))
            .collect()
    }

    /// Read every remaining record of the active stream source.
    fn drain_stream(&mut self, active: &mut ActiveRead) -> Result<Vec<(Vec<i32>, Vec<f64>)>> {
        let mut records = Vec::new();
        let decoder = match &mut active.source {
            Source::Stream(decoder) => decoder,
            _ => return Ok(records),
        };
        let mut key = [0i32; MAX_DIM];
        let mut values = vec![0.0f64; active.val_count];
        while decoder.read_key(&mut self.stream, &mut key)?.is_some() {
            records::read_values(&mut self.stream, &self.specials, &mut values)?;
            records.push((key[..active.dim].to_vec(), values.clone()));
        }
        self.stream.set_compression(false)?;
        Ok(records)
    }

    /// Translate raw-keyed records into user-mapping space, honoring the
    /// per-dimension actions, and sort the survivors. Without an action
    /// vector every dimension is strict; a vector shorter than the
    /// dimension leaves the trailing dimensions unmapped, like the
    /// filtered fast read.
    fn translate(
        &mut self,
        records: Vec<(Vec<i32>, Vec<f64>)>,
        dim: usize,
        actions: Option<&[i32]>,
    ) -> Vec<(Vec<i32>, Vec<f64>)> {
        let mut out = Vec::with_capacity(records.len());
        'rec: for (raw, values) in records {
            let mut mapped = vec![0i32; dim];
            for d in 0..dim {
                let action =
                    actions.map_or(DOMC_STRICT, |a| a.get(d).copied().unwrap_or(DOMC_UNMAPPED));
                let map = self.uels.get(raw[d]).map(|(_, m)| m).unwrap_or(-1);
                mapped[d] = match action {
                    DOMC_UNMAPPED => raw[d],
                    DOMC_EXPAND => self.uels.expand_map(raw[d]).unwrap_or(-1),
                    DOMC_STRICT => {
                        if map < 0 {
                            self.reject(&raw, &values);
                            continue 'rec;
                        }
                        map
                    }
                    nr => {
                        let pass = map >= 0
                            && self.filters.get(nr).map_or(false, |f| f.contains(map));
                        if !pass {
                            self.reject(&raw, &values);
                            continue 'rec;
                        }
                        map
                    }
                };
            }
            out.push((mapped, values));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn reject(&mut self, keys: &[i32], values: &[f64]) {
        if self.error_records.len() < ERROR_RECORD_CAP {
            self.error_records.push(ErrorRecord {
                keys: keys.to_vec(),
                values: values.to_vec(),
            });
        }
    }

    /// Post-process decoded values: acronym remapping and the optional
    /// NaN substitution.
    fn finish_values(&mut self, values: &mut [f64]) {
        for v in values {
            if self.specials.classify(*v) == ValueClass::Acronym {
                let index = self.acronyms.remap_on_read(acronym_index(*v));
                *v = if self.map_acronyms_to_nan {
                    f64::NAN
                } else {
                    acronym_value(index)
                };
            }
        }
    }

    fn dim_first(active: &mut ActiveRead, key: &[i32]) -> usize {
        let mut first = active.dim.min(1);
        if active.have_last {
            first = active.dim;
            for d in 0..active.dim {
                if active.last_key[d] != key[d] {
                    first = d + 1;
                    break;
                }
            }
        }
        active.last_key[..active.dim].copy_from_slice(&key[..active.dim]);
        active.have_last = true;
        first
    }

    /// Read the next record of the active symbol. Returns the 1-based
    /// first changed dimension, or `None` at the end of the data.
    pub fn data_read(&mut self, keys: &mut [i32], values: &mut [f64]) -> Result<Option<usize>> {
        let mut active = self
            .active
            .take()
            .ok_or_else(|| Error::new(ErrorKind::WrongMode))?;
        if keys.len() < active.dim || values.len() < active.val_count {
            self.active = Some(active);
            return Err(Error::new(ErrorKind::BadDimension));
        }
        let result = self.read_next(&mut active, keys, values);
        self.active = Some(active);
        result
    }

    fn read_next(
        &mut self,
        active: &mut ActiveRead,
        keys: &mut [i32],
        values: &mut [f64],
    ) -> Result<Option<usize>> {
        let dim = active.dim;
        let val_count = active.val_count;
        match &mut active.source {
            Source::Stream(decoder) => {
                let first = match decoder.read_key(&mut self.stream, keys)? {
                    Some(first) => first,
                    None => return Ok(None),
                };
                records::read_values(&mut self.stream, &self.specials, &mut values[..val_count])?;
                self.finish_values(&mut values[..val_count]);
                active.last_key[..dim].copy_from_slice(&keys[..dim]);
                active.have_last = true;
                Ok(Some(first))
            }
            Source::Buffered(records) => {
                let (key, vals) = match records.get(active.pos) {
                    Some(entry) => entry,
                    None => return Ok(None),
                };
                keys[..dim].copy_from_slice(key);
                values[..val_count].copy_from_slice(vals);
                active.pos += 1;
                let first = Self::dim_first(active, &keys[..dim]);
                self.finish_values(&mut values[..val_count]);
                Ok(Some(first))
            }
            Source::Universe => {
                let raw = active.pos as i32 + 1;
                if raw > self.uels.len() as i32 {
                    return Ok(None);
                }
                active.pos += 1;
                keys[0] = raw;
                values[0] = 0.0;
                Ok(Some(Self::dim_first(active, &[raw])))
            }
        }
    }

    /// Finish the active read.
    pub fn data_done(&mut self) -> Result<()> {
        self.active = None;
        self.stream.set_compression(false)?;
        Ok(())
    }

    /// Stream every record of a symbol through `each` without touching the
    /// active-read state. `each` returns false to stop early.
    pub fn read_raw_fast(
        &mut self,
        sym: i32,
        mut each: impl FnMut(&[i32], &[f64], usize) -> bool,
    ) -> Result<i32> {
        let sym = if sym == 0 { 0 } else { self.resolve(sym)? };
        if sym == 0 {
            let values = [0.0f64];
            for raw in 1..=self.uels.len() as i32 {
                if !each(&[raw], &values, 1) {
                    break;
                }
            }
            return Ok(self.uels.len() as i32);
        }
        let (dim, val_count, count, position, data_compressed) = {
            let symbol = self
                .symbols
                .get(sym)
                .ok_or_else(|| Error::new(ErrorKind::BadSymbolNumber))?;
            (
                symbol.dim,
                symbol.typ.value_count().max(1),
                symbol.data_count,
                symbol.position,
                symbol.compressed,
            )
        };
        if position < 0 {
            return Err(Error::new(ErrorKind::Corrupt));
        }
        self.stream.set_compression(false)?;
        self.stream.seek(position as u64)?;
        self.stream.set_compression(data_compressed)?;
        let mut decoder = KeyDecoder::begin(&mut self.stream, dim)?;
        let mut key = [0i32; MAX_DIM];
        let mut values = vec![0.0f64; val_count];
        while let Some(first) = decoder.read_key(&mut self.stream, &mut key)? {
            records::read_values(&mut self.stream, &self.specials, &mut values)?;
            self.finish_values(&mut values);
            if !each(&key[..dim], &values, first) {
                break;
            }
        }
        self.stream.set_compression(false)?;
        Ok(count)
    }

    /// Filtered streaming read: records whose mapped keys fail the
    /// per-dimension actions are skipped silently.
    pub fn read_raw_fast_filtered(
        &mut self,
        sym: i32,
        actions: &[i32],
        mut each: impl FnMut(&[i32], &[f64]) -> bool,
    ) -> Result<i32> {
        for &action in actions {
            if action >= 1 && !self.filters.exists(action) {
                return Err(Error::new(ErrorKind::FilterUnknown));
            }
        }
        let mut pending: Vec<(Vec<i32>, Vec<f64>)> = Vec::new();
        let count = self.read_raw_fast(sym, |keys, values, _| {
            pending.push((keys.to_vec(), values.to_vec()));
            true
        })?;
        for (keys, values) in pending {
            let mut pass = true;
            for (d, &key) in keys.iter().enumerate() {
                let action = actions.get(d).copied().unwrap_or(DOMC_UNMAPPED);
                if action >= 1 {
                    let map = self.uels.get(key).map(|(_, m)| m).unwrap_or(-1);
                    let ok = map >= 0
                        && self.filters.get(action).map_or(false, |f| f.contains(map));
                    if !ok {
                        pass = false;
                        break;
                    }
                } else if action == DOMC_EXPAND {
                    let _ = self.uels.expand_map(key);
                }
            }
            if pass && !each(&keys, &values) {
                break;
            }
        }
        Ok(count)
    }

    /// The longest label used by a symbol, overall and per dimension.
    pub fn symbol_index_max_length(&mut self, sym: i32) -> Result<(i32, [i32; MAX_DIM])> {
        let mut per_dim = [0i32; MAX_DIM];
        if sym == 0 {
            let max = self.uels.max_len() as i32;
            per_dim[0] = max;
            return Ok((max, per_dim));
        }
        // Collect the distinct raw numbers per dimension first; labels are
        // measured afterwards since the record callback cannot reach the
        // label table.
        let mut seen: Vec<Vec<i32>> = vec![Vec::new(); MAX_DIM];
        self.read_raw_fast(sym, |keys, _, _| {
            for (d, &key) in keys.iter().enumerate() {
                if let Err(pos) = seen[d].binary_search(&key) {
                    seen[d].insert(pos, key);
                }
            }
            true
        })?;
        for (d, keys) in seen.iter().enumerate() {
            for &key in keys {
                let len = self.uels.get(key).map_or(0, |(name, _)| name.len());
                per_dim[d] = per_dim[d].max(len as i32);
            }
        }
        let max = per_dim.iter().copied().max().unwrap_or(0);
        Ok((max, per_dim))
    }

    /// Distinct elements used on one dimension of a symbol.
    /// `filter_action` follows the filtered-read conventions.
    pub fn domain_elements(
        &mut self,
        sym: i32,
        dim_pos: usize,
        filter_action: i32,
        mut each: impl FnMut(i32, i32) -> bool,
    ) -> Result<i32> {
        if filter_action >= 1 && !self.filters.exists(filter_action) {
            return Err(Error::new(ErrorKind::FilterUnknown));
        }
        let dim = if sym == 0 {
            1
        } else {
            self.symbols
                .get(self.resolve(sym)?)
                .map(|s| s.dim)
                .ok_or_else(|| Error::new(ErrorKind::BadSymbolNumber))?
        };
        if dim_pos < 1 || dim_pos > dim {
            return Err(Error::new(ErrorKind::BadDimension));
        }
        let mut seen: Vec<i32> = Vec::new();
        self.read_raw_fast(sym, |keys, _, _| {
            let key = keys[dim_pos - 1];
            if let Err(pos) = seen.binary_search(&key) {
                seen.insert(pos, key);
            }
            true
        })?;
        let mut count = 0;
        for raw in seen {
            let map = self.uels.get(raw).map(|(_, m)| m).unwrap_or(-1);
            let mapped = match filter_action {
                DOMC_UNMAPPED => raw,
                DOMC_EXPAND => self.uels.expand_map(raw).unwrap_or(-1),
                DOMC_STRICT => map,
                nr => {
                    let pass =
                        map >= 0 && self.filters.get(nr).map_or(false, |f| f.contains(map));
                    if !pass {
                        continue;
                    }
                    map
                }
            };
            count += 1;
            if !each(raw, mapped) {
                break;
            }
        }
        Ok(count)
    }

    /// Build the slice coordinate systems for a symbol: one sorted list of
    /// distinct elements per dimension. Returns the element counts.
    pub fn slice_start(&mut self, sym: i32) -> Result<Vec<i32>> {
        let sym = if sym == 0 { 0 } else { self.resolve(sym)? };
        let dim = if sym == 0 {
            1
        } else {
            self.symbols
                .get(sym)
                .map(|s| s.dim)
                .ok_or_else(|| Error::new(ErrorKind::BadSymbolNumber))?
        };
        let mut elems: Vec<Vec<i32>> = vec![Vec::new(); dim.max(1)];
        self.read_raw_fast(sym, |keys, _, _| {
            for (d, &key) in keys.iter().enumerate() {
                if let Err(pos) = elems[d].binary_search(&key) {
                    elems[d].insert(pos, key);
                }
            }
            true
        })?;
        let counts = elems.iter().map(|e| e.len() as i32).collect();
        self.slice = Some(SliceState {
            sym,
            dim,
            elems,
            wildcards: (0..dim).collect(),
        });
        Ok(counts)
    }

    /// Read a slice: dimensions with an empty label are free, the rest are
    /// fixed to the given label. `each` receives the free dimensions'
    /// slice coordinates (positions in the `slice_start` lists). Returns
    /// the number of free dimensions.
    pub fn slice_read(
        &mut self,
        labels: &[&str],
        mut each: impl FnMut(&[i32], &[f64]),
    ) -> Result<usize> {
        let state = self
            .slice
            .take()
            .ok_or_else(|| Error::new(ErrorKind::WrongMode))?;
        let mut fixed: Vec<Option<i32>> = Vec::with_capacity(state.dim);
        let mut wildcards = Vec::new();
        for d in 0..state.dim {
            let label = labels.get(d).copied().unwrap_or("");
            if label.is_empty() {
                wildcards.push(d);
                fixed.push(None);
            } else {
                match self.uels.find(label) {
                    Some((raw, _)) => fixed.push(Some(raw)),
                    None => {
                        self.slice = Some(state);
                        return Err(Error::new(ErrorKind::BadUel));
                    }
                }
            }
        }
        let result = {
            let elems = &state.elems;
            let fixed = &fixed;
            let wildcards_ref = &wildcards;
            let mut slice_key = vec![0i32; wildcards.len()];
            self.read_raw_fast(state.sym, |keys, values, _| {
                for (d, want) in fixed.iter().enumerate() {
                    if let Some(want) = want {
                        if keys[d] != *want {
                            return true;
                        }
                    }
                }
                for (i, &d) in wildcards_ref.iter().enumerate() {
                    slice_key[i] = match elems[d].binary_search(&keys[d]) {
                        Ok(pos) => pos as i32,
                        Err(_) => return true,
                    };
                }
                each(&slice_key, values);
                true
            })
        };
        let free = wildcards.len();
        self.slice = Some(SliceState { wildcards, ..state });
        result?;
        Ok(free)
    }

    /// Map slice coordinates from the last `slice_read` back to labels.
    pub fn slice_uels(&self, slice_keys: &[i32]) -> Result<Vec<String>> {
        let state = self
            .slice
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::WrongMode))?;
        let mut out = Vec::with_capacity(state.wildcards.len());
        for (i, &d) in state.wildcards.iter().enumerate() {
            let pos = slice_keys
                .get(i)
                .copied()
                .ok_or_else(|| Error::new(ErrorKind::BadDimension))?;
            let raw = state
                .elems
                .get(d)
                .and_then(|e| e.get(pos.max(0) as usize))
                .copied()
                .ok_or_else(|| Error::new(ErrorKind::BadElementIndex))?;
            let (name, _) = self
                .uels
                .get(raw)
                .ok_or_else(|| Error::new(ErrorKind::BadElementIndex))?;
            out.push(name.to_owned());
        }
        Ok(out)
    }

    pub fn memory_used(&self) -> usize {
        let buffered = match self.active.as_ref().map(|a| &a.source) {
            Some(Source::Buffered(records)) => records
                .iter()
                .map(|(k, v)| k.len() * 4 + v.len() * 8)
                .sum(),
            _ => 0,
        };
        self.uels.memory_used()
            + self.symbols.memory_used()
            + self.texts.memory_used()
            + self.acronyms.memory_used()
            + self.filters.memory_used()
            + buffered
    }
}
