//! The handle-oriented facade.
//!
//! [`Gdx`] packages the read and write engines behind the classic GDX
//! calling convention: a state machine over one open file, calls that
//! report success as `bool`/`Option`, and a per-handle error queue holding
//! stable numeric codes. Internally everything is `Result`-typed; this
//! module is the translation layer.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::acronym;
use crate::error::{message_for_code, Error, ErrorKind};
use crate::format::{self, MAX_DIM, MAX_TEXT_LEN};
use crate::read::{ReadMode, Reader};
use crate::specials::{ValueClass, SPECIAL_COUNT};
use crate::symbol::{DataType, DomainRef};
use crate::write::{WriteMode, Writer};

/// Audit line stamped into files written by this library.
const AUDIT_LINE: &str = concat!("GDX Library      ", env!("CARGO_PKG_VERSION"), " Rust");

/// Comment lines per symbol.
const MAX_COMMENTS: usize = 10;

/// Clip a text to the short-string limit on a character boundary.
fn clip(text: &str) -> &str {
    if text.len() <= MAX_TEXT_LEN {
        return text;
    }
    let mut end = MAX_TEXT_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[derive(Debug)]
enum Mode {
    Closed,
    Write(Box<Writer<File>>),
    Read(Box<Reader<File>>),
}

/// The sub-state within an open file: which Start/Done bracket is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    None,
    RegisterRaw,
    RegisterMap,
    RegisterStr,
    WriteRaw,
    WriteMapped,
    WriteStr,
    ReadRaw,
    ReadMapped,
    ReadStr,
    Filter,
}

/// A GDX handle: at most one open file, plus the session flags and the
/// error queue.
#[derive(Debug)]
pub struct Gdx {
    mode: Mode,
    task: Task,
    errors: Vec<i32>,
    last_error: i32,
    trace_level: i32,
    trace_id: String,
}

impl Default for Gdx {
    fn default() -> Self {
        Gdx::new()
    }
}

impl Gdx {
    /// Create an empty handle.
    pub fn new() -> Gdx {
        Gdx {
            mode: Mode::Closed,
            task: Task::None,
            errors: Vec::new(),
            last_error: 0,
            trace_level: 0,
            trace_id: String::new(),
        }
    }

    // ----- error queue -------------------------------------------------

    fn report(&mut self, e: Error) {
        let code = e.code();
        self.last_error = code;
        self.errors.push(code);
        if self.trace_level > 0 {
            log::debug!("gdx[{}]: error {}: {}", self.trace_id, code, e);
        }
    }

    fn report_kind(&mut self, kind: ErrorKind) {
        self.report(Error::new(kind));
    }

    /// Record an open failure: the last-error slot is set but the queue is
    /// not grown, so a probing caller sees `error_count() == 0`.
    fn report_open(&mut self, e: Error) {
        self.last_error = e.code();
    }

    fn drain_engine(&mut self) {
        let kinds: Vec<ErrorKind> = match &mut self.mode {
            Mode::Write(w) => w.error_log.drain(..).collect(),
            _ => Vec::new(),
        };
        for kind in kinds {
            self.report_kind(kind);
        }
    }

    fn finish<T>(&mut self, result: crate::error::Result<T>) -> Option<T> {
        self.drain_engine();
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    /// Total number of errors recorded on this handle.
    pub fn error_count(&self) -> i32 {
        self.errors.len() as i32
    }

    /// Return and clear the most recent error code.
    pub fn get_last_error(&mut self) -> i32 {
        std::mem::replace(&mut self.last_error, 0)
    }

    /// The stable message for an error code.
    pub fn error_str(&self, code: i32) -> String {
        message_for_code(code)
    }

    // ----- lifecycle ---------------------------------------------------

    /// The library audit line.
    pub fn get_dll_version(&self) -> String {
        AUDIT_LINE.to_owned()
    }

    /// Approximate heap held by the open file's tables and buffers.
    pub fn get_memory_used(&self) -> i64 {
        match &self.mode {
            Mode::Closed => 0,
            Mode::Write(w) => w.memory_used() as i64,
            Mode::Read(r) => r.memory_used() as i64,
        }
    }

    /// Select the verbosity of trace output and the prefix used for it.
    pub fn set_trace_level(&mut self, level: i32, id: &str) -> bool {
        self.trace_level = level;
        self.trace_id = id.to_owned();
        true
    }

    // ----- file lifecycle ----------------------------------------------

    fn env_compress() -> bool {
        std::env::var("GDXCOMPRESS")
            .map(|v| v.trim() == "1")
            .unwrap_or(false)
    }

    fn env_version() -> i32 {
        match std::env::var("GDXCONVERT") {
            Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
                "v5" => 5,
                "v6" => 6,
                _ => format::GDX_VERSION,
            },
            Err(_) => format::GDX_VERSION,
        }
    }

    fn do_open_write(&mut self, filename: &str, producer: &str, compress: bool) -> bool {
        if !matches!(self.mode, Mode::Closed) {
            self.report_kind(ErrorKind::WrongMode);
            return false;
        }
        if filename.is_empty() {
            self.report_open(Error::new(ErrorKind::FilenameEmpty));
            return false;
        }
        let version = Self::env_version();
        // Older file versions predate compressed frames.
        let compress = compress && version >= format::GDX_VERSION;
        let result = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(Path::new(filename))
            .map_err(Error::from)
            .and_then(|file| Writer::create(file, producer, AUDIT_LINE, compress, version));
        match result {
            Ok(writer) => {
                self.mode = Mode::Write(Box::new(writer));
                self.task = Task::None;
                true
            }
            Err(e) => {
                self.report_open(e);
                false
            }
        }
    }

    /// Open a file for writing; compression is taken from `GDXCOMPRESS`.
    pub fn open_write(&mut self, filename: &str, producer: &str) -> bool {
        self.do_open_write(filename, producer, Self::env_compress())
    }

    /// Open a file for writing with an explicit compression choice.
    pub fn open_write_ex(&mut self, filename: &str, producer: &str, compress: bool) -> bool {
        self.do_open_write(filename, producer, compress)
    }

    /// Open a file for reading.
    pub fn open_read(&mut self, filename: &str) -> bool {
        self.open_read_ex(filename, 0)
    }

    /// Open a file for reading. `read_mode` is accepted for compatibility
    /// and not currently interpreted.
    pub fn open_read_ex(&mut self, filename: &str, read_mode: i32) -> bool {
        let _ = read_mode;
        if !matches!(self.mode, Mode::Closed) {
            self.report_kind(ErrorKind::WrongMode);
            return false;
        }
        if filename.is_empty() {
            self.report_open(Error::new(ErrorKind::FilenameEmpty));
            return false;
        }
        let result = OpenOptions::new()
            .read(true)
            .write(true)
            .open(Path::new(filename))
            .or_else(|_| OpenOptions::new().read(true).open(Path::new(filename)))
            .map_err(Error::from)
            .and_then(Reader::open);
        match result {
            Ok(reader) => {
                self.mode = Mode::Read(Box::new(reader));
                self.task = Task::None;
                true
            }
            Err(e) => {
                self.report_open(e);
                false
            }
        }
    }

    /// Reopen an existing file and continue writing behind its data.
    pub fn open_append(&mut self, filename: &str, producer: &str) -> bool {
        if !matches!(self.mode, Mode::Closed) {
            self.report_kind(ErrorKind::WrongMode);
            return false;
        }
        if filename.is_empty() {
            self.report_open(Error::new(ErrorKind::FilenameEmpty));
            return false;
        }
        let result = OpenOptions::new()
            .read(true)
            .write(true)
            .open(Path::new(filename))
            .map_err(Error::from)
            .and_then(|file| Writer::append(file, producer));
        match result {
            Ok(writer) => {
                self.mode = Mode::Write(Box::new(writer));
                self.task = Task::None;
                true
            }
            Err(e) => {
                self.report_open(e);
                false
            }
        }
    }

    /// Close the open file. On the write side this finishes the in-flight
    /// section, emits the catalog sections and fixes up the section index.
    pub fn close(&mut self) -> bool {
        let mode = std::mem::replace(&mut self.mode, Mode::Closed);
        self.task = Task::None;
        match mode {
            Mode::Closed => true,
            Mode::Read(_) => true,
            Mode::Write(mut writer) => {
                let result = writer.close();
                self.drain_from(&mut writer);
                match result {
                    Ok(()) => true,
                    Err(e) => {
                        self.report(e);
                        false
                    }
                }
            }
        }
    }

    fn drain_from(&mut self, writer: &mut Writer<File>) {
        let kinds: Vec<ErrorKind> = writer.error_log.drain(..).collect();
        for kind in kinds {
            self.report_kind(kind);
        }
    }

    /// The file version and compression flag of the open file.
    pub fn file_info(&self) -> Option<(i32, i32)> {
        match &self.mode {
            Mode::Write(w) => Some((w.version, w.compress as i32)),
            Mode::Read(r) => Some((r.version, r.compressed as i32)),
            Mode::Closed => None,
        }
    }

    /// The audit line and producer recorded in the open file.
    pub fn file_version(&self) -> Option<(String, String)> {
        match &self.mode {
            Mode::Write(w) => Some((w.audit.clone(), w.producer.clone())),
            Mode::Read(r) => Some((r.audit.clone(), r.producer.clone())),
            Mode::Closed => None,
        }
    }

    /// Number of symbols (excluding the universe) and labels.
    pub fn system_info(&self) -> Option<(i32, i32)> {
        match &self.mode {
            Mode::Write(w) => Some((w.symbols.len() as i32, w.uels.len() as i32)),
            Mode::Read(r) => Some((r.symbols.len() as i32, r.uels.len() as i32)),
            Mode::Closed => None,
        }
    }

    // ----- label registration and queries ------------------------------

    fn begin_task(&mut self, want_write: bool, task: Task) -> bool {
        let mode_ok = match &self.mode {
            Mode::Write(_) => true,
            Mode::Read(_) => !want_write,
            Mode::Closed => {
                self.report_kind(ErrorKind::FileNotOpen);
                return false;
            }
        };
        if !mode_ok || self.task != Task::None {
            self.report_kind(ErrorKind::WrongMode);
            return false;
        }
        self.task = task;
        true
    }

    /// Begin registering labels by raw number.
    pub fn uel_register_raw_start(&mut self) -> bool {
        self.begin_task(true, Task::RegisterRaw)
    }

    /// Register a label; its raw number is the next free one.
    pub fn uel_register_raw(&mut self, label: &str) -> bool {
        if self.task != Task::RegisterRaw {
            self.report_kind(ErrorKind::WrongMode);
            return false;
        }
        let result = match &mut self.mode {
            Mode::Write(w) => w.uels.register_raw(label).map(|_| ()),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result).is_some()
    }

    /// Begin registering labels by name.
    pub fn uel_register_str_start(&mut self) -> bool {
        self.begin_task(true, Task::RegisterStr)
    }

    /// Register a label by name, returning its raw number (idempotent).
    pub fn uel_register_str(&mut self, label: &str) -> Option<i32> {
        if self.task != Task::RegisterStr {
            self.report_kind(ErrorKind::WrongMode);
            return None;
        }
        let result = match &mut self.mode {
            Mode::Write(w) => w.uels.register_str(label),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result)
    }

    /// Begin registering labels with user mapping numbers. Also allowed in
    /// read mode, where it binds mappings to labels loaded from the file.
    pub fn uel_register_map_start(&mut self) -> bool {
        self.begin_task(false, Task::RegisterMap)
    }

    /// Bind a user mapping number to a label.
    pub fn uel_register_map(&mut self, map: i32, label: &str) -> bool {
        if self.task != Task::RegisterMap {
            self.report_kind(ErrorKind::WrongMode);
            return false;
        }
        let result = match &mut self.mode {
            Mode::Write(w) => w.uels.register_map(map, label).map(|_| ()),
            Mode::Read(r) => r.uels.map_existing(map, label).map(|_| ()),
            Mode::Closed => Err(Error::new(ErrorKind::FileNotOpen)),
        };
        self.finish(result).is_some()
    }

    /// Finish the current label registration.
    pub fn uel_register_done(&mut self) -> bool {
        match self.task {
            Task::RegisterRaw | Task::RegisterMap | Task::RegisterStr => {
                self.task = Task::None;
                true
            }
            _ => {
                self.report_kind(ErrorKind::WrongMode);
                false
            }
        }
    }

    fn uels(&self) -> Option<&crate::uel::UelTable> {
        match &self.mode {
            Mode::Write(w) => Some(&w.uels),
            Mode::Read(r) => Some(&r.uels),
            Mode::Closed => None,
        }
    }

    /// Label count and highest user mapping in use.
    pub fn um_uel_info(&self) -> Option<(i32, i32)> {
        let uels = self.uels()?;
        Some((uels.len() as i32, uels.high_map()))
    }

    /// Label and user mapping for a raw number.
    pub fn um_uel_get(&self, nr: i32) -> Option<(String, i32)> {
        let (name, map) = self.uels()?.get(nr)?;
        Some((name.to_owned(), map))
    }

    /// Raw number and user mapping for a label.
    pub fn um_find_uel(&self, label: &str) -> Option<(i32, i32)> {
        self.uels()?.find(label)
    }

    /// Label for a user mapping number.
    pub fn get_uel(&self, map: i32) -> Option<String> {
        let (_, name) = self.uels()?.get_mapped(map)?;
        Some(name.to_owned())
    }

    /// Rename a label, keeping its numbers.
    pub fn rename_uel(&mut self, old: &str, new: &str) -> bool {
        let result = match &mut self.mode {
            Mode::Write(w) => w.uels.rename(old, new),
            Mode::Read(r) => r.uels.rename(old, new),
            Mode::Closed => Err(Error::new(ErrorKind::FileNotOpen)),
        };
        self.finish(result).is_some()
    }

    /// Length of the longest registered label.
    pub fn uel_max_length(&self) -> i32 {
        self.uels().map_or(0, |u| u.max_len() as i32)
    }

    // ----- acronyms ----------------------------------------------------

    fn acronyms_mut(&mut self) -> Option<&mut crate::acronym::AcronymList> {
        match &mut self.mode {
            Mode::Write(w) => Some(&mut w.acronyms),
            Mode::Read(r) => Some(&mut r.acronyms),
            Mode::Closed => None,
        }
    }

    fn acronyms(&self) -> Option<&crate::acronym::AcronymList> {
        match &self.mode {
            Mode::Write(w) => Some(&w.acronyms),
            Mode::Read(r) => Some(&r.acronyms),
            Mode::Closed => None,
        }
    }

    /// Register an acronym; returns its 1-based list position.
    pub fn acronym_add(&mut self, name: &str, text: &str, index: i32) -> Option<i32> {
        let result = match self.acronyms_mut() {
            Some(list) => list.add(name, text, index).map(|pos| pos as i32 + 1),
            None => Err(Error::new(ErrorKind::FileNotOpen)),
        };
        self.finish(result)
    }

    /// Number of known acronyms.
    pub fn acronym_count(&self) -> i32 {
        self.acronyms().map_or(0, |list| list.len() as i32)
    }

    /// Name, text and index of the acronym at 1-based position `nr`.
    pub fn acronym_get_info(&self, nr: i32) -> Option<(String, String, i32)> {
        if nr < 1 {
            return None;
        }
        let entry = self.acronyms()?.get((nr - 1) as usize)?;
        Some((entry.name.clone(), entry.text.clone(), entry.index))
    }

    /// Overwrite the acronym at 1-based position `nr`.
    pub fn acronym_set_info(&mut self, nr: i32, name: &str, text: &str, index: i32) -> bool {
        if nr < 1 {
            self.report_kind(ErrorKind::BadSymbolNumber);
            return false;
        }
        let result = match self.acronyms_mut() {
            Some(list) => list.set_info((nr - 1) as usize, name, text, index),
            None => Err(Error::new(ErrorKind::FileNotOpen)),
        };
        self.finish(result).is_some()
    }

    /// Original index, session index and auto flag of acronym `nr`.
    pub fn acronym_get_mapping(&self, nr: i32) -> Option<(i32, i32, i32)> {
        if nr < 1 {
            return None;
        }
        let entry = self.acronyms()?.get((nr - 1) as usize)?;
        Some((entry.stored_index, entry.index, entry.auto as i32))
    }

    /// The acronym index carried by a value, 0 when it is not an acronym.
    pub fn acronym_index(&self, value: f64) -> i32 {
        acronym::acronym_index(value)
    }

    /// The value encoding an acronym index.
    pub fn acronym_value(&self, index: i32) -> f64 {
        acronym::acronym_value(index)
    }

    /// The name of the acronym encoded in a value.
    pub fn acronym_name(&self, value: f64) -> Option<String> {
        let index = acronym::acronym_index(value);
        if index <= 0 {
            return None;
        }
        let list = self.acronyms()?;
        let pos = list.find_index(index)?;
        let entry = list.get(pos)?;
        if entry.name.is_empty() {
            None
        } else {
            Some(entry.name.clone())
        }
    }

    /// Set the counter used for automatic acronym renumbering; returns the
    /// previous value.
    pub fn acronym_next_nr(&mut self, next: i32) -> i32 {
        match self.acronyms_mut() {
            Some(list) => list.next_nr(next),
            None => 0,
        }
    }

    // ----- set texts ---------------------------------------------------

    /// Intern a set element text, returning its pool index.
    pub fn add_set_text(&mut self, text: &str) -> Option<i32> {
        let text = clip(text);
        match &mut self.mode {
            Mode::Write(w) => Some(w.texts.add(text)),
            _ => {
                self.report_kind(ErrorKind::WrongMode);
                None
            }
        }
    }

    /// Text and node number at a pool index.
    pub fn get_elem_text(&self, nr: i32) -> Option<(String, i32)> {
        let texts = match &self.mode {
            Mode::Write(w) => &w.texts,
            Mode::Read(r) => &r.texts,
            Mode::Closed => return None,
        };
        let (text, node) = texts.get(nr)?;
        Some((text.to_owned(), node))
    }

    /// Whether a set symbol carries any element texts.
    pub fn set_has_text(&self, sym: i32) -> bool {
        let symbol = match &self.mode {
            Mode::Write(w) => w.symbols.get(sym),
            Mode::Read(r) => r.symbols.get(sym),
            Mode::Closed => None,
        };
        symbol.map_or(false, |s| s.has_set_text)
    }

    /// Overwrite the node number of a pool entry.
    pub fn set_text_node_nr(&mut self, nr: i32, node: i32) -> bool {
        let result = match &mut self.mode {
            Mode::Write(w) => w.texts.set_node(nr, node),
            Mode::Read(r) => r.texts.set_node(nr, node),
            Mode::Closed => Err(Error::new(ErrorKind::FileNotOpen)),
        };
        self.finish(result).is_some()
    }

    // ----- symbols -----------------------------------------------------

    /// Add an alias for an existing set.
    pub fn add_alias(&mut self, id1: &str, id2: &str) -> bool {
        let result = match &mut self.mode {
            Mode::Write(w) => w.add_alias(id1, id2),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result).is_some()
    }

    /// The 1-based number of a symbol; 0 is the universe.
    pub fn find_symbol(&self, name: &str) -> Option<i32> {
        match &self.mode {
            Mode::Write(w) => w.symbols.find(name),
            Mode::Read(r) => r.symbols.find(name),
            Mode::Closed => None,
        }
    }

    fn symbols(&self) -> Option<&crate::symbol::SymbolTable> {
        match &self.mode {
            Mode::Write(w) => Some(&w.symbols),
            Mode::Read(r) => Some(&r.symbols),
            Mode::Closed => None,
        }
    }

    /// Name, dimension and type of a symbol.
    pub fn symbol_info(&self, sym: i32) -> Option<(String, i32, DataType)> {
        if sym == 0 {
            return Some((format::UNIVERSE_NAME.to_owned(), 1, DataType::Set));
        }
        let symbol = self.symbols()?.get(sym)?;
        Some((symbol.name.clone(), symbol.dim as i32, symbol.typ))
    }

    /// Record count, user info and explanatory text of a symbol.
    pub fn symbol_info_x(&self, sym: i32) -> Option<(i32, i32, String)> {
        if sym == 0 {
            let records = match &self.mode {
                Mode::Read(r) => r.uels.len() as i32,
                Mode::Write(_) => 0,
                Mode::Closed => return None,
            };
            return Some((records, 0, format::UNIVERSE_TEXT.to_owned()));
        }
        let symbol = self.symbols()?.get(sym)?;
        Some((symbol.data_count, symbol.user_info, symbol.expl_text.clone()))
    }

    /// The dimension of a symbol.
    pub fn symbol_dim(&self, sym: i32) -> i32 {
        if sym == 0 {
            return 1;
        }
        self.symbols()
            .and_then(|t| t.get(sym))
            .map_or(-1, |s| s.dim as i32)
    }

    /// The dimension of the symbol currently being written or read.
    pub fn current_dim(&self) -> i32 {
        match &self.mode {
            Mode::Write(w) => w.current_dim() as i32,
            Mode::Read(r) => r.current_dim() as i32,
            Mode::Closed => 0,
        }
    }

    /// Append a comment line to a symbol.
    pub fn symbol_add_comment(&mut self, sym: i32, comment: &str) -> bool {
        let result = (|| {
            let table = match &mut self.mode {
                Mode::Write(w) => &mut w.symbols,
                _ => return Err(Error::new(ErrorKind::WrongMode)),
            };
            let symbol = table
                .get_mut(sym)
                .ok_or_else(|| Error::new(ErrorKind::BadSymbolNumber))?;
            if symbol.comments.len() >= MAX_COMMENTS {
                return Err(Error::new(ErrorKind::WrongMode));
            }
            symbol.comments.push(clip(comment).to_owned());
            Ok(())
        })();
        self.finish(result).is_some()
    }

    /// The `n`-th (1-based) comment line of a symbol.
    pub fn symbol_get_comment(&self, sym: i32, n: i32) -> Option<String> {
        if n < 1 {
            return None;
        }
        self.symbols()?
            .get(sym)?
            .comments
            .get((n - 1) as usize)
            .cloned()
    }

    /// Attach a strict domain to the symbol currently being written.
    pub fn symbol_set_domain(&mut self, names: &[&str]) -> bool {
        let result = match &mut self.mode {
            Mode::Write(w) => w.set_domain(names),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result).is_some()
    }

    /// Attach relaxed domain names to any symbol.
    pub fn symbol_set_domain_x(&mut self, sym: i32, names: &[&str]) -> bool {
        let result = match &mut self.mode {
            Mode::Write(w) => w.set_domain_relaxed(sym, names),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result).is_some()
    }

    /// The strict domain of a symbol as symbol numbers (0 = universe).
    pub fn symbol_get_domain(&self, sym: i32) -> Option<Vec<i32>> {
        let symbol = self.symbols()?.get(sym)?;
        let mut out = vec![0i32; symbol.dim];
        if let Some(domain) = &symbol.domain {
            for (d, dom) in domain.iter().enumerate() {
                out[d] = match dom {
                    DomainRef::Universe | DomainRef::Pending(_) => 0,
                    DomainRef::Resolved(nr) => *nr,
                };
            }
        }
        Some(out)
    }

    /// The domain of a symbol as names: relaxed names when present, strict
    /// parents otherwise, `*` as the fallback.
    pub fn symbol_get_domain_x(&self, sym: i32) -> Option<Vec<String>> {
        let table = self.symbols()?;
        let symbol = table.get(sym)?;
        if let Some(relaxed) = &symbol.relaxed_domain {
            return Some(relaxed.clone());
        }
        let mut out = vec![format::UNIVERSE_NAME.to_owned(); symbol.dim];
        if let Some(domain) = &symbol.domain {
            for (d, dom) in domain.iter().enumerate() {
                if let DomainRef::Resolved(nr) = dom {
                    if let Some(parent) = table.get(*nr) {
                        out[d] = parent.name.clone();
                    }
                }
            }
        }
        Some(out)
    }

    /// Longest label per dimension of a symbol, and the overall maximum.
    pub fn symb_indx_max_length(&mut self, sym: i32) -> (i32, Vec<i32>) {
        let result = match &mut self.mode {
            Mode::Read(r) => r.symbol_index_max_length(sym),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        match self.finish(result) {
            Some((max, per_dim)) => (max, per_dim[..MAX_DIM].to_vec()),
            None => (0, vec![0; MAX_DIM]),
        }
    }

    // ----- data write --------------------------------------------------

    fn data_write_start(
        &mut self,
        name: &str,
        expl_text: &str,
        dim: i32,
        typ: DataType,
        user_info: i32,
        mode: WriteMode,
        task: Task,
    ) -> bool {
        if self.task != Task::None {
            self.report_kind(ErrorKind::WrongMode);
            return false;
        }
        if dim < 0 || dim as usize > MAX_DIM {
            self.report_kind(ErrorKind::BadDimension);
            return false;
        }
        let expl_text = clip(expl_text);
        let result = match &mut self.mode {
            Mode::Write(w) => w.data_start(name, expl_text, dim as usize, typ, user_info, mode),
            Mode::Read(_) => Err(Error::new(ErrorKind::WrongMode)),
            Mode::Closed => Err(Error::new(ErrorKind::FileNotOpen)),
        };
        if self.finish(result).is_some() {
            self.task = task;
            true
        } else {
            false
        }
    }

    /// Begin writing a symbol with raw element numbers as keys.
    pub fn data_write_raw_start(
        &mut self,
        name: &str,
        expl_text: &str,
        dim: i32,
        typ: DataType,
        user_info: i32,
    ) -> bool {
        self.data_write_start(
            name,
            expl_text,
            dim,
            typ,
            user_info,
            WriteMode::Raw,
            Task::WriteRaw,
        )
    }

    /// Begin writing a symbol with user mapping numbers as keys.
    pub fn data_write_map_start(
        &mut self,
        name: &str,
        expl_text: &str,
        dim: i32,
        typ: DataType,
        user_info: i32,
    ) -> bool {
        self.data_write_start(
            name,
            expl_text,
            dim,
            typ,
            user_info,
            WriteMode::Mapped,
            Task::WriteMapped,
        )
    }

    /// Begin writing a symbol with labels as keys.
    pub fn data_write_str_start(
        &mut self,
        name: &str,
        expl_text: &str,
        dim: i32,
        typ: DataType,
        user_info: i32,
    ) -> bool {
        self.data_write_start(
            name,
            expl_text,
            dim,
            typ,
            user_info,
            WriteMode::Str,
            Task::WriteStr,
        )
    }

    /// Write one record with raw keys; records must be sorted.
    pub fn data_write_raw(&mut self, keys: &[i32], values: &[f64]) -> bool {
        let result = match (&mut self.mode, self.task) {
            (Mode::Write(w), Task::WriteRaw) => w.write_raw(keys, values),
            (Mode::Closed, _) => Err(Error::new(ErrorKind::FileNotOpen)),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result).is_some()
    }

    /// Write one record with user mapping numbers as keys; any order.
    pub fn data_write_map(&mut self, keys: &[i32], values: &[f64]) -> bool {
        let result = match (&mut self.mode, self.task) {
            (Mode::Write(w), Task::WriteMapped) => w.write_mapped(keys, values),
            (Mode::Closed, _) => Err(Error::new(ErrorKind::FileNotOpen)),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result).is_some()
    }

    /// Write one record with labels as keys; unknown labels are interned.
    pub fn data_write_str(&mut self, keys: &[&str], values: &[f64]) -> bool {
        let result = match (&mut self.mode, self.task) {
            (Mode::Write(w), Task::WriteStr) => w.write_str(keys, values),
            (Mode::Closed, _) => Err(Error::new(ErrorKind::FileNotOpen)),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result).is_some()
    }

    /// Finish the current data write.
    pub fn data_write_done(&mut self) -> bool {
        let result = match (&mut self.mode, self.task) {
            (Mode::Write(w), Task::WriteRaw)
            | (Mode::Write(w), Task::WriteMapped)
            | (Mode::Write(w), Task::WriteStr) => w.data_done(),
            (Mode::Closed, _) => Err(Error::new(ErrorKind::FileNotOpen)),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.task = Task::None;
        self.finish(result).is_some()
    }

    // ----- data read ---------------------------------------------------

    fn data_read_start(&mut self, sym: i32, mode: ReadMode, task: Task) -> Option<i32> {
        if self.task != Task::None {
            self.report_kind(ErrorKind::WrongMode);
            return None;
        }
        let result = match &mut self.mode {
            Mode::Read(r) => r.data_start(sym, mode, None),
            Mode::Write(_) => Err(Error::new(ErrorKind::WrongMode)),
            Mode::Closed => Err(Error::new(ErrorKind::FileNotOpen)),
        };
        let count = self.finish(result)?;
        self.task = task;
        Some(count)
    }

    /// Begin reading a symbol's records with raw keys. Returns the record
    /// count.
    pub fn data_read_raw_start(&mut self, sym: i32) -> Option<i32> {
        self.data_read_start(sym, ReadMode::Raw, Task::ReadRaw)
    }

    /// Begin reading with user mapping numbers as keys, sorted in mapping
    /// space. Records with unmapped keys go to the error-record list.
    pub fn data_read_map_start(&mut self, sym: i32) -> Option<i32> {
        self.data_read_start(sym, ReadMode::Mapped, Task::ReadMapped)
    }

    /// Begin reading with labels as keys.
    pub fn data_read_str_start(&mut self, sym: i32) -> Option<i32> {
        self.data_read_start(sym, ReadMode::Str, Task::ReadStr)
    }

    /// Begin a filtered read: `actions` holds one mapping policy per
    /// dimension (`DOMC_*` or a filter number). Dimensions beyond the end
    /// of `actions` are left unmapped.
    pub fn data_read_filtered_start(&mut self, sym: i32, actions: &[i32]) -> Option<i32> {
        if self.task != Task::None {
            self.report_kind(ErrorKind::WrongMode);
            return None;
        }
        let result = match &mut self.mode {
            Mode::Read(r) => r.data_start(sym, ReadMode::Mapped, Some(actions)),
            Mode::Write(_) => Err(Error::new(ErrorKind::WrongMode)),
            Mode::Closed => Err(Error::new(ErrorKind::FileNotOpen)),
        };
        let count = self.finish(result)?;
        self.task = Task::ReadMapped;
        Some(count)
    }

    /// Read the next record with raw keys. Returns the first changed
    /// dimension, or `None` at the end of the data.
    pub fn data_read_raw(&mut self, keys: &mut [i32], values: &mut [f64]) -> Option<i32> {
        if self.task != Task::ReadRaw {
            self.report_kind(ErrorKind::WrongMode);
            return None;
        }
        let result = match &mut self.mode {
            Mode::Read(r) => r.data_read(keys, values),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result)?.map(|first| first as i32)
    }

    /// Read the next record in mapping space. The record number argument
    /// of the classic API is accepted and ignored; records come back in
    /// sorted order.
    pub fn data_read_map(
        &mut self,
        _rec_nr: i32,
        keys: &mut [i32],
        values: &mut [f64],
    ) -> Option<i32> {
        if self.task != Task::ReadMapped {
            self.report_kind(ErrorKind::WrongMode);
            return None;
        }
        let result = match &mut self.mode {
            Mode::Read(r) => r.data_read(keys, values),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result)?.map(|first| first as i32)
    }

    /// Read the next record with labels as keys.
    pub fn data_read_str(&mut self, keys: &mut [String], values: &mut [f64]) -> Option<i32> {
        if self.task != Task::ReadStr {
            self.report_kind(ErrorKind::WrongMode);
            return None;
        }
        let mut raw = [0i32; MAX_DIM];
        let (result, dim) = match &mut self.mode {
            Mode::Read(r) => (r.data_read(&mut raw, values), r.current_dim()),
            _ => (Err(Error::new(ErrorKind::WrongMode)), 0),
        };
        if keys.len() < dim {
            self.report_kind(ErrorKind::BadDimension);
            return None;
        }
        let first = self.finish(result)??;
        let uels = self.uels()?;
        for d in 0..dim {
            keys[d] = uels.get(raw[d]).map_or(String::new(), |(n, _)| n.to_owned());
        }
        Some(first as i32)
    }

    /// Finish the current data read.
    pub fn data_read_done(&mut self) -> bool {
        let result = match (&mut self.mode, self.task) {
            (Mode::Read(r), Task::ReadRaw)
            | (Mode::Read(r), Task::ReadMapped)
            | (Mode::Read(r), Task::ReadStr) => r.data_done(),
            (Mode::Closed, _) => Err(Error::new(ErrorKind::FileNotOpen)),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.task = Task::None;
        self.finish(result).is_some()
    }

    /// Stream every record of a symbol through a callback; the callback
    /// returns false to stop. Returns the stored record count.
    pub fn data_read_raw_fast(
        &mut self,
        sym: i32,
        mut each: impl FnMut(&[i32], &[f64]) -> bool,
    ) -> Option<i32> {
        let result = match &mut self.mode {
            Mode::Read(r) => r.read_raw_fast(sym, |keys, values, _| each(keys, values)),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result)
    }

    /// Like [`data_read_raw_fast`](Self::data_read_raw_fast), additionally
    /// passing the first changed dimension.
    pub fn data_read_raw_fast_ex(
        &mut self,
        sym: i32,
        mut each: impl FnMut(&[i32], &[f64], i32) -> bool,
    ) -> Option<i32> {
        let result = match &mut self.mode {
            Mode::Read(r) => r.read_raw_fast(sym, |keys, values, first| {
                each(keys, values, first as i32)
            }),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result)
    }

    /// Filtered streaming read over raw records. Dimensions beyond the end
    /// of `actions` are left unmapped.
    pub fn data_read_raw_fast_filt(
        &mut self,
        sym: i32,
        actions: &[i32],
        each: impl FnMut(&[i32], &[f64]) -> bool,
    ) -> Option<i32> {
        let result = match &mut self.mode {
            Mode::Read(r) => r.read_raw_fast_filtered(sym, actions, each),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result)
    }

    /// Build slice coordinates for a symbol: per dimension, the number of
    /// distinct elements.
    pub fn data_read_slice_start(&mut self, sym: i32) -> Option<Vec<i32>> {
        let result = match &mut self.mode {
            Mode::Read(r) => r.slice_start(sym),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result)
    }

    /// Read a slice: empty labels mark free dimensions. Returns the number
    /// of free dimensions.
    pub fn data_read_slice(
        &mut self,
        labels: &[&str],
        each: impl FnMut(&[i32], &[f64]),
    ) -> Option<i32> {
        let result = match &mut self.mode {
            Mode::Read(r) => r.slice_read(labels, each),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result).map(|free| free as i32)
    }

    /// Map slice coordinates back to labels.
    pub fn data_slice_uels(&mut self, slice_keys: &[i32]) -> Option<Vec<String>> {
        let result = match &self.mode {
            Mode::Read(r) => r.slice_uels(slice_keys),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result)
    }

    /// Distinct elements on one dimension of a symbol.
    pub fn get_domain_elements(
        &mut self,
        sym: i32,
        dim_pos: i32,
        filter_action: i32,
        each: impl FnMut(i32, i32) -> bool,
    ) -> Option<i32> {
        if dim_pos < 1 {
            self.report_kind(ErrorKind::BadDimension);
            return None;
        }
        let result = match &mut self.mode {
            Mode::Read(r) => r.domain_elements(sym, dim_pos as usize, filter_action, each),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result)
    }

    // ----- error records ------------------------------------------------

    fn error_records(&self) -> &[crate::write::ErrorRecord] {
        match &self.mode {
            Mode::Write(w) => &w.error_records,
            Mode::Read(r) => &r.error_records,
            Mode::Closed => &[],
        }
    }

    /// Number of retained error records for the last data operation.
    pub fn data_error_count(&self) -> i32 {
        self.error_records().len() as i32
    }

    /// The `n`-th (1-based) retained error record.
    pub fn data_error_record(&self, nr: i32) -> Option<(Vec<i32>, Vec<f64>)> {
        if nr < 1 {
            return None;
        }
        let record = self.error_records().get((nr - 1) as usize)?;
        Some((record.keys.clone(), record.values.clone()))
    }

    /// Variant of [`data_error_record`](Self::data_error_record); the keys
    /// are reported exactly as captured.
    pub fn data_error_record_x(&self, nr: i32) -> Option<(Vec<i32>, Vec<f64>)> {
        self.data_error_record(nr)
    }

    // ----- special values and session flags -----------------------------

    /// The five special values followed by the representations of the
    /// normal class and the acronym threshold.
    pub fn get_special_values(&self) -> [f64; SPECIAL_COUNT + 2] {
        match &self.mode {
            Mode::Write(w) => w.specials.get(),
            Mode::Read(r) => r.specials.get(),
            Mode::Closed => crate::specials::SpecialValues::default().get(),
        }
    }

    /// Replace the special values; the five entries must be distinct.
    pub fn set_special_values(&mut self, values: &[f64]) -> bool {
        let mut five = [0.0; SPECIAL_COUNT];
        if values.len() < SPECIAL_COUNT {
            self.report_kind(ErrorKind::SpecialValueCollision);
            return false;
        }
        five.copy_from_slice(&values[..SPECIAL_COUNT]);
        let result = match &mut self.mode {
            Mode::Write(w) => w.specials.set(&five),
            Mode::Read(r) => r.specials.set(&five),
            Mode::Closed => Err(Error::new(ErrorKind::FileNotOpen)),
        };
        self.finish(result).is_some()
    }

    /// Replace only the values used when decoding.
    pub fn set_read_special_values(&mut self, values: &[f64]) -> bool {
        let mut five = [0.0; SPECIAL_COUNT];
        if values.len() < SPECIAL_COUNT {
            self.report_kind(ErrorKind::SpecialValueCollision);
            return false;
        }
        five.copy_from_slice(&values[..SPECIAL_COUNT]);
        let result = match &mut self.mode {
            Mode::Write(w) => w.specials.set_read(&five),
            Mode::Read(r) => r.specials.set_read(&five),
            Mode::Closed => Err(Error::new(ErrorKind::FileNotOpen)),
        };
        self.finish(result).is_some()
    }

    /// Restore the default special values.
    pub fn reset_special_values(&mut self) -> bool {
        match &mut self.mode {
            Mode::Write(w) => w.specials.reset(),
            Mode::Read(r) => r.specials.reset(),
            Mode::Closed => return false,
        }
        true
    }

    /// Classify a value against the current special-value table.
    pub fn map_value(&self, value: f64) -> ValueClass {
        match &self.mode {
            Mode::Write(w) => w.specials.classify(value),
            Mode::Read(r) => r.specials.classify(value),
            Mode::Closed => crate::specials::SpecialValues::default().classify(value),
        }
    }

    /// Whether one-dimensional set memberships are kept for strict domain
    /// checking.
    pub fn store_domain_sets(&self) -> bool {
        match &self.mode {
            Mode::Write(w) => w.store_domain_sets,
            _ => true,
        }
    }

    pub fn store_domain_sets_set(&mut self, on: bool) {
        if let Mode::Write(w) = &mut self.mode {
            w.store_domain_sets = on;
        }
    }

    /// Whether unknown strict-domain parents are tolerated and demoted to
    /// relaxed links at close.
    pub fn allow_bogus_domains(&self) -> bool {
        match &self.mode {
            Mode::Write(w) => w.allow_bogus_domains,
            _ => true,
        }
    }

    pub fn allow_bogus_domains_set(&mut self, on: bool) {
        if let Mode::Write(w) = &mut self.mode {
            w.allow_bogus_domains = on;
        }
    }

    /// Whether acronym values are surfaced as NaN when reading.
    pub fn map_acronyms_to_nan(&self) -> bool {
        match &self.mode {
            Mode::Read(r) => r.map_acronyms_to_nan,
            _ => false,
        }
    }

    pub fn map_acronyms_to_nan_set(&mut self, on: bool) {
        if let Mode::Read(r) = &mut self.mode {
            r.map_acronyms_to_nan = on;
        }
    }

    // ----- filters -----------------------------------------------------

    /// Whether a filter with this number is defined.
    pub fn filter_exists(&self, nr: i32) -> bool {
        match &self.mode {
            Mode::Read(r) => r.filters.exists(nr),
            _ => false,
        }
    }

    /// Begin defining a filter.
    pub fn filter_register_start(&mut self, nr: i32) -> bool {
        if !self.begin_task(false, Task::Filter) {
            return false;
        }
        let result = match &mut self.mode {
            Mode::Read(r) => r.filters.start(nr),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        if self.finish(result).is_some() {
            true
        } else {
            self.task = Task::None;
            false
        }
    }

    /// Add a user mapping number to the filter under definition.
    pub fn filter_register(&mut self, map: i32) -> bool {
        if self.task != Task::Filter {
            self.report_kind(ErrorKind::WrongMode);
            return false;
        }
        let result = match &mut self.mode {
            Mode::Read(r) => r.filters.register(map),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.finish(result).is_some()
    }

    /// Freeze the filter under definition.
    pub fn filter_register_done(&mut self) -> bool {
        if self.task != Task::Filter {
            self.report_kind(ErrorKind::WrongMode);
            return false;
        }
        let result = match &mut self.mode {
            Mode::Read(r) => r.filters.done(),
            _ => Err(Error::new(ErrorKind::WrongMode)),
        };
        self.task = Task::None;
        self.finish(result).is_some()
    }
}

impl Drop for Gdx {
    fn drop(&mut self) {
        if !matches!(self.mode, Mode::Closed) {
            let _ = self.close();
        }
    }
}
