//! Error types shared by the read and write halves.

use std::io;
use std::{fmt, result};

/// Base value for the numeric codes of library errors; OS-level I/O errors
/// keep their positive `errno` values.
const CODE_BASE: i32 = -100_000;

/// The failure kinds reported by this library.
///
/// Each kind has a stable numeric code (see [`ErrorKind::code`]) and a
/// stable message (see [`ErrorKind::message`]); both are part of the
/// caller-visible error-queue contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An empty file name was passed to an open call.
    FilenameEmpty,
    /// An operation that needs an open file was called on a closed handle.
    FileNotOpen,
    /// A call is not allowed in the handle's current state.
    WrongMode,
    /// The file does not start with the GDX magic byte and header id.
    BadMagic,
    /// The endianness signature does not describe a readable layout.
    IncompatibleEncoding,
    /// A section marker did not match its expected name.
    BadMarker,
    /// The file was written by a newer library version.
    VersionTooNew,
    /// An identifier does not match `[A-Za-z][A-Za-z0-9_]*` or is too long.
    BadName,
    /// An element label is malformed or too long.
    BadUel,
    /// An element label was registered twice.
    DuplicateUel,
    /// A user mapping number is already bound to a different label.
    UelMapCollision,
    /// A raw element number is outside the registered range.
    BadElementIndex,
    /// Record keys were not delivered in strictly increasing order.
    KeyOutOfOrder,
    /// The same key tuple was written twice within one symbol.
    DuplicateKey,
    /// A key component is not a member of the dimension's domain set.
    DomainViolation,
    /// A symbol number is outside the catalog.
    BadSymbolNumber,
    /// A symbol with this name already exists.
    DuplicateSymbol,
    /// A dimension is outside `0..=20` or does not match its context.
    BadDimension,
    /// An unknown data type code.
    BadType,
    /// A set-text number is outside the pool.
    SetTextNotFound,
    /// An acronym name or index is already in use.
    AcronymCollision,
    /// The five special values are not pairwise distinct.
    SpecialValueCollision,
    /// A filter with this number is already defined.
    FilterAlreadyExists,
    /// No filter with this number is defined.
    FilterUnknown,
    /// More records were requested than the section contains.
    ReadPastEnd,
    /// The file contents are inconsistent.
    Corrupt,
}

impl ErrorKind {
    /// The stable numeric code for this kind.
    pub fn code(self) -> i32 {
        CODE_BASE - self as i32
    }

    /// The kind for a numeric code, if it is one of ours.
    pub fn from_code(code: i32) -> Option<ErrorKind> {
        use ErrorKind::*;
        const ALL: &[ErrorKind] = &[
            FilenameEmpty,
            FileNotOpen,
            WrongMode,
            BadMagic,
            IncompatibleEncoding,
            BadMarker,
            VersionTooNew,
            BadName,
            BadUel,
            DuplicateUel,
            UelMapCollision,
            BadElementIndex,
            KeyOutOfOrder,
            DuplicateKey,
            DomainViolation,
            BadSymbolNumber,
            DuplicateSymbol,
            BadDimension,
            BadType,
            SetTextNotFound,
            AcronymCollision,
            SpecialValueCollision,
            FilterAlreadyExists,
            FilterUnknown,
            ReadPastEnd,
            Corrupt,
        ];
        ALL.iter().copied().find(|k| k.code() == code)
    }

    /// The stable human-readable message for this kind.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::FilenameEmpty => "File name is empty",
            ErrorKind::FileNotOpen => "File is not open",
            ErrorKind::WrongMode => "Invalid operation for current mode",
            ErrorKind::BadMagic => "Not a GDX file",
            ErrorKind::IncompatibleEncoding => "Encoding of the file is not compatible",
            ErrorKind::BadMarker => "Unexpected section marker",
            ErrorKind::VersionTooNew => "File version is newer than this library",
            ErrorKind::BadName => "Invalid identifier",
            ErrorKind::BadUel => "Invalid element label",
            ErrorKind::DuplicateUel => "Duplicate element label",
            ErrorKind::UelMapCollision => "User mapping already in use",
            ErrorKind::BadElementIndex => "Element number out of range",
            ErrorKind::KeyOutOfOrder => "Data not sorted when writing raw",
            ErrorKind::DuplicateKey => "Duplicate keys",
            ErrorKind::DomainViolation => "Domain violation",
            ErrorKind::BadSymbolNumber => "Bad symbol number",
            ErrorKind::DuplicateSymbol => "Duplicate symbol",
            ErrorKind::BadDimension => "Bad dimension",
            ErrorKind::BadType => "Bad data type",
            ErrorKind::SetTextNotFound => "Unknown set text number",
            ErrorKind::AcronymCollision => "Acronym name or index already in use",
            ErrorKind::SpecialValueCollision => "Special values must be distinct",
            ErrorKind::FilterAlreadyExists => "Filter already defined",
            ErrorKind::FilterUnknown => "Unknown filter",
            ErrorKind::ReadPastEnd => "Read past end of data",
            ErrorKind::Corrupt => "File is corrupted",
        }
    }
}

/// The error type used within the read and write modules.
#[derive(Debug)]
pub struct Error {
    kind: Option<ErrorKind>,
    io: Option<io::Error>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Error {
            kind: Some(kind),
            io: None,
        }
    }

    /// The library failure kind, or `None` for plain I/O errors.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.kind
    }

    /// The numeric code for the error queue: the kind's code, or the OS
    /// error number for I/O failures.
    pub fn code(&self) -> i32 {
        if let Some(kind) = self.kind {
            return kind.code();
        }
        match &self.io {
            Some(e) => e.raw_os_error().unwrap_or(1),
            None => 1,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.io) {
            (Some(kind), _) => f.write_str(kind.message()),
            (None, Some(e)) => e.fmt(f),
            (None, None) => f.write_str("I/O error"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.io.as_ref().map(|e| e as _)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error::new(kind)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error {
            kind: None,
            io: Some(e),
        }
    }
}

/// The result type used within the read and write modules.
pub type Result<T> = result::Result<T, Error>;

/// The stable message for a numeric error code: OS message for positive
/// codes, library message for our negative codes.
pub fn message_for_code(code: i32) -> String {
    if code >= 0 {
        return io::Error::from_raw_os_error(code).to_string();
    }
    match ErrorKind::from_code(code) {
        Some(kind) => kind.message().to_owned(),
        None => format!("Unknown error {}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in [
            ErrorKind::FilenameEmpty,
            ErrorKind::KeyOutOfOrder,
            ErrorKind::Corrupt,
        ] {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(0), None);
    }

    #[test]
    fn messages() {
        assert_eq!(
            message_for_code(ErrorKind::KeyOutOfOrder.code()),
            "Data not sorted when writing raw"
        );
        assert_eq!(message_for_code(2), "No such file or directory (os error 2)");
    }
}
