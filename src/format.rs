//! GDX file format definitions.
//!
//! These constants describe the on-disk layout and are fixed by the format;
//! both the read and write halves of the crate refer to them.

/// First byte of every GDX file.
pub const GDX_MAGIC: u8 = 0x7B;

/// Header identification string, stored as a short string after the magic byte.
pub const GDX_HEADER_ID: &str = "GAMSGDX";

/// The file version written by this library.
pub const GDX_VERSION: i32 = 7;

/// The oldest file version the `GDXCONVERT` ladder can produce.
pub const GDX_VERSION_OLDEST: i32 = 5;

/// "Beginning of index" sentinel preceding the section offset table.
pub const MARK_BOI: i32 = 19510624;

/// Section marker for the symbol table.
pub const MARK_SYMB: &str = "_SYMB_";
/// Section marker for the UEL table.
pub const MARK_UEL: &str = "_UEL_";
/// Section marker for the set-text pool.
pub const MARK_SETT: &str = "_SETT_";
/// Section marker for the acronym list.
pub const MARK_ACRO: &str = "_ACRO_";
/// Section marker for the relaxed-domain section.
pub const MARK_DOMS: &str = "_DOMS_";
/// Section marker preceding each symbol's record run.
pub const MARK_DATA: &str = "_DATA_";

/// Key selector byte terminating a record run.
pub const END_OF_DATA: u8 = 255;

/// Number of entries in the section offset table.
pub const SECTION_COUNT: usize = 6;

/// Indices into the section offset table.
pub const SECTION_SYMBOLS: usize = 0;
pub const SECTION_UELS: usize = 1;
pub const SECTION_SET_TEXTS: usize = 2;
pub const SECTION_ACRONYMS: usize = 3;
pub const SECTION_NEXT_WRITE: usize = 4;
pub const SECTION_RELAXED_DOMAINS: usize = 5;

/// Maximum dimension of a symbol.
pub const MAX_DIM: usize = 20;

/// Maximum length of an identifier or element label.
pub const MAX_NAME_LEN: usize = 63;

/// Maximum length of an explanatory text or comment line.
pub const MAX_TEXT_LEN: usize = 255;

/// Largest value count per record (level, marginal, lower, upper, scale).
pub const VAL_COUNT_MAX: usize = 5;

/// Value slot index names for variables and equations.
pub const VAL_LEVEL: usize = 0;
pub const VAL_MARGINAL: usize = 1;
pub const VAL_LOWER: usize = 2;
pub const VAL_UPPER: usize = 3;
pub const VAL_SCALE: usize = 4;

/// Default representations of the five special values.
pub const SV_DEFAULT_UNDEF: f64 = 1.0e300;
pub const SV_DEFAULT_NA: f64 = 2.0e300;
pub const SV_DEFAULT_PINF: f64 = 3.0e300;
pub const SV_DEFAULT_MINF: f64 = 4.0e300;
pub const SV_DEFAULT_EPS: f64 = 5.0e300;

/// Threshold above which a value encodes an acronym; acronym index `n` is
/// stored as the double `n * SV_ACRONYM`.
pub const SV_ACRONYM: f64 = 10.0e300;

/// Per-dimension action for filtered and mapped reads: report the raw
/// element number without mapping it.
pub const DOMC_UNMAPPED: i32 = -2;
/// Per-dimension action: map the element, assigning a fresh user mapping
/// when none exists.
pub const DOMC_EXPAND: i32 = -1;
/// Per-dimension action: map the element; unmapped elements produce error
/// records.
pub const DOMC_STRICT: i32 = 0;

/// Uncompressed size of a stream frame.
pub const FRAME_SIZE: usize = 32768;

/// Endianness signature patterns, written once at the start of the file.
pub const PATTERN_WORD: u16 = 0x1234;
pub const PATTERN_INTEGER: i32 = 0x1234_5678;
pub const PATTERN_DOUBLE: f64 = core::f64::consts::PI;

/// Name and explanatory text of the synthetic universe symbol.
pub const UNIVERSE_NAME: &str = "*";
pub const UNIVERSE_TEXT: &str = "Universe";

/// Value tag bytes preceding each value slot in a record.
pub const VM_UNDEF: u8 = 0;
pub const VM_NA: u8 = 1;
pub const VM_PINF: u8 = 2;
pub const VM_MINF: u8 = 3;
pub const VM_EPS: u8 = 4;
pub const VM_ZERO: u8 = 5;
pub const VM_ONE: u8 = 6;
pub const VM_MINUS_ONE: u8 = 7;
pub const VM_HALF: u8 = 8;
pub const VM_TWO: u8 = 9;
pub const VM_NORMAL: u8 = 10;

/// Returns true if `s` is usable as an element label: at most
/// [`MAX_NAME_LEN`] bytes, no control characters, and not a mix of both
/// quote kinds (labels must remain quotable).
pub fn good_uel_string(s: &str) -> bool {
    if s.len() > MAX_NAME_LEN {
        return false;
    }
    let mut saw_single = false;
    let mut saw_double = false;
    for ch in s.bytes() {
        match ch {
            b'\'' => {
                if saw_double {
                    return false;
                }
                saw_single = true;
            }
            b'"' => {
                if saw_single {
                    return false;
                }
                saw_double = true;
            }
            _ if ch < b' ' => return false,
            _ => {}
        }
    }
    true
}

/// Returns true if `s` is a valid identifier for symbols and acronyms:
/// a letter followed by letters, digits or underscores, at most
/// [`MAX_NAME_LEN`] bytes.
pub fn good_ident(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_NAME_LEN {
        return false;
    }
    let mut bytes = s.bytes();
    let first = bytes.next().unwrap();
    if !first.is_ascii_alphabetic() {
        return false;
    }
    bytes.all(|ch| ch.is_ascii_alphanumeric() || ch == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_rules() {
        assert!(good_ident("demand"));
        assert!(good_ident("x_2"));
        assert!(!good_ident(""));
        assert!(!good_ident("2x"));
        assert!(!good_ident("a-b"));
        assert!(!good_ident(&"i".repeat(64)));
        assert!(good_ident(&"i".repeat(63)));
    }

    #[test]
    fn uel_rules() {
        assert!(good_uel_string(""));
        assert!(good_uel_string("New-York"));
        assert!(good_uel_string("it's"));
        assert!(good_uel_string("a \"b\""));
        assert!(!good_uel_string("it's a \"b\""));
        assert!(!good_uel_string("a\tb"));
        assert!(!good_uel_string(&"i".repeat(64)));
    }
}
