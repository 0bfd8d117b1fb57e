//! A library for reading and writing GAMS Data eXchange (GDX) files.
//!
//! GDX is a self-describing binary container for multi-dimensional
//! symbols (sets, parameters, variables, equations and aliases) as they
//! arise in algebraic modeling. The format interns every coordinate value
//! as a *unique element label* (UEL), delta-compresses record keys, and
//! optionally deflates its sections in independent 32 KiB frames.
//!
//! The central type is [`Gdx`], a handle over at most one open file that
//! follows the classic GDX calling convention: an explicit state machine
//! (open, register labels, write symbols bracketed by start/done calls,
//! close), results reported as `bool`/`Option`, and a per-handle queue of
//! stable numeric error codes.
//!
//! ```no_run
//! use gdx::{DataType, Gdx};
//!
//! let mut gdx = Gdx::new();
//! assert!(gdx.open_write("demand.gdx", "example"));
//! assert!(gdx.data_write_str_start("demand", "demand at market", 1, DataType::Parameter, 0));
//! for (city, value) in [("new-york", 324.0), ("chicago", 299.0), ("topeka", 274.0)] {
//!     assert!(gdx.data_write_str(&[city], &[value]));
//! }
//! assert!(gdx.data_write_done());
//! assert!(gdx.close());
//! ```

mod acronym;
mod data;
mod error;
mod filter;
mod gdx;
mod read;
mod records;
mod settext;
mod specials;
mod stream;
mod symbol;
mod uel;
mod write;

pub mod format;

pub use crate::acronym::{acronym_index, acronym_value};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::gdx::Gdx;
pub use crate::specials::{ValueClass, SPECIAL_COUNT, SV_EPS, SV_MINF, SV_NA, SV_PINF, SV_UNDEF};
pub use crate::symbol::DataType;
