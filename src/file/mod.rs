//! Low-level byte access used by the instruction decoder.
//!
//! - [`crate::file::io`] - little-endian primitive reads with bounds checking
//! - [`crate::file::parser`] - a cursor over a method body's bytecode

pub mod io;
pub mod parser;
