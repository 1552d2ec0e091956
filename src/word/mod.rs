//! Fixed-width binary words and bit-level helpers.
//!
//! - [`Word`] - a 16-bit machine word (registers, memory cells, instructions)
//! - [`bits`] - conversions between integers, bit vectors and `0`/`1` strings

mod value;
pub mod bits;

pub use value::Word;
pub use bits::BitStringError;
