//! # dexsmali
//!
//! A library for disassembling Android DEX binaries into smali text, one
//! class per output file.
//!
//! The image is built once from a byte buffer and is immutable afterwards;
//! rendering is read-only, so callers are free to write classes out from
//! multiple threads (the `dex2smali` binary does exactly that).
//!
//! ```no_run
//! use dexsmali::DexFile;
//!
//! let bytes = std::fs::read("classes.dex").unwrap();
//! let dex = DexFile::from_bytes(bytes).unwrap();
//! for (path, text) in dex.disassemble() {
//!     println!("{} ({} bytes)", path, text.len());
//! }
//! ```

pub mod types;
#[macro_use]
pub mod dex;
pub mod smali_write;

pub use crate::dex::dex_file::DexFile;
pub use crate::dex::error::{DexError, ErrorKind};
pub use crate::smali_write::{write_class, write_class_with, PathAllocator, WriteOptions};

/// One-call disassembly: a DEX buffer in, `(relative_path, smali)` pairs
/// out. Paths use `/` as the separator; turning them into OS paths is the
/// caller's concern.
pub fn disassemble(bytes: Vec<u8>) -> Result<Vec<(String, String)>, DexError>
{
    let dex = DexFile::from_bytes(bytes)?;
    Ok(dex.disassemble())
}

#[cfg(test)]
mod tests;
