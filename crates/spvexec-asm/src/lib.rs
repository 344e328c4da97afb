//! SPIR-V assembly for the conformance harness.
//!
//! [`TextAssembler`] turns SPIR-V assembly text into a [`BinaryModule`] for a chosen module
//! version. The grammar is table driven and covers the core compute and graphics subset; anything
//! outside it is reported as an [`AssemblyError`] with a source position. No semantic validation
//! is performed.
//!
//! [`BinaryModule`] also parses externally produced binaries and exposes the instruction stream,
//! and [`specialize`] patches specialization-constant defaults in place.

mod assembler;
mod binary;
mod cache;
mod grammar;
pub mod literal;
mod specialize;
mod version;

pub use assembler::{assemble, Assemble, AssemblyError, TextAssembler, GENERATOR_MAGIC};
pub use binary::{BinaryError, BinaryModule, EntryPoint, Instruction, Instructions, HEADER_WORDS, MAGIC};
pub use cache::{CacheStats, CachingAssembler, DEFAULT_CAPACITY as DEFAULT_CACHE_CAPACITY};
pub use specialize::{specialize, SpecConstant, SpecValue, SpecializeError};
pub use version::{ModuleVersion, ParseVersionError};
