//! Minimal ELF parser for 32-bit and 64-bit x86 boot images.
//!
//! Parses ELF headers, program headers, section headers and `Rel`/`Rela`
//! relocation records from raw byte slices using safe field extraction
//! (`from_le_bytes`). Every table index is computed with checked arithmetic
//! and validated against the slice before it is read. No unsafe code, no
//! allocations.
//!
//! The two record layouts are selected through the [`ElfClass`] trait
//! ([`Elf32`], [`Elf64`]); [`identify`] reports which one an image uses.
//!
//! # Usage
//!
//! ```
//! use ember_elf::{Class, Elf64, ElfFile, identify};
//!
//! fn walk(data: &[u8]) {
//!     if identify(data) != Ok(Class::Elf64) {
//!         return;
//!     }
//!     let elf = ElfFile::<Elf64>::parse(data).expect("valid ELF");
//!     for phdr in elf.program_headers().filter(|p| p.is_loadable()) {
//!         // Copy p_filesz bytes to p_paddr, zero-fill up to p_memsz
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod class;
pub mod file;
pub mod header;
pub mod ident;
pub mod program;
pub mod reloc;
pub mod section;

pub use class::{Class, Elf32, Elf64, ElfClass};
pub use file::ElfFile;
pub use header::{
    EM_386, EM_X86_64, ET_DYN, ET_EXEC, ElfError, ElfHeader, ElfType,
};
pub use ident::{identify, is_elf_image};
pub use program::{PF_R, PF_W, PF_X, PT_LOAD, ProgramHeader, ProgramHeaderIter};
pub use reloc::{
    R_386_32, R_386_NONE, R_386_PC32, R_X86_64_32, R_X86_64_64, R_X86_64_GOTPCREL,
    R_X86_64_GOTPCRELX, R_X86_64_NONE, R_X86_64_PC32, R_X86_64_PLT32, R_X86_64_REX_GOTPCRELX,
    RelocEntry, RelocIter, RelocTable, reloc_type_name,
};
pub use section::{
    SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHT_REL, SHT_RELA, SectionHeader, SectionIter,
    StringTable,
};
