//! Relocation records for 32-bit and 64-bit x86.
//!
//! Provides zero-copy parsing of `SHT_REL` and `SHT_RELA` entries and the
//! relocation kind constants of both ABI supplements. Applying a relocation is
//! the loader's business; this module only decodes.

use core::marker::PhantomData;

use crate::class::{Class, ElfClass};
use crate::header::{ElfError, table_entry};
use crate::section::{SHT_REL, SHT_RELA, SectionHeader};

// ---------------------------------------------------------------------------
// i386 relocation kinds (System V i386 ABI)
// ---------------------------------------------------------------------------

/// No relocation.
pub const R_386_NONE: u32 = 0;

/// Absolute 32-bit: `S + A`.
pub const R_386_32: u32 = 1;

/// PC-relative 32-bit: `S + A - P`.
pub const R_386_PC32: u32 = 2;

/// GOT entry 32-bit: `G + A`.
pub const R_386_GOT32: u32 = 3;

/// PLT-relative 32-bit: `L + A - P`.
pub const R_386_PLT32: u32 = 4;

/// Base-relative 32-bit: `B + A`.
pub const R_386_RELATIVE: u32 = 8;

// ---------------------------------------------------------------------------
// x86-64 relocation kinds (System V AMD64 ABI)
// ---------------------------------------------------------------------------

/// No relocation.
pub const R_X86_64_NONE: u32 = 0;

/// Absolute 64-bit: `S + A`.
pub const R_X86_64_64: u32 = 1;

/// PC-relative 32-bit: `S + A - P`.
pub const R_X86_64_PC32: u32 = 2;

/// PLT-relative 32-bit: `L + A - P`.
pub const R_X86_64_PLT32: u32 = 4;

/// Global data: `S`.
pub const R_X86_64_GLOB_DAT: u32 = 6;

/// Base-relative 64-bit: `B + A`.
pub const R_X86_64_RELATIVE: u32 = 8;

/// PC-relative GOT entry 32-bit: `G + GOT + A - P`.
pub const R_X86_64_GOTPCREL: u32 = 9;

/// Absolute 32-bit, zero-extended: `S + A`.
pub const R_X86_64_32: u32 = 10;

/// Absolute 32-bit, sign-extended: `S + A`.
pub const R_X86_64_32S: u32 = 11;

/// Relaxable `GOTPCREL`.
pub const R_X86_64_GOTPCRELX: u32 = 41;

/// Relaxable `GOTPCREL` with a REX prefix.
pub const R_X86_64_REX_GOTPCRELX: u32 = 42;

/// Returns the ABI name of a relocation kind, or `"unknown"`.
#[must_use]
pub fn reloc_type_name(class: Class, kind: u32) -> &'static str {
    match class {
        Class::Elf32 => match kind {
            R_386_NONE => "R_386_NONE",
            R_386_32 => "R_386_32",
            R_386_PC32 => "R_386_PC32",
            R_386_GOT32 => "R_386_GOT32",
            R_386_PLT32 => "R_386_PLT32",
            R_386_RELATIVE => "R_386_RELATIVE",
            _ => "unknown",
        },
        Class::Elf64 => match kind {
            R_X86_64_NONE => "R_X86_64_NONE",
            R_X86_64_64 => "R_X86_64_64",
            R_X86_64_PC32 => "R_X86_64_PC32",
            R_X86_64_PLT32 => "R_X86_64_PLT32",
            R_X86_64_GLOB_DAT => "R_X86_64_GLOB_DAT",
            R_X86_64_RELATIVE => "R_X86_64_RELATIVE",
            R_X86_64_GOTPCREL => "R_X86_64_GOTPCREL",
            R_X86_64_32 => "R_X86_64_32",
            R_X86_64_32S => "R_X86_64_32S",
            R_X86_64_GOTPCRELX => "R_X86_64_GOTPCRELX",
            R_X86_64_REX_GOTPCRELX => "R_X86_64_REX_GOTPCRELX",
            _ => "unknown",
        },
    }
}

/// A parsed relocation entry, `Rel` or `Rela`, widened to 64-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocEntry {
    /// Virtual address (or section offset) where the relocation applies.
    pub r_offset: u64,
    /// Symbol table index. Never resolved by the loader.
    pub r_sym: u32,
    /// Relocation kind.
    pub r_type: u32,
    /// Explicit addend, present for `SHT_RELA` entries only.
    pub r_addend: Option<i64>,
}

/// The validated geometry of one relocation section.
///
/// A `Copy` descriptor, so a loader can read entries one at a time without
/// holding a borrow of the image between reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocTable {
    offset: u64,
    entsize: u64,
    count: u64,
    with_addend: bool,
}

impl RelocTable {
    /// Describes the entries of relocation section `shdr` in a file of `len`
    /// bytes: `sh_size / sh_entsize` records at a stride of `sh_entsize`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] if `shdr` is not `SHT_REL` or
    /// `SHT_RELA`, its entry size cannot hold the `C` record, or its entries do
    /// not lie within the file.
    pub fn new<C: ElfClass>(shdr: &SectionHeader, len: usize) -> Result<Self, ElfError> {
        let with_addend = match shdr.sh_type {
            SHT_RELA => true,
            SHT_REL => false,
            _ => return Err(ElfError::InvalidOffset),
        };
        let table = Self { offset: shdr.sh_offset, entsize: shdr.sh_entsize, count: 0, with_addend };
        if table.entsize < table.record::<C>() as u64 {
            return Err(ElfError::InvalidOffset);
        }
        let count = shdr.sh_size / table.entsize;
        if count > 0 {
            table_entry(table.offset, table.entsize, count - 1, table.record::<C>(), len)?;
        }
        Ok(Self { count, ..table })
    }

    /// Number of entries in the section.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.count
    }

    /// Returns `true` if the section holds no complete entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns `true` for `SHT_RELA` tables.
    #[must_use]
    pub fn has_addend(&self) -> bool {
        self.with_addend
    }

    /// Decodes entry `index` from `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] if `index` is out of range or the
    /// entry does not lie within `data`.
    pub fn entry<C: ElfClass>(&self, data: &[u8], index: u64) -> Result<RelocEntry, ElfError> {
        if index >= self.count {
            return Err(ElfError::InvalidOffset);
        }
        let offset = table_entry(self.offset, self.entsize, index, self.record::<C>(), data.len())?;
        C::parse_reloc(&data[offset..], self.with_addend)
    }

    fn record<C: ElfClass>(&self) -> usize {
        if self.with_addend { C::RELA_SIZE } else { C::REL_SIZE }
    }
}

/// An iterator over the entries of one relocation section.
///
/// A trailing partial entry is ignored.
pub struct RelocIter<'a, C> {
    data: &'a [u8],
    table: RelocTable,
    index: u64,
    _class: PhantomData<C>,
}

impl<'a, C: ElfClass> RelocIter<'a, C> {
    /// Creates an iterator over the entries `table` describes in `data`.
    #[must_use]
    pub fn new(data: &'a [u8], table: RelocTable) -> Self {
        Self { data, table, index: 0, _class: PhantomData }
    }
}

impl<C: ElfClass> Iterator for RelocIter<'_, C> {
    type Item = RelocEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.table.entry::<C>(self.data, self.index).ok()?;
        self.index += 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.table.count - self.index).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
