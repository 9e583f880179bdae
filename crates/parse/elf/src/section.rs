//! Section header records, iteration and string tables.

use core::marker::PhantomData;

use crate::class::ElfClass;
use crate::header::ElfHeader;

/// Section type: inactive.
pub const SHT_NULL: u32 = 0;

/// Section type: program-defined contents.
pub const SHT_PROGBITS: u32 = 1;

/// Section type: symbol table.
pub const SHT_SYMTAB: u32 = 2;

/// Section type: string table.
pub const SHT_STRTAB: u32 = 3;

/// Section type: relocation entries with addends.
pub const SHT_RELA: u32 = 4;

/// Section type: occupies no file space (`.bss`).
pub const SHT_NOBITS: u32 = 8;

/// Section type: relocation entries without addends.
pub const SHT_REL: u32 = 9;

/// Section flag: writable data.
pub const SHF_WRITE: u64 = 0x1;

/// Section flag: occupies memory during execution.
pub const SHF_ALLOC: u64 = 0x2;

/// Section flag: executable machine instructions.
pub const SHF_EXECINSTR: u64 = 0x4;

/// Special section index: undefined.
pub const SHN_UNDEF: u16 = 0;

/// Parsed section header entry, widened to 64-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    /// Offset into the section header string table for this section's name.
    pub sh_name: u32,
    /// Section type (`SHT_RELA`, `SHT_STRTAB`, etc.).
    pub sh_type: u32,
    /// Section flags.
    pub sh_flags: u64,
    /// Virtual address of the section in memory (0 for non-loaded sections).
    pub sh_addr: u64,
    /// File offset of the section data.
    pub sh_offset: u64,
    /// Size of the section data in bytes.
    pub sh_size: u64,
    /// Associated section index.
    pub sh_link: u32,
    /// Extra info; for relocation sections, the index of the patched section.
    pub sh_info: u32,
    /// Required alignment of the section.
    pub sh_addralign: u64,
    /// Size of each entry (for sections with fixed-size entries).
    pub sh_entsize: u64,
}

impl SectionHeader {
    /// Returns `true` for `SHT_REL` and `SHT_RELA` sections.
    #[must_use]
    pub fn is_relocation(&self) -> bool {
        self.sh_type == SHT_REL || self.sh_type == SHT_RELA
    }

    /// Returns `true` if the section occupies memory at run time.
    #[must_use]
    pub fn is_alloc(&self) -> bool {
        self.sh_flags & SHF_ALLOC != 0
    }

    /// Returns `true` if the section is writable at run time.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.sh_flags & SHF_WRITE != 0
    }
}

/// A zero-copy wrapper around a NUL-terminated string table section.
#[derive(Debug, Clone, Copy)]
pub struct StringTable<'a> {
    data: &'a [u8],
}

impl<'a> StringTable<'a> {
    /// Creates a new string table from the raw section data.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Looks up a NUL-terminated string at the given byte offset.
    ///
    /// Returns `None` if the offset is out of bounds, the string is not
    /// terminated, or it contains invalid UTF-8.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<&'a str> {
        let remaining = self.data.get(usize::try_from(offset).ok()?..)?;
        let nul_pos = remaining.iter().position(|&b| b == 0)?;
        core::str::from_utf8(&remaining[..nul_pos]).ok()
    }
}

/// An iterator over section headers, yielding `(index, header)` pairs.
pub struct SectionIter<'a, C> {
    data: &'a [u8],
    header: ElfHeader,
    index: usize,
    _class: PhantomData<C>,
}

impl<'a, C: ElfClass> SectionIter<'a, C> {
    pub(crate) fn new(data: &'a [u8], header: ElfHeader) -> Self {
        Self { data, header, index: 0, _class: PhantomData }
    }
}

impl<C: ElfClass> Iterator for SectionIter<'_, C> {
    type Item = (usize, SectionHeader);

    fn next(&mut self) -> Option<Self::Item> {
        let shdr = self.header.section_header::<C>(self.data, self.index).ok()?;
        let index = self.index;
        self.index += 1;
        Some((index, shdr))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.header.e_shnum).saturating_sub(self.index);
        (0, Some(remaining))
    }
}
