//! Word-width selection.
//!
//! [`ElfClass`] maps the generic record names ([`ElfHeader`],
//! [`ProgramHeader`], [`SectionHeader`], [`RelocEntry`]) onto one concrete
//! byte layout. It is implemented once for [`Elf32`] and once for [`Elf64`];
//! the run-time [`Class`] read from the identification bytes picks which one a
//! caller instantiates.

use core::fmt;

use crate::header::{
    ELFCLASS32, ELFCLASS64, EM_386, EM_X86_64, EI_CLASS, EI_DATA, ElfError, ElfHeader, le_i32,
    le_i64, le_u16, le_u32, le_u64,
};
use crate::program::ProgramHeader;
use crate::reloc::RelocEntry;
use crate::section::SectionHeader;

/// Size of an ELF32 file header (52 bytes).
pub const ELF32_EHDR_SIZE: usize = 52;
/// Size of an ELF32 program header entry (32 bytes).
pub const ELF32_PHDR_SIZE: usize = 32;
/// Size of an ELF32 section header entry (40 bytes).
pub const ELF32_SHDR_SIZE: usize = 40;
/// Size of an ELF32 `Rel` entry (8 bytes).
pub const ELF32_REL_SIZE: usize = 8;
/// Size of an ELF32 `Rela` entry (12 bytes).
pub const ELF32_RELA_SIZE: usize = 12;

/// Size of an ELF64 file header (64 bytes).
pub const ELF64_EHDR_SIZE: usize = 64;
/// Size of an ELF64 program header entry (56 bytes).
pub const ELF64_PHDR_SIZE: usize = 56;
/// Size of an ELF64 section header entry (64 bytes).
pub const ELF64_SHDR_SIZE: usize = 64;
/// Size of an ELF64 `Rel` entry (16 bytes).
pub const ELF64_REL_SIZE: usize = 16;
/// Size of an ELF64 `Rela` entry (24 bytes).
pub const ELF64_RELA_SIZE: usize = 24;

/// The word width of an image, as declared by its identification bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    /// `ELFCLASS32`, 32-bit x86 (`EM_386`).
    Elf32,
    /// `ELFCLASS64`, 64-bit x86 (`EM_X86_64`).
    Elf64,
}

impl Class {
    /// Decodes the class from the `EI_CLASS` identification byte.
    #[must_use]
    pub fn from_ident(byte: u8) -> Option<Self> {
        match byte {
            ELFCLASS32 => Some(Self::Elf32),
            ELFCLASS64 => Some(Self::Elf64),
            _ => None,
        }
    }

    /// Reads the class byte of `data` without validating anything else.
    ///
    /// # Errors
    ///
    /// [`ElfError::Truncated`] if `data` is too short to hold the byte and
    /// [`ElfError::UnsupportedClass`] if the value is unknown.
    pub fn of(data: &[u8]) -> Result<Self, ElfError> {
        let byte = *data.get(EI_CLASS).ok_or(ElfError::Truncated)?;
        Self::from_ident(byte).ok_or(ElfError::UnsupportedClass)
    }

    /// The machine this loader accepts for images of this class.
    #[must_use]
    pub fn machine(self) -> u16 {
        match self {
            Self::Elf32 => EM_386,
            Self::Elf64 => EM_X86_64,
        }
    }

    /// Short name used in diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Elf32 => "ELF32",
            Self::Elf64 => "ELF64",
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete ELF record layout for one word width.
///
/// Parsers take a slice that starts at the record; they only fail with
/// [`ElfError::Truncated`] when the slice is shorter than the record.
pub trait ElfClass: Copy + fmt::Debug + 'static {
    /// The run-time tag for this layout.
    const CLASS: Class;
    /// Size of the file header.
    const EHDR_SIZE: usize;
    /// Size of a program header record.
    const PHDR_SIZE: usize;
    /// Size of a section header record.
    const SHDR_SIZE: usize;
    /// Size of a `Rel` record.
    const REL_SIZE: usize;
    /// Size of a `Rela` record.
    const RELA_SIZE: usize;

    /// Decodes the file header fields of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::Truncated`] if `data` is shorter than the header.
    fn parse_header(data: &[u8]) -> Result<ElfHeader, ElfError>;

    /// Decodes one program header record.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::Truncated`] if `b` is shorter than the record.
    fn parse_program_header(b: &[u8]) -> Result<ProgramHeader, ElfError>;

    /// Decodes one section header record.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::Truncated`] if `b` is shorter than the record.
    fn parse_section_header(b: &[u8]) -> Result<SectionHeader, ElfError>;

    /// Decodes one relocation record, with or without an addend field.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::Truncated`] if `b` is shorter than the record.
    fn parse_reloc(b: &[u8], with_addend: bool) -> Result<RelocEntry, ElfError>;

    /// Splits a combined `r_info` field into `(symbol index, relocation kind)`.
    fn split_info(info: u64) -> (u32, u32);
}

/// The 32-bit layout (`Elf32_*` records).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32;

/// The 64-bit layout (`Elf64_*` records).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64;

impl ElfClass for Elf32 {
    const CLASS: Class = Class::Elf32;
    const EHDR_SIZE: usize = ELF32_EHDR_SIZE;
    const PHDR_SIZE: usize = ELF32_PHDR_SIZE;
    const SHDR_SIZE: usize = ELF32_SHDR_SIZE;
    const REL_SIZE: usize = ELF32_REL_SIZE;
    const RELA_SIZE: usize = ELF32_RELA_SIZE;

    fn parse_header(data: &[u8]) -> Result<ElfHeader, ElfError> {
        if data.len() < ELF32_EHDR_SIZE {
            return Err(ElfError::Truncated);
        }
        Ok(ElfHeader {
            class: data[EI_CLASS],
            data: data[EI_DATA],
            e_type: le_u16(data, 16)?,
            e_machine: le_u16(data, 18)?,
            e_version: le_u32(data, 20)?,
            e_entry: le_u32(data, 24)?.into(),
            e_phoff: le_u32(data, 28)?.into(),
            e_shoff: le_u32(data, 32)?.into(),
            // e_flags at 36, e_ehsize at 40
            e_phentsize: le_u16(data, 42)?,
            e_phnum: le_u16(data, 44)?,
            e_shentsize: le_u16(data, 46)?,
            e_shnum: le_u16(data, 48)?,
            e_shstrndx: le_u16(data, 50)?,
        })
    }

    fn parse_program_header(b: &[u8]) -> Result<ProgramHeader, ElfError> {
        Ok(ProgramHeader {
            p_type: le_u32(b, 0)?,
            p_offset: le_u32(b, 4)?.into(),
            p_vaddr: le_u32(b, 8)?.into(),
            p_paddr: le_u32(b, 12)?.into(),
            p_filesz: le_u32(b, 16)?.into(),
            p_memsz: le_u32(b, 20)?.into(),
            p_flags: le_u32(b, 24)?,
            p_align: le_u32(b, 28)?.into(),
        })
    }

    fn parse_section_header(b: &[u8]) -> Result<SectionHeader, ElfError> {
        Ok(SectionHeader {
            sh_name: le_u32(b, 0)?,
            sh_type: le_u32(b, 4)?,
            sh_flags: le_u32(b, 8)?.into(),
            sh_addr: le_u32(b, 12)?.into(),
            sh_offset: le_u32(b, 16)?.into(),
            sh_size: le_u32(b, 20)?.into(),
            sh_link: le_u32(b, 24)?,
            sh_info: le_u32(b, 28)?,
            sh_addralign: le_u32(b, 32)?.into(),
            sh_entsize: le_u32(b, 36)?.into(),
        })
    }

    fn parse_reloc(b: &[u8], with_addend: bool) -> Result<RelocEntry, ElfError> {
        let r_offset = le_u32(b, 0)?.into();
        let (r_sym, r_type) = Self::split_info(le_u32(b, 4)?.into());
        let r_addend = if with_addend { Some(le_i32(b, 8)?.into()) } else { None };
        Ok(RelocEntry { r_offset, r_sym, r_type, r_addend })
    }

    #[expect(clippy::cast_possible_truncation, reason = "ELF32_R_SYM/ELF32_R_TYPE split")]
    fn split_info(info: u64) -> (u32, u32) {
        let info = info as u32;
        (info >> 8, info & 0xff)
    }
}

impl ElfClass for Elf64 {
    const CLASS: Class = Class::Elf64;
    const EHDR_SIZE: usize = ELF64_EHDR_SIZE;
    const PHDR_SIZE: usize = ELF64_PHDR_SIZE;
    const SHDR_SIZE: usize = ELF64_SHDR_SIZE;
    const REL_SIZE: usize = ELF64_REL_SIZE;
    const RELA_SIZE: usize = ELF64_RELA_SIZE;

    fn parse_header(data: &[u8]) -> Result<ElfHeader, ElfError> {
        if data.len() < ELF64_EHDR_SIZE {
            return Err(ElfError::Truncated);
        }
        Ok(ElfHeader {
            class: data[EI_CLASS],
            data: data[EI_DATA],
            e_type: le_u16(data, 16)?,
            e_machine: le_u16(data, 18)?,
            e_version: le_u32(data, 20)?,
            e_entry: le_u64(data, 24)?,
            e_phoff: le_u64(data, 32)?,
            e_shoff: le_u64(data, 40)?,
            // e_flags at 48, e_ehsize at 52
            e_phentsize: le_u16(data, 54)?,
            e_phnum: le_u16(data, 56)?,
            e_shentsize: le_u16(data, 58)?,
            e_shnum: le_u16(data, 60)?,
            e_shstrndx: le_u16(data, 62)?,
        })
    }

    fn parse_program_header(b: &[u8]) -> Result<ProgramHeader, ElfError> {
        Ok(ProgramHeader {
            p_type: le_u32(b, 0)?,
            p_flags: le_u32(b, 4)?,
            p_offset: le_u64(b, 8)?,
            p_vaddr: le_u64(b, 16)?,
            p_paddr: le_u64(b, 24)?,
            p_filesz: le_u64(b, 32)?,
            p_memsz: le_u64(b, 40)?,
            p_align: le_u64(b, 48)?,
        })
    }

    fn parse_section_header(b: &[u8]) -> Result<SectionHeader, ElfError> {
        Ok(SectionHeader {
            sh_name: le_u32(b, 0)?,
            sh_type: le_u32(b, 4)?,
            sh_flags: le_u64(b, 8)?,
            sh_addr: le_u64(b, 16)?,
            sh_offset: le_u64(b, 24)?,
            sh_size: le_u64(b, 32)?,
            sh_link: le_u32(b, 40)?,
            sh_info: le_u32(b, 44)?,
            sh_addralign: le_u64(b, 48)?,
            sh_entsize: le_u64(b, 56)?,
        })
    }

    fn parse_reloc(b: &[u8], with_addend: bool) -> Result<RelocEntry, ElfError> {
        let r_offset = le_u64(b, 0)?;
        let (r_sym, r_type) = Self::split_info(le_u64(b, 8)?);
        let r_addend = if with_addend { Some(le_i64(b, 16)?) } else { None };
        Ok(RelocEntry { r_offset, r_sym, r_type, r_addend })
    }

    #[expect(clippy::cast_possible_truncation, reason = "ELF64_R_SYM/ELF64_R_TYPE split")]
    fn split_info(info: u64) -> (u32, u32) {
        ((info >> 32) as u32, info as u32)
    }
}
