//! ELF file header parsing.
//!
//! Holds the identification constants shared by both word widths, the
//! bounds-checked little-endian field readers every other module uses, and the
//! width-neutral [`ElfHeader`] record produced by an [`ElfClass`] layout.
//!
//! [`ElfClass`]: crate::class::ElfClass

use core::fmt;

use crate::class::ElfClass;
use crate::program::ProgramHeader;
use crate::section::SectionHeader;

/// ELF magic bytes: `\x7fELF`.
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Identification byte index of the class field.
pub const EI_CLASS: usize = 4;

/// Identification byte index of the data-encoding field.
pub const EI_DATA: usize = 5;

/// Identification byte index of the identification version.
pub const EI_VERSION: usize = 6;

/// ELF class: 32-bit.
pub const ELFCLASS32: u8 = 1;

/// ELF class: 64-bit.
pub const ELFCLASS64: u8 = 2;

/// ELF data encoding: little-endian.
pub const ELFDATA2LSB: u8 = 1;

/// ELF type: relocatable object.
pub const ET_REL: u16 = 1;

/// ELF type: executable.
pub const ET_EXEC: u16 = 2;

/// ELF type: shared object (PIE).
pub const ET_DYN: u16 = 3;

/// ELF machine: Intel 80386.
pub const EM_386: u16 = 3;

/// ELF machine: x86-64.
pub const EM_X86_64: u16 = 62;

/// ELF format version: current.
pub const EV_CURRENT: u32 = 1;

/// File offset of `e_type`, identical in both layouts.
pub(crate) const E_TYPE_OFFSET: usize = 16;

/// File offset of `e_machine`, identical in both layouts.
pub(crate) const E_MACHINE_OFFSET: usize = 18;

/// File offset of `e_version`, identical in both layouts.
pub(crate) const E_VERSION_OFFSET: usize = 20;

/// Read `N` bytes at `off`, failing with [`ElfError::Truncated`] past the end.
fn le_bytes<const N: usize>(data: &[u8], off: usize) -> Result<[u8; N], ElfError> {
    let end = off.checked_add(N).ok_or(ElfError::InvalidOffset)?;
    data.get(off..end)
        .and_then(|b| b.first_chunk::<N>())
        .copied()
        .ok_or(ElfError::Truncated)
}

/// Read a little-endian `u16` from `data` at byte offset `off`.
pub(crate) fn le_u16(data: &[u8], off: usize) -> Result<u16, ElfError> {
    le_bytes(data, off).map(u16::from_le_bytes)
}

/// Read a little-endian `u32` from `data` at byte offset `off`.
pub(crate) fn le_u32(data: &[u8], off: usize) -> Result<u32, ElfError> {
    le_bytes(data, off).map(u32::from_le_bytes)
}

/// Read a little-endian `u64` from `data` at byte offset `off`.
pub(crate) fn le_u64(data: &[u8], off: usize) -> Result<u64, ElfError> {
    le_bytes(data, off).map(u64::from_le_bytes)
}

/// Read a little-endian `i32` from `data` at byte offset `off`.
pub(crate) fn le_i32(data: &[u8], off: usize) -> Result<i32, ElfError> {
    le_bytes(data, off).map(i32::from_le_bytes)
}

/// Read a little-endian `i64` from `data` at byte offset `off`.
pub(crate) fn le_i64(data: &[u8], off: usize) -> Result<i64, ElfError> {
    le_bytes(data, off).map(i64::from_le_bytes)
}

/// Computes the byte range of table entry `index`, validated against `len`.
///
/// `record` is the size of the concrete record read from the entry; the
/// stride is always the file-declared `entsize`.
pub(crate) fn table_entry(
    table_offset: u64,
    entsize: u64,
    index: u64,
    record: usize,
    len: usize,
) -> Result<usize, ElfError> {
    let start = index
        .checked_mul(entsize)
        .and_then(|rel| rel.checked_add(table_offset))
        .ok_or(ElfError::InvalidOffset)?;
    let start = usize::try_from(start).map_err(|_| ElfError::InvalidOffset)?;
    let end = start.checked_add(record).ok_or(ElfError::InvalidOffset)?;
    if end > len {
        return Err(ElfError::InvalidOffset);
    }
    Ok(start)
}

/// Errors that can occur when parsing an ELF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// The file does not start with the ELF magic bytes.
    BadMagic,
    /// The ELF class is neither `ELFCLASS32` nor `ELFCLASS64`, or does not
    /// match the layout it is parsed with.
    UnsupportedClass,
    /// The ELF file is not little-endian.
    UnsupportedEncoding,
    /// The machine type does not match the class (`EM_386` / `EM_X86_64`).
    UnsupportedMachine,
    /// The ELF type is not `ET_EXEC` or `ET_DYN`.
    UnsupportedType,
    /// The format version is not `EV_CURRENT`.
    UnsupportedVersion,
    /// The input data is too short for the declared structure.
    Truncated,
    /// A header offset, entry size or count is out of bounds.
    InvalidOffset,
}

impl ElfError {
    /// Returns `true` for rejections of a well-formed but unsupported image,
    /// as opposed to a malformed one.
    #[must_use]
    pub fn is_unsupported(self) -> bool {
        matches!(
            self,
            Self::BadMagic
                | Self::UnsupportedClass
                | Self::UnsupportedEncoding
                | Self::UnsupportedMachine
                | Self::UnsupportedType
                | Self::UnsupportedVersion
        )
    }
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "invalid ELF magic bytes"),
            Self::UnsupportedClass => write!(f, "unsupported ELF class"),
            Self::UnsupportedEncoding => {
                write!(f, "unsupported data encoding (expected little-endian)")
            }
            Self::UnsupportedMachine => {
                write!(f, "unsupported machine type (expected EM_386 or EM_X86_64)")
            }
            Self::UnsupportedType => write!(f, "unsupported ELF type (expected ET_EXEC or ET_DYN)"),
            Self::UnsupportedVersion => write!(f, "unsupported ELF version (expected EV_CURRENT)"),
            Self::Truncated => write!(f, "input data truncated"),
            Self::InvalidOffset => write!(f, "invalid header offset or size"),
        }
    }
}

/// ELF object file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfType {
    /// Relocatable object (`ET_REL`).
    Rel,
    /// Fixed-address executable (`ET_EXEC`).
    Exec,
    /// Shared object or position-independent executable (`ET_DYN`).
    Dyn,
    /// Any other value.
    Other(u16),
}

impl From<u16> for ElfType {
    fn from(raw: u16) -> Self {
        match raw {
            ET_REL => Self::Rel,
            ET_EXEC => Self::Exec,
            ET_DYN => Self::Dyn,
            other => Self::Other(other),
        }
    }
}

/// Parsed ELF file header, widened to 64-bit fields for both classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    /// Identification class byte (`ELFCLASS32` or `ELFCLASS64`).
    pub class: u8,
    /// Identification data-encoding byte.
    pub data: u8,
    /// ELF type (`ET_EXEC`, `ET_DYN`, ...).
    pub e_type: u16,
    /// Target machine architecture.
    pub e_machine: u16,
    /// Object file format version.
    pub e_version: u32,
    /// Virtual address of the entry point.
    pub e_entry: u64,
    /// Offset of the program header table in the file.
    pub e_phoff: u64,
    /// Offset of the section header table in the file.
    pub e_shoff: u64,
    /// Size of each program header entry.
    pub e_phentsize: u16,
    /// Number of program header entries.
    pub e_phnum: u16,
    /// Size of each section header entry.
    pub e_shentsize: u16,
    /// Number of section header entries.
    pub e_shnum: u16,
    /// Section header string table index.
    pub e_shstrndx: u16,
}

impl ElfHeader {
    /// Returns the decoded object file type.
    #[must_use]
    pub fn elf_type(&self) -> ElfType {
        ElfType::from(self.e_type)
    }

    /// Decodes program header `index` of `data` with the `C` layout.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] if `index` is not below `e_phnum`
    /// or the entry does not lie within `data`.
    pub fn program_header<C: ElfClass>(&self, data: &[u8], index: usize) -> Result<ProgramHeader, ElfError> {
        if index >= usize::from(self.e_phnum) {
            return Err(ElfError::InvalidOffset);
        }
        let offset = table_entry(self.e_phoff, self.e_phentsize.into(), index as u64, C::PHDR_SIZE, data.len())?;
        C::parse_program_header(&data[offset..])
    }

    /// Decodes section header `index` of `data` with the `C` layout.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] if `index` is not below `e_shnum`
    /// or the entry does not lie within `data`.
    pub fn section_header<C: ElfClass>(&self, data: &[u8], index: usize) -> Result<SectionHeader, ElfError> {
        if index >= usize::from(self.e_shnum) {
            return Err(ElfError::InvalidOffset);
        }
        let offset = table_entry(self.e_shoff, self.e_shentsize.into(), index as u64, C::SHDR_SIZE, data.len())?;
        C::parse_section_header(&data[offset..])
    }

    /// Validates that the program header table lies within a file of `len`
    /// bytes and that `e_phentsize` can hold a `C` record.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] otherwise.
    pub fn check_program_table<C: ElfClass>(&self, len: usize) -> Result<(), ElfError> {
        check_table(self.e_phoff, self.e_phentsize, self.e_phnum, C::PHDR_SIZE, len)
    }

    /// Validates that the section header table lies within a file of `len`
    /// bytes and that `e_shentsize` can hold a `C` record.
    ///
    /// Only callers that walk sections need this; loading segments does not.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] otherwise.
    pub fn check_section_table<C: ElfClass>(&self, len: usize) -> Result<(), ElfError> {
        check_table(self.e_shoff, self.e_shentsize, self.e_shnum, C::SHDR_SIZE, len)
    }
}

fn check_table(offset: u64, entsize: u16, count: u16, record: usize, len: usize) -> Result<(), ElfError> {
    if count == 0 {
        return Ok(());
    }
    if usize::from(entsize) < record {
        return Err(ElfError::InvalidOffset);
    }
    // The last entry only needs `record` bytes, the stride covers the rest.
    table_entry(offset, u64::from(entsize), u64::from(count - 1), record, len).map(|_| ())
}
