//! Image classification.
//!
//! Every field examined here sits at the same fixed offset in the 32-bit and
//! 64-bit header layouts, so the checks are valid before the class is known.
//! Nothing after classification may be trusted until it succeeds.

use crate::class::Class;
use crate::header::{
    E_MACHINE_OFFSET, E_TYPE_OFFSET, E_VERSION_OFFSET, EI_DATA, ELF_MAGIC, ELFDATA2LSB, ET_DYN,
    ET_EXEC, EV_CURRENT, ElfError, le_u16, le_u32,
};

/// Classifies `data` as a loadable x86 ELF image and returns its class.
///
/// Checks, in order: magic, class, data encoding, machine (which must match
/// the class), file type (`ET_EXEC` or `ET_DYN`) and format version. The
/// first failing check determines the error and no later field is read.
///
/// # Errors
///
/// Returns the [`ElfError`] of the first failing check, or
/// [`ElfError::Truncated`] if `data` ends before the field being checked.
pub fn identify(data: &[u8]) -> Result<Class, ElfError> {
    let magic = data.get(..ELF_MAGIC.len()).ok_or(ElfError::Truncated)?;
    if magic != ELF_MAGIC {
        return Err(ElfError::BadMagic);
    }

    let class = Class::of(data)?;

    if *data.get(EI_DATA).ok_or(ElfError::Truncated)? != ELFDATA2LSB {
        return Err(ElfError::UnsupportedEncoding);
    }

    if le_u16(data, E_MACHINE_OFFSET)? != class.machine() {
        return Err(ElfError::UnsupportedMachine);
    }

    let e_type = le_u16(data, E_TYPE_OFFSET)?;
    if e_type != ET_EXEC && e_type != ET_DYN {
        return Err(ElfError::UnsupportedType);
    }

    if le_u32(data, E_VERSION_OFFSET)? != EV_CURRENT {
        return Err(ElfError::UnsupportedVersion);
    }

    Ok(class)
}

/// Returns `true` if `data` begins with a supported ELF header.
///
/// A pure predicate over the first 24 bytes; see [`identify`].
#[must_use]
pub fn is_elf_image(data: &[u8]) -> bool {
    identify(data).is_ok()
}
