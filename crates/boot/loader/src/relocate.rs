//! Relocation of a placed image by a single delta.
//!
//! Every `SHT_REL`/`SHT_RELA` section whose target section is part of the
//! runtime image is walked with its declared entry size. Symbols are never
//! resolved: the image is assumed fully linked, so only absolute address
//! fixups need patching and PC-relative or GOT-relative kinds are left alone.

use ember_elf::{
    ElfClass, ElfError, ElfFile, ElfHeader, Elf32, Elf64, R_386_32, R_386_NONE, R_386_PC32,
    R_X86_64_32, R_X86_64_64, R_X86_64_GOTPCREL, R_X86_64_GOTPCRELX, R_X86_64_NONE,
    R_X86_64_PC32, R_X86_64_PLT32, R_X86_64_REX_GOTPCRELX, RelocTable, SectionHeader,
    reloc_type_name,
};
use log::{debug, trace, warn};

use crate::context::ImageContext;
use crate::error::LoadError;
use crate::memory::ImageMemory;

/// What to do with one relocation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixup {
    /// Position-independent; nothing to patch.
    None,
    /// Add the delta to the 32-bit word at the target.
    Add32,
    /// Add the delta to the 64-bit word at the target.
    Add64,
    /// A kind this loader does not handle; logged and skipped.
    Unknown,
}

/// The relocation kinds one word width understands.
pub trait Relocator: ElfClass {
    /// Classifies relocation kind `kind`.
    fn fixup(kind: u32) -> Fixup;
}

impl Relocator for Elf32 {
    fn fixup(kind: u32) -> Fixup {
        match kind {
            R_386_NONE | R_386_PC32 => Fixup::None,
            R_386_32 => Fixup::Add32,
            _ => Fixup::Unknown,
        }
    }
}

impl Relocator for Elf64 {
    fn fixup(kind: u32) -> Fixup {
        match kind {
            R_X86_64_NONE
            | R_X86_64_PC32
            | R_X86_64_PLT32
            | R_X86_64_GOTPCREL
            | R_X86_64_GOTPCRELX
            | R_X86_64_REX_GOTPCRELX => Fixup::None,
            R_X86_64_64 => Fixup::Add64,
            R_X86_64_32 => Fixup::Add32,
            _ => Fixup::Unknown,
        }
    }
}

/// What the relocation engine did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocStats {
    /// Relocation sections found.
    pub sections: usize,
    /// Relocation sections skipped because their target is not loaded.
    pub skipped_sections: usize,
    /// Entries whose target word was patched.
    pub patched: usize,
    /// Entries that need no patching.
    pub no_op: usize,
    /// Entries of an unknown kind.
    pub unknown: usize,
}

/// Returns `true` for an allocated section that is read-only.
fn is_code(shdr: &SectionHeader) -> bool {
    shdr.is_alloc() && !shdr.is_writable()
}

/// Returns `true` for an allocated section that is writable.
fn is_data(shdr: &SectionHeader) -> bool {
    shdr.is_alloc() && shdr.is_writable()
}

/// Refuses images built for another machine than `C` relocates for.
///
/// # Errors
///
/// Returns [`LoadError::Unsupported`] with [`ElfError::UnsupportedMachine`].
pub fn check_machine<C: Relocator>(header: &ElfHeader) -> Result<(), LoadError> {
    if header.e_machine == C::CLASS.machine() {
        Ok(())
    } else {
        Err(LoadError::Unsupported(ElfError::UnsupportedMachine))
    }
}

/// Checks what relocating an image of `len` bytes depends on: the machine and
/// the section header table.
///
/// # Errors
///
/// - [`LoadError::Unsupported`] if the image machine is not `C`'s.
/// - [`LoadError::Malformed`] if the section header table does not fit.
pub fn check_relocatable<C: Relocator>(header: &ElfHeader, len: usize) -> Result<(), LoadError> {
    check_machine::<C>(header)?;
    header.check_section_table::<C>(len)?;
    Ok(())
}

/// Relocates an image already placed at `ctx.image_address`, then records the
/// rebased entry point in `ctx`.
///
/// [`check_relocatable`] runs before anything is written.
///
/// # Errors
///
/// - [`LoadError::Unsupported`] if the image machine is not `C`'s.
/// - [`LoadError::Malformed`] if a section or relocation table is malformed.
/// - [`LoadError::OutOfBounds`] if a patched word lies outside the window.
pub fn relocate<C: Relocator, M: ImageMemory + ?Sized>(
    mem: &mut M,
    ctx: &mut ImageContext,
) -> Result<RelocStats, LoadError> {
    let header = *ElfFile::<C>::parse(mem.image())?.header();
    check_relocatable::<C>(&header, mem.image().len())?;
    let delta = ctx.delta();
    let stats = apply_relocations::<C, M>(mem, &header, delta)?;
    ctx.entry_point = Some(header.e_entry.wrapping_add(delta));
    Ok(stats)
}

/// Applies every relocation of the image in `mem` for `delta`.
///
/// Entries are patched at `r_offset + delta`. Patches are modular at the
/// patched width.
pub(crate) fn apply_relocations<C: Relocator, M: ImageMemory + ?Sized>(
    mem: &mut M,
    header: &ElfHeader,
    delta: u64,
) -> Result<RelocStats, LoadError> {
    let mut stats = RelocStats::default();

    for index in 0..usize::from(header.e_shnum) {
        let shdr = header.section_header::<C>(mem.image(), index)?;
        if !shdr.is_relocation() {
            continue;
        }
        stats.sections += 1;

        let target = usize::try_from(shdr.sh_info)
            .ok()
            .and_then(|i| header.section_header::<C>(mem.image(), i).ok());
        let Some(target) = target.filter(|t| is_code(t) || is_data(t)) else {
            warn!("elf: relocation section {index} targets unloaded section {}", shdr.sh_info);
            stats.skipped_sections += 1;
            continue;
        };

        let table = RelocTable::new::<C>(&shdr, mem.image().len())?;
        debug!(
            "elf: relocation section {index}: {} entries for section at {:#x}",
            table.len(),
            target.sh_addr
        );

        for i in 0..table.len() {
            let entry = table.entry::<C>(mem.image(), i)?;
            let addr = entry.r_offset.wrapping_add(delta);
            match C::fixup(entry.r_type) {
                Fixup::None => stats.no_op += 1,
                Fixup::Add32 => {
                    let value = mem.window().read_u32(addr)?.wrapping_add(low32(delta));
                    mem.write_u32(addr, value)?;
                    trace!("elf: {addr:#x} <- {value:#x}");
                    stats.patched += 1;
                }
                Fixup::Add64 => {
                    let value = mem.window().read_u64(addr)?.wrapping_add(delta);
                    mem.write_u64(addr, value)?;
                    trace!("elf: {addr:#x} <- {value:#x}");
                    stats.patched += 1;
                }
                Fixup::Unknown => {
                    warn!(
                        "elf: skipping relocation {} ({}) at {:#x}",
                        entry.r_type,
                        reloc_type_name(C::CLASS, entry.r_type),
                        entry.r_offset
                    );
                    stats.unknown += 1;
                }
            }
        }
    }

    Ok(stats)
}

#[expect(clippy::cast_possible_truncation, reason = "32-bit fixups are modulo 2^32")]
fn low32(value: u64) -> u32 {
    value as u32
}
