//! Program-header driven segment placement.

use ember_elf::{ElfClass, ElfHeader};
use log::{debug, trace};

use crate::error::LoadError;
use crate::memory::ImageMemory;

/// What the segment loader did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentStats {
    /// Loadable segments placed.
    pub placed: usize,
    /// Program header entries skipped (not `PT_LOAD`, or zero memory size).
    pub skipped: usize,
    /// File bytes copied.
    pub copied: u64,
    /// Memory-only bytes zeroed.
    pub zeroed: u64,
}

/// Places every loadable segment at `p_paddr + delta`.
///
/// Entry `i` is read at `e_phoff + i * e_phentsize`. For each `PT_LOAD` entry
/// with a non-zero memory size, `p_filesz` bytes are copied from `p_offset`
/// and the remaining `p_memsz - p_filesz` bytes are zeroed. A `delta` of zero
/// places segments at their physical addresses exactly.
///
/// Segments placed before a failing one stay written.
///
/// # Errors
///
/// - [`LoadError::SegmentSize`] if `p_filesz > p_memsz`; that segment is not
///   copied.
/// - [`LoadError::OutOfBounds`] / [`LoadError::FileRange`] if the destination
///   or source range leaves the window or image.
/// - [`LoadError::Malformed`] if a program header cannot be read.
pub fn load_segments<C: ElfClass, M: ImageMemory + ?Sized>(
    mem: &mut M,
    header: &ElfHeader,
    delta: u64,
) -> Result<SegmentStats, LoadError> {
    let mut stats = SegmentStats::default();

    for index in 0..usize::from(header.e_phnum) {
        let phdr = header.program_header::<C>(mem.image(), index)?;
        if !phdr.is_loadable() {
            trace!("elf: skipping program header {index} (type {:#x})", phdr.p_type);
            stats.skipped += 1;
            continue;
        }

        let fill = phdr.zero_fill().ok_or(LoadError::SegmentSize {
            index,
            file_size: phdr.p_filesz,
            mem_size: phdr.p_memsz,
        })?;

        let dest = phdr.p_paddr.wrapping_add(delta);
        // Reject the whole destination before writing any of it.
        mem.window().range(dest, phdr.p_memsz)?;

        mem.copy_segment(phdr.p_offset, phdr.p_filesz, dest)?;
        mem.zero(dest.wrapping_add(phdr.p_filesz), fill)?;

        debug!(
            "elf: segment {index}: {:#x} bytes from file {:#x} to {dest:#x}, {fill:#x} zeroed",
            phdr.p_filesz, phdr.p_offset
        );
        stats.placed += 1;
        stats.copied += phdr.p_filesz;
        stats.zeroed += fill;
    }

    Ok(stats)
}
