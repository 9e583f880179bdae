//! Program header records and iteration.

use core::marker::PhantomData;

use crate::class::ElfClass;
use crate::header::ElfHeader;

/// Program header type: unused entry.
pub const PT_NULL: u32 = 0;

/// Program header type: loadable segment.
pub const PT_LOAD: u32 = 1;

/// Program header type: dynamic linking information.
pub const PT_DYNAMIC: u32 = 2;

/// Segment flag: executable.
pub const PF_X: u32 = 1;

/// Segment flag: writable.
pub const PF_W: u32 = 2;

/// Segment flag: readable.
pub const PF_R: u32 = 4;

/// Parsed program header entry, widened to 64-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    /// Segment type.
    pub p_type: u32,
    /// Segment flags (read/write/execute).
    pub p_flags: u32,
    /// Offset of the segment data in the file.
    pub p_offset: u64,
    /// Virtual address of the segment.
    pub p_vaddr: u64,
    /// Physical address of the segment.
    pub p_paddr: u64,
    /// Size of the segment data in the file.
    pub p_filesz: u64,
    /// Size of the segment in memory.
    pub p_memsz: u64,
    /// Required alignment.
    pub p_align: u64,
}

impl ProgramHeader {
    /// Returns `true` for a `PT_LOAD` entry that occupies memory.
    ///
    /// Zero-sized loadable entries are not part of the image; a zero address
    /// is.
    #[must_use]
    pub fn is_loadable(&self) -> bool {
        self.p_type == PT_LOAD && self.p_memsz != 0
    }

    /// Number of zero bytes following the file-backed part in memory.
    ///
    /// Returns `None` when the file size exceeds the memory size.
    #[must_use]
    pub fn zero_fill(&self) -> Option<u64> {
        self.p_memsz.checked_sub(self.p_filesz)
    }
}

/// An iterator over all program header entries, in table order.
///
/// The table bounds are validated when the [`ElfFile`](crate::ElfFile) is
/// parsed; an entry that still fails to decode ends the iteration.
pub struct ProgramHeaderIter<'a, C> {
    data: &'a [u8],
    header: ElfHeader,
    index: usize,
    _class: PhantomData<C>,
}

impl<'a, C: ElfClass> ProgramHeaderIter<'a, C> {
    pub(crate) fn new(data: &'a [u8], header: ElfHeader) -> Self {
        Self { data, header, index: 0, _class: PhantomData }
    }
}

impl<C: ElfClass> Iterator for ProgramHeaderIter<'_, C> {
    type Item = ProgramHeader;

    fn next(&mut self) -> Option<Self::Item> {
        let phdr = self.header.program_header::<C>(self.data, self.index).ok()?;
        self.index += 1;
        Some(phdr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.header.e_phnum).saturating_sub(self.index);
        (0, Some(remaining))
    }
}
