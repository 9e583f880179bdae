//! [`ImageContext`], the image description shared by both load paths.

use ember_elf::{Class, Elf32, Elf64, ElfClass, ElfError, ElfFile, ElfType};
use log::{debug, info};

use crate::error::LoadError;
use crate::loader::LoadReport;
use crate::memory::ImageMemory;
use crate::relocate::{RelocStats, Relocator, check_relocatable, relocate};
use crate::segment::load_segments;

/// Where an image wants to live, where it will live, and where it starts.
///
/// Holds no memory of its own. Built with [`parse`](Self::parse) right before
/// a load; [`entry_point`](Self::entry_point) is filled in by the load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageContext {
    /// Word width of the image.
    pub class: Class,
    /// `e_machine` as declared.
    pub machine: u16,
    /// `e_type` as declared.
    pub elf_type: ElfType,
    /// Length of the image in bytes.
    pub file_size: u64,
    /// Lowest physical address of any loadable segment.
    pub preferred_address: u64,
    /// Address the image is loaded at.
    pub image_address: u64,
    /// Bytes from `preferred_address` to the end of the highest segment.
    pub image_size: u64,
    /// Entry address declared in the header.
    pub entry: u64,
    /// Entry address after loading, set by a successful load.
    pub entry_point: Option<u64>,
}

impl ImageContext {
    /// Describes `image` without loading it.
    ///
    /// The image address starts out equal to the preferred address. An image
    /// without loadable segments is described with a zero preferred address
    /// and a zero image size; only a direct load accepts it.
    ///
    /// # Errors
    ///
    /// - [`LoadError::InvalidParameter`] for an empty image.
    /// - [`LoadError::Unsupported`] for an unknown class or a missing magic.
    /// - [`LoadError::Malformed`] if the program header table does not fit the
    ///   image or a segment end overflows.
    pub fn parse(image: &[u8]) -> Result<Self, LoadError> {
        if image.is_empty() {
            return Err(LoadError::InvalidParameter("empty image"));
        }
        match Class::of(image)? {
            Class::Elf32 => Self::parse_as::<Elf32>(image),
            Class::Elf64 => Self::parse_as::<Elf64>(image),
        }
    }

    fn parse_as<C: ElfClass>(image: &[u8]) -> Result<Self, LoadError> {
        let elf = ElfFile::<C>::parse(image)?;
        let mut span: Option<(u64, u64)> = None;
        for phdr in elf.program_headers().filter(|p| p.is_loadable()) {
            let end = phdr
                .p_paddr
                .checked_add(phdr.p_memsz)
                .ok_or(LoadError::Malformed(ElfError::InvalidOffset))?;
            span = Some(match span {
                Some((low, high)) => (low.min(phdr.p_paddr), high.max(end)),
                None => (phdr.p_paddr, end),
            });
        }
        let (low, high) = span.unwrap_or((0, 0));

        let header = elf.header();
        Ok(Self {
            class: C::CLASS,
            machine: header.e_machine,
            elf_type: header.elf_type(),
            file_size: image.len() as u64,
            preferred_address: low,
            image_address: low,
            image_size: high - low,
            entry: header.e_entry,
            entry_point: None,
        })
    }

    /// Returns the context with the image placed at `address`.
    #[must_use]
    pub fn with_image_address(self, address: u64) -> Self {
        Self { image_address: address, entry_point: None, ..self }
    }

    /// `image_address - preferred_address`, modulo 2^64.
    #[must_use]
    pub fn delta(&self) -> u64 {
        self.image_address.wrapping_sub(self.preferred_address)
    }

    /// Loads the image in `mem` at `image_address`, relocating it when it
    /// moves, and records the entry point.
    ///
    /// The image is not classified first; callers that need the full header
    /// checks go through [`load_image`](crate::load_image).
    ///
    /// # Errors
    ///
    /// - [`LoadError::InvalidParameter`] for an empty image or window, or a
    ///   zero image size.
    /// - [`LoadError::Unsupported`] if the image must be relocated and its
    ///   machine does not match its class, or [`LoadError::Malformed`] if its
    ///   section header table does not fit. Nothing is written in that case.
    /// - Any segment or relocation error; memory written before the failure
    ///   stays written.
    pub fn load<M: ImageMemory + ?Sized>(&mut self, mem: &mut M) -> Result<LoadReport, LoadError> {
        if mem.image().is_empty() {
            return Err(LoadError::InvalidParameter("empty image"));
        }
        if mem.window().is_empty() {
            return Err(LoadError::InvalidParameter("empty load window"));
        }
        if self.image_size == 0 {
            return Err(LoadError::InvalidParameter("zero image size"));
        }
        self.place(mem)
    }

    /// Loads without the context-form parameter checks, so an image with
    /// nothing to place still reports its entry point.
    pub(crate) fn place<M: ImageMemory + ?Sized>(
        &mut self,
        mem: &mut M,
    ) -> Result<LoadReport, LoadError> {
        match self.class {
            Class::Elf32 => self.load_as::<Elf32, M>(mem),
            Class::Elf64 => self.load_as::<Elf64, M>(mem),
        }
    }

    fn load_as<C: Relocator, M: ImageMemory + ?Sized>(
        &mut self,
        mem: &mut M,
    ) -> Result<LoadReport, LoadError> {
        let header = *ElfFile::<C>::parse(mem.image())?.header();
        let delta = self.delta();
        // Relocation preconditions must hold before the first segment lands.
        if delta != 0 {
            check_relocatable::<C>(&header, mem.image().len())?;
        }

        debug!(
            "elf: {} image, {:#x} bytes linked at {:#x}, loading at {:#x}",
            self.class, self.image_size, self.preferred_address, self.image_address
        );
        let segments = load_segments::<C, M>(mem, &header, delta)?;
        let relocations = if delta == 0 {
            self.entry_point = Some(header.e_entry);
            RelocStats::default()
        } else {
            relocate::<C, M>(mem, self)?
        };

        let entry_point = self.entry_point.unwrap_or(header.e_entry);
        info!(
            "elf: loaded {} segments at {:#x}, {} relocations patched, entry {entry_point:#x}",
            segments.placed, self.image_address, relocations.patched
        );

        Ok(LoadReport {
            class: self.class,
            preferred_address: self.preferred_address,
            load_address: self.image_address,
            delta,
            entry_point,
            segments,
            relocations,
        })
    }
}
