//! The public load paths: [`load_image`] and the simple [`load_elf_image`].

use ember_elf::{Class, identify};
use log::debug;

use crate::context::ImageContext;
use crate::error::LoadError;
use crate::memory::ImageMemory;
use crate::relocate::RelocStats;
use crate::segment::SegmentStats;

/// Where the segments go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Each segment at its physical address; never relocates.
    ///
    /// With `expected` set, the image must have been linked at that address.
    Direct {
        /// Address the caller expects the image to be linked at.
        expected: Option<u64>,
    },
    /// The whole image shifted so its lowest segment lands at `load_address`,
    /// relocated if that differs from where it was linked.
    Rebase {
        /// Address of the lowest segment after loading.
        load_address: u64,
    },
}

/// How [`load_image`] treats an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Run the full header classification before anything else.
    pub classify: bool,
    /// Destination policy.
    pub placement: Placement,
}

impl LoadOptions {
    /// Classified load at the image's own physical addresses.
    #[must_use]
    pub fn direct(expected: Option<u64>) -> Self {
        Self { classify: true, placement: Placement::Direct { expected } }
    }

    /// Unclassified load rebased to `load_address`.
    #[must_use]
    pub fn rebase(load_address: u64) -> Self {
        Self { classify: false, placement: Placement::Rebase { load_address } }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::direct(None)
    }
}

/// Summary of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Word width of the image.
    pub class: Class,
    /// Address the image was linked for.
    pub preferred_address: u64,
    /// Address the image was loaded at.
    pub load_address: u64,
    /// `load_address - preferred_address`, modulo 2^64.
    pub delta: u64,
    /// Entry address after loading.
    pub entry_point: u64,
    /// Segment placement counts.
    pub segments: SegmentStats,
    /// Relocation counts; all zero when the image did not move.
    pub relocations: RelocStats,
}

/// Loads the image in `mem` as `options` describe.
///
/// Classification, when enabled, and the address checks run before any byte
/// of the window is written.
///
/// # Errors
///
/// - [`LoadError::InvalidParameter`] for an empty image or window.
/// - [`LoadError::Unsupported`] if classification refuses the image.
/// - [`LoadError::AddressMismatch`] if a direct load states an expected
///   address other than the one the image was linked at. An image without
///   loadable segments is not linked anywhere and never mismatches.
/// - Any error of [`ImageContext::load`]. A direct load accepts an image with
///   nothing to place and reports its header entry.
pub fn load_image<M: ImageMemory + ?Sized>(
    mem: &mut M,
    options: &LoadOptions,
) -> Result<LoadReport, LoadError> {
    if mem.image().is_empty() {
        return Err(LoadError::InvalidParameter("empty image"));
    }
    if mem.window().is_empty() {
        return Err(LoadError::InvalidParameter("empty load window"));
    }
    if options.classify {
        let class = identify(mem.image()).map_err(LoadError::Unsupported)?;
        debug!("elf: classified as {class}");
    }

    let mut ctx = ImageContext::parse(mem.image())?;
    match options.placement {
        Placement::Direct { expected: Some(expected) }
            if ctx.image_size != 0 && expected != ctx.preferred_address =>
        {
            Err(LoadError::AddressMismatch { preferred: ctx.preferred_address, expected })
        }
        Placement::Direct { .. } => ctx.place(mem),
        Placement::Rebase { load_address } => {
            let mut ctx = ctx.with_image_address(load_address);
            ctx.load(mem)
        }
    }
}

/// Classifies and loads the image in `mem` at its own physical addresses and
/// returns the header entry point.
///
/// # Errors
///
/// See [`load_image`].
pub fn load_elf_image<M: ImageMemory + ?Sized>(
    mem: &mut M,
    expected: Option<u64>,
) -> Result<u64, LoadError> {
    load_image(mem, &LoadOptions::direct(expected)).map(|report| report.entry_point)
}
