//! ELF stage loader and relocator for x86 boot firmware.
//!
//! Takes a raw ELF32/ELF64 image that is already in memory, copies its
//! loadable segments into a destination window and, when the window address
//! differs from the address the image was linked for, patches its absolute
//! address fixups by that single delta.
//!
//! Two call shapes share one segment loader:
//!
//! - [`load_elf_image`] classifies the image, places every segment at its
//!   physical address and returns the header entry point.
//! - [`ImageContext::load`] places the image at a caller-chosen address,
//!   relocates it and records the rebased entry point.
//!
//! [`load_image`] takes a [`LoadOptions`] covering both. All destination
//! writes go through a bounds-checked [`LoadWindow`]; the image may sit in its
//! own buffer ([`SplitImage`]) or inside the window ([`ResidentImage`]).
//!
//! # Example
//!
//! ```
//! use ember_loader::{ImageContext, LoadWindow, SplitImage};
//!
//! fn boot(image: &[u8], ram: &mut [u8], ram_base: u64) -> Option<u64> {
//!     let mut ctx = ImageContext::parse(image).ok()?.with_image_address(ram_base);
//!     let mut mem = SplitImage::new(image, LoadWindow::new(ram_base, ram));
//!     ctx.load(&mut mem).ok()?;
//!     ctx.entry_point
//! }
//! ```
//!
//! Progress is reported through the [`log`] facade.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod loader;
pub mod memory;
pub mod relocate;
pub mod segment;

#[cfg(test)]
#[path = "../tests/testimg/mod.rs"]
mod testimg;

pub use context::ImageContext;
pub use error::{LoadError, Status};
pub use loader::{LoadOptions, LoadReport, Placement, load_elf_image, load_image};
pub use memory::{ImageMemory, LoadWindow, ResidentImage, SplitImage};
pub use relocate::{Fixup, RelocStats, Relocator, check_machine, check_relocatable, relocate};
pub use segment::{SegmentStats, load_segments};
