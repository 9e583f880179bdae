//! Loader errors and the coarse status each one reports.

use core::fmt;

use ember_elf::ElfError;

/// Terminal outcome of a load, as reported to firmware callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The image was loaded (and relocated, if needed).
    Success,
    /// The caller passed an unusable argument.
    InvalidParameter,
    /// The image is not an x86 ELF executable this loader accepts.
    Unsupported,
    /// The image was accepted but could not be placed.
    LoadError,
}

impl Status {
    /// Maps the result of a load call to its status.
    #[must_use]
    pub fn of<T>(result: &Result<T, LoadError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(e) => e.status(),
        }
    }

    /// Short name used in diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::InvalidParameter => "invalid parameter",
            Self::Unsupported => "unsupported",
            Self::LoadError => "load error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur while loading or relocating an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// An argument is empty or zero-sized.
    InvalidParameter(&'static str),
    /// Classification or the relocation machine gate refused the image.
    Unsupported(ElfError),
    /// A header table or relocation section is malformed.
    Malformed(ElfError),
    /// A loadable segment declares more file bytes than memory bytes.
    SegmentSize {
        /// Program header index.
        index: usize,
        /// Declared file size.
        file_size: u64,
        /// Declared memory size.
        mem_size: u64,
    },
    /// A segment's file range lies outside the image.
    FileRange {
        /// File offset of the range.
        offset: u64,
        /// Length of the range.
        size: u64,
    },
    /// A destination range lies outside the load window.
    OutOfBounds {
        /// First address of the range.
        addr: u64,
        /// Length of the range.
        len: u64,
    },
    /// The image was linked for a different address than the caller expected.
    AddressMismatch {
        /// Lowest loadable physical address declared by the image.
        preferred: u64,
        /// Address the caller stated.
        expected: u64,
    },
}

impl LoadError {
    /// The status this error reports.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidParameter(_) => Status::InvalidParameter,
            Self::Unsupported(_) => Status::Unsupported,
            Self::Malformed(_)
            | Self::SegmentSize { .. }
            | Self::FileRange { .. }
            | Self::OutOfBounds { .. }
            | Self::AddressMismatch { .. } => Status::LoadError,
        }
    }
}

impl From<ElfError> for LoadError {
    fn from(e: ElfError) -> Self {
        if e.is_unsupported() { Self::Unsupported(e) } else { Self::Malformed(e) }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter(what) => write!(f, "invalid parameter: {what}"),
            Self::Unsupported(e) => write!(f, "unsupported image: {e}"),
            Self::Malformed(e) => write!(f, "malformed image: {e}"),
            Self::SegmentSize { index, file_size, mem_size } => write!(
                f,
                "segment {index}: file size {file_size:#x} exceeds memory size {mem_size:#x}"
            ),
            Self::FileRange { offset, size } => {
                write!(f, "file range {offset:#x}+{size:#x} lies outside the image")
            }
            Self::OutOfBounds { addr, len } => {
                write!(f, "range {addr:#x}+{len:#x} lies outside the load window")
            }
            Self::AddressMismatch { preferred, expected } => write!(
                f,
                "image linked at {preferred:#x} but expected at {expected:#x}"
            ),
        }
    }
}
