//! The destination window and the two image layouts the loader accepts.
//!
//! Every address the loader writes is translated through [`LoadWindow`], which
//! maps a physical address range onto a caller-provided byte slice and rejects
//! anything outside it. Nothing here dereferences a raw address.

use core::ops::Range;

use crate::error::LoadError;

/// A mutable byte slice standing in for physical memory starting at `base`.
#[derive(Debug)]
pub struct LoadWindow<'a> {
    base: u64,
    bytes: &'a mut [u8],
}

impl<'a> LoadWindow<'a> {
    /// Creates a window in which `bytes[0]` is at physical address `base`.
    #[must_use]
    pub fn new(base: u64, bytes: &'a mut [u8]) -> Self {
        Self { base, bytes }
    }

    /// Physical address of the first byte.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Window length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the window has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the whole window.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &*self.bytes
    }

    /// Translates `[addr, addr + len)` into a slice range.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfBounds`] unless the whole range lies in the
    /// window.
    pub fn range(&self, addr: u64, len: u64) -> Result<Range<usize>, LoadError> {
        let out = LoadError::OutOfBounds { addr, len };
        let start = addr.checked_sub(self.base).ok_or(out)?;
        let end = start.checked_add(len).ok_or(out)?;
        let start = usize::try_from(start).map_err(|_| out)?;
        let end = usize::try_from(end).map_err(|_| out)?;
        if end > self.bytes.len() {
            return Err(out);
        }
        Ok(start..end)
    }

    /// Returns the bytes at `[addr, addr + len)`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfBounds`] if the range leaves the window.
    pub fn read(&self, addr: u64, len: u64) -> Result<&[u8], LoadError> {
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    /// Reads a little-endian `u32` at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfBounds`] if the word leaves the window.
    pub fn read_u32(&self, addr: u64) -> Result<u32, LoadError> {
        let b = self.read(addr, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a little-endian `u64` at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfBounds`] if the word leaves the window.
    pub fn read_u64(&self, addr: u64) -> Result<u64, LoadError> {
        let mut word = [0u8; 8];
        word.copy_from_slice(self.read(addr, 8)?);
        Ok(u64::from_le_bytes(word))
    }

    /// Writes a little-endian `u32` at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfBounds`] if the word leaves the window.
    pub fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), LoadError> {
        let range = self.range(addr, 4)?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a little-endian `u64` at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfBounds`] if the word leaves the window.
    pub fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), LoadError> {
        let range = self.range(addr, 8)?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Zeroes `[addr, addr + len)`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfBounds`] if the range leaves the window.
    pub fn zero(&mut self, addr: u64, len: u64) -> Result<(), LoadError> {
        let range = self.range(addr, len)?;
        self.bytes[range].fill(0);
        Ok(())
    }

    /// Copies `src` to `addr`.
    fn copy_from(&mut self, addr: u64, src: &[u8]) -> Result<(), LoadError> {
        let range = self.range(addr, src.len() as u64)?;
        self.bytes[range].copy_from_slice(src);
        Ok(())
    }
}

/// Converts a file range of `image_len` bytes into a slice range.
fn file_range(offset: u64, size: u64, image_len: usize) -> Result<Range<usize>, LoadError> {
    let err = LoadError::FileRange { offset, size };
    let end = offset.checked_add(size).ok_or(err)?;
    if end > image_len as u64 {
        return Err(err);
    }
    let start = usize::try_from(offset).map_err(|_| err)?;
    let end = usize::try_from(end).map_err(|_| err)?;
    Ok(start..end)
}

/// Source image plus destination window, as seen by the loader.
///
/// The loader reads headers through [`image`](Self::image) one record at a
/// time and never holds that borrow across a write, so an image that lives
/// inside its own destination window works the same as a separate one.
pub trait ImageMemory {
    /// The raw ELF bytes.
    fn image(&self) -> &[u8];

    /// The destination window.
    fn window(&self) -> &LoadWindow<'_>;

    /// Copies `size` image bytes at file `offset` to address `dest`.
    ///
    /// # Errors
    ///
    /// [`LoadError::FileRange`] if the file range is outside the image and
    /// [`LoadError::OutOfBounds`] if the destination is outside the window.
    fn copy_segment(&mut self, offset: u64, size: u64, dest: u64) -> Result<(), LoadError>;

    /// Zeroes `[addr, addr + len)` in the window.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfBounds`] if the range leaves the window.
    fn zero(&mut self, addr: u64, len: u64) -> Result<(), LoadError>;

    /// Writes a little-endian `u32` into the window.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfBounds`] if the word leaves the window.
    fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), LoadError>;

    /// Writes a little-endian `u64` into the window.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfBounds`] if the word leaves the window.
    fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), LoadError>;
}

/// An image held in its own buffer, loaded into a separate window.
#[derive(Debug)]
pub struct SplitImage<'a> {
    image: &'a [u8],
    window: LoadWindow<'a>,
}

impl<'a> SplitImage<'a> {
    /// Pairs an image with the window it will be loaded into.
    #[must_use]
    pub fn new(image: &'a [u8], window: LoadWindow<'a>) -> Self {
        Self { image, window }
    }

    /// Releases the window.
    #[must_use]
    pub fn into_window(self) -> LoadWindow<'a> {
        self.window
    }
}

impl ImageMemory for SplitImage<'_> {
    fn image(&self) -> &[u8] {
        self.image
    }

    fn window(&self) -> &LoadWindow<'_> {
        &self.window
    }

    fn copy_segment(&mut self, offset: u64, size: u64, dest: u64) -> Result<(), LoadError> {
        let src = file_range(offset, size, self.image.len())?;
        self.window.copy_from(dest, &self.image[src])
    }

    fn zero(&mut self, addr: u64, len: u64) -> Result<(), LoadError> {
        self.window.zero(addr, len)
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), LoadError> {
        self.window.write_u32(addr, value)
    }

    fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), LoadError> {
        self.window.write_u64(addr, value)
    }
}

/// An image already resident inside the destination window.
///
/// Segment copies move bytes within the window with overlap-safe semantics; a
/// segment whose source and destination coincide is left in place. Segment
/// writes may overwrite header tables that later steps still read, so the
/// image bytes should not overlap any destination other than their own.
#[derive(Debug)]
pub struct ResidentImage<'a> {
    window: LoadWindow<'a>,
    image: Range<usize>,
}

impl<'a> ResidentImage<'a> {
    /// Describes an image of `len` bytes stored at address `addr` in `window`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfBounds`] if the image does not lie in the
    /// window.
    pub fn new(window: LoadWindow<'a>, addr: u64, len: u64) -> Result<Self, LoadError> {
        let image = window.range(addr, len)?;
        Ok(Self { window, image })
    }

    /// Releases the window.
    #[must_use]
    pub fn into_window(self) -> LoadWindow<'a> {
        self.window
    }
}

impl ImageMemory for ResidentImage<'_> {
    fn image(&self) -> &[u8] {
        &self.window.bytes[self.image.clone()]
    }

    fn window(&self) -> &LoadWindow<'_> {
        &self.window
    }

    fn copy_segment(&mut self, offset: u64, size: u64, dest: u64) -> Result<(), LoadError> {
        let src = file_range(offset, size, self.image.len())?;
        let src = src.start + self.image.start..src.end + self.image.start;
        let dst = self.window.range(dest, size)?;
        if src.start != dst.start {
            self.window.bytes.copy_within(src, dst.start);
        }
        Ok(())
    }

    fn zero(&mut self, addr: u64, len: u64) -> Result<(), LoadError> {
        self.window.zero(addr, len)
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), LoadError> {
        self.window.write_u32(addr, value)
    }

    fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), LoadError> {
        self.window.write_u64(addr, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_translates_addresses() {
        let mut bytes = [0u8; 0x20];
        let window = LoadWindow::new(0x1000, &mut bytes);
        assert_eq!(window.range(0x1000, 0x20), Ok(0..0x20));
        assert_eq!(window.range(0x1010, 4), Ok(0x10..0x14));
        assert_eq!(window.range(0x1020, 0), Ok(0x20..0x20));
    }

    #[test]
    fn window_rejects_outside_ranges() {
        let mut bytes = [0u8; 0x20];
        let window = LoadWindow::new(0x1000, &mut bytes);
        let below = window.range(0xFFF, 1);
        assert_eq!(below, Err(LoadError::OutOfBounds { addr: 0xFFF, len: 1 }));
        assert!(window.range(0x101D, 4).is_err());
        assert!(window.range(0x1000, u64::MAX).is_err());
        assert!(window.range(u64::MAX, 2).is_err());
    }

    #[test]
    fn window_words_are_little_endian() {
        let mut bytes = [0u8; 0x10];
        let mut window = LoadWindow::new(0, &mut bytes);
        window.write_u64(0, 0x1122_3344_5566_7788).unwrap();
        window.write_u32(8, 0xAABB_CCDD).unwrap();
        assert_eq!(window.read_u64(0), Ok(0x1122_3344_5566_7788));
        assert_eq!(window.read_u32(8), Ok(0xAABB_CCDD));
        assert_eq!(window.as_bytes()[0], 0x88);
        assert!(window.write_u64(0xC, 0).is_err());
    }

    #[test]
    fn split_copy_checks_both_ranges() {
        let image = [1u8, 2, 3, 4];
        let mut bytes = [0xFFu8; 8];
        let mut mem = SplitImage::new(&image, LoadWindow::new(0x100, &mut bytes));
        mem.copy_segment(1, 2, 0x104).unwrap();
        assert_eq!(
            mem.copy_segment(3, 2, 0x100),
            Err(LoadError::FileRange { offset: 3, size: 2 })
        );
        assert_eq!(
            mem.copy_segment(0, 4, 0x106),
            Err(LoadError::OutOfBounds { addr: 0x106, len: 4 })
        );
        mem.zero(0x100, 2).unwrap();
        assert_eq!(mem.window().as_bytes(), &[0, 0, 0xFF, 0xFF, 2, 3, 0xFF, 0xFF]);
    }

    #[test]
    fn resident_copy_moves_within_window() {
        let mut bytes = [0u8; 8];
        bytes[4..8].copy_from_slice(&[9, 8, 7, 6]);
        let mut mem = ResidentImage::new(LoadWindow::new(0x200, &mut bytes), 0x204, 4).unwrap();
        assert_eq!(mem.image(), &[9, 8, 7, 6]);
        // Overlapping move towards lower addresses.
        mem.copy_segment(0, 4, 0x202).unwrap();
        assert_eq!(mem.window().as_bytes(), &[0, 0, 9, 8, 7, 6, 7, 6]);
    }

    #[test]
    fn resident_copy_in_place_is_a_no_op() {
        let mut bytes = [5u8, 6, 7, 8];
        let mut mem = ResidentImage::new(LoadWindow::new(0, &mut bytes), 0, 4).unwrap();
        mem.copy_segment(0, 4, 0).unwrap();
        assert_eq!(mem.into_window().as_bytes(), &[5, 6, 7, 8]);
    }

    #[test]
    fn resident_image_must_fit() {
        let mut bytes = [0u8; 4];
        assert!(ResidentImage::new(LoadWindow::new(0, &mut bytes), 2, 4).is_err());
    }
}
