//! [`ElfFile`], the entry point for walking a parsed image.

use core::marker::PhantomData;

use crate::class::{Class, ElfClass};
use crate::header::{ELF_MAGIC, ElfError, ElfHeader};
use crate::program::ProgramHeaderIter;
use crate::reloc::{RelocIter, RelocTable};
use crate::section::{SectionHeader, SectionIter, StringTable};

/// A parsed ELF file of class `C`, holding a reference to the raw data and
/// the parsed header.
///
/// Parsing checks the structure only: magic, class and that the program
/// header table fits in `data`. Section headers are bounds-checked as they
/// are read; [`check_sections`](Self::check_sections) validates the whole
/// table up front. Whether the image is acceptable to the loader
/// (encoding, machine, type, version) is [`identify`](crate::identify)'s job.
#[derive(Debug, Clone, Copy)]
pub struct ElfFile<'a, C> {
    data: &'a [u8],
    header: ElfHeader,
    _class: PhantomData<C>,
}

impl<'a, C: ElfClass> ElfFile<'a, C> {
    /// Parse an ELF file of class `C` from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::BadMagic`] or [`ElfError::UnsupportedClass`] if
    /// the identification does not describe a `C` file, and
    /// [`ElfError::Truncated`] / [`ElfError::InvalidOffset`] if the header or
    /// the program header table do not fit in `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self, ElfError> {
        if data.get(..ELF_MAGIC.len()).ok_or(ElfError::Truncated)? != ELF_MAGIC {
            return Err(ElfError::BadMagic);
        }
        let header = C::parse_header(data)?;
        if Class::from_ident(header.class) != Some(C::CLASS) {
            return Err(ElfError::UnsupportedClass);
        }
        header.check_program_table::<C>(data.len())?;
        Ok(Self { data, header, _class: PhantomData })
    }

    /// Returns the parsed file header.
    #[must_use]
    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    /// Returns the virtual address of the entry point.
    #[must_use]
    pub fn entry_point(&self) -> u64 {
        self.header.e_entry
    }

    /// Returns the raw file bytes.
    #[must_use]
    pub fn raw_data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns an iterator over every program header, in table order.
    #[must_use]
    pub fn program_headers(&self) -> ProgramHeaderIter<'a, C> {
        ProgramHeaderIter::new(self.data, self.header)
    }

    /// Validates the section header table against the file length.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] if the table does not fit in the
    /// file or `e_shentsize` is too small.
    pub fn check_sections(&self) -> Result<(), ElfError> {
        self.header.check_section_table::<C>(self.data.len())
    }

    /// Returns an iterator over `(index, header)` for every section.
    ///
    /// Empty if the file has no section header table.
    #[must_use]
    pub fn sections(&self) -> SectionIter<'a, C> {
        SectionIter::new(self.data, self.header)
    }

    /// Returns the section header at `index`, or `None` if `index` is not
    /// below the section count.
    #[must_use]
    pub fn section_by_index(&self, index: usize) -> Option<SectionHeader> {
        self.header.section_header::<C>(self.data, index).ok()
    }

    /// Returns the file bytes of a section, or `None` if they are out of
    /// bounds.
    #[must_use]
    pub fn section_data(&self, shdr: &SectionHeader) -> Option<&'a [u8]> {
        let start = usize::try_from(shdr.sh_offset).ok()?;
        let size = usize::try_from(shdr.sh_size).ok()?;
        self.data.get(start..start.checked_add(size)?)
    }

    /// Returns the first section whose name is `name`.
    #[must_use]
    pub fn section_by_name(&self, name: &str) -> Option<SectionHeader> {
        let strtab = self.section_names()?;
        self.sections()
            .map(|(_, shdr)| shdr)
            .find(|shdr| strtab.get(shdr.sh_name) == Some(name))
    }

    /// Returns the name of `shdr`, looked up in the section-name table.
    #[must_use]
    pub fn section_name(&self, shdr: &SectionHeader) -> Option<&'a str> {
        self.section_names()?.get(shdr.sh_name)
    }

    /// Returns an iterator over `(index, header)` for every `SHT_REL` and
    /// `SHT_RELA` section.
    pub fn reloc_sections(&self) -> impl Iterator<Item = (usize, SectionHeader)> + 'a {
        self.sections().filter(|(_, shdr)| shdr.is_relocation())
    }

    /// Returns an iterator over the entries of a relocation section.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] if the section is not a relocation
    /// section, its entry size cannot hold the record, or its entries do not
    /// lie within the file.
    pub fn reloc_entries(&self, shdr: &SectionHeader) -> Result<RelocIter<'a, C>, ElfError> {
        let table = RelocTable::new::<C>(shdr, self.data.len())?;
        Ok(RelocIter::new(self.data, table))
    }

    fn section_names(&self) -> Option<StringTable<'a>> {
        let shdr = self.section_by_index(self.header.e_shstrndx.into())?;
        self.section_data(&shdr).map(StringTable::new)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::class::{ELF64_EHDR_SIZE, ELF64_PHDR_SIZE, ELF64_SHDR_SIZE, Elf32, Elf64};
    use crate::header::le_u16;
    use crate::header::tests::{append_phdr64, make_elf32_header, make_elf64_header};
    use crate::program::PT_LOAD;
    use crate::reloc::R_X86_64_64;
    use crate::section::{SHF_ALLOC, SHF_EXECINSTR, SHT_PROGBITS, SHT_RELA, SHT_STRTAB};

    /// Append an ELF64 section header, updating `e_shoff` on the first call
    /// and bumping `e_shnum`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn append_shdr64(
        buf: &mut Vec<u8>,
        sh_name: u32,
        sh_type: u32,
        sh_flags: u64,
        sh_addr: u64,
        sh_offset: u64,
        sh_size: u64,
        sh_info: u32,
        sh_entsize: u64,
    ) {
        let shnum = le_u16(buf, 60).unwrap();
        if shnum == 0 {
            let shoff = buf.len() as u64;
            buf[40..48].copy_from_slice(&shoff.to_le_bytes());
        }

        let start = buf.len();
        buf.resize(start + ELF64_SHDR_SIZE, 0);
        let b = &mut buf[start..];
        b[0..4].copy_from_slice(&sh_name.to_le_bytes());
        b[4..8].copy_from_slice(&sh_type.to_le_bytes());
        b[8..16].copy_from_slice(&sh_flags.to_le_bytes());
        b[16..24].copy_from_slice(&sh_addr.to_le_bytes());
        b[24..32].copy_from_slice(&sh_offset.to_le_bytes());
        b[32..40].copy_from_slice(&sh_size.to_le_bytes());
        // sh_link at 40..44
        b[44..48].copy_from_slice(&sh_info.to_le_bytes());
        b[48..56].copy_from_slice(&8u64.to_le_bytes());
        b[56..64].copy_from_slice(&sh_entsize.to_le_bytes());

        buf[60..62].copy_from_slice(&(shnum + 1).to_le_bytes());
    }

    /// ELF64 image: one PT_LOAD, a `.text` section, a `.rela.text` section
    /// with one entry and a section-name table (index 3).
    fn make_elf64_with_sections() -> Vec<u8> {
        let mut buf = make_elf64_header();
        let data_off = (ELF64_EHDR_SIZE + ELF64_PHDR_SIZE) as u64;
        append_phdr64(&mut buf, PT_LOAD, data_off, 0x1000, 0x1000, 0x10, 0x10);
        buf.extend_from_slice(&[0x90; 0x10]);

        let rela_off = buf.len() as u64;
        buf.extend_from_slice(&0x1008u64.to_le_bytes());
        buf.extend_from_slice(&u64::from(R_X86_64_64).to_le_bytes());
        buf.extend_from_slice(&0i64.to_le_bytes());

        let names_off = buf.len() as u64;
        let names = b"\0.text\0.rela.text\0.shstrtab\0";
        buf.extend_from_slice(names);

        append_shdr64(&mut buf, 0, 0, 0, 0, 0, 0, 0, 0);
        append_shdr64(&mut buf, 1, SHT_PROGBITS, SHF_ALLOC | SHF_EXECINSTR, 0x1000, data_off, 0x10, 0, 0);
        append_shdr64(&mut buf, 7, SHT_RELA, 0, 0, rela_off, 24, 1, 24);
        append_shdr64(&mut buf, 18, SHT_STRTAB, 0, 0, names_off, names.len() as u64, 0, 0);
        buf[62..64].copy_from_slice(&3u16.to_le_bytes());
        buf
    }

    #[test]
    fn parse_valid_elf_file() {
        let buf = make_elf64_header();
        let elf = ElfFile::<Elf64>::parse(&buf).expect("valid ELF");
        assert_eq!(elf.entry_point(), 0x0040_1000);
        assert_eq!(elf.program_headers().count(), 0);
        assert_eq!(elf.sections().count(), 0);
    }

    #[test]
    fn parse_rejects_wrong_class() {
        let buf = make_elf32_header();
        assert_eq!(ElfFile::<Elf64>::parse(&buf).err(), Some(ElfError::UnsupportedClass));
        assert!(ElfFile::<Elf32>::parse(&buf).is_ok());
    }

    #[test]
    fn parse_rejects_invalid_data() {
        assert_eq!(ElfFile::<Elf64>::parse(&[]).err(), Some(ElfError::Truncated));
        assert_eq!(ElfFile::<Elf64>::parse(&[0u8; 64]).err(), Some(ElfError::BadMagic));
    }

    #[test]
    fn parse_rejects_phdr_out_of_bounds() {
        let mut buf = make_elf64_header();
        buf[56..58].copy_from_slice(&1u16.to_le_bytes());
        assert_eq!(ElfFile::<Elf64>::parse(&buf).err(), Some(ElfError::InvalidOffset));
    }

    #[test]
    fn section_table_is_checked_on_demand() {
        let mut buf = make_elf64_header();
        buf[40..48].copy_from_slice(&0x10_0000u64.to_le_bytes());
        buf[60..62].copy_from_slice(&1u16.to_le_bytes());
        let elf = ElfFile::<Elf64>::parse(&buf).unwrap();
        assert_eq!(elf.check_sections(), Err(ElfError::InvalidOffset));
        assert_eq!(elf.sections().count(), 0);
        assert!(elf.section_by_name(".text").is_none());

        let image = make_elf64_with_sections();
        let elf = ElfFile::<Elf64>::parse(&image).unwrap();
        assert_eq!(elf.check_sections(), Ok(()));
    }

    #[test]
    fn program_headers_in_table_order() {
        let mut buf = make_elf64_header();
        append_phdr64(&mut buf, 4, 0, 0, 0, 0, 0); // PT_NOTE
        append_phdr64(&mut buf, PT_LOAD, 0, 0x2000, 0x3000, 0, 0x100);
        let elf = ElfFile::<Elf64>::parse(&buf).unwrap();
        let phdrs: Vec<_> = elf.program_headers().collect();
        assert_eq!(phdrs.len(), 2);
        assert!(!phdrs[0].is_loadable());
        assert!(phdrs[1].is_loadable());
        assert_eq!(phdrs[1].p_paddr, 0x3000);
    }

    #[test]
    fn program_headers_use_declared_entsize() {
        // Two PT_LOAD entries padded to a 64-byte stride.
        let mut buf = make_elf64_header();
        buf[54..56].copy_from_slice(&64u16.to_le_bytes());
        for paddr in [0x1000u64, 0x2000] {
            append_phdr64(&mut buf, PT_LOAD, 0, paddr, paddr, 0, 0x10);
            buf.extend_from_slice(&[0xAB; 8]);
        }
        let elf = ElfFile::<Elf64>::parse(&buf).unwrap();
        let paddrs: Vec<_> = elf.program_headers().map(|p| p.p_paddr).collect();
        assert_eq!(paddrs, [0x1000, 0x2000]);
    }

    #[test]
    fn section_lookup() {
        let buf = make_elf64_with_sections();
        let elf = ElfFile::<Elf64>::parse(&buf).unwrap();

        assert_eq!(elf.sections().count(), 4);
        let text = elf.section_by_name(".text").expect(".text present");
        assert_eq!(text.sh_addr, 0x1000);
        assert_eq!(elf.section_name(&text), Some(".text"));
        assert!(elf.section_by_name(".data").is_none());
        assert!(elf.section_by_index(4).is_none());
        assert_eq!(elf.section_by_index(1), Some(text));
    }

    #[test]
    fn reloc_sections_and_entries() {
        let buf = make_elf64_with_sections();
        let elf = ElfFile::<Elf64>::parse(&buf).unwrap();

        let relocs: Vec<_> = elf.reloc_sections().collect();
        assert_eq!(relocs.len(), 1);
        let (index, rela) = relocs[0];
        assert_eq!(index, 2);
        assert_eq!(rela.sh_info, 1);

        let entries: Vec<_> = elf.reloc_entries(&rela).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].r_offset, 0x1008);
        assert_eq!(entries[0].r_type, R_X86_64_64);
        assert_eq!(entries[0].r_addend, Some(0));
    }

    #[test]
    fn reloc_entries_rejects_other_sections() {
        let buf = make_elf64_with_sections();
        let elf = ElfFile::<Elf64>::parse(&buf).unwrap();
        let text = elf.section_by_index(1).unwrap();
        assert!(elf.reloc_entries(&text).is_err());
    }

    #[test]
    fn section_data_bounds_check() {
        let buf = make_elf64_with_sections();
        let elf = ElfFile::<Elf64>::parse(&buf).unwrap();
        let mut text = elf.section_by_index(1).unwrap();
        assert_eq!(elf.section_data(&text), Some(&[0x90u8; 0x10][..]));
        text.sh_size = u64::MAX;
        assert_eq!(elf.section_data(&text), None);
    }
}
