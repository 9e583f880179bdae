//! Human-readable reports printed to stdout.

use ember_elf::{Class, Elf32, Elf64, ElfClass, ElfError, ElfFile, ElfType, SectionHeader, identify};
use ember_loader::{ImageContext, LoadReport};

/// A relocation section as listed in the image report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocSection {
    /// Section name, or `?` if it has none.
    pub name: String,
    /// Name of the section it patches, or `?`.
    pub target: String,
    /// Number of entries.
    pub entries: usize,
}

/// Lists every relocation section of `image` with its target.
pub fn reloc_sections(image: &[u8], class: Class) -> Result<Vec<RelocSection>, ElfError> {
    match class {
        Class::Elf32 => reloc_sections_as::<Elf32>(image),
        Class::Elf64 => reloc_sections_as::<Elf64>(image),
    }
}

fn reloc_sections_as<C: ElfClass>(image: &[u8]) -> Result<Vec<RelocSection>, ElfError> {
    let elf = ElfFile::<C>::parse(image)?;
    let name_of = |shdr: SectionHeader| elf.section_name(&shdr).unwrap_or("?").to_owned();
    elf.reloc_sections()
        .map(|(_, shdr)| {
            let target = usize::try_from(shdr.sh_info)
                .ok()
                .and_then(|i| elf.section_by_index(i))
                .map_or_else(|| "?".to_owned(), name_of);
            Ok(RelocSection {
                name: name_of(shdr),
                target,
                entries: elf.reloc_entries(&shdr)?.count(),
            })
        })
        .collect()
}

/// Returns the address of the section called `name`, if the image has one.
pub fn section_address(image: &[u8], class: Class, name: &str) -> Option<u64> {
    fn lookup<C: ElfClass>(image: &[u8], name: &str) -> Option<u64> {
        ElfFile::<C>::parse(image).ok()?.section_by_name(name).map(|s| s.sh_addr)
    }
    match class {
        Class::Elf32 => lookup::<Elf32>(image, name),
        Class::Elf64 => lookup::<Elf64>(image, name),
    }
}

fn type_name(elf_type: ElfType) -> String {
    match elf_type {
        ElfType::Rel => "REL".into(),
        ElfType::Exec => "EXEC".into(),
        ElfType::Dyn => "DYN".into(),
        ElfType::Other(raw) => format!("{raw:#x}"),
    }
}

/// Prints the classifier verdict.
pub fn print_classification(image: &[u8]) {
    match identify(image) {
        Ok(class) => println!("classification: {class} x86 image, accepted"),
        Err(e) => println!("classification: rejected ({e})"),
    }
}

/// Prints the image description and its relocation sections.
pub fn print_image(ctx: &ImageContext, image: &[u8]) {
    println!("  class          {}", ctx.class);
    println!("  machine        {}", ctx.machine);
    println!("  type           {}", type_name(ctx.elf_type));
    println!("  file size      {:#x}", ctx.file_size);
    println!("  preferred at   {:#x}", ctx.preferred_address);
    println!("  image size     {:#x}", ctx.image_size);
    println!("  header entry   {:#x}", ctx.entry);
    if let Some(addr) = section_address(image, ctx.class, ".text") {
        println!("  .text at       {addr:#x}");
    }

    match reloc_sections(image, ctx.class) {
        Ok(sections) if sections.is_empty() => println!("  no relocation sections"),
        Ok(sections) => {
            for s in sections {
                println!("  {:<14} {} entries for {}", s.name, s.entries, s.target);
            }
        }
        Err(e) => println!("  relocation sections unreadable ({e})"),
    }
}

/// Prints what a load did.
pub fn print_load(report: &LoadReport) {
    let segs = &report.segments;
    let relocs = &report.relocations;
    println!("loaded at {:#x} (delta {:#x})", report.load_address, report.delta);
    println!(
        "  segments       {} placed, {} skipped, {:#x} copied, {:#x} zeroed",
        segs.placed, segs.skipped, segs.copied, segs.zeroed
    );
    println!(
        "  relocations    {} patched, {} no-op, {} unknown, {} of {} sections skipped",
        relocs.patched, relocs.no_op, relocs.unknown, relocs.skipped_sections, relocs.sections
    );
    println!("  entry point    {:#x}", report.entry_point);
}
