//! Byte-level builder for small ELF32/ELF64 test images.
//!
//! Layout: file header, program header table, segment bytes in order, section
//! bytes in order, the section-name table, then the section header table.
//! Section index 0 is the null section; added sections follow from index 1 and
//! the name table comes last.

#![allow(dead_code)]

use ember_elf::{Class, SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHT_REL, SHT_RELA};

const PT_LOAD: u32 = 1;
const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;

/// A program header entry and its file bytes.
#[derive(Debug, Clone)]
pub struct Seg {
    p_type: u32,
    paddr: u64,
    data: Vec<u8>,
    memsz: u64,
    offset: Option<u64>,
}

impl Seg {
    /// A `PT_LOAD` entry at `paddr` whose file bytes are `data`.
    pub fn load(paddr: u64, data: &[u8], memsz: u64) -> Self {
        Self { p_type: PT_LOAD, paddr, data: data.to_vec(), memsz, offset: None }
    }

    /// A non-loadable entry of type `p_type`.
    pub fn other(p_type: u32, paddr: u64) -> Self {
        Self { p_type, paddr, data: Vec::new(), memsz: 0x10, offset: None }
    }

    /// Records `offset` as the file offset instead of where the bytes land.
    /// The bytes are still appended.
    pub fn at_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// One relocation entry.
#[derive(Debug, Clone, Copy)]
pub struct Reloc {
    pub offset: u64,
    pub sym: u32,
    pub kind: u32,
    pub addend: i64,
}

impl Reloc {
    pub fn new(offset: u64, kind: u32) -> Self {
        Self { offset, sym: 0, kind, addend: 0 }
    }
}

#[derive(Debug, Clone)]
enum Body {
    Empty { size: u64 },
    Bytes(Vec<u8>),
    Relocs { with_addend: bool, entries: Vec<Reloc> },
}

/// A section header entry and its file bytes.
#[derive(Debug, Clone)]
pub struct Sec {
    name: &'static str,
    sh_type: u32,
    flags: u64,
    addr: u64,
    info: u32,
    entsize: Option<u64>,
    body: Body,
}

impl Sec {
    fn new(name: &'static str, sh_type: u32, flags: u64, addr: u64, body: Body) -> Self {
        Self { name, sh_type, flags, addr, info: 0, entsize: None, body }
    }

    /// Allocated, read-only, executable.
    pub fn code(name: &'static str, addr: u64, size: u64) -> Self {
        Self::new(name, SHT_PROGBITS, SHF_ALLOC | SHF_EXECINSTR, addr, Body::Empty { size })
    }

    /// Allocated and writable.
    pub fn data(name: &'static str, addr: u64, size: u64) -> Self {
        Self::new(name, SHT_PROGBITS, SHF_ALLOC | SHF_WRITE, addr, Body::Empty { size })
    }

    /// Not part of the runtime image.
    pub fn note(name: &'static str, bytes: &[u8]) -> Self {
        Self::new(name, SHT_PROGBITS, 0, 0, Body::Bytes(bytes.to_vec()))
    }

    /// `SHT_RELA` section patching section `target`.
    pub fn rela(name: &'static str, target: u32, entries: &[Reloc]) -> Self {
        let body = Body::Relocs { with_addend: true, entries: entries.to_vec() };
        Self { info: target, ..Self::new(name, SHT_RELA, 0, 0, body) }
    }

    /// `SHT_REL` section patching section `target`.
    pub fn rel(name: &'static str, target: u32, entries: &[Reloc]) -> Self {
        let body = Body::Relocs { with_addend: false, entries: entries.to_vec() };
        Self { info: target, ..Self::new(name, SHT_REL, 0, 0, body) }
    }

    /// Overrides the declared entry size.
    pub fn entsize(mut self, entsize: u64) -> Self {
        self.entsize = Some(entsize);
        self
    }
}

/// Assembles an ELF image from segments and sections.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    class: Class,
    e_type: u16,
    machine: u16,
    entry: u64,
    segments: Vec<Seg>,
    sections: Vec<Sec>,
}

impl ImageBuilder {
    pub fn elf64() -> Self {
        Self::new(Class::Elf64)
    }

    pub fn elf32() -> Self {
        Self::new(Class::Elf32)
    }

    fn new(class: Class) -> Self {
        Self {
            class,
            e_type: 2,
            machine: class.machine(),
            entry: 0x1000,
            segments: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn entry(mut self, entry: u64) -> Self {
        self.entry = entry;
        self
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn e_type(mut self, e_type: u16) -> Self {
        self.e_type = e_type;
        self
    }

    pub fn segment(mut self, seg: Seg) -> Self {
        self.segments.push(seg);
        self
    }

    pub fn section(mut self, sec: Sec) -> Self {
        self.sections.push(sec);
        self
    }

    fn sizes(&self) -> (usize, usize, usize) {
        match self.class {
            Class::Elf32 => (52, 32, 40),
            Class::Elf64 => (64, 56, 64),
        }
    }

    fn reloc_size(&self, with_addend: bool) -> u64 {
        match (self.class, with_addend) {
            (Class::Elf32, false) => 8,
            (Class::Elf32, true) => 12,
            (Class::Elf64, false) => 16,
            (Class::Elf64, true) => 24,
        }
    }

    fn word(&self, buf: &mut [u8], off: usize, value: u64) {
        match self.class {
            Class::Elf32 => put(buf, off, &(value as u32).to_le_bytes()),
            Class::Elf64 => put(buf, off, &value.to_le_bytes()),
        }
    }

    fn encode_reloc(&self, out: &mut Vec<u8>, r: &Reloc, with_addend: bool) {
        match self.class {
            Class::Elf32 => {
                out.extend_from_slice(&(r.offset as u32).to_le_bytes());
                out.extend_from_slice(&((r.sym << 8) | (r.kind & 0xff)).to_le_bytes());
                if with_addend {
                    out.extend_from_slice(&(r.addend as i32).to_le_bytes());
                }
            }
            Class::Elf64 => {
                out.extend_from_slice(&r.offset.to_le_bytes());
                let info = (u64::from(r.sym) << 32) | u64::from(r.kind);
                out.extend_from_slice(&info.to_le_bytes());
                if with_addend {
                    out.extend_from_slice(&r.addend.to_le_bytes());
                }
            }
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let (ehsize, phentsize, shentsize) = self.sizes();
        let phoff = ehsize;
        let mut buf = vec![0u8; ehsize + phentsize * self.segments.len()];

        // Program headers and segment bytes.
        for (i, seg) in self.segments.iter().enumerate() {
            let offset = seg.offset.unwrap_or(buf.len() as u64);
            buf.extend_from_slice(&seg.data);
            let at = phoff + i * phentsize;
            let filesz = seg.data.len() as u64;
            match self.class {
                Class::Elf32 => {
                    put(&mut buf, at, &seg.p_type.to_le_bytes());
                    self.word(&mut buf, at + 4, offset);
                    self.word(&mut buf, at + 8, seg.paddr);
                    self.word(&mut buf, at + 12, seg.paddr);
                    self.word(&mut buf, at + 16, filesz);
                    self.word(&mut buf, at + 20, seg.memsz);
                    put(&mut buf, at + 24, &7u32.to_le_bytes());
                    self.word(&mut buf, at + 28, 0x1000);
                }
                Class::Elf64 => {
                    put(&mut buf, at, &seg.p_type.to_le_bytes());
                    put(&mut buf, at + 4, &7u32.to_le_bytes());
                    self.word(&mut buf, at + 8, offset);
                    self.word(&mut buf, at + 16, seg.paddr);
                    self.word(&mut buf, at + 24, seg.paddr);
                    self.word(&mut buf, at + 32, filesz);
                    self.word(&mut buf, at + 40, seg.memsz);
                    self.word(&mut buf, at + 48, 0x1000);
                }
            }
        }

        // Section bytes and the name table.
        let mut shdrs = Vec::new();
        let mut names = vec![0u8];
        if !self.sections.is_empty() {
            for sec in &self.sections {
                let name = names.len() as u32;
                names.extend_from_slice(sec.name.as_bytes());
                names.push(0);

                let (offset, size, entsize) = match &sec.body {
                    Body::Empty { size } => (0, *size, 0),
                    Body::Bytes(bytes) => {
                        let offset = buf.len() as u64;
                        buf.extend_from_slice(bytes);
                        (offset, bytes.len() as u64, 0)
                    }
                    Body::Relocs { with_addend, entries } => {
                        let offset = buf.len() as u64;
                        for r in entries {
                            self.encode_reloc(&mut buf, r, *with_addend);
                        }
                        (offset, buf.len() as u64 - offset, self.reloc_size(*with_addend))
                    }
                };
                let entsize = sec.entsize.unwrap_or(entsize);
                shdrs.push((name, sec.sh_type, sec.flags, sec.addr, offset, size, sec.info, entsize));
            }
            let strtab_name = names.len() as u32;
            names.extend_from_slice(b".shstrtab\0");
            let strtab_off = buf.len() as u64;
            buf.extend_from_slice(&names);
            shdrs.push((strtab_name, SHT_STRTAB, 0, 0, strtab_off, names.len() as u64, 0, 0));
        }

        // Section header table, null entry first.
        let shoff = buf.len();
        let shnum = if shdrs.is_empty() { 0 } else { shdrs.len() + 1 };
        buf.resize(shoff + shnum * shentsize, 0);
        for (i, (name, sh_type, flags, addr, offset, size, info, entsize)) in
            shdrs.iter().copied().enumerate()
        {
            let at = shoff + (i + 1) * shentsize;
            put(&mut buf, at, &name.to_le_bytes());
            put(&mut buf, at + 4, &sh_type.to_le_bytes());
            match self.class {
                Class::Elf32 => {
                    self.word(&mut buf, at + 8, flags);
                    self.word(&mut buf, at + 12, addr);
                    self.word(&mut buf, at + 16, offset);
                    self.word(&mut buf, at + 20, size);
                    put(&mut buf, at + 28, &info.to_le_bytes());
                    self.word(&mut buf, at + 32, 4);
                    self.word(&mut buf, at + 36, entsize);
                }
                Class::Elf64 => {
                    self.word(&mut buf, at + 8, flags);
                    self.word(&mut buf, at + 16, addr);
                    self.word(&mut buf, at + 24, offset);
                    self.word(&mut buf, at + 32, size);
                    put(&mut buf, at + 44, &info.to_le_bytes());
                    self.word(&mut buf, at + 48, 8);
                    self.word(&mut buf, at + 56, entsize);
                }
            }
        }

        // File header.
        put(&mut buf, 0, b"\x7fELF");
        buf[4] = match self.class {
            Class::Elf32 => 1,
            Class::Elf64 => 2,
        };
        buf[5] = 1;
        buf[6] = 1;
        put(&mut buf, 16, &self.e_type.to_le_bytes());
        put(&mut buf, 18, &self.machine.to_le_bytes());
        put(&mut buf, 20, &1u32.to_le_bytes());
        let shoff = if shnum == 0 { 0 } else { shoff as u64 };
        let counts = [
            ehsize as u16,
            phentsize as u16,
            self.segments.len() as u16,
            shentsize as u16,
            shnum as u16,
            shnum.saturating_sub(1) as u16,
        ];
        let (fields, mut at) = match self.class {
            Class::Elf32 => (24, 40),
            Class::Elf64 => (24, 52),
        };
        let step = match self.class {
            Class::Elf32 => 4,
            Class::Elf64 => 8,
        };
        self.word(&mut buf, fields, self.entry);
        self.word(&mut buf, fields + step, phoff as u64);
        self.word(&mut buf, fields + 2 * step, shoff);
        for value in counts {
            put(&mut buf, at, &value.to_le_bytes());
            at += 2;
        }
        buf
    }
}

fn put(buf: &mut [u8], off: usize, bytes: &[u8]) {
    buf[off..off + bytes.len()].copy_from_slice(bytes);
}

/// File offset of the first segment's bytes.
pub fn first_segment_offset(class: Class, segments: usize) -> u64 {
    match class {
        Class::Elf32 => 52 + 32 * segments as u64,
        Class::Elf64 => 64 + 56 * segments as u64,
    }
}
