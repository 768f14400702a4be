//! ELF32 little-endian executable parsing.
//!
//! Accepts exactly the image shape produced for compliance tests: a
//! statically-linked `ET_EXEC` RISC-V binary with ascending `PT_LOAD`
//! segments and, optionally, a symbol table naming the signature and host
//! mailbox locations. Anything else is rejected outright; a rejected image
//! never yields a partially-loaded address space.

use thiserror::Error;

use super::{AddressSpace, WellKnownSymbol, WORD_BYTES};

const EHDR_SIZE: u32 = 52;
const PHDR_SIZE: u32 = 32;
const SHDR_SIZE: u32 = 40;
const SYM_SIZE: u32 = 16;

const ET_EXEC: u16 = 2;
const EM_RISCV: u16 = 243;
const EV_CURRENT: u32 = 1;
const PT_LOAD: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const STB_GLOBAL: u8 = 1;

// 0x7f "ELF", 32-bit class, little-endian data, current ident version.
const ELF32LE_IDENT: [u8; 16] = [
    0x7f, b'E', b'L', b'F', 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Reason an image was rejected at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ImageError {
    /// A header, table or segment lies beyond the end of the image bytes.
    #[error("image truncated reading {0}")]
    Truncated(&'static str),
    /// The identification bytes are not ELF32 little-endian.
    #[error("not an ELF32 little-endian image")]
    BadIdent,
    /// The object is not a statically-linked executable.
    #[error("unsupported object type {0:#06x}")]
    NotExecutable(u16),
    /// The object targets a machine other than RISC-V.
    #[error("unsupported machine {0:#06x}")]
    WrongMachine(u16),
    /// The object version field is not the current version.
    #[error("unsupported object version {0}")]
    WrongVersion(u32),
    /// A structure-size field in the header disagrees with ELF32 layout.
    #[error("unexpected {field} value {value}")]
    HeaderShape {
        /// Header field name.
        field: &'static str,
        /// Value found in the image.
        value: u32,
    },
    /// The entry point is the null address.
    #[error("entry point is zero")]
    ZeroEntryPoint,
    /// A loadable segment is zero-addressed, overlaps, or is out of order.
    #[error("bad loadable segment layout at address {addr:#010x}")]
    SegmentLayout {
        /// Virtual address of the offending segment.
        addr: u32,
    },
    /// A segment declares less memory than it has file bytes.
    #[error("segment at {addr:#010x}: memory size {memsz:#x} < file size {filesz:#x}")]
    SizeInversion {
        /// Virtual address of the offending segment.
        addr: u32,
        /// Declared memory size.
        memsz: u32,
        /// Declared file size.
        filesz: u32,
    },
    /// A segment alignment is not a power of two.
    #[error("segment at {addr:#010x}: alignment {align:#x} is not a power of two")]
    BadAlignment {
        /// Virtual address of the offending segment.
        addr: u32,
        /// Declared alignment.
        align: u32,
    },
    /// A segment's rounded extent wraps the 32-bit address space.
    #[error("segment at {addr:#010x} wraps the address space")]
    AddressWrap {
        /// Virtual address of the offending segment.
        addr: u32,
    },
    /// The image maps no memory at all.
    #[error("image has no loadable segments")]
    NoLoadableSegments,
    /// The symbol table or its string table is malformed.
    #[error("malformed symbol table: bad {0}")]
    BadSymbolTable(&'static str),
}

fn slice<'i>(image: &'i [u8], offset: u32, len: u32, what: &'static str) -> Result<&'i [u8], ImageError> {
    let start = offset as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or(ImageError::Truncated(what))?;
    image.get(start..end).ok_or(ImageError::Truncated(what))
}

fn read_u16(image: &[u8], offset: u32, what: &'static str) -> Result<u16, ImageError> {
    let bytes = slice(image, offset, 2, what)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(image: &[u8], offset: u32, what: &'static str) -> Result<u32, ImageError> {
    let bytes = slice(image, offset, 4, what)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn table_offset(base: u32, index: u32, entsize: u32, what: &'static str) -> Result<u32, ImageError> {
    index
        .checked_mul(entsize)
        .and_then(|skip| base.checked_add(skip))
        .ok_or(ImageError::Truncated(what))
}

fn load_segments(image: &[u8], header: &Header, space: &mut AddressSpace) -> Result<(), ImageError> {
    for segment in 0..u32::from(header.phnum) {
        let phdr = table_offset(header.phoff, segment, PHDR_SIZE, "program header")?;
        slice(image, phdr, PHDR_SIZE, "program header")?;
        let p_type = read_u32(image, phdr, "program header")?;
        let p_offset = read_u32(image, phdr + 4, "program header")?;
        let addr = read_u32(image, phdr + 8, "program header")?;
        let filesz = read_u32(image, phdr + 16, "program header")?;
        let memsz = read_u32(image, phdr + 20, "program header")?;
        let align = read_u32(image, phdr + 28, "program header")?;

        if p_type != PT_LOAD || memsz == 0 {
            continue;
        }
        if addr == 0 {
            return Err(ImageError::SegmentLayout { addr });
        }
        if let Some(previous) = space.regions.last() {
            // Strictly ascending and non-overlapping.
            if addr < previous.address + previous.size() {
                return Err(ImageError::SegmentLayout { addr });
            }
        }
        if memsz < filesz {
            return Err(ImageError::SizeInversion { addr, memsz, filesz });
        }
        if align > 1 && !align.is_power_of_two() {
            return Err(ImageError::BadAlignment { addr, align });
        }

        // Round the region up to the segment alignment, never below the
        // machine word, so aligned accesses to the tail stay in bounds.
        let unit = align.max(WORD_BYTES);
        let size = memsz
            .checked_add(unit - 1)
            .map(|extent| extent / unit * unit)
            .filter(|size| addr.checked_add(*size).is_some())
            .ok_or(ImageError::AddressWrap { addr })?;

        let file_bytes = slice(image, p_offset, filesz, "segment data")?;
        let mut data = vec![0_u8; size as usize].into_boxed_slice();
        data[..file_bytes.len()].copy_from_slice(file_bytes);
        space.push_region(addr, data);
    }

    if space.regions.is_empty() {
        return Err(ImageError::NoLoadableSegments);
    }
    Ok(())
}

/// Reads a NUL-terminated name out of the string table.
fn symbol_name(strings: &[u8], offset: u32) -> Result<&[u8], ImageError> {
    let tail = strings
        .get(offset as usize..)
        .ok_or(ImageError::BadSymbolTable("symbol name offset"))?;
    let end = tail
        .iter()
        .position(|byte| *byte == 0)
        .ok_or(ImageError::BadSymbolTable("symbol name terminator"))?;
    Ok(&tail[..end])
}

fn resolve_symbols(image: &[u8], header: &Header, space: &mut AddressSpace) -> Result<(), ImageError> {
    for section in 0..u32::from(header.shnum) {
        let shdr = table_offset(header.shoff, section, SHDR_SIZE, "section header")?;
        slice(image, shdr, SHDR_SIZE, "section header")?;
        if read_u32(image, shdr + 4, "section header")? != SHT_SYMTAB {
            continue;
        }
        let sym_offset = read_u32(image, shdr + 16, "section header")?;
        let sym_size = read_u32(image, shdr + 20, "section header")?;
        let link = read_u32(image, shdr + 24, "section header")?;
        let entsize = read_u32(image, shdr + 36, "section header")?;

        if entsize != SYM_SIZE || sym_size % SYM_SIZE != 0 {
            return Err(ImageError::BadSymbolTable("entry size"));
        }
        if link == 0 || link >= u32::from(header.shnum) {
            return Err(ImageError::BadSymbolTable("string table link"));
        }
        let strtab = table_offset(header.shoff, link, SHDR_SIZE, "section header")?;
        slice(image, strtab, SHDR_SIZE, "section header")?;
        if read_u32(image, strtab + 4, "section header")? != SHT_STRTAB {
            return Err(ImageError::BadSymbolTable("string table type"));
        }
        let str_offset = read_u32(image, strtab + 16, "section header")?;
        let str_size = read_u32(image, strtab + 20, "section header")?;
        let strings = slice(image, str_offset, str_size, "string table")?;

        for index in 0..sym_size / SYM_SIZE {
            let sym = table_offset(sym_offset, index, SYM_SIZE, "symbol table")?;
            slice(image, sym, SYM_SIZE, "symbol table")?;
            let info = slice(image, sym + 12, 1, "symbol table")?[0];
            if info >> 4 != STB_GLOBAL {
                continue;
            }
            let name = symbol_name(strings, read_u32(image, sym, "symbol table")?)?;
            let value = read_u32(image, sym + 4, "symbol table")?;
            for symbol in WellKnownSymbol::ALL {
                if name == symbol.name().as_bytes() {
                    space.set_symbol(symbol, value);
                    break;
                }
            }
        }
        // Only the first symbol table is consulted.
        break;
    }
    Ok(())
}

struct Header {
    phoff: u32,
    shoff: u32,
    phnum: u16,
    shnum: u16,
}

pub(super) fn parse(image: &[u8]) -> Result<AddressSpace, ImageError> {
    let ident = slice(image, 0, 16, "header")?;
    if ident != ELF32LE_IDENT {
        return Err(ImageError::BadIdent);
    }

    let e_type = read_u16(image, 16, "header")?;
    if e_type != ET_EXEC {
        return Err(ImageError::NotExecutable(e_type));
    }
    let machine = read_u16(image, 18, "header")?;
    if machine != EM_RISCV {
        return Err(ImageError::WrongMachine(machine));
    }
    let version = read_u32(image, 20, "header")?;
    if version != EV_CURRENT {
        return Err(ImageError::WrongVersion(version));
    }
    for (field, value, expected) in [
        ("e_ehsize", u32::from(read_u16(image, 40, "header")?), EHDR_SIZE),
        ("e_phentsize", u32::from(read_u16(image, 42, "header")?), PHDR_SIZE),
        ("e_shentsize", u32::from(read_u16(image, 46, "header")?), SHDR_SIZE),
    ] {
        if value != expected {
            return Err(ImageError::HeaderShape { field, value });
        }
    }

    let entry_point = read_u32(image, 24, "header")?;
    if entry_point == 0 {
        return Err(ImageError::ZeroEntryPoint);
    }

    let header = Header {
        phoff: read_u32(image, 28, "header")?,
        shoff: read_u32(image, 32, "header")?,
        phnum: read_u16(image, 44, "header")?,
        shnum: read_u16(image, 48, "header")?,
    };

    let mut space = AddressSpace::new(entry_point);
    load_segments(image, &header, &mut space)?;
    resolve_symbols(image, &header, &mut space)?;
    Ok(space)
}
