//! Flat physical address space assembled from a loaded program image.

/// ELF32 image parsing and validation.
pub mod loader;

pub use loader::ImageError;

use std::io;

use thiserror::Error;

use crate::fault::Fault;

/// Byte width of the machine word.
pub const WORD_BYTES: u32 = 4;

/// Linker symbols with architectural meaning to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum WellKnownSymbol {
    /// First byte of the compliance signature area.
    BeginSignature,
    /// One past the last byte of the compliance signature area.
    EndSignature,
    /// Host-to-target mailbox word.
    FromHost,
    /// Target-to-host mailbox word; non-zero means halt.
    ToHost,
}

impl WellKnownSymbol {
    /// Every recognised symbol, in resolution-table order.
    pub const ALL: [Self; 4] = [
        Self::BeginSignature,
        Self::EndSignature,
        Self::FromHost,
        Self::ToHost,
    ];

    /// The exact symbol name looked up in the image symbol table.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeginSignature => "begin_signature",
            Self::EndSignature => "end_signature",
            Self::FromHost => "fromhost",
            Self::ToHost => "tohost",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::BeginSignature => 0,
            Self::EndSignature => 1,
            Self::FromHost => 2,
            Self::ToHost => 3,
        }
    }
}

/// Failure while emitting the compliance signature.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// A signature boundary symbol is absent from the image symbol table.
    #[error("image does not define required symbol `{}`", .0.name())]
    Unresolved(WellKnownSymbol),
    /// The requested chunk width is not a supported access size.
    #[error("unsupported signature granularity {0}")]
    Granularity(u32),
    /// Reading the signature area violated the memory model.
    #[error(transparent)]
    Access(#[from] Fault),
    /// The output sink failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One contiguous loaded segment of the address space.
#[derive(Debug, Clone)]
struct Region {
    address: u32,
    data: Box<[u8]>,
}

impl Region {
    // Region sizes come from validated 32-bit segment headers.
    #[allow(clippy::cast_possible_truncation)]
    const fn size(&self) -> u32 {
        self.data.len() as u32
    }

    const fn contains(&self, addr: u32) -> bool {
        addr >= self.address && addr - self.address < self.size()
    }
}

/// The simulated physical address space.
///
/// Built exclusively by [`AddressSpace::load_image`]; regions are
/// non-overlapping and held in ascending address order, so lookups are a
/// binary search. All accesses are little-endian and must be aligned to
/// their own width.
#[derive(Debug, Clone)]
pub struct AddressSpace {
    entry_point: u32,
    regions: Vec<Region>,
    symbols: [Option<u32>; WellKnownSymbol::ALL.len()],
}

impl AddressSpace {
    /// Parses and validates an ELF32 image, producing the loaded address
    /// space.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError`] for any malformed or unsupported image; no
    /// partially-loaded address space is ever produced.
    pub fn load_image(image: &[u8]) -> Result<Self, ImageError> {
        loader::parse(image)
    }

    pub(crate) fn new(entry_point: u32) -> Self {
        Self {
            entry_point,
            regions: Vec::new(),
            symbols: [None; WellKnownSymbol::ALL.len()],
        }
    }

    /// The program entry point from the image header.
    #[must_use]
    pub const fn entry_point(&self) -> u32 {
        self.entry_point
    }

    /// Resolved address of a well-known symbol, if the image defines it.
    #[must_use]
    pub const fn symbol(&self, symbol: WellKnownSymbol) -> Option<u32> {
        self.symbols[symbol.index()]
    }

    pub(crate) fn push_region(&mut self, address: u32, data: Box<[u8]>) {
        self.regions.push(Region { address, data });
    }

    pub(crate) fn set_symbol(&mut self, symbol: WellKnownSymbol, address: u32) {
        self.symbols[symbol.index()] = Some(address);
    }

    /// Locates the region containing `addr`, if any.
    fn region_index(&self, addr: u32) -> Option<usize> {
        // Regions are sorted and disjoint: the candidate is the last region
        // whose base address is <= addr.
        let next = self.regions.partition_point(|region| region.address <= addr);
        let index = next.checked_sub(1)?;
        self.regions[index].contains(addr).then_some(index)
    }

    const fn check_access(addr: u32, size: u32) -> Result<(), Fault> {
        if !matches!(size, 1 | 2 | 4) {
            return Err(Fault::UnsupportedAccessSize { size });
        }
        if addr % size != 0 {
            return Err(Fault::MisalignedAccess { addr, size });
        }
        Ok(())
    }

    /// Reads `size` bytes at `addr` as a little-endian, zero-extended value.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is unmapped, misaligned, or of an
    /// unsupported width.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read(&self, addr: u32, size: u32) -> Result<u32, Fault> {
        Self::check_access(addr, size)?;
        let index = self
            .region_index(addr)
            .ok_or(Fault::UnmappedAccess { addr, size })?;
        let region = &self.regions[index];
        let offset = (addr - region.address) as usize;
        let end = offset + size as usize;
        if end > region.data.len() {
            return Err(Fault::UnmappedAccess { addr, size });
        }
        let mut value = 0_u32;
        for (shift, byte) in region.data[offset..end].iter().enumerate() {
            value |= u32::from(*byte) << (shift * 8);
        }
        Ok(value)
    }

    /// Writes the low `size` bytes of `value` at `addr`, little-endian.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is unmapped, misaligned, or of an
    /// unsupported width.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write(&mut self, addr: u32, size: u32, value: u32) -> Result<(), Fault> {
        Self::check_access(addr, size)?;
        let index = self
            .region_index(addr)
            .ok_or(Fault::UnmappedAccess { addr, size })?;
        let region = &mut self.regions[index];
        let offset = (addr - region.address) as usize;
        let end = offset + size as usize;
        if end > region.data.len() {
            return Err(Fault::UnmappedAccess { addr, size });
        }
        for (shift, byte) in region.data[offset..end].iter_mut().enumerate() {
            *byte = (value >> (shift * 8)) as u8;
        }
        Ok(())
    }

    /// Emits the compliance signature: one zero-padded hex line per
    /// `granularity`-byte chunk of `[begin_signature, end_signature)`.
    ///
    /// # Errors
    ///
    /// Fails when either boundary symbol is unresolved, the granularity is
    /// not 1, 2 or 4, the signature area is not readable, or the sink fails.
    pub fn dump_signature(
        &self,
        out: &mut impl io::Write,
        granularity: u32,
    ) -> Result<(), SignatureError> {
        if !matches!(granularity, 1 | 2 | 4) {
            return Err(SignatureError::Granularity(granularity));
        }
        let begin = self
            .symbol(WellKnownSymbol::BeginSignature)
            .ok_or(SignatureError::Unresolved(WellKnownSymbol::BeginSignature))?;
        let end = self
            .symbol(WellKnownSymbol::EndSignature)
            .ok_or(SignatureError::Unresolved(WellKnownSymbol::EndSignature))?;

        let width = match granularity {
            1 => 2,
            2 => 4,
            _ => 8,
        };
        let mut addr = begin;
        while addr < end {
            let chunk = self.read(addr, granularity)?;
            writeln!(out, "{chunk:0width$x}")?;
            addr += granularity;
        }
        Ok(())
    }

    /// Dumps the load map to `out`: entry point, resolved symbols, and each
    /// region's address, size and leading bytes.
    ///
    /// # Errors
    ///
    /// Propagates write failures from the sink.
    pub fn describe(&self, out: &mut impl io::Write) -> io::Result<()> {
        writeln!(out, "entry point: {:#010x}", self.entry_point)?;
        for symbol in WellKnownSymbol::ALL {
            let location = self
                .symbol(symbol)
                .map_or_else(|| "(unresolved)".to_owned(), |addr| format!("{addr:#010x}"));
            writeln!(out, "{}: {location}", symbol.name())?;
        }
        for region in &self.regions {
            write!(
                out,
                "region {:#010x} + {:#010x}:",
                region.address,
                region.size()
            )?;
            for byte in region.data.iter().take(8) {
                write!(out, " {byte:02x}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
