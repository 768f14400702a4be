use std::io;

/// Number of architectural integer registers.
#[cfg(not(feature = "rv32e"))]
pub const REGISTER_COUNT: usize = 32;
/// Number of architectural integer registers (E variant).
#[cfg(feature = "rv32e")]
pub const REGISTER_COUNT: usize = 16;

/// The machine integer register file.
///
/// Register `x0` is hardwired to zero: reads always return 0 and writes are
/// architecturally discarded. Register indices come from 5-bit instruction
/// fields that the decoder has already bounds-checked, so access is
/// infallible.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    regs: [u32; REGISTER_COUNT],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            regs: [0; REGISTER_COUNT],
        }
    }
}

impl RegisterFile {
    /// Creates a register file with every register cleared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads register `index`; `x0` always reads as zero.
    #[must_use]
    pub const fn read(&self, index: u8) -> u32 {
        if index == 0 {
            0
        } else {
            self.regs[index as usize % REGISTER_COUNT]
        }
    }

    /// Writes register `index`; writes to `x0` are discarded.
    pub fn write(&mut self, index: u8, value: u32) {
        if index != 0 {
            self.regs[index as usize % REGISTER_COUNT] = value;
        }
    }

    /// Dumps all registers to `out`, four per line.
    ///
    /// # Errors
    ///
    /// Propagates write failures from the sink.
    pub fn describe(&self, out: &mut impl io::Write) -> io::Result<()> {
        for (index, value) in self.regs.iter().enumerate() {
            let separator = if index % 4 == 3 { '\n' } else { '\t' };
            write!(out, "x{index:02} = {value:08x}{separator}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::cast_possible_truncation)]
mod tests {
    use super::{RegisterFile, REGISTER_COUNT};

    #[test]
    fn register_zero_is_hardwired() {
        let mut regs = RegisterFile::new();
        regs.write(0, 0xDEAD_BEEF);
        assert_eq!(regs.read(0), 0);
    }

    #[test]
    fn registers_track_writes_independently() {
        let mut regs = RegisterFile::new();
        for index in 1..REGISTER_COUNT as u8 {
            regs.write(index, 0x100 + u32::from(index));
        }
        for index in 1..REGISTER_COUNT as u8 {
            assert_eq!(regs.read(index), 0x100 + u32::from(index));
        }
    }

    #[test]
    fn describe_emits_one_entry_per_register() {
        let mut out = Vec::new();
        RegisterFile::new().describe(&mut out).expect("in-memory sink");
        let text = String::from_utf8(out).expect("ascii dump");
        assert_eq!(text.matches("= 00000000").count(), REGISTER_COUNT);
        assert!(text.contains("x00"));
    }
}
