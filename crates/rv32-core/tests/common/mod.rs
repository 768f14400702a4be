//! Shared helpers: an in-memory ELF32 image builder and RV32I encoders.

#![allow(dead_code, clippy::cast_sign_loss, clippy::cast_possible_truncation)]

const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;
const SHDR_SIZE: usize = 40;
const SYM_SIZE: usize = 16;

struct Segment {
    addr: u32,
    data: Vec<u8>,
    memsz: u32,
    align: u32,
}

/// Builds minimal but fully valid RISC-V ELF32 executables for load tests.
pub struct ElfBuilder {
    entry: u32,
    machine: u16,
    object_type: u16,
    segments: Vec<Segment>,
    symbols: Vec<(String, u32)>,
}

impl ElfBuilder {
    pub fn new(entry: u32) -> Self {
        Self {
            entry,
            machine: 243, // EM_RISCV
            object_type: 2, // ET_EXEC
            segments: Vec::new(),
            symbols: Vec::new(),
        }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn object_type(mut self, object_type: u16) -> Self {
        self.object_type = object_type;
        self
    }

    pub fn segment(self, addr: u32, data: &[u8]) -> Self {
        let memsz = data.len() as u32;
        self.segment_with(addr, data, memsz, 4)
    }

    pub fn segment_with(mut self, addr: u32, data: &[u8], memsz: u32, align: u32) -> Self {
        self.segments.push(Segment {
            addr,
            data: data.to_vec(),
            memsz,
            align,
        });
        self
    }

    /// Adds a code segment from instruction words.
    pub fn text(self, addr: u32, words: &[u32]) -> Self {
        let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
        self.segment(addr, &bytes)
    }

    /// Adds a globally-bound symbol.
    pub fn symbol(mut self, name: &str, value: u32) -> Self {
        self.symbols.push((name.to_owned(), value));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let phnum = self.segments.len();
        let shnum = if self.symbols.is_empty() { 0 } else { 3 };
        let phoff = EHDR_SIZE;
        let shoff = phoff + phnum * PHDR_SIZE;
        let mut body_offset = shoff + shnum * SHDR_SIZE;

        let mut image = vec![0_u8; body_offset];

        // e_ident: ELF32, little-endian, current version.
        image[..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        image[4] = 1;
        image[5] = 1;
        image[6] = 1;
        put_u16(&mut image, 16, self.object_type);
        put_u16(&mut image, 18, self.machine);
        put_u32(&mut image, 20, 1); // EV_CURRENT
        put_u32(&mut image, 24, self.entry);
        put_u32(&mut image, 28, phoff as u32);
        put_u32(&mut image, 32, if shnum == 0 { 0 } else { shoff as u32 });
        put_u16(&mut image, 40, EHDR_SIZE as u16);
        put_u16(&mut image, 42, PHDR_SIZE as u16);
        put_u16(&mut image, 44, phnum as u16);
        put_u16(&mut image, 46, SHDR_SIZE as u16);
        put_u16(&mut image, 48, shnum as u16);

        for (index, segment) in self.segments.iter().enumerate() {
            let phdr = phoff + index * PHDR_SIZE;
            put_u32(&mut image, phdr, 1); // PT_LOAD
            put_u32(&mut image, phdr + 4, body_offset as u32);
            put_u32(&mut image, phdr + 8, segment.addr);
            put_u32(&mut image, phdr + 12, segment.addr);
            put_u32(&mut image, phdr + 16, segment.data.len() as u32);
            put_u32(&mut image, phdr + 20, segment.memsz);
            put_u32(&mut image, phdr + 28, segment.align);
            image.extend_from_slice(&segment.data);
            body_offset += segment.data.len();
        }

        if !self.symbols.is_empty() {
            let mut symtab = Vec::new();
            let mut strtab = vec![0_u8];
            for (name, value) in &self.symbols {
                let name_offset = strtab.len() as u32;
                strtab.extend_from_slice(name.as_bytes());
                strtab.push(0);

                let entry = symtab.len();
                symtab.resize(entry + SYM_SIZE, 0);
                put_u32(&mut symtab, entry, name_offset);
                put_u32(&mut symtab, entry + 4, *value);
                symtab[entry + 12] = 1 << 4; // STB_GLOBAL
            }

            let symtab_offset = body_offset;
            let strtab_offset = symtab_offset + symtab.len();

            // Section 0 stays null; 1 is the symtab, 2 its strtab.
            let symtab_shdr = shoff + SHDR_SIZE;
            put_u32(&mut image, symtab_shdr + 4, 2); // SHT_SYMTAB
            put_u32(&mut image, symtab_shdr + 16, symtab_offset as u32);
            put_u32(&mut image, symtab_shdr + 20, symtab.len() as u32);
            put_u32(&mut image, symtab_shdr + 24, 2); // sh_link -> strtab
            put_u32(&mut image, symtab_shdr + 36, SYM_SIZE as u32);

            let strtab_shdr = shoff + 2 * SHDR_SIZE;
            put_u32(&mut image, strtab_shdr + 4, 3); // SHT_STRTAB
            put_u32(&mut image, strtab_shdr + 16, strtab_offset as u32);
            put_u32(&mut image, strtab_shdr + 20, strtab.len() as u32);

            image.extend_from_slice(&symtab);
            image.extend_from_slice(&strtab);
        }

        image
    }
}

fn put_u16(image: &mut [u8], offset: usize, value: u16) {
    image[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(image: &mut [u8], offset: usize, value: u32) {
    image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

// RV32I encoders.

fn encode_i(opcode5: u32, rd: u32, f3: u32, rs1: u32, imm: i32) -> u32 {
    (((imm as u32) & 0xFFF) << 20) | (rs1 << 15) | (f3 << 12) | (rd << 7) | (opcode5 << 2) | 0b11
}

fn encode_s(f3: u32, rs1: u32, rs2: u32, imm: i32) -> u32 {
    let imm = imm as u32 & 0xFFF;
    ((imm & 0xFE0) << 20)
        | (rs2 << 20)
        | (rs1 << 15)
        | (f3 << 12)
        | ((imm & 0x1F) << 7)
        | (0x08 << 2)
        | 0b11
}

fn encode_r(rd: u32, f3: u32, rs1: u32, rs2: u32, funct7: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (f3 << 12) | (rd << 7) | (0x0C << 2) | 0b11
}

pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    encode_i(0x04, rd, 0b000, rs1, imm)
}

pub fn xori(rd: u32, rs1: u32, imm: i32) -> u32 {
    encode_i(0x04, rd, 0b100, rs1, imm)
}

pub fn srai(rd: u32, rs1: u32, shamt: u32) -> u32 {
    encode_i(0x04, rd, 0b101, rs1, (shamt | 0x400) as i32)
}

pub fn add(rd: u32, rs1: u32, rs2: u32) -> u32 {
    encode_r(rd, 0b000, rs1, rs2, 0)
}

pub fn sub(rd: u32, rs1: u32, rs2: u32) -> u32 {
    encode_r(rd, 0b000, rs1, rs2, 0x20)
}

pub fn sltu(rd: u32, rs1: u32, rs2: u32) -> u32 {
    encode_r(rd, 0b011, rs1, rs2, 0)
}

pub fn lui(rd: u32, imm20: u32) -> u32 {
    (imm20 << 12) | (rd << 7) | (0x0D << 2) | 0b11
}

pub fn auipc(rd: u32, imm20: u32) -> u32 {
    (imm20 << 12) | (rd << 7) | (0x05 << 2) | 0b11
}

pub fn lw(rd: u32, rs1: u32, imm: i32) -> u32 {
    encode_i(0x00, rd, 0b010, rs1, imm)
}

pub fn lb(rd: u32, rs1: u32, imm: i32) -> u32 {
    encode_i(0x00, rd, 0b000, rs1, imm)
}

pub fn lbu(rd: u32, rs1: u32, imm: i32) -> u32 {
    encode_i(0x00, rd, 0b100, rs1, imm)
}

pub fn lh(rd: u32, rs1: u32, imm: i32) -> u32 {
    encode_i(0x00, rd, 0b001, rs1, imm)
}

pub fn lhu(rd: u32, rs1: u32, imm: i32) -> u32 {
    encode_i(0x00, rd, 0b101, rs1, imm)
}

pub fn sw(rs1: u32, rs2: u32, imm: i32) -> u32 {
    encode_s(0b010, rs1, rs2, imm)
}

pub fn sh(rs1: u32, rs2: u32, imm: i32) -> u32 {
    encode_s(0b001, rs1, rs2, imm)
}

pub fn sb(rs1: u32, rs2: u32, imm: i32) -> u32 {
    encode_s(0b000, rs1, rs2, imm)
}

pub fn jal(rd: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    ((imm & 0x10_0000) << 11)
        | ((imm & 0x7FE) << 20)
        | ((imm & 0x800) << 9)
        | (imm & 0xF_F000)
        | (rd << 7)
        | (0x1B << 2)
        | 0b11
}

pub fn jalr(rd: u32, rs1: u32, imm: i32) -> u32 {
    encode_i(0x19, rd, 0b000, rs1, imm)
}

pub fn beq(rs1: u32, rs2: u32, imm: i32) -> u32 {
    encode_b(0b000, rs1, rs2, imm)
}

pub fn bne(rs1: u32, rs2: u32, imm: i32) -> u32 {
    encode_b(0b001, rs1, rs2, imm)
}

pub fn blt(rs1: u32, rs2: u32, imm: i32) -> u32 {
    encode_b(0b100, rs1, rs2, imm)
}

fn encode_b(f3: u32, rs1: u32, rs2: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    ((imm & 0x1000) << 19)
        | ((imm & 0x7E0) << 20)
        | (rs2 << 20)
        | (rs1 << 15)
        | (f3 << 12)
        | ((imm & 0x1E) << 7)
        | ((imm & 0x800) >> 4)
        | (0x18 << 2)
        | 0b11
}

pub fn ecall() -> u32 {
    0x0000_0073
}

pub fn ebreak() -> u32 {
    0x0010_0073
}

pub fn fence() -> u32 {
    encode_i(0x03, 0, 0b000, 0, 0)
}
