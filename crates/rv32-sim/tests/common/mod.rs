//! Minimal ELF32 image builder and encoders for driver tests.

#![allow(dead_code, clippy::cast_sign_loss, clippy::cast_possible_truncation)]

/// Builds a two-segment executable: `words` at `text`, `data` bytes at
/// `data_addr`, plus globally-bound `symbols`.
pub fn image(
    text: u32,
    words: &[u32],
    data_addr: u32,
    data: &[u8],
    symbols: &[(&str, u32)],
) -> Vec<u8> {
    let segments: Vec<(u32, Vec<u8>)> = vec![
        (
            text,
            words.iter().flat_map(|word| word.to_le_bytes()).collect(),
        ),
        (data_addr, data.to_vec()),
    ];

    let phnum = segments.len();
    let shnum = if symbols.is_empty() { 0 } else { 3 };
    let phoff = 52;
    let shoff = phoff + phnum * 32;
    let mut body_offset = shoff + shnum * 40;
    let mut out = vec![0_u8; body_offset];

    out[..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
    out[4] = 1;
    out[5] = 1;
    out[6] = 1;
    put16(&mut out, 16, 2); // ET_EXEC
    put16(&mut out, 18, 243); // EM_RISCV
    put32(&mut out, 20, 1);
    put32(&mut out, 24, text);
    put32(&mut out, 28, phoff as u32);
    put32(&mut out, 32, if shnum == 0 { 0 } else { shoff as u32 });
    put16(&mut out, 40, 52);
    put16(&mut out, 42, 32);
    put16(&mut out, 44, phnum as u16);
    put16(&mut out, 46, 40);
    put16(&mut out, 48, shnum as u16);

    for (index, (addr, bytes)) in segments.iter().enumerate() {
        let phdr = phoff + index * 32;
        put32(&mut out, phdr, 1); // PT_LOAD
        put32(&mut out, phdr + 4, body_offset as u32);
        put32(&mut out, phdr + 8, *addr);
        put32(&mut out, phdr + 12, *addr);
        put32(&mut out, phdr + 16, bytes.len() as u32);
        put32(&mut out, phdr + 20, bytes.len().max(4) as u32);
        put32(&mut out, phdr + 28, 4);
        out.extend_from_slice(bytes);
        body_offset += bytes.len();
    }

    if !symbols.is_empty() {
        let mut symtab = Vec::new();
        let mut strtab = vec![0_u8];
        for (name, value) in symbols {
            let name_offset = strtab.len() as u32;
            strtab.extend_from_slice(name.as_bytes());
            strtab.push(0);
            let entry = symtab.len();
            symtab.resize(entry + 16, 0);
            put32(&mut symtab, entry, name_offset);
            put32(&mut symtab, entry + 4, *value);
            symtab[entry + 12] = 1 << 4; // STB_GLOBAL
        }

        let symtab_shdr = shoff + 40;
        put32(&mut out, symtab_shdr + 4, 2); // SHT_SYMTAB
        put32(&mut out, symtab_shdr + 16, body_offset as u32);
        put32(&mut out, symtab_shdr + 20, symtab.len() as u32);
        put32(&mut out, symtab_shdr + 24, 2);
        put32(&mut out, symtab_shdr + 36, 16);

        let strtab_shdr = shoff + 2 * 40;
        put32(&mut out, strtab_shdr + 4, 3); // SHT_STRTAB
        put32(&mut out, strtab_shdr + 16, (body_offset + symtab.len()) as u32);
        put32(&mut out, strtab_shdr + 20, strtab.len() as u32);

        out.extend_from_slice(&symtab);
        out.extend_from_slice(&strtab);
    }

    out
}

fn put16(out: &mut [u8], offset: usize, value: u16) {
    out[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put32(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn lui(rd: u32, imm20: u32) -> u32 {
    (imm20 << 12) | (rd << 7) | (0x0D << 2) | 0b11
}

pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    (((imm as u32) & 0xFFF) << 20) | (rs1 << 15) | (rd << 7) | (0x04 << 2) | 0b11
}

pub fn sw(rs1: u32, rs2: u32, imm: i32) -> u32 {
    let imm = imm as u32 & 0xFFF;
    ((imm & 0xFE0) << 20)
        | (rs2 << 20)
        | (rs1 << 15)
        | (0b010 << 12)
        | ((imm & 0x1F) << 7)
        | (0x08 << 2)
        | 0b11
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
