//! Per-instruction decoding of the Dalvik bytecode stream.
//!
//! Each instruction is rendered to its operand-resolved smali text with raw
//! `vN` register names; the writer re-maps parameter registers afterwards.

use crate::dex::escape_literal;
use crate::dex::opcodes::{opcode_info, Format, RefKind};
use crate::types::DexInstruction;

/// Resolves pool indices into printable smali text. The decoder works with
/// any resolver; tests use a stub instead of a full image.
pub trait RefResolver {
    fn string(&self, idx: u32) -> String;
    fn type_desc(&self, idx: u32) -> String;
    /// `Lcls;->name:Type`
    fn field_ref(&self, idx: u32) -> String;
    /// `Lcls;->name(params)ret`
    fn method_ref(&self, idx: u32) -> String;
}

/// Stable placeholders (`string@42`), keeping the decoder usable without an
/// image behind it.
pub struct PlaceholderResolver;

impl RefResolver for PlaceholderResolver {
    fn string(&self, idx: u32) -> String { format!("string@{}", idx) }
    fn type_desc(&self, idx: u32) -> String { format!("type@{}", idx) }
    fn field_ref(&self, idx: u32) -> String { format!("field@{}", idx) }
    fn method_ref(&self, idx: u32) -> String { format!("method@{}", idx) }
}

/// Walk a code buffer and decode every instruction in it. The address of
/// each instruction is the sum of the widths before it; decoding stops if a
/// trailing instruction claims more code units than remain.
pub fn decode_instructions(insns: &[u16], resolver: &dyn RefResolver) -> Vec<DexInstruction> {
    let mut out = Vec::new();
    let mut offset = 0usize;

    while offset < insns.len() {
        let opcode = (insns[offset] & 0xFF) as u8;
        let width = match opcode_info(opcode) {
            Some(info) => info.width() as usize,
            None => 1,
        };
        if offset + width > insns.len() {
            break;
        }
        let units = &insns[offset..offset + width];
        let mnemonic = format_instruction(units, offset as u32, resolver);
        out.push(DexInstruction {
            address: offset as u32,
            opcode,
            width: width as u32,
            mnemonic,
        });
        offset += width;
    }

    out
}

/// Render one instruction. `address` is in code units and feeds the branch
/// label arithmetic.
pub fn format_instruction(units: &[u16], address: u32, resolver: &dyn RefResolver) -> String {
    let opcode = (units[0] & 0xFF) as u8;
    let info = match opcode_info(opcode) {
        Some(info) => info,
        None => {
            return format!("unknown-{:x} ; unknown opcode 0x{:x}", opcode, opcode);
        }
    };

    let mut out = info.name.to_string();
    let aa = (units[0] >> 8) & 0xFF;
    let a4 = (units[0] >> 8) & 0xF;
    let b4 = (units[0] >> 12) & 0xF;

    match info.format {
        Format::Format10x => {}
        Format::Format12x => {
            out.push_str(&format!(" v{}, v{}", a4, b4));
        }
        Format::Format11n => {
            let lit = (units[0] as i16) >> 12;
            out.push_str(&format!(" v{}, 0x{:x}", a4, lit as i32 as u32));
        }
        Format::Format11x => {
            out.push_str(&format!(" v{}", aa));
        }
        Format::Format10t => {
            let off = (aa as u8) as i8;
            out.push_str(&format!(" {}", branch_label(info.name, address, off as i32)));
        }
        Format::Format20t => {
            let off = units[1] as i16;
            out.push_str(&format!(" {}", branch_label(info.name, address, off as i32)));
        }
        Format::Format30t => {
            let off = (units[1] as u32 | ((units[2] as u32) << 16)) as i32;
            out.push_str(&format!(" {}", branch_label(info.name, address, off)));
        }
        Format::Format22x => {
            out.push_str(&format!(" v{}, v{}", aa, units[1]));
        }
        Format::Format21t => {
            let off = units[1] as i16;
            out.push_str(&format!(" v{}, {}", aa, branch_label(info.name, address, off as i32)));
        }
        Format::Format21s => {
            let lit = units[1] as i16;
            out.push_str(&format!(" v{}, 0x{:x}", aa, lit as i32 as u32));
        }
        Format::Format21h => {
            // The 16 bits land in the high half of the 32- or 64-bit value.
            if opcode == 0x19 {
                let lit = (units[1] as u64) << 48;
                out.push_str(&format!(" v{}, 0x{:x}", aa, lit));
            } else {
                let lit = (units[1] as u32) << 16;
                out.push_str(&format!(" v{}, 0x{:x}", aa, lit));
            }
        }
        Format::Format21c => {
            out.push_str(&format!(" v{}, {}", aa, reference(info.reference, units[1] as u32, resolver)));
        }
        Format::Format23x => {
            out.push_str(&format!(" v{}, v{}, v{}", aa, units[1] & 0xFF, (units[1] >> 8) & 0xFF));
        }
        Format::Format22b => {
            let lit = ((units[1] >> 8) as u8) as i8;
            out.push_str(&format!(" v{}, v{}, 0x{:x}", aa, units[1] & 0xFF, lit as i32 as u32));
        }
        Format::Format22t => {
            let off = units[1] as i16;
            out.push_str(&format!(" v{}, v{}, {}", a4, b4, branch_label(info.name, address, off as i32)));
        }
        Format::Format22s => {
            let lit = units[1] as i16;
            out.push_str(&format!(" v{}, v{}, 0x{:x}", a4, b4, lit as i32 as u32));
        }
        Format::Format22c => {
            out.push_str(&format!(" v{}, v{}, {}", a4, b4, reference(info.reference, units[1] as u32, resolver)));
        }
        Format::Format32x => {
            out.push_str(&format!(" v{}, v{}", units[1], units[2]));
        }
        Format::Format31i => {
            let lit = units[1] as u32 | ((units[2] as u32) << 16);
            out.push_str(&format!(" v{}, 0x{:x}", aa, lit));
        }
        Format::Format31t => {
            let off = (units[1] as u32 | ((units[2] as u32) << 16)) as i32;
            out.push_str(&format!(" v{}, {}", aa, branch_label(info.name, address, off)));
        }
        Format::Format31c => {
            let idx = units[1] as u32 | ((units[2] as u32) << 16);
            out.push_str(&format!(" v{}, {}", aa, reference(info.reference, idx, resolver)));
        }
        Format::Format35c => {
            // [A|G|op BBBB F|E|D|C]: A is the count, G the fifth register.
            let count = ((units[0] >> 12) & 0xF).min(5);
            let reg_g = (units[0] >> 8) & 0xF;
            let args = units[2];
            let mut regs = Vec::with_capacity(count as usize);
            for i in 0..count {
                let reg = match i {
                    0 => args & 0xF,
                    1 => (args >> 4) & 0xF,
                    2 => (args >> 8) & 0xF,
                    3 => (args >> 12) & 0xF,
                    _ => reg_g,
                };
                regs.push(format!("v{}", reg));
            }
            out.push_str(&format!(" {{{}}}, {}", regs.join(", "), reference(info.reference, units[1] as u32, resolver)));
        }
        Format::Format3rc => {
            let count = (units[0] >> 8) & 0xFF;
            let first = units[2] as u32;
            let regs: Vec<String> = (0..count as u32).map(|i| format!("v{}", first + i)).collect();
            out.push_str(&format!(" {{{}}}, {}", regs.join(", "), reference(info.reference, units[1] as u32, resolver)));
        }
        Format::Format51l => {
            let lit = units[1] as u64
                | ((units[2] as u64) << 16)
                | ((units[3] as u64) << 32)
                | ((units[4] as u64) << 48);
            out.push_str(&format!(" v{}, 0x{:x}", aa, lit));
        }
    }

    out
}

fn reference(kind: RefKind, idx: u32, resolver: &dyn RefResolver) -> String {
    match kind {
        RefKind::String => format!("\"{}\"", escape_literal(&resolver.string(idx))),
        RefKind::Type => resolver.type_desc(idx),
        RefKind::Field => resolver.field_ref(idx),
        RefKind::Method => resolver.method_ref(idx),
        RefKind::None => String::new(),
    }
}

/// PC-relative targets become labels named after the data they point at.
/// The hex value is the target address in code units.
fn branch_label(name: &str, address: u32, offset: i32) -> String {
    let target = address.wrapping_add(offset as u32);
    let prefix = match name {
        "fill-array-data" => ":array_",
        "packed-switch" => ":pswitch_data_",
        "sparse-switch" => ":sswitch_data_",
        _ => ":cond_",
    };
    format!("{}{:x}", prefix, target)
}
