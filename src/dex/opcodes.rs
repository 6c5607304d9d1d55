//! The Dalvik opcode table: textual mnemonic, operand format (which fixes
//! the width in 16-bit code units) and the kind of pool reference carried.
//!
//! Gaps in the value space (0x3e-0x43, 0x73, 0x79-0x7a, 0xe3 and up) decode
//! as unknown opcodes downstream.

use std::collections::HashMap;
use once_cell::sync::Lazy;

/// Operand layouts. The two digits are the width in code units and the
/// operand count; the trailing letter is the operand kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Format10x,
    Format12x,
    Format11n,
    Format11x,
    Format10t,
    Format20t,
    Format22x,
    Format21t,
    Format21s,
    Format21h,
    Format21c,
    Format23x,
    Format22b,
    Format22t,
    Format22s,
    Format22c,
    Format30t,
    Format32x,
    Format31i,
    Format31t,
    Format31c,
    Format35c,
    Format3rc,
    Format51l,
}

impl Format {
    /// Width in 16-bit code units.
    pub fn width(&self) -> u32 {
        match self {
            Format::Format10x
            | Format::Format12x
            | Format::Format11n
            | Format::Format11x
            | Format::Format10t => 1,
            Format::Format20t
            | Format::Format22x
            | Format::Format21t
            | Format::Format21s
            | Format::Format21h
            | Format::Format21c
            | Format::Format23x
            | Format::Format22b
            | Format::Format22t
            | Format::Format22s
            | Format::Format22c => 2,
            Format::Format30t
            | Format::Format32x
            | Format::Format31i
            | Format::Format31t
            | Format::Format31c
            | Format::Format35c
            | Format::Format3rc => 3,
            Format::Format51l => 5,
        }
    }
}

/// Which id pool an instruction's index operand points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    None,
    String,
    Type,
    Field,
    Method,
}

pub struct OpcodeInfo {
    pub value: u8,
    pub name: &'static str,
    pub format: Format,
    pub reference: RefKind,
}

impl OpcodeInfo {
    const fn new(value: u8, name: &'static str, format: Format, reference: RefKind) -> OpcodeInfo {
        OpcodeInfo { value, name, format, reference }
    }

    pub fn width(&self) -> u32 {
        self.format.width()
    }
}

use Format::*;
use RefKind::*;

static OPCODES: &[OpcodeInfo] = &[
    OpcodeInfo::new(0x00, "nop", Format10x, None),
    OpcodeInfo::new(0x01, "move", Format12x, None),
    OpcodeInfo::new(0x02, "move/from16", Format22x, None),
    OpcodeInfo::new(0x03, "move/16", Format32x, None),
    OpcodeInfo::new(0x04, "move-wide", Format12x, None),
    OpcodeInfo::new(0x05, "move-wide/from16", Format22x, None),
    OpcodeInfo::new(0x06, "move-wide/16", Format32x, None),
    OpcodeInfo::new(0x07, "move-object", Format12x, None),
    OpcodeInfo::new(0x08, "move-object/from16", Format22x, None),
    OpcodeInfo::new(0x09, "move-object/16", Format32x, None),
    OpcodeInfo::new(0x0a, "move-result", Format11x, None),
    OpcodeInfo::new(0x0b, "move-result-wide", Format11x, None),
    OpcodeInfo::new(0x0c, "move-result-object", Format11x, None),
    OpcodeInfo::new(0x0d, "move-exception", Format11x, None),
    OpcodeInfo::new(0x0e, "return-void", Format10x, None),
    OpcodeInfo::new(0x0f, "return", Format11x, None),
    OpcodeInfo::new(0x10, "return-wide", Format11x, None),
    OpcodeInfo::new(0x11, "return-object", Format11x, None),
    OpcodeInfo::new(0x12, "const/4", Format11n, None),
    OpcodeInfo::new(0x13, "const/16", Format21s, None),
    OpcodeInfo::new(0x14, "const", Format31i, None),
    OpcodeInfo::new(0x15, "const/high16", Format21h, None),
    OpcodeInfo::new(0x16, "const-wide/16", Format21s, None),
    OpcodeInfo::new(0x17, "const-wide/32", Format31i, None),
    OpcodeInfo::new(0x18, "const-wide", Format51l, None),
    OpcodeInfo::new(0x19, "const-wide/high16", Format21h, None),
    OpcodeInfo::new(0x1a, "const-string", Format21c, String),
    OpcodeInfo::new(0x1b, "const-string/jumbo", Format31c, String),
    OpcodeInfo::new(0x1c, "const-class", Format21c, Type),
    OpcodeInfo::new(0x1d, "monitor-enter", Format11x, None),
    OpcodeInfo::new(0x1e, "monitor-exit", Format11x, None),
    OpcodeInfo::new(0x1f, "check-cast", Format21c, Type),
    OpcodeInfo::new(0x20, "instance-of", Format22c, Type),
    OpcodeInfo::new(0x21, "array-length", Format12x, None),
    OpcodeInfo::new(0x22, "new-instance", Format21c, Type),
    OpcodeInfo::new(0x23, "new-array", Format22c, Type),
    OpcodeInfo::new(0x24, "filled-new-array", Format35c, Type),
    OpcodeInfo::new(0x25, "filled-new-array/range", Format3rc, Type),
    OpcodeInfo::new(0x26, "fill-array-data", Format31t, None),
    OpcodeInfo::new(0x27, "throw", Format11x, None),
    OpcodeInfo::new(0x28, "goto", Format10t, None),
    OpcodeInfo::new(0x29, "goto/16", Format20t, None),
    OpcodeInfo::new(0x2a, "goto/32", Format30t, None),
    OpcodeInfo::new(0x2b, "packed-switch", Format31t, None),
    OpcodeInfo::new(0x2c, "sparse-switch", Format31t, None),
    OpcodeInfo::new(0x2d, "cmpl-float", Format23x, None),
    OpcodeInfo::new(0x2e, "cmpg-float", Format23x, None),
    OpcodeInfo::new(0x2f, "cmpl-double", Format23x, None),
    OpcodeInfo::new(0x30, "cmpg-double", Format23x, None),
    OpcodeInfo::new(0x31, "cmp-long", Format23x, None),
    OpcodeInfo::new(0x32, "if-eq", Format22t, None),
    OpcodeInfo::new(0x33, "if-ne", Format22t, None),
    OpcodeInfo::new(0x34, "if-lt", Format22t, None),
    OpcodeInfo::new(0x35, "if-ge", Format22t, None),
    OpcodeInfo::new(0x36, "if-gt", Format22t, None),
    OpcodeInfo::new(0x37, "if-le", Format22t, None),
    OpcodeInfo::new(0x38, "if-eqz", Format21t, None),
    OpcodeInfo::new(0x39, "if-nez", Format21t, None),
    OpcodeInfo::new(0x3a, "if-ltz", Format21t, None),
    OpcodeInfo::new(0x3b, "if-gez", Format21t, None),
    OpcodeInfo::new(0x3c, "if-gtz", Format21t, None),
    OpcodeInfo::new(0x3d, "if-lez", Format21t, None),
    OpcodeInfo::new(0x44, "aget", Format23x, None),
    OpcodeInfo::new(0x45, "aget-wide", Format23x, None),
    OpcodeInfo::new(0x46, "aget-object", Format23x, None),
    OpcodeInfo::new(0x47, "aget-boolean", Format23x, None),
    OpcodeInfo::new(0x48, "aget-byte", Format23x, None),
    OpcodeInfo::new(0x49, "aget-char", Format23x, None),
    OpcodeInfo::new(0x4a, "aget-short", Format23x, None),
    OpcodeInfo::new(0x4b, "aput", Format23x, None),
    OpcodeInfo::new(0x4c, "aput-wide", Format23x, None),
    OpcodeInfo::new(0x4d, "aput-object", Format23x, None),
    OpcodeInfo::new(0x4e, "aput-boolean", Format23x, None),
    OpcodeInfo::new(0x4f, "aput-byte", Format23x, None),
    OpcodeInfo::new(0x50, "aput-char", Format23x, None),
    OpcodeInfo::new(0x51, "aput-short", Format23x, None),
    OpcodeInfo::new(0x52, "iget", Format22c, Field),
    OpcodeInfo::new(0x53, "iget-wide", Format22c, Field),
    OpcodeInfo::new(0x54, "iget-object", Format22c, Field),
    OpcodeInfo::new(0x55, "iget-boolean", Format22c, Field),
    OpcodeInfo::new(0x56, "iget-byte", Format22c, Field),
    OpcodeInfo::new(0x57, "iget-char", Format22c, Field),
    OpcodeInfo::new(0x58, "iget-short", Format22c, Field),
    OpcodeInfo::new(0x59, "iput", Format22c, Field),
    OpcodeInfo::new(0x5a, "iput-wide", Format22c, Field),
    OpcodeInfo::new(0x5b, "iput-object", Format22c, Field),
    OpcodeInfo::new(0x5c, "iput-boolean", Format22c, Field),
    OpcodeInfo::new(0x5d, "iput-byte", Format22c, Field),
    OpcodeInfo::new(0x5e, "iput-char", Format22c, Field),
    OpcodeInfo::new(0x5f, "iput-short", Format22c, Field),
    OpcodeInfo::new(0x60, "sget", Format21c, Field),
    OpcodeInfo::new(0x61, "sget-wide", Format21c, Field),
    OpcodeInfo::new(0x62, "sget-object", Format21c, Field),
    OpcodeInfo::new(0x63, "sget-boolean", Format21c, Field),
    OpcodeInfo::new(0x64, "sget-byte", Format21c, Field),
    OpcodeInfo::new(0x65, "sget-char", Format21c, Field),
    OpcodeInfo::new(0x66, "sget-short", Format21c, Field),
    OpcodeInfo::new(0x67, "sput", Format21c, Field),
    OpcodeInfo::new(0x68, "sput-wide", Format21c, Field),
    OpcodeInfo::new(0x69, "sput-object", Format21c, Field),
    OpcodeInfo::new(0x6a, "sput-boolean", Format21c, Field),
    OpcodeInfo::new(0x6b, "sput-byte", Format21c, Field),
    OpcodeInfo::new(0x6c, "sput-char", Format21c, Field),
    OpcodeInfo::new(0x6d, "sput-short", Format21c, Field),
    OpcodeInfo::new(0x6e, "invoke-virtual", Format35c, Method),
    OpcodeInfo::new(0x6f, "invoke-super", Format35c, Method),
    OpcodeInfo::new(0x70, "invoke-direct", Format35c, Method),
    OpcodeInfo::new(0x71, "invoke-static", Format35c, Method),
    OpcodeInfo::new(0x72, "invoke-interface", Format35c, Method),
    OpcodeInfo::new(0x74, "invoke-virtual/range", Format3rc, Method),
    OpcodeInfo::new(0x75, "invoke-super/range", Format3rc, Method),
    OpcodeInfo::new(0x76, "invoke-direct/range", Format3rc, Method),
    OpcodeInfo::new(0x77, "invoke-static/range", Format3rc, Method),
    OpcodeInfo::new(0x78, "invoke-interface/range", Format3rc, Method),
    OpcodeInfo::new(0x7b, "neg-int", Format12x, None),
    OpcodeInfo::new(0x7c, "not-int", Format12x, None),
    OpcodeInfo::new(0x7d, "neg-long", Format12x, None),
    OpcodeInfo::new(0x7e, "not-long", Format12x, None),
    OpcodeInfo::new(0x7f, "neg-float", Format12x, None),
    OpcodeInfo::new(0x80, "neg-double", Format12x, None),
    OpcodeInfo::new(0x81, "int-to-long", Format12x, None),
    OpcodeInfo::new(0x82, "int-to-float", Format12x, None),
    OpcodeInfo::new(0x83, "int-to-double", Format12x, None),
    OpcodeInfo::new(0x84, "long-to-int", Format12x, None),
    OpcodeInfo::new(0x85, "long-to-float", Format12x, None),
    OpcodeInfo::new(0x86, "long-to-double", Format12x, None),
    OpcodeInfo::new(0x87, "float-to-int", Format12x, None),
    OpcodeInfo::new(0x88, "float-to-long", Format12x, None),
    OpcodeInfo::new(0x89, "float-to-double", Format12x, None),
    OpcodeInfo::new(0x8a, "double-to-int", Format12x, None),
    OpcodeInfo::new(0x8b, "double-to-long", Format12x, None),
    OpcodeInfo::new(0x8c, "double-to-float", Format12x, None),
    OpcodeInfo::new(0x8d, "int-to-byte", Format12x, None),
    OpcodeInfo::new(0x8e, "int-to-char", Format12x, None),
    OpcodeInfo::new(0x8f, "int-to-short", Format12x, None),
    OpcodeInfo::new(0x90, "add-int", Format23x, None),
    OpcodeInfo::new(0x91, "sub-int", Format23x, None),
    OpcodeInfo::new(0x92, "mul-int", Format23x, None),
    OpcodeInfo::new(0x93, "div-int", Format23x, None),
    OpcodeInfo::new(0x94, "rem-int", Format23x, None),
    OpcodeInfo::new(0x95, "and-int", Format23x, None),
    OpcodeInfo::new(0x96, "or-int", Format23x, None),
    OpcodeInfo::new(0x97, "xor-int", Format23x, None),
    OpcodeInfo::new(0x98, "shl-int", Format23x, None),
    OpcodeInfo::new(0x99, "shr-int", Format23x, None),
    OpcodeInfo::new(0x9a, "ushr-int", Format23x, None),
    OpcodeInfo::new(0x9b, "add-long", Format23x, None),
    OpcodeInfo::new(0x9c, "sub-long", Format23x, None),
    OpcodeInfo::new(0x9d, "mul-long", Format23x, None),
    OpcodeInfo::new(0x9e, "div-long", Format23x, None),
    OpcodeInfo::new(0x9f, "rem-long", Format23x, None),
    OpcodeInfo::new(0xa0, "and-long", Format23x, None),
    OpcodeInfo::new(0xa1, "or-long", Format23x, None),
    OpcodeInfo::new(0xa2, "xor-long", Format23x, None),
    OpcodeInfo::new(0xa3, "shl-long", Format23x, None),
    OpcodeInfo::new(0xa4, "shr-long", Format23x, None),
    OpcodeInfo::new(0xa5, "ushr-long", Format23x, None),
    OpcodeInfo::new(0xa6, "add-float", Format23x, None),
    OpcodeInfo::new(0xa7, "sub-float", Format23x, None),
    OpcodeInfo::new(0xa8, "mul-float", Format23x, None),
    OpcodeInfo::new(0xa9, "div-float", Format23x, None),
    OpcodeInfo::new(0xaa, "rem-float", Format23x, None),
    OpcodeInfo::new(0xab, "add-double", Format23x, None),
    OpcodeInfo::new(0xac, "sub-double", Format23x, None),
    OpcodeInfo::new(0xad, "mul-double", Format23x, None),
    OpcodeInfo::new(0xae, "div-double", Format23x, None),
    OpcodeInfo::new(0xaf, "rem-double", Format23x, None),
    OpcodeInfo::new(0xb0, "add-int/2addr", Format12x, None),
    OpcodeInfo::new(0xb1, "sub-int/2addr", Format12x, None),
    OpcodeInfo::new(0xb2, "mul-int/2addr", Format12x, None),
    OpcodeInfo::new(0xb3, "div-int/2addr", Format12x, None),
    OpcodeInfo::new(0xb4, "rem-int/2addr", Format12x, None),
    OpcodeInfo::new(0xb5, "and-int/2addr", Format12x, None),
    OpcodeInfo::new(0xb6, "or-int/2addr", Format12x, None),
    OpcodeInfo::new(0xb7, "xor-int/2addr", Format12x, None),
    OpcodeInfo::new(0xb8, "shl-int/2addr", Format12x, None),
    OpcodeInfo::new(0xb9, "shr-int/2addr", Format12x, None),
    OpcodeInfo::new(0xba, "ushr-int/2addr", Format12x, None),
    OpcodeInfo::new(0xbb, "add-long/2addr", Format12x, None),
    OpcodeInfo::new(0xbc, "sub-long/2addr", Format12x, None),
    OpcodeInfo::new(0xbd, "mul-long/2addr", Format12x, None),
    OpcodeInfo::new(0xbe, "div-long/2addr", Format12x, None),
    OpcodeInfo::new(0xbf, "rem-long/2addr", Format12x, None),
    OpcodeInfo::new(0xc0, "and-long/2addr", Format12x, None),
    OpcodeInfo::new(0xc1, "or-long/2addr", Format12x, None),
    OpcodeInfo::new(0xc2, "xor-long/2addr", Format12x, None),
    OpcodeInfo::new(0xc3, "shl-long/2addr", Format12x, None),
    OpcodeInfo::new(0xc4, "shr-long/2addr", Format12x, None),
    OpcodeInfo::new(0xc5, "ushr-long/2addr", Format12x, None),
    OpcodeInfo::new(0xc6, "add-float/2addr", Format12x, None),
    OpcodeInfo::new(0xc7, "sub-float/2addr", Format12x, None),
    OpcodeInfo::new(0xc8, "mul-float/2addr", Format12x, None),
    OpcodeInfo::new(0xc9, "div-float/2addr", Format12x, None),
    OpcodeInfo::new(0xca, "rem-float/2addr", Format12x, None),
    OpcodeInfo::new(0xcb, "add-double/2addr", Format12x, None),
    OpcodeInfo::new(0xcc, "sub-double/2addr", Format12x, None),
    OpcodeInfo::new(0xcd, "mul-double/2addr", Format12x, None),
    OpcodeInfo::new(0xce, "div-double/2addr", Format12x, None),
    OpcodeInfo::new(0xcf, "rem-double/2addr", Format12x, None),
    OpcodeInfo::new(0xd0, "add-int/lit16", Format22s, None),
    OpcodeInfo::new(0xd1, "rsub-int", Format22s, None),
    OpcodeInfo::new(0xd2, "mul-int/lit16", Format22s, None),
    OpcodeInfo::new(0xd3, "div-int/lit16", Format22s, None),
    OpcodeInfo::new(0xd4, "rem-int/lit16", Format22s, None),
    OpcodeInfo::new(0xd5, "and-int/lit16", Format22s, None),
    OpcodeInfo::new(0xd6, "or-int/lit16", Format22s, None),
    OpcodeInfo::new(0xd7, "xor-int/lit16", Format22s, None),
    OpcodeInfo::new(0xd8, "add-int/lit8", Format22b, None),
    OpcodeInfo::new(0xd9, "rsub-int/lit8", Format22b, None),
    OpcodeInfo::new(0xda, "mul-int/lit8", Format22b, None),
    OpcodeInfo::new(0xdb, "div-int/lit8", Format22b, None),
    OpcodeInfo::new(0xdc, "rem-int/lit8", Format22b, None),
    OpcodeInfo::new(0xdd, "and-int/lit8", Format22b, None),
    OpcodeInfo::new(0xde, "or-int/lit8", Format22b, None),
    OpcodeInfo::new(0xdf, "xor-int/lit8", Format22b, None),
    OpcodeInfo::new(0xe0, "shl-int/lit8", Format22b, None),
    OpcodeInfo::new(0xe1, "shr-int/lit8", Format22b, None),
    OpcodeInfo::new(0xe2, "ushr-int/lit8", Format22b, None),
];

static OPCODE_MAP: Lazy<HashMap<u8, &'static OpcodeInfo>> = Lazy::new(|| {
    let mut map = HashMap::with_capacity(OPCODES.len());
    for info in OPCODES {
        map.insert(info.value, info);
    }
    map
});

pub fn opcode_info(opcode: u8) -> Option<&'static OpcodeInfo> {
    OPCODE_MAP.get(&opcode).copied()
}
