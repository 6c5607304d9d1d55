//! The debug_info_item state machine.
//!
//! A small bytecode of its own: a header (line start + parameter names)
//! followed by opcodes that advance an (address, line) pair and open, close
//! and restart register-resident locals. The machine keeps a shadow table of
//! what each register last held so `.end local` and `.restart local` can
//! report a name and type the stream itself does not repeat.

use crate::dex::dex_file::DexFile;
use crate::dex::error::DexError;
use crate::types::{is_wide_type, parameter_types, DebugItem, DebugItemKind};

const DBG_END_SEQUENCE: u8 = 0x00;
const DBG_ADVANCE_PC: u8 = 0x01;
const DBG_ADVANCE_LINE: u8 = 0x02;
const DBG_START_LOCAL: u8 = 0x03;
const DBG_START_LOCAL_EXTENDED: u8 = 0x04;
const DBG_END_LOCAL: u8 = 0x05;
const DBG_RESTART_LOCAL: u8 = 0x06;
const DBG_SET_PROLOGUE_END: u8 = 0x07;
const DBG_SET_EPILOGUE_BEGIN: u8 = 0x08;
const DBG_SET_FILE: u8 = 0x09;
const DBG_FIRST_SPECIAL: u8 = 0x0a;

/// What the method owning the stream looks like; needed to seed the shadow
/// table with `this` and the declared parameters.
pub(crate) struct MethodContext<'a>
{
    pub class_desc: &'a str,
    pub signature: &'a str,
    pub is_static: bool,
}

#[derive(Clone, Default)]
struct LocalState
{
    name: String,
    type_desc: String,
    signature: String,
    ended: bool,
}

/// Run the state machine at `offset`. A malformed stream terminates the walk
/// and yields whatever was decoded up to that point.
pub(crate) fn decode_debug_info(
    dex: &DexFile,
    offset: usize,
    registers_size: u16,
    ctx: &MethodContext,
) -> Vec<DebugItem>
{
    let mut items = Vec::new();
    let mut cursor = match dex.cursor_at(offset)
    {
        Ok(c) => c,
        Err(_) => return items,
    };

    let line_start = match cursor.read_uleb128()
    {
        Ok(v) => v,
        Err(_) => return items,
    };
    let parameters_size = match cursor.read_uleb128()
    {
        Ok(v) => v,
        Err(_) => return items,
    };

    let mut parameter_names = Vec::with_capacity(parameters_size as usize);
    for _ in 0..parameters_size
    {
        match cursor.read_uleb128()
        {
            Ok(idx) => parameter_names.push(string_plus1(dex, idx)),
            Err(_) => return items,
        }
    }

    // Seed the shadow table: `this` first for instance methods, then the
    // declared parameters, placed at the end of the register window with
    // wide types taking two slots.
    let register_count = registers_size as usize;
    let mut locals: Vec<LocalState> = vec![LocalState::default(); register_count];

    let mut seeded: Vec<LocalState> = Vec::new();
    if !ctx.is_static
    {
        seeded.push(LocalState {
            name: "this".to_string(),
            type_desc: ctx.class_desc.to_string(),
            signature: String::new(),
            ended: false,
        });
    }
    for (i, type_desc) in parameter_types(ctx.signature).into_iter().enumerate()
    {
        seeded.push(LocalState {
            name: parameter_names.get(i).cloned().unwrap_or_default(),
            type_desc,
            signature: String::new(),
            ended: false,
        });
    }

    let window: usize = seeded.iter().map(|s| if is_wide_type(&s.type_desc) { 2 } else { 1 }).sum();
    let mut slot = register_count.saturating_sub(window);
    for state in seeded
    {
        let wide = is_wide_type(&state.type_desc);
        if slot < register_count
        {
            locals[slot] = state;
        }
        slot += if wide { 2 } else { 1 };
    }

    let mut address: u32 = 0;
    let mut line: i64 = line_start as i64;

    loop
    {
        let opcode = match cursor.read_u8()
        {
            Ok(b) => b,
            Err(_) => return items,
        };

        let result = match opcode
        {
            DBG_END_SEQUENCE => return items,

            DBG_ADVANCE_PC => cursor.read_uleb128().map(|diff| {
                address = address.wrapping_add(diff);
            }),

            DBG_ADVANCE_LINE => cursor.read_sleb128().map(|diff| {
                line += diff as i64;
            }),

            DBG_START_LOCAL | DBG_START_LOCAL_EXTENDED => {
                let extended = opcode == DBG_START_LOCAL_EXTENDED;
                (|| -> Result<(), DexError> {
                    let register = cursor.read_uleb128()?;
                    let name = string_plus1(dex, cursor.read_uleb128()?);
                    let type_desc = type_plus1(dex, cursor.read_uleb128()?);
                    let signature = if extended { string_plus1(dex, cursor.read_uleb128()?) } else { String::new() };

                    if (register as usize) < locals.len()
                    {
                        locals[register as usize] = LocalState {
                            name: name.clone(),
                            type_desc: type_desc.clone(),
                            signature: signature.clone(),
                            ended: false,
                        };
                    }
                    items.push(DebugItem {
                        address,
                        kind: DebugItemKind::StartLocal { register, name, type_desc, signature },
                    });
                    Ok(())
                })()
            }

            DBG_END_LOCAL => cursor.read_uleb128().map(|register| {
                // Report the shadow only if this register was not already
                // ended; mark it ended either way.
                let mut name = String::new();
                let mut type_desc = String::new();
                let mut signature = String::new();
                if let Some(state) = locals.get_mut(register as usize)
                {
                    if !state.ended
                    {
                        name = state.name.clone();
                        type_desc = state.type_desc.clone();
                        signature = state.signature.clone();
                        state.ended = true;
                    }
                }
                items.push(DebugItem {
                    address,
                    kind: DebugItemKind::EndLocal { register, name, type_desc, signature },
                });
            }),

            DBG_RESTART_LOCAL => cursor.read_uleb128().map(|register| {
                let mut name = String::new();
                let mut type_desc = String::new();
                let mut signature = String::new();
                if let Some(state) = locals.get_mut(register as usize)
                {
                    name = state.name.clone();
                    type_desc = state.type_desc.clone();
                    signature = state.signature.clone();
                    state.ended = false;
                }
                items.push(DebugItem {
                    address,
                    kind: DebugItemKind::RestartLocal { register, name, type_desc, signature },
                });
            }),

            DBG_SET_PROLOGUE_END => {
                items.push(DebugItem { address, kind: DebugItemKind::PrologueEnd });
                Ok(())
            }

            DBG_SET_EPILOGUE_BEGIN => {
                items.push(DebugItem { address, kind: DebugItemKind::EpilogueBegin });
                Ok(())
            }

            DBG_SET_FILE => cursor.read_uleb128().map(|idx| {
                if idx != 0
                {
                    if let Some(name) = dex.string_opt(idx - 1)
                    {
                        items.push(DebugItem {
                            address,
                            kind: DebugItemKind::SetSourceFile(name.to_string()),
                        });
                    }
                }
            }),

            special => {
                let adjusted = (special - DBG_FIRST_SPECIAL) as u32;
                line += (adjusted % 15) as i64 - 4;
                address = address.wrapping_add(adjusted / 15);
                if (0i64..65536).contains(&line)
                {
                    items.push(DebugItem { address, kind: DebugItemKind::LineNumber(line as u32) });
                }
                Ok(())
            }
        };

        if result.is_err()
        {
            return items;
        }
    }
}

/// Indices in the stream are stored as value+1; 0 means absent.
fn string_plus1(dex: &DexFile, idx: u32) -> String
{
    if idx == 0
    {
        return String::new();
    }
    dex.string_opt(idx - 1).map(|s| s.to_string()).unwrap_or_default()
}

fn type_plus1(dex: &DexFile, idx: u32) -> String
{
    if idx == 0
    {
        return String::new();
    }
    dex.type_opt(idx - 1).map(|s| s.to_string()).unwrap_or_default()
}
