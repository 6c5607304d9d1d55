//! Deterministic smali emission from the decoded class model.
//!
//! Method bodies interleave instructions with debug items by sorting on
//! `(address, sort_order, register)`: instructions carry sort order 100, a
//! synthetic blank line 101, and debug items negative orders so they print
//! above the instruction at their address.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{
    access_flags_smali, is_wide_type, parameter_types, DebugItem, DebugItemKind, DexAnnotation,
    DexClass, DexCode, DexField, DexMethod, FlagTarget,
};

/// Emission knobs, mirroring what the command line exposes.
pub struct WriteOptions
{
    /// Interleave debug items (.line, .local, ...) into method bodies.
    pub debug_info: bool,
    /// Raw line numbers above this bound are folded to `n % 1000 + 1`;
    /// `None` emits them untouched.
    pub line_clamp: Option<u32>,
}

impl Default for WriteOptions
{
    fn default() -> Self
    {
        WriteOptions { debug_info: true, line_clamp: Some(10000) }
    }
}

pub fn write_class(class: &DexClass) -> String
{
    write_class_with(class, &WriteOptions::default())
}

pub fn write_class_with(class: &DexClass, options: &WriteOptions) -> String
{
    let mut out = format!(
        ".class {}{}\n",
        access_flags_smali(class.access_flags, FlagTarget::Class),
        class.name
    );

    if let Some(superclass) = &class.superclass
    {
        out.push_str(&format!(".super {}\n", superclass));
    }
    if let Some(source) = &class.source_file
    {
        out.push_str(&format!(".source \"{}\"\n", source));
    }

    if !class.interfaces.is_empty()
    {
        out.push_str("\n# interfaces\n");
        for interface in &class.interfaces
        {
            out.push_str(&format!(".implements {}\n", interface));
        }
    }

    if !class.annotations.is_empty()
    {
        out.push_str("\n# annotations\n");
        for annotation in &class.annotations
        {
            write_annotation(&mut out, annotation, "");
            out.push('\n');
        }
    }

    if !class.static_fields.is_empty()
    {
        out.push_str("\n# static fields\n");
        for field in &class.static_fields
        {
            write_field(&mut out, field);
        }
    }

    if !class.instance_fields.is_empty()
    {
        out.push_str("\n# instance fields\n");
        for field in &class.instance_fields
        {
            write_field(&mut out, field);
        }
    }

    if !class.direct_methods.is_empty()
    {
        out.push_str("\n# direct methods\n");
        for method in &class.direct_methods
        {
            write_method(&mut out, method, options);
        }
    }

    if !class.virtual_methods.is_empty()
    {
        out.push_str("\n# virtual methods\n");
        for method in &class.virtual_methods
        {
            write_method(&mut out, method, options);
        }
    }

    out
}

fn write_annotation(out: &mut String, annotation: &DexAnnotation, indent: &str)
{
    out.push_str(&format!(
        "{}.annotation {} {}\n",
        indent,
        annotation.visibility.to_str(),
        annotation.type_desc
    ));
    for (name, value) in &annotation.elements
    {
        out.push_str(&format!("{}    {} = {}\n", indent, name, value));
    }
    out.push_str(indent);
    out.push_str(".end annotation\n");
}

fn write_field(out: &mut String, field: &DexField)
{
    out.push_str(&format!(
        ".field {}{}:{}",
        access_flags_smali(field.access_flags, FlagTarget::Field),
        field.name,
        field.type_desc
    ));
    if let Some(value) = &field.initial_value
    {
        out.push_str(&format!(" = {}", value));
    }
    out.push('\n');

    if !field.annotations.is_empty()
    {
        for annotation in &field.annotations
        {
            write_annotation(out, annotation, "    ");
        }
        out.push_str(".end field\n");
    }
    out.push('\n');
}

fn write_method(out: &mut String, method: &DexMethod, options: &WriteOptions)
{
    out.push_str(&format!(
        ".method {}{}{}\n",
        access_flags_smali(method.access_flags, FlagTarget::Method),
        method.name,
        method.signature
    ));

    for annotation in &method.annotations
    {
        write_annotation(out, annotation, "    ");
    }

    for (index, annotations) in &method.parameter_annotations
    {
        out.push_str(&format!("    .param p{}\n", param_number(method, *index)));
        for annotation in annotations
        {
            write_annotation(out, annotation, "        ");
        }
        out.push_str("    .end param\n");
    }

    if let Some(code) = &method.code
    {
        write_method_body(out, code, options);
    }

    out.push_str(".end method\n\n");
}

/// The `pN` number of the parameter at `index`: `p0` is `this` on instance
/// methods, and wide parameters take two slots.
fn param_number(method: &DexMethod, index: usize) -> usize
{
    let mut n = if method.is_static() { 0 } else { 1 };
    for type_desc in parameter_types(&method.signature).iter().take(index)
    {
        n += if is_wide_type(type_desc) { 2 } else { 1 };
    }
    n
}

struct BodyItem
{
    address: u32,
    sort_order: i32,
    /// Set only for `.end local` items: simultaneous end-locals come out in
    /// ascending register order. Every other collision keeps its insertion
    /// order under the stable sort.
    end_local_register: Option<u32>,
    text: String,
}

fn write_method_body(out: &mut String, code: &DexCode, options: &WriteOptions)
{
    out.push_str(&format!("    .registers {}\n", code.registers_size));

    let mut items: Vec<BodyItem> = Vec::new();
    let count = code.instructions.len();
    for (i, instruction) in code.instructions.iter().enumerate()
    {
        let text = remap_registers(&instruction.mnemonic, code.registers_size, code.ins_size);
        items.push(BodyItem {
            address: instruction.address,
            sort_order: 100,
            end_local_register: None,
            text: format!("    {}", text),
        });
        if i + 1 < count
        {
            items.push(BodyItem {
                address: instruction.address,
                sort_order: 101,
                end_local_register: None,
                text: String::new(),
            });
        }
    }

    if options.debug_info
    {
        for item in &code.debug_items
        {
            items.push(render_debug_item(item, code, options));
        }
    }

    // Keyed on (address, sort_order); the register number breaks ties
    // between end-locals only, so a start or restart colliding with an
    // end-local stays where the debug stream put it.
    items.sort_by(|a, b| {
        a.address
            .cmp(&b.address)
            .then(a.sort_order.cmp(&b.sort_order))
            .then_with(|| match (a.end_local_register, b.end_local_register)
            {
                (Some(a_reg), Some(b_reg)) => a_reg.cmp(&b_reg),
                _ => Ordering::Equal,
            })
    });

    out.push('\n');
    for item in items
    {
        out.push_str(&item.text);
        out.push('\n');
    }
}

fn render_debug_item(item: &DebugItem, code: &DexCode, options: &WriteOptions) -> BodyItem
{
    let reg_name = |r: u32| format_register(r, code.registers_size, code.ins_size);
    let mut end_local_register = None;

    let text = match &item.kind
    {
        DebugItemKind::StartLocal { register: r, name, type_desc, signature } => {
            let mut line = format!("    .local {}", reg_name(*r));
            if !name.is_empty() || !type_desc.is_empty() || !signature.is_empty()
            {
                line.push_str(", ");
                line.push_str(&local_info(name, type_desc, signature));
            }
            line
        }
        DebugItemKind::EndLocal { register: r, name, type_desc, signature } => {
            end_local_register = Some(*r);
            let mut line = format!("    .end local {}", reg_name(*r));
            if !name.is_empty() || !type_desc.is_empty() || !signature.is_empty()
            {
                line.push_str("    # ");
                line.push_str(&local_info(name, type_desc, signature));
            }
            line
        }
        DebugItemKind::RestartLocal { register: r, name, type_desc, signature } => {
            let mut line = format!("    .restart local {}", reg_name(*r));
            if !name.is_empty() || !type_desc.is_empty() || !signature.is_empty()
            {
                line.push_str(", ");
                line.push_str(&local_info(name, type_desc, signature));
            }
            line
        }
        DebugItemKind::LineNumber(raw) => {
            let mut line_number = *raw;
            if let Some(clamp) = options.line_clamp
            {
                if line_number > clamp
                {
                    line_number = line_number % 1000 + 1;
                }
            }
            format!("    .line {}", line_number)
        }
        DebugItemKind::PrologueEnd => "    .prologue".to_string(),
        DebugItemKind::EpilogueBegin => "    .epilogue".to_string(),
        DebugItemKind::SetSourceFile(file) => format!("    .source \"{}\"", file),
    };

    BodyItem {
        address: item.address,
        sort_order: item.sort_order(),
        end_local_register,
        text,
    }
}

/// `"name":Type` with `null` / `V` standing in for missing halves, plus a
/// trailing quoted signature when one exists.
fn local_info(name: &str, type_desc: &str, signature: &str) -> String
{
    let mut out = String::new();
    if name.is_empty()
    {
        out.push_str("null");
    }
    else
    {
        out.push_str(&format!("\"{}\"", name));
    }
    out.push(':');
    if type_desc.is_empty()
    {
        out.push('V');
    }
    else
    {
        out.push_str(type_desc);
    }
    if !signature.is_empty()
    {
        out.push_str(&format!(", \"{}\"", signature));
    }
    out
}

/// Registers in the last `ins_size` slots of the frame are parameter
/// registers and print as `pN`.
pub(crate) fn format_register(register: u32, registers_size: u16, ins_size: u16) -> String
{
    let base = registers_size.saturating_sub(ins_size) as u32;
    if ins_size > 0 && register >= base
    {
        format!("p{}", register - base)
    }
    else
    {
        format!("v{}", register)
    }
}

/// Re-map `vN` tokens in rendered instruction text to `pN` names. Higher
/// registers are replaced first so `v1` is never matched inside `v10`, and
/// a token only matches when bounded by non-identifier characters.
pub(crate) fn remap_registers(text: &str, registers_size: u16, ins_size: u16) -> String
{
    if ins_size == 0 || registers_size == 0 || ins_size > registers_size
    {
        return text.to_string();
    }
    let base = registers_size - ins_size;
    let mut out = text.to_string();
    for register in (base..registers_size).rev()
    {
        let old = format!("v{}", register);
        let new = format!("p{}", register - base);
        out = replace_token(&out, &old, &new);
    }
    out
}

fn replace_token(text: &str, old: &str, new: &str) -> String
{
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len()
    {
        if text[i..].starts_with(old)
        {
            let boundary_before = i == 0 || {
                let c = bytes[i - 1];
                !(c.is_ascii_alphanumeric() || c == b'_')
            };
            let end = i + old.len();
            let boundary_after = end >= bytes.len() || {
                let c = bytes[end];
                !(c.is_ascii_alphanumeric() || c == b'_')
            };
            if boundary_before && boundary_after
            {
                out.push_str(new);
                i = end;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

/// `Lpkg/Name;` becomes `pkg/Name.smali`; anything that is not an object
/// descriptor keeps its text.
pub fn smali_file_path(descriptor: &str) -> String
{
    let stripped = if descriptor.len() > 2 && descriptor.starts_with('L') && descriptor.ends_with(';')
    {
        &descriptor[1..descriptor.len() - 1]
    }
    else
    {
        descriptor
    };
    format!("{}.smali", stripped)
}

/// Allocates output paths, breaking case-insensitive collisions across the
/// class set with a numeric suffix before the extension. The counter map is
/// the one piece of shared mutable state across concurrent renderers.
pub struct PathAllocator
{
    counters: Mutex<HashMap<String, u32>>,
}

impl PathAllocator
{
    pub fn new() -> PathAllocator
    {
        PathAllocator { counters: Mutex::new(HashMap::new()) }
    }

    pub fn allocate(&self, descriptor: &str) -> String
    {
        let base = smali_file_path(descriptor);
        let key = base.to_lowercase();
        let mut counters = match self.counters.lock()
        {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match counters.entry(key)
        {
            Entry::Vacant(v) => {
                v.insert(0);
                base
            }
            Entry::Occupied(mut o) => {
                *o.get_mut() += 1;
                let n = *o.get();
                let stem = base.strip_suffix(".smali").unwrap_or(&base);
                format!("{}.{}.smali", stem, n)
            }
        }
    }
}

impl Default for PathAllocator
{
    fn default() -> Self
    {
        PathAllocator::new()
    }
}
