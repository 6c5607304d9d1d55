/* class_data_item, code_item and the per-class model assembly.

   Field and method indices in class_data are ULEB128 differences from the
   previous entry; they are accumulated here into absolute pool indices. */

use log::debug;

use crate::dex::annotations;
use crate::dex::debug_info::{decode_debug_info, MethodContext};
use crate::dex::dex_file::{ClassDefItem, DexFile, NO_INDEX};
use crate::dex::encoded_values::read_encoded_array;
use crate::dex::error::{DexError, ErrorKind};
use crate::dex::instructions::decode_instructions;
use crate::fail;
use crate::types::{AccessFlags, DexClass, DexCode, DexField, DexMethod};

/// Decode one class def into a self-contained model. Failures below the
/// structural level (a bad code item, a bad annotation block) degrade to the
/// affected piece being absent rather than failing the class.
pub(crate) fn decode_class(dex: &DexFile, def: ClassDefItem) -> Result<DexClass, DexError>
{
    let name = match dex.type_opt(def.class_idx)
    {
        Some(s) => s.to_string(),
        None => fail!(IndexOutOfPool, "class def names type {} out of pool", def.class_idx),
    };

    let superclass = if def.superclass_idx != NO_INDEX
    {
        dex.type_opt(def.superclass_idx).map(|s| s.to_string())
    }
    else
    {
        None
    };

    let source_file = if def.source_file_idx != NO_INDEX
    {
        dex.string_opt(def.source_file_idx).map(|s| s.to_string())
    }
    else
    {
        None
    };

    let mut class = DexClass {
        class_idx: def.class_idx,
        access_flags: def.access_flags,
        name,
        superclass,
        source_file,
        interfaces: vec![],
        annotations: vec![],
        static_fields: vec![],
        instance_fields: vec![],
        direct_methods: vec![],
        virtual_methods: vec![],
    };

    if def.interfaces_off != 0
    {
        match dex.read_type_list(def.interfaces_off as usize)
        {
            Ok(idxs) => {
                class.interfaces = idxs.iter().map(|t| dex.type_desc(*t as u32)).collect();
            }
            Err(e) => debug!("dropping interfaces of {}: {}", class.name, e),
        }
    }

    if def.class_data_off != 0
    {
        read_class_data(dex, def.class_data_off as usize, &mut class)?;
    }

    if def.static_values_off != 0
    {
        apply_static_values(dex, def.static_values_off as usize, &mut class);
    }

    if def.annotations_off != 0
    {
        apply_annotations(dex, def.annotations_off as usize, &mut class);
    }

    Ok(class)
}

fn read_class_data(dex: &DexFile, offset: usize, class: &mut DexClass) -> Result<(), DexError>
{
    let mut cursor = dex.cursor_at(offset)?;

    let static_fields_size = cursor.read_uleb128()?;
    let instance_fields_size = cursor.read_uleb128()?;
    let direct_methods_size = cursor.read_uleb128()?;
    let virtual_methods_size = cursor.read_uleb128()?;

    let mut field_idx = 0u32;
    for _ in 0..static_fields_size
    {
        field_idx = field_idx.wrapping_add(cursor.read_uleb128()?);
        let access_flags = cursor.read_uleb128()?;
        class.static_fields.push(make_field(dex, field_idx, access_flags));
    }

    field_idx = 0;
    for _ in 0..instance_fields_size
    {
        field_idx = field_idx.wrapping_add(cursor.read_uleb128()?);
        let access_flags = cursor.read_uleb128()?;
        class.instance_fields.push(make_field(dex, field_idx, access_flags));
    }

    let mut method_idx = 0u32;
    for _ in 0..direct_methods_size
    {
        method_idx = method_idx.wrapping_add(cursor.read_uleb128()?);
        let access_flags = cursor.read_uleb128()?;
        let code_off = cursor.read_uleb128()?;
        class.direct_methods.push(make_method(dex, method_idx, access_flags, code_off));
    }

    method_idx = 0;
    for _ in 0..virtual_methods_size
    {
        method_idx = method_idx.wrapping_add(cursor.read_uleb128()?);
        let access_flags = cursor.read_uleb128()?;
        let code_off = cursor.read_uleb128()?;
        class.virtual_methods.push(make_method(dex, method_idx, access_flags, code_off));
    }

    Ok(())
}

fn make_field(dex: &DexFile, field_idx: u32, access_flags: u32) -> DexField
{
    let (name, type_desc) = match dex.field_id(field_idx)
    {
        Some(id) => (dex.string(id.name_idx), dex.type_desc(id.type_idx as u32)),
        None => (String::new(), String::new()),
    };

    DexField {
        field_idx,
        access_flags,
        name,
        type_desc,
        initial_value: None,
        annotations: vec![],
    }
}

fn make_method(dex: &DexFile, method_idx: u32, access_flags: u32, code_off: u32) -> DexMethod
{
    let (name, signature, class_desc) = match dex.method_id(method_idx)
    {
        Some(id) => (
            dex.string(id.name_idx),
            dex.proto_desc(id.proto_idx as u32),
            dex.type_desc(id.class_idx as u32),
        ),
        None => (String::new(), "()V".to_string(), String::new()),
    };

    let is_static = access_flags & AccessFlags::STATIC.bits() != 0;

    let code = if code_off != 0
    {
        let ctx = MethodContext {
            class_desc: &class_desc,
            signature: &signature,
            is_static,
        };
        match read_code_item(dex, code_off as usize, &ctx)
        {
            Ok(code) => Some(code),
            Err(e) => {
                debug!("dropping code of {}->{}{}: {}", class_desc, name, signature, e);
                None
            }
        }
    }
    else
    {
        None
    };

    DexMethod {
        method_idx,
        access_flags,
        name,
        signature,
        code,
        annotations: vec![],
        parameter_annotations: vec![],
    }
}

/// code_item: a 16-byte fixed header, then `insns_size` code units. Tries
/// and handlers follow in the file but are not decoded.
fn read_code_item(dex: &DexFile, offset: usize, ctx: &MethodContext) -> Result<DexCode, DexError>
{
    let mut cursor = dex.cursor_at(offset)?;

    let registers_size = cursor.read_u16()?;
    let ins_size = cursor.read_u16()?;
    let outs_size = cursor.read_u16()?;
    let tries_size = cursor.read_u16()?;
    let debug_info_off = cursor.read_u32()?;
    let insns_size = cursor.read_u32()?;

    let mut insns = Vec::with_capacity((insns_size as usize).min(1 << 16));
    for _ in 0..insns_size
    {
        insns.push(cursor.read_u16()?);
    }

    let instructions = decode_instructions(&insns, dex);

    let debug_items = if debug_info_off != 0
    {
        decode_debug_info(dex, debug_info_off as usize, registers_size, ctx)
    }
    else
    {
        vec![]
    };

    Ok(DexCode {
        registers_size,
        ins_size,
        outs_size,
        tries_size,
        debug_info_off,
        insns,
        instructions,
        debug_items,
    })
}

/// The static-values encoded array is assigned index-wise to the class's
/// static fields.
fn apply_static_values(dex: &DexFile, offset: usize, class: &mut DexClass)
{
    let mut cursor = match dex.cursor_at(offset)
    {
        Ok(c) => c,
        Err(e) => {
            debug!("dropping static values of {}: {}", class.name, e);
            return;
        }
    };

    match read_encoded_array(&mut cursor)
    {
        Ok(values) => {
            for (field, value) in class.static_fields.iter_mut().zip(values.iter())
            {
                field.initial_value = Some(value.render(dex));
            }
        }
        Err(e) => debug!("dropping static values of {}: {}", class.name, e),
    }
}

/// Walk the annotations directory and attach each set to the matching
/// class, field, method or parameter. Entries whose pool index matches
/// nothing in the decoded class are dropped.
fn apply_annotations(dex: &DexFile, offset: usize, class: &mut DexClass)
{
    let directory = match annotations::read_directory(dex, offset)
    {
        Ok(d) => d,
        Err(e) => {
            debug!("dropping annotations of {}: {}", class.name, e);
            return;
        }
    };

    if directory.class_annotations_off != 0
    {
        match annotations::read_annotation_set(dex, directory.class_annotations_off as usize)
        {
            Ok(set) => class.annotations = set,
            Err(e) => debug!("dropping class annotations of {}: {}", class.name, e),
        }
    }

    for (field_idx, set_off) in directory.field_annotations
    {
        let set = match annotations::read_annotation_set(dex, set_off as usize)
        {
            Ok(set) => set,
            Err(e) => {
                debug!("dropping field annotations in {}: {}", class.name, e);
                continue;
            }
        };
        let field = class
            .static_fields
            .iter_mut()
            .chain(class.instance_fields.iter_mut())
            .find(|f| f.field_idx == field_idx);
        if let Some(field) = field
        {
            field.annotations = set;
        }
    }

    for (method_idx, set_off) in directory.method_annotations
    {
        let set = match annotations::read_annotation_set(dex, set_off as usize)
        {
            Ok(set) => set,
            Err(e) => {
                debug!("dropping method annotations in {}: {}", class.name, e);
                continue;
            }
        };
        let method = class
            .direct_methods
            .iter_mut()
            .chain(class.virtual_methods.iter_mut())
            .find(|m| m.method_idx == method_idx);
        if let Some(method) = method
        {
            method.annotations = set;
        }
    }

    for (method_idx, list_off) in directory.parameter_annotations
    {
        let sets = match annotations::read_annotation_set_ref_list(dex, list_off as usize)
        {
            Ok(sets) => sets,
            Err(e) => {
                debug!("dropping parameter annotations in {}: {}", class.name, e);
                continue;
            }
        };
        let method = class
            .direct_methods
            .iter_mut()
            .chain(class.virtual_methods.iter_mut())
            .find(|m| m.method_idx == method_idx);
        if let Some(method) = method
        {
            method.parameter_annotations = sets
                .into_iter()
                .enumerate()
                .filter(|(_, set)| !set.is_empty())
                .collect();
        }
    }
}
