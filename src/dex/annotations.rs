//! Readers for the annotation structures of the DEX data section:
//! annotations_directory_item, annotation_set_item, annotation_set_ref_list
//! and annotation_item. Elements come back already rendered to smali text.

use crate::dex::dex_file::DexFile;
use crate::dex::encoded_values::EncodedValue;
use crate::dex::error::DexError;
use crate::types::{AnnotationVisibility, DexAnnotation};

/// annotations_directory_item: the class set plus (index, offset) tables for
/// annotated fields, methods and method parameters.
#[derive(Debug)]
pub(crate) struct AnnotationsDirectory {
    pub class_annotations_off: u32,
    pub field_annotations: Vec<(u32, u32)>,
    pub method_annotations: Vec<(u32, u32)>,
    pub parameter_annotations: Vec<(u32, u32)>,
}

pub(crate) fn read_directory(dex: &DexFile, offset: usize) -> Result<AnnotationsDirectory, DexError> {
    let mut cursor = dex.cursor_at(offset)?;
    let class_annotations_off = cursor.read_u32()?;
    let fields_size = cursor.read_u32()? as usize;
    let methods_size = cursor.read_u32()? as usize;
    let parameters_size = cursor.read_u32()? as usize;

    let mut field_annotations = Vec::with_capacity(fields_size.min(1024));
    for _ in 0..fields_size {
        field_annotations.push((cursor.read_u32()?, cursor.read_u32()?));
    }
    let mut method_annotations = Vec::with_capacity(methods_size.min(1024));
    for _ in 0..methods_size {
        method_annotations.push((cursor.read_u32()?, cursor.read_u32()?));
    }
    let mut parameter_annotations = Vec::with_capacity(parameters_size.min(1024));
    for _ in 0..parameters_size {
        parameter_annotations.push((cursor.read_u32()?, cursor.read_u32()?));
    }

    Ok(AnnotationsDirectory {
        class_annotations_off,
        field_annotations,
        method_annotations,
        parameter_annotations,
    })
}

/// annotation_set_item: a 32-bit count then offsets to annotation_items.
pub(crate) fn read_annotation_set(dex: &DexFile, offset: usize) -> Result<Vec<DexAnnotation>, DexError> {
    let mut cursor = dex.cursor_at(offset)?;
    let size = cursor.read_u32()? as usize;
    let mut entries = Vec::with_capacity(size.min(1024));
    for _ in 0..size {
        entries.push(cursor.read_u32()?);
    }

    let mut annotations = Vec::with_capacity(entries.len());
    for entry in entries {
        annotations.push(read_annotation_item(dex, entry as usize)?);
    }
    Ok(annotations)
}

/// annotation_set_ref_list: one annotation set per method parameter, with 0
/// standing for a parameter that has none.
pub(crate) fn read_annotation_set_ref_list(
    dex: &DexFile,
    offset: usize,
) -> Result<Vec<Vec<DexAnnotation>>, DexError> {
    let mut cursor = dex.cursor_at(offset)?;
    let size = cursor.read_u32()? as usize;
    let mut offsets = Vec::with_capacity(size.min(1024));
    for _ in 0..size {
        offsets.push(cursor.read_u32()?);
    }

    let mut sets = Vec::with_capacity(offsets.len());
    for set_off in offsets {
        if set_off == 0 {
            sets.push(vec![]);
        } else {
            sets.push(read_annotation_set(dex, set_off as usize)?);
        }
    }
    Ok(sets)
}

/// annotation_item: a visibility byte then an encoded_annotation
/// (type index, element count, name/value pairs).
pub(crate) fn read_annotation_item(dex: &DexFile, offset: usize) -> Result<DexAnnotation, DexError> {
    let mut cursor = dex.cursor_at(offset)?;
    let visibility = AnnotationVisibility::from_u8(cursor.read_u8()?);

    let type_idx = cursor.read_uleb128()?;
    let size = cursor.read_uleb128()? as usize;
    let mut elements = Vec::with_capacity(size.min(1024));
    for _ in 0..size {
        let name_idx = cursor.read_uleb128()?;
        let value = EncodedValue::read(&mut cursor)?;
        elements.push((dex.string(name_idx), value.render(dex)));
    }

    Ok(DexAnnotation {
        visibility,
        type_desc: dex.type_desc(type_idx),
        elements,
    })
}
