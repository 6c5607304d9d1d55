/* Dex container structures and the decoded image */

use std::cmp::Ordering;

use log::warn;

use crate::dex::class_data;
use crate::dex::cursor::ByteCursor;
use crate::dex::error::{DexError, ErrorKind};
use crate::dex::escape_utf8_bytes;
use crate::dex::instructions::RefResolver;
use crate::fail;
use crate::smali_write::{write_class, PathAllocator};
use crate::types::{AnnotationVisibility, DexAnnotation, DexClass};

/* Constants */
pub const DEX_MAGIC_V035: [u8; 8] = [0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x35, 0x00];
pub const DEX_MAGIC_V037: [u8; 8] = [0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x37, 0x00];
pub const DEX_MAGIC_V038: [u8; 8] = [0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x38, 0x00];
pub const DEX_MAGIC_V039: [u8; 8] = [0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x39, 0x00];
pub const NO_INDEX: u32 = 0xffff_ffff;
pub const HEADER_SIZE: u32 = 0x70;

const MEMBER_CLASSES_TYPE: &str = "Ldalvik/annotation/MemberClasses;";

#[derive(Debug, PartialEq, Eq)]
pub struct Header
{
    pub magic: [u8; 8],
    pub checksum: u32,
    pub signature: [u8; 20],
    pub file_size: u32,
    pub header_size: u32,
    pub endian_tag: u32,
    pub link_size: u32,
    pub link_off: u32,
    pub map_off: u32,
    pub string_ids_size: u32,
    pub string_ids_off: u32,
    pub type_ids_size: u32,
    pub type_ids_off: u32,
    pub proto_ids_size: u32,
    pub proto_ids_off: u32,
    pub field_ids_size: u32,
    pub field_ids_off: u32,
    pub method_ids_size: u32,
    pub method_ids_off: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,
    pub data_size: u32,
    pub data_off: u32,
}

impl Header
{
    pub fn read(cursor: &mut ByteCursor) -> Result<Header, DexError>
    {
        let magic = <[u8; 8]>::try_from(cursor.read_bytes(8).map_err(|_| {
            DexError::new(ErrorKind::InvalidMagic, "buffer too short for a DEX magic")
        })?)
        .expect("eight bytes");

        if magic != DEX_MAGIC_V035
            && magic != DEX_MAGIC_V037
            && magic != DEX_MAGIC_V038
            && magic != DEX_MAGIC_V039
        {
            fail!(InvalidMagic, "unsupported DEX magic {:02x?}", magic);
        }

        Ok(Header {
            magic,
            checksum: cursor.read_u32()?,
            signature: <[u8; 20]>::try_from(cursor.read_bytes(20)?).expect("twenty bytes"),
            file_size: cursor.read_u32()?,
            header_size: cursor.read_u32()?,
            endian_tag: cursor.read_u32()?,
            link_size: cursor.read_u32()?,
            link_off: cursor.read_u32()?,
            map_off: cursor.read_u32()?,
            string_ids_size: cursor.read_u32()?,
            string_ids_off: cursor.read_u32()?,
            type_ids_size: cursor.read_u32()?,
            type_ids_off: cursor.read_u32()?,
            proto_ids_size: cursor.read_u32()?,
            proto_ids_off: cursor.read_u32()?,
            field_ids_size: cursor.read_u32()?,
            field_ids_off: cursor.read_u32()?,
            method_ids_size: cursor.read_u32()?,
            method_ids_off: cursor.read_u32()?,
            class_defs_size: cursor.read_u32()?,
            class_defs_off: cursor.read_u32()?,
            data_size: cursor.read_u32()?,
            data_off: cursor.read_u32()?,
        })
    }
}

#[derive(Debug)]
pub(crate) struct ProtoIdItem
{
    pub return_type_idx: u32,
    pub parameter_type_idxs: Vec<u16>,
}

#[derive(Debug)]
pub(crate) struct FieldIdItem
{
    pub class_idx: u16,
    pub type_idx: u16,
    pub name_idx: u32,
}

#[derive(Debug)]
pub(crate) struct MethodIdItem
{
    pub class_idx: u16,
    pub proto_idx: u16,
    pub name_idx: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ClassDefItem
{
    pub class_idx: u32,
    pub access_flags: u32,
    pub superclass_idx: u32,
    pub interfaces_off: u32,
    pub source_file_idx: u32,
    pub annotations_off: u32,
    pub class_data_off: u32,
    pub static_values_off: u32,
}

/// A decoded DEX image: the raw buffer plus every pool and class model,
/// built eagerly and read-only afterwards. Rendering never mutates it, so
/// classes may be written out concurrently.
#[derive(Debug)]
pub struct DexFile
{
    bytes: Vec<u8>,
    pub header: Header,
    strings: Vec<String>,
    types: Vec<String>,
    protos: Vec<ProtoIdItem>,
    field_ids: Vec<FieldIdItem>,
    method_ids: Vec<MethodIdItem>,
    class_defs: Vec<ClassDefItem>,
    classes: Vec<DexClass>,
    class_errors: Vec<DexError>,
}

impl DexFile
{
    /// Build an image from a byte buffer. Header and pool failures abort the
    /// whole construction; a class that fails to decode is skipped and
    /// recorded in `class_errors`.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<DexFile, DexError>
    {
        let mut cursor = ByteCursor::new(&bytes);
        let header = Header::read(&mut cursor)?;

        if header.header_size != HEADER_SIZE
        {
            fail!(HeaderMismatch, "header size 0x{:x}, expected 0x{:x}", header.header_size, HEADER_SIZE);
        }
        if header.file_size as usize != bytes.len()
        {
            fail!(HeaderMismatch, "header claims {} bytes but the buffer holds {}", header.file_size, bytes.len());
        }
        if bytes.len() >= 12 && adler::adler32_slice(&bytes[12..]) != header.checksum
        {
            warn!("DEX checksum mismatch: header says 0x{:08x}", header.checksum);
        }

        let mut dex = DexFile {
            bytes,
            header,
            strings: vec![],
            types: vec![],
            protos: vec![],
            field_ids: vec![],
            method_ids: vec![],
            class_defs: vec![],
            classes: vec![],
            class_errors: vec![],
        };

        dex.strings = dex.parse_strings()?;
        dex.types = dex.parse_types()?;
        dex.protos = dex.parse_protos()?;
        dex.field_ids = dex.parse_field_ids()?;
        dex.method_ids = dex.parse_method_ids()?;
        dex.class_defs = dex.parse_class_defs()?;
        dex.decode_classes();
        synthesise_member_classes(&mut dex.classes);

        Ok(dex)
    }

    fn parse_strings(&self) -> Result<Vec<String>, DexError>
    {
        let mut ids = self.cursor_at(self.header.string_ids_off as usize)?;
        let mut strings = Vec::with_capacity(self.header.string_ids_size as usize);
        for i in 0..self.header.string_ids_size
        {
            let data_off = ids.read_u32().map_err(|e| {
                DexError::with_context(e, format!("string id {}", i))
            })?;
            let mut data = self.cursor_at(data_off as usize)?;
            let utf16_size = data.read_uleb128()? as usize;
            let raw = data.read_cstr_within(utf16_size.saturating_mul(3) + 1)?;
            strings.push(escape_utf8_bytes(&raw));
        }
        Ok(strings)
    }

    fn parse_types(&self) -> Result<Vec<String>, DexError>
    {
        let mut ids = self.cursor_at(self.header.type_ids_off as usize)?;
        let mut types = Vec::with_capacity(self.header.type_ids_size as usize);
        for i in 0..self.header.type_ids_size
        {
            let descriptor_idx = ids.read_u32()?;
            match self.strings.get(descriptor_idx as usize)
            {
                Some(s) => types.push(s.clone()),
                None => fail!(IndexOutOfPool, "type id {} names string {} of {}", i, descriptor_idx, self.strings.len()),
            }
        }
        Ok(types)
    }

    fn parse_protos(&self) -> Result<Vec<ProtoIdItem>, DexError>
    {
        let mut ids = self.cursor_at(self.header.proto_ids_off as usize)?;
        let mut protos = Vec::with_capacity(self.header.proto_ids_size as usize);
        for _ in 0..self.header.proto_ids_size
        {
            // The shorty is redundant with the rendered signature.
            let _shorty_idx = ids.read_u32()?;
            let return_type_idx = ids.read_u32()?;
            let parameters_off = ids.read_u32()?;
            let parameter_type_idxs = if parameters_off != 0
            {
                self.read_type_list(parameters_off as usize)?
            }
            else
            {
                vec![]
            };
            protos.push(ProtoIdItem { return_type_idx, parameter_type_idxs });
        }
        Ok(protos)
    }

    fn parse_field_ids(&self) -> Result<Vec<FieldIdItem>, DexError>
    {
        let mut ids = self.cursor_at(self.header.field_ids_off as usize)?;
        let mut field_ids = Vec::with_capacity(self.header.field_ids_size as usize);
        for i in 0..self.header.field_ids_size
        {
            let class_idx = ids.read_u16()?;
            let type_idx = ids.read_u16()?;
            let name_idx = ids.read_u32()?;
            if name_idx as usize >= self.strings.len()
            {
                fail!(IndexOutOfPool, "field id {} names string {} of {}", i, name_idx, self.strings.len());
            }
            field_ids.push(FieldIdItem { class_idx, type_idx, name_idx });
        }
        Ok(field_ids)
    }

    fn parse_method_ids(&self) -> Result<Vec<MethodIdItem>, DexError>
    {
        let mut ids = self.cursor_at(self.header.method_ids_off as usize)?;
        let mut method_ids = Vec::with_capacity(self.header.method_ids_size as usize);
        for i in 0..self.header.method_ids_size
        {
            let class_idx = ids.read_u16()?;
            let proto_idx = ids.read_u16()?;
            let name_idx = ids.read_u32()?;
            if name_idx as usize >= self.strings.len()
            {
                fail!(IndexOutOfPool, "method id {} names string {} of {}", i, name_idx, self.strings.len());
            }
            method_ids.push(MethodIdItem { class_idx, proto_idx, name_idx });
        }
        Ok(method_ids)
    }

    fn parse_class_defs(&self) -> Result<Vec<ClassDefItem>, DexError>
    {
        let mut defs = self.cursor_at(self.header.class_defs_off as usize)?;
        let mut class_defs = Vec::with_capacity(self.header.class_defs_size as usize);
        for _ in 0..self.header.class_defs_size
        {
            class_defs.push(ClassDefItem {
                class_idx: defs.read_u32()?,
                access_flags: defs.read_u32()?,
                superclass_idx: defs.read_u32()?,
                interfaces_off: defs.read_u32()?,
                source_file_idx: defs.read_u32()?,
                annotations_off: defs.read_u32()?,
                class_data_off: defs.read_u32()?,
                static_values_off: defs.read_u32()?,
            });
        }
        Ok(class_defs)
    }

    /// A failure in one class never aborts the others.
    fn decode_classes(&mut self)
    {
        let mut decoded = Vec::with_capacity(self.class_defs.len());
        let mut errors = Vec::new();
        for def in &self.class_defs
        {
            match class_data::decode_class(self, *def)
            {
                Ok(class) => decoded.push(class),
                Err(cause) => {
                    let name = self.type_desc(def.class_idx);
                    let err = DexError::new(
                        ErrorKind::DecodeClassFailed,
                        &format!("failed to decode class {}: {}", name, cause),
                    );
                    warn!("{}", err);
                    errors.push(err);
                }
            }
        }
        self.classes = decoded;
        self.class_errors = errors;
    }

    /* Rendering lookups. Out-of-range indices fall back to the empty
       string; a damaged pool degrades the output, not the decode. */

    pub fn string(&self, idx: u32) -> String
    {
        self.strings.get(idx as usize).cloned().unwrap_or_default()
    }

    pub(crate) fn string_opt(&self, idx: u32) -> Option<&str>
    {
        self.strings.get(idx as usize).map(|s| s.as_str())
    }

    pub fn type_desc(&self, idx: u32) -> String
    {
        self.types.get(idx as usize).cloned().unwrap_or_default()
    }

    pub(crate) fn type_opt(&self, idx: u32) -> Option<&str>
    {
        self.types.get(idx as usize).map(|s| s.as_str())
    }

    /// `(parameter descriptors)return descriptor`
    pub fn proto_desc(&self, idx: u32) -> String
    {
        let proto = match self.protos.get(idx as usize)
        {
            Some(p) => p,
            None => return String::new(),
        };
        let mut s = "(".to_string();
        for t in &proto.parameter_type_idxs
        {
            s.push_str(&self.type_desc(*t as u32));
        }
        s.push(')');
        s.push_str(&self.type_desc(proto.return_type_idx));
        s
    }

    /// `Lcls;->name:Type`
    pub fn field_ref(&self, idx: u32) -> String
    {
        let field = match self.field_ids.get(idx as usize)
        {
            Some(f) => f,
            None => return String::new(),
        };
        format!(
            "{}->{}:{}",
            self.type_desc(field.class_idx as u32),
            self.string(field.name_idx),
            self.type_desc(field.type_idx as u32)
        )
    }

    /// `Lcls;->name(params)ret`
    pub fn method_ref(&self, idx: u32) -> String
    {
        let method = match self.method_ids.get(idx as usize)
        {
            Some(m) => m,
            None => return String::new(),
        };
        format!(
            "{}->{}{}",
            self.type_desc(method.class_idx as u32),
            self.string(method.name_idx),
            self.proto_desc(method.proto_idx as u32)
        )
    }

    pub(crate) fn field_id(&self, idx: u32) -> Option<&FieldIdItem>
    {
        self.field_ids.get(idx as usize)
    }

    pub(crate) fn method_id(&self, idx: u32) -> Option<&MethodIdItem>
    {
        self.method_ids.get(idx as usize)
    }

    pub(crate) fn cursor_at(&self, offset: usize) -> Result<ByteCursor, DexError>
    {
        let mut cursor = ByteCursor::new(&self.bytes);
        cursor.seek(offset)?;
        Ok(cursor)
    }

    /// type_list: a 32-bit count followed by 16-bit type indices.
    pub(crate) fn read_type_list(&self, offset: usize) -> Result<Vec<u16>, DexError>
    {
        let mut cursor = self.cursor_at(offset)?;
        let size = cursor.read_u32()?;
        let mut list = Vec::with_capacity((size as usize).min(1024));
        for _ in 0..size
        {
            list.push(cursor.read_u16()?);
        }
        Ok(list)
    }

    pub fn classes(&self) -> &[DexClass]
    {
        &self.classes
    }

    /// Per-class decode failures collected during construction.
    pub fn class_errors(&self) -> &[DexError]
    {
        &self.class_errors
    }

    /// Render every class, with case-insensitive filename dedup.
    pub fn disassemble(&self) -> Vec<(String, String)>
    {
        let paths = PathAllocator::new();
        self.classes
            .iter()
            .map(|class| (paths.allocate(&class.name), write_class(class)))
            .collect()
    }
}

impl RefResolver for DexFile
{
    fn string(&self, idx: u32) -> String
    {
        DexFile::string(self, idx)
    }

    fn type_desc(&self, idx: u32) -> String
    {
        DexFile::type_desc(self, idx)
    }

    fn field_ref(&self, idx: u32) -> String
    {
        DexFile::field_ref(self, idx)
    }

    fn method_ref(&self, idx: u32) -> String
    {
        DexFile::method_ref(self, idx)
    }
}

/// Attach a `dalvik.annotation.MemberClasses` annotation to every class that
/// has `Outer$Suffix` siblings in the image.
fn synthesise_member_classes(classes: &mut [DexClass])
{
    let names: Vec<String> = classes.iter().map(|c| c.name.clone()).collect();

    for class in classes.iter_mut()
    {
        let stripped = strip_descriptor(&class.name);
        if stripped.is_empty()
        {
            continue;
        }
        let prefix = format!("{}$", stripped);

        let mut members: Vec<&String> = names
            .iter()
            .filter(|n| strip_descriptor(n).starts_with(&prefix))
            .collect();
        if members.is_empty()
        {
            continue;
        }
        members.sort_by(|a, b| member_class_order(a, b));

        let mut value = "{\n".to_string();
        for (i, m) in members.iter().enumerate()
        {
            value.push_str("        ");
            value.push_str(m);
            if i + 1 < members.len()
            {
                value.push(',');
            }
            value.push('\n');
        }
        value.push_str("    }");

        class.annotations.push(DexAnnotation {
            visibility: AnnotationVisibility::System,
            type_desc: MEMBER_CLASSES_TYPE.to_string(),
            elements: vec![("value".to_string(), value)],
        });
    }
}

fn strip_descriptor(descriptor: &str) -> &str
{
    if descriptor.len() > 2 && descriptor.starts_with('L') && descriptor.ends_with(';')
    {
        &descriptor[1..descriptor.len() - 1]
    }
    else
    {
        ""
    }
}

/// Order member classes by their `$` suffix: all-numeric suffixes first in
/// numeric order, then alphabetic ones, then mixed, both lexicographically.
fn member_class_order(a: &str, b: &str) -> Ordering
{
    let sa = member_suffix(a);
    let sb = member_suffix(b);
    let ra = suffix_rank(sa);
    let rb = suffix_rank(sb);
    if ra != rb
    {
        return ra.cmp(&rb);
    }
    if ra == 0
    {
        let na: u64 = sa.parse().unwrap_or(u64::MAX);
        let nb: u64 = sb.parse().unwrap_or(u64::MAX);
        if na != nb
        {
            return na.cmp(&nb);
        }
    }
    sa.cmp(sb)
}

fn member_suffix(descriptor: &str) -> &str
{
    let trimmed = descriptor.strip_suffix(';').unwrap_or(descriptor);
    match trimmed.rfind('$')
    {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

fn suffix_rank(suffix: &str) -> u8
{
    if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit())
    {
        0
    }
    else if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_alphabetic())
    {
        1
    }
    else
    {
        2
    }
}
