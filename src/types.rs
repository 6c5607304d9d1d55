/* The decoded class model: plain value data, produced once by the decoder
   and read by the writer. */

use bitflags::bitflags;

bitflags! {
    /// Modifier bits attached to classes, fields and methods.
    pub struct AccessFlags: u32 {
        const PUBLIC                = 0x1;
        const PRIVATE               = 0x2;
        const PROTECTED             = 0x4;
        const STATIC                = 0x8;
        const FINAL                 = 0x10;
        const SYNCHRONIZED          = 0x20;
        const VOLATILE              = 0x40;   // fields
        const BRIDGE                = 0x40;   // methods
        const TRANSIENT             = 0x80;   // fields
        const VARARGS               = 0x80;   // methods
        const NATIVE                = 0x100;
        const INTERFACE             = 0x200;
        const ABSTRACT              = 0x400;
        const STRICT                = 0x800;
        const SYNTHETIC             = 0x1000;
        const ANNOTATION            = 0x2000;
        const ENUM                  = 0x4000;
        const CONSTRUCTOR           = 0x10000;
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

/// What kind of declaration a flag word belongs to; 0x40 and 0x80 read
/// differently on fields and methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagTarget
{
    Class,
    Field,
    Method,
}

/// Render a flag word in the canonical smali order, each flag followed by a
/// space. `interface` comes before `abstract`.
pub fn access_flags_smali(flags: u32, target: FlagTarget) -> String
{
    let f = AccessFlags::from_bits_truncate(flags);
    let mut out = String::new();
    let mut push = |s: &str| {
        out.push_str(s);
        out.push(' ');
    };

    if f.contains(AccessFlags::PUBLIC) { push("public"); }
    if f.contains(AccessFlags::PRIVATE) { push("private"); }
    if f.contains(AccessFlags::PROTECTED) { push("protected"); }
    if f.contains(AccessFlags::STATIC) { push("static"); }
    if f.contains(AccessFlags::FINAL) { push("final"); }
    if f.contains(AccessFlags::SYNCHRONIZED) { push("synchronized"); }
    if f.contains(AccessFlags::VOLATILE)
    {
        match target
        {
            FlagTarget::Method => push("bridge"),
            _ => push("volatile"),
        }
    }
    if f.contains(AccessFlags::TRANSIENT)
    {
        match target
        {
            FlagTarget::Method => push("varargs"),
            _ => push("transient"),
        }
    }
    if f.contains(AccessFlags::NATIVE) { push("native"); }
    if f.contains(AccessFlags::INTERFACE) { push("interface"); }
    if f.contains(AccessFlags::ABSTRACT) { push("abstract"); }
    if f.contains(AccessFlags::STRICT) { push("strict"); }
    if f.contains(AccessFlags::SYNTHETIC) { push("synthetic"); }
    if f.contains(AccessFlags::ANNOTATION) { push("annotation"); }
    if f.contains(AccessFlags::ENUM) { push("enum"); }
    if f.contains(AccessFlags::CONSTRUCTOR) { push("constructor"); }
    if f.contains(AccessFlags::DECLARED_SYNCHRONIZED) { push("declared-synchronized"); }

    out
}

/// Annotation visibility: build, runtime or system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationVisibility
{
    Build,
    Runtime,
    System,
}

impl AnnotationVisibility
{
    pub fn from_u8(v: u8) -> Self
    {
        match v
        {
            0x00 => Self::Build,
            0x02 => Self::System,
            _ => Self::Runtime,
        }
    }

    pub fn to_str(&self) -> &'static str
    {
        match self
        {
            Self::Build => "build",
            Self::Runtime => "runtime",
            Self::System => "system",
        }
    }
}

/// An annotation with its elements already rendered to smali text.
#[derive(Debug, Clone)]
pub struct DexAnnotation
{
    pub visibility: AnnotationVisibility,
    pub type_desc: String,
    /// Ordered (name, rendered value) pairs.
    pub elements: Vec<(String, String)>,
}

/// A field of a class, resolved through the pools.
#[derive(Debug)]
pub struct DexField
{
    pub field_idx: u32,
    pub access_flags: u32,
    pub name: String,
    pub type_desc: String,
    /// Rendered encoded value from the class's static-values array.
    pub initial_value: Option<String>,
    pub annotations: Vec<DexAnnotation>,
}

/// A single decoded instruction. `address` and `width` are in 16-bit code
/// units; `mnemonic` is the operand-resolved text before register
/// re-mapping.
#[derive(Debug, Clone)]
pub struct DexInstruction
{
    pub address: u32,
    pub opcode: u8,
    pub width: u32,
    pub mnemonic: String,
}

/// One event from the debug-info state machine.
#[derive(Debug, Clone)]
pub enum DebugItemKind
{
    StartLocal { register: u32, name: String, type_desc: String, signature: String },
    EndLocal { register: u32, name: String, type_desc: String, signature: String },
    RestartLocal { register: u32, name: String, type_desc: String, signature: String },
    LineNumber(u32),
    PrologueEnd,
    EpilogueBegin,
    SetSourceFile(String),
}

#[derive(Debug, Clone)]
pub struct DebugItem
{
    /// In code units, like instruction addresses.
    pub address: u32,
    pub kind: DebugItemKind,
}

impl DebugItem
{
    /// Position of this item relative to instructions (100) sharing its
    /// address. Lower sorts first.
    pub fn sort_order(&self) -> i32
    {
        match self.kind
        {
            DebugItemKind::PrologueEnd | DebugItemKind::EpilogueBegin => -4,
            DebugItemKind::SetSourceFile(_) => -3,
            DebugItemKind::LineNumber(_) => -2,
            DebugItemKind::StartLocal { .. }
            | DebugItemKind::EndLocal { .. }
            | DebugItemKind::RestartLocal { .. } => -1,
        }
    }
}

/// A parsed code_item. Tries and handlers are skipped over, not modelled.
#[derive(Debug)]
pub struct DexCode
{
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    pub tries_size: u16,
    pub debug_info_off: u32,
    /// The raw instruction stream, `insns_size` 16-bit code units.
    pub insns: Vec<u16>,
    pub instructions: Vec<DexInstruction>,
    pub debug_items: Vec<DebugItem>,
}

#[derive(Debug)]
pub struct DexMethod
{
    pub method_idx: u32,
    pub access_flags: u32,
    pub name: String,
    /// JNI-style signature, e.g. `(ILjava/lang/String;)V`.
    pub signature: String,
    pub code: Option<DexCode>,
    pub annotations: Vec<DexAnnotation>,
    /// (parameter index, annotations) pairs for annotated parameters.
    pub parameter_annotations: Vec<(usize, Vec<DexAnnotation>)>,
}

impl DexMethod
{
    pub fn is_static(&self) -> bool
    {
        self.access_flags & AccessFlags::STATIC.bits() != 0
    }
}

/// A fully decoded class, self-contained: every string is owned.
#[derive(Debug)]
pub struct DexClass
{
    pub class_idx: u32,
    pub access_flags: u32,
    pub name: String,
    pub superclass: Option<String>,
    pub source_file: Option<String>,
    pub interfaces: Vec<String>,
    pub annotations: Vec<DexAnnotation>,
    pub static_fields: Vec<DexField>,
    pub instance_fields: Vec<DexField>,
    pub direct_methods: Vec<DexMethod>,
    pub virtual_methods: Vec<DexMethod>,
}

/// Split the parameter descriptors out of a JNI method signature.
///
/// `(I[Ljava/lang/String;J)V` yields `["I", "[Ljava/lang/String;", "J"]`.
pub fn parameter_types(signature: &str) -> Vec<String>
{
    let mut types = Vec::new();
    let bytes = signature.as_bytes();
    let mut index = match signature.find('(')
    {
        Some(p) => p + 1,
        None => return types,
    };

    while index < bytes.len() && bytes[index] != b')'
    {
        let start = index;
        while index < bytes.len() && bytes[index] == b'['
        {
            index += 1;
        }
        if index >= bytes.len()
        {
            break;
        }
        if bytes[index] == b'L'
        {
            match signature[index..].find(';')
            {
                Some(semi) => index += semi + 1,
                None => break,
            }
        }
        else
        {
            index += 1;
        }
        types.push(signature[start..index].to_string());
    }
    types
}

/// Wide types occupy two registers.
pub fn is_wide_type(desc: &str) -> bool
{
    desc == "J" || desc == "D"
}
