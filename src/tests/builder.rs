//! A small DEX assembler for tests: enough of the container format to hand
//! the decoder realistic, offset-correct inputs.
//!
//! Pools must be fully registered before data blobs are pushed, because
//! data offsets are absolute and the data section starts where the id
//! sections end.

use byteorder::{ByteOrder, LittleEndian};

pub fn uleb(mut value: u32) -> Vec<u8>
{
    let mut out = Vec::new();
    loop
    {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0
        {
            out.push(byte | 0x80);
        }
        else
        {
            out.push(byte);
            break;
        }
    }
    out
}

pub struct DexBuilder
{
    strings: Vec<Vec<u8>>,
    types: Vec<u32>,
    protos: Vec<(u32, u32, Vec<u16>)>,
    fields: Vec<(u16, u16, u32)>,
    methods: Vec<(u16, u16, u32)>,
    class_defs: Vec<[u32; 8]>,
    data: Vec<u8>,
}

impl DexBuilder
{
    pub fn new() -> DexBuilder
    {
        DexBuilder {
            strings: vec![],
            types: vec![],
            protos: vec![],
            fields: vec![],
            methods: vec![],
            class_defs: vec![],
            data: vec![],
        }
    }

    pub fn string(&mut self, s: &str) -> u32
    {
        self.string_bytes(s.as_bytes())
    }

    pub fn string_bytes(&mut self, bytes: &[u8]) -> u32
    {
        self.strings.push(bytes.to_vec());
        (self.strings.len() - 1) as u32
    }

    pub fn type_id(&mut self, descriptor_string_idx: u32) -> u32
    {
        self.types.push(descriptor_string_idx);
        (self.types.len() - 1) as u32
    }

    /// Parameters are type indices; the list blob is emitted at finish time.
    pub fn proto(&mut self, shorty_idx: u32, return_type_idx: u32, params: &[u16]) -> u32
    {
        self.protos.push((shorty_idx, return_type_idx, params.to_vec()));
        (self.protos.len() - 1) as u32
    }

    pub fn field(&mut self, class_type_idx: u16, type_idx: u16, name_idx: u32) -> u32
    {
        self.fields.push((class_type_idx, type_idx, name_idx));
        (self.fields.len() - 1) as u32
    }

    pub fn method(&mut self, class_type_idx: u16, proto_idx: u16, name_idx: u32) -> u32
    {
        self.methods.push((class_type_idx, proto_idx, name_idx));
        (self.methods.len() - 1) as u32
    }

    pub fn class_def(
        &mut self,
        class_idx: u32,
        access_flags: u32,
        superclass_idx: u32,
        interfaces_off: u32,
        source_file_idx: u32,
        annotations_off: u32,
        class_data_off: u32,
        static_values_off: u32,
    )
    {
        self.class_defs.push([
            class_idx,
            access_flags,
            superclass_idx,
            interfaces_off,
            source_file_idx,
            annotations_off,
            class_data_off,
            static_values_off,
        ]);
    }

    /// Backfill an offset slot of a class def once its data blob has been
    /// pushed (3 = interfaces, 4 = source file, 5 = annotations,
    /// 6 = class data, 7 = static values).
    pub fn patch_class_def(&mut self, index: usize, slot: usize, value: u32)
    {
        self.class_defs[index][slot] = value;
    }

    /// Absolute offset where the next data blob will land.
    pub fn next_data_off(&self) -> u32
    {
        self.ids_end() + self.data.len() as u32
    }

    /// Append a blob to the data section, returning its absolute offset.
    pub fn push_data(&mut self, bytes: &[u8]) -> u32
    {
        let off = self.next_data_off();
        self.data.extend_from_slice(bytes);
        off
    }

    pub fn push_type_list(&mut self, type_idxs: &[u16]) -> u32
    {
        let mut blob = Vec::new();
        let mut tmp = [0u8; 4];
        LittleEndian::write_u32(&mut tmp, type_idxs.len() as u32);
        blob.extend_from_slice(&tmp);
        for t in type_idxs
        {
            let mut tmp2 = [0u8; 2];
            LittleEndian::write_u16(&mut tmp2, *t);
            blob.extend_from_slice(&tmp2);
        }
        self.push_data(&blob)
    }

    /// code_item with no tries: the 16-byte header then the code units.
    pub fn push_code_item(
        &mut self,
        registers_size: u16,
        ins_size: u16,
        debug_info_off: u32,
        insns: &[u16],
    ) -> u32
    {
        let mut blob = Vec::new();
        push_u16(&mut blob, registers_size);
        push_u16(&mut blob, ins_size);
        push_u16(&mut blob, 0); // outs_size
        push_u16(&mut blob, 0); // tries_size
        push_u32(&mut blob, debug_info_off);
        push_u32(&mut blob, insns.len() as u32);
        for unit in insns
        {
            push_u16(&mut blob, *unit);
        }
        self.push_data(&blob)
    }

    fn ids_end(&self) -> u32
    {
        0x70 + 4 * self.strings.len() as u32
            + 4 * self.types.len() as u32
            + 12 * self.protos.len() as u32
            + 8 * self.fields.len() as u32
            + 8 * self.methods.len() as u32
            + 32 * self.class_defs.len() as u32
    }

    pub fn finish(mut self) -> Vec<u8>
    {
        // Parameter lists and string data go at the end of the data section.
        let protos = self.protos.clone();
        let mut proto_param_offs = Vec::with_capacity(protos.len());
        for (_, _, params) in &protos
        {
            if params.is_empty()
            {
                proto_param_offs.push(0);
            }
            else
            {
                proto_param_offs.push(self.push_type_list(params));
            }
        }

        let strings = self.strings.clone();
        let mut string_data_offs = Vec::with_capacity(strings.len());
        for bytes in &strings
        {
            let mut blob = uleb(bytes.len() as u32);
            blob.extend_from_slice(bytes);
            blob.push(0);
            string_data_offs.push(self.push_data(&blob));
        }

        let string_ids_off = 0x70u32;
        let type_ids_off = string_ids_off + 4 * self.strings.len() as u32;
        let proto_ids_off = type_ids_off + 4 * self.types.len() as u32;
        let field_ids_off = proto_ids_off + 12 * self.protos.len() as u32;
        let method_ids_off = field_ids_off + 8 * self.fields.len() as u32;
        let class_defs_off = method_ids_off + 8 * self.methods.len() as u32;
        let data_off = class_defs_off + 32 * self.class_defs.len() as u32;

        let file_size = data_off + self.data.len() as u32;

        let mut out = Vec::with_capacity(file_size as usize);
        out.extend_from_slice(b"dex\n035\0");
        push_u32(&mut out, 0); // checksum, patched below
        out.extend_from_slice(&[0u8; 20]); // signature
        push_u32(&mut out, file_size);
        push_u32(&mut out, 0x70);
        push_u32(&mut out, 0x12345678); // endian tag
        push_u32(&mut out, 0); // link_size
        push_u32(&mut out, 0); // link_off
        push_u32(&mut out, 0); // map_off
        push_u32(&mut out, self.strings.len() as u32);
        push_u32(&mut out, if self.strings.is_empty() { 0 } else { string_ids_off });
        push_u32(&mut out, self.types.len() as u32);
        push_u32(&mut out, if self.types.is_empty() { 0 } else { type_ids_off });
        push_u32(&mut out, self.protos.len() as u32);
        push_u32(&mut out, if self.protos.is_empty() { 0 } else { proto_ids_off });
        push_u32(&mut out, self.fields.len() as u32);
        push_u32(&mut out, if self.fields.is_empty() { 0 } else { field_ids_off });
        push_u32(&mut out, self.methods.len() as u32);
        push_u32(&mut out, if self.methods.is_empty() { 0 } else { method_ids_off });
        push_u32(&mut out, self.class_defs.len() as u32);
        push_u32(&mut out, if self.class_defs.is_empty() { 0 } else { class_defs_off });
        push_u32(&mut out, self.data.len() as u32);
        push_u32(&mut out, data_off);
        assert_eq!(out.len(), 0x70);

        for off in string_data_offs
        {
            push_u32(&mut out, off);
        }
        for t in &self.types
        {
            push_u32(&mut out, *t);
        }
        for (i, (shorty, ret, _)) in self.protos.iter().enumerate()
        {
            push_u32(&mut out, *shorty);
            push_u32(&mut out, *ret);
            push_u32(&mut out, proto_param_offs[i]);
        }
        for (class_idx, type_idx, name_idx) in &self.fields
        {
            push_u16(&mut out, *class_idx);
            push_u16(&mut out, *type_idx);
            push_u32(&mut out, *name_idx);
        }
        for (class_idx, proto_idx, name_idx) in &self.methods
        {
            push_u16(&mut out, *class_idx);
            push_u16(&mut out, *proto_idx);
            push_u32(&mut out, *name_idx);
        }
        for def in &self.class_defs
        {
            for word in def
            {
                push_u32(&mut out, *word);
            }
        }
        out.extend_from_slice(&self.data);
        assert_eq!(out.len(), file_size as usize);

        let checksum = adler::adler32_slice(&out[12..]);
        LittleEndian::write_u32(&mut out[8..12], checksum);
        out
    }
}

fn push_u16(out: &mut Vec<u8>, v: u16)
{
    let mut tmp = [0u8; 2];
    LittleEndian::write_u16(&mut tmp, v);
    out.extend_from_slice(&tmp);
}

fn push_u32(out: &mut Vec<u8>, v: u32)
{
    let mut tmp = [0u8; 4];
    LittleEndian::write_u32(&mut tmp, v);
    out.extend_from_slice(&tmp);
}
