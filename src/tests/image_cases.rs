#[cfg(test)]
mod tests {
    use crate::dex::dex_file::NO_INDEX;
    use crate::tests::builder::{uleb, DexBuilder};
    use crate::{disassemble, DexFile, ErrorKind};

    /// Two pool strings and their type ids: the class itself and Object.
    fn simple_class_builder(name: &str) -> DexBuilder
    {
        let mut b = DexBuilder::new();
        let cls = b.string(name);
        let obj = b.string("Ljava/lang/Object;");
        let cls_t = b.type_id(cls);
        let obj_t = b.type_id(obj);
        b.class_def(cls_t, 0x1, obj_t, 0, NO_INDEX, 0, 0, 0);
        b
    }

    #[test]
    fn empty_class_end_to_end()
    {
        let bytes = simple_class_builder("Lempty/C;").finish();
        let out = disassemble(bytes).expect("disassembly");

        assert_eq!(out.len(), 1);
        let (path, text) = &out[0];
        assert_eq!(path, "empty/C.smali");
        assert!(text.starts_with(".class public Lempty/C;\n.super Ljava/lang/Object;\n"));
        assert!(!text.contains("# static fields"));
        assert!(!text.contains("# instance fields"));
        assert!(!text.contains("# direct methods"));
        assert!(!text.contains("# virtual methods"));
    }

    #[test]
    fn bad_magic_is_rejected()
    {
        let mut bytes = simple_class_builder("Lempty/C;").finish();
        bytes[6] = b'6'; // dex\n036\0
        assert_eq!(DexFile::from_bytes(bytes).unwrap_err().kind(), ErrorKind::InvalidMagic);
    }

    #[test]
    fn file_size_must_match_buffer()
    {
        let mut bytes = simple_class_builder("Lempty/C;").finish();
        bytes.push(0);
        assert_eq!(DexFile::from_bytes(bytes).unwrap_err().kind(), ErrorKind::HeaderMismatch);
    }

    #[test]
    fn class_with_bad_type_index_is_skipped_not_fatal()
    {
        let mut b = DexBuilder::new();
        let cls = b.string("Lok/C;");
        let obj = b.string("Ljava/lang/Object;");
        let cls_t = b.type_id(cls);
        let obj_t = b.type_id(obj);
        b.class_def(cls_t, 0x1, obj_t, 0, NO_INDEX, 0, 0, 0);
        b.class_def(0xbeef, 0x1, obj_t, 0, NO_INDEX, 0, 0, 0);

        let dex = DexFile::from_bytes(b.finish()).expect("image");
        assert_eq!(dex.classes().len(), 1);
        assert_eq!(dex.class_errors().len(), 1);
        assert_eq!(dex.class_errors()[0].kind(), ErrorKind::DecodeClassFailed);
    }

    #[test]
    fn member_classes_annotation_is_synthesised_in_order()
    {
        let mut b = DexBuilder::new();
        let names = ["Lpkg/A;", "Lpkg/A$Inner;", "Lpkg/A$2;", "Lpkg/A$1;", "Ljava/lang/Object;"];
        let mut type_idxs = vec![];
        for n in names
        {
            let s = b.string(n);
            type_idxs.push(b.type_id(s));
        }
        let obj = type_idxs[4];
        for t in &type_idxs[..4]
        {
            b.class_def(*t, 0x1, obj, 0, NO_INDEX, 0, 0, 0);
        }

        let dex = DexFile::from_bytes(b.finish()).expect("image");
        let out = dex.disassemble();
        let (_, text) = out.iter().find(|(p, _)| p == "pkg/A.smali").expect("outer class");

        assert!(text.contains("\n# annotations\n"));
        assert!(text.contains(
            ".annotation system Ldalvik/annotation/MemberClasses;\n    \
                 value = {\n        \
                     Lpkg/A$1;,\n        \
                     Lpkg/A$2;,\n        \
                     Lpkg/A$Inner;\n    \
                 }\n\
             .end annotation\n"
        ));

        // Inner classes have no $-children of their own
        let (_, inner) = out.iter().find(|(p, _)| p == "pkg/A$1.smali").expect("inner class");
        assert!(!inner.contains("MemberClasses"));
    }

    #[test]
    fn constructor_with_code_end_to_end()
    {
        let mut b = DexBuilder::new();
        let s_cls = b.string("Lfoo/C;");
        let s_obj = b.string("Ljava/lang/Object;");
        let s_void = b.string("V");
        let s_init = b.string("<init>");
        let t_cls = b.type_id(s_cls);
        let t_obj = b.type_id(s_obj);
        let t_void = b.type_id(s_void);
        let p_void = b.proto(s_void, t_void, &[]);
        let m_obj_init = b.method(t_obj as u16, p_void as u16, s_init);
        let m_cls_init = b.method(t_cls as u16, p_void as u16, s_init);
        assert_eq!(m_obj_init, 0);
        b.class_def(t_cls, 0x1, t_obj, 0, NO_INDEX, 0, 0, 0);

        // invoke-direct {v1}, method@0 ; return-void
        let code_off = b.push_code_item(2, 1, 0, &[0x1070, 0x0000, 0x0001, 0x000e]);

        let mut class_data = vec![];
        class_data.extend(uleb(0)); // static fields
        class_data.extend(uleb(0)); // instance fields
        class_data.extend(uleb(1)); // direct methods
        class_data.extend(uleb(0)); // virtual methods
        class_data.extend(uleb(m_cls_init)); // first index is absolute
        class_data.extend(uleb(0x10001)); // public constructor
        class_data.extend(uleb(code_off));
        let class_data_off = b.push_data(&class_data);
        b.patch_class_def(0, 6, class_data_off);

        let dex = DexFile::from_bytes(b.finish()).expect("image");
        assert_eq!(dex.classes().len(), 1);

        let out = dex.disassemble();
        let (path, text) = &out[0];
        assert_eq!(path, "foo/C.smali");
        assert!(text.contains("\n# direct methods\n"));
        assert!(text.contains(
            ".method public constructor <init>()V\n    \
                 .registers 2\n\
             \n    \
                 invoke-direct {p0}, Ljava/lang/Object;-><init>()V\n\
             \n    \
                 return-void\n\
             .end method\n"
        ));
    }

    #[test]
    fn static_field_values_assign_index_wise()
    {
        let mut b = DexBuilder::new();
        let s_cls = b.string("Lfoo/K;");
        let s_obj = b.string("Ljava/lang/Object;");
        let s_int = b.string("I");
        let s_str = b.string("Ljava/lang/String;");
        let s_max = b.string("MAX");
        let s_greet = b.string("GREETING");
        let s_hello = b.string_bytes(b"h\xc3\xa9llo");
        let t_cls = b.type_id(s_cls);
        let t_obj = b.type_id(s_obj);
        let t_int = b.type_id(s_int);
        let t_str = b.type_id(s_str);
        let f_max = b.field(t_cls as u16, t_int as u16, s_max);
        let f_greet = b.field(t_cls as u16, t_str as u16, s_greet);
        assert_eq!((f_max, f_greet), (0, 1));
        b.class_def(t_cls, 0x1, t_obj, 0, NO_INDEX, 0, 0, 0);

        let mut class_data = vec![];
        class_data.extend(uleb(2)); // static fields
        class_data.extend(uleb(0));
        class_data.extend(uleb(0));
        class_data.extend(uleb(0));
        class_data.extend(uleb(0)); // field 0
        class_data.extend(uleb(0x19)); // public static final
        class_data.extend(uleb(1)); // diff to field 1
        class_data.extend(uleb(0x19));
        let class_data_off = b.push_data(&class_data);
        b.patch_class_def(0, 6, class_data_off);

        // encoded array: [ INT 0x10, STRING s_hello ]
        let mut values = vec![];
        values.extend(uleb(2));
        values.push(0x04);
        values.push(0x10);
        values.push(0x17);
        values.push(s_hello as u8);
        let static_values_off = b.push_data(&values);
        b.patch_class_def(0, 7, static_values_off);

        let dex = DexFile::from_bytes(b.finish()).expect("image");
        let out = dex.disassemble();
        let (_, text) = &out[0];

        assert!(text.contains(".field public static final MAX:I = 0x10\n"));
        // Pool escaping happened at parse time, literal quoting at render time
        assert!(text.contains(".field public static final GREETING:Ljava/lang/String; = \"h\\u00e9llo\"\n"));
    }

    #[test]
    fn const_string_operand_is_escaped()
    {
        let mut b = DexBuilder::new();
        let s_cls = b.string("Lfoo/S;");
        let s_obj = b.string("Ljava/lang/Object;");
        let s_void = b.string("V");
        let s_go = b.string("go");
        let s_hello = b.string_bytes(b"h\xc3\xa9llo");
        let t_cls = b.type_id(s_cls);
        let t_obj = b.type_id(s_obj);
        let t_void = b.type_id(s_void);
        let p_void = b.proto(s_void, t_void, &[]);
        let m_go = b.method(t_cls as u16, p_void as u16, s_go);
        b.class_def(t_cls, 0x1, t_obj, 0, NO_INDEX, 0, 0, 0);

        // const-string v0, string@s_hello ; return-void
        let code_off = b.push_code_item(1, 0, 0, &[0x001a, s_hello as u16, 0x000e]);

        let mut class_data = vec![];
        class_data.extend(uleb(0));
        class_data.extend(uleb(0));
        class_data.extend(uleb(1));
        class_data.extend(uleb(0));
        class_data.extend(uleb(m_go));
        class_data.extend(uleb(0x9)); // public static
        class_data.extend(uleb(code_off));
        let class_data_off = b.push_data(&class_data);
        b.patch_class_def(0, 6, class_data_off);

        let dex = DexFile::from_bytes(b.finish()).expect("image");
        let out = dex.disassemble();
        let (_, text) = &out[0];
        assert!(text.contains("    const-string v0, \"h\\u00e9llo\"\n"));
    }

    #[test]
    fn interfaces_render_after_source()
    {
        let mut b = DexBuilder::new();
        let s_cls = b.string("Lfoo/Impl;");
        let s_obj = b.string("Ljava/lang/Object;");
        let s_run = b.string("Ljava/lang/Runnable;");
        let s_src = b.string("Impl.java");
        let t_cls = b.type_id(s_cls);
        let t_obj = b.type_id(s_obj);
        let t_run = b.type_id(s_run);
        b.class_def(t_cls, 0x1, t_obj, 0, s_src, 0, 0, 0);
        let ifaces_off = b.push_type_list(&[t_run as u16]);
        b.patch_class_def(0, 3, ifaces_off);

        let dex = DexFile::from_bytes(b.finish()).expect("image");
        let out = dex.disassemble();
        let (_, text) = &out[0];
        assert!(text.starts_with(
            ".class public Lfoo/Impl;\n\
             .super Ljava/lang/Object;\n\
             .source \"Impl.java\"\n\
             \n\
             # interfaces\n\
             .implements Ljava/lang/Runnable;\n"
        ));
    }

    #[test]
    fn truncated_string_pool_fails_construction()
    {
        let mut b = DexBuilder::new();
        let s = b.string("Lfoo/C;");
        b.type_id(s);
        let mut bytes = b.finish();
        // Chop the terminator off the last string and fix up the size so
        // only the string read fails.
        bytes.pop();
        let len = bytes.len() as u32;
        bytes[32..36].copy_from_slice(&len.to_le_bytes());
        let err = DexFile::from_bytes(bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnterminatedString);
    }
}
