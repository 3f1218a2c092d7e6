//! Integration tests for the module reader and writer

use ncs_spec::{
    ArithmeticOperands, Constant, EngineKind, EqualityOperands, NcsError, NumericOperands,
    NumericType, Operation, Program, SlotType,
};
use proptest::prelude::*;

// ============================================================================
// Fixture
// ============================================================================

/// One instance of every supported instruction layout, 300 bytes in total
fn all_instructions_module() -> Vec<u8> {
    let chunks: &[&[u8]] = &[
        b"NCS V1.0",
        b"\x42\x00\x00\x01\x2c",
        b"\x01\x01\xff\xff\xff\xfc\x00\x04", // CPDOWNSP
        b"\x03\x01\xff\xff\xff\xfc\x00\x04", // CPTOPSP
        b"\x26\x01\xff\xff\xff\xfc\x00\x04", // CPDOWNBP
        b"\x27\x01\xff\xff\xff\xfc\x00\x04", // CPTOPBP
        b"\x04\x03\x00\x00\x00\x01",         // CONSTI
        b"\x04\x04\x3f\x80\x00\x00",         // CONSTF
        b"\x04\x05\x00\x02\x41\x61",         // CONSTS
        b"\x04\x06\x00\x00\x00\x02",         // CONSTO
        b"\x05\x00\x00\x01\x02",             // ACTION
        b"\x1b\x00\xff\xff\xff\xfc",         // MOVSP
        b"\x1d\x00\x00\x00\x00\x01",         // JMP
        b"\x1e\x00\x00\x00\x00\x02",         // JSR
        b"\x1f\x00\x00\x00\x00\x03",         // JZ
        b"\x25\x00\x00\x00\x00\x04",         // JNZ
        b"\x21\x01\x00\x08\xff\xfc\x00\x04", // DESTRUCT
        b"\x23\x03\xff\xff\xff\xfc",         // DECISP
        b"\x24\x03\xff\xff\xff\xfc",         // INCISP
        b"\x28\x03\xff\xff\xff\xfc",         // DECIBP
        b"\x29\x03\xff\xff\xff\xfc",         // INCIBP
        b"\x2c\x10\x00\x00\x00\x04\x00\x00\x00\x08", // STORE_STATE
        b"\x0b\x24\x00\x04",                 // EQUALTT
        b"\x0c\x24\x00\x04",                 // NEQUALTT
        b"\x00\x0c",                         // NOP
        b"\x02\x03\x02\x04\x02\x05\x02\x06", // RSADDI RSADDF RSADDS RSADDO
        b"\x02\x10\x02\x11\x02\x12\x02\x13", // RSADDEFF RSADDEVT RSADDLOC RSADDTAL
        b"\x06\x20\x07\x20\x08\x20\x09\x20\x0a\x20", // logical
        b"\x0b\x20\x0b\x21\x0b\x23\x0b\x22", // EQUALII FF SS OO
        b"\x0b\x30\x0b\x31\x0b\x32\x0b\x33", // EQUAL engine
        b"\x0c\x20\x0c\x21\x0c\x23\x0c\x22", // NEQUALII FF SS OO
        b"\x0c\x30\x0c\x31\x0c\x32\x0c\x33", // NEQUAL engine
        b"\x0d\x20\x0d\x21\x0e\x20\x0e\x21", // GEQ GT
        b"\x0f\x20\x0f\x21\x10\x20\x10\x21", // LT LEQ
        b"\x11\x20\x12\x20\x13\x20",         // shifts
        b"\x14\x20\x14\x25\x14\x26\x14\x21\x14\x23\x14\x3a", // ADD
        b"\x15\x20\x15\x25\x15\x26\x15\x21\x15\x3a", // SUB
        b"\x16\x20\x16\x25\x16\x26\x16\x21\x16\x3b\x16\x3c", // MUL
        b"\x17\x20\x17\x25\x17\x26\x17\x21\x17\x3b\x17\x3c", // DIV
        b"\x18\x20",                         // MODII
        b"\x19\x03\x19\x04",                 // NEGI NEGF
        b"\x1a\x03",                         // COMPI
        b"\x20\x00",                         // RETN
        b"\x22\x03",                         // NOTI
        b"\x2a\x00\x2b\x00",                 // SAVEBP RESTOREBP
        b"\x2d\x00",                         // NOP2
    ];
    chunks.concat()
}

fn op_at(program: &Program, offset: u32) -> &Operation {
    &program
        .instruction_at(offset)
        .unwrap_or_else(|| panic!("no instruction at {offset}"))
        .op
}

// ============================================================================
// Reader
// ============================================================================

#[test]
fn test_read_all_instruction_layouts() {
    let bytes = all_instructions_module();
    assert_eq!(bytes.len(), 300);

    let program = Program::from_bytes("fixture", &bytes).unwrap();
    assert_eq!(program.length(), 300);
    assert_eq!(program.len(), 95);

    assert_eq!(op_at(&program, 13), &Operation::CpDownSp { offset: -4, size: 4 });
    assert_eq!(op_at(&program, 21), &Operation::CpTopSp { offset: -4, size: 4 });
    assert_eq!(op_at(&program, 29), &Operation::CpDownBp { offset: -4, size: 4 });
    assert_eq!(op_at(&program, 37), &Operation::CpTopBp { offset: -4, size: 4 });
    assert_eq!(op_at(&program, 45), &Operation::Const(Constant::Int(1)));
    assert_eq!(op_at(&program, 51), &Operation::Const(Constant::Float(1.0)));
    assert_eq!(op_at(&program, 57), &Operation::Const(Constant::String("Aa".into())));
    assert_eq!(op_at(&program, 63), &Operation::Const(Constant::Object(2)));
    assert_eq!(op_at(&program, 69), &Operation::Action { routine: 1, arg_count: 2 });
    assert_eq!(op_at(&program, 74), &Operation::MovSp { offset: -4 });
    assert_eq!(op_at(&program, 80), &Operation::Jmp { offset: 1 });
    assert_eq!(op_at(&program, 86), &Operation::Jsr { offset: 2 });
    assert_eq!(op_at(&program, 92), &Operation::Jz { offset: 3 });
    assert_eq!(op_at(&program, 98), &Operation::Jnz { offset: 4 });
    assert_eq!(
        op_at(&program, 104),
        &Operation::Destruct { size: 8, offset: -4, size_no_destroy: 4 }
    );
    assert_eq!(op_at(&program, 112), &Operation::DecSp { offset: -4 });
    assert_eq!(op_at(&program, 118), &Operation::IncSp { offset: -4 });
    assert_eq!(op_at(&program, 124), &Operation::DecBp { offset: -4 });
    assert_eq!(op_at(&program, 130), &Operation::IncBp { offset: -4 });
    assert_eq!(op_at(&program, 136), &Operation::StoreState { globals: 4, locals: 8 });
    assert_eq!(
        op_at(&program, 146),
        &Operation::Equal(EqualityOperands::StructStruct { size: 4 })
    );
    assert_eq!(
        op_at(&program, 150),
        &Operation::NotEqual(EqualityOperands::StructStruct { size: 4 })
    );
    assert_eq!(op_at(&program, 154), &Operation::Nop);
    assert_eq!(op_at(&program, 156), &Operation::RsAdd(SlotType::Int));
    assert_eq!(op_at(&program, 164), &Operation::RsAdd(SlotType::Engine(EngineKind::Effect)));
    assert_eq!(op_at(&program, 170), &Operation::RsAdd(SlotType::Engine(EngineKind::Talent)));
    assert_eq!(op_at(&program, 180), &Operation::BoolAnd);
    assert_eq!(op_at(&program, 186), &Operation::Equal(EqualityOperands::StringString));
    assert_eq!(
        op_at(&program, 210),
        &Operation::NotEqual(EqualityOperands::Engine(EngineKind::Location))
    );
    assert_eq!(op_at(&program, 216), &Operation::Geq(NumericOperands::FloatFloat));
    assert_eq!(op_at(&program, 234), &Operation::UShRight);
    assert_eq!(op_at(&program, 246), &Operation::Add(ArithmeticOperands::VectorVector));
    assert_eq!(op_at(&program, 256), &Operation::Sub(ArithmeticOperands::VectorVector));
    assert_eq!(op_at(&program, 268), &Operation::Mul(ArithmeticOperands::FloatVector));
    assert_eq!(op_at(&program, 278), &Operation::Div(ArithmeticOperands::VectorFloat));
    assert_eq!(op_at(&program, 282), &Operation::Mod);
    assert_eq!(op_at(&program, 286), &Operation::Neg(NumericType::Float));
    assert_eq!(op_at(&program, 288), &Operation::Comp);
    assert_eq!(op_at(&program, 290), &Operation::Retn);
    assert_eq!(op_at(&program, 292), &Operation::Not);
    assert_eq!(op_at(&program, 294), &Operation::SaveBp);
    assert_eq!(op_at(&program, 296), &Operation::RestoreBp);
    assert_eq!(op_at(&program, 298), &Operation::Nop2);
}

#[test]
fn test_mnemonics_of_fixture() {
    let program = Program::from_bytes("fixture", &all_instructions_module()).unwrap();
    let mnemonics: Vec<&str> = program.instructions().iter().map(|i| i.op.mnemonic()).collect();
    assert_eq!(mnemonics[0], "CPDOWNSP");
    assert!(mnemonics.contains(&"RSADDEVT"));
    assert!(mnemonics.contains(&"EQUALTALTAL"));
    assert!(mnemonics.contains(&"NEQUALTT"));
    assert!(mnemonics.contains(&"DECISP"));
    assert_eq!(mnemonics[94], "NOP2");
}

#[test]
fn test_offsets_are_contiguous() {
    let program = Program::from_bytes("fixture", &all_instructions_module()).unwrap();
    let mut expected = program.entry_offset();
    for ins in program.instructions() {
        assert_eq!(ins.offset, expected);
        expected = ins.next_offset();
    }
    assert_eq!(expected, program.length());
}

#[test]
fn test_truncated_fixture_is_rejected() {
    let mut bytes = all_instructions_module();
    bytes.truncate(299);
    bytes[9..13].copy_from_slice(&299u32.to_be_bytes());
    assert_eq!(
        Program::from_bytes("cut", &bytes).unwrap_err(),
        NcsError::UnexpectedEof { offset: 299 }
    );
}

// ============================================================================
// Writer
// ============================================================================

#[test]
fn test_write_fixture_byte_exact() {
    let bytes = all_instructions_module();
    let program = Program::from_bytes("fixture", &bytes).unwrap();
    assert_eq!(program.to_bytes().unwrap(), bytes);
}

#[test]
fn test_rebuilt_program_matches_decoded() {
    let bytes = all_instructions_module();
    let decoded = Program::from_bytes("fixture", &bytes).unwrap();
    let rebuilt = Program::from_operations("fixture", decoded.clone().into_operations());
    assert_eq!(rebuilt, decoded);
    assert_eq!(rebuilt.digest().unwrap(), decoded.digest().unwrap());
}

// ============================================================================
// Round-trip law
// ============================================================================

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (any::<i32>(), any::<u16>()).prop_map(|(offset, size)| Operation::CpTopSp { offset, size }),
        (any::<i32>(), any::<u16>()).prop_map(|(offset, size)| Operation::CpDownBp { offset, size }),
        any::<i32>().prop_map(|v| Operation::Const(Constant::Int(v))),
        (-1.0e6f32..1.0e6).prop_map(|v| Operation::Const(Constant::Float(v))),
        "[a-zA-Z0-9 ]{0,24}".prop_map(|s| Operation::Const(Constant::String(s))),
        any::<u32>().prop_map(|v| Operation::Const(Constant::Object(v))),
        (any::<u16>(), any::<u8>())
            .prop_map(|(routine, arg_count)| Operation::Action { routine, arg_count }),
        any::<i32>().prop_map(|offset| Operation::Jnz { offset }),
        any::<i32>().prop_map(|offset| Operation::MovSp { offset }),
        (any::<u16>(), any::<i16>(), any::<u16>()).prop_map(|(size, offset, size_no_destroy)| {
            Operation::Destruct { size, offset, size_no_destroy }
        }),
        (any::<u32>(), any::<u32>())
            .prop_map(|(globals, locals)| Operation::StoreState { globals, locals }),
        any::<u16>().prop_map(|size| Operation::Equal(EqualityOperands::StructStruct { size })),
        Just(Operation::Add(ArithmeticOperands::StringString)),
        Just(Operation::Div(ArithmeticOperands::FloatVector)),
        Just(Operation::RsAdd(SlotType::Engine(EngineKind::Event))),
        Just(Operation::Retn),
    ]
}

proptest! {
    #[test]
    fn prop_write_then_read_is_identity(ops in prop::collection::vec(operation_strategy(), 0..40)) {
        let program = Program::from_operations("prop", ops);
        let bytes = program.to_bytes().unwrap();
        prop_assert_eq!(bytes.len() as u32, program.length());

        let decoded = Program::from_bytes("prop", &bytes).unwrap();
        prop_assert_eq!(&decoded, &program);
        prop_assert_eq!(decoded.to_bytes().unwrap(), bytes);
    }
}
