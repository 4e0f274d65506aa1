mod common;

use common::*;
use proptest::prelude::*;
use raya_lower::ir::DeoptimizeReason;
use raya_lower::ir::value_ops::{
    ChangeOrDeoptKind, ConvertToObjectKind, InputInterpretation, MinusZeroMode, ToPrimitiveAssumptions,
    ToPrimitiveKind,
};
use raya_lower::{Graph, LoweringConfig, Op, Outcome, Rep, Value};

fn to_object(config: LoweringConfig, kind: ConvertToObjectKind, input_rep: Rep, interpretation: InputInterpretation) -> Graph {
    lower_op(config, &[input_rep], |inputs| Op::ConvertToObject {
        input: inputs.params[0],
        kind,
        input_rep,
        interpretation,
        minus_zero: MinusZeroMode::CheckForMinusZero,
    })
}

/// Tag a word as a Smi and read it straight back
fn smi_round_trip(config: LoweringConfig) -> Graph {
    lower(config, &[Rep::Word32], |asm, inputs| {
        let boxed = asm.emit(Op::ConvertToObject {
            input: inputs.params[0],
            kind: ConvertToObjectKind::Smi,
            input_rep: Rep::Word32,
            interpretation: InputInterpretation::Signed,
            minus_zero: MinusZeroMode::DontCheckForMinusZero,
        });
        asm.emit(Op::ConvertObjectToPrimitive {
            object: boxed,
            kind: ToPrimitiveKind::Int32,
            assumptions: ToPrimitiveAssumptions::Smi,
        })
    })
}

fn truncation_graph() -> Graph {
    lower_op(LoweringConfig::default(), &[Rep::Float64], |inputs| Op::ChangeOrDeopt {
        input: inputs.params[0],
        frame_state: inputs.frame_state,
        kind: ChangeOrDeoptKind::Float64ToInt32,
        minus_zero: MinusZeroMode::CheckForMinusZero,
        feedback: FEEDBACK,
    })
}

const SMI31_MIN: i32 = -(1 << 30);
const SMI31_MAX: i32 = (1 << 30) - 1;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_smi_tagging_round_trips(value in SMI31_MIN..=SMI31_MAX) {
        let config = LoweringConfig::default();
        let graph = smi_round_trip(config);
        let mut m = machine(&config);
        let out = run(&mut m, &graph, &[Value::Word32(value as u32)]);
        prop_assert_eq!(out.value(), Value::Word32(value as u32));
    }

    #[test]
    fn test_smi_tagging_round_trips_with_32_bit_smis(value in any::<i32>()) {
        let config = smi32();
        let graph = smi_round_trip(config);
        let mut m = machine(&config);
        let out = run(&mut m, &graph, &[Value::Word32(value as u32)]);
        prop_assert_eq!(out.value(), Value::Word32(value as u32));
    }

    #[test]
    fn test_int32_boxing_respects_smi_range(value in any::<i32>()) {
        let config = LoweringConfig::default();
        let graph = to_object(config, ConvertToObjectKind::Number, Rep::Word32, InputInterpretation::Signed);
        let mut m = machine(&config);
        let word = tagged(run(&mut m, &graph, &[Value::Word32(value as u32)]).value());

        let in_range = (SMI31_MIN..=SMI31_MAX).contains(&value);
        prop_assert_eq!(m.heap().smi_value(word).is_some(), in_range);
        prop_assert_eq!(m.heap().number_value(word).unwrap(), Some(value as f64));
        prop_assert_eq!(m.heap().allocations().len(), usize::from(!in_range));
    }

    #[test]
    fn test_float64_boxing_preserves_value(value in any::<f64>()) {
        let config = LoweringConfig::default();
        let graph = to_object(config, ConvertToObjectKind::Number, Rep::Float64, InputInterpretation::Signed);
        let mut m = machine(&config);
        let word = tagged(run(&mut m, &graph, &[Value::Float64(value)]).value());
        let number = m.heap().number_value(word).unwrap().unwrap();

        if value.is_nan() {
            prop_assert!(number.is_nan());
        } else {
            prop_assert_eq!(number.to_bits(), value.to_bits());
        }
        let exact_smi = value == value.trunc()
            && value >= SMI31_MIN as f64
            && value <= SMI31_MAX as f64
            && !(value == 0.0 && value.is_sign_negative());
        prop_assert_eq!(m.heap().smi_value(word).is_some(), exact_smi);
    }

    #[test]
    fn test_big_int_boxing_keeps_sign_and_magnitude(value in any::<i64>()) {
        let config = LoweringConfig::default();
        let graph = to_object(config, ConvertToObjectKind::BigInt, Rep::Word64, InputInterpretation::Signed);
        let mut m = machine(&config);
        let word = tagged(run(&mut m, &graph, &[Value::Word64(value as u64)]).value());
        prop_assert_eq!(m.heap().big_int_value(word).unwrap(), Some(value as i128));
    }

    #[test]
    fn test_code_points_produce_utf16(code in any::<char>(), big in any::<bool>()) {
        let config = if big { big_endian() } else { LoweringConfig::default() };
        let graph = to_object(config, ConvertToObjectKind::String, Rep::Word32, InputInterpretation::CodePoint);
        let mut m = machine(&config);
        let word = tagged(run(&mut m, &graph, &[Value::Word32(code as u32)]).value());

        let expected: Vec<u16> = code.encode_utf16(&mut [0; 2]).to_vec();
        prop_assert_eq!(m.heap().string_units(word).unwrap().unwrap(), expected);
    }

    #[test]
    fn test_float64_truncation_is_exact_or_deopts(value in any::<f64>()) {
        let graph = truncation_graph();
        let mut m = machine(&LoweringConfig::default());
        let first = run(&mut m, &graph, &[Value::Float64(value)]);
        let second = run(&mut m, &graph, &[Value::Float64(value)]);
        prop_assert_eq!(&first, &second);

        match &first {
            Outcome::Returned(_) => {
                let result = word32(first.value()) as i32;
                prop_assert_eq!(result as f64, value);
                prop_assert!(!(value == 0.0 && value.is_sign_negative()));
                prop_assert_eq!(first.deopt_reason(), None);
            }
            Outcome::Deoptimized { frame_state, feedback, .. } => {
                prop_assert_eq!(*frame_state, FRAME_STATE);
                prop_assert_eq!(*feedback, FEEDBACK);
                let exact = value == value.trunc() && value >= i32::MIN as f64 && value <= i32::MAX as f64;
                let minus_zero = value == 0.0 && value.is_sign_negative();
                prop_assert!(!exact || minus_zero);
                let expected = if minus_zero {
                    DeoptimizeReason::MinusZero
                } else {
                    DeoptimizeReason::LostPrecisionOrNaN
                };
                prop_assert_eq!(first.deopt_reason(), Some(expected));
            }
        }
    }
}
