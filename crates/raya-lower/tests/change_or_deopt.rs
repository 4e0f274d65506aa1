mod common;

use common::*;
use raya_lower::ir::value_ops::{ChangeOrDeoptKind, MinusZeroMode};
use raya_lower::ir::DeoptimizeReason;
use raya_lower::{Graph, LoweringConfig, Op, Value};

fn change_graph(kind: ChangeOrDeoptKind, minus_zero: MinusZeroMode) -> Graph {
    lower_op(LoweringConfig::default(), &[kind.input_rep()], |inputs| Op::ChangeOrDeopt {
        input: inputs.params[0],
        frame_state: inputs.frame_state,
        kind,
        minus_zero,
        feedback: FEEDBACK,
    })
}

// ============================================================================
// Integer narrowing
// ============================================================================

#[test]
fn test_uint32_to_int32() {
    let config = LoweringConfig::default();
    let graph = change_graph(ChangeOrDeoptKind::Uint32ToInt32, MinusZeroMode::DontCheckForMinusZero);
    let mut m = machine(&config);

    assert_eq!(run(&mut m, &graph, &[Value::Word32(0)]).value(), Value::Word32(0));
    assert_eq!(run(&mut m, &graph, &[Value::Word32(0x7FFF_FFFF)]).value(), Value::Word32(0x7FFF_FFFF));
    expect_deopt(&mut m, &graph, &[Value::Word32(0x8000_0000)], DeoptimizeReason::LostPrecision);
    expect_deopt(&mut m, &graph, &[Value::Word32(u32::MAX)], DeoptimizeReason::LostPrecision);
}

#[test]
fn test_int64_to_int32() {
    let config = LoweringConfig::default();
    let graph = change_graph(ChangeOrDeoptKind::Int64ToInt32, MinusZeroMode::DontCheckForMinusZero);
    let mut m = machine(&config);

    for value in [0i64, -1, i32::MIN as i64, i32::MAX as i64] {
        let out = run(&mut m, &graph, &[Value::Word64(value as u64)]);
        assert_eq!(out.value(), Value::Word32(value as i32 as u32));
    }
    for value in [i32::MAX as i64 + 1, i32::MIN as i64 - 1, i64::MAX, 1 << 40] {
        expect_deopt(&mut m, &graph, &[Value::Word64(value as u64)], DeoptimizeReason::LostPrecision);
    }
}

#[test]
fn test_uint64_to_int32_and_int64() {
    let config = LoweringConfig::default();
    let to_int32 = change_graph(ChangeOrDeoptKind::Uint64ToInt32, MinusZeroMode::DontCheckForMinusZero);
    let to_int64 = change_graph(ChangeOrDeoptKind::Uint64ToInt64, MinusZeroMode::DontCheckForMinusZero);
    let mut m = machine(&config);

    assert_eq!(run(&mut m, &to_int32, &[Value::Word64(i32::MAX as u64)]).value(), Value::Word32(i32::MAX as u32));
    expect_deopt(&mut m, &to_int32, &[Value::Word64(i32::MAX as u64 + 1)], DeoptimizeReason::LostPrecision);
    expect_deopt(&mut m, &to_int32, &[Value::Word64(u64::MAX)], DeoptimizeReason::LostPrecision);

    assert_eq!(run(&mut m, &to_int64, &[Value::Word64(i64::MAX as u64)]).value(), Value::Word64(i64::MAX as u64));
    expect_deopt(&mut m, &to_int64, &[Value::Word64(1 << 63)], DeoptimizeReason::LostPrecision);
}

// ============================================================================
// Float truncation
// ============================================================================

#[test]
fn test_float64_to_int32() {
    let config = LoweringConfig::default();
    let graph = change_graph(ChangeOrDeoptKind::Float64ToInt32, MinusZeroMode::DontCheckForMinusZero);
    let mut m = machine(&config);

    for value in [0.0, 42.0, -42.0, 2147483647.0, -2147483648.0] {
        let out = run(&mut m, &graph, &[Value::Float64(value)]);
        assert_eq!(out.value(), Value::Word32(value as i32 as u32), "{}", value);
    }
    // -0.0 is accepted when the caller does not care about the sign.
    assert_eq!(run(&mut m, &graph, &[Value::Float64(-0.0)]).value(), Value::Word32(0));

    for value in [0.5, -1.5, f64::NAN, f64::INFINITY, 2147483648.0, -2147483649.0] {
        expect_deopt(&mut m, &graph, &[Value::Float64(value)], DeoptimizeReason::LostPrecisionOrNaN);
    }
}

#[test]
fn test_float64_to_int32_minus_zero() {
    let config = LoweringConfig::default();
    let graph = change_graph(ChangeOrDeoptKind::Float64ToInt32, MinusZeroMode::CheckForMinusZero);
    let mut m = machine(&config);

    expect_deopt(&mut m, &graph, &[Value::Float64(-0.0)], DeoptimizeReason::MinusZero);
    assert_eq!(run(&mut m, &graph, &[Value::Float64(0.0)]).value(), Value::Word32(0));
    assert_eq!(run(&mut m, &graph, &[Value::Float64(-3.0)]).value(), Value::Word32(-3i32 as u32));
}

#[test]
fn test_float64_to_int64() {
    let config = LoweringConfig::default();
    let graph = change_graph(ChangeOrDeoptKind::Float64ToInt64, MinusZeroMode::CheckForMinusZero);
    let mut m = machine(&config);

    let big = (1i64 << 53) as f64;
    assert_eq!(run(&mut m, &graph, &[Value::Float64(big)]).value(), Value::Word64(1 << 53));
    assert_eq!(run(&mut m, &graph, &[Value::Float64(-5.0)]).value(), Value::Word64(-5i64 as u64));
    expect_deopt(&mut m, &graph, &[Value::Float64(-0.0)], DeoptimizeReason::MinusZero);
    expect_deopt(&mut m, &graph, &[Value::Float64(9.3e18)], DeoptimizeReason::LostPrecisionOrNaN);
    expect_deopt(&mut m, &graph, &[Value::Float64(f64::NAN)], DeoptimizeReason::LostPrecisionOrNaN);
    expect_deopt(&mut m, &graph, &[Value::Float64(0.25)], DeoptimizeReason::LostPrecisionOrNaN);
}

#[test]
fn test_guard_does_not_allocate() {
    let config = LoweringConfig::default();
    let graph = change_graph(ChangeOrDeoptKind::Float64ToInt32, MinusZeroMode::CheckForMinusZero);
    assert_eq!(graph.count_ops(|op| matches!(op, Op::Allocate { .. })), 0);
    let mut m = machine(&config);
    run(&mut m, &graph, &[Value::Float64(1.0)]);
    assert!(m.heap().allocations().is_empty());
}
