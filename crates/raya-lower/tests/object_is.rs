mod common;

use common::*;
use raya_lower::ir::value_ops::{ObjectIsAssumptions, ObjectIsKind};
use raya_lower::{Graph, LoweringConfig, Machine, Op, Rep, RootIndex, Value};

fn object_is(kind: ObjectIsKind, assumptions: ObjectIsAssumptions) -> Graph {
    lower_op(LoweringConfig::default(), &[Rep::Tagged], |inputs| Op::ObjectIs {
        input: inputs.params[0],
        kind,
        assumptions,
    })
}

fn check(m: &mut Machine, graph: &Graph, object: u64) -> bool {
    match run(m, graph, &[Value::Tagged(object)]).value() {
        Value::Word32(0) => false,
        Value::Word32(1) => true,
        other => panic!("predicate produced {:?}", other),
    }
}

/// A handful of values of every shape the predicates distinguish
struct Zoo {
    smi: u64,
    heap_number: u64,
    one_byte: u64,
    two_byte: u64,
    symbol: u64,
    big_int: u64,
    plain: u64,
    function: u64,
    undetectable: u64,
    typed_array: u64,
    data_view: u64,
    array: u64,
    null: u64,
}

fn zoo(m: &mut Machine) -> Zoo {
    let heap = m.heap_mut();
    Zoo {
        smi: heap.smi(12),
        heap_number: heap.new_heap_number(1.5).unwrap(),
        one_byte: heap.new_string("abc").unwrap(),
        two_byte: heap.new_string("\u{3b1}\u{3b2}").unwrap(),
        symbol: heap.new_symbol().unwrap(),
        big_int: heap.new_big_int(false, &[9]).unwrap(),
        plain: heap.new_js_object(RootIndex::JsObjectMap, &[], &[]).unwrap(),
        function: heap.new_js_object(RootIndex::JsFunctionMap, &[], &[]).unwrap(),
        undetectable: heap.new_js_object(RootIndex::UndetectableMap, &[], &[]).unwrap(),
        typed_array: heap.new_js_object(RootIndex::JsTypedArrayMap, &[], &[]).unwrap(),
        data_view: heap.new_js_object(RootIndex::JsDataViewMap, &[], &[]).unwrap(),
        array: heap.new_double_js_array(&[1.0]).unwrap(),
        null: heap.root(RootIndex::NullValue),
    }
}

fn holds_for(kind: ObjectIsKind, pick: impl Fn(&Zoo) -> Vec<u64>, reject: impl Fn(&Zoo) -> Vec<u64>) {
    let graph = object_is(kind, ObjectIsAssumptions::None);
    let mut m = machine(&LoweringConfig::default());
    let z = zoo(&mut m);
    for object in pick(&z) {
        assert!(check(&mut m, &graph, object), "{} should hold for {:#x}", kind, object);
    }
    for object in reject(&z) {
        assert!(!check(&mut m, &graph, object), "{} should not hold for {:#x}", kind, object);
    }
}

// ============================================================================
// Primitive predicates
// ============================================================================

#[test]
fn test_smi_and_number() {
    holds_for(ObjectIsKind::Smi, |z| vec![z.smi], |z| vec![z.heap_number, z.one_byte, z.null]);
    holds_for(
        ObjectIsKind::Number,
        |z| vec![z.smi, z.heap_number],
        |z| vec![z.one_byte, z.big_int, z.null, z.plain],
    );
}

#[test]
fn test_smi_under_heap_object_assumption_is_constant() {
    let graph = object_is(ObjectIsKind::Smi, ObjectIsAssumptions::HeapObject);
    assert_eq!(graph.count_ops(|op| matches!(op, Op::Load { .. })), 0);
    let mut m = machine(&LoweringConfig::default());
    let number = m.heap_mut().new_heap_number(2.0).unwrap();
    assert!(!check(&mut m, &graph, number));
}

#[test]
fn test_strings_and_symbols() {
    holds_for(
        ObjectIsKind::String,
        |z| vec![z.one_byte, z.two_byte],
        |z| vec![z.smi, z.symbol, z.heap_number, z.plain],
    );
    holds_for(ObjectIsKind::Symbol, |z| vec![z.symbol], |z| vec![z.smi, z.one_byte, z.plain]);
}

#[test]
fn test_array_buffer_view() {
    holds_for(
        ObjectIsKind::ArrayBufferView,
        |z| vec![z.typed_array, z.data_view],
        |z| vec![z.smi, z.plain, z.array, z.function, z.one_byte],
    );
}

#[test]
fn test_big_int() {
    holds_for(ObjectIsKind::BigInt, |z| vec![z.big_int], |z| vec![z.smi, z.heap_number, z.one_byte]);
}

#[test]
fn test_big_int64_range() {
    let graph = object_is(ObjectIsKind::BigInt64, ObjectIsAssumptions::None);
    let mut m = machine(&LoweringConfig::default());
    let heap = m.heap_mut();
    let fits = [
        heap.new_big_int(false, &[]).unwrap(),
        heap.new_big_int(false, &[5]).unwrap(),
        heap.new_big_int(true, &[5]).unwrap(),
        heap.new_big_int(false, &[i64::MAX as u64]).unwrap(),
        heap.new_big_int(true, &[1 << 63]).unwrap(),
    ];
    let too_big = [
        heap.new_big_int(false, &[1 << 63]).unwrap(),
        heap.new_big_int(true, &[(1 << 63) + 1]).unwrap(),
        heap.new_big_int(false, &[0, 1]).unwrap(),
    ];
    let smi = heap.smi(3);
    for object in fits {
        assert!(check(&mut m, &graph, object));
    }
    for object in too_big {
        assert!(!check(&mut m, &graph, object));
    }
    assert!(!check(&mut m, &graph, smi));
}

#[test]
fn test_big_int_assumption_skips_map_check() {
    let graph = object_is(ObjectIsKind::BigInt, ObjectIsAssumptions::BigInt);
    let mut m = machine(&LoweringConfig::default());
    let big = m.heap_mut().new_big_int(true, &[1]).unwrap();
    assert!(check(&mut m, &graph, big));
    assert_eq!(graph.count_ops(|op| matches!(op, Op::Load { .. })), 0);
}

// ============================================================================
// Map bit predicates
// ============================================================================

#[test]
fn test_callable_and_constructor() {
    holds_for(
        ObjectIsKind::Callable,
        |z| vec![z.function, z.undetectable],
        |z| vec![z.smi, z.plain, z.heap_number],
    );
    holds_for(ObjectIsKind::Constructor, |z| vec![z.function], |z| vec![z.undetectable, z.plain, z.smi]);
}

#[test]
fn test_detectable_callable_and_undetectable() {
    holds_for(
        ObjectIsKind::DetectableCallable,
        |z| vec![z.function],
        |z| vec![z.undetectable, z.plain, z.smi],
    );
    holds_for(ObjectIsKind::Undetectable, |z| vec![z.undetectable], |z| vec![z.function, z.plain, z.smi]);
}

#[test]
fn test_receiver_and_non_callable() {
    holds_for(
        ObjectIsKind::Receiver,
        |z| vec![z.plain, z.function, z.array, z.typed_array],
        |z| vec![z.smi, z.heap_number, z.one_byte, z.symbol, z.null],
    );
    holds_for(
        ObjectIsKind::NonCallable,
        |z| vec![z.plain, z.array, z.data_view],
        |z| vec![z.function, z.undetectable, z.smi, z.heap_number, z.one_byte],
    );
}
