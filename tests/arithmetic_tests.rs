// Integer and comparison semantics of evaluated programs

use pretty_assertions::assert_eq;

use vcc::ir::{Evaluator, RtValue};

fn eval_int(body: &str) -> i64 {
    let source = format!("function main gives long [] {{\n{body}\n}}\n");
    let compilation = vcc::compile(&source);
    assert!(!compilation.have_error(), "{}", compilation.diagnostics().render());
    let mut eval = Evaluator::new(&compilation.module).unwrap();
    eval.call("main", &[]).unwrap().and_then(|v| v.as_i64()).unwrap()
}

#[test]
fn test_precedence() {
    assert_eq!(eval_int("ret cast<long>(2 + 3 * 4);"), 14);
    assert_eq!(eval_int("ret cast<long>((2 + 3) * 4);"), 20);
    assert_eq!(eval_int("ret cast<long>(20 - 6 - 4);"), 10);
}

#[test]
fn test_signed_division_truncates() {
    assert_eq!(eval_int("ret cast<long>((0 - 7) / 2);"), -3);
    assert_eq!(eval_int("ret cast<long>(7 / (0 - 2));"), -3);
}

#[test]
fn test_narrow_arithmetic_wraps() {
    let body = "short s = cast<short>(32767);\n  ret cast<long>(s + cast<short>(1));";
    assert_eq!(eval_int(body), -32768);
}

#[test]
fn test_mixed_width_widens() {
    // int + long sign-extends the int side.
    assert_eq!(eval_int("long big = cast<long>(1);\n  ret big + (0 - 5);"), -4);
    // bool operands are zero-extended.
    assert_eq!(eval_int("ret cast<long>(cast<int>(1 gt 0) + (2 gt 1));"), 2);
}

#[test]
fn test_comparisons_are_signed() {
    assert_eq!(eval_int("ret cast<long>((0 - 1) lt 1);"), 1);
    assert_eq!(eval_int("ret cast<long>(3 ge 3);"), 1);
    assert_eq!(eval_int("ret cast<long>(3 ne 3);"), 0);
}

#[test]
fn test_bool_result() {
    let source = "function cmp gives bool [int a, int b] {\n  ret a eq b;\n}\n";
    let compilation = vcc::compile(source);
    let mut eval = Evaluator::new(&compilation.module).unwrap();
    let equal = eval.call("cmp", &[RtValue::int(32, 4), RtValue::int(32, 4)]).unwrap();
    assert_eq!(equal, Some(RtValue::bool(true)));
    let different = eval.call("cmp", &[RtValue::int(32, 4), RtValue::int(32, 5)]).unwrap();
    assert_eq!(different, Some(RtValue::bool(false)));
}
