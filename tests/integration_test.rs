// Integration tests for the compile-and-evaluate pipeline

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use vcc::diagnostics::Diagnostics;
use vcc::ir::{EvalError, Evaluator, Inst, IrType, Operand, RtValue, StructId};
use vcc::parser::stream::SourceStream;
use vcc::parser::Parser;
use vcc::Compilation;

fn compile_ok(source: &str) -> Compilation {
    let compilation = vcc::compile(source);
    assert!(!compilation.have_error(), "{}", compilation.diagnostics().render());
    compilation
}

fn run(source: &str, entry: &str, args: &[RtValue]) -> Option<RtValue> {
    let compilation = compile_ok(source);
    let mut eval = Evaluator::new(&compilation.module).unwrap();
    eval.call(entry, args).unwrap()
}

fn run_int(source: &str, entry: &str, args: &[RtValue]) -> i64 {
    run(source, entry, args).and_then(|v| v.as_i64()).expect("integer result")
}

fn alloca_names(compilation: &Compilation, function: &str) -> Vec<String> {
    let module = &compilation.module;
    let id = module.find_function(function).unwrap();
    module
        .function(id)
        .insts()
        .filter_map(|inst| match inst {
            Inst::Alloca { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_inner_declaration_shadows_parameter() {
    let source = r#"
function f gives int [int a] {
  if a gt 0 then
    int a = 5;
    ret a;
  end
  ret a;
}
"#;
    assert_eq!(run_int(source, "f", &[RtValue::int(32, 3)]), 5);
    assert_eq!(run_int(source, "f", &[RtValue::int(32, -1)]), -1);
}

#[test]
fn test_nested_declarations_allocated_once_at_entry() {
    let source = r#"
function g gives int [int n] {
  int total = 0;
  while n gt 0 then
    if n gt 1 then
      if n gt 2 then
        int deep = n * 10;
        total = total + deep;
      end
      int mid = 1;
      total = total + mid;
    end
    n = n - 1;
  end
  int last = total;
  ret last;
}
"#;
    let compilation = compile_ok(source);
    assert_eq!(alloca_names(&compilation, "g"), ["n", "total", "deep", "mid", "last"]);

    let module = &compilation.module;
    let function = module.function(module.find_function("g").unwrap());
    let entry_allocas = function.blocks[0]
        .insts
        .iter()
        .filter(|inst| matches!(inst, Inst::Alloca { .. }))
        .count();
    assert_eq!(entry_allocas, 5);

    let mut eval = Evaluator::new(module).unwrap();
    let result = eval.call("g", &[RtValue::int(32, 3)]).unwrap();
    assert_eq!(result.and_then(|v| v.as_i64()), Some(32));
}

#[test]
fn test_casts() {
    let source = r#"
function b2i gives int [] {
  bool t = 1 gt 0;
  ret cast<int>(t);
}

function narrow gives short [long v] {
  ret cast<short>(v);
}

function roundtrip gives int [int v] {
  float f = cast<float>(v);
  ret cast<int>(f);
}

function small gives char [] {
  ret cast<char>(300);
}
"#;
    let compilation = compile_ok(source);
    let mut eval = Evaluator::new(&compilation.module).unwrap();
    let mut int = |name: &str, args: &[RtValue]| {
        eval.call(name, args).unwrap().and_then(|v| v.as_i64()).unwrap()
    };

    assert_eq!(int("b2i", &[]), 1);
    assert_eq!(int("narrow", &[RtValue::int(64, -1)]), -1);
    assert_eq!(int("narrow", &[RtValue::int(64, 65537)]), 1);
    assert_eq!(int("roundtrip", &[RtValue::int(32, 7)]), 7);
    assert_eq!(int("roundtrip", &[RtValue::int(32, 16_777_217)]), 16_777_216);
    assert_eq!(int("small", &[]), 44);
}

#[test]
fn test_float_arithmetic() {
    let source = r#"
function half gives float [int v] {
  ret cast<float>(v) / cast<float>(2);
}

function mixed gives float [] {
  ret cast<float>(1) + 2;
}

function less gives bool [float a, float b] {
  ret a lt b;
}
"#;
    let compilation = compile_ok(source);
    let mut eval = Evaluator::new(&compilation.module).unwrap();

    let half = eval.call("half", &[RtValue::int(32, 7)]).unwrap();
    assert_eq!(half.and_then(|v| v.as_f32()), Some(3.5));
    let mixed = eval.call("mixed", &[]).unwrap();
    assert_eq!(mixed.and_then(|v| v.as_f32()), Some(3.0));
    let less = eval.call("less", &[RtValue::Float(1.5), RtValue::Float(2.0)]).unwrap();
    assert_eq!(less, Some(RtValue::bool(true)));
}

#[test]
fn test_store_through_dereferenced_member() {
    let source = r#"
struct Point { int x, int y, }

function setter gives int [] {
  struct Point pt;
  ptr struct Point p = ref<pt>;
  deref<p>.y = 10;
  pt.x = 1;
  ret pt.y * 100 + pt.x;
}
"#;
    let compilation = compile_ok(source);
    let module = &compilation.module;
    let function = module.function(module.find_function("setter").unwrap());
    let field_one = function.insts().any(|inst| {
        matches!(
            inst,
            Inst::Gep { indices, .. }
                if indices[..] == [Operand::Int { bits: 32, value: 0 }, Operand::Int { bits: 32, value: 1 }]
        )
    });
    assert!(field_one);

    let mut eval = Evaluator::new(module).unwrap();
    let result = eval.call("setter", &[]).unwrap();
    assert_eq!(result.and_then(|v| v.as_i64()), Some(1001));
}

#[test]
fn test_member_array_member_chain() {
    let source = r#"
struct In { int a, int c, }
struct Out { int pad, array(3) struct In b, }

function chain gives int [int i] {
  struct Out s;
  s.b[i + 1].c = 7;
  s.b[0].c = 3;
  s.pad = 100;
  ret s.b[i + 1].c + s.b[0].c * 10 + s.pad;
}
"#;
    let compilation = compile_ok(source);
    let module = &compilation.module;
    let struct_id = |name: &str| {
        StructId(module.structs.iter().position(|def| def.name == name).unwrap() as u32)
    };
    let (inner, outer) = (struct_id("In"), struct_id("Out"));
    let zero = Operand::Int { bits: 32, value: 0 };
    let one = Operand::Int { bits: 32, value: 1 };

    let function = module.function(module.find_function("chain").unwrap());
    let geps: Vec<(&IrType, &[Operand])> = function
        .insts()
        .filter_map(|inst| match inst {
            Inst::Gep { ty, indices, .. } => Some((ty, &indices[..])),
            _ => None,
        })
        .collect();

    // s.b[i + 1].c: member b (field 1), array step, member c (field 1).
    let (ty, indices) = geps[0];
    assert_eq!(*ty, IrType::Struct(outer));
    assert_eq!(indices, [zero.clone(), one.clone()]);
    let (ty, indices) = geps[1];
    assert_eq!(*ty, IrType::Array(Box::new(IrType::Struct(inner)), 3));
    assert_eq!(indices.len(), 2);
    assert_eq!(indices[0], zero);
    assert!(matches!(indices[1], Operand::Reg(_)));
    let (ty, indices) = geps[2];
    assert_eq!(*ty, IrType::Struct(inner));
    assert_eq!(indices, [zero.clone(), one.clone()]);

    // s.b[0] indexes with a constant.
    let (ty, indices) = geps[4];
    assert!(matches!(ty, IrType::Array(..)));
    assert_eq!(indices, [zero.clone(), zero.clone()]);

    let mut eval = Evaluator::new(module).unwrap();
    let result = eval.call("chain", &[RtValue::int(32, 1)]).unwrap();
    assert_eq!(result.and_then(|v| v.as_i64()), Some(137));
    let result = eval.call("chain", &[RtValue::int(32, -1)]).unwrap();
    assert_eq!(result.and_then(|v| v.as_i64()), Some(133));
}

#[test]
fn test_array_through_pointer() {
    let source = r#"
function arrays gives int [] {
  array(3) int xs;
  xs[0] = 4;
  xs[1] = 5;
  xs[2] = 6;
  ptr int q = ref<xs[0]>;
  q[2] = q[1] + xs[2];
  ret xs[2];
}
"#;
    assert_eq!(run_int(source, "arrays", &[]), 11);
}

#[test]
fn test_pointer_parameter() {
    let source = r#"
function bump gives void [ptr int p] {
  deref<p> = deref<p> + 1;
}

function main gives int [] {
  int x = 41;
  bump(ref<x>);
  ret x;
}
"#;
    assert_eq!(run_int(source, "main", &[]), 42);
}

#[test]
fn test_recursion() {
    let source = r#"
function fact gives long [long n] {
  if n le 1 then
    ret cast<long>(1);
  end
  ret n * fact(n - 1);
}
"#;
    assert_eq!(run_int(source, "fact", &[RtValue::int(64, 10)]), 3_628_800);
    assert_eq!(run_int(source, "fact", &[RtValue::int(64, 1)]), 1);
}

#[test]
fn test_while_loop() {
    let source = r#"
function sum gives int [int n] {
  int acc = 0;
  int i = 1;
  while i le n then
    acc = acc + i;
    i = i + 1;
  end
  ret acc;
}
"#;
    assert_eq!(run_int(source, "sum", &[RtValue::int(32, 100)]), 5050);
    assert_eq!(run_int(source, "sum", &[RtValue::int(32, 0)]), 0);
}

#[test]
fn test_external_host_calls() {
    let source = r#"
external function puts gives int [ptr char s];
external function putint gives void [int v];

function main gives int [] {
  puts("hello\n");
  int i = 0;
  while i lt 3 then
    putint(i * i);
    i = i + 1;
  end
  ret 0;
}
"#;
    let compilation = compile_ok(source);
    let output = Rc::new(RefCell::new(Vec::new()));

    let mut eval = Evaluator::new(&compilation.module).unwrap();
    let sink = Rc::clone(&output);
    eval.register_host("puts", move |memory, args| {
        let address = args[0].as_ptr().ok_or("pointer expected")?;
        let text = memory.read_c_string(address).map_err(|e| e.to_string())?;
        sink.borrow_mut().push(text);
        Ok(Some(RtValue::int(32, 0)))
    });
    let sink = Rc::clone(&output);
    eval.register_host("putint", move |_, args| {
        let value = args[0].as_i64().ok_or("integer expected")?;
        sink.borrow_mut().push(value.to_string());
        Ok(None)
    });

    let result = eval.call("main", &[]).unwrap();
    assert_eq!(result.and_then(|v| v.as_i64()), Some(0));
    assert_eq!(*output.borrow(), ["hello\n", "0", "1", "4"]);
}

#[test]
fn test_missing_host_function() {
    let source = r#"
external function putint gives void [int v];

function main gives void [] {
  putint(1);
}
"#;
    let compilation = compile_ok(source);
    let mut eval = Evaluator::new(&compilation.module).unwrap();
    assert!(matches!(eval.call("main", &[]), Err(EvalError::MissingHost(_))));
}

#[test]
fn test_runtime_errors() {
    let source = r#"
function div gives int [int v] {
  ret 10 / v;
}

function spin gives void [] {
  while 1 then
  end
}
"#;
    let compilation = compile_ok(source);
    let mut eval = Evaluator::new(&compilation.module).unwrap();
    assert_eq!(
        eval.call("div", &[RtValue::int(32, 2)]).unwrap().and_then(|v| v.as_i64()),
        Some(5)
    );
    assert!(matches!(eval.call("div", &[RtValue::int(32, 0)]), Err(EvalError::DivisionByZero)));

    let mut eval = Evaluator::new(&compilation.module).unwrap().with_max_steps(1000);
    assert!(matches!(eval.call("spin", &[]), Err(EvalError::StepLimit(_))));
}

#[test]
fn test_ir_text() {
    let source = r#"
function add gives int [int a, int b] {
  ret a + b;
}

function clamp gives int [int v] {
  if v lt 0 then
    ret 0;
  end
  ret v;
}
"#;
    let expected = "\
define i32 @add(i32, i32) {
bb0:
  %0 = alloca i32 ; a
  store %arg0, %0
  %1 = alloca i32 ; b
  store %arg1, %1
  %2 = load i32, %0
  %3 = load i32, %1
  %4 = add %2, %3
  ret %4
}

define i32 @clamp(i32) {
bb0:
  %0 = alloca i32 ; v
  store %arg0, %0
  %1 = load i32, %0
  %2 = icmp slt %1, i32 0
  %3 = icmp ne %2, i1 0
  br %3, bb1, bb2
bb1:
  ret i32 0
bb2:
  %4 = load i32, %0
  ret %4
}
";
    assert_eq!(compile_ok(source).module.to_string(), expected);
}

#[test]
fn test_compile_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "function main gives int [] {{\n  ret 6 * 7;\n}}\n").unwrap();

    let stream = SourceStream::open(file.path()).unwrap();
    let unit = Parser::from_stream(stream, Diagnostics::new()).parse();
    let compilation = vcc::compile_unit(unit);
    assert!(!compilation.have_error());

    let mut eval = Evaluator::new(&compilation.module).unwrap();
    let result = eval.call("main", &[]).unwrap();
    assert_eq!(result.and_then(|v| v.as_i64()), Some(42));
}
