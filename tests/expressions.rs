mod common;

use common::{Key, Machine, Value, compile, compile_with, run_unit, symbols};
use php_rs_compiler::compiler::opcode::OpCode;
use php_rs_compiler::compiler::{CompileOptions, Compiler, DiagnosticKind};
use php_rs_compiler::core::value::Val;
use php_rs_compiler::parser::ast::builder::AstBuilder;
use php_rs_compiler::parser::ast::{BinaryOp, ExprKind, ListItem, StmtKind, UnaryOp};

// ============================================================================
// Increment / decrement
// ============================================================================

#[test]
fn test_post_increment_yields_old_value() {
    let mut b = AstBuilder::new();
    let x = b.var("x");
    let five = b.int(5);
    let init = b.assign(x, five);
    let s1 = b.expr_stmt(init);
    let y = b.var("y");
    let x = b.var("x");
    let inc = b.post_inc(x);
    let assign = b.assign(y, inc);
    let s2 = b.expr_stmt(assign);
    let y = b.var("y");
    let ret = b.ret(Some(y));
    let unit = b.finish("inc.php", vec![s1, s2, ret]);

    let (result, machine) = run_unit(unit);
    assert_eq!(result, Value::Int(5));
    assert_eq!(machine.var("x"), Value::Int(6));
}

#[test]
fn test_pre_increment_and_decrement_yield_new_value() {
    let mut b = AstBuilder::new();
    let x = b.var("x");
    let five = b.int(5);
    let init = b.assign(x, five);
    let s1 = b.expr_stmt(init);
    let y = b.var("y");
    let x = b.var("x");
    let inc = b.pre_inc(x);
    let assign = b.assign(y, inc);
    let s2 = b.expr_stmt(assign);
    let z = b.var("z");
    let x = b.var("x");
    let dec = b.pre_dec(x);
    let assign = b.assign(z, dec);
    let s3 = b.expr_stmt(assign);
    let unit = b.finish("inc.php", vec![s1, s2, s3]);

    let (_, machine) = run_unit(unit);
    assert_eq!(machine.var("y"), Value::Int(6));
    assert_eq!(machine.var("z"), Value::Int(5));
    assert_eq!(machine.var("x"), Value::Int(5));
}

#[test]
fn test_increment_of_item_evaluates_index_once() {
    // $a[key()]++;
    let mut b = AstBuilder::new();
    let a = b.var("a");
    let key = b.call("key", vec![]);
    let item = b.item(a, key);
    let inc = b.post_inc(item);
    let s1 = b.expr_stmt(inc);
    let a = b.var("a");
    let ret = b.ret(Some(a));
    let unit = b.finish("item.php", vec![s1, ret]);

    let (result, machine) = run_unit(unit);
    assert_eq!(machine.calls_to("key"), 1);
    assert_eq!(
        result,
        Value::array(vec![(Key::Str("k".into()), Value::Int(1))])
    );
}

#[test]
fn test_nested_item_assignment_creates_arrays() {
    // $a["x"][] = 1; $a["x"][] = 2;
    let mut b = AstBuilder::new();
    let mut stmts = Vec::new();
    for value in [1, 2] {
        let a = b.var("a");
        let x = b.string("x");
        let inner = b.item(a, x);
        let slot = b.append(inner);
        let v = b.int(value);
        let assign = b.assign(slot, v);
        stmts.push(b.expr_stmt(assign));
    }
    let unit = b.finish("nested.php", stmts);

    let (_, machine) = run_unit(unit);
    assert_eq!(
        machine.var("a"),
        Value::array(vec![(
            Key::Str("x".into()),
            Value::list(vec![Value::Int(1), Value::Int(2)])
        )])
    );
}

// ============================================================================
// Assignment and arrays
// ============================================================================

#[test]
fn test_assignment_copies_arrays() {
    // $a = [1]; $b = $a; $b[] = 2; return $a;
    let mut b = AstBuilder::new();
    let a = b.var("a");
    let one = b.int(1);
    let arr = b.list_array(vec![one]);
    let assign = b.assign(a, arr);
    let s1 = b.expr_stmt(assign);
    let bv = b.var("b");
    let a = b.var("a");
    let assign = b.assign(bv, a);
    let s2 = b.expr_stmt(assign);
    let bv = b.var("b");
    let slot = b.append(bv);
    let two = b.int(2);
    let assign = b.assign(slot, two);
    let s3 = b.expr_stmt(assign);
    let a = b.var("a");
    let ret = b.ret(Some(a));
    let unit = b.finish("copy.php", vec![s1, s2, s3, ret]);

    let (result, machine) = run_unit(unit);
    assert_eq!(result, Value::list(vec![Value::Int(1)]));
    assert_eq!(
        machine.var("b"),
        Value::list(vec![Value::Int(1), Value::Int(2)])
    );
}

#[test]
fn test_array_literal_capacity_counts_key_kinds() {
    // [1, 2, "k" => 3, 4 => 5]
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let two = b.int(2);
    let k = b.string("k");
    let three = b.int(3);
    let four = b.int(4);
    let five = b.int(5);
    let arr = b.array(vec![(None, one), (None, two), (Some(k), three), (Some(four), five)]);
    let a = b.var("a");
    let assign = b.assign(a, arr);
    let stmt = b.expr_stmt(assign);
    let unit = b.finish("capacity.php", vec![stmt]);

    let compiled = compile(unit);
    let chunk = compiled.emitted();
    assert!(chunk.code.contains(&OpCode::NewArray {
        int_capacity: 3,
        string_capacity: 1,
    }));

    let mut machine = Machine::new();
    machine.run(chunk).unwrap();
    assert_eq!(
        machine.var("a"),
        Value::array(vec![
            (Key::Int(0), Value::Int(1)),
            (Key::Int(1), Value::Int(2)),
            (Key::Str("k".into()), Value::Int(3)),
            (Key::Int(4), Value::Int(5)),
        ])
    );
}

#[test]
fn test_unset_item_and_variable() {
    // $a = ["x" => 1, "y" => 2]; $v = 1; unset($a["x"], $v);
    let mut b = AstBuilder::new();
    let x = b.string("x");
    let one = b.int(1);
    let y = b.string("y");
    let two = b.int(2);
    let arr = b.array(vec![(Some(x), one), (Some(y), two)]);
    let a = b.var("a");
    let assign = b.assign(a, arr);
    let s1 = b.expr_stmt(assign);
    let v = b.var("v");
    let one = b.int(1);
    let assign = b.assign(v, one);
    let s2 = b.expr_stmt(assign);
    let a = b.var("a");
    let x = b.string("x");
    let item = b.item(a, x);
    let v = b.var("v");
    let unset = b.unset(vec![item, v]);
    let unit = b.finish("unset.php", vec![s1, s2, unset]);

    let (_, machine) = run_unit(unit);
    assert_eq!(
        machine.var("a"),
        Value::array(vec![(Key::Str("y".into()), Value::Int(2))])
    );
    assert!(!machine.globals.contains_key("v"));
    assert!(machine.notices.is_empty());
}

// ============================================================================
// List destructuring
// ============================================================================

#[test]
fn test_list_with_skip_and_nested_targets() {
    // [$a, , [$b, $c]] = [1, 2, [3, 4]];
    let mut b = AstBuilder::new();
    let three = b.int(3);
    let four = b.int(4);
    let inner = b.list_array(vec![three, four]);
    let one = b.int(1);
    let two = b.int(2);
    let value = b.list_array(vec![one, two, inner]);
    let a = b.var("a");
    let bv = b.var("b");
    let c = b.var("c");
    let list = b.list(
        vec![
            ListItem::Target(a),
            ListItem::Skip,
            ListItem::Nested(vec![ListItem::Target(bv), ListItem::Target(c)]),
        ],
        value,
    );
    let stmt = b.expr_stmt(list);
    let unit = b.finish("list.php", vec![stmt]);

    let (_, machine) = run_unit(unit);
    assert_eq!(machine.var("a"), Value::Int(1));
    assert_eq!(machine.var("b"), Value::Int(3));
    assert_eq!(machine.var("c"), Value::Int(4));
}

#[test]
fn test_list_of_non_array_assigns_null() {
    // $a = 1; $b = 1; [$a, [$b]] = 5;
    let mut b = AstBuilder::new();
    let mut stmts = Vec::new();
    for name in ["a", "b"] {
        let var = b.var(name);
        let one = b.int(1);
        let assign = b.assign(var, one);
        stmts.push(b.expr_stmt(assign));
    }
    let a = b.var("a");
    let bv = b.var("b");
    let five = b.int(5);
    let list = b.list(
        vec![ListItem::Target(a), ListItem::Nested(vec![ListItem::Target(bv)])],
        five,
    );
    stmts.push(b.expr_stmt(list));
    let unit = b.finish("list.php", stmts);

    let (_, machine) = run_unit(unit);
    assert_eq!(machine.var("a"), Value::Null);
    assert_eq!(machine.var("b"), Value::Null);
}

#[test]
fn test_list_missing_elements_are_quiet() {
    // [$a, $b] = [7];
    let mut b = AstBuilder::new();
    let seven = b.int(7);
    let value = b.list_array(vec![seven]);
    let a = b.var("a");
    let bv = b.var("b");
    let list = b.list(vec![ListItem::Target(a), ListItem::Target(bv)], value);
    let stmt = b.expr_stmt(list);
    let unit = b.finish("list.php", vec![stmt]);

    let (_, machine) = run_unit(unit);
    assert_eq!(machine.var("a"), Value::Int(7));
    assert_eq!(machine.var("b"), Value::Null);
    assert!(machine.notices.is_empty());
}

// ============================================================================
// Concatenation
// ============================================================================

#[test]
fn test_concat_folds_adjacent_literals() {
    // echo "a" . "b" . $x . "c" . "d";
    let mut b = AstBuilder::new();
    let parts = vec![b.string("a"), b.string("b"), b.var("x"), b.string("c"), b.string("d")];
    let concat = b.concat(parts);
    let echo = b.echo(vec![concat]);
    let unit = b.finish("concat.php", vec![echo]);

    let options = CompileOptions::default();
    let symbols = symbols();
    let mut errors = php_rs_compiler::compiler::Diagnostics::new();
    let analyzed = Compiler::new(&options)
        .analyze(unit, &symbols, &mut errors)
        .unwrap();

    let StmtKind::Echo { exprs } = &analyzed.statements()[0].kind else {
        panic!("expected echo");
    };
    let ExprKind::Concat { operands } = &exprs[0].kind else {
        panic!("expected concat, got {:?}", exprs[0].kind);
    };
    let values: Vec<Option<&Val>> = operands.iter().map(|o| o.value()).collect();
    assert_eq!(
        values,
        vec![
            Some(&Val::String("ab".into())),
            None,
            Some(&Val::String("cd".into()))
        ]
    );
}

#[test]
fn test_concat_runtime_output() {
    // $x = 1; echo "a" . "b" . $x . "c" . "d"; echo "" . $x;
    let mut b = AstBuilder::new();
    let x = b.var("x");
    let one = b.int(1);
    let assign = b.assign(x, one);
    let s1 = b.expr_stmt(assign);
    let parts = vec![b.string("a"), b.string("b"), b.var("x"), b.string("c"), b.string("d")];
    let concat = b.concat(parts);
    let s2 = b.echo(vec![concat]);
    let parts = vec![b.string(""), b.var("x")];
    let concat = b.concat(parts);
    let s3 = b.echo(vec![concat]);
    let unit = b.finish("concat.php", vec![s1, s2, s3]);

    let (_, machine) = run_unit(unit);
    assert_eq!(machine.output, "ab1cd1");
}

#[test]
fn test_concat_of_constants_folds_completely() {
    // const GREETING = "hi"; echo GREETING . "!" . 2;
    let mut b = AstBuilder::new();
    let hi = b.string("hi");
    let decl = b.const_decl("GREETING", hi);
    let parts = vec![b.constant("GREETING"), b.string("!"), b.int(2)];
    let concat = b.concat(parts);
    let echo = b.echo(vec![concat]);
    let unit = b.finish("const.php", vec![decl, echo]);

    let compiled = compile(unit);
    let chunk = compiled.emitted();
    assert!(chunk.constants.contains(&Val::String("hi!2".into())));
    assert!(!chunk.code.iter().any(|op| matches!(op, OpCode::LoadConstant(_))));

    let mut machine = Machine::new();
    machine.run(chunk).unwrap();
    assert_eq!(machine.output, "hi!2");
    assert_eq!(machine.constants.get("GREETING"), Some(&Value::str("hi")));
}

#[test]
fn test_concat_without_folding_keeps_operands() {
    let mut b = AstBuilder::new();
    let parts = vec![b.string("a"), b.string("b")];
    let concat = b.concat(parts);
    let echo = b.echo(vec![concat]);
    let unit = b.finish("nofold.php", vec![echo]);

    let compiled = compile_with(unit, &CompileOptions::default().with_constant_folding(false));
    let chunk = compiled.emitted();
    assert!(!chunk.constants.contains(&Val::String("ab".into())));

    let mut machine = Machine::new();
    machine.run(chunk).unwrap();
    assert_eq!(machine.output, "ab");
}

// ============================================================================
// Conditionals
// ============================================================================

#[test]
fn test_shortcut_ternary_evaluates_condition_once() {
    // $r = key() ?: "fallback";
    let mut b = AstBuilder::new();
    let r = b.var("r");
    let key = b.call("key", vec![]);
    let fallback = b.string("fallback");
    let cond = b.shortcut(key, fallback);
    let assign = b.assign(r, cond);
    let stmt = b.expr_stmt(assign);
    let unit = b.finish("shortcut.php", vec![stmt]);

    let (_, machine) = run_unit(unit);
    assert_eq!(machine.var("r"), Value::str("k"));
    assert_eq!(machine.calls_to("key"), 1);
}

#[test]
fn test_shortcut_ternary_falls_back() {
    // $n = 0; $r = $n ?: "fallback";
    let mut b = AstBuilder::new();
    let n = b.var("n");
    let zero = b.int(0);
    let assign = b.assign(n, zero);
    let s1 = b.expr_stmt(assign);
    let r = b.var("r");
    let n = b.var("n");
    let fallback = b.string("fallback");
    let cond = b.shortcut(n, fallback);
    let assign = b.assign(r, cond);
    let s2 = b.expr_stmt(assign);
    let unit = b.finish("shortcut.php", vec![s1, s2]);

    let (_, machine) = run_unit(unit);
    assert_eq!(machine.var("r"), Value::str("fallback"));
}

#[test]
fn test_falsy_shortcut_condition_runs_once() {
    // $i = 0; $r = (++$i - 1) ?: "fb";
    let mut b = AstBuilder::new();
    let i = b.var("i");
    let zero = b.int(0);
    let assign = b.assign(i, zero);
    let s1 = b.expr_stmt(assign);
    let i = b.var("i");
    let inc = b.pre_inc(i);
    let one = b.int(1);
    let cond = b.binary(BinaryOp::Sub, inc, one);
    let fallback = b.string("fb");
    let shortcut = b.shortcut(cond, fallback);
    let r = b.var("r");
    let assign = b.assign(r, shortcut);
    let s2 = b.expr_stmt(assign);
    let unit = b.finish("shortcut.php", vec![s1, s2]);

    let (_, machine) = run_unit(unit);
    assert_eq!(machine.var("i"), Value::Int(1));
    assert_eq!(machine.var("r"), Value::str("fb"));
}

#[test]
fn test_ternary_selects_branch() {
    // $a = 3; $r = $a < 2 ? "small" : "large";
    let mut b = AstBuilder::new();
    let a = b.var("a");
    let three = b.int(3);
    let assign = b.assign(a, three);
    let s1 = b.expr_stmt(assign);
    let a = b.var("a");
    let two = b.int(2);
    let cond = b.binary(BinaryOp::LessThan, a, two);
    let small = b.string("small");
    let large = b.string("large");
    let ternary = b.ternary(cond, small, large);
    let r = b.var("r");
    let assign = b.assign(r, ternary);
    let s2 = b.expr_stmt(assign);
    let unit = b.finish("ternary.php", vec![s1, s2]);

    let (_, machine) = run_unit(unit);
    assert_eq!(machine.var("r"), Value::str("large"));
}

// ============================================================================
// Operators and calls
// ============================================================================

#[test]
fn test_binary_and_unary_operators_fold() {
    // return -(2 * 3) + 1;
    let mut b = AstBuilder::new();
    let two = b.int(2);
    let three = b.int(3);
    let mul = b.binary(BinaryOp::Mul, two, three);
    let neg = b.unary(UnaryOp::Minus, mul);
    let one = b.int(1);
    let add = b.binary(BinaryOp::Add, neg, one);
    let ret = b.ret(Some(add));
    let unit = b.finish("fold.php", vec![ret]);

    let compiled = compile(unit);
    let chunk = compiled.emitted();
    assert!(!chunk.code.iter().any(|op| matches!(op, OpCode::Call(_))));

    let mut machine = Machine::new();
    assert_eq!(machine.run(chunk).unwrap(), Value::Int(-5));
}

#[test]
fn test_operators_at_runtime() {
    // $a = 4; return ($a * $a) - 1;
    let mut b = AstBuilder::new();
    let a = b.var("a");
    let four = b.int(4);
    let assign = b.assign(a, four);
    let s1 = b.expr_stmt(assign);
    let l = b.var("a");
    let r = b.var("a");
    let mul = b.binary(BinaryOp::Mul, l, r);
    let one = b.int(1);
    let sub = b.binary(BinaryOp::Sub, mul, one);
    let ret = b.ret(Some(sub));
    let unit = b.finish("ops.php", vec![s1, ret]);

    let (result, _) = run_unit(unit);
    assert_eq!(result, Value::Int(15));
}

#[test]
fn test_by_reference_argument() {
    // set_to_ten($z);
    let mut b = AstBuilder::new();
    let z = b.var("z");
    let call = b.call("set_to_ten", vec![z]);
    let stmt = b.expr_stmt(call);
    let unit = b.finish("byref.php", vec![stmt]);

    let compiled = compile(unit);
    let chunk = compiled.emitted();
    assert!(chunk.code.contains(&OpCode::LoadVarRef("z".into())));

    let mut machine = Machine::new();
    machine.run(chunk).unwrap();
    assert_eq!(machine.var("z"), Value::Int(10));
}

#[test]
fn test_unknown_function_is_a_warning() {
    let mut b = AstBuilder::new();
    let x = b.var("x");
    let call = b.call("nope", vec![x]);
    let stmt = b.expr_stmt(call);
    let unit = b.finish("unknown.php", vec![stmt]);

    let compiled = compile(unit);
    assert_eq!(
        compiled.diagnostics.kinds(),
        vec![&DiagnosticKind::UnknownFunction { name: "nope".into() }]
    );
    // unknown callee: the argument is passed as a reference the callee may bind
    assert!(compiled.emitted().code.contains(&OpCode::LoadVarRef("x".into())));
}

#[test]
fn test_unknown_callee_can_bind_argument_by_reference() {
    // $n = 1; $m = 5; increment_ref($n); echo id_unknown($m), $m;
    let mut b = AstBuilder::new();
    let n = b.var("n");
    let one = b.int(1);
    let assign = b.assign(n, one);
    let s1 = b.expr_stmt(assign);
    let m = b.var("m");
    let five = b.int(5);
    let assign = b.assign(m, five);
    let s2 = b.expr_stmt(assign);
    let n = b.var("n");
    let call = b.call("increment_ref", vec![n]);
    let s3 = b.expr_stmt(call);
    let m = b.var("m");
    let by_value = b.call("id_unknown", vec![m]);
    let m = b.var("m");
    let s4 = b.echo(vec![by_value, m]);
    let unit = b.finish("runtime_ref.php", vec![s1, s2, s3, s4]);

    let compiled = compile(unit);
    assert_eq!(compiled.diagnostics.len(), 2);
    assert!(compiled.emitted().code.contains(&OpCode::LoadVarRef("n".into())));

    let mut machine = Machine::new();
    machine.run(compiled.emitted()).unwrap();
    assert_eq!(machine.var("n"), Value::Int(2));
    assert_eq!(machine.var("m"), Value::Int(5));
    assert_eq!(machine.output, "55");
}

#[test]
fn test_unset_cast_is_deprecated_but_compiles() {
    // $v = 1; $v = (unset) $v;
    let mut b = AstBuilder::new();
    let v = b.var("v");
    let one = b.int(1);
    let assign = b.assign(v, one);
    let s1 = b.expr_stmt(assign);
    let v = b.var("v");
    let operand = b.var("v");
    let cast = b.unary(UnaryOp::UnsetCast, operand);
    let assign = b.assign(v, cast);
    let s2 = b.expr_stmt(assign);
    let unit = b.finish("unset_cast.php", vec![s1, s2]);

    let compiled = compile(unit);
    assert_eq!(
        compiled.diagnostics.kinds(),
        vec![&DiagnosticKind::DeprecatedConstruct {
            what: "(unset) cast".into()
        }]
    );
    let mut machine = Machine::new();
    machine.run(compiled.emitted()).unwrap();
    assert_eq!(machine.var("v"), Value::Null);
}

#[test]
fn test_silence_suppresses_notices() {
    // $a = []; $x = @$a["missing"]; $y = $a["missing"];
    let mut b = AstBuilder::new();
    let a = b.var("a");
    let empty = b.list_array(vec![]);
    let assign = b.assign(a, empty);
    let s1 = b.expr_stmt(assign);
    let a = b.var("a");
    let missing = b.string("missing");
    let item = b.item(a, missing);
    let silenced = b.unary(UnaryOp::Silence, item);
    let x = b.var("x");
    let assign = b.assign(x, silenced);
    let s2 = b.expr_stmt(assign);
    let a = b.var("a");
    let missing = b.string("missing");
    let item = b.item(a, missing);
    let y = b.var("y");
    let assign = b.assign(y, item);
    let s3 = b.expr_stmt(assign);
    let unit = b.finish("silence.php", vec![s1, s2, s3]);

    let (_, machine) = run_unit(unit);
    assert_eq!(machine.var("x"), Value::Null);
    assert_eq!(machine.notices, vec!["Undefined array key \"missing\"".to_string()]);
}

#[test]
fn test_constant_redeclaration_is_an_error() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let first = b.const_decl("LIMIT", one);
    let two = b.int(2);
    let second = b.const_decl("LIMIT", two);
    let unit = b.finish("const.php", vec![first, second]);

    let compiled = compile(unit);
    assert_eq!(
        compiled.diagnostics.kinds(),
        vec![&DiagnosticKind::ConstantRedeclared { name: "LIMIT".into() }]
    );
    assert!(!compiled.result.unwrap().emitted);
    assert!(compiled.chunk.is_empty());
}
