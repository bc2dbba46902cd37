// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! End-to-end programs: source text in, exact stdout out.

use asml::interpreter::{Interpreter, RuntimeError};
use asml::lexer::Lexer;
use asml::memory::ByteMemory;
use asml::parser::{ParseError, Parser, Program};

fn parse(source: &str) -> Result<Program, ParseError> {
    Parser::new(Lexer::new(source.as_bytes())).parse_program()
}

fn run(source: &str) -> (Interpreter, Result<(), RuntimeError>, String) {
    let program = parse(source).expect("program should parse");
    let mut interp = Interpreter::new(ByteMemory::new());
    let mut out = Vec::new();
    let result = interp.run(&program, &mut out);
    let output = String::from_utf8(out).expect("output should be utf-8");
    (interp, result, output)
}

fn run_ok(source: &str) -> String {
    let (_, result, output) = run(source);
    result.expect("program should execute");
    output
}

#[test]
fn adds_registers_and_prints_decimal() {
    let source = "mov x1 5\nmov x2 7\nadd x3 x1 x2\nprint x3 d\n";
    assert_eq!(run_ok(source), "12\n");
}

#[test]
fn prints_hex_bit_pattern() {
    assert_eq!(run_ok("mov x1 0xff\nprint x1 x\n"), "0xff\n");
}

#[test]
fn conditional_branch_selects_equal_path() {
    let source = "\
mov x1 5
mov x2 5
cmp x1 x2
beq eq
mov x3 0
b end
eq:
mov x3 1
end:
print x3 d
";
    assert_eq!(run_ok(source), "1\n");
}

#[test]
fn put_then_print_string() {
    assert_eq!(run_ok("mov x1 0\nput x1 \"hi\"\nprint x1 s\n"), "hi\n");
}

#[test]
fn call_returns_result_in_x0() {
    let source = "\
mov x1 3
call dbl
print x0 d
b end
dbl:
add x0 x1 x1
ret
end:
";
    assert_eq!(run_ok(source), "6\n");
}

#[test]
fn prints_minimum_width_binary() {
    assert_eq!(run_ok("mov x1 5\nlsl x2 x1 2\nprint x2 b\n"), "0b10100\n");
}

#[test]
fn binary_of_zero_is_single_digit() {
    assert_eq!(run_ok("mov x1 0\nprint x1 b\n"), "0b0\n");
}

#[test]
fn prints_negative_decimal_and_its_hex_pattern() {
    let source = "mov x1 0\nsub x1 x1 1\nprint x1 d\nprint x1 x\n";
    assert_eq!(run_ok(source), "-1\n0xffffffffffffffff\n");
}

#[test]
fn empty_program_halts_trivially() {
    assert_eq!(run_ok(""), "");
    assert_eq!(run_ok("\n\n"), "");
}

#[test]
fn countdown_loop_runs_to_completion() {
    let source = "\
mov x1 3
loop:
print x1 d
sub x1 x1 1
cmp x1 0
bgt loop
print x1 d
";
    assert_eq!(run_ok(source), "3\n2\n1\n0\n");
}

#[test]
fn all_branch_conditions_follow_flags() {
    let source = "\
mov x1 2
cmp x1 5
bge skip
print x1 d
skip:
ble less
print x1 x
less:
bne done
print x1 b
done:
";
    // x1 < 5: bge not taken, ble taken, bne taken.
    assert_eq!(run_ok(source), "2\n");
}

#[test]
fn store_load_round_trip_through_memory() {
    let source = "\
mov x1 0x11223344
store x1 64 2
load x2 2 64
print x2 x
";
    assert_eq!(run_ok(source), "0x3344\n");
}

#[test]
fn ret_on_empty_stack_is_a_clean_halt() {
    let (interp, result, output) = run("ret\nprint x1 d\n");
    assert!(result.is_ok());
    assert!(!interp.had_error());
    assert_eq!(output, "");
}

#[test]
fn unknown_branch_label_stops_execution() {
    let (interp, result, output) = run("print x1 d\nb nowhere\nprint x1 d\n");
    assert!(matches!(result, Err(RuntimeError::UnknownLabel { .. })));
    assert!(interp.had_error());
    // Output before the failure remains.
    assert_eq!(output, "0\n");
}

#[test]
fn duplicate_labels_resolve_to_first_declaration() {
    let source = "\
b target
target:
mov x1 1
b end
target:
mov x1 2
end:
print x1 d
";
    assert_eq!(run_ok(source), "1\n");
}

#[test]
fn stack_depth_returns_after_each_ret() {
    let source = "\
call one
call one
print x0 d
b end
one:
add x0 x0 1
ret
end:
";
    let (interp, result, output) = run(source);
    result.expect("program should execute");
    assert_eq!(interp.call_depth(), 0);
    assert_eq!(output, "2\n");
}

#[test]
fn mov_with_register_source_is_a_parse_error() {
    let err = parse("mov x1 x2\n").expect_err("mov must take an immediate");
    assert_eq!(err.line, 1);
}

#[test]
fn out_of_range_register_is_a_parse_error() {
    assert!(parse("add x32 x1 x2\n").is_err());
}

#[test]
fn comments_are_ignored() {
    let source = "# setup\nmov x1 5 ; five\nprint x1 d\n";
    assert_eq!(run_ok(source), "5\n");
}

#[test]
fn cmp_unsigned_branches_differently_from_signed() {
    let source = "\
mov x1 0
sub x1 x1 1
cmpu x1 1
bgt big
print x1 d
b end
big:
print x1 x
end:
";
    // As unsigned, -1 compares greater than 1.
    assert_eq!(run_ok(source), "0xffffffffffffffff\n");
}
