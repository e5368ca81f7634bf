use super::{compile, CompileErrors, Location};
use crate::{
	vm::{debug::{instructions, Instruction}, heap::Heap, OpCode, Value},
	Options
};
use itertools::Itertools;

fn compile_with(source: &str, options: &Options) -> (Heap, Result<Vec<Instruction>, CompileErrors>) {
	let mut heap = Heap::new(options);
	let result = compile(source, &mut heap, options).map(|script| {
		let chunk = &heap.function(script).unwrap().chunk;
		instructions(&heap, chunk)
	});
	(heap, result)
}

fn op_codes(source: &str) -> Vec<OpCode> {
	let (_, result) = compile_with(source, &Options::default());
	result.unwrap().into_iter()
		.map(|instruction| instruction.op_code.unwrap())
		.collect()
}

fn errors(source: &str) -> Vec<String> {
	let (_, result) = compile_with(source, &Options::default());
	result.unwrap_err().iter().map(ToString::to_string).collect()
}

#[test]
fn precedence() {
	use OpCode::*;
	assert_eq!(op_codes("print 1 + 2 * 3;"),
		[Constant, Constant, Constant, Multiply, Add, Print, Null, Return]);
	assert_eq!(op_codes("print (1 + 2) * -3;"),
		[Constant, Constant, Add, Constant, Negate, Multiply, Print, Null, Return]);
	assert_eq!(op_codes("print !true == false;"),
		[True, Not, False, Equal, Print, Null, Return]);
}

#[test]
fn derived_comparisons() {
	use OpCode::*;
	assert_eq!(op_codes("1 != 2;"), [Constant, Constant, Equal, Not, Pop, Null, Return]);
	assert_eq!(op_codes("1 > 2;"), [Constant, Constant, LessEqual, Not, Pop, Null, Return]);
	assert_eq!(op_codes("1 >= 2;"), [Constant, Constant, Less, Not, Pop, Null, Return]);
}

#[test]
fn globals_and_locals() {
	use OpCode::*;
	assert_eq!(op_codes("var a = 1; {var b = a; b = 2;}"), [
		Constant, DefineGlobal,
		GetGlobal, Constant, SetLocal, Pop, Pop,
		Null, Return
	]);
}

#[test]
fn constants_are_shared() {
	let (heap, result) = compile_with("print 'a'; print 'a'; print 1; print 1;",
		&Options::default());
	let constants = result.unwrap().into_iter()
		.filter(|instruction| instruction.op_code == Ok(OpCode::Constant))
		.map(|instruction| instruction.operands[0])
		.collect::<Vec<_>>();
	assert_eq!(constants, [0, 0, 1, 1]);
	assert!(heap.find_string("a").is_some());
}

#[test]
fn loops() {
	use OpCode::*;
	assert_eq!(op_codes("while (false) print 1;"), [
		False, JumpIfFalse, Pop, Constant, Print, Loop, Pop, Null, Return
	]);
	assert_eq!(op_codes("do print 1; until (true);"), [
		Constant, Print, True, Not, JumpIfFalse, Pop, Loop, Pop, Null, Return
	]);
}

#[test]
fn maps_and_lists() {
	use OpCode::*;
	assert_eq!(op_codes("var m = {'a': 1, 2: [3, 4],}; m.a = m[2];"), [
		Constant, Constant, Constant, Constant, Constant, List, Map, DefineGlobal,
		GetGlobal, GetGlobal, Constant, GetIndex, SetField, Pop,
		Null, Return
	]);
	assert_eq!(op_codes("var m = {}; m[0] = m.b;"), [
		Map, DefineGlobal,
		GetGlobal, Constant, GetGlobal, GetField, SetIndex, Pop,
		Null, Return
	]);
}

#[test]
fn closures_record_their_captures() {
	let options = Options::default();
	let mut heap = Heap::new(&options);
	let source = "fun outer() {var a = 1; fun inner() {return a;} return inner;}";
	let script = compile(source, &mut heap, &options).unwrap();

	let function_constant = |heap: &Heap, chunk: &crate::vm::Chunk| {
		let closure = instructions(heap, chunk).into_iter()
			.find(|instruction| instruction.op_code == Ok(OpCode::Closure)).unwrap();
		let function = chunk.constants[closure.operands[0] as usize].as_object().unwrap();
		(closure, function)
	};

	let (closure, outer) = function_constant(&heap, &heap.function(script).unwrap().chunk);
	assert_eq!(closure.operands.len(), 1);
	assert_eq!(heap.str(Value::Object(heap.function(outer).unwrap().name.unwrap())),
		Some("outer"));

	let (closure, inner) = function_constant(&heap, &heap.function(outer).unwrap().chunk);
	assert_eq!(heap.function(inner).unwrap().up_value_count, 1);
	// The captured local is `a`, in slot 1.
	assert_eq!(closure.operands[1..], [1, 1]);
}

#[test]
fn errors_recover_at_statement_boundaries() {
	let errors = errors("print ;\nvar = 3;\nprint 1;");
	assert_eq!(errors, [
		"[1:7] Error at ';': Expect expression.",
		"[2:5] Error at '=': Expect variable name."
	]);
}

#[test]
fn semantic_errors() {
	let message = |source: &str| errors(source).into_iter().exactly_one().unwrap();

	assert!(message("return 1;").ends_with("Can't return from top-level code."));
	assert!(message("{var a = a;}").ends_with("Can't read local variable in its own initializer."));
	assert!(message("{var a; var a;}").ends_with("Already a variable with this name in this scope."));
	assert!(message("1 = 2;").ends_with("Invalid assignment target."));
	assert!(message("class A {}").ends_with("Classes are not supported."));
	assert!(message("print 99999999999999999999;").ends_with("Integer literal too large."));

	let arguments = (0..33).join(", ");
	assert!(message(&format!("f({});", arguments))
		.ends_with("Can't have more than 32 arguments."));
}

#[test]
fn chunk_limits() {
	let constants = (0..300).map(|number| format!("print {};", number)).join("");
	assert!(errors(&constants).iter()
		.any(|error| error.ends_with("Too many constants in one chunk.")));

	let body = "x = x;".repeat(14000);
	assert!(errors(&format!("if (true) {{{}}}", body)).iter()
		.any(|error| error.ends_with("Too much code to jump over.")));
	assert!(errors(&format!("while (true) {{{}}}", body)).iter()
		.any(|error| error.ends_with("Loop body too large.")));

	let declare = |prefix: &str, count: usize|
		(0..count).map(|index| format!("var {}{};", prefix, index)).join("");
	let locals = errors(&format!("{{{}}}", declare("l", 256)));
	assert_eq!(locals.len(), 1);
	assert!(locals[0].starts_with("[1:") && locals[0].contains("'l255'"));
	assert!(locals[0].ends_with("Too many local variables in function."));
	assert!(compile_with(&format!("{{{}}}", declare("l", 255)), &Options::default()).1.is_ok());

	let read = |prefix: &str, count: usize|
		(0..count).map(|index| format!("{}{};", prefix, index)).join("");
	let captures = format!("fun outer() {{{} fun middle() {{{} fun inner() {{{}{}}}}}}}",
		declare("o", 200), declare("m", 200), read("o", 200), read("m", 57));
	let captures = errors(&captures);
	assert_eq!(captures.len(), 1);
	assert!(captures[0].contains("'m56'"));
	assert!(captures[0].ends_with("Too many closure variables in function."));
}

#[test]
fn incomplete_source() {
	let incomplete = |source: &str| {
		let (_, result) = compile_with(source, &Options::default());
		result.unwrap_err().is_incomplete()
	};

	assert!(incomplete("print 1 +"));
	assert!(incomplete("fun f() {"));
	assert!(incomplete("print 'abc"));
	assert!(!incomplete("print ;"));

	let (_, result) = compile_with("print 'abc", &Options::default());
	let errors = result.unwrap_err();
	assert_eq!(errors.0[0].location, Location::Lexer);
	assert_eq!(errors.0[0].message, "Unterminated string.");
}

#[test]
fn ignoring_case_folds_names() {
	let options = Options {ignore_case: true, ..Options::default()};
	let (_, result) = compile_with("VAR Total = 1; Print TOTAL;", &options);
	let script = result.unwrap();

	let define = &script[1];
	let get = &script[2];
	assert_eq!(define.op_code, Ok(OpCode::DefineGlobal));
	assert_eq!(get.op_code, Ok(OpCode::GetGlobal));
	assert_eq!(define.operands, get.operands);
}
