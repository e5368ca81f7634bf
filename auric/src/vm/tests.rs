use super::{object::ObjectKind, RuntimeError, Status, Value, VirtualMachine, FRAMES_MAX};
use crate::{std_lib::define_standard_natives, Error, Options};
use std::{cell::RefCell, io::{Result as IOResult, Write}, rc::Rc};

/// Collects everything printed, so tests can look at it afterwards.
#[derive(Clone, Default)]
struct Output(Rc<RefCell<Vec<u8>>>);

impl Output {
	fn take(&self) -> String {
		String::from_utf8(self.0.borrow_mut().drain(..).collect()).unwrap()
	}
}

impl Write for Output {
	fn write(&mut self, buffer: &[u8]) -> IOResult<usize> {
		self.0.borrow_mut().write(buffer)
	}

	fn flush(&mut self) -> IOResult<()> {
		Ok(())
	}
}

fn machine(options: Options) -> (VirtualMachine, Output) {
	let output = Output::default();
	let mut virtual_machine = VirtualMachine::with_options(options)
		.with_output(output.clone());
	define_standard_natives(&mut virtual_machine);
	(virtual_machine, output)
}

fn run_with(options: Options, source: &str) -> String {
	let (mut virtual_machine, output) = machine(options);
	virtual_machine.run(source).unwrap();
	output.take()
}

fn run(source: &str) -> String {
	run_with(Options::default(), source)
}

fn runtime_error(source: &str) -> RuntimeError {
	let (mut virtual_machine, _) = machine(Options::default());
	match virtual_machine.run(source) {
		Err(Error::Runtime(error)) => error,
		result => panic!("expected a runtime error, got {:?}", result)
	}
}

const CLOSURES: &str = "
fun make() {
	var count = 0;
	fun increment() {count = count + 1; return count;}
	return increment;
}
var a = make();
var b = make();
print a();
print a();
print b();

var functions = [];
for (var i = 0; i < 3; i = i + 1) {
	var j = i;
	functions[i] = fun () {return j * 10;};
}
print functions[0]();
print functions[2]();

fun pair() {
	var shared = 0;
	fun get() {return shared;}
	fun set(value) {shared = value;}
	set(5);
	return get;
}
print pair()();
";

const MAPS: &str = "
var m = {'a': 1};
m.b = 2;
m['c'] = 3;
print m;
print m.a + m['b'];
print m.missing;
print [1, 'two', [3]];
m.self = m;
print m.self.self.a;
print len(m);
print keys({'x': 1, 2: 'y'});
";

#[test]
fn arithmetic() {
	assert_eq!(run("print 1 + 2; print 7 / 2; print 7 / 2.0; print 0.1 + 0.2;"),
		"3\n3\n3.5\n0.3\n");
	assert_eq!(run("print true + 1; print -false; print 2 * 3.5 - 1;"), "2\n0\n6\n");
	assert_eq!(run("print 9223372036854775807 + 1;"), "-9223372036854775808\n");
	assert_eq!(run("print 1 / 0.0; print 0x10 + 0xff;"), "inf\n271\n");
	assert_eq!(runtime_error("print 1 / 0;").message, "Division by zero.");
	assert_eq!(runtime_error("print 1 - 'a';").message, "Operands must be numbers.");
	assert_eq!(runtime_error("print -'a';").message, "Operand must be a number.");
	assert_eq!(runtime_error("print 1 + 'a';").message,
		"Operands must be two numbers or two strings.");
}

#[test]
fn comparison_and_equality() {
	assert_eq!(run("print 1 < 2; print 2 <= 1.5; print 3 > 2; print 2 >= 2.0;"),
		"true\nfalse\ntrue\ntrue\n");
	assert_eq!(run("print 'a' < 'b'; print 'ab' == 'a' + 'b'; print 1 == 1.0;"),
		"true\ntrue\nfalse\n");
	assert_eq!(run("print null == false; print {} == {}; print 1 != 2;"),
		"false\nfalse\ntrue\n");
	assert_eq!(runtime_error("print 1 < 'a';").message, "Operands must be numbers.");
}

#[test]
fn truthiness() {
	assert_eq!(run("
		if (0) print 'yes'; else print 'no';
		if (0.0) print 'yes'; else print 'no';
		if ('') print 'yes'; else print 'no';
		print null or 'default';
		print 1 and 2;
	"), "no\nno\nyes\ndefault\n2\n");
}

#[test]
fn scopes_shadow() {
	assert_eq!(run("var a = 1; {var a = 2; print a;} print a;"), "2\n1\n");
}

#[test]
fn loops() {
	assert_eq!(run("var i = 0; do {i = i + 1;} until (i == 3); puts i;"), "3\n");
	assert_eq!(run("var total = 0; for (var i = 1; i <= 10; i = i + 1) total = total + i; print total;"),
		"55\n");
	assert_eq!(run("var n = 3; while (n) {print n; n = n - 1;}"), "3\n2\n1\n");
}

#[test]
fn functions() {
	assert_eq!(run("fun fib(n) {if (n < 2) return n; return fib(n - 2) + fib(n - 1);} print fib(20);"),
		"6765\n");
	assert_eq!(run("fun f() {} print f(); print f; print clock;"),
		"null\n<fn f>\n<native fn clock>\n");
	assert_eq!(run("print fun () {};"), "<fn anonymous>\n");
}

#[test]
fn closures() {
	assert_eq!(run(CLOSURES), "1\n2\n1\n0\n20\n5\n");
}

#[test]
fn maps() {
	assert_eq!(run(MAPS), concat!(
		"{\"a\": 1, \"b\": 2, \"c\": 3}\n",
		"3\n",
		"null\n",
		"{0: 1, 1: \"two\", 2: {0: 3}}\n",
		"1\n",
		"4\n",
		"{0: \"x\", 1: 2}\n"
	));
	assert_eq!(run("var m = {}; m.self = m; print m;"), "{\"self\": {...}}\n");
	assert_eq!(run("var m = {}; m[0.0] = 'a'; print m[-0.0]; m[1] = 'b'; print m[1.0];"),
		"a\nnull\n");

	assert_eq!(runtime_error("var x = 1; print x.y;").message, "Only maps have fields.");
	assert_eq!(runtime_error("print 1[0];").message, "Only maps can be indexed.");
	assert_eq!(runtime_error("var m = {}; m[null] = 1;").message, "Map key can't be null.");
}

#[test]
fn standard_natives() {
	assert_eq!(run("print len('héllo'); print typeof(1); print typeof(1.5); print typeof(typeof);"),
		"5\ninteger\nnumber\nnative\n");
	assert_eq!(run("print str(1.5) + '!'; print typeof(clock()); print help(len) == null;"),
		"1.5!\nnumber\nfalse\n");
	assert_eq!(runtime_error("len(1);").message, "Can't take the length of a integer.");
	assert_eq!(runtime_error("len();").message, "Expected 1 arguments but got 0.");
}

#[test]
fn call_errors() {
	assert_eq!(runtime_error("fun f(a) {} f();").message, "Expected 1 arguments but got 0.");
	assert_eq!(runtime_error("var x = 1; x();").message, "Can only call functions.");
	assert_eq!(runtime_error("print nope;").message, "Undefined variable 'nope'.");
	assert_eq!(runtime_error("nope = 1;").message, "Undefined variable 'nope'.");

	let overflow = runtime_error("fun f() {f();} f();");
	assert_eq!(overflow.message, "Stack overflow.");
	assert_eq!(overflow.backtrace.len(), FRAMES_MAX);
}

#[test]
fn backtraces_run_innermost_first() {
	let error = runtime_error("fun inner() {\n\treturn -null;\n}\nfun outer() {\n\treturn inner();\n}\nouter();");
	assert_eq!(error.message, "Operand must be a number.");

	let frames = error.backtrace.iter()
		.map(|line| (line.line, line.function.as_deref()))
		.collect::<Vec<_>>();
	assert_eq!(frames, [(2, Some("inner")), (5, Some("outer")), (7, None)]);

	let text = error.to_string();
	assert!(text.starts_with("Operand must be a number.\n[line 2:"));
	assert!(text.ends_with("] in script"));
}

#[test]
fn errors_leave_the_machine_usable() {
	let (mut virtual_machine, output) = machine(Options::default());

	assert_eq!(virtual_machine.interpret("print 1 +"), Status::CompileError);
	assert_eq!(virtual_machine.interpret("
		var captured;
		fun make() {
			var x = 'kept';
			fun get() {return x;}
			captured = get;
			return -null;
		}
		make();
	"), Status::RuntimeError);
	assert!(virtual_machine.stack.is_empty());
	assert!(virtual_machine.frames.is_empty());
	assert!(virtual_machine.open_up_values.is_empty());

	assert_eq!(virtual_machine.interpret("print captured();"), Status::Ok);
	assert_eq!(output.take(), "kept\n");
}

#[test]
fn host_lists_survive_collection() {
	let (mut virtual_machine, _) = machine(Options {gc_stress: true, ..Options::default()});
	let word = virtual_machine.new_string("word");
	virtual_machine.pin(word);
	let list = virtual_machine.new_list(&[Value::Integer(7), word, Value::Null]);
	virtual_machine.unpin();

	assert!(matches!(list, Value::Object(_)));
	virtual_machine.set_global("list", list);
	virtual_machine.collect_garbage();
	assert_eq!(virtual_machine.display(list), "{0: 7, 1: \"word\", 2: null}");
	let empty = virtual_machine.new_list(&[]);
	assert_eq!(virtual_machine.display(empty), "{}");
}

#[test]
fn failing_natives_release_their_pins() {
	fn fails(vm: &mut VirtualMachine, count: usize) -> Result<(), String> {
		let arguments = vm.pop_arguments(count)?;
		let list = vm.new_list(&arguments);
		vm.pin(list);
		Err("Gave up.".to_owned())
	}

	let (mut virtual_machine, _) = machine(Options::default());
	virtual_machine.define_native("fails", fails, None, "");
	let kept = virtual_machine.new_string("kept by the host");
	virtual_machine.pin(kept);
	virtual_machine.collect_garbage();
	let baseline = virtual_machine.heap.len();

	for _ in 0..3 {
		assert_eq!(virtual_machine.interpret("fails(1, 2, 3);"), Status::RuntimeError);
		assert_eq!(virtual_machine.heap.root_count(), 1);
	}
	virtual_machine.collect_garbage();
	assert_eq!(virtual_machine.heap.len(), baseline);
	assert_eq!(virtual_machine.string(kept), Some("kept by the host"));

	virtual_machine.unpin();
	assert_eq!(virtual_machine.heap.root_count(), 0);
}

#[test]
fn bad_op_codes_are_reported() {
	let (mut virtual_machine, _) = machine(Options::default());
	let script = virtual_machine.compile("print 1;").unwrap();
	if let Some(ObjectKind::Function(function)) = virtual_machine.heap.kind_mut(script) {
		function.chunk.code.insert(0, 200);
		function.chunk.lines.insert(0, 1);
		function.chunk.columns.insert(0, 1);
	}

	let error = virtual_machine.execute_script(script).unwrap_err();
	assert_eq!(error.message, "Bad opcode, got 200!");
}

#[test]
fn host_globals() {
	let (mut virtual_machine, output) = machine(Options::default());
	let greeting = virtual_machine.new_string("hello");
	virtual_machine.set_global("greeting", greeting);
	virtual_machine.set_global("answer", Value::Integer(42));

	virtual_machine.run("print greeting + ' world'; var doubled = answer * 2;").unwrap();
	assert_eq!(output.take(), "hello world\n");
	assert_eq!(virtual_machine.get_global("doubled"), Some(Value::Integer(84)));
	assert_eq!(virtual_machine.get_global("missing"), None);

	let options = Options {ignore_case: true, ..Options::default()};
	let (mut virtual_machine, output) = machine(options);
	virtual_machine.set_global("Answer", Value::Integer(1));
	virtual_machine.run("PRINT ANSWER;").unwrap();
	assert_eq!(output.take(), "1\n");
	assert_eq!(virtual_machine.get_global("aNsWeR"), Some(Value::Integer(1)));
}

#[test]
fn strings_are_interned() {
	let (mut virtual_machine, _) = machine(Options::default());
	let hello = virtual_machine.new_string("hello");
	virtual_machine.set_global("greeting", hello);
	virtual_machine.collect_garbage();

	assert_eq!(virtual_machine.new_string("hello"), hello);
	virtual_machine.run("var joined = 'hel' + 'lo';").unwrap();
	assert_eq!(virtual_machine.get_global("joined"), Some(hello));
}

#[test]
fn garbage_is_reclaimed() {
	let (mut virtual_machine, _) = machine(Options::default());
	virtual_machine.collect_garbage();
	let baseline = virtual_machine.heap().len();

	virtual_machine.run("
		for (var i = 0; i < 100; i = i + 1) {
			var m = {'key': [i, str(i)]};
			fun capture() {return m;}
		}
	").unwrap();
	assert!(virtual_machine.heap().len() > baseline);

	virtual_machine.collect_garbage();
	assert_eq!(virtual_machine.heap().len(), baseline);
	assert!(virtual_machine.heap().stats().objects_freed > 0);
}

#[test]
fn collection_runs_when_the_threshold_is_crossed() {
	let options = Options {gc_initial_threshold: 1024, ..Options::default()};
	let output = run_with(options.clone(), MAPS);
	assert_eq!(output, run(MAPS));

	let (mut virtual_machine, _) = machine(options);
	virtual_machine.run("for (var i = 0; i < 1000; i = i + 1) {var m = {'i': str(i)};}")
		.unwrap();
	assert!(virtual_machine.heap().stats().collections > 0);
}

#[test]
fn stress_collection_keeps_live_objects() {
	let options = Options {gc_stress: true, ..Options::default()};
	assert_eq!(run_with(options.clone(), CLOSURES), run(CLOSURES));
	assert_eq!(run_with(options, MAPS), run(MAPS));
}

#[test]
fn natives_must_balance_the_stack() {
	fn add(vm: &mut VirtualMachine, _: usize) -> Result<(), String> {
		let arguments = vm.pop_arguments(2)?;
		match (arguments[0], arguments[1]) {
			(Value::Integer(left), Value::Integer(right)) => vm.push(Value::Integer(left + right)),
			_ => Err("add expects integers.".to_owned())
		}
	}

	fn forgetful(vm: &mut VirtualMachine, count: usize) -> Result<(), String> {
		vm.pop_arguments(count).map(|_| ())
	}

	let (mut virtual_machine, output) = machine(Options::default());
	virtual_machine.define_native("add", add, Some(2), "add(a, b) -> a + b");
	virtual_machine.define_native("forgetful", forgetful, None, "");

	virtual_machine.run("print add(1, add(2, 3));").unwrap();
	assert_eq!(output.take(), "6\n");

	let error = virtual_machine.run("add(1);").unwrap_err();
	assert_eq!(error.to_string(), "Expected 2 arguments but got 1.\n[line 1:6] in script");

	match virtual_machine.run("add(1, 'a');") {
		Err(Error::Runtime(error)) => assert_eq!(error.message, "add expects integers."),
		result => panic!("expected a runtime error, got {:?}", result)
	}
	match virtual_machine.run("forgetful(1, 2);") {
		Err(Error::Runtime(error)) => assert_eq!(error.message,
			"Native 'forgetful' must pop its arguments and push one result."),
		result => panic!("expected a runtime error, got {:?}", result)
	}
}

#[test]
fn tracing_does_not_change_behavior() {
	let options = Options {trace_execution: true, ..Options::default()};
	assert_eq!(run_with(options, CLOSURES), run(CLOSURES));
}
