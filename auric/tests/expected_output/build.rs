// This file builds integration tests for each script in the scripts directory.
// The test is to check if running a script produces exactly the output stored
// next to it, in a file of the same name ending in `.out`. Every script is run
// twice, once normally and once collecting garbage before every allocation.
// Scripts should not produce pseudo-random output (e.g. by printing the time).

use std::{path::Path, fs::{File, create_dir_all, read_dir}, io::{Error, Write}};

static HEADER: &str = "\
use auric::{std_lib::define_standard_natives, vm::VirtualMachine, Options};
use diff::{Result as Diff, lines};
use std::{cell::RefCell, io::{Result as IOResult, Write}, rc::Rc};

#[derive(Clone, Default)]
struct Output(Rc<RefCell<Vec<u8>>>);

impl Write for Output {
	fn write(&mut self, buffer: &[u8]) -> IOResult<usize> {
		self.0.borrow_mut().write(buffer)
	}

	fn flush(&mut self) -> IOResult<()> {
		Ok(())
	}
}

/// Runs [code] using Auric, returning what it printed followed by any error.
fn auric(code: &str, options: Options) -> String {
	let output = Output::default();
	let mut virtual_machine = VirtualMachine::with_options(options)
		.with_output(output.clone());
	define_standard_natives(&mut virtual_machine);

	let error = virtual_machine.run(code).err();
	let mut result = String::from_utf8(output.0.borrow().clone()).unwrap();
	if let Some(error) = error {
		result.push_str(&error.to_string());
		result.push('\\n');
	}
	result
}

fn compare(name: &str, actual: &str, expected: &str) -> Result<(), ()> {
	if actual != expected {
		eprintln!(\"The output of {:?} differs from the expected output.\", name);
		lines(actual, expected).into_iter()
			.for_each(|result| match result {
				Diff::Left(left) => eprintln!(\"\\x1B[31m-{}\\x1B[0m\", left),
				Diff::Right(right) => eprintln!(\"\\x1B[32m+{}\\x1B[0m\", right),
				Diff::Both(both, _) => eprintln!(\" {}\", both)
			});
		Err(())
	} else {Ok(())}
}
";

macro_rules! manufacture_test {
	($name:ident, $script:ident, $expected:ident) => {{
		format!(
"\
\n#[test]
fn {0}() -> Result<(), ()> {{
	static CODE: &str = include_str!({1:?});
	static EXPECTED: &str = include_str!({2:?});

	compare({3:?}, &auric(CODE, Options::default()), EXPECTED)
}}

#[test]
fn {0}_under_gc_stress() -> Result<(), ()> {{
	static CODE: &str = include_str!({1:?});
	static EXPECTED: &str = include_str!({2:?});

	let options = Options {{gc_stress: true, ..Options::default()}};
	compare({3:?}, &auric(CODE, options), EXPECTED)
}}
",
			$name, $script, $expected, $script.file_name().unwrap()
		)
	}}
}

fn snake_case(camel_case: &str) -> String {
	let mut snake_case = String::with_capacity(
		(camel_case.len() as f32 * 1.25) as usize);

	camel_case.chars().for_each(|char| {
		if char.is_uppercase() {snake_case.push('_')};
		char.to_lowercase().for_each(|char| snake_case.push(char))
	});

	snake_case
}

pub fn build(working: &Path, output: &Path) {
	println!("cargo:rerun-if-changed={}", working.join("scripts").to_string_lossy());

	let file = read_dir(working.join("scripts")).unwrap()
		.map(|file| {
			let file = file?;

			let file_type = file.file_type()?;
			let script = file.path();
			let expected = script.with_extension("out");

			let function = match script.extension() {
				Some(extension) if extension == "au3" && file_type.is_file() =>
					script.file_stem().unwrap().to_string_lossy().into_owned(),
				_ => return Ok(String::new())
			};
			let function = snake_case(&function);

			Ok(manufacture_test!(function, script, expected))
		})
		.collect::<Result<String, Error>>()
		.unwrap();

	let file = format!("{}{}", HEADER, file);
	create_dir_all(output.join("codegen")).unwrap();
	File::create(output.join("codegen/auric-tests-expected_output-main")).unwrap()
		.write_all(file.as_bytes()).unwrap();
}
