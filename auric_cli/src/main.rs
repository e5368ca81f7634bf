mod arguments;
mod repl;

use self::{
	arguments::{Arguments, ExecutionType, Source, HELP},
	repl::repl
};
use auric::{
	lexer::Lexer,
	std_lib::define_standard_natives,
	vm::{debug::disassemble, VirtualMachine},
	Options
};
use log::{set_logger, set_max_level, LevelFilter, Log, Metadata, Record};
use std::{convert::TryInto, io::Result as IOResult, process::exit};

/// Writes every log record to stderr, prefixed with its level.
struct Logger;

impl Log for Logger {
	fn enabled(&self, _: &Metadata<'_>) -> bool {
		true
	}

	fn log(&self, record: &Record<'_>) {
		eprintln!("[{}] {}", record.level(), record.args());
	}

	fn flush(&self) {}
}

static LOGGER: Logger = Logger;

/// Unwraps an IO result, exiting with `EX_IOERR` on failure.
pub fn handle_io<T>(result: IOResult<T>) -> T {
	match result {
		Ok(value) => value,
		Err(error) => {
			eprintln!("io error: {}", error);
			exit(74)
		}
	}
}

fn main() {
	let arguments = match Arguments::from_env() {
		Ok(arguments) => arguments,
		Err(error) => {
			eprintln!("{}\nrun with --help for usage", error);
			exit(64)
		}
	};

	match arguments {
		Arguments::ShowHelp => println!("{}", HELP),
		Arguments::ShowVersion => println!("auric {}", env!("CARGO_PKG_VERSION")),
		Arguments::Run {source, execution, options, verbosity} =>
			run(source, execution, options, verbosity)
	}
}

fn run(source: Option<Source>, execution: ExecutionType, options: Options,
		verbosity: LevelFilter) {
	if set_logger(&LOGGER).is_ok() {set_max_level(verbosity)}

	let mut vm = VirtualMachine::with_options(options.clone());
	define_standard_natives(&mut vm);

	let code: String = match source {
		Some(source) => handle_io(source.try_into()),
		None => return repl(vm)
	};

	match execution {
		ExecutionType::Run => {vm.interpret(&code);},
		ExecutionType::RunInteractively => {vm.interpret(&code); repl(vm)},
		ExecutionType::ShowByteCode => match vm.compile(&code) {
			Ok(script) => if let Some(function) = vm.heap().function(script) {
				print!("{}", disassemble(vm.heap(), &function.chunk, "script"))
			},
			Err(errors) => eprintln!("{}", errors)
		},
		ExecutionType::ShowTokens => Lexer::new(&code, &options)
			.for_each(|token| println!("{}", token))
	}
}
