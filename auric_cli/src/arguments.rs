pub use pico_args::Error;
use auric::Options;
use log::LevelFilter;
use pico_args::Arguments as Parser;
use std::{
	convert::TryFrom,
	fs::File,
	io::{Read, Error as IOError},
	path::PathBuf
};

pub static HELP: &str = "\
Auric Interpreter

SYNOPSIS:
	auric [OPTIONS] [SOURCE]

DESCRIPTION:
	auric compiles source code to byte code in a single pass, then executes said byte code on a stack based virtual machine with a garbage collected heap.

	After parsing the command line arguments, SOURCE is either evaluated directly, if -e is passed, otherwise the file named SOURCE is loaded and evaluated. If -i is passed, after evaluation, an interactive prompt with SOURCE's state is started. If SOURCE is not provided, an interactive prompt always starts.

	Passing -v will print verbose information to standard error.

OPTIONS:
	-h, --help        Displays this and quits
	-V, --version     Displays version information
	-v, --verbose     Runs with verbose output
	-i, --interactive Runs in interactive mode, after running SOURCE
	-e, --evaluate    Treats source as direct source code, rather than a file
	-b, --byte-code   Shows byte code rather than executing
	-t, --tokens      Shows tokens rather than executing
	--ignore-case     Matches keywords and variable names regardless of case
	--gc-stress       Collects garbage before every allocation
	--trace           Logs every executed instruction";

#[derive(Debug)]
pub enum Arguments {
	ShowHelp,
	ShowVersion,
	Run {
		/// `None` starts an interactive prompt straight away.
		source: Option<Source>,
		execution: ExecutionType,
		options: Options,
		verbosity: LevelFilter
	}
}

#[derive(Debug)]
pub enum Source {
	File(PathBuf),
	Code(String)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionType {
	Run,
	RunInteractively,
	ShowByteCode,
	ShowTokens
}

impl Arguments {
	pub fn from_env() -> Result<Self, Error> {
		let mut parser = Parser::from_env();

		if parser.contains(["-h", "--help"]) {return Ok(Self::ShowHelp)}
		if parser.contains(["-V", "--version"]) {return Ok(Self::ShowVersion)}

		let verbose = parser.contains(["-v", "--verbose"]);
		let interactive = parser.contains(["-i", "--interactive"]);
		let byte_code = parser.contains(["-b", "--byte-code"]);
		let tokens = parser.contains(["-t", "--tokens"]);
		let trace = parser.contains("--trace");
		let options = Options {
			ignore_case: parser.contains("--ignore-case"),
			gc_stress: parser.contains("--gc-stress"),
			trace_execution: trace,
			..Options::default()
		};

		let source = match parser.contains(["-e", "--evaluate"]) {
			true => Some(Source::Code(parser.free_from_str()?)),
			false => parser.opt_free_from_str()?.map(Source::File)
		};

		let remaining = parser.finish();
		if !remaining.is_empty() {
			return Err(Error::ArgumentParsingFailed {
				cause: format!("unexpected arguments {:?}", remaining)
			})
		}

		let verbosity = match (trace, verbose) {
			(true, _) => LevelFilter::Trace,
			(false, true) => LevelFilter::Debug,
			(false, false) => LevelFilter::Warn
		};

		let execution = if interactive {
			ExecutionType::RunInteractively
		} else if byte_code {
			ExecutionType::ShowByteCode
		} else if tokens {
			ExecutionType::ShowTokens
		} else {
			ExecutionType::Run
		};

		Ok(Self::Run {source, execution, options, verbosity})
	}
}

impl TryFrom<Source> for String {
	type Error = IOError;

	fn try_from(value: Source) -> Result<Self, IOError> {
		Ok(match value {
			Source::Code(code) => code,
			Source::File(file) => {
				let mut file = File::open(&file)?;
				let mut code = String::new();
				file.read_to_string(&mut code)?;
				code
			}
		})
	}
}
