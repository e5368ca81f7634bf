#![forbid(
	// Rationale: An embedded scripting engine runs untrusted scripts inside its
	// host, and must not be able to corrupt the host's memory.
	unsafe_code
)]
#![warn(
	// Rationale: Panics should be avoided in favor of returning a Result, and
	// situations where panics are intentional should be well documented
	// (requiring an allow attribute to signal complete documentation).
	clippy::unwrap_used,
	clippy::panic,

	// Rationale: These should not be in production code.
	clippy::todo,
	clippy::unimplemented
)]
#![allow(
	// Rationale: Tabs are superior, don't at me.
	clippy::tabs_in_doc_comments
)]
//! Auric is a small embeddable scripting engine, written entirely in safe
//! Rust. Scripts are compiled in a single pass to a compact byte code, and run
//! on a stack based virtual machine whose heap is managed by a tracing mark and
//! sweep garbage collector.
//!
//! This project is made of four primary components.
//! - [lexer] - The lexer, responsible for tokenizing source text on demand
//! - [compiler] - The compiler, a Pratt parser that emits byte code straight
//!   from the token stream
//! - [vm] - The virtual machine, responsible for executing byte code, along
//!   with the object [heap](vm::heap) and its [garbage collector](vm::gc)
//! - [std_lib] - A handful of native functions scripts commonly need
//!
//! Examples
//! --------
//! Running source text only takes a virtual machine.
//! ```rust
//! use auric::{std_lib, vm::{Status, Value, VirtualMachine}};
//!
//! let mut virtual_machine = VirtualMachine::new();
//! std_lib::define_standard_natives(&mut virtual_machine);
//!
//! assert_eq!(virtual_machine.interpret("var x = 40; x = x + 2;"), Status::Ok);
//! assert_eq!(virtual_machine.get_global("x"), Some(Value::Integer(42)));
//! ```
//! Hosts that want to handle diagnostics themselves should use
//! [VirtualMachine::run][vm-run], which returns the structured [Error] instead
//! of printing it.
//!
//! [vm-run]: crate::vm::VirtualMachine::run

pub mod compiler;
pub mod config;
pub mod lexer;
pub mod std_lib;
pub mod vm;

pub use self::config::Options;

use self::{compiler::CompileErrors, vm::RuntimeError};
use std::{
	error::Error as STDError,
	fmt::{Display, Formatter, Result as FMTResult}
};

/// Everything that can go wrong running a script.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
	Compile(CompileErrors),
	Runtime(RuntimeError)
}

impl STDError for Error {
	fn source(&self) -> Option<&(dyn STDError + 'static)> {
		match self {
			Self::Compile(error) => Some(error),
			Self::Runtime(error) => Some(error)
		}
	}
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> FMTResult {
		match self {
			Self::Compile(error) => write!(f, "{}", error),
			Self::Runtime(error) => write!(f, "{}", error)
		}
	}
}

impl From<CompileErrors> for Error {
	fn from(error: CompileErrors) -> Self {
		Self::Compile(error)
	}
}

impl From<RuntimeError> for Error {
	fn from(error: RuntimeError) -> Self {
		Self::Runtime(error)
	}
}
