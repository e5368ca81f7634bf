//! The stack based virtual machine.
pub mod chunk;
pub mod debug;
pub mod gc;
pub mod heap;
pub mod object;
pub mod table;
pub mod value;
#[cfg(test)]
pub mod tests;

pub use self::{
	chunk::{Chunk, OpCode},
	heap::{Heap, ObjRef},
	object::NativeFunction,
	value::Value
};
use self::{
	object::{Closure, Map, Native, ObjectKind, UpValue},
	table::{hash_scalar, Table},
	value::{arithmetic, compare, Arithmetic, Numeric}
};
use super::{
	compiler::{self, CompileErrors},
	Error,
	Options
};
use itertools::Itertools;
use log::{log_enabled, trace, Level};
use std::{
	borrow::Cow,
	cmp::Ordering,
	convert::TryFrom,
	error::Error as STDError,
	fmt::{Display, Formatter, Result as FMTResult},
	io::{stdout, Write}
};

/// The deepest the call stack may grow.
pub const FRAMES_MAX: usize = 64;
/// The most values the operand stack may hold.
pub const STACK_MAX: usize = FRAMES_MAX * 256;

/// The outcome of [VirtualMachine::interpret].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
	Ok,
	CompileError,
	RuntimeError
}

/// One line of a runtime error's backtrace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TraceLine {
	pub line: u16,
	pub column: u16,
	/// The name of the function, or `None` for top level code.
	pub function: Option<String>
}

impl Display for TraceLine {
	fn fmt(&self, f: &mut Formatter<'_>) -> FMTResult {
		write!(f, "[line {}:{}] in ", self.line, self.column)?;
		match &self.function {
			Some(name) => write!(f, "{}()", name),
			None => write!(f, "script")
		}
	}
}

/// An error raised while executing, along with the call stack at the time,
/// innermost frame first.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RuntimeError {
	pub message: String,
	pub backtrace: Vec<TraceLine>
}

impl STDError for RuntimeError {}

impl Display for RuntimeError {
	fn fmt(&self, f: &mut Formatter<'_>) -> FMTResult {
		write!(f, "{}", self.message)?;
		self.backtrace.iter().try_for_each(|line| write!(f, "\n{}", line))
	}
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CallFrame {
	pub(crate) closure: ObjRef,
	pub(crate) function: ObjRef,
	pub(crate) ip: usize,
	/// The stack slot holding the callee, locals are relative to it.
	pub(crate) base: usize
}

fn stack_underflow() -> String {
	"Stack underflow.".to_owned()
}

fn no_frame() -> String {
	"No function is executing.".to_owned()
}

fn corrupt(what: &str) -> String {
	format!("Corrupt byte code: {}.", what)
}

/// A virtual machine, owning its own heap, globals and call stack.
///
/// Example
/// -------
/// ```rust
/// # use auric::vm::{Status, VirtualMachine};
/// let mut virtual_machine = VirtualMachine::new().with_output(Vec::new());
/// assert_eq!(virtual_machine.interpret("print 1 +"), Status::CompileError);
/// assert_eq!(virtual_machine.interpret("print -null;"), Status::RuntimeError);
/// assert_eq!(virtual_machine.interpret("print 1;"), Status::Ok);
/// ```
pub struct VirtualMachine {
	pub(crate) heap: Heap,
	pub(crate) globals: Table,
	pub(crate) stack: Vec<Value>,
	pub(crate) frames: Vec<CallFrame>,
	/// Up values still pointing into the stack, ordered by slot.
	pub(crate) open_up_values: Vec<ObjRef>,
	options: Options,
	output: Box<dyn Write>
}

impl Default for VirtualMachine {
	fn default() -> Self {
		Self::new()
	}
}

/// The public embedding API.
impl VirtualMachine {
	pub fn new() -> Self {
		Self::with_options(Options::default())
	}

	pub fn with_options(options: Options) -> Self {
		Self {
			heap: Heap::new(&options),
			globals: Table::new(),
			stack: Vec::with_capacity(STACK_MAX),
			frames: Vec::with_capacity(FRAMES_MAX),
			open_up_values: Vec::new(),
			options,
			output: Box::new(stdout())
		}
	}

	/// Sends the output of `print` statements somewhere other than stdout.
	pub fn with_output(mut self, output: impl Write + 'static) -> Self {
		self.output = Box::new(output);
		self
	}

	pub fn options(&self) -> &Options {
		&self.options
	}

	pub fn heap(&self) -> &Heap {
		&self.heap
	}

	/// Compiles and runs source text, reporting any errors on stderr.
	pub fn interpret(&mut self, source: &str) -> Status {
		match self.run(source) {
			Ok(()) => Status::Ok,
			Err(Error::Compile(errors)) => {eprintln!("{}", errors); Status::CompileError},
			Err(Error::Runtime(error)) => {eprintln!("{}", error); Status::RuntimeError}
		}
	}

	/// Compiles and runs source text. Globals defined by earlier runs stay
	/// visible. After a runtime error the machine is left ready for the next run.
	pub fn run(&mut self, source: &str) -> Result<(), Error> {
		let function = self.compile(source)?;
		self.execute_script(function)?;
		Ok(())
	}

	/// Compiles source text without running it, returning the function holding
	/// its top level code.
	pub fn compile(&mut self, source: &str) -> Result<ObjRef, CompileErrors> {
		compiler::compile(source, &mut self.heap, &self.options)
	}

	/// The name scripts know a global by, folded when case is ignored.
	fn global_name<'n>(&self, name: &'n str) -> Cow<'n, str> {
		match self.options.ignore_case {
			true => Cow::Owned(name.to_lowercase()),
			false => Cow::Borrowed(name)
		}
	}

	/// Defines or overwrites a global.
	pub fn set_global(&mut self, name: &str, value: Value) {
		let name = self.global_name(name);
		self.heap.push_root(value);
		let name = self.intern(&name);
		self.heap.pop_root();

		let hash = self.heap.string(name).map_or(0, |name| name.hash);
		self.globals.insert(Value::Object(name), hash, value);
	}

	pub fn get_global(&self, name: &str) -> Option<Value> {
		let name = self.heap.find_string(&self.global_name(name))?;
		let hash = self.heap.string(name)?.hash;
		self.globals.get(Value::Object(name), hash)
	}

	/// Makes a host function callable from scripts as a global. When `arity` is
	/// given, calls with any other number of arguments fail before reaching the
	/// native.
	pub fn define_native(&mut self, name: &str, function: NativeFunction,
			arity: Option<u8>, doc: &'static str) {
		let name_string = self.intern(name);
		self.heap.push_root(Value::Object(name_string));
		let native = Native {name: name_string, function, arity, doc};
		let native = self.allocate(ObjectKind::Native(native));
		self.heap.pop_root();

		self.set_global(name, Value::Object(native));
	}

	pub fn push(&mut self, value: Value) -> Result<(), String> {
		if self.stack.len() >= STACK_MAX {return Err("Stack overflow.".to_owned())}
		self.stack.push(value);
		Ok(())
	}

	pub fn pop(&mut self) -> Result<Value, String> {
		self.stack.pop().ok_or_else(stack_underflow)
	}

	/// Pops `count` values, returning them in the order they were pushed.
	pub fn pop_arguments(&mut self, count: usize) -> Result<Vec<Value>, String> {
		let start = self.stack.len().checked_sub(count).ok_or_else(stack_underflow)?;
		Ok(self.stack.split_off(start))
	}

	/// Keeps a value alive across allocations until [unpin](Self::unpin) is
	/// called. Pins nest.
	pub fn pin(&mut self, value: Value) {
		self.heap.push_root(value)
	}

	pub fn unpin(&mut self) {
		self.heap.pop_root();
	}

	/// Returns the interned string with this content.
	pub fn new_string(&mut self, text: &str) -> Value {
		Value::Object(self.intern(text))
	}

	/// Creates a map keyed by position, starting at zero.
	pub fn new_list(&mut self, values: &[Value]) -> Value {
		let entries = values.iter().enumerate().map(|(index, value)| {
			let key = Value::Integer(index as i64);
			(key, hash_scalar(key), *value)
		}).collect::<Vec<_>>();
		Value::Object(self.build_map(&entries))
	}

	/// Creates a map from key and value pairs. Later duplicates overwrite
	/// earlier ones.
	pub fn new_map(&mut self, entries: &[(Value, Value)]) -> Result<Value, String> {
		let entries = entries.iter()
			.map(|&(key, value)| Ok((key, self.heap.hash_key(key)?, value)))
			.collect::<Result<Vec<_>, String>>()?;
		Ok(Value::Object(self.build_map(&entries)))
	}

	/// Allocates a map holding already hashed entries.
	fn build_map(&mut self, entries: &[(Value, u32, Value)]) -> ObjRef {
		for &(key, _, value) in entries {
			self.heap.push_root(key);
			self.heap.push_root(value);
		}
		let map = self.allocate(ObjectKind::Map(Map::new()));
		self.heap.truncate_roots(self.heap.root_count() - entries.len() * 2);

		if let Some(object) = self.heap.map_mut(map) {
			for &(key, hash, value) in entries {object.insert(key, hash, value)}
		}
		self.heap.account(map);
		map
	}

	/// The text of a string value.
	pub fn string(&self, value: Value) -> Option<&str> {
		self.heap.str(value)
	}

	/// Renders a value the way `print` shows it.
	pub fn display(&self, value: Value) -> String {
		self.heap.display(value)
	}
}

/// Allocation.
impl VirtualMachine {
	/// Allocates an object, collecting garbage first if the heap asks for it.
	/// Anything `kind` refers to must already be reachable from a root.
	pub(crate) fn allocate(&mut self, kind: ObjectKind) -> ObjRef {
		if self.heap.should_collect() {self.collect_garbage()}
		self.heap.allocate(kind)
	}

	pub(crate) fn intern(&mut self, text: &str) -> ObjRef {
		if let Some(existing) = self.heap.find_string(text) {return existing}
		if self.heap.should_collect() {self.collect_garbage()}
		self.heap.intern(text)
	}
}

/// Execution.
impl VirtualMachine {
	fn execute_script(&mut self, function: ObjRef) -> Result<(), RuntimeError> {
		let roots = self.heap.root_count();
		let result = match self.start_script(function) {
			Ok(()) => self.execute(),
			Err(message) => Err(message)
		};

		result.map_err(|message| {
			let error = self.runtime_error(message);
			self.reset(roots);
			error
		})
	}

	fn start_script(&mut self, function: ObjRef) -> Result<(), String> {
		// Root the function while its closure is allocated.
		self.push(Value::Object(function))?;
		let closure = Closure {function, up_values: Vec::new()};
		let closure = self.allocate(ObjectKind::Closure(closure));
		self.pop()?;

		self.push(Value::Object(closure))?;
		self.call_closure(closure, 0)
	}

	fn runtime_error(&self, message: String) -> RuntimeError {
		let backtrace = self.frames.iter().rev().map(|frame| {
			let function = self.heap.function(frame.function);
			let (line, column) = function.map_or((0, 0),
				|function| function.chunk.position(frame.ip.saturating_sub(1)));
			let name = function.and_then(|function| function.name)
				.and_then(|name| self.heap.str(Value::Object(name)))
				.map(str::to_owned);
			TraceLine {line, column, function: name}
		}).collect();

		RuntimeError {message, backtrace}
	}

	/// Unwinds everything, closing open up values so closures that escaped
	/// keep the values they saw. Values pinned since the script started are
	/// released.
	fn reset(&mut self, roots: usize) {
		self.close_up_values(0);
		self.heap.truncate_roots(roots);
		self.stack.clear();
		self.frames.clear();
	}

	fn frame(&self) -> Result<&CallFrame, String> {
		self.frames.last().ok_or_else(no_frame)
	}

	fn frame_mut(&mut self) -> Result<&mut CallFrame, String> {
		self.frames.last_mut().ok_or_else(no_frame)
	}

	fn peek(&self, distance: usize) -> Result<Value, String> {
		self.stack.len().checked_sub(distance + 1)
			.and_then(|index| self.stack.get(index)).copied()
			.ok_or_else(stack_underflow)
	}

	fn read_byte(&mut self) -> Result<u8, String> {
		let frame = self.frames.last_mut().ok_or_else(no_frame)?;
		let byte = self.heap.function(frame.function)
			.and_then(|function| function.chunk.code.get(frame.ip)).copied()
			.ok_or_else(|| corrupt("ran past the end of the chunk"))?;
		frame.ip += 1;
		Ok(byte)
	}

	fn read_u16(&mut self) -> Result<u16, String> {
		let high = self.read_byte()?;
		let low = self.read_byte()?;
		Ok(u16::from_be_bytes([high, low]))
	}

	fn read_constant(&mut self) -> Result<Value, String> {
		let index = self.read_byte()? as usize;
		let frame = self.frame()?;
		self.heap.function(frame.function)
			.and_then(|function| function.chunk.constants.get(index)).copied()
			.ok_or_else(|| corrupt("constant out of range"))
	}

	/// Reads a name constant, returning it as a key along with its hash.
	fn read_name(&mut self) -> Result<(Value, u32), String> {
		let name = self.read_constant()?;
		let hash = name.as_object().and_then(|name| self.heap.string(name))
			.map(|name| name.hash).ok_or_else(|| corrupt("name is not a string"))?;
		Ok((name, hash))
	}

	fn slot(&self, slot: u8) -> Result<usize, String> {
		Ok(self.frame()?.base + slot as usize)
	}

	fn frame_up_value(&self, index: u8) -> Result<ObjRef, String> {
		let closure = self.frame()?.closure;
		self.heap.closure(closure)
			.and_then(|closure| closure.up_values.get(index as usize)).copied()
			.ok_or_else(|| corrupt("up value out of range"))
	}

	/// Logs the operand stack and the instruction about to run.
	fn trace_instruction(&self) {
		if !log_enabled!(Level::Trace) {return}

		let stack = self.stack.iter()
			.map(|value| format!("[ {} ]", self.heap.display(*value))).join("");
		trace!("          {}", stack);

		if let Some(frame) = self.frames.last() {
			if let Some(function) = self.heap.function(frame.function)
				{trace!("{}", debug::describe(&self.heap, &function.chunk, frame.ip))}
		}
	}

	fn execute(&mut self) -> Result<(), String> {
		loop {
			if self.options.trace_execution {self.trace_instruction()}

			let byte = self.read_byte()?;
			let op_code = OpCode::try_from(byte)
				.map_err(|byte| format!("Bad opcode, got {}!", byte))?;

			match op_code {
				OpCode::Print => {
					let value = self.pop()?;
					let text = self.heap.display(value);
					writeln!(self.output, "{}", text).map_err(|error| error.to_string())?;
				},

				OpCode::Pop => {self.pop()?;},

				OpCode::Call => {
					let count = self.read_byte()? as usize;
					let callee = self.peek(count)?;
					self.call_value(callee, count)?;
				},

				OpCode::Return => {
					let result = self.pop()?;
					let frame = self.frames.pop().ok_or_else(no_frame)?;
					self.close_up_values(frame.base);
					self.stack.truncate(frame.base);

					if self.frames.is_empty() {break Ok(())}
					self.push(result)?;
				},

				OpCode::Null => self.push(Value::Null)?,
				OpCode::True => self.push(Value::Bool(true))?,
				OpCode::False => self.push(Value::Bool(false))?,

				OpCode::Constant => {
					let constant = self.read_constant()?;
					self.push(constant)?;
				},

				// Arithmetic

				OpCode::Negate => {
					let value = match self.pop()?.numeric() {
						Some(Numeric::Integer(integer)) => Value::Integer(integer.wrapping_neg()),
						Some(Numeric::Number(number)) => Value::Number(-number),
						None => break Err("Operand must be a number.".to_owned())
					};
					self.push(value)?;
				},

				OpCode::Add => {
					let (right, left) = (self.peek(0)?, self.peek(1)?);
					let concatenated = match (self.heap.str(left), self.heap.str(right)) {
						(Some(left), Some(right)) => Some([left, right].concat()),
						_ => None
					};

					match concatenated {
						Some(text) => {
							let string = self.intern(&text);
							self.pop()?;
							self.pop()?;
							self.push(Value::Object(string))?;
						},
						None => self.binary_arithmetic(Arithmetic::Add,
							"Operands must be two numbers or two strings.")?
					}
				},
				OpCode::Subtract => self.binary_arithmetic(Arithmetic::Subtract,
					"Operands must be numbers.")?,
				OpCode::Multiply => self.binary_arithmetic(Arithmetic::Multiply,
					"Operands must be numbers.")?,
				OpCode::Divide => self.binary_arithmetic(Arithmetic::Divide,
					"Operands must be numbers.")?,

				// Relational

				OpCode::Not => {
					let value = self.pop()?;
					self.push(Value::Bool(value.is_falsey()))?;
				},

				OpCode::Equal => {
					let right = self.pop()?;
					let left = self.pop()?;
					self.push(Value::Bool(self.heap.values_equal(left, right)))?;
				},

				OpCode::Less | OpCode::LessEqual => {
					let right = self.pop()?;
					let left = self.pop()?;
					let ordering = self.order(left, right)?;
					let result = match op_code {
						OpCode::Less => ordering == Some(Ordering::Less),
						_ => matches!(ordering, Some(Ordering::Less | Ordering::Equal))
					};
					self.push(Value::Bool(result))?;
				},

				// Variables

				OpCode::DefineGlobal => {
					let (name, hash) = self.read_name()?;
					let value = self.peek(0)?;
					self.globals.insert(name, hash, value);
					self.pop()?;
				},

				OpCode::GetGlobal => {
					let (name, hash) = self.read_name()?;
					match self.globals.get(name, hash) {
						Some(value) => self.push(value)?,
						None => break Err(self.undefined(name))
					}
				},

				OpCode::SetGlobal => {
					let (name, hash) = self.read_name()?;
					if !self.globals.contains_key(name, hash) {break Err(self.undefined(name))}
					let value = self.peek(0)?;
					self.globals.insert(name, hash, value);
				},

				OpCode::GetLocal => {
					let slot = self.read_byte()?;
					let slot = self.slot(slot)?;
					let value = self.stack.get(slot).copied()
						.ok_or_else(|| corrupt("local out of range"))?;
					self.push(value)?;
				},

				OpCode::SetLocal => {
					let slot = self.read_byte()?;
					let slot = self.slot(slot)?;
					let value = self.peek(0)?;
					*self.stack.get_mut(slot).ok_or_else(|| corrupt("local out of range"))?
						= value;
				},

				OpCode::GetUpValue => {
					let index = self.read_byte()?;
					let up_value = self.frame_up_value(index)?;
					let value = match self.heap.up_value(up_value).copied() {
						Some(UpValue::Open(slot)) => self.stack.get(slot).copied()
							.ok_or_else(|| corrupt("up value slot out of range"))?,
						Some(UpValue::Closed(value)) => value,
						None => break Err(corrupt("not an up value"))
					};
					self.push(value)?;
				},

				OpCode::SetUpValue => {
					let index = self.read_byte()?;
					let up_value = self.frame_up_value(index)?;
					let value = self.peek(0)?;
					match self.heap.up_value_mut(up_value) {
						Some(UpValue::Open(slot)) => {
							let slot = *slot;
							*self.stack.get_mut(slot)
								.ok_or_else(|| corrupt("up value slot out of range"))? = value;
						},
						Some(closed) => *closed = UpValue::Closed(value),
						None => break Err(corrupt("not an up value"))
					}
				},

				// Control flow

				OpCode::Jump => {
					let offset = self.read_u16()? as usize;
					self.frame_mut()?.ip += offset;
				},

				OpCode::JumpIfFalse => {
					let offset = self.read_u16()? as usize;
					if self.peek(0)?.is_falsey() {self.frame_mut()?.ip += offset}
				},

				OpCode::Loop => {
					let offset = self.read_u16()? as usize;
					let frame = self.frame_mut()?;
					frame.ip = frame.ip.checked_sub(offset)
						.ok_or_else(|| corrupt("loop before the start of the chunk"))?;
				},

				// Functions

				OpCode::Closure => {
					let function = self.read_constant()?.as_object()
						.filter(|function| self.heap.function(*function).is_some())
						.ok_or_else(|| corrupt("closure over a non function"))?;
					let count = self.heap.function(function)
						.map_or(0, |function| function.up_value_count);

					let closure = Closure {function, up_values: Vec::with_capacity(count)};
					let closure = self.allocate(ObjectKind::Closure(closure));
					self.push(Value::Object(closure))?;

					let (base, enclosing) = {
						let frame = self.frame()?;
						(frame.base, frame.closure)
					};
					for _ in 0..count {
						let local = self.read_byte()?;
						let index = self.read_byte()? as usize;
						let up_value = match local {
							0 => self.heap.closure(enclosing)
								.and_then(|enclosing| enclosing.up_values.get(index)).copied()
								.ok_or_else(|| corrupt("up value out of range"))?,
							_ => self.capture_up_value(base + index)
						};
						if let Some(closure) = self.heap.closure_mut(closure)
							{closure.up_values.push(up_value)}
					}
				},

				OpCode::CloseUpValue => {
					let top = self.stack.len().checked_sub(1).ok_or_else(stack_underflow)?;
					self.close_up_values(top);
					self.pop()?;
				},

				// Maps

				OpCode::Map => {
					let count = self.read_byte()? as usize;
					let start = self.stack.len().checked_sub(count * 2)
						.ok_or_else(stack_underflow)?;
					let entries = self.stack[start..].iter().copied().tuples()
						.collect::<Vec<(Value, Value)>>();

					let map = self.new_map(&entries)?;
					self.stack.truncate(start);
					self.push(map)?;
				},

				OpCode::List => {
					let count = self.read_byte()? as usize;
					let start = self.stack.len().checked_sub(count)
						.ok_or_else(stack_underflow)?;
					let values = self.stack[start..].to_vec();

					let list = self.new_list(&values);
					self.stack.truncate(start);
					self.push(list)?;
				},

				OpCode::GetField => {
					let (name, hash) = self.read_name()?;
					let target = self.pop()?;
					let map = self.as_map(target, "Only maps have fields.")?;
					let value = self.heap.map(map)
						.and_then(|map| map.get(name, hash)).unwrap_or_default();
					self.push(value)?;
				},

				OpCode::SetField => {
					let (name, hash) = self.read_name()?;
					let value = self.pop()?;
					let target = self.pop()?;
					let map = self.as_map(target, "Only maps have fields.")?;
					self.map_insert(map, name, hash, value);
					self.push(value)?;
				},

				OpCode::GetIndex => {
					let key = self.pop()?;
					let target = self.pop()?;
					let map = self.as_map(target, "Only maps can be indexed.")?;
					let hash = self.heap.hash_key(key)?;
					let value = self.heap.map(map)
						.and_then(|map| map.get(key, hash)).unwrap_or_default();
					self.push(value)?;
				},

				OpCode::SetIndex => {
					let value = self.pop()?;
					let key = self.pop()?;
					let target = self.pop()?;
					let map = self.as_map(target, "Only maps can be indexed.")?;
					let hash = self.heap.hash_key(key)?;
					self.map_insert(map, key, hash, value);
					self.push(value)?;
				}
			}
		}
	}

	fn binary_arithmetic(&mut self, operation: Arithmetic, message: &str)
			-> Result<(), String> {
		let right = self.pop()?;
		let left = self.pop()?;

		match (left.numeric(), right.numeric()) {
			(Some(left), Some(right)) => {
				let result = arithmetic(operation, left, right)?;
				self.push(result)
			},
			_ => Err(message.to_owned())
		}
	}

	/// Orders numbers by value and strings lexicographically.
	fn order(&self, left: Value, right: Value) -> Result<Option<Ordering>, String> {
		match (left.numeric(), right.numeric()) {
			(Some(left), Some(right)) => Ok(compare(left, right)),
			_ => match (self.heap.str(left), self.heap.str(right)) {
				(Some(left), Some(right)) => Ok(Some(left.cmp(right))),
				_ => Err("Operands must be numbers.".to_owned())
			}
		}
	}

	fn undefined(&self, name: Value) -> String {
		format!("Undefined variable '{}'.", self.heap.str(name).unwrap_or("?"))
	}

	fn as_map(&self, target: Value, message: &str) -> Result<ObjRef, String> {
		target.as_object().filter(|map| self.heap.map(*map).is_some())
			.ok_or_else(|| message.to_owned())
	}

	fn map_insert(&mut self, map: ObjRef, key: Value, hash: u32, value: Value) {
		if let Some(object) = self.heap.map_mut(map) {object.insert(key, hash, value)}
		self.heap.account(map);
	}

	fn call_value(&mut self, callee: Value, count: usize) -> Result<(), String> {
		let callee = callee.as_object()
			.ok_or_else(|| "Can only call functions.".to_owned())?;

		match self.heap.kind(callee) {
			Some(ObjectKind::Closure(_)) => self.call_closure(callee, count),
			Some(ObjectKind::Native(native)) => {
				let native = *native;
				self.call_native(native, count)
			},
			_ => Err("Can only call functions.".to_owned())
		}
	}

	fn call_closure(&mut self, closure: ObjRef, count: usize) -> Result<(), String> {
		let function = self.heap.closure(closure).map(|closure| closure.function)
			.ok_or_else(|| corrupt("call to a non closure"))?;
		let arity = self.heap.function(function).map(|function| function.arity as usize)
			.ok_or_else(|| corrupt("closure over a non function"))?;

		if count != arity
			{return Err(format!("Expected {} arguments but got {}.", arity, count))}
		if self.frames.len() == FRAMES_MAX {return Err("Stack overflow.".to_owned())}

		let base = self.stack.len().checked_sub(count + 1).ok_or_else(stack_underflow)?;
		self.frames.push(CallFrame {closure, function, ip: 0, base});
		Ok(())
	}

	fn call_native(&mut self, native: Native, count: usize) -> Result<(), String> {
		if let Some(arity) = native.arity {
			if arity as usize != count
				{return Err(format!("Expected {} arguments but got {}.", arity, count))}
		}

		let base = self.stack.len().checked_sub(count + 1).ok_or_else(stack_underflow)?;
		(native.function)(self, count)?;

		if self.stack.len() != base + 2 {
			let name = self.heap.str(Value::Object(native.name)).unwrap_or("?");
			return Err(format!("Native '{}' must pop its arguments and push one result.",
				name))
		}

		let result = self.pop()?;
		self.stack.truncate(base);
		self.push(result)
	}

	/// Returns the open up value for a stack slot, creating it if needed.
	fn capture_up_value(&mut self, slot: usize) -> ObjRef {
		let mut position = self.open_up_values.len();
		for (index, &up_value) in self.open_up_values.iter().enumerate().rev() {
			match self.heap.up_value(up_value) {
				Some(&UpValue::Open(open)) if open == slot => return up_value,
				Some(&UpValue::Open(open)) if open < slot => break,
				_ => position = index
			}
		}

		let up_value = self.allocate(ObjectKind::UpValue(UpValue::Open(slot)));
		self.open_up_values.insert(position, up_value);
		up_value
	}

	/// Closes every open up value at or above `from`, moving the value out of
	/// the stack and into the up value.
	fn close_up_values(&mut self, from: usize) {
		while let Some(&up_value) = self.open_up_values.last() {
			if let Some(&UpValue::Open(slot)) = self.heap.up_value(up_value) {
				if slot < from {break}
				let value = self.stack.get(slot).copied().unwrap_or_default();
				if let Some(open) = self.heap.up_value_mut(up_value)
					{*open = UpValue::Closed(value)}
			}
			self.open_up_values.pop();
		}
	}
}
