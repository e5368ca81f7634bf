use super::{
	chunk::Chunk,
	heap::ObjRef,
	table::Table,
	value::Value,
	VirtualMachine
};
use std::{
	fmt::{Debug, Formatter, Result as FMTResult},
	mem::size_of
};

/// A function implemented by the host.
///
/// Natives are called with the number of arguments passed. They must pop
/// exactly that many values with [VirtualMachine::pop], and push exactly one
/// result with [VirtualMachine::push]. Returning an error raises a runtime
/// error in the calling script.
pub type NativeFunction = fn(&mut VirtualMachine, usize) -> Result<(), String>;

/// A heap allocated object, with the header the garbage collector needs.
#[derive(Debug)]
pub struct Object {
	pub(crate) marked: bool,
	/// The bytes this object was accounted for when last measured.
	pub(crate) size: usize,
	pub kind: ObjectKind
}

impl Object {
	pub(crate) fn new(kind: ObjectKind) -> Self {
		let size = kind.measure();
		Self {marked: false, size, kind}
	}
}

#[derive(Debug)]
pub enum ObjectKind {
	String(StringObject),
	Function(Function),
	Closure(Closure),
	UpValue(UpValue),
	Map(Map),
	Native(Native)
}

impl ObjectKind {
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::String(_) => "string",
			Self::Function(_) | Self::Closure(_) => "function",
			Self::UpValue(_) => "upvalue",
			Self::Map(_) => "map",
			Self::Native(_) => "native"
		}
	}

	/// Approximates the bytes this object owns, header included.
	pub(crate) fn measure(&self) -> usize {
		size_of::<Object>() + match self {
			Self::String(string) => string.text.len(),
			Self::Function(function) => {
				let chunk = &function.chunk;
				chunk.code.capacity() + chunk.lines.capacity() * 2
					+ chunk.columns.capacity() * 2
					+ chunk.constants.capacity() * size_of::<Value>()
			},
			Self::Closure(closure) =>
				closure.up_values.capacity() * size_of::<ObjRef>(),
			Self::UpValue(_) | Self::Native(_) => 0,
			Self::Map(map) => map.memory_size()
		}
	}

	/// Pushes every value this object refers to.
	pub(crate) fn trace(&self, into: &mut Vec<Value>) {
		match self {
			Self::String(_) => (),
			Self::Function(function) => {
				into.extend(function.name.map(Value::Object));
				into.extend_from_slice(&function.chunk.constants);
			},
			Self::Closure(closure) => {
				into.push(Value::Object(closure.function));
				into.extend(closure.up_values.iter().copied().map(Value::Object));
			},
			Self::UpValue(UpValue::Closed(value)) => into.push(*value),
			Self::UpValue(UpValue::Open(_)) => (),
			Self::Map(map) => {
				into.extend_from_slice(&map.keys);
				into.extend_from_slice(&map.values);
			},
			Self::Native(native) => into.push(Value::Object(native.name))
		}
	}
}

/// An interned string, along with its cached hash.
#[derive(Debug)]
pub struct StringObject {
	pub text: Box<str>,
	pub hash: u32
}

#[derive(Debug, Default)]
pub struct Function {
	pub arity: u8,
	pub up_value_count: usize,
	pub chunk: Chunk,
	/// The name of this function, or `None` for top level code.
	pub name: Option<ObjRef>
}

/// A function along with the up values it captured when it was created.
#[derive(Debug)]
pub struct Closure {
	pub function: ObjRef,
	pub up_values: Vec<ObjRef>
}

/// A variable captured by a closure. While the variable's frame is live, the up
/// value points at its stack slot, afterwards the up value owns the value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpValue {
	Open(usize),
	Closed(Value)
}

/// An insertion ordered map. Keys and values live in dense arrays, and the
/// index table maps each key to its position in them.
#[derive(Clone, Debug, Default)]
pub struct Map {
	keys: Vec<Value>,
	values: Vec<Value>,
	index: Table
}

impl Map {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.keys.len()
	}

	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}

	pub fn keys(&self) -> &[Value] {
		&self.keys
	}

	pub fn values(&self) -> &[Value] {
		&self.values
	}

	/// Iterates over every key and value, in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
		self.keys.iter().copied().zip(self.values.iter().copied())
	}

	fn position(&self, key: Value, hash: u32) -> Option<usize> {
		match self.index.get(key, hash)? {
			Value::Integer(position) => usize::try_from(position).ok(),
			_ => None
		}
	}

	pub fn get(&self, key: Value, hash: u32) -> Option<Value> {
		self.values.get(self.position(key, hash)?).copied()
	}

	/// Inserts or overwrites a key. New keys go to the end.
	pub fn insert(&mut self, key: Value, hash: u32, value: Value) {
		match self.position(key, hash) {
			Some(position) => self.values[position] = value,
			None => {
				let position = self.keys.len() as i64;
				self.keys.push(key);
				self.values.push(value);
				self.index.insert(key, hash, Value::Integer(position));
			}
		}
	}

	pub(crate) fn memory_size(&self) -> usize {
		(self.keys.capacity() + self.values.capacity()) * size_of::<Value>()
			+ self.index.memory_size()
	}
}

#[derive(Clone, Copy)]
pub struct Native {
	pub name: ObjRef,
	pub function: NativeFunction,
	/// The number of arguments this native expects, checked before calling it.
	pub arity: Option<u8>,
	pub doc: &'static str
}

impl Debug for Native {
	fn fmt(&self, f: &mut Formatter<'_>) -> FMTResult {
		f.debug_struct("Native")
			.field("name", &self.name)
			.field("arity", &self.arity)
			.field("doc", &self.doc)
			.finish()
	}
}
