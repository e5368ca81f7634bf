use super::value::Value;
use std::{
	convert::TryFrom,
	fmt::{Display, Formatter, Result as FMTResult}
};

/// The most constants a single chunk may hold, as constant indices are encoded
/// in one byte.
pub const MAX_CONSTANTS: usize = 256;

/// The operation codes understood by the virtual machine. Every opcode is one
/// byte, and may be followed by operand bytes. Jump offsets are two bytes, big
/// endian.
///
/// The stack effect of each opcode is documented on the variant, where a
/// stack of `[a, b]` has `b` on top.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum OpCode {
	/// Pops a value and writes it, followed by a newline, to the output.
	Print,
	/// Pops a value, discarding it.
	Pop,
	/// Calls the callee below `n` arguments. Operands: `n`.
	Call,
	/// Returns the top of the stack from the current function.
	Return,
	Null,
	True,
	False,
	/// Pushes a constant. Operands: constant index.
	Constant,
	/// `[a]` becomes `[-a]`.
	Negate,
	/// `[a]` becomes `[!a]`.
	Not,
	/// `[a, b]` becomes `[a < b]`.
	Less,
	/// `[a, b]` becomes `[a <= b]`.
	LessEqual,
	/// `[a, b]` becomes `[a == b]`.
	Equal,
	Add,
	Subtract,
	Multiply,
	Divide,
	/// Pops a value into a new global. Operands: name constant index.
	DefineGlobal,
	/// Pushes a global. Operands: name constant index.
	GetGlobal,
	/// Assigns the top of the stack to an existing global, without popping.
	/// Operands: name constant index.
	SetGlobal,
	/// Pushes a local. Operands: slot relative to the frame base.
	GetLocal,
	/// Assigns the top of the stack to a local, without popping. Operands: slot
	/// relative to the frame base.
	SetLocal,
	/// Pushes an up value of the running closure. Operands: up value index.
	GetUpValue,
	/// Assigns the top of the stack to an up value, without popping. Operands:
	/// up value index.
	SetUpValue,
	/// Jumps forward unconditionally. Operands: offset (two bytes).
	Jump,
	/// Jumps forward if the top of the stack is falsey, without popping.
	/// Operands: offset (two bytes).
	JumpIfFalse,
	/// Jumps backward unconditionally. Operands: offset (two bytes).
	Loop,
	/// Creates a closure over a function constant. Operands: constant index,
	/// then an `(is_local, index)` byte pair for every up value the function
	/// captures.
	Closure,
	/// Closes the up value pointing at the top of the stack, then pops it.
	CloseUpValue,
	/// Builds a map from `n` key and value pairs. Operands: `n`.
	Map,
	/// Builds a map keyed `0..n` from `n` values. Operands: `n`.
	List,
	/// `[map]` becomes `[map.name]`. Operands: name constant index.
	GetField,
	/// `[map, value]` becomes `[value]`, setting `map.name`. Operands: name
	/// constant index.
	SetField,
	/// `[map, key]` becomes `[map[key]]`.
	GetIndex,
	/// `[map, key, value]` becomes `[value]`, setting `map[key]`.
	SetIndex
}

impl OpCode {
	/// The number of operand bytes following this opcode, or `None` for
	/// [`OpCode::Closure`], whose length depends on the function it captures for.
	pub fn operand_length(self) -> Option<usize> {
		Some(match self {
			Self::Call | Self::Constant | Self::DefineGlobal | Self::GetGlobal |
				Self::SetGlobal | Self::GetLocal | Self::SetLocal |
				Self::GetUpValue | Self::SetUpValue | Self::Map | Self::List |
				Self::GetField | Self::SetField => 1,
			Self::Jump | Self::JumpIfFalse | Self::Loop => 2,
			Self::Closure => return None,
			_ => 0
		})
	}
}

impl TryFrom<u8> for OpCode {
	type Error = u8;

	fn try_from(byte: u8) -> Result<Self, u8> {
		Ok(match byte {
			0 => Self::Print,
			1 => Self::Pop,
			2 => Self::Call,
			3 => Self::Return,
			4 => Self::Null,
			5 => Self::True,
			6 => Self::False,
			7 => Self::Constant,
			8 => Self::Negate,
			9 => Self::Not,
			10 => Self::Less,
			11 => Self::LessEqual,
			12 => Self::Equal,
			13 => Self::Add,
			14 => Self::Subtract,
			15 => Self::Multiply,
			16 => Self::Divide,
			17 => Self::DefineGlobal,
			18 => Self::GetGlobal,
			19 => Self::SetGlobal,
			20 => Self::GetLocal,
			21 => Self::SetLocal,
			22 => Self::GetUpValue,
			23 => Self::SetUpValue,
			24 => Self::Jump,
			25 => Self::JumpIfFalse,
			26 => Self::Loop,
			27 => Self::Closure,
			28 => Self::CloseUpValue,
			29 => Self::Map,
			30 => Self::List,
			31 => Self::GetField,
			32 => Self::SetField,
			33 => Self::GetIndex,
			34 => Self::SetIndex,
			byte => return Err(byte)
		})
	}
}

impl From<OpCode> for u8 {
	fn from(op_code: OpCode) -> Self {
		op_code as u8
	}
}

impl Display for OpCode {
	fn fmt(&self, f: &mut Formatter) -> FMTResult {
		write!(f, "{}", match self {
			Self::Print => "PRINT",
			Self::Pop => "POP",
			Self::Call => "CALL",
			Self::Return => "RET",
			Self::Null => "NULL",
			Self::True => "TRUE",
			Self::False => "FALSE",
			Self::Constant => "CONST",
			Self::Negate => "NEG",
			Self::Not => "NOT",
			Self::Less => "LT",
			Self::LessEqual => "LE",
			Self::Equal => "EQ",
			Self::Add => "ADD",
			Self::Subtract => "SUB",
			Self::Multiply => "MUL",
			Self::Divide => "DIV",
			Self::DefineGlobal => "DEF",
			Self::GetGlobal => "GLD",
			Self::SetGlobal => "GST",
			Self::GetLocal => "LD",
			Self::SetLocal => "ST",
			Self::GetUpValue => "ULD",
			Self::SetUpValue => "UST",
			Self::Jump => "JMP",
			Self::JumpIfFalse => "JMPF",
			Self::Loop => "LOOP",
			Self::Closure => "CLOSURE",
			Self::CloseUpValue => "CLOSE",
			Self::Map => "MAP",
			Self::List => "LIST",
			Self::GetField => "GET",
			Self::SetField => "SET",
			Self::GetIndex => "GETI",
			Self::SetIndex => "SETI"
		})
	}
}

/// A block of byte code, with the source position of every byte and the
/// constants it refers to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chunk {
	pub code: Vec<u8>,
	pub lines: Vec<u16>,
	pub columns: Vec<u16>,
	pub constants: Vec<Value>
}

impl Chunk {
	/// Appends a byte, remembering the source position it came from. Positions
	/// beyond `u16::MAX` saturate.
	pub fn write(&mut self, byte: impl Into<u8>, line: u32, column: u32) {
		self.code.push(byte.into());
		self.lines.push(u16::try_from(line).unwrap_or(u16::MAX));
		self.columns.push(u16::try_from(column).unwrap_or(u16::MAX));
	}

	/// Adds a constant, returning its index, or `None` if this chunk is full.
	/// Identical constants are shared.
	pub fn add_constant(&mut self, value: Value) -> Option<u8> {
		let existing = self.constants.iter()
			.position(|constant| constant.same(&value));

		match existing {
			Some(index) => u8::try_from(index).ok(),
			None if self.constants.len() < MAX_CONSTANTS => {
				self.constants.push(value);
				u8::try_from(self.constants.len() - 1).ok()
			},
			None => None
		}
	}

	pub fn len(&self) -> usize {
		self.code.len()
	}

	pub fn is_empty(&self) -> bool {
		self.code.is_empty()
	}

	/// Reads a big endian two byte operand.
	pub fn read_u16(&self, offset: usize) -> Option<u16> {
		let high = *self.code.get(offset)?;
		let low = *self.code.get(offset + 1)?;
		Some(u16::from_be_bytes([high, low]))
	}

	/// The source position of the byte at `offset`.
	pub fn position(&self, offset: usize) -> (u16, u16) {
		(self.lines.get(offset).copied().unwrap_or(0),
			self.columns.get(offset).copied().unwrap_or(0))
	}
}
