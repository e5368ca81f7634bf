//! Byte code decoding and disassembly.
use super::{
	chunk::{Chunk, OpCode},
	heap::Heap,
	value::Value
};
use std::convert::TryFrom;

/// A decoded instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
	pub offset: usize,
	/// The opcode, or the unknown byte found in its place.
	pub op_code: Result<OpCode, u8>,
	/// The raw operand bytes. Truncated if the chunk ends early.
	pub operands: Vec<u8>,
	pub line: u16,
	pub column: u16
}

impl Instruction {
	/// The number of bytes this instruction occupies.
	pub fn len(&self) -> usize {
		1 + self.operands.len()
	}

	pub fn is_empty(&self) -> bool {
		false
	}

	/// The bytes this instruction was decoded from.
	pub fn encode(&self) -> Vec<u8> {
		let op_code = match self.op_code {
			Ok(op_code) => op_code.into(),
			Err(byte) => byte
		};
		std::iter::once(op_code).chain(self.operands.iter().copied()).collect()
	}

	/// Where a jump lands, if this is a complete jump instruction.
	pub fn jump_target(&self) -> Option<usize> {
		let offset = match self.operands[..] {
			[high, low] => u16::from_be_bytes([high, low]) as usize,
			_ => return None
		};

		match self.op_code {
			Ok(OpCode::Jump | OpCode::JumpIfFalse) => Some(self.offset + 3 + offset),
			Ok(OpCode::Loop) => (self.offset + 3).checked_sub(offset),
			_ => None
		}
	}
}

/// Decodes the instruction at `offset`. The heap is consulted for the number
/// of up values a `CLOSURE` captures.
pub fn decode(heap: &Heap, chunk: &Chunk, offset: usize) -> Option<Instruction> {
	let byte = *chunk.code.get(offset)?;
	let op_code = OpCode::try_from(byte);

	let length = match op_code {
		Ok(OpCode::Closure) => {
			let up_values = chunk.code.get(offset + 1)
				.and_then(|index| chunk.constants.get(*index as usize))
				.and_then(Value::as_object)
				.and_then(|function| heap.function(function))
				.map_or(0, |function| function.up_value_count);
			1 + up_values * 2
		},
		Ok(op_code) => op_code.operand_length().unwrap_or(0),
		Err(_) => 0
	};

	let end = (offset + 1 + length).min(chunk.code.len());
	let (line, column) = chunk.position(offset);
	Some(Instruction {
		offset,
		op_code,
		operands: chunk.code[offset + 1..end].to_vec(),
		line,
		column
	})
}

/// Decodes every instruction in a chunk, in order.
///
/// Example
/// -------
/// ```rust
/// # use auric::vm::{debug::instructions, OpCode, VirtualMachine};
/// let mut virtual_machine = VirtualMachine::new();
/// let script = virtual_machine.compile("print 1;").unwrap();
/// let chunk = &virtual_machine.heap().function(script).unwrap().chunk;
///
/// let op_codes = instructions(virtual_machine.heap(), chunk).into_iter()
/// 	.map(|instruction| instruction.op_code)
/// 	.collect::<Vec<_>>();
/// assert_eq!(op_codes, [Ok(OpCode::Constant), Ok(OpCode::Print),
/// 	Ok(OpCode::Null), Ok(OpCode::Return)]);
/// ```
pub fn instructions(heap: &Heap, chunk: &Chunk) -> Vec<Instruction> {
	let mut offset = 0;
	std::iter::from_fn(|| {
		let instruction = decode(heap, chunk, offset)?;
		offset += instruction.len();
		Some(instruction)
	}).collect()
}

/// Renders one instruction, with its operands resolved where possible.
pub fn format_instruction(heap: &Heap, chunk: &Chunk, instruction: &Instruction)
		-> String {
	let mut text = format!("{:04} {:>4}:{:<3} ", instruction.offset,
		instruction.line, instruction.column);

	let op_code = match instruction.op_code {
		Ok(op_code) => op_code,
		Err(byte) => {
			text.push_str(&format!("<unknown {}>", byte));
			return text
		}
	};
	text.push_str(&format!("{:<8}", op_code));

	let constant = |index: u8| chunk.constants.get(index as usize)
		.map_or_else(|| "<missing>".to_owned(), |value| heap.display(*value));

	match (op_code, &instruction.operands[..]) {
		(OpCode::Constant | OpCode::DefineGlobal | OpCode::GetGlobal | OpCode::SetGlobal |
				OpCode::GetField | OpCode::SetField, &[index]) =>
			text.push_str(&format!(" {:>3} '{}'", index, constant(index))),
		(OpCode::Jump | OpCode::JumpIfFalse | OpCode::Loop, _) =>
			if let Some(target) = instruction.jump_target() {
				text.push_str(&format!(" {:>3} -> {}", instruction.offset, target))
			},
		(OpCode::Closure, [index, captures @ ..]) => {
			text.push_str(&format!(" {:>3} {}", index, constant(*index)));
			for pair in captures.chunks(2) {
				if let &[local, slot] = pair {
					text.push_str(&format!("\n{:04}      |  {} {}", instruction.offset,
						match local {0 => "upvalue", _ => "local"}, slot));
				}
			}
		},
		(_, &[operand]) => text.push_str(&format!(" {:>3}", operand)),
		_ => ()
	}

	text.trim_end().to_owned()
}

/// Renders the instruction at `offset`, or nothing past the end of the chunk.
pub fn describe(heap: &Heap, chunk: &Chunk, offset: usize) -> String {
	decode(heap, chunk, offset)
		.map(|instruction| format_instruction(heap, chunk, &instruction))
		.unwrap_or_default()
}

/// Renders a whole chunk under a header, followed by every function defined
/// in it.
pub fn disassemble(heap: &Heap, chunk: &Chunk, name: &str) -> String {
	let mut text = format!("== {} ==\n", name);
	for instruction in instructions(heap, chunk) {
		text.push_str(&format_instruction(heap, chunk, &instruction));
		text.push('\n');
	}

	for constant in &chunk.constants {
		let function = match constant.as_object().and_then(|reference| heap.function(reference)) {
			Some(function) => function,
			None => continue
		};
		let name = function.name.and_then(|name| heap.str(Value::Object(name)))
			.unwrap_or("script");
		text.push('\n');
		text.push_str(&disassemble(heap, &function.chunk, name));
	}

	text
}

#[cfg(test)]
mod tests {
	use super::{disassemble, instructions};
	use crate::vm::{OpCode, VirtualMachine};

	const SOURCE: &str = "
var counter = 0;
fun make() {
	var count = 0;
	fun increment() {count = count + 1; return count;}
	return increment;
}
while (counter < 3) {counter = counter + 1;}
var pairs = {'a': [1, 2], 'b': null};
pairs.a[0] = make()();
";

	#[test]
	fn decoding_covers_every_byte() {
		let mut virtual_machine = VirtualMachine::new();
		let script = virtual_machine.compile(SOURCE).unwrap();
		let heap = virtual_machine.heap();
		let chunk = &heap.function(script).unwrap().chunk;

		let decoded = instructions(heap, chunk);
		let encoded = decoded.iter().flat_map(|instruction| instruction.encode())
			.collect::<Vec<_>>();
		assert_eq!(encoded, chunk.code);

		for instruction in &decoded {
			assert!(instruction.op_code.is_ok());
			assert_eq!((instruction.line, instruction.column),
				chunk.position(instruction.offset));
		}
	}

	#[test]
	fn jumps_land_on_instructions() {
		let mut virtual_machine = VirtualMachine::new();
		let script = virtual_machine.compile(SOURCE).unwrap();
		let heap = virtual_machine.heap();
		let chunk = &heap.function(script).unwrap().chunk;

		let decoded = instructions(heap, chunk);
		let starts = decoded.iter().map(|instruction| instruction.offset)
			.collect::<Vec<_>>();
		let jumps = decoded.iter().filter_map(|instruction| instruction.jump_target())
			.collect::<Vec<_>>();

		assert!(!jumps.is_empty());
		for target in jumps {assert!(starts.contains(&target), "{} is mid instruction", target)}
	}

	#[test]
	fn disassembly_includes_nested_functions() {
		let mut virtual_machine = VirtualMachine::new();
		let script = virtual_machine.compile(SOURCE).unwrap();
		let heap = virtual_machine.heap();
		let text = disassemble(heap, &heap.function(script).unwrap().chunk, "script");

		assert!(text.starts_with("== script ==\n"));
		assert!(text.contains("== make =="));
		assert!(text.contains("== increment =="));
		assert!(text.contains(&OpCode::Closure.to_string()));
		assert!(text.contains("|  local 1"));
		assert!(text.contains("'counter'"));
	}

	#[test]
	fn unknown_bytes_decode_alone() {
		let mut virtual_machine = VirtualMachine::new();
		let script = virtual_machine.compile("").unwrap();
		let heap = virtual_machine.heap();
		let mut chunk = heap.function(script).unwrap().chunk.clone();
		chunk.write(200u8, 1, 1);

		let decoded = instructions(heap, &chunk);
		let last = decoded.last().unwrap();
		assert_eq!(last.op_code, Err(200));
		assert_eq!(last.len(), 1);
	}
}
