//! The single pass compiler.
//!
//! There is no syntax tree. Statements are parsed by recursive descent and
//! expressions by a Pratt parser, and byte code is emitted as each construct is
//! recognized. Every function body gets its own [`Context`], tracking its locals
//! and the up values it captures from enclosing functions.
#[cfg(test)]
pub mod tests;

use super::{
	lexer::{Lexer, Token, TokenKind},
	vm::{
		chunk::{Chunk, OpCode},
		heap::{Heap, ObjRef},
		object::{Function, ObjectKind},
		value::Value
	},
	Options
};
use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;
use std::{
	borrow::Cow,
	error::Error as STDError,
	fmt::{Display, Formatter, Result as FMTResult},
	mem::replace
};

pub const MAX_LOCALS: usize = 256;
pub const MAX_UP_VALUES: usize = 256;
pub const MAX_ARGUMENTS: usize = 32;

/// Where in the source a compile error was found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Location {
	/// At the end of the source.
	End,
	/// At a token, holding its lexeme.
	At(String),
	/// Inside a token the lexer could not make sense of.
	Lexer
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompileError {
	pub line: u32,
	pub column: u32,
	pub location: Location,
	pub message: String
}

impl STDError for CompileError {}

impl Display for CompileError {
	fn fmt(&self, f: &mut Formatter<'_>) -> FMTResult {
		write!(f, "[{}:{}] Error", self.line, self.column)?;
		match &self.location {
			Location::End => write!(f, " at end")?,
			Location::At(lexeme) => write!(f, " at '{}'", lexeme)?,
			Location::Lexer => ()
		}
		write!(f, ": {}", self.message)
	}
}

/// Every error found while compiling a source text, in source order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
		self.0.iter()
	}

	/// Whether the source merely ended too early, meaning more input could still
	/// make it valid. Used by the REPL to read continuation lines.
	pub fn is_incomplete(&self) -> bool {
		!self.0.is_empty() && self.0.iter().all(|error| match error.location {
			Location::End => true,
			Location::Lexer => error.message.starts_with("Unterminated"),
			Location::At(_) => false
		})
	}
}

impl STDError for CompileErrors {}

impl Display for CompileErrors {
	fn fmt(&self, f: &mut Formatter<'_>) -> FMTResult {
		write!(f, "{}", self.0.iter().join("\n"))
	}
}

/// Compiles source text into a function object holding the top level code.
///
/// Constants are allocated on `heap`, but no garbage is collected while
/// compiling, only the virtual machine knows what the roots are. The returned
/// function must be rooted before anything else is allocated.
///
/// Example
/// -------
/// ```rust
/// # use auric::{Options, compiler::compile, vm::heap::Heap};
/// let options = Options::default();
/// let mut heap = Heap::new(&options);
///
/// let script = compile("print 1 + 2;", &mut heap, &options).unwrap();
/// assert_eq!(heap.function(script).map(|function| function.arity), Some(0));
///
/// let errors = compile("print 1 +;", &mut heap, &options).unwrap_err();
/// assert_eq!(errors.to_string(), "[1:10] Error at ';': Expect expression.");
/// ```
pub fn compile(source: &str, heap: &mut Heap, options: &Options)
		-> Result<ObjRef, CompileErrors> {
	let mut compiler = Compiler::new(source, heap, options);

	compiler.advance();
	while !compiler.eat(TokenKind::Eof) {compiler.declaration()}
	let (function, _) = compiler.end_context();

	match compiler.errors.is_empty() {
		true => Ok(compiler.heap.allocate(ObjectKind::Function(function))),
		false => Err(CompileErrors(compiler.errors))
	}
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
enum Precedence {
	None,
	Assignment,
	Or,
	And,
	Equality,
	Comparison,
	Term,
	Factor,
	Unary,
	Call,
	Primary
}

impl Precedence {
	/// The next tighter binding precedence.
	fn next(self) -> Self {
		match self {
			Self::None => Self::Assignment,
			Self::Assignment => Self::Or,
			Self::Or => Self::And,
			Self::And => Self::Equality,
			Self::Equality => Self::Comparison,
			Self::Comparison => Self::Term,
			Self::Term => Self::Factor,
			Self::Factor => Self::Unary,
			Self::Unary => Self::Call,
			Self::Call | Self::Primary => Self::Primary
		}
	}
}

type ParseFn<'s, 'h> = fn(&mut Compiler<'s, 'h>, bool);

struct ParseRule<'s, 'h> {
	prefix: Option<ParseFn<'s, 'h>>,
	infix: Option<ParseFn<'s, 'h>>,
	precedence: Precedence
}

macro_rules! rule {
	($prefix:expr, $infix:expr, $precedence:ident) => {
		ParseRule {prefix: $prefix, infix: $infix, precedence: Precedence::$precedence}
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FunctionKind {
	Script,
	Function
}

#[derive(Debug)]
struct Local<'s> {
	name: Cow<'s, str>,
	/// The scope depth, or `None` while the initializer is still being compiled.
	depth: Option<usize>,
	captured: bool
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct UpValueSlot {
	index: u8,
	local: bool
}

/// The compilation state of a single function body.
struct Context<'s> {
	function: Function,
	kind: FunctionKind,
	locals: Vec<Local<'s>>,
	up_values: Vec<UpValueSlot>,
	scope_depth: usize,
	/// Constant indices of identifier names already added to this chunk.
	identifiers: HashMap<Cow<'s, str>, u8>
}

impl<'s> Context<'s> {
	fn new(kind: FunctionKind, name: Option<ObjRef>) -> Self {
		Self {
			function: Function {name, ..Function::default()},
			kind,
			// Slot zero holds the function being called, and can't be named.
			locals: vec![Local {name: Cow::Borrowed(""), depth: Some(0), captured: false}],
			up_values: Vec::new(),
			scope_depth: 0,
			identifiers: HashMap::new()
		}
	}

	fn resolve_local(&self, name: &str) -> Result<Option<usize>, &'static str> {
		match self.locals.iter().rposition(|local| local.name == name) {
			Some(slot) => match self.locals[slot].depth {
				Some(_) => Ok(Some(slot)),
				None => Err("Can't read local variable in its own initializer.")
			},
			None => Ok(None)
		}
	}

	fn add_up_value(&mut self, index: u8, local: bool) -> Result<u8, &'static str> {
		let slot = UpValueSlot {index, local};
		let position = match self.up_values.iter().position(|&other| other == slot) {
			Some(position) => position,
			None if self.up_values.len() == MAX_UP_VALUES =>
				return Err("Too many closure variables in function."),
			None => {self.up_values.push(slot); self.up_values.len() - 1}
		};
		Ok(position as u8)
	}
}

/// Resolves `name` as an up value of `current`, searching the enclosing
/// functions from the innermost outward. Every function in between captures
/// the variable too.
fn resolve_up_value(enclosing: &mut [Context<'_>], current: &mut Context<'_>,
		name: &str) -> Result<Option<u8>, &'static str> {
	let (parent, rest) = match enclosing.split_last_mut() {
		Some(split) => split,
		None => return Ok(None)
	};

	if let Some(slot) = parent.resolve_local(name)? {
		parent.locals[slot].captured = true;
		return current.add_up_value(slot as u8, true).map(Some)
	}

	match resolve_up_value(rest, parent, name)? {
		Some(index) => current.add_up_value(index, false).map(Some),
		None => Ok(None)
	}
}

/// Decodes the escape codes in a string literal's contents.
fn unescape(text: &str) -> Result<String, &'static str> {
	let mut string = String::with_capacity(text.len());
	let mut characters = text.chars();

	while let Some(character) = characters.next() {
		string.push(match character {
			'\\' => match characters.next() {
				Some('n') => '\n',
				Some('r') => '\r',
				Some('t') => '\t',
				Some('0') => '\0',
				Some('\\') => '\\',
				Some('"') => '"',
				Some('\'') => '\'',
				_ => return Err("Invalid escape sequence.")
			},
			character => character
		});
	}

	Ok(string)
}

pub struct Compiler<'s, 'h> {
	lexer: Lexer<'s>,
	current: Token<'s>,
	previous: Token<'s>,
	errors: Vec<CompileError>,
	panic_mode: bool,
	heap: &'h mut Heap,
	context: Context<'s>,
	enclosing: Vec<Context<'s>>,
	ignore_case: bool
}

/// Token handling and error reporting.
impl<'s, 'h> Compiler<'s, 'h> {
	fn new(source: &'s str, heap: &'h mut Heap, options: &Options) -> Self {
		Self {
			lexer: Lexer::new(source, options),
			current: Token::synthetic(""),
			previous: Token::synthetic(""),
			errors: Vec::new(),
			panic_mode: false,
			heap,
			context: Context::new(FunctionKind::Script, None),
			enclosing: Vec::new(),
			ignore_case: options.ignore_case
		}
	}

	fn advance(&mut self) {
		self.previous = self.current;
		loop {
			self.current = self.lexer.scan_token();
			if self.current.kind != TokenKind::Error {break}
			self.error_at_current(self.current.lexeme);
		}
	}

	fn check(&self, kind: TokenKind) -> bool {
		self.current.kind == kind
	}

	/// Advances past the current token if it is of the given kind.
	fn eat(&mut self, kind: TokenKind) -> bool {
		match self.check(kind) {
			true => {self.advance(); true},
			false => false
		}
	}

	fn consume(&mut self, kind: TokenKind, message: &str) {
		match self.check(kind) {
			true => self.advance(),
			false => self.error_at_current(message)
		}
	}

	fn error_at(&mut self, token: Token<'s>, message: &str) {
		if self.panic_mode {return}
		self.panic_mode = true;

		let location = match token.kind {
			TokenKind::Eof => Location::End,
			TokenKind::Error => Location::Lexer,
			_ => Location::At(token.lexeme.to_owned())
		};
		self.errors.push(CompileError {
			line: token.line,
			column: token.column,
			location,
			message: message.to_owned()
		});
	}

	fn error(&mut self, message: &str) {
		self.error_at(self.previous, message)
	}

	fn error_at_current(&mut self, message: &str) {
		self.error_at(self.current, message)
	}

	/// Skips tokens until a likely statement boundary, ending panic mode.
	fn synchronize(&mut self) {
		self.panic_mode = false;

		while !self.check(TokenKind::Eof) {
			if self.previous.kind == TokenKind::SemiColon {return}
			match self.current.kind {
				TokenKind::KeywordClass | TokenKind::KeywordFun | TokenKind::KeywordVar |
					TokenKind::KeywordFor | TokenKind::KeywordIf |
					TokenKind::KeywordWhile | TokenKind::KeywordDo |
					TokenKind::KeywordPrint | TokenKind::KeywordPuts |
					TokenKind::KeywordReturn => return,
				_ => self.advance()
			}
		}
	}

	/// The name a variable token refers to.
	fn name(&self, token: Token<'s>) -> Cow<'s, str> {
		match self.ignore_case {
			true => Cow::Owned(token.lexeme.to_lowercase()),
			false => Cow::Borrowed(token.lexeme)
		}
	}
}

/// Code emission.
impl<'s, 'h> Compiler<'s, 'h> {
	fn chunk(&mut self) -> &mut Chunk {
		&mut self.context.function.chunk
	}

	fn emit(&mut self, byte: impl Into<u8>) {
		let (line, column) = (self.previous.line, self.previous.column);
		self.chunk().write(byte, line, column);
	}

	fn emit_with(&mut self, op_code: OpCode, operand: u8) {
		self.emit(op_code);
		self.emit(operand);
	}

	fn make_constant(&mut self, value: Value) -> u8 {
		match self.chunk().add_constant(value) {
			Some(index) => index,
			None => {self.error("Too many constants in one chunk."); 0}
		}
	}

	fn emit_constant(&mut self, value: Value) {
		let constant = self.make_constant(value);
		self.emit_with(OpCode::Constant, constant);
	}

	/// Adds an identifier's name to the constant table, reusing the existing
	/// constant if the name was used before.
	fn identifier_constant(&mut self, name: Cow<'s, str>) -> u8 {
		if let Some(&constant) = self.context.identifiers.get(&name) {return constant}

		let string = self.heap.intern(&name);
		let constant = self.make_constant(Value::Object(string));
		self.context.identifiers.insert(name, constant);
		constant
	}

	/// Emits a jump with a placeholder offset, returning the offset's position.
	fn emit_jump(&mut self, op_code: OpCode) -> usize {
		self.emit(op_code);
		self.emit(0xffu8);
		self.emit(0xffu8);
		self.chunk().len() - 2
	}

	fn patch_jump(&mut self, offset: usize) {
		let jump = self.chunk().len() - offset - 2;
		let [high, low] = match u16::try_from(jump) {
			Ok(jump) => jump.to_be_bytes(),
			Err(_) => return self.error("Too much code to jump over.")
		};

		let code = &mut self.chunk().code;
		code[offset] = high;
		code[offset + 1] = low;
	}

	fn emit_loop(&mut self, start: usize) {
		self.emit(OpCode::Loop);
		let offset = self.chunk().len() - start + 2;
		let [high, low] = match u16::try_from(offset) {
			Ok(offset) => offset.to_be_bytes(),
			Err(_) => {self.error("Loop body too large."); [0, 0]}
		};
		self.emit(high);
		self.emit(low);
	}

	fn begin_context(&mut self, kind: FunctionKind, name: ObjRef) {
		let context = Context::new(kind, Some(name));
		let enclosing = replace(&mut self.context, context);
		self.enclosing.push(enclosing);
	}

	/// Finishes the function being compiled, returning it along with the up
	/// values its closures must capture.
	fn end_context(&mut self) -> (Function, Vec<UpValueSlot>) {
		self.emit(OpCode::Null);
		self.emit(OpCode::Return);

		let context = match self.enclosing.pop() {
			Some(enclosing) => replace(&mut self.context, enclosing),
			None => replace(&mut self.context, Context::new(FunctionKind::Script, None))
		};
		let mut function = context.function;
		function.up_value_count = context.up_values.len();

		debug!("compiled {}: {} bytes, {} constants, {} up values",
			function.name.and_then(|name| self.heap.string(name))
				.map_or("script", |name| &*name.text),
			function.chunk.len(), function.chunk.constants.len(),
			function.up_value_count);
		(function, context.up_values)
	}

	fn begin_scope(&mut self) {
		self.context.scope_depth += 1;
	}

	fn end_scope(&mut self) {
		self.context.scope_depth -= 1;
		let depth = self.context.scope_depth;

		loop {
			let captured = match self.context.locals.last() {
				Some(local) if local.depth.map_or(true, |local| local > depth) =>
					local.captured,
				_ => break
			};

			self.emit(match captured {
				true => OpCode::CloseUpValue,
				false => OpCode::Pop
			});
			self.context.locals.pop();
		}
	}
}

/// Variables.
impl<'s, 'h> Compiler<'s, 'h> {
	fn add_local(&mut self, name: Cow<'s, str>) {
		if self.context.locals.len() == MAX_LOCALS
			{return self.error("Too many local variables in function.")}
		self.context.locals.push(Local {name, depth: None, captured: false});
	}

	fn declare_variable(&mut self) {
		if self.context.scope_depth == 0 {return}

		let name = self.name(self.previous);
		let depth = self.context.scope_depth;
		let duplicate = self.context.locals.iter().rev()
			.take_while(|local| local.depth.map_or(true, |local| local >= depth))
			.any(|local| local.name == name);
		if duplicate {self.error("Already a variable with this name in this scope.")}

		self.add_local(name);
	}

	/// Parses a variable name, returning its name constant if it is global.
	fn parse_variable(&mut self, message: &str) -> u8 {
		self.consume(TokenKind::Identifier, message);
		self.declare_variable();
		if self.context.scope_depth > 0 {return 0}

		let name = self.name(self.previous);
		self.identifier_constant(name)
	}

	fn mark_initialized(&mut self) {
		let depth = self.context.scope_depth;
		if depth == 0 {return}
		if let Some(local) = self.context.locals.last_mut() {local.depth = Some(depth)}
	}

	fn define_variable(&mut self, global: u8) {
		match self.context.scope_depth {
			0 => self.emit_with(OpCode::DefineGlobal, global),
			_ => self.mark_initialized()
		}
	}

	fn named_variable(&mut self, token: Token<'s>, can_assign: bool) {
		let name = self.name(token);
		let (get, set, operand) = match self.context.resolve_local(&name) {
			Ok(Some(slot)) => (OpCode::GetLocal, OpCode::SetLocal, slot as u8),
			Err(message) => {
				self.error(message);
				(OpCode::GetLocal, OpCode::SetLocal, 0)
			},
			Ok(None) => match resolve_up_value(&mut self.enclosing, &mut self.context, &name) {
				Ok(Some(index)) => (OpCode::GetUpValue, OpCode::SetUpValue, index),
				Err(message) => {
					self.error(message);
					(OpCode::GetUpValue, OpCode::SetUpValue, 0)
				},
				Ok(None) => {
					let constant = self.identifier_constant(name);
					(OpCode::GetGlobal, OpCode::SetGlobal, constant)
				}
			}
		};

		match can_assign && self.eat(TokenKind::Assign) {
			true => {self.expression(); self.emit_with(set, operand)},
			false => self.emit_with(get, operand)
		}
	}
}

/// Statements.
impl<'s, 'h> Compiler<'s, 'h> {
	fn declaration(&mut self) {
		match self.current.kind {
			TokenKind::KeywordFun => {self.advance(); self.function_declaration()},
			TokenKind::KeywordVar => {self.advance(); self.var_declaration()},
			TokenKind::KeywordClass =>
				{self.advance(); self.error("Classes are not supported.")},
			_ => self.statement()
		}

		if self.panic_mode {self.synchronize()}
	}

	fn function_declaration(&mut self) {
		let global = self.parse_variable("Expect function name.");
		// A function may refer to itself.
		self.mark_initialized();
		let name = self.name(self.previous);
		self.function(FunctionKind::Function, name);
		self.define_variable(global);
	}

	fn var_declaration(&mut self) {
		let global = self.parse_variable("Expect variable name.");

		match self.eat(TokenKind::Assign) {
			true => self.expression(),
			false => self.emit(OpCode::Null)
		}
		self.consume(TokenKind::SemiColon,
			"Expect ';' after variable declaration.");

		self.define_variable(global);
	}

	fn statement(&mut self) {
		match self.current.kind {
			TokenKind::KeywordPrint | TokenKind::KeywordPuts =>
				{self.advance(); self.print_statement()},
			TokenKind::KeywordIf => {self.advance(); self.if_statement()},
			TokenKind::KeywordWhile => {self.advance(); self.while_statement()},
			TokenKind::KeywordDo => {self.advance(); self.do_statement()},
			TokenKind::KeywordFor => {self.advance(); self.for_statement()},
			TokenKind::KeywordReturn => {self.advance(); self.return_statement()},
			TokenKind::OpenCurly => {
				self.advance();
				self.begin_scope();
				self.block();
				self.end_scope();
			},
			_ => self.expression_statement()
		}
	}

	fn block(&mut self) {
		while !self.check(TokenKind::CloseCurly) && !self.check(TokenKind::Eof)
			{self.declaration()}
		self.consume(TokenKind::CloseCurly, "Expect '}' after block.");
	}

	/// Compiles a function's parameters and body, then emits the closure
	/// creating it. Assumes the name, if any, *was* consumed.
	fn function(&mut self, kind: FunctionKind, name: Cow<'s, str>) {
		let name = self.heap.intern(&name);
		self.begin_context(kind, name);
		self.begin_scope();

		self.consume(TokenKind::OpenParen, "Expect '(' after function name.");
		if !self.check(TokenKind::CloseParen) {
			loop {
				match self.context.function.arity as usize {
					MAX_ARGUMENTS =>
						self.error_at_current("Can't have more than 32 parameters."),
					_ => self.context.function.arity += 1
				}
				let constant = self.parse_variable("Expect parameter name.");
				self.define_variable(constant);
				if !self.eat(TokenKind::Comma) {break}
			}
		}
		self.consume(TokenKind::CloseParen, "Expect ')' after parameters.");
		self.consume(TokenKind::OpenCurly, "Expect '{' before function body.");
		self.block();

		let (function, up_values) = self.end_context();
		let function = self.heap.allocate(ObjectKind::Function(function));
		let constant = self.make_constant(Value::Object(function));
		self.emit_with(OpCode::Closure, constant);
		for up_value in up_values {
			self.emit(up_value.local as u8);
			self.emit(up_value.index);
		}
	}

	fn print_statement(&mut self) {
		self.expression();
		self.consume(TokenKind::SemiColon, "Expect ';' after value.");
		self.emit(OpCode::Print);
	}

	fn expression_statement(&mut self) {
		self.expression();
		self.consume(TokenKind::SemiColon, "Expect ';' after expression.");
		self.emit(OpCode::Pop);
	}

	fn if_statement(&mut self) {
		self.consume(TokenKind::OpenParen, "Expect '(' after 'if'.");
		self.expression();
		self.consume(TokenKind::CloseParen, "Expect ')' after condition.");

		let then_jump = self.emit_jump(OpCode::JumpIfFalse);
		self.emit(OpCode::Pop);
		self.statement();
		let else_jump = self.emit_jump(OpCode::Jump);

		self.patch_jump(then_jump);
		self.emit(OpCode::Pop);
		if self.eat(TokenKind::KeywordElse) {self.statement()}
		self.patch_jump(else_jump);
	}

	fn while_statement(&mut self) {
		let loop_start = self.chunk().len();
		self.consume(TokenKind::OpenParen, "Expect '(' after 'while'.");
		self.expression();
		self.consume(TokenKind::CloseParen, "Expect ')' after condition.");

		let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
		self.emit(OpCode::Pop);
		self.statement();
		self.emit_loop(loop_start);

		self.patch_jump(exit_jump);
		self.emit(OpCode::Pop);
	}

	/// A loop whose body runs at least once, repeating until the condition
	/// becomes truthy.
	fn do_statement(&mut self) {
		let loop_start = self.chunk().len();
		self.statement();

		self.consume(TokenKind::KeywordUntil, "Expect 'until' after loop body.");
		self.consume(TokenKind::OpenParen, "Expect '(' after 'until'.");
		self.expression();
		self.consume(TokenKind::CloseParen, "Expect ')' after condition.");
		self.consume(TokenKind::SemiColon, "Expect ';' after do loop.");

		self.emit(OpCode::Not);
		let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
		self.emit(OpCode::Pop);
		self.emit_loop(loop_start);

		self.patch_jump(exit_jump);
		self.emit(OpCode::Pop);
	}

	fn for_statement(&mut self) {
		self.begin_scope();
		self.consume(TokenKind::OpenParen, "Expect '(' after 'for'.");
		match self.current.kind {
			TokenKind::SemiColon => self.advance(),
			TokenKind::KeywordVar => {self.advance(); self.var_declaration()},
			_ => self.expression_statement()
		}

		let mut loop_start = self.chunk().len();
		let mut exit_jump = None;
		if !self.eat(TokenKind::SemiColon) {
			self.expression();
			self.consume(TokenKind::SemiColon, "Expect ';' after loop condition.");
			exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
			self.emit(OpCode::Pop);
		}

		if !self.eat(TokenKind::CloseParen) {
			let body_jump = self.emit_jump(OpCode::Jump);
			let increment_start = self.chunk().len();
			self.expression();
			self.emit(OpCode::Pop);
			self.consume(TokenKind::CloseParen, "Expect ')' after for clauses.");

			self.emit_loop(loop_start);
			loop_start = increment_start;
			self.patch_jump(body_jump);
		}

		self.statement();
		self.emit_loop(loop_start);

		if let Some(exit_jump) = exit_jump {
			self.patch_jump(exit_jump);
			self.emit(OpCode::Pop);
		}
		self.end_scope();
	}

	fn return_statement(&mut self) {
		if self.context.kind == FunctionKind::Script
			{self.error("Can't return from top-level code.")}

		match self.eat(TokenKind::SemiColon) {
			true => {self.emit(OpCode::Null); self.emit(OpCode::Return)},
			false => {
				self.expression();
				self.consume(TokenKind::SemiColon, "Expect ';' after return value.");
				self.emit(OpCode::Return);
			}
		}
	}
}

/// Expressions.
impl<'s, 'h> Compiler<'s, 'h> {
	fn rule(kind: TokenKind) -> ParseRule<'s, 'h> {
		match kind {
			TokenKind::OpenParen => rule!(Some(Self::grouping), Some(Self::call), Call),
			TokenKind::OpenCurly => rule!(Some(Self::map), None, None),
			TokenKind::OpenBracket => rule!(Some(Self::list), Some(Self::index), Call),
			TokenKind::Period => rule!(None, Some(Self::dot), Call),
			TokenKind::Minus => rule!(Some(Self::unary), Some(Self::binary), Term),
			TokenKind::Plus => rule!(None, Some(Self::binary), Term),
			TokenKind::Slash | TokenKind::Star =>
				rule!(None, Some(Self::binary), Factor),
			TokenKind::Bang => rule!(Some(Self::unary), None, None),
			TokenKind::BangEqual | TokenKind::Equal =>
				rule!(None, Some(Self::binary), Equality),
			TokenKind::Greater | TokenKind::GreaterEqual | TokenKind::Less |
				TokenKind::LessEqual => rule!(None, Some(Self::binary), Comparison),
			TokenKind::Identifier => rule!(Some(Self::variable), None, None),
			TokenKind::String => rule!(Some(Self::string), None, None),
			TokenKind::Integer => rule!(Some(Self::integer), None, None),
			TokenKind::Number => rule!(Some(Self::number), None, None),
			TokenKind::KeywordAnd => rule!(None, Some(Self::and), And),
			TokenKind::KeywordOr => rule!(None, Some(Self::or), Or),
			TokenKind::KeywordFalse | TokenKind::KeywordTrue |
				TokenKind::KeywordNull => rule!(Some(Self::literal), None, None),
			TokenKind::KeywordFun => rule!(Some(Self::lambda), None, None),
			TokenKind::KeywordThis | TokenKind::KeywordSuper =>
				rule!(Some(Self::unsupported), None, None),
			_ => rule!(None, None, None)
		}
	}

	fn expression(&mut self) {
		self.parse_precedence(Precedence::Assignment)
	}

	fn parse_precedence(&mut self, precedence: Precedence) {
		self.advance();
		let prefix = match Self::rule(self.previous.kind).prefix {
			Some(prefix) => prefix,
			None => return self.error("Expect expression.")
		};

		let can_assign = precedence <= Precedence::Assignment;
		prefix(self, can_assign);

		while precedence <= Self::rule(self.current.kind).precedence {
			self.advance();
			if let Some(infix) = Self::rule(self.previous.kind).infix
				{infix(self, can_assign)}
		}

		if can_assign && self.eat(TokenKind::Assign)
			{self.error("Invalid assignment target.")}
	}

	fn grouping(&mut self, _: bool) {
		self.expression();
		self.consume(TokenKind::CloseParen, "Expect ')' after expression.");
	}

	fn integer(&mut self, _: bool) {
		let lexeme = self.previous.lexeme;
		let integer = match lexeme.get(..2) {
			Some("0x" | "0X") => u64::from_str_radix(&lexeme[2..], 16)
				.map(|integer| integer as i64).ok(),
			_ => lexeme.parse::<i64>().ok()
		};

		match integer {
			Some(integer) => self.emit_constant(Value::Integer(integer)),
			None => self.error("Integer literal too large.")
		}
	}

	fn number(&mut self, _: bool) {
		match self.previous.lexeme.parse::<f64>() {
			Ok(number) => self.emit_constant(Value::Number(number)),
			Err(_) => self.error("Invalid number literal.")
		}
	}

	fn string(&mut self, _: bool) {
		let lexeme = self.previous.lexeme;
		match unescape(&lexeme[1..lexeme.len() - 1]) {
			Ok(text) => {
				let string = self.heap.intern(&text);
				self.emit_constant(Value::Object(string));
			},
			Err(message) => self.error(message)
		}
	}

	fn literal(&mut self, _: bool) {
		match self.previous.kind {
			TokenKind::KeywordFalse => self.emit(OpCode::False),
			TokenKind::KeywordTrue => self.emit(OpCode::True),
			_ => self.emit(OpCode::Null)
		}
	}

	fn variable(&mut self, can_assign: bool) {
		self.named_variable(self.previous, can_assign)
	}

	fn unary(&mut self, _: bool) {
		let operator = self.previous.kind;
		self.parse_precedence(Precedence::Unary);

		match operator {
			TokenKind::Minus => self.emit(OpCode::Negate),
			_ => self.emit(OpCode::Not)
		}
	}

	fn binary(&mut self, _: bool) {
		let operator = self.previous.kind;
		self.parse_precedence(Self::rule(operator).precedence.next());

		match operator {
			// Relational
			TokenKind::BangEqual => {self.emit(OpCode::Equal); self.emit(OpCode::Not)},
			TokenKind::Equal => self.emit(OpCode::Equal),
			TokenKind::Greater => {self.emit(OpCode::LessEqual); self.emit(OpCode::Not)},
			TokenKind::GreaterEqual => {self.emit(OpCode::Less); self.emit(OpCode::Not)},
			TokenKind::Less => self.emit(OpCode::Less),
			TokenKind::LessEqual => self.emit(OpCode::LessEqual),

			// Arithmetic
			TokenKind::Plus => self.emit(OpCode::Add),
			TokenKind::Minus => self.emit(OpCode::Subtract),
			TokenKind::Star => self.emit(OpCode::Multiply),
			_ => self.emit(OpCode::Divide)
		}
	}

	fn and(&mut self, _: bool) {
		let end_jump = self.emit_jump(OpCode::JumpIfFalse);
		self.emit(OpCode::Pop);
		self.parse_precedence(Precedence::And);
		self.patch_jump(end_jump);
	}

	fn or(&mut self, _: bool) {
		let else_jump = self.emit_jump(OpCode::JumpIfFalse);
		let end_jump = self.emit_jump(OpCode::Jump);

		self.patch_jump(else_jump);
		self.emit(OpCode::Pop);
		self.parse_precedence(Precedence::Or);
		self.patch_jump(end_jump);
	}

	fn call(&mut self, _: bool) {
		let mut count = 0;
		if !self.check(TokenKind::CloseParen) {
			loop {
				self.expression();
				match count {
					MAX_ARGUMENTS => self.error("Can't have more than 32 arguments."),
					_ => count += 1
				}
				if !self.eat(TokenKind::Comma) {break}
			}
		}
		self.consume(TokenKind::CloseParen, "Expect ')' after arguments.");

		self.emit_with(OpCode::Call, count as u8);
	}

	fn dot(&mut self, can_assign: bool) {
		self.consume(TokenKind::Identifier, "Expect property name after '.'.");
		let name = self.identifier_constant(Cow::Borrowed(self.previous.lexeme));

		match can_assign && self.eat(TokenKind::Assign) {
			true => {self.expression(); self.emit_with(OpCode::SetField, name)},
			false => self.emit_with(OpCode::GetField, name)
		}
	}

	fn index(&mut self, can_assign: bool) {
		self.expression();
		self.consume(TokenKind::CloseBracket, "Expect ']' after index.");

		match can_assign && self.eat(TokenKind::Assign) {
			true => {self.expression(); self.emit(OpCode::SetIndex)},
			false => self.emit(OpCode::GetIndex)
		}
	}

	/// Compiles comma separated items up to `close`, allowing a trailing comma.
	/// Returns the number of items compiled.
	fn items(&mut self, close: TokenKind, mut item: impl FnMut(&mut Self))
			-> usize {
		let mut count = 0;
		while !self.check(close) && !self.check(TokenKind::Eof) {
			item(self);
			count += 1;
			if !self.eat(TokenKind::Comma) {break}
		}
		count
	}

	fn map(&mut self, _: bool) {
		let count = self.items(TokenKind::CloseCurly, |compiler| {
			compiler.expression();
			compiler.consume(TokenKind::Colon, "Expect ':' after map key.");
			compiler.expression();
		});
		self.consume(TokenKind::CloseCurly, "Expect '}' after map entries.");

		match u8::try_from(count) {
			Ok(count) => self.emit_with(OpCode::Map, count),
			Err(_) => self.error("Too many entries in map literal.")
		}
	}

	fn list(&mut self, _: bool) {
		let count = self.items(TokenKind::CloseBracket, Self::expression);
		self.consume(TokenKind::CloseBracket, "Expect ']' after list elements.");

		match u8::try_from(count) {
			Ok(count) => self.emit_with(OpCode::List, count),
			Err(_) => self.error("Too many elements in list literal.")
		}
	}

	fn lambda(&mut self, _: bool) {
		self.function(FunctionKind::Function, Cow::Borrowed("anonymous"))
	}

	fn unsupported(&mut self, _: bool) {
		self.error("'this' and 'super' are not supported.")
	}
}
