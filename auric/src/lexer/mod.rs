
use super::Options;
use std::fmt::{Display, Formatter, Result as FMTResult};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TokenKind {
	// Sectioning
	OpenParen,
	CloseParen,
	OpenCurly,
	CloseCurly,
	OpenBracket,
	CloseBracket,

	// Other
	Comma,
	Period,
	SemiColon,
	Colon,

	// Arithmetic
	Minus,
	Plus,
	Slash,
	Star,

	// Relational
	Bang,
	BangEqual,
	Assign,
	Equal,
	Greater,
	GreaterEqual,
	Less,
	LessEqual,

	// Literals
	Identifier,
	String,
	Integer,
	Number,

	// Keywords
	KeywordAnd,
	KeywordClass,
	KeywordDo,
	KeywordElse,
	KeywordFalse,
	KeywordFor,
	KeywordFun,
	KeywordIf,
	KeywordNull,
	KeywordOr,
	KeywordPrint,
	KeywordPuts,
	KeywordReturn,
	KeywordSuper,
	KeywordThis,
	KeywordTrue,
	KeywordUntil,
	KeywordVar,
	KeywordWhile,

	/// The lexeme of an error token is its message.
	Error,
	Eof
}

impl TokenKind {
	/// Looks up the keyword spelled by `word`, if it is one.
	pub fn keyword(word: &str) -> Option<Self> {
		Some(match word {
			"and" => Self::KeywordAnd,
			"class" => Self::KeywordClass,
			"do" => Self::KeywordDo,
			"else" => Self::KeywordElse,
			"false" => Self::KeywordFalse,
			"for" => Self::KeywordFor,
			"fun" => Self::KeywordFun,
			"if" => Self::KeywordIf,
			"null" => Self::KeywordNull,
			"or" => Self::KeywordOr,
			"print" => Self::KeywordPrint,
			"puts" => Self::KeywordPuts,
			"return" => Self::KeywordReturn,
			"super" => Self::KeywordSuper,
			"this" => Self::KeywordThis,
			"true" => Self::KeywordTrue,
			"until" => Self::KeywordUntil,
			"var" => Self::KeywordVar,
			"while" => Self::KeywordWhile,
			_ => return None
		})
	}
}

impl Display for TokenKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> FMTResult {
		write!(f, "{}", match self {
			Self::OpenParen => "(",
			Self::CloseParen => ")",
			Self::OpenCurly => "{",
			Self::CloseCurly => "}",
			Self::OpenBracket => "[",
			Self::CloseBracket => "]",
			Self::Comma => ",",
			Self::Period => ".",
			Self::SemiColon => ";",
			Self::Colon => ":",
			Self::Minus => "-",
			Self::Plus => "+",
			Self::Slash => "/",
			Self::Star => "*",
			Self::Bang => "!",
			Self::BangEqual => "!=",
			Self::Assign => "=",
			Self::Equal => "==",
			Self::Greater => ">",
			Self::GreaterEqual => ">=",
			Self::Less => "<",
			Self::LessEqual => "<=",
			Self::Identifier => "identifier",
			Self::String => "string",
			Self::Integer => "integer",
			Self::Number => "number",
			Self::KeywordAnd => "and",
			Self::KeywordClass => "class",
			Self::KeywordDo => "do",
			Self::KeywordElse => "else",
			Self::KeywordFalse => "false",
			Self::KeywordFor => "for",
			Self::KeywordFun => "fun",
			Self::KeywordIf => "if",
			Self::KeywordNull => "null",
			Self::KeywordOr => "or",
			Self::KeywordPrint => "print",
			Self::KeywordPuts => "puts",
			Self::KeywordReturn => "return",
			Self::KeywordSuper => "super",
			Self::KeywordThis => "this",
			Self::KeywordTrue => "true",
			Self::KeywordUntil => "until",
			Self::KeywordVar => "var",
			Self::KeywordWhile => "while",
			Self::Error => "error",
			Self::Eof => "end of file"
		})
	}
}

/// A single token, borrowing its lexeme from the source text.
///
/// Lines and columns are 1-based. For [`TokenKind::Error`] tokens the lexeme
/// holds the error message rather than source text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Token<'s> {
	pub kind: TokenKind,
	pub lexeme: &'s str,
	pub line: u32,
	pub column: u32
}

impl<'s> Token<'s> {
	/// A placeholder token, used before the first token has been scanned.
	pub fn synthetic(lexeme: &'s str) -> Self {
		Self {kind: TokenKind::Eof, lexeme, line: 0, column: 0}
	}
}

impl<'s> Display for Token<'s> {
	fn fmt(&self, f: &mut Formatter<'_>) -> FMTResult {
		write!(f, "{:>4}:{:<3} {:<12} {}", self.line, self.column,
			format!("{:?}", self.kind), self.lexeme)
	}
}

/// Tokenizes source text on demand, one token at a time.
///
/// The Lexer can be iterated over, producing [`Token`]s. Iteration ends after
/// the [`TokenKind::Eof`] token has been produced. Errors never stop the
/// lexer, they are reported as [`TokenKind::Error`] tokens and scanning
/// continues after the offending text.
///
/// Examples
/// --------
/// Below is an example of scanning one line.
/// ```rust
/// # use auric::{Options, lexer::{Lexer, TokenKind}};
/// let options = Options::default();
/// let kinds = Lexer::new("print 'hi';", &options)
/// 	.map(|token| token.kind).collect::<Vec<_>>();
///
/// assert_eq!(kinds, [TokenKind::KeywordPrint, TokenKind::String,
/// 	TokenKind::SemiColon, TokenKind::Eof]);
/// ```
pub struct Lexer<'s> {
	source: &'s str,
	start: usize,
	current: usize,
	line: u32,
	column: u32,
	start_line: u32,
	start_column: u32,
	ignore_case: bool,
	finished: bool
}

/// The private Lexer API.
///
/// Includes many convience methods for internal implementation.
impl<'s> Lexer<'s> {
	pub fn new(source: &'s str, options: &Options) -> Self {
		Self {
			source,
			start: 0,
			current: 0,
			line: 1,
			column: 1,
			start_line: 1,
			start_column: 1,
			ignore_case: options.ignore_case,
			finished: false
		}
	}

	/// Peeks the next character, if any.
	fn peek(&self) -> Option<char> {
		self.source[self.current..].chars().next()
	}

	/// Peeks the character after the next one, if any.
	fn peek_second(&self) -> Option<char> {
		let mut characters = self.source[self.current..].chars();
		characters.next();
		characters.next()
	}

	/// Eats a character, keeping the line and column up to date.
	fn eat(&mut self) {
		if let Some(character) = self.peek() {
			self.current += character.len_utf8();
			match character {
				'\n' => {self.line += 1; self.column = 1},
				'\t' => self.column += 4,
				_ => self.column += 1
			}
		}
	}

	/// Eats the next character if it is `expected`.
	fn eat_if(&mut self, expected: char) -> bool {
		match self.peek() {
			Some(character) if character == expected => {self.eat(); true},
			_ => false
		}
	}

	fn rest(&self) -> &'s str {
		&self.source[self.current..]
	}

	fn token(&self, kind: TokenKind) -> Token<'s> {
		Token {
			kind,
			lexeme: &self.source[self.start..self.current],
			line: self.start_line,
			column: self.start_column
		}
	}

	fn error(&self, message: &'static str) -> Token<'s> {
		Token {
			kind: TokenKind::Error,
			lexeme: message,
			line: self.start_line,
			column: self.start_column
		}
	}

	/// Parses and discards all whitespace and comments. Returns an error message
	/// if a block comment is never closed.
	fn parse_whitespace(&mut self) -> Result<(), &'static str> {
		loop {
			match self.peek() {
				Some(' ' | '\r' | '\t' | '\n') => self.eat(),
				Some('/') if self.peek_second() == Some('/') =>
					while !matches!(self.peek(), Some('\n') | None) {self.eat()},
				Some('#') if self.at_line_start() => match directive(self.rest()) {
					Some("cs" | "comments-start") => {
						self.start = self.current;
						self.start_line = self.line;
						self.start_column = self.column;
						self.parse_block_comment()?
					},
					_ => break Ok(())
				},
				_ => break Ok(())
			}
		}
	}

	/// Whether only whitespace precedes the current position on this line.
	fn at_line_start(&self) -> bool {
		self.source[..self.current].rsplit('\n').next()
			.map_or(true, |line| line.trim().is_empty())
	}

	/// Parses a block comment. Assumes the opening `#` *was not* consumed, and
	/// consumes everything through the closing directive's line.
	fn parse_block_comment(&mut self) -> Result<(), &'static str> {
		// Skip the opening directive itself.
		self.eat();
		loop {
			match self.peek() {
				None => break Err("Unterminated block comment."),
				Some('#') if self.at_line_start() => match directive(self.rest()) {
					Some(word @ ("ce" | "comments-end")) => {
						for _ in 0..=word.len() {self.eat()}
						// The rest of the closing line belongs to the comment.
						while !matches!(self.peek(), Some('\n') | None) {self.eat()}
						break Ok(())
					},
					_ => self.eat()
				},
				Some(_) => self.eat()
			}
		}
	}

	/// Parses an identifier or keyword. Assumes the first character *was*
	/// consumed.
	fn parse_identifier(&mut self) -> Token<'s> {
		while let Some('a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '$') = self.peek()
			{self.eat()}

		let word = &self.source[self.start..self.current];
		let keyword = match self.ignore_case {
			true => TokenKind::keyword(&word.to_ascii_lowercase()),
			false => TokenKind::keyword(word)
		};
		self.token(keyword.unwrap_or(TokenKind::Identifier))
	}

	/// Parses an integer or number. Assumes the first digit *was* consumed.
	fn parse_number(&mut self, first: char) -> Token<'s> {
		if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
			self.eat();
			if !matches!(self.peek(), Some(character) if character.is_ascii_hexdigit())
				{return self.error("Expect hexadecimal digit.")}
			while let Some(character) = self.peek() {
				match character {
					'0'..='9' | 'a'..='f' | 'A'..='F' => self.eat(),
					'g'..='z' | 'G'..='Z' | '_' => {
						self.eat();
						return self.error("Expect hexadecimal digit.")
					},
					_ => break
				}
			}
			return self.token(TokenKind::Integer)
		}

		while let Some('0'..='9') = self.peek() {self.eat()}
		match (self.peek(), self.peek_second()) {
			(Some('.'), Some('0'..='9')) => {
				self.eat();
				while let Some('0'..='9') = self.peek() {self.eat()}
				self.token(TokenKind::Number)
			},
			_ => self.token(TokenKind::Integer)
		}
	}

	/// Parses a string. Assumes the opening quote *was* consumed. Escaped
	/// delimiters do not end the string, escape codes themselves are decoded by
	/// the compiler.
	fn parse_string(&mut self, delimiter: char) -> Token<'s> {
		loop {
			match self.peek() {
				None => break self.error("Unterminated string."),
				Some('\\') => {self.eat(); self.eat()},
				Some(character) if character == delimiter =>
					{self.eat(); break self.token(TokenKind::String)},
				Some(_) => self.eat()
			}
		}
	}

	/// Scans the next token. Once the source is exhausted, this returns
	/// [`TokenKind::Eof`] tokens forever.
	pub fn scan_token(&mut self) -> Token<'s> {
		if let Err(message) = self.parse_whitespace() {return self.error(message)}

		self.start = self.current;
		self.start_line = self.line;
		self.start_column = self.column;

		let character = match self.peek() {
			Some(character) => {self.eat(); character},
			None => return self.token(TokenKind::Eof)
		};

		match character {
			// Sectioning
			'(' => self.token(TokenKind::OpenParen),
			')' => self.token(TokenKind::CloseParen),
			'{' => self.token(TokenKind::OpenCurly),
			'}' => self.token(TokenKind::CloseCurly),
			'[' => self.token(TokenKind::OpenBracket),
			']' => self.token(TokenKind::CloseBracket),

			// Other
			',' => self.token(TokenKind::Comma),
			'.' => self.token(TokenKind::Period),
			';' => self.token(TokenKind::SemiColon),
			':' => self.token(TokenKind::Colon),

			// Arithmetic
			'-' => self.token(TokenKind::Minus),
			'+' => self.token(TokenKind::Plus),
			'/' => self.token(TokenKind::Slash),
			'*' => self.token(TokenKind::Star),

			// Relational, each a single or double character token
			'!' => match self.eat_if('=') {
				true => self.token(TokenKind::BangEqual),
				false => self.token(TokenKind::Bang)
			},
			'=' => match self.eat_if('=') {
				true => self.token(TokenKind::Equal),
				false => self.token(TokenKind::Assign)
			},
			'>' => match self.eat_if('=') {
				true => self.token(TokenKind::GreaterEqual),
				false => self.token(TokenKind::Greater)
			},
			'<' => match self.eat_if('=') {
				true => self.token(TokenKind::LessEqual),
				false => self.token(TokenKind::Less)
			},

			// Literals
			'"' | '\'' => self.parse_string(character),
			'0'..='9' => self.parse_number(character),
			'a'..='z' | 'A'..='Z' | '_' | '$' => self.parse_identifier(),

			_ => self.error("Unexpected character.")
		}
	}
}

/// The main interface to the Lexer.
impl<'s> Iterator for Lexer<'s> {
	type Item = Token<'s>;

	/// Scans a single token and returns it.
	///
	/// After the [`TokenKind::Eof`] token has been returned once, this will
	/// return `None` from thenforth.
	fn next(&mut self) -> Option<Token<'s>> {
		match self.finished {
			true => None,
			false => {
				let token = self.scan_token();
				self.finished = token.kind == TokenKind::Eof;
				Some(token)
			}
		}
	}
}

/// Reads the directive word following a `#`, such as `cs` in `#cs`.
fn directive(text: &str) -> Option<&str> {
	let text = text.strip_prefix('#')?;
	let end = text.find(|character: char| !matches!(character,
		'a'..='z' | 'A'..='Z' | '-')).unwrap_or(text.len());
	let word = &text[..end];
	match word.to_ascii_lowercase().as_str() {
		"cs" => Some("cs"),
		"ce" => Some("ce"),
		"comments-start" => Some("comments-start"),
		"comments-end" => Some("comments-end"),
		_ => None
	}
}
