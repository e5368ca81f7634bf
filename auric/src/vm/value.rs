use super::heap::ObjRef;
use std::cmp::Ordering;

macro_rules! value_conversions {
	($($for:ty => $variant:ident),* $(,)?) => {$(
		impl From<$for> for Value {
			fn from(value: $for) -> Self {
				Self::$variant(value)
			}
		}
	)*}
}

/// A single script value. Values are small and [`Copy`], objects are referred
/// to by handle into the [heap](super::heap::Heap).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Integer(i64),
	Number(f64),
	Object(ObjRef)
}

value_conversions! {
	bool => Bool,
	i64 => Integer,
	f64 => Number,
	ObjRef => Object
}

impl Default for Value {
	fn default() -> Self {
		Self::Null
	}
}

impl Value {
	/// Whether this value counts as false in a condition. `null`, `false`, and
	/// both integer and floating point zero are falsey.
	///
	/// Example
	/// -------
	/// ```rust
	/// # use auric::vm::Value;
	/// assert!(Value::Integer(0).is_falsey());
	/// assert!(!Value::Number(0.5).is_falsey());
	/// ```
	pub fn is_falsey(&self) -> bool {
		match *self {
			Self::Null => true,
			Self::Bool(boolean) => !boolean,
			Self::Integer(integer) => integer == 0,
			Self::Number(number) => number == 0.0,
			Self::Object(_) => false
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	pub fn as_object(&self) -> Option<ObjRef> {
		match *self {
			Self::Object(object) => Some(object),
			_ => None
		}
	}

	/// Identity comparison, used for table keys. Unlike script equality this
	/// never looks at string contents, and NaN is the same as itself.
	pub fn same(&self, other: &Self) -> bool {
		match (*self, *other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(left), Self::Bool(right)) => left == right,
			(Self::Integer(left), Self::Integer(right)) => left == right,
			(Self::Number(left), Self::Number(right)) =>
				left == right || left.to_bits() == right.to_bits(),
			(Self::Object(left), Self::Object(right)) => left == right,
			_ => false
		}
	}

	/// Promotes this value for arithmetic. Booleans widen to integers.
	pub(crate) fn numeric(self) -> Option<Numeric> {
		match self {
			Self::Bool(boolean) => Some(Numeric::Integer(boolean as i64)),
			Self::Integer(integer) => Some(Numeric::Integer(integer)),
			Self::Number(number) => Some(Numeric::Number(number)),
			_ => None
		}
	}
}

/// A value that takes part in arithmetic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Numeric {
	Integer(i64),
	Number(f64)
}

impl Numeric {
	fn float(self) -> f64 {
		match self {
			Self::Integer(integer) => integer as f64,
			Self::Number(number) => number
		}
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Arithmetic {
	Add,
	Subtract,
	Multiply,
	Divide
}

/// Applies an arithmetic operation to a pair of promoted operands. Two
/// integers stay integers, wrapping on overflow, anything involving a floating
/// point number becomes one.
pub(crate) fn arithmetic(operation: Arithmetic, left: Numeric, right: Numeric)
		-> Result<Value, String> {
	Ok(match (left, right) {
		(Numeric::Integer(left), Numeric::Integer(right)) => Value::Integer(match operation {
			Arithmetic::Add => left.wrapping_add(right),
			Arithmetic::Subtract => left.wrapping_sub(right),
			Arithmetic::Multiply => left.wrapping_mul(right),
			Arithmetic::Divide if right == 0 =>
				return Err("Division by zero.".to_owned()),
			Arithmetic::Divide => left.wrapping_div(right)
		}),
		(left, right) => {
			let (left, right) = (left.float(), right.float());
			Value::Number(match operation {
				Arithmetic::Add => left + right,
				Arithmetic::Subtract => left - right,
				Arithmetic::Multiply => left * right,
				Arithmetic::Divide => left / right
			})
		}
	})
}

/// Orders a pair of promoted operands, or `None` if either is NaN.
pub(crate) fn compare(left: Numeric, right: Numeric) -> Option<Ordering> {
	match (left, right) {
		(Numeric::Integer(left), Numeric::Integer(right)) => Some(left.cmp(&right)),
		(left, right) => left.float().partial_cmp(&right.float())
	}
}

/// Formats a floating point number with up to 14 significant digits, choosing
/// between fixed and exponent notation the way C's `%.14g` does.
///
/// Example
/// -------
/// ```rust
/// # use auric::vm::value::format_number;
/// assert_eq!(format_number(0.1 + 0.2), "0.3");
/// assert_eq!(format_number(2.0), "2");
/// assert_eq!(format_number(1e20), "1e+20");
/// assert_eq!(format_number(0.00001), "1e-05");
/// ```
pub fn format_number(number: f64) -> String {
	const PRECISION: i32 = 14;

	if number.is_nan() {return "nan".to_owned()}
	if number.is_infinite() {
		return match number.is_sign_negative() {
			true => "-inf".to_owned(),
			false => "inf".to_owned()
		}
	}
	if number == 0.0 {
		return match number.is_sign_negative() {
			true => "-0".to_owned(),
			false => "0".to_owned()
		}
	}

	// Round to the precision first, the exponent may change by rounding.
	let scientific = format!("{:.*e}", (PRECISION - 1) as usize, number);
	let (mantissa, exponent) = match scientific.split_once('e') {
		Some(parts) => parts,
		None => return scientific
	};
	let exponent: i32 = exponent.parse().unwrap_or(0);

	if exponent < -4 || exponent >= PRECISION {
		let mantissa = trim_fraction(mantissa);
		let sign = if exponent < 0 {'-'} else {'+'};
		format!("{}e{}{:02}", mantissa, sign, exponent.abs())
	} else {
		let decimals = (PRECISION - 1 - exponent) as usize;
		trim_fraction(&format!("{:.*}", decimals, number)).to_owned()
	}
}

/// Removes trailing zeros after a decimal point, and the point itself if
/// nothing is left after it.
fn trim_fraction(text: &str) -> &str {
	match text.contains('.') {
		true => text.trim_end_matches('0').trim_end_matches('.'),
		false => text
	}
}
