/// Knobs shared by the lexer, compiler, garbage collector and virtual
/// machine.
///
/// Example
/// -------
/// ```rust
/// # use auric::Options;
/// let options = Options {ignore_case: true, ..Options::default()};
/// assert_eq!(options.gc_initial_threshold, 512 * 1024);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Options {
	/// Match keywords and fold variable names without regard to case.
	pub ignore_case: bool,
	/// Bytes that may be allocated before the first collection runs.
	pub gc_initial_threshold: usize,
	/// Collect before every allocation the virtual machine makes.
	pub gc_stress: bool,
	/// Log every executed instruction and the operand stack at `trace` level.
	pub trace_execution: bool
}

impl Default for Options {
	fn default() -> Self {
		Self {
			ignore_case: false,
			gc_initial_threshold: 512 * 1024,
			gc_stress: false,
			trace_execution: false
		}
	}
}
