//! This file mainly just runs different build scripts for integration tests.

use self::tests::expected_output;

pub mod tests {
	use std::env::{current_dir, var};

	pub mod expected_output {
		include!("./tests/expected_output/build.rs");
	}

	pub fn expected_output() {
		let build = var("OUT_DIR").unwrap();
		let current = current_dir().unwrap().join("tests/expected_output/");
		expected_output::build(&current, build.as_ref());
	}
}

fn main() {
	expected_output();
}
