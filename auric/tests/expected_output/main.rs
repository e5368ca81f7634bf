//! Runs every script in the scripts directory, comparing what it prints with
//! its `.out` file. The tests themselves are generated by `build.rs`.

include!(concat!(env!("OUT_DIR"), "/codegen/auric-tests-expected_output-main"));
