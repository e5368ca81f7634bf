use self::super::handle_io;
use auric::{vm::VirtualMachine, Error};
use std::io::{BufRead, Write, stdin, stdout};

/// Reads and runs lines until end of input. Source that merely ended too
/// early keeps reading continuation lines before it is run.
pub fn repl(mut vm: VirtualMachine) {
	loop {
		let mut code = String::new();

		loop {
			{
				let mut stdout = stdout().lock();
				let prompt: &[u8] = if code.is_empty() {b"> "} else {b">> "};
				handle_io(stdout.write_all(prompt));
				handle_io(stdout.flush());
			}

			let mut line = String::with_capacity(80);
			if handle_io(stdin().lock().read_line(&mut line)) == 0 {
				println!();
				return
			}
			code.push_str(&line);

			match vm.run(&code) {
				Err(Error::Compile(errors)) if errors.is_incomplete() => (),
				Err(error) => {eprintln!("{}", error); break},
				Ok(()) => break
			}
		}
	}
}
