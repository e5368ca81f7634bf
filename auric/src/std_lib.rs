//! A small library of natives hosts may opt into.
use self::super::vm::{object::ObjectKind, Value, VirtualMachine};
use std::time::{SystemTime, UNIX_EPOCH};

/// `clock()`, the seconds since the Unix epoch.
pub fn clock(vm: &mut VirtualMachine, _: usize) -> Result<(), String> {
	let seconds = SystemTime::now().duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_secs_f64())
		.map_err(|error| format!("{}", error))?;
	vm.push(Value::Number(seconds))
}

/// `len(value)`, the characters in a string or the entries in a map.
pub fn len(vm: &mut VirtualMachine, _: usize) -> Result<(), String> {
	let value = vm.pop()?;
	let length = match value.as_object().and_then(|object| vm.heap().kind(object)) {
		Some(ObjectKind::String(string)) => string.text.chars().count(),
		Some(ObjectKind::Map(map)) => map.len(),
		_ => return Err(format!("Can't take the length of a {}.",
			vm.heap().type_name(value)))
	};
	vm.push(Value::Integer(length as i64))
}

/// `typeof(value)`, the name of a value's type.
pub fn r#typeof(vm: &mut VirtualMachine, _: usize) -> Result<(), String> {
	let value = vm.pop()?;
	let name = vm.heap().type_name(value);
	let name = vm.new_string(name);
	vm.push(name)
}

/// `str(value)`, a value rendered the way `print` shows it.
pub fn str(vm: &mut VirtualMachine, _: usize) -> Result<(), String> {
	let value = vm.pop()?;
	let text = vm.display(value);
	let text = vm.new_string(&text);
	vm.push(text)
}

/// `keys(map)`, a list of a map's keys in insertion order.
pub fn keys(vm: &mut VirtualMachine, _: usize) -> Result<(), String> {
	let map = vm.pop()?;
	let keys = match map.as_object().and_then(|map| vm.heap().map(map)) {
		Some(map) => map.keys().to_vec(),
		None => return Err(format!("Can't take the keys of a {}.",
			vm.heap().type_name(map)))
	};
	let keys = vm.new_list(&keys);
	vm.push(keys)
}

/// `help(native)`, the documentation of a native, or null for anything else.
pub fn help(vm: &mut VirtualMachine, _: usize) -> Result<(), String> {
	let value = vm.pop()?;
	let doc = value.as_object().and_then(|native| vm.heap().native(native))
		.map(|native| native.doc);
	let doc = match doc {
		Some(doc) => vm.new_string(doc),
		None => Value::Null
	};
	vm.push(doc)
}

/// Defines every native in this module as a global.
pub fn define_standard_natives(vm: &mut VirtualMachine) {
	vm.define_native("clock", clock, Some(0),
		"clock() -> the seconds since the Unix epoch");
	vm.define_native("len", len, Some(1),
		"len(value) -> the characters in a string, or the entries in a map");
	vm.define_native("typeof", r#typeof, Some(1),
		"typeof(value) -> the name of the value's type");
	vm.define_native("str", str, Some(1),
		"str(value) -> the value as printed");
	vm.define_native("keys", keys, Some(1),
		"keys(map) -> a list of the map's keys, in insertion order");
	vm.define_native("help", help, Some(1),
		"help(native) -> the documentation of a native");
}
