//! The object heap.
//!
//! Objects live in a [`SlotMap`] arena and are referred to by generation
//! checked [`ObjRef`] handles, so a handle to a collected object can never
//! alias a newer one. The heap knows how to mark, trace and sweep, but not
//! what the roots are. That is the [virtual machine's](super::gc) job, as it
//! alone owns the stack, call frames and globals.
use super::{
	object::{Closure, Function, Map, Native, Object, ObjectKind, StringObject, UpValue},
	table::{hash_scalar, hash_string, Table},
	value::{format_number, Value}
};
use crate::Options;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
	/// A handle to an object on the [`Heap`].
	pub struct ObjRef;
}

/// Totals kept across every collection a heap has run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GcStats {
	pub collections: usize,
	pub objects_freed: usize,
	pub bytes_freed: usize
}

#[derive(Debug)]
pub struct Heap {
	objects: SlotMap<ObjRef, Object>,
	/// The intern table. Keys are strings, values are unused.
	strings: Table,
	gray: Vec<ObjRef>,
	/// Values pinned by the host while it allocates.
	roots: Vec<Value>,
	/// Scratch space for tracing an object's references.
	children: Vec<Value>,
	allocated: usize,
	next_gc: usize,
	stress: bool,
	stats: GcStats
}

impl Heap {
	pub fn new(options: &Options) -> Self {
		Self {
			objects: SlotMap::with_key(),
			strings: Table::new(),
			gray: Vec::new(),
			roots: Vec::new(),
			children: Vec::new(),
			allocated: 0,
			next_gc: options.gc_initial_threshold,
			stress: options.gc_stress,
			stats: GcStats::default()
		}
	}

	/// The number of live objects.
	pub fn len(&self) -> usize {
		self.objects.len()
	}

	pub fn is_empty(&self) -> bool {
		self.objects.is_empty()
	}

	/// Bytes currently accounted to live objects.
	pub fn allocated(&self) -> usize {
		self.allocated
	}

	/// The allocation total that triggers the next collection.
	pub fn next_gc(&self) -> usize {
		self.next_gc
	}

	pub fn stats(&self) -> GcStats {
		self.stats
	}

	/// Whether the next allocation should be preceded by a collection.
	pub fn should_collect(&self) -> bool {
		self.stress || self.allocated > self.next_gc
	}

	/// Moves an object onto the heap. This never collects, callers that can
	/// enumerate the roots check [should_collect](Self::should_collect) first.
	pub fn allocate(&mut self, kind: ObjectKind) -> ObjRef {
		let object = Object::new(kind);
		self.allocated += object.size;
		self.objects.insert(object)
	}

	/// Re-measures an object that grew or shrank after it was allocated.
	pub fn account(&mut self, reference: ObjRef) {
		if let Some(object) = self.objects.get_mut(reference) {
			let size = object.kind.measure();
			self.allocated = self.allocated - object.size + size;
			object.size = size;
		}
	}

	/// Looks up an interned string by content.
	pub fn find_string(&self, text: &str) -> Option<ObjRef> {
		let hash = hash_string(text);
		let objects = &self.objects;
		self.strings.find_key(hash, |key| match key {
			Value::Object(reference) => matches!(objects.get(reference),
				Some(Object {kind: ObjectKind::String(string), ..})
					if &*string.text == text),
			_ => false
		}).and_then(|key| key.as_object())
	}

	/// Returns the interned string with this content, allocating it if needed.
	pub fn intern(&mut self, text: &str) -> ObjRef {
		if let Some(existing) = self.find_string(text) {return existing}

		let hash = hash_string(text);
		let string = StringObject {text: text.into(), hash};
		let reference = self.allocate(ObjectKind::String(string));
		self.strings.insert(Value::Object(reference), hash, Value::Null);
		reference
	}

	/// Pins a value so the next collections treat it as reachable.
	pub fn push_root(&mut self, value: Value) {
		self.roots.push(value);
	}

	pub fn pop_root(&mut self) -> Option<Value> {
		self.roots.pop()
	}

	pub fn root_count(&self) -> usize {
		self.roots.len()
	}

	/// Releases every pinned value past the first `count`.
	pub(crate) fn truncate_roots(&mut self, count: usize) {
		self.roots.truncate(count);
	}

	pub fn get(&self, reference: ObjRef) -> Option<&Object> {
		self.objects.get(reference)
	}

	pub fn kind(&self, reference: ObjRef) -> Option<&ObjectKind> {
		self.objects.get(reference).map(|object| &object.kind)
	}

	pub fn kind_mut(&mut self, reference: ObjRef) -> Option<&mut ObjectKind> {
		self.objects.get_mut(reference).map(|object| &mut object.kind)
	}

	pub fn string(&self, reference: ObjRef) -> Option<&StringObject> {
		match self.kind(reference)? {
			ObjectKind::String(string) => Some(string),
			_ => None
		}
	}

	pub fn function(&self, reference: ObjRef) -> Option<&Function> {
		match self.kind(reference)? {
			ObjectKind::Function(function) => Some(function),
			_ => None
		}
	}

	pub fn closure(&self, reference: ObjRef) -> Option<&Closure> {
		match self.kind(reference)? {
			ObjectKind::Closure(closure) => Some(closure),
			_ => None
		}
	}

	pub fn closure_mut(&mut self, reference: ObjRef) -> Option<&mut Closure> {
		match self.kind_mut(reference)? {
			ObjectKind::Closure(closure) => Some(closure),
			_ => None
		}
	}

	pub fn up_value(&self, reference: ObjRef) -> Option<&UpValue> {
		match self.kind(reference)? {
			ObjectKind::UpValue(up_value) => Some(up_value),
			_ => None
		}
	}

	pub fn up_value_mut(&mut self, reference: ObjRef) -> Option<&mut UpValue> {
		match self.kind_mut(reference)? {
			ObjectKind::UpValue(up_value) => Some(up_value),
			_ => None
		}
	}

	pub fn map(&self, reference: ObjRef) -> Option<&Map> {
		match self.kind(reference)? {
			ObjectKind::Map(map) => Some(map),
			_ => None
		}
	}

	pub fn map_mut(&mut self, reference: ObjRef) -> Option<&mut Map> {
		match self.kind_mut(reference)? {
			ObjectKind::Map(map) => Some(map),
			_ => None
		}
	}

	pub fn native(&self, reference: ObjRef) -> Option<&Native> {
		match self.kind(reference)? {
			ObjectKind::Native(native) => Some(native),
			_ => None
		}
	}

	/// The text of a string value.
	pub fn str(&self, value: Value) -> Option<&str> {
		self.string(value.as_object()?).map(|string| &*string.text)
	}

	pub fn type_name(&self, value: Value) -> &'static str {
		match value {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Integer(_) => "integer",
			Value::Number(_) => "number",
			Value::Object(reference) => self.kind(reference)
				.map_or("null", ObjectKind::type_name)
		}
	}

	/// Script equality. Values of different types are never equal, and objects
	/// are equal only to themselves, except strings, which compare by content.
	pub fn values_equal(&self, left: Value, right: Value) -> bool {
		match (left, right) {
			(Value::Number(left), Value::Number(right)) => left == right,
			(Value::Object(left), Value::Object(right)) => left == right
				|| matches!((self.string(left), self.string(right)),
					(Some(left), Some(right)) if left.text == right.text),
			(left, right) => left.same(&right)
		}
	}

	/// Hashes a value for use as a map key.
	pub fn hash_key(&self, key: Value) -> Result<u32, String> {
		match key {
			Value::Null => Err("Map key can't be null.".to_owned()),
			Value::Object(reference) => match self.kind(reference) {
				Some(ObjectKind::String(string)) => Ok(string.hash),
				Some(_) => Ok(hash_scalar(Value::Integer(
					reference_bits(reference) as i64))),
				None => Err("Map key refers to a freed object.".to_owned())
			},
			scalar => Ok(hash_scalar(scalar))
		}
	}

	/// Renders a value the way `print` shows it.
	pub fn display(&self, value: Value) -> String {
		let mut text = String::new();
		self.write_value(&mut text, value, false, &mut Vec::new());
		text
	}

	fn write_value(&self, text: &mut String, value: Value, quote: bool,
			path: &mut Vec<ObjRef>) {
		let reference = match value {
			Value::Null => return text.push_str("null"),
			Value::Bool(boolean) => return text.push_str(match boolean {
				true => "true",
				false => "false"
			}),
			Value::Integer(integer) => return text.push_str(&integer.to_string()),
			Value::Number(number) => return text.push_str(&format_number(number)),
			Value::Object(reference) => reference
		};

		match self.kind(reference) {
			None => text.push_str("<freed>"),
			Some(ObjectKind::String(string)) if quote => {
				text.push('"');
				text.push_str(&string.text);
				text.push('"');
			},
			Some(ObjectKind::String(string)) => text.push_str(&string.text),
			Some(ObjectKind::Function(function)) =>
				self.write_function(text, function),
			Some(ObjectKind::Closure(closure)) => match self.function(closure.function) {
				Some(function) => self.write_function(text, function),
				None => text.push_str("<fn>")
			},
			Some(ObjectKind::UpValue(_)) => text.push_str("<upvalue>"),
			Some(ObjectKind::Native(native)) => {
				text.push_str("<native fn ");
				text.push_str(self.str(Value::Object(native.name)).unwrap_or("?"));
				text.push('>');
			},
			Some(ObjectKind::Map(_)) if path.contains(&reference) =>
				text.push_str("{...}"),
			Some(ObjectKind::Map(map)) => {
				path.push(reference);
				text.push('{');
				for (index, (key, value)) in map.iter().enumerate() {
					if index != 0 {text.push_str(", ")}
					self.write_value(text, key, true, path);
					text.push_str(": ");
					self.write_value(text, value, true, path);
				}
				text.push('}');
				path.pop();
			}
		}
	}

	fn write_function(&self, text: &mut String, function: &Function) {
		match function.name.and_then(|name| self.str(Value::Object(name))) {
			Some(name) => {
				text.push_str("<fn ");
				text.push_str(name);
				text.push('>');
			},
			None => text.push_str("<script>")
		}
	}

	/// Marks an object gray, if it is an unmarked object.
	pub(crate) fn mark_value(&mut self, value: Value) {
		if let Value::Object(reference) = value {self.mark_object(reference)}
	}

	pub(crate) fn mark_object(&mut self, reference: ObjRef) {
		if let Some(object) = self.objects.get_mut(reference) {
			if object.marked {return}
			object.marked = true;
			self.gray.push(reference);
		}
	}

	/// Marks the values the host pinned.
	pub(crate) fn mark_pinned(&mut self) {
		for index in 0..self.roots.len() {
			let value = self.roots[index];
			self.mark_value(value);
		}
	}

	/// Blackens gray objects until none are left.
	pub(crate) fn trace_references(&mut self) {
		while let Some(reference) = self.gray.pop() {
			if let Some(object) = self.objects.get(reference)
				{object.kind.trace(&mut self.children)}
			while let Some(child) = self.children.pop() {self.mark_value(child)}
		}
	}

	/// Drops unmarked strings from the intern table, before they are swept.
	pub(crate) fn remove_white_strings(&mut self) {
		let objects = &self.objects;
		self.strings.retain(|key, _| match key {
			Value::Object(reference) =>
				objects.get(reference).map_or(false, |object| object.marked),
			_ => false
		});
	}

	/// Frees every unmarked object, and clears the mark of every survivor.
	/// Returns the number of objects and bytes freed.
	pub(crate) fn sweep(&mut self) -> (usize, usize) {
		let (mut objects, mut bytes) = (0, 0);
		self.objects.retain(|_, object| match object.marked {
			true => {object.marked = false; true},
			false => {objects += 1; bytes += object.size; false}
		});

		self.allocated -= bytes;
		self.next_gc = self.allocated * 2;
		self.stats.collections += 1;
		self.stats.objects_freed += objects;
		self.stats.bytes_freed += bytes;
		(objects, bytes)
	}
}

/// A stable number for an object handle, used to hash objects by identity.
fn reference_bits(reference: ObjRef) -> u64 {
	use slotmap::Key;
	reference.data().as_ffi()
}
