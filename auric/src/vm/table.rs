//! An open addressing hash table keyed by [`Value`]s.
//!
//! The table never hashes keys itself. Callers pass the key's hash in, which
//! lets string keys reuse the hash cached in the string object, and keeps the
//! table free of any reference to the heap. Key equality is identity
//! ([`Value::same`]), which is correct for strings because they are interned.
use super::value::Value;
use std::mem::{replace, size_of};

const MIN_CAPACITY: usize = 8;

/// Hashes text with 32-bit FNV-1a. String contents are always case
/// sensitive; case folding happens on variable names in the compiler.
///
/// Example
/// -------
/// ```rust
/// # use auric::vm::table::hash_string;
/// assert_eq!(hash_string(""), 2166136261);
/// assert_ne!(hash_string("Total"), hash_string("total"));
/// ```
pub fn hash_string(text: &str) -> u32 {
	text.bytes().fold(2166136261u32, |hash, byte| (hash ^ byte as u32).wrapping_mul(16777619))
}

/// Hashes a scalar key. Integers and floating point numbers with the same
/// value hash differently, as they are never equal.
pub fn hash_scalar(value: Value) -> u32 {
	let bits = match value {
		Value::Null => 0,
		Value::Bool(boolean) => boolean as u64 + 1,
		Value::Integer(integer) => integer as u64,
		// Negative zero is the same key as zero.
		Value::Number(number) if number == 0.0 => 0x7ff8_0000_0000_0001,
		Value::Number(number) => number.to_bits().rotate_left(17),
		Value::Object(_) => 0
	};
	let mixed = bits ^ (bits >> 33);
	let mixed = mixed.wrapping_mul(0xff51_afd7_ed55_8ccd);
	(mixed ^ (mixed >> 33)) as u32
}

#[derive(Clone, Copy, Debug)]
enum Entry {
	Vacant,
	Tombstone,
	Occupied {key: Value, hash: u32, value: Value}
}

#[derive(Clone, Debug, Default)]
pub struct Table {
	entries: Vec<Entry>,
	/// Occupied entries plus tombstones, as both lengthen probe sequences.
	used: usize,
	live: usize
}

impl Table {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.live
	}

	pub fn is_empty(&self) -> bool {
		self.live == 0
	}

	pub fn capacity(&self) -> usize {
		self.entries.len()
	}

	/// The bytes owned by this table's entry array.
	pub fn memory_size(&self) -> usize {
		self.entries.capacity() * size_of::<Entry>()
	}

	/// Finds the slot holding `key`, or the slot it should be inserted into.
	/// Tombstones are reused for insertion, but do not end the search. The
	/// table must have at least one vacant slot.
	fn slot(entries: &[Entry], key: Value, hash: u32) -> usize {
		let mask = entries.len() - 1;
		let mut index = hash as usize & mask;
		let mut tombstone = None;

		loop {
			match entries[index] {
				Entry::Vacant => break tombstone.unwrap_or(index),
				Entry::Tombstone => {tombstone.get_or_insert(index);},
				Entry::Occupied {key: existing, ..} if existing.same(&key) =>
					break index,
				Entry::Occupied {..} => ()
			}
			index = (index + 1) & mask;
		}
	}

	pub fn get(&self, key: Value, hash: u32) -> Option<Value> {
		if self.entries.is_empty() {return None}
		match self.entries[Self::slot(&self.entries, key, hash)] {
			Entry::Occupied {value, ..} => Some(value),
			_ => None
		}
	}

	pub fn contains_key(&self, key: Value, hash: u32) -> bool {
		self.get(key, hash).is_some()
	}

	/// Inserts or overwrites a key, returning true if the key is new.
	pub fn insert(&mut self, key: Value, hash: u32, value: Value) -> bool {
		if (self.used + 1) * 4 > self.entries.len() * 3 {self.grow()}

		let index = Self::slot(&self.entries, key, hash);
		let new = Entry::Occupied {key, hash, value};
		match replace(&mut self.entries[index], new) {
			Entry::Occupied {..} => false,
			Entry::Tombstone => {self.live += 1; true},
			Entry::Vacant => {self.live += 1; self.used += 1; true}
		}
	}

	/// Removes a key, leaving a tombstone behind. Returns the removed value.
	pub fn remove(&mut self, key: Value, hash: u32) -> Option<Value> {
		if self.entries.is_empty() {return None}
		let index = Self::slot(&self.entries, key, hash);
		match self.entries[index] {
			Entry::Occupied {value, ..} => {
				self.entries[index] = Entry::Tombstone;
				self.live -= 1;
				Some(value)
			},
			_ => None
		}
	}

	/// Finds a key with the given hash satisfying `matches`. This is how strings
	/// are looked up by content before they are interned.
	pub fn find_key(&self, hash: u32, mut matches: impl FnMut(Value) -> bool)
			-> Option<Value> {
		if self.entries.is_empty() {return None}
		let mask = self.entries.len() - 1;
		let mut index = hash as usize & mask;

		loop {
			match self.entries[index] {
				Entry::Vacant => break None,
				Entry::Occupied {key, hash: existing, ..}
					if existing == hash && matches(key) => break Some(key),
				_ => ()
			}
			index = (index + 1) & mask;
		}
	}

	/// Iterates over every key and value, in no particular order.
	pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
		self.entries.iter().filter_map(|entry| match *entry {
			Entry::Occupied {key, value, ..} => Some((key, value)),
			_ => None
		})
	}

	/// Removes every entry for which `keep` returns false.
	pub fn retain(&mut self, mut keep: impl FnMut(Value, Value) -> bool) {
		for entry in self.entries.iter_mut() {
			if let Entry::Occupied {key, value, ..} = *entry {
				if !keep(key, value) {
					*entry = Entry::Tombstone;
					self.live -= 1;
				}
			}
		}
	}

	/// Doubles the capacity, dropping tombstones along the way.
	fn grow(&mut self) {
		let capacity = (self.entries.len() * 2).max(MIN_CAPACITY);
		let old = replace(&mut self.entries, vec![Entry::Vacant; capacity]);

		for entry in old {
			if let Entry::Occupied {key, hash, ..} = entry {
				let index = Self::slot(&self.entries, key, hash);
				self.entries[index] = entry;
			}
		}
		self.used = self.live;
	}
}

#[cfg(test)]
mod tests {
	use super::{hash_scalar, hash_string, Table};
	use crate::vm::value::Value;

	fn key(integer: i64) -> (Value, u32) {
		let value = Value::Integer(integer);
		(value, hash_scalar(value))
	}

	#[test]
	fn insert_get_overwrite() {
		let mut table = Table::new();
		let (one, hash) = key(1);

		assert!(table.insert(one, hash, Value::Bool(true)));
		assert!(!table.insert(one, hash, Value::Bool(false)));
		assert_eq!(table.get(one, hash), Some(Value::Bool(false)));
		assert_eq!(table.len(), 1);

		let (two, hash) = key(2);
		assert_eq!(table.get(two, hash), None);
	}

	#[test]
	fn grows_past_load_factor() {
		let mut table = Table::new();
		for integer in 0..100 {
			let (key, hash) = key(integer);
			table.insert(key, hash, Value::Integer(integer * 2));
		}

		assert_eq!(table.len(), 100);
		assert!(table.capacity() >= 128);
		assert!(table.capacity().is_power_of_two());
		for integer in 0..100 {
			let (key, hash) = key(integer);
			assert_eq!(table.get(key, hash), Some(Value::Integer(integer * 2)));
		}
	}

	#[test]
	fn tombstones_keep_probe_chains_intact() {
		let mut table = Table::new();
		// Every key collides.
		for integer in 0..5 {
			table.insert(Value::Integer(integer), 7, Value::Integer(integer));
		}

		assert_eq!(table.remove(Value::Integer(1), 7), Some(Value::Integer(1)));
		assert_eq!(table.remove(Value::Integer(1), 7), None);
		assert_eq!(table.get(Value::Integer(4), 7), Some(Value::Integer(4)));
		assert_eq!(table.len(), 4);

		// The tombstone is reused.
		let capacity = table.capacity();
		assert!(table.insert(Value::Integer(9), 7, Value::Null));
		assert_eq!(table.capacity(), capacity);
		assert_eq!(table.len(), 5);
	}

	#[test]
	fn numbers_and_integers_are_distinct_keys() {
		let mut table = Table::new();
		let integer = Value::Integer(1);
		let number = Value::Number(1.0);
		table.insert(integer, hash_scalar(integer), Value::Bool(true));

		assert_eq!(table.get(number, hash_scalar(number)), None);
		assert_eq!(hash_scalar(Value::Number(0.0)), hash_scalar(Value::Number(-0.0)));
	}

	#[test]
	fn retain_and_iterate() {
		let mut table = Table::new();
		for integer in 0..10 {
			let (key, hash) = key(integer);
			table.insert(key, hash, Value::Integer(integer));
		}
		table.retain(|_, value| matches!(value, Value::Integer(value) if value % 2 == 0));

		let mut kept = table.iter().map(|(key, _)| match key {
			Value::Integer(integer) => integer,
			_ => -1
		}).collect::<Vec<_>>();
		kept.sort_unstable();
		assert_eq!(kept, [0, 2, 4, 6, 8]);
	}

	#[test]
	fn string_hashes_keep_case() {
		assert_eq!(hash_string("total"), hash_string("total"));
		assert_ne!(hash_string("Total"), hash_string("total"));
		assert_eq!(hash_string("a"), (2166136261u32 ^ b'a' as u32).wrapping_mul(16777619));
	}
}
