//! Root marking. The tracing and sweeping themselves live on the
//! [heap](super::heap::Heap), only the virtual machine knows its roots.
use super::VirtualMachine;
use log::debug;

impl VirtualMachine {
	/// Runs a full mark and sweep collection.
	///
	/// Example
	/// -------
	/// ```rust
	/// # use auric::vm::VirtualMachine;
	/// let mut virtual_machine = VirtualMachine::new();
	/// virtual_machine.run("{var garbage = {1: 2, 3: 4};}").unwrap();
	/// let before = virtual_machine.heap().len();
	/// virtual_machine.collect_garbage();
	/// assert!(virtual_machine.heap().len() < before);
	/// ```
	pub fn collect_garbage(&mut self) {
		debug!("-- gc begin: {} bytes in {} objects",
			self.heap.allocated(), self.heap.len());

		self.mark_roots();
		self.heap.trace_references();
		self.heap.remove_white_strings();
		let (objects, bytes) = self.heap.sweep();

		debug!("-- gc end: freed {} bytes in {} objects, {} bytes left, next at {}",
			bytes, objects, self.heap.allocated(), self.heap.next_gc());
	}

	fn mark_roots(&mut self) {
		for value in &self.stack {self.heap.mark_value(*value)}
		for frame in &self.frames {self.heap.mark_object(frame.closure)}
		for up_value in &self.open_up_values {self.heap.mark_object(*up_value)}
		for (name, value) in self.globals.iter() {
			self.heap.mark_value(name);
			self.heap.mark_value(value);
		}
		self.heap.mark_pinned();
	}
}
