//! Cactus-stack environment frames.
//!
//! Each frame owns a slot vector and links to its enclosing frame;
//! closures keep captured frames alive through the `Rc`. Globals do not
//! live here — they sit in a name map on the interpreter, and only
//! references the resolver assigned a [`Position`] are addressed
//! through frames.

use std::cell::RefCell;
use std::rc::Rc;

use crate::resolver::Position;

use super::value::Value;

#[derive(Debug)]
pub struct Frame {
    slots: RefCell<Vec<Value>>,
    enclosing: Option<Rc<Frame>>,
}

impl Frame {
    pub fn nested(enclosing: Option<Rc<Frame>>) -> Rc<Frame> {
        Rc::new(Frame {
            slots: RefCell::new(Vec::new()),
            enclosing,
        })
    }

    /// Appends a slot; slot indices mirror declaration order, which the
    /// resolver assigned the same way.
    pub fn define(&self, value: Value) {
        self.slots.borrow_mut().push(value);
    }

    pub fn get_at(self: &Rc<Frame>, position: Position) -> Value {
        self.ancestor(position.depth).get_slot(position.index)
    }

    pub fn assign_at(self: &Rc<Frame>, position: Position, value: Value) {
        self.ancestor(position.depth).set_slot(position.index, value);
    }

    /// A slot can be addressed before its declaration statement ran
    /// (a closure called early); such reads see `Uninitialized`.
    pub fn get_slot(&self, index: usize) -> Value {
        self.slots
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or(Value::Uninitialized)
    }

    pub fn set_slot(&self, index: usize, value: Value) {
        let mut slots = self.slots.borrow_mut();
        if index >= slots.len() {
            slots.resize(index + 1, Value::Uninitialized);
        }
        slots[index] = value;
    }

    fn ancestor(self: &Rc<Frame>, depth: usize) -> Rc<Frame> {
        let mut frame = Rc::clone(self);
        for _ in 0..depth {
            let enclosing = frame
                .enclosing
                .clone()
                .expect("resolved depth never exceeds the frame chain");
            frame = enclosing;
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_and_reads_slots_in_order() {
        let frame = Frame::nested(None);
        frame.define(Value::Number(1.0));
        frame.define(Value::Number(2.0));
        assert_eq!(frame.get_slot(0), Value::Number(1.0));
        assert_eq!(frame.get_slot(1), Value::Number(2.0));
    }

    #[test]
    fn walks_enclosing_frames_by_depth() {
        let outer = Frame::nested(None);
        outer.define(Value::Number(7.0));
        let inner = Frame::nested(Some(Rc::clone(&outer)));
        inner.define(Value::Number(1.0));

        let position = Position { depth: 1, index: 0 };
        assert_eq!(inner.get_at(position), Value::Number(7.0));

        inner.assign_at(position, Value::Number(9.0));
        assert_eq!(outer.get_slot(0), Value::Number(9.0));
    }

    #[test]
    fn shared_ancestors_see_writes_from_either_child() {
        let root = Frame::nested(None);
        root.define(Value::Number(0.0));
        let left = Frame::nested(Some(Rc::clone(&root)));
        let right = Frame::nested(Some(Rc::clone(&root)));

        left.assign_at(Position { depth: 1, index: 0 }, Value::Number(5.0));
        assert_eq!(
            right.get_at(Position { depth: 1, index: 0 }),
            Value::Number(5.0)
        );
    }

    #[test]
    fn missing_slot_reads_as_uninitialized() {
        let frame = Frame::nested(None);
        assert_eq!(frame.get_slot(3), Value::Uninitialized);
    }
}
