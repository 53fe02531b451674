use std::fmt;
use std::rc::Rc;

use crate::parser::ast::FunctionExpr;
use crate::resolver::Position;

use super::environment::Frame;
use super::value::Value;

/// A user-defined function: shared declaration plus the frame it
/// closed over. Initializers force their result to the bound `this`.
pub struct Function {
    name: Option<String>,
    declaration: Rc<FunctionExpr>,
    closure: Option<Rc<Frame>>,
    is_initializer: bool,
}

impl Function {
    pub fn new(
        name: Option<String>,
        declaration: Rc<FunctionExpr>,
        closure: Option<Rc<Frame>>,
        is_initializer: bool,
    ) -> Self {
        Self {
            name,
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn declaration(&self) -> &Rc<FunctionExpr> {
        &self.declaration
    }

    pub fn closure(&self) -> Option<Rc<Frame>> {
        self.closure.clone()
    }

    pub fn is_initializer(&self) -> bool {
        self.is_initializer
    }

    /// Produces the method bound to a receiver: a fresh one-slot frame
    /// holding the instance (the `this` binding) slides between the
    /// function and its defining closure.
    pub fn bind(&self, receiver: Value) -> Function {
        let frame = Frame::nested(self.closure.clone());
        frame.define(receiver);
        Function {
            name: self.name.clone(),
            declaration: Rc::clone(&self.declaration),
            closure: Some(frame),
            is_initializer: self.is_initializer,
        }
    }

    /// Slot 0 of the bound closure, i.e. `this`. Only meaningful on a
    /// bound method; initializers use it as their forced return value.
    pub fn bound_this(&self) -> Value {
        self.closure
            .as_ref()
            .expect("initializers always run bound to an instance")
            .get_at(Position { depth: 0, index: 0 })
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<fn {name}>"),
            None => write!(f, "<fn>"),
        }
    }
}

// The closure link can point at the frame holding this function, so a
// derived Debug would recurse; print the identity instead.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}
