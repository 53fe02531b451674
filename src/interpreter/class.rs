use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::function::Function;
use super::value::Value;

/// Runtime representation of a class declaration.
///
/// Method and getter lookup walk the superclass chain. Static methods
/// live on the metaclass: an instance of a synthetic class, so property
/// access on the class object reuses the instance machinery.
#[derive(Debug)]
pub struct ClassObject {
    name: String,
    superclass: Option<Rc<ClassObject>>,
    metaclass: Option<Rc<InstanceObject>>,
    methods: HashMap<String, Rc<Function>>,
    getters: HashMap<String, Rc<Function>>,
}

impl ClassObject {
    pub fn new(
        name: String,
        superclass: Option<Rc<ClassObject>>,
        metaclass: Option<Rc<InstanceObject>>,
        methods: HashMap<String, Rc<Function>>,
        getters: HashMap<String, Rc<Function>>,
    ) -> Self {
        Self {
            name,
            superclass,
            metaclass,
            methods,
            getters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metaclass(&self) -> Option<Rc<InstanceObject>> {
        self.metaclass.clone()
    }

    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }
        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    pub fn find_getter(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(getter) = self.getters.get(name) {
            return Some(Rc::clone(getter));
        }
        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_getter(name))
    }

    /// Constructor arity is the initializer's, or zero without one.
    pub fn arity(&self) -> usize {
        self.find_method("init")
            .map(|initializer| initializer.arity())
            .unwrap_or(0)
    }
}

/// An instance: its class plus per-instance fields. Array values are
/// instances of a synthetic `Array` class with stringified indices as
/// field keys.
#[derive(Debug)]
pub struct InstanceObject {
    class: Rc<ClassObject>,
    fields: RefCell<HashMap<String, Value>>,
}

impl InstanceObject {
    pub fn new(class: Rc<ClassObject>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn class(&self) -> &Rc<ClassObject> {
        &self.class
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }

    pub fn field_count(&self) -> usize {
        self.fields.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::FunctionExpr;

    fn method(name: &str) -> (String, Rc<Function>) {
        let declaration = Rc::new(FunctionExpr {
            params: Vec::new(),
            body: Vec::new(),
        });
        (
            name.to_string(),
            Rc::new(Function::new(
                Some(name.to_string()),
                declaration,
                None,
                false,
            )),
        )
    }

    #[test]
    fn method_lookup_walks_superclass_chain() {
        let base = Rc::new(ClassObject::new(
            "Base".to_string(),
            None,
            None,
            HashMap::from([method("greet")]),
            HashMap::new(),
        ));
        let derived = ClassObject::new(
            "Derived".to_string(),
            Some(Rc::clone(&base)),
            None,
            HashMap::new(),
            HashMap::new(),
        );
        assert!(derived.find_method("greet").is_some());
        assert!(derived.find_method("missing").is_none());
    }

    #[test]
    fn getter_lookup_is_inherited_too() {
        let base = Rc::new(ClassObject::new(
            "Base".to_string(),
            None,
            None,
            HashMap::new(),
            HashMap::from([method("area")]),
        ));
        let derived = ClassObject::new(
            "Derived".to_string(),
            Some(base),
            None,
            HashMap::new(),
            HashMap::new(),
        );
        assert!(derived.find_getter("area").is_some());
    }

    #[test]
    fn fields_shadow_nothing_until_set() {
        let class = Rc::new(ClassObject::new(
            "Box".to_string(),
            None,
            None,
            HashMap::new(),
            HashMap::new(),
        ));
        let instance = InstanceObject::new(class);
        assert!(instance.field("value").is_none());
        instance.set_field("value", Value::Number(7.0));
        assert_eq!(instance.field("value"), Some(Value::Number(7.0)));
        assert_eq!(instance.field_count(), 1);
    }
}
