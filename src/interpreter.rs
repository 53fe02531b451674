//! Tree-walking evaluator.
//!
//! Statements execute through [`Flow`] markers so `break`, `continue`,
//! and `return` propagate as typed non-local exits instead of errors;
//! runtime failures travel on the `Err` channel and abort the current
//! `interpret` call. Program output goes through an injected writer so
//! the REPL streams to stdout while tests capture into a buffer.

pub mod class;
pub mod environment;
pub mod error;
pub mod function;
pub mod value;

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::builtins::BuiltinFunction;
use crate::config::Config;
use crate::lexer::token::{Token, TokenKind};
use crate::parser::ast::{Expr, Method, NodeId, Stmt};
use crate::resolver::Position;

use class::{ClassObject, InstanceObject};
use environment::Frame;
use error::RuntimeError;
use function::Function;
use value::Value;

/// Control-flow marker for statement execution.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter<W: Write = io::Stdout> {
    config: Config,
    globals: HashMap<String, Value>,
    resolutions: HashMap<NodeId, Position>,
    frame: Option<Rc<Frame>>,
    next_node_id: NodeId,
    array_class: Rc<ClassObject>,
    out: W,
}

impl Interpreter<io::Stdout> {
    pub fn new(config: Config) -> Self {
        Self::with_output(config, io::stdout())
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_output(config: Config, out: W) -> Self {
        let mut globals = HashMap::new();
        for builtin in BuiltinFunction::all() {
            globals.insert(builtin.name().to_string(), Value::Builtin(builtin));
        }
        Self {
            config,
            globals,
            resolutions: HashMap::new(),
            frame: None,
            next_node_id: 0,
            array_class: Rc::new(ClassObject::new(
                "Array".to_string(),
                None,
                None,
                HashMap::new(),
                HashMap::new(),
            )),
            out,
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// First unassigned node id; the parser continues the sequence so
    /// REPL lines never reuse ids still referenced by live closures.
    pub fn next_node_id(&self) -> NodeId {
        self.next_node_id
    }

    pub fn set_next_node_id(&mut self, id: NodeId) {
        self.next_node_id = id;
    }

    pub fn add_resolutions(&mut self, resolutions: HashMap<NodeId, Position>) {
        self.resolutions.extend(resolutions);
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for statement in statements {
            match self.execute(statement)? {
                Flow::Normal => {}
                Flow::Break | Flow::Continue | Flow::Return(_) => {
                    unreachable!("control-flow signals never reach top level")
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, statement: &Stmt) -> Result<Flow, RuntimeError> {
        match statement {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                let _ = writeln!(self.out, "{value}");
                Ok(Flow::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Uninitialized,
                };
                self.define_variable(name, value);
                Ok(Flow::Normal)
            }
            Stmt::Block(statements) => {
                let frame = Frame::nested(self.frame.clone());
                self.execute_block(statements, frame)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Loop {
                condition,
                increment,
                body,
            } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal | Flow::Continue => {
                            if let Some(increment) = increment {
                                self.evaluate(increment)?;
                            }
                        }
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Function { name, function } => {
                let function = Function::new(
                    Some(name.lexeme.clone()),
                    Rc::clone(function),
                    self.frame.clone(),
                    false,
                );
                self.define_variable(name, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Class {
                name,
                superclass,
                methods,
                static_methods,
                getters,
            } => {
                let superclass_value = match superclass {
                    Some(reference) => {
                        match self.lookup_variable(reference.id, &reference.name)? {
                            Value::Class(class) => Some(class),
                            _ => {
                                return Err(RuntimeError::new(
                                    &reference.name,
                                    "Superclass must be a class.",
                                ));
                            }
                        }
                    }
                    None => None,
                };

                // With a superclass the methods close over an extra
                // frame holding it; `super` resolves there.
                let method_closure = match &superclass_value {
                    Some(class) => {
                        let frame = Frame::nested(self.frame.clone());
                        frame.define(Value::Class(Rc::clone(class)));
                        Some(frame)
                    }
                    None => self.frame.clone(),
                };

                let metaclass = if self.config.allow_static_methods {
                    let meta_class = ClassObject::new(
                        format!("{} metaclass", name.lexeme),
                        None,
                        None,
                        method_table(static_methods, method_closure.clone(), false),
                        HashMap::new(),
                    );
                    Some(Rc::new(InstanceObject::new(Rc::new(meta_class))))
                } else {
                    None
                };

                let class = ClassObject::new(
                    name.lexeme.clone(),
                    superclass_value,
                    metaclass,
                    method_table(methods, method_closure.clone(), true),
                    method_table(getters, method_closure, false),
                );
                self.define_variable(name, Value::Class(Rc::new(class)));
                Ok(Flow::Normal)
            }
            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),
        }
    }

    fn execute_block(&mut self, statements: &[Stmt], frame: Rc<Frame>) -> Result<Flow, RuntimeError> {
        let previous = self.frame.replace(frame);
        let result = self.execute_all(statements);
        self.frame = previous;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow, RuntimeError> {
        for statement in statements {
            match self.execute(statement)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from_literal(literal)),
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Variable { id, name } => self.lookup_variable(*id, name),
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.resolutions.get(id) {
                    Some(position) => {
                        let position = *position;
                        self.current_frame().assign_at(position, value.clone());
                    }
                    None => {
                        if !self.globals.contains_key(&name.lexeme) {
                            return Err(RuntimeError::new(
                                name,
                                format!("Undefined variable '{}'.", name.lexeme),
                            ));
                        }
                        self.globals.insert(name.lexeme.clone(), value.clone());
                    }
                }
                Ok(value)
            }
            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.kind {
                    TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
                    TokenKind::Minus => {
                        let value = number_operand(operator, &right)?;
                        Ok(Value::Number(-value))
                    }
                    _ => unreachable!("parser only produces '!' and '-' unary operators"),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                self.binary_operation(&left, operator, &right)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                // The result is the last evaluated operand, not a boolean.
                match operator.kind {
                    TokenKind::And if !left.is_truthy() => Ok(left),
                    TokenKind::Or if left.is_truthy() => Ok(left),
                    _ => self.evaluate(right),
                }
            }
            Expr::Ternary {
                operator,
                condition,
                left,
                right,
            } => {
                // Both branches evaluate before the condition selects.
                let condition = self.evaluate(condition)?;
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                match condition {
                    Value::Bool(true) => Ok(left),
                    Value::Bool(false) => Ok(right),
                    _ => Err(RuntimeError::new(
                        operator,
                        "Condition must evaluate to boolean.",
                    )),
                }
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;
                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }
                self.call_value(callee, values, paren)
            }
            Expr::Function(declaration) => Ok(Value::Function(Rc::new(Function::new(
                None,
                Rc::clone(declaration),
                self.frame.clone(),
                false,
            )))),
            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;
                self.get_property(&object, name)
            }
            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;
                let value = self.evaluate(value)?;
                self.set_property(&object, name, value)
            }
            Expr::This { id, keyword } => self.lookup_variable(*id, keyword),
            Expr::Super { id, method, .. } => {
                let position = *self
                    .resolutions
                    .get(id)
                    .expect("'super' references are always resolved");
                let frame = Rc::clone(self.current_frame());
                let superclass = match frame.get_at(position) {
                    Value::Class(class) => class,
                    _ => unreachable!("the 'super' slot always holds a class"),
                };
                let receiver = frame.get_at(Position {
                    depth: position.depth - 1,
                    index: 0,
                });
                if let Some(getter) = superclass.find_getter(&method.lexeme) {
                    let bound = getter.bind(receiver);
                    return self.call_function(&bound, Vec::new());
                }
                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(found.bind(receiver)))),
                    None => Err(RuntimeError::new(
                        method,
                        format!("Undefined property '{}'.", method.lexeme),
                    )),
                }
            }
            Expr::Index {
                array,
                bracket,
                index,
            } => {
                let target = self.evaluate(array)?;
                let index = self.evaluate(index)?;
                match target {
                    Value::Instance(instance) => {
                        let key = index.to_string();
                        instance.field(&key).ok_or_else(|| {
                            RuntimeError::new(bracket, format!("Undefined property '{key}'."))
                        })
                    }
                    Value::Str(string) => {
                        let length = string.borrow().len();
                        let position = string_index(bracket, &index, length)?;
                        let byte = string.borrow().as_bytes()[position];
                        Ok(Value::string((byte as char).to_string()))
                    }
                    _ => Err(RuntimeError::new(
                        bracket,
                        "Only arrays, instances and strings can be indexed.",
                    )),
                }
            }
            Expr::SetIndex {
                array,
                bracket,
                index,
                value,
            } => {
                let target = self.evaluate(array)?;
                let index = self.evaluate(index)?;
                let value = self.evaluate(value)?;
                match target {
                    Value::Instance(instance) => {
                        let key = index.to_string();
                        if instance.class().find_getter(&key).is_some() {
                            return Err(RuntimeError::new(
                                bracket,
                                format!("Can't override a getter: '{key}'."),
                            ));
                        }
                        instance.set_field(&key, value.clone());
                        Ok(value)
                    }
                    Value::Str(string) => {
                        let length = string.borrow().len();
                        let position = string_index(bracket, &index, length)?;
                        let replacement = value.to_string();
                        if replacement.len() != 1 {
                            return Err(RuntimeError::new(
                                bracket,
                                "Can only assign a single character to a string index.",
                            ));
                        }
                        string
                            .borrow_mut()
                            .replace_range(position..position + 1, &replacement);
                        Ok(value)
                    }
                    _ => Err(RuntimeError::new(
                        bracket,
                        "Only arrays, instances and strings can be indexed.",
                    )),
                }
            }
            Expr::ArrayLiteral { elements, .. } => {
                let instance = Rc::new(InstanceObject::new(Rc::clone(&self.array_class)));
                for (index, element) in elements.iter().enumerate() {
                    let value = self.evaluate(element)?;
                    instance.set_field(&index.to_string(), value);
                }
                Ok(Value::Instance(instance))
            }
        }
    }

    fn binary_operation(
        &self,
        left: &Value,
        operator: &Token,
        right: &Value,
    ) -> Result<Value, RuntimeError> {
        match operator.kind {
            TokenKind::Plus => match (left, right) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
                (Value::Str(_), Value::Str(_)) => Ok(Value::string(format!("{left}{right}"))),
                (Value::Str(_), _) | (_, Value::Str(_))
                    if self.config.allow_implicit_string_cast =>
                {
                    Ok(Value::string(format!("{left}{right}")))
                }
                _ => Err(RuntimeError::new(
                    operator,
                    "Operands must be numbers or strings.",
                )),
            },
            TokenKind::Minus => {
                let (l, r) = number_operands(operator, left, right)?;
                Ok(Value::Number(l - r))
            }
            TokenKind::Star => {
                let (l, r) = number_operands(operator, left, right)?;
                Ok(Value::Number(l * r))
            }
            TokenKind::Slash => {
                let (l, r) = number_operands(operator, left, right)?;
                if r == 0.0 {
                    return Err(RuntimeError::new(operator, "Division by 0."));
                }
                Ok(Value::Number(l / r))
            }
            TokenKind::Percent => {
                // Rounded-integer semantics, precision loss intended.
                let (l, r) = number_operands(operator, left, right)?;
                let divisor = r.round() as i64;
                if divisor == 0 {
                    return Err(RuntimeError::new(operator, "Division by 0."));
                }
                Ok(Value::Number(((l.round() as i64) % divisor) as f64))
            }
            TokenKind::Greater => {
                let (l, r) = number_operands(operator, left, right)?;
                Ok(Value::Bool(l > r))
            }
            TokenKind::GreaterEqual => {
                let (l, r) = number_operands(operator, left, right)?;
                Ok(Value::Bool(l >= r))
            }
            TokenKind::Less => {
                let (l, r) = number_operands(operator, left, right)?;
                Ok(Value::Bool(l < r))
            }
            TokenKind::LessEqual => {
                let (l, r) = number_operands(operator, left, right)?;
                Ok(Value::Bool(l <= r))
            }
            TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
            TokenKind::BangEqual => Ok(Value::Bool(left != right)),
            TokenKind::Comma => Ok(right.clone()),
            _ => unreachable!("parser only produces binary operators"),
        }
    }

    fn call_value(
        &mut self,
        callee: Value,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(function) => {
                check_arity(paren, function.arity(), arguments.len())?;
                self.call_function(&function, arguments)
            }
            Value::Class(class) => {
                check_arity(paren, class.arity(), arguments.len())?;
                self.instantiate(class, arguments)
            }
            Value::Builtin(builtin) => {
                check_arity(paren, builtin.arity(), arguments.len())?;
                self.call_builtin(builtin, arguments, paren)
            }
            _ => Err(RuntimeError::new(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &Function,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let frame = Frame::nested(function.closure());
        for argument in arguments {
            frame.define(argument);
        }
        let flow = self.execute_block(&function.declaration().body, frame)?;
        let value = match flow {
            Flow::Return(value) if !function.is_initializer() => value,
            Flow::Normal if !function.is_initializer() => Value::Nil,
            // An initializer always yields its bound instance, even
            // through a bare `return`.
            Flow::Return(_) | Flow::Normal => function.bound_this(),
            Flow::Break | Flow::Continue => {
                unreachable!("loop control never escapes a function body")
            }
        };
        Ok(value)
    }

    fn instantiate(
        &mut self,
        class: Rc<ClassObject>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let instance = Rc::new(InstanceObject::new(Rc::clone(&class)));
        if let Some(initializer) = class.find_method("init") {
            let bound = initializer.bind(Value::Instance(Rc::clone(&instance)));
            self.call_function(&bound, arguments)?;
        }
        Ok(Value::Instance(instance))
    }

    fn call_builtin(
        &mut self,
        builtin: BuiltinFunction,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        match builtin {
            BuiltinFunction::Clock => {
                let seconds = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|elapsed| elapsed.as_secs_f64())
                    .unwrap_or(0.0);
                Ok(Value::Number(seconds))
            }
            BuiltinFunction::Len => match &arguments[0] {
                Value::Str(string) => Ok(Value::Number(string.borrow().len() as f64)),
                Value::Instance(instance) => Ok(Value::Number(instance.field_count() as f64)),
                _ => Err(RuntimeError::new(
                    paren,
                    "Argument to 'len' must be a string or an instance.",
                )),
            },
        }
    }

    fn get_property(&mut self, object: &Value, name: &Token) -> Result<Value, RuntimeError> {
        match object {
            Value::Instance(instance) => self.instance_property(&Rc::clone(instance), name),
            Value::Class(class) if self.config.allow_static_methods => match class.metaclass() {
                Some(metaclass) => self.instance_property(&metaclass, name),
                None => Err(RuntimeError::new(
                    name,
                    format!("Undefined property '{}'.", name.lexeme),
                )),
            },
            _ => Err(RuntimeError::new(name, "Only instances have properties.")),
        }
    }

    /// Lookup order: getter (invoked immediately), then fields, then
    /// methods, inherited included.
    fn instance_property(
        &mut self,
        instance: &Rc<InstanceObject>,
        name: &Token,
    ) -> Result<Value, RuntimeError> {
        if let Some(getter) = instance.class().find_getter(&name.lexeme) {
            let bound = getter.bind(Value::Instance(Rc::clone(instance)));
            return self.call_function(&bound, Vec::new());
        }
        if let Some(value) = instance.field(&name.lexeme) {
            return Ok(value);
        }
        if let Some(method) = instance.class().find_method(&name.lexeme) {
            return Ok(Value::Function(Rc::new(
                method.bind(Value::Instance(Rc::clone(instance))),
            )));
        }
        Err(RuntimeError::new(
            name,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    fn set_property(
        &mut self,
        object: &Value,
        name: &Token,
        value: Value,
    ) -> Result<Value, RuntimeError> {
        let instance = match object {
            Value::Instance(instance) => Rc::clone(instance),
            Value::Class(class) if self.config.allow_static_methods => match class.metaclass() {
                Some(metaclass) => metaclass,
                None => return Err(RuntimeError::new(name, "Only instances have fields.")),
            },
            _ => return Err(RuntimeError::new(name, "Only instances have fields.")),
        };
        if instance.class().find_getter(&name.lexeme).is_some() {
            return Err(RuntimeError::new(
                name,
                format!("Can't override a getter: '{}'.", name.lexeme),
            ));
        }
        instance.set_field(&name.lexeme, value.clone());
        Ok(value)
    }

    fn lookup_variable(&self, id: NodeId, name: &Token) -> Result<Value, RuntimeError> {
        let value = match self.resolutions.get(&id) {
            Some(position) => self.current_frame().get_at(*position),
            None => self.globals.get(&name.lexeme).cloned().ok_or_else(|| {
                RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
            })?,
        };
        if let Value::Uninitialized = value {
            if self.config.forbid_uninitialized_variable {
                return Err(RuntimeError::new(
                    name,
                    format!("Uninitialized variable '{}'.", name.lexeme),
                ));
            }
            return Ok(Value::Nil);
        }
        Ok(value)
    }

    fn define_variable(&mut self, name: &Token, value: Value) {
        match &self.frame {
            Some(frame) => frame.define(value),
            None => {
                self.globals.insert(name.lexeme.clone(), value);
            }
        }
    }

    fn current_frame(&self) -> &Rc<Frame> {
        self.frame
            .as_ref()
            .expect("resolved references always execute inside a frame")
    }
}

fn method_table(
    members: &[Method],
    closure: Option<Rc<Frame>>,
    mark_initializer: bool,
) -> HashMap<String, Rc<Function>> {
    members
        .iter()
        .map(|member| {
            let is_initializer = mark_initializer && member.name.lexeme == "init";
            (
                member.name.lexeme.clone(),
                Rc::new(Function::new(
                    Some(member.name.lexeme.clone()),
                    Rc::clone(&member.function),
                    closure.clone(),
                    is_initializer,
                )),
            )
        })
        .collect()
}

fn check_arity(paren: &Token, expected: usize, found: usize) -> Result<(), RuntimeError> {
    if expected != found {
        return Err(RuntimeError::new(
            paren,
            format!("Expected {expected} arguments but got {found}."),
        ));
    }
    Ok(())
}

fn number_operand(operator: &Token, value: &Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(number) => Ok(*number),
        _ => Err(RuntimeError::new(operator, "Operand must be a number.")),
    }
}

fn number_operands(
    operator: &Token,
    left: &Value,
    right: &Value,
) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok((*l, *r)),
        _ => Err(RuntimeError::new(operator, "Operands must be numbers.")),
    }
}

fn string_index(bracket: &Token, index: &Value, length: usize) -> Result<usize, RuntimeError> {
    let Value::Number(number) = index else {
        return Err(RuntimeError::new(bracket, "String index must be a number."));
    };
    if *number < 0.0 || (*number as usize) >= length {
        return Err(RuntimeError::new(bracket, "String index out of range."));
    }
    Ok(*number as usize)
}
