//! Static resolution pass.
//!
//! Walks the tree once before execution, mapping every local variable
//! reference to a [`Position`]: how many environment frames to walk up
//! and which slot to address there. Slot indices follow declaration
//! order within a scope. Names that match no scope are globals and get
//! no entry. Legality checks (`return` placement, `this`/`super` use,
//! duplicate and unused locals) accumulate in the diagnostic sink;
//! nothing here throws.

use std::collections::HashMap;

use crate::config::Config;
use crate::diagnostics::DiagnosticSink;
use crate::lexer::token::{Token, TokenKind};
use crate::parser::ast::{Expr, FunctionExpr, Method, NodeId, Stmt, SuperclassRef};

/// Lexical coordinates of a resolved variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub depth: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

struct LocalVariable {
    declaration: Token,
    slot: usize,
    is_initialized: bool,
    is_read: bool,
    check_unused: bool,
}

#[derive(Default)]
struct Scope {
    variables: HashMap<String, LocalVariable>,
    next_slot: usize,
}

pub struct Resolver<'d> {
    config: Config,
    sink: &'d mut DiagnosticSink,
    scopes: Vec<Scope>,
    resolutions: HashMap<NodeId, Position>,
    current_function: FunctionKind,
    current_class: ClassKind,
}

impl<'d> Resolver<'d> {
    pub fn new(config: Config, sink: &'d mut DiagnosticSink) -> Self {
        Self {
            config,
            sink,
            scopes: Vec::new(),
            resolutions: HashMap::new(),
            current_function: FunctionKind::None,
            current_class: ClassKind::None,
        }
    }

    pub fn resolve(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_statement(statement);
        }
    }

    pub fn into_resolutions(self) -> HashMap<NodeId, Position> {
        self.resolutions
    }

    fn resolve_statement(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expression(expr),
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expression(initializer);
                }
                self.define(name);
            }
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve(statements);
                self.end_scope();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expression(condition);
                self.resolve_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch);
                }
            }
            Stmt::Loop {
                condition,
                increment,
                body,
            } => {
                self.resolve_expression(condition);
                if let Some(increment) = increment {
                    self.resolve_expression(increment);
                }
                self.resolve_statement(body);
            }
            Stmt::Function { name, function } => {
                self.declare(name);
                self.define(name);
                self.resolve_function(function, FunctionKind::Function);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionKind::None {
                    self.sink
                        .report_token(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionKind::Initializer {
                        self.sink
                            .report_token(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expression(value);
                }
            }
            Stmt::Class {
                name,
                superclass,
                methods,
                static_methods,
                getters,
            } => self.resolve_class(name, superclass.as_ref(), methods, static_methods, getters),
            Stmt::Break { .. } | Stmt::Continue { .. } => {}
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&SuperclassRef>,
        methods: &[Method],
        static_methods: &[Method],
        getters: &[Method],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = if superclass.is_some() {
            ClassKind::Subclass
        } else {
            ClassKind::Class
        };

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if superclass.name.lexeme == name.lexeme {
                self.sink
                    .report_token(&superclass.name, "A class can't inherit from itself.");
            }
            self.resolve_local(superclass.id, &superclass.name, true);
            self.begin_scope();
            self.declare_implicit("super", TokenKind::Super, superclass.name.line);
        }

        self.begin_scope();
        self.declare_implicit("this", TokenKind::This, name.line);

        for getter in getters {
            if methods
                .iter()
                .any(|method| method.name.lexeme == getter.name.lexeme)
            {
                self.sink.report_token(
                    &getter.name,
                    "Already a method with this name in this class.",
                );
            }
        }

        for method in methods {
            let kind = if method.name.lexeme == "init" {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            };
            self.resolve_function(&method.function, kind);
        }
        for getter in getters {
            self.resolve_function(&getter.function, FunctionKind::Method);
        }
        for static_method in static_methods {
            self.resolve_function(&static_method.function, FunctionKind::Method);
        }

        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }
        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, function: &FunctionExpr, kind: FunctionKind) {
        let enclosing_function = std::mem::replace(&mut self.current_function, kind);
        self.begin_scope();
        for param in &function.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve(&function.body);
        self.end_scope();
        self.current_function = enclosing_function;
    }

    fn resolve_expression(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last()
                    && let Some(variable) = scope.variables.get(&name.lexeme)
                    && !variable.is_initialized
                {
                    self.sink
                        .report_token(name, "Can't read local variable in its own initializer.");
                }
                self.resolve_local(*id, name, true);
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expression(value);
                self.resolve_local(*id, name, false);
            }
            Expr::Unary { right, .. } => self.resolve_expression(right),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expression(left);
                self.resolve_expression(right);
            }
            Expr::Ternary {
                condition,
                left,
                right,
                ..
            } => {
                self.resolve_expression(condition);
                self.resolve_expression(left);
                self.resolve_expression(right);
            }
            Expr::Grouping(inner) => self.resolve_expression(inner),
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expression(callee);
                for argument in arguments {
                    self.resolve_expression(argument);
                }
            }
            Expr::Function(function) => self.resolve_function(function, FunctionKind::Function),
            Expr::Get { object, .. } => self.resolve_expression(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expression(value);
                self.resolve_expression(object);
            }
            Expr::This { id, keyword } => {
                if self.current_class == ClassKind::None {
                    self.sink
                        .report_token(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(*id, keyword, true);
            }
            Expr::Super { id, keyword, .. } => match self.current_class {
                ClassKind::None => {
                    self.sink
                        .report_token(keyword, "Can't use 'super' outside of a class.");
                }
                ClassKind::Class => {
                    self.sink.report_token(
                        keyword,
                        "Can't use 'super' in a class with no superclass.",
                    );
                }
                ClassKind::Subclass => self.resolve_local(*id, keyword, true),
            },
            Expr::Index { array, index, .. } => {
                self.resolve_expression(array);
                self.resolve_expression(index);
            }
            Expr::SetIndex {
                array,
                index,
                value,
                ..
            } => {
                self.resolve_expression(array);
                self.resolve_expression(index);
                self.resolve_expression(value);
            }
            Expr::ArrayLiteral { elements, .. } => {
                for element in elements {
                    self.resolve_expression(element);
                }
            }
        }
    }

    fn resolve_local(&mut self, id: NodeId, name: &Token, is_read: bool) {
        let scope_count = self.scopes.len();
        for (scope_index, scope) in self.scopes.iter_mut().enumerate().rev() {
            if let Some(variable) = scope.variables.get_mut(&name.lexeme) {
                if is_read {
                    variable.is_read = true;
                }
                let position = Position {
                    depth: scope_count - 1 - scope_index,
                    index: variable.slot,
                };
                self.resolutions.insert(id, position);
                return;
            }
        }
        // No scope declares the name: it resolves in globals at runtime.
    }

    fn declare(&mut self, name: &Token) {
        let track_unused = self.config.forbid_unused_variable;
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.variables.contains_key(&name.lexeme) {
            self.sink
                .report_token(name, "Already a variable with this name in this scope.");
        }
        let slot = scope.next_slot;
        scope.next_slot += 1;
        scope.variables.insert(
            name.lexeme.clone(),
            LocalVariable {
                declaration: name.clone(),
                slot,
                is_initialized: false,
                is_read: false,
                check_unused: track_unused,
            },
        );
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut()
            && let Some(variable) = scope.variables.get_mut(&name.lexeme)
        {
            variable.is_initialized = true;
        }
    }

    /// Reserves a slot for `this`/`super`; exempt from the unused check.
    fn declare_implicit(&mut self, name: &str, kind: TokenKind, line: usize) {
        let scope = self
            .scopes
            .last_mut()
            .expect("implicit declarations happen inside a scope");
        let slot = scope.next_slot;
        scope.next_slot += 1;
        scope.variables.insert(
            name.to_string(),
            LocalVariable {
                declaration: Token::new(kind, name, line),
                slot,
                is_initialized: true,
                is_read: true,
                check_unused: false,
            },
        );
    }

    fn begin_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn end_scope(&mut self) {
        let scope = self.scopes.pop().expect("scope stack underflow");
        if !self.config.forbid_unused_variable {
            return;
        }
        let mut unused: Vec<&LocalVariable> = scope
            .variables
            .values()
            .filter(|variable| variable.check_unused && !variable.is_read)
            .collect();
        // Slot order keeps reports deterministic.
        unused.sort_by_key(|variable| variable.slot);
        for variable in unused {
            self.sink
                .report_token(&variable.declaration, "Variable declared but never read");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;
    use indoc::indoc;

    fn resolve_source(source: &str, config: Config) -> (HashMap<NodeId, Position>, Vec<String>) {
        let mut sink = DiagnosticSink::new();
        let tokens = lexer::tokenize(source, config, &mut sink);
        assert!(!sink.has_diagnostics(), "unexpected lexical errors");
        let parsed = parser::parse_tokens(tokens, config, 0).expect("parse failed");

        let mut sink = DiagnosticSink::new();
        let mut resolver = Resolver::new(config, &mut sink);
        resolver.resolve(&parsed.statements);
        let resolutions = resolver.into_resolutions();
        let messages = sink
            .into_diagnostics()
            .into_iter()
            .map(|diagnostic| diagnostic.to_string())
            .collect();
        (resolutions, messages)
    }

    fn positions_sorted(resolutions: &HashMap<NodeId, Position>) -> Vec<Position> {
        let mut entries: Vec<(&NodeId, &Position)> = resolutions.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        entries.into_iter().map(|(_, position)| *position).collect()
    }

    #[test]
    fn globals_get_no_position() {
        let (resolutions, messages) = resolve_source("var a = 1; print a;", Config::basic());
        assert!(messages.is_empty());
        assert!(resolutions.is_empty());
    }

    #[test]
    fn slot_indices_follow_declaration_order() {
        let source = indoc! {"
            {
                var a = 1;
                var b = 2;
                print b;
                print a;
            }
        "};
        let (resolutions, messages) = resolve_source(source, Config::basic());
        assert!(messages.is_empty());
        // Reads in source order: b then a.
        assert_eq!(
            positions_sorted(&resolutions),
            vec![
                Position { depth: 0, index: 1 },
                Position { depth: 0, index: 0 },
            ]
        );
    }

    #[test]
    fn closure_reads_cross_frames() {
        let source = indoc! {"
            {
                var captured = 1;
                fun inner() {
                    return captured;
                }
                print inner();
            }
        "};
        let (resolutions, messages) = resolve_source(source, Config::basic());
        assert!(messages.is_empty());
        let positions = positions_sorted(&resolutions);
        // `captured` read from one frame down; `inner` read in its own frame.
        assert!(positions.contains(&Position { depth: 1, index: 0 }));
        assert!(positions.contains(&Position { depth: 0, index: 1 }));
    }

    #[test]
    fn this_resolves_one_frame_up_and_super_two() {
        let source = indoc! {"
            class Base {
                greet() { print 1; }
            }
            class Derived < Base {
                greet() {
                    print this;
                    super.greet();
                }
            }
        "};
        let (resolutions, messages) = resolve_source(source, Config::basic());
        assert!(messages.is_empty());
        let positions = positions_sorted(&resolutions);
        assert!(positions.contains(&Position { depth: 1, index: 0 }), "this");
        assert!(positions.contains(&Position { depth: 2, index: 0 }), "super");
    }

    #[test]
    fn reports_duplicate_declaration() {
        let (_, messages) = resolve_source("{ var a = 1; var a = 2; print a; }", Config::basic());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Already a variable with this name in this scope."));
    }

    #[test]
    fn reports_read_in_own_initializer() {
        let (_, messages) = resolve_source("var a = 1; { var a = a; print a; }", Config::basic());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Can't read local variable in its own initializer."));
    }

    #[test]
    fn reports_return_placement() {
        let (_, messages) = resolve_source("return 1;", Config::basic());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Can't return from top-level code."));

        let (_, messages) = resolve_source(
            "class P { init() { return 1; } }",
            Config::basic(),
        );
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Can't return a value from an initializer."));

        // A bare return in an initializer is allowed.
        let (_, messages) = resolve_source("class P { init() { return; } }", Config::basic());
        assert!(messages.is_empty());
    }

    #[test]
    fn reports_this_and_super_misuse() {
        let (_, messages) = resolve_source("print this;", Config::basic());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Can't use 'this' outside of a class."));

        let (_, messages) = resolve_source("class C { m() { super.m(); } }", Config::basic());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Can't use 'super' in a class with no superclass."));
    }

    #[test]
    fn reports_self_inheritance() {
        let (_, messages) = resolve_source("class C < C { }", Config::basic());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("A class can't inherit from itself."));
    }

    #[test]
    fn reports_getter_method_name_conflict() {
        let (_, messages) = resolve_source(
            "class C { area() { return 1; } area { return 2; } }",
            Config::extras(),
        );
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Already a method with this name in this class."));
    }

    #[test]
    fn reports_unused_locals_in_slot_order() {
        let source = indoc! {"
            {
                var first = 1;
                var second = 2;
            }
        "};
        let (_, messages) = resolve_source(source, Config::extras());
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("'first'"));
        assert!(messages[0].contains("Variable declared but never read"));
        assert!(messages[1].contains("'second'"));
    }

    #[test]
    fn assignment_does_not_count_as_read() {
        let (_, messages) = resolve_source("{ var a = 1; a = 2; }", Config::extras());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Variable declared but never read"));
    }

    #[test]
    fn unused_check_is_off_in_basic_profile() {
        let (_, messages) = resolve_source("{ var dead = 1; }", Config::basic());
        assert!(messages.is_empty());
    }
}
