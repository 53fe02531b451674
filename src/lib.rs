//! `loxparse` library crate.
//!
//! A tree-walking interpreter for a small dynamically-typed,
//! class-based scripting language. High-level layout:
//! - frontend: `lexer` + `parser` produce the AST (`parser::ast`)
//! - static analysis: `resolver` maps variable references to
//!   `(depth, slot)` positions before anything runs
//! - execution: `interpreter` walks the AST against cactus-stack
//!   environment frames
//!
//! [`run`] drives one source string through the whole pipeline against
//! an [`Interpreter`]; [`run_repl_line`] does the same with the REPL
//! concession (a trailing expression without `;` prints its value).
//! Interpreter state survives across calls, which is what makes the
//! REPL work.

pub mod builtins;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolver;

use std::io::Write;

use diagnostics::DiagnosticSink;
use resolver::Resolver;

pub use config::Config;
pub use error::Error;
pub use interpreter::Interpreter;

pub fn run<W: Write>(source: &str, interpreter: &mut Interpreter<W>) -> Result<(), Error> {
    run_pipeline(source, interpreter, false)
}

pub fn run_repl_line<W: Write>(
    source: &str,
    interpreter: &mut Interpreter<W>,
) -> Result<(), Error> {
    run_pipeline(source, interpreter, true)
}

fn run_pipeline<W: Write>(
    source: &str,
    interpreter: &mut Interpreter<W>,
    repl_mode: bool,
) -> Result<(), Error> {
    let config = interpreter.config();

    let mut sink = DiagnosticSink::new();
    let tokens = lexer::tokenize(source, config, &mut sink);
    if sink.has_diagnostics() {
        return Err(Error::Scan(sink.into_diagnostics()));
    }

    let parser = parser::Parser::new(tokens, config, repl_mode, interpreter.next_node_id());
    let parsed = parser.parse().map_err(Error::Parse)?;
    interpreter.set_next_node_id(parsed.next_node_id);

    let resolutions = {
        let mut resolver = Resolver::new(config, &mut sink);
        resolver.resolve(&parsed.statements);
        resolver.into_resolutions()
    };
    if sink.has_diagnostics() {
        return Err(Error::Resolve(sink.into_diagnostics()));
    }
    interpreter.add_resolutions(resolutions);

    interpreter.interpret(&parsed.statements).map_err(Error::Runtime)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Interpreter<Vec<u8>> {
        Interpreter::with_output(Config::extras(), Vec::new())
    }

    fn output(interpreter: &Interpreter<Vec<u8>>) -> String {
        String::from_utf8(interpreter.output().clone()).expect("utf-8 output")
    }

    #[test]
    fn scan_errors_block_interpretation() {
        let mut interpreter = fresh();
        let error = run("print 1; @", &mut interpreter).expect_err("expected scan failure");
        assert!(matches!(error, Error::Scan(_)));
        assert!(error.to_string().contains("Unexpected character."));
        assert_eq!(output(&interpreter), "", "nothing may run after a scan error");
    }

    #[test]
    fn parse_errors_are_joined_in_order() {
        let mut interpreter = fresh();
        let error =
            run("var = 1; var ;", &mut interpreter).expect_err("expected parse failure");
        let Error::Parse(errors) = &error else {
            panic!("expected parse error, got {error:?}");
        };
        assert_eq!(errors.0.len(), 2);
        assert_eq!(error.to_string().lines().count(), 2);
    }

    #[test]
    fn resolver_diagnostics_block_interpretation() {
        let mut interpreter = fresh();
        let error = run("print 1; return 2;", &mut interpreter).expect_err("expected failure");
        assert!(matches!(error, Error::Resolve(_)));
        assert!(error.to_string().contains("Can't return from top-level code."));
        assert_eq!(output(&interpreter), "");
    }

    #[test]
    fn repl_state_persists_across_lines() {
        let mut interpreter = fresh();
        run_repl_line("var a = 1;", &mut interpreter).expect("line 1 failed");
        run_repl_line("fun bump() { a = a + 1; return a; }", &mut interpreter)
            .expect("line 2 failed");
        run_repl_line("bump();", &mut interpreter).expect("line 3 failed");
        run_repl_line("print a;", &mut interpreter).expect("line 4 failed");
        assert_eq!(output(&interpreter), "2\n");
    }

    #[test]
    fn repl_echoes_trailing_expressions() {
        let mut interpreter = fresh();
        run_repl_line("3 < 2", &mut interpreter).expect("line failed");
        assert_eq!(output(&interpreter), "false\n");
    }

    #[test]
    fn repl_closures_survive_later_lines() {
        let mut interpreter = fresh();
        run_repl_line(
            "fun make() { var i = 10; fun inc() { i = i + 1; return i; } return inc; }",
            &mut interpreter,
        )
        .expect("line 1 failed");
        run_repl_line("var c = make();", &mut interpreter).expect("line 2 failed");
        run_repl_line("print c();", &mut interpreter).expect("line 3 failed");
        run_repl_line("print c();", &mut interpreter).expect("line 4 failed");
        assert_eq!(output(&interpreter), "11\n12\n");
    }

    #[test]
    fn failed_lines_leave_the_session_usable() {
        let mut interpreter = fresh();
        run_repl_line("var a = 5;", &mut interpreter).expect("line 1 failed");
        run_repl_line("print missing;", &mut interpreter).expect_err("expected runtime error");
        run_repl_line("print a;", &mut interpreter).expect("line 3 failed");
        assert_eq!(output(&interpreter), "5\n");
    }
}
