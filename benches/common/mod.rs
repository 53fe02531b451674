#![allow(dead_code)]
use std::fs;

use loxparse::diagnostics::DiagnosticSink;
use loxparse::parser::Parsed;
use loxparse::{Config, lexer, parser};

pub const WORKLOADS: [(&str, &str); 2] = [
    ("fib", "tests/programs/bench_fib/program.lox"),
    ("loop", "tests/programs/bench_loop/program.lox"),
];

pub fn load_source(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}

pub fn tokenize(source: &str) -> Vec<loxparse::lexer::token::Token> {
    let mut sink = DiagnosticSink::new();
    let tokens = lexer::tokenize(source, Config::extras(), &mut sink);
    assert!(!sink.has_diagnostics(), "benchmark workload must scan cleanly");
    tokens
}

pub fn parse(source: &str) -> Parsed {
    let tokens = tokenize(source);
    parser::parse_tokens(tokens, Config::extras(), 0)
        .unwrap_or_else(|err| panic!("parse benchmark workload: {err}"))
}
