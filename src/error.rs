use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::interpreter::error::RuntimeError;
use crate::parser::error::ParseErrors;

/// Everything `run` can fail with, one variant per pipeline stage.
/// The driver maps scan/parse/resolve failures to exit code 65 and
/// runtime failures to 70.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("{}", join_diagnostics(.0))]
    Scan(Vec<Diagnostic>),
    #[error(transparent)]
    Parse(ParseErrors),
    #[error("{}", join_diagnostics(.0))]
    Resolve(Vec<Diagnostic>),
    #[error(transparent)]
    Runtime(RuntimeError),
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
