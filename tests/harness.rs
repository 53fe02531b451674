use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};

use loxparse::{Config, Error, Interpreter};
use test_support::{Case, CaseClass, load_cases, normalize_output};

/// Exit code the CLI would use for a pipeline error.
fn exit_code_for(error: &Error) -> i32 {
    match error {
        Error::Runtime(_) => 70,
        Error::Scan(_) | Error::Parse(_) | Error::Resolve(_) => 65,
    }
}

fn run_case_source(source: &str) -> (String, Result<(), Error>) {
    let mut interpreter = Interpreter::with_output(Config::extras(), Vec::new());
    let result = loxparse::run(source, &mut interpreter);
    let output = String::from_utf8(interpreter.into_output()).expect("program output is utf-8");
    (output, result)
}

fn expected_error_text(case: &Case) -> Result<String> {
    let expected_file = case
        .spec
        .expected
        .stderr_contains_file
        .as_deref()
        .with_context(|| format!("Missing stderr expectation file in {}", case.name))?;
    Ok(case.read_text(expected_file)?.trim().to_string())
}

fn check_case(case: &Case) -> Result<()> {
    if case.spec.bench.enabled {
        ensure!(
            !case.spec.bench.tags.is_empty(),
            "Case {} has bench enabled but no tags",
            case.name
        );
    }

    let source = fs::read_to_string(&case.program_path)
        .with_context(|| format!("Reading {}", case.name))?;
    let (output, result) = run_case_source(&source);

    match case.spec.class {
        CaseClass::RuntimeSuccess => {
            ensure!(
                case.spec.expected.exit_code == 0,
                "Case {} expected exit code must be 0 for runtime_success",
                case.name
            );
            result.map_err(|error| {
                anyhow::anyhow!("Case {} failed unexpectedly: {error}", case.name)
            })?;
            let stdout_file = case
                .spec
                .expected
                .stdout_file
                .as_deref()
                .with_context(|| format!("Missing stdout_file in {}", case.name))?;
            let expected = case.read_text(stdout_file)?;
            ensure!(
                normalize_output(&output) == normalize_output(&expected),
                "Case {} stdout mismatch:\n--- expected ---\n{expected}\n--- actual ---\n{output}",
                case.name
            );
        }
        CaseClass::StaticError | CaseClass::RuntimeError => {
            let error = match result {
                Err(error) => error,
                Ok(()) => anyhow::bail!("Expected case {} to fail, but it ran", case.name),
            };
            let actual_code = exit_code_for(&error);
            ensure!(
                actual_code == case.spec.expected.exit_code,
                "Case {} exit code mismatch: expected {}, got {} ({error})",
                case.name,
                case.spec.expected.exit_code,
                actual_code
            );
            let expected_error = expected_error_text(case)?;
            let rendered = error.to_string();
            ensure!(
                rendered.contains(&expected_error),
                "Expected error containing '{expected_error}' in {}, got '{rendered}'",
                case.name
            );
        }
    }

    Ok(())
}

#[test]
fn runs_fixture_programs() -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;
    for case in cases {
        check_case(&case)?;
    }
    Ok(())
}
