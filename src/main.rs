use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use loxparse::{Config, Error, Interpreter};

// See sysexits.h for the code conventions.
const EX_USAGE: u8 = 64;
const EX_DATA_ERR: u8 = 65;
const EX_RUNTIME_ERR: u8 = 70;

fn main() -> ExitCode {
    let mut disable_extras = false;
    let mut script: Option<String> = None;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--disable-extras" => disable_extras = true,
            _ => {
                if script.is_some() {
                    eprintln!("Usage: loxparse [script]");
                    return ExitCode::from(EX_USAGE);
                }
                script = Some(arg);
            }
        }
    }

    let config = if disable_extras {
        Config::basic()
    } else {
        Config::extras()
    };

    match script {
        Some(path) => run_file(&path, config),
        None => run_prompt(config),
    }
}

fn run_file(path: &str, config: Config) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Failed to read {path}: {error}");
            return ExitCode::from(EX_DATA_ERR);
        }
    };

    let mut interpreter = Interpreter::new(config);
    match loxparse::run(&source, &mut interpreter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            match error {
                Error::Runtime(_) => ExitCode::from(EX_RUNTIME_ERR),
                Error::Scan(_) | Error::Parse(_) | Error::Resolve(_) => {
                    ExitCode::from(EX_DATA_ERR)
                }
            }
        }
    }
}

fn run_prompt(config: Config) -> ExitCode {
    let mut interpreter = Interpreter::new(config);
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {}
            Err(error) => {
                eprintln!("Failed to read input: {error}");
                return ExitCode::from(EX_DATA_ERR);
            }
        }

        // Errors are reported but never end the session.
        if let Err(error) = loxparse::run_repl_line(&line, &mut interpreter) {
            eprintln!("{error}");
        }
    }
}
