use std::path::Path;
use std::process::ExitCode;
use std::{env, thread};

use carlae::config::Config;
use carlae::{Environment, evaluate_file, make_global_env, run_source, set_max_depth};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

fn repl(config: &Config) -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("carlae: cannot start line editor: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(history) = &config.history_file {
        // A missing history file just means a first session
        let _ = editor.load_history(history);
    }

    let env = make_global_env();

    loop {
        match editor.readline("in> ") {
            Ok(line) => {
                if is_exit_command(&line) {
                    break;
                }
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(input);
                eval_line(input, &env);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("carlae: error reading line: {e}");
                break;
            }
        }
    }

    if let Some(history) = &config.history_file {
        if let Err(e) = editor.save_history(history) {
            log::warn!("could not save history to {}: {e}", history.display());
        }
    }
    env.clear();
    ExitCode::SUCCESS
}

/// Only the literal line `EXIT` ends a session
fn is_exit_command(line: &str) -> bool {
    line.strip_suffix('\n').unwrap_or(line) == "EXIT"
}

fn eval_line(input: &str, env: &Environment) {
    match run_source(input, env) {
        Ok(result) => println!("out> {result}"),
        Err(e) => println!("error: {e}"),
    }
}

fn run_file(path: &Path) -> ExitCode {
    let env = make_global_env();
    let status = match evaluate_file(path, Some(&env)) {
        Ok(result) => {
            println!("{result}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("carlae: {e}");
            ExitCode::FAILURE
        }
    };
    env.clear();
    status
}

fn run(config: Config) -> ExitCode {
    set_max_depth(config.max_depth);
    match &config.file {
        Some(path) => run_file(path),
        None => repl(&config),
    }
}

fn print_usage() {
    eprintln!("Usage: carlae [--max-depth N] [--stack-size BYTES] [--no-history] [FILE]");
    eprintln!("  With no FILE, starts an interactive session (type EXIT to quit).");
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("CARLAE_LOG", "warn"))
        .init();

    let config = match Config::load(env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("carlae: {e}");
            print_usage();
            return ExitCode::from(2);
        }
    };

    // Evaluation recurses on the host stack, so give it plenty of room
    let worker = thread::Builder::new()
        .name("carlae-eval".to_string())
        .stack_size(config.stack_size)
        .spawn(move || run(config));

    match worker.map(|handle| handle.join()) {
        Ok(Ok(status)) => status,
        Ok(Err(_)) => {
            eprintln!("carlae: interpreter thread panicked");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("carlae: cannot start interpreter thread: {e}");
            ExitCode::FAILURE
        }
    }
}
