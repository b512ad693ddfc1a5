use std::io::Write;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use log::{error, info};

use nano_lang::interpreter::Interpreter;
use nano_lang::lexer::Lexer;
use nano_lang::parser::Parser;

/// Run a NANO source file. Takes exactly one positional argument and no
/// flags: there is no `--verbosity` switch, so the logger is pinned to
/// `Warn`.
#[derive(ClapParser, Debug)]
#[command(author, version, about)]
struct Cli {
    file: std::path::PathBuf,
}

fn main() -> ExitCode {
    simple_logger::init_with_level(log::Level::Warn).expect("logger already initialized");
    let args = Cli::parse();

    let source = match std::fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(err) => {
            error!("could not read '{}': {err}", args.file.to_string_lossy());
            return ExitCode::FAILURE;
        }
    };

    info!("loaded '{}' ({} bytes)", args.file.to_string_lossy(), source.len());

    let tokens = Lexer::new(&source).scan_tokens();
    let program = Parser::new(tokens).parse();
    Interpreter::new().run(&program);

    std::io::stdout().flush().ok();
    info!("program finished");
    ExitCode::SUCCESS
}
