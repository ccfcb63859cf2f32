//! Kestrel interpreter
//!
//! Runs, tokenizes or checks a Kestrel script.

use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use kestrel::feedback::RunFeedback;
use kestrel::frontend::{Lexer, LexerConfig, Parser as KestrelParser, TokenKind, TokenValue};
use kestrel::interpreter::{Interpreter, InterpreterConfig};
use kestrel::stdlib::HostRegistry;

/// Kestrel interpreter
#[derive(Parser, Debug)]
#[command(name = "kestrel")]
#[command(version)]
#[command(about = "Kestrel - a small scripting language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Longest lexeme the lexer accepts, in characters
    #[arg(long, global = true, default_value_t = LexerConfig::default().max_lexeme_length)]
    max_lexeme_length: usize,

    /// Deepest chain of nested function calls
    #[arg(long, global = true, default_value_t = InterpreterConfig::default().max_call_depth)]
    max_call_depth: usize,

    /// How diagnostics are written to stderr
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a script
    Run {
        /// Input source file
        input: PathBuf,
    },
    /// Print the tokens of a script
    Tokens {
        /// Input source file
        input: PathBuf,
    },
    /// Parse a script without running it
    Check {
        /// Input source file
        input: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let outcome = match &cli.command {
        Commands::Run { input } => run_on_sized_stack(input, &cli),
        Commands::Tokens { input } => dump_tokens(input, &cli),
        Commands::Check { input } => check_file(input, &cli),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn lexer_config(cli: &Cli) -> LexerConfig {
    LexerConfig {
        max_lexeme_length: cli.max_lexeme_length,
    }
}

fn interpreter_config(cli: &Cli) -> InterpreterConfig {
    InterpreterConfig {
        max_call_depth: cli.max_call_depth,
    }
}

/// Run on a thread whose stack can hold `--max-call-depth` nested calls
fn run_on_sized_stack(input: &Path, cli: &Cli) -> Result<bool> {
    let stack_size = interpreter_config(cli).stack_size();
    thread::scope(|scope| {
        thread::Builder::new()
            .name("kestrel-run".to_string())
            .stack_size(stack_size)
            .spawn_scoped(scope, || run_file(input, cli))
            .context("failed to start the interpreter thread")?
            .join()
            .map_err(|_| anyhow!("interpreter thread panicked"))?
    })
}

fn run_file(input: &Path, cli: &Cli) -> Result<bool> {
    let source = read_source(input)?;
    let mut feedback = RunFeedback::new(input.display().to_string());

    let mut interpreter = Interpreter::with_config(interpreter_config(cli));
    let stdout: Rc<RefCell<dyn Write>> = Rc::new(RefCell::new(io::stdout()));
    HostRegistry::for_interpreter(&interpreter, Rc::clone(&stdout))
        .install(&mut interpreter)
        .context("failed to install host functions")?;

    let mut parser = KestrelParser::with_config(&source, lexer_config(cli));
    let stats = interpreter.run_parser(&mut parser);
    stdout.borrow_mut().flush().context("failed to flush output")?;

    parser.drain_lexical_into(&mut feedback);
    parser.drain_syntax_into(&mut feedback);
    feedback.add_runtime_errors(interpreter.take_errors());
    feedback.stats = stats.into();

    report(&mut feedback, cli.format)
}

fn check_file(input: &Path, cli: &Cli) -> Result<bool> {
    let source = read_source(input)?;
    let mut feedback = RunFeedback::new(input.display().to_string());

    let mut parser = KestrelParser::with_config(&source, lexer_config(cli));
    for outcome in parser.by_ref() {
        if outcome.statement.is_none() || !outcome.success {
            feedback.stats.statements_skipped += 1;
        }
    }

    parser.drain_lexical_into(&mut feedback);
    parser.drain_syntax_into(&mut feedback);

    report(&mut feedback, cli.format)
}

fn dump_tokens(input: &Path, cli: &Cli) -> Result<bool> {
    let source = read_source(input)?;
    let mut feedback = RunFeedback::new(input.display().to_string());

    let mut lexer = Lexer::with_config(&source, lexer_config(cli));
    let mut out = io::stdout().lock();
    loop {
        let token = lexer.advance();
        lexer.report_to(&mut feedback);

        let value = match &token.value {
            Some(TokenValue::String(s)) => format!(" {:?}", s),
            Some(TokenValue::Integer(i)) => format!(" {}", i),
            Some(TokenValue::Float(f)) => format!(" {}", f),
            None => String::new(),
        };
        writeln!(out, "{} {}{}", token.span.start, token.kind, value)?;

        if token.kind == TokenKind::EndOfText {
            break;
        }
    }

    report(&mut feedback, cli.format)
}

/// Write diagnostics to stderr; true when no error was reported
fn report(feedback: &mut RunFeedback, format: Format) -> Result<bool> {
    feedback.sort();
    let mut err = io::stderr().lock();
    match format {
        Format::Text => {
            for diagnostic in &feedback.diagnostics {
                writeln!(err, "{}", diagnostic.to_text())?;
            }
        }
        Format::Json => writeln!(err, "{}", feedback.to_json())?,
    }
    Ok(feedback.success)
}
