//! PSC CLI - компиляция и запуск псевдокода, интерактивная оболочка.
//!
//! Использование:
//!   psc              - запустить REPL
//!   psc <file.psc>   - скомпилировать и выполнить файл
//!   psc -e "src"     - скомпилировать и выполнить строку
//!   psc --help       - справка

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::env;
use std::fs;
use std::process;
use std::time::Duration;

use psc_lang::codegen::listing;
use psc_lang::diagnostics::group_by_phase;
use psc_lang::{Compilation, CompileOptions, CompileOutcome, Compiler, Diagnostic, Phase};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP: &str = r#"
PSC - Spanish-keyword pseudocode compiler

USAGE:
    psc                      Start REPL (interactive mode)
    psc <file.psc>           Compile and run a file
    psc -e "<source>"        Compile and run a source string
    psc --help, -h           Show this help
    psc --version, -v        Show version

OPTIONS:
    --emit <stage>           Print an intermediate artifact instead of running:
                             tokens, ast, tac, opt, py
    --json                   Print the run outcome as JSON
    --no-opt                 Disable dead-code elimination
    --timeout <ms>           Execution timeout in milliseconds (default 5000)

REPL COMMANDS:
    :help, :h                Show help
    :quit, :q, :exit         Exit REPL
    :run, :r                 Compile and run the buffered program
    :show, :s                Show the buffered program
    :clear, :c               Clear the buffer
    :emit <stage>            Show an artifact of the buffered program
    :load <file>             Load a file and run it

    A line consisting of 'fin' runs the buffer automatically.

EXAMPLE:
    inicio
      entero n = 3;
      para i desde 1 hasta n hacer
        mostrar("i =", i);
      fin_para
    fin
"#;

/// Что показать вместо запуска.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    Tokens,
    Ast,
    Tac,
    Opt,
    Py,
}

impl Emit {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "tokens" => Some(Emit::Tokens),
            "ast" => Some(Emit::Ast),
            "tac" => Some(Emit::Tac),
            "opt" => Some(Emit::Opt),
            "py" | "python" => Some(Emit::Py),
            _ => None,
        }
    }
}

enum Input {
    Repl,
    File(String),
    Source(String),
}

struct Cli {
    input: Input,
    options: CompileOptions,
    emit: Option<Emit>,
    json: bool,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(Some(cli)) => cli,
        Ok(None) => return,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!("Use --help for usage information.");
            process::exit(1);
        }
    };

    let compiler = Compiler::new(cli.options);
    let source = match cli.input {
        Input::Repl => return run_repl(compiler),
        Input::Source(source) => source,
        Input::File(path) => match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("Error reading '{}': {}", path, e);
                process::exit(1);
            }
        },
    };

    let ok = match cli.emit {
        Some(emit) => emit_artifact(&compiler.compile(&source), emit),
        None => {
            let outcome = compiler.compile_and_run(&source);
            if cli.json {
                print_json(&outcome);
            } else {
                print_outcome(&outcome);
            }
            outcome.is_success()
        }
    };
    if !ok {
        process::exit(1);
    }
}

/// Разобрать аргументы. `Ok(None)` - справка или версия уже напечатаны.
fn parse_args(args: &[String]) -> Result<Option<Cli>, String> {
    let mut cli = Cli {
        input: Input::Repl,
        options: CompileOptions::default(),
        emit: None,
        json: false,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("{}", HELP);
                return Ok(None);
            }
            "--version" | "-v" => {
                println!("PSC {}", VERSION);
                return Ok(None);
            }
            "-e" | "--eval" => {
                let source = iter.next().ok_or("Missing source after -e")?;
                cli.input = Input::Source(source.clone());
            }
            "--emit" => {
                let stage = iter.next().ok_or("Missing stage after --emit")?;
                cli.emit =
                    Some(Emit::parse(stage).ok_or_else(|| format!("Unknown stage: {}", stage))?);
            }
            "--json" => cli.json = true,
            "--no-opt" => cli.options.optimize = false,
            "--timeout" => {
                let ms = iter.next().ok_or("Missing value after --timeout")?;
                let ms: u64 = ms
                    .parse()
                    .map_err(|_| format!("Invalid timeout: {}", ms))?;
                cli.options.timeout = Duration::from_millis(ms);
            }
            other if other.starts_with('-') => return Err(format!("Unknown option: {}", other)),
            file => {
                if !matches!(cli.input, Input::Repl) {
                    return Err("Too many inputs.".to_string());
                }
                cli.input = Input::File(file.to_string());
            }
        }
    }
    Ok(Some(cli))
}

/// Вывод программы, затем диагностики по стадиям.
fn print_outcome(outcome: &CompileOutcome) {
    print!("{}", outcome.captured_output);
    print_diagnostics(&outcome.diagnostics);
}

fn print_diagnostics<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) {
    for (phase, group) in group_by_phase(diagnostics) {
        eprintln!("{} errors:", phase_title(phase));
        for diagnostic in group {
            if diagnostic.line == 0 {
                eprintln!("  {}", diagnostic.message);
            } else {
                eprintln!("  Line {}: {}", diagnostic.line, diagnostic.message);
            }
        }
    }
}

fn phase_title(phase: Phase) -> &'static str {
    match phase {
        Phase::Lexical => "Lexical",
        Phase::Syntactic => "Syntax",
        Phase::Semantic => "Semantic",
        Phase::Codegen => "Code generation",
        Phase::Translation => "Translation",
        Phase::Execution => "Execution",
    }
}

fn print_json(outcome: &CompileOutcome) {
    match serde_json::to_string_pretty(outcome) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing outcome: {}", e),
    }
}

/// Напечатать артефакт стадии. Возвращает `false`, если были диагностики.
fn emit_artifact(compilation: &Compilation, emit: Emit) -> bool {
    match emit {
        Emit::Tokens => {
            for token in &compilation.tokens {
                println!("{}", token);
            }
        }
        Emit::Ast => println!("{:#?}", compilation.program),
        Emit::Tac => print!("{}", listing(&compilation.ir)),
        Emit::Opt => print!("{}", listing(&compilation.optimized)),
        Emit::Py => {
            if let Some(translation) = &compilation.translation {
                print!("{}", translation.source);
            }
        }
    }
    print_diagnostics(compilation.diagnostics.iter());
    compilation.diagnostics.is_empty()
}

/// Запустить REPL.
fn run_repl(compiler: Compiler) {
    println!("PSC {} - pseudocode compiler", VERSION);
    println!("Type a program line by line; 'fin' or :run executes it. :help for commands.\n");

    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Failed to initialize readline: {}", e);
            process::exit(1);
        }
    };

    let history_path = dirs_next::data_dir()
        .map(|p| p.join("psc").join("history.txt"))
        .unwrap_or_else(|| std::path::PathBuf::from(".psc_history"));

    // Загрузить историю
    let _ = rl.load_history(&history_path);

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "psc> " } else { "...> " };
        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                if trimmed.starts_with(':') {
                    match handle_command(trimmed, &mut buffer, &compiler) {
                        CommandResult::Continue => continue,
                        CommandResult::Exit => break,
                    }
                }

                buffer.push_str(&line);
                buffer.push('\n');
                if trimmed == "fin" {
                    run_buffer(&mut buffer, &compiler);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                buffer.clear();
            }
            Err(ReadlineError::Eof) => {
                println!("Adiós!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    // Сохранить историю
    if let Some(parent) = history_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&history_path);
}

enum CommandResult {
    Continue,
    Exit,
}

fn handle_command(cmd: &str, buffer: &mut String, compiler: &Compiler) -> CommandResult {
    let (command, arg) = match cmd.split_once(' ') {
        Some((command, arg)) => (command, Some(arg.trim())),
        None => (cmd, None),
    };

    match command {
        ":help" | ":h" => println!("{}", HELP),
        ":quit" | ":q" | ":exit" => return CommandResult::Exit,
        ":run" | ":r" => run_buffer(buffer, compiler),
        ":show" | ":s" => {
            if buffer.is_empty() {
                println!("Buffer is empty.");
            } else {
                print!("{}", buffer);
            }
        }
        ":clear" | ":c" => {
            buffer.clear();
            println!("Buffer cleared.");
        }
        ":emit" => match arg.and_then(Emit::parse) {
            Some(emit) => {
                emit_artifact(&compiler.compile(buffer), emit);
            }
            None => println!("Usage: :emit tokens|ast|tac|opt|py"),
        },
        ":load" | ":l" => match arg {
            Some(path) => match fs::read_to_string(path) {
                Ok(source) => {
                    println!("Loading {}...", path);
                    *buffer = source;
                    run_buffer(buffer, compiler);
                }
                Err(e) => eprintln!("Error reading '{}': {}", path, e),
            },
            None => println!("Usage: :load <file.psc>"),
        },
        _ => {
            println!("Unknown command: {}", command);
            println!("Type :help for available commands.");
        }
    }
    CommandResult::Continue
}

fn run_buffer(buffer: &mut String, compiler: &Compiler) {
    if buffer.trim().is_empty() {
        println!("Nothing to run.");
        return;
    }
    let outcome = compiler.compile_and_run(buffer);
    print_outcome(&outcome);
    buffer.clear();
}
