use clap::Parser;
use minipy::cli::{generate_completions, AppConfig, Args, Commands};
use minipy::diagnostic::render_diagnostics;
use minipy::interpreter;
use minipy::lexer::Lexer;
use minipy::object::SimpleContext;
use minipy::Context;
use owo_colors::OwoColorize;
use std::io::{self, Read, Write};
use std::path::Path;

fn main() {
    let args = Args::parse();

    if let Some(Commands::Complete { shell }) = args.command {
        generate_completions(shell);
        return;
    }

    let config = AppConfig::from_args(&args);
    verbose_log(&config, "Starting minipy");

    let (source, file_name) = match read_source(&args, &config) {
        Ok(pair) => pair,
        Err(e) => {
            error_message(&config, &e);
            std::process::exit(1);
        }
    };
    verbose_log(
        &config,
        &format!("Read {} bytes of source", source.len()),
    );

    if args.tokens {
        dump_tokens(&source, &file_name, &config);
        return;
    }

    run_program(&source, &file_name, &config);
}

fn read_source(args: &Args, config: &AppConfig) -> Result<(String, String), String> {
    if let Some(path) = &args.script {
        verbose_log(
            config,
            &format!("Reading script from file: {}", path.display()),
        );
        Ok((read_file(path)?, path.display().to_string()))
    } else if let Some(code) = &args.eval {
        verbose_log(config, "Reading program from the command line");
        Ok((code.clone(), "<eval>".to_string()))
    } else {
        verbose_log(config, "Reading program from stdin");
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;

        if buffer.trim().is_empty() {
            return Err(
                "No program provided. Pass a script path, --eval, or source via stdin".to_string(),
            );
        }

        Ok((buffer, "<stdin>".to_string()))
    }
}

fn dump_tokens(source: &str, file_name: &str, config: &AppConfig) {
    verbose_log(config, "Dumping the token stream");
    match Lexer::new(source) {
        Ok(lexer) => {
            let mut stdout = io::stdout();
            for token in lexer.tokens() {
                let _ = writeln!(stdout, "{}", token.kind);
            }
            let _ = stdout.flush();
        }
        Err(e) => {
            let rendered = render_diagnostics(
                source,
                file_name,
                &[e.to_diagnostic()],
                config.color_enabled,
            );
            eprint!("{}", rendered);
            std::process::exit(1);
        }
    }
}

fn run_program(source: &str, file_name: &str, config: &AppConfig) {
    verbose_log(config, "Parsing and running the program");

    let stdout = io::stdout();
    let mut ctx = SimpleContext::new(stdout.lock());
    let result = interpreter::parse_and_run_with_diagnostics(source, &mut ctx);
    let _ = ctx.output().flush();
    drop(ctx);

    match result {
        Ok(()) => verbose_log(config, "Program finished"),
        Err(diagnostics) => {
            let rendered =
                render_diagnostics(source, file_name, &diagnostics, config.color_enabled);
            eprint!("{}", rendered);
            std::process::exit(1);
        }
    }
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn verbose_log(config: &AppConfig, message: &str) {
    if config.verbose {
        eprintln!("[minipy:debug] {}", message);
    }
}

fn error_message(config: &AppConfig, message: &str) {
    if config.color_enabled {
        eprintln!("{}", message.red().bold());
    } else {
        eprintln!("{}", message);
    }
}
