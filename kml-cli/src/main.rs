use std::io::{self, BufRead};
use std::path::PathBuf;

use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use clap::Parser as ClapParser;
use env_logger::Env;
use kml::{Config, Error, Kml, PrettyTrace};
use log::{info, warn};

#[derive(ClapParser)]
#[command(version, about = "Evaluate KML matrix and scalar expressions")]
pub struct Arguments {
    /// Program text. Without it, every line of standard input is run as its
    /// own program.
    program: Option<String>,

    /// Read the program from a file
    #[arg(short, long, conflicts_with = "program")]
    file: Option<PathBuf>,

    /// Bind a matrix before running, e.g. `--bind 'm=identity(2,2)'`
    #[arg(short, long = "bind", value_name = "NAME=EXPR")]
    bind: Vec<String>,

    /// Print the fully parenthesized program instead of its value
    #[arg(long, conflicts_with_all = ["compact", "trace"])]
    brackets: bool,

    /// Print the program as written, without redundant spacing
    #[arg(long, conflicts_with = "trace")]
    compact: bool,

    /// Print a structured trace of the program
    #[arg(long)]
    trace: bool,

    /// Leave evaluated values out of the trace
    #[arg(long, requires = "trace")]
    no_results: bool,

    /// List the available functions and exit
    #[arg(long)]
    functions: bool,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy)]
enum Output {
    Value,
    Compact,
    Brackets,
    Trace,
}

impl Arguments {
    fn output(&self) -> Output {
        if self.brackets {
            Output::Brackets
        } else if self.compact {
            Output::Compact
        } else if self.trace {
            Output::Trace
        } else {
            Output::Value
        }
    }
}

fn main() {
    let args = Arguments::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let mut config = match &args.config {
        Some(path) => {
            let text = read(path);
            Config::from_toml_str(&text).unwrap_or_else(|err| {
                report(&path.display().to_string(), &text, &err);
                std::process::exit(1);
            })
        }
        None => Config::default(),
    };
    if args.no_results {
        config.include_results = false;
    }
    let mut kml = Kml::with_config(config);

    if args.functions {
        for (signature, help) in kml.functions().help() {
            println!("{signature:<40} {help}");
        }
        return;
    }

    for binding in &args.bind {
        let Some((name, code)) = binding.split_once('=') else {
            eprintln!("error: expected NAME=EXPR, found `{binding}`");
            std::process::exit(1);
        };
        if let Err(err) = kml.bind(name.trim(), code) {
            report("--bind", code, &err);
            std::process::exit(1);
        }
        info!("Bound `{}` from the command line", name.trim());
    }

    let output = args.output();
    let succeeded = match (&args.program, &args.file) {
        (Some(program), _) => execute(&mut kml, "<program>", program, output),
        (None, Some(path)) => {
            let text = read(path);
            execute(&mut kml, &path.display().to_string(), &text, output)
        }
        (None, None) => {
            let mut succeeded = true;
            for (index, line) in io::stdin().lock().lines().enumerate() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        eprintln!("error: cannot read standard input: {err}");
                        std::process::exit(1);
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let origin = format!("<stdin>:{}", index + 1);
                succeeded &= execute(&mut kml, &origin, &line, output);
            }
            succeeded
        }
    };
    if !succeeded {
        std::process::exit(1);
    }
}

fn read(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("error: cannot read {}: {err}", path.display());
        std::process::exit(1);
    })
}

/// Run one program and print what was asked for. Errors are reported here.
fn execute(kml: &mut Kml, origin: &str, text: &str, output: Output) -> bool {
    let outcome = match output {
        Output::Value => kml.run(text).map(|value| {
            if let Some(value) = value {
                println!("{value}");
            }
        }),
        Output::Compact => kml
            .parse(text)
            .map(|program| println!("{}", program.render_compact())),
        Output::Brackets => kml
            .parse(text)
            .map(|program| println!("{}", program.render_fully_parenthesized())),
        Output::Trace => kml.trace(text).map(|trace| {
            if let Err(err) = trace.pretty_print() {
                warn!("Failed to print trace: {err}");
            }
        }),
    };
    match outcome {
        Ok(()) => true,
        Err(err) => {
            report(origin, text, &err);
            false
        }
    }
}

fn report(origin: &str, text: &str, error: &Error) {
    let Error::Syntax { message, offset } = error else {
        eprintln!("error: {error}");
        return;
    };

    let mut colors = ColorGenerator::new();
    let length = text.chars().count();
    let start = (*offset).min(length);
    let span = (origin.to_string(), start..(start + 1).min(length));

    let printed = Report::build(ReportKind::Error, span.clone())
        .with_message("Syntax error")
        .with_label(
            Label::new(span)
                .with_message(message)
                .with_color(colors.next()),
        )
        .finish()
        .eprint((origin.to_string(), Source::from(text.to_string())));
    if printed.is_err() {
        eprintln!("error: {error}");
    }
}
