use anyhow::{Context, anyhow, bail};
use ecmdb_expr::config::Config;
use ecmdb_expr::{Evaluator, ExpressionError, Number, SequenceCatalog, can_parse};
use hipstr::HipStr;
use log::{error, info};
use serde::Serialize;
use std::io::{BufRead, stdin};
use std::path::PathBuf;
use std::process::ExitCode;

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const USAGE: &str =
    "usage: ecmdb-expr [--check] [--json] [--sequence-dir DIR] [--log LEVEL] [EXPR...]";

#[derive(Debug, Default, PartialEq)]
struct Options {
    check_only: bool,
    json: bool,
    help: bool,
    config: Config,
    expressions: Vec<String>,
}

/// Unrecognized arguments are expressions, so `-9` needs no `--` in front of it.
fn parse_args(args: impl IntoIterator<Item = String>, config: Config) -> anyhow::Result<Options> {
    let mut options = Options {
        config,
        ..Options::default()
    };
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--check" => options.check_only = true,
            "--json" => options.json = true,
            "--help" | "-h" => options.help = true,
            "--sequence-dir" => {
                let dir = args.next().context("--sequence-dir needs a directory")?;
                options.config.sequence_dir = Some(PathBuf::from(dir));
            }
            "--log" => {
                let level = args.next().context("--log needs a level")?;
                options.config.log_level = HipStr::from(level);
            }
            "--" => {
                options.expressions.extend(args.by_ref());
            }
            _ => options.expressions.push(arg),
        }
    }
    Ok(options)
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    expression: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> Report<'a> {
    fn checked(expression: &'a str, parsed: bool) -> Self {
        Report {
            expression,
            value: None,
            kind: if parsed { "parsed" } else { "syntax-error" },
            error: None,
        }
    }

    fn evaluated(expression: &'a str, result: &Result<Number, ExpressionError>) -> Self {
        match result {
            Ok(value) => Report {
                expression,
                value: Some(value.to_string()),
                kind: if value.is_integer() {
                    "integer"
                } else {
                    "real"
                },
                error: None,
            },
            Err(e) => Report {
                expression,
                value: None,
                kind: match e {
                    ExpressionError::Syntax(_) => "syntax-error",
                    ExpressionError::Evaluation(_) => "evaluation-error",
                },
                error: Some(e.to_string()),
            },
        }
    }

    fn failed(&self) -> bool {
        self.kind.ends_with("error")
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let options = parse_args(std::env::args().skip(1), Config::from_env())?;
    if options.help {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }
    simple_log::console(options.config.log_level.as_str()).map_err(|e| anyhow!(e))?;

    let mut expressions = options.expressions;
    if expressions.is_empty() {
        for line in stdin().lock().lines() {
            let line = line.context("Failed to read expressions from stdin")?;
            let line = line.trim();
            if !line.is_empty() {
                expressions.push(line.to_owned());
            }
        }
    }
    if expressions.is_empty() {
        bail!("{USAGE}");
    }

    let catalog = SequenceCatalog::with_defaults(options.config.sequence_dir.clone());
    let evaluator = Evaluator::new(&catalog);
    let mut failures = 0usize;
    for expression in &expressions {
        let report = if options.check_only {
            Report::checked(expression, can_parse(expression))
        } else {
            Report::evaluated(expression, &evaluator.evaluate_text(expression))
        };
        if report.failed() {
            failures += 1;
        }
        if options.json {
            println!("{}", serde_json::to_string(&report)?);
        } else if let Some(e) = &report.error {
            error!("{expression}: {e}");
        } else if let Some(value) = &report.value {
            println!("{value}");
        } else if report.failed() {
            error!("{expression}: does not parse");
        } else {
            println!("{expression}: ok");
        }
    }
    info!("{} of {} expressions succeeded", expressions.len() - failures, expressions.len());
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
