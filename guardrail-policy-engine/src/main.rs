// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Guardrail Policy CLI
//!
//! Loads a policy tree and evaluates JSON input against it, for writing and
//! debugging rules without going through the admission gateway.
//!
//! ```bash
//! # Check that every rule file parses
//! guardrail-policy -p policies/kubernetes check
//!
//! # Evaluate one package
//! guardrail-policy -p policies/gcp eval --package gcp.iam.bindings @binding.json
//!
//! # Evaluate every loaded package, input from stdin
//! cat review.json | guardrail-policy -p policies eval-all -
//!
//! # Same tree written in Rego
//! guardrail-policy --backend rego -p policies check
//!
//! # Interactive mode
//! guardrail-policy -p policies repl --package kubernetes.admission.pod
//! ```

use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use guardrail_policy_engine::policy::{
    BackendKind, EvaluationInput, EvaluationResult, Evaluator, PolicyLoadError, PolicyLoader,
    RuleBackend, Snapshot,
};
use guardrail_policy_engine::rego::RegoRuleBackend;
use guardrail_policy_engine::yaml::YamlRuleBackend;

#[derive(Parser)]
#[command(name = "guardrail-policy")]
#[command(version = guardrail_policy_engine::VERSION)]
#[command(about = "Load, check and evaluate guardrail policy trees")]
struct Cli {
    /// Policy directories to load (comma-separated or repeated)
    #[arg(
        short,
        long = "policies",
        env = "POLICY_DIRS",
        value_delimiter = ',',
        global = true,
        default_value = "policies"
    )]
    policies: Vec<PathBuf>,

    /// JSON document exposed to rules under `data`
    #[arg(long, env = "POLICY_DATA_FILE", global = true)]
    data: Option<PathBuf>,

    /// Rule language of the policy files: yaml or rego
    #[arg(short, long, env = "POLICY_BACKEND", global = true, default_value_t = BackendKind::Yaml)]
    backend: BackendKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that every policy file parses and validates
    Check,

    /// Evaluate one package against an input document
    Eval {
        /// Package path, e.g. kubernetes.admission.pod
        #[arg(short = 'k', long)]
        package: String,

        /// JSON text, @path to read a file, or - for stdin
        input: String,
    },

    /// Evaluate every loaded package against an input document
    EvalAll {
        /// JSON text, @path to read a file, or - for stdin
        input: String,
    },

    /// Read input documents line by line and print their verdicts
    Repl {
        /// Package to evaluate; every package when omitted
        #[arg(short = 'k', long)]
        package: Option<String>,
    },
}

const EXIT_VIOLATIONS: u8 = 1;
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    match cli.backend {
        BackendKind::Yaml => run(cli, YamlRuleBackend),
        BackendKind::Rego => run(cli, RegoRuleBackend),
    }
}

fn run<B: RuleBackend>(cli: Cli, backend: B) -> ExitCode {
    let loader = match build_loader(&cli, backend) {
        Ok(loader) => loader,
        Err(e) => return fail(e),
    };
    let snapshot = match loader.load(&cli.policies) {
        Ok(snapshot) => snapshot,
        Err(e) => return fail(e),
    };
    let evaluator = loader.evaluator();

    match cli.command {
        Command::Check => run_check(&snapshot),
        Command::Eval { package, input } => run_eval(&evaluator, &snapshot, &package, &input),
        Command::EvalAll { input } => run_eval_all(&evaluator, &snapshot, &input),
        Command::Repl { package } => run_repl(&loader, &cli.policies, snapshot, package),
    }
}

fn build_loader<B: RuleBackend>(cli: &Cli, backend: B) -> Result<PolicyLoader<B>, PolicyLoadError> {
    let loader = PolicyLoader::new(backend);
    match &cli.data {
        Some(path) => loader.with_data_file(path),
        None => Ok(loader),
    }
}

fn fail(error: impl std::fmt::Display) -> ExitCode {
    eprintln!("Error: {}", error);
    ExitCode::from(EXIT_ERROR)
}

/// Resolve an input argument: inline JSON, `@path`, or `-` for stdin.
fn read_input(arg: &str) -> Result<EvaluationInput, String> {
    let text = if arg == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("failed to read stdin: {}", e))?;
        buffer
    } else if let Some(path) = arg.strip_prefix('@') {
        fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path, e))?
    } else {
        arg.to_string()
    };
    parse_input(&text)
}

fn parse_input(text: &str) -> Result<EvaluationInput, String> {
    let document: Value =
        serde_json::from_str(text).map_err(|e| format!("input is not valid JSON: {}", e))?;
    EvaluationInput::from_document(document).map_err(|e| e.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}

fn run_check<M>(snapshot: &Snapshot<M>) -> ExitCode {
    println!(
        "OK: {} modules in {} packages",
        snapshot.module_count(),
        snapshot.package_count()
    );
    for package in snapshot.packages() {
        let sources: Vec<String> = snapshot
            .modules_in(package)
            .map(|m| m.source().display().to_string())
            .collect();
        println!("  {} ({})", package, sources.join(", "));
    }
    ExitCode::SUCCESS
}

fn run_eval<B: RuleBackend>(
    evaluator: &Evaluator<B>,
    snapshot: &Snapshot<B::Module>,
    package: &str,
    input: &str,
) -> ExitCode {
    let input = match read_input(input) {
        Ok(input) => input,
        Err(e) => return fail(e),
    };

    match evaluator.evaluate(snapshot, package, &input) {
        Ok(result) => {
            if !result.is_resolved() {
                eprintln!("Warning: no policy module declares package '{}'", package);
            }
            if let Err(e) = print_json(&result) {
                return fail(e);
            }
            exit_for(&result)
        }
        Err(e) => fail(e),
    }
}

#[derive(Serialize)]
struct PackageOutcome<'a> {
    package: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a EvaluationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn run_eval_all<B: RuleBackend>(
    evaluator: &Evaluator<B>,
    snapshot: &Snapshot<B::Module>,
    input: &str,
) -> ExitCode {
    let input = match read_input(input) {
        Ok(input) => input,
        Err(e) => return fail(e),
    };

    let results = evaluator.evaluate_all(snapshot, &input);
    let outcomes: Vec<PackageOutcome<'_>> = results
        .iter()
        .map(|(package, outcome)| PackageOutcome {
            package,
            result: outcome.as_ref().ok(),
            error: outcome.as_ref().err().map(ToString::to_string),
        })
        .collect();
    if let Err(e) = print_json(&outcomes) {
        return fail(e);
    }

    if results.iter().any(|(_, r)| r.is_err()) {
        ExitCode::from(EXIT_ERROR)
    } else if results
        .iter()
        .any(|(_, r)| r.as_ref().map(EvaluationResult::has_violations).unwrap_or(false))
    {
        ExitCode::from(EXIT_VIOLATIONS)
    } else {
        ExitCode::SUCCESS
    }
}

fn exit_for(result: &EvaluationResult) -> ExitCode {
    if result.has_violations() {
        ExitCode::from(EXIT_VIOLATIONS)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_repl<B: RuleBackend>(
    loader: &PolicyLoader<B>,
    roots: &[PathBuf],
    mut snapshot: Snapshot<B::Module>,
    mut package: Option<String>,
) -> ExitCode {
    let evaluator = loader.evaluator();

    println!("Guardrail Policy REPL");
    println!(
        "Loaded {} modules in {} packages",
        snapshot.module_count(),
        snapshot.package_count()
    );
    println!("Enter input documents as JSON, or :help for commands.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{}> ", package.as_deref().unwrap_or("*"));
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "quit" | "exit" | ":q" => break,
            ":help" => {
                println!(":packages          list loaded packages");
                println!(":package <name>    evaluate only <name>");
                println!(":all               evaluate every package");
                println!(":reload            reload the policy tree");
                println!("quit               leave");
                continue;
            }
            ":packages" => {
                for name in snapshot.packages() {
                    println!("  {}", name);
                }
                continue;
            }
            ":all" => {
                package = None;
                continue;
            }
            ":reload" => {
                match loader.load(roots) {
                    Ok(fresh) => {
                        snapshot = fresh;
                        println!("Reloaded {} modules", snapshot.module_count());
                    }
                    Err(e) => eprintln!("Reload failed, keeping previous policies: {}", e),
                }
                continue;
            }
            _ => {}
        }

        if let Some(name) = line.strip_prefix(":package ") {
            package = Some(name.trim().to_string());
            continue;
        }

        let input = match parse_input(line) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("Parse error: {}", e);
                continue;
            }
        };

        match &package {
            Some(name) => match evaluator.evaluate(&snapshot, name, &input) {
                Ok(result) => print_verdict(&result),
                Err(e) => eprintln!("ERROR {}: {}", name, e),
            },
            None => {
                for (name, outcome) in evaluator.evaluate_all(&snapshot, &input) {
                    match outcome {
                        Ok(result) => print_verdict(&result),
                        Err(e) => eprintln!("ERROR {}: {}", name, e),
                    }
                }
            }
        }
    }

    ExitCode::SUCCESS
}

fn print_verdict(result: &EvaluationResult) {
    if !result.is_resolved() {
        println!("{}: unresolved", result.package());
        return;
    }
    if !result.has_violations() && result.warn_count() == 0 {
        println!("{}: OK", result.package());
        return;
    }
    println!(
        "{}: {} violations, {} warnings",
        result.package(),
        result.fail_count(),
        result.warn_count()
    );
    for finding in result.violations().iter().chain(result.warnings()) {
        println!("  {}", finding);
    }
}
