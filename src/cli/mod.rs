use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;

use crate::ast::Module;
use crate::driver::{Driver, Targets};
use crate::engine::ProgramState;
use crate::trace::printer::SymStmtPrinter;

#[derive(Parser)]
pub(crate) struct Opts {
    #[clap(subcommand)]
    subcmd: Subcommand,
}

#[derive(Parser)]
pub(crate) enum Subcommand {
    /// Extract per-target call traces from a module.
    Extract {
        program: PathBuf,
        /// Target map: one `<opLabel> <funcName>` per line.
        #[clap(long)]
        config: PathBuf,
        #[clap(long, default_value = "out")]
        out_dir: PathBuf,
    },
    /// Pretty-print a module's functions (no analysis state attached).
    DumpAst {
        program: PathBuf,
        function: Option<String>,
    },
}

fn parse_program(path: &Path) -> Result<Module> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("error loading '{}'", path.display()))?;
    Module::from_json(&data).with_context(|| format!("error parsing '{}'", path.display()))
}

pub(crate) fn main() {
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .ok();

    let opts: Opts = Opts::parse();
    if let Err(err) = run(opts) {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(opts: Opts) -> Result<()> {
    match opts.subcmd {
        Subcommand::Extract {
            program,
            config,
            out_dir,
        } => {
            let module = parse_program(&program)?;
            let targets = Targets::load(&config)?;
            log::info!("loaded {} target(s) from '{}'", targets.len(), config.display());
            if targets.is_empty() {
                eprintln!(
                    "{} no targets in '{}'",
                    "warning:".yellow().bold(),
                    config.display()
                );
            }
            let written = Driver::new(&module, targets, out_dir).run()?;
            println!("{written} trace file(s) written");
        }
        Subcommand::DumpAst { program, function } => {
            let module = parse_program(&program)?;
            let state = ProgramState::new();
            let mut printed = 0;
            for func in &module.functions {
                if let Some(name) = &function {
                    if &func.name != name {
                        continue;
                    }
                }
                let Some(body) = &func.body else { continue };
                println!("// {}", func.loc);
                let mut text = String::new();
                SymStmtPrinter::new(&mut text, &state, false).print_stmt(body);
                print!("{}()\n{text}", func.name);
                printed += 1;
            }
            if printed == 0 {
                bail!("no matching function with a body");
            }
        }
    }
    Ok(())
}
