use anyhow::Context as _;
use clap::Parser;
use parsegen::{
    codegen::{Codegen, Config, ConflictPolicy},
    sets::{self, Mode},
};
use std::{ffi::OsString, fs, path::PathBuf, time::Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Compute FOLLOW sets as well as FIRST sets.
    #[arg(long)]
    follow: bool,

    /// Fail when two expansions of a symbol are predicted by the same terminal.
    #[arg(long)]
    deny_conflicts: bool,

    /// Write the analyzed grammar next to the output, with the `.grammar` extension.
    #[arg(long)]
    dump: bool,

    /// Run the generated parser through clang-format, if available.
    #[arg(long)]
    format: bool,

    /// Specify the path of generated .c file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// The path of grammar definition file.
    input: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!("parsed CLI args = {:?}", args);

    process_file(&args)
        .with_context(|| anyhow::anyhow!("errored during processing {}", args.input.display()))?;

    Ok(())
}

fn process_file(args: &Args) -> anyhow::Result<()> {
    let in_file = fs::canonicalize(&args.input) //
        .context("failed to canonicalize the input file name")?;

    let out_file = args
        .output
        .clone()
        .unwrap_or_else(|| in_file.with_extension("c"));
    let backup_file = {
        let mut name = OsString::from(out_file.as_os_str());
        name.push(".bak");
        PathBuf::from(name)
    };

    let source = fs::read_to_string(&in_file).context("failed to read the grammar file")?;

    let s = Instant::now();
    let mut grammar = parsegen::syntax::parse(&source)?;
    tracing::info!("parse: {:?} elapsed", s.elapsed());

    let mode = if args.follow { Mode::Follow } else { Mode::Legacy };
    let s = Instant::now();
    sets::compute(&mut grammar, mode).map_err(parsegen::Error::from)?;
    tracing::info!("compute_sets: {:?} elapsed", s.elapsed());

    let policy = if args.deny_conflicts {
        ConflictPolicy::Deny
    } else {
        ConflictPolicy::Warn
    };
    let s = Instant::now();
    let codegen = Codegen::new(&grammar, &Config::new().conflicts(policy))
        .map_err(parsegen::Error::from)?;
    tracing::info!("codegen: {:?} elapsed", s.elapsed());

    let mut empty_predictions = vec![];
    for routine in &codegen.routines {
        for branch in &routine.branches {
            if branch.predictions.is_empty() {
                empty_predictions.push(format!("{}#{}", routine.symbol, branch.expansion));
            }
        }
    }
    if !empty_predictions.is_empty() {
        println!(
            "[warning] The following expansions can never be selected: {:?}",
            empty_predictions
        );
    }

    let mut generated: Vec<u8> = codegen.to_string().into();

    if args.format {
        let sh = xshell::Shell::new()?;
        let res = xshell::cmd!(sh, "clang-format --assume-filename=parser.c")
            .quiet()
            .stdin(&generated)
            .output();
        match res {
            Ok(output) if output.status.success() => generated = output.stdout,
            Ok(output) => tracing::debug!("clang-format exited with {}", output.status),
            Err(err) => tracing::debug!("clang-format is not available: {}", err),
        }
    }

    // dump results.
    if args.dump {
        let dump_file = out_file.with_extension("grammar");
        fs::write(&dump_file, grammar.to_string()).with_context(|| {
            anyhow::anyhow!("failed to write the analyzed grammar to {}", dump_file.display())
        })?;
    }
    if out_file.exists() {
        fs::copy(&out_file, &backup_file).with_context(|| {
            anyhow::anyhow!(
                "failed to backup the output file to {}",
                backup_file.display()
            )
        })?;
    }
    fs::write(&out_file, &generated).with_context(|| {
        anyhow::anyhow!("failed to write generated parser to {}", out_file.display())
    })?;

    Ok(())
}
