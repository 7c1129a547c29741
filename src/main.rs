use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use fiddle::{
    parse_abc, parse_abc_file, parse_abc_file_with, AbcEngine, ParseConfig, RepeatMode, Tune,
};
use log::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};
use std::{env, process};

/// Structure ABC folk tunes into sections and playback notes.
///
/// Logging is controlled with RUST_LOG; see docs for the env_logger crate.
/// If RUST_LOG is not set, only warnings are shown.
#[derive(Parser)]
#[command(name = "fiddle", version, about, long_about = None, verbatim_doc_comment)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an ABC file and print the tune as JSON
    Parse {
        /// ABC file to read
        file: PathBuf,
        /// Tune id (default: file name without extension)
        #[arg(long)]
        id: Option<String>,
        /// YAML settings file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Keep repeats as written instead of playing them out
        #[arg(long)]
        written_repeats: bool,
        /// Print JSON on one line
        #[arg(long)]
        compact: bool,
    },
    /// Show the sections detected in an ABC file
    Sections {
        /// ABC file to read
        file: PathBuf,
    },
    /// List every .abc file in a directory
    List {
        /// Directory to scan
        dir: PathBuf,
    },
    /// List the built-in tunes, or parse one by name
    Builtin {
        /// Tune id
        name: Option<String>,
        /// Print JSON on one line
        #[arg(long)]
        compact: bool,
    },
}

fn print_tune(tune: &Tune, compact: bool) -> anyhow::Result<()> {
    let json = if compact {
        serde_json::to_string(tune)?
    } else {
        serde_json::to_string_pretty(tune)?
    };
    println!("{}", json);
    Ok(())
}

fn parse_command(
    file: &Path,
    id: Option<String>,
    config: Option<PathBuf>,
    written_repeats: bool,
    compact: bool,
) -> anyhow::Result<()> {
    let mut config = match config {
        Some(path) => ParseConfig::from_yaml_file(&path)?,
        None => ParseConfig::default(),
    };
    if written_repeats {
        config.engine.repeats = RepeatMode::Written;
    }

    let engine = AbcEngine::from_config(&config.engine);
    let mut tune = parse_abc_file_with(file, &engine, &config)?;
    if let Some(id) = id {
        tune.id = id;
    }
    print_tune(&tune, compact)
}

fn sections_command(file: &Path) -> anyhow::Result<()> {
    let abc = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let (sections, strategy) =
        fiddle::section::detect_sections_detailed(&abc, &Default::default());
    println!("strategy: {:?}", strategy);
    for section in sections {
        println!(
            "{}\tmeasures {}-{}\tx{}{}",
            section.name,
            section.start_measure,
            section.end_measure,
            section.repeat,
            if section.next_has_pickup {
                "\tnext has pickup"
            } else {
                ""
            }
        );
    }
    Ok(())
}

fn list_command(dir: &Path) -> anyhow::Result<()> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "abc"))
        .collect();
    paths.sort();

    for path in paths {
        match parse_abc_file(&path) {
            Ok(tune) => {
                let summary = tune.summary();
                println!("{}\t{}\t{}", summary.id, summary.key, summary.title);
            }
            Err(e) => eprintln!("skipping {}: {}", path.display(), e),
        }
    }
    Ok(())
}

fn builtin_command(name: Option<String>, compact: bool) -> anyhow::Result<()> {
    match name {
        None => {
            for id in fiddle_tunes::list_tunes() {
                println!("{}", id);
            }
            Ok(())
        }
        Some(name) => {
            let embedded = fiddle_tunes::get_tune(&name)
                .ok_or_else(|| anyhow!("no built-in tune named '{}'", name))?;
            let tune = parse_abc(embedded.abc, embedded.id)?;
            print_tune(&tune, compact)
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut log_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        log_builder.filter_level(LevelFilter::Warn);
    }
    log_builder.init();

    match cli.command {
        Commands::Parse {
            file,
            id,
            config,
            written_repeats,
            compact,
        } => parse_command(&file, id, config, written_repeats, compact),
        Commands::Sections { file } => sections_command(&file),
        Commands::List { dir } => list_command(&dir),
        Commands::Builtin { name, compact } => builtin_command(name, compact),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
