//! mathfrag CLI - render LaTeX math fragments to HTML through KaTeX

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};
#[cfg(feature = "cli")]
use mathfrag::{
    diagnostics::{check_fragment, format_diagnostics},
    normalize, prepare, CacheStore, Config, Error, FileCache, Pipeline, Renderer,
};
#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::io::{self, Read};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::process::ExitCode;
#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "mathfrag")]
#[command(version)]
#[command(about = "Render LaTeX math fragments to display-mode HTML with KaTeX", long_about = None)]
struct Cli {
    /// Subcommand to run (defaults to `render`)
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    fragment: FragmentArgs,

    /// Split the input into several fragments at DELIM and join the outputs with it
    #[arg(long, value_name = "DELIM")]
    split: Option<String>,

    #[command(flatten)]
    global: GlobalArgs,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct GlobalArgs {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Cache file (overrides the configuration)
    #[arg(long, global = true, value_name = "FILE")]
    cache: Option<PathBuf>,

    /// Program used to run the renderer
    #[arg(long, global = true, value_name = "PROGRAM")]
    node: Option<String>,

    /// Renderer script passed to the program
    #[arg(long, global = true, value_name = "SCRIPT")]
    katex: Option<PathBuf>,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More log output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Where a fragment comes from
#[cfg(feature = "cli")]
#[derive(Args, Clone, Default)]
struct FragmentArgs {
    /// Input file path (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Use this text as the fragment instead of reading a file
    #[arg(long, conflicts_with = "input")]
    formula: Option<String>,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Render fragments to HTML (default action)
    Render {
        #[command(flatten)]
        fragment: FragmentArgs,

        /// Split the input into several fragments at DELIM and join the outputs with it
        #[arg(long, value_name = "DELIM")]
        split: Option<String>,
    },

    /// Print the normalized fragment (the cache key)
    Normalize {
        #[command(flatten)]
        fragment: FragmentArgs,
    },

    /// Print the fragment after normalization and macro expansion
    Expand {
        #[command(flatten)]
        fragment: FragmentArgs,
    },

    /// Check a fragment for problems without rendering it
    Check {
        #[command(flatten)]
        fragment: FragmentArgs,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Inspect or reset the fragment cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show version and configuration info
    Info,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum CacheAction {
    /// Number of entries and total size
    Stats,
    /// Remove every entry
    Clear,
    /// Print the cached HTML for a fragment
    Lookup {
        #[command(flatten)]
        fragment: FragmentArgs,
    },
}

#[cfg(feature = "cli")]
fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let config = load_config(&cli.global)?;

    match cli.command {
        None => render_command(&config, &cli.fragment, cli.split.as_deref()),
        Some(Commands::Render { fragment, split }) => {
            render_command(&config, &fragment, split.as_deref())
        }
        Some(Commands::Normalize { fragment }) => {
            let input = read_fragment(&fragment)?;
            println!("{}", normalize(&input));
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Expand { fragment }) => {
            let input = read_fragment(&fragment)?;
            match prepare(&input, config.expansion.max_substitutions) {
                Ok(prepared) => {
                    if !cli.global.quiet {
                        for warning in &prepared.expansion.warnings {
                            eprintln!("warning: {}", warning);
                        }
                    }
                    println!("{}", prepared.expanded());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Some(Commands::Check { fragment, no_color }) => {
            let input = read_fragment(&fragment)?;
            let result = check_fragment(&input, config.expansion.max_substitutions);
            println!("{}", format_diagnostics(&result, !no_color));

            Ok(if result.has_errors() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Some(Commands::Cache { action }) => cache_command(&config, action),
        Some(Commands::Info) => {
            print_info(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(feature = "cli")]
fn init_logging(args: &GlobalArgs) {
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_env("MATHFRAG_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Configuration file (if any) with command-line overrides applied
#[cfg(feature = "cli")]
fn load_config(args: &GlobalArgs) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => Config::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(ref path) = args.cache {
        config.cache.path = path.clone();
    }
    if let Some(ref program) = args.node {
        config.renderer.program = program.clone();
    }
    if let Some(ref script) = args.katex {
        config.renderer.script = Some(script.clone());
    }

    Ok(config)
}

#[cfg(feature = "cli")]
fn read_fragment(args: &FragmentArgs) -> Result<String> {
    if let Some(ref formula) = args.formula {
        return Ok(formula.clone());
    }

    let content = match args.input {
        Some(ref path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };

    // A trailing newline from the file or the shell is not part of the formula
    Ok(content.trim_end_matches(['\n', '\r']).to_string())
}

#[cfg(feature = "cli")]
fn open_cache(config: &Config) -> Result<FileCache> {
    FileCache::open(&config.cache.path)
        .with_context(|| format!("cannot use cache {}", config.cache.path.display()))
}

#[cfg(feature = "cli")]
fn render_command(config: &Config, fragment: &FragmentArgs, split: Option<&str>) -> Result<ExitCode> {
    let input = read_fragment(fragment)?;
    let pipeline = Pipeline::new(config.renderer.build())
        .with_max_substitutions(config.expansion.max_substitutions);

    let mut cache = open_cache(config)?;
    let (output, failures) = render_all(&pipeline, &mut cache, &input, split);
    cache.close().context("failed to save the fragment cache")?;

    println!("{}", output);

    if failures > 0 {
        if split.is_some() {
            eprintln!("{} fragment(s) failed to render", failures);
        }
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Render every fragment of `input`, returning the joined output and the
/// number of fragments that failed. A failed fragment contributes nothing.
#[cfg(feature = "cli")]
fn render_all<R: Renderer>(
    pipeline: &Pipeline<R>,
    cache: &mut FileCache,
    input: &str,
    split: Option<&str>,
) -> (String, usize) {
    let fragments: Vec<&str> = match split {
        Some(delim) if !delim.is_empty() => input.split(delim).collect(),
        _ => vec![input],
    };

    let mut failures = 0;
    let mut outputs = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        match pipeline.render(fragment, &mut *cache) {
            Ok(html) => outputs.push(html),
            Err(e) => {
                failures += 1;
                report_failure(fragment, &e);
                outputs.push(String::new());
            }
        }
    }

    (outputs.join(split.unwrap_or_default()), failures)
}

#[cfg(feature = "cli")]
fn report_failure(fragment: &str, error: &Error) {
    match error {
        Error::Render {
            failure,
            original,
            transformed,
        } => {
            eprintln!("error: {}", failure);
            eprintln!("BEFORE:\n{}", original);
            eprintln!("AFTER:\n{}", transformed);
        }
        other => {
            eprintln!("error: {}", other);
            eprintln!("BEFORE:\n{}", fragment);
        }
    }
}

#[cfg(feature = "cli")]
fn cache_command(config: &Config, action: CacheAction) -> Result<ExitCode> {
    let mut cache = open_cache(config)?;

    let code = match action {
        CacheAction::Stats => {
            println!("Cache:   {}", cache.path().display());
            println!("Entries: {}", cache.len());
            println!("Size:    {} bytes", cache.value_bytes());
            ExitCode::SUCCESS
        }
        CacheAction::Clear => {
            let removed = cache.len();
            cache.clear();
            println!("Removed {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
            ExitCode::SUCCESS
        }
        CacheAction::Lookup { fragment } => {
            let input = match read_fragment(&fragment) {
                Ok(input) => input,
                Err(e) => {
                    cache.close()?;
                    return Err(e);
                }
            };
            match cache.get(&normalize(&input)) {
                Some(html) => {
                    println!("{}", html);
                    ExitCode::SUCCESS
                }
                None => {
                    eprintln!("not cached");
                    ExitCode::FAILURE
                }
            }
        }
    };

    cache.close().context("failed to save the fragment cache")?;
    Ok(code)
}

#[cfg(feature = "cli")]
fn print_info(config: &Config) {
    let renderer = config.renderer.build();

    println!("mathfrag - LaTeX math fragments to HTML via KaTeX");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Renderer:  {} {}", renderer.program(), renderer.arguments().join(" "));
    println!("Cache:     {}", config.cache.path.display());
    println!("Max substitutions per macro: {}", config.expansion.max_substitutions);
    println!();
    println!("Pipeline:");
    println!("  1. normalize (delimiters, quotes, entities, environments)");
    println!("  2. cache lookup");
    println!("  3. \\def\\name#1{{...}} extraction and expansion");
    println!("  4. render with --display-mode");
    println!("  5. HTML patching");
    println!();
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Build with --features cli");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  cargo install mathfrag --features cli");
    eprintln!("  mathfrag [OPTIONS] [INPUT_FILE]");
}
