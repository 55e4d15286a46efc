use manifix::main_handler;

use ansi_term::Color::*;
use clap::{builder::styling::*, Parser, Subcommand};
use std::path::PathBuf;

mod custom_parse {
    use std::path::PathBuf;

    pub fn at_most_one_path(s: &str) -> Option<PathBuf> {
        if s.is_empty() {
            None
        } else {
            Some(PathBuf::from(s))
        }
    }

    pub fn at_most_one_string(s: &str) -> Option<String> {
        if s.is_empty() {
            None
        } else {
            Some(s.to_owned())
        }
    }

    pub fn optional_number<T: std::str::FromStr>(
        s: &str,
        option: &str,
    ) -> Result<Option<T>, String> {
        if s.is_empty() {
            Ok(None)
        } else {
            s.parse()
                .map(Some)
                .map_err(|_| format!("{} must be a number", option))
        }
    }
}

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default())
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Yellow.on_default())
}

#[derive(Parser)]
#[command(
    version,
    about = format!("{} with {}",
        Purple.bold().paint("Manifest repair"),
        Yellow.bold().paint("🔧 manifix"),
    ),
    long_about = None,
    styles = styles(),
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Repair a manifest file or directory until all oracles pass
    Repair {
        /// The manifest file (or directory of .json manifests) to repair
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,

        /// Directory to write repaired manifests to (blank to print)
        #[arg(short, long, value_name = "DIR", default_value = "")]
        out: String,

        /// Filename to use for the first repaired manifest (blank to keep)
        #[arg(long, value_name = "FILE", default_value = "")]
        output_filename: String,

        /// Maximum candidates per synthesis attempt (blank for config/default)
        #[arg(long, value_name = "N", default_value = "")]
        max_candidates: String,

        /// The (soft) time cutoff per synthesis attempt (in seconds)
        #[arg(short, long, value_name = "SECONDS", default_value = "")]
        timeout: String,

        /// Maximum verify/synthesize iterations (blank for config/default)
        #[arg(long, value_name = "N", default_value = "")]
        max_iters: String,

        /// Config file to use (blank for ./manifix.toml if present)
        #[arg(short, long, value_name = "FILE", default_value = "")]
        config: String,

        /// Fix Bank file to use (blank for config value, if any)
        #[arg(short, long, value_name = "FILE", default_value = "")]
        fixbank: String,

        /// Disable the Fix Bank entirely
        #[arg(long, action)]
        no_fixbank: bool,

        /// Whether or not to use "quiet" mode
        #[arg(short, long, action)]
        quiet: bool,
    },

    /// Check a manifest against all oracles without repairing it
    Check {
        /// The manifest file (or directory of .json manifests) to check
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,

        /// Config file to use (blank for ./manifix.toml if present)
        #[arg(short, long, value_name = "FILE", default_value = "")]
        config: String,
    },

    /// Inspect the entries of a Fix Bank file
    Bank {
        /// The Fix Bank file to inspect
        #[arg(short, long, value_name = "FILE")]
        fixbank: PathBuf,
    },

    /// Repair the bundled broken deployment (cold run, then warm run)
    Demo {
        /// Fix Bank file to use (blank for in-memory)
        #[arg(short, long, value_name = "FILE", default_value = "")]
        fixbank: String,

        /// Whether or not to use "quiet" mode
        #[arg(short, long, action)]
        quiet: bool,
    },
}

impl Command {
    pub fn handle(self) -> Result<(), String> {
        match self {
            Self::Repair {
                input,
                out,
                output_filename,
                max_candidates,
                timeout,
                max_iters,
                config,
                fixbank,
                no_fixbank,
                quiet,
            } => main_handler::repair(
                input,
                custom_parse::at_most_one_path(&out),
                custom_parse::at_most_one_string(&output_filename),
                custom_parse::optional_number(
                    &max_candidates,
                    "--max-candidates",
                )?,
                custom_parse::optional_number(&timeout, "--timeout")?,
                custom_parse::optional_number(&max_iters, "--max-iters")?,
                custom_parse::at_most_one_path(&config),
                custom_parse::at_most_one_path(&fixbank),
                no_fixbank,
                quiet,
            ),
            Self::Check { input, config } => main_handler::check(
                input,
                custom_parse::at_most_one_path(&config),
            ),
            Self::Bank { fixbank } => main_handler::bank(fixbank),
            Self::Demo { fixbank, quiet } => main_handler::demo(
                custom_parse::at_most_one_path(&fixbank),
                quiet,
            ),
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = cli.command.handle();

    match result {
        Ok(()) => (),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1)
        }
    }
}
