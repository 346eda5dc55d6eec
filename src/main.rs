//! Template Mailer CLI
//!
//! Usage:
//!   template-mailer compile [OPTIONS]
//!
//! Options:
//!   -i, --input <DIR>        Template source directory
//!   -o, --output <DIR>       Output directory
//!   -c, --css <FILE>         Stylesheet to inline
//!   -t, --template <NAME>    Compile only this template
//!       --config <FILE>      Configuration file (TOML format)
//!   -v, --verbose            Increase log verbosity (repeatable)

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use template_mailer::{CompileConfig, FailureKind, Pipeline};

#[derive(Parser)]
#[command(name = "template-mailer")]
#[command(about = "Preprocess Nunjucks email templates into inlined, table-based HTML")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile leaf templates into the output directory
    Compile {
        /// Template source directory
        #[arg(short, long, value_name = "DIR")]
        input: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Stylesheet to inline
        #[arg(short, long, value_name = "FILE")]
        css: Option<PathBuf>,

        /// Compile only this template (logical name, extension optional)
        #[arg(short, long, value_name = "NAME")]
        template: Option<String>,

        /// Configuration file (TOML format)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compile {
            input,
            output,
            css,
            template,
            config,
        } => {
            let mut compile_config = match &config {
                Some(path) => match CompileConfig::from_file(path) {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("Error loading config '{}': {}", path.display(), e);
                        std::process::exit(1);
                    }
                },
                None => CompileConfig::default(),
            };

            // Flags win over the config file
            if let Some(dir) = input {
                compile_config = compile_config.with_src_dir(dir);
            }
            if let Some(dir) = output {
                compile_config = compile_config.with_dist_dir(dir);
            }
            if let Some(path) = css {
                compile_config = compile_config.with_css_path(path);
            }
            if let Some(name) = template {
                compile_config = compile_config.with_template(name);
            }

            run_compile(compile_config);
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "template_mailer=info",
        1 => "template_mailer=debug",
        _ => "template_mailer=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_compile(config: CompileConfig) {
    let pipeline = match Pipeline::new(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let report = match pipeline.run() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    for compiled in &report.compiled {
        println!("{}", compiled.output_path.display());
    }

    for failure in &report.failures {
        match &failure.kind {
            FailureKind::Resolve(err) => {
                eprintln!("Error: failed to process {}", failure.name);
                eprintln!("{}", err.format().trim_end());
            }
            FailureKind::Write { .. } => eprintln!("Error: {}", failure),
        }
    }

    if !report.is_success() {
        std::process::exit(1);
    }
}
