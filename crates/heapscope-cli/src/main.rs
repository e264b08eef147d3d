//! Heapscope CLI tool
//!
//! Offline inspection of heap dump images: layout snapshot and per-object
//! field dumps.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use heapscope_cli::commands::{inspect, layout};
use heapscope_cli::output::{resolve_color_choice, StyledOutput};

#[derive(Parser)]
#[command(name = "heapscope")]
#[command(about = "Inspect objects in managed-runtime heap dump images", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// When to use colors: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the object layout captured from an image
    Layout {
        /// Dump image (JSON)
        image: PathBuf,
    },

    /// Decode the object at an address
    Inspect {
        /// Dump image (JSON)
        image: PathBuf,
        /// Object address, hex (0x...) or decimal
        address: String,
        /// Leave out header pseudo-fields
        #[arg(long)]
        no_vm_fields: bool,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));

    let result = match cli.command {
        Commands::Layout { image } => {
            log::debug!("layout command on {}", image.display());
            layout::execute(&image)
        }
        Commands::Inspect {
            image,
            address,
            no_vm_fields,
        } => {
            log::debug!("inspect command on {} at {}", image.display(), address);
            let options = inspect::InspectOptions {
                address,
                include_vm_fields: !no_vm_fields,
            };
            inspect::execute(&image, &options)
        }
    };

    match result {
        Ok(report) => out.report(&report),
        Err(err) => {
            out.error(&err);
            std::process::exit(1);
        }
    }
}
