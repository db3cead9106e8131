use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use colored::*;
use indicatif::ProgressBar;
use minidisk::{
    disk::{init::perform_disk_initialization, DEFAULT_BLOCK_COUNT},
    fs::config::MAX_BLOCK_COUNT,
};

use crate::shell::start_shell;

mod shell;

#[derive(Parser)]
#[command(name = "minidisk")]
#[command(about = "A tiny Unix-like file system inside a single disk image", long_about = None)]
struct Cli {
    /// Path of the disk image
    #[arg(short, long, default_value = "disk.img")]
    image: PathBuf,

    /// Number of 4 KB data blocks when a new image is formatted
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_BLOCK_COUNT,
        value_parser = clap::value_parser!(u32).range(1..=MAX_BLOCK_COUNT as i64)
    )]
    blocks: u32,

    /// Format the image even if it already exists
    #[arg(long)]
    format: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(80));

    let fs = perform_disk_initialization(&cli.image, cli.blocks, cli.format, |step| {
        spinner.set_message(step.to_string())
    });

    match fs {
        Ok(fs) => {
            spinner.finish_with_message("✅ Ready!");
            start_shell(fs);
            ExitCode::SUCCESS
        }
        Err(e) => {
            spinner.abandon();
            eprintln!(
                "{} {}: {}",
                "❌ Failed to open".red().bold(),
                cli.image.display(),
                e
            );
            ExitCode::FAILURE
        }
    }
}
