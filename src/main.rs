use clap::Parser;

use log::{error, info};

use smd2voc::{convert_legacy, convert_split, Args, MatFileSource, Mode};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let paths = match args.resolve_paths() {
        Ok(paths) => paths,
        Err(e) => {
            error!("Invalid arguments: {}", e);
            std::process::exit(2);
        }
    };

    info!("Starting the conversion process...");

    let result = match args.mode {
        Mode::Split => convert_split(&args, &paths, &MatFileSource),
        Mode::Legacy => convert_legacy(&args, &paths, &MatFileSource),
    };
    if let Err(e) = result {
        error!("Failed to convert dataset: {}", e);
        std::process::exit(1);
    }
}
