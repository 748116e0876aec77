use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "heic2jpg",
    version,
    about = "Convert a HEIC image to JPEG, keeping its EXIF metadata"
)]
struct Cli {
    /// HEIC file to read
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// JPEG file to write (created or overwritten)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    if let Err(e) = heic2jpg::convert(&cli.input, &cli.output) {
        log::error!("{:#}", anyhow::Error::new(e));
        return ExitCode::FAILURE;
    }

    log::info!(
        "Converted {:?} to {:?} successfully",
        cli.input,
        cli.output
    );
    ExitCode::SUCCESS
}
