use clap::Parser;
use std::path::PathBuf;

use pbind::driver::{self, DriverError, Emit};

#[derive(Parser, Debug)]
#[command(
    name = "pbind",
    version,
    about = "Pipeline parameter binder: checks .pif interface files and emits signatures, headers, and constraints"
)]
struct Cli {
    /// Input .pif interface file
    source: PathBuf,

    /// What to print
    #[arg(long, value_enum, default_value_t = Emit::Signature)]
    emit: Emit,

    /// Entry-point name (default: the file stem)
    #[arg(long)]
    name: Option<String>,

    /// Increase log verbosity (repeatable; PBIND_DEBUG sets the floor)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = pbind::config::debug_level().max(u32::from(cli.verbose));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(pbind::config::level_filter(level))
        .with_target(false)
        .without_time()
        .try_init();

    tracing::info!(source = %cli.source.display(), emit = ?cli.emit, "pbind");

    match driver::compile_file(&cli.source, cli.emit, cli.name.as_deref()) {
        Ok(report) => {
            for diag in &report.diagnostics {
                eprintln!("pbind: {}", diag);
            }
            print!("{}", report.output);
        }
        Err(err) => {
            if let DriverError::Failed { diagnostics, .. } = &err {
                for diag in diagnostics {
                    eprintln!("pbind: {}", diag);
                }
            }
            eprintln!("pbind: error: {}", err);
            std::process::exit(err.exit_code());
        }
    }
}
