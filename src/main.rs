use ai_client::cli::{exit_code, Cli};
use clap::Parser;

fn main() {
    // Load .env file if it exists (ignore errors if missing)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(err) = cli.run() {
        eprintln!("Error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}
