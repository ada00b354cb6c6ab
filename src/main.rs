use clap::Parser;
use unum::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    unum::logging::init(cli.log_level.as_deref());
    run(cli)
}
