use clap::Parser;
use tagwatch::cli::Cli;

fn init_logging(cli: &Cli) {
    let level = cli.log_level();
    #[cfg(feature = "tracing")]
    if tagwatch_core::init_tracing(level, cli.log_json) {
        return;
    }
    if let Err(e) = tagwatch_core::init_with_level(level) {
        eprintln!("failed to install logger: {e}");
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = cli.into_app_config().and_then(tagwatch::run);
    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}
