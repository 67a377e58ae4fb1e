use {
    anyhow::Result,
    clap::Parser,
    std::process::ExitCode,
    tartarus::{
        AUTHENTICATION_FAILURE_EXIT_CODE, cli::Cli, config::Config, is_authentication_failure,
        run, setup_logger,
    },
};

fn try_main(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let log_filter = cli
        .log_filter
        .clone()
        .unwrap_or_else(|| config.log_filter.clone());
    setup_logger(config.log_file.clone(), log_filter)?;
    run(cli, &config)
}

#[expect(clippy::print_stderr, reason = "logger may not be initialized")]
fn main() -> ExitCode {
    let cli = Cli::parse();
    match try_main(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            if is_authentication_failure(&err) {
                ExitCode::from(AUTHENTICATION_FAILURE_EXIT_CODE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
