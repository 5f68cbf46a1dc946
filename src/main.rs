use clap::Parser;
use pp_processor::{
    args::{Args, Command},
    config::ProcessorConfig,
    database::db::PgConnector,
    processor::{Processor, ProcessorError},
    utils::logging::init_logging
};
use std::{process::ExitCode, sync::Arc};
use tracing::{error, info};

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Processor failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), ProcessorError> {
    let config = ProcessorConfig::load(&args.config)?;
    info!(
        notifications = config.notifications.is_configured(),
        "Loaded configuration"
    );
    let connector = PgConnector::new(
        config.database.primary_connection_string(),
        config.database.replica_connection_string()
    );

    let processor = Arc::new(Processor::new(args.mode, config, Arc::new(connector))?);

    match args.command {
        Command::Monitor => processor.monitor()?,
        Command::All { resume, threads } => processor.process_all(resume, threads)?,
        Command::Users { players } => {
            processor.process_players(&players)?;
        }
        Command::Scores { score_ids } => {
            processor.process_scores(&score_ids)?;
        }
    }

    info!("Shutting down");
    Ok(())
}
