use clap::Parser;
use env_logger::Env;
use log::{error, info};

use katabump_autorenew::notifier::Notifier;
use katabump_autorenew::{renewal, AppError, Args, Config};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("==================================================");
    info!("   KataBump auto-renew / reminder");
    info!("==================================================");

    let config = match Config::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return Err(err.into());
        }
    };

    let notifier = Notifier::new(&config);
    let outcome = renewal::run(&config, &notifier).await?;
    info!("Finished: {:?}", outcome);

    Ok(())
}
