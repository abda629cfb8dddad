use std::time::Duration;

use anyhow::Result;

use imsync::{
    infra::{config, logging},
    net::backoff::ReconnectPolicy,
    usecases::context::SessionContext,
};

use crate::cli::{Cli, Command};

const SESSION_STARTED: &str = "SESSION_STARTED";
const SESSION_STOPPED: &str = "SESSION_STOPPED";

pub async fn run(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;
    logging::init(&config.logging)?;

    match cli.command {
        Command::Run { identity } => {
            let policy = ReconnectPolicy {
                initial_delay: Duration::from_millis(config.reconnect.initial_delay_ms),
                max_delay: Duration::from_millis(config.reconnect.max_delay_ms),
            };
            let context = SessionContext::new(config.server.ws_url.clone(), policy);
            context.sign_in(&identity);
            tracing::info!(
                code = SESSION_STARTED,
                identity = %identity,
                url = %config.server.ws_url,
                "session started, press Ctrl-C to stop"
            );

            tokio::signal::ctrl_c().await?;

            context.sign_out();
            tracing::info!(code = SESSION_STOPPED, "session stopped");
        }
    }

    Ok(())
}
