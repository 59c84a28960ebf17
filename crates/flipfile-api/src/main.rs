use flipfile_api::setup;
use flipfile_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    flipfile_infra::telemetry::init_telemetry();

    let config = Config::from_env()?;

    let (_state, router) = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, router).await?;

    Ok(())
}
