use filepool_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    filepool_api::setup::init_tracing();

    let config = Config::from_env()?;

    let (_state, router) = filepool_api::setup::initialize_app(config.clone())?;

    filepool_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
