use rowlens_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    rowlens_core::config::load_dotenv();

    let config = Config::from_env()?;

    let (_state, router) = rowlens_api::setup::initialize_app(config.clone()).await?;

    rowlens_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
