use record_lookup::config::Config;
use record_lookup::seed::SeedJob;
use record_lookup::{logging, store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging();

    let config = Config::from_env()?;
    config.log_startup();

    let store = store::connect(&config).await?;
    let summary = SeedJob::new(store).run().await?;

    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
