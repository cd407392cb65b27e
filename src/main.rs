#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    userstore::telemetry::setup_logging()?;

    // `config.yaml` in the working directory, defaults otherwise.
    let store = userstore::initialize_store(None).await?;
    tracing::info!(session = store.has_session(), "user store ready");

    Ok(())
}
