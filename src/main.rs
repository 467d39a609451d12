use std::sync::Arc;

use fakturo::store::PgStore;
use fakturo::{App, AppContext, ConfigBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigBuilder::new()
        .from_env()
        .build()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    fakturo::init_tracing(&config.logging.level, config.logging.json);

    if config.uses_default_secret() {
        tracing::warn!("AUTH_JWT_SECRET is not set; using the insecure development default");
    }

    let database_url = config
        .database
        .url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let store = PgStore::connect(&database_url).await?;
    store.migrate().await?;

    let mailer: Arc<dyn fakturo::traits::Mailer> = if std::env::var("SMTP_HOST").is_ok() {
        Arc::new(fakturo::email::SmtpMailer::from_env()?)
    } else {
        tracing::warn!("SMTP_HOST is not set; emails go to stdout via the console mailer");
        Arc::new(fakturo::email::ConsoleMailer::new())
    };

    let context = AppContext::builder()
        .with_config(config)
        .with_store(Arc::new(store))
        .with_mailer(mailer)
        .build()?;

    App::new(context).serve().await?;
    Ok(())
}
