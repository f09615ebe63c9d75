/// Mark past-due pending invitations as expired.
/// Meant for a cron job when the in-process sweeper is disabled,
/// e.g. `0 * * * * /app/expire-invitations`.
///
/// Usage: expire-invitations [--database-url URL] [--as-of RFC3339]
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;

use learnable_api::db::{self, PgStore, Store};

#[derive(Parser)]
#[command(name = "expire-invitations", about = "Expire pending LearnAble invitations past their deadline")]
struct Args {
    /// Database URL (defaults to the DATABASE_URL environment variable)
    #[arg(long)]
    database_url: Option<String>,

    /// Treat this instant as "now" instead of the current time
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let database_url = match args.database_url {
        Some(url) => url,
        None => std::env::var("DATABASE_URL").context("DATABASE_URL environment variable not set")?,
    };

    let pool = db::create_pool(&database_url).await?;
    let store = PgStore::new(pool);

    let now = args.as_of.unwrap_or_else(Utc::now);
    tracing::info!("Expiring invitations pending past {now}");

    let expired = store.expire_invitations(now).await?;
    tracing::info!("Expired {expired} invitation(s)");

    Ok(())
}
