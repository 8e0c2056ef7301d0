//! Schema migration runner: `cashnote-migrate [up|down <target>|version]`.

use anyhow::{bail, Context};

use cashnote_infra::postgres::{connect_pool, MIGRATOR};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cashnote_observability::init();

    let config = cashnote_api::config::Config::from_env();
    let url = config
        .database_url
        .context("DATABASE_URL (or DB_HOST) must be set to run migrations")?;
    let pool = connect_pool(&url, 1).await.context("connecting to database")?;

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "up".to_string());

    match command.as_str() {
        "up" => {
            MIGRATOR.run(&pool).await.context("applying migrations")?;
            tracing::info!("migrations applied");
        }
        "down" => {
            let target: i64 = args
                .next()
                .context("down requires a target version (0 reverts everything)")?
                .parse()
                .context("target version must be an integer")?;
            MIGRATOR
                .undo(&pool, target)
                .await
                .context("reverting migrations")?;
            tracing::info!(target, "migrations reverted");
        }
        "version" => {
            let version: Option<i64> = sqlx::query_scalar(
                "SELECT MAX(version) FROM _sqlx_migrations WHERE success",
            )
            .fetch_one(&pool)
            .await
            .context("reading schema version")?;
            match version {
                Some(v) => println!("{v}"),
                None => println!("no migrations applied"),
            }
        }
        other => bail!("unknown command {other:?}; expected up, down or version"),
    }

    Ok(())
}
