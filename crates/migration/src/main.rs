use sea_orm_migration::prelude::*;
use std::env;

#[tokio::main]
async fn main() {
    if env::var("DATABASE_URL").is_err() {
        if let Ok(url) = env::var("UPTIME__DATABASE__URL") {
            env::set_var("DATABASE_URL", url);
        }
    }
    cli::run_cli(migration::Migrator).await;
}
