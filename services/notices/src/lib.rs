mod cli;
mod infra;
mod routes;
mod server;
mod watch;

use site_notices::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
