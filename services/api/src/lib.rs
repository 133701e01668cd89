mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use lab_arbiter::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
