use std::process::ExitCode;

use dotenvy::dotenv;
use order_cache::lifecycle::run_from_env;

#[actix_web::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    match run_from_env().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
