use dotenvy::dotenv;
use log::info;
use settlement_server::{config::ServerConfig, logging::init_logging, server::run_server};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    let config = ServerConfig::from_env_or_default();
    init_logging(&config.log);

    info!("🚀️ Starting the order & settlement platform backend");
    match run_server(config).await {
        Ok(()) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}
