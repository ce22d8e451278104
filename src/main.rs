use barrierefrei_core::{config::Config, lifecycle};

#[tokio::main]
async fn main() {
    lifecycle::init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e.user_message());
            std::process::exit(2);
        }
    };

    let engine = match lifecycle::start(config).await {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("startup failed: {}", e.user_message());
            std::process::exit(1);
        }
    };

    if let Err(e) = engine.run().await {
        log::error!("engine stopped: {}", e.user_message());
        std::process::exit(1);
    }
}
