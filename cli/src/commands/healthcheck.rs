use sandgate_core::api::AppConfig;
use sandgate_plugins::factory;

pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let gateway = factory::build_gateway(&cfg)?;
    match gateway.healthcheck().await {
        Ok(()) => {
            println!("scanning service is reachable");
            Ok(())
        }
        Err(err) => {
            eprintln!("healthcheck failed: {err}");
            std::process::exit(1);
        }
    }
}
