use geofeed_sampler::config::{parse_config, Config};
use geofeed_sampler::pipeline;

async fn async_main(config: Config) -> anyhow::Result<()> {
    simple_logger::init_with_level(config.log_level)?;

    pipeline::run(&config).await?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => parse_config(path)?,
        None => Config::default(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main(config))
}
