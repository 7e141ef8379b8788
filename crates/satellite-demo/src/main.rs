use satellite_dispatch::{Cancellation, HostConfig, RealEnv};
use satellite_demo::{demo_host, logging, Console};

fn main() -> anyhow::Result<()> {
    let config = HostConfig::from_env(&RealEnv)?;

    let _logger = match logging::init_logging(&config.log_spec) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("logging disabled: {}", err);
            None
        }
    };

    let host = demo_host(config, Console::stdout())?;
    let os_args: Vec<String> = std::env::args().collect();
    let matches = host.command().get_matches_from(&os_args);

    host.run(&matches, &os_args, Cancellation::new())
}
