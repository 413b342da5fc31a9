use anyhow::Result;
use probe_config::ProbeConfig;

pub fn print_config_command(config: &ProbeConfig) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}
