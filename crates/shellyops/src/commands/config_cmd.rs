//! Config subcommand handlers.

use shellyops_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, config: &Config, quiet: bool) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let text = config.to_toml()?;
            output::print_output(text.trim_end(), quiet);
        }
        ConfigCommand::Path => {
            output::print_output(&shellyops_config::config_path().display().to_string(), quiet);
        }
    }
    Ok(())
}
