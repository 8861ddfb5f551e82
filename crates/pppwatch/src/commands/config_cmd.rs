//! Config subcommand handlers.

use pppwatch_config::{self as config, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global.config.clone().unwrap_or_else(config::config_path);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config(Some(&path))?;
            let rendered = config::to_toml(&cfg)?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |_| rendered.trim_end().to_owned(),
                |_| rendered.trim_end().to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init => {
            if path.exists() && !global.yes {
                return Err(CliError::Conflict {
                    resource_type: "config file".into(),
                    identifier: path.display().to_string(),
                });
            }
            config::save_config(&Config::default(), &path)?;
            if !global.quiet {
                eprintln!("Wrote default configuration to {}", path.display());
                eprintln!("Database: {}", Config::default().database_url());
            }
            Ok(())
        }
    }
}
