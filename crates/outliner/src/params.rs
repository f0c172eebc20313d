use std::path::{Path, PathBuf};

use colored::Colorize;
use outliner_core::Params;

use crate::prelude::{println, *};

/// Where tunable parameters come from, shared by every subcommand that runs
/// the heading detection.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ParamsArgs {
    /// TOML file with parameter values (keys as printed by `pdfoutliner params`)
    #[arg(long, env = "PDFOUTLINER_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Comma separated parameter overrides, e.g. -p MAX_LEVELS=2,TOL_BIN_SIZE=4
    #[arg(short, long, value_name = "KEY=VALUE,...")]
    pub params: Option<String>,
}

impl ParamsArgs {
    /// Defaults, then the config file, then the command-line overrides.
    pub fn load(&self) -> Result<Params> {
        let mut params = match &self.config {
            Some(path) => read_config(path)?,
            None => Params::default(),
        };
        if let Some(overrides) = &self.params {
            params
                .apply_overrides(overrides)
                .wrap_err("Invalid --params value")?;
        }
        log::debug!("effective parameters: {:?}", params);
        Ok(params)
    }
}

fn read_config(path: &Path) -> Result<Params> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| f!("Cannot read config file {}", path.display()))?;
    Params::from_toml_str(&content).wrap_err_with(|| f!("Invalid config file {}", path.display()))
}

#[derive(Debug, clap::Args)]
pub struct ParamsOptions {
    #[clap(flatten)]
    pub source: ParamsArgs,

    /// Print the parameters as a TOML config file instead of a table
    #[arg(long)]
    pub toml: bool,
}

pub fn run(options: ParamsOptions) -> Result<()> {
    let params = options.source.load()?;

    if options.toml {
        println!("{}", toml::to_string(&params)?.trim_end());
        return Ok(());
    }

    let mut table = new_table();
    table.add_row(prettytable::row!["Parameter".bold().cyan(), "Value".bold().cyan()]);
    for (name, value) in params.entries() {
        table.add_row(prettytable::row![name, value.green()]);
    }
    table.printstd();

    Ok(())
}
