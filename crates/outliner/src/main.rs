use crate::prelude::*;
use clap::Parser;

mod error;
mod params;
mod prelude;
mod run;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Generate a navigable outline (table of contents) for PDF files from the layout of their text"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Diagnostic log level (RUST_LOG takes precedence)
    #[clap(
        long,
        env = "PDFOUTLINER_VERBOSITY",
        global = true,
        default_value = "warn"
    )]
    verbosity: Verbosity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<Verbosity> for log::LevelFilter {
    fn from(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Error => log::LevelFilter::Error,
            Verbosity::Warn => log::LevelFilter::Warn,
            Verbosity::Info => log::LevelFilter::Info,
            Verbosity::Debug => log::LevelFilter::Debug,
            Verbosity::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Find or reuse a PDF's outline and write it out
    Run(crate::run::RunOptions),

    /// Print the effective heading detection parameters
    Params(crate::params::ParamsOptions),
}

fn init_logger(verbosity: Verbosity) {
    env_logger::Builder::new()
        .filter_level(verbosity.into())
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let app = App::parse();
    init_logger(app.global.verbosity);

    match app.command {
        SubCommands::Run(options) => crate::run::run(options),
        SubCommands::Params(options) => crate::params::run(options),
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_command() {
        let app = App::try_parse_from([
            "pdfoutliner",
            "run",
            "book.pdf",
            "-o",
            "txt",
            "--fromtxt",
            "--mark",
            "-p",
            "MAX_LEVELS=2",
            "--verbosity",
            "debug",
        ])
        .unwrap();

        assert_eq!(app.global.verbosity, Verbosity::Debug);
        match app.command {
            SubCommands::Run(options) => {
                assert_eq!(options.output, crate::run::OutputFormat::Txt);
                assert_eq!(options.fromtxt, Some(None));
                assert!(options.mark);
                assert_eq!(options.params.params.as_deref(), Some("MAX_LEVELS=2"));
                assert_eq!(options.fold_level, 2);
                assert!(options.output_file.is_none());
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_fromtxt_with_file() {
        let app =
            App::try_parse_from(["pdfoutliner", "run", "book.pdf", "--fromtxt", "toc.txt"]).unwrap();
        match app.command {
            SubCommands::Run(options) => {
                assert_eq!(options.fromtxt, Some(Some("toc.txt".into())));
                assert_eq!(options.output, crate::run::OutputFormat::Pdf);
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(log::LevelFilter::from(Verbosity::Warn), log::LevelFilter::Warn);
        assert_eq!(log::LevelFilter::from(Verbosity::Trace), log::LevelFilter::Trace);
    }
}
