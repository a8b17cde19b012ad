//! CLI argument parsing for bridges.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

/// Command line as clap sees it; `--config` is optional here.
#[derive(Parser, Debug)]
#[command(about = "Venus D-Bus device bridge")]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

/// Common CLI arguments for all bridges.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeArgs {
    /// Path to configuration file.
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Parse CLI arguments with a default config path.
    ///
    /// If no `--config` argument is provided, uses the default. Exits with
    /// clap's usage message on invalid arguments.
    pub fn parse_with_default(default_config: &str) -> Self {
        Self::try_parse_from_with_default(std::env::args_os(), default_config)
            .unwrap_or_else(|e| e.exit())
    }

    /// Like [`parse_with_default`](Self::parse_with_default), from an explicit
    /// argument list and without exiting on error.
    pub fn try_parse_from_with_default<I, T>(
        args: I,
        default_config: &str,
    ) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args)?;

        Ok(Self {
            config: cli.config.unwrap_or_else(|| PathBuf::from(default_config)),
            log_level: cli.log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_config() {
        let args =
            BridgeArgs::try_parse_from_with_default(["bridge"], "temperature.json5").unwrap();
        assert_eq!(args.config, PathBuf::from("temperature.json5"));
        assert_eq!(args.log_level, None);
    }

    #[test]
    fn test_args_overrides() {
        let args = BridgeArgs::try_parse_from_with_default(
            ["bridge", "--config", "/data/fridge.json5", "--log-level", "debug"],
            "temperature.json5",
        )
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/data/fridge.json5"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));

        let args =
            BridgeArgs::try_parse_from_with_default(["bridge", "-c", "short.json5"], "x.json5")
                .unwrap();
        assert_eq!(args.config, PathBuf::from("short.json5"));
    }

    #[test]
    fn test_args_rejects_unknown_flag() {
        let err = BridgeArgs::try_parse_from_with_default(["bridge", "--verbose"], "x.json5")
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
