//! Runtime configuration for the `carlae` binary
//!
//! Values come from defaults, then `CARLAE_*` environment variables, then
//! command-line flags, each layer overriding the last.

use std::path::PathBuf;

use thiserror::Error;

use crate::interpreter::DEFAULT_MAX_DEPTH;

/// Stack reserved for the evaluator thread
pub const DEFAULT_STACK_SIZE: usize = 512 * 1024 * 1024;

const HISTORY_FILE_NAME: &str = ".carlae_history";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub max_depth: usize,
    pub stack_size: usize,
    pub history_file: Option<PathBuf>,
    /// Evaluate this file instead of starting the REPL
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: expected a positive integer")]
    InvalidNumber { key: String, value: String },

    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("unexpected argument '{0}': only one file can be evaluated")]
    UnexpectedArgument(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_depth: DEFAULT_MAX_DEPTH,
            stack_size: DEFAULT_STACK_SIZE,
            history_file: dirs::home_dir().map(|home| home.join(HISTORY_FILE_NAME)),
            file: None,
        }
    }
}

impl Config {
    /// Build from the process environment and the given arguments (without argv[0])
    pub fn load<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_args(args)?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = var("CARLAE_MAX_DEPTH") {
            self.max_depth = parse_positive("CARLAE_MAX_DEPTH", &value)?;
        }
        if let Some(value) = var("CARLAE_STACK_SIZE") {
            self.stack_size = parse_positive("CARLAE_STACK_SIZE", &value)?;
        }
        if let Some(value) = var("CARLAE_HISTORY") {
            self.history_file = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        Ok(())
    }

    pub fn apply_args<I>(&mut self, args: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--max-depth" => {
                    let value = args.next().ok_or_else(|| ConfigError::MissingValue(arg.clone()))?;
                    self.max_depth = parse_positive(&arg, &value)?;
                }
                "--stack-size" => {
                    let value = args.next().ok_or_else(|| ConfigError::MissingValue(arg.clone()))?;
                    self.stack_size = parse_positive(&arg, &value)?;
                }
                "--no-history" => self.history_file = None,
                flag if flag.starts_with("--") => {
                    return Err(ConfigError::UnknownOption(flag.to_string()));
                }
                _ if self.file.is_some() => {
                    return Err(ConfigError::UnexpectedArgument(arg.clone()));
                }
                _ => self.file = Some(PathBuf::from(&arg)),
            }
        }
        Ok(())
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
