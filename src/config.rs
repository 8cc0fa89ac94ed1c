//! Settings shared by every command, read from flags or the environment.

use clap::Args;

use crate::error::{LeadFlowError, Result};
use crate::logging::Verbosity;

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Team whose leads are read and written
    #[arg(long, env = "LEADFLOW_TEAM_ID", global = true, default_value = "default")]
    pub team: String,

    /// Published sales sheet, as an http(s) URL or a local CSV path
    #[arg(long, env = "LEADFLOW_ANALYTICS_URL", global = true)]
    pub analytics: Option<String>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Config {
    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(LeadFlowError::MissingSetting("DATABASE_URL"))
    }

    pub fn analytics_source(&self) -> Result<&str> {
        self.analytics
            .as_deref()
            .filter(|source| !source.is_empty())
            .ok_or(LeadFlowError::MissingSetting("LEADFLOW_ANALYTICS_URL"))
    }

    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: Some(String::new()),
            team: "north".to_string(),
            analytics: None,
            verbose: false,
            quiet: true,
        }
    }

    #[test]
    fn empty_settings_count_as_missing() {
        let config = config();
        assert!(matches!(
            config.database_url(),
            Err(LeadFlowError::MissingSetting("DATABASE_URL"))
        ));
        assert!(config.analytics_source().is_err());
        assert_eq!(config.verbosity(), Verbosity::Quiet);
    }
}
