//! Configuration and CLI argument handling

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::page::SiteDefaults;
use crate::store::DurationSetting;

/// CLI argument parsing structure
#[derive(Parser)]
#[command(name = "refocus")]
#[command(about = "A state-managed attention timer service for focus-limited websites")]
#[command(version = "1.2.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "7313")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Path of the persisted timer state file
    #[arg(long, default_value = "refocus-state.json")]
    pub data_file: PathBuf,

    /// Countdown tick cadence in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// Default countdown minutes for sites without a saved preference
    #[arg(long, default_value = "5")]
    pub timer_minutes: u64,

    /// Default countdown seconds for sites without a saved preference
    #[arg(long, default_value = "0")]
    pub timer_seconds: u64,

    /// Default cooldown minutes for sites without a saved preference
    #[arg(long, default_value = "0")]
    pub cooldown_minutes: u64,

    /// Default cooldown seconds for sites without a saved preference
    #[arg(long, default_value = "20")]
    pub cooldown_seconds: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Countdown tick cadence
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    /// Fallback durations built from the CLI defaults
    pub fn site_defaults(&self) -> SiteDefaults {
        SiteDefaults {
            timer: DurationSetting::new(self.timer_minutes, self.timer_seconds),
            cooldown: DurationSetting::new(self.cooldown_minutes, self.cooldown_seconds),
        }
    }
}
