use backend::dbs::DatabaseConfig;
use backend::rate_limit::RateLimitConfig;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(about = "Character roster HTTP API")]
pub struct Cli {
    #[arg(long, env = "ROSTER_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,
    #[arg(long, env = "ROSTER_PORT", default_value_t = 3005)]
    pub port: u16,
    /// Directory of the JSON file backend.
    #[arg(long, env = "ROSTER_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,
    /// Use the PostgreSQL document backend instead of the file backend.
    #[arg(long, env = "ROSTER_DATABASE_URL")]
    pub database_url: Option<String>,
    #[arg(long, env = "ROSTER_RATE_LIMIT_WINDOW_SECS", default_value_t = 60)]
    pub rate_limit_window_secs: u64,
    #[arg(long, env = "ROSTER_RATE_LIMIT_MAX_REQUESTS", default_value_t = 60)]
    pub rate_limit_max_requests: usize,
    /// How often clients idle for a whole window are forgotten. 0 disables it.
    #[arg(long, env = "ROSTER_RATE_LIMIT_SWEEP_SECS", default_value_t = 300)]
    pub rate_limit_sweep_secs: u64,
}

impl Cli {
    pub fn database_config(&self) -> DatabaseConfig {
        match &self.database_url {
            Some(url) => DatabaseConfig::Postgres { url: url.clone() },
            None => DatabaseConfig::Local {
                path: self.data_dir.clone(),
            },
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.rate_limit_window_secs, self.rate_limit_max_requests)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.rate_limit_sweep_secs > 0).then(|| Duration::from_secs(self.rate_limit_sweep_secs))
    }
}
