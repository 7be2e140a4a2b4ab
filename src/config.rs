use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Server settings, read from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "skillfolio-server")]
#[command(about = "Skills and project portfolio service", long_about = None)]
pub struct Config {
    #[arg(long, env = "SKILLFOLIO_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "SKILLFOLIO_PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "SKILLFOLIO_DATA_DIR", default_value = "data", help = "Directory holding the JSON collections")]
    pub data_dir: PathBuf,

    #[arg(long, env = "SKILLFOLIO_SESSION_TTL_HOURS", default_value_t = 168)]
    pub session_ttl_hours: i64,

    #[arg(long, env = "SKILLFOLIO_BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}
