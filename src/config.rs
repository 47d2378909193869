use dotenv::dotenv;
use std::{env, str::FromStr, time::Duration};

use crate::error::AppError;

pub struct AppConfig {
    pub port: u16,
    pub host: String,
    pub worker_threads: usize,
    /// Capacity given to baskets created without an explicit one.
    pub default_capacity: usize,
    pub max_capacity: usize,
    pub page_size: usize,
    pub forward_timeout: Duration,
    /// Grants access to every basket and to the basket listing.
    pub master_token: String,
}

impl AppConfig {
    /// Reads configuration from the environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        Ok(Self {
            port: parse_var("PORT", 55555)?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            worker_threads: parse_var("WORKER_THREADS", num_cpus::get())?,
            default_capacity: parse_var("DEFAULT_CAPACITY", 200)?,
            max_capacity: parse_var("MAX_CAPACITY", 2000)?,
            page_size: parse_var("PAGE_SIZE", 20)?,
            forward_timeout: Duration::from_secs(parse_var("FORWARD_TIMEOUT_SECS", 30)?),
            master_token: env::var("MASTER_TOKEN")
                .ok()
                .filter(|token| !token.is_empty())
                .unwrap_or_else(crate::registry::generate_token),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 55555,
            host: "127.0.0.1".to_string(),
            worker_threads: num_cpus::get(),
            default_capacity: 200,
            max_capacity: 2000,
            page_size: 20,
            forward_timeout: Duration::from_secs(30),
            master_token: crate::registry::generate_token(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a number, got '{}'", name, value))),
        Err(_) => Ok(default),
    }
}
