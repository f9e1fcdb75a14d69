use std::collections::HashSet;
use std::env;
use std::net::SocketAddr;

use crate::error::AppError;

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub admin_emails: AdminAllowList,
    pub asset_dir: String,
    pub asset_base_url: String,
    pub studio_email: String,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let bind_addr = parse_bind_addr(
            &env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        )?;

        let secure_cookies = match env::var("SECURE_COOKIES") {
            Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            Err(_) => false,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/studio.db".to_string()),
            bind_addr,
            admin_emails: AdminAllowList::parse(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            asset_dir: env::var("ASSET_DIR").unwrap_or_else(|_| "data/assets".to_string()),
            asset_base_url: env::var("ASSET_BASE_URL").unwrap_or_else(|_| "/assets".to_string()),
            studio_email: env::var("STUDIO_EMAIL")
                .unwrap_or_else(|_| "bookings@localhost".to_string()),
            secure_cookies,
        })
    }
}

fn parse_bind_addr(raw: &str) -> Result<SocketAddr, AppError> {
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid BIND_ADDR '{raw}': {e}")))
}

/// Fixed set of administrator emails, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct AdminAllowList(HashSet<String>);

impl AdminAllowList {
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, email: &str) -> bool {
        self.0.contains(&email.trim().to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
