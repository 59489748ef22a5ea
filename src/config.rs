use std::env;
use thiserror::Error;

use crate::gap_fill::{EmptyPlacePolicy, GapFillOptions};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid EMPTY_PLACE_POLICY: {0}")]
    EmptyPlacePolicy(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub max_upload_bytes: usize,
    pub worksheet_name: Option<String>,
    pub expected_places: Vec<String>,
    pub empty_place_policy: EmptyPlacePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| (20 * 1024 * 1024).to_string())
                .parse()
                .unwrap_or(20 * 1024 * 1024),
            worksheet_name: env::var("WORKSHEET_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            expected_places: parse_place_list(&env::var("EXPECTED_PLACES").unwrap_or_default()),
            empty_place_policy: env::var("EMPTY_PLACE_POLICY")
                .unwrap_or_else(|_| "reject".to_string())
                .parse::<EmptyPlacePolicy>()
                .map_err(ConfigError::EmptyPlacePolicy)?,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn gap_fill_options(&self) -> GapFillOptions {
        GapFillOptions {
            expected_places: self.expected_places.clone(),
            empty_place_policy: self.empty_place_policy,
        }
    }
}

/// Comma-separated station names, blanks dropped
fn parse_place_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
