use anyhow::{bail, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

use crate::processor::feed_state::DEFAULT_SESSION_IDLE_HOURS;
use crate::processor::notifications::{DEFAULT_RETENTION_DAYS, MAX_RETENTION_DAYS};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub kafka_bootstrap_servers: String,
    pub kafka_topic: String,
    pub kafka_group_id: String,
    pub kafka_auto_offset_reset: String,
    pub kafka_sasl_mechanism: String,
    pub kafka_username: String,
    pub kafka_password: String,
    pub kafka_security_protocol: String,
    pub kafka_max_retries: u32,
    pub kafka_circuit_breaker_cooldown: u64,
    pub database_url: String,
    pub db_max_connections: u32,
    pub notification_retention_days: i64,
    pub session_idle_hours: i64,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let kafka_bootstrap_servers =
            env::var("KAFKA_BOOTSTRAP_SERVERS").unwrap_or_else(|_| "localhost:9092".to_string());
        let kafka_topic =
            env::var("KAFKA_TOPIC").unwrap_or_else(|_| "corsair-feed-events".to_string());
        let kafka_group_id =
            env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "corsair-alerts".to_string());
        let kafka_auto_offset_reset =
            env::var("KAFKA_AUTO_OFFSET_RESET").unwrap_or_else(|_| "latest".to_string());
        let kafka_sasl_mechanism =
            env::var("KAFKA_SASL_MECHANISM").unwrap_or_else(|_| "SCRAM-SHA-256".to_string());
        let kafka_username = env::var("KAFKA_USERNAME").unwrap_or_default();
        let kafka_password = env::var("KAFKA_PASSWORD").unwrap_or_default();
        let kafka_security_protocol =
            env::var("KAFKA_SECURITY_PROTOCOL").unwrap_or_else(|_| "SASL_PLAINTEXT".to_string());
        let kafka_max_retries = parse_or("KAFKA_MAX_RETRIES", 5);
        let kafka_circuit_breaker_cooldown = parse_or("KAFKA_CIRCUIT_BREAKER_COOLDOWN", 300);

        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "corsair".to_string());
        let db_user = env::var("DB_USER").unwrap_or_else(|_| "corsair".to_string());
        let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "corsair".to_string());

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );
        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 20);

        let notification_retention_days = validate_retention_days(parse_or(
            "NOTIFICATION_RETENTION_DAYS",
            DEFAULT_RETENTION_DAYS,
        ))?;
        let session_idle_hours =
            validate_idle_hours(parse_or("SESSION_IDLE_HOURS", DEFAULT_SESSION_IDLE_HOURS))?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            kafka_bootstrap_servers,
            kafka_topic,
            kafka_group_id,
            kafka_auto_offset_reset,
            kafka_sasl_mechanism,
            kafka_username,
            kafka_password,
            kafka_security_protocol,
            kafka_max_retries,
            kafka_circuit_breaker_cooldown,
            database_url,
            db_max_connections,
            notification_retention_days,
            session_idle_hours,
            log_level,
        })
    }
}

/// Reads and parses `key`, falling back to `default` when unset or invalid.
fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn validate_retention_days(days: i64) -> Result<i64> {
    if !(1..=MAX_RETENTION_DAYS).contains(&days) {
        bail!(
            "NOTIFICATION_RETENTION_DAYS must be between 1 and {}, got {}",
            MAX_RETENTION_DAYS,
            days
        );
    }
    Ok(days)
}

const MAX_SESSION_IDLE_HOURS: i64 = 24 * 366;

fn validate_idle_hours(hours: i64) -> Result<i64> {
    if !(1..=MAX_SESSION_IDLE_HOURS).contains(&hours) {
        bail!(
            "SESSION_IDLE_HOURS must be between 1 and {}, got {}",
            MAX_SESSION_IDLE_HOURS,
            hours
        );
    }
    Ok(hours)
}
