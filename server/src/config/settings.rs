use std::time::Duration;

use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Mongo,
    Memory,
}

/// Runtime configuration. Every flag can also be supplied through the
/// environment variable named next to it.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Server-authoritative two player dice matches")]
pub struct Settings {
    /// Address the WebSocket listener binds to
    #[arg(long, env = "DICE_BIND_ADDR", default_value = "127.0.0.1:9003")]
    pub bind: String,
    /// Where game records live
    #[arg(long, env = "DICE_STORE", value_enum, default_value = "mongo")]
    pub store: StoreKind,
    #[arg(long, env = "MONGO_URI", default_value = "mongodb://localhost:27017")]
    pub mongo_uri: String,
    #[arg(long, env = "DICE_DATABASE", default_value = "dice")]
    pub database: String,
    /// HMAC secret shared with whoever issues identity tokens
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: String,
    /// Close a connection that leaves its roll unacknowledged this long
    #[arg(long, env = "DICE_ACK_TIMEOUT_SECS")]
    pub ack_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let settings = Settings::try_parse_from([
            "dice-server",
            "--jwt-secret",
            "s3cret",
            "--store",
            "memory",
            "--bind",
            "0.0.0.0:9100",
            "--ack-timeout-secs",
            "30",
        ])
        .unwrap();

        assert_eq!(settings.store, StoreKind::Memory);
        assert_eq!(settings.bind, "0.0.0.0:9100");
        assert_eq!(settings.jwt_secret, "s3cret");
        assert_eq!(settings.ack_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_timeout_means_wait_forever() {
        let settings = Settings::try_parse_from([
            "dice-server",
            "--jwt-secret",
            "s3cret",
            "--ack-timeout-secs",
            "0",
        ])
        .unwrap();
        assert_eq!(settings.ack_timeout(), None);
    }
}
