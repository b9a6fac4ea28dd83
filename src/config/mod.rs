//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
};

use clap::{Args, Parser, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use time::Duration;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "chronica";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_POSTS_PER_PAGE: u32 = 10;
const DEFAULT_SESSION_TTL_DAYS: i64 = 14;
const DEFAULT_MEDIA_DIR: &str = "media";

/// Command-line arguments for the Chronica binary.
#[derive(Debug, Parser)]
#[command(name = "chronica", version, about = "Chronica blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CHRONICA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the number of posts per list page.
    #[arg(long = "posts-per-page", value_name = "COUNT")]
    pub posts_per_page: Option<u32>,

    /// Override the session lifetime in days.
    #[arg(long = "session-ttl-days", value_name = "DAYS")]
    pub session_ttl_days: Option<i64>,

    /// Override the directory post images are stored in.
    #[arg(long = "media-directory", value_name = "PATH")]
    pub media_directory: Option<PathBuf>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub pagination: PaginationSettings,
    pub sessions: SessionSettings,
    pub media: MediaSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub posts_per_page: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("CHRONICA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    pagination: RawPaginationSettings,
    sessions: RawSessionSettings,
    media: RawMediaSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPaginationSettings {
    posts_per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    ttl_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMediaSettings {
    directory: Option<PathBuf>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(per_page) = overrides.posts_per_page {
            self.pagination.posts_per_page = Some(per_page);
        }
        if let Some(days) = overrides.session_ttl_days {
            self.sessions.ttl_days = Some(days);
        }
        if let Some(directory) = overrides.media_directory.as_ref() {
            self.media.directory = Some(directory.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            pagination,
            sessions,
            media,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let pagination = build_pagination_settings(pagination)?;
        let sessions = build_session_settings(sessions)?;
        let media = build_media_settings(media);

        Ok(Self {
            server,
            logging,
            database,
            pagination,
            sessions,
            media,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let ip: IpAddr = host
        .parse()
        .map_err(|_| LoadError::invalid("server.host", format!("`{host}` is not an IP address")))?;

    Ok(ServerSettings {
        addr: SocketAddr::new(ip, port),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_value)
        .ok_or_else(|| LoadError::invalid("database.max_connections", "must be greater than zero"))?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_pagination_settings(
    pagination: RawPaginationSettings,
) -> Result<PaginationSettings, LoadError> {
    let per_page = pagination.posts_per_page.unwrap_or(DEFAULT_POSTS_PER_PAGE);
    let posts_per_page = NonZeroU32::new(per_page).ok_or_else(|| {
        LoadError::invalid("pagination.posts_per_page", "must be greater than zero")
    })?;

    Ok(PaginationSettings { posts_per_page })
}

fn build_session_settings(sessions: RawSessionSettings) -> Result<SessionSettings, LoadError> {
    let days = sessions.ttl_days.unwrap_or(DEFAULT_SESSION_TTL_DAYS);
    if days <= 0 {
        return Err(LoadError::invalid(
            "sessions.ttl_days",
            "must be greater than zero",
        ));
    }

    Ok(SessionSettings {
        ttl: Duration::days(days),
    })
}

fn build_media_settings(media: RawMediaSettings) -> MediaSettings {
    MediaSettings {
        directory: media
            .directory
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_DIR)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> RawSettings {
        RawSettings::default()
    }

    #[test]
    fn defaults_resolve() {
        let settings = Settings::from_raw(defaults()).expect("defaults are valid");
        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(settings.pagination.posts_per_page.get(), 10);
        assert_eq!(settings.sessions.ttl, Duration::days(14));
        assert_eq!(settings.media.directory, PathBuf::from("media"));
        assert!(settings.database.url.is_none());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut raw = defaults();
        raw.server.port = Some(0);
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid {
                key: "server.port",
                ..
            })
        ));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let mut raw = defaults();
        raw.pagination.posts_per_page = Some(0);
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn blank_database_url_counts_as_unset() {
        let mut raw = defaults();
        raw.database.url = Some("   ".to_string());
        let settings = Settings::from_raw(raw).expect("valid");
        assert!(settings.database.url.is_none());
    }

    #[test]
    fn cli_overrides_win() {
        let mut raw = defaults();
        raw.server.port = Some(4000);
        raw.apply_overrides(&ServeOverrides {
            server_port: Some(5000),
            posts_per_page: Some(25),
            ..ServeOverrides::default()
        });
        let settings = Settings::from_raw(raw).expect("valid");
        assert_eq!(settings.server.addr.port(), 5000);
        assert_eq!(settings.pagination.posts_per_page.get(), 25);
    }

    #[test]
    fn negative_session_ttl_is_rejected() {
        let mut raw = defaults();
        raw.sessions.ttl_days = Some(-3);
        assert!(Settings::from_raw(raw).is_err());
    }
}
