//! Settings read from the environment (and `.env`, loaded by [`dotenvy`] in `main`).

use std::{collections::HashSet, net::IpAddr, str::FromStr};

use sqlx::postgres::PgConnectOptions;
use tracing::level_filters::LevelFilter;

use crate::{gateway::GatewayOptions, query::PageLimits};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("{key} has an invalid value {value:?}")]
	Invalid { key: &'static str, value: String },
	#[error("DEFAULT_PAGE_SIZE ({default}) must be between 1 and MAX_PAGE_SIZE ({max})")]
	PageSize { default: i64, max: i64 },
	#[error("invalid DATABASE_URL: {0}")]
	DatabaseUrl(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
	pub database: PgConnectOptions,
	pub host: IpAddr,
	pub port: u16,
	pub log_level: LevelFilter,
	pub gateway: GatewayOptions,
}

impl Config {
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Builds the config from any key-value source. Missing keys fall back to
	/// their defaults, present but malformed ones are errors.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let parse = |key: &'static str, default: &str| -> Result<String, ConfigError> {
			Ok(lookup(key)
				.filter(|value| !value.trim().is_empty())
				.unwrap_or_else(|| default.to_owned()))
		};

		fn typed<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
			value
				.trim()
				.parse()
				.map_err(|_| ConfigError::Invalid { key, value })
		}

		let database = match lookup("DATABASE_URL") {
			Some(url) => url.parse().map_err(ConfigError::DatabaseUrl)?,
			None => {
				let mut options = PgConnectOptions::new()
					.host(&parse("PG_HOST", "localhost")?)
					.port(typed("PG_PORT", parse("PG_PORT", "5432")?)?);

				if let Some(user) = lookup("PG_USER") {
					options = options.username(&user);
				}

				if let Some(password) = lookup("PG_PASSWORD") {
					options = options.password(&password);
				}

				if let Some(database) = lookup("PG_DB") {
					options = options.database(&database);
				}

				options
			}
		};

		let page_limits = PageLimits {
			default: typed("DEFAULT_PAGE_SIZE", parse("DEFAULT_PAGE_SIZE", "10")?)?,
			max: typed("MAX_PAGE_SIZE", parse("MAX_PAGE_SIZE", "100")?)?,
		};

		if page_limits.default < 1 || page_limits.default > page_limits.max {
			return Err(ConfigError::PageSize {
				default: page_limits.default,
				max: page_limits.max,
			});
		}

		let token_ttl = match lookup("TOKEN_TTL_SECS").filter(|value| !value.trim().is_empty()) {
			Some(value) => {
				let secs = typed::<u32>("TOKEN_TTL_SECS", value)?;
				Some(chrono::Duration::seconds(secs.into()))
			}
			None => None,
		};

		let admins = lookup("ADMIN_USERS")
			.unwrap_or_default()
			.split(',')
			.map(str::trim)
			.filter(|name| !name.is_empty())
			.map(str::to_owned)
			.collect::<HashSet<_>>();

		Ok(Self {
			database,
			host: typed("HOST", parse("HOST", "127.0.0.1")?)?,
			port: typed("PORT", parse("PORT", "3000")?)?,
			log_level: typed("LOG_LEVEL", parse("LOG_LEVEL", "info")?)?,
			gateway: GatewayOptions {
				token_ttl,
				page_limits,
				admins,
			},
		})
	}
}

#[cfg(test)]
mod test {
	use std::collections::HashMap;

	use super::*;

	fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
		let env = pairs
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect::<HashMap<_, _>>();

		Config::from_lookup(|key| env.get(key).cloned())
	}

	#[test]
	fn test_defaults() {
		let config = config(&[]).unwrap();

		assert_eq!(config.port, 3000);
		assert_eq!(config.host.to_string(), "127.0.0.1");
		assert_eq!(config.log_level, LevelFilter::INFO);
		assert_eq!(config.gateway.page_limits, PageLimits::default());
		assert!(config.gateway.token_ttl.is_none());
		assert!(config.gateway.admins.is_empty());
		assert_eq!(config.database.get_host(), "localhost");
		assert_eq!(config.database.get_port(), 5432);
	}

	#[test]
	fn test_values_are_read() {
		let config = config(&[
			("PORT", "8080"),
			("HOST", "0.0.0.0"),
			("LOG_LEVEL", "debug"),
			("MAX_PAGE_SIZE", "50"),
			("DEFAULT_PAGE_SIZE", "5"),
			("TOKEN_TTL_SECS", "3600"),
			("ADMIN_USERS", "alice, bob,,"),
			("DATABASE_URL", "postgres://user:pass@db:6543/posts"),
		])
		.unwrap();

		assert_eq!(config.port, 8080);
		assert_eq!(config.log_level, LevelFilter::DEBUG);
		assert_eq!(config.gateway.page_limits, PageLimits { default: 5, max: 50 });
		assert_eq!(config.gateway.token_ttl, Some(chrono::Duration::hours(1)));
		assert_eq!(
			config.gateway.admins,
			HashSet::from(["alice".to_owned(), "bob".to_owned()])
		);
		assert_eq!(config.database.get_host(), "db");
		assert_eq!(config.database.get_port(), 6543);
		assert_eq!(config.database.get_database(), Some("posts"));
	}

	#[test]
	fn test_invalid_values() {
		assert!(matches!(
			config(&[("PORT", "eighty")]),
			Err(ConfigError::Invalid { key: "PORT", .. })
		));
		assert!(matches!(
			config(&[("TOKEN_TTL_SECS", "-1")]),
			Err(ConfigError::Invalid { key: "TOKEN_TTL_SECS", .. })
		));
		assert!(matches!(
			config(&[("DEFAULT_PAGE_SIZE", "200")]),
			Err(ConfigError::PageSize { .. })
		));
		assert!(matches!(
			config(&[("DATABASE_URL", "not a url")]),
			Err(ConfigError::DatabaseUrl(..))
		));
	}
}
