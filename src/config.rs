use anyhow::{Context, Result};
use std::{net::SocketAddr, str::FromStr, time::Duration};

/// Settings of the Discord front-end.
#[derive(Debug, Clone)]
pub struct BotConfig {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Registers commands to one guild only

    // Resolver
    pub resolver_url: String,
    pub resolver_timeout: Duration,

    // Background tasks
    pub reaper_interval: Duration,
    pub stats_reset_interval: Duration,
}

impl BotConfig {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            discord_token: lookup("DISCORD_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .context("DISCORD_TOKEN must be set")?,
            guild_id: parse_optional(&lookup, "GUILD_ID")?,

            resolver_url: lookup("RESOLVER_URL").unwrap_or(defaults.resolver_url),
            resolver_timeout: duration_or(&lookup, "RESOLVER_TIMEOUT", defaults.resolver_timeout)?,

            reaper_interval: duration_or(&lookup, "REAPER_INTERVAL", defaults.reaper_interval)?,
            stats_reset_interval: duration_or(
                &lookup,
                "STATS_RESET_INTERVAL",
                defaults.stats_reset_interval,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reaper_interval.is_zero() {
            anyhow::bail!("REAPER_INTERVAL must be greater than 0");
        }

        if self.stats_reset_interval.is_zero() {
            anyhow::bail!("STATS_RESET_INTERVAL must be greater than 0");
        }

        if self.resolver_timeout.is_zero() {
            anyhow::bail!("RESOLVER_TIMEOUT must be greater than 0");
        }

        url::Url::parse(&self.resolver_url)
            .with_context(|| format!("RESOLVER_URL is not a valid URL: {}", self.resolver_url))?;

        Ok(())
    }

    /// Token-free summary for startup logs.
    pub fn summary(&self) -> String {
        format!(
            "Bot Config:\n  \
            Commands: {}\n  \
            Resolver: {} (timeout {})\n  \
            Reaper every {}, stats reset every {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("guild {}", id)),
            self.resolver_url,
            humantime::format_duration(self.resolver_timeout),
            humantime::format_duration(self.reaper_interval),
            humantime::format_duration(self.stats_reset_interval),
        )
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            // No default token, must be provided
            discord_token: String::new(),
            guild_id: None,

            resolver_url: "http://localhost:5000".to_string(),
            resolver_timeout: Duration::from_secs(150),

            reaper_interval: Duration::from_secs(10),
            stats_reset_interval: Duration::from_secs(12 * 60 * 60),
        }
    }
}

/// Settings of the resolver service.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub host: String,
    pub port: u16,

    // Limits
    pub max_direct_duration: Duration,
    pub enforce_limit_on_search: bool,
    pub extraction_timeout: Duration,

    pub ytdlp_path: String,
}

impl ResolverConfig {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            host: lookup("RESOLVER_HOST").unwrap_or(defaults.host),
            port: parse_optional(&lookup, "RESOLVER_PORT")?.unwrap_or(defaults.port),

            max_direct_duration: duration_or(
                &lookup,
                "MAX_DIRECT_DURATION",
                defaults.max_direct_duration,
            )?,
            enforce_limit_on_search: parse_optional(&lookup, "ENFORCE_LIMIT_ON_SEARCH")?
                .unwrap_or(defaults.enforce_limit_on_search),
            extraction_timeout: duration_or(
                &lookup,
                "EXTRACTION_TIMEOUT",
                defaults.extraction_timeout,
            )?,

            ytdlp_path: lookup("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_direct_duration.is_zero() {
            anyhow::bail!("MAX_DIRECT_DURATION must be greater than 0");
        }

        if self.extraction_timeout.is_zero() {
            anyhow::bail!("EXTRACTION_TIMEOUT must be greater than 0");
        }

        if self.ytdlp_path.trim().is_empty() {
            anyhow::bail!("YTDLP_PATH must not be empty");
        }

        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip = self
            .host
            .parse::<std::net::IpAddr>()
            .with_context(|| format!("RESOLVER_HOST is not an IP address: {}", self.host))?;
        Ok(SocketAddr::from((ip, self.port)))
    }

    pub fn summary(&self) -> String {
        format!(
            "Resolver Config:\n  \
            Listen: {}:{}\n  \
            Limits: {} max direct duration (search: {}), {} extraction timeout\n  \
            yt-dlp: {}",
            self.host,
            self.port,
            humantime::format_duration(self.max_direct_duration),
            if self.enforce_limit_on_search { "enforced" } else { "unlimited" },
            humantime::format_duration(self.extraction_timeout),
            self.ytdlp_path,
        )
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,

            max_direct_duration: Duration::from_secs(30 * 60),
            enforce_limit_on_search: false,
            extraction_timeout: Duration::from_secs(120),

            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

fn parse_optional<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {}", key, raw)),
        _ => Ok(None),
    }
}

fn duration_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => humantime::parse_duration(raw.trim())
            .with_context(|| format!("Invalid duration for {}: {}", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn bot_defaults_apply() {
        let config = BotConfig::from_lookup(env(&[("DISCORD_TOKEN", "secret")])).unwrap();

        assert_eq!(config.guild_id, None);
        assert_eq!(config.resolver_url, "http://localhost:5000");
        assert_eq!(config.reaper_interval, Duration::from_secs(10));
        assert_eq!(config.stats_reset_interval, Duration::from_secs(43_200));
        assert_eq!(config.resolver_timeout, Duration::from_secs(150));
    }

    #[test]
    fn bot_requires_token() {
        assert!(BotConfig::from_lookup(env(&[])).is_err());
        assert!(BotConfig::from_lookup(env(&[("DISCORD_TOKEN", "  ")])).is_err());
    }

    #[test]
    fn bot_parses_overrides() {
        let config = BotConfig::from_lookup(env(&[
            ("DISCORD_TOKEN", "secret"),
            ("GUILD_ID", "123456789"),
            ("REAPER_INTERVAL", "30s"),
            ("STATS_RESET_INTERVAL", "1day"),
            ("RESOLVER_URL", "http://resolver:8080"),
        ]))
        .unwrap();

        assert_eq!(config.guild_id, Some(123456789));
        assert_eq!(config.reaper_interval, Duration::from_secs(30));
        assert_eq!(config.stats_reset_interval, Duration::from_secs(86_400));
        assert_eq!(config.resolver_url, "http://resolver:8080");
    }

    #[test]
    fn bot_rejects_bad_values() {
        assert!(BotConfig::from_lookup(env(&[
            ("DISCORD_TOKEN", "secret"),
            ("GUILD_ID", "not-a-number"),
        ]))
        .is_err());
        assert!(BotConfig::from_lookup(env(&[
            ("DISCORD_TOKEN", "secret"),
            ("REAPER_INTERVAL", "0s"),
        ]))
        .is_err());
        assert!(BotConfig::from_lookup(env(&[
            ("DISCORD_TOKEN", "secret"),
            ("RESOLVER_URL", "localhost"),
        ]))
        .is_err());
    }

    #[test]
    fn summary_hides_token() {
        let config = BotConfig::from_lookup(env(&[("DISCORD_TOKEN", "very-secret")])).unwrap();
        let summary = config.summary();

        assert!(!summary.contains("very-secret"));
        assert!(summary.contains("global"));
    }

    #[test]
    fn resolver_defaults_apply() {
        let config = ResolverConfig::from_lookup(env(&[])).unwrap();

        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:5000");
        assert_eq!(config.max_direct_duration, Duration::from_secs(1800));
        assert!(!config.enforce_limit_on_search);
        assert_eq!(config.ytdlp_path, "yt-dlp");
    }

    #[test]
    fn resolver_parses_overrides() {
        let config = ResolverConfig::from_lookup(env(&[
            ("RESOLVER_HOST", "0.0.0.0"),
            ("RESOLVER_PORT", "8080"),
            ("MAX_DIRECT_DURATION", "1h"),
            ("ENFORCE_LIMIT_ON_SEARCH", "true"),
        ]))
        .unwrap();

        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:8080");
        assert_eq!(config.max_direct_duration, Duration::from_secs(3600));
        assert!(config.enforce_limit_on_search);
    }

    #[test]
    fn resolver_rejects_hostnames_and_bad_ports() {
        assert!(ResolverConfig::from_lookup(env(&[("RESOLVER_HOST", "localhost")])).is_err());
        assert!(ResolverConfig::from_lookup(env(&[("RESOLVER_PORT", "70000")])).is_err());
    }
}
