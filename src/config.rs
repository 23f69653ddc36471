// src/config.rs

//! Process-wide settings, loaded once at startup.
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file named by
//! `DOMAIN_AUDIT_CONFIG`, then individual environment variables.

use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const CONFIG_PATH_ENV: &str = "DOMAIN_AUDIT_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Deadlines for each probe family, in seconds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbeDeadlines {
    pub whois_secs: u64,
    pub dns_secs: u64,
    pub hosting_secs: u64,
    pub http_secs: u64,
    pub tls_secs: u64,
    pub performance_secs: u64,
}

impl Default for ProbeDeadlines {
    fn default() -> Self {
        Self {
            whois_secs: 20,
            dns_secs: 10,
            hosting_secs: 15,
            http_secs: 15,
            tls_secs: 10,
            performance_secs: 15,
        }
    }
}

impl ProbeDeadlines {
    pub fn whois(&self) -> Duration {
        Duration::from_secs(self.whois_secs)
    }

    pub fn dns(&self) -> Duration {
        Duration::from_secs(self.dns_secs)
    }

    pub fn hosting(&self) -> Duration {
        Duration::from_secs(self.hosting_secs)
    }

    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }

    pub fn tls(&self) -> Duration {
        Duration::from_secs(self.tls_secs)
    }

    pub fn performance(&self) -> Duration {
        Duration::from_secs(self.performance_secs)
    }

    fn entries_mut(&mut self) -> [(&'static str, &mut u64); 6] {
        [
            ("whois_secs", &mut self.whois_secs),
            ("dns_secs", &mut self.dns_secs),
            ("hosting_secs", &mut self.hosting_secs),
            ("http_secs", &mut self.http_secs),
            ("tls_secs", &mut self.tls_secs),
            ("performance_secs", &mut self.performance_secs),
        ]
    }
}

/// Settings for the shared DNS resolver.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverSettings {
    pub nameservers: Vec<String>,
    pub timeout_secs: u64,
    pub attempts: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            nameservers: ["8.8.8.8", "1.1.1.1", "8.8.4.4", "1.0.0.1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout_secs: 5,
            attempts: 2,
        }
    }
}

impl ResolverSettings {
    /// Parsed nameserver addresses. Entries that are not IP addresses are rejected.
    pub fn addresses(&self) -> Result<Vec<IpAddr>, ConfigError> {
        self.nameservers
            .iter()
            .map(|ns| {
                ns.trim().parse::<IpAddr>().map_err(|_| ConfigError::InvalidValue {
                    key: "resolver.nameservers",
                    value: ns.clone(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    pub host: String,
    pub port: u16,
    /// Size of the worker pool probes are dispatched on.
    pub workers: usize,
    /// Hard ceiling for one whole audit.
    pub deadline_secs: u64,
    pub probes: ProbeDeadlines,
    pub resolver: ResolverSettings,
    /// Rotated when a site answers 403/429/503 to the previous one.
    pub user_agents: Vec<String>,
    pub max_contact_emails: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: 8,
            deadline_secs: 40,
            probes: ProbeDeadlines::default(),
            resolver: ResolverSettings::default(),
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
                concat!("DomainAudit/", env!("CARGO_PKG_VERSION")).to_string(),
            ],
            max_contact_emails: 10,
        }
    }
}

impl AuditConfig {
    /// Loads the configuration from the file named by `DOMAIN_AUDIT_CONFIG` (if any)
    /// and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => {
                let path = PathBuf::from(path);
                debug!(path = ?path, "Loading configuration file.");
                let content = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies environment-style overrides. `lookup` maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.port = parse_value("PORT", &port)?;
        }
        if let Some(host) = lookup("DOMAIN_AUDIT_HOST") {
            self.host = host;
        }
        if let Some(workers) = lookup("DOMAIN_AUDIT_WORKERS") {
            self.workers = parse_value("DOMAIN_AUDIT_WORKERS", &workers)?;
        }
        if let Some(secs) = lookup("DOMAIN_AUDIT_DEADLINE_SECS") {
            self.deadline_secs = parse_value("DOMAIN_AUDIT_DEADLINE_SECS", &secs)?;
        }
        if let Some(secs) = lookup("DOMAIN_AUDIT_WHOIS_SECS") {
            self.probes.whois_secs = parse_value("DOMAIN_AUDIT_WHOIS_SECS", &secs)?;
        }
        if let Some(list) = lookup("DOMAIN_AUDIT_NAMESERVERS") {
            self.resolver.nameservers = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    /// Rejects unusable settings and clamps probe deadlines to the audit ceiling.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.deadline_secs == 0 {
            return Err(ConfigError::Invalid("deadline_secs must be at least 1".into()));
        }
        if self.user_agents.is_empty() {
            return Err(ConfigError::Invalid("user_agents must not be empty".into()));
        }
        self.resolver.addresses()?;

        let ceiling = self.deadline_secs;
        for (name, secs) in self.probes.entries_mut() {
            if *secs == 0 {
                return Err(ConfigError::Invalid(format!("probes.{name} must be at least 1")));
            }
            if *secs > ceiling {
                warn!(probe = name, secs = *secs, ceiling, "Probe deadline exceeds audit deadline; clamping.");
                *secs = ceiling;
            }
        }
        Ok(())
    }

    pub fn overall_deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|_| ConfigError::InvalidValue {
            key: "host",
            value: self.host.clone(),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue { key, value: raw.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let mut config = AuditConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address().unwrap().port(), 8000);
        assert_eq!(config.resolver.addresses().unwrap().len(), 4);
    }

    #[test]
    fn toml_overrides_only_given_fields() {
        let config = AuditConfig::from_toml_str(
            r#"
            workers = 4
            [probes]
            whois_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.probes.whois_secs, 5);
        assert_eq!(config.probes.dns_secs, ProbeDeadlines::default().dns_secs);
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn environment_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "9090"),
            ("DOMAIN_AUDIT_WORKERS", "3"),
            ("DOMAIN_AUDIT_NAMESERVERS", "9.9.9.9, 149.112.112.112"),
        ]
        .into_iter()
        .collect();
        let mut config = AuditConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.workers, 3);
        assert_eq!(config.resolver.nameservers, vec!["9.9.9.9", "149.112.112.112"]);
    }

    #[test]
    fn bad_override_is_reported() {
        let mut config = AuditConfig::default();
        let err = config
            .apply_overrides(|key| (key == "DOMAIN_AUDIT_WORKERS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "DOMAIN_AUDIT_WORKERS", .. }));
    }

    #[test]
    fn probe_deadlines_are_clamped_to_ceiling() {
        let mut config = AuditConfig { deadline_secs: 12, ..AuditConfig::default() };
        config.validate().unwrap();
        assert_eq!(config.probes.whois_secs, 12);
        assert_eq!(config.probes.dns_secs, 10);
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = AuditConfig { workers: 0, ..AuditConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_ip_nameserver_rejected() {
        let mut config = AuditConfig::default();
        config.resolver.nameservers = vec!["dns.google".into()];
        assert!(config.validate().is_err());
    }
}
