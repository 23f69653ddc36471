// src/core/net/dns.rs

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use std::time::Duration;

use crate::config::{ConfigError, ResolverSettings};

/// Builds the process-wide resolver from the configured public nameservers.
pub fn build_resolver(settings: &ResolverSettings) -> Result<TokioAsyncResolver, ConfigError> {
    let addresses = settings.addresses()?;
    let group = NameServerConfigGroup::from_ips_clear(&addresses, 53, true);
    let config = ResolverConfig::from_parts(None, vec![], group);

    let mut opts = ResolverOpts::default();
    opts.timeout = Duration::from_secs(settings.timeout_secs);
    opts.attempts = settings.attempts;

    Ok(TokioAsyncResolver::tokio(config, opts))
}

/// Whether a lookup failed only because the name has no records of that type.
///
/// Probes treat this as an empty answer, not as a failure.
pub fn is_no_records(error: &ResolveError) -> bool {
    matches!(error.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolver_builds_from_defaults() {
        assert!(build_resolver(&ResolverSettings::default()).is_ok());
    }

    #[test]
    fn resolver_rejects_hostname_nameservers() {
        let settings = ResolverSettings {
            nameservers: vec!["one.one.one.one".into()],
            ..ResolverSettings::default()
        };
        assert!(build_resolver(&settings).is_err());
    }

    #[test]
    fn message_errors_are_not_empty_answers() {
        let error = ResolveError::from("boom");
        assert!(!is_no_records(&error));
    }
}
