// src/core/registry.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::errors::RegistryError;
use crate::core::models::ProbeKind;
use crate::core::probe::Probe;
use crate::core::scanner::{
    ads_scanner::AdsProbe, contacts_scanner::ContactsProbe, dns_scanner::{MxProbe, TxtProbe},
    fingerprint_scanner::TechnologyProbe, hosting_scanner::HostingProbe,
    performance_scanner::PerformanceProbe, security_scanner::SecurityProbe,
    whois_scanner::WhoisProbe, wordpress_scanner::WordPressProbe,
};

/// The full catalog, in dispatch order.
pub fn all_probes() -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(WhoisProbe),
        Arc::new(HostingProbe),
        Arc::new(MxProbe),
        Arc::new(TxtProbe),
        Arc::new(TechnologyProbe),
        Arc::new(WordPressProbe),
        Arc::new(SecurityProbe),
        Arc::new(PerformanceProbe),
        Arc::new(AdsProbe),
        Arc::new(ContactsProbe),
    ]
}

/// A fixed, validated set of probes. Built once at startup.
pub struct ProbeRegistry {
    probes: Vec<Arc<dyn Probe>>,
}

impl ProbeRegistry {
    /// Rejects two probes claiming one section. Context providers are moved to the front,
    /// keeping the given order otherwise.
    pub fn new(mut probes: Vec<Arc<dyn Probe>>) -> Result<Self, RegistryError> {
        let mut seen: BTreeSet<ProbeKind> = BTreeSet::new();
        for probe in &probes {
            if !seen.insert(probe.kind()) {
                return Err(RegistryError::DuplicateSection(probe.kind()));
            }
        }
        probes.sort_by_key(|p| !p.provides_context());
        Ok(Self { probes })
    }

    /// Probes that must finish (or be abandoned) before the batch starts.
    pub fn prelude(&self) -> impl Iterator<Item = &Arc<dyn Probe>> {
        self.probes.iter().filter(|p| p.provides_context())
    }

    /// Probes dispatched concurrently after the prelude.
    pub fn batch(&self) -> impl Iterator<Item = &Arc<dyn Probe>> {
        self.probes.iter().filter(|p| !p.provides_context())
    }

    pub fn kinds(&self) -> Vec<ProbeKind> {
        self.probes.iter().map(|p| p.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn catalog_covers_every_section_once() {
        let registry = ProbeRegistry::new(all_probes()).unwrap();
        let mut kinds = registry.kinds();
        kinds.sort();
        assert_eq!(kinds, ProbeKind::iter().collect::<Vec<_>>());
    }

    #[test]
    fn whois_is_the_only_prelude_probe() {
        let registry = ProbeRegistry::new(all_probes()).unwrap();
        let prelude: Vec<_> = registry.prelude().map(|p| p.kind()).collect();
        assert_eq!(prelude, vec![ProbeKind::Whois]);
        assert_eq!(registry.batch().count(), registry.len() - 1);
    }

    #[test]
    fn duplicate_sections_are_rejected() {
        let probes: Vec<Arc<dyn Probe>> = vec![Arc::new(MxProbe), Arc::new(MxProbe)];
        let err = ProbeRegistry::new(probes).err().unwrap();
        assert!(matches!(err, RegistryError::DuplicateSection(ProbeKind::Mx)));
    }

    #[test]
    fn context_providers_move_to_the_front() {
        let probes: Vec<Arc<dyn Probe>> = vec![Arc::new(HostingProbe), Arc::new(WhoisProbe)];
        let registry = ProbeRegistry::new(probes).unwrap();
        assert_eq!(registry.kinds(), vec![ProbeKind::Whois, ProbeKind::Hosting]);
    }
}
