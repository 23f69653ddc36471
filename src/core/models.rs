// src/core/models.rs

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumIter};

use crate::core::errors::ProbeError;

// --- Reusable Result Types ---

/// The key/value payload a probe produces for its report section.
pub type SectionData = Map<String, Value>;

/// What a probe returns from its `run` method. The orchestrator folds it into a `ProbeOutcome`.
pub type ProbeResult = Result<SectionData, ProbeError>;

// --- Core Data Models ---

/// The severity level of a finding. Orders most severe first.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// An analysis finding: a severity level plus a knowledge-base code.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisFinding {
    pub severity: Severity,
    pub code: String,
}

impl AnalysisFinding {
    pub fn new(severity: Severity, code: &str) -> Self {
        Self { severity, code: code.to_string() }
    }
}

/// Identifies a probe and, through its `Display` form, the report section it owns.
///
/// Declaration order is the order sections appear in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum ProbeKind {
    #[strum(to_string = "Domain Info")]
    Whois,
    #[strum(to_string = "Hosting")]
    Hosting,
    #[strum(to_string = "Email")]
    Mx,
    #[strum(to_string = "TXT Records")]
    Txt,
    #[strum(to_string = "Website Tech")]
    Technology,
    #[strum(to_string = "WordPress")]
    Cms,
    #[strum(to_string = "Security")]
    Security,
    #[strum(to_string = "Performance")]
    Performance,
    #[strum(to_string = "Advertising")]
    Advertising,
    #[strum(to_string = "Contact Emails")]
    Contacts,
}

impl ProbeKind {
    /// Short machine-friendly name used in log fields.
    pub fn slug(&self) -> &'static str {
        match self {
            ProbeKind::Whois => "whois",
            ProbeKind::Hosting => "hosting",
            ProbeKind::Mx => "mx",
            ProbeKind::Txt => "txt",
            ProbeKind::Technology => "tech",
            ProbeKind::Cms => "cms",
            ProbeKind::Security => "security",
            ProbeKind::Performance => "performance",
            ProbeKind::Advertising => "ads",
            ProbeKind::Contacts => "contacts",
        }
    }
}

// Section names are the JSON keys of the report.
impl Serialize for ProbeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The tagged result of one probe. Never partially written.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success(SectionData),
    Failure(String),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success(_))
    }
}

impl From<ProbeResult> for ProbeOutcome {
    fn from(result: ProbeResult) -> Self {
        match result {
            Ok(data) => ProbeOutcome::Success(data),
            Err(e) => ProbeOutcome::Failure(e.to_string()),
        }
    }
}

/// Data handed from the context-providing probes (WHOIS) to the rest of the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeContext {
    pub nameservers: Vec<String>,
}

/// Everything the orchestrator collected for one audit, before assembly.
#[derive(Debug, Clone, Default)]
pub struct ProbeResults {
    pub outcomes: BTreeMap<ProbeKind, ProbeOutcome>,
    pub context: ProbeContext,
}

impl ProbeResults {
    #[cfg(test)]
    pub fn outcome(&self, kind: ProbeKind) -> Option<&ProbeOutcome> {
        self.outcomes.get(&kind)
    }
}

// --- Report ---

/// The merged report: one entry per successful probe, keyed by section name.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct AuditReport {
    sections: BTreeMap<ProbeKind, SectionData>,
}

impl AuditReport {
    pub fn insert(&mut self, kind: ProbeKind, data: SectionData) {
        self.sections.insert(kind, data);
    }

    #[cfg(test)]
    pub fn section(&self, kind: ProbeKind) -> Option<&SectionData> {
        self.sections.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ProbeKind> + '_ {
        self.sections.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// The body returned by `GET /audit/{domain}`.
#[derive(Debug, Clone, Serialize)]
pub struct AuditResponse {
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Audit Time")]
    pub audit_time: String,
    #[serde(rename = "Processing Time")]
    pub processing_time: String,
    #[serde(rename = "Results")]
    pub results: AuditReport,
}

// --- Fingerprint Models ---

/// A detected technology (e.g. a web framework or CMS).
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct Technology {
    pub name: String,
    pub category: String,
    pub version: Option<String>,
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{} {}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

// --- Section Building ---

/// Field names shared between probes and the assembler.
pub mod fields {
    pub const NAME_SERVERS: &str = "Name Servers";
    pub const IP_ADDRESS: &str = "IP Address";
    pub const SERVER: &str = "Server";
    pub const PROVIDER: &str = "Provider";
    pub const MX_RECORDS: &str = "MX Records";
    pub const ISSUES: &str = "Issues";
}

/// Small builder so probes never hand-assemble JSON maps.
///
/// Optional values that are `None` are skipped, never written as `null`.
#[derive(Debug, Default)]
pub struct SectionBuilder {
    data: SectionData,
}

impl SectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), Value::String(value.into()));
        self
    }

    pub fn maybe_text<S: Into<String>>(self, key: &str, value: Option<S>) -> Self {
        match value {
            Some(v) => self.text(key, v),
            None => self,
        }
    }

    pub fn list<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = values.into_iter().map(|v| Value::String(v.into())).collect();
        self.data.insert(key.to_string(), Value::Array(items));
        self
    }

    pub fn value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> SectionData {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn section_names_are_unique() {
        let mut names: Vec<String> = ProbeKind::iter().map(|k| k.to_string()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn report_serializes_with_section_names() {
        let mut report = AuditReport::default();
        report.insert(ProbeKind::Whois, SectionBuilder::new().text("Registrar", "Example Registrar").build());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["Domain Info"]["Registrar"], "Example Registrar");
    }

    #[test]
    fn builder_skips_missing_optionals() {
        let data = SectionBuilder::new()
            .maybe_text("Present", Some("yes"))
            .maybe_text::<String>("Absent", None)
            .build();
        assert!(data.contains_key("Present"));
        assert!(!data.contains_key("Absent"));
    }
}
