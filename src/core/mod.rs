// src/core/mod.rs

/// Data structures shared across the audit: probe outcomes, report sections, findings.
pub mod models;

pub mod errors;

/// Input normalization and validation.
pub mod domain;

/// Findings database and provider signature tables.
pub mod knowledge_base;

/// Pure HTML and header classifiers.
pub mod classifier;

/// Protocol clients (HTTP, DNS, WHOIS).
pub mod net;

pub mod probe;
pub mod registry;
pub mod orchestrator;
pub mod assembler;
pub mod audit;

/// One module per probe.
pub mod scanner;
