// src/core/net/mod.rs

// Protocol clients shared by every probe through `ProbeEnv`.
pub mod dns;
pub mod http;
pub mod whois;
