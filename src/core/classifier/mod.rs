// src/core/classifier/mod.rs

// Pure pattern tables over fetched pages. Nothing in here touches the network.
pub mod contacts;
pub mod technology;
pub mod trackers;
pub mod wordpress;
