//! # Stagetrack
//!
//! The networked half of Stagetrack: the client for the stage services,
//! the per-user view layer, the JSON view server and the CLI.
//!
//! `stagetrack-core` owns every rule (stage chain, codes, reconciliation,
//! access, validation). This crate only fetches, locks and serves.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod source;
pub mod view;
