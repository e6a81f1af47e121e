//! Git subsystem: the local repository client.

pub mod client;

pub use client::GitClient;
