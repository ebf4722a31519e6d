//! certwatch server: domain fleet TLS monitoring with provider sync,
//! scheduled probing and notification dispatch.

pub mod api;
pub mod app;
pub mod config;
pub mod logging;
pub mod probe;
pub mod provider;
pub mod renew;
pub mod scan;
pub mod sink;
pub mod state;
