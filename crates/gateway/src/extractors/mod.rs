//! Custom request extractors.

mod client_addr;

pub use client_addr::ClientAddr;
