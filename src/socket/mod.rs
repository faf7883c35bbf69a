//! Socket and connection management for probes.
//!
//! - [`connectjob`]: DNS → TCP → TLS connection flow
//! - [`client`]: the connected socket type
//! - [`tls`]: TLS configuration with BoringSSL

pub mod client;
pub mod connectjob;
pub mod tls;
