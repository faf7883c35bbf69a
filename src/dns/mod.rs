//! Name resolution for probe connections.
//!
//! The `Resolve` trait lets the probe's connect step use either hickory-dns
//! ([`HickoryResolver`]) or the operating system resolver
//! ([`SystemResolver`]), and lets tests substitute their own.

mod hickory;
mod resolve;

pub use hickory::HickoryResolver;
pub use resolve::{Addrs, Name, Resolve, Resolving, SystemResolver};
