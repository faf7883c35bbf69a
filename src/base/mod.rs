//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): transport error codes matching `net_error_list.h`
//! - [`ResolveError`](error::ResolveError): errors surfaced by the resolver
//! - [`Clock`](clock::Clock): wall-clock source for record ages

pub mod clock;
pub mod context;
pub mod error;
pub mod neterror;

#[cfg(test)]
mod tests;
