//! # canisternet
//!
//! Hostname to canister resolution for a request-intercepting agent.
//!
//! Every outgoing request for an unfamiliar domain has to be classified
//! quickly: either the host is served by a canister with identifier `X`,
//! reachable through gateway `G`, or it is an ordinary web resource that
//! passes through untouched. `canisternet` makes that decision with a single
//! anonymous `HEAD` probe per host, then serves the answer from cache for an
//! hour.
//!
//! ## Features
//!
//! - **One probe per host**: concurrent lookups for the same hostname share a
//!   single in-flight probe
//! - **TTL cache**: in memory, backed by a SQLite record store that survives
//!   restarts
//! - **Retry**: a transport failure is retried once, immediately
//! - **Strict identifiers**: a malformed canister id header is an error, not
//!   a silent miss
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use canisternet::resolver::{CanisterResolver, FixedLocation};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = CanisterResolver::builder()
//!         .location(FixedLocation::new(Url::parse("https://rdmx6-jaaaa-aaaaa-aaadq-cai.ic0.app")?))
//!         .build();
//!
//!     resolver.setup().await?;
//!     let gateway = resolver.current_gateway(false).await?;
//!     match resolver.lookup(&Url::parse("https://www.customdappdomain.io")?).await? {
//!         Some(canister) => println!("{canister} via {gateway:?}"),
//!         None => println!("ordinary web resource"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error types, transport error codes, clocks
//! - [`canister`] - Canister identifier parsing and validation
//! - [`dns`] - Name resolution for probes
//! - [`socket`] - TCP connect and TLS handshake
//! - [`probe`] - The `HEAD` probe and its retry policy
//! - [`store`] - Persistent host records
//! - [`resolver`] - Gateway selection, lookup engine, and the resolver facade

pub mod base;
pub mod canister;
pub mod dns;
pub mod probe;
pub mod resolver;
pub mod socket;
pub mod store;

pub use base::error::{ResolveError, ResolveErrorKind};
pub use canister::CanisterId;
pub use resolver::{CanisterResolver, Gateway, ResolverConfig};
