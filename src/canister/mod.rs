//! Canister identifiers.
//!
//! A canister identifier travels as text: the raw id bytes prefixed with
//! their big-endian CRC32, base32 encoded (lowercase, unpadded) and split
//! into dash-separated groups of five characters, e.g.
//! `rdmx6-jaaaa-aaaaa-aaadq-cai`.
//!
//! [`CanisterId::from_text`] is the only way the resolver obtains one; it
//! rejects anything that is not in canonical form.

mod id;

pub use id::{CanisterId, CanisterIdError};
