//! Domain Models
//!
//! Accounts, intake records and the claims carried by a verified bearer token.
//! All identifiers are SQLite row ids wrapped in newtypes so an account id can
//! never be passed where a record or identity id is expected.

pub mod account;
pub mod record;
pub mod claims;

pub use account::*;
pub use record::*;
pub use claims::*;
