//! Remote service clients

pub mod identity;

pub use identity::{
    HttpIdentityClient, IdentityClientConfig, IdentityError, IdentityProvider, IssuedToken,
};
