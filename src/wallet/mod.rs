//! Wallet identities
//!
//! Each identity pairs a signing keypair with its own network route:
//!
//! ```text
//! WALLET_PRIVATE_KEY_<n> ─┐
//!                         ├→ Identity { keypair, proxy, transport } → IdentityPool
//! WALLET_PROXY_<n>     ───┘
//! ```
//!
//! Every request made for an identity (quotes, builds, submission) goes out
//! through that identity's transport and nothing else.

pub mod identity;
pub mod pool;
pub mod proxy;

pub use identity::{parse_keypair, Identity};
pub use pool::{IdentityEntry, IdentityPool};
pub use proxy::ProxySpec;
