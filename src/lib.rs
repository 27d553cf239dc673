//! # perch
//!
//! Asynchronous client-side coordination primitives over a
//! ZooKeeper-style hierarchical node service.
//!
//! ## What this crate provides
//!
//! - **Fair distributed lock** - [`FairLock`] queues on sequential
//!   ephemeral nodes and grants in strict creation order
//! - **Configuration channel** - [`ConfigPublisher`] writes typed payloads,
//!   [`ConfigListener`] delivers them through re-armed one-shot watches
//! - **Ancestor creation** - [`AncestorCreator`] builds missing parent
//!   chains, tolerating concurrent creators
//! - **Sessions** - [`CoordinationSession`] owns one connection to the
//!   service, rooted at a chroot path
//!
//! The service itself is reached through the [`Connector`]/[`Transport`]
//! traits; any backend that speaks create/exists/get/set/children/delete
//! with one-shot watches can sit behind them.

mod ancestors;
mod channel;
mod config;
mod constants;
mod errors;
mod future;
mod lock;
mod paths;
mod reply;
mod session;
mod transport;

pub use ancestors::*;
pub use channel::*;
pub use config::*;
pub use constants::*;
pub use errors::*;
pub use future::*;
pub use lock::*;
pub use reply::*;
pub use session::*;
pub use transport::*;

#[cfg(test)]
pub mod test_utils;
