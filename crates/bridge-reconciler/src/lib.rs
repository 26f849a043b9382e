//! The reconciliation engine.
//!
//! [`Bridge`] keeps three views of group membership consistent: the
//! directory group (via the identity provider), the remote user roster (via
//! the service provider), and the durable DN↔GUID mapping store. It runs a
//! bulk three-way sync at startup and then applies incremental add/remove
//! events from the membership streams, one at a time.

pub mod bridge;
pub mod error;
pub mod projection;

pub use bridge::Bridge;
pub use error::BridgeError;
pub use projection::map_entry;
