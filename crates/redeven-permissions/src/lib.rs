//! Local permission cap and per-`(user, app)` policy resolution.
//!
//! The agent never trusts permissions declared by the control plane on
//! their own: every grant is intersected with the operator's locally
//! configured cap before it reaches a session. See [`PermissionPolicy::resolve`].

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod policy;
mod set;

pub use error::{PermissionError, PermissionResult};
pub use policy::PermissionPolicy;
pub use set::PermissionSet;
