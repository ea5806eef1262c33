//! Data models for the Blood Bridge API.
//!
//! Field names serialize as camelCase to match the web client.

mod blood_type;
mod donor;
mod hospital;
mod location;
mod notification;
mod request;

pub use blood_type::*;
pub use donor::*;
pub use hospital::*;
pub use location::*;
pub use notification::*;
pub use request::*;
