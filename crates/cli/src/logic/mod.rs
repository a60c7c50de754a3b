//! Request handlers.
//!
//! Each handler takes the shared book model and a request, and returns a
//! serializable response. purge is the exception: it works on the cache.

pub mod add;
pub mod check;
pub mod get;
pub mod purge;
pub mod remove;

pub use add::{AddRequest, add_impl};
pub use check::{CheckRequest, check_impl};
pub use get::{GetRequest, get_impl};
pub use purge::purge_impl;
pub use remove::{RemoveRequest, remove_impl};
