//! Change notification
//!
//! [`Subject`] is the event primitive used by the session and the permission
//! cache. [`Subscription`] builds derived values on top of both.

mod subject;
mod subscription;

pub use subject::{ListenerId, Subject};
pub use subscription::{watch, watch_channel, Subscription};
