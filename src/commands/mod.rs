//! Inbound command surface.
//!
//! Thin by design: subscribe/unsubscribe map straight onto the registry.

mod handler;

pub use handler::{
    CommandHandler, ALREADY_SUBSCRIBED_REPLY, FAILURE_REPLY, NOT_SUBSCRIBED_REPLY, SUBSCRIBED_REPLY,
    UNSUBSCRIBED_REPLY,
};
