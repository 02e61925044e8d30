//! Notification queue module
//!
//! An ordered, self-expiring list of transient user-facing messages
//! ("toasts"). The queue knows nothing about pixels: it exposes each
//! message's ordinal position and leaves stacking to the renderer.
//!
//! Time comes from an injected [`Clock`], so expiry can be driven
//! deterministically with a [`ManualClock`] in tests and by a background
//! reaper task against the [`SystemClock`] in production.

mod clock;
mod queue;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use queue::{NotificationQueue, DEFAULT_TTL};
pub use types::{
    Notification, NotificationId, NotificationKind, PositionedNotification, QueueEvent,
};

#[cfg(test)]
mod tests;
