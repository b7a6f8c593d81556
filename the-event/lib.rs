//! Single-threaded publish/subscribe primitives shared by every hook.
//!
//! Hooks run on one UI thread and each handler runs to completion before the
//! next event is processed. The types here lean on that: they are `!Send`,
//! use `Rc`/`RefCell`, and never hold a borrow while a subscriber runs, so a
//! subscriber may publish, subscribe or cancel re-entrantly.
//!
//! - [`Subscription`] is the cancellation handle returned by every
//!   `subscribe` call. Cancelling is idempotent and dropping cancels.
//! - [`Signal`] is a process-wide value with change notification (the ambient
//!   theme indicator is one).
//! - [`Channel`] broadcasts events to every subscriber.
//! - [`KeyedChannel`] routes events to the subscribers of a single key (pushed
//!   updates are routed by field id this way).

mod channel;
mod signal;
mod subscribers;
mod subscription;

pub use channel::{
  Channel,
  KeyedChannel,
};
pub use signal::Signal;
pub use subscription::Subscription;
