//! Core of the page hooks: the page model, the attribute watcher, and the two
//! hooks that reconcile state from two sources of truth.
//!
//! - [`editor_hook`] keeps an editing surface, its mirror form control and
//!   server-pushed updates in sync, and rebuilds the surface on theme change.
//! - [`chart`] re-renders an inline chart whenever its points attribute
//!   mutates.
//!
//! Nothing here talks to a real browser or rendering library. Third-party
//! components are reached through [`surface::EditorAdapter`] and
//! [`chart::ChartRenderer`].

pub mod chart;
pub mod editor_hook;
pub mod field;
pub mod page;
pub mod points;
pub mod surface;
pub mod watch;
