//! In-process caching for the recent-articles view.
//!
//! The cache is a single memory cell shared through `Arc`; there is no
//! cross-process invalidation. Writers ask it to rebuild after every article
//! mutation, readers rebuild it themselves once the window has elapsed.

mod clock;
mod lock;
mod recent;

pub use clock::{Clock, SystemClock};
pub use recent::{DEFAULT_RECENT_WINDOW, RecentArticlesCache, RecentSnapshot, RefreshOutcome};
