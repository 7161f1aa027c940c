//! Loader discovery.
//!
//! ```text
//! roots ──▶ LoaderOrder ──(HandlerRegistry)──▶ [(loader, handlers)]
//!                                                     │
//!                          find_classpath_entries ◀───┘
//!                                     │
//!                                     ▼
//!                              ClasspathOrder
//! ```

pub mod classpath;
pub mod finder;
pub mod order;

pub use classpath::{ClasspathEntry, ClasspathOrder};
pub use finder::{DiscoveryResult, LoaderFinder};
pub use order::{LoaderOrder, OrderEntry};
