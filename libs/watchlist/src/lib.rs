//! # RWF Watchlist - View Aggregation for Fan-In Streams
//!
//! ## Purpose
//!
//! When many consumers share one upstream item stream, each asks for its own
//! view (a set of field IDs or element names). This crate normalizes those
//! per-consumer views and folds them into a refcounted aggregate, so the
//! provider request carries exactly the union and only changes when the
//! union really changes.
//!
//! ## Architecture Role
//!
//! ```text
//! consumer requests ──▶ WlView (normalize) ──▶ WlAggregateView
//!                                                │ merge/commit
//!                                                ▼
//!                                     rwf-codec array ──▶ provider
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use rwf_watchlist::{WlAggregateView, WlView};
//!
//! let mut aggregate = WlAggregateView::new();
//! let a = aggregate.add(WlView::from_field_ids(vec![22, 25]));
//! let _b = aggregate.add(WlView::from_field_ids(vec![25, 30]));
//! assert!(aggregate.merge()); // union changed: request {22, 25, 30}
//! aggregate.commit();
//!
//! aggregate.remove(a);
//! assert!(aggregate.merge()); // union shrank: request {25, 30}
//! aggregate.commit();
//! assert!(aggregate.contains(&WlView::from_field_ids(vec![25])));
//! ```

pub mod aggregate;
pub mod view;

pub use aggregate::{ViewHandle, ViewStage, WlAggregateView};
pub use view::{ViewElements, ViewKind, WlView};
