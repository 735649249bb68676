#![forbid(unsafe_code)]

//! Runtime for the relief data layer.
//!
//! This crate provides:
//! - [`ReliefHub`] owning one backend, bus, and timestamp source per tab
//! - [`ResourceRepository`] and [`ResponseRepository`] for writes
//! - [`EventBus`] with RAII [`Subscription`]s
//! - [`CrossTabSync`] replaying other tabs' writes onto the local bus
//! - [`DerivedViews`] and the free view functions for reads
//! - [`ReliefConfig`] and [`logging::init`] for hosts

pub mod bus;
pub mod clock;
pub mod config;
pub mod cross_tab;
pub mod hub;
pub mod logging;
pub mod resources;
pub mod responses;
pub mod views;

pub use bus::{EventBus, Subscription, SubscriptionSet};
pub use clock::{Clock, ManualClock, MonotonicStamp, SystemClock};
pub use config::{LogFormat, LoggingConfig, ReliefConfig, StorageConfig};
pub use cross_tab::CrossTabSync;
pub use hub::{ReliefHub, ReliefHubBuilder, Responder};
pub use resources::ResourceRepository;
pub use responses::{CleanupReport, ResponseOutcome, ResponseRepository};
pub use views::{
    DerivedViews, ResourceFilter, ResponderInfo, StatusCounts, UserDirectory, UserProfile,
    actionable_by, resources_by_owner, sorted_filtered, status_counts,
};
