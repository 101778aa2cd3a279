//! # Commutewatch Core Library
//!
//! Core business logic for Commutewatch, a service that notifies a
//! subscriber when their live commute duration drops to or below a chosen
//! threshold inside a recurring daily time window, without re-alerting on
//! every poll once a notification has fired.
//!
//! ## Key Components
//!
//! - [`TimeWindow`]: recurring weekday window membership in a named timezone
//! - [`decision`]: the notification decay policy (fire / suppress / reset)
//! - [`TriggerService`]: evaluation orchestration for inbound requests
//! - [`Registry`] / [`EventStore`]: injected persistence seams with
//!   in-memory and SQLite implementations
//! - [`RealtimeSweep`]: periodic batch signaling of in-window subscriptions
//!
//! The HTTP surface lives in the `commutewatch-server` crate; this library
//! is transport-agnostic.

pub mod config;
pub mod decision;
pub mod directions;
pub mod error;
pub mod event;
pub mod storage;
pub mod subscription;
pub mod sweep;
pub mod trigger;
pub mod window;

pub use config::Config;
pub use decision::{decide, Decision, SubscriptionState, DECAY_MINUTES};
pub use directions::{DirectionsClient, GoogleDirectionsClient, RouteEstimate};
pub use error::{ConfigError, CoreError, DirectionsError, RegistryError, ValidationError};
pub use event::{Event, EventMeta};
pub use storage::{EventStore, KeyedLocks, MemoryStore, Registry, SqliteStore};
pub use subscription::{EvaluationRequest, Subscription, DEFAULT_EVENT_LIMIT};
pub use sweep::{RealtimeSweep, SweepSettings, DEFAULT_SWEEP_INTERVAL};
pub use trigger::TriggerService;
pub use window::{TimeOfDay, TimeWindow};
