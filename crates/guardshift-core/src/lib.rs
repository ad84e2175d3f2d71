//! # Guardshift Core Library
//!
//! This library provides the attendance lifecycle engine for field guards:
//! location-verified check-in and check-out, in-shift breaks and attendance
//! statistics. The `guardshift` CLI is a thin front end over the same core.
//!
//! ## Architecture
//!
//! - **Credential Gate**: encrypted session credential in a key-value store;
//!   answers "may we sync?" before any network round-trip
//! - **Location Provider**: permission, timeout and a two-tier accuracy/retry
//!   policy over a pluggable [`LocationSource`]
//! - **Shift Gateway**: one HTTP call per intent, with the backend's response
//!   envelopes normalized at the boundary
//! - **Lifecycle Store**: canonical shift buckets, the break sub-state and
//!   statistics, mutated only through a reducer
//!
//! ## Key Components
//!
//! - [`CredentialGate`]: credential storage and validity
//! - [`LocationProvider`]: validated location fixes
//! - [`HttpShiftGateway`]: the [`ShiftGateway`] backed by `reqwest`
//! - [`LifecycleStore`]: intents, loading flags and state snapshots
//! - [`Config`]: application configuration management

pub mod clock;
pub mod credential;
pub mod error;
pub mod events;
pub mod gateway;
pub mod lifecycle;
pub mod location;
pub mod model;
pub mod storage;

pub use credential::{CredentialGate, KeyValueStore, KeyringStore, MemoryStore, SessionCredential};
pub use error::{
    ConfigError, CoreError, CredentialError, GatewayError, LifecycleError, LocationError,
    RetryAffordance, ValidationError,
};
pub use events::Event;
pub use gateway::{HttpShiftGateway, ShiftGateway};
pub use lifecycle::{Dispatch, LifecycleStore, ShiftState, SyncSlice};
pub use location::{LocationFix, LocationPolicy, LocationProvider, LocationSource, ManualLocation};
pub use model::{Break, BreakType, Shift, ShiftStatistics, ShiftStatus, StatisticsRange};
pub use storage::{data_dir, Config, SnapshotFile};
