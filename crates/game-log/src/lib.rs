//! Game log core: tail the client log, track session state, classify kills.
//!
//! Lines flow through three stages. [`LineSource`] yields decoded lines from
//! a growing file, [`SessionState`] absorbs state-bearing lines (mode, ship,
//! zone), and [`classify`] turns kill lines into reportable events. The
//! [`TailWorker`] drives the loop on its own thread and hands reportable
//! events to a [`Dispatcher`].

pub mod classify;
pub mod dispatch;
pub mod event;
pub mod identity;
pub mod pipeline;
pub mod shared;
pub mod ships;
pub mod source;
pub mod state;
pub mod worker;

pub use classify::{ReportContext, classify};
pub use dispatch::Dispatcher;
pub use event::{Classified, ClassifiedEvent, Exclusion};
pub use identity::{Identity, IdentityError, resolve_identity};
pub use pipeline::LineProcessor;
pub use shared::{CredentialCell, MonitorFlag};
pub use source::{LineSource, SourceError};
pub use state::{ActiveShip, SessionState};
pub use worker::{DEFAULT_POLL_INTERVAL, TailWorker};
