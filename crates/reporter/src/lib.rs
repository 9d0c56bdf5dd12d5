//! Outbound side of the tracker: the reporting API client, the on-disk key
//! cache and the queue that carries events from the tailing thread to the
//! network.

pub mod client;
pub mod dispatch;
pub mod key_store;

pub use client::{Client, Error};
pub use dispatch::{DeliveryStats, Feedback, NoFeedback, Outbound, QueuedDispatcher, run_delivery};
pub use key_store::{KeyStore, KeyStoreError};
