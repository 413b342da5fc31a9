//! Asynchronous callback correlation for the ewma-probe harness
//!
//! The system under test answers an asynchronous search by POSTing its result
//! to a webhook. [`CallbackReceiver`] accepts those deliveries on
//! `POST /webhook/search-results` and files each payload in a
//! [`CorrelationStore`] under its correlation identifier and under
//! [`LAST_KEY`]. Consumers wait for a key with a bounded timeout; reads are
//! destructive, so every delivery is handed to at most one consumer per key.

pub mod errors;
pub mod receiver;
pub mod search;
pub mod store;

pub use errors::CallbackError;
pub use receiver::{CallbackReceiver, CallbackReceiverHandle, WEBHOOK_PATH};
pub use search::{AsyncSearchClient, SearchTicket};
pub use store::{correlation_key, CallbackRecord, CorrelationStore, LAST_KEY, UNKNOWN_KEY};
