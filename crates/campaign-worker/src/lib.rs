//! Campaign Worker (§4.9) and Orphan Detector (§4.10): the process that
//! drives outbound campaigns through the Call Pipeline.

pub mod config;
pub mod contacts;
pub mod error;
pub mod orphan;
pub mod worker;

pub use config::WorkerConfig;
pub use contacts::{ContactListSource, ContactRow, PostgresContactListSource};
pub use error::WorkerError;
pub use orphan::OrphanDetector;
pub use worker::CampaignWorker;
