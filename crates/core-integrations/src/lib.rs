//! Provider Adapters, Phone-Number → Provider Router, and Webhook Ingress
//! (§4.4, §4.5, §4.7). Depends on `core-dispatch` for the Active-Call
//! Ledger (Twilio's pre-reservation needs it directly) and implements
//! `core_dispatch::CallRouter` so the dispatch core stays provider-agnostic.

pub mod adapter;
pub mod credentials;
pub mod encryption;
pub mod error;
pub mod providers;
pub mod router;
pub mod status_map;
pub mod webhook;

pub use adapter::{AdapterFailure, AdapterFailureKind, AdapterSuccess, CallAdapter, CallParams};
pub use credentials::{CredentialStore, SystemCredentials};
pub use error::IntegrationError;
pub use router::ProviderRouter;
pub use webhook::{apply_transition, resolve_twilio_call_uuid, WebhookEvent};
