//! pchat_client: Synchronisation and privacy-gating engine for Privacy Chat
//!
//! # Concurrency
//! A single engine value owns all client state. Channel readers and the
//! capture timer only post events onto its queue; the engine applies them one
//! at a time. Nothing here takes a lock.
//!
//! # Modules
//! - `store`: ordered message view with append / reconcile-by-id
//! - `presence`: registered identities, replaced wholesale
//! - `reconcile`: applies server pushes to the store and presence
//! - `visibility`: per-viewer reveal / obscure decision
//! - `validation`: liveness session with its camera, frame loop and unlock set
//! - `toggle`: persisted status toggle requests
//! - `connection`: primary channel lifetime and outbound intents
//! - `link` / `ws`: channel seams and their WebSocket implementation
//! - `api`: HTTP collaborators
//! - `engine`: the event loop tying it all together

pub mod api;
pub mod connection;
pub mod engine;
pub mod error;
pub mod event;
pub mod link;
pub mod paths;
pub mod presence;
pub mod reconcile;
pub mod settings;
pub mod store;
pub mod toggle;
pub mod validation;
pub mod visibility;
pub mod ws;

pub use engine::{ChatEngine, EngineParts, Intent, Notice, Presenter, RenderedMessage};
pub use error::{ClientError, SessionError};
pub use settings::ClientSettings;
pub use store::MessageStore;
pub use visibility::Visibility;
