//! Alerting System
//!
//! Decides alert/resolution transitions per vehicle and renders the bilingual
//! notification text. Deduplication comes from the persisted `AlertState`:
//! an entity already `Alerted` is never alerted again until it resolves.

mod engine;
mod intent;
mod message;

pub use engine::{decide, AlertState, Transition};
pub use intent::NotificationIntent;
pub use message::{render, BilingualMessage, Locale, MAX_MESSAGE_CHARS};
