//! Read-through translation cache in front of a translate-shell style command.
//!
//! - `resolver`: cache lookup with ordered engine fallback
//! - `invoker`: one translation attempt against one engine
//! - `engines`: background engine discovery and the shared engine list
//! - `cache`: Redis (or in-memory) hash store keyed by language and word
//! - `janitor`: removal of empty and non-printable cached values
//! - `notifier`: batched operational notifications, `telegram` delivers them

pub mod cache;
pub mod config;
pub mod engines;
pub mod invoker;
pub mod janitor;
pub mod notifier;
pub mod resolver;
pub mod retry;
pub mod scheduler;
pub mod server;
pub mod telegram;
