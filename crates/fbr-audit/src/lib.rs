//! fbr-audit
//!
//! Append-only distribution log.
//!
//! - [`LogSink`] is the seam the session engine writes through.
//! - [`JsonlLogSink`] writes one canonical JSON line per entry with an
//!   optional SHA-256 hash chain (`hash_prev` / `hash_self`).
//! - [`verify_hash_chain`] detects edited, reordered or deleted lines.
//! - [`entries`] builds the four entry kinds from session state.
//!
//! Log writes are best-effort from the engine's point of view: a failed
//! append never rolls back a committed inventory change.

pub mod entries;
mod jsonl;
mod sink;

pub use jsonl::{
    compute_record_hash, verify_hash_chain, verify_hash_chain_str, AuditRecord, JsonlLogSink,
    VerifyResult,
};
pub use sink::{FanoutLogSink, LogSink, MemoryLogSink};
