//! # Headshot Studio
//!
//! The client side of a headshot processing service. The service does the
//! pixel work (background removal, crop, tone); this crate decides *when* to
//! call it, *what* to send, and keeps the user's settings, styles and saved
//! profiles consistent while edits arrive in any order.
//!
//! # Event Flow
//!
//! Everything runs on one thread. Time is an explicit millisecond counter
//! passed into each call, so every timer is deterministic under test:
//!
//! ```text
//! edit(now, Edit) ─► style reconcile ─► schedule save (250 ms)
//!                                   └─► request process (300 ms) + estimate (200 ms)
//! poll(now)       ─► Effects ─► host runs them ─► complete_*(token | seq, outcome)
//! ```
//!
//! A host can be a GUI loop, the bundled CLI, or a test. The core never
//! sleeps, never reads a clock and never touches the network on its own.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | Owns the live settings and wires every component together per event |
//! | [`settings`] | The settings value, its enums, field edits and request field encoding |
//! | [`catalog`] | Presets, styles and use-cases; built-in defaults replaceable by the service |
//! | [`geometry`] | Pure crop rectangle and output size math |
//! | [`style`] | Matched vs manual style tracking and the manual stash |
//! | [`scheduler`] | Debounced single-flight processing, sequenced estimates, batch channel, preview history |
//! | [`store`] | Settings persistence, profiles, bundle import/merge, exports |
//! | [`batch`] | Batch file selection against upload limits |
//! | [`notice`] | Single-slot transient user notices |
//! | [`remote`] | Service traits, error taxonomy and the blocking HTTP adapter |
//! | [`naming`] | Profile name cleaning and disambiguation, output file names |
//! | [`config`] | `headshot-studio.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Latest Request Wins
//!
//! Slider drags produce dozens of edits a second. Processing requests are
//! collapsed by a trailing debounce, and dispatching a new call cancels the
//! previous one through a shared token. A result is applied only if its token
//! is still the active one, so for requests started at t1 < t2 only the t2
//! result is ever shown, regardless of the order responses arrive in.
//!
//! ## Effects Instead of Callbacks
//!
//! The scheduler returns [`session::Effect`] values rather than calling the
//! service itself. The host decides whether to run them on a thread, in an
//! async task or inline, and reports back with the token id it was handed.
//!
//! ## Untrusted Input Goes Through One Door
//!
//! Imported presets, bundles and even our own persisted snapshot are decoded
//! from raw `serde_json::Value` by explicit field readers in
//! [`store::sanitize`]. Nothing user-supplied is deserialized straight into
//! [`settings::Settings`], and a rejected import leaves every piece of state
//! untouched.
//!
//! ## Persistence Never Fails the Caller
//!
//! Storage is a two-method capability ([`store::KeyValueStore`]). A write
//! that fails is logged and the session carries on in memory; a read that
//! fails looks like a missing key.

pub mod batch;
pub mod catalog;
pub mod config;
pub mod geometry;
pub mod naming;
pub mod notice;
pub mod output;
pub mod remote;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod store;
pub mod style;

#[cfg(test)]
pub(crate) mod test_helpers;
