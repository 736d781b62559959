//! Crate-level tests spanning several modules.
//!
//! `integration` drives whole matches through the host and the built-in
//! modes, `determinism` replays scripted matches, and `helpers` holds the
//! world fixture and event builders that unit tests share.

mod helpers;

pub use helpers::*;
