//! Shared test setup.
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//! }
//! ```
//!
//! Set `RUST_LOG` (e.g. `bplus_index=debug`) to see split, merge and
//! redistribution events from the tree. Events are written through the test
//! writer, so they only show up for failing tests or with `--nocapture`.

#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a global fmt subscriber. Only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .compact()
            .try_init();
    });
}
