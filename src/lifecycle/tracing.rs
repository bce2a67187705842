//! # Observability & Tracing
//!
//! [`setup_tracing`] initializes structured logging with the `tracing` crate.
//!
//! ## Configuration
//!
//! Log levels come from the `RUST_LOG` environment variable. The compact
//! format hides the module prefix (`with_target(false)`) and shows spans inline.
//!
//! ```bash
//! RUST_LOG=info cargo run     # lifecycle and mutations
//! RUST_LOG=debug cargo run    # plus resolution, redirects and request outcomes
//! RUST_LOG=trace cargo run    # plus every discovered resource
//! ```
//!
//! ## What Gets Traced
//!
//! - **Requests**: every operation runs in a span carrying `to` and `originator`
//! - **Mutations**: `Created`, `Updated`, `Deleted` with `ri` and type
//! - **Storage Actor**: startup, shutdown and final size
//! - **Denials**: access failures log at `warn` with originator and permission
//!
//! With `RUST_LOG=info` a create looks like this:
//!
//! ```text
//! INFO CSE started cse_id="id-in" cse_rn="cse-in"
//! INFO process_create_request{to=cse-in originator=CAdmin}: Created ri="aeb0d8ef4a12" srn=Some("cse-in/lights") ty=ae(2)
//! ```

pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
