//! Thin binary wrapper for local development.
//!
//! Run:
//! - `cargo run`

fn main() -> anyhow::Result<()> {
    // Keep logging setup in the binary so the library remains unopinionated.
    env_logger::init();

    vitrine::run_viewer(vitrine::ViewerConfig::default())
}
