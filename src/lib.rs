//! `vitrine` library crate root.
//!
//! A small interactive 3D asset viewer: a fixed reference scene (grid,
//! lights, matcap sphere) plus four concurrent asset pipelines that decode
//! teapot meshes (FBX, OBJ, glTF, GLB) and extrude 3D text labels for them.
//!
//! This crate is intended to be used primarily as a **library**. The binary
//! target stays thin and calls into these exported entrypoints.

pub mod assets;
pub mod camera;
pub mod font;
pub mod render;
pub mod scene;
pub mod viewer;
pub mod viewport;

use render::app::{AppConfig, run_with_builder};
pub use viewer::{Viewer, ViewerConfig};

/// Open a window and run the viewer until it is closed.
///
/// Note: This function does **not** initialize logging; callers can decide
/// their own logging setup.
pub fn run_viewer(config: ViewerConfig) -> anyhow::Result<()> {
    let app_config = AppConfig {
        title: config.title.clone(),
        ..Default::default()
    };
    run_with_builder(app_config, move |window| async move {
        Viewer::new(window, config).await
    })
}
