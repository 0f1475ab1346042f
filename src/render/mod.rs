//! Rendering layer: window/event loop plumbing, GPU context, and the
//! forward renderer.

pub mod app;
pub mod gpu;
pub mod mesh_renderer;
pub mod util;
