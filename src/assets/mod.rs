//! Asset pipelines: concurrent decode of meshes and their labels.
//!
//! Each configured pipeline decodes one mesh file and builds one text label.
//! Both halves run on their own worker threads and report back over a single
//! mpsc channel; the render loop drains the channel between frames and
//! inserts finished nodes whole, so a partially decoded asset is never
//! visible. No ordering is guaranteed across pipelines and none is needed.
//!
//! Failures are per-pipeline: a missing file or a broken decode logs one
//! error and leaves the rest of the scene untouched.

pub mod fbx;
pub mod gltf;
pub mod obj;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
    thread,
};

use glam::{Vec3, vec3};

use crate::font::{FontSystem, label::LabelStyle, label::build_label_mesh};
use crate::scene::{Material, Node, Rgba, Scene};

/// Errors produced while loading an asset. All are non-fatal to the viewer.
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("asset not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("{} requires the {decoder} decoder, which is not available", path.display())]
    MissingDecoder { path: PathBuf, decoder: String },
}

impl AssetError {
    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Supported mesh container formats.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MeshFormat {
    Fbx,
    Obj,
    /// JSON glTF with external buffers.
    Gltf,
    /// Binary glTF, one self-contained file.
    Glb,
}

/// The floating caption attached to a pipeline's mesh.
#[derive(Debug, Clone)]
pub struct LabelSpec {
    pub text: String,
    pub position: Vec3,
}

/// One mesh-plus-label pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub name: &'static str,
    pub format: MeshFormat,
    pub path: PathBuf,
    pub position: Vec3,
    pub scale: f32,
    pub label: LabelSpec,
}

/// The four standard teapot pipelines, rooted at `assets_dir`.
pub fn default_pipelines(assets_dir: &Path) -> Vec<PipelineSpec> {
    vec![
        PipelineSpec {
            name: "fbx-teapot",
            format: MeshFormat::Fbx,
            path: assets_dir.join("models/Teapot.fbx"),
            position: vec3(-2.0, 0.0, 0.0),
            scale: 0.5,
            label: LabelSpec {
                text: "FBX Teapot".into(),
                position: vec3(-2.0, 2.0, 0.0),
            },
        },
        PipelineSpec {
            name: "obj-teapot",
            format: MeshFormat::Obj,
            path: assets_dir.join("models/Teapot.obj"),
            position: vec3(2.0, 0.0, 0.0),
            scale: 48.5,
            label: LabelSpec {
                text: "obj Teapot".into(),
                position: vec3(2.0, 2.0, 0.0),
            },
        },
        PipelineSpec {
            name: "gltf-teapot",
            format: MeshFormat::Gltf,
            path: assets_dir.join("models/Teapot.gltf"),
            position: vec3(2.0, 3.0, 0.0),
            scale: 0.485,
            label: LabelSpec {
                text: "glTF Teapot".into(),
                position: vec3(2.0, 5.0, 0.0),
            },
        },
        PipelineSpec {
            name: "glb-teapot",
            format: MeshFormat::Glb,
            path: assets_dir.join("models/Teapot.glb"),
            position: vec3(-2.0, 3.0, 0.0),
            scale: 0.485,
            label: LabelSpec {
                text: "glb Teapot".into(),
                position: vec3(-2.0, 5.0, 0.0),
            },
        },
    ]
}

/// A finished unit of pipeline work, delivered over the channel.
#[derive(Debug)]
pub enum PipelineEvent {
    Mesh {
        pipeline: &'static str,
        result: Result<Node, AssetError>,
    },
    Label {
        pipeline: &'static str,
        result: Result<Node, AssetError>,
    },
}

/// Decode one mesh file into an unplaced scene node.
pub fn load_mesh(format: MeshFormat, path: &Path) -> Result<Node, AssetError> {
    match format {
        MeshFormat::Fbx => fbx::load(path),
        MeshFormat::Obj => obj::load(path),
        MeshFormat::Gltf | MeshFormat::Glb => gltf::load(path),
    }
}

/// Apply a pipeline's placement to a decoded mesh node.
///
/// Decoders hand back a root whose own transform is identity; placement
/// overwrites that root transform, and transforms stored in the file live on
/// descendants where they compose with it. Every decoded mesh both casts and
/// receives shadows.
pub fn place_mesh(mut node: Node, spec: &PipelineSpec) -> Node {
    node.set_shadow_flags(true, true);
    node.transform.translation = spec.position;
    node.transform.scale = Vec3::splat(spec.scale);
    node
}

/// Build the floating label node for a pipeline.
pub fn build_label(
    fonts: &FontSystem,
    style: &LabelStyle,
    spec: &PipelineSpec,
) -> Result<Node, AssetError> {
    let mesh = build_label_mesh(fonts, style, &spec.label.text)
        .map_err(|e| AssetError::decode(&spec.path, format!("label: {e}")))?;

    let mut node = Node::new(format!("{}-label", spec.name))
        .with_mesh(mesh, Material::Lit { color: style.color })
        .at(spec.label.position);
    node.cast_shadow = false;
    node.receive_shadow = false;
    Ok(node)
}

/// Spawn the mesh and label workers for each pipeline.
///
/// Two threads per pipeline; every worker sends exactly one event, so the
/// channel sees `2 * specs.len()` events before all senders disconnect.
/// Without a usable font system the label workers report an error event
/// instead of panicking, and the meshes still load.
pub fn spawn_pipelines(
    specs: &[PipelineSpec],
    fonts: Option<Arc<FontSystem>>,
    style: &LabelStyle,
    tx: mpsc::Sender<PipelineEvent>,
) {
    for spec in specs {
        let mesh_spec = spec.clone();
        let mesh_tx = tx.clone();
        thread::spawn(move || {
            if let Ok(meta) = std::fs::metadata(&mesh_spec.path) {
                log::info!(
                    "{}: loading {} ({} bytes)",
                    mesh_spec.name,
                    mesh_spec.path.display(),
                    meta.len()
                );
            }
            let result =
                load_mesh(mesh_spec.format, &mesh_spec.path).map(|n| place_mesh(n, &mesh_spec));
            let _ = mesh_tx.send(PipelineEvent::Mesh {
                pipeline: mesh_spec.name,
                result,
            });
        });

        let label_spec = spec.clone();
        let label_tx = tx.clone();
        let label_fonts = fonts.clone();
        let label_style = style.clone();
        thread::spawn(move || {
            let result = match label_fonts {
                Some(fonts) => build_label(&fonts, &label_style, &label_spec),
                None => Err(AssetError::decode(
                    &label_spec.path,
                    "label: no usable system fonts",
                )),
            };
            let _ = label_tx.send(PipelineEvent::Label {
                pipeline: label_spec.name,
                result,
            });
        });
    }
}

/// Drain finished pipeline work into the scene.
///
/// Returns `true` once all workers have finished and disconnected; callers
/// can then stop polling. Errors are logged here, once per failed unit.
pub fn drain_events(scene: &mut Scene, rx: &mpsc::Receiver<PipelineEvent>) -> bool {
    loop {
        match rx.try_recv() {
            Ok(event) => {
                let (pipeline, what, result) = match event {
                    PipelineEvent::Mesh { pipeline, result } => (pipeline, "mesh", result),
                    PipelineEvent::Label { pipeline, result } => (pipeline, "label", result),
                };
                match result {
                    Ok(node) => {
                        log::info!("{pipeline}: {what} ready ({})", node.name);
                        scene.insert(node);
                    }
                    Err(err) => log::error!("{pipeline}: {what} failed: {err}"),
                }
            }
            Err(mpsc::TryRecvError::Empty) => return false,
            Err(mpsc::TryRecvError::Disconnected) => return true,
        }
    }
}

/// Base color applied to decoded meshes that carry no material of their own.
pub(crate) const DEFAULT_MESH_COLOR: Rgba = Rgba::new(0.8, 0.8, 0.8, 1.0);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeKind;

    #[test]
    fn default_pipelines_match_the_layout() {
        let specs = default_pipelines(Path::new("assets"));
        assert_eq!(specs.len(), 4);

        let fbx = &specs[0];
        assert_eq!(fbx.format, MeshFormat::Fbx);
        assert_eq!(fbx.position, vec3(-2.0, 0.0, 0.0));
        assert_eq!(fbx.scale, 0.5);
        assert_eq!(fbx.label.text, "FBX Teapot");
        assert_eq!(fbx.label.position, vec3(-2.0, 2.0, 0.0));

        let obj = &specs[1];
        assert_eq!(obj.scale, 48.5);
        assert_eq!(obj.position, vec3(2.0, 0.0, 0.0));

        let gltf = &specs[2];
        assert_eq!(gltf.scale, 0.485);
        assert_eq!(gltf.label.position, vec3(2.0, 5.0, 0.0));

        let glb = &specs[3];
        assert_eq!(glb.format, MeshFormat::Glb);
        assert_eq!(glb.position, vec3(-2.0, 3.0, 0.0));
    }

    #[test]
    fn placement_sets_transform_and_shadow_flags() {
        let spec = &default_pipelines(Path::new("assets"))[0];
        let mesh = crate::scene::TriMesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            indices: vec![0, 1, 2],
        };
        let node = Node::new("m").with_mesh(mesh, Material::Lit {
            color: DEFAULT_MESH_COLOR,
        });
        let placed = place_mesh(node, spec);
        assert!(placed.cast_shadow && placed.receive_shadow);
        assert_eq!(placed.transform.translation, spec.position);
        assert_eq!(placed.transform.scale, Vec3::splat(0.5));
    }

    #[test]
    fn placement_composes_with_transforms_decoded_from_the_file() {
        let spec = &default_pipelines(Path::new("assets"))[2];
        let mesh = crate::scene::TriMesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            indices: vec![0, 1, 2],
        };
        let mut root = Node::new("wrapper");
        root.add_child(
            Node::new("file-node")
                .with_mesh(mesh, Material::Lit {
                    color: DEFAULT_MESH_COLOR,
                })
                .at(vec3(5.0, 0.0, 0.0)),
        );

        let mut scene = Scene::new();
        scene.insert(place_mesh(root, spec));
        let frame = scene.flatten();
        assert_eq!(frame.meshes.len(), 1);

        // The file's own offset survives, scaled by the pipeline scale and
        // shifted by the pipeline position.
        let origin = frame.meshes[0].world.transform_point3(Vec3::ZERO);
        let expected = spec.position + vec3(5.0, 0.0, 0.0) * spec.scale;
        assert!((origin - expected).length() < 1e-5);
    }

    #[test]
    fn one_failed_pipeline_does_not_block_the_others() {
        let (tx, rx) = mpsc::channel();
        let ok_mesh = crate::scene::TriMesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            indices: vec![0, 1, 2],
        };
        tx.send(PipelineEvent::Mesh {
            pipeline: "a",
            result: Err(AssetError::NotFound {
                path: PathBuf::from("missing.fbx"),
            }),
        })
        .unwrap();
        tx.send(PipelineEvent::Mesh {
            pipeline: "b",
            result: Ok(Node::new("b-mesh").with_mesh(ok_mesh, Material::Lit {
                color: DEFAULT_MESH_COLOR,
            })),
        })
        .unwrap();

        let mut scene = Scene::new();
        assert!(!drain_events(&mut scene, &rx));
        assert_eq!(scene.len(), 1);
        assert!(scene.find("b-mesh").is_some());

        drop(tx);
        assert!(drain_events(&mut scene, &rx));
    }

    #[test]
    fn drained_nodes_are_whole() {
        let (tx, rx) = mpsc::channel();
        let mesh = crate::scene::TriMesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            indices: vec![0, 1, 2],
        };
        tx.send(PipelineEvent::Label {
            pipeline: "a",
            result: Ok(Node::new("a-label").with_mesh(mesh, Material::Lit {
                color: Rgba::WHITE,
            })),
        })
        .unwrap();
        let mut scene = Scene::new();
        drain_events(&mut scene, &rx);
        let node = scene.find("a-label").unwrap();
        assert!(matches!(node.kind, NodeKind::Mesh { .. }));
        assert!(node.id.0 != 0);
    }
}
