//! Scene graph abstractions.
//!
//! The viewer builds a scene out of nodes:
//! - Each node carries a local TRS transform, optional geometry payload
//!   (triangle mesh or line set), light parameters, and children.
//! - The scene is append-only for the lifetime of the program: the composer
//!   and each asset-pipeline completion insert whole root nodes, nothing is
//!   ever removed or reordered.
//! - Renderers consume a flattened view (`FrameGraph`): fully composed world
//!   matrices plus the active light parameters.
//!
//! Design goals:
//! - Keep this module renderer-agnostic (no wgpu types).
//! - Whole-node inserts only, so a render pass never observes a
//!   half-configured node even while loads are in flight.

pub mod compose;
pub mod primitives;

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

/// Simple RGBA color (linear space assumed; the renderer may treat as sRGB).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from 8-bit channel values (e.g. `0xb9, 0xd5, 0xff`).
    #[inline]
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Local transform stored as translation/rotation/scale.
///
/// Composition convention: `world_from_local = parent_world * local_matrix()`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb3 {
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn include_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// A CPU-side triangle mesh: positions, per-vertex normals, u32 indices.
///
/// Decoders produce these; the renderer uploads them once on first sight
/// (nodes are immutable after insertion, so the upload never repeats).
#[derive(Debug, Clone, Default)]
pub struct TriMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl TriMesh {
    /// Append `src` into `self`, offsetting indices.
    pub fn append(&mut self, src: &TriMesh) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&src.positions);
        self.normals.extend_from_slice(&src.normals);
        self.indices.extend(src.indices.iter().map(|&i| base + i));
    }

    pub fn bounds(&self) -> Aabb3 {
        let mut b = Aabb3::empty();
        for &p in &self.positions {
            b.include_point(Vec3::from(p));
        }
        b
    }

    pub fn translate(&mut self, offset: Vec3) {
        for p in &mut self.positions {
            p[0] += offset.x;
            p[1] += offset.y;
            p[2] += offset.z;
        }
    }

    /// Translate the mesh so its bounding-box center sits on the local origin.
    ///
    /// Returns the offset that was applied. Centering before placement makes
    /// the placement offset land the geometry midpoint exactly on the target
    /// position, independent of the geometry's extent.
    pub fn center(&mut self) -> Vec3 {
        let b = self.bounds();
        if b.is_empty() {
            return Vec3::ZERO;
        }
        let offset = -b.center();
        self.translate(offset);
        offset
    }

    /// Compute area-weighted vertex normals when the decoder supplied none.
    pub fn ensure_normals(&mut self) {
        if self.normals.len() == self.positions.len() {
            return;
        }
        let mut acc = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let pa = Vec3::from(self.positions[a]);
            let pb = Vec3::from(self.positions[b]);
            let pc = Vec3::from(self.positions[c]);
            // Cross product length is twice the triangle area, so summing the
            // raw cross products gives area weighting for free.
            let n = (pb - pa).cross(pc - pa);
            acc[a] += n;
            acc[b] += n;
            acc[c] += n;
        }
        self.normals = acc
            .into_iter()
            .map(|n| n.normalize_or(Vec3::Y).to_array())
            .collect();
    }
}

/// Line segments for helpers (grid). Positions are consecutive pairs.
#[derive(Debug, Clone, Default)]
pub struct LineSet {
    pub positions: Vec<[f32; 3]>,
}

impl LineSet {
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.positions.len() / 2
    }
}

/// Fixed shadow parameters carried by the directional light.
///
/// The forward renderer does not implement shadow mapping; these travel with
/// the scene so the light is fully described and the settings are observable.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShadowSettings {
    pub map_size: u32,
    pub near: f32,
    pub far: f32,
    /// Half-extent of the orthographic shadow frustum on each side.
    pub extent: f32,
    pub normal_bias: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DirectionalLight {
    pub color: Rgba,
    pub intensity: f32,
    pub shadow: ShadowSettings,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AmbientLight {
    pub color: Rgba,
    pub intensity: f32,
}

/// How a mesh is shaded.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Material {
    /// Lambert + ambient with a uniform base color.
    Lit { color: Rgba },
    /// View-independent shading from a precomputed lighting-response image.
    Matcap,
}

/// Identifier assigned by `Scene::insert`. Zero means "not yet inserted".
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh {
        mesh: Arc<TriMesh>,
        material: Material,
    },
    Lines {
        lines: Arc<LineSet>,
        color: Rgba,
    },
    Directional(DirectionalLight),
    Ambient(AmbientLight),
}

/// A node in the scene graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::default(),
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: NodeKind::Group,
            cast_shadow: false,
            receive_shadow: false,
            children: Vec::new(),
        }
    }

    #[inline]
    pub fn with_mesh(mut self, mesh: TriMesh, material: Material) -> Self {
        self.kind = NodeKind::Mesh {
            mesh: Arc::new(mesh),
            material,
        };
        self
    }

    #[inline]
    pub fn with_lines(mut self, lines: LineSet, color: Rgba) -> Self {
        self.kind = NodeKind::Lines {
            lines: Arc::new(lines),
            color,
        };
        self
    }

    #[inline]
    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    #[inline]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    #[inline]
    pub fn at(mut self, position: Vec3) -> Self {
        self.transform.translation = position;
        self
    }

    #[inline]
    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    #[inline]
    pub fn is_drawable(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh { .. })
    }

    /// Set shadow flags on every mesh-bearing node in this subtree.
    pub fn set_shadow_flags(&mut self, cast: bool, receive: bool) {
        if self.is_drawable() {
            self.cast_shadow = cast;
            self.receive_shadow = receive;
        }
        for child in &mut self.children {
            child.set_shadow_flags(cast, receive);
        }
    }

    /// Visit this subtree depth-first.
    pub fn visit<F: FnMut(&Node)>(&self, f: &mut F) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    fn flatten(&self, parent_world: Mat4, out: &mut FrameGraph) {
        let world = parent_world * self.transform.matrix();
        match &self.kind {
            NodeKind::Group => {}
            NodeKind::Mesh { mesh, material } => out.meshes.push(MeshItem {
                node: self.id,
                world,
                mesh: Arc::clone(mesh),
                material: *material,
            }),
            NodeKind::Lines { lines, color } => out.lines.push(LineItem {
                node: self.id,
                world,
                lines: Arc::clone(lines),
                color: *color,
            }),
            NodeKind::Directional(light) => {
                // The light looks at the origin from its world position, so
                // the direction toward the light is the normalized position.
                let position = world.transform_point3(Vec3::ZERO);
                out.directional = Some((position.normalize_or(Vec3::Y), *light));
            }
            NodeKind::Ambient(light) => out.ambient = Some(*light),
        }
        for child in &self.children {
            child.flatten(world, out);
        }
    }
}

/// A drawable triangle-mesh item with a fully composed world matrix.
#[derive(Debug, Clone)]
pub struct MeshItem {
    pub node: NodeId,
    pub world: Mat4,
    pub mesh: Arc<TriMesh>,
    pub material: Material,
}

#[derive(Debug, Clone)]
pub struct LineItem {
    pub node: NodeId,
    pub world: Mat4,
    pub lines: Arc<LineSet>,
    pub color: Rgba,
}

/// Flattened view of the scene for one frame.
#[derive(Debug, Default, Clone)]
pub struct FrameGraph {
    pub meshes: Vec<MeshItem>,
    pub lines: Vec<LineItem>,
    /// `(direction_toward_light, parameters)` of the first directional light.
    pub directional: Option<(Vec3, DirectionalLight)>,
    pub ambient: Option<AmbientLight>,
}

/// The scene: an append-only collection of root nodes.
#[derive(Debug, Default)]
pub struct Scene {
    roots: Vec<Node>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-configured node tree as a new root.
    ///
    /// Assigns ids recursively and returns the root's id. This is the only
    /// mutation the scene supports: nodes are never removed or reordered.
    pub fn insert(&mut self, mut node: Node) -> NodeId {
        Self::assign_ids(&mut node, &mut self.next_id);
        let id = node.id;
        self.roots.push(node);
        id
    }

    fn assign_ids(node: &mut Node, next: &mut u64) {
        *next += 1;
        node.id = NodeId(*next);
        for child in &mut node.children {
            Self::assign_ids(child, next);
        }
    }

    #[inline]
    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.roots.iter().find(|n| n.name == name)
    }

    /// Flatten the scene into draw items and active lights.
    pub fn flatten(&self) -> FrameGraph {
        let mut out = FrameGraph::default();
        for root in &self.roots {
            root.flatten(Mat4::IDENTITY, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    fn tri_mesh() -> TriMesh {
        TriMesh {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn insert_assigns_ids_recursively_and_preserves_order() {
        let mut scene = Scene::new();
        let mut root = Node::new("root");
        root.add_child(Node::new("child"));
        let first = scene.insert(root);
        let second = scene.insert(Node::new("other"));

        assert_ne!(first, NodeId(0));
        assert_ne!(second, NodeId(0));
        assert_ne!(first, second);
        assert_eq!(scene.roots()[0].name, "root");
        assert_ne!(scene.roots()[0].children[0].id, NodeId(0));
        assert_eq!(scene.roots()[1].name, "other");
    }

    #[test]
    fn flatten_composes_parent_and_child_transforms() {
        let mut scene = Scene::new();
        let mut root = Node::new("root").with_transform(Transform {
            translation: vec3(1.0, 2.0, 3.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(2.0),
        });
        root.add_child(
            Node::new("leaf")
                .with_mesh(tri_mesh(), Material::Lit { color: Rgba::WHITE })
                .at(vec3(1.0, 0.0, 0.0)),
        );
        scene.insert(root);

        let frame = scene.flatten();
        assert_eq!(frame.meshes.len(), 1);
        let origin = frame.meshes[0].world.transform_point3(Vec3::ZERO);
        // Parent scale 2 applies to the child translation, then parent offset.
        assert!((origin - vec3(3.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn shadow_flags_apply_to_all_drawable_descendants_only() {
        let mut root = Node::new("root");
        let mut inner = Node::new("inner");
        inner.add_child(
            Node::new("mesh").with_mesh(tri_mesh(), Material::Lit { color: Rgba::WHITE }),
        );
        root.add_child(inner);
        root.set_shadow_flags(true, true);

        // Group nodes stay untouched, every mesh node is flagged.
        assert!(!root.cast_shadow);
        let mut checked = 0;
        root.visit(&mut |n| {
            if n.is_drawable() {
                assert!(n.cast_shadow && n.receive_shadow);
                checked += 1;
            }
        });
        assert_eq!(checked, 1);
    }

    #[test]
    fn flatten_reports_lights() {
        let mut scene = Scene::new();
        scene.insert(
            Node::new("sun")
                .with_kind(NodeKind::Directional(DirectionalLight {
                    color: Rgba::WHITE,
                    intensity: 1.0,
                    shadow: ShadowSettings {
                        map_size: 4096,
                        near: 1.0,
                        far: 10.0,
                        extent: 10.0,
                        normal_bias: 0.005,
                    },
                }))
                .at(vec3(0.0, 5.0, 0.0)),
        );
        scene.insert(
            Node::new("ambient").with_kind(NodeKind::Ambient(AmbientLight {
                color: Rgba::WHITE,
                intensity: 0.5,
            })),
        );

        let frame = scene.flatten();
        let (dir, light) = frame.directional.expect("directional light present");
        assert!((dir - Vec3::Y).length() < 1e-6);
        assert_eq!(light.intensity, 1.0);
        assert_eq!(frame.ambient.unwrap().intensity, 0.5);
    }

    #[test]
    fn ensure_normals_produces_unit_normals() {
        let mut mesh = tri_mesh();
        mesh.normals.clear();
        mesh.ensure_normals();
        assert_eq!(mesh.normals.len(), mesh.positions.len());
        for n in &mesh.normals {
            let len = Vec3::from(*n).length();
            assert!((len - 1.0).abs() < 1e-5);
            // This triangle faces +Z.
            assert!(n[2] > 0.9);
        }
    }

    #[test]
    fn center_moves_bounds_midpoint_to_origin() {
        let mut mesh = tri_mesh();
        mesh.translate(vec3(10.0, -4.0, 2.0));
        mesh.center();
        let c = mesh.bounds().center();
        assert!(c.length() < 1e-5);
    }
}
