//! Static scene composition.
//!
//! Everything here is deterministic and built from fixed constants: the
//! ground grid, the two lights, and the matcap reference sphere. It runs
//! exactly once at startup, before the first frame, so the first rendered
//! frame already contains the full static scene.

use glam::{Vec3, vec3};

use crate::scene::{
    AmbientLight, DirectionalLight, Material, Node, NodeKind, Rgba, Scene, ShadowSettings,
    primitives,
};

/// Grid extent and divisions (a 1-unit cell grid).
pub const GRID_SIZE: f32 = 20.0;
pub const GRID_DIVISIONS: u32 = 20;
pub const GRID_COLOR: Rgba = Rgba::new(0.55, 0.55, 0.55, 1.0);

/// Directional light constants.
pub const DIR_LIGHT_POSITION: Vec3 = vec3(4.0, 2.0, 1.0);
pub const DIR_LIGHT_COLOR: Rgba = Rgba::WHITE;
pub const DIR_LIGHT_INTENSITY: f32 = 1.0;
pub const DIR_LIGHT_SHADOW: ShadowSettings = ShadowSettings {
    map_size: 4096,
    near: 1.0,
    far: 10.0,
    extent: 10.0,
    normal_bias: 0.005,
};

/// Ambient light constants.
pub const AMBIENT_INTENSITY: f32 = 1.0;

/// Reference sphere constants.
pub const SPHERE_RADIUS: f32 = 1.0;
pub const SPHERE_SEGMENTS: u32 = 32;
pub const SPHERE_POSITION: Vec3 = vec3(0.0, 2.0, -4.0);

#[inline]
pub fn ambient_color() -> Rgba {
    Rgba::from_u8(0xb9, 0xd5, 0xff)
}

/// Build the static scene contents into `scene`.
///
/// Inserts exactly four roots: grid, directional light, ambient light, and
/// the matcap sphere. No I/O happens here; the matcap image itself is owned
/// by the renderer.
pub fn compose_static_scene(scene: &mut Scene) {
    scene.insert(
        Node::new("grid").with_lines(primitives::grid(GRID_SIZE, GRID_DIVISIONS), GRID_COLOR),
    );

    let mut sun = Node::new("dir-light")
        .with_kind(NodeKind::Directional(DirectionalLight {
            color: DIR_LIGHT_COLOR,
            intensity: DIR_LIGHT_INTENSITY,
            shadow: DIR_LIGHT_SHADOW,
        }))
        .at(DIR_LIGHT_POSITION);
    sun.cast_shadow = true;
    scene.insert(sun);

    scene.insert(
        Node::new("ambient-light").with_kind(NodeKind::Ambient(AmbientLight {
            color: ambient_color(),
            intensity: AMBIENT_INTENSITY,
        })),
    );

    scene.insert(
        Node::new("matcap-sphere")
            .with_mesh(
                primitives::uv_sphere(SPHERE_RADIUS, SPHERE_SEGMENTS, SPHERE_SEGMENTS),
                Material::Matcap,
            )
            .at(SPHERE_POSITION),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_scene_has_four_roots() {
        let mut scene = Scene::new();
        compose_static_scene(&mut scene);
        assert_eq!(scene.len(), 4);
        assert!(scene.find("grid").is_some());
        assert!(scene.find("dir-light").is_some());
        assert!(scene.find("ambient-light").is_some());
        assert!(scene.find("matcap-sphere").is_some());
    }

    #[test]
    fn light_constants_match_the_documented_setup() {
        let mut scene = Scene::new();
        compose_static_scene(&mut scene);

        let sun = scene.find("dir-light").unwrap();
        assert_eq!(sun.transform.translation, DIR_LIGHT_POSITION);
        assert!(sun.cast_shadow);
        let NodeKind::Directional(light) = sun.kind else {
            panic!("dir-light is not a directional light");
        };
        assert_eq!(light.intensity, 1.0);
        assert_eq!(light.shadow.map_size, 4096);
        assert_eq!(light.shadow.extent, 10.0);
        assert_eq!(light.shadow.normal_bias, 0.005);

        let ambient = scene.find("ambient-light").unwrap();
        let NodeKind::Ambient(light) = ambient.kind else {
            panic!("ambient-light is not ambient");
        };
        assert!((light.color.b - 1.0).abs() < 1e-6);
        assert!((light.color.r - 185.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn sphere_sits_at_its_documented_offset() {
        let mut scene = Scene::new();
        compose_static_scene(&mut scene);
        let sphere = scene.find("matcap-sphere").unwrap();
        assert_eq!(sphere.transform.translation, SPHERE_POSITION);
        assert!(matches!(
            sphere.kind,
            NodeKind::Mesh {
                material: Material::Matcap,
                ..
            }
        ));
    }

    #[test]
    fn composition_is_deterministic() {
        let mut a = Scene::new();
        let mut b = Scene::new();
        compose_static_scene(&mut a);
        compose_static_scene(&mut b);
        let fa = a.flatten();
        let fb = b.flatten();
        assert_eq!(fa.meshes.len(), fb.meshes.len());
        assert_eq!(fa.lines.len(), fb.lines.len());
        assert_eq!(
            fa.meshes[0].mesh.positions.len(),
            fb.meshes[0].mesh.positions.len()
        );
    }
}
