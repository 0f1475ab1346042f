//! Forward renderer for the flattened scene.
//!
//! Three pipelines share one depth buffer and one set of frame globals:
//! - `lit`: Lambert diffuse plus ambient, uniform base color
//! - `line`: solid-color line list (the reference grid)
//! - `matcap`: lighting-response texture sampled by the view-space normal
//!
//! Per-draw data (model matrix, normal matrix, color) lives in one uniform
//! buffer addressed with dynamic offsets, rewritten once per frame before
//! the render pass begins. Geometry is uploaded once per node and cached by
//! `NodeId`; nodes are immutable after insertion so the cache never goes
//! stale.

use std::{borrow::Cow, collections::HashMap, mem};

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt as _;

use crate::render::gpu::{DEPTH_FORMAT, Gpu};
use crate::scene::{FrameGraph, Material, NodeId, Rgba};

fn round_up_to(v: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (v + (align - 1)) & !(align - 1)
}

/// GPU vertex format for lit and matcap meshes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3 {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex3 {
    pub const ATTRS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    #[inline]
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex3>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// GPU vertex format for line lists.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
}

impl LineVertex {
    pub const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

    #[inline]
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Frame-wide uniforms, written once per frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    /// xyz: direction toward the light; w: intensity.
    light_dir: [f32; 4],
    light_color: [f32; 4],
    /// rgb premultiplied by intensity.
    ambient: [f32; 4],
}

/// Per-draw uniforms, addressed via dynamic offset.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawUniforms {
    model: [[f32; 4]; 4],
    /// Inverse-transpose of `model`, for normals under non-uniform scale.
    normal: [[f32; 4]; 4],
    color: [f32; 4],
}

impl DrawUniforms {
    fn new(model: Mat4, color: Rgba) -> Self {
        let normal = model.inverse().transpose();
        Self {
            model: model.to_cols_array_2d(),
            normal: normal.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

/// Geometry uploaded once for a scene node.
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    count: u32,
}

/// The forward renderer.
pub struct MeshRenderer {
    lit_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    matcap_pipeline: wgpu::RenderPipeline,

    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,

    draw_buffer: wgpu::Buffer,
    draw_buffer_capacity: u64,
    draw_bind_group: wgpu::BindGroup,
    draw_bind_group_layout: wgpu::BindGroupLayout,
    draw_stride: u64,

    matcap_bind_group: wgpu::BindGroup,

    mesh_cache: HashMap<NodeId, GpuMesh>,
    line_cache: HashMap<NodeId, GpuMesh>,
}

impl MeshRenderer {
    pub fn new(gpu: &Gpu, matcap: &image::RgbaImage) -> anyhow::Result<Self> {
        let device = &gpu.device;
        let target_format = gpu.surface_format.add_srgb_suffix();

        let lit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lit Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("shaders/lit_mesh.wgsl"))),
        });
        let line_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Line Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("shaders/line.wgsl"))),
        });
        let matcap_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Matcap Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("shaders/matcap.wgsl"))),
        });

        let globals_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Globals BGL"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(mem::size_of::<Globals>() as u64),
                    },
                    count: None,
                }],
            });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Globals Buffer"),
            size: mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals BG"),
            layout: &globals_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        // Per-draw uniforms need alignment-padded stride for dynamic offsets.
        let min_align = device.limits().min_uniform_buffer_offset_alignment as u64;
        let draw_stride = round_up_to(mem::size_of::<DrawUniforms>() as u64, min_align.max(256));

        let draw_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Per-Draw BGL"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            mem::size_of::<DrawUniforms>() as u64
                        ),
                    },
                    count: None,
                }],
            });

        let draw_buffer_capacity = draw_stride * 64;
        let draw_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Per-Draw Buffer"),
            size: draw_buffer_capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let draw_bind_group =
            Self::make_draw_bind_group(device, &draw_bind_group_layout, &draw_buffer);

        let matcap_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Matcap BGL"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let matcap_bind_group =
            Self::upload_matcap(gpu, &matcap_bind_group_layout, matcap);

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&globals_bind_group_layout, &draw_bind_group_layout],
            push_constant_ranges: &[],
        });
        let matcap_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Matcap Pipeline Layout"),
            bind_group_layouts: &[
                &globals_bind_group_layout,
                &draw_bind_group_layout,
                &matcap_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let lit_pipeline = Self::make_pipeline(
            device,
            "Lit Pipeline",
            &mesh_layout,
            &lit_shader,
            Vertex3::layout(),
            wgpu::PrimitiveTopology::TriangleList,
            target_format,
        );
        let line_pipeline = Self::make_pipeline(
            device,
            "Line Pipeline",
            &mesh_layout,
            &line_shader,
            LineVertex::layout(),
            wgpu::PrimitiveTopology::LineList,
            target_format,
        );
        let matcap_pipeline = Self::make_pipeline(
            device,
            "Matcap Pipeline",
            &matcap_layout,
            &matcap_shader,
            Vertex3::layout(),
            wgpu::PrimitiveTopology::TriangleList,
            target_format,
        );

        Ok(Self {
            lit_pipeline,
            line_pipeline,
            matcap_pipeline,
            globals_buffer,
            globals_bind_group,
            draw_buffer,
            draw_buffer_capacity,
            draw_bind_group,
            draw_bind_group_layout,
            draw_stride,
            matcap_bind_group,
            mesh_cache: HashMap::new(),
            line_cache: HashMap::new(),
        })
    }

    fn make_pipeline(
        device: &wgpu::Device,
        label: &str,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        vertex_layout: wgpu::VertexBufferLayout<'static>,
        topology: wgpu::PrimitiveTopology,
        target_format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex_layout],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    fn make_draw_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Per-Draw BG"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(mem::size_of::<DrawUniforms>() as u64),
                }),
            }],
        })
    }

    fn upload_matcap(
        gpu: &Gpu,
        layout: &wgpu::BindGroupLayout,
        image: &image::RgbaImage,
    ) -> wgpu::BindGroup {
        let (width, height) = image.dimensions();
        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some("Matcap Texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            image.as_raw(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Matcap Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Matcap BG"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        })
    }

    fn ensure_draw_capacity(&mut self, gpu: &Gpu, bytes: u64) {
        if bytes <= self.draw_buffer_capacity {
            return;
        }
        let new_size = bytes.next_power_of_two();
        self.draw_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Per-Draw Buffer (resized)"),
            size: new_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.draw_buffer_capacity = new_size;
        self.draw_bind_group =
            Self::make_draw_bind_group(&gpu.device, &self.draw_bind_group_layout, &self.draw_buffer);
    }

    fn cache_mesh(&mut self, gpu: &Gpu, item: &crate::scene::MeshItem) {
        if self.mesh_cache.contains_key(&item.node) {
            return;
        }
        let vertices: Vec<Vertex3> = item
            .mesh
            .positions
            .iter()
            .zip(&item.mesh.normals)
            .map(|(p, n)| Vertex3 {
                position: *p,
                normal: *n,
            })
            .collect();
        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Indices"),
                contents: bytemuck::cast_slice(&item.mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.mesh_cache.insert(item.node, GpuMesh {
            vertex_buffer,
            index_buffer: Some(index_buffer),
            count: item.mesh.indices.len() as u32,
        });
    }

    fn cache_lines(&mut self, gpu: &Gpu, item: &crate::scene::LineItem) {
        if self.line_cache.contains_key(&item.node) {
            return;
        }
        let vertices: Vec<LineVertex> = item
            .lines
            .positions
            .iter()
            .map(|p| LineVertex { position: *p })
            .collect();
        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Line Vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.line_cache.insert(item.node, GpuMesh {
            vertex_buffer,
            index_buffer: None,
            count: vertices.len() as u32,
        });
    }

    /// Upload frame data for the flattened scene.
    ///
    /// Must be called before `draw`, outside the render pass, so all buffer
    /// writes land before the pass executes.
    pub fn prepare(
        &mut self,
        gpu: &Gpu,
        view: Mat4,
        projection: Mat4,
        eye: Vec3,
        frame: &FrameGraph,
    ) {
        let (light_dir, light_color, light_intensity) = match frame.directional {
            Some((dir, light)) => (dir, light.color, light.intensity),
            None => (Vec3::Y, Rgba::WHITE, 0.0),
        };
        let ambient = match frame.ambient {
            Some(light) => [
                light.color.r * light.intensity,
                light.color.g * light.intensity,
                light.color.b * light.intensity,
                1.0,
            ],
            None => [0.0, 0.0, 0.0, 1.0],
        };

        let globals = Globals {
            view_proj: (projection * view).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            camera_pos: [eye.x, eye.y, eye.z, 1.0],
            light_dir: [light_dir.x, light_dir.y, light_dir.z, light_intensity],
            light_color: light_color.to_array(),
            ambient,
        };
        gpu.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        // Upload any geometry this frame introduces.
        for item in &frame.meshes {
            self.cache_mesh(gpu, item);
        }
        for item in &frame.lines {
            self.cache_lines(gpu, item);
        }

        // Pack all per-draw uniforms, mesh items first, then lines.
        let draw_count = (frame.meshes.len() + frame.lines.len()) as u64;
        if draw_count == 0 {
            return;
        }
        self.ensure_draw_capacity(gpu, draw_count * self.draw_stride);

        let mut staged = vec![0u8; (draw_count * self.draw_stride) as usize];
        for (i, item) in frame.meshes.iter().enumerate() {
            let color = match item.material {
                Material::Lit { color } => color,
                Material::Matcap => Rgba::WHITE,
            };
            let u = DrawUniforms::new(item.world, color);
            let at = i * self.draw_stride as usize;
            staged[at..at + mem::size_of::<DrawUniforms>()]
                .copy_from_slice(bytemuck::bytes_of(&u));
        }
        for (i, item) in frame.lines.iter().enumerate() {
            let u = DrawUniforms::new(item.world, item.color);
            let at = (frame.meshes.len() + i) * self.draw_stride as usize;
            staged[at..at + mem::size_of::<DrawUniforms>()]
                .copy_from_slice(bytemuck::bytes_of(&u));
        }
        gpu.queue.write_buffer(&self.draw_buffer, 0, &staged);
    }

    /// Record draws for the prepared frame into `pass`.
    pub fn draw<'pass>(&'pass self, pass: &mut wgpu::RenderPass<'pass>, frame: &FrameGraph) {
        pass.set_bind_group(0, &self.globals_bind_group, &[]);

        // Lit meshes and matcap meshes interleave in the item list; switch
        // pipelines per item. The item counts are tiny.
        for (i, item) in frame.meshes.iter().enumerate() {
            let Some(gpu_mesh) = self.mesh_cache.get(&item.node) else {
                continue;
            };
            match item.material {
                Material::Lit { .. } => pass.set_pipeline(&self.lit_pipeline),
                Material::Matcap => {
                    pass.set_pipeline(&self.matcap_pipeline);
                    pass.set_bind_group(2, &self.matcap_bind_group, &[]);
                }
            }
            let offset = (i as u64 * self.draw_stride) as u32;
            pass.set_bind_group(1, &self.draw_bind_group, &[offset]);
            pass.set_vertex_buffer(0, gpu_mesh.vertex_buffer.slice(..));
            if let Some(index_buffer) = &gpu_mesh.index_buffer {
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..gpu_mesh.count, 0, 0..1);
            }
        }

        pass.set_pipeline(&self.line_pipeline);
        for (i, item) in frame.lines.iter().enumerate() {
            let Some(gpu_mesh) = self.line_cache.get(&item.node) else {
                continue;
            };
            let offset = ((frame.meshes.len() + i) as u64 * self.draw_stride) as u32;
            pass.set_bind_group(1, &self.draw_bind_group, &[offset]);
            pass.set_vertex_buffer(0, gpu_mesh.vertex_buffer.slice(..));
            pass.draw(0..gpu_mesh.count, 0..1);
        }
    }
}
