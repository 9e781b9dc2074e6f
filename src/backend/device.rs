//! wgpu implementation of the device trait, specialized for depth-only
//! shadow rendering.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::core::{Framebuffer, Id, RenderDevice, Viewport};
use crate::geometry::{Geometry, Vertex};
use crate::material::{ShaderProgram, UniformValue};
use crate::math::Color;
use crate::shadows::ShadowMap;

use super::WgpuContext;

/// Minimal depth-only program: transform, rasterize, let the fixed-function
/// stage write depth.
pub const DEPTH_ONLY_SHADER: &str = r#"
// Depth-only shadow shader.

struct Transforms {
    world: mat4x4<f32>,
    world_view_proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
}

@group(0) @binding(0)
var<uniform> transforms: Transforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> @builtin(position) vec4<f32> {
    return transforms.world_view_proj * vec4<f32>(in.position, 1.0);
}

@fragment
fn fs_main() {
    // Depth is automatically written.
}
"#;

/// Depth program for heightmap-displaced surfaces: applies the same vertex
/// displacement the lit material applies, so the displaced geometry casts
/// correct shadows.
pub const DISPLACED_DEPTH_SHADER: &str = r#"
// Depth shader for heightmap-displaced geometry.

struct Transforms {
    world: mat4x4<f32>,
    world_view_proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
}

struct DisplacementParams {
    sample_distance: f32,
    offset_strength: f32,
}

@group(0) @binding(0)
var<uniform> transforms: Transforms;

@group(1) @binding(0)
var height_map: texture_2d<f32>;
@group(1) @binding(1)
var height_sampler: sampler;
@group(1) @binding(2)
var<uniform> params: DisplacementParams;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> @builtin(position) vec4<f32> {
    let height = textureSampleLevel(height_map, height_sampler, in.uv * params.sample_distance, 0.0).r;
    let displaced = in.position + in.normal * height * params.offset_strength;
    return transforms.world_view_proj * vec4<f32>(displaced, 1.0);
}

@fragment
fn fs_main() {
    // Depth is automatically written.
}
"#;

/// Per-draw transform block, written at a dynamic offset per pending draw.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct TransformsUniform {
    world: [[f32; 4]; 4],
    world_view_proj: [[f32; 4]; 4],
    view_proj: [[f32; 4]; 4],
}

impl Default for TransformsUniform {
    fn default() -> Self {
        let identity = crate::math::Matrix4::IDENTITY.to_cols_array_2d();
        Self {
            world: identity,
            world_view_proj: identity,
            view_proj: identity,
        }
    }
}

/// Displacement parameter block for the displaced-depth program.
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
struct DisplacementUniform {
    sample_distance: f32,
    offset_strength: f32,
    _pad: [f32; 2],
}

/// Dynamic-offset stride for the transform blocks.
const TRANSFORMS_STRIDE: u64 = 256;
/// Per-program draw capacity within one flush.
const MAX_DRAWS_PER_FLUSH: u64 = 256;

struct ProgramEntry {
    pipeline: wgpu::RenderPipeline,
    transforms_buffer: wgpu::Buffer,
    transforms_bind_group: wgpu::BindGroup,
    staging_transforms: TransformsUniform,
    /// Displaced programs only.
    displacement: Option<DisplacementEntry>,
}

struct DisplacementEntry {
    params_buffer: wgpu::Buffer,
    staging_params: DisplacementUniform,
    heightmap: Option<Id>,
    bind_group: Option<wgpu::BindGroup>,
    layout: wgpu::BindGroupLayout,
}

struct GeometryEntry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
}

struct PendingDraw {
    program: Id,
    geometry: Id,
    transforms: TransformsUniform,
    vertex_count: u32,
    index_count: u32,
}

/// A command-buffered [`RenderDevice`] on wgpu.
///
/// Programs are registered against one of the two built-in WGSL shaders;
/// draws accumulate and are encoded into one render pass per bound
/// framebuffer at [`flush`](Self::flush) time. Resource misuse (drawing
/// with an unregistered program, a displaced program with no heightmap) is
/// a programming error and panics.
pub struct WgpuDevice {
    context: WgpuContext,
    transforms_layout: wgpu::BindGroupLayout,
    height_sampler: wgpu::Sampler,
    programs: HashMap<Id, ProgramEntry>,
    geometries: HashMap<Id, GeometryEntry>,
    depth_textures: HashMap<Id, wgpu::TextureView>,
    heightmaps: HashMap<Id, wgpu::TextureView>,
    framebuffers: HashMap<Id, Option<Id>>,
    current_framebuffer: Option<Id>,
    viewport: Viewport,
    pending_clear_depth: Option<f32>,
    pending_draws: Vec<PendingDraw>,
    active_program: Option<Id>,
}

impl WgpuDevice {
    /// Create a device on an existing context.
    pub fn new(context: WgpuContext) -> Self {
        let transforms_layout =
            context
                .device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Shadow Transforms Layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: true,
                            min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<
                                TransformsUniform,
                            >()
                                as u64),
                        },
                        count: None,
                    }],
                });

        let height_sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Heightmap Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            context,
            transforms_layout,
            height_sampler,
            programs: HashMap::new(),
            geometries: HashMap::new(),
            depth_textures: HashMap::new(),
            heightmaps: HashMap::new(),
            framebuffers: HashMap::new(),
            current_framebuffer: None,
            viewport: Viewport::default(),
            pending_clear_depth: None,
            pending_draws: Vec::new(),
            active_program: None,
        }
    }

    /// Compile the minimal depth-only program.
    pub fn register_depth_program(&mut self, program: &ShaderProgram) {
        self.register(program, DEPTH_ONLY_SHADER, false);
    }

    /// Compile the heightmap-displaced depth program. Assign its heightmap
    /// through a `DepthMap` texture uniform before the first draw.
    pub fn register_displaced_program(&mut self, program: &ShaderProgram) {
        self.register(program, DISPLACED_DEPTH_SHADER, true);
    }

    fn register(&mut self, program: &ShaderProgram, source: &str, displaced: bool) {
        let device = &self.context.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(program.label()),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let displacement_layout = displaced.then(|| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Displacement Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            })
        });

        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = match &displacement_layout {
            Some(layout) => vec![&self.transforms_layout, layout],
            None => vec![&self.transforms_layout],
        };

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(program.label()),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[], // No color targets
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: self.context.depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,      // Constant depth bias
                    slope_scale: 2.0, // Slope-scale bias
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let transforms_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Transforms Buffer"),
            size: TRANSFORMS_STRIDE * MAX_DRAWS_PER_FLUSH,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let transforms_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Transforms Bind Group"),
            layout: &self.transforms_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &transforms_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<TransformsUniform>() as u64),
                }),
            }],
        });

        let displacement = displacement_layout.map(|layout| DisplacementEntry {
            params_buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Displacement Params Buffer"),
                size: std::mem::size_of::<DisplacementUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            staging_params: DisplacementUniform::default(),
            heightmap: None,
            bind_group: None,
            layout,
        });

        self.programs.insert(
            program.id(),
            ProgramEntry {
                pipeline,
                transforms_buffer,
                transforms_bind_group,
                staging_transforms: TransformsUniform::default(),
                displacement,
            },
        );
    }

    /// Upload a single-channel heightmap and return its texture id, to be
    /// assigned to a displaced program as its `DepthMap` uniform.
    pub fn upload_heightmap(&mut self, width: u32, height: u32, texels: &[f32]) -> Id {
        assert_eq!(texels.len() as u32, width * height, "heightmap texel count");

        let texture = self.context.device.create_texture_with_data(
            &self.context.queue,
            &wgpu::TextureDescriptor {
                label: Some("Heightmap"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::R32Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(texels),
        );

        let id = Id::new();
        self.heightmaps
            .insert(id, texture.create_view(&wgpu::TextureViewDescriptor::default()));
        id
    }

    /// Upload geometry data for a handle.
    pub fn upload_geometry(&mut self, geometry: &Geometry, vertices: &[Vertex], indices: &[u32]) {
        let vertex_buffer =
            self.context
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Vertex Buffer"),
                    contents: bytemuck::cast_slice(vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });

        let index_buffer = (!indices.is_empty()).then(|| {
            self.context
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Index Buffer"),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                })
        });

        self.geometries.insert(
            geometry.id(),
            GeometryEntry {
                vertex_buffer,
                index_buffer,
            },
        );
    }

    /// Encode and submit everything buffered since the last flush.
    ///
    /// A flush targeting the default framebuffer is a no-op for this
    /// depth-only backend; color output belongs to the embedding renderer.
    pub fn flush(&mut self) {
        if !self.has_pending_work() {
            return;
        }
        let draws = std::mem::take(&mut self.pending_draws);
        let clear_depth = self.pending_clear_depth.take();

        let depth_texture = self
            .current_framebuffer
            .and_then(|fb| self.framebuffers.get(&fb))
            .and_then(|depth| *depth);
        let Some(depth_texture) = depth_texture else {
            if !draws.is_empty() {
                log::trace!("{} draw(s) dropped: no depth target bound", draws.len());
            }
            return;
        };

        // Refresh displacement bind groups and parameter buffers.
        let program_ids: Vec<Id> = draws.iter().map(|d| d.program).collect();
        for program in &program_ids {
            let entry = self.programs.get_mut(program).expect("registered program");
            if let Some(displacement) = &mut entry.displacement {
                let heightmap = displacement
                    .heightmap
                    .expect("displaced program drawn without a DepthMap heightmap");
                let view = self
                    .heightmaps
                    .get(&heightmap)
                    .expect("heightmap uploaded before use");
                if displacement.bind_group.is_none() {
                    displacement.bind_group = Some(self.context.device.create_bind_group(
                        &wgpu::BindGroupDescriptor {
                            label: Some("Displacement Bind Group"),
                            layout: &displacement.layout,
                            entries: &[
                                wgpu::BindGroupEntry {
                                    binding: 0,
                                    resource: wgpu::BindingResource::TextureView(view),
                                },
                                wgpu::BindGroupEntry {
                                    binding: 1,
                                    resource: wgpu::BindingResource::Sampler(&self.height_sampler),
                                },
                                wgpu::BindGroupEntry {
                                    binding: 2,
                                    resource: displacement.params_buffer.as_entire_binding(),
                                },
                            ],
                        },
                    ));
                }
                self.context.queue.write_buffer(
                    &displacement.params_buffer,
                    0,
                    bytemuck::bytes_of(&displacement.staging_params),
                );
            }
        }

        // Write each draw's transform block at its dynamic offset.
        let mut draw_offsets = Vec::with_capacity(draws.len());
        let mut per_program_counts: HashMap<Id, u64> = HashMap::new();
        for draw in &draws {
            let slot = per_program_counts.entry(draw.program).or_insert(0);
            assert!(
                *slot < MAX_DRAWS_PER_FLUSH,
                "more than {} draws for one program in a single flush",
                MAX_DRAWS_PER_FLUSH
            );
            let offset = *slot * TRANSFORMS_STRIDE;
            *slot += 1;

            let entry = &self.programs[&draw.program];
            self.context.queue.write_buffer(
                &entry.transforms_buffer,
                offset,
                bytemuck::bytes_of(&draw.transforms),
            );
            draw_offsets.push(offset as u32);
        }

        let depth_view = self
            .depth_textures
            .get(&depth_texture)
            .expect("framebuffer depth attachment was never initialized");

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Mirage Command Encoder"),
                });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Render Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: match clear_depth {
                            Some(depth) => wgpu::LoadOp::Clear(depth),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rpass.set_viewport(
                self.viewport.x as f32,
                self.viewport.y as f32,
                self.viewport.width as f32,
                self.viewport.height as f32,
                0.0,
                1.0,
            );

            for (draw, offset) in draws.iter().zip(&draw_offsets) {
                let entry = &self.programs[&draw.program];
                let geometry = self
                    .geometries
                    .get(&draw.geometry)
                    .expect("geometry uploaded before draw");

                rpass.set_pipeline(&entry.pipeline);
                rpass.set_bind_group(0, &entry.transforms_bind_group, &[*offset]);
                if let Some(displacement) = &entry.displacement {
                    let bind_group = displacement.bind_group.as_ref().expect("bind group built");
                    rpass.set_bind_group(1, bind_group, &[]);
                }
                rpass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                match &geometry.index_buffer {
                    Some(index_buffer) => {
                        rpass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                        rpass.draw_indexed(0..draw.index_count, 0, 0..1);
                    }
                    None => rpass.draw(0..draw.vertex_count, 0..1),
                }
            }
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
    }

    fn has_pending_work(&self) -> bool {
        !self.pending_draws.is_empty() || self.pending_clear_depth.is_some()
    }
}

impl RenderDevice for WgpuDevice {
    fn init_shadow_map(&mut self, map: &ShadowMap) {
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Map"),
            size: wgpu::Extent3d {
                width: map.resolution(),
                height: map.resolution(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.context.depth_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        self.depth_textures.insert(
            map.id(),
            texture.create_view(&wgpu::TextureViewDescriptor::default()),
        );
    }

    fn init_framebuffer(&mut self, framebuffer: &Framebuffer) {
        if let Some(depth) = framebuffer.depth_attachment() {
            assert!(
                self.depth_textures.contains_key(&depth),
                "framebuffer depth attachment was never initialized"
            );
        }
        self.framebuffers
            .insert(framebuffer.id(), framebuffer.depth_attachment());
    }

    fn bind_framebuffer(&mut self, framebuffer: &Framebuffer) {
        if self.current_framebuffer == Some(framebuffer.id()) {
            return;
        }
        if self.has_pending_work() {
            self.flush();
        }
        // The default (screen) target is bindable without registration.
        self.framebuffers
            .entry(framebuffer.id())
            .or_insert(framebuffer.depth_attachment());
        self.current_framebuffer = Some(framebuffer.id());
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn clear(&mut self, _color: Option<Color>, depth: Option<f32>) {
        if let Some(depth) = depth {
            self.pending_clear_depth = Some(depth);
        }
    }

    fn use_program(&mut self, program: &ShaderProgram) {
        assert!(
            self.programs.contains_key(&program.id()),
            "shader program {:?} was never registered",
            program.label()
        );
        self.active_program = Some(program.id());
    }

    fn set_uniform(&mut self, program: Id, name: &str, value: &UniformValue) {
        let entry = match self.programs.get_mut(&program) {
            Some(entry) => entry,
            None => panic!("uniform {name:?} set on unregistered program"),
        };

        match (name, value) {
            ("WorldMatrix", UniformValue::Mat4(m)) => {
                entry.staging_transforms.world = m.to_cols_array_2d();
            }
            ("WorldViewProjMatrix", UniformValue::Mat4(m)) => {
                entry.staging_transforms.world_view_proj = m.to_cols_array_2d();
            }
            ("ViewProjMatrix", UniformValue::Mat4(m)) => {
                entry.staging_transforms.view_proj = m.to_cols_array_2d();
            }
            ("SampleDistance", UniformValue::Float(v)) => {
                if let Some(displacement) = &mut entry.displacement {
                    displacement.staging_params.sample_distance = *v;
                }
            }
            ("OffsetStrength", UniformValue::Float(v)) => {
                if let Some(displacement) = &mut entry.displacement {
                    displacement.staging_params.offset_strength = *v;
                }
            }
            ("DepthMap", UniformValue::Texture(texture)) => {
                if let Some(displacement) = &mut entry.displacement {
                    displacement.heightmap = Some(*texture);
                    displacement.bind_group = None;
                }
            }
            _ => log::trace!("uniform {name:?} has no slot in the shadow backend"),
        }
    }

    fn bind_geometry(&mut self, geometry: &Geometry) {
        assert!(
            self.geometries.contains_key(&geometry.id()),
            "geometry was never uploaded"
        );
    }

    fn draw(&mut self, geometry: &Geometry) {
        let program = self.active_program.expect("no active program for draw");
        let transforms = self.programs[&program].staging_transforms;
        self.pending_draws.push(PendingDraw {
            program,
            geometry: geometry.id(),
            transforms,
            vertex_count: geometry.vertex_count(),
            index_count: geometry.index_count(),
        });
    }
}
