//! Render program set: named GLSL programs compiled against the shared quad
//! vertex stage, each materialized as an opaque and an alpha-blended
//! pipeline variant.
//!
//! Sources live on disk and can be recompiled at runtime. A reload swaps the
//! whole set atomically: any read, parse, or validation failure leaves the
//! previous pipelines bound.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use wgpu::naga::ShaderStage;

use crate::view::{BlendMode, ProgramId, TEXTURE_SLOTS};

use super::quad::QuadRenderer;

pub(crate) const VERTEX_SOURCE_FILE: &str = "quad.vert";

#[derive(Debug)]
pub(crate) struct ShaderSources {
    pub vertex: String,
    pub fragments: [String; ProgramId::ALL.len()],
}

/// Reads the vertex stage and every fragment program from `dir`.
pub(crate) fn load_sources(dir: &Path) -> Result<ShaderSources> {
    let read = |file: &str| -> Result<String> {
        let path = dir.join(file);
        fs::read_to_string(&path)
            .with_context(|| format!("failed to read shader at {}", path.display()))
    };
    Ok(ShaderSources {
        vertex: read(VERTEX_SOURCE_FILE)?,
        fragments: [
            read(ProgramId::ColorPassthrough.source_file())?,
            read(ProgramId::DepthViz.source_file())?,
            read(ProgramId::BufferDebug.source_file())?,
        ],
    })
}

struct ProgramPipelines {
    opaque: wgpu::RenderPipeline,
    blended: wgpu::RenderPipeline,
}

pub(crate) struct ShaderSet {
    dir: PathBuf,
    surface_format: wgpu::TextureFormat,
    pub uniform_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    programs: [ProgramPipelines; ProgramId::ALL.len()],
}

impl ShaderSet {
    pub(crate) fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        dir: &Path,
    ) -> Result<Self> {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture slot layout"),
            entries: &texture_layout_entries(),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let sources = load_sources(dir)?;
        let programs = build_programs(device, &pipeline_layout, surface_format, &sources)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            surface_format,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            programs,
        })
    }

    /// Recompiles every program from disk. On any failure the previous
    /// pipelines stay bound; there is no partial replacement.
    pub(crate) fn reload(&mut self, device: &wgpu::Device) {
        let rebuilt = load_sources(&self.dir).and_then(|sources| {
            build_programs(device, &self.pipeline_layout, self.surface_format, &sources)
        });
        match rebuilt {
            Ok(programs) => {
                self.programs = programs;
                tracing::info!(dir = %self.dir.display(), "shader programs reloaded");
            }
            Err(err) => {
                tracing::warn!(error = %err, "shader reload failed; keeping previous programs");
            }
        }
    }

    pub(crate) fn pipeline(&self, id: ProgramId, blend: BlendMode) -> &wgpu::RenderPipeline {
        let program = &self.programs[id.index()];
        match blend {
            BlendMode::Opaque => &program.opaque,
            BlendMode::AlphaBlend => &program.blended,
        }
    }
}

fn build_programs(
    device: &wgpu::Device,
    pipeline_layout: &wgpu::PipelineLayout,
    surface_format: wgpu::TextureFormat,
    sources: &ShaderSources,
) -> Result<[ProgramPipelines; ProgramId::ALL.len()]> {
    let vertex_module = compile_shader(
        device,
        &sources.vertex,
        ShaderStage::Vertex,
        VERTEX_SOURCE_FILE,
    )?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let mut built = Vec::with_capacity(ProgramId::ALL.len());
    let mut compile_error = None;
    for id in ProgramId::ALL {
        match compile_shader(
            device,
            &sources.fragments[id.index()],
            ShaderStage::Fragment,
            id.source_file(),
        ) {
            Ok(fragment_module) => {
                let pipeline = |blend: BlendMode| {
                    make_pipeline(
                        device,
                        pipeline_layout,
                        &vertex_module,
                        &fragment_module,
                        surface_format,
                        blend,
                        id.source_file(),
                    )
                };
                built.push(ProgramPipelines {
                    opaque: pipeline(BlendMode::Opaque),
                    blended: pipeline(BlendMode::AlphaBlend),
                });
            }
            Err(err) => {
                compile_error = Some(err);
                break;
            }
        }
    }
    let scope_error = pollster::block_on(device.pop_error_scope());
    if let Some(err) = compile_error {
        return Err(err);
    }
    if let Some(error) = scope_error {
        bail!("shader pipeline validation failed: {error}");
    }
    built
        .try_into()
        .map_err(|_| anyhow!("shader program count mismatch"))
}

/// Compiles one GLSL stage, surfacing naga/validation errors through an
/// error scope instead of the global uncaptured-error handler.
fn compile_shader(
    device: &wgpu::Device,
    source: &str,
    stage: ShaderStage,
    name: &str,
) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(name),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage,
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        bail!("failed to compile {name}: {error}");
    }
    Ok(module)
}

fn make_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
    surface_format: wgpu::TextureFormat,
    blend: BlendMode,
    label: &str,
) -> wgpu::RenderPipeline {
    let blend_state = match blend {
        BlendMode::Opaque => wgpu::BlendState::REPLACE,
        BlendMode::AlphaBlend => wgpu::BlendState::ALPHA_BLENDING,
    };
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("main"),
            buffers: &[QuadRenderer::vertex_layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(blend_state),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

fn texture_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(TEXTURE_SLOTS * 2);
    for slot in 0..TEXTURE_SLOTS as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_stub_sources(dir: &Path) {
        fs::write(dir.join(VERTEX_SOURCE_FILE), "// vertex").unwrap();
        for id in ProgramId::ALL {
            fs::write(dir.join(id.source_file()), format!("// {id:?}")).unwrap();
        }
    }

    #[test]
    fn loads_all_program_sources() {
        let dir = tempfile::tempdir().unwrap();
        write_stub_sources(dir.path());
        let sources = load_sources(dir.path()).unwrap();
        assert_eq!(sources.vertex, "// vertex");
        assert!(sources.fragments[ProgramId::BufferDebug.index()].contains("BufferDebug"));
    }

    #[test]
    fn missing_fragment_fails_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        write_stub_sources(dir.path());
        fs::remove_file(dir.path().join(ProgramId::DepthViz.source_file())).unwrap();
        let err = load_sources(dir.path()).unwrap_err();
        assert!(err.to_string().contains("depth.frag"));
    }

    #[test]
    fn every_program_names_a_distinct_source() {
        let mut files: Vec<_> = ProgramId::ALL
            .iter()
            .map(|id| id.source_file())
            .collect();
        files.sort_unstable();
        files.dedup();
        assert_eq!(files.len(), ProgramId::ALL.len());
    }

    #[test]
    fn layout_exposes_all_texture_slots() {
        let entries = texture_layout_entries();
        assert_eq!(entries.len(), TEXTURE_SLOTS * 2);
        assert_eq!(entries[8].binding, 8);
        assert!(matches!(
            entries[9].ty,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
        ));
    }
}
