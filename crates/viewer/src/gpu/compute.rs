//! Compute pipelines for the device-side conversion steps.
//!
//! Two embedded WGSL modules cover the pipeline: `stream.wgsl` holds the
//! stream-space passes (color unpack, depth visualization, point-cloud
//! unprojection, normal estimation) behind one shared bind group layout,
//! and `composite.wgsl` holds the screen-space splat passes.

pub(crate) const WORKGROUP_SIZE: u32 = 16;

const STREAM_SHADER: &str = include_str!("stream.wgsl");
const COMPOSITE_SHADER: &str = include_str!("composite.wgsl");

pub(crate) struct ComputePasses {
    pub stream_layout: wgpu::BindGroupLayout,
    pub composite_layout: wgpu::BindGroupLayout,
    pub unpack_color: wgpu::ComputePipeline,
    pub depth_viz: wgpu::ComputePipeline,
    pub point_cloud: wgpu::ComputePipeline,
    pub estimate_normals: wgpu::ComputePipeline,
    pub composite_clear: wgpu::ComputePipeline,
    pub composite_splat: wgpu::ComputePipeline,
}

impl ComputePasses {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let stream_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stream compute shader"),
            source: wgpu::ShaderSource::Wgsl(STREAM_SHADER.into()),
        });
        let composite_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("composite compute shader"),
            source: wgpu::ShaderSource::Wgsl(COMPOSITE_SHADER.into()),
        });

        let stream_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stream compute layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, false),
                storage_entry(5, false),
                storage_entry(6, false),
            ],
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite compute layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, false),
            ],
        });

        let stream_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("stream compute pipeline layout"),
                bind_group_layouts: &[&stream_layout],
                push_constant_ranges: &[],
            });
        let composite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("composite compute pipeline layout"),
                bind_group_layouts: &[&composite_layout],
                push_constant_ranges: &[],
            });

        let stream_pipeline = |entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&stream_pipeline_layout),
                module: &stream_module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let composite_pipeline = |entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&composite_pipeline_layout),
                module: &composite_module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        let unpack_color = stream_pipeline("unpack_color");
        let depth_viz = stream_pipeline("depth_viz");
        let point_cloud = stream_pipeline("point_cloud");
        let estimate_normals = stream_pipeline("estimate_normals");
        let composite_clear = composite_pipeline("clear");
        let composite_splat = composite_pipeline("splat");

        Self {
            stream_layout,
            composite_layout,
            unpack_color,
            depth_viz,
            point_cloud,
            estimate_normals,
            composite_clear,
            composite_splat,
        }
    }
}

pub(crate) fn dispatch_2d(pass: &mut wgpu::ComputePass<'_>, width: u32, height: u32) {
    pass.dispatch_workgroups(
        width.div_ceil(WORKGROUP_SIZE),
        height.div_ceil(WORKGROUP_SIZE),
        1,
    );
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
