use wgpu::util::{DeviceExt, TextureDataOrder};

use rgbd::Resolution;

use crate::view::Channel;

/// One sampled texture plus the sampler it is bound with.
pub(crate) struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: Resolution,
}

impl GpuTexture {
    fn new(
        device: &wgpu::Device,
        label: &str,
        size: Resolution,
        filter: wgpu::FilterMode,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
            size,
        }
    }
}

/// Owns every sampled texture the draw steps bind.
///
/// Stream-space textures live at the negotiated stream resolution; the
/// composite lives at the window resolution and is the only member replaced
/// on a window resize. Replacement drops the previous handles, which is the
/// release; allocation is atomic from the render loop's point of view
/// because resize and render are serialized by the event loop.
pub(crate) struct TextureSet {
    pub color: GpuTexture,
    pub depth_viz: GpuTexture,
    pub position: GpuTexture,
    pub normal: GpuTexture,
    pub composite: GpuTexture,
    /// 1x1 transparent black bound to texture slots a draw step leaves
    /// unassigned.
    pub placeholder: GpuTexture,
}

impl TextureSet {
    pub(crate) fn allocate(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        stream: Resolution,
        screen: Resolution,
    ) -> Self {
        Self {
            color: GpuTexture::new(device, "color texture", stream, wgpu::FilterMode::Linear),
            // Nearest keeps depth discontinuities hard instead of smearing
            // neighbouring ranges together.
            depth_viz: GpuTexture::new(
                device,
                "depth viz texture",
                stream,
                wgpu::FilterMode::Nearest,
            ),
            position: GpuTexture::new(device, "position texture", stream, wgpu::FilterMode::Linear),
            normal: GpuTexture::new(device, "normal texture", stream, wgpu::FilterMode::Linear),
            composite: GpuTexture::new(
                device,
                "composite texture",
                screen,
                wgpu::FilterMode::Linear,
            ),
            placeholder: placeholder_texture(device, queue),
        }
    }

    /// Recreates only the screen-space subset at a new window size.
    pub(crate) fn reallocate_screen(&mut self, device: &wgpu::Device, screen: Resolution) {
        self.composite = GpuTexture::new(
            device,
            "composite texture",
            screen,
            wgpu::FilterMode::Linear,
        );
    }

    pub(crate) fn texture_for(&self, channel: Channel) -> &GpuTexture {
        match channel {
            Channel::Color => &self.color,
            Channel::DepthViz => &self.depth_viz,
            Channel::Position => &self.position,
            Channel::Normal => &self.normal,
            Channel::Composite => &self.composite,
        }
    }
}

fn placeholder_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> GpuTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("placeholder texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        bytemuck::cast_slice(&[0.0f32; 4]),
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });
    GpuTexture {
        texture,
        view,
        sampler,
        size: Resolution::new(1, 1),
    }
}
