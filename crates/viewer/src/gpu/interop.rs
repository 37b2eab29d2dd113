//! Interop buffers bridging compute output into sampled textures.
//!
//! Each logical channel owns a storage buffer the compute passes write and a
//! `copy_buffer_to_texture` blit into its paired texture. Host data only
//! ever enters through `queue.write_buffer` on the raw staging buffers; the
//! channel buffers are never host-mapped, so the write → blit ordering
//! inside a single encoder is the whole synchronization story.

use rgbd::Resolution;

use crate::view::Channel;

use super::compute::{dispatch_2d, ComputePasses};
use super::textures::{GpuTexture, TextureSet};
use super::uniforms::{CompositeParams, StreamParams};

const BYTES_PER_PIXEL: u32 = 16;

/// Pixels per buffer row after padding rows up to the copy alignment
/// (`COPY_BYTES_PER_ROW_ALIGNMENT`). The compute passes write with this
/// stride so rows can be blitted without repacking.
pub(crate) fn padded_row_pixels(width: u32) -> u32 {
    let bytes = width * BYTES_PER_PIXEL;
    let padded = bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    padded / BYTES_PER_PIXEL
}

/// Bytes needed to stage `pixels` u16 depth samples as packed u32 words.
fn depth_staging_len(pixels: usize) -> u64 {
    (pixels.div_ceil(2) * 4) as u64
}

pub(crate) struct InteropBufferSet {
    stream: Resolution,
    screen: Resolution,
    stream_stride_px: u32,
    screen_stride_px: u32,
    raw_color: wgpu::Buffer,
    raw_depth: wgpu::Buffer,
    color: wgpu::Buffer,
    depth_viz: wgpu::Buffer,
    position: wgpu::Buffer,
    normal: wgpu::Buffer,
    composite: wgpu::Buffer,
    composite_keys: wgpu::Buffer,
    // Written once at creation; the bind group keeps it alive thereafter.
    _stream_params: wgpu::Buffer,
    composite_params: wgpu::Buffer,
    stream_bind_group: wgpu::BindGroup,
    composite_bind_group: wgpu::BindGroup,
}

impl InteropBufferSet {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        compute: &ComputePasses,
        stream: Resolution,
        screen: Resolution,
    ) -> Self {
        let stream_stride_px = padded_row_pixels(stream.width);
        let screen_stride_px = padded_row_pixels(screen.width);
        let pixels = stream.pixel_count();

        let raw_color = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("raw color upload"),
            size: (pixels * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let raw_depth = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("raw depth upload"),
            size: depth_staging_len(pixels),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let channel_buffer = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: stream_stride_px as u64 * stream.height as u64 * BYTES_PER_PIXEL as u64,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let color = channel_buffer("color channel");
        let depth_viz = channel_buffer("depth viz channel");
        let position = channel_buffer("position channel");
        let normal = channel_buffer("normal channel");

        let stream_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stream params"),
            size: std::mem::size_of::<StreamParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &stream_params,
            0,
            bytemuck::bytes_of(&StreamParams::new(stream, stream_stride_px)),
        );

        let (composite, composite_keys, composite_params) =
            composite_buffers(device, queue, stream, stream_stride_px, screen, screen_stride_px);

        let stream_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("stream compute bind group"),
            layout: &compute.stream_layout,
            entries: &[
                bind(0, &stream_params),
                bind(1, &raw_color),
                bind(2, &raw_depth),
                bind(3, &color),
                bind(4, &depth_viz),
                bind(5, &position),
                bind(6, &normal),
            ],
        });
        let composite_bind_group = build_composite_bind_group(
            device,
            compute,
            &composite_params,
            &position,
            &color,
            &composite,
            &composite_keys,
        );

        Self {
            stream,
            screen,
            stream_stride_px,
            screen_stride_px,
            raw_color,
            raw_depth,
            color,
            depth_viz,
            position,
            normal,
            composite,
            composite_keys,
            _stream_params: stream_params,
            composite_params,
            stream_bind_group,
            composite_bind_group,
        }
    }

    /// Recreates the screen-space buffers at a new window size. Stream-space
    /// buffers are untouched; they follow the negotiated resolution, not the
    /// window.
    pub(crate) fn reallocate_screen(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        compute: &ComputePasses,
        screen: Resolution,
    ) {
        self.screen = screen;
        self.screen_stride_px = padded_row_pixels(screen.width);
        let (composite, composite_keys, composite_params) = composite_buffers(
            device,
            queue,
            self.stream,
            self.stream_stride_px,
            screen,
            self.screen_stride_px,
        );
        self.composite = composite;
        self.composite_keys = composite_keys;
        self.composite_params = composite_params;
        self.composite_bind_group = build_composite_bind_group(
            device,
            compute,
            &self.composite_params,
            &self.position,
            &self.color,
            &self.composite,
            &self.composite_keys,
        );
    }

    pub(crate) fn upload_color(&self, queue: &wgpu::Queue, plane: &[u8]) {
        queue.write_buffer(&self.raw_color, 0, plane);
    }

    pub(crate) fn upload_depth(&self, queue: &wgpu::Queue, plane: &[u16]) {
        if plane.len() % 2 == 0 {
            queue.write_buffer(&self.raw_depth, 0, bytemuck::cast_slice(plane));
        } else {
            let mut padded = Vec::with_capacity(plane.len() + 1);
            padded.extend_from_slice(plane);
            padded.push(0);
            queue.write_buffer(&self.raw_depth, 0, bytemuck::cast_slice(&padded));
        }
    }

    /// Runs the channel's compute write, then records the blit into its
    /// texture. The caller publishes channels in plan order, which keeps
    /// derived channels behind their inputs.
    pub(crate) fn publish(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        compute: &ComputePasses,
        channel: Channel,
        textures: &TextureSet,
    ) {
        if channel == Channel::Composite {
            self.publish_composite(encoder, compute, &textures.composite);
            return;
        }
        let (pipeline, buffer, target) = match channel {
            Channel::Color => (&compute.unpack_color, &self.color, &textures.color),
            Channel::DepthViz => (&compute.depth_viz, &self.depth_viz, &textures.depth_viz),
            Channel::Position => (&compute.point_cloud, &self.position, &textures.position),
            Channel::Normal => (&compute.estimate_normals, &self.normal, &textures.normal),
            Channel::Composite => unreachable!(),
        };
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("stream channel pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.stream_bind_group, &[]);
            dispatch_2d(&mut pass, self.stream.width, self.stream.height);
        }
        self.blit(encoder, buffer, self.stream_stride_px, target);
    }

    fn publish_composite(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        compute: &ComputePasses,
        target: &GpuTexture,
    ) {
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("composite clear pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&compute.composite_clear);
            pass.set_bind_group(0, &self.composite_bind_group, &[]);
            dispatch_2d(&mut pass, self.screen.width, self.screen.height);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("composite splat pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&compute.composite_splat);
            pass.set_bind_group(0, &self.composite_bind_group, &[]);
            dispatch_2d(&mut pass, self.stream.width, self.stream.height);
        }
        self.blit(encoder, &self.composite, self.screen_stride_px, target);
    }

    fn blit(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        buffer: &wgpu::Buffer,
        stride_px: u32,
        target: &GpuTexture,
    ) {
        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(stride_px * BYTES_PER_PIXEL),
                    rows_per_image: Some(target.size.height),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: target.size.width,
                height: target.size.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

fn bind(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

fn composite_buffers(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    stream: Resolution,
    stream_stride_px: u32,
    screen: Resolution,
    screen_stride_px: u32,
) -> (wgpu::Buffer, wgpu::Buffer, wgpu::Buffer) {
    let composite = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("composite channel"),
        size: screen_stride_px as u64 * screen.height as u64 * BYTES_PER_PIXEL as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });
    let composite_keys = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("composite depth keys"),
        size: screen.pixel_count() as u64 * 4,
        usage: wgpu::BufferUsages::STORAGE,
        mapped_at_creation: false,
    });
    let composite_params = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("composite params"),
        size: std::mem::size_of::<CompositeParams>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    queue.write_buffer(
        &composite_params,
        0,
        bytemuck::bytes_of(&CompositeParams::new(
            stream,
            stream_stride_px,
            screen,
            screen_stride_px,
        )),
    );
    (composite, composite_keys, composite_params)
}

fn build_composite_bind_group(
    device: &wgpu::Device,
    compute: &ComputePasses,
    params: &wgpu::Buffer,
    position: &wgpu::Buffer,
    color: &wgpu::Buffer,
    composite: &wgpu::Buffer,
    keys: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("composite compute bind group"),
        layout: &compute.composite_layout,
        entries: &[
            bind(0, params),
            bind(1, position),
            bind(2, color),
            bind(3, composite),
            bind(4, keys),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_widths_keep_their_stride() {
        // 640 * 16 bytes is already a multiple of 256.
        assert_eq!(padded_row_pixels(640), 640);
        assert_eq!(padded_row_pixels(1280), 1280);
        assert_eq!(padded_row_pixels(16), 16);
    }

    #[test]
    fn unaligned_widths_round_up() {
        // 100 px * 16 B = 1600 B → padded to 1792 B = 112 px.
        assert_eq!(padded_row_pixels(100), 112);
        assert_eq!(padded_row_pixels(1), 16);
        assert_eq!(padded_row_pixels(17), 32);
    }

    #[test]
    fn depth_staging_rounds_to_whole_words() {
        assert_eq!(depth_staging_len(8), 16);
        assert_eq!(depth_staging_len(9), 20);
        assert_eq!(depth_staging_len(0), 0);
    }
}
