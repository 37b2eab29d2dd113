use std::path::Path;

use anyhow::{Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::warn;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use rgbd::Resolution;

use crate::frames::PlaneSnapshot;
use crate::view::{plan_for, Channel, RenderPlan, ViewMode, TEXTURE_SLOTS};

use super::compute::ComputePasses;
use super::context::GpuContext;
use super::interop::InteropBufferSet;
use super::pipelines::ShaderSet;
use super::quad::QuadRenderer;
use super::textures::TextureSet;
use super::uniforms::QuadUniforms;

/// Owns every GPU resource and drives the per-tick pipeline:
/// upload → compute → blit → draw steps → present.
///
/// Construction order matters: the context comes first, then the interop
/// buffers that register against its device, then textures, shader
/// programs, and quad geometry. Any failure here is fatal to startup.
pub(crate) struct GpuState {
    context: GpuContext,
    compute: ComputePasses,
    interop: InteropBufferSet,
    textures: TextureSet,
    shaders: ShaderSet,
    quad: QuadRenderer,
    quad_uniform: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    /// Texture bind groups per view mode per draw step, rebuilt whenever a
    /// texture is reallocated.
    step_bindings: Vec<Vec<wgpu::BindGroup>>,
    stream: Resolution,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        stream: Resolution,
        shader_dir: &Path,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size)?;
        let screen = Resolution::new(context.size.width, context.size.height);
        let compute = ComputePasses::new(&context.device);
        let interop =
            InteropBufferSet::new(&context.device, &context.queue, &compute, stream, screen);
        let textures = TextureSet::allocate(&context.device, &context.queue, stream, screen);
        let shaders = ShaderSet::new(&context.device, context.surface_format, shader_dir)
            .context("failed to build shader programs")?;
        let quad = QuadRenderer::new(&context.device);

        let quad_uniform = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quad uniforms"),
            size: std::mem::size_of::<QuadUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad uniform bind group"),
            layout: &shaders.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: quad_uniform.as_entire_binding(),
            }],
        });
        let step_bindings =
            build_step_bindings(&context.device, &shaders.texture_layout, &textures);

        Ok(Self {
            context,
            compute,
            interop,
            textures,
            shaders,
            quad,
            quad_uniform,
            uniform_bind_group,
            step_bindings,
            stream,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    /// Reconfigures the surface and recreates the screen-space resources at
    /// the new size. Serialized with rendering by the event loop, so no
    /// draw can observe a half-replaced set.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        let screen = Resolution::new(new_size.width, new_size.height);
        self.interop.reallocate_screen(
            &self.context.device,
            &self.context.queue,
            &self.compute,
            screen,
        );
        self.textures.reallocate_screen(&self.context.device, screen);
        self.step_bindings = build_step_bindings(
            &self.context.device,
            &self.shaders.texture_layout,
            &self.textures,
        );
    }

    pub(crate) fn reload_shaders(&mut self) {
        self.shaders.reload(&self.context.device);
    }

    /// One display tick: upload the snapshot planes, publish the channels
    /// the active plan needs, encode its draw steps, and present.
    ///
    /// A plane whose dimensions do not match the negotiated resolution is
    /// skipped for this frame; the stale texture content stays visible and
    /// the frame still presents.
    pub(crate) fn render(
        &mut self,
        snapshot: &PlaneSnapshot,
        mode: ViewMode,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut color_ok = false;
        if let Some((plane, resolution)) = &snapshot.color {
            if *resolution == self.stream {
                self.interop.upload_color(&self.context.queue, plane);
                color_ok = true;
            } else {
                warn!(
                    %resolution,
                    expected = %self.stream,
                    "skipping color plane with mismatched dimensions"
                );
            }
        }
        let mut depth_ok = false;
        if let Some((plane, resolution)) = &snapshot.depth {
            if *resolution == self.stream {
                self.interop.upload_depth(&self.context.queue, plane);
                depth_ok = true;
            } else {
                warn!(
                    %resolution,
                    expected = %self.stream,
                    "skipping depth plane with mismatched dimensions"
                );
            }
        }

        let plan = plan_for(mode);
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });

        for channel in ready_channels(plan, color_ok, depth_ok) {
            self.interop
                .publish(&mut encoder, &self.compute, channel, &self.textures);
        }

        for (index, step) in plan.steps.iter().enumerate() {
            // Staged copy so each pass sees its own transform; a direct
            // queue write would race all steps to the last value.
            let uniforms = QuadUniforms {
                rect: [
                    step.rect.scale[0],
                    step.rect.scale[1],
                    step.rect.offset[0],
                    step.rect.offset[1],
                ],
            };
            let staging = self
                .context
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("quad uniform staging"),
                    contents: bytemuck::bytes_of(&uniforms),
                    usage: wgpu::BufferUsages::COPY_SRC,
                });
            encoder.copy_buffer_to_buffer(
                &staging,
                0,
                &self.quad_uniform,
                0,
                std::mem::size_of::<QuadUniforms>() as u64,
            );

            let load = if index == 0 {
                wgpu::LoadOp::Clear(wgpu::Color::BLACK)
            } else {
                wgpu::LoadOp::Load
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("draw step"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(self.shaders.pipeline(step.program, step.blend));
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, &self.step_bindings[mode.index()][index], &[]);
            self.quad.draw(&mut pass);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

/// Filters the plan's channel list down to those whose inputs arrived with
/// the right dimensions this tick. Draw steps are unaffected: a skipped
/// channel leaves its texture stale but still bound.
fn ready_channels(plan: &RenderPlan, color_ok: bool, depth_ok: bool) -> Vec<Channel> {
    plan.channels
        .iter()
        .copied()
        .filter(|channel| match channel {
            Channel::Color => color_ok,
            Channel::DepthViz | Channel::Position | Channel::Normal | Channel::Composite => {
                depth_ok
            }
        })
        .collect()
}

fn build_step_bindings(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    textures: &TextureSet,
) -> Vec<Vec<wgpu::BindGroup>> {
    ViewMode::ALL
        .iter()
        .map(|mode| {
            plan_for(*mode)
                .steps
                .iter()
                .map(|step| {
                    let mut entries = Vec::with_capacity(TEXTURE_SLOTS * 2);
                    for (slot, channel) in step.slots.iter().enumerate() {
                        let texture = match channel {
                            Some(channel) => textures.texture_for(*channel),
                            None => &textures.placeholder,
                        };
                        entries.push(wgpu::BindGroupEntry {
                            binding: (slot as u32) * 2,
                            resource: wgpu::BindingResource::TextureView(&texture.view),
                        });
                        entries.push(wgpu::BindGroupEntry {
                            binding: (slot as u32) * 2 + 1,
                            resource: wgpu::BindingResource::Sampler(&texture.sampler),
                        });
                    }
                    device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("draw step textures"),
                        layout,
                        entries: &entries,
                    })
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_depth_skips_derived_channels() {
        let plan = plan_for(ViewMode::PointCloudDebug);
        let channels = ready_channels(plan, true, false);
        assert_eq!(channels, vec![Channel::Color]);
    }

    #[test]
    fn missing_color_still_publishes_depth() {
        let plan = plan_for(ViewMode::Overlay);
        let channels = ready_channels(plan, false, true);
        assert_eq!(channels, vec![Channel::DepthViz]);
    }

    #[test]
    fn matching_planes_publish_the_whole_plan() {
        let plan = plan_for(ViewMode::PointCloudDebug);
        let channels = ready_channels(plan, true, true);
        assert_eq!(channels, plan.channels);
    }

    #[test]
    fn nothing_ready_publishes_nothing() {
        let plan = plan_for(ViewMode::ThreeWay);
        assert!(ready_channels(plan, false, false).is_empty());
        // The plan's draw steps remain; only uploads are skipped.
        assert_eq!(plan.steps.len(), 4);
    }
}
