//! The winit event loop driving the viewer.
//!
//! Everything the loop touches is owned by its closure (the GPU state, the
//! current view mode, and the frame source), so windowing callbacks route to
//! plain method calls with no global state. Frame delivery stays on the
//! source's producer thread; the loop only ever reads snapshots.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use rgbd::{FanoutListener, FrameListener, FrameSource};

use crate::frames::FrameCache;
use crate::gpu::GpuState;
use crate::negotiate::negotiate_resolution;
use crate::view::ViewMode;
use crate::ViewerConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ViewerAction {
    SetMode(ViewMode),
    ReloadShaders,
    PlaybackFaster,
    PlaybackSlower,
    Quit,
}

/// Maps the keyboard control surface: digits pick view modes, `r` reloads
/// shaders, `+`/`-` drive playback rate, Escape quits.
pub(crate) fn action_for_key(key: &Key) -> Option<ViewerAction> {
    match key {
        Key::Named(NamedKey::Escape) => Some(ViewerAction::Quit),
        Key::Character(text) => {
            let mut chars = text.chars();
            let ch = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            match ch {
                'r' | 'R' => Some(ViewerAction::ReloadShaders),
                '+' | '=' => Some(ViewerAction::PlaybackFaster),
                '-' | '_' => Some(ViewerAction::PlaybackSlower),
                digit => ViewMode::from_digit(digit).map(ViewerAction::SetMode),
            }
        }
        _ => None,
    }
}

pub(crate) fn run_event_loop(config: ViewerConfig, mut source: Box<dyn FrameSource>) -> Result<()> {
    let ViewerConfig {
        window_size,
        shader_dir,
        tap,
    } = config;

    // Resolution is settled before any GPU resource exists; a mismatch must
    // not leave handles behind.
    let resolution = negotiate_resolution(source.depth_stream(), source.color_stream())?;
    tracing::info!(%resolution, source = source.name(), "negotiated stream resolution");

    let cache = Arc::new(FrameCache::new());
    let listener: Arc<dyn FrameListener> = match tap {
        Some(tap) => {
            let fan: Vec<Arc<dyn FrameListener>> = vec![cache.clone(), tap];
            Arc::new(FanoutListener::new(fan))
        }
        None => cache.clone(),
    };
    source.set_listener(listener);

    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let initial_size = PhysicalSize::new(window_size.0.max(1), window_size.1.max(1));
    let window = WindowBuilder::new()
        .with_title("rgbdview")
        .with_inner_size(initial_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create viewer window: {err}"))?;
    let window = Arc::new(window);

    let mut state = GpuState::new(
        window.as_ref(),
        window.inner_size(),
        resolution,
        &shader_dir,
    )?;
    let mut mode = ViewMode::default();
    let mut torn_down = false;

    let loop_window = window.clone();
    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == loop_window.id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                    WindowEvent::Resized(new_size) => state.resize(new_size),
                    WindowEvent::KeyboardInput { event, .. }
                        if event.state == ElementState::Pressed =>
                    {
                        match action_for_key(&event.logical_key) {
                            Some(ViewerAction::SetMode(new_mode)) => {
                                if mode != new_mode {
                                    tracing::info!(?new_mode, "view mode changed");
                                }
                                mode = new_mode;
                            }
                            Some(ViewerAction::ReloadShaders) => state.reload_shaders(),
                            Some(ViewerAction::PlaybackFaster) => {
                                adjust_playback(source.as_ref(), 1)
                            }
                            Some(ViewerAction::PlaybackSlower) => {
                                adjust_playback(source.as_ref(), -1)
                            }
                            Some(ViewerAction::Quit) => elwt.exit(),
                            None => {}
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        let snapshot = cache.snapshot();
                        match state.render(&snapshot, mode) {
                            Ok(()) => {}
                            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                                state.resize(state.size());
                            }
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                tracing::error!("surface out of memory; shutting down");
                                elwt.exit();
                            }
                            Err(err) => {
                                // One bad frame never tears the loop down.
                                tracing::warn!(error = ?err, "surface error; retrying next frame");
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                // Continuous redraw; Fifo presentation paces the loop to
                // the display.
                loop_window.request_redraw();
                elwt.set_control_flow(ControlFlow::Poll);
            }
            Event::LoopExiting => {
                if !torn_down {
                    torn_down = true;
                    teardown(source.as_mut());
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))?;
    Ok(())
}

fn adjust_playback(source: &dyn FrameSource, steps: i32) {
    match source.playback() {
        Some(handle) => {
            let rate = handle.adjust(steps);
            tracing::info!(rate, "playback rate adjusted");
        }
        None => tracing::debug!("source has no playback control"),
    }
}

fn teardown(source: &mut dyn FrameSource) {
    tracing::info!("shutting down viewer");
    source.destroy_color_stream();
    source.destroy_depth_stream();
    source.disconnect();
    source.shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(text: &str) -> Key {
        Key::Character(text.into())
    }

    #[test]
    fn digits_select_modes() {
        assert_eq!(
            action_for_key(&character("1")),
            Some(ViewerAction::SetMode(ViewMode::Overlay))
        );
        assert_eq!(
            action_for_key(&character("2")),
            Some(ViewerAction::SetMode(ViewMode::Depth))
        );
        assert_eq!(
            action_for_key(&character("5")),
            Some(ViewerAction::SetMode(ViewMode::ThreeWay))
        );
        assert_eq!(action_for_key(&character("7")), None);
    }

    #[test]
    fn control_keys_map_to_actions() {
        assert_eq!(
            action_for_key(&character("r")),
            Some(ViewerAction::ReloadShaders)
        );
        assert_eq!(
            action_for_key(&character("+")),
            Some(ViewerAction::PlaybackFaster)
        );
        assert_eq!(
            action_for_key(&character("=")),
            Some(ViewerAction::PlaybackFaster)
        );
        assert_eq!(
            action_for_key(&character("-")),
            Some(ViewerAction::PlaybackSlower)
        );
        assert_eq!(
            action_for_key(&Key::Named(NamedKey::Escape)),
            Some(ViewerAction::Quit)
        );
    }

    #[test]
    fn unbound_keys_are_ignored() {
        assert_eq!(action_for_key(&character("x")), None);
        assert_eq!(action_for_key(&character("12")), None);
        assert_eq!(action_for_key(&Key::Named(NamedKey::Space)), None);
    }
}
