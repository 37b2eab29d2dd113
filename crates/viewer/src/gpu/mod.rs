mod compute;
mod context;
mod interop;
mod pipelines;
mod quad;
mod state;
mod textures;
mod uniforms;

pub(crate) use state::GpuState;
