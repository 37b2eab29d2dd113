use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use rgbd::{
    FrameListener, FrameSource, LogSource, LogWriter, RecordingListener, SyntheticSource,
};
use viewer::{negotiate_resolution, ViewerConfig};

use crate::cli::Cli;

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    let mut source = open_source(&args);
    tracing::info!(source = source.name(), "connecting to frame source");
    if let Err(err) = source.connect() {
        source.shutdown();
        return Err(err.into());
    }
    if let Err(err) = source.create_depth_stream() {
        source.shutdown();
        return Err(err.into());
    }
    if let Err(err) = source.create_color_stream() {
        source.shutdown();
        return Err(err.into());
    }

    let recorder = match &args.record {
        Some(path) => {
            let resolution =
                negotiate_resolution(source.depth_stream(), source.color_stream())?;
            let fps = source
                .depth_stream()
                .or(source.color_stream())
                .map(|stream| stream.fps)
                .unwrap_or(30);
            let writer = LogWriter::create(path, "rgbdview session", resolution, fps)
                .context("failed to create recording log")?;
            Some(Arc::new(RecordingListener::new(writer)))
        }
        None => None,
    };

    let config = ViewerConfig {
        window_size: args.size,
        shader_dir: args.shader_dir.clone(),
        tap: recorder.clone().map(|recorder| {
            let listener: Arc<dyn FrameListener> = recorder;
            listener
        }),
    };
    viewer::run(config, source)?;

    if let Some(recorder) = recorder {
        if let Some(path) = recorder.finish()? {
            tracing::info!(log = %path.display(), "session recording written");
        }
    }
    Ok(())
}

fn open_source(args: &Cli) -> Box<dyn FrameSource> {
    match &args.device {
        Some(path) => Box::new(LogSource::new(path)),
        None => Box::new(SyntheticSource::default()),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
