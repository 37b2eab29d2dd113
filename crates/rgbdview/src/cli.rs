use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "rgbdview",
    author,
    version,
    about = "Real-time RGB-D stream viewer",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Device to open: a recorded frame-log directory. Omitted selects the
    /// synthetic test device.
    #[arg(value_name = "DEVICE")]
    pub device: Option<PathBuf>,

    /// Initial window size (e.g. `1280x960`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_window_size,
        default_value = "1280x960"
    )]
    pub size: (u32, u32),

    /// Directory holding the GLSL shader assets.
    #[arg(long, value_name = "PATH", default_value = "shaders")]
    pub shader_dir: PathBuf,

    /// Record the received frames into a frame log at PATH.
    #[arg(long, value_name = "PATH")]
    pub record: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_window_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height".to_string())?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_sizes() {
        assert_eq!(parse_window_size("1280x960").unwrap(), (1280, 960));
        assert_eq!(parse_window_size("640X480").unwrap(), (640, 480));
        assert!(parse_window_size("1280").is_err());
        assert!(parse_window_size("0x480").is_err());
        assert!(parse_window_size("axb").is_err());
    }

    #[test]
    fn defaults_select_the_synthetic_device() {
        let cli = Cli::parse_from(["rgbdview"]);
        assert!(cli.device.is_none());
        assert_eq!(cli.size, (1280, 960));
        assert_eq!(cli.shader_dir, PathBuf::from("shaders"));
        assert!(cli.record.is_none());
    }

    #[test]
    fn positional_device_is_a_log_path() {
        let cli = Cli::parse_from(["rgbdview", "captures/desk", "--record", "out"]);
        assert_eq!(cli.device.unwrap(), PathBuf::from("captures/desk"));
        assert_eq!(cli.record.unwrap(), PathBuf::from("out"));
    }
}
