use rgbd::{Resolution, StreamInfo};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("color and depth streams must share one resolution (depth {depth}, color {color})")]
    ResolutionMismatch {
        depth: Resolution,
        color: Resolution,
    },
    #[error("no valid color or depth stream is available")]
    NoValidStreams,
}

/// Settles the working resolution from the active streams.
///
/// Runs before any GPU allocation: a mismatch or an absent pair of streams
/// must abort startup without touching the device.
pub fn negotiate_resolution(
    depth: Option<StreamInfo>,
    color: Option<StreamInfo>,
) -> Result<Resolution, ConfigError> {
    match (depth, color) {
        (Some(depth), Some(color)) => {
            if depth.resolution == color.resolution {
                Ok(depth.resolution)
            } else {
                Err(ConfigError::ResolutionMismatch {
                    depth: depth.resolution,
                    color: color.resolution,
                })
            }
        }
        (Some(depth), None) => Ok(depth.resolution),
        (None, Some(color)) => Ok(color.resolution),
        (None, None) => Err(ConfigError::NoValidStreams),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(width: u32, height: u32) -> StreamInfo {
        StreamInfo {
            resolution: Resolution::new(width, height),
            fps: 30,
        }
    }

    #[test]
    fn matching_streams_negotiate_shared_resolution() {
        let resolved = negotiate_resolution(Some(stream(640, 480)), Some(stream(640, 480)));
        assert_eq!(resolved, Ok(Resolution::new(640, 480)));
    }

    #[test]
    fn mismatched_streams_fail() {
        let resolved = negotiate_resolution(Some(stream(640, 480)), Some(stream(1280, 960)));
        assert_eq!(
            resolved,
            Err(ConfigError::ResolutionMismatch {
                depth: Resolution::new(640, 480),
                color: Resolution::new(1280, 960),
            })
        );
    }

    #[test]
    fn single_stream_wins() {
        assert_eq!(
            negotiate_resolution(Some(stream(320, 240)), None),
            Ok(Resolution::new(320, 240))
        );
        assert_eq!(
            negotiate_resolution(None, Some(stream(1280, 1024))),
            Ok(Resolution::new(1280, 1024))
        );
    }

    #[test]
    fn no_streams_is_a_config_error() {
        assert_eq!(
            negotiate_resolution(None, None),
            Err(ConfigError::NoValidStreams)
        );
    }
}
