//! View modes and their render plans.
//!
//! Each mode is pure data: an ordered list of draw steps plus the set of
//! interop channels the steps consume. Adding a mode means adding a table
//! entry, not a code branch. Key events drive the mode transitions from the
//! event loop.

/// Number of positional texture slots a draw step can bind
/// (`u_Texture0..u_Texture4` in the GLSL).
pub(crate) const TEXTURE_SLOTS: usize = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
    /// Color with the depth visualization alpha-blended on top.
    #[default]
    Overlay,
    Depth,
    Color,
    /// Debug panes for the point-cloud buffers (position, normal, composite).
    PointCloudDebug,
    /// Color, depth, and overlay side by side.
    ThreeWay,
}

impl ViewMode {
    pub(crate) const ALL: [ViewMode; 5] = [
        ViewMode::Overlay,
        ViewMode::Depth,
        ViewMode::Color,
        ViewMode::PointCloudDebug,
        ViewMode::ThreeWay,
    ];

    /// Maps the digit row to view modes; `None` for unbound digits.
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '1' => Some(ViewMode::Overlay),
            '2' => Some(ViewMode::Depth),
            '3' => Some(ViewMode::Color),
            '4' => Some(ViewMode::PointCloudDebug),
            '5' => Some(ViewMode::ThreeWay),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ViewMode::Overlay => 0,
            ViewMode::Depth => 1,
            ViewMode::Color => 2,
            ViewMode::PointCloudDebug => 3,
            ViewMode::ThreeWay => 4,
        }
    }
}

/// Logical interop channel; each one pairs a compute-written buffer with the
/// texture it is blitted into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Channel {
    Color,
    DepthViz,
    Position,
    Normal,
    /// Point-cloud splat target; the only channel sized to the window rather
    /// than the stream.
    Composite,
}

impl Channel {
    pub(crate) fn is_screen_space(self) -> bool {
        matches!(self, Channel::Composite)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ProgramId {
    ColorPassthrough,
    DepthViz,
    BufferDebug,
}

impl ProgramId {
    pub(crate) const ALL: [ProgramId; 3] = [
        ProgramId::ColorPassthrough,
        ProgramId::DepthViz,
        ProgramId::BufferDebug,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            ProgramId::ColorPassthrough => 0,
            ProgramId::DepthViz => 1,
            ProgramId::BufferDebug => 2,
        }
    }

    pub(crate) fn source_file(self) -> &'static str {
        match self {
            ProgramId::ColorPassthrough => "color.frag",
            ProgramId::DepthViz => "depth.frag",
            ProgramId::BufferDebug => "buffer_debug.frag",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlendMode {
    /// Overwrites the target.
    Opaque,
    /// Classic source-alpha blending over what earlier steps drew.
    AlphaBlend,
}

/// Placement of a draw in normalized device coordinates: the unit quad is
/// scaled then translated, allowing sub-viewport panes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct QuadRect {
    pub scale: [f32; 2],
    pub offset: [f32; 2],
}

impl QuadRect {
    pub(crate) const FULL: QuadRect = QuadRect {
        scale: [1.0, 1.0],
        offset: [0.0, 0.0],
    };

    pub(crate) const fn pane(scale_x: f32, scale_y: f32, offset_x: f32, offset_y: f32) -> Self {
        QuadRect {
            scale: [scale_x, scale_y],
            offset: [offset_x, offset_y],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DrawStep {
    pub program: ProgramId,
    pub blend: BlendMode,
    pub rect: QuadRect,
    /// Textures bound to sequential slots; `None` slots receive the
    /// placeholder texture.
    pub slots: [Option<Channel>; TEXTURE_SLOTS],
}

/// Everything one view mode renders: the channels to publish (in order, so
/// derived channels follow their inputs) and the draw steps to encode.
pub(crate) struct RenderPlan {
    pub channels: &'static [Channel],
    pub steps: &'static [DrawStep],
}

const fn primary(channel: Channel) -> [Option<Channel>; TEXTURE_SLOTS] {
    [Some(channel), None, None, None, None]
}

static OVERLAY: RenderPlan = RenderPlan {
    channels: &[Channel::Color, Channel::DepthViz],
    steps: &[
        DrawStep {
            program: ProgramId::ColorPassthrough,
            blend: BlendMode::Opaque,
            rect: QuadRect::FULL,
            slots: primary(Channel::Color),
        },
        DrawStep {
            program: ProgramId::DepthViz,
            blend: BlendMode::AlphaBlend,
            rect: QuadRect::FULL,
            slots: primary(Channel::DepthViz),
        },
    ],
};

static DEPTH: RenderPlan = RenderPlan {
    channels: &[Channel::DepthViz],
    steps: &[DrawStep {
        program: ProgramId::DepthViz,
        blend: BlendMode::Opaque,
        rect: QuadRect::FULL,
        slots: primary(Channel::DepthViz),
    }],
};

static COLOR: RenderPlan = RenderPlan {
    channels: &[Channel::Color],
    steps: &[DrawStep {
        program: ProgramId::ColorPassthrough,
        blend: BlendMode::Opaque,
        rect: QuadRect::FULL,
        slots: primary(Channel::Color),
    }],
};

// Position must precede Normal (normal estimation reads the position
// buffer) and Composite (the splat projects the positions).
static POINT_CLOUD_DEBUG: RenderPlan = RenderPlan {
    channels: &[
        Channel::Color,
        Channel::DepthViz,
        Channel::Position,
        Channel::Normal,
        Channel::Composite,
    ],
    steps: &[DrawStep {
        program: ProgramId::BufferDebug,
        blend: BlendMode::Opaque,
        rect: QuadRect::FULL,
        slots: [
            Some(Channel::Position),
            Some(Channel::Normal),
            Some(Channel::DepthViz),
            Some(Channel::Composite),
            None,
        ],
    }],
};

static THREE_WAY: RenderPlan = RenderPlan {
    channels: &[Channel::Color, Channel::DepthViz],
    steps: &[
        DrawStep {
            program: ProgramId::ColorPassthrough,
            blend: BlendMode::Opaque,
            rect: QuadRect::pane(0.5, 0.5, -0.5, 0.5),
            slots: primary(Channel::Color),
        },
        DrawStep {
            program: ProgramId::DepthViz,
            blend: BlendMode::Opaque,
            rect: QuadRect::pane(0.5, 0.5, 0.5, 0.5),
            slots: primary(Channel::DepthViz),
        },
        DrawStep {
            program: ProgramId::ColorPassthrough,
            blend: BlendMode::Opaque,
            rect: QuadRect::pane(0.5, 0.5, 0.0, -0.5),
            slots: primary(Channel::Color),
        },
        DrawStep {
            program: ProgramId::DepthViz,
            blend: BlendMode::AlphaBlend,
            rect: QuadRect::pane(0.5, 0.5, 0.0, -0.5),
            slots: primary(Channel::DepthViz),
        },
    ],
};

pub(crate) fn plan_for(mode: ViewMode) -> &'static RenderPlan {
    match mode {
        ViewMode::Overlay => &OVERLAY,
        ViewMode::Depth => &DEPTH,
        ViewMode::Color => &COLOR,
        ViewMode::PointCloudDebug => &POINT_CLOUD_DEBUG,
        ViewMode::ThreeWay => &THREE_WAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_overlay() {
        assert_eq!(ViewMode::default(), ViewMode::Overlay);
    }

    #[test]
    fn digits_map_to_modes() {
        assert_eq!(ViewMode::from_digit('1'), Some(ViewMode::Overlay));
        assert_eq!(ViewMode::from_digit('4'), Some(ViewMode::PointCloudDebug));
        assert_eq!(ViewMode::from_digit('5'), Some(ViewMode::ThreeWay));
        assert_eq!(ViewMode::from_digit('9'), None);
        assert_eq!(ViewMode::from_digit('a'), None);
    }

    #[test]
    fn plan_selection_is_idempotent() {
        for mode in ViewMode::ALL {
            let first = plan_for(mode);
            let second = plan_for(mode);
            assert_eq!(first.steps, second.steps);
            assert_eq!(first.channels, second.channels);
        }
    }

    #[test]
    fn overlay_draws_color_then_blended_depth() {
        let plan = plan_for(ViewMode::Overlay);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].program, ProgramId::ColorPassthrough);
        assert_eq!(plan.steps[0].blend, BlendMode::Opaque);
        assert_eq!(plan.steps[1].program, ProgramId::DepthViz);
        assert_eq!(plan.steps[1].blend, BlendMode::AlphaBlend);
        assert_eq!(plan.steps[1].rect, QuadRect::FULL);
    }

    #[test]
    fn single_texture_modes_publish_only_their_channel() {
        assert_eq!(plan_for(ViewMode::Depth).channels, &[Channel::DepthViz]);
        assert_eq!(plan_for(ViewMode::Color).channels, &[Channel::Color]);
    }

    #[test]
    fn derived_channels_follow_their_inputs() {
        let channels = plan_for(ViewMode::PointCloudDebug).channels;
        let position = channels
            .iter()
            .position(|c| *c == Channel::Position)
            .unwrap();
        let normal = channels.iter().position(|c| *c == Channel::Normal).unwrap();
        let composite = channels
            .iter()
            .position(|c| *c == Channel::Composite)
            .unwrap();
        assert!(position < normal);
        assert!(position < composite);
    }

    #[test]
    fn three_way_panes_tile_without_full_rects() {
        let plan = plan_for(ViewMode::ThreeWay);
        assert_eq!(plan.steps.len(), 4);
        assert!(plan.steps.iter().all(|step| step.rect != QuadRect::FULL));
        // Bottom pane overlays depth on color at the same placement.
        assert_eq!(plan.steps[2].rect, plan.steps[3].rect);
        assert_eq!(plan.steps[3].blend, BlendMode::AlphaBlend);
    }

    #[test]
    fn only_composite_is_screen_space() {
        for channel in [
            Channel::Color,
            Channel::DepthViz,
            Channel::Position,
            Channel::Normal,
        ] {
            assert!(!channel.is_screen_space());
        }
        assert!(Channel::Composite.is_screen_space());
    }
}
