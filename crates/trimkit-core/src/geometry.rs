//! Track orientation (the "preferred transform" of a video track).

use serde::{Deserialize, Serialize};

/// Display orientation of a video track.
///
/// Containers store rotation as display-matrix side data; players apply it
/// when presenting frames. Only quarter turns are representable, which
/// covers what cameras write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Orientation {
    /// Clockwise rotation in degrees, normalized to 0, 90, 180 or 270.
    rotation: u16,
}

impl Orientation {
    /// No rotation.
    pub const IDENTITY: Self = Self { rotation: 0 };

    /// Orientation from a rotation in degrees.
    ///
    /// Any multiple of 90 is accepted (negative values included, as written
    /// by ffprobe's display matrix side data); other angles snap to the
    /// nearest quarter turn.
    pub fn from_rotation_degrees(degrees: f64) -> Self {
        let quarter_turns = (degrees / 90.0).round() as i64;
        Self {
            rotation: (quarter_turns.rem_euclid(4) * 90) as u16,
        }
    }

    /// Clockwise rotation in degrees (0, 90, 180 or 270).
    #[inline]
    pub fn rotation_degrees(self) -> u16 {
        self.rotation
    }

    #[inline]
    pub fn is_identity(self) -> bool {
        self == Self::IDENTITY
    }

    /// Displayed size for a coded frame size.
    pub fn display_size(self, width: u32, height: u32) -> (u32, u32) {
        if self.rotation % 180 == 90 {
            (height, width)
        } else {
            (width, height)
        }
    }
}
