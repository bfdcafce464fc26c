use crate::math::{Position, normalize_degrees};

/// Camera description applied to a view.
///
/// A viewpoint anchors on a ground position (the point the camera looks at)
/// or, for views that are piloted by raw pose, on the camera position.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewpoint {
    pub ground_position: Option<Position>,
    pub camera_position: Option<Position>,
    /// Distance between camera and ground position (meters).
    pub distance: f64,
    /// Degrees, clockwise from north.
    pub heading: f64,
    /// Degrees, negative looks down.
    pub pitch: Option<f64>,
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self {
            ground_position: None,
            camera_position: None,
            distance: 0.0,
            heading: 0.0,
            pitch: None,
        }
    }
}

impl Viewpoint {
    pub fn looking_at(ground: Position, distance: f64, heading: f64) -> Self {
        Self {
            ground_position: Some(ground),
            distance,
            heading: normalize_degrees(heading),
            ..Self::default()
        }
    }

    pub fn from_camera(camera: Position, heading: f64, pitch: f64) -> Self {
        Self {
            camera_position: Some(camera),
            heading: normalize_degrees(heading),
            pitch: Some(pitch),
            ..Self::default()
        }
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = Some(pitch);
        self
    }

    /// A viewpoint is only applied when it can be anchored somewhere.
    pub fn is_valid(&self) -> bool {
        let anchored = self
            .ground_position
            .or(self.camera_position)
            .is_some_and(|p| p.is_finite());
        anchored && self.distance.is_finite() && self.heading.is_finite()
    }

    /// Ground position, falling back to the camera position.
    pub fn anchor(&self) -> Option<Position> {
        self.ground_position.or(self.camera_position)
    }

    /// Same anchor and distance, looking along `heading`.
    ///
    /// The anchor becomes the ground position, so a camera-only viewpoint
    /// stays anchored. Camera position and pitch are dropped: the receiving
    /// view derives its own pose from the anchor.
    pub fn rotated_to(&self, heading: f64) -> Self {
        Self {
            ground_position: self.anchor(),
            camera_position: None,
            distance: self.distance,
            heading: normalize_degrees(heading),
            pitch: None,
        }
    }
}
