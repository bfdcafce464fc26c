/// A point in the map's projected coordinate system (meters).
///
/// The elevation is optional: flat maps report positions without one and
/// callers enrich it from a terrain source when needed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    pub fn flat(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn with_z(self, z: f64) -> Self {
        Self { z: Some(z), ..self }
    }

    /// `false` when the elevation is missing or exactly zero.
    ///
    /// 2D maps report a zero elevation for ground positions, so zero is
    /// treated the same as missing.
    pub fn has_elevation(&self) -> bool {
        self.z.is_some_and(|z| z != 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_none_or(f64::is_finite)
    }
}
