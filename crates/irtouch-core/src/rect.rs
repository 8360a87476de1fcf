use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Identifies one corner of a [`CalibrationRectangle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// Corners in the order they are stored and collected during calibration.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];
}

/// Four corners of a quadrilateral in absolute coordinates.
///
/// Used both for the source quad (the device sensing area, in raw sensor
/// coordinates) and the destination quad (the display area, usually in
/// screen pixels). The quad does not have to be axis aligned.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRectangle {
    pub top_left: Point2<f64>,
    pub top_right: Point2<f64>,
    pub bottom_left: Point2<f64>,
    pub bottom_right: Point2<f64>,
}

impl Default for CalibrationRectangle {
    fn default() -> Self {
        Self::unit()
    }
}

impl CalibrationRectangle {
    pub fn new(
        top_left: Point2<f64>,
        top_right: Point2<f64>,
        bottom_left: Point2<f64>,
        bottom_right: Point2<f64>,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_left,
            bottom_right,
        }
    }

    /// Build from `[tl, tr, bl, br]` coordinate pairs.
    pub fn from_array(corners: [[f64; 2]; 4]) -> Self {
        let [tl, tr, bl, br] = corners.map(|[x, y]| Point2::new(x, y));
        Self::new(tl, tr, bl, br)
    }

    /// The unit square `(0,0) (1,0) (0,1) (1,1)`.
    pub fn unit() -> Self {
        Self::from_array([[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]])
    }

    /// Axis-aligned rectangle spanning `(0,0)..(width,height)`.
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::from_array([[0.0, 0.0], [width, 0.0], [0.0, height], [width, height]])
    }

    pub fn to_array(&self) -> [[f64; 2]; 4] {
        self.corners().map(|p| [p.x, p.y])
    }

    /// Corners in storage order: top-left, top-right, bottom-left, bottom-right.
    #[inline]
    pub fn corners(&self) -> [Point2<f64>; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }

    /// Corners walked around the boundary: top-left, top-right, bottom-right,
    /// bottom-left. This is the order the unit square `(0,0) (1,0) (1,1) (0,1)`
    /// is mapped onto.
    #[inline]
    pub fn perimeter(&self) -> [Point2<f64>; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn corner(&self, corner: Corner) -> Point2<f64> {
        match corner {
            Corner::TopLeft => self.top_left,
            Corner::TopRight => self.top_right,
            Corner::BottomLeft => self.bottom_left,
            Corner::BottomRight => self.bottom_right,
        }
    }

    pub fn set_corner(&mut self, corner: Corner, p: Point2<f64>) {
        match corner {
            Corner::TopLeft => self.top_left = p,
            Corner::TopRight => self.top_right = p,
            Corner::BottomLeft => self.bottom_left = p,
            Corner::BottomRight => self.bottom_right = p,
        }
    }

    /// True when a corner is non-finite or any three corners are (nearly)
    /// collinear. Such a quad has no projective mapping to the unit square.
    pub fn is_degenerate(&self) -> bool {
        let pts = self.corners();
        if pts.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return true;
        }

        let mut extent_sq = 0.0_f64;
        for i in 0..4 {
            for j in (i + 1)..4 {
                extent_sq = extent_sq.max((pts[j] - pts[i]).norm_squared());
            }
        }
        if extent_sq <= 0.0 {
            return true;
        }

        const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
        TRIPLES.iter().any(|&[a, b, c]| {
            let area2 = cross(pts[b] - pts[a], pts[c] - pts[a]).abs();
            area2 <= DEGENERATE_AREA_REL * extent_sq
        })
    }
}

/// Relative doubled-triangle area below which three corners count as collinear.
const DEGENERATE_AREA_REL: f64 = 1e-9;

#[inline]
fn cross(u: Vector2<f64>, v: Vector2<f64>) -> f64 {
    u.x * v.y - u.y * v.x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perimeter_reorders_bottom_corners() {
        let r = CalibrationRectangle::from_size(4.0, 2.0);
        let [a, b, c, d] = r.perimeter();
        assert_eq!(a, Point2::new(0.0, 0.0));
        assert_eq!(b, Point2::new(4.0, 0.0));
        assert_eq!(c, Point2::new(4.0, 2.0));
        assert_eq!(d, Point2::new(0.0, 2.0));
    }

    #[test]
    fn corner_accessors_round_trip() {
        let mut r = CalibrationRectangle::unit();
        for (k, corner) in Corner::ALL.into_iter().enumerate() {
            let p = Point2::new(k as f64, 10.0 + k as f64);
            r.set_corner(corner, p);
            assert_eq!(r.corner(corner), p);
        }
        assert_eq!(
            r.to_array(),
            [[0.0, 10.0], [1.0, 11.0], [2.0, 12.0], [3.0, 13.0]]
        );
    }

    #[test]
    fn detects_degenerate_quads() {
        assert!(!CalibrationRectangle::unit().is_degenerate());
        assert!(!CalibrationRectangle::from_array([
            [120.0, 90.0],
            [900.0, 140.0],
            [80.0, 700.0],
            [950.0, 650.0]
        ])
        .is_degenerate());

        let collinear =
            CalibrationRectangle::from_array([[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [1.0, 1.0]]);
        assert!(collinear.is_degenerate());

        let collapsed = CalibrationRectangle::from_array([[3.0, 3.0]; 4]);
        assert!(collapsed.is_degenerate());

        let mut nan = CalibrationRectangle::unit();
        nan.bottom_right.x = f64::NAN;
        assert!(nan.is_degenerate());
    }
}
