use crate::CalibrationRectangle;
use nalgebra::{Matrix4, Point2, RowVector4};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Homogeneous `w` below which a warped point is treated as lying at infinity.
const MIN_W: f64 = 1e-12;

/// Which calibration quad failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuadRole {
    Source,
    Destination,
}

impl std::fmt::Display for QuadRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuadRole::Source => write!(f, "source"),
            QuadRole::Destination => write!(f, "destination"),
        }
    }
}

/// Errors produced while building or applying a projective warp.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum WarpError {
    #[error("{which} quad is degenerate (collinear or non-finite corners)")]
    DegenerateQuad { which: QuadRole },
    #[error("projective system is singular")]
    Singular,
    #[error("point ({x}, {y}) maps to infinity")]
    PointAtInfinity { x: f64, y: f64 },
}

/// Maps points from a source quad onto a destination quad.
///
/// The 4×4 matrix follows the row-vector convention: a point `(x, y)` is
/// lifted to `[x y 0 1]` and multiplied from the left, `p' = p · M`. The
/// matrix is recomputed lazily: setters only mark it dirty and the next
/// [`Warper::warp`] (or an explicit [`Warper::compute`]) rebuilds it. A failed
/// rebuild keeps the last good matrix in place.
#[derive(Clone, Debug)]
pub struct Warper {
    source: CalibrationRectangle,
    destination: CalibrationRectangle,
    matrix: Matrix4<f64>,
    dirty: bool,
}

impl Default for Warper {
    fn default() -> Self {
        Self::new()
    }
}

impl Warper {
    /// A warper holding the identity mapping.
    pub fn new() -> Self {
        Self {
            source: CalibrationRectangle::unit(),
            destination: CalibrationRectangle::unit(),
            matrix: Matrix4::identity(),
            dirty: false,
        }
    }

    /// Build a warper and validate the mapping up front.
    pub fn from_quads(
        source: CalibrationRectangle,
        destination: CalibrationRectangle,
    ) -> Result<Self, WarpError> {
        let mut warper = Self::new();
        warper.set_quads(source, destination)?;
        Ok(warper)
    }

    /// Reset both quads to the unit square.
    pub fn set_identity(&mut self) {
        self.source = CalibrationRectangle::unit();
        self.destination = CalibrationRectangle::unit();
        self.matrix = Matrix4::identity();
        self.dirty = false;
    }

    pub fn set_source(&mut self, source: CalibrationRectangle) {
        self.source = source;
        self.dirty = true;
    }

    pub fn set_destination(&mut self, destination: CalibrationRectangle) {
        self.destination = destination;
        self.dirty = true;
    }

    /// Replace both quads at once, committing only if the mapping is valid.
    ///
    /// On error the warper is left exactly as it was.
    pub fn set_quads(
        &mut self,
        source: CalibrationRectangle,
        destination: CalibrationRectangle,
    ) -> Result<(), WarpError> {
        let matrix = warp_matrix(&source, &destination)?;
        self.source = source;
        self.destination = destination;
        self.matrix = matrix;
        self.dirty = false;
        Ok(())
    }

    #[inline]
    pub fn source(&self) -> &CalibrationRectangle {
        &self.source
    }

    #[inline]
    pub fn destination(&self) -> &CalibrationRectangle {
        &self.destination
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Last successfully computed matrix.
    #[inline]
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Rebuild the matrix from the current quads.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn compute(&mut self) -> Result<&Matrix4<f64>, WarpError> {
        match warp_matrix(&self.source, &self.destination) {
            Ok(m) => {
                self.matrix = m;
                self.dirty = false;
                Ok(&self.matrix)
            }
            Err(err) => {
                log::warn!("warp matrix not updated: {err}");
                Err(err)
            }
        }
    }

    /// Map a point, recomputing the matrix first if a quad changed.
    pub fn warp(&mut self, p: Point2<f64>) -> Result<Point2<f64>, WarpError> {
        if self.dirty {
            self.compute()?;
        }
        apply_warp(&self.matrix, p)
    }
}

/// Matrix mapping the unit square `(0,0) (1,0) (1,1) (0,1)` onto the quad
/// perimeter `tl, tr, br, bl`.
pub fn square_to_quad(quad: &CalibrationRectangle) -> Result<Matrix4<f64>, WarpError> {
    let [p0, p1, p2, p3] = quad.perimeter();

    let dx1 = p1.x - p2.x;
    let dy1 = p1.y - p2.y;
    let dx2 = p3.x - p2.x;
    let dy2 = p3.y - p2.y;
    let sx = p0.x - p1.x + p2.x - p3.x;
    let sy = p0.y - p1.y + p2.y - p3.y;

    let den = dx1 * dy2 - dx2 * dy1;
    if den.abs() < f64::MIN_POSITIVE || !den.is_finite() {
        return Err(WarpError::Singular);
    }

    let g = (sx * dy2 - dx2 * sy) / den;
    let h = (dx1 * sy - sx * dy1) / den;
    let a = p1.x - p0.x + g * p1.x;
    let b = p3.x - p0.x + h * p3.x;
    let c = p0.x;
    let d = p1.y - p0.y + g * p1.y;
    let e = p3.y - p0.y + h * p3.y;
    let f = p0.y;

    Ok(Matrix4::new(
        a, d, 0.0, g, //
        b, e, 0.0, h, //
        0.0, 0.0, 1.0, 0.0, //
        c, f, 0.0, 1.0,
    ))
}

/// Inverse of [`square_to_quad`], obtained through the adjoint of the
/// embedded 3×3 projective block.
pub fn quad_to_square(quad: &CalibrationRectangle) -> Result<Matrix4<f64>, WarpError> {
    let m = square_to_quad(quad)?;
    let (a, d, g) = (m[(0, 0)], m[(0, 1)], m[(0, 3)]);
    let (b, e, h) = (m[(1, 0)], m[(1, 1)], m[(1, 3)]);
    let (c, f) = (m[(3, 0)], m[(3, 1)]);

    let adj_a = e - f * h;
    let adj_b = c * h - b;
    let adj_c = b * f - c * e;
    let adj_d = f * g - d;
    let adj_e = a - c * g;
    let adj_f = c * d - a * f;
    let adj_g = d * h - e * g;
    let adj_h = b * g - a * h;
    let adj_i = a * e - b * d;

    let det = a * adj_a + b * adj_d + c * adj_g;
    if det.abs() < f64::MIN_POSITIVE || !det.is_finite() {
        return Err(WarpError::Singular);
    }
    let idet = 1.0 / det;

    Ok(Matrix4::new(
        adj_a * idet,
        adj_d * idet,
        0.0,
        adj_g * idet,
        adj_b * idet,
        adj_e * idet,
        0.0,
        adj_h * idet,
        0.0,
        0.0,
        1.0,
        0.0,
        adj_c * idet,
        adj_f * idet,
        0.0,
        adj_i * idet,
    ))
}

/// Compose `quad_to_square(source) · square_to_quad(destination)`.
pub fn warp_matrix(
    source: &CalibrationRectangle,
    destination: &CalibrationRectangle,
) -> Result<Matrix4<f64>, WarpError> {
    if source.is_degenerate() {
        return Err(WarpError::DegenerateQuad {
            which: QuadRole::Source,
        });
    }
    if destination.is_degenerate() {
        return Err(WarpError::DegenerateQuad {
            which: QuadRole::Destination,
        });
    }

    let m = quad_to_square(source)? * square_to_quad(destination)?;
    if m.iter().any(|v| !v.is_finite()) {
        return Err(WarpError::Singular);
    }
    Ok(m)
}

/// Apply a row-vector warp matrix to `(x, y)` with perspective divide.
#[inline]
pub fn apply_warp(m: &Matrix4<f64>, p: Point2<f64>) -> Result<Point2<f64>, WarpError> {
    let v = RowVector4::new(p.x, p.y, 0.0, 1.0) * m;
    let w = v[3];
    if w.abs() < MIN_W || !w.is_finite() {
        return Err(WarpError::PointAtInfinity { x: p.x, y: p.y });
    }
    Ok(Point2::new(v[0] / w, v[1] / w))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    fn skewed_quad() -> CalibrationRectangle {
        CalibrationRectangle::from_array([
            [212.0, 148.0],
            [811.0, 102.0],
            [160.0, 655.0],
            [873.0, 690.0],
        ])
    }

    #[test]
    fn identity_leaves_points_untouched() {
        let mut w = Warper::new();
        w.set_source(skewed_quad());
        w.set_identity();
        for i in 0..=10 {
            for j in 0..=10 {
                let p = Point2::new(i as f64 / 10.0, j as f64 / 10.0);
                assert_close(w.warp(p).unwrap(), p, 1e-12);
            }
        }
    }

    #[test]
    fn unit_square_to_full_hd() {
        let mut w = Warper::new();
        w.set_source(CalibrationRectangle::unit());
        w.set_destination(CalibrationRectangle::from_size(1920.0, 1080.0));
        let p = w.warp(Point2::new(0.5, 0.5)).unwrap();
        assert_close(p, Point2::new(960.0, 540.0), 1e-9);
    }

    #[test]
    fn corners_map_onto_corners() {
        let src = skewed_quad();
        let dst = CalibrationRectangle::from_array([
            [40.0, 30.0],
            [1880.0, 55.0],
            [20.0, 1040.0],
            [1900.0, 1060.0],
        ]);
        let mut w = Warper::from_quads(src, dst).unwrap();
        for (s, d) in src.corners().into_iter().zip(dst.corners()) {
            assert_close(w.warp(s).unwrap(), d, 1e-6);
        }
    }

    #[test]
    fn round_trip_through_unit_square() {
        let q = skewed_quad();
        let mut to_unit = Warper::from_quads(q, CalibrationRectangle::unit()).unwrap();
        let mut from_unit = Warper::from_quads(CalibrationRectangle::unit(), q).unwrap();

        for p in [
            Point2::new(300.0, 200.0),
            Point2::new(512.0, 384.0),
            Point2::new(700.0, 600.0),
            Point2::new(222.0, 640.0),
        ] {
            let u = to_unit.warp(p).unwrap();
            let back = from_unit.warp(u).unwrap();
            assert_close(back, p, 1e-4);
        }
    }

    #[test]
    fn square_to_quad_inverse_composes_to_identity() {
        let q = skewed_quad();
        let m = quad_to_square(&q).unwrap() * square_to_quad(&q).unwrap();
        let p = Point2::new(431.0, 377.0);
        assert_close(apply_warp(&m, p).unwrap(), p, 1e-6);
    }

    #[test]
    fn setters_mark_dirty_and_warp_recomputes() {
        let mut w = Warper::new();
        w.set_destination(CalibrationRectangle::from_size(2.0, 2.0));
        assert!(w.is_dirty());
        let p = w.warp(Point2::new(0.25, 0.75)).unwrap();
        assert!(!w.is_dirty());
        assert_close(p, Point2::new(0.5, 1.5), 1e-12);
    }

    #[test]
    fn degenerate_source_keeps_last_good_matrix() {
        let mut w = Warper::from_quads(
            CalibrationRectangle::unit(),
            CalibrationRectangle::from_size(100.0, 50.0),
        )
        .unwrap();
        let good = *w.matrix();

        let collinear =
            CalibrationRectangle::from_array([[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);
        let err = w
            .set_quads(collinear, CalibrationRectangle::unit())
            .unwrap_err();
        assert_eq!(
            err,
            WarpError::DegenerateQuad {
                which: QuadRole::Source
            }
        );
        assert_eq!(*w.matrix(), good);
        assert_eq!(*w.source(), CalibrationRectangle::unit());

        w.set_source(collinear);
        assert!(w.warp(Point2::new(0.5, 0.5)).is_err());
        assert_eq!(*w.matrix(), good);
        assert!(w.is_dirty());
    }

    #[test]
    fn point_on_vanishing_line_is_rejected() {
        // Row-vector matrix with w = 1 - x, so x = 1 sits on the horizon.
        let m = Matrix4::new(
            1.0, 0.0, 0.0, -1.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        assert!(matches!(
            apply_warp(&m, Point2::new(1.0, 0.3)),
            Err(WarpError::PointAtInfinity { .. })
        ));
        assert!(apply_warp(&m, Point2::new(0.5, 0.3)).is_ok());
    }
}
