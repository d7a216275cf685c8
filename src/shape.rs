//! Ray-shape intersection primitives.
//!
//! Every query takes a ray as `(pos, dir)` and answers with the ray parameter `t`
//! of the hit point `pos + dir * t`. Roots closer than [`Eps::EPS`] are not hits,
//! so a ray starting on a surface never re-intersects it at its own origin.

use crate::equation::{solve_quadratic, Roots};
use crate::error::TransportResult;
use crate::float_cmp::{is_equal, is_zero, Eps};
use crate::optics::{fresnel, FresnelSplit};
use crate::vec3::Vector;
use crate::F;

/// Planes ignore rays whose direction is almost parallel to them.
const PLANE_PARALLEL_LIMIT: F = 1e-6;

/// Returns the index of the smallest value that is at least `EPS`.
/// On ties the earliest index wins.
pub fn find_index_of_minimal_non_negative(ts: &[F]) -> Option<usize> {
    let mut found: Option<(usize, F)> = None;
    for (i, &t) in ts.iter().enumerate() {
        if t.is_nan() || t < F::EPS {
            continue;
        }
        match found {
            Some((_, min)) if t >= min => {}
            _ => found = Some((i, t)),
        }
    }
    found.map(|(i, _)| i)
}

pub fn find_minimal_non_negative(ts: &[F]) -> Option<F> {
    find_index_of_minimal_non_negative(ts).map(|i| ts[i])
}

/// The nearest root in front of the ray.
fn nearest_root(roots: Roots<F>) -> Option<F> {
    match roots {
        Roots::None => None,
        // The ray runs along the surface
        Roots::Infinite => Some(0.0),
        Roots::One(t) => find_minimal_non_negative(&[t]),
        Roots::Two(t0, t1) => find_minimal_non_negative(&[t0, t1]),
    }
}

/// The root on the far side of a surface the ray starts on.
fn far_root(roots: Roots<F>) -> Option<F> {
    match roots {
        Roots::Two(t0, t1) if t0 > 0.0 && t1 > 0.0 => Some(t0.max(t1)),
        other => nearest_root(other),
    }
}

/// Infinite circular cylinder whose axis is parallel to the z axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CylinderZ {
    center: Vector<F>,
    radius2: F,
}

impl CylinderZ {
    pub fn new(center: Vector<F>, radius: F) -> CylinderZ {
        CylinderZ {
            center,
            radius2: radius * radius,
        }
    }

    pub fn center(&self) -> Vector<F> {
        self.center
    }

    pub fn radius(&self) -> F {
        self.radius2.sqrt()
    }

    pub fn radius2(&self) -> F {
        self.radius2
    }

    fn roots(&self, pos: Vector<F>, dir: Vector<F>) -> Roots<F> {
        let dx = pos.x - self.center.x;
        let dy = pos.y - self.center.y;

        let a = dir.x * dir.x + dir.y * dir.y;
        let b = 2.0 * (dir.x * dx + dir.y * dy);
        let c = dx * dx + dy * dy - self.radius2;
        solve_quadratic(a, b, c)
    }

    pub fn intersect(&self, pos: Vector<F>, dir: Vector<F>) -> Option<F> {
        nearest_root(self.roots(pos, dir))
    }

    /// Intersection for a ray that starts on this cylinder: the far root is returned
    /// instead of the degenerate one at the origin of the ray.
    pub fn intersect_curr(&self, pos: Vector<F>, dir: Vector<F>) -> Option<F> {
        far_root(self.roots(pos, dir))
    }

    pub fn perpendicular(&self, p: Vector<F>) -> Vector<F> {
        Vector::new(p.x - self.center.x, p.y - self.center.y, 0.0)
    }

    pub fn is_on_shape(&self, p: Vector<F>) -> bool {
        let dx = p.x - self.center.x;
        let dy = p.y - self.center.y;
        is_equal(dx * dx + dy * dy, self.radius2)
    }

    /// True if `p` is inside or on the cylinder.
    pub fn contains(&self, p: Vector<F>) -> bool {
        let dx = p.x - self.center.x;
        let dy = p.y - self.center.y;
        let d2 = dx * dx + dy * dy;
        d2 <= self.radius2 || is_equal(d2, self.radius2)
    }
}

/// Infinite elliptic cylinder whose axis is parallel to the z axis,
/// with semi-axes `a` (along x) and `b` (along y).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EllipticCylinderZ {
    center: Vector<F>,
    a2: F,
    b2: F,
}

impl EllipticCylinderZ {
    pub fn new(center: Vector<F>, a: F, b: F) -> EllipticCylinderZ {
        EllipticCylinderZ {
            center,
            a2: a * a,
            b2: b * b,
        }
    }

    pub fn center(&self) -> Vector<F> {
        self.center
    }

    fn roots(&self, pos: Vector<F>, dir: Vector<F>) -> Roots<F> {
        let dx = pos.x - self.center.x;
        let dy = pos.y - self.center.y;

        let a = dir.x * dir.x * self.b2 + dir.y * dir.y * self.a2;
        let b = 2.0 * (dir.x * dx * self.b2 + dir.y * dy * self.a2);
        let c = dx * dx * self.b2 + dy * dy * self.a2 - self.a2 * self.b2;
        solve_quadratic(a, b, c)
    }

    pub fn intersect(&self, pos: Vector<F>, dir: Vector<F>) -> Option<F> {
        nearest_root(self.roots(pos, dir))
    }

    pub fn intersect_curr(&self, pos: Vector<F>, dir: Vector<F>) -> Option<F> {
        far_root(self.roots(pos, dir))
    }

    pub fn perpendicular(&self, p: Vector<F>) -> Vector<F> {
        Vector::new(
            (p.x - self.center.x) / self.a2,
            (p.y - self.center.y) / self.b2,
            0.0,
        )
    }

    pub fn is_on_shape(&self, p: Vector<F>) -> bool {
        let dx = p.x - self.center.x;
        let dy = p.y - self.center.y;
        is_equal(dx * dx / self.a2 + dy * dy / self.b2, 1.0)
    }
}

/// Unbounded plane. Only rays travelling along `normal` hit it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    origin: Vector<F>,
    normal: Vector<F>,
}

impl Plane {
    pub fn new(origin: Vector<F>, normal: Vector<F>) -> Plane {
        Plane {
            origin,
            normal: normal.normalized(),
        }
    }

    pub fn origin(&self) -> Vector<F> {
        self.origin
    }

    fn distance_along(&self, pos: Vector<F>, denominator: F) -> Option<F> {
        let t = (self.origin - pos).dot(&self.normal) / denominator;
        if t < F::EPS {
            return None;
        }
        Some(t)
    }

    pub fn intersect(&self, pos: Vector<F>, dir: Vector<F>) -> Option<F> {
        let denominator = self.normal.dot(&dir);
        if denominator < PLANE_PARALLEL_LIMIT {
            return None;
        }
        self.distance_along(pos, denominator)
    }

    /// Like [Plane::intersect], but hit from both sides.
    pub fn intersect_any_side(&self, pos: Vector<F>, dir: Vector<F>) -> Option<F> {
        let denominator = self.normal.dot(&dir);
        if denominator.abs() < PLANE_PARALLEL_LIMIT {
            return None;
        }
        self.distance_along(pos, denominator)
    }

    pub fn perpendicular(&self, _p: Vector<F>) -> Vector<F> {
        self.normal
    }

    pub fn is_on_shape(&self, p: Vector<F>) -> bool {
        is_zero((p - self.origin).dot(&self.normal))
    }

    /// True if `p` lies on the side the normal points away from, or on the plane.
    pub fn is_behind(&self, p: Vector<F>) -> bool {
        let d = (p - self.origin).dot(&self.normal);
        d <= 0.0 || is_zero(d)
    }
}

/// Disk lying in a plane, centered at the plane origin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Disk {
    plane: Plane,
    radius2: F,
}

impl Disk {
    pub fn new(origin: Vector<F>, normal: Vector<F>, radius: F) -> Disk {
        Disk {
            plane: Plane::new(origin, normal),
            radius2: radius * radius,
        }
    }

    fn bound(&self, pos: Vector<F>, dir: Vector<F>, t: Option<F>) -> Option<F> {
        let t = t?;
        let point_on_plane = pos + dir * t;
        if point_on_plane.distance_sq(&self.plane.origin) > self.radius2 {
            return None;
        }
        Some(t)
    }

    pub fn intersect(&self, pos: Vector<F>, dir: Vector<F>) -> Option<F> {
        self.bound(pos, dir, self.plane.intersect(pos, dir))
    }

    pub fn intersect_any_side(&self, pos: Vector<F>, dir: Vector<F>) -> Option<F> {
        self.bound(pos, dir, self.plane.intersect_any_side(pos, dir))
    }

    pub fn perpendicular(&self, p: Vector<F>) -> Vector<F> {
        self.plane.perpendicular(p)
    }

    pub fn is_on_shape(&self, p: Vector<F>) -> bool {
        self.plane.is_on_shape(p) && p.distance_sq(&self.plane.origin) <= self.radius2
    }

    /// Half-space test bounded by the disk rim: `p` is behind the disk plane and
    /// its projection onto the plane falls inside the disk.
    pub fn is_behind(&self, p: Vector<F>) -> bool {
        if !self.plane.is_behind(p) {
            return false;
        }
        let n = self.plane.normal;
        let offset = p - self.plane.origin;
        let projected = offset - n * offset.dot(&n);
        projected.mag_sq() <= self.radius2
    }
}

/// Finite cylinder of the given height standing on `center`, closed by two disks.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CappedCylinderZ {
    side: CylinderZ,
    height: F,
    bottom: Disk,
    top: Disk,
}

impl CappedCylinderZ {
    pub fn new(center: Vector<F>, radius: F, height: F) -> CappedCylinderZ {
        let unit_z = Vector::new(0.0, 0.0, 1.0);
        CappedCylinderZ {
            side: CylinderZ::new(center, radius),
            height,
            bottom: Disk::new(center, -unit_z, radius),
            top: Disk::new(center + unit_z * height, unit_z, radius),
        }
    }

    fn is_inside_by_z(&self, z: F) -> bool {
        let z0 = self.side.center.z;
        z0 <= z && z <= z0 + self.height
    }

    fn is_on_side(&self, p: Vector<F>) -> bool {
        self.side.is_on_shape(p) && self.is_inside_by_z(p.z)
    }

    fn side_hit(&self, pos: Vector<F>, dir: Vector<F>, t: Option<F>) -> F {
        match t {
            Some(t) if self.is_inside_by_z(pos.z + dir.z * t) => t,
            _ => -1.0,
        }
    }

    pub fn intersect(&self, pos: Vector<F>, dir: Vector<F>) -> Option<F> {
        let ts = match self.side.roots(pos, dir) {
            Roots::Two(t0, t1) => [
                self.side_hit(pos, dir, Some(t0)),
                self.side_hit(pos, dir, Some(t1)),
            ],
            Roots::One(t) => [self.side_hit(pos, dir, Some(t)), -1.0],
            Roots::None | Roots::Infinite => [-1.0, -1.0],
        };
        let caps = [
            self.bottom.intersect_any_side(pos, dir).unwrap_or(-1.0),
            self.top.intersect_any_side(pos, dir).unwrap_or(-1.0),
        ];
        find_minimal_non_negative(&[ts[0], ts[1], caps[0], caps[1]])
    }

    pub fn perpendicular(&self, p: Vector<F>) -> Vector<F> {
        if self.bottom.is_on_shape(p) {
            return self.bottom.perpendicular(p);
        }
        if self.top.is_on_shape(p) {
            return self.top.perpendicular(p);
        }
        debug_assert!(self.is_on_side(p));
        self.side.perpendicular(p)
    }

    pub fn is_on_shape(&self, p: Vector<F>) -> bool {
        self.bottom.is_on_shape(p) || self.top.is_on_shape(p) || self.is_on_side(p)
    }

    pub fn contains(&self, p: Vector<F>) -> bool {
        self.side.contains(p) && self.bottom.is_behind(p) && self.top.is_behind(p)
    }
}

/// The closed set of surfaces rays can be traced against.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Shape {
    CylinderZ(CylinderZ),
    EllipticCylinderZ(EllipticCylinderZ),
    CappedCylinderZ(CappedCylinderZ),
    Plane(Plane),
    Disk(Disk),
}

impl Shape {
    pub fn intersect(&self, pos: Vector<F>, dir: Vector<F>) -> Option<F> {
        match self {
            Shape::CylinderZ(s) => s.intersect(pos, dir),
            Shape::EllipticCylinderZ(s) => s.intersect(pos, dir),
            Shape::CappedCylinderZ(s) => s.intersect(pos, dir),
            Shape::Plane(s) => s.intersect(pos, dir),
            Shape::Disk(s) => s.intersect(pos, dir),
        }
    }

    /// Intersection for a ray starting on the shape. Flat and capped shapes have
    /// no degenerate root to skip, so this is the same as [Shape::intersect] for them.
    pub fn intersect_curr(&self, pos: Vector<F>, dir: Vector<F>) -> Option<F> {
        match self {
            Shape::CylinderZ(s) => s.intersect_curr(pos, dir),
            Shape::EllipticCylinderZ(s) => s.intersect_curr(pos, dir),
            _ => self.intersect(pos, dir),
        }
    }

    /// Outward gradient of the surface at `p`, not normalized.
    pub fn perpendicular(&self, p: Vector<F>) -> Vector<F> {
        match self {
            Shape::CylinderZ(s) => s.perpendicular(p),
            Shape::EllipticCylinderZ(s) => s.perpendicular(p),
            Shape::CappedCylinderZ(s) => s.perpendicular(p),
            Shape::Plane(s) => s.perpendicular(p),
            Shape::Disk(s) => s.perpendicular(p),
        }
    }

    pub fn normal(&self, p: Vector<F>) -> Vector<F> {
        self.perpendicular(p).normalized()
    }

    pub fn is_on_shape(&self, p: Vector<F>) -> bool {
        match self {
            Shape::CylinderZ(s) => s.is_on_shape(p),
            Shape::EllipticCylinderZ(s) => s.is_on_shape(p),
            Shape::CappedCylinderZ(s) => s.is_on_shape(p),
            Shape::Plane(s) => s.is_on_shape(p),
            Shape::Disk(s) => s.is_on_shape(p),
        }
    }

    /// Splits a ray hitting the shape at `pos` into reflected and refracted parts.
    /// `outward` tells whether the ray leaves the shape (along the outward normal)
    /// or enters it.
    pub fn fresnel_at(
        &self,
        pos: Vector<F>,
        dir: Vector<F>,
        eta_i: F,
        eta_t: F,
        mirror: F,
        outward: bool,
    ) -> TransportResult<FresnelSplit> {
        let n = self.normal(pos);
        let n = if outward { n } else { -n };
        fresnel(dir, n, eta_i, eta_t, mirror)
    }
}

impl From<CylinderZ> for Shape {
    fn from(s: CylinderZ) -> Shape {
        Shape::CylinderZ(s)
    }
}

impl From<EllipticCylinderZ> for Shape {
    fn from(s: EllipticCylinderZ) -> Shape {
        Shape::EllipticCylinderZ(s)
    }
}

impl From<CappedCylinderZ> for Shape {
    fn from(s: CappedCylinderZ) -> Shape {
        Shape::CappedCylinderZ(s)
    }
}

impl From<Plane> for Shape {
    fn from(s: Plane) -> Shape {
        Shape::Plane(s)
    }
}

impl From<Disk> for Shape {
    fn from(s: Disk) -> Shape {
        Shape::Disk(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type V = Vector<F>;

    fn origin() -> V {
        V::new(0.0, 0.0, 0.0)
    }

    #[test]
    fn cylinder_intersect_x() {
        let cylinder = CylinderZ::new(origin(), 2.0);
        let t = cylinder.intersect(V::new(-10.0, 0.0, 0.0), V::new(1.0, 0.0, 0.0));
        assert_eq!(t, Some(8.0));
    }

    #[test]
    fn cylinder_intersect_y() {
        let cylinder = CylinderZ::new(origin(), 2.0);
        let t = cylinder.intersect(V::new(0.0, -12.0, 0.0), V::new(0.0, 1.0, 0.0));
        assert_eq!(t, Some(10.0));
    }

    #[test]
    fn cylinder_parallel_to_axis() {
        let cylinder = CylinderZ::new(origin(), 2.0);
        let t = cylinder.intersect(V::new(0.0, 0.0, -14.0), V::new(0.0, 0.0, 1.0));
        assert_eq!(t, None);
    }

    #[test]
    fn cylinder_ray_along_side() {
        let cylinder = CylinderZ::new(origin(), 2.0);
        let t = cylinder.intersect(V::new(2.0, 0.0, -16.0), V::new(0.0, 0.0, 1.0));
        assert_eq!(t, Some(0.0));
    }

    #[test]
    fn cylinder_behind_the_ray() {
        let cylinder = CylinderZ::new(origin(), 2.0);
        let t = cylinder.intersect(V::new(-10.0, 0.0, 0.0), V::new(-1.0, 0.0, 0.0));
        assert_eq!(t, None);
    }

    #[test]
    fn cylinder_intersect_curr_returns_far_side() {
        let cylinder = CylinderZ::new(origin(), 2.0);
        let pos = V::new(2.0, 0.0, 0.0);
        let t = cylinder.intersect_curr(pos, V::new(-1.0, 0.0, 0.0));
        assert!((t.unwrap() - 4.0).abs() < 1e-12);
        // Leaving the cylinder there is nothing left to hit
        assert_eq!(cylinder.intersect_curr(pos, V::new(1.0, 0.0, 0.0)), None);
        // Plain intersect skips the origin root as well
        let t = cylinder.intersect(pos, V::new(-1.0, 0.0, 0.0));
        assert!((t.unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn intersection_symmetry() {
        let cylinder = Shape::from(CylinderZ::new(V::new(0.5, -0.25, 0.0), 1.5));
        let pos = V::new(-4.0, 1.0, 3.0);
        let dir = V::new(1.0, -0.2, 0.3).normalized();
        let t_in = cylinder.intersect(pos, dir).unwrap();
        let entry = pos + dir * t_in;
        let t_out = cylinder.intersect_curr(entry, dir).unwrap();
        let exit = entry + dir * t_out;
        // Coming back from the exit point finds the entry point again
        let t_back = cylinder.intersect_curr(exit, -dir).unwrap();
        let back = exit - dir * t_back;
        assert!(back.approx_eq(&entry, 1e-9));
        assert!(cylinder.is_on_shape(entry));
        assert!(cylinder.is_on_shape(exit));
    }

    #[test]
    fn cylinder_normal_points_outward() {
        let cylinder = Shape::from(CylinderZ::new(V::new(1.0, 1.0, 0.0), 1.0));
        let n = cylinder.normal(V::new(1.0, 2.0, 5.0));
        assert!(n.approx_eq(&V::new(0.0, 1.0, 0.0), 1e-12));
    }

    #[test]
    fn elliptic_cylinder() {
        let ellipse = EllipticCylinderZ::new(origin(), 3.0, 1.0);
        let t = ellipse.intersect(V::new(-10.0, 0.0, 0.0), V::new(1.0, 0.0, 0.0));
        assert_eq!(t, Some(7.0));
        let t = ellipse.intersect(V::new(0.0, -10.0, 0.0), V::new(0.0, 1.0, 0.0));
        assert_eq!(t, Some(9.0));
        let on = V::new(3.0, 0.0, 0.0);
        assert!(ellipse.is_on_shape(on));
        let t = ellipse.intersect_curr(on, V::new(-1.0, 0.0, 0.0)).unwrap();
        assert!((t - 6.0).abs() < 1e-12);
        let n = Shape::from(ellipse).normal(V::new(0.0, 1.0, 0.0));
        assert!(n.approx_eq(&V::new(0.0, 1.0, 0.0), 1e-12));
    }

    #[test]
    fn plane_is_one_sided() {
        let plane = Plane::new(V::new(0.0, 0.0, 1.0), V::new(0.0, 0.0, 1.0));
        let up = V::new(0.0, 0.0, 1.0);
        assert_eq!(plane.intersect(origin(), up), Some(1.0));
        assert_eq!(plane.intersect(V::new(0.0, 0.0, 3.0), -up), None);
        assert_eq!(plane.intersect_any_side(V::new(0.0, 0.0, 3.0), -up), Some(2.0));
        assert_eq!(plane.intersect(origin(), V::new(1.0, 0.0, 0.0)), None);
        assert!(plane.is_behind(origin()));
        assert!(!plane.is_behind(V::new(0.0, 0.0, 2.0)));
    }

    #[test]
    fn disk_is_bounded() {
        let disk = Disk::new(V::new(0.0, 0.0, 1.0), V::new(0.0, 0.0, 1.0), 1.0);
        let up = V::new(0.0, 0.0, 1.0);
        assert_eq!(disk.intersect(V::new(0.5, 0.0, 0.0), up), Some(1.0));
        assert_eq!(disk.intersect(V::new(1.5, 0.0, 0.0), up), None);
        assert!(disk.is_on_shape(V::new(0.0, 0.5, 1.0)));
        assert!(!disk.is_on_shape(V::new(0.0, 1.5, 1.0)));
        assert!(disk.is_behind(V::new(0.2, 0.2, -4.0)));
        assert!(!disk.is_behind(V::new(2.0, 0.0, -4.0)));
    }

    #[test]
    fn capped_cylinder() {
        let capped = CappedCylinderZ::new(origin(), 1.0, 2.0);
        // Through the side
        let t = capped.intersect(V::new(-5.0, 0.0, 1.0), V::new(1.0, 0.0, 0.0));
        assert_eq!(t, Some(4.0));
        // Above the top the side does not count, the top cap does
        let t = capped.intersect(V::new(0.0, 0.0, 5.0), V::new(0.0, 0.0, -1.0));
        assert_eq!(t, Some(3.0));
        // From inside towards the bottom
        let t = capped.intersect(V::new(0.0, 0.0, 1.5), V::new(0.0, 0.0, -1.0));
        assert_eq!(t, Some(1.5));
        // Passing over the top
        let t = capped.intersect(V::new(-5.0, 0.0, 3.0), V::new(1.0, 0.0, 0.0));
        assert_eq!(t, None);
        assert!(capped.contains(V::new(0.1, 0.1, 0.5)));
        assert!(!capped.contains(V::new(0.1, 0.1, 2.5)));
        let shape = Shape::from(capped);
        assert!(shape
            .normal(V::new(0.0, 0.0, 2.0))
            .approx_eq(&V::new(0.0, 0.0, 1.0), 1e-12));
        assert!(shape
            .normal(V::new(1.0, 0.0, 1.0))
            .approx_eq(&V::new(1.0, 0.0, 0.0), 1e-12));
    }

    #[test]
    fn minimal_non_negative_prefers_first_on_ties() {
        assert_eq!(find_index_of_minimal_non_negative(&[-1.0, 2.0, 2.0]), Some(1));
        assert_eq!(find_index_of_minimal_non_negative(&[3.0, 2.0, 1e-13]), Some(1));
        assert_eq!(find_index_of_minimal_non_negative(&[-1.0, -2.0]), None);
        assert_eq!(find_minimal_non_negative(&[0.5, 0.25, 4.0]), Some(0.25));
    }

    #[test]
    fn minimal_non_negative_skips_nan() {
        assert_eq!(find_index_of_minimal_non_negative(&[F::NAN, 2.0, -1.0]), Some(1));
        assert_eq!(find_index_of_minimal_non_negative(&[1.0, F::NAN]), Some(0));
        assert_eq!(find_index_of_minimal_non_negative(&[F::NAN, F::NAN]), None);
    }
}
