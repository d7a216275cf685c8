use num::traits::{Float, FloatConst};

use crate::rand_gen::RandGen;

/// Struct for representing a 3D vector in Cartesian coordinates.
#[derive(Debug, Copy, Clone, Default)]
pub struct Vector<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Vector<T> {
    pub const fn new(x_: T, y_: T, z_: T) -> Vector<T> {
        Vector::<T> {
            x: x_,
            y: y_,
            z: z_,
        }
    }

    pub fn dot(&self, other: &Self) -> T
    where
        T: std::ops::Mul<Output = T> + std::ops::Add<Output = T> + Copy,
    {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self
    where
        T: std::ops::Mul<Output = T> + std::ops::Sub<Output = T> + Copy,
    {
        Vector::<T> {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn mag_sq(&self) -> T
    where
        T: std::ops::Mul<Output = T> + std::ops::Add<Output = T> + Copy,
    {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn mag(&self) -> T
    where
        T: Float,
    {
        self.mag_sq().sqrt()
    }

    pub fn distance_sq(&self, other: &Self) -> T
    where
        T: Float,
    {
        (*self - *other).mag_sq()
    }

    pub fn normalized(&self) -> Self
    where
        T: Float,
    {
        *self / self.mag()
    }

    /// Component-wise comparison with an absolute tolerance.
    pub fn approx_eq(&self, other: &Self, tolerance: T) -> bool
    where
        T: Float,
    {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }

    /// Rotates this unit vector to a random direction enclosing the angle
    /// `acos(cos_theta)` with the original one. The azimuth of the rotation is uniform.
    pub fn rotate_random_by_angle_cosine(&mut self, cos_theta: T)
    where
        T: RandGen + Float + FloatConst,
    {
        let one = T::one();
        let sin_theta = (one - cos_theta * cos_theta).max(T::zero()).sqrt();
        // Any axis that is not (nearly) parallel to `self` spans the plane with it
        let helper = if self.x.abs() < one - one / (one + one + one) {
            Vector::new(one, T::zero(), T::zero())
        } else {
            Vector::new(T::zero(), one, T::zero())
        };
        let u = self.cross(&helper).normalized();
        let v = self.cross(&u);
        let phi = T::rand() * (T::PI() + T::PI());
        let (sin_phi, cos_phi) = phi.sin_cos();
        *self = (*self * cos_theta + (u * cos_phi + v * sin_phi) * sin_theta).normalized();
    }
}

impl<T> std::ops::Add for Vector<T>
where
    T: std::ops::Add<Output = T>,
{
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl<T> std::ops::AddAssign for Vector<T>
where
    T: std::ops::AddAssign,
{
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl<T> std::ops::Sub for Vector<T>
where
    T: std::ops::Sub<Output = T>,
{
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl<T> std::cmp::PartialEq<Vector<T>> for Vector<T>
where
    T: std::cmp::PartialEq,
{
    fn eq(&self, other: &Vector<T>) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }
}

impl<T> std::ops::Div<T> for Vector<T>
where
    T: std::ops::Div<Output = T> + core::marker::Copy,
{
    type Output = Self;

    fn div(self, rhs: T) -> Self {
        Self {
            x: self.x / rhs,
            y: self.y / rhs,
            z: self.z / rhs,
        }
    }
}

impl<T> std::ops::Mul<T> for Vector<T>
where
    T: std::ops::Mul<Output = T> + core::marker::Copy,
{
    type Output = Self;

    fn mul(self, rhs: T) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
            z: self.z * rhs,
        }
    }
}

impl<T> std::ops::Neg for Vector<T>
where
    T: std::ops::Neg<Output = T>,
{
    type Output = Vector<T>;

    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Vector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
