/// Tolerance used for zero and equality tests of a floating point type.
pub trait Eps: num::Float {
    const EPS: Self;
}

impl Eps for f32 {
    const EPS: f32 = 1e-4;
}

impl Eps for f64 {
    const EPS: f64 = 1e-12;
}

/// Returns true if `value` lies strictly inside `(-eps, eps)`.
#[inline(always)]
pub fn is_zero_eps<T: num::Float>(value: T, eps: T) -> bool {
    value.abs() < eps
}

#[inline(always)]
pub fn is_zero<T: Eps>(value: T) -> bool {
    is_zero_eps(value, T::EPS)
}

/// Absolute comparison for small values, relative comparison for large ones.
pub fn is_equal_eps<T: num::Float>(x: T, y: T, eps: T) -> bool {
    let diff = (x - y).abs();
    if diff <= eps {
        return true;
    }
    diff < x.abs().max(y.abs()) * eps
}

#[inline(always)]
pub fn is_equal<T: Eps>(x: T, y: T) -> bool {
    is_equal_eps(x, y, T::EPS)
}
