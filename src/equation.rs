use crate::float_cmp::{is_zero, Eps};

/// Outcome of solving a linear or quadratic equation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Roots<T> {
    /// No real solution.
    None,
    /// Exactly one solution (the equation degenerated to a linear one).
    One(T),
    /// Two real solutions, the first never larger than the second for a positive
    /// leading coefficient. A double root is reported twice.
    Two(T, T),
    /// Every value is a solution (`0·x = 0`).
    Infinite,
}

impl<T: Copy> Roots<T> {
    /// The roots as a pair, duplicating a single root.
    pub fn pair(&self) -> Option<(T, T)> {
        match *self {
            Roots::None | Roots::Infinite => None,
            Roots::One(x) => Some((x, x)),
            Roots::Two(x0, x1) => Some((x0, x1)),
        }
    }
}

/// Solves `a·x + b = 0`.
pub fn solve_linear<T: Eps>(a: T, b: T) -> Roots<T> {
    if is_zero(a) {
        if is_zero(b) {
            return Roots::Infinite;
        }
        return Roots::None;
    }
    Roots::One(-b / a)
}

/// Solves `a·x² + b·x + c = 0`.
pub fn solve_quadratic<T: Eps>(a: T, b: T, c: T) -> Roots<T> {
    if is_zero(a) {
        return solve_linear(b, c);
    }

    let two = T::one() + T::one();
    let two_a = two * a;
    let discriminant = b * b - two * two_a * c;
    if discriminant < T::zero() {
        return Roots::None;
    }

    let sqrt_d = discriminant.sqrt();
    Roots::Two((-b - sqrt_d) / two_a, (-b + sqrt_d) / two_a)
}
