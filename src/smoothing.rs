//! Corrections of the edge shells, where the discretization tends to produce
//! outliers. These are empirical and do not conserve energy.

use crate::F;

/// Caps the first real quartz shell by its neighbours and spreads the excess over
/// the shell, then caps the outermost shell by linear extrapolation and moves that
/// excess to the mirror. Entry 0 is the inner boundary ring and is left alone.
/// Needs more than two quartz shells, otherwise nothing happens.
pub fn smooth_quartz(absorbed_quartz: &mut [F], absorbed_mirror: &mut F) {
    let n = absorbed_quartz.len().saturating_sub(1);
    if n <= 2 {
        return;
    }
    let q = absorbed_quartz;

    let first = q[2] + (q[2] - q[3]).abs();
    let excess = q[1] - first;
    if excess > 0.0 {
        q[1] = first;
        let sum: F = q[1..].iter().sum();
        let scale = excess / sum + 1.0;
        q[1..].iter_mut().for_each(|a| *a *= scale);
    }

    let last = 2.0 * q[n - 1] - q[n - 2];
    let excess = q[n] - last;
    if excess > 0.0 {
        q[n] = last;
        *absorbed_mirror += excess;
    }
}

/// Caps the outermost plasma shell by linear extrapolation from the two shells
/// below it and rescales all shells to keep their sum.
pub fn smooth_plasma(absorbed_plasma: &mut [F]) {
    let n = absorbed_plasma.len();
    if n < 3 {
        return;
    }
    let p = absorbed_plasma;

    let mut last = 2.0 * p[n - 2] - p[n - 3];
    if last < 0.0 {
        last = 0.95 * p[n - 2];
    }
    let excess = p[n - 1] - last;
    if excess > 0.0 {
        p[n - 1] = last;
        let sum: F = p.iter().sum();
        let scale = excess / sum + 1.0;
        p.iter_mut().for_each(|a| *a *= scale);
    }
}
