use num::traits::FloatConst;

use crate::error::{TransportError, TransportResult};
use crate::rand_gen::RandGen;
use crate::vec3::Vector;
use crate::F;

/// Smallest lattice the offset table is tuned for.
pub const MIN_POINTS: usize = 21;

/// Offset of the first and last lattice rows from the poles, tuned per point count
/// to minimize the largest gap between neighbours.
fn optimal_epsilon(n: usize) -> F {
    match n {
        n if n >= 600_000 => 214.0,
        n if n >= 400_000 => 75.0,
        n if n >= 11_000 => 27.0,
        n if n >= 890 => 10.0,
        n if n >= 177 => 3.33,
        n if n >= 24 => 1.33,
        _ => 0.33,
    }
}

/// `n` quasi-uniform unit vectors on the sphere, a Fibonacci lattice.
pub fn sphere(n: usize) -> TransportResult<Vec<Vector<F>>> {
    if n < MIN_POINTS {
        return Err(TransportError::invalid(format!(
            "a Fibonacci sphere needs at least {} points, got {}",
            MIN_POINTS, n
        )));
    }

    let golden_ratio = (1.0 + (5.0 as F).sqrt()) / 2.0;
    let epsilon = optimal_epsilon(n);
    let nn = n as F;

    Ok((0..n)
        .map(|i| {
            let ii = i as F;
            let theta = 2.0 * F::PI() * ii / golden_ratio;
            let phi = (1.0 - 2.0 * (ii + epsilon) / (nn - 1.0 + 2.0 * epsilon)).acos();
            Vector::new(theta.cos() * phi.sin(), theta.sin() * phi.sin(), phi.cos())
        })
        .collect())
}

/// The points of an `n` point Fibonacci sphere with `x > 0`.
///
/// With a positive `jitter` every direction is turned by a random angle of at
/// most `jitter` radians. A turned direction that would leave the hemisphere is
/// kept unturned.
pub fn hemisphere(n: usize, jitter: F) -> TransportResult<Vec<Vector<F>>> {
    let mut dirs = sphere(n)?;
    dirs.retain(|d| d.x > 0.0);

    if jitter > 0.0 {
        let cos_alpha = jitter.min(F::PI()).cos();
        for dir in dirs.iter_mut() {
            let cos_theta = cos_alpha + (1.0 - cos_alpha) * F::rand();
            let mut turned = *dir;
            turned.rotate_random_by_angle_cosine(cos_theta);
            if turned.x > 0.0 {
                *dir = turned;
            }
        }
    }
    Ok(dirs)
}
