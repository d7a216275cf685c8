//! Reflection, refraction and the unpolarized Fresnel split at a dielectric interface.

use crate::error::{TransportError, TransportResult};
use crate::vec3::Vector;
use crate::F;

/// Outcome of a ray hitting an interface.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FresnelSplit {
    pub reflected: Vector<F>,
    /// `None` on total internal reflection.
    pub refracted: Option<Vector<F>>,
    /// Reflectance.
    pub r: F,
    /// Transmittance, always `1 - r`.
    pub t: F,
}

/// Mirrors `dir` on the plane with the given unit normal.
pub fn reflect(dir: Vector<F>, normal: Vector<F>) -> Vector<F> {
    (dir - normal * (2.0 * dir.dot(&normal))).normalized()
}

/// `g²` of the Fresnel equations, non-positive on total internal reflection.
fn g_squared(mu: F, cos_i: F) -> F {
    1.0 - mu * mu * (1.0 - cos_i * cos_i)
}

fn refracted_dir(dir: Vector<F>, normal: Vector<F>, mu: F, cos_i: F, g: F) -> Vector<F> {
    (normal * g + (dir - normal * cos_i) * mu).normalized()
}

/// Refracts `dir` through an interface whose unit normal points into the
/// transmitting medium. Returns `None` on total internal reflection.
pub fn refract(dir: Vector<F>, normal: Vector<F>, eta_i: F, eta_t: F) -> Option<Vector<F>> {
    let mu = eta_i / eta_t;
    let cos_i = dir.dot(&normal);
    let g2 = g_squared(mu, cos_i);
    if g2 <= 0.0 {
        return None;
    }
    Some(refracted_dir(dir, normal, mu, cos_i, g2.sqrt()))
}

/// Unpolarized Fresnel reflectance for `g > 0`.
fn reflectance(mu: F, cos_i: F, g: F) -> F {
    let c = cos_i * mu;
    let mu2 = mu * mu;
    let first = (g - c) / (g + c);
    let second = (c * (g + c) - mu2) / (c * (g - c) + mu2);
    first * first * (1.0 + second * second) / 2.0
}

/// Splits a ray at an interface.
///
/// `normal` must be a unit vector oriented along the travel direction, so that
/// `dir·normal > 0`. A positive `mirror` replaces the physical reflectance by that
/// constant, the refracted direction is still computed from the indices.
pub fn fresnel(
    dir: Vector<F>,
    normal: Vector<F>,
    eta_i: F,
    eta_t: F,
    mirror: F,
) -> TransportResult<FresnelSplit> {
    let cos_i = dir.dot(&normal);
    if cos_i <= 0.0 {
        return Err(TransportError::geometry(format!(
            "ray {} does not face the interface with normal {}",
            dir, normal
        )));
    }

    let reflected = reflect(dir, normal);
    let mu = eta_i / eta_t;
    let g2 = g_squared(mu, cos_i);

    let (refracted, r) = if g2 <= 0.0 {
        (None, 1.0)
    } else {
        let g = g2.sqrt();
        let r = reflectance(mu, cos_i, g).clamp(0.0, 1.0);
        (Some(refracted_dir(dir, normal, mu, cos_i, g)), r)
    };

    let r = if mirror > 0.0 && refracted.is_some() {
        mirror
    } else {
        r
    };

    Ok(FresnelSplit {
        reflected,
        refracted,
        r,
        t: 1.0 - r,
    })
}
