//! Physical presets of the plasma lamp model: blackbody emission, temperature
//! profiles and absorption laws.

use crate::F;

/// Planck constant, J·s
pub const PLANCK: F = 6.62607015e-34;
/// Boltzmann constant, J/K
pub const BOLTZMANN: F = 1.380649e-23;
/// Speed of light, cm/s
pub const SPEED_OF_LIGHT: F = 2.99792458e10;

pub mod refractive_index {
    use crate::F;

    pub const AIR: F = 1.0;
    pub const PLASMA: F = 1.0;
    pub const QUARTZ: F = 1.4585;
}

/// Spectral intensity of a blackbody at temperature `t` in the band `[nu, nu + d_nu]`.
pub fn planck_intensity(nu: F, d_nu: F, t: F) -> F {
    let exponent = PLANCK * nu / (BOLTZMANN * t);
    2.0 * PLANCK * nu * nu * nu * d_nu / (SPEED_OF_LIGHT * SPEED_OF_LIGHT * exponent.exp_m1())
}

/// Plasma temperature at the normalized radius `z`, from `t0` on the axis to `tw` at the wall.
pub fn plasma_temperature(z: F, t0: F, tw: F, m: F) -> F {
    t0 + (tw - t0) * z.powf(m)
}

/// Temperature inside a quartz wall of thickness `delta` around a plasma of radius `r`.
///
/// It is `tw` up to the inner surface and decays exponentially to `t1` at the
/// outer one.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuartzTemperature {
    tw: F,
    a: F,
    b: F,
}

impl QuartzTemperature {
    pub fn new(tw: F, t1: F, r: F, delta: F) -> QuartzTemperature {
        let b = r / delta * (tw / t1).ln();
        QuartzTemperature {
            tw,
            a: tw * b.exp(),
            b,
        }
    }

    /// Temperature at `z`, the radius normalized by the plasma radius.
    pub fn at(&self, z: F) -> F {
        if z <= 1.0 {
            return self.tw;
        }
        self.a * (-self.b * z).exp()
    }
}

/// Default absorption coefficient of the plasma, 1/cm.
pub fn plasma_absorption(t: F) -> F {
    0.04 * (t / 2000.0).powi(2)
}

/// Default absorption coefficient of quartz, 1/cm.
pub fn quartz_absorption(t: F) -> F {
    0.001 * (t / 300.0).powf(1.5)
}
