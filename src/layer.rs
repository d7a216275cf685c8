use crate::error::{TransportError, TransportResult};
use crate::float_cmp::is_equal;
use crate::shape::{CylinderZ, Shape};
use crate::vec3::Vector;
use crate::F;

/// One concentric ring of a [LayerModel].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Shell {
    /// Outer boundary of the ring.
    pub boundary: Shape,
    pub radius: F,
    /// Temperature at the radial midpoint of the ring
    pub temperature: F,
    /// Emitted spectral intensity
    pub intensity: F,
    /// Absorption coefficient
    pub attenuation: F,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LayerKind {
    /// A full cylinder `0 → radius`.
    Solid,
    /// An annulus `radius_min → radius_max` with a boundary ring on both sides.
    Hollow,
}

/// Parameters of a full cylinder.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SolidParams {
    pub center: Vector<F>,
    pub radius: F,
    pub steps: usize,
    pub refractive_index: F,
    pub refractive_index_external: F,
    /// Fixed reflectance of the outer boundary, 0 for a plain dielectric interface.
    pub mirror: F,
}

impl Default for SolidParams {
    fn default() -> Self {
        Self {
            center: Vector::new(0.0, 0.0, 0.0),
            radius: 0.35,
            steps: 40,
            refractive_index: 1.0,
            refractive_index_external: 1.0,
            mirror: 0.95,
        }
    }
}

/// Parameters of a cylindrical shell.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HollowParams {
    pub center: Vector<F>,
    pub radius_min: F,
    pub radius_max: F,
    pub steps: usize,
    pub refractive_index: F,
    pub refractive_index_internal: F,
    pub refractive_index_external: F,
    pub mirror_internal: F,
    pub mirror_external: F,
}

impl Default for HollowParams {
    fn default() -> Self {
        Self {
            center: Vector::new(0.0, 0.0, 0.0),
            radius_min: 0.35,
            radius_max: 0.45,
            steps: 20,
            refractive_index: 1.4585,
            refractive_index_internal: 1.0,
            refractive_index_external: 1.0,
            mirror_internal: 0.0,
            mirror_external: 0.95,
        }
    }
}

/// Concentric cylindrical rings with precomputed temperature, emission and absorption.
#[derive(Debug, Clone)]
pub struct LayerModel {
    kind: LayerKind,
    center: Vector<F>,
    shells: Vec<Shell>,
    step: F,
    radius_min: F,
    radius_max: F,
    refractive_index: F,
    refractive_index_internal: F,
    refractive_index_external: F,
    mirror_internal: F,
    mirror_external: F,
}

fn check_positive(name: &str, value: F) -> TransportResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(TransportError::invalid(format!(
            "{} must be finite and positive, got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_mirror(name: &str, value: F) -> TransportResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(TransportError::invalid(format!(
            "{} must be in [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

/// A boundary without a fixed reflectance needs an index step, otherwise nothing
/// is ever reflected there.
fn check_interface(name: &str, eta_inside: F, eta_outside: F, mirror: F) -> TransportResult<()> {
    if mirror == 0.0 && is_equal(eta_inside, eta_outside) {
        return Err(TransportError::invalid(format!(
            "{} boundary has equal refractive indices ({}) and no mirror",
            name, eta_inside
        )));
    }
    Ok(())
}

fn check_steps(steps: usize) -> TransportResult<()> {
    if steps < 2 {
        return Err(TransportError::invalid(format!(
            "at least 2 steps are needed, got {}",
            steps
        )));
    }
    Ok(())
}

fn check_center(center: Vector<F>) -> TransportResult<()> {
    if !(center.x.is_finite() && center.y.is_finite() && center.z.is_finite()) {
        return Err(TransportError::invalid(format!(
            "center {} is not finite",
            center
        )));
    }
    Ok(())
}

impl LayerModel {
    /// Builds the rings of a full cylinder: `step, 2·step, …, radius`.
    ///
    /// `temperature` receives the normalized radius `(r - step/2) / radius` of the
    /// ring midpoint, `intensity` and `attenuation` the resulting temperature.
    pub fn solid(
        params: SolidParams,
        temperature: impl Fn(F) -> F,
        intensity: impl Fn(F) -> F,
        attenuation: impl Fn(F) -> F,
    ) -> TransportResult<LayerModel> {
        check_steps(params.steps)?;
        check_center(params.center)?;
        check_positive("radius", params.radius)?;
        check_positive("refractive_index", params.refractive_index)?;
        check_positive(
            "refractive_index_external",
            params.refractive_index_external,
        )?;
        check_mirror("mirror", params.mirror)?;
        check_interface(
            "outer",
            params.refractive_index,
            params.refractive_index_external,
            params.mirror,
        )?;

        let step = params.radius / params.steps as F;
        let radii = (1..params.steps)
            .map(|i| step * i as F)
            .chain(std::iter::once(params.radius));

        let shells = build_shells(
            params.center,
            radii,
            step,
            params.radius,
            &temperature,
            &intensity,
            &attenuation,
        )?;

        Ok(LayerModel {
            kind: LayerKind::Solid,
            center: params.center,
            shells,
            step,
            radius_min: 0.0,
            radius_max: params.radius,
            refractive_index: params.refractive_index,
            refractive_index_internal: params.refractive_index,
            refractive_index_external: params.refractive_index_external,
            mirror_internal: 0.0,
            mirror_external: params.mirror,
        })
    }

    /// Builds the rings of a cylindrical shell: `radius_min, radius_min + step, …, radius_max`.
    ///
    /// Ring 0 sits on the inner boundary and carries no volume of its own.
    /// Temperatures are evaluated at `(r - step/2) / radius_min`.
    pub fn hollow(
        params: HollowParams,
        temperature: impl Fn(F) -> F,
        intensity: impl Fn(F) -> F,
        attenuation: impl Fn(F) -> F,
    ) -> TransportResult<LayerModel> {
        check_steps(params.steps)?;
        check_center(params.center)?;
        check_positive("radius_min", params.radius_min)?;
        check_positive("radius_max", params.radius_max)?;
        if params.radius_max <= params.radius_min {
            return Err(TransportError::invalid(format!(
                "radius_max ({}) must be larger than radius_min ({})",
                params.radius_max, params.radius_min
            )));
        }
        check_positive("refractive_index", params.refractive_index)?;
        check_positive(
            "refractive_index_internal",
            params.refractive_index_internal,
        )?;
        check_positive(
            "refractive_index_external",
            params.refractive_index_external,
        )?;
        check_mirror("mirror_internal", params.mirror_internal)?;
        check_mirror("mirror_external", params.mirror_external)?;
        check_interface(
            "inner",
            params.refractive_index,
            params.refractive_index_internal,
            params.mirror_internal,
        )?;
        check_interface(
            "outer",
            params.refractive_index,
            params.refractive_index_external,
            params.mirror_external,
        )?;

        let step = (params.radius_max - params.radius_min) / params.steps as F;
        let radii = std::iter::once(params.radius_min)
            .chain((1..params.steps).map(|i| params.radius_min + step * i as F))
            .chain(std::iter::once(params.radius_max));

        let shells = build_shells(
            params.center,
            radii,
            step,
            params.radius_min,
            &temperature,
            &intensity,
            &attenuation,
        )?;

        Ok(LayerModel {
            kind: LayerKind::Hollow,
            center: params.center,
            shells,
            step,
            radius_min: params.radius_min,
            radius_max: params.radius_max,
            refractive_index: params.refractive_index,
            refractive_index_internal: params.refractive_index_internal,
            refractive_index_external: params.refractive_index_external,
            mirror_internal: params.mirror_internal,
            mirror_external: params.mirror_external,
        })
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn center(&self) -> Vector<F> {
        self.center
    }

    pub fn len(&self) -> usize {
        self.shells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shells.is_empty()
    }

    /// Index of the outermost ring.
    pub fn border_idx(&self) -> usize {
        self.shells.len() - 1
    }

    /// Ring a ray entering the model starts on: the outer boundary of a solid
    /// model, the inner boundary of a hollow one.
    pub fn entry_shell(&self) -> usize {
        match self.kind {
            LayerKind::Solid => self.border_idx(),
            LayerKind::Hollow => 0,
        }
    }

    /// First shell with a volume behind the entry ring.
    pub fn absorbing_entry_shell(&self) -> usize {
        match self.kind {
            LayerKind::Solid => self.border_idx(),
            LayerKind::Hollow => 1,
        }
    }

    pub fn shell(&self, i: usize) -> &Shell {
        &self.shells[i]
    }

    pub fn shells(&self) -> &[Shell] {
        &self.shells
    }

    /// Radial width of one ring.
    pub fn step(&self) -> F {
        self.step
    }

    pub fn radius_min(&self) -> F {
        self.radius_min
    }

    pub fn radius_max(&self) -> F {
        self.radius_max
    }

    /// Radius of the middle of shell `i`. The inner ring of a hollow model has no
    /// width and reports its own radius.
    pub fn shell_mid_radius(&self, i: usize) -> F {
        match self.kind {
            LayerKind::Solid => self.step * (i as F + 0.5),
            LayerKind::Hollow if i == 0 => self.radius_min,
            LayerKind::Hollow => self.radius_min + self.step * (i as F - 0.5),
        }
    }

    pub fn refractive_index(&self) -> F {
        self.refractive_index
    }

    /// Refractive index behind the boundary and its fixed reflectance,
    /// for a ray leaving through the outer (`outward`) or the inner boundary.
    pub fn boundary_optics(&self, outward: bool) -> (F, F) {
        if outward {
            (self.refractive_index_external, self.mirror_external)
        } else {
            (self.refractive_index_internal, self.mirror_internal)
        }
    }
}

fn build_shells(
    center: Vector<F>,
    radii: impl Iterator<Item = F>,
    step: F,
    norm: F,
    temperature: &impl Fn(F) -> F,
    intensity: &impl Fn(F) -> F,
    attenuation: &impl Fn(F) -> F,
) -> TransportResult<Vec<Shell>> {
    let mut shells: Vec<Shell> = Vec::new();
    for radius in radii {
        if let Some(last) = shells.last() {
            if radius <= last.radius {
                return Err(TransportError::invalid(format!(
                    "shell radii must increase, {} follows {}",
                    radius, last.radius
                )));
            }
        }

        let t = temperature((radius - step / 2.0) / norm);
        let i = intensity(t);
        let k = attenuation(t);
        if !t.is_finite() || !i.is_finite() || !k.is_finite() {
            return Err(TransportError::invalid(format!(
                "non-finite physics at radius {}: T = {}, I = {}, k = {}",
                radius, t, i, k
            )));
        }
        if i < 0.0 || k < 0.0 {
            return Err(TransportError::invalid(format!(
                "negative emission or absorption at radius {}: I = {}, k = {}",
                radius, i, k
            )));
        }

        shells.push(Shell {
            boundary: CylinderZ::new(center, radius).into(),
            radius,
            temperature: t,
            intensity: i,
            attenuation: k,
        });
    }
    Ok(shells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: F) -> impl Fn(F) -> F {
        move |_| value
    }

    #[test]
    fn solid_rings() {
        let params = SolidParams {
            radius: 1.0,
            steps: 4,
            ..Default::default()
        };
        let model = LayerModel::solid(params, |z| z, |t| 2.0 * t, constant(0.5)).unwrap();
        assert_eq!(model.kind(), LayerKind::Solid);
        assert_eq!(model.len(), 4);
        assert_eq!(model.border_idx(), 3);
        assert_eq!(model.entry_shell(), 3);
        assert_eq!(model.step(), 0.25);

        let radii: Vec<F> = model.shells().iter().map(|s| s.radius).collect();
        assert_eq!(radii, vec![0.25, 0.5, 0.75, 1.0]);

        // Temperature sampled at the normalized ring midpoints
        assert!((model.shell(0).temperature - 0.125).abs() < 1e-15);
        assert!((model.shell(3).temperature - 0.875).abs() < 1e-15);
        assert!((model.shell(3).intensity - 1.75).abs() < 1e-15);
        assert_eq!(model.shell(2).attenuation, 0.5);
        assert!((model.shell_mid_radius(0) - 0.125).abs() < 1e-15);
        assert!((model.shell_mid_radius(3) - 0.875).abs() < 1e-15);
        assert_eq!(model.boundary_optics(true), (1.0, 0.95));
    }

    #[test]
    fn hollow_rings() {
        let params = HollowParams {
            radius_min: 1.0,
            radius_max: 1.5,
            steps: 5,
            ..Default::default()
        };
        let model = LayerModel::hollow(params, |z| z, constant(1.0), constant(0.1)).unwrap();
        assert_eq!(model.kind(), LayerKind::Hollow);
        assert_eq!(model.len(), 6);
        assert_eq!(model.entry_shell(), 0);
        assert_eq!(model.absorbing_entry_shell(), 1);
        assert_eq!(model.border_idx(), 5);

        let radii: Vec<F> = model.shells().iter().map(|s| s.radius).collect();
        for (r, expected) in radii.iter().zip([1.0, 1.1, 1.2, 1.3, 1.4, 1.5]) {
            assert!((r - expected).abs() < 1e-12);
        }

        // Normalized by the inner radius
        assert!((model.shell(1).temperature - 1.05).abs() < 1e-12);
        assert!((model.shell(0).temperature - 0.95).abs() < 1e-12);
        assert!((model.shell_mid_radius(1) - 1.05).abs() < 1e-12);
        assert_eq!(model.shell_mid_radius(0), 1.0);
        assert_eq!(model.boundary_optics(false), (1.0, 0.0));
        assert_eq!(model.boundary_optics(true), (1.0, 0.95));
    }

    #[test]
    fn rejects_bad_geometry() {
        let solid = |params: SolidParams| {
            LayerModel::solid(params, constant(1.0), constant(1.0), constant(1.0))
        };
        let bad = [
            SolidParams {
                steps: 1,
                ..Default::default()
            },
            SolidParams {
                radius: 0.0,
                ..Default::default()
            },
            SolidParams {
                radius: F::NAN,
                ..Default::default()
            },
            SolidParams {
                refractive_index: -1.0,
                ..Default::default()
            },
            SolidParams {
                mirror: 1.5,
                ..Default::default()
            },
            SolidParams {
                mirror: 0.0,
                ..Default::default()
            },
        ];
        for params in bad {
            assert!(
                matches!(solid(params), Err(TransportError::InvalidParameters(_))),
                "{:?} should be rejected",
                params
            );
        }

        let hollow = LayerModel::hollow(
            HollowParams {
                radius_min: 1.0,
                radius_max: 1.0,
                ..Default::default()
            },
            constant(1.0),
            constant(1.0),
            constant(1.0),
        );
        assert!(matches!(hollow, Err(TransportError::InvalidParameters(_))));
    }

    #[test]
    fn rejects_bad_physics() {
        let params = SolidParams::default();
        let negative = LayerModel::solid(params, constant(1.0), constant(1.0), constant(-0.1));
        assert!(matches!(negative, Err(TransportError::InvalidParameters(_))));
        let infinite = LayerModel::solid(params, constant(1.0), constant(F::INFINITY), constant(0.1));
        assert!(matches!(infinite, Err(TransportError::InvalidParameters(_))));
    }

    #[test]
    fn index_step_without_mirror_is_accepted() {
        let params = SolidParams {
            refractive_index: 1.0,
            refractive_index_external: 1.5,
            mirror: 0.0,
            ..Default::default()
        };
        assert!(LayerModel::solid(params, constant(1.0), constant(1.0), constant(1.0)).is_ok());
    }
}
