//! Propagation of a single ray through one [LayerModel].

use tracing::{trace, warn};

use crate::error::{TransportError, TransportResult};
use crate::layer::{LayerKind, LayerModel};
use crate::shape::find_index_of_minimal_non_negative;
use crate::vec3::Vector;
use crate::F;

/// Upper bound of boundary crossings of one ray, far above what a converging ray needs.
pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

/// A ray entering a layer model.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RayState {
    pub pos: Vector<F>,
    /// Unit direction
    pub dir: Vector<F>,
    pub intensity: F,
    /// The ray is traced until its intensity drops to this floor.
    pub intensity_end: F,
    /// The segment being traversed belongs to the shell the ray has just left.
    pub use_prev: bool,
}

/// Everything one [Worker::solve_dir] call deposited or let through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerResult {
    /// Absorbed intensity per shell
    pub absorbed: Vec<F>,
    /// Transmitted through the outer boundary but below the floor
    pub absorbed_at_the_border: F,
    /// Rays transmitted through a boundary with intensity above the floor
    pub released_rays: Vec<RayState>,
    /// Number of boundary crossings
    pub steps: usize,
    /// The step budget ran out before the ray fell below its floor
    pub steps_exhausted: bool,
}

impl WorkerResult {
    /// Total intensity that left the ray: absorbed, deposited at the border or released.
    pub fn total(&self) -> F {
        self.absorbed.iter().sum::<F>()
            + self.absorbed_at_the_border
            + self.released_rays.iter().map(|r| r.intensity).sum::<F>()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Candidate {
    Inner,
    Outer,
    Current,
}

const CANDIDATES: [Candidate; 3] = [Candidate::Inner, Candidate::Outer, Candidate::Current];

/// Walks a ray from ring to ring of a layer model.
///
/// `current` is the ring the ray stands on. A segment between two rings belongs
/// to `prev` when `use_prev` is set and to `current` otherwise.
pub struct Worker<'a> {
    model: &'a LayerModel,
    max_steps: usize,
    pos: Vector<F>,
    dir: Vector<F>,
    current: usize,
    prev: usize,
    use_prev: bool,
}

impl<'a> Worker<'a> {
    pub fn new(model: &'a LayerModel) -> Worker<'a> {
        Worker::with_max_steps(model, DEFAULT_MAX_STEPS)
    }

    pub fn with_max_steps(model: &'a LayerModel, max_steps: usize) -> Worker<'a> {
        Worker {
            model,
            max_steps,
            pos: Vector::default(),
            dir: Vector::default(),
            current: 0,
            prev: 0,
            use_prev: false,
        }
    }

    fn candidate_t(&self, candidate: Candidate) -> Option<F> {
        match candidate {
            Candidate::Inner => {
                let inner = self.current.checked_sub(1)?;
                self.model.shell(inner).boundary.intersect(self.pos, self.dir)
            }
            Candidate::Outer => {
                if self.current + 1 >= self.model.len() {
                    return None;
                }
                self.model
                    .shell(self.current + 1)
                    .boundary
                    .intersect(self.pos, self.dir)
            }
            Candidate::Current => {
                if !self.use_prev {
                    return None;
                }
                self.model
                    .shell(self.current)
                    .boundary
                    .intersect_curr(self.pos, self.dir)
            }
        }
    }

    /// Moves the ray to the nearest ring and returns the shell of the traversed segment
    /// and its length.
    fn intersect(&mut self) -> TransportResult<(usize, F)> {
        let ts = CANDIDATES.map(|c| self.candidate_t(c).unwrap_or(-1.0));
        let idx = find_index_of_minimal_non_negative(&ts).ok_or_else(|| {
            TransportError::geometry(format!(
                "no ring ahead of the ray at {} going {} (ring {}, use_prev {})",
                self.pos, self.dir, self.current, self.use_prev
            ))
        })?;

        let t = ts[idx];
        self.pos += self.dir * t;
        self.prev = self.current;

        match CANDIDATES[idx] {
            Candidate::Inner => {
                self.current -= 1;
                self.use_prev = true;
            }
            Candidate::Outer => {
                self.current += 1;
                self.use_prev = false;
            }
            Candidate::Current => self.use_prev = false,
        }
        trace!(
            "hit {:?} at {}, ring {} -> {}",
            CANDIDATES[idx],
            self.pos,
            self.prev,
            self.current
        );

        let shell = if self.use_prev { self.prev } else { self.current };
        Ok((shell, t))
    }

    /// Boundary the ray has to be split at: the outer ring when leaving it, and for
    /// hollow models the inner ring when arriving from outside.
    fn boundary_crossing(&self) -> Option<bool> {
        if self.current == self.model.border_idx() {
            return Some(true);
        }
        if self.model.kind() == LayerKind::Hollow && self.current == 0 {
            return Some(false);
        }
        None
    }

    /// Traces a ray entering the model on its entry ring until the intensity drops
    /// to `state.intensity_end`, then deposits the remainder in the shell the ray
    /// crosses next.
    pub fn solve_dir(&mut self, state: RayState) -> TransportResult<WorkerResult> {
        let model = self.model;
        let mut result = WorkerResult {
            absorbed: vec![0.0; model.len()],
            ..Default::default()
        };

        self.pos = state.pos;
        self.dir = state.dir;
        self.current = model.entry_shell();
        self.prev = self.current;
        self.use_prev = state.use_prev;
        let mut intensity = state.intensity;
        let mut last_shell = model.absorbing_entry_shell();

        while intensity > state.intensity_end {
            if result.steps >= self.max_steps {
                warn!(
                    steps = result.steps,
                    intensity, "ray did not converge, depositing the remainder"
                );
                result.steps_exhausted = true;
                result.absorbed[last_shell] += intensity;
                return Ok(result);
            }

            let (shell, dr) = self.intersect()?;
            result.steps += 1;
            last_shell = shell;

            let before = intensity;
            intensity *= (-model.shell(shell).attenuation * dr).exp();
            result.absorbed[shell] += before - intensity;

            let outward = match self.boundary_crossing() {
                Some(outward) => outward,
                None => continue,
            };

            let (eta_t, mirror) = model.boundary_optics(outward);
            let split = model.shell(self.current).boundary.fresnel_at(
                self.pos,
                self.dir,
                model.refractive_index(),
                eta_t,
                mirror,
                outward,
            )?;

            if let Some(refracted) = split.refracted {
                if split.t > 0.0 {
                    let transmitted = intensity * split.t;
                    if transmitted > state.intensity_end {
                        result.released_rays.push(RayState {
                            pos: self.pos,
                            dir: refracted,
                            intensity: transmitted,
                            intensity_end: state.intensity_end,
                            use_prev: !outward,
                        });
                    } else if outward {
                        result.absorbed_at_the_border += transmitted;
                    } else {
                        result.absorbed[0] += transmitted;
                    }
                }
            }

            if split.r <= 0.0 {
                return Err(TransportError::geometry(format!(
                    "zero reflectance at {} on ring {}",
                    self.pos, self.current
                )));
            }
            self.dir = split.reflected;
            intensity *= split.r;
            self.use_prev = outward;
        }

        let (shell, _) = self.intersect()?;
        result.absorbed[shell] += intensity;
        Ok(result)
    }

    /// Radiance arriving at `initial_pos` on the outer boundary along `dir`, weighted
    /// for a Fibonacci sphere of `sample_count` points restricted to `dir.x > 0`.
    ///
    /// The ray is integrated from where it enters the model to `initial_pos`,
    /// gathering the emission of every shell on the way. Only solid models are
    /// supported.
    pub fn calculate_intensity(
        &mut self,
        initial_pos: Vector<F>,
        dir: Vector<F>,
        sample_count: usize,
    ) -> TransportResult<F> {
        let model = self.model;
        if model.kind() != LayerKind::Solid {
            return Err(TransportError::geometry(
                "incident intensity is only defined for solid models",
            ));
        }

        let border_idx = model.border_idx();
        let border = &model.shell(border_idx).boundary;
        let t = border.intersect_curr(initial_pos, -dir).ok_or_else(|| {
            TransportError::geometry(format!(
                "{} going {} does not cross the model",
                initial_pos, dir
            ))
        })?;

        self.pos = initial_pos - dir * t;
        self.dir = dir;
        self.current = border_idx;
        self.prev = border_idx;
        self.use_prev = true;

        let mut intensity: F = 0.0;
        for _ in 0..self.max_steps {
            let (shell, dr) = self.intersect()?;
            let shell = model.shell(shell);
            let transmittance = (-shell.attenuation * dr).exp();
            intensity = intensity * transmittance + shell.intensity * (1.0 - transmittance);

            if self.current == border_idx {
                let weight = 4.0 * std::f64::consts::PI / sample_count as F * dir.x;
                return Ok(intensity * weight);
            }
        }

        Err(TransportError::geometry(format!(
            "integration along {} did not reach the outer boundary",
            dir
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{HollowParams, SolidParams};

    type V = Vector<F>;

    fn solid(steps: usize, k: F, mirror: F) -> LayerModel {
        LayerModel::solid(
            SolidParams {
                radius: 1.0,
                steps,
                refractive_index: 1.0,
                refractive_index_external: 1.5,
                mirror,
                ..Default::default()
            },
            |z| z,
            |_| 1.0,
            move |_| k,
        )
        .unwrap()
    }

    fn inward(dir: V) -> RayState {
        RayState {
            pos: V::new(1.0, 0.0, 0.0),
            dir: dir.normalized(),
            intensity: 1.0,
            intensity_end: 1e-6,
            use_prev: true,
        }
    }

    #[test]
    fn straight_through_the_center() {
        let model = solid(4, 0.5, 0.0);
        let mut worker = Worker::new(&model);
        let result = worker.solve_dir(inward(V::new(-1.0, 0.0, 0.0))).unwrap();

        // The first chord crosses the outer shell twice
        let first_segment = 1.0 - (-0.5_f64 * 0.25).exp();
        assert!(result.absorbed[3] > first_segment);
        assert!((result.total() - 1.0).abs() < 1e-12);
        assert!(!result.steps_exhausted);
        // Normal incidence on the far side, most of the ray leaves straight on
        assert!(!result.released_rays.is_empty());
        assert!(result.released_rays.iter().all(|r| !r.use_prev));
        let first = result.released_rays[0];
        assert!(first.dir.approx_eq(&V::new(-1.0, 0.0, 0.0), 1e-12));
        assert!(first.pos.approx_eq(&V::new(-1.0, 0.0, 0.0), 1e-12));
    }

    #[test]
    fn conserves_energy_for_oblique_rays() {
        let model = solid(10, 1.3, 0.0);
        for i in 1..20 {
            let angle = i as F * 0.075;
            let dir = V::new(-angle.cos(), angle.sin(), 0.3);
            let mut worker = Worker::new(&model);
            let result = worker.solve_dir(inward(dir)).unwrap();
            assert!(
                (result.total() - 1.0).abs() < 1e-12,
                "direction {} lost {}",
                dir,
                1.0 - result.total()
            );
            assert!(result.absorbed.iter().all(|&a| a >= 0.0));
        }
    }

    #[test]
    fn perfect_mirror_keeps_everything_inside() {
        // Transparent outer shell, absorbing core
        let model = LayerModel::solid(
            SolidParams {
                radius: 1.0,
                steps: 2,
                mirror: 1.0,
                ..Default::default()
            },
            |z| z,
            |_| 1.0,
            |z| if z < 0.5 { 2.0 } else { 0.0 },
        )
        .unwrap();
        assert_eq!(model.shell(1).attenuation, 0.0);

        let mut worker = Worker::new(&model);
        let result = worker
            .solve_dir(inward(V::new(-1.0, 0.2, 0.1)))
            .unwrap();
        assert!(result.released_rays.is_empty());
        assert_eq!(result.absorbed_at_the_border, 0.0);
        assert!((result.absorbed[0] + result.absorbed[1] - 1.0).abs() < 1e-12);
        assert!(result.absorbed[1] <= 1e-6);
    }

    #[test]
    fn intensity_never_increases_along_a_ray() {
        let model = solid(6, 0.8, 0.0);
        let mut worker = Worker::new(&model);
        worker.pos = V::new(1.0, 0.0, 0.0);
        worker.dir = V::new(-1.0, 0.4, 0.0).normalized();
        worker.current = model.border_idx();
        worker.prev = worker.current;
        worker.use_prev = true;

        let mut intensity = 1.0;
        for _ in 0..200 {
            let (shell, dr) = worker.intersect().unwrap();
            let next = intensity * (-model.shell(shell).attenuation * dr).exp();
            assert!(next <= intensity);
            assert!(dr >= 0.0);
            intensity = next;
            if worker.current == model.border_idx() {
                worker.dir = model
                    .shell(worker.current)
                    .boundary
                    .fresnel_at(worker.pos, worker.dir, 1.0, 1.5, 0.0, true)
                    .unwrap()
                    .reflected;
                worker.use_prev = true;
            }
        }
        assert!(intensity < 1.0);
    }

    #[test]
    fn step_budget_deposits_the_remainder() {
        let model = solid(4, 0.0, 1.0);
        let mut worker = Worker::with_max_steps(&model, 50);
        let result = worker.solve_dir(inward(V::new(-1.0, 0.3, 0.0))).unwrap();
        assert!(result.steps_exhausted);
        assert_eq!(result.steps, 50);
        assert!((result.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn hollow_model_releases_both_ways() {
        let model = LayerModel::hollow(
            HollowParams {
                radius_min: 1.0,
                radius_max: 1.2,
                steps: 4,
                refractive_index: 1.4585,
                refractive_index_internal: 1.0,
                refractive_index_external: 1.0,
                mirror_internal: 0.0,
                mirror_external: 0.9,
                ..Default::default()
            },
            |_| 1000.0,
            |_| 1.0,
            |_| 0.3,
        )
        .unwrap();

        let mut worker = Worker::new(&model);
        let result = worker
            .solve_dir(RayState {
                pos: V::new(1.0, 0.0, 0.0),
                dir: V::new(1.0, 0.5, 0.2).normalized(),
                intensity: 1.0,
                intensity_end: 1e-6,
                use_prev: false,
            })
            .unwrap();

        assert!((result.total() - 1.0).abs() < 1e-12);
        assert!(result.released_rays.iter().any(|r| r.use_prev));
        assert!(result.released_rays.iter().any(|r| !r.use_prev));
        for ray in &result.released_rays {
            let radius = (ray.pos.x * ray.pos.x + ray.pos.y * ray.pos.y).sqrt();
            if ray.use_prev {
                assert!((radius - 1.0).abs() < 1e-9);
            } else {
                assert!((radius - 1.2).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn incident_intensity_of_uniform_cylinder() {
        let k = 2.0;
        let model = solid(8, k, 0.0);
        let mut worker = Worker::new(&model);
        let dir = V::new(1.0, 0.0, 0.0);
        let i = worker
            .calculate_intensity(V::new(1.0, 0.0, 0.0), dir, 100)
            .unwrap();
        // A uniform slab of thickness 2 emitting 1
        let expected = (1.0 - (-k * 2.0).exp()) * 4.0 * std::f64::consts::PI / 100.0;
        assert!((i - expected).abs() < 1e-12, "{} != {}", i, expected);

        // Grazing rays see a thinner slab
        let oblique = V::new(0.6, 0.8, 0.0);
        let j = worker
            .calculate_intensity(V::new(1.0, 0.0, 0.0), oblique, 100)
            .unwrap();
        assert!(j > 0.0);
        assert!(j / 0.6 < i);
    }

    #[test]
    fn incident_intensity_needs_a_solid_model() {
        let model = LayerModel::hollow(HollowParams::default(), |_| 1.0, |_| 1.0, |_| 1.0).unwrap();
        let mut worker = Worker::new(&model);
        let result = worker.calculate_intensity(V::new(0.45, 0.0, 0.0), V::new(1.0, 0.0, 0.0), 100);
        assert!(matches!(
            result,
            Err(TransportError::GeometryInconsistency { .. })
        ));
    }
}
