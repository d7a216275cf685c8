//! Radiative transfer through a plasma column, optionally clad in quartz, behind a mirror.
//!
//! Incident intensities are integrated backwards along a hemisphere of directions
//! leaving the plasma surface. Each of them is then traced forward: rays refracted
//! from one region into the other are queued and traced in their new region until
//! every queue is empty.

use std::sync::atomic::Ordering::Relaxed;
use std::thread;

use atomic_float::AtomicF64;
use json::JsonValue;
use tracing::{debug, info, warn};

use crate::config::SolverSettings;
use crate::error::{TransportError, TransportResult};
use crate::fibonacci_sphere;
use crate::float_cmp::is_equal;
use crate::layer::{LayerKind, LayerModel};
use crate::rand_gen::set_rng_seed;
use crate::smoothing::{smooth_plasma, smooth_quartz};
use crate::vec3::Vector;
use crate::worker::{RayState, Worker, WorkerResult};
use crate::F;

/// A direction whose trace failed and whose contribution is missing from the totals.
#[derive(Debug)]
pub struct DirectionFailure {
    /// Index into the sampled hemisphere
    pub direction: usize,
    pub error: TransportError,
}

/// A ray waiting to be traced in the other region.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Queued {
    pub direction: usize,
    pub ray: RayState,
}

/// Energy balance of one [RadiationSolver::solve] run.
#[derive(Debug, Default)]
pub struct Solution {
    /// Absorbed intensity per plasma shell, innermost first
    pub absorbed_plasma: Vec<F>,
    /// `absorbed_plasma` per unit volume
    pub absorbed_plasma_density: Vec<F>,
    /// Absorbed intensity per quartz shell, empty without quartz. Entry 0 is the
    /// inner boundary ring and is always zero.
    pub absorbed_quartz: Vec<F>,
    pub absorbed_quartz_density: Vec<F>,
    /// Absorbed by the mirror or lost through it
    pub absorbed_mirror: F,
    /// Total incident intensity of every direction whose incident intensity could
    /// be computed, including directions whose forward trace failed afterwards
    pub intensity_all: F,
    /// Number of traced directions
    pub directions: usize,
    pub failures: Vec<DirectionFailure>,
}

impl Solution {
    /// True if every direction was traced.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Everything absorbed somewhere, equal to `intensity_all` for a complete run
    /// without edge smoothing.
    pub fn total_absorbed(&self) -> F {
        self.absorbed_plasma.iter().sum::<F>()
            + self.absorbed_quartz.iter().sum::<F>()
            + self.absorbed_mirror
    }

    pub fn to_json(&self) -> JsonValue {
        let mut out = JsonValue::new_object();
        out["absorbed_plasma"] = self.absorbed_plasma.clone().into();
        out["absorbed_plasma_density"] = self.absorbed_plasma_density.clone().into();
        out["absorbed_quartz"] = self.absorbed_quartz.clone().into();
        out["absorbed_quartz_density"] = self.absorbed_quartz_density.clone().into();
        out["absorbed_mirror"] = self.absorbed_mirror.into();
        out["intensity_all"] = self.intensity_all.into();
        out["directions"] = self.directions.into();
        let failures: Vec<JsonValue> = self
            .failures
            .iter()
            .map(|f| {
                let mut failure = JsonValue::new_object();
                failure["direction"] = f.direction.into();
                failure["error"] = f.error.to_string().into();
                failure
            })
            .collect();
        out["failures"] = failures.into();
        out
    }
}

/// Per-thread accumulators.
#[derive(Debug, Clone)]
struct Tally {
    absorbed_plasma: Vec<F>,
    absorbed_quartz: Vec<F>,
    absorbed_mirror: F,
}

impl Tally {
    fn new(n_plasma: usize, n_quartz: usize) -> Tally {
        Tally {
            absorbed_plasma: vec![0.0; n_plasma],
            absorbed_quartz: vec![0.0; n_quartz],
            absorbed_mirror: 0.0,
        }
    }

    fn add(&mut self, other: &Tally) {
        add_into(&mut self.absorbed_plasma, &other.absorbed_plasma);
        add_into(&mut self.absorbed_quartz, &other.absorbed_quartz);
        self.absorbed_mirror += other.absorbed_mirror;
    }
}

fn add_into(total: &mut [F], part: &[F]) {
    total.iter_mut().zip(part).for_each(|(t, p)| *t += p);
}

/// Totals shared by all threads, each thread adds its tally once.
struct SharedTally {
    absorbed_plasma: Vec<AtomicF64>,
    absorbed_quartz: Vec<AtomicF64>,
    absorbed_mirror: AtomicF64,
}

impl SharedTally {
    fn new(n_plasma: usize, n_quartz: usize) -> SharedTally {
        SharedTally {
            absorbed_plasma: (0..n_plasma).map(|_| AtomicF64::new(0.0)).collect(),
            absorbed_quartz: (0..n_quartz).map(|_| AtomicF64::new(0.0)).collect(),
            absorbed_mirror: AtomicF64::new(0.0),
        }
    }

    fn merge(&self, tally: &Tally) {
        for (total, part) in self.absorbed_plasma.iter().zip(&tally.absorbed_plasma) {
            total.fetch_add(*part, Relaxed);
        }
        for (total, part) in self.absorbed_quartz.iter().zip(&tally.absorbed_quartz) {
            total.fetch_add(*part, Relaxed);
        }
        self.absorbed_mirror.fetch_add(tally.absorbed_mirror, Relaxed);
    }

    fn into_tally(self) -> Tally {
        Tally {
            absorbed_plasma: self.absorbed_plasma.into_iter().map(|a| a.into_inner()).collect(),
            absorbed_quartz: self.absorbed_quartz.into_iter().map(|a| a.into_inner()).collect(),
            absorbed_mirror: self.absorbed_mirror.into_inner(),
        }
    }
}

/// Runs `task` on every item of `items`, split into one contiguous chunk per thread.
/// Results keep the order of the items.
fn parallel_map<T, R>(items: &[T], threads: usize, task: impl Fn(&[T], usize) -> Vec<R> + Sync) -> Vec<R>
where
    T: Sync,
    R: Send,
{
    if items.is_empty() {
        return Vec::new();
    }
    let chunk_size = (items.len() + threads - 1) / threads;
    let task = &task;
    thread::scope(|s| {
        let handles: Vec<_> = items
            .chunks(chunk_size)
            .enumerate()
            .map(|(i, chunk)| s.spawn(move || task(chunk, i * chunk_size)))
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

/// Incident intensity of one direction, ready for the forward trace.
#[derive(Debug, Copy, Clone)]
struct Incident {
    direction: usize,
    dir: Vector<F>,
    intensity: F,
}

/// The plasma column with its optional quartz cladding.
#[derive(Debug, Clone)]
pub struct RadiationSolver {
    plasma: LayerModel,
    quartz: Option<LayerModel>,
    settings: SolverSettings,
}

impl RadiationSolver {
    pub fn new(
        plasma: LayerModel,
        quartz: Option<LayerModel>,
        settings: SolverSettings,
    ) -> TransportResult<RadiationSolver> {
        settings.validate()?;
        if plasma.kind() != LayerKind::Solid {
            return Err(TransportError::invalid("the plasma must be a solid model"));
        }
        if let Some(quartz) = &quartz {
            if quartz.kind() != LayerKind::Hollow {
                return Err(TransportError::invalid("the quartz must be a hollow model"));
            }
            if !is_equal(quartz.radius_min(), plasma.radius_max()) {
                return Err(TransportError::invalid(format!(
                    "the quartz starts at {} but the plasma ends at {}",
                    quartz.radius_min(),
                    plasma.radius_max()
                )));
            }
            if quartz.center() != plasma.center() {
                return Err(TransportError::invalid(format!(
                    "the quartz is centered at {}, the plasma at {}",
                    quartz.center(),
                    plasma.center()
                )));
            }
            let (plasma_outside, _) = plasma.boundary_optics(true);
            let (quartz_inside, _) = quartz.boundary_optics(false);
            if !is_equal(plasma_outside, quartz.refractive_index())
                || !is_equal(quartz_inside, plasma.refractive_index())
            {
                return Err(TransportError::invalid(
                    "refractive indices of plasma and quartz do not match at their interface",
                ));
            }
        }
        Ok(RadiationSolver {
            plasma,
            quartz,
            settings,
        })
    }

    pub fn plasma(&self) -> &LayerModel {
        &self.plasma
    }

    pub fn quartz(&self) -> Option<&LayerModel> {
        self.quartz.as_ref()
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Point on the plasma surface every direction is traced through.
    fn initial_pos(&self) -> Vector<F> {
        self.plasma.center() + Vector::new(self.plasma.radius_max(), 0.0, 0.0)
    }

    fn n_quartz_shells(&self) -> usize {
        self.quartz.as_ref().map_or(0, |q| q.len())
    }

    pub fn solve(&self) -> TransportResult<Solution> {
        let start = instant::Instant::now();
        let settings = &self.settings;
        if let Some(seed) = settings.seed {
            set_rng_seed(seed);
        }

        let dirs = fibonacci_sphere::hemisphere(settings.sphere_points, settings.direction_jitter)?;
        let threads = settings.thread_count().min(dirs.len().max(1));
        info!(
            directions = dirs.len(),
            threads,
            quartz = self.quartz.is_some(),
            "solving"
        );

        let initial_pos = self.initial_pos();
        let incident = parallel_map(&dirs, threads, |chunk, offset| {
            let mut worker = Worker::with_max_steps(&self.plasma, settings.max_steps);
            chunk
                .iter()
                .enumerate()
                .map(|(i, &dir)| {
                    let intensity = worker.calculate_intensity(initial_pos, dir, settings.sphere_points);
                    (offset + i, dir, intensity)
                })
                .collect()
        });

        let mut solution = Solution {
            directions: dirs.len(),
            ..Default::default()
        };
        let mut traced = Vec::with_capacity(incident.len());
        let mut max_intensity: F = 0.0;
        for (direction, dir, intensity) in incident {
            match intensity {
                Ok(intensity) => {
                    solution.intensity_all += intensity;
                    max_intensity = max_intensity.max(intensity);
                    traced.push(Incident {
                        direction,
                        dir,
                        intensity,
                    });
                }
                Err(error) => {
                    warn!(direction, %error, "incident intensity failed");
                    solution.failures.push(DirectionFailure { direction, error });
                }
            }
        }
        let floor = settings.i_crit * max_intensity;
        debug!(intensity_all = solution.intensity_all, floor, "incident intensities");

        let (
            Tally {
                mut absorbed_plasma,
                mut absorbed_quartz,
                mut absorbed_mirror,
            },
            failures,
        ) = self.trace_all(&traced, floor, threads);
        solution.failures.extend(failures);
        solution.failures.sort_by_key(|f| f.direction);

        if let (Some(first), Some(last)) = (absorbed_quartz.first_mut(), absorbed_plasma.last_mut()) {
            *last += *first;
            *first = 0.0;
        }

        if settings.edge_smoothing {
            if self.quartz.is_some() {
                smooth_quartz(&mut absorbed_quartz, &mut absorbed_mirror);
            }
            smooth_plasma(&mut absorbed_plasma);
        }

        solution.absorbed_plasma_density = absorbed_plasma
            .iter()
            .enumerate()
            .map(|(i, a)| 2.0 * std::f64::consts::PI * a / self.plasma.shell_mid_radius(i))
            .collect();
        if let Some(quartz) = &self.quartz {
            solution.absorbed_quartz_density = absorbed_quartz
                .iter()
                .enumerate()
                .map(|(i, a)| match i {
                    0 => 0.0,
                    _ => 2.0 * std::f64::consts::PI * a / quartz.shell_mid_radius(i),
                })
                .collect();
        }
        solution.absorbed_plasma = absorbed_plasma;
        solution.absorbed_quartz = absorbed_quartz;
        solution.absorbed_mirror = absorbed_mirror;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            absorbed = solution.total_absorbed(),
            intensity_all = solution.intensity_all,
            failures = solution.failures.len(),
            "solved"
        );
        Ok(solution)
    }

    /// Traces every incident direction forward. A direction that fails adds nothing
    /// to the tally and is returned as a failure.
    fn trace_all(&self, traced: &[Incident], floor: F, threads: usize) -> (Tally, Vec<DirectionFailure>) {
        let n_plasma = self.plasma.len();
        let n_quartz = self.n_quartz_shells();
        let shared = SharedTally::new(n_plasma, n_quartz);
        let failures = parallel_map(traced, threads, |chunk, _| {
            let mut tally = Tally::new(n_plasma, n_quartz);
            let mut failures = Vec::new();
            for incident in chunk {
                match self.trace_direction(incident, floor) {
                    Ok(part) => tally.add(&part),
                    Err(error) => {
                        warn!(direction = incident.direction, %error, "trace failed");
                        failures.push(DirectionFailure {
                            direction: incident.direction,
                            error,
                        });
                    }
                }
            }
            shared.merge(&tally);
            failures
        });
        (shared.into_tally(), failures)
    }

    /// Traces one incident direction forward until nothing is left to trace in
    /// either region.
    fn trace_direction(&self, incident: &Incident, floor: F) -> TransportResult<Tally> {
        let mut tally = Tally::new(self.plasma.len(), self.n_quartz_shells());
        let mut plasma_worker = Worker::with_max_steps(&self.plasma, self.settings.max_steps);
        let initial_pos = self.initial_pos();

        let quartz = match &self.quartz {
            Some(quartz) => quartz,
            None => {
                // The ray leaves the plasma, is reflected by the mirror and re-enters
                let (_, rho) = self.plasma.boundary_optics(true);
                let dir = Vector::new(-incident.dir.x, incident.dir.y, incident.dir.z);
                tally.absorbed_mirror += (1.0 - rho) * incident.intensity;

                let result = plasma_worker.solve_dir(RayState {
                    pos: initial_pos,
                    dir,
                    intensity: rho * incident.intensity,
                    intensity_end: floor,
                    use_prev: true,
                })?;
                add_into(&mut tally.absorbed_plasma, &result.absorbed);
                tally.absorbed_mirror += result.absorbed_at_the_border;
                tally.absorbed_mirror += result.released_rays.iter().map(|r| r.intensity).sum::<F>();
                return Ok(tally);
            }
        };

        let mut quartz_worker = Worker::with_max_steps(quartz, self.settings.max_steps);
        let mut wait_plasma: Vec<Queued> = Vec::new();
        let mut wait_quartz: Vec<Queued> = Vec::new();

        let result = quartz_worker.solve_dir(RayState {
            pos: initial_pos,
            dir: incident.dir,
            intensity: incident.intensity,
            intensity_end: floor,
            use_prev: false,
        })?;
        collect_quartz(incident.direction, result, &mut tally, &mut wait_plasma);

        let mut requeues = 0;
        let mut deposited = 0;
        while !wait_plasma.is_empty() || !wait_quartz.is_empty() {
            while let Some(queued) = wait_plasma.pop() {
                if requeues >= self.settings.max_requeues {
                    tally.absorbed_plasma[self.plasma.absorbing_entry_shell()] += queued.ray.intensity;
                    deposited += 1;
                    continue;
                }
                requeues += 1;

                let result = plasma_worker.solve_dir(queued.ray)?;
                add_into(&mut tally.absorbed_plasma, &result.absorbed);
                tally.absorbed_quartz[1] += result.absorbed_at_the_border;
                wait_quartz.extend(result.released_rays.into_iter().map(|ray| Queued {
                    direction: queued.direction,
                    ray,
                }));
            }

            while let Some(queued) = wait_quartz.pop() {
                if requeues >= self.settings.max_requeues {
                    tally.absorbed_quartz[quartz.absorbing_entry_shell()] += queued.ray.intensity;
                    deposited += 1;
                    continue;
                }
                requeues += 1;

                let result = quartz_worker.solve_dir(queued.ray)?;
                collect_quartz(queued.direction, result, &mut tally, &mut wait_plasma);
            }
        }

        if deposited > 0 {
            warn!(
                direction = incident.direction,
                requeues, deposited, "requeue budget exhausted"
            );
        }
        Ok(tally)
    }
}

/// Books a quartz trace: everything leaving outwards is lost at the mirror, rays
/// entering the plasma are queued.
fn collect_quartz(
    direction: usize,
    result: WorkerResult,
    tally: &mut Tally,
    wait_plasma: &mut Vec<Queued>,
) {
    add_into(&mut tally.absorbed_quartz, &result.absorbed);
    tally.absorbed_mirror += result.absorbed_at_the_border;
    for ray in result.released_rays {
        if ray.use_prev {
            wait_plasma.push(Queued { direction, ray });
        } else {
            tally.absorbed_mirror += ray.intensity;
        }
    }
}
