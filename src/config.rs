//! Run parameters of a plasma lamp, optionally clad in quartz, and of the solver.
//!
//! A configuration file is a JSON object with the sections `plasma`, `quartz` and
//! `solver`. Every field is optional, a missing `quartz` section means a bare plasma
//! column behind the mirror.
//!
//! ```json
//! {
//!     "plasma": { "r": 0.35, "n_plasma": 40, "t0": 10000, "rho": 0.95 },
//!     "quartz": { "delta": 0.1, "n_quartz": 20 },
//!     "solver": { "sphere_points": 1000, "i_crit": 1e-6 }
//! }
//! ```

use std::path::Path;

use json::JsonValue;

use crate::error::{TransportError, TransportResult};
use crate::layer::{HollowParams, LayerModel, SolidParams};
use crate::physics::{self, refractive_index, QuartzTemperature};
use crate::solver::RadiationSolver;
use crate::vec3::Vector;
use crate::worker::DEFAULT_MAX_STEPS;
use crate::F;

/// The plasma column and the mirror around it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PlasmaConfig {
    /// Radius of the plasma column, cm
    pub r: F,
    /// Number of plasma shells
    pub n_plasma: usize,
    /// Temperature on the axis, K
    pub t0: F,
    /// Temperature at the wall, K
    pub tw: F,
    /// Exponent of the temperature profile
    pub m: F,
    /// Reflectance of the mirror
    pub rho: F,
    /// Frequency, Hz
    pub nu: F,
    /// Width of the frequency band, Hz
    pub d_nu: F,
    pub eta_plasma: F,
}

impl Default for PlasmaConfig {
    fn default() -> Self {
        Self {
            r: 0.35,
            n_plasma: 40,
            t0: 10000.0,
            tw: 2000.0,
            m: 4.0,
            rho: 0.95,
            nu: 1e15,
            d_nu: 1e15,
            eta_plasma: refractive_index::PLASMA,
        }
    }
}

/// The quartz wall between the plasma and the mirror.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuartzConfig {
    /// Wall thickness, cm
    pub delta: F,
    /// Number of quartz shells
    pub n_quartz: usize,
    /// Temperature of the outer surface, K
    pub t1: F,
    pub eta_quartz: F,
}

impl Default for QuartzConfig {
    fn default() -> Self {
        Self {
            delta: 0.1,
            n_quartz: 20,
            t1: 1000.0,
            eta_quartz: refractive_index::QUARTZ,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SolverSettings {
    /// Points of the full Fibonacci sphere, about half of them are traced
    pub sphere_points: usize,
    /// Rays are traced until their intensity falls below `i_crit` times the
    /// largest incident intensity
    pub i_crit: F,
    /// Worker threads, all cores when `None`
    pub threads: Option<usize>,
    /// Boundary crossings of one ray before its remainder is deposited
    pub max_steps: usize,
    /// Rays handed between plasma and quartz per direction before the rest is deposited
    pub max_requeues: usize,
    pub edge_smoothing: bool,
    /// Half angle of the cone every sampled direction is randomly turned within, radians
    pub direction_jitter: F,
    pub seed: Option<u64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            sphere_points: 1000,
            i_crit: 1e-6,
            threads: None,
            max_steps: DEFAULT_MAX_STEPS,
            max_requeues: 100_000,
            edge_smoothing: false,
            direction_jitter: 0.0,
            seed: None,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> TransportResult<()> {
        if !self.i_crit.is_finite() || self.i_crit <= 0.0 {
            return Err(TransportError::invalid(format!(
                "i_crit must be positive, got {}",
                self.i_crit
            )));
        }
        if self.threads == Some(0) {
            return Err(TransportError::invalid("at least one thread is needed"));
        }
        if self.max_steps == 0 {
            return Err(TransportError::invalid("max_steps must be positive"));
        }
        if !self.direction_jitter.is_finite() || self.direction_jitter < 0.0 {
            return Err(TransportError::invalid(format!(
                "direction_jitter must be a non-negative angle, got {}",
                self.direction_jitter
            )));
        }
        Ok(())
    }

    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Config {
    pub plasma: PlasmaConfig,
    pub quartz: Option<QuartzConfig>,
    pub solver: SolverSettings,
}

const PLASMA_KEYS: &[&str] = &[
    "r",
    "n_plasma",
    "t0",
    "tw",
    "m",
    "rho",
    "nu",
    "d_nu",
    "eta_plasma",
];
const QUARTZ_KEYS: &[&str] = &["delta", "n_quartz", "t1", "eta_quartz"];
const SOLVER_KEYS: &[&str] = &[
    "sphere_points",
    "i_crit",
    "threads",
    "max_steps",
    "max_requeues",
    "edge_smoothing",
    "direction_jitter",
    "seed",
];

fn check_keys(section: &JsonValue, name: &str, known: &[&str]) -> TransportResult<()> {
    if section.is_null() {
        return Ok(());
    }
    if !section.is_object() {
        return Err(TransportError::Config(format!(
            "section `{}` must be an object",
            name
        )));
    }
    for (key, _) in section.entries() {
        if !known.contains(&key) {
            return Err(TransportError::Config(format!(
                "unknown key `{}` in section `{}`",
                key, name
            )));
        }
    }
    Ok(())
}

fn read_f64(section: &JsonValue, key: &str, default: F) -> TransportResult<F> {
    let value = &section[key];
    if value.is_null() {
        return Ok(default);
    }
    value
        .as_f64()
        .ok_or_else(|| TransportError::Config(format!("`{}` must be a number, got {}", key, value)))
}

fn read_usize(section: &JsonValue, key: &str, default: usize) -> TransportResult<usize> {
    let value = &section[key];
    if value.is_null() {
        return Ok(default);
    }
    value.as_usize().ok_or_else(|| {
        TransportError::Config(format!(
            "`{}` must be a non-negative integer, got {}",
            key, value
        ))
    })
}

fn read_opt_u64(section: &JsonValue, key: &str) -> TransportResult<Option<u64>> {
    let value = &section[key];
    if value.is_null() {
        return Ok(None);
    }
    value.as_u64().map(Some).ok_or_else(|| {
        TransportError::Config(format!(
            "`{}` must be a non-negative integer, got {}",
            key, value
        ))
    })
}

fn read_bool(section: &JsonValue, key: &str, default: bool) -> TransportResult<bool> {
    let value = &section[key];
    if value.is_null() {
        return Ok(default);
    }
    value
        .as_bool()
        .ok_or_else(|| TransportError::Config(format!("`{}` must be a boolean, got {}", key, value)))
}

impl PlasmaConfig {
    fn from_json(section: &JsonValue) -> TransportResult<PlasmaConfig> {
        check_keys(section, "plasma", PLASMA_KEYS)?;
        let d = PlasmaConfig::default();
        Ok(PlasmaConfig {
            r: read_f64(section, "r", d.r)?,
            n_plasma: read_usize(section, "n_plasma", d.n_plasma)?,
            t0: read_f64(section, "t0", d.t0)?,
            tw: read_f64(section, "tw", d.tw)?,
            m: read_f64(section, "m", d.m)?,
            rho: read_f64(section, "rho", d.rho)?,
            nu: read_f64(section, "nu", d.nu)?,
            d_nu: read_f64(section, "d_nu", d.d_nu)?,
            eta_plasma: read_f64(section, "eta_plasma", d.eta_plasma)?,
        })
    }

    fn temperature(&self) -> impl Fn(F) -> F {
        let (t0, tw, m) = (self.t0, self.tw, self.m);
        move |z| physics::plasma_temperature(z, t0, tw, m)
    }

    fn intensity(&self) -> impl Fn(F) -> F {
        let (nu, d_nu) = (self.nu, self.d_nu);
        move |t| physics::planck_intensity(nu, d_nu, t)
    }
}

impl QuartzConfig {
    fn from_json(section: &JsonValue) -> TransportResult<QuartzConfig> {
        check_keys(section, "quartz", QUARTZ_KEYS)?;
        let d = QuartzConfig::default();
        Ok(QuartzConfig {
            delta: read_f64(section, "delta", d.delta)?,
            n_quartz: read_usize(section, "n_quartz", d.n_quartz)?,
            t1: read_f64(section, "t1", d.t1)?,
            eta_quartz: read_f64(section, "eta_quartz", d.eta_quartz)?,
        })
    }
}

impl SolverSettings {
    fn from_json(section: &JsonValue) -> TransportResult<SolverSettings> {
        check_keys(section, "solver", SOLVER_KEYS)?;
        let d = SolverSettings::default();
        let threads = if section["threads"].is_null() {
            None
        } else {
            Some(read_usize(section, "threads", 0)?)
        };
        Ok(SolverSettings {
            sphere_points: read_usize(section, "sphere_points", d.sphere_points)?,
            i_crit: read_f64(section, "i_crit", d.i_crit)?,
            threads,
            max_steps: read_usize(section, "max_steps", d.max_steps)?,
            max_requeues: read_usize(section, "max_requeues", d.max_requeues)?,
            edge_smoothing: read_bool(section, "edge_smoothing", d.edge_smoothing)?,
            direction_jitter: read_f64(section, "direction_jitter", d.direction_jitter)?,
            seed: read_opt_u64(section, "seed")?,
        })
    }
}

impl Config {
    /// Parses a configuration from JSON text.
    pub fn from_json(text: &str) -> TransportResult<Config> {
        let root = json::parse(text)?;
        if !root.is_object() {
            return Err(TransportError::Config(
                "the configuration must be a JSON object".to_string(),
            ));
        }
        check_keys(&root, "root", &["plasma", "quartz", "solver"])?;

        let quartz = &root["quartz"];
        let quartz = if quartz.is_null() {
            None
        } else {
            Some(QuartzConfig::from_json(quartz)?)
        };

        Ok(Config {
            plasma: PlasmaConfig::from_json(&root["plasma"])?,
            quartz,
            solver: SolverSettings::from_json(&root["solver"])?,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> TransportResult<Config> {
        let text = std::fs::read_to_string(path)?;
        Config::from_json(&text)
    }

    /// Builds the layer models of the lamp with the physical presets.
    pub fn build_solver(&self) -> TransportResult<RadiationSolver> {
        let p = &self.plasma;
        let center = Vector::new(0.0, 0.0, 0.0);

        let (eta_external, mirror) = match &self.quartz {
            Some(q) => (q.eta_quartz, 0.0),
            None => (refractive_index::AIR, p.rho),
        };
        let plasma = LayerModel::solid(
            SolidParams {
                center,
                radius: p.r,
                steps: p.n_plasma,
                refractive_index: p.eta_plasma,
                refractive_index_external: eta_external,
                mirror,
            },
            p.temperature(),
            p.intensity(),
            physics::plasma_absorption,
        )?;

        let quartz = match &self.quartz {
            Some(q) => {
                let profile = QuartzTemperature::new(p.tw, q.t1, p.r, q.delta);
                Some(LayerModel::hollow(
                    HollowParams {
                        center,
                        radius_min: p.r,
                        radius_max: p.r + q.delta,
                        steps: q.n_quartz,
                        refractive_index: q.eta_quartz,
                        refractive_index_internal: p.eta_plasma,
                        refractive_index_external: refractive_index::AIR,
                        mirror_internal: 0.0,
                        mirror_external: p.rho,
                    },
                    move |z| profile.at(z),
                    p.intensity(),
                    physics::quartz_absorption,
                )?)
            }
            None => None,
        };

        RadiationSolver::new(plasma, quartz, self.solver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerKind;

    #[test]
    fn empty_object_gives_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.quartz.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_json(
            r#"{
                "plasma": { "r": 0.5, "n_plasma": 12, "rho": 0.9 },
                "quartz": { "n_quartz": 8 },
                "solver": { "threads": 2, "edge_smoothing": true, "seed": 7 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.plasma.r, 0.5);
        assert_eq!(config.plasma.n_plasma, 12);
        assert_eq!(config.plasma.rho, 0.9);
        assert_eq!(config.plasma.t0, 10000.0);
        let quartz = config.quartz.unwrap();
        assert_eq!(quartz.n_quartz, 8);
        assert_eq!(quartz.delta, 0.1);
        assert_eq!(config.solver.threads, Some(2));
        assert!(config.solver.edge_smoothing);
        assert_eq!(config.solver.seed, Some(7));
        assert_eq!(config.solver.sphere_points, 1000);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            Config::from_json("{ not json"),
            Err(TransportError::Json(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{ "plasma": { "radius": 1.0 } }"#),
            Err(TransportError::Config(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{ "plasma": { "n_plasma": "many" } }"#),
            Err(TransportError::Config(_))
        ));
        assert!(matches!(
            Config::from_json("[1, 2]"),
            Err(TransportError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            Config::load("/nonexistent/radiative_transfer.json"),
            Err(TransportError::Io(_))
        ));
    }

    #[test]
    fn builds_lamp_models() {
        let config = Config {
            quartz: Some(QuartzConfig::default()),
            ..Default::default()
        };
        let solver = config.build_solver().unwrap();
        assert_eq!(solver.plasma().len(), 40);
        assert_eq!(solver.plasma().boundary_optics(true), (1.4585, 0.0));
        let quartz = solver.quartz().unwrap();
        assert_eq!(quartz.kind(), LayerKind::Hollow);
        assert_eq!(quartz.len(), 21);
        assert_eq!(quartz.boundary_optics(true), (1.0, 0.95));

        // Hot core, colder wall
        let plasma = solver.plasma();
        assert!(plasma.shell(0).temperature > plasma.shell(39).temperature);
        assert!(plasma.shell(0).intensity > plasma.shell(39).intensity);
        assert!(quartz.shell(20).temperature < quartz.shell(1).temperature);
    }

    #[test]
    fn invalid_settings() {
        let settings = SolverSettings {
            i_crit: 0.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        let settings = SolverSettings {
            threads: Some(0),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(SolverSettings::default().validate().is_ok());
    }
}
