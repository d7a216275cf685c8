use clap::Parser;
use radiative_transfer::{Config, LayerModel, QuartzConfig, Solution, TransportResult};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Computes the radiative energy absorbed in the shells of a plasma lamp.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON parameter file, defaults are used for everything it leaves out
    #[clap(short, long)]
    config: Option<String>,

    /// Clad the plasma in a quartz wall even if the parameter file has none
    #[clap(short, long)]
    quartz: bool,

    /// Number of worker threads, all cores by default
    #[clap(short, long)]
    threads: Option<usize>,

    /// Points of the Fibonacci sphere the directions are sampled from
    #[clap(short, long)]
    sphere_points: Option<usize>,

    /// Correct the outliers of the edge shells
    #[clap(long)]
    smoothing: bool,

    /// Seed of the random direction jitter
    #[clap(long)]
    seed: Option<u64>,

    /// Print the result as JSON
    #[clap(long)]
    json: bool,
}

fn print_region(name: &str, model: &LayerModel, absorbed: &[f64], density: &[f64]) {
    println!("{}:", name);
    println!(
        "{:>5} {:>10} {:>10} {:>14} {:>14}",
        "shell", "r_mid", "T", "absorbed", "density"
    );
    for (i, (a, d)) in absorbed.iter().zip(density).enumerate() {
        println!(
            "{:>5} {:>10.5} {:>10.1} {:>14.6e} {:>14.6e}",
            i,
            model.shell_mid_radius(i),
            model.shell(i).temperature,
            a,
            d
        );
    }
}

fn print_solution(solution: &Solution, plasma: &LayerModel, quartz: Option<&LayerModel>) {
    print_region(
        "Plasma",
        plasma,
        &solution.absorbed_plasma,
        &solution.absorbed_plasma_density,
    );
    if let Some(quartz) = quartz {
        print_region(
            "Quartz",
            quartz,
            &solution.absorbed_quartz,
            &solution.absorbed_quartz_density,
        );
    }

    let total_plasma: f64 = solution.absorbed_plasma.iter().sum();
    let total_quartz: f64 = solution.absorbed_quartz.iter().sum();
    println!("Absorbed in the plasma: {:.6e}", total_plasma);
    if quartz.is_some() {
        println!("Absorbed in the quartz: {:.6e}", total_quartz);
    }
    println!("Absorbed at the mirror: {:.6e}", solution.absorbed_mirror);
    println!("Sum:                    {:.6e}", solution.total_absorbed());
    println!("Intensity all:          {:.6e}", solution.intensity_all);
    println!(
        "Directions:             {} ({} failed)",
        solution.directions,
        solution.failures.len()
    );
}

fn run(args: Args) -> TransportResult<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if args.quartz && config.quartz.is_none() {
        config.quartz = Some(QuartzConfig::default());
    }
    if args.threads.is_some() {
        config.solver.threads = args.threads;
    }
    if let Some(sphere_points) = args.sphere_points {
        config.solver.sphere_points = sphere_points;
    }
    if args.smoothing {
        config.solver.edge_smoothing = true;
    }
    if args.seed.is_some() {
        config.solver.seed = args.seed;
    }

    let solver = config.build_solver()?;
    let solution = solver.solve()?;
    for failure in &solution.failures {
        error!(direction = failure.direction, error = %failure.error, "direction failed");
    }

    if args.json {
        println!("{}", solution.to_json().pretty(4));
    } else {
        print_solution(&solution, solver.plasma(), solver.quartz());
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
