use gnuplot::{AxesCommon, Caption, Color, Figure, PointSymbol};
use radiative_transfer::{Config, QuartzConfig};

fn main() {
    let config = Config {
        quartz: Some(QuartzConfig::default()),
        ..Default::default()
    };
    let solver = config.build_solver().expect("default lamp is valid");
    let solution = solver.solve().expect("solver failed");

    let plasma = solver.plasma();
    let mut r: Vec<f64> = (0..plasma.len()).map(|i| plasma.shell_mid_radius(i)).collect();
    let mut density = solution.absorbed_plasma_density.clone();
    if let Some(quartz) = solver.quartz() {
        // ring 0 of the quartz has no volume
        r.extend((1..quartz.len()).map(|i| quartz.shell_mid_radius(i)));
        density.extend_from_slice(&solution.absorbed_quartz_density[1..]);
    }

    let mut fg = Figure::new();
    fg.axes2d()
        .set_title("Absorbed energy density", &[])
        .set_x_label("r [cm]", &[])
        .set_y_label("density", &[])
        .lines_points(r, density, &[Caption("absorbed"), Color("black"), PointSymbol('O')]);
    fg.show().expect("Failed to display the plot.");
}
