//! Generate an icosahedral grid, triangulate it and interpolate a synthetic
//! response at one sky position

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ndarray::{Array, Array3};
use rball::{GridGenerator, RballConfig, ResponseDatabase};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect a response grid and its triangulation")]
struct Args {
    /// Number of icosahedral subdivisions (overrides the config file)
    #[arg(long)]
    level: Option<u32>,

    /// Append face centroids as extra grid points (overrides the config file)
    #[arg(long)]
    face_points: Option<bool>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Right ascension to locate, in degrees
    #[arg(long, default_value_t = 10.0)]
    ra: f64,

    /// Declination to locate, in degrees
    #[arg(long, default_value_t = 10.0)]
    dec: f64,

    /// Output channels of the synthetic response
    #[arg(long, default_value_t = 128)]
    channels: usize,

    /// Monte-Carlo energy bins of the synthetic response
    #[arg(long, default_value_t = 64)]
    energy_bins: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RballConfig::load_from_file(path)?,
        None => RballConfig::default(),
    };
    if let Some(level) = args.level {
        config.grid.refinement_level = level;
    }
    if let Some(face_points) = args.face_points {
        config.grid.include_face_points = face_points;
    }

    let generator = GridGenerator::from_config(&config.grid);
    let grid = generator.generate()?;
    let n = grid.n_grid_points();

    println!("Grid");
    println!("  refinement level:  {}", generator.refinement_level());
    println!("  face points:       {}", generator.include_face_points());
    println!("  grid points:       {n}");

    // Synthetic effective area: falls off with angle from the +Z boresight
    let matrices = Array3::from_shape_fn((n, args.channels, args.energy_bins), |(i, c, e)| {
        let on_axis = 0.5 * (1.0 + grid.xyz()[i].z);
        let diagonal = if c * args.energy_bins / args.channels.max(1) == e {
            1.0
        } else {
            0.05
        };
        on_axis * diagonal
    });

    let mut db = ResponseDatabase::with_config(
        matrices,
        Array::from(grid.theta().to_vec()),
        Array::from(grid.phi().to_vec()),
        Array::linspace(5.0, 2000.0, args.channels + 1),
        Array::linspace(5.0, 2000.0, args.energy_bins + 1),
        rball::EquatorialAdapter,
        &config,
    )?;

    let shared = Arc::clone(db.grid());
    let triangulation = shared.triangulation();
    println!("Triangulation");
    println!("  faces:             {}", triangulation.n_faces());
    println!("  edges:             {}", db.segments().len());

    let location = db.locate_sky(args.ra, args.dec)?;
    db.reposition(args.ra, args.dec)?;

    println!("Location of (ra={}, dec={})", args.ra, args.dec);
    println!("  face:              {}", location.face);
    for (vertex, weight) in location.vertices.iter().zip(&location.weights) {
        println!(
            "  vertex {vertex:>6}  lon={:>9.5}  lat={:>9.5}  weight={weight:.6}",
            triangulation.lons()[*vertex],
            triangulation.lats()[*vertex]
        );
    }

    let matrix = db.current().matrix();
    let min = matrix.iter().copied().fold(f64::INFINITY, f64::min);
    let max = matrix.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    println!("Interpolated response");
    println!("  shape:             {:?}", matrix.dim());
    println!("  sum:               {:.6}", matrix.sum());
    println!("  min / max:         {min:.6} / {max:.6}");

    Ok(())
}
