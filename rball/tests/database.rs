mod common;

use std::sync::Arc;

use approx::assert_relative_eq;
use common::{edges, fibonacci_sphere, icosahedral, position_matrices, random_matrices};
use common::{CHANNELS, ENERGY_BINS};
use nalgebra::Vector3;
use ndarray::{Array1, Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rball::{
    DatabaseError, Degeneracy, EquatorialAdapter, GridGenerator, InvalidToleranceError,
    LocateConfig, MeshError, RballConfig, ResponseDatabase, ResponseGrid, RotatedFrameAdapter,
    SkyPosition, MAX_BOUNDARY_TOLERANCE,
};
use sphere_math::radec_to_cartesian;

fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    assert_eq!(a.dim(), b.dim());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

fn database_98() -> (ResponseDatabase, Array3<f64>) {
    let grid = fibonacci_sphere(98);
    let matrices = random_matrices(98, CHANNELS, ENERGY_BINS, 7);
    let db = ResponseDatabase::new(
        matrices.clone(),
        grid.theta,
        grid.phi,
        edges(CHANNELS),
        edges(ENERGY_BINS),
    )
    .unwrap();
    (db, matrices)
}

#[test]
fn test_98_point_database_repositions() {
    let _ = env_logger::builder().is_test(true).try_init();

    let (mut db, _) = database_98();
    assert_eq!(db.grid_point_count(), 98);
    assert_eq!(db.current_position(), (0.1, 0.1));

    db.reposition(10.0, 10.0).unwrap();
    assert_eq!(db.current_position(), (10.0, 10.0));

    let matrix = db.current().matrix();
    assert_eq!(matrix.dim(), (CHANNELS, ENERGY_BINS));
    assert!(matrix.iter().all(|v| v.is_finite() && *v >= 0.0));
    assert_eq!(db.current().ebounds().len(), CHANNELS + 1);
    assert_eq!(db.current().monte_carlo_energies().len(), ENERGY_BINS + 1);
}

#[test]
fn test_default_icosahedral_grid_repositions() {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = RballConfig::default();
    let points = GridGenerator::from_config(&config.grid).generate().unwrap();
    let n = points.n_grid_points();
    assert_eq!(n, 482);

    let matrices = random_matrices(n, CHANNELS, ENERGY_BINS, 13);
    let mut db = ResponseDatabase::with_config(
        matrices.clone(),
        Array1::from(points.theta().to_vec()),
        Array1::from(points.phi().to_vec()),
        edges(CHANNELS),
        edges(ENERGY_BINS),
        EquatorialAdapter,
        &config,
    )
    .unwrap();
    assert_eq!(db.grid_point_count(), 482);

    db.reposition(10.0, 10.0).unwrap();
    let matrix = db.current().matrix();
    assert_eq!(matrix.dim(), (CHANNELS, ENERGY_BINS));
    assert!(matrix.iter().all(|v| v.is_finite() && *v >= 0.0));

    // Each entry is a convex blend, so it stays within the corner range
    let location = db.locate_sky(10.0, 10.0).unwrap();
    for ((c, e), &v) in matrix.indexed_iter() {
        let corners = location.vertices.map(|k| matrices[(k, c, e)]);
        let lo = corners.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(v >= lo - 1e-12 && v <= hi + 1e-12);
    }

    // Grid vertex 0 is the north pole
    db.reposition(0.0, 90.0).unwrap();
    let pole = matrices.index_axis(ndarray::Axis(0), 0).to_owned();
    assert!(max_abs_diff(db.current().matrix(), &pole) < 1e-12);
}

#[test]
fn test_config_with_wide_tolerance_rejected() {
    let grid = fibonacci_sphere(98);
    let config = RballConfig {
        locate: LocateConfig {
            boundary_tolerance: 0.5,
        },
        ..RballConfig::default()
    };

    let err = ResponseDatabase::with_config(
        random_matrices(98, 4, 4, 2),
        grid.theta,
        grid.phi,
        edges(4),
        edges(4),
        EquatorialAdapter,
        &config,
    )
    .unwrap_err();
    assert_eq!(err, DatabaseError::InvalidTolerance(InvalidToleranceError(0.5)));
}

#[test]
fn test_widest_tolerance_locates_whole_sky() {
    let grid = fibonacci_sphere(98);
    let config = RballConfig {
        locate: LocateConfig {
            boundary_tolerance: MAX_BOUNDARY_TOLERANCE,
        },
        ..RballConfig::default()
    };
    let mut db = ResponseDatabase::with_config(
        random_matrices(98, 4, 4, 2),
        grid.theta,
        grid.phi,
        edges(4),
        edges(4),
        EquatorialAdapter,
        &config,
    )
    .unwrap();

    for ra in (0..360).step_by(10) {
        for dec in (-80..=80).step_by(10) {
            db.reposition(ra as f64, dec as f64).unwrap();
        }
    }
}

#[test]
fn test_mesh_is_closed() {
    let (db, _) = database_98();
    let triangulation = db.grid().triangulation();
    assert_eq!(triangulation.n_faces(), 2 * 98 - 4);
    assert_eq!(db.segments().len(), 3 * 98 - 6);

    let points = db.grid_points();
    assert_eq!(points.dim(), (98, 3));
    for row in points.rows() {
        assert_relative_eq!(row.dot(&row), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn test_vertex_query_reproduces_grid_matrix() {
    let grid = fibonacci_sphere(98);
    let (mut db, matrices) = database_98();

    for k in [0, 13, 49, 97] {
        let ra = grid.phi[k].to_degrees();
        let dec = grid.theta[k].to_degrees();
        db.reposition(ra, dec).unwrap();

        let expected = matrices.index_axis(ndarray::Axis(0), k).to_owned();
        assert!(max_abs_diff(db.current().matrix(), &expected) < 1e-12);
    }
}

#[test]
fn test_reposition_is_idempotent() {
    let (mut db, _) = database_98();

    db.reposition(123.4, -56.7).unwrap();
    let first = db.current().matrix().clone();
    db.reposition(123.4, -56.7).unwrap();
    assert_eq!(db.current().matrix(), &first);
}

#[test]
fn test_response_at_does_not_move() {
    let (mut db, _) = database_98();
    db.reposition(200.0, 30.0).unwrap();
    let before = db.current().matrix().clone();

    let elsewhere = db.response_at(20.0, -60.0).unwrap();
    assert_eq!(db.current().matrix(), &before);
    assert_eq!(db.current_position(), (200.0, 30.0));

    db.reposition(20.0, -60.0).unwrap();
    assert_eq!(db.current().matrix(), &elsewhere);
}

#[test]
fn test_weights_are_a_partition_of_unity() {
    let (db, _) = database_98();
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..500 {
        let ra = rng.gen_range(0.0..360.0);
        let dec = rng.gen_range(-90.0..=90.0);
        let location = db.locate_sky(ra, dec).unwrap();

        assert!(location.weights.iter().all(|&w| (0.0..=1.0).contains(&w)));
        assert_relative_eq!(location.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn test_blend_points_toward_query() {
    // Blending the grid unit vectors gives the query's projection onto the
    // face plane, which is parallel to the query itself
    let grid = icosahedral(2, true);
    assert_eq!(grid.len(), 482);

    let matrices = position_matrices(&grid, 2, 3);
    let db = ResponseDatabase::new(matrices, grid.theta, grid.phi, edges(2), edges(3)).unwrap();
    let mut rng = StdRng::seed_from_u64(3);

    for _ in 0..200 {
        let ra = rng.gen_range(0.0..360.0);
        let dec = rng.gen_range(-89.0..89.0);
        let m = db.response_at(ra, dec).unwrap();

        let blended = Vector3::new(m[(0, 0)], m[(0, 1)], m[(0, 2)]);
        let query = radec_to_cartesian(ra, dec);
        assert_relative_eq!(blended.normalize(), query, epsilon = 1e-9);
    }
}

#[test]
fn test_theta_length_mismatch() {
    let grid = fibonacci_sphere(98);
    let theta = grid.theta.slice(ndarray::s![..97]).to_owned();

    let err = ResponseDatabase::new(
        random_matrices(98, 4, 4, 1),
        theta,
        grid.phi,
        edges(4),
        edges(4),
    )
    .unwrap_err();

    assert_eq!(
        err,
        DatabaseError::ShapeMismatch {
            axis: "theta",
            found: 97,
            expected: 98
        }
    );
}

#[test]
fn test_three_points_cannot_be_triangulated() {
    let err = ResponseDatabase::new(
        random_matrices(3, 4, 4, 1),
        Array1::from(vec![0.0, 0.5, -0.5]),
        Array1::from(vec![0.0, 2.0, 4.0]),
        edges(4),
        edges(4),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        DatabaseError::Mesh(MeshError::Degenerate(Degeneracy::TooFewPoints { count: 3 }))
    ));
}

#[test]
fn test_duplicate_grid_points_rejected() {
    let grid = icosahedral(0, false);
    let mut theta = grid.theta.to_vec();
    let mut phi = grid.phi.to_vec();
    theta.push(theta[5]);
    phi.push(phi[5]);

    let err = ResponseDatabase::new(
        random_matrices(13, 4, 4, 1),
        Array1::from(theta),
        Array1::from(phi),
        edges(4),
        edges(4),
    )
    .unwrap_err();

    assert_eq!(
        err,
        DatabaseError::Mesh(MeshError::Degenerate(Degeneracy::CoincidentPoints {
            first: 5,
            second: 12
        }))
    );
}

#[test]
fn test_shared_grid_across_threads() {
    let fixture = fibonacci_sphere(98);
    let grid = Arc::new(
        ResponseGrid::new(
            random_matrices(98, 8, 8, 5),
            fixture.theta,
            fixture.phi,
            edges(8),
            edges(8),
        )
        .unwrap(),
    );

    let reference = {
        let db = ResponseDatabase::from_grid(
            Arc::clone(&grid),
            EquatorialAdapter,
            SkyPosition::default(),
        )
        .unwrap();
        [db.response_at(45.0, 45.0).unwrap(), db.response_at(300.0, -10.0).unwrap()]
    };

    std::thread::scope(|scope| {
        for (i, (ra, dec)) in [(45.0, 45.0), (300.0, -10.0)].into_iter().enumerate() {
            let grid = Arc::clone(&grid);
            let expected = &reference[i];
            scope.spawn(move || {
                let mut db =
                    ResponseDatabase::from_grid(grid, EquatorialAdapter, SkyPosition::default())
                        .unwrap();
                db.reposition(ra, dec).unwrap();
                assert_eq!(db.current().matrix(), expected);
            });
        }
    });

    assert_eq!(Arc::strong_count(&grid), 1);
}

#[test]
fn test_occultation_zeroes_response() {
    let (mut db, _) = database_98();
    // Low orbit above RA 0, Dec 0: the Earth fills the sky toward RA 180
    let spacecraft = Vector3::new(6371.0 + 500.0, 0.0, 0.0);

    assert!(db.reposition_unless_occulted(180.0, 0.0, &spacecraft).unwrap());
    assert!(db.current().matrix().iter().all(|&v| v == 0.0));

    assert!(!db.reposition_unless_occulted(0.0, 0.0, &spacecraft).unwrap());
    assert!(db.current().matrix().sum() > 0.0);
}

#[test]
fn test_rotated_frame_boresight_hits_pole() {
    let grid = icosahedral(1, false);
    let n = grid.len();
    let matrices = Array3::from_shape_fn((n, 2, 2), |(i, _, _)| i as f64);

    let (ra0, dec0) = (83.6, 22.0);
    let mut db = ResponseDatabase::with_adapter(
        matrices,
        grid.theta,
        grid.phi,
        edges(2),
        edges(2),
        RotatedFrameAdapter::pointing_at(ra0, dec0),
    )
    .unwrap();

    // Grid point 0 is the instrument-frame north pole
    db.reposition(ra0, dec0).unwrap();
    for &v in db.current().matrix().iter() {
        assert_relative_eq!(v, 0.0, epsilon = 1e-9);
    }

    let location = db.locate_sky(ra0, dec0).unwrap();
    assert!(location.vertices.contains(&0));
}

#[test]
fn test_config_drives_initial_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rball.json");

    let config = RballConfig {
        initial_position: SkyPosition::new(250.0, -20.0),
        locate: LocateConfig {
            boundary_tolerance: 1e-9,
        },
        ..RballConfig::default()
    };
    config.save_to_file(&path).unwrap();
    let loaded = RballConfig::load_from_file(&path).unwrap();

    let grid = fibonacci_sphere(98);
    let matrices = random_matrices(98, 4, 4, 9);
    let db = ResponseDatabase::with_config(
        matrices,
        grid.theta,
        grid.phi,
        edges(4),
        edges(4),
        EquatorialAdapter,
        &loaded,
    )
    .unwrap();

    assert_eq!(db.current_position(), (250.0, -20.0));
    assert_eq!(
        db.grid().triangulation().locate_config().boundary_tolerance,
        1e-9
    );
    assert_eq!(db.current().matrix(), &db.response_at(250.0, -20.0).unwrap());
}
