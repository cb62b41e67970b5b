use argh::FromArgs;
use std::path::PathBuf;

use mapmerge::geometry::kdtree::PointIndex;
use mapmerge::geometry::transforms::axis_angle_to_rotation_matrix;
use mapmerge::geometry::{PointCloud, RigidTransform};
use mapmerge::registration::{DescriptorKind, DescriptorSet, EstimationMethod};
use mapmerge::{merge_maps, FeatureExtractor, KeypointKind, MapMergeError, MapMergeParams};
use rand::{rngs::StdRng, Rng, SeedableRng};

const NUM_NEIGHBORS: usize = 8;

#[derive(FromArgs)]
/// Merge synthetic partial maps of a corridor
struct Args {
    /// number of maps to generate
    #[argh(option, default = "3")]
    num_maps: usize,

    /// number of points in the corridor
    #[argh(option, default = "600")]
    num_points: usize,

    /// seed of the generated scene
    #[argh(option, default = "0")]
    seed: u64,

    /// pairwise estimation method, `matching` or `sac_ia`
    #[argh(option, default = "EstimationMethod::Matching")]
    method: EstimationMethod,

    /// path to a JSON file with the merging parameters
    #[argh(option)]
    config: Option<PathBuf>,

    /// path to write the global transforms as JSON
    #[argh(option)]
    output: Option<PathBuf>,
}

/// Every point is a keypoint, described by the sorted distances to its nearest neighbours.
struct NeighborDistances;

impl FeatureExtractor for NeighborDistances {
    fn compute_surface_normals(
        &self,
        cloud: &PointCloud,
        _radius: f64,
    ) -> Result<Vec<[f64; 3]>, MapMergeError> {
        Ok(vec![[0.0, 0.0, 1.0]; cloud.len()])
    }

    fn detect_keypoints(
        &self,
        cloud: &PointCloud,
        _normals: &[[f64; 3]],
        _kind: KeypointKind,
        _threshold: f64,
        _radius: f64,
        _resolution: f64,
    ) -> Result<PointCloud, MapMergeError> {
        Ok(cloud.clone())
    }

    fn compute_local_descriptors(
        &self,
        cloud: &PointCloud,
        _normals: &[[f64; 3]],
        keypoints: &PointCloud,
        kind: DescriptorKind,
        radius: f64,
    ) -> Result<DescriptorSet, MapMergeError> {
        let index = PointIndex::new(cloud.points());
        let rows = keypoints
            .points()
            .iter()
            .map(|p| {
                let mut distances = index
                    .within(p, radius)
                    .iter()
                    .map(|n| n.squared_distance.sqrt())
                    .collect::<Vec<_>>();
                distances.sort_by(|a, b| a.total_cmp(b));
                let mut row = distances
                    .iter()
                    .skip(1)
                    .take(NUM_NEIGHBORS)
                    .map(|&d| d as f32)
                    .collect::<Vec<_>>();
                row.resize(kind.dimension(), 0.0);
                row
            })
            .collect::<Vec<_>>();
        Ok(DescriptorSet::from_rows(kind, &rows)?)
    }
}

fn random_pose(rng: &mut StdRng) -> Result<RigidTransform, MapMergeError> {
    let axis = [
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(0.2..1.0),
    ];
    let rotation = axis_angle_to_rotation_matrix(&axis, rng.random_range(-3.0..3.0))?;
    Ok(RigidTransform::from_rotation_translation(
        rotation,
        [
            rng.random_range(-5.0..5.0),
            rng.random_range(-5.0..5.0),
            rng.random_range(-1.0..1.0),
        ],
    ))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let params = match &args.config {
        Some(path) => MapMergeParams::from_json_file(path)?,
        None => MapMergeParams {
            resolution: 1e-3,
            descriptor_radius: 2.0,
            outliers_min_neighbours: 2,
            descriptor_type: DescriptorKind::Fpfh,
            estimation_method: args.method,
            inlier_threshold: 0.05,
            max_correspondence_distance: 0.1,
            transform_epsilon: 1e-10,
            confidence_threshold: 15.0,
            output_resolution: 0.01,
            ..Default::default()
        },
    };

    // map k covers the corridor slice [3k, 3k + 6)
    let mut rng = StdRng::seed_from_u64(args.seed);
    let length = 3.0 * (args.num_maps + 1) as f64;
    let world = (0..args.num_points)
        .map(|_| {
            [
                rng.random_range(0.0..length),
                rng.random_range(0.0..4.0),
                rng.random_range(0.0..2.0),
            ]
        })
        .collect::<Vec<_>>();

    let mut maps = Vec::with_capacity(args.num_maps);
    for k in 0..args.num_maps {
        let to_local = random_pose(&mut rng)?.inverse();
        let start = 3.0 * k as f64;
        let points = world
            .iter()
            .filter(|p| p[0] >= start && p[0] < start + 6.0)
            .map(|p| to_local.transform_point(p))
            .collect::<Vec<_>>();
        println!("map {}: #{} points", k, points.len());
        maps.push(PointCloud::from_points(points));
    }

    let (merged, report) = merge_maps(&NeighborDistances, &maps, &params)?;

    for estimate in &report.estimates {
        println!(
            "pair ({}, {}): confidence {:.2}",
            estimate.source_idx, estimate.target_idx, estimate.confidence
        );
    }
    println!("reference map: {}", report.reference);
    for (i, transform) in report.global_transforms.iter().enumerate() {
        match transform {
            Some(t) => println!("map {}: {:?}", i, t.to_matrix()),
            None => println!("map {}: not registered", i),
        }
    }
    println!("merged map: #{} points", merged.len());

    if let Some(path) = args.output {
        let json = serde_json::to_string_pretty(&report.global_transforms.to_matrices())?;
        std::fs::write(&path, json)?;
        log::info!("global transforms written to {}", path.display());
    }

    Ok(())
}
