use std::time::{Duration, Instant};

use anyhow::Context as _;
use indicatif::ProgressBar;
use minibvh::{
    BuildSettings, HostIntersector, Mesh, RayHit, RayIntersector as _, RayPayload, SplitMethod,
    bvh::TreeDump,
    geometry::{BarycentricCoordinates, FloatType, Ray, WorldVector},
    new_acceleration_structure,
};
use rand::{Rng as _, SeedableRng as _, rngs::SmallRng};

const USAGE: &str = "Usage: minibvh-cli <mesh.obj> [median|sah] [ray-count]";
const DEFAULT_RAY_COUNT: u32 = 100_000;

fn random_unit_vector(rng: &mut SmallRng) -> WorldVector {
    loop {
        let v = WorldVector::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        let norm_squared = v.norm_squared();
        if norm_squared > 1e-6 && norm_squared <= 1.0 {
            return v / norm_squared.sqrt();
        }
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let path = args.next().context(USAGE)?;
    let method: SplitMethod = args.next().as_deref().unwrap_or("sah").parse()?;
    let ray_count = args
        .next()
        .map(|s| s.parse::<u32>())
        .transpose()
        .context(USAGE)?
        .unwrap_or(DEFAULT_RAY_COUNT);

    let mut mesh = Mesh::with_obj(&path).with_context(|| format!("Loading {path}"))?;
    println!(
        "Loaded {} triangles with {} materials from {path}",
        mesh.triangles.len(),
        mesh.materials.len()
    );

    let mut bvh = new_acceleration_structure(method, BuildSettings::default());
    let bar = spinner("Building");
    bvh.build_cpu(&mut mesh.triangles)?;
    bar.finish_and_clear();

    println!("{}", bvh.statistics());
    log::trace!("{}", TreeDump(bvh.nodes()));

    let bounds = bvh.bounding_box();
    if bounds.is_empty() {
        println!("Mesh is empty, not casting any rays");
        return Ok(());
    }

    // Rays start on a sphere around the mesh and aim at its central part
    let center = bounds.center();
    let radius = (bounds.size().norm() * 0.5).max(1e-3);
    let mut rng = SmallRng::seed_from_u64(0);
    let rays: Vec<RayPayload> = (0..ray_count)
        .map(|_| {
            let origin = center + random_unit_vector(&mut rng) * (2.0 * radius);
            let target = center + random_unit_vector(&mut rng) * (0.5 * radius);
            RayPayload::new(&Ray::new(origin, target - origin), 0.0, FloatType::INFINITY)
        })
        .collect();
    let mut hits = vec![RayHit::miss(); rays.len()];

    let intersector = HostIntersector::new(bvh.nodes(), &mesh.triangles);
    let bar = spinner("Casting rays");
    let start = Instant::now();
    intersector.intersect_rays(&rays, &vec![ray_count], ray_count, &mut hits, true)?;
    let elapsed = start.elapsed();
    bar.finish_and_clear();

    let (hit_count, cos_sum) = rays
        .iter()
        .zip(hits.iter())
        .filter(|(_, hit)| hit.is_hit())
        .fold((0usize, 0.0), |(count, sum), (payload, hit)| {
            let normal = mesh.triangles[hit.primitive as usize]
                .shading_normal(&BarycentricCoordinates { u: hit.u, v: hit.v });
            let direction = WorldVector::from(payload.direction);
            (count + 1, sum + normal.dot(&direction).abs())
        });

    println!(
        "Cast {ray_count} rays in {elapsed:.2?} ({:.2} Mrays/s)",
        ray_count as f64 / elapsed.as_secs_f64().max(1e-9) / 1e6
    );
    println!(
        "Hit rate: {:.1}%, mean |cos| at hit: {:.3}",
        100.0 * hit_count as f64 / (ray_count.max(1)) as f64,
        if hit_count > 0 {
            cos_sum / hit_count as FloatType
        } else {
            0.0
        }
    );

    Ok(())
}
