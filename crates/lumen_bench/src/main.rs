//! Lumen kd-tree benchmark.
//!
//! Builds a kd-tree over an OBJ file (or a procedural scene), then traces a
//! primary and a shadow ray per pixel with every traversal variant and
//! reports throughput. Optionally writes a shaded depth image and the build
//! statistics.

mod bucket;
mod camera;
mod scene;

use anyhow::{bail, Context, Result};
use bucket::{generate_buckets, shadow_bucket, trace_bucket, BucketResult, TraceMode, DEFAULT_BUCKET_SIZE};
use camera::Camera;
use lumen_accel::{KdTree, KdTreeConfig, StackDiscipline};
use lumen_math::Vec3;
use rayon::prelude::*;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

const USAGE: &str = "Usage: lumen_bench [options]
  --obj <file.obj>        Scene to load (default: procedural scene)
  --triangles <count>     Debris triangles in the procedural scene (default: 200000)
  --config <file.json>    kd-tree build configuration
  --size <width>x<height> Image resolution (default: 640x360)
  --out <image.ppm>       Write a shaded depth image
  --stats <stats.json>    Write build statistics";

#[derive(Debug)]
struct Options {
    obj: Option<PathBuf>,
    triangles: usize,
    config: Option<PathBuf>,
    width: u32,
    height: u32,
    out: Option<PathBuf>,
    stats: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            obj: None,
            triangles: 200_000,
            config: None,
            width: 640,
            height: 360,
            out: None,
            stats: None,
        }
    }
}

fn parse_args() -> Result<Options> {
    let mut options = Options::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        let mut value = || args.next().with_context(|| format!("{arg} needs a value\n{USAGE}"));
        match arg.as_str() {
            "--obj" => options.obj = Some(value()?.into()),
            "--triangles" => options.triangles = value()?.parse().context("--triangles")?,
            "--config" => options.config = Some(value()?.into()),
            "--size" => {
                let size = value()?;
                let (w, h) = size
                    .split_once('x')
                    .with_context(|| format!("Expected <width>x<height>, got '{size}'"))?;
                options.width = w.parse().context("image width")?;
                options.height = h.parse().context("image height")?;
            }
            "--out" => options.out = Some(value()?.into()),
            "--stats" => options.stats = Some(value()?.into()),
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => bail!("Unknown argument '{other}'\n{USAGE}"),
        }
    }

    if options.width == 0 || options.height == 0 {
        bail!("Image size must be non-zero");
    }
    Ok(options)
}

fn load_config(options: &Options) -> Result<KdTreeConfig> {
    let Some(path) = &options.config else {
        return Ok(KdTreeConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let config: KdTreeConfig =
        serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// One traversal variant's image and timings.
struct Pass {
    discipline: StackDiscipline,
    mode: TraceMode,
    buckets: Vec<BucketResult>,
    shadows: Vec<Vec<bool>>,
}

impl Pass {
    /// Number of pixels whose primary hit differs from `other`.
    fn mismatches(&self, other: &Pass) -> usize {
        self.buckets
            .iter()
            .zip(&other.buckets)
            .flat_map(|(a, b)| a.hits.iter().zip(&b.hits))
            .filter(|(a, b)| {
                a.is_valid() != b.is_valid() || (a.is_valid() && (a.t - b.t).abs() > 1e-4 * a.t.max(1.0))
            })
            .count()
    }
}

fn run_pass(
    tree: &KdTree,
    camera: &Camera,
    light: Vec3,
    epsilon: f32,
    discipline: StackDiscipline,
    mode: TraceMode,
) -> Pass {
    let buckets = generate_buckets(camera.image_width, camera.image_height, DEFAULT_BUCKET_SIZE);
    let pixels = (camera.image_width * camera.image_height) as f64;

    let start = Instant::now();
    let results: Vec<BucketResult> = buckets
        .par_iter()
        .map(|bucket| trace_bucket(bucket, camera, tree, discipline, mode))
        .collect();
    let primary_time = start.elapsed();

    let shadow_rays: usize = results.iter().map(BucketResult::hit_count).sum();
    let start = Instant::now();
    let shadows: Vec<Vec<bool>> = results
        .par_iter()
        .map(|result| shadow_bucket(result, tree, light, epsilon, discipline, mode))
        .collect();
    let shadow_time = start.elapsed();

    let occluded: usize = shadows.iter().flatten().filter(|&&o| o).count();
    log::info!(
        "{discipline:?}/{mode:?}: primary {:.2} Mrays/s ({:.1?}), shadow {:.2} Mrays/s ({:.1?}), {} hits, {} in shadow",
        pixels / primary_time.as_secs_f64().max(1e-9) / 1e6,
        primary_time,
        shadow_rays as f64 / shadow_time.as_secs_f64().max(1e-9) / 1e6,
        shadow_time,
        shadow_rays,
        occluded
    );

    Pass {
        discipline,
        mode,
        buckets: results,
        shadows,
    }
}

/// Write a binary PPM shading hits by distance and darkening shadowed pixels.
fn write_image(path: &Path, camera: &Camera, pass: &Pass) -> Result<()> {
    let width = camera.image_width as usize;
    let height = camera.image_height as usize;

    let (near, far) = pass
        .buckets
        .iter()
        .flat_map(|b| &b.hits)
        .filter(|hit| hit.is_valid())
        .fold((f32::INFINITY, 0.0f32), |(near, far), hit| (near.min(hit.t), far.max(hit.t)));
    let range = (far - near).max(1e-6);

    let mut rgb = vec![0u8; width * height * 3];
    for (result, shadows) in pass.buckets.iter().zip(&pass.shadows) {
        let bucket = result.bucket;
        for (local, (hit, &occluded)) in result.hits.iter().zip(shadows).enumerate() {
            let x = bucket.x as usize + local % bucket.width as usize;
            let y = bucket.y as usize + local / bucket.width as usize;
            let value = if hit.is_valid() {
                let depth = 1.0 - 0.8 * (hit.t - near) / range;
                let light = if occluded { 0.35 } else { 1.0 };
                (depth * light * 255.0) as u8
            } else {
                0
            };
            let offset = (y * width + x) * 3;
            rgb[offset..offset + 3].copy_from_slice(&[value, value, value]);
        }
    }

    let file = std::fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write!(writer, "P6\n{width} {height}\n255\n")?;
    writer.write_all(&rgb)?;
    writer.flush()?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let options = parse_args()?;
    let config = load_config(&options)?;
    log::info!("Build configuration: {}", serde_json::to_string(&config)?);

    let mut tree = KdTree::new(config);
    match &options.obj {
        Some(path) => {
            let triangles = scene::load_obj(path, &mut tree)?;
            log::info!("Loaded {triangles} triangles from {}", path.display());
        }
        None => {
            let primitives = scene::procedural(&mut tree, options.triangles, 7)?;
            log::info!("Generated procedural scene with {primitives} primitives");
        }
    }

    tree.build()?;
    let bbox = tree.bbox();

    let mut camera = Camera::new()
        .with_resolution(options.width, options.height)
        .framing(&bbox);
    camera.initialize();

    let extent = bbox.extents().length();
    let light = bbox.centroid() + Vec3::new(-0.3, 1.0, 0.4) * extent;
    let epsilon = 1e-5 * extent.max(1.0);

    let mut passes = Vec::new();
    for discipline in StackDiscipline::ALL {
        for mode in TraceMode::ALL {
            passes.push(run_pass(&tree, &camera, light, epsilon, discipline, mode));
        }
    }

    if let Some((reference, rest)) = passes.split_first() {
        for pass in rest {
            let mismatches = reference.mismatches(pass);
            if mismatches > 0 {
                log::warn!(
                    "{:?}/{:?} disagrees with {:?}/{:?} on {mismatches} pixels",
                    pass.discipline,
                    pass.mode,
                    reference.discipline,
                    reference.mode
                );
            }
        }

        if let Some(path) = &options.out {
            write_image(path, &camera, reference)?;
        }
    }

    if let (Some(path), Some(stats)) = (&options.stats, tree.stats()) {
        std::fs::write(path, serde_json::to_string_pretty(stats)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote build statistics to {}", path.display());
    }

    Ok(())
}
