use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tm_core::Point2d;
use tm_map::{CellLabel, PlanarMap};
use tm_pyr::MapPyramid;

#[derive(Parser, Debug)]
#[command(name = "tm_gallery")]
#[command(about = "Run topomap segmentation on external map fixtures")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the map and report cell statistics.
    #[command(name = "build")]
    Build(BuildArgs),
    /// Reduce the map through a pyramid, merging small faces first.
    #[command(name = "reduce")]
    Reduce(ReduceArgs),
    /// Build with a label image and render it as a PNG.
    #[command(name = "rasterize")]
    Rasterize(BuildArgs),
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    #[arg(long, required = true)]
    input: PathBuf,
    #[arg(long, default_value = "out")]
    out: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct BuildArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Use the robust sigma sort with this tangent step distance.
    #[arg(long)]
    step_dist: Option<f64>,
    #[arg(long, default_value_t = 0.1)]
    min_dist: f64,
}

#[derive(Args, Debug, Clone)]
struct ReduceArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Merge faces whose area is below this threshold.
    #[arg(long, default_value_t = 16.0)]
    min_area: f64,
    /// Stop after this many merge operations (0 = no limit).
    #[arg(long, default_value_t = 0)]
    max_operations: usize,
}

/// Map description fixture: 1-based node and edge lists, entry 0 and
/// `null` entries are holes.
#[derive(Debug, Clone, Deserialize)]
struct MapFixture {
    width: usize,
    height: usize,
    nodes: Vec<Option<[f64; 2]>>,
    edges: Vec<Option<EdgeFixture>>,
}

#[derive(Debug, Clone, Deserialize)]
struct EdgeFixture(CellLabel, CellLabel, Vec<[f64; 2]>);

#[derive(Debug, Clone, Serialize)]
struct FaceDto {
    label: CellLabel,
    area: f64,
    pixel_area: i64,
    boundary_components: usize,
}

#[derive(Debug, Clone, Serialize)]
struct MapSummary {
    node_count: usize,
    edge_count: usize,
    face_count: usize,
    consistent: bool,
    faces: Vec<FaceDto>,
}

#[derive(Debug, Clone, Serialize)]
struct LevelDto {
    index: usize,
    node_count: usize,
    edge_count: usize,
    face_count: usize,
}

#[derive(Debug, Clone, Serialize)]
struct MetaReduce {
    min_area: f64,
    operations: usize,
    level_count: usize,
    levels: Vec<LevelDto>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Build(args) => run_build(args),
        Command::Reduce(args) => run_reduce(args),
        Command::Rasterize(args) => run_rasterize(args),
    }
}

fn run_build(args: BuildArgs) -> Result<()> {
    let out = prepare_out_dir(&args.common.out, "build")?;
    let map = build_map(&args, false)?;
    write_json(out.join("summary.json"), &summarize(&map)?)?;
    Ok(())
}

fn run_rasterize(args: BuildArgs) -> Result<()> {
    let out = prepare_out_dir(&args.common.out, "rasterize")?;
    let map = build_map(&args, true)?;
    write_json(out.join("summary.json"), &summarize(&map)?)?;
    save_label_image(out.join("labels.png"), &map)?;
    Ok(())
}

fn run_reduce(args: ReduceArgs) -> Result<()> {
    let out = prepare_out_dir(&args.common.out, "reduce")?;
    let build_args = BuildArgs {
        common: args.common.clone(),
        step_dist: None,
        min_dist: 0.1,
    };
    let map = build_map(&build_args, false)?;

    let mut pyramid = MapPyramid::new(map);
    let mut operations = 0_usize;
    loop {
        if args.max_operations != 0 && operations >= args.max_operations {
            break;
        }
        let Some(dart) = smallest_mergeable_face_dart(pyramid.top_level().map(), args.min_area)?
        else {
            break;
        };
        pyramid
            .merge_faces(dart)
            .context("merging a small face into its neighbor")?;
        operations += 1;
    }

    let mut levels = Vec::with_capacity(pyramid.level_count());
    for index in 0..pyramid.level_count() {
        let level = pyramid
            .get_level(index)
            .context("replaying an intermediate level")?;
        levels.push(LevelDto {
            index,
            node_count: level.map().node_count(),
            edge_count: level.map().edge_count(),
            face_count: level.map().face_count(),
        });
    }

    write_json(
        out.join("meta.json"),
        &MetaReduce {
            min_area: args.min_area,
            operations,
            level_count: pyramid.level_count(),
            levels,
        },
    )?;
    write_json(
        out.join("summary.json"),
        &summarize(pyramid.top_level().map())?,
    )?;
    Ok(())
}

fn build_map(args: &BuildArgs, label_image: bool) -> Result<PlanarMap> {
    let fixture = load_fixture(&args.common.input)?;
    let nodes: Vec<Option<Point2d>> = fixture
        .nodes
        .iter()
        .map(|slot| slot.map(|[x, y]| Point2d::new(x, y)))
        .collect();
    let edges: Vec<Option<(CellLabel, CellLabel, Vec<Point2d>)>> = fixture
        .edges
        .iter()
        .map(|slot| {
            slot.as_ref().map(|EdgeFixture(start, end, points)| {
                (
                    *start,
                    *end,
                    points.iter().map(|&[x, y]| Point2d::new(x, y)).collect(),
                )
            })
        })
        .collect();

    let mut map = PlanarMap::from_parts(&nodes, &edges, (fixture.width, fixture.height))
        .context("populating map cells")?;
    match args.step_dist {
        Some(step_dist) => map
            .sort_edges_eventually(step_dist, args.min_dist)
            .context("sorting dart rings (robust)")?,
        None => map
            .sort_edges_directly()
            .context("sorting dart rings")?,
    }
    map.init_contours().context("tracing contours")?;
    map.embed_faces(label_image).context("embedding faces")?;
    Ok(map)
}

fn summarize(map: &PlanarMap) -> Result<MapSummary> {
    let mut faces = Vec::with_capacity(map.face_count());
    for face in map.faces() {
        faces.push(FaceDto {
            label: face.label(),
            area: map.face_area(face.label())?,
            pixel_area: face.pixel_area(),
            boundary_components: face.anchors().len(),
        });
    }
    Ok(MapSummary {
        node_count: map.node_count(),
        edge_count: map.edge_count(),
        face_count: map.face_count(),
        consistent: map.check_consistency(),
        faces,
    })
}

/// Dart of the smallest finite face below the threshold, oriented so a
/// merge is possible (skips faces bounded entirely by bridges).
fn smallest_mergeable_face_dart(
    map: &PlanarMap,
    min_area: f64,
) -> Result<Option<tm_map::DartLabel>> {
    let mut best: Option<(f64, tm_map::DartLabel)> = None;
    for face in map.faces() {
        if face.label() == 0 {
            continue;
        }
        let area = map.face_area(face.label())?;
        if area >= min_area {
            continue;
        }
        let Some(&anchor) = face.anchors().first() else {
            continue;
        };
        let mut dart = map.dart(anchor);
        let start = dart;
        let non_bridge = loop {
            if !dart.edge()?.is_bridge() {
                break Some(dart.label());
            }
            dart = dart.next_phi()?;
            if dart == start {
                break None;
            }
        };
        if let Some(dart) = non_bridge
            && best.is_none_or(|(a, _)| area < a)
        {
            best = Some((area, dart));
        }
    }
    Ok(best.map(|(_, dart)| dart))
}

fn load_fixture(path: &Path) -> Result<MapFixture> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading map fixture {}", path.display()))?;
    let fixture: MapFixture =
        serde_json::from_str(&text).context("parsing map fixture JSON")?;
    if fixture.width == 0 || fixture.height == 0 {
        bail!("map fixture has an empty image size");
    }
    Ok(fixture)
}

fn prepare_out_dir(out: &Path, case: &str) -> Result<PathBuf> {
    let dir = out.join(case);
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    Ok(dir)
}

fn write_json<T: Serialize>(path: PathBuf, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing JSON output")?;
    fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Renders the label image: faces in stable pseudo-colors, edge pixels
/// black, uncovered pixels white.
fn save_label_image(path: PathBuf, map: &PlanarMap) -> Result<()> {
    let Some(img) = map.label_image() else {
        bail!("map was built without a label image");
    };
    let lut = map.face_label_lut();

    let mut out = RgbImage::new(img.width() as u32, img.height() as u32);
    for y in 0..img.height() {
        for x in 0..img.width() {
            let v = *img.get(x, y).expect("in range");
            let color = if v < 0 {
                Rgb([0, 0, 0])
            } else if v == 0 {
                Rgb([255, 255, 255])
            } else {
                face_color(lut.get(v as CellLabel))
            };
            out.put_pixel(x as u32, y as u32, color);
        }
    }
    out.save(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn face_color(label: CellLabel) -> Rgb<u8> {
    // splitmix-style scramble for visually distinct neighbors
    let mut h = label as u64 ^ 0x9E37_79B9_7F4A_7C15;
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    let h = h ^ (h >> 31);
    Rgb([
        64 + (h & 0x7F) as u8,
        64 + ((h >> 8) & 0x7F) as u8,
        64 + ((h >> 16) & 0x7F) as u8,
    ])
}
