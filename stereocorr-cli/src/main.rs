use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use stereocorr::image::io::{load_gray_buffer, save_disparity_image};
use stereocorr::{
    BlurPreFilter, CorrelatorView, Disparity, DisparityMap, LazyView, LogPreFilter, Metric,
    NullPreFilter, PreFilter, RasterView, Region,
};
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Stereo correlation CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MetricConfig {
    #[default]
    Zncc,
    Sad,
}

impl From<MetricConfig> for Metric {
    fn from(value: MetricConfig) -> Self {
        match value {
            MetricConfig::Zncc => Metric::Zncc,
            MetricConfig::Sad => Metric::Sad,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PreFilterConfig {
    #[default]
    None,
    Blur,
    Log,
}

impl PreFilterConfig {
    fn build(&self) -> Arc<dyn PreFilter> {
        match self {
            PreFilterConfig::None => Arc::new(NullPreFilter),
            PreFilterConfig::Blur => Arc::new(BlurPreFilter::default()),
            PreFilterConfig::Log => Arc::new(LogPreFilter::default()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchRangeJson {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
}

impl Default for SearchRangeJson {
    fn default() -> Self {
        Self {
            min_x: -50,
            min_y: -50,
            max_x: 50,
            max_y: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubpixelJson {
    horizontal: bool,
    vertical: bool,
    affine: bool,
}

impl Default for SubpixelJson {
    fn default() -> Self {
        Self {
            horizontal: true,
            vertical: true,
            affine: false,
        }
    }
}

fn default_kernel() -> [i32; 2] {
    [24, 24]
}

fn default_cross_corr() -> f32 {
    2.0
}

fn default_corr_score() -> f32 {
    0.3
}

fn default_tile_size() -> i32 {
    256
}

#[derive(Debug, Deserialize)]
struct ConfigJson {
    left: PathBuf,
    right: PathBuf,
    output: PathBuf,
    #[serde(default)]
    search_range: SearchRangeJson,
    #[serde(default = "default_kernel")]
    kernel_size: [i32; 2],
    #[serde(default = "default_cross_corr")]
    cross_corr_threshold: f32,
    #[serde(default = "default_corr_score")]
    corr_score_threshold: f32,
    #[serde(default)]
    subpixel: SubpixelJson,
    #[serde(default)]
    metric: MetricConfig,
    #[serde(default)]
    prefilter: PreFilterConfig,
    #[serde(default = "default_tile_size")]
    tile_size: i32,
    #[serde(default)]
    debug_prefix: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }
    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
            .init();
    }

    let config: ConfigJson = serde_json::from_str(&fs::read_to_string(&cli.config)?)?;

    let left = Arc::new(RasterView::<f32>::new(Arc::new(load_gray_buffer(
        &config.left,
    )?)));
    let right = Arc::new(RasterView::<f32>::new(Arc::new(load_gray_buffer(
        &config.right,
    )?)));

    let mut view = CorrelatorView::new(left, right, config.prefilter.build())?;
    let range = &config.search_range;
    view.set_search_range(Region::new(
        range.min_x,
        range.min_y,
        range.max_x,
        range.max_y,
    ));
    view.set_kernel_size((config.kernel_size[0], config.kernel_size[1]));
    view.set_cross_corr_threshold(config.cross_corr_threshold);
    view.set_corr_score_threshold(config.corr_score_threshold);
    view.set_subpixel_options(
        config.subpixel.horizontal,
        config.subpixel.vertical,
        config.subpixel.affine,
    );
    view.set_metric(config.metric.into());
    view.set_debug_prefix(config.debug_prefix.clone());

    let cols = view.cols();
    let rows = view.rows();
    let tile = config.tile_size.max(16);
    let mut out = DisparityMap::filled(cols as usize, rows as usize, Disparity::invalid())?;

    let mut ty = 0;
    while ty < rows {
        let mut tx = 0;
        while tx < cols {
            let region = Region::new(tx, ty, (tx + tile).min(cols), (ty + tile).min(rows));
            tracing::info!(
                min_x = region.min_x(),
                min_y = region.min_y(),
                width = region.width(),
                height = region.height(),
                "correlating tile"
            );
            let tile_map = view.materialize(region)?;
            for y in 0..tile_map.height() {
                for x in 0..tile_map.width() {
                    out.set(
                        region.min_x() as usize + x,
                        region.min_y() as usize + y,
                        tile_map.at(x, y),
                    );
                }
            }
            tx += tile;
        }
        ty += tile;
    }

    let valid = out.data().iter().filter(|d| d.is_valid()).count();
    save_disparity_image(&out, &config.output)?;
    println!(
        "{}x{} disparity map written to {} ({} valid pixels, {:.1}%)",
        cols,
        rows,
        config.output.display(),
        valid,
        100.0 * valid as f64 / (cols as f64 * rows as f64)
    );
    Ok(())
}
