//! track-engine CLI - inspection tool for GPX tracks
//!
//! Usage:
//!   track-engine-cli stats <files...>
//!   track-engine-cli merge <files...> [--mode gain] [--json]
//!   track-engine-cli probe <file> --at <km>
//!   track-engine-cli filter <files...> [--keyword K] [--from DATE] [--to DATE] [--bounds S,W,N,E]
//!
//! Files that fail to read or parse are reported and skipped.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use track_engine::{
    compute_stats, filter_tracks, interpolate_track, merge_tracks, next_color, parse_gpx, Bounds,
    SeriesMode, Track, TrackFilter,
};

#[derive(Parser)]
#[command(name = "track-engine-cli")]
#[command(about = "Inspect, merge and probe GPX tracks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print per-file statistics
    Stats {
        /// GPX files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Merge files chronologically into one series
    Merge {
        /// GPX files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Series mode: elevation, delta or gain
        #[arg(short, long, default_value = "elevation", value_parser = parse_mode)]
        mode: SeriesMode,

        /// Print the merged series as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interpolate a single track at a distance
    Probe {
        /// GPX file
        file: PathBuf,

        /// Distance along the track in kilometres
        #[arg(long)]
        at: f64,
    },

    /// List files matching a filter
    Filter {
        /// GPX files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Case-insensitive name substring
        #[arg(short, long, default_value = "")]
        keyword: String,

        /// First included day (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last included day (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Bounding box as south,west,north,east
        #[arg(long, value_parser = parse_bounds)]
        bounds: Option<Bounds>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    match cli.command {
        Commands::Stats { files } => run_stats(&files),
        Commands::Merge { files, mode, json } => run_merge(&files, mode, json),
        Commands::Probe { file, at } => run_probe(&file, at),
        Commands::Filter {
            files,
            keyword,
            from,
            to,
            bounds,
        } => {
            let mut filter = TrackFilter::keyword(keyword).with_dates(from, to);
            if let Some(bounds) = bounds {
                filter = filter.with_bounds(bounds);
            }
            run_filter(&files, &filter);
        }
    }
}

fn parse_mode(s: &str) -> Result<SeriesMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "elevation" => Ok(SeriesMode::Elevation),
        "delta" => Ok(SeriesMode::Delta),
        "gain" => Ok(SeriesMode::Gain),
        other => Err(format!("unknown mode '{}' (expected elevation, delta or gain)", other)),
    }
}

fn parse_bounds(s: &str) -> Result<Bounds, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<Result<_, _>>()?;
    match values.as_slice() {
        [south, west, north, east] => Ok(Bounds::new(*south, *west, *north, *east)),
        _ => Err("expected four values: south,west,north,east".to_string()),
    }
}

/// Read and parse one file, reporting failures.
fn load_track(path: &Path) -> Option<Track> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("  ✗ {}: {}", path.display(), e);
            return None;
        }
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    match parse_gpx(&text) {
        Ok(parsed) => Some(parsed.into_track(file_name.clone(), file_name, next_color())),
        Err(e) => {
            eprintln!("  ✗ {}: {}", path.display(), e);
            None
        }
    }
}

fn load_tracks(files: &[PathBuf]) -> Vec<Track> {
    let tracks: Vec<Track> = files.iter().filter_map(|p| load_track(p)).collect();
    log::info!("Loaded {}/{} files", tracks.len(), files.len());
    tracks
}

fn format_ele(ele: Option<f64>) -> String {
    ele.map(|e| format!("{:.0}m", e)).unwrap_or_else(|| "-".to_string())
}

fn run_stats(files: &[PathBuf]) {
    println!("\n{}", "=".repeat(60));
    println!("TRACK STATISTICS");
    println!("{}", "=".repeat(60));

    for track in load_tracks(files) {
        let stats = compute_stats(&track.points);
        println!("\n  {} ({})", track.meta.name, track.meta.file_name);
        println!("    Points:    {}", stats.point_count);
        println!("    Distance:  {:.2} km", stats.total_distance);
        println!("    Gain:      {:.0} m", stats.elevation_gain);
        println!(
            "    Elevation: {} .. {}",
            format_ele(stats.min_ele),
            format_ele(stats.max_ele)
        );
        if let (Some(start), Some(end)) = (stats.started_at, stats.finished_at) {
            println!("    Time:      {} -> {}", start, end);
        }
    }
}

fn run_merge(files: &[PathBuf], mode: SeriesMode, json: bool) {
    let tracks = load_tracks(files);
    let merged = merge_tracks(&tracks, mode);

    if json {
        match serde_json::to_string_pretty(&merged) {
            Ok(out) => println!("{}", out),
            Err(e) => eprintln!("Failed to serialize merged series: {}", e),
        }
        return;
    }

    println!("\n{}", "=".repeat(60));
    println!("MERGED SERIES ({:?})", mode);
    println!("{}", "=".repeat(60));
    println!("  Tracks:         {}", tracks.len());
    println!("  Points:         {}", merged.points.len());
    println!("  Total distance: {:.2} km", merged.total_distance);
    println!("  Total gain:     {:.0} m", merged.total_gain);
}

fn run_probe(file: &Path, at: f64) {
    let Some(track) = load_track(file) else {
        return;
    };

    match interpolate_track(&track, at) {
        Some(hit) => {
            println!("  {} @ {:.3} km", track.meta.name, hit.distance);
            println!("    Position:  {:.6}, {:.6}", hit.lat, hit.lng);
            println!("    Elevation: {}", format_ele(hit.ele));
            if let Some(time) = hit.time {
                println!("    Time:      {}", time);
            }
        }
        None => println!(
            "  {:.3} km is outside the track (0 .. {:.3} km)",
            at,
            track.total_distance()
        ),
    }
}

fn run_filter(files: &[PathBuf], filter: &TrackFilter) {
    let tracks = load_tracks(files);
    let metas: Vec<_> = tracks.iter().map(|t| &t.meta).collect();
    let matches = filter_tracks(&metas, filter);

    println!("\n{} of {} tracks match", matches.len(), tracks.len());
    for meta in matches {
        let date = meta
            .time
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        println!("  {}  {}  ({})", date, meta.name, meta.file_name);
    }
}
