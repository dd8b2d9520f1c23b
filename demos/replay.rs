use std::env;
use tracklog_core::location::GpxReplaySource;
use tracklog_core::presentation::LogPresenter;
use tracklog_core::recorder::{Recorder, StopOutcome};
use tracklog_core::storage::Storage;
use tracklog_core::{export_data, logs};

// Replays a GPX file as if it was a live recording and saves it as a track.
//   cargo run --example replay -- <file.gpx> [support_dir]
pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: {} <file.gpx> [support_dir]", args[0]);
        std::process::exit(1);
    }
    let gpx_file_path = &args[1];
    let support_dir = args.get(2).cloned().unwrap_or_else(|| ".".to_string());

    logs::init(&support_dir)?;
    let mut recorder = Recorder::new(
        Storage::init(support_dir)?,
        Box::new(GpxReplaySource::open(gpx_file_path)?),
        Box::new(LogPresenter),
    );

    recorder.start_recording()?;
    match recorder.stop_recording()? {
        StopOutcome::Saved(record) => println!(
            "saved track {}: {} points, {:.2} km in {}",
            record.id,
            record.point_count(),
            record.total_distance_km,
            record.duration
        ),
        StopOutcome::NothingToSave => println!("not enough points in {gpx_file_path}"),
    }

    let tracks = recorder.saved_tracks()?;
    println!("{} saved tracks", tracks.len());
    for record in &tracks {
        println!(
            "  {} started {} ({:.2} km, {})",
            record.id, record.started_at, record.total_distance_km, record.duration
        );
    }
    if recorder.storage().get_raw_data_mode() {
        for file in recorder.storage().list_all_raw_data()? {
            println!("raw data: {}", file.path);
        }
    }
    if let Some(last) = tracks.last() {
        let mut gpx = Vec::new();
        export_data::track_record_to_gpx_file(last, &mut gpx)?;
        println!("last track as gpx: {} bytes", gpx.len());
    }
    Ok(())
}
