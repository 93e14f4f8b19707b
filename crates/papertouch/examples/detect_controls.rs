use image::ImageReader;
use papertouch::preprocess::edge_map;
use papertouch::{EdgeMapConfig, EventLog, PaperDetector, ShapeClassifier};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <sheet.png> [out.json]", args[0]);
        std::process::exit(2);
    }

    let gray = ImageReader::open(&args[1])?.decode()?.to_luma8();

    let mut paper = PaperDetector::default();
    let sheet = if paper.detect_frame(&gray) {
        paper.rectify_source(518, 400)?
    } else {
        println!("No paper found; classifying the full frame.");
        gray
    };

    let mut log = EventLog::new();
    let controls = ShapeClassifier::default().classify(&edge_map(&sheet, &EdgeMapConfig::default()), &mut log);
    for (kind, count) in controls.summary() {
        println!("{}: {}", kind.plural(), count);
    }

    if let Some(out_path) = args.get(2) {
        std::fs::write(out_path, serde_json::to_string_pretty(&controls)?)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
