use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use coinscan::core::{init_with_level, SlotLayout};
use coinscan::detect::slot_regions;
use coinscan::matching::ReferenceTemplateSet;
use coinscan::{calibrate_profile, classify_with_templates, detect_coins};

#[derive(Parser)]
#[command(name = "coinscan", version, about = "Six-coin column recognition")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect the six coin regions in a photo.
    Detect {
        /// Input image path.
        #[arg(long)]
        image: PathBuf,
    },
    /// Build a reference template set from sample images of both faces.
    Calibrate {
        /// Sample images of the front face.
        #[arg(long, required = true, num_args = 1..)]
        front: Vec<PathBuf>,
        /// Sample images of the back face.
        #[arg(long, required = true, num_args = 1..)]
        back: Vec<PathBuf>,
        /// Output path for the template blob.
        #[arg(long)]
        out: PathBuf,
    },
    /// Classify a photo against a stored template set.
    Classify {
        /// Input image path.
        #[arg(long)]
        image: PathBuf,
        /// Template blob produced by `calibrate`.
        #[arg(long)]
        templates: PathBuf,
        /// Use the fixed slot layout instead of contour detection.
        #[arg(long)]
        slots: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = init_with_level(level);

    match cli.command {
        Command::Detect { image } => {
            let gray = image::open(&image)?.to_luma8();
            let regions = detect_coins(&gray)?;
            let report: Vec<serde_json::Value> = regions
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "position": r.position,
                        "rect": r.rect_norm,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Calibrate { front, back, out } => {
            let front_samples = load_images(&front)?;
            let back_samples = load_images(&back)?;
            let calibrated = calibrate_profile(&front_samples, &back_samples)?;
            fs::write(&out, calibrated.templates.to_blob()?)?;
            eprintln!(
                "calibrated {} front and {} back templates (min_gap={:.3}, min_score={:.3})",
                calibrated.templates.front.descriptors.len(),
                calibrated.templates.back.descriptors.len(),
                calibrated.descriptor_calibration.min_gap,
                calibrated.descriptor_calibration.min_score,
            );
        }
        Command::Classify {
            image,
            templates,
            slots,
        } => {
            let gray = image::open(&image)?.to_luma8();
            let set = ReferenceTemplateSet::from_blob(&fs::read(&templates)?)?;

            let regions = if slots {
                slot_regions(&gray, &SlotLayout::default())
            } else {
                detect_coins(&gray)?
            };
            let reading = classify_with_templates(&regions, set)?;
            println!("{}", serde_json::to_string_pretty(&reading)?);
        }
    }

    Ok(())
}

fn load_images(paths: &[PathBuf]) -> Result<Vec<image::GrayImage>, Box<dyn Error>> {
    paths
        .iter()
        .map(|p| Ok(image::open(p)?.to_luma8()))
        .collect()
}
