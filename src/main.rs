// Aadhaar document verification from the command line.
// Reads a card image and a selfie image, then prints the verdict.

use std::path::PathBuf;
use std::sync::Arc;

use aadhaar_verify::{
    capture::StillImageCamera,
    models::{SessionNotice, VerificationConfig, VerificationResult},
    processing::{FaceSource, OcrProgress, TesseractEngine, UnavailableFaceEngine},
    VerificationError, VerificationSession,
};
use clap::Parser;
use log::info;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "aadhaar-verify", version, about = "Verify an Aadhaar card against a selfie")]
struct Args {
    /// Front side of the card (JPEG or PNG)
    #[arg(short, long)]
    document: PathBuf,

    /// Selfie image used in place of a live camera
    #[arg(short, long)]
    selfie: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the extracted name
    #[arg(long)]
    name: Option<String>,

    /// Override the extracted date of birth (DD/MM/YYYY)
    #[arg(long)]
    dob: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Write the document and selfie face thumbnails into this directory
    #[arg(long)]
    faces_dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    full_name: &'a str,
    date_of_birth: Option<String>,
    document_number: Option<&'a str>,
    result: &'a VerificationResult,
    notices: &'a [SessionNotice],
}

fn print_detailed_report(report: &Report) {
    println!("\n===============================================");
    println!("      AADHAAR VERIFICATION DETAILED REPORT");
    println!("===============================================\n");

    println!("DOCUMENT INFORMATION:");
    println!("  Name: {}", report.full_name);
    println!(
        "  Date of Birth: {}",
        report.date_of_birth.as_deref().unwrap_or("-")
    );
    println!("  Document Number: {}", report.document_number.unwrap_or("-"));

    println!("\nVERIFICATION STEPS:");
    println!(
        "  1. Face Match: {}% ({:?})",
        report.result.similarity, report.result.source
    );
    println!("  2. Age: {} years", report.result.age);

    if !report.notices.is_empty() {
        println!("\nNOTICES:");
        for notice in report.notices {
            println!("  - {:?}", notice);
        }
    }

    if !report.result.rejections.is_empty() {
        println!("\nISSUES FOUND:");
        for reason in &report.result.rejections {
            println!("  - {}", reason);
        }
    }

    if report.result.manual_review_required {
        println!("\nManual review required: face score comes from the visual fallback.");
    }

    println!(
        "\nVerification result: {}",
        if report.result.verified {
            "VERIFIED"
        } else {
            "REJECTED"
        }
    );
}

async fn run(args: Args) -> Result<(), VerificationError> {
    let config = match &args.config {
        Some(path) => VerificationConfig::from_file(path)?,
        None => VerificationConfig::default(),
    };

    let ocr = Arc::new(TesseractEngine::new(config.ocr.tessdata_path.clone()));
    let faces = Arc::new(UnavailableFaceEngine::new(
        "no face model backend is bundled with the command line tool",
    ));
    let mut session = VerificationSession::new(config, ocr, faces)?;

    let bytes = std::fs::read(&args.document)?;
    info!("Processing document {}", args.document.display());
    let progress = |update: OcrProgress| {
        info!(
            "OCR {:>3}% ({})",
            (update.fraction * 100.0).round(),
            update.configuration
        );
    };
    session.upload_document(&bytes, &progress).await?;

    if args.name.is_some() || args.dob.is_some() {
        session.correct_document(args.name.as_deref(), args.dob.as_deref())?;
    }

    session.begin_selfie()?;
    let mut camera = StillImageCamera::new(&args.selfie);
    session.capture_selfie(&mut camera).await?;
    let result = session.compare()?;

    if let Some(dir) = &args.faces_dir {
        std::fs::create_dir_all(dir)?;
        for (source, file) in [
            (FaceSource::Document, "document_face.jpg"),
            (FaceSource::Selfie, "selfie_face.jpg"),
        ] {
            if let Some(jpeg) = session.face_jpeg(source)? {
                let path = dir.join(file);
                std::fs::write(&path, jpeg)?;
                info!("Wrote {}", path.display());
            }
        }
    }

    let document = session.document().ok_or_else(|| {
        VerificationError::InvalidInput("Document record missing after comparison".to_string())
    })?;
    let report = Report {
        full_name: &document.full_name,
        date_of_birth: document
            .date_of_birth
            .map(|dob| dob.format("%d/%m/%Y").to_string()),
        document_number: document.document_number.as_deref(),
        result: &result,
        notices: session.notices(),
    };

    if args.json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| VerificationError::InvalidInput(format!("Could not render report: {}", e)))?;
        println!("{}", rendered);
    } else {
        print_detailed_report(&report);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        eprintln!("Error verifying document: {}", err);
        std::process::exit(1);
    }
}
