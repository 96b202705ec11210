//! A CLI tool for converting a JPEG/PNG image
//! into a minimal DICOM Secondary Capture file.
//!
//! The image is stored uncompressed with 8 bits per sample,
//! either as RGB (default) or as MONOCHROME2 (`--monochrome`),
//! and the file is encoded in Explicit VR Little Endian.
//!
//! Usage example:
//!
//! ```none
//! img2dcm -i xray.jpg -o xray.dcm --patient "DOE^John" --id 12345 --modality DX --monochrome
//! ```
use std::path::PathBuf;

use clap::Parser;
use img2dcm::options::{
    DEFAULT_MODALITY, DEFAULT_PATIENT_ID, DEFAULT_PATIENT_NAME, DEFAULT_SOP_CLASS_UID,
};
use img2dcm::ConversionOptions;
use snafu::{Report, ResultExt, Whatever};
use tracing::{error, Level};

/// Convert an image into a DICOM file (Secondary Capture)
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// Path to the input image (JPEG, PNG, ...)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Path to the output DICOM file
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Patient's Name, in DICOM PN format
    #[arg(long = "patient", default_value = DEFAULT_PATIENT_NAME)]
    patient_name: String,

    /// Patient ID
    #[arg(long = "id", default_value = DEFAULT_PATIENT_ID)]
    patient_id: String,

    /// Modality (e.g. DX, CR, OT)
    #[arg(long = "modality", default_value = DEFAULT_MODALITY)]
    modality: String,

    /// Convert the image to 8-bit grayscale (MONOCHROME2),
    /// recommended for X-ray images
    #[arg(long = "monochrome")]
    monochrome: bool,

    /// Study Instance UID (generated if not given)
    #[arg(long = "study-uid")]
    study_instance_uid: Option<String>,

    /// Series Instance UID (generated if not given)
    #[arg(long = "series-uid")]
    series_instance_uid: Option<String>,

    /// SOP Instance UID (generated if not given)
    #[arg(long = "instance-uid")]
    sop_instance_uid: Option<String>,

    /// SOP Class UID
    #[arg(long = "sop-class-uid", default_value = DEFAULT_SOP_CLASS_UID)]
    sop_class_uid: String,

    /// Print more information about the conversion
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let App {
        input,
        output,
        patient_name,
        patient_id,
        modality,
        monochrome,
        study_instance_uid,
        series_instance_uid,
        sop_instance_uid,
        sop_class_uid,
        verbose,
    } = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    let options = ConversionOptions {
        patient_name,
        patient_id,
        modality,
        sop_class_uid,
        study_instance_uid,
        series_instance_uid,
        sop_instance_uid,
        implementation_class_uid: None,
        monochrome,
    };

    match img2dcm::convert(&input, &output, &options) {
        Ok(_) => {
            println!("Saved DICOM to {}", output.display());
        }
        Err(e) => {
            let code = e.exit_code();
            error!("{}", Report::from_error(e));
            std::process::exit(code);
        }
    }
}
