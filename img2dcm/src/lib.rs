//! Conversion of general purpose images into DICOM files.
//!
//! This crate turns a JPEG or PNG image
//! into a minimal [Secondary Capture][1] DICOM file
//! with uncompressed 8-bit samples,
//! encoded in Explicit VR Little Endian.
//!
//! The conversion happens in three steps:
//!
//! 1. the image is decoded and normalized
//!    into 8-bit grayscale or RGB ([`loader`]);
//! 2. the attributes of the new DICOM object are derived
//!    from the image and the caller's [`ConversionOptions`] ([`dataset`]);
//! 3. the object is written to a file,
//!    prefixed by the preamble and the file meta group ([`writer`]).
//!
//! # Example
//!
//! ```no_run
//! use img2dcm::{convert, ConversionOptions};
//!
//! # fn run() -> Result<(), img2dcm::Error> {
//! let options = ConversionOptions::default()
//!     .with_patient_name("DOE^John")
//!     .with_patient_id("12345")
//!     .monochrome();
//! let record = convert("xray.jpg", "xray.dcm", &options)?;
//! println!("SOP Instance UID: {}", record.identity().sop_instance_uid);
//! # Ok(())
//! # }
//! ```
//!
//! [1]: https://dicom.nema.org/medical/dicom/current/output/chtml/part03/sect_A.8.html
use std::path::Path;

use snafu::{ResultExt, Snafu};
use tracing::debug;

pub mod dataset;
pub mod loader;
pub mod options;
pub mod uid;
pub mod writer;

pub use crate::dataset::{
    DatasetBuilder, DatasetRecord, PhotometricInterpretation, StudyIdentity,
};
pub use crate::loader::{open_image, ColorMode, SourceImage};
pub use crate::options::ConversionOptions;
pub use crate::uid::{RandomUidGenerator, UidGenerator};
pub use crate::writer::{write_dicom, write_dicom_file};

/// An error which may occur when converting an image
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read input image"))]
    Decode { source: loader::LoadError },
    #[snafu(display("Could not build DICOM data set"))]
    Build { source: dataset::BuildError },
    #[snafu(display("Could not write DICOM file"))]
    Write { source: writer::WriteError },
}

impl Error {
    /// The process exit code for this error:
    /// 1 for problems with the input image,
    /// 2 for problems with the output file.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Decode { .. } | Error::Build { .. } => 1,
            Error::Write { .. } => 2,
        }
    }
}

/// Convert the image at `input` into a DICOM file at `output`,
/// generating random UIDs for the identifiers not given in `options`.
///
/// Returns the record of the attributes written.
pub fn convert<I, O>(
    input: I,
    output: O,
    options: &ConversionOptions,
) -> Result<DatasetRecord, Error>
where
    I: AsRef<Path>,
    O: AsRef<Path>,
{
    convert_with(input, output, options, RandomUidGenerator)
}

/// Convert the image at `input` into a DICOM file at `output`,
/// obtaining missing identifiers from the given UID generator.
pub fn convert_with<I, O, G>(
    input: I,
    output: O,
    options: &ConversionOptions,
    uid_generator: G,
) -> Result<DatasetRecord, Error>
where
    I: AsRef<Path>,
    O: AsRef<Path>,
    G: UidGenerator,
{
    let output = output.as_ref();

    let image = open_image(input, options.color_mode()).context(DecodeSnafu)?;

    let record = DatasetBuilder::new(options)
        .with_uid_generator(uid_generator)
        .build(image)
        .context(BuildSnafu)?;

    write_dicom_file(&record, output).context(WriteSnafu)?;

    debug!(
        "{}x{} {} image saved to {}",
        record.columns(),
        record.rows(),
        record.photometric_interpretation(),
        output.display()
    );

    Ok(record)
}
