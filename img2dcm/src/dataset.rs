//! Attribute building for the Secondary Capture data set.
//!
//! A [`DatasetBuilder`] takes a decoded [`SourceImage`]
//! and the caller's [`ConversionOptions`],
//! and produces a [`DatasetRecord`]:
//! the complete set of attributes to be written,
//! including the raw pixel data.
use std::fmt;

use chrono::{Local, NaiveDateTime};
use dicom_core::{value::PrimitiveValue, DataElement, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_encoding::TransferSyntax;
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use dicom_transfer_syntax_registry::entries;
use snafu::{ensure, Snafu};
use tracing::{debug, warn};

use crate::loader::{ColorMode, SourceImage};
use crate::options::ConversionOptions;
use crate::uid::{is_valid_uid, RandomUidGenerator, UidGenerator};

/// UID of the only transfer syntax produced by this converter
pub const TRANSFER_SYNTAX_UID: &str = uids::EXPLICIT_VR_LITTLE_ENDIAN;

/// An error which may occur when building the data set
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum BuildError {
    #[snafu(display("Invalid image dimensions {}x{}", columns, rows))]
    InvalidImage { columns: u32, rows: u32 },
}

/// Photometric Interpretation of the converted image
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum PhotometricInterpretation {
    Monochrome2,
    Rgb,
}

impl PhotometricInterpretation {
    pub fn as_str(self) -> &'static str {
        match self {
            PhotometricInterpretation::Monochrome2 => "MONOCHROME2",
            PhotometricInterpretation::Rgb => "RGB",
        }
    }

    /// The sample layout of the pixel data.
    pub fn color_mode(self) -> ColorMode {
        match self {
            PhotometricInterpretation::Monochrome2 => ColorMode::Monochrome,
            PhotometricInterpretation::Rgb => ColorMode::Rgb,
        }
    }

    pub fn samples_per_pixel(self) -> u16 {
        self.color_mode().samples_per_pixel()
    }
}

impl From<ColorMode> for PhotometricInterpretation {
    fn from(mode: ColorMode) -> Self {
        match mode {
            ColorMode::Monochrome => PhotometricInterpretation::Monochrome2,
            ColorMode::Rgb => PhotometricInterpretation::Rgb,
        }
    }
}

impl fmt::Display for PhotometricInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identifiers of the study, series and instance of a converted image.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct StudyIdentity {
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
}

/// The file meta information of a converted image,
/// as borrowed from its [`DatasetRecord`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FileMetaHeader<'a> {
    pub media_storage_sop_class_uid: &'a str,
    pub media_storage_sop_instance_uid: &'a str,
    pub transfer_syntax: &'a str,
    pub implementation_class_uid: &'a str,
}

impl FileMetaHeader<'_> {
    /// Prepare a file meta table builder with these values.
    pub fn to_table_builder(&self) -> FileMetaTableBuilder {
        FileMetaTableBuilder::new()
            .media_storage_sop_class_uid(self.media_storage_sop_class_uid)
            .media_storage_sop_instance_uid(self.media_storage_sop_instance_uid)
            .transfer_syntax(self.transfer_syntax)
            .implementation_class_uid(self.implementation_class_uid)
    }
}

/// All attributes of a Secondary Capture image with 8-bit samples,
/// plus its pixel data.
///
/// The pixel data length always equals
/// `rows * columns * samples_per_pixel`.
pub struct DatasetRecord {
    patient_name: String,
    patient_id: String,
    modality: String,
    sop_class_uid: String,
    identity: StudyIdentity,
    implementation_class_uid: String,
    created: NaiveDateTime,
    photometric_interpretation: PhotometricInterpretation,
    rows: u16,
    columns: u16,
    pixel_data: Vec<u8>,
    transfer_syntax: TransferSyntax,
}

impl fmt::Debug for DatasetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetRecord")
            .field("patient_name", &self.patient_name)
            .field("patient_id", &self.patient_id)
            .field("modality", &self.modality)
            .field("sop_class_uid", &self.sop_class_uid)
            .field("identity", &self.identity)
            .field("implementation_class_uid", &self.implementation_class_uid)
            .field("created", &self.created)
            .field("photometric_interpretation", &self.photometric_interpretation)
            .field("rows", &self.rows)
            .field("columns", &self.columns)
            .field("pixel_data", &format_args!("[{} bytes]", self.pixel_data.len()))
            .field("transfer_syntax", &self.transfer_syntax.uid())
            .finish()
    }
}

impl DatasetRecord {
    pub fn patient_name(&self) -> &str {
        &self.patient_name
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn modality(&self) -> &str {
        &self.modality
    }

    pub fn sop_class_uid(&self) -> &str {
        &self.sop_class_uid
    }

    pub fn identity(&self) -> &StudyIdentity {
        &self.identity
    }

    pub fn implementation_class_uid(&self) -> &str {
        &self.implementation_class_uid
    }

    /// The instant at which the record was built.
    /// Both the study and the instance creation date/time are taken from it.
    pub fn created(&self) -> NaiveDateTime {
        self.created
    }

    /// `YYYYMMDD`
    pub fn study_date(&self) -> String {
        self.created.format("%Y%m%d").to_string()
    }

    /// `HHMMSS`
    pub fn study_time(&self) -> String {
        self.created.format("%H%M%S").to_string()
    }

    pub fn instance_creation_date(&self) -> String {
        self.study_date()
    }

    pub fn instance_creation_time(&self) -> String {
        self.study_time()
    }

    pub fn photometric_interpretation(&self) -> PhotometricInterpretation {
        self.photometric_interpretation
    }

    pub fn samples_per_pixel(&self) -> u16 {
        self.photometric_interpretation.samples_per_pixel()
    }

    /// Always interleaved (0) for color images,
    /// absent for grayscale images.
    pub fn planar_configuration(&self) -> Option<u16> {
        match self.photometric_interpretation {
            PhotometricInterpretation::Rgb => Some(0),
            PhotometricInterpretation::Monochrome2 => None,
        }
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn bits_allocated(&self) -> u16 {
        8
    }

    pub fn bits_stored(&self) -> u16 {
        8
    }

    pub fn high_bit(&self) -> u16 {
        7
    }

    /// Always unsigned (0).
    pub fn pixel_representation(&self) -> u16 {
        0
    }

    pub fn pixel_data(&self) -> &[u8] {
        &self.pixel_data
    }

    /// The transfer syntax in which the data set is to be encoded.
    pub fn transfer_syntax(&self) -> &TransferSyntax {
        &self.transfer_syntax
    }

    /// The file meta information to write before the data set.
    ///
    /// Its transfer syntax UID is always the one of [`transfer_syntax`](Self::transfer_syntax).
    pub fn file_meta_header(&self) -> FileMetaHeader<'_> {
        FileMetaHeader {
            media_storage_sop_class_uid: &self.sop_class_uid,
            media_storage_sop_instance_uid: &self.identity.sop_instance_uid,
            transfer_syntax: self.transfer_syntax.uid(),
            implementation_class_uid: &self.implementation_class_uid,
        }
    }

    /// Create a DICOM object with all attributes of this record.
    ///
    /// Values are padded to an even length here:
    /// text with a space, UIDs with a null character,
    /// and pixel data with a zero byte.
    pub fn to_object(&self) -> InMemDicomObject {
        let date = self.study_date();
        let time = self.study_time();

        let mut elements = vec![
            DataElement::new(tags::INSTANCE_CREATION_DATE, VR::DA, text(VR::DA, &date)),
            DataElement::new(tags::INSTANCE_CREATION_TIME, VR::TM, text(VR::TM, &time)),
            DataElement::new(tags::SOP_CLASS_UID, VR::UI, text(VR::UI, &self.sop_class_uid)),
            DataElement::new(
                tags::SOP_INSTANCE_UID,
                VR::UI,
                text(VR::UI, &self.identity.sop_instance_uid),
            ),
            DataElement::new(tags::STUDY_DATE, VR::DA, text(VR::DA, &date)),
            DataElement::new(tags::STUDY_TIME, VR::TM, text(VR::TM, &time)),
            DataElement::new(tags::MODALITY, VR::CS, text(VR::CS, &self.modality)),
            DataElement::new(tags::PATIENT_NAME, VR::PN, text(VR::PN, &self.patient_name)),
            DataElement::new(tags::PATIENT_ID, VR::LO, text(VR::LO, &self.patient_id)),
            DataElement::new(
                tags::STUDY_INSTANCE_UID,
                VR::UI,
                text(VR::UI, &self.identity.study_instance_uid),
            ),
            DataElement::new(
                tags::SERIES_INSTANCE_UID,
                VR::UI,
                text(VR::UI, &self.identity.series_instance_uid),
            ),
            DataElement::new(
                tags::SAMPLES_PER_PIXEL,
                VR::US,
                PrimitiveValue::from(self.samples_per_pixel()),
            ),
            DataElement::new(
                tags::PHOTOMETRIC_INTERPRETATION,
                VR::CS,
                text(VR::CS, self.photometric_interpretation.as_str()),
            ),
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(self.rows)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(self.columns)),
            DataElement::new(
                tags::BITS_ALLOCATED,
                VR::US,
                PrimitiveValue::from(self.bits_allocated()),
            ),
            DataElement::new(
                tags::BITS_STORED,
                VR::US,
                PrimitiveValue::from(self.bits_stored()),
            ),
            DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(self.high_bit())),
            DataElement::new(
                tags::PIXEL_REPRESENTATION,
                VR::US,
                PrimitiveValue::from(self.pixel_representation()),
            ),
        ];

        if let Some(planar_configuration) = self.planar_configuration() {
            elements.push(DataElement::new(
                tags::PLANAR_CONFIGURATION,
                VR::US,
                PrimitiveValue::from(planar_configuration),
            ));
        }

        let mut pixel_data = self.pixel_data.clone();
        if pixel_data.len() % 2 == 1 {
            pixel_data.push(0);
        }
        elements.push(DataElement::new(
            tags::PIXEL_DATA,
            VR::OB,
            PrimitiveValue::from(pixel_data),
        ));

        InMemDicomObject::from_element_iter(elements)
    }
}

/// Text value padded to an even length as required for the given VR.
fn text(vr: VR, value: &str) -> PrimitiveValue {
    let mut value = value.to_string();
    if value.len() % 2 == 1 {
        value.push(if vr == VR::UI { '\0' } else { ' ' });
    }
    PrimitiveValue::from(value)
}

/// Builds [`DatasetRecord`]s from decoded images.
///
/// Identifiers missing from the options
/// are obtained from the builder's UID generator.
#[derive(Debug)]
pub struct DatasetBuilder<'a, G = RandomUidGenerator> {
    options: &'a ConversionOptions,
    uid_generator: G,
}

impl<'a> DatasetBuilder<'a> {
    /// Create a builder generating random UIDs.
    pub fn new(options: &'a ConversionOptions) -> Self {
        DatasetBuilder {
            options,
            uid_generator: RandomUidGenerator,
        }
    }
}

impl<'a, G> DatasetBuilder<'a, G>
where
    G: UidGenerator,
{
    /// Replace the source of new UIDs.
    pub fn with_uid_generator<H>(self, uid_generator: H) -> DatasetBuilder<'a, H>
    where
        H: UidGenerator,
    {
        DatasetBuilder {
            options: self.options,
            uid_generator,
        }
    }

    /// Build a record for the given image,
    /// stamped with the current local time.
    pub fn build(&mut self, image: SourceImage) -> Result<DatasetRecord, BuildError> {
        let now = Local::now().naive_local();
        self.build_at(image, now)
    }

    /// Build a record for the given image,
    /// stamped with the given date and time.
    pub fn build_at(
        &mut self,
        image: SourceImage,
        timestamp: NaiveDateTime,
    ) -> Result<DatasetRecord, BuildError> {
        let columns = image.columns();
        let rows = image.rows();
        let (columns, rows) = match (u16::try_from(columns), u16::try_from(rows)) {
            (Ok(c), Ok(r)) if c > 0 && r > 0 => (c, r),
            _ => return InvalidImageSnafu { columns, rows }.fail(),
        };

        let photometric_interpretation = PhotometricInterpretation::from(image.color_mode());
        let pixel_data = image.into_data();
        let expected_len = rows as usize
            * columns as usize
            * photometric_interpretation.samples_per_pixel() as usize;
        ensure!(
            pixel_data.len() == expected_len,
            InvalidImageSnafu {
                columns: columns as u32,
                rows: rows as u32,
            }
        );

        let options = self.options;
        let identity = StudyIdentity {
            study_instance_uid: self.uid_or_generate(options.study_instance_uid.as_deref()),
            series_instance_uid: self.uid_or_generate(options.series_instance_uid.as_deref()),
            sop_instance_uid: self.uid_or_generate(options.sop_instance_uid.as_deref()),
        };
        let implementation_class_uid =
            self.uid_or_generate(options.implementation_class_uid.as_deref());

        debug!(
            "Study {}, series {}, instance {}",
            identity.study_instance_uid, identity.series_instance_uid, identity.sop_instance_uid
        );

        Ok(DatasetRecord {
            patient_name: options.patient_name.clone(),
            patient_id: options.patient_id.clone(),
            modality: options.modality.clone(),
            sop_class_uid: options.sop_class_uid.clone(),
            identity,
            implementation_class_uid,
            created: timestamp,
            photometric_interpretation,
            rows,
            columns,
            pixel_data,
            transfer_syntax: entries::EXPLICIT_VR_LITTLE_ENDIAN.erased(),
        })
    }

    fn uid_or_generate(&mut self, uid: Option<&str>) -> String {
        match uid.map(str::trim).filter(|uid| !uid.is_empty()) {
            Some(uid) => {
                if !is_valid_uid(uid) {
                    warn!("`{}` is not a valid UID, using it anyway", uid);
                }
                uid.to_string()
            }
            None => self.uid_generator.generate_uid(),
        }
    }
}
