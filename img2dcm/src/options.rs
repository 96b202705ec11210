//! Caller parameters for a single conversion.
use dicom_dictionary_std::uids;

use crate::loader::ColorMode;

/// Default value of Patient's Name
pub const DEFAULT_PATIENT_NAME: &str = "ANON^PATIENT";
/// Default value of Patient ID
pub const DEFAULT_PATIENT_ID: &str = "0000";
/// Default value of Modality
pub const DEFAULT_MODALITY: &str = "DX";
/// Default SOP class: Secondary Capture Image Storage
pub const DEFAULT_SOP_CLASS_UID: &str = uids::SECONDARY_CAPTURE_IMAGE_STORAGE;

/// Options for converting an image into a DICOM object.
///
/// Identifiers which are left as `None` (or empty)
/// are generated anew on each conversion.
///
/// # Example
///
/// ```
/// # use img2dcm::ConversionOptions;
/// let options = ConversionOptions::default()
///     .with_patient_name("DOE^John")
///     .with_patient_id("12345")
///     .monochrome();
/// assert_eq!(options.modality, "DX");
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ConversionOptions {
    /// Patient's Name (0010,0010)
    pub patient_name: String,
    /// Patient ID (0010,0020)
    pub patient_id: String,
    /// Modality (0008,0060)
    pub modality: String,
    /// SOP Class UID, also used as the Media Storage SOP Class UID
    pub sop_class_uid: String,
    /// Study Instance UID (0020,000D)
    pub study_instance_uid: Option<String>,
    /// Series Instance UID (0020,000E)
    pub series_instance_uid: Option<String>,
    /// SOP Instance UID, also used as the Media Storage SOP Instance UID
    pub sop_instance_uid: Option<String>,
    /// Implementation Class UID of the file meta group
    pub implementation_class_uid: Option<String>,
    /// Convert the image to 8-bit grayscale (MONOCHROME2)
    /// instead of RGB
    pub monochrome: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        ConversionOptions {
            patient_name: DEFAULT_PATIENT_NAME.to_string(),
            patient_id: DEFAULT_PATIENT_ID.to_string(),
            modality: DEFAULT_MODALITY.to_string(),
            sop_class_uid: DEFAULT_SOP_CLASS_UID.to_string(),
            study_instance_uid: None,
            series_instance_uid: None,
            sop_instance_uid: None,
            implementation_class_uid: None,
            monochrome: false,
        }
    }
}

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patient_name(mut self, patient_name: impl Into<String>) -> Self {
        self.patient_name = patient_name.into();
        self
    }

    pub fn with_patient_id(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = patient_id.into();
        self
    }

    pub fn with_modality(mut self, modality: impl Into<String>) -> Self {
        self.modality = modality.into();
        self
    }

    pub fn with_sop_class_uid(mut self, uid: impl Into<String>) -> Self {
        self.sop_class_uid = uid.into();
        self
    }

    pub fn with_study_instance_uid(mut self, uid: impl Into<String>) -> Self {
        self.study_instance_uid = Some(uid.into());
        self
    }

    pub fn with_series_instance_uid(mut self, uid: impl Into<String>) -> Self {
        self.series_instance_uid = Some(uid.into());
        self
    }

    pub fn with_sop_instance_uid(mut self, uid: impl Into<String>) -> Self {
        self.sop_instance_uid = Some(uid.into());
        self
    }

    pub fn with_implementation_class_uid(mut self, uid: impl Into<String>) -> Self {
        self.implementation_class_uid = Some(uid.into());
        self
    }

    /// Convert the image to 8-bit grayscale.
    pub fn monochrome(mut self) -> Self {
        self.monochrome = true;
        self
    }

    /// The sample layout which the input image should be normalized into.
    pub fn color_mode(&self) -> ColorMode {
        if self.monochrome {
            ColorMode::Monochrome
        } else {
            ColorMode::Rgb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ConversionOptions::default();
        assert_eq!(options.patient_name, "ANON^PATIENT");
        assert_eq!(options.patient_id, "0000");
        assert_eq!(options.modality, "DX");
        assert_eq!(options.sop_class_uid, "1.2.840.10008.5.1.4.1.1.7");
        assert_eq!(options.study_instance_uid, None);
        assert_eq!(options.color_mode(), ColorMode::Rgb);
    }

    #[test]
    fn monochrome_selects_grayscale() {
        let options = ConversionOptions::new().with_modality("CR").monochrome();
        assert_eq!(options.modality, "CR");
        assert_eq!(options.color_mode(), ColorMode::Monochrome);
    }
}
