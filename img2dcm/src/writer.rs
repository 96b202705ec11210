//! Serialization of a [`DatasetRecord`] into a DICOM file.
//!
//! The file consists of
//! a 128-byte preamble filled with zeros,
//! the magic code `DICM`,
//! the file meta group (always in Explicit VR Little Endian),
//! and the data set in the record's transfer syntax,
//! ending with the uncompressed pixel data.
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use tempfile::Builder;
use tracing::debug;

use crate::dataset::DatasetRecord;

/// Length of the file preamble in bytes
pub const PREAMBLE_LEN: usize = 128;
/// The DICOM magic code, written right after the preamble
pub const MAGIC_CODE: &[u8; 4] = b"DICM";

/// An error which may occur when writing a DICOM file
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum WriteError {
    #[snafu(display("Could not create directory '{}'", path.display()))]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Could not create temporary file for '{}'", path.display()))]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Could not write object preamble"))]
    WritePreamble { source: std::io::Error },
    #[snafu(display("Could not write magic code"))]
    WriteMagicCode { source: std::io::Error },
    #[snafu(display("Could not build file meta group"))]
    BuildMeta { source: dicom_object::meta::Error },
    #[snafu(display("Could not print meta group data set"))]
    PrintMetaDataSet { source: dicom_object::meta::Error },
    #[snafu(display("Could not print data set"))]
    PrintDataSet { source: dicom_object::WriteError },
    #[snafu(display("Could not flush output"))]
    Flush { source: std::io::Error },
    #[snafu(display("Could not set permissions of file '{}'", path.display()))]
    SetPermissions {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Could not write to file '{}'", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Could not move temporary file into '{}'", path.display()))]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },
}

/// Write the record as a complete DICOM file into the given writer.
///
/// The file meta group declares the record's transfer syntax,
/// which is also the one used to encode the data set.
pub fn write_dicom<W>(record: &DatasetRecord, to: W) -> Result<(), WriteError>
where
    W: Write,
{
    let mut to = BufWriter::new(to);

    to.write_all(&[0_u8; PREAMBLE_LEN])
        .context(WritePreambleSnafu)?;
    to.write_all(MAGIC_CODE).context(WriteMagicCodeSnafu)?;

    let meta = record
        .file_meta_header()
        .to_table_builder()
        .build()
        .context(BuildMetaSnafu)?;
    meta.write(&mut to).context(PrintMetaDataSetSnafu)?;

    let ts = record.transfer_syntax();
    debug!("Writing data set in {} ({:?})", ts.uid(), ts.endianness());
    record
        .to_object()
        .write_dataset_with_ts(&mut to, ts)
        .context(PrintDataSetSnafu)?;

    to.flush().context(FlushSnafu)?;
    Ok(())
}

/// Write the record as a DICOM file at the given path.
///
/// Missing parent directories are created.
/// The file is first written to a temporary file in the same directory,
/// which then replaces any existing file at `path`.
/// Should writing fail,
/// the temporary file is removed and `path` is left untouched.
///
/// A replaced file keeps its permissions.
/// A new file gets the same permissions as one created with [`File::create`].
pub fn write_dicom_file<P>(record: &DatasetRecord, path: P) -> Result<(), WriteError>
where
    P: AsRef<Path>,
{
    replace_file_with(path.as_ref(), |file| write_dicom(record, file))
}

fn replace_file_with<F>(path: &Path, write: F) -> Result<(), WriteError>
where
    F: FnOnce(&mut File) -> Result<(), WriteError>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).context(CreateDirectorySnafu { path: dir })?;

    let mut file = temp_file_builder()
        .tempfile_in(dir)
        .context(CreateFileSnafu { path })?;
    debug!("Writing into temporary file {}", file.path().display());

    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => {
            file.as_file()
                .set_permissions(metadata.permissions())
                .context(SetPermissionsSnafu { path })?;
        }
        _ => {}
    }

    write(file.as_file_mut())?;
    file.as_file()
        .sync_all()
        .context(WriteFileSnafu { path })?;

    file.persist(path).context(PersistSnafu { path })?;
    Ok(())
}

/// Temporary files are created with mode 0666 on Unix,
/// minus the process umask.
fn temp_file_builder<'a, 'b>() -> Builder<'a, 'b> {
    #[allow(unused_mut)]
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetBuilder;
    use crate::loader::{ColorMode, SourceImage};
    use crate::options::ConversionOptions;
    use dicom_dictionary_std::tags;
    use dicom_object::file::{OpenFileOptions, ReadPreamble};
    use image::{DynamicImage, GrayImage, Luma};
    use std::io;

    fn record() -> DatasetRecord {
        let img = GrayImage::from_fn(4, 2, |x, y| Luma([(y * 4 + x) as u8]));
        let source =
            SourceImage::from_dynamic_image(&DynamicImage::ImageLuma8(img), ColorMode::Monochrome);
        let options = ConversionOptions::default()
            .monochrome()
            .with_study_instance_uid("1.2.3.1")
            .with_series_instance_uid("1.2.3.2")
            .with_sop_instance_uid("1.2.3.3")
            .with_implementation_class_uid("1.2.3.4");
        DatasetBuilder::new(&options).build(source).unwrap()
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Accepts a limited number of bytes, then fails.
    struct ShortWriter {
        remaining: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
            }
            let n = buf.len().min(self.remaining);
            self.remaining -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn container_layout() {
        let mut out = Vec::new();
        write_dicom(&record(), &mut out).unwrap();

        assert!(out[..PREAMBLE_LEN].iter().all(|&b| b == 0));
        assert_eq!(&out[128..132], b"DICM");
        // (0002,0000) UL, explicit VR little endian
        assert_eq!(&out[132..138], &[0x02, 0x00, 0x00, 0x00, b'U', b'L']);
        // pixel data comes last, verbatim
        assert_eq!(&out[out.len() - 8..], &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn read_back() {
        let mut out = Vec::new();
        write_dicom(&record(), &mut out).unwrap();

        let obj = OpenFileOptions::new()
            .read_preamble(ReadPreamble::Always)
            .from_reader(&out[..])
            .unwrap();

        assert_eq!(
            obj.meta().transfer_syntax.trim_end_matches('\0'),
            "1.2.840.10008.1.2.1"
        );
        assert_eq!(
            obj.meta().media_storage_sop_instance_uid.trim_end_matches('\0'),
            "1.2.3.3"
        );
        assert_eq!(
            obj.meta().implementation_class_uid.trim_end_matches('\0'),
            "1.2.3.4"
        );
        assert_eq!(obj.element(tags::ROWS).unwrap().to_int::<u16>().unwrap(), 2);
        assert_eq!(obj.element(tags::COLUMNS).unwrap().to_int::<u16>().unwrap(), 4);
        let pixel_data = obj.element(tags::PIXEL_DATA).unwrap().to_bytes().unwrap();
        assert_eq!(&pixel_data[..], record().pixel_data());
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("out.dcm");

        write_dicom_file(&record(), &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[128..132], b"DICM");
        // no stray temporary files are left behind
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dcm");
        fs::write(&path, b"previous contents").unwrap();

        write_dicom_file(&record(), &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[128..132], b"DICM");
    }

    #[test]
    fn unwritable_destination_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = write_dicom_file(&record(), blocker.join("out.dcm")).unwrap_err();
        assert!(matches!(err, WriteError::CreateDirectory { .. }));
    }

    #[test]
    fn failing_writer_is_reported() {
        let err = write_dicom(&record(), ShortWriter { remaining: 200 }).unwrap_err();
        assert!(matches!(err, WriteError::Flush { .. }));
    }

    #[test]
    fn failed_write_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dcm");
        fs::write(&path, b"previous contents").unwrap();

        let record = record();
        let err = replace_file_with(&path, |file| {
            write_dicom(&record, ShortWriter { remaining: 200 })?;
            file.write_all(b"unreachable").context(FlushSnafu)
        })
        .unwrap_err();
        assert!(matches!(err, WriteError::Flush { .. }));

        assert_eq!(fs::read(&path).unwrap(), b"previous contents");
        assert_eq!(dir_entries(dir.path()), vec!["out.dcm"]);
    }

    #[test]
    fn partially_written_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dcm");
        fs::write(&path, b"previous contents").unwrap();

        let err = replace_file_with(&path, |file| {
            file.write_all(&[0; PREAMBLE_LEN]).context(WritePreambleSnafu)?;
            Err(io::Error::new(io::ErrorKind::Other, "no space left")).context(FlushSnafu)
        })
        .unwrap_err();
        assert!(matches!(err, WriteError::Flush { .. }));

        assert_eq!(fs::read(&path).unwrap(), b"previous contents");
        assert_eq!(dir_entries(dir.path()), vec!["out.dcm"]);
    }

    #[test]
    fn failed_persist_keeps_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dcm");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("inner"), b"inner contents").unwrap();

        let err = write_dicom_file(&record(), &path).unwrap_err();
        assert!(matches!(err, WriteError::Persist { .. }));
        // the temporary file is owned by the error until it is dropped
        drop(err);

        assert!(path.is_dir());
        assert_eq!(fs::read(path.join("inner")).unwrap(), b"inner contents");
        assert_eq!(dir_entries(dir.path()), vec!["out.dcm"]);
    }

    #[cfg(unix)]
    #[test]
    fn new_file_has_default_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dcm");
        let reference = dir.path().join("reference");
        fs::write(&reference, b"").unwrap();

        write_dicom_file(&record(), &path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        let expected = fs::metadata(&reference).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, expected);
    }

    #[cfg(unix)]
    #[test]
    fn replaced_file_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dcm");
        fs::write(&path, b"previous contents").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        write_dicom_file(&record(), &path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        assert_eq!(&fs::read(&path).unwrap()[128..132], b"DICM");
    }
}
