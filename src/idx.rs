//! IDX (MNIST) file reader.
//!
//! Both files start with a big-endian `u32` magic number and item count.
//! Label files (magic 2049) then hold one byte per item. Image files
//! (magic 2051) hold big-endian row and column counts followed by
//! `rows * cols` bytes per item.
//!
//! Labels become one-hot rows and pixels become floats in `[0, 1]`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use crate::{Dataset, Error, Result};

pub const LABEL_MAGIC: u32 = 2049;
pub const IMAGE_MAGIC: u32 = 2051;

/// Decoded image file.
#[derive(Debug, Clone, PartialEq)]
pub struct Images {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    /// `count * rows * cols` values in `[0, 1]`, row-major per image.
    pub pixels: Vec<f32>,
}

impl Images {
    #[inline]
    pub fn item_size(&self) -> usize {
        self.rows * self.cols
    }
}

/// Read a label file into one-hot rows of length `classes`.
pub fn read_labels<R: Read>(mut r: R, classes: usize) -> Result<Vec<f32>> {
    if classes == 0 {
        return Err(Error::InvalidConfig("classes must be > 0".to_owned()));
    }
    expect_magic(&mut r, LABEL_MAGIC, "label")?;
    let count = read_u32(&mut r)? as usize;
    let bytes = read_payload(&mut r, count, "label")?;

    let len = count
        .checked_mul(classes)
        .ok_or_else(|| Error::InvalidData("label buffer size overflows usize".to_owned()))?;
    let mut one_hot = vec![0.0_f32; len];
    for (i, &label) in bytes.iter().enumerate() {
        let label = usize::from(label);
        if label >= classes {
            return Err(Error::InvalidData(format!(
                "label {label} at item {i} is out of range for {classes} classes"
            )));
        }
        one_hot[i * classes + label] = 1.0;
    }
    Ok(one_hot)
}

/// Read an image file, scaling bytes by `1 / 255`.
pub fn read_images<R: Read>(mut r: R) -> Result<Images> {
    expect_magic(&mut r, IMAGE_MAGIC, "image")?;
    let count = read_u32(&mut r)? as usize;
    let rows = read_u32(&mut r)? as usize;
    let cols = read_u32(&mut r)? as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidData(format!(
            "image dimensions must be > 0, got {rows}x{cols}"
        )));
    }

    let total = count
        .checked_mul(rows)
        .and_then(|v| v.checked_mul(cols))
        .ok_or_else(|| Error::InvalidData("image buffer size overflows usize".to_owned()))?;
    let bytes = read_payload(&mut r, total, "image")?;
    let pixels = bytes.iter().map(|&b| f32::from(b) / 255.0).collect();

    Ok(Images {
        count,
        rows,
        cols,
        pixels,
    })
}

/// Load a label file and an image file into a [`Dataset`].
pub fn load_dataset<P: AsRef<Path>, Q: AsRef<Path>>(
    labels_path: P,
    images_path: Q,
    classes: usize,
) -> Result<Dataset> {
    let labels_path = labels_path.as_ref();
    let images_path = images_path.as_ref();

    let labels = read_labels(BufReader::new(File::open(labels_path)?), classes)?;
    let images = read_images(BufReader::new(File::open(images_path)?))?;

    let label_count = labels.len() / classes;
    if label_count != images.count {
        return Err(Error::InvalidData(format!(
            "{} has {label_count} labels but {} has {} images",
            labels_path.display(),
            images_path.display(),
            images.count
        )));
    }

    debug!(
        "idx: loaded {} examples of {}x{} from {}",
        images.count,
        images.rows,
        images.cols,
        images_path.display()
    );

    let item_size = images.item_size();
    Dataset::from_flat(images.pixels, labels, item_size, classes)
}

fn expect_magic<R: Read>(r: &mut R, expected: u32, what: &str) -> Result<()> {
    let magic = read_u32(r)?;
    if magic != expected {
        return Err(Error::InvalidData(format!(
            "bad {what} file magic {magic}, expected {expected}"
        )));
    }
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0_u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Read exactly `len` bytes without trusting `len` for the allocation up front.
fn read_payload<R: Read>(r: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(Error::InvalidData(format!(
            "{what} file truncated: expected {len} bytes of data, found {}",
            buf.len()
        )));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn labels_become_one_hot_rows() {
        let mut bytes = header(&[LABEL_MAGIC, 3]);
        bytes.extend_from_slice(&[2, 0, 1]);
        let labels = read_labels(Cursor::new(bytes), 3).unwrap();
        assert_eq!(labels, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn images_scale_to_unit_interval() {
        let mut bytes = header(&[IMAGE_MAGIC, 2, 1, 2]);
        bytes.extend_from_slice(&[0, 255, 51, 102]);
        let images = read_images(Cursor::new(bytes)).unwrap();
        assert_eq!((images.count, images.rows, images.cols), (2, 1, 2));
        assert_eq!(images.item_size(), 2);
        assert_eq!(images.pixels, vec![0.0, 1.0, 0.2, 0.4]);
    }

    #[test]
    fn wrong_magic_is_invalid_data() {
        let bytes = header(&[IMAGE_MAGIC, 0]);
        let err = read_labels(Cursor::new(bytes), 10).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn out_of_range_label_is_rejected() {
        let mut bytes = header(&[LABEL_MAGIC, 1]);
        bytes.push(10);
        assert!(matches!(
            read_labels(Cursor::new(bytes), 10),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn truncated_files_fail_cleanly() {
        // Payload shorter than the declared count.
        let mut bytes = header(&[IMAGE_MAGIC, 2, 2, 2]);
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(
            read_images(Cursor::new(bytes)),
            Err(Error::InvalidData(_))
        ));

        // Header cut short.
        let bytes = vec![0_u8, 0, 8];
        assert!(matches!(read_labels(Cursor::new(bytes), 10), Err(Error::Io(_))));
    }

    #[test]
    fn huge_declared_count_does_not_preallocate() {
        let bytes = header(&[IMAGE_MAGIC, u32::MAX, 28, 28]);
        assert!(read_images(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn load_dataset_pairs_files() {
        let dir = std::env::temp_dir().join(format!("nanonet-idx-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let labels_path = dir.join("labels.idx1");
        let images_path = dir.join("images.idx3");

        let mut labels = header(&[LABEL_MAGIC, 2]);
        labels.extend_from_slice(&[1, 0]);
        let mut images = header(&[IMAGE_MAGIC, 2, 2, 2]);
        images.extend_from_slice(&[0, 0, 0, 255, 255, 0, 0, 0]);
        std::fs::write(&labels_path, labels).unwrap();
        std::fs::write(&images_path, images).unwrap();

        let data = load_dataset(&labels_path, &images_path, 2).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.input_dim(), 4);
        assert_eq!(data.target(0), &[0.0, 1.0]);
        assert_eq!(data.input(1), &[1.0, 0.0, 0.0, 0.0]);

        let missing = load_dataset(dir.join("nope"), &images_path, 2);
        assert!(matches!(missing, Err(Error::Io(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
