use std::sync::Arc;

use camino::Utf8Path;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::archive::write_bytes_atomic;
use crate::error::WallpaperError;

pub const DEFAULT_IMAGE_SIZE: (u32, u32) = (3840, 2160);
pub const MID_IMAGE_SIZE: (u32, u32) = (2880, 1620);
pub const MIN_IMAGE_SIZE: (u32, u32) = (1920, 1080);

const EXIF_IMAGE_DESCRIPTION: u16 = 0x010E;
const EXIF_COPYRIGHT: u16 = 0x8298;
const EXIF_ASCII: u16 = 2;
const EXIF_MAX_TEXT: usize = 16 * 1024;

pub trait ImageSaver: Send + Sync {
    fn save(
        &self,
        bytes: &[u8],
        destination: &Utf8Path,
        title: &str,
        copyright: &str,
    ) -> Result<(), WallpaperError>;
}

impl<T: ImageSaver + ?Sized> ImageSaver for Arc<T> {
    fn save(
        &self,
        bytes: &[u8],
        destination: &Utf8Path,
        title: &str,
        copyright: &str,
    ) -> Result<(), WallpaperError> {
        (**self).save(bytes, destination, title, copyright)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePolicy {
    Exact(u32, u32),
    // Snap to the closer of 1920x1080 and 3840x2160.
    Normalize,
}

#[derive(Debug, Clone)]
pub struct JpegSaver {
    quality: u8,
    policy: ResizePolicy,
}

impl JpegSaver {
    pub fn new(quality: u8) -> Self {
        Self::with_policy(
            quality,
            ResizePolicy::Exact(DEFAULT_IMAGE_SIZE.0, DEFAULT_IMAGE_SIZE.1),
        )
    }

    pub fn normalizing(quality: u8) -> Self {
        Self::with_policy(quality, ResizePolicy::Normalize)
    }

    pub fn with_policy(quality: u8, policy: ResizePolicy) -> Self {
        Self { quality, policy }
    }

    pub fn encode(
        &self,
        bytes: &[u8],
        title: &str,
        copyright: &str,
    ) -> Result<Vec<u8>, String> {
        let decoded = image::load_from_memory(bytes).map_err(|err| err.to_string())?;
        let current = (decoded.width(), decoded.height());
        let (width, height) = match self.policy {
            ResizePolicy::Exact(width, height) => (width, height),
            ResizePolicy::Normalize => normalized_size(current),
        };
        let resized = if current == (width, height) {
            decoded
        } else {
            decoded.resize_exact(width, height, FilterType::Lanczos3)
        };
        let rgb = resized.to_rgb8();

        let mut encoded = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut encoded, self.quality);
            encoder.encode_image(&rgb).map_err(|err| err.to_string())?;
        }
        if title.is_empty() {
            return Ok(encoded);
        }
        Ok(embed_exif(&encoded, &exif_segment(title, copyright)))
    }
}

impl ImageSaver for JpegSaver {
    fn save(
        &self,
        bytes: &[u8],
        destination: &Utf8Path,
        title: &str,
        copyright: &str,
    ) -> Result<(), WallpaperError> {
        let encoded = self
            .encode(bytes, title, copyright)
            .map_err(|message| WallpaperError::ImageSave {
                path: destination.to_string(),
                message,
            })?;
        write_bytes_atomic(destination, &encoded)
    }
}

pub fn normalized_size(size: (u32, u32)) -> (u32, u32) {
    if size == MIN_IMAGE_SIZE || size == DEFAULT_IMAGE_SIZE {
        return size;
    }
    if size.0 > MID_IMAGE_SIZE.0 || size.1 > MID_IMAGE_SIZE.1 {
        return DEFAULT_IMAGE_SIZE;
    }
    MIN_IMAGE_SIZE
}

// Little-endian TIFF IFD0 with ImageDescription and Copyright.
pub fn exif_segment(title: &str, copyright: &str) -> Vec<u8> {
    let entries = [(EXIF_IMAGE_DESCRIPTION, title), (EXIF_COPYRIGHT, copyright)]
        .into_iter()
        .filter(|(_, text)| !text.is_empty())
        .map(|(tag, text)| {
            let mut value = text.as_bytes()[..text.len().min(EXIF_MAX_TEXT)].to_vec();
            value.push(0);
            (tag, value)
        })
        .collect::<Vec<_>>();

    let ifd_len = 2 + entries.len() * 12 + 4;
    let mut data_offset = 8 + ifd_len;
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&(entries.len() as u16).to_le_bytes());

    let mut data = Vec::new();
    for (tag, value) in &entries {
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&EXIF_ASCII.to_le_bytes());
        tiff.extend_from_slice(&(value.len() as u32).to_le_bytes());
        if value.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..value.len()].copy_from_slice(value);
            tiff.extend_from_slice(&inline);
        } else {
            tiff.extend_from_slice(&(data_offset as u32).to_le_bytes());
            data.extend_from_slice(value);
            if value.len() % 2 == 1 {
                data.push(0);
            }
            data_offset = 8 + ifd_len + data.len();
        }
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff.extend_from_slice(&data);

    let mut segment = Vec::with_capacity(tiff.len() + 10);
    segment.extend_from_slice(&[0xFF, 0xE1]);
    segment.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend_from_slice(&tiff);
    segment
}

pub fn embed_exif(jpeg: &[u8], segment: &[u8]) -> Vec<u8> {
    if jpeg.len() < 4 || jpeg[0..2] != [0xFF, 0xD8] {
        return jpeg.to_vec();
    }
    let mut insert_at = 2;
    if jpeg.len() >= 6 && jpeg[2..4] == [0xFF, 0xE0] {
        let app0_len = u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
        if 4 + app0_len <= jpeg.len() {
            insert_at = 4 + app0_len;
        }
    }
    let mut out = Vec::with_capacity(jpeg.len() + segment.len());
    out.extend_from_slice(&jpeg[..insert_at]);
    out.extend_from_slice(segment);
    out.extend_from_slice(&jpeg[insert_at..]);
    out
}
