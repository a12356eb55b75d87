//! Perceptual fingerprints of posters, frames and uploads
//!
//! A fingerprint pairs a 64-bit average hash (8x8 grayscale, mean threshold)
//! with the image's dominant color. Fingerprints are cheap to compare and are
//! never persisted.

use image::{imageops::FilterType, DynamicImage, GenericImageView};

use crate::error::AppResult;

/// Number of bits in a [`PerceptualHash`]
pub const HASH_BITS: u32 = 64;

/// Query images larger than this on either side are downscaled first
pub const MAX_QUERY_DIMENSION: u32 = 1024;

const HASH_SIDE: u32 = 8;
const HASH_WEIGHT: f64 = 0.7;
const COLOR_WEIGHT: f64 = 0.3;

/// Average hash; bit 63 is the top-left pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    pub fn compute(image: &DynamicImage) -> Self {
        let small = image
            .resize_exact(HASH_SIDE, HASH_SIDE, FilterType::Triangle)
            .to_luma8();

        let pixels: Vec<u8> = small.into_raw();
        let sum: u32 = pixels.iter().map(|&p| p as u32).sum();
        let average = sum as f64 / pixels.len() as f64;

        let bits = pixels
            .iter()
            .fold(0u64, |acc, &p| (acc << 1) | u64::from(p as f64 >= average));

        Self(bits)
    }

    pub fn hamming_distance(&self, other: &Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// 0-100, where 100 means identical and 0 means every bit differs
    pub fn similarity(&self, other: &Self) -> f64 {
        let per_bit = 100.0 / HASH_BITS as f64;
        (100.0 - self.hamming_distance(other) as f64 * per_bit).max(0.0)
    }

    /// 64-character `0`/`1` rendering, most significant bit first
    pub fn to_bit_string(&self) -> String {
        format!("{:064b}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hsv(&self) -> Hsv {
        let r = self.r as f64 / 255.0;
        let g = self.g as f64 / 255.0;
        let b = self.b as f64 / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let diff = max - min;

        let mut h = if diff == 0.0 {
            0.0
        } else if max == r {
            60.0 * (((g - b) / diff) % 6.0)
        } else if max == g {
            60.0 * ((b - r) / diff + 2.0)
        } else {
            60.0 * ((r - g) / diff + 4.0)
        };
        if h < 0.0 {
            h += 360.0;
        }

        let s = if max == 0.0 { 0.0 } else { diff / max * 100.0 };

        Hsv { h, s, v: max * 100.0 }
    }

    /// Most frequent color, bucketed into a 16x16x16 histogram
    ///
    /// Returns the centre of the fullest bucket; ties go to the bucket seen
    /// first in r/g/b order.
    pub fn dominant(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let mut bins = vec![0u32; 16 * 16 * 16];

        for pixel in rgb.pixels() {
            let [r, g, b] = pixel.0;
            let index = ((r as usize >> 4) << 8) | ((g as usize >> 4) << 4) | (b as usize >> 4);
            bins[index] += 1;
        }

        let mut best = 0usize;
        for (index, &count) in bins.iter().enumerate() {
            if count > bins[best] {
                best = index;
            }
        }

        let centre = |bucket: usize| (bucket as u8) * 16 + 8;
        Self::new(centre(best >> 8), centre((best >> 4) & 0xf), centre(best & 0xf))
    }
}

/// Hue in degrees `[0, 360)`, saturation and value on `0..=100`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

impl Hsv {
    /// 0-100 closeness; hue wraps around the color wheel
    pub fn similarity(&self, other: &Self) -> f64 {
        let dh = (self.h - other.h).abs();
        let ds = (self.s - other.s).abs();
        let dv = (self.v - other.v).abs();

        let hue = 1.0 - dh.min(360.0 - dh) / 180.0;
        let sat = 1.0 - ds / 100.0;
        let val = 1.0 - dv / 100.0;

        (hue * 0.5 + sat * 0.3 + val * 0.2) * 100.0
    }
}

/// Per-signal and combined closeness of two fingerprints, all on 0-100
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerprintMatch {
    pub hash_similarity: f64,
    pub color_similarity: f64,
    pub combined: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageFingerprint {
    pub hash: PerceptualHash,
    pub dominant: Rgb,
    pub hsv: Hsv,
}

impl ImageFingerprint {
    pub fn from_image(image: &DynamicImage) -> Self {
        let dominant = Rgb::dominant(image);
        Self {
            hash: PerceptualHash::compute(image),
            dominant,
            hsv: dominant.to_hsv(),
        }
    }

    /// Decodes an encoded image (JPEG, PNG, ...) and fingerprints it
    pub fn from_bytes(bytes: &[u8]) -> AppResult<Self> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_image(&image))
    }

    /// Like [`from_bytes`](Self::from_bytes), but shrinks oversized uploads first
    pub fn from_query_bytes(bytes: &[u8]) -> AppResult<Self> {
        let image = normalize_query(image::load_from_memory(bytes)?);
        Ok(Self::from_image(&image))
    }

    pub fn compare(&self, other: &Self) -> FingerprintMatch {
        let hash_similarity = self.hash.similarity(&other.hash);
        let color_similarity = self.hsv.similarity(&other.hsv);
        FingerprintMatch {
            hash_similarity,
            color_similarity,
            combined: hash_similarity * HASH_WEIGHT + color_similarity * COLOR_WEIGHT,
        }
    }
}

/// Downscales (keeping aspect ratio) images above [`MAX_QUERY_DIMENSION`]
pub fn normalize_query(image: DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= MAX_QUERY_DIMENSION && height <= MAX_QUERY_DIMENSION {
        return image;
    }
    image.resize(MAX_QUERY_DIMENSION, MAX_QUERY_DIMENSION, FilterType::Triangle)
}


#[cfg(test)]
mod tests {
    use super::test_images::{png_bytes, split};
    use super::*;

    #[test]
    fn test_identical_hashes_are_fully_similar() {
        let hash = PerceptualHash(0xdead_beef_0bad_f00d);
        assert_eq!(hash.hamming_distance(&hash), 0);
        assert_eq!(hash.similarity(&hash), 100.0);
    }

    #[test]
    fn test_inverted_hashes_have_zero_similarity() {
        let hash = PerceptualHash(0x0f0f_0f0f_0f0f_0f0f);
        let inverted = PerceptualHash(!hash.0);
        assert_eq!(hash.hamming_distance(&inverted), 64);
        assert_eq!(hash.similarity(&inverted), 0.0);
    }

    #[test]
    fn test_each_bit_costs_fixed_amount() {
        let a = PerceptualHash(0);
        let b = PerceptualHash(0b1111);
        assert_eq!(a.similarity(&b), 100.0 - 4.0 * 1.5625);
    }

    #[test]
    fn test_bit_string_is_64_chars() {
        let hash = PerceptualHash(1 << 63);
        let bits = hash.to_bit_string();
        assert_eq!(bits.len(), 64);
        assert!(bits.starts_with('1'));
        assert_eq!(bits.matches('1').count(), 1);
    }

    #[test]
    fn test_pure_red_to_hsv() {
        let hsv = Rgb::new(255, 0, 0).to_hsv();
        assert!(hsv.h.abs() < 1e-9);
        assert!((hsv.s - 100.0).abs() < 1e-9);
        assert!((hsv.v - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_hsv_of_blue_and_black() {
        let blue = Rgb::new(0, 0, 255).to_hsv();
        assert!((blue.h - 240.0).abs() < 1e-9);

        let black = Rgb::new(0, 0, 0).to_hsv();
        assert_eq!((black.h, black.s, black.v), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_hue_distance_wraps_around() {
        let a = Hsv { h: 350.0, s: 50.0, v: 50.0 };
        let b = Hsv { h: 10.0, s: 50.0, v: 50.0 };
        // 20 degrees apart, not 340
        let expected = (0.5 * (1.0 - 20.0 / 180.0) + 0.3 + 0.2) * 100.0;
        assert!((a.similarity(&b) - expected).abs() < 1e-9);
        assert!((a.similarity(&a) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_half_bright_image_hash() {
        let image = split(64, 64, [0, 0, 0], [255, 255, 255]);
        let hash = PerceptualHash::compute(&image);
        // Every row reads 00001111
        assert_eq!(hash.0, 0x0f0f_0f0f_0f0f_0f0f);
    }

    #[test]
    fn test_dominant_color_is_bucket_centre() {
        let image = split(30, 10, [250, 10, 10], [10, 10, 250]);
        // Ties go to the first bucket in r/g/b order, which is the blue one
        assert_eq!(Rgb::dominant(&image), Rgb::new(8, 8, 248));

        let mostly_red = split(30, 10, [250, 10, 10], [250, 10, 10]);
        assert_eq!(Rgb::dominant(&mostly_red), Rgb::new(248, 8, 8));
    }

    #[test]
    fn test_identical_images_match_perfectly() {
        let image = split(100, 150, [200, 40, 40], [20, 20, 60]);
        let a = ImageFingerprint::from_bytes(&png_bytes(&image)).unwrap();
        let b = ImageFingerprint::from_image(&image);

        let scores = a.compare(&b);
        assert_eq!(scores.hash_similarity, 100.0);
        assert!((scores.combined - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_undecodable_bytes_are_an_image_error() {
        let result = ImageFingerprint::from_bytes(b"definitely not an image");
        assert!(matches!(result, Err(crate::error::AppError::Image(_))));
    }

    #[test]
    fn test_normalize_query_downscales_large_images() {
        let large = split(2048, 1024, [0, 0, 0], [255, 255, 255]);
        let normalized = normalize_query(large);
        assert_eq!(normalized.dimensions(), (1024, 512));

        let small = split(300, 200, [0, 0, 0], [255, 255, 255]);
        assert_eq!(normalize_query(small).dimensions(), (300, 200));
    }
}
