//! Single-channel intensity images and the resampling the normalizer needs.

use image::RgbImage;

use crate::types::FaceRegion;

/// ITU-R BT.601 luma weights, the weighting the classifier was trained on.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// A row-major 8-bit grayscale buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl GrayImage {
    pub(crate) fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len() as u64, width as u64 * height as u64);
        Self {
            data,
            width,
            height,
        }
    }

    /// Wrap a row-major buffer, or `None` if its length is not
    /// `width * height`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() as u64 != width as u64 * height as u64 {
            return None;
        }
        Some(Self::new(data, width, height))
    }

    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> u8,
    {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Convert a colour image with BT.601 luma weighting.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let data = image
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                let luma = LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32;
                luma.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        Self {
            data,
            width: image.width(),
            height: image.height(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    /// Copy out a sub-rectangle. The region must lie inside the image.
    pub fn crop(&self, region: &FaceRegion) -> GrayImage {
        debug_assert!(region.fits_within(self.width, self.height));
        let mut data = Vec::with_capacity(region.area() as usize);
        for y in region.y..region.y + region.height {
            let start = (y * self.width + region.x) as usize;
            data.extend_from_slice(&self.data[start..start + region.width as usize]);
        }
        GrayImage::new(data, region.width, region.height)
    }

    /// Bilinear resize with pixel-centre alignment and replicated borders,
    /// rounding back to 8 bits.
    pub fn resize_bilinear(&self, width: u32, height: u32) -> GrayImage {
        let scale_x = self.width as f32 / width as f32;
        let scale_y = self.height as f32 / height as f32;

        GrayImage::from_fn(width, height, |x, y| {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let src_y = (y as f32 + 0.5) * scale_y - 0.5;
            sample_bilinear(self, src_x, src_y).round().clamp(0.0, 255.0) as u8
        })
    }
}

/// Sample with bilinear interpolation, clamping coordinates to the border.
#[inline]
fn sample_bilinear(image: &GrayImage, x: f32, y: f32) -> f32 {
    let max_x = (image.width - 1) as f32;
    let max_y = (image.height - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(image.width - 1);
    let y1 = (y0 + 1).min(image.height - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = image.pixel(x0, y0) as f32;
    let p10 = image.pixel(x1, y0) as f32;
    let p01 = image.pixel(x0, y1) as f32;
    let p11 = image.pixel(x1, y1) as f32;

    let top = p00 * (1.0 - fx) + p10 * fx;
    let bottom = p01 * (1.0 - fx) + p11 * fx;
    top * (1.0 - fy) + bottom * fy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_checks_buffer_length() {
        let img = GrayImage::from_raw(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(img.pixel(2, 1), 6);

        assert!(GrayImage::from_raw(3, 2, vec![1, 2, 3]).is_none());
        assert!(GrayImage::from_raw(2, 2, vec![0; 5]).is_none());
        assert!(GrayImage::from_raw(0, 0, vec![]).is_some());
    }

    #[test]
    fn bilinear_interpolation() {
        let img = GrayImage::new(vec![0, 100, 200, 50], 2, 2);

        assert!((sample_bilinear(&img, 0.0, 0.0) - 0.0).abs() < 0.01);
        assert!((sample_bilinear(&img, 1.0, 0.0) - 100.0).abs() < 0.01);
        assert!((sample_bilinear(&img, 0.0, 1.0) - 200.0).abs() < 0.01);
        assert!((sample_bilinear(&img, 1.0, 1.0) - 50.0).abs() < 0.01);

        // (0 + 100 + 200 + 50) / 4
        assert!((sample_bilinear(&img, 0.5, 0.5) - 87.5).abs() < 0.01);
        assert!((sample_bilinear(&img, 0.5, 0.0) - 50.0).abs() < 0.01);

        // Outside the image the border is replicated, not zero-filled.
        assert!((sample_bilinear(&img, -3.0, -3.0) - 0.0).abs() < 0.01);
        assert!((sample_bilinear(&img, 5.0, 0.0) - 100.0).abs() < 0.01);
        assert!((sample_bilinear(&img, 5.0, 5.0) - 50.0).abs() < 0.01);
    }

    #[test]
    fn luma_weights() {
        let mut rgb = RgbImage::new(3, 1);
        rgb.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        rgb.put_pixel(1, 0, image::Rgb([0, 255, 0]));
        rgb.put_pixel(2, 0, image::Rgb([255, 255, 255]));

        let gray = GrayImage::from_rgb(&rgb);
        assert_eq!(gray.as_raw(), &[76, 150, 255]);
    }

    #[test]
    fn crop_copies_exact_rectangle() {
        let img = GrayImage::from_fn(5, 4, |x, y| (y * 5 + x) as u8);
        let crop = img.crop(&FaceRegion::new(1, 2, 3, 2));

        assert_eq!(crop.width(), 3);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.as_raw(), &[11, 12, 13, 16, 17, 18]);
    }

    #[test]
    fn resize_constant_image_is_constant() {
        let img = GrayImage::from_fn(17, 31, |_, _| 93);
        let resized = img.resize_bilinear(48, 48);
        assert_eq!(resized.width(), 48);
        assert_eq!(resized.height(), 48);
        assert!(resized.as_raw().iter().all(|&p| p == 93));
    }

    #[test]
    fn resize_halves_by_averaging_pairs() {
        // Downscaling 4 -> 2 samples exactly between source pixel pairs.
        let img = GrayImage::new(vec![0, 100, 200, 50], 4, 1);
        let resized = img.resize_bilinear(2, 1);
        assert_eq!(resized.as_raw(), &[50, 125]);
    }

    #[test]
    fn resize_is_deterministic() {
        let img = GrayImage::from_fn(63, 41, |x, y| ((x * 7 + y * 13) % 256) as u8);
        assert_eq!(img.resize_bilinear(48, 48), img.resize_bilinear(48, 48));
    }
}
