use image::{DynamicImage, GrayImage, ImageBuffer, Rgb, RgbImage};

use super::error::ExtractionError;

/// 像素通道布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Gray,
    Rgb,
    Rgba,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }
}

/// 已解码的图像数据（只读）
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Decode an encoded upload (PNG/JPEG/GIF/BMP) into RGB pixels.
    pub fn decode(bytes: &[u8]) -> Result<Self, ExtractionError> {
        let decoded = image::load_from_memory(bytes)?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self::new(width, height, PixelLayout::Rgb, rgb.into_raw()))
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn validate(&self) -> Result<(), ExtractionError> {
        if self.width == 0 || self.height == 0 {
            return Err(ExtractionError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        let expected = self.pixel_count() * self.layout.channels();
        if self.data.len() != expected {
            return Err(ExtractionError::BufferSizeMismatch {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Copy into an RGB buffer regardless of the source layout.
    pub fn to_rgb_image(&self) -> Result<RgbImage, ExtractionError> {
        self.validate()?;

        let dynamic = match self.layout {
            PixelLayout::Gray => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageLuma8),
            PixelLayout::Rgb => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8),
            PixelLayout::Rgba => {
                image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
                    .map(DynamicImage::ImageRgba8)
            }
        };

        dynamic
            .map(|img| img.to_rgb8())
            .ok_or_else(|| ExtractionError::Internal("pixel buffer rejected".to_string()))
    }
}

/// 缩放到固定正方形分辨率，已是目标尺寸时直接复用
pub fn normalize_resolution(rgb: RgbImage, target_size: u32) -> RgbImage {
    if rgb.width() == target_size && rgb.height() == target_size {
        return rgb;
    }
    image::imageops::resize(
        &rgb,
        target_size,
        target_size,
        image::imageops::FilterType::Triangle,
    )
}

/// RGB → 灰度 (BT.601 整数权重)
pub fn to_luminance(rgb: &RgbImage) -> GrayImage {
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let Rgb([r, g, b]) = *rgb.get_pixel(x, y);
        let luma = (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000;
        image::Luma([luma as u8])
    })
}

/// Hue of one pixel in degrees, 0 for achromatic pixels.
pub fn hue_degrees(r: u8, g: u8, b: u8) -> f64 {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    if delta == 0.0 {
        return 0.0;
    }

    let hue = if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };

    if hue < 0.0 {
        hue + 360.0
    } else {
        hue
    }
}

pub fn mean_hue(rgb: &RgbImage) -> f64 {
    let count = rgb.width() as usize * rgb.height() as usize;
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = rgb
        .pixels()
        .map(|p| hue_degrees(p.0[0], p.0[1], p.0[2]))
        .sum();
    sum / count as f64
}

/// Mean brightness of rows `height / 2 .. height`.
pub fn lower_half_mean(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    let start_y = h / 2;

    let mut sum = 0u64;
    let mut count = 0u64;
    for y in start_y..h {
        for x in 0..w {
            sum += gray.get_pixel(x, y).0[0] as u64;
            count += 1;
        }
    }

    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}
