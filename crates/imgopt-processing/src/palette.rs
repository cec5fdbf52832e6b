//! Palette quantization using the median cut algorithm.
//!
//! Images with at most `max_colors` distinct RGBA values are indexed exactly,
//! so quantizing an already paletted image is lossless.

use image::RgbaImage;
use std::collections::HashMap;

/// Largest palette an 8-bit indexed PNG can hold
pub const MAX_PALETTE_SIZE: usize = 256;

/// An image expressed as palette indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    pub width: u32,
    pub height: u32,
    /// RGBA palette entries
    pub palette: Vec<[u8; 4]>,
    /// One palette index per pixel, row-major
    pub indices: Vec<u8>,
}

impl IndexedImage {
    /// Whether any palette entry is not fully opaque
    pub fn has_transparency(&self) -> bool {
        self.palette.iter().any(|color| color[3] < 255)
    }
}

/// A box of colors for the median cut algorithm.
#[derive(Debug, Clone)]
struct ColorBox {
    colors: Vec<([u8; 4], u32)>, // Color and count
}

impl ColorBox {
    fn new(colors: Vec<([u8; 4], u32)>) -> Self {
        Self { colors }
    }

    /// Find which channel has the largest range, and that range.
    fn widest_channel(&self) -> (usize, u8) {
        let mut min = [255u8; 4];
        let mut max = [0u8; 4];

        for (color, _) in &self.colors {
            for channel in 0..4 {
                min[channel] = min[channel].min(color[channel]);
                max[channel] = max[channel].max(color[channel]);
            }
        }

        (0..4)
            .map(|channel| (channel, max[channel].saturating_sub(min[channel])))
            .fold((0, 0), |best, current| if current.1 > best.1 { current } else { best })
    }

    /// Split the box into two along the widest channel, at the pixel-weighted median.
    fn split(mut self) -> (ColorBox, ColorBox) {
        let (channel, _) = self.widest_channel();
        self.colors.sort_by_key(|(color, _)| color[channel]);

        let total = self.pixel_count();
        let mut running = 0u64;
        let mut split_idx = self.colors.len() / 2;

        for (i, (_, count)) in self.colors.iter().enumerate() {
            running += u64::from(*count);
            if running >= total / 2 {
                split_idx = i + 1;
                break;
            }
        }

        // Ensure we don't create empty boxes
        split_idx = split_idx.clamp(1, self.colors.len() - 1);

        let right = self.colors.split_off(split_idx);
        (ColorBox::new(self.colors), ColorBox::new(right))
    }

    /// Average color of this box, weighted by pixel count
    fn average_color(&self) -> [u8; 4] {
        let total = self.pixel_count();
        if total == 0 {
            return [0, 0, 0, 255];
        }

        let mut sums = [0u64; 4];
        for (color, count) in &self.colors {
            for channel in 0..4 {
                sums[channel] += u64::from(color[channel]) * u64::from(*count);
            }
        }

        sums.map(|sum| (sum / total) as u8)
    }

    fn pixel_count(&self) -> u64 {
        self.colors.iter().map(|(_, count)| u64::from(*count)).sum()
    }

    fn can_split(&self) -> bool {
        self.colors.len() > 1
    }
}

fn distance(a: &[u8; 4], b: &[u8; 4]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = i32::from(*x) - i32::from(*y);
            (d * d) as u32
        })
        .sum()
}

fn nearest(palette: &[[u8; 4]], color: &[u8; 4]) -> u8 {
    palette
        .iter()
        .enumerate()
        .min_by_key(|(_, candidate)| distance(candidate, color))
        .map(|(index, _)| index as u8)
        .unwrap_or(0)
}

/// Reduce an RGBA image to at most `max_colors` palette entries (capped at 256).
pub fn quantize(img: &RgbaImage, max_colors: usize) -> IndexedImage {
    let max_colors = max_colors.clamp(1, MAX_PALETTE_SIZE);

    let mut histogram: HashMap<[u8; 4], u32> = HashMap::new();
    for pixel in img.pixels() {
        *histogram.entry(pixel.0).or_insert(0) += 1;
    }

    // Sorted so the palette does not depend on hash order
    let mut colors: Vec<([u8; 4], u32)> = histogram.into_iter().collect();
    colors.sort_unstable_by_key(|(color, _)| *color);

    let palette: Vec<[u8; 4]> = if colors.len() <= max_colors {
        colors.iter().map(|(color, _)| *color).collect()
    } else {
        let mut boxes = vec![ColorBox::new(colors)];

        while boxes.len() < max_colors {
            let Some(idx) = boxes
                .iter()
                .enumerate()
                .filter(|(_, b)| b.can_split())
                .max_by_key(|(_, b)| b.pixel_count())
                .map(|(idx, _)| idx)
            else {
                break;
            };

            let (left, right) = boxes.swap_remove(idx).split();
            boxes.push(left);
            boxes.push(right);
        }

        let mut palette: Vec<[u8; 4]> = boxes.iter().map(ColorBox::average_color).collect();
        palette.sort_unstable();
        palette.dedup();
        palette
    };

    let exact: HashMap<[u8; 4], u8> = palette
        .iter()
        .enumerate()
        .map(|(index, color)| (*color, index as u8))
        .collect();
    let mut lookup_cache: HashMap<[u8; 4], u8> = HashMap::new();

    let indices = img
        .pixels()
        .map(|pixel| {
            if let Some(index) = exact.get(&pixel.0) {
                return *index;
            }
            *lookup_cache
                .entry(pixel.0)
                .or_insert_with(|| nearest(&palette, &pixel.0))
        })
        .collect();

    IndexedImage {
        width: img.width(),
        height: img.height(),
        palette,
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_few_colors_are_exact() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 255, 128]));

        let indexed = quantize(&img, MAX_PALETTE_SIZE);
        assert_eq!(indexed.palette.len(), 2);
        assert_eq!(indexed.indices.len(), 16);
        assert!(indexed.has_transparency());

        let first = indexed.palette[indexed.indices[0] as usize];
        let other = indexed.palette[indexed.indices[1] as usize];
        assert_eq!(first, [0, 0, 255, 128]);
        assert_eq!(other, [255, 0, 0, 255]);
    }

    #[test]
    fn test_many_colors_are_reduced() {
        let mut img = RgbaImage::new(64, 64);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgba([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 255]);
        }

        let indexed = quantize(&img, MAX_PALETTE_SIZE);
        assert!(indexed.palette.len() <= MAX_PALETTE_SIZE);
        assert!(indexed.palette.len() > 16);
        assert_eq!(indexed.indices.len(), 64 * 64);
        assert!(!indexed.has_transparency());
        assert!(indexed
            .indices
            .iter()
            .all(|index| (*index as usize) < indexed.palette.len()));
    }

    #[test]
    fn test_quantize_is_stable() {
        let mut img = RgbaImage::new(32, 32);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgba([(x * 8) as u8, (y * 8) as u8, 0, 255]);
        }

        let first = quantize(&img, 16);
        let second = quantize(&img, 16);
        assert_eq!(first, second);
        assert!(first.palette.len() <= 16);
    }

    #[test]
    fn test_color_box_split_never_empty() {
        let colors = vec![([0, 0, 0, 255], 1000), ([255, 255, 255, 255], 1)];
        let (left, right) = ColorBox::new(colors).split();
        assert_eq!(left.colors.len(), 1);
        assert_eq!(right.colors.len(), 1);
    }
}
