use image::GrayImage;

const WHITE: u8 = 255;

/// Otsu's threshold selection: the level maximizing between-class variance
/// of the image histogram. Degenerate (single-level) images yield 0.
pub fn otsu_level(img: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in img.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    let total = u64::from(img.width()) * u64::from(img.height());
    if total == 0 {
        return 0;
    }
    let weighted_sum: u64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as u64 * count)
        .sum();

    let mut best_level = 0u8;
    let mut best_variance = -1.0f64;
    let mut background_count = 0u64;
    let mut background_sum = 0u64;
    for level in 0..256usize {
        background_count += histogram[level];
        if background_count == 0 {
            continue;
        }
        let foreground_count = total - background_count;
        if foreground_count == 0 {
            break;
        }
        background_sum += level as u64 * histogram[level];
        let background_mean = background_sum as f64 / background_count as f64;
        let foreground_mean = (weighted_sum - background_sum) as f64 / foreground_count as f64;
        let separation = background_mean - foreground_mean;
        let variance =
            background_count as f64 * foreground_count as f64 * separation * separation;
        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }
    best_level
}

/// Binarize: pixels strictly above `level` become white, the rest black.
pub fn threshold(img: &GrayImage, level: u8) -> GrayImage {
    let mut out = GrayImage::new(img.width(), img.height());
    for (src, dst) in img.iter().zip(out.iter_mut()) {
        *dst = if *src > level { WHITE } else { 0 };
    }
    out
}

/// Morphological closing with a rectangular kernel: dilation followed by
/// erosion, bridging gaps narrower than the kernel.
pub fn close(mask: &GrayImage, kernel_width: u32, kernel_height: u32) -> GrayImage {
    let dilated = window_pass(mask, kernel_width, kernel_height, true);
    window_pass(&dilated, kernel_width, kernel_height, false)
}

// Separable rectangular max (dilate) / min (erode) filter: one horizontal
// pass, then one vertical pass. Anchor matches an even-sized kernel spanning
// [-k/2, k/2 - 1] around each pixel.
fn window_pass(src: &GrayImage, kernel_width: u32, kernel_height: u32, maximum: bool) -> GrayImage {
    let horizontal = directional_pass(src, kernel_width, true, maximum);
    directional_pass(&horizontal, kernel_height, false, maximum)
}

fn directional_pass(src: &GrayImage, size: u32, horizontal: bool, maximum: bool) -> GrayImage {
    let (width, height) = src.dimensions();
    let mut out = GrayImage::new(width, height);
    let reach_back = (size / 2) as i64;
    let reach_forward = (size as i64 - 1) - reach_back;
    for y in 0..height {
        for x in 0..width {
            let mut acc = if maximum { 0u8 } else { u8::MAX };
            for offset in -reach_back..=reach_forward {
                let (sx, sy) = if horizontal {
                    (x as i64 + offset, y as i64)
                } else {
                    (x as i64, y as i64 + offset)
                };
                if sx < 0 || sy < 0 || sx >= width as i64 || sy >= height as i64 {
                    continue;
                }
                let value = src.get_pixel(sx as u32, sy as u32).0[0];
                acc = if maximum {
                    acc.max(value)
                } else {
                    acc.min(value)
                };
            }
            out.put_pixel(x, y, image::Luma([acc]));
        }
    }
    out
}

/// Number of white pixels in the mask.
pub fn count_white(mask: &GrayImage) -> u64 {
    mask.iter().filter(|&&v| v == WHITE).count() as u64
}

/// Number of white pixels restricted to the column range `[from, to)`.
pub fn count_white_in_columns(mask: &GrayImage, from: u32, to: u32) -> u64 {
    let to = to.min(mask.width());
    let mut count = 0u64;
    for y in 0..mask.height() {
        for x in from..to {
            if mask.get_pixel(x, y).0[0] == WHITE {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&[u8]]) -> GrayImage {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let mut img = GrayImage::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                img.put_pixel(x as u32, y as u32, image::Luma([v]));
            }
        }
        img
    }

    #[test]
    fn otsu_splits_a_bimodal_mask() {
        let img = mask_from(&[&[0, 0, 255, 255], &[0, 0, 255, 255]]);
        let level = otsu_level(&img);
        assert!(level < 255);
        let binary = threshold(&img, level);
        assert_eq!(count_white(&binary), 4);
    }

    #[test]
    fn otsu_on_a_flat_image_keeps_it_dark() {
        let img = GrayImage::new(4, 4);
        let binary = threshold(&img, otsu_level(&img));
        assert_eq!(count_white(&binary), 0);
    }

    #[test]
    fn closing_bridges_a_narrow_gap() {
        // Two white columns separated by a one-pixel gap.
        let img = mask_from(&[
            &[255, 0, 255],
            &[255, 0, 255],
            &[255, 0, 255],
        ]);
        let closed = close(&img, 3, 3);
        assert_eq!(closed.get_pixel(1, 1).0[0], 255);
    }

    #[test]
    fn closing_does_not_invent_distant_foreground() {
        let img = mask_from(&[
            &[255, 0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0, 0],
        ]);
        let closed = close(&img, 3, 3);
        assert_eq!(closed.get_pixel(7, 1).0[0], 0);
    }

    #[test]
    fn column_counts_cover_edge_strips() {
        let img = mask_from(&[&[255, 0, 0, 255], &[255, 0, 0, 0]]);
        assert_eq!(count_white_in_columns(&img, 0, 1), 2);
        assert_eq!(count_white_in_columns(&img, 3, 4), 1);
        assert_eq!(count_white_in_columns(&img, 1, 3), 0);
    }
}
