use image::GrayImage;
use std::collections::VecDeque;

/// Axis-aligned box around one connected foreground region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// First column past the box, mirroring `x + w` in rectangle terms.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn center_x(&self) -> u32 {
        self.x + self.width / 2
    }
}

/// One connected region of white pixels: its pixel count and bounding box.
#[derive(Debug, Clone, Copy)]
pub struct Component {
    pub area: u64,
    pub bbox: BoundingBox,
}

/// Extract all 8-connected white regions of the mask. Equivalent to taking
/// external contours and measuring each: nested holes do not split a region.
pub fn connected_components(mask: &GrayImage) -> Vec<Component> {
    let (width, height) = mask.dimensions();
    let mut visited = vec![false; (width * height) as usize];
    let mut components = Vec::new();
    let index = |x: u32, y: u32| (y * width + x) as usize;

    for start_y in 0..height {
        for start_x in 0..width {
            if visited[index(start_x, start_y)] || mask.get_pixel(start_x, start_y).0[0] != 255 {
                continue;
            }

            let mut area = 0u64;
            let (mut min_x, mut min_y, mut max_x, mut max_y) =
                (start_x, start_y, start_x, start_y);
            let mut frontier = VecDeque::new();
            visited[index(start_x, start_y)] = true;
            frontier.push_back((start_x, start_y));

            while let Some((x, y)) = frontier.pop_front() {
                area += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as i64 + dx;
                        let ny = y as i64 + dy;
                        if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                            continue;
                        }
                        let (nx, ny) = (nx as u32, ny as u32);
                        if !visited[index(nx, ny)] && mask.get_pixel(nx, ny).0[0] == 255 {
                            visited[index(nx, ny)] = true;
                            frontier.push_back((nx, ny));
                        }
                    }
                }
            }

            components.push(Component {
                area,
                bbox: BoundingBox {
                    x: min_x,
                    y: min_y,
                    width: max_x - min_x + 1,
                    height: max_y - min_y + 1,
                },
            });
        }
    }
    components
}

/// The largest white region by pixel count, if the mask has any foreground.
pub fn largest_component(mask: &GrayImage) -> Option<Component> {
    connected_components(mask)
        .into_iter()
        .max_by_key(|component| component.area)
}
