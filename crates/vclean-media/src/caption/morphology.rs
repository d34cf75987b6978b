//! Binary image operations used by the caption heuristic.

use std::collections::VecDeque;
use vclean_models::PixelRect;

/// Row-major binary image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl BinaryImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    /// Build from a predicate over `(x, y)`.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut image = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let idx = image.index(x, y);
                image.data[idx] = f(x, y);
            }
        }
        image
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Dilate with a centered `kernel_width x kernel_height` rectangle.
    ///
    /// Pixels beyond the image border never contribute.
    pub fn dilate_rect(&self, kernel_width: u32, kernel_height: u32, iterations: u32) -> Self {
        let (w, h) = (self.width as usize, self.height as usize);
        // Anchor at k/2: output(x) is set when any input in [x - k/2, x + (k-1)/2] is set
        let (left, right) = (kernel_width.saturating_sub(1) / 2, kernel_width / 2);
        let (up, down) = (kernel_height.saturating_sub(1) / 2, kernel_height / 2);
        let mut current = self.clone();

        for _ in 0..iterations {
            let mut horizontal = Self::new(self.width, self.height);
            for y in 0..h {
                let row = &current.data[y * w..(y + 1) * w];
                let prefix = prefix_counts(row.iter().copied());
                for x in 0..w {
                    let lo = x.saturating_sub(right as usize);
                    let hi = (x + left as usize + 1).min(w);
                    horizontal.data[y * w + x] = prefix[hi] > prefix[lo];
                }
            }

            let mut vertical = Self::new(self.width, self.height);
            for x in 0..w {
                let prefix = prefix_counts((0..h).map(|y| horizontal.data[y * w + x]));
                for y in 0..h {
                    let lo = y.saturating_sub(down as usize);
                    let hi = (y + up as usize + 1).min(h);
                    vertical.data[y * w + x] = prefix[hi] > prefix[lo];
                }
            }

            current = vertical;
        }

        current
    }

    /// Bounding boxes of the outermost 8-connected blobs.
    ///
    /// Blobs nested inside a hole of another blob are omitted, mirroring
    /// external-contour retrieval. Boxes are in image coordinates.
    pub fn external_blob_boxes(&self) -> Vec<PixelRect> {
        let (w, h) = (self.width as usize, self.height as usize);
        if w == 0 || h == 0 {
            return Vec::new();
        }

        let outside = self.outer_background();
        let mut visited = vec![false; w * h];
        let mut boxes = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..w * h {
            if !self.data[start] || visited[start] {
                continue;
            }

            visited[start] = true;
            queue.push_back(start);

            let (sx, sy) = ((start % w) as u32, (start / w) as u32);
            let mut rect = PixelRect {
                x0: sx,
                y0: sy,
                x1: sx + 1,
                y1: sy + 1,
            };
            let mut external = false;

            while let Some(idx) = queue.pop_front() {
                let (x, y) = (idx % w, idx / w);
                rect.x0 = rect.x0.min(x as u32);
                rect.y0 = rect.y0.min(y as u32);
                rect.x1 = rect.x1.max(x as u32 + 1);
                rect.y1 = rect.y1.max(y as u32 + 1);

                if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                    external = true;
                }

                for (dx, dy) in NEIGHBORS_8 {
                    let (nx, ny) = (x as isize + dx, y as isize + dy);
                    if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if self.data[nidx] {
                        if !visited[nidx] {
                            visited[nidx] = true;
                            queue.push_back(nidx);
                        }
                    } else if outside[nidx] && (dx == 0 || dy == 0) {
                        external = true;
                    }
                }
            }

            if external {
                boxes.push(rect);
            }
        }

        boxes
    }

    /// Background pixels 4-connected to the image border.
    fn outer_background(&self) -> Vec<bool> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut outside = vec![false; w * h];
        let mut queue = VecDeque::new();

        let seed = |idx: usize, outside: &mut Vec<bool>, queue: &mut VecDeque<usize>| {
            if !self.data[idx] && !outside[idx] {
                outside[idx] = true;
                queue.push_back(idx);
            }
        };
        for x in 0..w {
            seed(x, &mut outside, &mut queue);
            seed((h - 1) * w + x, &mut outside, &mut queue);
        }
        for y in 0..h {
            seed(y * w, &mut outside, &mut queue);
            seed(y * w + w - 1, &mut outside, &mut queue);
        }

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % w, idx / w);
            for (dx, dy) in NEIGHBORS_4 {
                let (nx, ny) = (x as isize + dx, y as isize + dy);
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let nidx = ny as usize * w + nx as usize;
                if !self.data[nidx] && !outside[nidx] {
                    outside[nidx] = true;
                    queue.push_back(nidx);
                }
            }
        }

        outside
    }
}

const NEIGHBORS_4: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const NEIGHBORS_8: [(isize, isize); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// `prefix[i]` = number of set values in `values[..i]`.
fn prefix_counts(values: impl Iterator<Item = bool>) -> Vec<u32> {
    let mut prefix = vec![0u32];
    let mut total = 0u32;
    for v in values {
        total += v as u32;
        prefix.push(total);
    }
    prefix
}
