use crate::error::QualityError;
use crate::feature::{ids, speed_groups, FeatureModule, FeatureStatus, FeatureValue};
use crate::grid::{BlockGrid, BlockRect};
use crate::image::FingerprintImage;
use crate::roi::RoiResults;
use std::f64::consts::PI;

/// Histogram boundaries for block angle deviations, ascending.
///
/// Deviations below the first boundary land in bucket 0, deviations at or
/// above the last land in bucket 9. These values are tuned together with the
/// trained ensemble and belong to the model's contract.
pub const OF_HIST_LIMITS: [f64; 9] =
    [1.715e-2, 3.5e-2, 5.57e-2, 8.1e-2, 1.15e-1, 1.718e-1, 2.569e-1, 4.758e-1, 7.48e-1];

/// Dominant ridge direction of one block.
#[derive(Debug, Clone, Copy)]
pub struct OrientationBlock {
    pub row: u32,
    pub col: u32,
    /// Block orientation in `[0, PI)`; undirected, mod PI. Zero for
    /// background blocks.
    pub angle: f64,
    /// `[0, 1]`; 0 = isotropic gradient, 1 = perfectly uniform direction.
    pub coherence: f64,
    pub foreground: bool,
}

/// Per-block orientation estimates with ROI-filtered aggregates.
#[derive(Debug, Clone)]
pub struct OrientationField {
    pub block_size: u32,
    pub rows: u32,
    pub cols: u32,
    /// Row-major, one entry per grid block.
    pub blocks: Vec<OrientationBlock>,
    pub foreground_blocks: u32,
    pub coherence_sum: f64,
    /// `coherence_sum / foreground_blocks`, zero when there is no foreground.
    pub coherence_rel: f64,
}

impl OrientationField {
    fn block_at(&self, row: u32, col: u32) -> &OrientationBlock {
        &self.blocks[(row * self.cols + col) as usize]
    }
}

/// Structure tensor sums of the gray-value gradients inside `rect`.
///
/// Gradients use central differences, falling back to one-sided differences
/// at the rectangle borders.
fn structure_tensor(image: &FingerprintImage, rect: &BlockRect) -> (f64, f64, f64) {
    let (mut gxx, mut gyy, mut gxy) = (0.0, 0.0, 0.0);
    let x0 = rect.x;
    let y0 = rect.y;
    let x1 = rect.x + rect.w - 1;
    let y1 = rect.y + rect.h - 1;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let (xl, xr, xdiv) =
                if x == x0 { (x, x + 1, 1.0) } else if x == x1 { (x - 1, x, 1.0) } else { (x - 1, x + 1, 2.0) };
            let (yt, yb, ydiv) =
                if y == y0 { (y, y + 1, 1.0) } else if y == y1 { (y - 1, y, 1.0) } else { (y - 1, y + 1, 2.0) };
            let gx = if rect.w == 1 {
                0.0
            } else {
                (f64::from(image.pixel(xr, y)) - f64::from(image.pixel(xl, y))) / xdiv
            };
            let gy = if rect.h == 1 {
                0.0
            } else {
                (f64::from(image.pixel(x, yb)) - f64::from(image.pixel(x, yt))) / ydiv
            };
            gxx += gx * gx;
            gyy += gy * gy;
            gxy += gx * gy;
        }
    }
    (gxx, gyy, gxy)
}

/// Angle and coherence from structure tensor sums.
///
/// Returns `None` when the block has no gradient energy (perfectly uniform
/// block); such blocks have undefined orientation and are excluded rather
/// than producing NaN.
pub fn angle_of_block(gxx: f64, gyy: f64, gxy: f64) -> Option<(f64, f64)> {
    let energy = gxx + gyy;
    if energy == 0.0 {
        return None;
    }
    let mut angle = 0.5 * (2.0 * gxy).atan2(gxx - gyy);
    if angle < 0.0 {
        angle += PI;
    }
    // (l1 - l2) / (l1 + l2) of the tensor eigenvalues.
    let coherence = (((gxx - gyy).powi(2) + 4.0 * gxy * gxy).sqrt() / energy).clamp(0.0, 1.0);
    Some((angle, coherence))
}

/// Estimates the dominant ridge orientation per block, restricted to blocks
/// covered by the ROI. Non-ROI blocks and zero-energy blocks are marked
/// background and excluded from every aggregate.
pub fn compute_orientation_field(
    image: &FingerprintImage,
    roi: &RoiResults,
    bs: u32,
) -> OrientationField {
    let grid = BlockGrid::new(image.width(), image.height(), bs);
    let mut blocks = Vec::with_capacity(grid.total_block_count() as usize);
    let mut foreground_blocks = 0u32;
    let mut coherence_sum = 0.0;

    for rect in grid.blocks() {
        let covered = roi.roi_blocks.iter().any(|r| r.intersects(&rect));
        let estimate = if covered { structure_tensor_angle(image, &rect) } else { None };
        match estimate {
            Some((angle, coherence)) => {
                foreground_blocks += 1;
                coherence_sum += coherence;
                blocks.push(OrientationBlock { row: rect.row, col: rect.col, angle, coherence, foreground: true });
            }
            None => {
                blocks.push(OrientationBlock {
                    row: rect.row,
                    col: rect.col,
                    angle: 0.0,
                    coherence: 0.0,
                    foreground: false,
                });
            }
        }
    }

    let coherence_rel =
        if foreground_blocks > 0 { coherence_sum / f64::from(foreground_blocks) } else { 0.0 };

    OrientationField {
        block_size: bs,
        rows: grid.rows(),
        cols: grid.cols(),
        blocks,
        foreground_blocks,
        coherence_sum,
        coherence_rel,
    }
}

fn structure_tensor_angle(image: &FingerprintImage, rect: &BlockRect) -> Option<(f64, f64)> {
    let (gxx, gyy, gxy) = structure_tensor(image, rect);
    angle_of_block(gxx, gyy, gxy)
}

/// Undirected angular distance between two ridge angles, folded into
/// `[0, PI/2]`.
fn angular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % PI;
    if d > PI / 2.0 {
        PI - d
    } else {
        d
    }
}

/// Histogram of per-block angle deviations against `limits`.
///
/// A block's deviation is the mean angular distance to its foreground
/// 4-neighbors; blocks without any foreground neighbor are skipped.
pub fn deviation_histogram(field: &OrientationField, limits: &[f64; 9]) -> [u32; 10] {
    let mut buckets = [0u32; 10];
    for block in field.blocks.iter().filter(|b| b.foreground) {
        let mut sum = 0.0;
        let mut n = 0u32;
        let (row, col) = (block.row, block.col);
        let mut visit = |r: u32, c: u32| {
            let neighbor = field.block_at(r, c);
            if neighbor.foreground {
                sum += angular_distance(block.angle, neighbor.angle);
                n += 1;
            }
        };
        if row > 0 {
            visit(row - 1, col);
        }
        if row + 1 < field.rows {
            visit(row + 1, col);
        }
        if col > 0 {
            visit(row, col - 1);
        }
        if col + 1 < field.cols {
            visit(row, col + 1);
        }
        if n == 0 {
            continue;
        }
        let deviation = sum / f64::from(n);
        let bucket = limits.iter().position(|&limit| deviation < limit).unwrap_or(limits.len());
        buckets[bucket] += 1;
    }
    buckets
}

/// Feature module exposing the orientation-field aggregates.
pub struct OrientationFeatures<'a> {
    roi: &'a RoiResults,
    block_size: u32,
    limits: [f64; 9],
}

impl<'a> OrientationFeatures<'a> {
    pub fn new(roi: &'a RoiResults, block_size: u32, limits: [f64; 9]) -> Self {
        Self { roi, block_size, limits }
    }

    fn failure_status(&self, image: &FingerprintImage) -> FeatureStatus {
        if image.width() < self.roi.chosen_block_size
            || image.height() < self.roi.chosen_block_size
        {
            FeatureStatus::ImageTooSmall
        } else {
            FeatureStatus::EmptyRoi
        }
    }
}

impl FeatureModule for OrientationFeatures<'_> {
    fn module_name(&self) -> &'static str {
        "OrientationFeatures"
    }

    fn speed_group(&self) -> &'static str {
        speed_groups::ORIENTATION
    }

    fn feature_ids(&self) -> Vec<String> {
        let mut v = vec![ids::OF_COHERENCE_SUM.to_string(), ids::OF_COHERENCE_REL.to_string()];
        v.extend(ids::OF_BINS.iter().map(|s| s.to_string()));
        v
    }

    fn compute(&self, image: &FingerprintImage) -> Result<Vec<FeatureValue>, QualityError> {
        if self.roi.is_empty() {
            let status = self.failure_status(image);
            return Ok(self.feature_ids().into_iter().map(|id| FeatureValue::failed(id, status)).collect());
        }

        let field = compute_orientation_field(image, self.roi, self.block_size);
        if field.foreground_blocks == 0 {
            return Ok(self
                .feature_ids()
                .into_iter()
                .map(|id| FeatureValue::failed(id, FeatureStatus::EmptyRoi))
                .collect());
        }

        let histogram = deviation_histogram(&field, &self.limits);
        let mut values = vec![
            FeatureValue::computed(ids::OF_COHERENCE_SUM, field.coherence_sum),
            FeatureValue::computed(ids::OF_COHERENCE_REL, field.coherence_rel),
        ];
        for (id, count) in ids::OF_BINS.iter().zip(histogram.iter()) {
            values.push(FeatureValue::computed(*id, f64::from(*count)));
        }
        Ok(values)
    }
}
