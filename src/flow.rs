use crate::error::QualityError;
use crate::feature::{ids, speed_groups, FeatureModule, FeatureStatus, FeatureValue};
use crate::grid::{BlockGrid, BlockRect};
use crate::image::FingerprintImage;
use crate::roi::RoiResults;
use std::collections::HashSet;

/// Ridge-flow classification of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowClass {
    /// Not covered by the ROI.
    Background,
    /// Weak, ambiguous ridge signal.
    LowFlow,
    /// Strong ridge signal.
    HighFlow,
}

/// Per-block flow classification over the ROI block grid.
#[derive(Debug, Clone)]
pub struct FlowMap {
    pub block_size: u32,
    pub rows: u32,
    pub cols: u32,
    /// Row-major, one entry per grid block.
    pub classes: Vec<FlowClass>,
    pub high_flow_blocks: u32,
    pub low_flow_blocks: u32,
    pub background_blocks: u32,
}

impl FlowMap {
    pub fn total_blocks(&self) -> u32 {
        self.rows * self.cols
    }
}

/// Standard deviation of the gradient magnitude over `rect`.
///
/// The gradient uses central differences with one-sided fallbacks at the
/// rectangle borders, matching the orientation analyzer.
fn gradient_magnitude_stddev(image: &FingerprintImage, rect: &BlockRect) -> f64 {
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let x0 = rect.x;
    let y0 = rect.y;
    let x1 = rect.x + rect.w - 1;
    let y1 = rect.y + rect.h - 1;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let gx = if rect.w == 1 {
                0.0
            } else if x == x0 {
                f64::from(image.pixel(x + 1, y)) - f64::from(image.pixel(x, y))
            } else if x == x1 {
                f64::from(image.pixel(x, y)) - f64::from(image.pixel(x - 1, y))
            } else {
                (f64::from(image.pixel(x + 1, y)) - f64::from(image.pixel(x - 1, y))) / 2.0
            };
            let gy = if rect.h == 1 {
                0.0
            } else if y == y0 {
                f64::from(image.pixel(x, y + 1)) - f64::from(image.pixel(x, y))
            } else if y == y1 {
                f64::from(image.pixel(x, y)) - f64::from(image.pixel(x, y - 1))
            } else {
                (f64::from(image.pixel(x, y + 1)) - f64::from(image.pixel(x, y - 1))) / 2.0
            };
            let magnitude = (gx * gx + gy * gy).sqrt();
            sum += magnitude;
            sum_sq += magnitude * magnitude;
        }
    }
    let n = rect.pixel_area() as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0).sqrt()
}

/// Expands `rect` by one block width on every side, clamped to the image.
fn surrounding_window(rect: &BlockRect, bs: u32, width: u32, height: u32) -> BlockRect {
    let x = rect.x.saturating_sub(bs);
    let y = rect.y.saturating_sub(bs);
    let w = (rect.x + rect.w + bs).min(width) - x;
    let h = (rect.y + rect.h + bs).min(height) - y;
    BlockRect { row: rect.row, col: rect.col, x, y, w, h, complete: rect.complete }
}

/// Classifies ROI blocks as low-flow or high-flow.
///
/// The flow strength of a block is the standard deviation of its gradient
/// magnitudes, optionally computed over a window one block wide on each side
/// to reduce edge sensitivity. Blocks below `stddev_threshold` are low-flow.
/// The ROI is an input, not a side-channel: the same image can be
/// re-filtered against a different `RoiResults` without recomputing anything
/// else.
pub fn compute_flow_map(
    image: &FingerprintImage,
    roi: &RoiResults,
    stddev_threshold: f64,
    use_surrounding_window: bool,
) -> FlowMap {
    let bs = roi.chosen_block_size;
    let grid = BlockGrid::new(image.width(), image.height(), bs);
    let roi_coords: HashSet<(u32, u32)> = roi.roi_blocks.iter().map(|r| (r.row, r.col)).collect();

    let mut classes = Vec::with_capacity(grid.total_block_count() as usize);
    let mut high_flow_blocks = 0u32;
    let mut low_flow_blocks = 0u32;
    let mut background_blocks = 0u32;

    for rect in grid.blocks() {
        if !roi_coords.contains(&(rect.row, rect.col)) {
            background_blocks += 1;
            classes.push(FlowClass::Background);
            continue;
        }
        let window = if use_surrounding_window {
            surrounding_window(&rect, bs, image.width(), image.height())
        } else {
            rect
        };
        let strength = gradient_magnitude_stddev(image, &window);
        if strength < stddev_threshold {
            low_flow_blocks += 1;
            classes.push(FlowClass::LowFlow);
        } else {
            high_flow_blocks += 1;
            classes.push(FlowClass::HighFlow);
        }
    }

    FlowMap {
        block_size: bs,
        rows: grid.rows(),
        cols: grid.cols(),
        classes,
        high_flow_blocks,
        low_flow_blocks,
        background_blocks,
    }
}

/// Feature module exposing the flow-map counts and ratios.
pub struct FlowFeatures<'a> {
    roi: &'a RoiResults,
    stddev_threshold: f64,
    use_surrounding_window: bool,
}

impl<'a> FlowFeatures<'a> {
    pub fn new(roi: &'a RoiResults, stddev_threshold: f64, use_surrounding_window: bool) -> Self {
        Self { roi, stddev_threshold, use_surrounding_window }
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

impl FeatureModule for FlowFeatures<'_> {
    fn module_name(&self) -> &'static str {
        "FlowFeatures"
    }

    fn speed_group(&self) -> &'static str {
        speed_groups::FLOW
    }

    fn feature_ids(&self) -> Vec<String> {
        vec![
            ids::FLOW_HIGH_FLOW_BLOCKS.to_string(),
            ids::FLOW_LOW_FLOW_BLOCKS.to_string(),
            ids::FLOW_HIGH_FLOW_RATIO.to_string(),
            ids::FLOW_LOW_FLOW_RATIO.to_string(),
            ids::FLOW_BACKGROUND_RATIO.to_string(),
        ]
    }

    fn compute(&self, image: &FingerprintImage) -> Result<Vec<FeatureValue>, QualityError> {
        if self.roi.is_empty() {
            let status = self.failure_status(image);
            return Ok(self.feature_ids().into_iter().map(|id| FeatureValue::failed(id, status)).collect());
        }

        let map = compute_flow_map(image, self.roi, self.stddev_threshold, self.use_surrounding_window);
        let total = f64::from(map.total_blocks());
        Ok(vec![
            FeatureValue::computed(ids::FLOW_HIGH_FLOW_BLOCKS, f64::from(map.high_flow_blocks)),
            FeatureValue::computed(ids::FLOW_LOW_FLOW_BLOCKS, f64::from(map.low_flow_blocks)),
            FeatureValue::computed(ids::FLOW_HIGH_FLOW_RATIO, f64::from(map.high_flow_blocks) / total),
            FeatureValue::computed(ids::FLOW_LOW_FLOW_RATIO, f64::from(map.low_flow_blocks) / total),
            FeatureValue::computed(ids::FLOW_BACKGROUND_RATIO, f64::from(map.background_blocks) / total),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::compute_roi;

    fn striped_image(w: u32, h: u32) -> FingerprintImage {
        let mut pixels = Vec::with_capacity((w * h) as usize);
        for _y in 0..h {
            for x in 0..w {
                pixels.push(if (x / 4) % 2 == 0 { 0 } else { 255 });
            }
        }
        FingerprintImage::new(pixels, w, h, 500, 0).unwrap()
    }

    #[test]
    fn strong_stripes_are_high_flow() {
        let img = striped_image(96, 96);
        let roi = compute_roi(&img, 32, 8.0, 16);
        let map = compute_flow_map(&img, &roi, 10.0, false);
        assert_eq!(map.background_blocks, 0);
        assert_eq!(map.low_flow_blocks, 0);
        assert_eq!(map.high_flow_blocks, map.total_blocks());
    }

    #[test]
    fn counts_partition_the_grid() {
        let img = striped_image(100, 70);
        let roi = compute_roi(&img, 32, 8.0, 16);
        let map = compute_flow_map(&img, &roi, 10.0, true);
        assert_eq!(
            map.high_flow_blocks + map.low_flow_blocks + map.background_blocks,
            map.total_blocks()
        );
        assert_eq!(map.classes.len() as u32, map.total_blocks());
    }

    #[test]
    fn empty_roi_is_all_background() {
        let img = FingerprintImage::new(vec![255u8; 96 * 96], 96, 96, 500, 0).unwrap();
        let roi = compute_roi(&img, 32, 8.0, 16);
        let map = compute_flow_map(&img, &roi, 10.0, true);
        assert_eq!(map.background_blocks, map.total_blocks());
        assert!(map.classes.iter().all(|c| *c == FlowClass::Background));
    }

    #[test]
    fn refilter_against_restricted_roi() {
        let img = striped_image(96, 96);
        let full = compute_roi(&img, 32, 8.0, 16);
        let mut restricted = full.clone();
        restricted.roi_blocks.truncate(2);
        restricted.roi_pixel_count = restricted.roi_blocks.iter().map(|r| r.pixel_area()).sum();

        let map = compute_flow_map(&img, &restricted, 10.0, false);
        assert_eq!(map.high_flow_blocks + map.low_flow_blocks, 2);
        assert_eq!(map.background_blocks, map.total_blocks() - 2);
    }

    #[test]
    fn empty_roi_features_fail() {
        let img = FingerprintImage::new(vec![255u8; 96 * 96], 96, 96, 500, 0).unwrap();
        let roi = compute_roi(&img, 32, 8.0, 16);
        let module = FlowFeatures::new(&roi, 10.0, true);
        let values = module.compute(&img).unwrap();
        assert_eq!(values.len(), 5);
        assert!(values.iter().all(|v| v.status == FeatureStatus::EmptyRoi));
    }

    #[test]
    fn surrounding_window_clamps_to_image() {
        let rect = BlockRect { row: 0, col: 0, x: 0, y: 0, w: 32, h: 32, complete: true };
        let window = surrounding_window(&rect, 32, 96, 96);
        assert_eq!((window.x, window.y), (0, 0));
        assert_eq!((window.w, window.h), (64, 64));
    }
}
