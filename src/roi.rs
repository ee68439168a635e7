use crate::error::QualityError;
use crate::feature::{ids, speed_groups, FeatureModule, FeatureStatus, FeatureValue};
use crate::grid::{BlockGrid, BlockRect};
use crate::image::FingerprintImage;
use tracing::debug;

/// Result of the region-of-interest detection pass.
///
/// `roi_blocks` records every foreground block with its clipped pixel
/// rectangle, in row-major order. `roi_pixel_count == 0` is a valid
/// degenerate state (blank image, or image smaller than one block) that all
/// downstream consumers must tolerate.
#[derive(Debug, Clone, Default)]
pub struct RoiResults {
    pub chosen_block_size: u32,
    pub complete_block_count: u32,
    pub total_block_count: u32,
    pub roi_blocks: Vec<BlockRect>,
    pub roi_pixel_count: u64,
    pub image_pixel_count: u64,
    pub mean_of_roi_pixels: f64,
    pub std_dev_of_roi_pixels: f64,
}

impl RoiResults {
    /// The all-zero result for an image smaller than one block.
    fn degenerate(bs: u32, image_pixel_count: u64) -> Self {
        Self {
            chosen_block_size: bs,
            complete_block_count: 0,
            total_block_count: 1,
            image_pixel_count,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roi_pixel_count == 0
    }
}

/// Population mean and standard deviation of the gray values in `rect`.
fn block_mean_stddev(image: &FingerprintImage, rect: &BlockRect) -> (f64, f64) {
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in rect.y..rect.y + rect.h {
        for x in rect.x..rect.x + rect.w {
            let v = f64::from(image.pixel(x, y));
            sum += v;
            sum_sq += v * v;
        }
    }
    let n = rect.pixel_area() as f64;
    let mean = sum / n;
    let var = (sum_sq / n - mean * mean).max(0.0);
    (mean, var.sqrt())
}

/// Whether `rect` contains at least one pixel darker than `cutoff`.
///
/// Texture alone is not enough to call a block ridge area: without this
/// check, isolated scanner noise on a white margin registers as foreground.
fn has_near_black_pixel(image: &FingerprintImage, rect: &BlockRect, cutoff: u8) -> bool {
    for y in rect.y..rect.y + rect.h {
        for x in rect.x..rect.x + rect.w {
            if image.pixel(x, y) < cutoff {
                return true;
            }
        }
    }
    false
}

/// Classifies blocks as fingerprint region vs. background.
///
/// A block is foreground when the standard deviation of its gray values
/// exceeds `stddev_threshold` and it contains a pixel darker than
/// `black_pixel_cutoff`. ROI-wide mean and standard deviation are computed
/// over the union of foreground-block pixels, not over block-level
/// aggregates, so partial blocks are not double-weighted.
pub fn compute_roi(
    image: &FingerprintImage,
    bs: u32,
    stddev_threshold: f64,
    black_pixel_cutoff: u8,
) -> RoiResults {
    if image.width() < bs || image.height() < bs {
        debug!(
            "image {}x{} smaller than one {}px block, degenerate ROI",
            image.width(),
            image.height(),
            bs
        );
        return RoiResults::degenerate(bs, image.pixel_count());
    }

    let grid = BlockGrid::new(image.width(), image.height(), bs);
    let mut roi_blocks = Vec::new();

    for rect in grid.blocks() {
        let (_, stddev) = block_mean_stddev(image, &rect);
        if stddev > stddev_threshold && has_near_black_pixel(image, &rect, black_pixel_cutoff) {
            roi_blocks.push(rect);
        }
    }

    // Pixel-level pass over the foreground union.
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut roi_pixel_count = 0u64;
    for rect in &roi_blocks {
        for y in rect.y..rect.y + rect.h {
            for x in rect.x..rect.x + rect.w {
                let v = f64::from(image.pixel(x, y));
                sum += v;
                sum_sq += v * v;
            }
        }
        roi_pixel_count += rect.pixel_area();
    }

    let (mean, stddev) = if roi_pixel_count > 0 {
        let n = roi_pixel_count as f64;
        let mean = sum / n;
        (mean, (sum_sq / n - mean * mean).max(0.0).sqrt())
    } else {
        (0.0, 0.0)
    };

    RoiResults {
        chosen_block_size: bs,
        complete_block_count: grid.complete_block_count(),
        total_block_count: grid.total_block_count(),
        roi_blocks,
        roi_pixel_count,
        image_pixel_count: image.pixel_count(),
        mean_of_roi_pixels: mean,
        std_dev_of_roi_pixels: stddev,
    }
}

/// Feature module exposing the ROI statistics.
pub struct RoiFeatures<'a> {
    roi: &'a RoiResults,
}

impl<'a> RoiFeatures<'a> {
    pub fn new(roi: &'a RoiResults) -> Self {
        Self { roi }
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

impl FeatureModule for RoiFeatures<'_> {
    fn module_name(&self) -> &'static str {
        "RoiFeatures"
    }

    fn speed_group(&self) -> &'static str {
        speed_groups::ROI
    }

    fn feature_ids(&self) -> Vec<String> {
        vec![
            ids::ROI_AREA_RATIO.to_string(),
            ids::ROI_MEAN.to_string(),
            ids::ROI_STD_DEV.to_string(),
        ]
    }

    fn compute(&self, image: &FingerprintImage) -> Result<Vec<FeatureValue>, QualityError> {
        if self.roi.is_empty() {
            let status = self.failure_status(image);
            return Ok(self.feature_ids().into_iter().map(|id| FeatureValue::failed(id, status)).collect());
        }
        let ratio = self.roi.roi_pixel_count as f64 / self.roi.image_pixel_count as f64;
        Ok(vec![
            FeatureValue::computed(ids::ROI_AREA_RATIO, ratio),
            FeatureValue::computed(ids::ROI_MEAN, self.roi.mean_of_roi_pixels),
            FeatureValue::computed(ids::ROI_STD_DEV, self.roi.std_dev_of_roi_pixels),
        ])
    }
}
