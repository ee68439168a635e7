use crate::error::QualityError;
use crate::feature::{ids, speed_groups, FeatureModule, FeatureValue};
use crate::image::FingerprintImage;

/// Minutia type as reported by the extraction engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinutiaKind {
    RidgeEnding,
    Bifurcation,
    Other,
}

/// One minutia as supplied by an external extraction engine.
#[derive(Debug, Clone)]
pub struct Minutia {
    /// x-coordinate from the top-left corner, pixels.
    pub x: u32,
    /// y-coordinate from the top-left corner, pixels.
    pub y: u32,
    /// Minutia direction in radians.
    pub angle: f64,
    /// Extractor-reported quality, 0..=100.
    pub quality: u8,
    pub kind: MinutiaKind,
}

/// External collaborator producing the minutiae list for an image.
///
/// Extraction failure is not fatal to scoring: the engine treats it as
/// "zero minutiae" and proceeds.
pub trait MinutiaeProvider {
    fn extract(&self, image: &FingerprintImage) -> Result<Vec<Minutia>, QualityError>;
}

/// Integer centroid of the minutiae locations.
///
/// `None` for an empty list; the center of mass of no points is undefined
/// and must not be produced by a division by zero.
pub fn center_of_minutiae_mass(minutiae: &[Minutia]) -> Option<(u32, u32)> {
    if minutiae.is_empty() {
        return None;
    }
    let mut sx = 0u64;
    let mut sy = 0u64;
    for m in minutiae {
        sx += u64::from(m.x);
        sy += u64::from(m.y);
    }
    let n = minutiae.len() as u64;
    Some(((sx / n) as u32, (sy / n) as u32))
}

/// Counts minutiae inside a `w x h` rectangle centered on `center`, clamped
/// to the image bounds. Bounds are inclusive after clamping.
pub fn count_in_com_rect(
    minutiae: &[Minutia],
    center: (u32, u32),
    w: u32,
    h: u32,
    image: &FingerprintImage,
) -> u32 {
    let (cx, cy) = center;
    let start_x = cx.saturating_sub(w / 2);
    let start_y = cy.saturating_sub(h / 2);
    let end_x = (cx + w / 2).min(image.width() - 1);
    let end_y = (cy + h / 2).min(image.height() - 1);

    minutiae
        .iter()
        .filter(|m| m.x >= start_x && m.x <= end_x && m.y >= start_y && m.y <= end_y)
        .count() as u32
}

/// Feature module computing spatial-distribution metrics of the minutiae
/// list. Independent of the image-based analyzer chain.
pub struct MinutiaeFeatures<'a> {
    minutiae: &'a [Minutia],
    com_rect_sizes: &'a [(u32, u32)],
}

impl<'a> MinutiaeFeatures<'a> {
    pub fn new(minutiae: &'a [Minutia], com_rect_sizes: &'a [(u32, u32)]) -> Self {
        Self { minutiae, com_rect_sizes }
    }
}

impl FeatureModule for MinutiaeFeatures<'_> {
    fn module_name(&self) -> &'static str {
        "MinutiaeFeatures"
    }

    fn speed_group(&self) -> &'static str {
        speed_groups::MINUTIAE
    }

    fn feature_ids(&self) -> Vec<String> {
        let mut v = vec![ids::MIN_COUNT.to_string()];
        v.extend(self.com_rect_sizes.iter().map(|&(w, h)| ids::min_count_com_rect(w, h)));
        v
    }

    fn compute(&self, image: &FingerprintImage) -> Result<Vec<FeatureValue>, QualityError> {
        let mut values =
            vec![FeatureValue::computed(ids::MIN_COUNT, self.minutiae.len() as f64)];

        // Zero minutiae is a valid, common result: every rectangle count is
        // a well-defined zero.
        let center = center_of_minutiae_mass(self.minutiae);
        for &(w, h) in self.com_rect_sizes {
            let count = match center {
                Some(center) => count_in_com_rect(self.minutiae, center, w, h, image),
                None => 0,
            };
            values.push(FeatureValue::computed(ids::min_count_com_rect(w, h), f64::from(count)));
        }
        Ok(values)
    }
}
