//! JSON views of hits and PNG export of rendered maps.

use std::path::Path;

use anyhow::{Context, Result};
use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::Serialize;

use bvhcast::{HitResult, OrthoImage};

/// Serializable form of a [`HitResult`].
#[derive(Debug, Serialize)]
pub struct HitView {
    pub hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triangle_id: Option<usize>,
}

impl From<&HitResult> for HitView {
    fn from(hit: &HitResult) -> Self {
        let valid = hit.valid;
        Self {
            hit: valid,
            point: valid.then(|| [hit.point.x, hit.point.y, hit.point.z]),
            distance: valid.then_some(hit.w),
            normal: valid.then(|| [hit.normal.x, hit.normal.y, hit.normal.z]),
            uv: valid.then(|| [hit.uv.x, hit.uv.y]),
            face_id: valid.then_some(hit.face_id),
            triangle_id: valid.then_some(hit.triangle_id),
        }
    }
}

/// Grayscale depth: nearest hits white, farthest dark gray, misses black.
pub fn save_depth_png(image: &OrthoImage, path: &Path) -> Result<()> {
    let (lo, hi) = image.depth_range().unwrap_or((0.0, 0.0));
    let span = hi - lo;
    let mut png = GrayImage::new(image.width as u32, image.height as u32);
    for (i, &d) in image.depth.iter().enumerate() {
        let (x, y) = ((i % image.width) as u32, (i / image.width) as u32);
        let value = if d.is_finite() {
            // Rays travel towards the negative axis: larger depth is nearer.
            let t = if span > 0.0 { (d - lo) / span } else { 1.0 };
            (48.0 + 207.0 * t).round() as u8
        } else {
            0
        };
        png.put_pixel(x, y, Luma([value]));
    }
    png.save(path)
        .with_context(|| format!("writing {}", path.display()))
}

/// Normals mapped from `[-1, 1]` to `[0, 255]` per channel; misses black.
pub fn save_normal_png(image: &OrthoImage, path: &Path) -> Result<()> {
    let mut png = RgbImage::new(image.width as u32, image.height as u32);
    for (i, n) in image.normals.iter().enumerate() {
        let (x, y) = ((i % image.width) as u32, (i / image.width) as u32);
        let pixel = if image.face_ids[i] >= 0 {
            n.map(|c| ((c.clamp(-1.0, 1.0) * 0.5 + 0.5) * 255.0).round() as u8)
        } else {
            [0; 3]
        };
        png.put_pixel(x, y, Rgb(pixel));
    }
    png.save(path)
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_view_is_bare() {
        let view = HitView::from(&HitResult::miss());
        let json = serde_json::to_string(&view).unwrap();
        assert_eq!(json, r#"{"hit":false}"#);
    }

    #[test]
    fn test_hit_view_fields() {
        let mut hit = HitResult::miss();
        hit.valid = true;
        hit.w = 2.5;
        hit.face_id = 3;
        let json = serde_json::to_value(HitView::from(&hit)).unwrap();
        assert_eq!(json["hit"], true);
        assert_eq!(json["distance"], 2.5);
        assert_eq!(json["face_id"], 3);
    }
}
