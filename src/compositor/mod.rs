// compositor/mod.rs — 壁纸合成
// 把原图缩放到屏幕区域内，再在底部叠加标题和自动折行的说明文字

pub mod font;
pub mod layout;

use crate::config::{CaptionSettings, DisplayTarget};
use crate::error::ComposeError;
use crate::source::ImageRecord;
use font::Face;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use layout::{LayoutState, fit_caption, place_text};
use log::info;
use std::path::Path;

/// 合成结果；未嵌入文字时没有排版状态
pub struct Composition {
    pub image: RgbImage,
    pub layout: Option<LayoutState>,
}

/// 等比缩放后的尺寸：放进目标区域，不放大、不变形
pub fn scale_to_fit(source: (u32, u32), target: DisplayTarget) -> (u32, u32) {
    let (sw, sh) = source;
    if sw == 0 || sh == 0 {
        return source;
    }
    let ratio = (f64::from(target.width) / f64::from(sw))
        .min(f64::from(target.height) / f64::from(sh))
        .min(1.0);
    let w = ((f64::from(sw) * ratio).round() as u32).clamp(1, target.width.max(1));
    let h = ((f64::from(sh) * ratio).round() as u32).clamp(1, target.height.max(1));
    (w, h)
}

/// 在内存中完成缩放和文字叠加
pub fn compose(
    source: DynamicImage,
    record: &ImageRecord,
    target: DisplayTarget,
    caption: &CaptionSettings,
    face: &Face,
) -> Composition {
    let original = (source.width(), source.height());
    let (w, h) = scale_to_fit(original, target);
    let mut image = if (w, h) == original {
        source.to_rgb8()
    } else {
        source.resize_exact(w, h, FilterType::Lanczos3).to_rgb8()
    };
    info!("Scaled {}x{} -> {}x{}", original.0, original.1, w, h);

    if !caption.embed {
        return Composition { image, layout: None };
    }

    let fit = fit_caption(
        &record.explanation,
        w,
        caption.border_offset,
        caption.wrap_columns,
        |text| face.measure(caption.caption_size, text),
    );
    let title_size = face.measure(caption.title_size, &record.title);
    let (title_origin, caption_origin) = place_text((w, h), title_size, fit.size, caption.border_offset);

    let color = Rgb(caption.color);
    face.draw(&mut image, title_origin, caption.title_size, &record.title, color);
    face.draw(&mut image, caption_origin, caption.caption_size, &fit.wrapped, color);

    let layout = LayoutState {
        image_size: (w, h),
        wrap_columns: fit.wrap_columns,
        title_origin,
        caption_origin,
        title_size,
        caption_size: fit.size,
    };
    info!(
        "Caption wrapped at {} columns into {:?} on {:?}, title {:?} at {:?}, caption at {:?}",
        layout.wrap_columns,
        layout.caption_size,
        layout.image_size,
        layout.title_size,
        layout.title_origin,
        layout.caption_origin
    );
    Composition { image, layout: Some(layout) }
}

/// 读取下载的原图，合成后保存到 `output`
///
/// 原图损坏是致命错误，这里不重试。
pub fn compose_file(
    raw: &Path,
    output: &Path,
    record: &ImageRecord,
    target: DisplayTarget,
    caption: &CaptionSettings,
    face: &Face,
) -> Result<Option<LayoutState>, ComposeError> {
    let decode_err = |detail: String| ComposeError::Decode {
        path: raw.to_path_buf(),
        detail,
    };
    let source = ImageReader::open(raw)
        .map_err(|e| decode_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?
        .decode()
        .map_err(|e| decode_err(e.to_string()))?;

    let composition = compose(source, record, target, caption, face);
    composition
        .image
        .save(output)
        .map_err(|e| ComposeError::Save {
            path: output.to_path_buf(),
            detail: e.to_string(),
        })?;
    info!("Composed wallpaper saved to {}", output.display());

    Ok(composition.layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MediaType;
    use chrono::NaiveDate;

    fn record(explanation: &str) -> ImageRecord {
        ImageRecord {
            title: "The Orion Nebula".to_string(),
            explanation: explanation.to_string(),
            media_type: MediaType::Image,
            image_url: "https://apod.test/orion.jpg".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        }
    }

    fn gray(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([40, 40, 40])))
    }

    #[test]
    fn test_scale_wide_source_into_full_hd() {
        let target = DisplayTarget { width: 1920, height: 1080 };
        let (w, h) = scale_to_fit((4000, 2000), target);
        assert!(w <= 1920 && h <= 1080);
        assert_eq!((w, h), (1920, 960));
        let src_ratio = 4000.0 / 2000.0;
        assert!((f64::from(w) / f64::from(h) - src_ratio).abs() < 0.01);
    }

    #[test]
    fn test_scale_tall_source_is_bounded_by_height() {
        let target = DisplayTarget { width: 1920, height: 1080 };
        let (w, h) = scale_to_fit((1000, 3000), target);
        assert_eq!(h, 1080);
        assert_eq!(w, 360);
    }

    #[test]
    fn test_small_source_is_not_enlarged() {
        let target = DisplayTarget { width: 1920, height: 1080 };
        assert_eq!(scale_to_fit((800, 600), target), (800, 600));
    }

    #[test]
    fn test_compose_without_caption_only_scales() {
        let caption = CaptionSettings { embed: false, ..CaptionSettings::default() };
        let target = DisplayTarget { width: 400, height: 300 };
        let out = compose(gray(800, 400), &record("text"), target, &caption, &Face::Bitmap);
        assert_eq!(out.image.dimensions(), (400, 200));
        assert!(out.layout.is_none());
    }

    #[test]
    fn test_compose_with_caption_keeps_text_inside_image() {
        let caption = CaptionSettings::default();
        let target = DisplayTarget { width: 1000, height: 700 };
        let explanation = "Stars form in the dusty pillars of the nebula. ".repeat(20);
        let out = compose(gray(2000, 1400), &record(&explanation), target, &caption, &Face::Bitmap);

        let layout = out.layout.unwrap();
        assert_eq!(layout.image_size, (1000, 700));
        assert!(layout.wrap_columns < caption.wrap_columns);
        assert!(layout.caption_size.0 <= 1000 - 2 * caption.border_offset);
        assert!(layout.title_origin.1 < layout.caption_origin.1);
        let bottom = layout.caption_origin.1 + layout.caption_size.1 as i32;
        assert_eq!(700 - bottom, caption.border_offset as i32);
        // 文字颜色确实画上去了
        assert!(out.image.pixels().any(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_compose_file_rejects_corrupt_download() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("apod_download");
        std::fs::write(&raw, b"<html>not an image</html>").unwrap();
        let err = compose_file(
            &raw,
            &dir.path().join("apod_wallpaper.jpg"),
            &record("x"),
            DisplayTarget::default(),
            &CaptionSettings::default(),
            &Face::Bitmap,
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::Decode { .. }));
    }

    #[test]
    fn test_compose_file_writes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("apod_download");
        gray(640, 480).save_with_format(&raw, image::ImageFormat::Png).unwrap();
        let output = dir.path().join("apod_wallpaper.jpg");
        let layout = compose_file(
            &raw,
            &output,
            &record("A short caption."),
            DisplayTarget { width: 320, height: 240 },
            &CaptionSettings::default(),
            &Face::Bitmap,
        )
        .unwrap()
        .unwrap();
        assert_eq!(layout.image_size, (320, 240));
        let saved = image::open(&output).unwrap();
        assert_eq!((saved.width(), saved.height()), (320, 240));
    }
}
