// font.rs — 字体解析、文字测量与绘制
// TrueType 字体用 ab_glyph 渲染；找不到任何字体文件时退回内置 8x8 点阵字体

use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// 常见系统字体位置，按顺序尝试
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "C:\\Windows\\Fonts\\arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
];

/// 点阵字体的原始字形边长
const BITMAP_GLYPH: u32 = 8;

/// 文字渲染使用的字体
pub enum Face {
    TrueType { font: FontVec, path: PathBuf },
    /// 内置点阵字体，字号按 8 像素的整数倍放大
    Bitmap,
}

impl std::fmt::Debug for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Face::TrueType { path, .. } => write!(f, "TrueType({})", path.display()),
            Face::Bitmap => write!(f, "Bitmap(8x8)"),
        }
    }
}

impl Face {
    /// 字体解析顺序：配置的路径 -> 系统字体 -> 内置点阵字体
    pub fn resolve(configured: Option<&Path>) -> Self {
        if let Some(path) = configured {
            match Self::load(path) {
                Some(face) => return face,
                None => warn!(
                    "Configured font {} is unusable, searching system fonts",
                    path.display()
                ),
            }
        }
        for candidate in SYSTEM_FONT_CANDIDATES {
            let path = Path::new(candidate);
            if path.is_file() {
                if let Some(face) = Self::load(path) {
                    return face;
                }
            }
        }
        info!("No TrueType font found, using built-in bitmap font");
        Face::Bitmap
    }

    fn load(path: &Path) -> Option<Self> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Reading font {} failed: {}", path.display(), e);
                return None;
            }
        };
        match FontVec::try_from_vec(data) {
            Ok(font) => {
                info!("Using font {}", path.display());
                Some(Face::TrueType {
                    font,
                    path: path.to_path_buf(),
                })
            }
            Err(e) => {
                warn!("Parsing font {} failed: {}", path.display(), e);
                None
            }
        }
    }

    /// 测量多行文本渲染后的像素尺寸 (宽, 高)
    pub fn measure(&self, size: f32, text: &str) -> (u32, u32) {
        let lines: Vec<&str> = text.split('\n').collect();
        let count = lines.len() as u32;
        match self {
            Face::TrueType { font, .. } => {
                let scaled = font.as_scaled(PxScale::from(size));
                let width = lines
                    .iter()
                    .map(|line| line_advance(&scaled, line))
                    .fold(0.0_f32, f32::max);
                let height = scaled.height() * count as f32
                    + scaled.line_gap() * count.saturating_sub(1) as f32;
                (width.ceil() as u32, height.ceil() as u32)
            }
            Face::Bitmap => {
                let scale = bitmap_scale(size);
                let widest = lines
                    .iter()
                    .map(|line| line.chars().count() as u32)
                    .max()
                    .unwrap_or(0);
                let height = count * BITMAP_GLYPH * scale + count.saturating_sub(1) * scale;
                (widest * BITMAP_GLYPH * scale, height)
            }
        }
    }

    /// 从左上角 `origin` 开始绘制多行文本，超出图片的像素会被裁掉
    pub fn draw(&self, img: &mut RgbImage, origin: (i32, i32), size: f32, text: &str, color: Rgb<u8>) {
        match self {
            Face::TrueType { font, .. } => {
                let px = PxScale::from(size);
                let scaled = font.as_scaled(px);
                let line_step = scaled.height() + scaled.line_gap();
                for (row, line) in text.split('\n').enumerate() {
                    let baseline = origin.1 as f32 + row as f32 * line_step + scaled.ascent();
                    let mut caret = origin.0 as f32;
                    let mut previous = None;
                    for ch in line.chars() {
                        let id = scaled.glyph_id(ch);
                        if let Some(prev) = previous {
                            caret += scaled.kern(prev, id);
                        }
                        let glyph = id.with_scale_and_position(px, point(caret, baseline));
                        caret += scaled.h_advance(id);
                        previous = Some(id);

                        let Some(outlined) = font.outline_glyph(glyph) else {
                            continue;
                        };
                        let bounds = outlined.px_bounds();
                        outlined.draw(|gx, gy, coverage| {
                            let x = bounds.min.x as i32 + gx as i32;
                            let y = bounds.min.y as i32 + gy as i32;
                            blend(img, x, y, color, coverage);
                        });
                    }
                }
            }
            Face::Bitmap => draw_bitmap_text(img, origin, bitmap_scale(size), text, color),
        }
    }
}

fn line_advance<F: Font, S: ScaleFont<F>>(scaled: &S, line: &str) -> f32 {
    let mut width = 0.0;
    let mut previous = None;
    for ch in line.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        previous = Some(id);
    }
    width
}

/// 点阵字体的放大倍数，至少为 1
fn bitmap_scale(size: f32) -> u32 {
    ((size / BITMAP_GLYPH as f32).round() as u32).max(1)
}

fn draw_bitmap_text(img: &mut RgbImage, origin: (i32, i32), scale: u32, text: &str, color: Rgb<u8>) {
    let s = scale as i32;
    let glyph = BITMAP_GLYPH as i32;
    for (row, line) in text.split('\n').enumerate() {
        let top = origin.1 + row as i32 * (glyph * s + s);
        let mut cursor_x = origin.0;
        for ch in line.chars() {
            if let Some(bits) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) {
                for (row_idx, row_bits) in bits.iter().enumerate() {
                    for col_idx in 0..glyph {
                        if (*row_bits >> col_idx) & 1 == 0 {
                            continue;
                        }
                        let px = cursor_x + col_idx * s;
                        let py = top + row_idx as i32 * s;
                        for sy in 0..s {
                            for sx in 0..s {
                                blend(img, px + sx, py + sy, color, 1.0);
                            }
                        }
                    }
                }
            }
            cursor_x += glyph * s;
        }
    }
}

/// 按覆盖率把颜色混合到像素上
fn blend(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }
    let c = coverage.clamp(0.0, 1.0);
    let dst = img.get_pixel_mut(x as u32, y as u32);
    for i in 0..3 {
        let mixed = f32::from(dst.0[i]) * (1.0 - c) + f32::from(color.0[i]) * c;
        dst.0[i] = mixed.round() as u8;
    }
}
