// layout.rs — 自适应折行与文字定位
// 反复调整折行列数，直到说明文字的渲染宽度放得进图片左右留白之间

use log::{debug, warn};

/// 每轮收缩的列数
pub const WRAP_STEP: usize = 10;
/// 折行列数下限，到这里即使仍然超宽也停止
pub const MIN_WRAP_COLUMNS: usize = 1;

/// 折行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFit {
    pub wrap_columns: usize,
    pub wrapped: String,
    /// 渲染后的像素尺寸 (宽, 高)
    pub size: (u32, u32),
}

/// 一次合成过程中的排版状态，合成结束后随结果一起返回
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutState {
    pub image_size: (u32, u32),
    pub wrap_columns: usize,
    pub title_origin: (i32, i32),
    pub caption_origin: (i32, i32),
    pub title_size: (u32, u32),
    pub caption_size: (u32, u32),
}

/// 把说明文字折行到图片宽度以内
///
/// 先按实测宽度与图片宽度的比例缩放列数，再以 `WRAP_STEP` 为步长单调收缩，
/// 直到宽度不超过 `image_width - 2 * border_offset` 或列数到达下限。
pub fn fit_caption<M>(
    text: &str,
    image_width: u32,
    border_offset: u32,
    initial_columns: usize,
    measure: M,
) -> TextFit
where
    M: Fn(&str) -> (u32, u32),
{
    let limit = image_width.saturating_sub(2 * border_offset);
    let mut columns = initial_columns.max(MIN_WRAP_COLUMNS);

    let (first_width, _) = measure(textwrap::fill(text, columns).as_str());
    if first_width > 0 {
        let rescaled = (f64::from(image_width) / f64::from(first_width) * columns as f64).round();
        columns = (rescaled as usize).max(MIN_WRAP_COLUMNS);
        debug!("Rescaled wrap width to {} columns (measured {}px)", columns, first_width);
    }

    loop {
        let wrapped = textwrap::fill(text, columns);
        let size = measure(wrapped.as_str());
        if size.0 <= limit {
            return TextFit { wrap_columns: columns, wrapped, size };
        }
        if columns <= MIN_WRAP_COLUMNS {
            warn!(
                "Caption is still {}px wide at {} columns (limit {}px)",
                size.0, columns, limit
            );
            return TextFit { wrap_columns: columns, wrapped, size };
        }
        columns = columns.saturating_sub(WRAP_STEP).max(MIN_WRAP_COLUMNS);
        debug!("New wrap width = {}", columns);
    }
}

/// 计算标题和说明文字的左上角坐标
///
/// 两块文字贴底排列，标题在上、说明在下，底边距离图片底部 `border_offset`。
/// 文字总高度超过图片时纵坐标钳制为 0。
pub fn place_text(
    image_size: (u32, u32),
    title_size: (u32, u32),
    caption_size: (u32, u32),
    border_offset: u32,
) -> ((i32, i32), (i32, i32)) {
    let x = border_offset as i32;
    let block = i64::from(title_size.1) + i64::from(caption_size.1) + i64::from(border_offset);
    let title_y = (i64::from(image_size.1) - block).max(0) as i32;
    let caption_y = title_y + title_size.1 as i32;
    ((x, title_y), (x, caption_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 等宽测量：每个字符 `char_px` 像素宽，每行 `line_px` 像素高
    fn mono(char_px: u32, line_px: u32) -> impl Fn(&str) -> (u32, u32) {
        move |text: &str| {
            let widest = text.lines().map(|l| l.chars().count() as u32).max().unwrap_or(0);
            let lines = text.lines().count().max(1) as u32;
            (widest * char_px, lines * line_px)
        }
    }

    fn caption() -> String {
        "The Orion Nebula is a picture book of star formation, from the massive, young \
         stars that are shaping the nebula to the pillars of dense gas that may be the \
         homes of budding stars. The bright central region is the home of the four \
         hefty stars collectively known as the Trapezium. "
            .repeat(4)
    }

    #[test]
    fn test_oversized_caption_shrinks_below_initial_guess() {
        let text = caption();
        let measure = mono(16, 18);
        let (initial_width, _) = measure(textwrap::fill(&text, 100).as_str());
        let (image_width, border) = (800, 25);
        assert!(initial_width > image_width - 2 * border);

        let fit = fit_caption(&text, image_width, border, 100, &measure);
        assert!(fit.wrap_columns < 100);
        assert!(fit.size.0 <= image_width - 2 * border);
        assert_eq!(fit.size, measure(fit.wrapped.as_str()));
    }

    #[test]
    fn test_narrow_caption_grows_to_fill_width() {
        let text = caption();
        let fit = fit_caption(&text, 1920, 25, 40, mono(8, 10));
        assert!(fit.wrap_columns > 40);
        assert!(fit.size.0 <= 1870);
    }

    #[test]
    fn test_degenerate_width_stops_at_minimum() {
        // 单字符就比可用宽度还宽，只能停在下限
        let fit = fit_caption("abc def", 30, 10, 100, mono(50, 10));
        assert_eq!(fit.wrap_columns, MIN_WRAP_COLUMNS);
        assert!(fit.size.0 > 10);
    }

    #[test]
    fn test_empty_caption_fits_immediately() {
        let fit = fit_caption("", 800, 25, 100, mono(16, 18));
        assert_eq!(fit.wrap_columns, 100);
        assert_eq!(fit.size.0, 0);
    }

    #[test]
    fn test_zero_initial_columns_is_clamped() {
        let fit = fit_caption("short", 800, 25, 0, mono(16, 18));
        assert!(fit.wrap_columns >= MIN_WRAP_COLUMNS);
        assert!(fit.size.0 <= 750);
    }

    #[test]
    fn test_text_is_bottom_anchored_title_above_caption() {
        let image = (1920, 960);
        let title = (400, 24);
        let caption = (1800, 180);
        let border = 25;
        let (title_origin, caption_origin) = place_text(image, title, caption, border);

        assert_eq!(title_origin, (25, 960 - (24 + 180 + 25)));
        assert!(title_origin.1 < caption_origin.1);
        assert_eq!(caption_origin.1, title_origin.1 + 24);
        let caption_bottom = caption_origin.1 + caption.1 as i32;
        assert_eq!(image.1 as i32 - caption_bottom, border as i32);
    }

    #[test]
    fn test_tall_text_is_clamped_to_top() {
        let (title_origin, caption_origin) = place_text((300, 100), (50, 40), (250, 90), 25);
        assert_eq!(title_origin.1, 0);
        assert_eq!(caption_origin.1, 40);
    }
}
