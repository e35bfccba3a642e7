// source/mod.rs — APOD 数据源抽象
// 定义每日图片记录的数据结构，以及数据源必须实现的通用 Trait

pub mod nasa;

use crate::error::SourceError;
use async_trait::async_trait; // 异步 Trait 支持宏
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

/// 可识别的图片扩展名（不区分大小写）
pub const RECOGNIZED_FORMATS: [&str; 4] = ["jpg", "jpeg", "bmp", "png"];

/// 条目的媒体类型，视频等其他类型统一归为 Other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    #[serde(other)]
    Other,
}

/// APOD 接口返回的原始 JSON 条目
///
/// 只提取我们需要的字段，多余字段会被 serde 忽略
#[derive(Debug, Clone, Deserialize)]
pub struct ApodEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub explanation: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub hdurl: Option<String>,
}

/// 经过筛选、可以直接下载合成的图片记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub title: String,
    pub explanation: String,
    pub media_type: MediaType,
    pub image_url: String,
    pub date: NaiveDate,
}

impl ApodEntry {
    /// 按 HD 偏好选择图片地址；hdurl 缺失时退回 url
    pub fn resolved_url(&self, hd: bool) -> Option<&str> {
        let preferred = if hd { self.hdurl.as_deref() } else { None };
        preferred.or(self.url.as_deref())
    }

    /// 只有媒体类型是图片且扩展名可识别时才返回记录
    pub fn into_record(self, hd: bool) -> Option<ImageRecord> {
        if self.media_type != MediaType::Image {
            return None;
        }
        let image_url = self.resolved_url(hd)?.to_string();
        if !has_recognized_extension(&image_url) {
            return None;
        }
        Some(ImageRecord {
            title: self.title,
            explanation: self.explanation,
            media_type: self.media_type,
            image_url,
            date: self.date,
        })
    }
}

/// 检查 URL 路径部分的扩展名，忽略查询串和片段
pub fn has_recognized_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((_, ext)) => RECOGNIZED_FORMATS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known)),
        None => false,
    }
}

/// APOD 数据源的抽象 Trait
///
/// 真实实现是 `nasa::ApodClient`，测试中使用内存假实现
#[async_trait]
pub trait ApodSource {
    /// 查询某一天的条目；`None` 表示服务端的"今天"
    async fn entry(&self, date: Option<NaiveDate>) -> Result<ApodEntry, SourceError>;

    /// 下载图片到指定路径，返回写入的字节数
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(media_type: MediaType, url: Option<&str>, hdurl: Option<&str>) -> ApodEntry {
        ApodEntry {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            title: "Orion".to_string(),
            explanation: "A nebula.".to_string(),
            media_type,
            url: url.map(str::to_string),
            hdurl: hdurl.map(str::to_string),
        }
    }

    #[test]
    fn test_recognized_extensions() {
        assert!(has_recognized_extension("https://apod.nasa.gov/image/a.jpg"));
        assert!(has_recognized_extension("https://apod.nasa.gov/image/a.JPEG"));
        assert!(has_recognized_extension("https://x/a.Png?size=large"));
        assert!(has_recognized_extension("https://x/a.bmp#frag"));
        assert!(!has_recognized_extension("https://x/a.gif"));
        assert!(!has_recognized_extension("https://www.youtube.com/embed/abc"));
        assert!(!has_recognized_extension("https://x.jpg/embed/video"));
    }

    #[test]
    fn test_hd_preference_selects_url_field() {
        let e = entry(MediaType::Image, Some("https://x/sd.jpg"), Some("https://x/hd.png"));
        assert_eq!(e.resolved_url(true), Some("https://x/hd.png"));
        assert_eq!(e.resolved_url(false), Some("https://x/sd.jpg"));
        let no_hd = entry(MediaType::Image, Some("https://x/sd.jpg"), None);
        assert_eq!(no_hd.resolved_url(true), Some("https://x/sd.jpg"));
    }

    #[test]
    fn test_unusable_entries_are_rejected() {
        assert!(entry(MediaType::Other, Some("https://x/a.jpg"), None).into_record(true).is_none());
        assert!(entry(MediaType::Image, Some("https://x/a.gif"), None).into_record(false).is_none());
        assert!(entry(MediaType::Image, None, None).into_record(true).is_none());
        let record = entry(MediaType::Image, Some("https://x/a.jpg"), None)
            .into_record(true)
            .unwrap();
        assert_eq!(record.image_url, "https://x/a.jpg");
        assert_eq!(record.title, "Orion");
        assert_eq!(record.media_type, MediaType::Image);
    }

    #[test]
    fn test_entry_json_with_unknown_media_type() {
        let json = r#"{
            "date": "2024-05-01",
            "explanation": "Watch the eclipse.",
            "media_type": "video",
            "service_version": "v1",
            "title": "Eclipse",
            "url": "https://www.youtube.com/embed/xyz"
        }"#;
        let e: ApodEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.media_type, MediaType::Other);
        assert_eq!(e.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(e.hdurl.is_none());
    }
}
