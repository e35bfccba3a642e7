// nasa.rs — NASA APOD API 异步客户端模块
// 负责与 APOD 接口交互：查询每日条目和下载图片

use super::{ApodEntry, ApodSource};
use crate::error::SourceError;
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};
use std::path::Path;
use tokio::fs::File; // tokio 提供的异步文件操作
use tokio::io::AsyncWriteExt; // 异步写入 trait，提供 write_all() 等方法

/// APOD API 异步客户端
///
/// 封装了 reqwest::Client 和 API 配置。
/// `reqwest::Client` 内部维护连接池，整个运行期间复用同一个。
pub struct ApodClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    /// 请求时附带 hd=True
    hd: bool,
}

impl ApodClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, hd: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            hd,
        }
    }

    /// 构建查询参数列表
    fn query_params(&self, date: Option<NaiveDate>) -> Vec<(&'static str, String)> {
        let mut params = vec![("api_key", self.api_key.clone())];
        if let Some(d) = date {
            params.push(("date", d.format("%Y-%m-%d").to_string()));
        }
        if self.hd {
            params.push(("hd", "True".to_string()));
        }
        params
    }
}

#[async_trait]
impl ApodSource for ApodClient {
    async fn entry(&self, date: Option<NaiveDate>) -> Result<ApodEntry, SourceError> {
        let url = &self.base_url;
        debug!("Requesting APOD entry for {:?} from {}", date, url);

        let response = self
            .client
            .get(url)
            .query(&self.query_params(date))
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))?
            .error_for_status()
            .map_err(|e| SourceError::from_reqwest(url, e))?;

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))?;

        serde_json::from_str(&body).map_err(|e| SourceError::Decode {
            url: url.clone(),
            detail: e.to_string(),
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))?
            .error_for_status()
            .map_err(|e| SourceError::from_reqwest(url, e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))?;

        let mut file = File::create(dest).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        info!("Downloaded {} bytes from {} to {}", bytes.len(), url, dest.display());
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_for_today_and_dated_probe() {
        let client = ApodClient::new("https://api.nasa.gov/planetary/apod", "KEY", true);
        let today = client.query_params(None);
        assert_eq!(today, vec![("api_key", "KEY".to_string()), ("hd", "True".to_string())]);

        let sd = ApodClient::new("https://api.nasa.gov/planetary/apod", "KEY", false);
        let dated = sd.query_params(NaiveDate::from_ymd_opt(2023, 12, 1));
        assert_eq!(
            dated,
            vec![("api_key", "KEY".to_string()), ("date", "2023-12-01".to_string())]
        );
    }
}
