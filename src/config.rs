// config.rs — 配置管理模块
// 遵循 Unix 风格：优先从 ~/.config/apodwall/config.toml 读取配置

use crate::error::ConfigError;
use schemars::JsonSchema; // 引入用于生成 JSON Schema 的 trait
use serde::{Deserialize, Serialize}; // 引入序列化与反序列化 trait
use shellexpand::tilde; // 用于展开 ~ 和环境变量
use std::env; // 环境变量模块
use std::fs; // 文件系统模块
use std::path::{Path, PathBuf}; // 路径处理类型

/// 展开路径中的 ~ 和环境变量 ($HOME, $XDG_CONFIG_HOME 等)
fn expand_path(path_str: &str) -> PathBuf {
    let expanded = tilde(path_str).into_owned();
    PathBuf::from(expanded)
}

/// 映射 config.toml 文件内容的嵌套结构体
#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
pub struct ConfigFile {
    #[serde(default)]
    common: CommonConfig,
    #[serde(default)]
    nasa: NasaConfig,
    #[serde(default)]
    fetch: FetchSettings,
    #[serde(default)]
    display: DisplayTarget,
    #[serde(default)]
    caption: CaptionSettings,
    #[serde(default)]
    schedule: ScheduleSettings,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct CommonConfig {
    /// 工作目录，下载、合成图片、日志和更新标记都放在这里
    /// 支持 ~、$HOME 等环境变量，相对路径则相对于 $HOME
    work_dir: Option<String>,
    /// 优先读取高清图片地址 (hdurl)
    #[serde(default = "default_true")]
    hd: bool,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            hd: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct NasaConfig {
    api_key: Option<String>,
    #[serde(default = "default_base_url")]
    base_url: String,
}

impl Default for NasaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
        }
    }
}

/// 回溯下载策略
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct FetchSettings {
    /// 每次回溯的天数
    #[serde(default = "default_step_days")]
    pub step_days: u32,
    /// 最多回溯多少次
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            step_days: default_step_days(),
            max_steps: default_max_steps(),
        }
    }
}

/// 渲染目标区域（屏幕尺寸）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct DisplayTarget {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for DisplayTarget {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

/// 标题与说明文字的排版参数
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct CaptionSettings {
    /// 是否把标题和说明文字画到图片上
    #[serde(default = "default_true")]
    pub embed: bool,
    /// TrueType 字体路径，不配置则查找系统字体，找不到时使用内置点阵字体
    #[serde(default)]
    pub font_path: Option<String>,
    #[serde(default = "default_title_size")]
    pub title_size: f32,
    #[serde(default = "default_caption_size")]
    pub caption_size: f32,
    /// 初始折行列数
    #[serde(default = "default_wrap_columns")]
    pub wrap_columns: usize,
    /// 文字与图片边缘之间的留白（像素）
    #[serde(default = "default_border_offset")]
    pub border_offset: u32,
    #[serde(default = "default_color")]
    pub color: [u8; 3],
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            embed: true,
            font_path: None,
            title_size: default_title_size(),
            caption_size: default_caption_size(),
            wrap_columns: default_wrap_columns(),
            border_offset: default_border_offset(),
            color: default_color(),
        }
    }
}

/// 定时任务配置
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ScheduleSettings {
    /// 系统定时任务名称
    #[serde(default = "default_task_name")]
    pub task_name: String,
    /// 定时触发间隔（分钟）
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    /// 距上次成功更新超过多少小时才重新下载
    #[serde(default = "default_refresh_hours")]
    pub refresh_hours: f64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            task_name: default_task_name(),
            interval_minutes: default_interval_minutes(),
            refresh_hours: default_refresh_hours(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_base_url() -> String {
    "https://api.nasa.gov/planetary/apod".to_string()
}
fn default_step_days() -> u32 {
    30
}
fn default_max_steps() -> u32 {
    24
}
fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}
fn default_title_size() -> f32 {
    20.0
}
fn default_caption_size() -> f32 {
    12.0
}
fn default_wrap_columns() -> usize {
    100
}
fn default_border_offset() -> u32 {
    25
}
fn default_color() -> [u8; 3] {
    [255, 255, 255]
}
fn default_task_name() -> String {
    "Apod Wallpaper Changer".to_string()
}
fn default_interval_minutes() -> u32 {
    5
}
fn default_refresh_hours() -> f64 {
    24.0
}

/// NASA 公共演示 Key，配额很低
pub const DEMO_API_KEY: &str = "DEMO_KEY";

/// 应用全局配置项，运行时显式传给各个组件
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// NASA API Key (优先级：ENV > TOML > DEMO_KEY)
    pub api_key: String,
    /// APOD 接口地址
    pub base_url: String,
    /// 是否优先使用高清地址
    pub hd: bool,
    /// 工作目录
    pub work_dir: PathBuf,
    /// 配置文件所在路径
    pub config_path: PathBuf,
    pub fetch: FetchSettings,
    pub display: DisplayTarget,
    pub caption: CaptionSettings,
    pub schedule: ScheduleSettings,
}

impl AppConfig {
    /// 初始化配置
    pub fn new() -> Result<Self, ConfigError> {
        let home = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| ConfigError::NoHome)?;
        let home_path = PathBuf::from(&home);
        let config_path = home_path
            .join(".config")
            .join("apodwall")
            .join("config.toml");

        let config_file = Self::load_config_from_file(&config_path).unwrap_or_default();

        Ok(Self::resolve(
            config_file,
            &home_path,
            config_path,
            env::var("NASA_API_KEY").ok(),
        ))
    }

    /// 合并配置文件、环境变量和默认值
    pub fn resolve(
        config_file: ConfigFile,
        home_path: &Path,
        config_path: PathBuf,
        env_api_key: Option<String>,
    ) -> Self {
        // 优先级：环境变量 > 配置文件内容 > 演示 Key
        let api_key = env_api_key
            .filter(|k| !k.trim().is_empty())
            .or(config_file.nasa.api_key)
            .unwrap_or_else(|| DEMO_API_KEY.to_string());

        // 工作目录：
        // 1. 如果配置了路径：展开 ~ 和环境变量，相对路径则相对于 $HOME
        // 2. 如果未配置：默认使用 $HOME/.local/share/apodwall
        let work_dir = match config_file.common.work_dir {
            Some(dir_str) => {
                let p = expand_path(&dir_str);
                if p.is_absolute() { p } else { home_path.join(p) }
            }
            None => home_path.join(".local").join("share").join("apodwall"),
        };

        Self {
            api_key,
            base_url: config_file.nasa.base_url,
            hd: config_file.common.hd,
            work_dir,
            config_path,
            fetch: config_file.fetch,
            display: config_file.display,
            caption: config_file.caption,
            schedule: config_file.schedule,
        }
    }

    /// 辅助函数：解析 TOML 配置文件
    fn load_config_from_file(path: &Path) -> Option<ConfigFile> {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
    }

    /// 确保所有必要的目录都存在
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.work_dir)
    }

    /// 下载的原始图片
    pub fn raw_image_path(&self) -> PathBuf {
        self.work_dir.join("apod_download")
    }

    /// 合成后的壁纸
    pub fn composed_image_path(&self) -> PathBuf {
        self.work_dir.join("apod_wallpaper.jpg")
    }

    /// 上次成功更新的时间戳
    pub fn marker_path(&self) -> PathBuf {
        self.work_dir.join("last_success")
    }

    pub fn log_path(&self) -> PathBuf {
        self.work_dir.join("apodwall.log")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.work_dir.join("apodwall.lock")
    }

    /// install 时可执行文件的固定副本位置
    pub fn installed_binary_path(&self) -> PathBuf {
        let name = if cfg!(windows) { "apodwall.exe" } else { "apodwall" };
        self.work_dir.join("bin").join(name)
    }

    fn to_config_file(&self) -> ConfigFile {
        ConfigFile {
            common: CommonConfig {
                work_dir: Some(self.work_dir.to_string_lossy().to_string()),
                hd: self.hd,
            },
            nasa: NasaConfig {
                api_key: Some(self.api_key.clone()),
                base_url: self.base_url.clone(),
            },
            fetch: self.fetch.clone(),
            display: self.display,
            caption: self.caption.clone(),
            schedule: self.schedule.clone(),
        }
    }

    /// 将配置保存回文件
    pub fn save(&self) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(&self.to_config_file())?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config_path, toml_str)?;
        Ok(())
    }

    /// 按键名修改单个配置项
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "api_key" => self.api_key = value.to_string(),
            "hd" => self.hd = value.parse().map_err(|_| invalid())?,
            "width" => self.display.width = parse_dimension(value).ok_or_else(invalid)?,
            "height" => self.display.height = parse_dimension(value).ok_or_else(invalid)?,
            "embed" => self.caption.embed = value.parse().map_err(|_| invalid())?,
            "font" => {
                self.caption.font_path = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "work_dir" => self.work_dir = expand_path(value),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// 获取配置文件的 JSON Schema
    pub fn get_schema() -> String {
        let schema = schemars::schema_for!(ConfigFile);
        serde_json::to_string_pretty(&schema)
            .unwrap_or_else(|_| "{}".to_string())
    }

    /// 将当前配置转换为 TOML 字符串
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(&self.to_config_file())
            .unwrap_or_else(|_| "# Error serializing config".to_string())
    }
}

fn parse_dimension(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|v| *v > 0)
}
