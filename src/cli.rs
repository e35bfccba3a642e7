// cli.rs — 命令行接口定义模块
// 使用 clap 的 derive 模式定义所有子命令和参数

use clap::{Args, Parser, Subcommand}; // Parser: 解析命令行参数的 trait; Subcommand: 定义子命令的 trait
use clap_complete::Shell; // Shell 枚举：Bash, Zsh, Fish, Elvish, PowerShell

/// NASA 每日天文图片壁纸工具
///
/// 下载当天的 APOD 图片，缩放到屏幕尺寸并叠加标题和说明文字，
/// 然后设为桌面壁纸。不带子命令运行时，只有距上次成功更新足够久才会刷新。
#[derive(Parser)]
#[command(name = "apodwall")]
#[command(version)] // 自动从 Cargo.toml 读取 version 字段
#[command(author)]
#[command(about = "NASA 每日天文图片壁纸工具 — 下载 APOD 图片，叠加说明文字并设为壁纸")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub overrides: RunOverrides,
}

/// 只对本次运行生效的覆盖参数
#[derive(Args, Debug, Default)]
pub struct RunOverrides {
    /// 目标区域宽度（像素）
    #[arg(long, global = true)]
    pub width: Option<u32>,

    /// 目标区域高度（像素）
    #[arg(long, global = true)]
    pub height: Option<u32>,

    /// 不在图片上叠加标题和说明文字
    #[arg(long, global = true)]
    pub no_caption: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 无视上次更新时间，立即完整执行一次更新
    ///
    /// 用法示例:
    ///   apodwall update
    ///   apodwall update --no-caption
    Update,

    /// 注册系统定时任务，并把程序复制到工作目录
    ///
    /// 用法示例:
    ///   apodwall install
    Install,

    /// 移除定时任务以及复制的程序
    ///
    /// 用法示例:
    ///   apodwall uninstall
    Uninstall,

    /// 配置管理操作
    ///
    /// 用法示例:
    ///   apodwall config show
    ///   apodwall config set width 2560
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// 生成 shell 补全脚本（支持 bash, zsh, fish, elvish, powershell）
    ///
    /// 用法示例：
    ///   apodwall completions zsh > ~/.zsh/completions/_apodwall
    Completions {
        /// 目标 shell 类型
        shell: Shell,
    },
}

/// 配置管理操作
#[derive(Subcommand)]
pub enum ConfigAction {
    /// 查看当前所有配置简报
    Show,
    /// 生成配置文件对应的 JSON Schema
    Schema,
    /// 以 TOML 格式打印当前完整配置内容
    Dump,
    /// 设置配置项的值 (支持: api_key, hd, width, height, embed, font, work_dir)
    Set {
        /// 要设置的键
        key: String,
        /// 要设置的值
        value: String,
    },
}
