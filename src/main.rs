// main.rs — 程序入口
// 负责初始化日志与异步运行时、解析命令行参数、分发子命令

mod cli;
mod compositor;
mod config;
mod error;
mod fetcher;
mod gate;
mod pipeline;
mod scheduler;
mod setter;
mod source;

// 初始化多语言支持，嵌入 locales 目录下的所有翻译
rust_i18n::i18n!("locales");

use clap::{CommandFactory, Parser};
use clap_complete::generate; // 引入补全脚本生成函数
use cli::{Cli, Commands, ConfigAction, RunOverrides};
use compositor::font::Face;
use config::AppConfig;
use env_logger::{Env, Target};
use log::{error, info};
use pipeline::RunOutcome;
use rust_i18n::t; // 引入翻译宏
use setter::DesktopApplier;
use source::nasa::ApodClient;
use std::fs::OpenOptions;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 自动检测系统语言并设置
    let locale = std::env::var("LANG").unwrap_or_else(|_| "en".to_string());
    if locale.starts_with("zh") {
        rust_i18n::set_locale("zh-CN");
    } else {
        rust_i18n::set_locale("en");
    }

    let cli = Cli::parse();

    let mut config = AppConfig::new()?;
    config.ensure_dirs()?;
    init_logging(&config);
    info!("Starting apodwall");

    let result = match &cli.command {
        None => handle_run(&config, &cli.overrides, false).await,
        Some(Commands::Update) => handle_run(&config, &cli.overrides, true).await,
        Some(Commands::Install) => handle_install(&config),
        Some(Commands::Uninstall) => handle_uninstall(&config),
        Some(Commands::Config { action }) => handle_config(&mut config, action),
        Some(Commands::Completions { shell }) => {
            generate(
                *shell,
                &mut Cli::command(),
                "apodwall",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    info!("Exiting apodwall");
    result
}

/// 日志追加写入工作目录下的日志文件，打不开时退回 stderr
fn init_logging(config: &AppConfig) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    match OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
    {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        Err(e) => {
            eprintln!("cannot open log file {}: {}", config.log_path().display(), e);
        }
    }
    builder.init();
}

/// 条件更新 / 强制更新
async fn handle_run(
    config: &AppConfig,
    overrides: &RunOverrides,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config.clone();
    if let Some(width) = overrides.width {
        config.display.width = width;
    }
    if let Some(height) = overrides.height {
        config.display.height = height;
    }
    if overrides.no_caption {
        config.caption.embed = false;
    }

    println!("{}", t!("run_start"));

    let face = if config.caption.embed {
        let configured = config
            .caption
            .font_path
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()));
        Face::resolve(configured.as_deref())
    } else {
        Face::Bitmap
    };
    let client = ApodClient::new(config.base_url.clone(), config.api_key.clone(), config.hd);

    match pipeline::run(&config, &client, &DesktopApplier, &face, force).await {
        Ok(RunOutcome::Skipped { hours }) => {
            println!("{}", t!("run_skipped", hours => format!("{:.1}", hours)));
            Ok(())
        }
        Ok(RunOutcome::Updated { record, steps, layout }) => {
            info!(
                "Applied APOD {} after {} backward steps (caption embedded: {})",
                record.date,
                steps,
                layout.is_some()
            );
            println!("{}", t!("run_done", title => record.title, date => record.date));
            Ok(())
        }
        Err(e) => {
            println!("{}", t!("run_failed", reason => e.to_string()));
            Err(e.into())
        }
    }
}

/// 处理 install 子命令：复制程序并注册定时任务
fn handle_install(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let schedule = &config.schedule;
    println!("{}", t!("install_start", name => schedule.task_name));

    let target = config.installed_binary_path();
    scheduler::copy_executable(&std::env::current_exe()?, &target)?;
    scheduler::install(&schedule.task_name, schedule.interval_minutes, &target)?;

    println!("{}", t!("install_done", path => target.display()));
    Ok(())
}

/// 处理 uninstall 子命令：移除定时任务和复制的程序
fn handle_uninstall(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let schedule = &config.schedule;
    println!("{}", t!("uninstall_start", name => schedule.task_name));

    scheduler::uninstall(&schedule.task_name)?;
    scheduler::remove_executable(&config.installed_binary_path())?;

    println!("{}", t!("uninstall_done"));
    Ok(())
}

/// 处理 config 子命令：查看或修改配置
fn handle_config(
    config: &mut AppConfig,
    action: &ConfigAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            println!("{}", t!("config_title"));
            println!("{}", t!("config_path", path => config.config_path.display()));
            println!("{}", t!("config_work_dir", path => config.work_dir.display()));
            println!("{}", t!("config_api_key", key => mask_key(&config.api_key)));
            println!("{}", t!("config_hd", hd => config.hd));
            println!(
                "{}",
                t!("config_display", width => config.display.width, height => config.display.height)
            );
            println!("{}", t!("config_caption", embed => config.caption.embed));
            let font = config.caption.font_path.as_deref().unwrap_or("auto");
            println!("{}", t!("config_font", font => font));
            println!(
                "{}",
                t!(
                    "config_schedule",
                    name => config.schedule.task_name,
                    minutes => config.schedule.interval_minutes,
                    hours => config.schedule.refresh_hours
                )
            );
        }
        ConfigAction::Schema => {
            println!("{}", AppConfig::get_schema());
        }
        ConfigAction::Dump => {
            println!("{}", config.to_toml());
        }
        ConfigAction::Set { key, value } => {
            match config.set(key, value) {
                Err(error::ConfigError::UnknownKey(_)) => {
                    return Err(t!("config_error_unknown_key", key => key).into());
                }
                Err(error::ConfigError::InvalidValue { .. }) => {
                    return Err(t!("config_error_value", key => key, value => value).into());
                }
                other => other?,
            }
            config.save()?;
            println!("{}", t!("config_updated", key => key, value => value));
        }
    }
    Ok(())
}

/// 只显示 Key 的前四位
fn mask_key(key: &str) -> String {
    if key == config::DEMO_API_KEY {
        return key.to_string();
    }
    let visible: String = key.chars().take(4).collect();
    format!("{}****", visible)
}
