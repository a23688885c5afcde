use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use longpoll_api::ApiClient;
use longpoll_config::{Config, ConfigManager, LogLevel};
use longpoll_core::{handler_fn, Longpoll};
use longpoll_observability::{create_event_span, create_poll_span, LogManager};
use tracing::Instrument;

#[derive(Parser)]
#[command(name = "longpoll")]
#[command(about = "Bots Long Poll client")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, env = "LONGPOLL_CONFIG", default_value = "~/.longpoll/config.json")]
    config: String,

    /// Community access token, overrides api.access_token
    #[arg(long, env = "LONGPOLL_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Community ID, resolved from the token when omitted
    #[arg(long)]
    group_id: Option<i64>,

    /// Seconds the server may hold each poll open
    #[arg(long)]
    wait: Option<u32>,

    /// Write logs to logging.file, or ~/.longpoll/logs/longpoll.log when unset
    #[arg(long, default_value = "false")]
    log_to_file: bool,

    /// Enable debug mode
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 连接 long poll 服务器并打印收到的事件
    Run,
    /// 配置管理命令
    Config(ConfigArgs),
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// 获取配置值
    Get {
        /// 配置键 (如: longpoll.group_id, logging.level)
        key: String,
    },
    /// 设置配置值
    Set {
        /// 配置键 (如: longpoll.group_id, logging.level)
        key: String,
        /// 配置值
        value: String,
    },
    /// 初始化默认配置
    Init {
        /// 强制覆盖已有配置
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// 显示当前配置
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 展开配置文件路径
    let config_path =
        longpoll_config::expand_tilde(&cli.config).unwrap_or_else(|| PathBuf::from(&cli.config));

    if cli.debug {
        eprintln!("{}", "[DEBUG] Debug mode enabled".dimmed());
        eprintln!("{}", format!("[DEBUG] Config path: {:?}", config_path).dimmed());
    }

    match cli.command {
        Commands::Run => run(&cli, &config_path).await,
        Commands::Config(ref args) => handle_config(args.clone(), &config_path).await,
    }
}

/// 命令行参数覆盖配置文件
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(token) = &cli.token {
        config.api.access_token = Some(token.clone());
    }
    if let Some(group_id) = cli.group_id {
        config.longpoll.group_id = Some(group_id);
    }
    if let Some(wait) = cli.wait {
        config.longpoll.wait_seconds = wait;
    }
    if cli.log_to_file && config.logging.file.is_none() {
        config.logging.file = longpoll_config::default_log_path()
            .map(|path| path.to_string_lossy().into_owned());
    }
    if cli.debug {
        config.logging.level = LogLevel::Debug;
    }
}

async fn run(cli: &Cli, config_path: &Path) -> anyhow::Result<()> {
    let manager = ConfigManager::load(config_path).await?;
    let mut config = manager.snapshot().await;
    apply_overrides(cli, &mut config);
    ConfigManager::validate(&config)?;

    let mut log_manager = LogManager::new(&config.logging).await?;

    // 出错时也要先刷新日志文件
    let result = listen(&config).await;
    log_manager.shutdown().await?;
    result?;

    println!("{}", "✅ Stopped".green());
    Ok(())
}

async fn listen(config: &Config) -> anyhow::Result<()> {
    let token = match config.api.access_token.as_deref() {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => anyhow::bail!("No access token. Pass --token, set LONGPOLL_TOKEN or api.access_token"),
    };

    let api = ApiClient::new(token)
        .with_base_url(config.api.base_url.clone())
        .with_version(config.api.version.clone());
    let http = api.http_client().clone();

    let lp = match config.longpoll.group_id {
        Some(group_id) => Longpoll::new(api, group_id).await?,
        None => Longpoll::for_community(api).await?,
    };
    let mut lp = lp
        .with_wait(config.longpoll.wait_seconds)
        .with_http_client(http);
    let group_id = lp.group_id();

    lp.router_mut().on_any(handler_fn(|ctx, event| {
        let _span = create_event_span(&event.event_type, &ctx.ts).entered();
        let object = serde_json::to_string(&event.object).unwrap_or_default();
        println!(
            "{} {} {}",
            format!("[{}]", ctx.ts).dimmed(),
            event.event_type.cyan().bold(),
            object
        );
        Ok(())
    }));

    lp.on_full_response(|response| {
        tracing::debug!(
            ts = %response.ts,
            updates = response.updates.len(),
            failed = ?response.failed,
            "batch processed"
        );
    });

    let shutdown = lp.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Stopping after the current poll...".yellow());
            shutdown.stop();
        }
    });

    println!(
        "{}",
        format!("🔄 Listening for events of group {}", group_id).green()
    );

    lp.start().instrument(create_poll_span(group_id)).await?;
    Ok(())
}

async fn handle_config(args: ConfigArgs, config_path: &Path) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Get { key } => {
            let manager = ConfigManager::load(config_path).await?;
            let config = manager.snapshot().await;

            match config.get_value(&key) {
                Some(value) => {
                    println!("{}", format!("{} = {}", key, value).green());
                }
                None => anyhow::bail!("Key not found: {}", key),
            }
        }
        ConfigCommands::Set { key, value } => {
            let manager = ConfigManager::load(config_path).await?;

            manager
                .update(|config| config.set_value(&key, &value))
                .await
                .map_err(|e| anyhow::anyhow!("Failed to set {}: {}", key, e))?;

            println!(
                "{}",
                format!("✅ Set {} = {} in {:?}", key, value, manager.path()).green()
            );
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!(
                    "{}",
                    format!("⚠️  Config already exists at {:?}", config_path).yellow()
                );
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            // 创建默认配置
            let manager = ConfigManager::new(Config::default(), config_path.to_path_buf());
            manager.save().await?;

            println!(
                "{}",
                format!("✅ Config initialized at {:?}", config_path).green()
            );
            println!("{}", "You can edit this file to customize your settings".dimmed());
        }
        ConfigCommands::Show => {
            let manager = ConfigManager::load(config_path).await?;
            let config = manager.snapshot().await.redacted();

            println!(
                "{}",
                format!("📋 Current Configuration ({:?}):", manager.path()).cyan().bold()
            );
            println!();

            // 显示为 JSON
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}
