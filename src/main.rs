use std::fs;

use anyhow::{Context, Result};
use privchat_offline_callback::{
    cli::{Cli, Commands},
    config::{CallbackConfig, TomlPropertyStore},
    logging,
    model::Jid,
    webhook::{HttpWebhookTransport, NotificationPayload, WebhookTransport},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let _log_guard = logging::init_logging(
        &cli.get_log_level(),
        cli.get_log_format(),
        cli.log_file.as_deref(),
        cli.quiet,
    )?;

    match &cli.command {
        Commands::Init { properties } => init(properties),
        Commands::ShowConfig { properties } => show_config(properties),
        Commands::GenerateConfig { path } => generate_config(path),
        Commands::TestWebhook {
            properties,
            from,
            to,
            body,
        } => test_webhook(properties, from, to, body.clone()).await,
    }
}

fn load_config(properties: &str) -> Result<CallbackConfig> {
    let store = TomlPropertyStore::open(properties)
        .with_context(|| format!("无法打开属性文件: {}", properties))?;
    let mut config = CallbackConfig::load(&store).context("加载配置失败")?;
    config.merge_from_env().context("环境变量覆盖无效")?;
    Ok(config)
}

/// 加载配置，缺失的 url/token 会被写回属性文件
fn init(properties: &str) -> Result<()> {
    let config = load_config(properties)?;

    println!("✅ 配置已就绪: {}", properties);
    println!("  - URL: {}", config.url);
    println!("  - Token: {}", config.token);
    Ok(())
}

/// 显示最终配置（合并后的配置）
fn show_config(properties: &str) -> Result<()> {
    let config = load_config(properties)?;

    println!("📊 最终配置（合并后的配置）:");
    println!("{}", serde_json::to_string_pretty(&config.masked())?);
    Ok(())
}

/// 生成默认属性文件
fn generate_config(path: &str) -> Result<()> {
    let default_config = r#"# PrivChat 离线回调属性文件
# 此文件由 privchat-offline-callback generate-config 生成

[callback_on_offline]
# 接收通知的 Webhook 地址
url = "http://localhost/user/offline/callback/url"
# 原样放入 Authorization 请求头；留空则首次加载时随机生成
# token = ""
# 是否在通知中携带消息正文
send_body = true
# 记录 Webhook 响应状态
debug = false
# 在线接收方的复查延迟（秒）
recheck_delay_secs = 7
max_concurrent_rechecks = 64
max_pending_rechecks = 10000
request_timeout_secs = 10
# 只处理发往该域的消息
# local_domain = "example.com"
"#;

    fs::write(path, default_config).with_context(|| format!("无法写入属性文件: {}", path))?;

    println!("✅ 属性文件已生成: {}", path);
    Ok(())
}

/// 发送一条测试通知并等待响应
async fn test_webhook(properties: &str, from: &str, to: &str, body: Option<String>) -> Result<()> {
    let config = load_config(properties)?;
    let from: Jid = from.parse().with_context(|| format!("无效的发送方地址: {}", from))?;
    let to: Jid = to.parse().with_context(|| format!("无效的接收方地址: {}", to))?;

    let body = body.filter(|_| config.send_body);
    let payload = NotificationPayload::new(from.bare(), to.bare(), body);
    let transport = HttpWebhookTransport::new(&config).context("创建 HTTP 客户端失败")?;

    println!("📤 POST {}", transport.url());
    println!("{}", payload.to_json()?);

    let status = transport.post(&payload).await.context("Webhook 调用失败")?;
    if (200..300).contains(&status) {
        println!("✅ Webhook 响应: {}", status);
    } else {
        println!("⚠️ Webhook 响应: {}", status);
    }
    Ok(())
}
