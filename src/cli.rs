use clap::{Parser, Subcommand};

impl Cli {
    /// 解析命令行参数
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

/// PrivChat 离线回调 - 接收方离线时通知外部 Webhook
#[derive(Parser, Debug)]
#[command(name = "privchat-offline-callback")]
#[command(version)]
#[command(about = "离线消息 Webhook 回调插件的配置与自检工具", long_about = None)]
pub struct Cli {
    /// 日志级别
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        help = "日志级别: trace, debug, info, warn, error"
    )]
    pub log_level: Option<String>,

    /// 日志格式
    #[arg(long, global = true, value_name = "FORMAT", help = "日志格式: pretty, json, compact")]
    pub log_format: Option<String>,

    /// 日志文件路径
    #[arg(long, global = true, value_name = "PATH", help = "日志输出文件路径（按天滚动）")]
    pub log_file: Option<String>,

    /// 详细输出（可重复使用：-v, -vv, -vvv）
    #[arg(short, global = true, action = clap::ArgAction::Count, help = "详细输出级别")]
    pub verbose: u8,

    /// 静默模式
    #[arg(long, short = 'q', global = true, help = "静默模式（只输出错误）")]
    pub quiet: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 加载配置（缺失的 url/token 会生成并写回），打印结果
    Init {
        /// 插件属性文件
        #[arg(long, value_name = "FILE", default_value = "callback.toml")]
        properties: String,
    },
    /// 显示最终配置（合并环境变量，token 打码）
    ShowConfig {
        /// 插件属性文件
        #[arg(long, value_name = "FILE", default_value = "callback.toml")]
        properties: String,
    },
    /// 生成默认属性文件
    GenerateConfig {
        /// 输出文件路径
        #[arg(value_name = "PATH", default_value = "callback.toml")]
        path: String,
    },
    /// 向配置的 Webhook 发送一条测试通知
    TestWebhook {
        /// 插件属性文件
        #[arg(long, value_name = "FILE", default_value = "callback.toml")]
        properties: String,
        /// 发送方地址
        #[arg(long, value_name = "JID")]
        from: String,
        /// 接收方地址
        #[arg(long, value_name = "JID")]
        to: String,
        /// 消息正文
        #[arg(long, value_name = "TEXT")]
        body: Option<String>,
    },
}

impl Cli {
    /// 获取日志级别（考虑 verbose 和 quiet）
    pub fn get_log_level(&self) -> String {
        if self.quiet {
            return "error".to_string();
        }

        if let Some(level) = &self.log_level {
            return level.clone();
        }

        match self.verbose {
            0 => "warn".to_string(),
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }

    /// 获取日志格式
    pub fn get_log_format(&self) -> Option<&str> {
        self.log_format.as_deref()
    }
}
