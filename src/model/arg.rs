use clap::{Parser, Subcommand};

/// 定时网络测速记录器
#[derive(Parser, Debug)]
#[command(name = "speedlog", version, about)]
pub struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<String>,

    /// 覆盖配置中的数据库路径
    #[arg(long)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 启动定时测速和控制面板（默认）
    Serve,
    /// 立即执行一次测速并写入数据库
    Run,
    /// 生成默认配置文件
    Init,
    /// 打印最近的测速记录
    List {
        /// 显示条数
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: u32,
    },
}
