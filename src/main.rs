mod api;
mod common;
mod http_client;
mod model;
mod results;
mod runner;
mod scheduler;
mod speedtest;
mod ui;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use api::{ApiState, create_api_router};
use model::arg::{Args, Command};
use model::config::Config;
use results::table::render_table;
use results::{ResultService, ResultStore};
use runner::MeasurementRunner;
use scheduler::Scheduler;
use speedtest::HttpSpeedTester;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let mut config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::error!("加载配置失败: {:#}", e);
        std::process::exit(1);
    });
    if let Some(db) = &args.db {
        config.db_path = db.into();
    }

    let outcome = match args.command.unwrap_or(Command::Serve) {
        Command::Init => init_config(&config),
        Command::Serve => {
            let results = init_results(&config).await;
            serve(config, results).await
        }
        Command::Run => run_once(&config, init_results(&config).await).await,
        Command::List { limit } => list(&init_results(&config).await, limit).await,
    };

    if let Err(e) = outcome {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

/// 打开结果存储并建表，失败直接退出
async fn init_results(config: &Config) -> ResultService {
    let results = ResultService::new(ResultStore::new(config.db_path.clone()));
    if let Err(e) = results.ensure_schema().await {
        tracing::error!("初始化数据库失败: {:#}", e);
        std::process::exit(1);
    }
    results
}

fn build_runner(config: &Config, results: ResultService) -> anyhow::Result<MeasurementRunner> {
    let client = http_client::build_client(
        config.proxy_url.as_deref(),
        config.speedtest.request_timeout_secs,
        config.tls_backend,
    )?;
    let tester = HttpSpeedTester::new(client, config.speedtest.clone());
    Ok(MeasurementRunner::new(Arc::new(tester), results))
}

async fn serve(config: Config, results: ResultService) -> anyhow::Result<()> {
    let runner = Arc::new(build_runner(&config, results.clone())?);
    let (scheduler, scheduler_task) =
        Scheduler::spawn(runner, Duration::from_secs(config.interval_secs));

    let state = ApiState {
        results,
        scheduler: scheduler.clone(),
        api_key: config.api_key.clone(),
        default_display_count: config.default_display_count,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = axum::Router::new()
        .nest("/api", create_api_router(state))
        .merge(ui::create_ui_router())
        .layer(cors);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("控制面板已启动: http://{}", addr);
    tracing::info!("数据库: {}", config.db_path.display());
    if config.api_key.is_none() {
        tracing::warn!("未配置 apiKey，手动测速接口无需认证");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("收到退出信号，正在关闭");
        })
        .await?;

    scheduler.shutdown();
    scheduler_task.await?;
    Ok(())
}

async fn run_once(config: &Config, results: ResultService) -> anyhow::Result<()> {
    let runner = build_runner(config, results)?;
    match runner.run().await {
        Ok(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", serde_json::to_string(&failure)?);
            Err(anyhow::anyhow!("测速失败: {}", failure))
        }
    }
}

async fn list(results: &ResultService, limit: u32) -> anyhow::Result<()> {
    let records = results.list_recent(limit).await?;
    print!("{}", render_table(&records));
    Ok(())
}

fn init_config(config: &Config) -> anyhow::Result<()> {
    if config.config_path().is_some_and(|p| p.exists()) {
        anyhow::bail!("配置文件已存在，未覆盖");
    }
    config.save()?;
    if let Some(path) = config.config_path() {
        tracing::info!("已写入默认配置: {}", path.display());
    }
    Ok(())
}
