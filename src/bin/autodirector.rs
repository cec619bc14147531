// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 自动导播 (Auto Director)
///
/// 多机位运动评分, 平滑切换, 单路输出
///
/// 线程模型:
/// 1. 摄像头线程: 每个机位一个
/// 2. 协调线程:   轮询邮箱, 投票, 写输出
/// 3. 主线程:     预览窗口 (out.display_output 或 -d), 否则直接运行协调器
use anyhow::{anyhow, Context, Result};
use autodirector::config::DEFAULT_CONFIG_PATH;
use autodirector::lifecycle::install_signal_handler;
use autodirector::output::preview::{preview_channel, run_window, CloseAction};
use autodirector::switcher::CoordinatorExit;
use autodirector::{CancellationToken, Director, Passthrough, RunReport, SceneConfig};
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 自动导播参数
#[derive(Parser, Debug)]
#[command(author, version, about = "自动导播 - 多机位运动评分与自动切换", long_about = None)]
struct Args {
    /// 场景配置文件 (JSON)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// 直通预览: 显示全部机位, 不评分不切换
    #[arg(short, long)]
    display: bool,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("autodirector=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_names(true),
            )
            .with(env_filter)
            .init();
    }
}

/// 正常结束, 帮助信息与参数错误
const EXIT_OK: u8 = 0;
/// 配置错误, 摄像头或输出无法打开, 运行失败
const EXIT_FAILURE: u8 = 1;

/// 解析命令行. 帮助信息与参数错误打印后以 [`EXIT_OK`] 退出
fn parse_args<I, T>(argv: I) -> Result<Args, u8>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Args::try_parse_from(argv).map_err(|e| {
        if let Err(io) = e.print() {
            warn!("⚠️  cannot print usage: {}", io);
        }
        EXIT_OK
    })
}

fn exit_status(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => EXIT_OK,
        Err(e) => {
            error!("❌ {:#}", e);
            EXIT_FAILURE
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = match parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(status) => return ExitCode::from(status),
    };
    ExitCode::from(exit_status(&run(args)))
}

/// Scene opened and ready to run.
enum Session {
    Director { director: Director, preview: bool },
    Passthrough(Passthrough),
}

/// 加载配置并打开全部机位与输出
fn startup(args: &Args, token: &CancellationToken) -> Result<Session> {
    let config = SceneConfig::load(&args.config)
        .with_context(|| format!("cannot load scene {}", args.config.display()))?;
    config.log_summary();

    if args.display {
        return Ok(Session::Passthrough(Passthrough::open(&config)?));
    }
    let preview = config.out.display_output;
    let director = Director::prepare(config, token.clone())?;
    Ok(Session::Director { director, preview })
}

fn run(args: Args) -> Result<()> {
    info!("🚀 自动导播启动");
    let token = CancellationToken::new();
    let session = startup(&args, &token)?;
    install_signal_handler(&token).context("cannot install signal handler")?;

    match session {
        Session::Director { director, preview } => run_director(director, preview, token),
        Session::Passthrough(passthrough) => run_passthrough(passthrough, token),
    }
}

fn run_director(director: Director, preview: bool, token: CancellationToken) -> Result<()> {
    info!("✅ 系统就绪, 开始导播...");
    let report = if preview {
        let (handle, rx) = preview_channel();
        let director = director.with_preview(handle);
        let engine = thread::Builder::new()
            .name("coordinator".to_string())
            .spawn(move || director.run())
            .context("cannot spawn coordinator thread")?;
        // 关闭窗口只停止预览, 录制继续
        run_window("autodirector", rx, token, CloseAction::DisablePreview);
        engine
            .join()
            .map_err(|_| anyhow!("coordinator thread panicked"))??
    } else {
        director.run()?
    };
    log_report(&report);
    Ok(())
}

fn run_passthrough(passthrough: Passthrough, token: CancellationToken) -> Result<()> {
    let (handle, rx) = preview_channel();
    let engine = {
        let token = token.clone();
        thread::Builder::new()
            .name("passthrough".to_string())
            .spawn(move || passthrough.run(handle, token))
            .context("cannot spawn passthrough thread")?
    };
    run_window("autodirector - passthrough", rx, token.clone(), CloseAction::CancelRun);
    token.cancel();
    let shown = engine
        .join()
        .map_err(|_| anyhow!("passthrough thread panicked"))??;
    info!("✅ 直通预览结束: {} frame(s)", shown);
    Ok(())
}

fn log_report(report: &RunReport) {
    let c = &report.coordinator;
    match &c.exit {
        CoordinatorExit::OutputFailed(reason) => warn!("⚠️  run stopped by output failure: {}", reason),
        exit => info!("🏁 run ended: {:?}", exit),
    }
    info!(
        "📊 {} cycles, {} switches, {} frames written, last on air '{}'",
        c.cycles, c.switches, c.presented, c.committed
    );
    for w in &report.workers {
        info!(
            "   📹 {:<12} read {:>6} published {:>6} ({:?})",
            w.camera, w.frames_read, w.published, w.exit
        );
    }
}
