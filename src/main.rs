use std::{cell::RefCell, path::PathBuf, rc::Rc, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{signal, time};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use touchd::{
    config::Config,
    event_model::{KeyEvent, MonotonicClock},
    event_router::{EventQueue, EventRouter},
    gesture::{PageOutcome, PageSwiper},
    input_devices::{SourceSelection, open_source},
    statistics::InputStatistics,
};

/// 消费端轮询周期
const PUMP_INTERVAL: Duration = Duration::from_millis(8);

/// 每页按 4x3 的网格划分可点击区域
const GRID: (u32, u32) = (4, 3);

#[derive(Parser, Debug)]
#[command(name = "touchd", version, about = "Touch input acquisition and gesture recognition")]
struct Args {
    /// TOML 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 覆盖配置里的输入源
    #[arg(short, long, value_enum)]
    source: Option<SourceSelection>,

    /// 指定 evdev 设备节点，不再自动扫描
    #[arg(short, long)]
    device: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// 统计信息的输出间隔，0 表示不输出
    #[arg(long, default_value_t = 30)]
    stats_interval_secs: u64,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(source) = args.source {
        config.source.kind = source;
    }
    if let Some(device) = &args.device {
        config.source.device.path = Some(device.clone());
        if args.source.is_none() {
            config.source.kind = SourceSelection::Device;
        }
    }
    if let Some(width) = args.width {
        config.surface.width = width;
    }
    if let Some(height) = args.height {
        config.surface.height = height;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config(&args)?;
    debug!(?config, "configuration loaded");

    let clock = MonotonicClock::start();
    let stats = Arc::new(InputStatistics::new());
    let surface = (config.surface.width, config.surface.height);

    let source = open_source(
        config.source.kind,
        &config.source.device,
        &config.script.steps,
        config.script.looping,
        clock,
        stats.clone(),
    )
    .context("no usable input source")?;

    let queue = EventQueue::new(config.queue.capacity, config.queue.overflow, stats.clone());
    let mut router = EventRouter::new(queue, config.gesture, surface, clock, stats.clone());

    router.set_hit_test(Some(Box::new(move |x: f32, y: f32, page: u32| {
        let column = ((x * GRID.0 as f32) as u32).min(GRID.0 - 1);
        let row = ((y * GRID.1 as f32) as u32).min(GRID.1 - 1);
        ((page * GRID.1 + row) * GRID.0 + column) as i32
    })));

    let pages = Rc::new(RefCell::new(PageSwiper::new(config.paging, config.surface.pages)));
    let dispatcher = router.dispatcher_mut();
    dispatcher.set_on_click(Some(Box::new(|target: i32| info!(target, "click"))));
    dispatcher.set_on_hold(Some(Box::new(|target: i32| info!(target, "hold"))));
    dispatcher.set_on_vertical_drag(Some(Box::new(|delta_px: f32| debug!(delta_px, "scroll"))));
    let swiper = pages.clone();
    dispatcher.set_on_horizontal_swipe(Some(Box::new(move |delta: f32, complete: bool| {
        match swiper.borrow_mut().on_swipe(delta, complete) {
            Some(PageOutcome::Changed { from, to }) => info!(from, to, "page changed"),
            Some(PageOutcome::SnappedBack) => debug!(delta, "swipe snapped back"),
            None => {}
        }
    })));
    let swiper = pages.clone();
    dispatcher.set_on_cancel(Some(Box::new(move || {
        swiper.borrow_mut().reset_offset();
        info!("gesture cancelled");
    })));
    dispatcher.set_on_key(Some(Box::new(|key: KeyEvent| debug!(?key, "key"))));

    router
        .attach_source(source)
        .context("failed to start input source")?;
    if let Some(capabilities) = router.capabilities() {
        info!(?capabilities, "listening for touch input");
    }

    let mut pump = time::interval(PUMP_INTERVAL);
    pump.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
    let stats_period = Duration::from_secs(args.stats_interval_secs.max(1));
    let mut report = time::interval_at(time::Instant::now() + stats_period, stats_period);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = pump.tick() => {
                router.pump();
                let page = pages.borrow().current_page();
                if page != router.classifier().current_page() {
                    router.set_current_page(page);
                }
            }
            _ = report.tick(), if args.stats_interval_secs > 0 => {
                info!(stats = ?router.statistics(), status = ?router.source_status(), "input statistics");
            }
            result = &mut ctrl_c => {
                result.context("failed to listen for ctrl-c")?;
                info!("shutdown requested");
                break;
            }
        }
    }

    router.stop_source();
    info!(stats = ?router.statistics(), "touchd stopped");
    Ok(())
}
