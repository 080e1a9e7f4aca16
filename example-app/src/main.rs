//! # 示例应用程序
//!
//! 演示如何使用 Lorn ADSP 依赖注入运行时：声明资源、织入切面、
//! 按生命周期方法参数顺序初始化，并在退出时按缓存顺序销毁。

use anyhow::Context;
use clap::Parser;
use di_abstractions::{intercept, AspectHandler, Descriptor, Inject};
use di_impl::{InjectedApp, ResourceCatalog};
use infrastructure_common::{BoxError, InjectionOptions, TypeKey};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "example-app")]
#[command(about = "Lorn ADSP 依赖注入示例应用")]
struct Args {
    /// 注入标记配置文件路径
    #[arg(short, long, default_value = "config/injection.toml")]
    config: PathBuf,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 演示请求的广告位
    #[arg(long, default_value = "banner-top")]
    slot: String,
}

/// 广告来源
trait AdSource: Send + Sync {
    fn pick(&self, slot: &str) -> Result<String, BoxError>;
}

/// 广告索引
#[derive(Default)]
struct AdIndex {
    entries: RwLock<Vec<(String, String)>>,
}

impl AdIndex {
    fn load(&self) -> Result<(), BoxError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("广告索引锁已损坏"))?;
        entries.push(("banner-top".to_string(), "ad-1001".to_string()));
        entries.push(("sidebar".to_string(), "ad-2002".to_string()));
        info!("广告索引加载完成: {} 条", entries.len());
        Ok(())
    }
}

impl AdSource for AdIndex {
    fn pick(&self, slot: &str) -> Result<String, BoxError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("广告索引锁已损坏"))?;
        entries
            .iter()
            .find(|(key, _)| key == slot)
            .map(|(_, ad)| ad.clone())
            .ok_or_else(|| anyhow::anyhow!("广告位没有可用广告: {slot}").into())
    }
}

/// 带耗时统计的广告来源
struct TimedAdSource {
    inner: Arc<AdIndex>,
    handler: Arc<dyn AspectHandler>,
}

impl AdSource for TimedAdSource {
    fn pick(&self, slot: &str) -> Result<String, BoxError> {
        intercept(
            self.handler.as_ref(),
            &TypeKey::of::<AdIndex>(),
            "pick",
            || self.inner.pick(slot),
        )
    }
}

/// 耗时统计切面
#[derive(Default)]
struct LatencyAspect {
    started: RwLock<Option<Instant>>,
    calls: AtomicUsize,
}

impl AspectHandler for LatencyAspect {
    fn needs_aspect(&self, target: &TypeKey) -> bool {
        *target == TypeKey::of::<AdIndex>()
    }

    fn before_invoking(&self, _target: &TypeKey, _method: &str) {
        if let Ok(mut started) = self.started.write() {
            *started = Some(Instant::now());
        }
    }

    fn after_returning(
        &self,
        target: &TypeKey,
        method: &str,
        result: Box<dyn Any + Send>,
    ) -> Box<dyn Any + Send> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Ok(started) = self.started.read() {
            if let Some(started) = *started {
                info!("{}.{} 耗时 {:?}", target.short_name(), method, started.elapsed());
            }
        }
        result
    }

    fn after_throwing(
        &self,
        target: &TypeKey,
        method: &str,
        error: BoxError,
    ) -> Result<Box<dyn Any + Send>, BoxError> {
        warn!("{}.{} 调用失败: {}", target.short_name(), method, error);
        Ok(Box::new("ad-house".to_string()))
    }
}

/// 投放服务
#[derive(Default)]
struct AdServer {
    source: Inject<dyn AdSource>,
    served: AtomicUsize,
}

impl AdServer {
    fn serve(&self, slot: &str) -> anyhow::Result<String> {
        let source = self.source.require()?;
        let ad = source
            .pick(slot)
            .map_err(|e| anyhow::anyhow!("投放失败: {e}"))?;
        self.served.fetch_add(1, Ordering::Relaxed);
        Ok(ad)
    }
}

fn catalog() -> ResourceCatalog {
    ResourceCatalog::new()
        .with(
            Descriptor::builder(AdIndex::default)
                .assignable_to(|index: Arc<AdIndex>| index as Arc<dyn AdSource>)
                .advised_with(|inner, handler| {
                    Arc::new(TimedAdSource { inner, handler }) as Arc<dyn AdSource>
                })
                .post_construct("load", |index: &AdIndex, ()| index.load())
                .build(),
        )
        .with(
            Descriptor::builder(LatencyAspect::default)
                .aspect_handler()
                .build(),
        )
        .with(
            Descriptor::builder(AdServer::default)
                .field("source", |server: &AdServer| &server.source)
                .post_construct("start", |_: &AdServer, (_index,): (Arc<AdIndex>,)| {
                    info!("投放服务已就绪");
                    Ok(())
                })
                .pre_destroy("stop", |server: &AdServer, ()| {
                    info!("投放服务停止, 累计投放 {} 次", server.served.load(Ordering::Relaxed));
                    Ok(())
                })
                .build(),
        )
}

/// 读取注入标记配置，文件不存在时使用默认配置
fn load_options(path: &Path) -> anyhow::Result<InjectionOptions> {
    if !path.exists() {
        info!("配置文件不存在, 使用默认注入标记: {}", path.display());
        return Ok(InjectionOptions::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    let options = InjectionOptions::from_toml_str(&text)?;
    info!("已加载注入标记配置: {}", path.display());
    Ok(options)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    info!("启动 Lorn ADSP 示例应用");
    let options = load_options(&args.config)?;

    let app = InjectedApp::builder(catalog())
        .options(options)
        .resource_type::<LatencyAspect>()
        .resource_type::<AdServer>()
        .resource_type::<AdIndex>()
        .build()?;
    info!("应用 {} 已启动, 共 {} 个资源", app.id(), app.resources().len());

    let server = app
        .get_object::<AdServer>()
        .context("投放服务未注册")?;
    for slot in [args.slot.as_str(), "footer"] {
        let ad = server.serve(slot)?;
        info!("广告位 {} 投放 {}", slot, ad);
    }

    for resource in app.pre_destroy_order() {
        info!("待销毁: {}", resource);
    }
    app.shutdown()?;
    info!("应用已关闭");
    Ok(())
}
