//! # 依赖注入具体实现
//!
//! 根据资源描述符构建对象图、写入字段依赖、织入切面，
//! 并按生命周期方法参数的依赖关系执行初始化与销毁。
//!
//! ## 构建流程
//!
//! 1. 资源图构建：从根类型递归解析，继承父应用资源，统一写入字段
//! 2. 切面织入：收集切面处理器，为匹配的资源创建代理实例并重新注入字段
//! 3. 生命周期调度：计算初始化与销毁顺序，执行初始化方法
//!
//! 销毁顺序在构建期计算并缓存，[`InjectedApp::shutdown`] 按缓存顺序执行。

mod app;
mod catalog;
mod errors;
mod graph;
mod scheduler;
mod weaver;

pub use app::{InjectedApp, InjectedAppBuilder, InjectedResource};
pub use catalog::ResourceCatalog;
pub use errors::{InjectError, InjectResult, PhaseExecutionError};
