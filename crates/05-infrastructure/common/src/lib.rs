//! # Infrastructure Common
//!
//! 这个 crate 提供了 Lorn ADSP 依赖注入运行时的公共类型。
//!
//! ## 核心类型
//!
//! - [`TypeKey`] - 资源类型标识
//! - [`DependencyError`] - 构建期错误
//! - [`LifecycleState`] / [`Phase`] - 资源生命周期
//! - [`InjectionOptions`] - 注入标记配置
//!
//! ## 设计原则
//!
//! - 类型标识基于 `TypeId`，参数化类型互不相同
//! - 接口类型即 trait object，从不实例化

pub mod configuration;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use configuration::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
