//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义资源描述和注入过程中外部协作者的接口。
//!
//! ## 核心接口
//!
//! - [`Descriptor`] - 资源描述符（构造、依赖字段、生命周期方法）
//! - [`Resolver`] - 描述符解析器
//! - [`FieldSetter`] - 字段写入器
//! - [`AspectHandler`] / [`AspectMaker`] - 切面处理器与切面实例工厂
//! - [`Inject`] - 依赖字段槽位

pub mod aspect;
pub mod descriptor;
pub mod inject;
pub mod instance;
pub mod resolver;
pub mod setter;

pub use aspect::*;
pub use descriptor::*;
pub use inject::*;
pub use instance::*;
pub use resolver::*;
pub use setter::*;
