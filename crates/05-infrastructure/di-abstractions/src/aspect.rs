//! 切面抽象接口
//!
//! 代理实例以装饰器的形式实现：包装原始实例，在调用前后交给切面处理器。

use crate::descriptor::Descriptor;
use crate::instance::Instance;
use infrastructure_common::{BoxError, DependencyError, TypeKey};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// 切面处理器
///
/// 切面处理器本身也是普通资源。织入时按收集顺序询问每个处理器，
/// 第一个返回 `true` 的处理器为该资源生成代理实例。
pub trait AspectHandler: Send + Sync {
    /// 指定类型是否需要切面
    fn needs_aspect(&self, target: &TypeKey) -> bool;

    /// 调用前
    fn before_invoking(&self, _target: &TypeKey, _method: &str) {}

    /// 调用成功返回后，可以替换返回值
    fn after_returning(
        &self,
        _target: &TypeKey,
        _method: &str,
        result: Box<dyn Any + Send>,
    ) -> Box<dyn Any + Send> {
        result
    }

    /// 调用失败后，可以吞掉错误并给出替代返回值
    fn after_throwing(
        &self,
        _target: &TypeKey,
        _method: &str,
        error: BoxError,
    ) -> Result<Box<dyn Any + Send>, BoxError> {
        Err(error)
    }
}

/// 在切面处理器的钩子之间执行一次调用
///
/// 供手写的装饰器使用。处理器替换的返回值类型必须与原返回值一致。
pub fn intercept<R, F>(
    handler: &dyn AspectHandler,
    target: &TypeKey,
    method: &str,
    call: F,
) -> Result<R, BoxError>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R, BoxError>,
{
    handler.before_invoking(target, method);
    let outcome = match call() {
        Ok(value) => handler.after_returning(target, method, Box::new(value)),
        Err(error) => {
            let recovered = handler.after_throwing(target, method, error)?;
            debug!("切面处理器吞掉了调用错误: {}.{}", target.short_name(), method);
            recovered
        }
    };
    outcome.downcast::<R>().map(|value| *value).map_err(|_| {
        DependencyError::type_mismatch(std::any::type_name::<R>(), "<aspect result>").into()
    })
}

/// 代理实例规格
pub struct AspectSpec {
    factory: Box<dyn Fn() -> Result<Instance, BoxError> + Send + Sync>,
}

impl AspectSpec {
    /// 创建代理规格
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
        }
    }

    /// 创建代理实例
    pub fn new_instance(&self) -> Result<Instance, BoxError> {
        (self.factory)()
    }
}

impl fmt::Debug for AspectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AspectSpec")
    }
}

/// 切面实例工厂
pub trait AspectMaker: Send + Sync {
    /// 为目标资源生成代理规格
    fn make(
        &self,
        descriptor: &Descriptor,
        target: &Instance,
        handler: Arc<dyn AspectHandler>,
    ) -> Result<AspectSpec, BoxError>;
}

/// 基于装饰器的切面实例工厂
///
/// 使用描述符中通过 `advised_with` 声明的装饰器构造代理实例。
#[derive(Debug, Default, Clone, Copy)]
pub struct DecoratorAspectMaker;

impl AspectMaker for DecoratorAspectMaker {
    fn make(
        &self,
        descriptor: &Descriptor,
        target: &Instance,
        handler: Arc<dyn AspectHandler>,
    ) -> Result<AspectSpec, BoxError> {
        let Some(advisor) = descriptor.advisor() else {
            warn!("切面匹配的类型没有声明装饰器: {}", descriptor.key());
            return Err(format!("{} 没有声明装饰器", descriptor.key()).into());
        };
        let target = target.clone();
        Ok(AspectSpec::new(move || advisor(&target, handler.clone())))
    }
}
