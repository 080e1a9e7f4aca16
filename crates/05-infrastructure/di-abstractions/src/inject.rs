//! 依赖字段槽位

use infrastructure_common::DependencyError;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// 依赖字段
///
/// 资源在构造后才被注入依赖，切面织入后还可能被改写为代理实例，
/// 因此字段使用可重复写入的内部可变槽位。
pub struct Inject<T: ?Sized> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> Inject<T> {
    /// 创建空槽位
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// 写入依赖
    pub fn set(&self, value: Arc<T>) {
        *self.slot.write() = Some(value);
    }

    /// 读取依赖
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.read().clone()
    }

    /// 是否已注入
    pub fn is_injected(&self) -> bool {
        self.slot.read().is_some()
    }
}

impl<T: ?Sized + 'static> Inject<T> {
    /// 读取依赖，未注入时返回错误
    pub fn require(&self) -> Result<Arc<T>, DependencyError> {
        self.get().ok_or_else(|| DependencyError::NotInjected {
            type_name: std::any::type_name::<T>().to_string(),
        })
    }
}

impl<T: ?Sized> Default for Inject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_injected() { "injected" } else { "empty" };
        write!(f, "Inject<{}>({state})", std::any::type_name::<T>())
    }
}
