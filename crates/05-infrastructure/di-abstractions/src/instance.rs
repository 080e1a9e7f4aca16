//! 类型擦除的资源实例

use infrastructure_common::TypeKey;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 资源实例句柄
///
/// 内部保存一个 `Arc<T>`（`T` 可以是 trait object），克隆句柄不会复制实例。
#[derive(Clone)]
pub struct Instance {
    object: Arc<dyn Any + Send + Sync>,
    key: TypeKey,
    addr: usize,
}

impl Instance {
    /// 包装一个共享实例
    pub fn new<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let addr = Arc::as_ptr(&value) as *const () as usize;
        Self {
            object: Arc::new(value),
            key: TypeKey::of::<T>(),
            addr,
        }
    }

    /// 包装一个新值
    pub fn from_value<T>(value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::new(Arc::new(value))
    }

    /// 转换为具体类型
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.object.downcast_ref::<Arc<T>>().cloned()
    }

    /// 是否持有指定类型
    pub fn is<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.object.is::<Arc<T>>()
    }

    /// 句柄所持有的类型
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// 实例的类型名称
    pub fn type_name(&self) -> &'static str {
        self.key.name()
    }

    /// 两个句柄是否指向同一个实例
    ///
    /// 比较的是底层对象地址，同一对象的接口视图与原句柄相等。
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.key.name())
    }
}

type CastFn = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

/// 可赋值声明
///
/// 声明一个具体资源可以被视为某个接口类型，并携带对应的向上转换。
#[derive(Clone)]
pub struct Assignable {
    target: TypeKey,
    cast: CastFn,
}

impl Assignable {
    /// 创建从 `T` 到 `U` 的可赋值声明
    pub fn new<T, U, F>(cast: F) -> Self
    where
        T: Send + Sync + 'static,
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    {
        Self {
            target: TypeKey::of::<U>(),
            cast: Arc::new(move |instance| {
                instance.downcast::<T>().map(|it| Instance::new(cast(it)))
            }),
        }
    }

    /// 目标接口类型
    pub fn target(&self) -> TypeKey {
        self.target
    }

    /// 将实例转换为目标接口视图
    pub fn cast(&self, instance: &Instance) -> Option<Instance> {
        (self.cast)(instance)
    }
}

impl fmt::Debug for Assignable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assignable")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// 是否可以把 `own` 类型的资源赋值给 `key`
pub fn is_assignable(key: &TypeKey, own: &TypeKey, assignables: &[Assignable]) -> bool {
    key == own || assignables.iter().any(|a| &a.target == key)
}

/// 以 `key` 的视角查看实例
///
/// 相同类型直接返回实例本身，接口类型返回向上转换后的视图。
pub fn view_as(
    key: &TypeKey,
    own: &TypeKey,
    instance: &Instance,
    assignables: &[Assignable],
) -> Option<Instance> {
    if key == own {
        return Some(instance.clone());
    }
    assignables
        .iter()
        .find(|a| &a.target == key)
        .and_then(|a| a.cast(instance))
}
