//! 资源目录
//!
//! 默认的描述符解析器，保存调用方声明的全部描述符。

use di_abstractions::{Descriptor, Resolver};
use infrastructure_common::{BoxError, DependencyError, InjectionOptions, TypeKey};
use std::collections::HashMap;
use tracing::debug;

/// 资源目录
///
/// 解析时按注入选项过滤描述符。未声明的 trait object 类型视为接口类型，
/// 其他未声明的类型返回 [`DependencyError::ComponentNotRegistered`]。
#[derive(Debug, Default, Clone)]
pub struct ResourceCatalog {
    descriptors: HashMap<TypeKey, Descriptor>,
}

impl ResourceCatalog {
    /// 创建空目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明资源，同一类型重复声明时以后者为准
    pub fn register(&mut self, descriptor: Descriptor) -> &mut Self {
        debug!("声明资源: {}", descriptor.key());
        self.descriptors.insert(descriptor.key(), descriptor);
        self
    }

    /// 声明接口类型
    pub fn register_abstract<T: ?Sized + 'static>(&mut self) -> &mut Self {
        self.register(Descriptor::abstract_type::<T>())
    }

    /// 以链式方式声明资源
    #[must_use]
    pub fn with(mut self, descriptor: Descriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// 是否已声明
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.descriptors.contains_key(key)
    }

    /// 已声明的资源数量
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Resolver for ResourceCatalog {
    fn resolve(&self, key: &TypeKey, options: &InjectionOptions) -> Result<Descriptor, BoxError> {
        match self.descriptors.get(key) {
            Some(descriptor) => Ok(descriptor.filtered(options)),
            None if key.is_trait_object() => Ok(Descriptor::abstract_type_of(*key)),
            None => Err(DependencyError::not_registered(key.name()).into()),
        }
    }
}
