//! 资源图构建
//!
//! 从根类型出发递归解析描述符，创建实例并记录字段注入指令，
//! 完整的资源表建立后再统一写入字段。

use crate::app::{InjectedApp, InjectedResource};
use di_abstractions::{view_as, DependencyField, Descriptor, FieldSetter, Instance, Resolver};
use indexmap::IndexMap;
use infrastructure_common::{DependencyError, InjectionOptions, Phase, TypeKey};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 构建期资源
pub(crate) enum Resource {
    /// 本应用构造并管理的资源
    Local {
        descriptor: Descriptor,
        instance: Instance,
    },
    /// 从父应用继承的资源
    Inherited(InjectedResource),
}

impl Resource {
    pub(crate) fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    /// 以 `key` 的视角查看资源
    ///
    /// `advised` 是该资源的代理实例，类型与 `key` 一致时优先使用。
    pub(crate) fn view(&self, key: &TypeKey, advised: Option<&Instance>) -> Option<Instance> {
        match self {
            Self::Local {
                descriptor,
                instance,
            } => {
                if let Some(advised) = advised.filter(|advised| advised.key() == *key) {
                    return Some(advised.clone());
                }
                view_as(key, &descriptor.key(), instance, descriptor.assignables())
            }
            Self::Inherited(resource) => resource.view(key),
        }
    }
}

/// 字段注入指令：`owner` 的 `field` 需要持有字段声明类型的资源
pub(crate) struct FieldRef {
    pub(crate) field: DependencyField,
    pub(crate) owner: TypeKey,
}

/// 构建完成的资源图
pub(crate) struct ResourceGraph {
    pub(crate) resources: IndexMap<TypeKey, Resource>,
    pub(crate) field_refs: Vec<FieldRef>,
}

impl ResourceGraph {
    /// 按类型查找实例：先精确匹配，再按插入顺序查找第一个可赋值的资源
    pub(crate) fn lookup(
        &self,
        key: &TypeKey,
        advised: &HashMap<TypeKey, Instance>,
    ) -> Option<Instance> {
        if let Some(resource) = self.resources.get(key) {
            return resource.view(key, advised.get(key));
        }
        self.resources
            .iter()
            .find_map(|(own, resource)| resource.view(key, advised.get(own)))
    }

    /// 资源自身的实例，存在代理且类型一致时为代理实例
    pub(crate) fn owner_instance(
        &self,
        key: &TypeKey,
        advised: &HashMap<TypeKey, Instance>,
    ) -> Option<Instance> {
        self.resources
            .get(key)
            .and_then(|resource| resource.view(key, advised.get(key)))
    }

    /// 写入一条字段注入指令
    pub(crate) fn write_field(
        &self,
        setter: &dyn FieldSetter,
        field_ref: &FieldRef,
        advised: &HashMap<TypeKey, Instance>,
    ) -> Result<(), DependencyError> {
        let field = &field_ref.field;
        let owner = self
            .owner_instance(&field_ref.owner, advised)
            .ok_or_else(|| DependencyError::not_registered(field_ref.owner.name()))?;
        let value = self
            .lookup(&field.target(), advised)
            .ok_or_else(|| DependencyError::not_registered(field.target().name()))?;
        setter
            .set(field, &owner, &value)
            .map_err(|source| DependencyError::FieldInjectionFailed {
                owner: field_ref.owner.name().to_string(),
                field: field.name().to_string(),
                source,
            })
    }
}

/// 资源图构建器
pub(crate) struct GraphBuilder<'a> {
    resolver: &'a dyn Resolver,
    options: &'a InjectionOptions,
    resources: IndexMap<TypeKey, Resource>,
    field_refs: Vec<FieldRef>,
}

impl<'a> GraphBuilder<'a> {
    pub(crate) fn new(resolver: &'a dyn Resolver, options: &'a InjectionOptions) -> Self {
        Self {
            resolver,
            options,
            resources: IndexMap::new(),
            field_refs: Vec::new(),
        }
    }

    /// 继承父应用的全部资源，这些资源不会被重新实例化
    pub(crate) fn inherit(mut self, parents: &[Arc<InjectedApp>]) -> Self {
        for parent in parents {
            for resource in parent.resources().values() {
                self.resources
                    .insert(resource.key(), Resource::Inherited(resource.inherited()));
            }
        }
        self
    }

    /// 解析全部根类型并写入字段
    pub(crate) fn build(
        mut self,
        roots: &[TypeKey],
        setter: &dyn FieldSetter,
    ) -> Result<ResourceGraph, DependencyError> {
        for root in roots {
            self.resolve(*root)?;
        }
        let graph = ResourceGraph {
            resources: self.resources,
            field_refs: self.field_refs,
        };
        let no_advice = HashMap::new();
        for field_ref in &graph.field_refs {
            graph.write_field(setter, field_ref, &no_advice)?;
            debug!(
                "注入字段: {}.{} <- {}",
                field_ref.owner.short_name(),
                field_ref.field.name(),
                field_ref.field.target()
            );
        }
        Ok(graph)
    }

    fn resolve(&mut self, key: TypeKey) -> Result<(), DependencyError> {
        if self.resources.contains_key(&key) {
            return Ok(());
        }
        let descriptor = self.resolver.resolve(&key, self.options).map_err(|source| {
            DependencyError::DependencyResolutionFailed {
                type_name: key.name().to_string(),
                source,
            }
        })?;
        if descriptor.key() != key {
            return Err(DependencyError::type_mismatch(
                key.name(),
                descriptor.key().name(),
            ));
        }
        if !descriptor.is_constructible() {
            debug!("跳过不可实例化的类型: {}", key);
            return Ok(());
        }
        let instance =
            descriptor
                .instantiate()
                .map_err(|source| DependencyError::ComponentCreationFailed {
                    type_name: key.name().to_string(),
                    source,
                })?;
        debug!("创建资源实例: {}", key);

        let fields = descriptor.dependency_fields().to_vec();
        let params: Vec<TypeKey> = [Phase::PostConstruct, Phase::PreDestroy]
            .into_iter()
            .filter_map(|phase| descriptor.lifecycle_method(phase))
            .flat_map(|method| method.params().to_vec())
            .collect();

        // 先登记再递归，字段环可以终止
        self.resources.insert(
            key,
            Resource::Local {
                descriptor,
                instance,
            },
        );

        for field in fields {
            if field.target() != key {
                self.resolve(field.target())?;
            }
            self.field_refs.push(FieldRef { field, owner: key });
        }
        for param in params {
            self.resolve(param)?;
        }
        Ok(())
    }
}
