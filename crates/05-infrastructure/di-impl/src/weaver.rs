//! 切面织入
//!
//! 织入不修改资源记录，而是产出一份只读的 [`Weaving`] 结果。

use crate::graph::{Resource, ResourceGraph};
use di_abstractions::{AspectHandler, AspectMaker, FieldSetter, Instance};
use infrastructure_common::{DependencyError, TypeKey};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// 织入结果
#[derive(Default)]
pub(crate) struct Weaving {
    advised: HashMap<TypeKey, Instance>,
    advisors: HashMap<TypeKey, Arc<dyn AspectHandler>>,
    handlers: HashSet<TypeKey>,
}

impl Weaving {
    /// 资源的代理实例
    pub(crate) fn advised(&self, key: &TypeKey) -> Option<&Instance> {
        self.advised.get(key)
    }

    /// 为资源生成代理实例的切面处理器
    pub(crate) fn advisor(&self, key: &TypeKey) -> Option<&Arc<dyn AspectHandler>> {
        self.advisors.get(key)
    }

    /// 资源是否为切面处理器
    pub(crate) fn is_handler(&self, key: &TypeKey) -> bool {
        self.handlers.contains(key)
    }
}

/// 切面织入器
pub(crate) struct AspectWeaver<'a> {
    maker: &'a dyn AspectMaker,
    setter: &'a dyn FieldSetter,
}

impl<'a> AspectWeaver<'a> {
    pub(crate) fn new(maker: &'a dyn AspectMaker, setter: &'a dyn FieldSetter) -> Self {
        Self { maker, setter }
    }

    pub(crate) fn weave(&self, graph: &ResourceGraph) -> Result<Weaving, DependencyError> {
        let mut weaving = Weaving::default();
        let mut handlers: Vec<Arc<dyn AspectHandler>> = Vec::new();
        for (key, resource) in &graph.resources {
            if let Resource::Local {
                descriptor,
                instance,
            } = resource
            {
                if let Some(handler) = descriptor.aspect_handler(instance) {
                    debug!("发现切面处理器: {}", key);
                    handlers.push(handler);
                    weaving.handlers.insert(*key);
                }
            }
        }
        if handlers.is_empty() {
            return Ok(weaving);
        }

        for (key, resource) in &graph.resources {
            let Resource::Local {
                descriptor,
                instance,
            } = resource
            else {
                continue;
            };
            if weaving.is_handler(key) {
                continue;
            }
            let Some(handler) = handlers.iter().find(|handler| handler.needs_aspect(key)) else {
                continue;
            };
            let advised = self
                .maker
                .make(descriptor, instance, handler.clone())
                .and_then(|spec| spec.new_instance())
                .map_err(|source| DependencyError::AspectCreationFailed {
                    type_name: key.name().to_string(),
                    source,
                })?;
            debug!("创建代理实例: {} -> {}", key, advised.type_name());
            weaving.advised.insert(*key, advised);
            weaving.advisors.insert(*key, handler.clone());
        }

        let no_advice = HashMap::new();
        for field_ref in &graph.field_refs {
            let target = field_ref.field.target();
            let owner_changed = changed(
                graph.owner_instance(&field_ref.owner, &weaving.advised),
                graph.owner_instance(&field_ref.owner, &no_advice),
            );
            let value_changed = changed(
                graph.lookup(&target, &weaving.advised),
                graph.lookup(&target, &no_advice),
            );
            if owner_changed || value_changed {
                graph.write_field(self.setter, field_ref, &weaving.advised)?;
                debug!(
                    "重新注入字段: {}.{}",
                    field_ref.owner.short_name(),
                    field_ref.field.name()
                );
            }
        }
        Ok(weaving)
    }
}

fn changed(effective: Option<Instance>, original: Option<Instance>) -> bool {
    match (effective, original) {
        (Some(effective), Some(original)) => !effective.ptr_eq(&original),
        (effective, original) => effective.is_some() != original.is_some(),
    }
}
