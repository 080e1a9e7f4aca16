//! 生命周期调度
//!
//! 生命周期方法的参数构成独立于字段注入的依赖关系。
//! 调度分两步：先从本地资源出发收集参与该阶段的资源并检测循环，
//! 再按"参数类型先于依赖方"的关系拓扑排序。

use crate::app::{find_resource, InjectedResource};
use crate::errors::{InjectError, PhaseExecutionError};
use di_abstractions::Instance;
use indexmap::IndexMap;
use infrastructure_common::{BoxError, DependencyError, Phase, TypeKey};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, error};

/// 计算指定阶段的执行顺序
pub(crate) fn execution_order(
    phase: Phase,
    resources: &IndexMap<TypeKey, InjectedResource>,
) -> Result<Vec<InjectedResource>, InjectError> {
    let mut collector = Collector {
        phase,
        resources,
        stack: Vec::new(),
        finished: HashSet::new(),
        collected: IndexMap::new(),
    };
    for resource in resources.values().filter(|resource| resource.is_local()) {
        collector.visit(resource)?;
    }
    let order = sort(phase, collector.collected, resources)?;
    debug!(
        "{}顺序: [{}]",
        phase,
        order
            .iter()
            .map(|resource| resource.key().short_name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(order)
}

struct Collector<'a> {
    phase: Phase,
    resources: &'a IndexMap<TypeKey, InjectedResource>,
    stack: Vec<TypeKey>,
    finished: HashSet<TypeKey>,
    collected: IndexMap<TypeKey, InjectedResource>,
}

impl<'a> Collector<'a> {
    fn visit(&mut self, resource: &'a InjectedResource) -> Result<(), InjectError> {
        let Some(method) = resource.lifecycle_method(self.phase) else {
            return Ok(());
        };
        let key = resource.key();
        self.collected.entry(key).or_insert_with(|| resource.clone());
        if method.params().is_empty() || self.finished.contains(&key) {
            return Ok(());
        }
        if self.stack.contains(&key) {
            let mut chain = self.stack.clone();
            chain.push(key);
            return Err(InjectError::CircularLifecycleDependency {
                phase: self.phase,
                chain,
            });
        }
        self.stack.push(key);
        for param in method.params() {
            let dependency = find_resource(self.resources, param)
                .ok_or_else(|| DependencyError::not_registered(param.name()))?;
            self.visit(dependency)?;
        }
        self.stack.pop();
        self.finished.insert(key);
        Ok(())
    }
}

/// Kahn 拓扑排序，同时就绪的资源按收集顺序输出
fn sort(
    phase: Phase,
    collected: IndexMap<TypeKey, InjectedResource>,
    resources: &IndexMap<TypeKey, InjectedResource>,
) -> Result<Vec<InjectedResource>, InjectError> {
    let nodes: Vec<InjectedResource> = collected.into_values().collect();
    let index: HashMap<TypeKey, usize> = nodes
        .iter()
        .enumerate()
        .map(|(position, resource)| (resource.key(), position))
        .collect();

    let mut in_degree = vec![0_usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (position, node) in nodes.iter().enumerate() {
        let Some(method) = node.lifecycle_method(phase) else {
            continue;
        };
        for param in method.params() {
            let dependency = find_resource(resources, param)
                .and_then(|dependency| index.get(&dependency.key()).copied());
            if let Some(dependency) = dependency.filter(|dependency| *dependency != position) {
                dependents[dependency].push(position);
                in_degree[position] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(position, _)| position)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(next) = ready.pop_first() {
        order.push(nodes[next].clone());
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != nodes.len() {
        let chain = nodes
            .iter()
            .enumerate()
            .filter(|(position, _)| in_degree[*position] > 0)
            .map(|(_, resource)| resource.key())
            .collect();
        return Err(InjectError::CircularLifecycleDependency { phase, chain });
    }
    Ok(order)
}

/// 按顺序执行生命周期方法，遇到第一个失败立即停止
///
/// 每个资源在执行前从 `pending` 中移除，失败时之后的资源保留在 `pending` 中。
/// 队列锁只在取出条目时持有，生命周期方法执行期间不持有。
pub(crate) fn run_phase<F>(
    phase: Phase,
    pending: &Mutex<VecDeque<InjectedResource>>,
    resolve: F,
) -> Result<(), PhaseExecutionError>
where
    F: Fn(&TypeKey) -> Option<Instance>,
{
    let mut completed = Vec::new();
    loop {
        let next = pending.lock().pop_front();
        let Some(resource) = next else {
            return Ok(());
        };
        match invoke(phase, &resource, &resolve) {
            Ok(()) => {
                resource.mark(phase);
                completed.push(resource);
            }
            Err(source) => {
                error!("{}方法执行失败: {}, 原因: {}", phase, resource.key(), source);
                let mut remaining = vec![resource.clone()];
                remaining.extend(pending.lock().iter().cloned());
                return Err(PhaseExecutionError {
                    phase,
                    failed: resource,
                    source,
                    completed,
                    remaining,
                });
            }
        }
    }
}

fn invoke<F>(phase: Phase, resource: &InjectedResource, resolve: &F) -> Result<(), BoxError>
where
    F: Fn(&TypeKey) -> Option<Instance>,
{
    let Some(method) = resource.lifecycle_method(phase) else {
        return Ok(());
    };
    let args = method
        .params()
        .iter()
        .map(|param| resolve(param).ok_or_else(|| DependencyError::not_registered(param.name())))
        .collect::<Result<Vec<_>, _>>()?;
    debug!("执行{}方法: {}.{}", phase, resource.key().short_name(), method.name());
    resource.invoke(phase, &args)
}
