//! 注入应用

use crate::errors::InjectError;
use crate::graph::{GraphBuilder, Resource};
use crate::scheduler;
use crate::weaver::AspectWeaver;
use di_abstractions::{
    intercept, view_as, AspectHandler, AspectMaker, Assignable, DecoratorAspectMaker, Descriptor,
    DirectFieldSetter, FieldSetter, Instance, LifecycleMethod, Resolver,
};
use indexmap::IndexMap;
use infrastructure_common::{
    AtomicLifecycleState, BoxError, InjectionOptions, LifecycleState, Phase, TypeKey,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, info_span};
use uuid::Uuid;

struct ResourceInner {
    key: TypeKey,
    instance: Instance,
    advised: Option<Instance>,
    advisor: Option<Arc<dyn AspectHandler>>,
    local: bool,
    aspect_handler: bool,
    assignables: Vec<Assignable>,
    dependencies: Vec<TypeKey>,
    post_construct: Option<LifecycleMethod>,
    pre_destroy: Option<LifecycleMethod>,
    state: Arc<AtomicLifecycleState>,
}

/// 注入完成的资源
///
/// 克隆只复制句柄，状态在所有克隆之间共享。
#[derive(Clone)]
pub struct InjectedResource {
    inner: Arc<ResourceInner>,
}

impl InjectedResource {
    fn local(
        descriptor: Descriptor,
        instance: Instance,
        advised: Option<Instance>,
        advisor: Option<Arc<dyn AspectHandler>>,
        aspect_handler: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                key: descriptor.key(),
                instance,
                advised,
                advisor,
                local: true,
                aspect_handler,
                assignables: descriptor.assignables().to_vec(),
                dependencies: descriptor
                    .dependency_fields()
                    .iter()
                    .map(|field| field.target())
                    .collect(),
                post_construct: descriptor.post_construct().cloned(),
                pre_destroy: descriptor.pre_destroy().cloned(),
                state: Arc::new(AtomicLifecycleState::new()),
            }),
        }
    }

    /// 子应用中的继承视图：共享状态，不携带生命周期方法
    pub(crate) fn inherited(&self) -> Self {
        let inner = &self.inner;
        Self {
            inner: Arc::new(ResourceInner {
                key: inner.key,
                instance: inner.instance.clone(),
                advised: inner.advised.clone(),
                advisor: None,
                local: false,
                aspect_handler: false,
                assignables: inner.assignables.clone(),
                dependencies: inner.dependencies.clone(),
                post_construct: None,
                pre_destroy: None,
                state: inner.state.clone(),
            }),
        }
    }

    /// 资源类型
    pub fn key(&self) -> TypeKey {
        self.inner.key
    }

    /// 资源实例，存在代理实例时返回代理实例
    pub fn instance(&self) -> Instance {
        self.inner
            .advised
            .clone()
            .unwrap_or_else(|| self.inner.instance.clone())
    }

    /// 原始实例
    pub fn original_instance(&self) -> &Instance {
        &self.inner.instance
    }

    /// 代理实例
    pub fn advised_instance(&self) -> Option<&Instance> {
        self.inner.advised.as_ref()
    }

    /// 是否由当前应用创建和管理
    pub fn is_local(&self) -> bool {
        self.inner.local
    }

    /// 是否被切面代理
    pub fn is_advised(&self) -> bool {
        self.inner.advised.is_some()
    }

    /// 是否为切面处理器
    pub fn is_aspect_handler(&self) -> bool {
        self.inner.aspect_handler
    }

    /// 字段注入的依赖类型
    pub fn dependencies(&self) -> &[TypeKey] {
        &self.inner.dependencies
    }

    /// 初始化方法
    pub fn post_construct_method(&self) -> Option<&LifecycleMethod> {
        self.inner.post_construct.as_ref()
    }

    /// 销毁方法
    pub fn pre_destroy_method(&self) -> Option<&LifecycleMethod> {
        self.inner.pre_destroy.as_ref()
    }

    /// 指定阶段的生命周期方法
    pub fn lifecycle_method(&self, phase: Phase) -> Option<&LifecycleMethod> {
        match phase {
            Phase::PostConstruct => self.post_construct_method(),
            Phase::PreDestroy => self.pre_destroy_method(),
        }
    }

    /// 当前生命周期状态
    pub fn state(&self) -> LifecycleState {
        self.inner.state.load()
    }

    /// 是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.state() == LifecycleState::Initialized
    }

    /// 是否已销毁
    pub fn is_destroyed(&self) -> bool {
        self.state() == LifecycleState::Destroyed
    }

    /// 是否可以赋值给 `key`
    pub fn is_assignable_to(&self, key: &TypeKey) -> bool {
        self.inner
            .advised
            .as_ref()
            .is_some_and(|advised| advised.key() == *key)
            || *key == self.inner.key
            || self.inner.assignables.iter().any(|a| a.target() == *key)
    }

    /// 以 `key` 的视角查看资源
    ///
    /// 代理实例的类型与 `key` 一致时返回代理实例，否则返回原始实例的视图。
    pub fn view(&self, key: &TypeKey) -> Option<Instance> {
        if let Some(advised) = self.advised_for(key) {
            return Some(advised.clone());
        }
        view_as(
            key,
            &self.inner.key,
            &self.inner.instance,
            &self.inner.assignables,
        )
    }

    /// 以类型 `T` 获取资源
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.view(&TypeKey::of::<T>())
            .and_then(|instance| instance.downcast::<T>())
    }

    fn advised_for(&self, key: &TypeKey) -> Option<&Instance> {
        self.inner
            .advised
            .as_ref()
            .filter(|advised| advised.key() == *key)
    }

    /// 执行生命周期方法
    ///
    /// 代理实例与资源类型一致时直接在代理实例上执行；
    /// 代理实例以接口类型出现时在原始实例上执行，并经过生成代理的切面处理器。
    pub(crate) fn invoke(&self, phase: Phase, args: &[Instance]) -> Result<(), BoxError> {
        let Some(method) = self.lifecycle_method(phase) else {
            return Ok(());
        };
        if let Some(target) = self.advised_for(&self.inner.key) {
            return method.invoke(target, args);
        }
        match &self.inner.advisor {
            Some(handler) => intercept(handler.as_ref(), &self.inner.key, method.name(), || {
                method.invoke(&self.inner.instance, args)
            }),
            None => method.invoke(&self.inner.instance, args),
        }
    }

    pub(crate) fn mark(&self, phase: Phase) {
        self.inner.state.advance(phase.completed_state());
    }
}

impl fmt::Display for InjectedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InjectedResource({})", self.inner.key)
    }
}

impl fmt::Debug for InjectedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectedResource")
            .field("key", &self.inner.key)
            .field("local", &self.inner.local)
            .field("advised", &self.is_advised())
            .field("state", &self.state())
            .finish()
    }
}

/// 查找资源：先精确匹配，再按插入顺序查找第一个可赋值的资源
pub(crate) fn find_resource<'a>(
    resources: &'a IndexMap<TypeKey, InjectedResource>,
    key: &TypeKey,
) -> Option<&'a InjectedResource> {
    resources
        .get(key)
        .or_else(|| resources.values().find(|resource| resource.is_assignable_to(key)))
}

/// 注入应用
///
/// 构建完成后资源表不再变化。关闭时按构建期缓存的顺序执行销毁方法，
/// 已执行的条目从缓存中移除，重复关闭不会再次执行。
pub struct InjectedApp {
    id: Uuid,
    resources: IndexMap<TypeKey, InjectedResource>,
    local_resources: IndexMap<TypeKey, InjectedResource>,
    parent_apps: Vec<Arc<InjectedApp>>,
    pre_destroy: Mutex<VecDeque<InjectedResource>>,
    shutdown: AtomicBool,
}

impl InjectedApp {
    /// 创建应用构建器
    pub fn builder<R: Resolver + 'static>(resolver: R) -> InjectedAppBuilder {
        InjectedAppBuilder::new(Arc::new(resolver))
    }

    /// 应用标识
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 全部资源，包含继承自父应用的资源
    pub fn resources(&self) -> &IndexMap<TypeKey, InjectedResource> {
        &self.resources
    }

    /// 本地资源，顺序与 [`InjectedApp::resources`] 一致
    pub fn local_resources(&self) -> &IndexMap<TypeKey, InjectedResource> {
        &self.local_resources
    }

    /// 父应用
    pub fn parent_apps(&self) -> &[Arc<InjectedApp>] {
        &self.parent_apps
    }

    /// 按类型精确查找资源
    pub fn get_resource(&self, key: &TypeKey) -> Option<&InjectedResource> {
        self.resources.get(key)
    }

    /// 按类型查找实例：先精确匹配，再查找第一个可赋值的资源
    pub fn get_instance(&self, key: &TypeKey) -> Option<Instance> {
        find_resource(&self.resources, key).and_then(|resource| resource.view(key))
    }

    /// 按类型获取对象，`T` 可以是 trait object
    pub fn get_object<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_instance(&TypeKey::of::<T>())
            .and_then(|instance| instance.downcast::<T>())
    }

    /// 尚未执行的销毁顺序
    pub fn pre_destroy_order(&self) -> Vec<InjectedResource> {
        self.pre_destroy.lock().iter().cloned().collect()
    }

    /// 是否已成功关闭
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// 关闭应用，按顺序执行销毁方法
    pub fn shutdown(&self) -> Result<(), InjectError> {
        let span = info_span!("injected_app", app_id = %self.id);
        let _entered = span.enter();

        let pending = self.pre_destroy.lock().len();
        info!("开始关闭注入应用: {} 个待销毁资源", pending);
        scheduler::run_phase(Phase::PreDestroy, &self.pre_destroy, |key| {
            self.get_instance(key)
        })?;
        self.shutdown.store(true, Ordering::Release);
        info!("注入应用已关闭");
        Ok(())
    }
}

impl fmt::Debug for InjectedApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectedApp")
            .field("id", &self.id)
            .field("resources", &self.resources.len())
            .field("parent_apps", &self.parent_apps.len())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

/// 注入应用构建器
pub struct InjectedAppBuilder {
    resolver: Arc<dyn Resolver>,
    resource_types: Vec<TypeKey>,
    parent_apps: Vec<Arc<InjectedApp>>,
    options: InjectionOptions,
    field_setter: Arc<dyn FieldSetter>,
    aspect_maker: Arc<dyn AspectMaker>,
}

impl InjectedAppBuilder {
    fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self {
            resolver,
            resource_types: Vec::new(),
            parent_apps: Vec::new(),
            options: InjectionOptions::default(),
            field_setter: Arc::new(DirectFieldSetter),
            aspect_maker: Arc::new(DecoratorAspectMaker),
        }
    }

    /// 添加根资源类型
    #[must_use]
    pub fn resource_type<T: ?Sized + 'static>(mut self) -> Self {
        self.resource_types.push(TypeKey::of::<T>());
        self
    }

    /// 批量添加根资源类型
    #[must_use]
    pub fn resource_types(mut self, keys: impl IntoIterator<Item = TypeKey>) -> Self {
        self.resource_types.extend(keys);
        self
    }

    /// 添加父应用
    #[must_use]
    pub fn parent_app(mut self, parent: Arc<InjectedApp>) -> Self {
        self.parent_apps.push(parent);
        self
    }

    /// 批量添加父应用
    #[must_use]
    pub fn parent_apps(mut self, parents: impl IntoIterator<Item = Arc<InjectedApp>>) -> Self {
        self.parent_apps.extend(parents);
        self
    }

    /// 替换注入选项
    #[must_use]
    pub fn options(mut self, options: InjectionOptions) -> Self {
        self.options = options;
        self
    }

    /// 添加依赖字段标记
    #[must_use]
    pub fn resource_marker(mut self, marker: impl Into<String>) -> Self {
        self.options.resource_markers.insert(marker.into());
        self
    }

    /// 添加初始化方法标记
    #[must_use]
    pub fn post_construct_marker(mut self, marker: impl Into<String>) -> Self {
        self.options.post_construct_markers.insert(marker.into());
        self
    }

    /// 添加销毁方法标记
    #[must_use]
    pub fn pre_destroy_marker(mut self, marker: impl Into<String>) -> Self {
        self.options.pre_destroy_markers.insert(marker.into());
        self
    }

    /// 替换字段写入器
    #[must_use]
    pub fn field_setter(mut self, setter: impl FieldSetter + 'static) -> Self {
        self.field_setter = Arc::new(setter);
        self
    }

    /// 替换切面实例工厂
    #[must_use]
    pub fn aspect_maker(mut self, maker: impl AspectMaker + 'static) -> Self {
        self.aspect_maker = Arc::new(maker);
        self
    }

    /// 构建应用
    ///
    /// 依次完成资源图构建、切面织入、生命周期排序和初始化。
    /// 任何一步失败都不会返回应用。
    pub fn build(self) -> Result<InjectedApp, InjectError> {
        let id = Uuid::new_v4();
        let span = info_span!("injected_app", app_id = %id);
        let _entered = span.enter();

        info!(
            "开始构建注入应用: {} 个根类型, {} 个父应用",
            self.resource_types.len(),
            self.parent_apps.len()
        );
        let result = self.assemble(id);
        match &result {
            Ok(app) => info!("注入应用构建完成: {} 个资源", app.resources.len()),
            Err(error) => error!("注入应用构建失败: {}", error),
        }
        result
    }

    fn assemble(self, id: Uuid) -> Result<InjectedApp, InjectError> {
        self.options.validate()?;
        let graph = GraphBuilder::new(&*self.resolver, &self.options)
            .inherit(&self.parent_apps)
            .build(&self.resource_types, &*self.field_setter)?;
        let weaving = AspectWeaver::new(&*self.aspect_maker, &*self.field_setter).weave(&graph)?;

        let resources: IndexMap<TypeKey, InjectedResource> = graph
            .resources
            .into_iter()
            .map(|(key, resource)| {
                let injected = match resource {
                    Resource::Local {
                        descriptor,
                        instance,
                    } => InjectedResource::local(
                        descriptor,
                        instance,
                        weaving.advised(&key).cloned(),
                        weaving.advisor(&key).cloned(),
                        weaving.is_handler(&key),
                    ),
                    Resource::Inherited(inherited) => inherited,
                };
                (key, injected)
            })
            .collect();

        let post_construct = scheduler::execution_order(Phase::PostConstruct, &resources)?;
        let pre_destroy = scheduler::execution_order(Phase::PreDestroy, &resources)?;

        let local_resources = resources
            .iter()
            .filter(|(_, resource)| resource.is_local())
            .map(|(key, resource)| (*key, resource.clone()))
            .collect();
        let app = InjectedApp {
            id,
            resources,
            local_resources,
            parent_apps: self.parent_apps,
            pre_destroy: Mutex::new(pre_destroy.into()),
            shutdown: AtomicBool::new(false),
        };
        let pending = Mutex::new(VecDeque::from(post_construct));
        scheduler::run_phase(Phase::PostConstruct, &pending, |key| {
            app.get_instance(key)
        })?;
        Ok(app)
    }
}
