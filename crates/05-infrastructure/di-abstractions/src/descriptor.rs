//! 资源描述符
//!
//! 描述一个资源类型如何构造、需要注入哪些字段、声明了哪些生命周期方法。
//! 描述符由调用方通过 [`DescriptorBuilder`] 显式声明，不依赖运行时反射。

use crate::aspect::AspectHandler;
use crate::inject::Inject;
use crate::instance::{is_assignable, Assignable, Instance};
use infrastructure_common::{
    BoxError, DependencyError, InjectionOptions, Phase, TypeKey, DEFAULT_POST_CONSTRUCT_MARKER,
    DEFAULT_PRE_DESTROY_MARKER, DEFAULT_RESOURCE_MARKER,
};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type Factory = Arc<dyn Fn() -> Result<Instance, BoxError> + Send + Sync>;
type FieldWrite = Arc<dyn Fn(&Instance, &Instance) -> Result<(), BoxError> + Send + Sync>;
type Invoke = Arc<dyn Fn(&Instance, &[Instance]) -> Result<(), BoxError> + Send + Sync>;
type HandlerView = Arc<dyn Fn(&Instance) -> Option<Arc<dyn AspectHandler>> + Send + Sync>;

/// 切面装饰器：包装原始实例，返回代理实例
pub type Advisor =
    Arc<dyn Fn(&Instance, Arc<dyn AspectHandler>) -> Result<Instance, BoxError> + Send + Sync>;

/// 依赖字段
#[derive(Clone)]
pub struct DependencyField {
    name: &'static str,
    marker: String,
    owner: TypeKey,
    target: TypeKey,
    write: FieldWrite,
}

impl DependencyField {
    fn new<T, V, F>(name: &'static str, marker: &str, accessor: F) -> Self
    where
        T: Send + Sync + 'static,
        V: ?Sized + Send + Sync + 'static,
        F: Fn(&T) -> &Inject<V> + Send + Sync + 'static,
    {
        let write: FieldWrite = Arc::new(move |owner, value| {
            let owner = owner.downcast::<T>().ok_or_else(|| {
                DependencyError::type_mismatch(std::any::type_name::<T>(), owner.type_name())
            })?;
            let value = value.downcast::<V>().ok_or_else(|| {
                DependencyError::type_mismatch(std::any::type_name::<V>(), value.type_name())
            })?;
            accessor(&*owner).set(value);
            Ok(())
        });
        Self {
            name,
            marker: marker.to_string(),
            owner: TypeKey::of::<T>(),
            target: TypeKey::of::<V>(),
            write,
        }
    }

    /// 字段名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 字段标记
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// 字段所属类型
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// 字段声明的依赖类型
    pub fn target(&self) -> TypeKey {
        self.target
    }

    /// 把 `value` 写入 `owner` 的字段
    pub fn write(&self, owner: &Instance, value: &Instance) -> Result<(), BoxError> {
        (self.write)(owner, value)
    }
}

impl fmt::Debug for DependencyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyField")
            .field("name", &self.name)
            .field("marker", &self.marker)
            .field("target", &self.target)
            .finish()
    }
}

/// 生命周期方法的参数列表
///
/// 由 `()` 或 `(Arc<P1>, ..., Arc<P4>)` 元组实现，参数按位置解析。
pub trait LifecycleParams: Sized {
    /// 参数类型
    fn keys() -> Vec<TypeKey>;

    /// 从已解析的实例构造参数
    fn from_instances(args: &[Instance]) -> Result<Self, DependencyError>;
}

impl LifecycleParams for () {
    fn keys() -> Vec<TypeKey> {
        Vec::new()
    }

    fn from_instances(_args: &[Instance]) -> Result<Self, DependencyError> {
        Ok(())
    }
}

fn downcast_arg<P>(args: &[Instance], index: usize) -> Result<Arc<P>, DependencyError>
where
    P: ?Sized + Send + Sync + 'static,
{
    let arg = args.get(index).ok_or_else(|| DependencyError::NotInjected {
        type_name: std::any::type_name::<P>().to_string(),
    })?;
    arg.downcast::<P>()
        .ok_or_else(|| DependencyError::type_mismatch(std::any::type_name::<P>(), arg.type_name()))
}

macro_rules! impl_lifecycle_params {
    ($($param:ident : $index:tt),+) => {
        impl<$($param),+> LifecycleParams for ($(Arc<$param>,)+)
        where
            $($param: ?Sized + Send + Sync + 'static),+
        {
            fn keys() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$param>()),+]
            }

            fn from_instances(args: &[Instance]) -> Result<Self, DependencyError> {
                Ok(($(downcast_arg::<$param>(args, $index)?,)+))
            }
        }
    };
}

impl_lifecycle_params!(P1: 0);
impl_lifecycle_params!(P1: 0, P2: 1);
impl_lifecycle_params!(P1: 0, P2: 1, P3: 2);
impl_lifecycle_params!(P1: 0, P2: 1, P3: 2, P4: 3);

/// 生命周期方法
#[derive(Clone)]
pub struct LifecycleMethod {
    name: &'static str,
    marker: String,
    params: Vec<TypeKey>,
    invoke: Invoke,
}

impl LifecycleMethod {
    /// 创建生命周期方法
    pub fn new<T, P, F>(name: &'static str, marker: &str, method: F) -> Self
    where
        T: Send + Sync + 'static,
        P: LifecycleParams,
        F: Fn(&T, P) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let invoke: Invoke = Arc::new(move |target, args| {
            let target = target.downcast::<T>().ok_or_else(|| {
                DependencyError::type_mismatch(std::any::type_name::<T>(), target.type_name())
            })?;
            method(&*target, P::from_instances(args)?)
        });
        Self {
            name,
            marker: marker.to_string(),
            params: P::keys(),
            invoke,
        }
    }

    /// 方法名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 方法标记
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// 参数类型列表
    pub fn params(&self) -> &[TypeKey] {
        &self.params
    }

    /// 调用方法，`args` 与参数列表一一对应
    pub fn invoke(&self, target: &Instance, args: &[Instance]) -> Result<(), BoxError> {
        (self.invoke)(target, args)
    }
}

impl fmt::Debug for LifecycleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleMethod")
            .field("name", &self.name)
            .field("marker", &self.marker)
            .field("params", &self.params)
            .finish()
    }
}

/// 资源描述符
#[derive(Clone)]
pub struct Descriptor {
    key: TypeKey,
    factory: Option<Factory>,
    fields: Vec<DependencyField>,
    post_construct: Option<LifecycleMethod>,
    pre_destroy: Option<LifecycleMethod>,
    assignables: Vec<Assignable>,
    aspect_handler: Option<HandlerView>,
    advisor: Option<Advisor>,
}

impl Descriptor {
    fn empty(key: TypeKey, factory: Option<Factory>) -> Self {
        Self {
            key,
            factory,
            fields: Vec::new(),
            post_construct: None,
            pre_destroy: None,
            assignables: Vec::new(),
            aspect_handler: None,
            advisor: None,
        }
    }

    /// 以无参构造函数声明一个具体资源
    pub fn builder<T, F>(factory: F) -> DescriptorBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::try_builder(move || Ok(factory()))
    }

    /// 以可能失败的构造函数声明一个具体资源
    pub fn try_builder<T, F>(factory: F) -> DescriptorBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || factory().map(Instance::from_value));
        DescriptorBuilder {
            descriptor: Self::empty(TypeKey::of::<T>(), Some(factory)),
            _marker: PhantomData,
        }
    }

    /// 声明一个不可实例化的接口类型
    pub fn abstract_type<T: ?Sized + 'static>() -> Self {
        Self::abstract_type_of(TypeKey::of::<T>())
    }

    /// 以类型标识声明接口类型
    pub fn abstract_type_of(key: TypeKey) -> Self {
        Self::empty(key, None)
    }

    /// 资源类型
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// 是否可以实例化
    pub fn is_constructible(&self) -> bool {
        self.factory.is_some()
    }

    /// 创建实例
    pub fn instantiate(&self) -> Result<Instance, BoxError> {
        match &self.factory {
            Some(factory) => factory(),
            None => Err(format!("{} 不可实例化", self.key).into()),
        }
    }

    /// 依赖字段
    pub fn dependency_fields(&self) -> &[DependencyField] {
        &self.fields
    }

    /// 初始化方法
    pub fn post_construct(&self) -> Option<&LifecycleMethod> {
        self.post_construct.as_ref()
    }

    /// 销毁方法
    pub fn pre_destroy(&self) -> Option<&LifecycleMethod> {
        self.pre_destroy.as_ref()
    }

    /// 指定阶段的生命周期方法
    pub fn lifecycle_method(&self, phase: Phase) -> Option<&LifecycleMethod> {
        match phase {
            Phase::PostConstruct => self.post_construct(),
            Phase::PreDestroy => self.pre_destroy(),
        }
    }

    /// 可赋值的接口类型
    pub fn assignables(&self) -> &[Assignable] {
        &self.assignables
    }

    /// 是否可以赋值给 `key`
    pub fn is_assignable_to(&self, key: &TypeKey) -> bool {
        is_assignable(key, &self.key, &self.assignables)
    }

    /// 是否声明为切面处理器
    pub fn is_aspect_handler(&self) -> bool {
        self.aspect_handler.is_some()
    }

    /// 以切面处理器的视角查看实例
    pub fn aspect_handler(&self, instance: &Instance) -> Option<Arc<dyn AspectHandler>> {
        self.aspect_handler
            .as_ref()
            .and_then(|view| view(instance))
    }

    /// 切面装饰器
    pub fn advisor(&self) -> Option<Advisor> {
        self.advisor.clone()
    }

    /// 按注入选项过滤字段和生命周期方法
    ///
    /// 标记不在选项中的字段与方法被视为未声明。
    pub fn filtered(&self, options: &InjectionOptions) -> Self {
        let mut descriptor = self.clone();
        descriptor
            .fields
            .retain(|field| options.is_resource_marker(field.marker()));
        descriptor.post_construct = self
            .post_construct
            .clone()
            .filter(|method| options.is_post_construct_marker(method.marker()));
        descriptor.pre_destroy = self
            .pre_destroy
            .clone()
            .filter(|method| options.is_pre_destroy_marker(method.marker()));
        descriptor
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("key", &self.key)
            .field("constructible", &self.is_constructible())
            .field("fields", &self.fields)
            .field("post_construct", &self.post_construct)
            .field("pre_destroy", &self.pre_destroy)
            .field("assignables", &self.assignables)
            .field("aspect_handler", &self.is_aspect_handler())
            .finish()
    }
}

/// 类型化的描述符构建器
pub struct DescriptorBuilder<T> {
    descriptor: Descriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> DescriptorBuilder<T> {
    /// 声明依赖字段，使用默认资源标记
    pub fn field<V, F>(self, name: &'static str, accessor: F) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
        F: Fn(&T) -> &Inject<V> + Send + Sync + 'static,
    {
        self.field_marked(name, DEFAULT_RESOURCE_MARKER, accessor)
    }

    /// 声明带指定标记的依赖字段
    pub fn field_marked<V, F>(mut self, name: &'static str, marker: &str, accessor: F) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
        F: Fn(&T) -> &Inject<V> + Send + Sync + 'static,
    {
        self.descriptor
            .fields
            .push(DependencyField::new(name, marker, accessor));
        self
    }

    /// 声明初始化方法，使用默认标记
    pub fn post_construct<P, F>(self, name: &'static str, method: F) -> Self
    where
        P: LifecycleParams,
        F: Fn(&T, P) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.post_construct_marked(name, DEFAULT_POST_CONSTRUCT_MARKER, method)
    }

    /// 声明带指定标记的初始化方法
    pub fn post_construct_marked<P, F>(mut self, name: &'static str, marker: &str, method: F) -> Self
    where
        P: LifecycleParams,
        F: Fn(&T, P) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.descriptor.post_construct = Some(LifecycleMethod::new(name, marker, method));
        self
    }

    /// 声明销毁方法，使用默认标记
    pub fn pre_destroy<P, F>(self, name: &'static str, method: F) -> Self
    where
        P: LifecycleParams,
        F: Fn(&T, P) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.pre_destroy_marked(name, DEFAULT_PRE_DESTROY_MARKER, method)
    }

    /// 声明带指定标记的销毁方法
    pub fn pre_destroy_marked<P, F>(mut self, name: &'static str, marker: &str, method: F) -> Self
    where
        P: LifecycleParams,
        F: Fn(&T, P) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.descriptor.pre_destroy = Some(LifecycleMethod::new(name, marker, method));
        self
    }

    /// 声明资源可以被视为接口类型 `U`
    pub fn assignable_to<U, F>(mut self, cast: F) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    {
        self.descriptor
            .assignables
            .push(Assignable::new::<T, U, F>(cast));
        self
    }

    /// 声明被切面匹配时使用的装饰器
    ///
    /// 装饰器返回的实例在字段注入和查找中替换原始实例，
    /// 只替换声明类型与装饰器返回类型一致的位置。
    pub fn advised_with<U, F>(mut self, decorate: F) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>, Arc<dyn AspectHandler>) -> Arc<U> + Send + Sync + 'static,
    {
        let advisor: Advisor = Arc::new(move |target, handler| {
            let target = target.downcast::<T>().ok_or_else(|| {
                DependencyError::type_mismatch(std::any::type_name::<T>(), target.type_name())
            })?;
            Ok(Instance::new(decorate(target, handler)))
        });
        self.descriptor.advisor = Some(advisor);
        self
    }

    /// 完成构建
    pub fn build(self) -> Descriptor {
        self.descriptor
    }
}

impl<T: AspectHandler + 'static> DescriptorBuilder<T> {
    /// 声明资源是切面处理器
    pub fn aspect_handler(mut self) -> Self {
        let view: HandlerView = Arc::new(|instance| {
            instance
                .downcast::<T>()
                .map(|handler| handler as Arc<dyn AspectHandler>)
        });
        self.descriptor.aspect_handler = Some(view);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Store: Send + Sync {
        fn name(&self) -> &str;
    }

    #[derive(Default)]
    struct MemoryStore;

    impl Store for MemoryStore {
        fn name(&self) -> &str {
            "memory"
        }
    }

    #[derive(Default)]
    struct Service {
        store: Inject<dyn Store>,
        started: AtomicUsize,
    }

    fn service_descriptor() -> Descriptor {
        Descriptor::builder(Service::default)
            .field("store", |s: &Service| &s.store)
            .field_marked("legacy", "autowired", |s: &Service| &s.store)
            .post_construct("start", |s: &Service, (store,): (Arc<MemoryStore>,)| {
                assert_eq!(store.name(), "memory");
                s.started.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .pre_destroy_marked("close", "dispose", |_: &Service, ()| Ok(()))
            .build()
    }

    #[test]
    fn test_builder_collects_declarations() {
        let descriptor = service_descriptor();
        assert_eq!(descriptor.key(), TypeKey::of::<Service>());
        assert!(descriptor.is_constructible());
        assert_eq!(descriptor.dependency_fields().len(), 2);
        assert_eq!(
            descriptor.dependency_fields()[0].target(),
            TypeKey::of::<dyn Store>()
        );
        assert_eq!(
            descriptor.post_construct().unwrap().params(),
            &[TypeKey::of::<MemoryStore>()]
        );
        assert!(descriptor.pre_destroy().unwrap().params().is_empty());
    }

    #[test]
    fn test_filtered_by_markers() {
        let filtered = service_descriptor().filtered(&InjectionOptions::default());
        let names: Vec<_> = filtered
            .dependency_fields()
            .iter()
            .map(|field| field.name())
            .collect();
        assert_eq!(names, vec!["store"]);
        assert!(filtered.post_construct().is_some());
        assert!(filtered.pre_destroy().is_none());
    }

    #[test]
    fn test_field_write_and_lifecycle_invoke() {
        let descriptor = service_descriptor();
        let owner = descriptor.instantiate().unwrap();
        let store: Arc<dyn Store> = Arc::new(MemoryStore);

        descriptor.dependency_fields()[0]
            .write(&owner, &Instance::new(store))
            .unwrap();
        let service = owner.downcast::<Service>().unwrap();
        assert_eq!(service.store.require().unwrap().name(), "memory");

        let method = descriptor.post_construct().unwrap();
        method
            .invoke(&owner, &[Instance::from_value(MemoryStore)])
            .unwrap();
        assert_eq!(service.started.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wrong_argument_type_is_reported() {
        let descriptor = service_descriptor();
        let owner = descriptor.instantiate().unwrap();
        let method = descriptor.post_construct().unwrap();

        assert!(method.invoke(&owner, &[Instance::from_value(1_u8)]).is_err());
        assert!(method.invoke(&owner, &[]).is_err());
    }

    #[test]
    fn test_abstract_type_is_not_constructible() {
        let descriptor = Descriptor::abstract_type::<dyn Store>();
        assert!(!descriptor.is_constructible());
        assert!(descriptor.instantiate().is_err());
    }

    #[test]
    fn test_failing_factory() {
        let descriptor = Descriptor::try_builder::<MemoryStore, _>(|| Err("no disk".into())).build();
        assert!(descriptor.is_constructible());
        assert!(descriptor.instantiate().is_err());
    }

    #[test]
    fn test_assignable_to_interface() {
        let descriptor = Descriptor::builder(|| MemoryStore)
            .assignable_to(|it: Arc<MemoryStore>| it as Arc<dyn Store>)
            .build();
        assert!(descriptor.is_assignable_to(&TypeKey::of::<dyn Store>()));
        assert!(descriptor.is_assignable_to(&TypeKey::of::<MemoryStore>()));
        assert!(!descriptor.is_assignable_to(&TypeKey::of::<Service>()));
    }
}
