//! 注入应用端到端测试：资源图、生命周期顺序、失败报告与关闭

use di_abstractions::{AspectHandler, Descriptor, Inject};
use di_impl::{InjectError, InjectedApp, InjectedResource, ResourceCatalog};
use infrastructure_common::{DependencyError, InjectionOptions, Phase, TypeKey};
use std::sync::{Arc, Mutex};

/// 记录生命周期方法的调用顺序
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, entry: impl Into<String>) {
        if let Ok(mut entries) = self.0.lock() {
            entries.push(entry.into());
        }
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().map(|entries| entries.clone()).unwrap_or_default()
    }
}

fn keys(resources: &[InjectedResource]) -> Vec<TypeKey> {
    resources.iter().map(InjectedResource::key).collect()
}

#[derive(Default)]
struct A {
    b: Inject<B>,
}

#[derive(Default)]
struct B;

#[derive(Default)]
struct C;

#[test]
fn test_field_wiring_without_lifecycle() {
    let catalog = ResourceCatalog::new()
        .with(Descriptor::builder(|| B).build())
        .with(Descriptor::builder(A::default).field("b", |a: &A| &a.b).build());

    let app = InjectedApp::builder(catalog)
        .resource_type::<B>()
        .resource_type::<A>()
        .build()
        .unwrap();

    let keys: Vec<TypeKey> = app.resources().keys().copied().collect();
    assert_eq!(keys, vec![TypeKey::of::<B>(), TypeKey::of::<A>()]);
    assert!(app.pre_destroy_order().is_empty());

    let a = app.get_object::<A>().unwrap();
    let b = app.get_object::<B>().unwrap();
    assert!(Arc::ptr_eq(&a.b.require().unwrap(), &b));

    app.shutdown().unwrap();
    assert!(app.is_shutdown());
}

#[test]
fn test_lifecycle_parameter_is_discovered_and_runs_first() {
    let journal = Journal::default();
    let (ja, jb) = (journal.clone(), journal.clone());
    let catalog = ResourceCatalog::new()
        .with(
            Descriptor::builder(A::default)
                .post_construct("start", move |_: &A, (_b,): (Arc<B>,)| {
                    ja.record("A");
                    Ok(())
                })
                .build(),
        )
        .with(
            Descriptor::builder(|| B)
                .post_construct("start", move |_: &B, ()| {
                    jb.record("B");
                    Ok(())
                })
                .build(),
        );

    let app = InjectedApp::builder(catalog)
        .resource_type::<A>()
        .build()
        .unwrap();

    assert!(app.get_resource(&TypeKey::of::<B>()).is_some());
    assert_eq!(journal.entries(), vec!["B", "A"]);
    assert!(app.local_resources().values().all(InjectedResource::is_initialized));
}

#[test]
fn test_transitive_chain_is_ordered() {
    let journal = Journal::default();
    let (ja, jb, jc) = (journal.clone(), journal.clone(), journal.clone());
    let catalog = ResourceCatalog::new()
        .with(
            Descriptor::builder(A::default)
                .post_construct("start", move |_: &A, (_b,): (Arc<B>,)| {
                    ja.record("A");
                    Ok(())
                })
                .pre_destroy("stop", |_: &A, ()| Ok(()))
                .build(),
        )
        .with(
            Descriptor::builder(|| B)
                .post_construct("start", move |_: &B, (_c,): (Arc<C>,)| {
                    jb.record("B");
                    Ok(())
                })
                .pre_destroy("stop", |_: &B, (_a,): (Arc<A>,)| Ok(()))
                .build(),
        )
        .with(
            Descriptor::builder(|| C)
                .post_construct("start", move |_: &C, ()| {
                    jc.record("C");
                    Ok(())
                })
                .build(),
        );

    let app = InjectedApp::builder(catalog)
        .resource_type::<A>()
        .resource_type::<C>()
        .resource_type::<B>()
        .build()
        .unwrap();

    assert_eq!(journal.entries(), vec!["C", "B", "A"]);
    assert_eq!(
        keys(&app.pre_destroy_order()),
        vec![TypeKey::of::<A>(), TypeKey::of::<B>()]
    );
}

#[test]
fn test_mutual_lifecycle_parameters_are_rejected() {
    let catalog = ResourceCatalog::new()
        .with(
            Descriptor::builder(A::default)
                .post_construct("start", |_: &A, (_b,): (Arc<B>,)| Ok(()))
                .build(),
        )
        .with(
            Descriptor::builder(|| B)
                .post_construct("start", |_: &B, (_a,): (Arc<A>,)| Ok(()))
                .build(),
        );

    let error = InjectedApp::builder(catalog)
        .resource_type::<A>()
        .resource_type::<B>()
        .build()
        .unwrap_err();

    let message = error.to_string();
    assert!(message.contains(TypeKey::of::<A>().name()));
    assert!(message.contains(TypeKey::of::<B>().name()));
    match error {
        InjectError::CircularLifecycleDependency { phase, chain } => {
            assert_eq!(phase, Phase::PostConstruct);
            assert_eq!(
                chain,
                vec![TypeKey::of::<A>(), TypeKey::of::<B>(), TypeKey::of::<A>()]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_pre_destroy_cycle_is_rejected() {
    let catalog = ResourceCatalog::new().with(
        Descriptor::builder(|| C)
            .pre_destroy("stop", |_: &C, (_c,): (Arc<C>,)| Ok(()))
            .build(),
    );

    let result = InjectedApp::builder(catalog).resource_type::<C>().build();
    assert!(matches!(
        result,
        Err(InjectError::CircularLifecycleDependency {
            phase: Phase::PreDestroy,
            ..
        })
    ));
}

#[derive(Default)]
struct W;

#[derive(Default)]
struct X;

#[derive(Default)]
struct Y;

#[test]
fn test_post_construct_failure_reports_progress() {
    let journal = Journal::default();
    let (jw, jy) = (journal.clone(), journal.clone());
    let catalog = ResourceCatalog::new()
        .with(
            Descriptor::builder(|| W)
                .post_construct("start", move |_: &W, ()| {
                    jw.record("W");
                    Ok(())
                })
                .build(),
        )
        .with(
            Descriptor::builder(|| X)
                .post_construct("start", |_: &X, ()| {
                    Err(anyhow::anyhow!("端口被占用").into())
                })
                .build(),
        )
        .with(
            Descriptor::builder(|| Y)
                .post_construct("start", move |_: &Y, ()| {
                    jy.record("Y");
                    Ok(())
                })
                .build(),
        );

    let error = InjectedApp::builder(catalog)
        .resource_type::<W>()
        .resource_type::<X>()
        .resource_type::<Y>()
        .build()
        .unwrap_err();

    let phase_error = error.as_phase_error().unwrap();
    assert_eq!(phase_error.phase, Phase::PostConstruct);
    assert_eq!(phase_error.failed.key(), TypeKey::of::<X>());
    assert!(phase_error.source.to_string().contains("端口被占用"));
    assert_eq!(keys(&phase_error.completed), vec![TypeKey::of::<W>()]);
    assert_eq!(
        keys(&phase_error.remaining),
        vec![TypeKey::of::<X>(), TypeKey::of::<Y>()]
    );
    assert!(phase_error.completed[0].is_initialized());
    assert!(!phase_error.remaining[1].is_initialized());
    assert_eq!(journal.entries(), vec!["W"]);
}

#[test]
fn test_shutdown_runs_once_and_resumes_after_failure() {
    let journal = Journal::default();
    let (jw, jy) = (journal.clone(), journal.clone());
    let catalog = ResourceCatalog::new()
        .with(
            Descriptor::builder(|| W)
                .pre_destroy("stop", move |_: &W, ()| {
                    jw.record("W");
                    Ok(())
                })
                .build(),
        )
        .with(
            Descriptor::builder(|| X)
                .pre_destroy("stop", |_: &X, ()| Err("连接未释放".into()))
                .build(),
        )
        .with(
            Descriptor::builder(|| Y)
                .pre_destroy("stop", move |_: &Y, ()| {
                    jy.record("Y");
                    Ok(())
                })
                .build(),
        );
    let app = InjectedApp::builder(catalog)
        .resource_type::<W>()
        .resource_type::<X>()
        .resource_type::<Y>()
        .build()
        .unwrap();

    let error = app.shutdown().unwrap_err();
    let phase_error = error.as_phase_error().unwrap();
    assert_eq!(phase_error.phase, Phase::PreDestroy);
    assert_eq!(keys(&phase_error.completed), vec![TypeKey::of::<W>()]);
    assert_eq!(
        keys(&phase_error.remaining),
        vec![TypeKey::of::<X>(), TypeKey::of::<Y>()]
    );
    assert!(!app.is_shutdown());
    assert_eq!(keys(&app.pre_destroy_order()), vec![TypeKey::of::<Y>()]);

    app.shutdown().unwrap();
    app.shutdown().unwrap();
    assert_eq!(journal.entries(), vec!["W", "Y"]);
    assert!(app.is_shutdown());
    assert!(!app.get_resource(&TypeKey::of::<X>()).unwrap().is_destroyed());
}

trait Store: Send + Sync {
    fn label(&self) -> &'static str;
}

#[derive(Default)]
struct MemoryStore;

impl Store for MemoryStore {
    fn label(&self) -> &'static str {
        "memory"
    }
}

#[derive(Default)]
struct DiskStore;

impl Store for DiskStore {
    fn label(&self) -> &'static str {
        "disk"
    }
}

fn stores() -> ResourceCatalog {
    ResourceCatalog::new()
        .with(
            Descriptor::builder(|| MemoryStore)
                .assignable_to(|it: Arc<MemoryStore>| it as Arc<dyn Store>)
                .build(),
        )
        .with(
            Descriptor::builder(|| DiskStore)
                .assignable_to(|it: Arc<DiskStore>| it as Arc<dyn Store>)
                .build(),
        )
}

#[test]
fn test_abstract_root_is_skipped() {
    let app = InjectedApp::builder(stores())
        .resource_type::<dyn Store>()
        .resource_type::<DiskStore>()
        .build()
        .unwrap();

    assert!(app.get_resource(&TypeKey::of::<dyn Store>()).is_none());
    assert_eq!(app.resources().len(), 1);
}

#[test]
fn test_get_object_prefers_exact_then_map_order() {
    let app = InjectedApp::builder(stores())
        .resource_type::<DiskStore>()
        .resource_type::<MemoryStore>()
        .build()
        .unwrap();

    assert_eq!(app.get_object::<dyn Store>().unwrap().label(), "disk");
    assert_eq!(app.get_object::<MemoryStore>().unwrap().label(), "memory");
    assert!(app.get_object::<A>().is_none());
    assert!(app.get_instance(&TypeKey::of::<dyn Store>()).is_some());
}

#[derive(Default)]
struct Reporter {
    label: Mutex<String>,
}

#[test]
fn test_interface_lifecycle_parameter() {
    let catalog = stores().with(
        Descriptor::builder(Reporter::default)
            .post_construct("start", |r: &Reporter, (store,): (Arc<dyn Store>,)| {
                if let Ok(mut label) = r.label.lock() {
                    *label = store.label().to_string();
                }
                Ok(())
            })
            .build(),
    );

    let app = InjectedApp::builder(catalog)
        .resource_type::<MemoryStore>()
        .resource_type::<Reporter>()
        .build()
        .unwrap();

    let reporter = app.get_object::<Reporter>().unwrap();
    assert_eq!(*reporter.label.lock().unwrap(), "memory");
}

#[test]
fn test_unresolvable_lifecycle_parameter_fails_build() {
    let catalog = ResourceCatalog::new().with(
        Descriptor::builder(Reporter::default)
            .post_construct("start", |_: &Reporter, (_s,): (Arc<dyn Store>,)| Ok(()))
            .build(),
    );

    let result = InjectedApp::builder(catalog)
        .resource_type::<Reporter>()
        .build();
    assert!(matches!(
        result,
        Err(InjectError::Build(DependencyError::ComponentNotRegistered { .. }))
    ));
}

#[test]
fn test_undeclared_type_fails_build() {
    let result = InjectedApp::builder(ResourceCatalog::new())
        .resource_type::<A>()
        .build();
    assert!(matches!(
        result,
        Err(InjectError::Build(
            DependencyError::DependencyResolutionFailed { .. }
        ))
    ));
}

#[derive(Default)]
struct Legacy {
    store: Inject<dyn Store>,
    started: Mutex<bool>,
}

#[test]
fn test_custom_markers_from_options() {
    let catalog = stores().with(
        Descriptor::builder(Legacy::default)
            .field_marked("store", "autowired", |l: &Legacy| &l.store)
            .post_construct_marked("init", "init", |l: &Legacy, ()| {
                if let Ok(mut started) = l.started.lock() {
                    *started = true;
                }
                Ok(())
            })
            .build(),
    );
    let options = InjectionOptions::from_value(serde_json::json!({
        "resource_markers": ["autowired"],
        "post_construct_markers": ["init"]
    }))
    .unwrap();

    let app = InjectedApp::builder(catalog.clone())
        .options(options)
        .resource_type::<MemoryStore>()
        .resource_type::<Legacy>()
        .build()
        .unwrap();
    let legacy = app.get_object::<Legacy>().unwrap();
    assert_eq!(legacy.store.require().unwrap().label(), "memory");
    assert!(*legacy.started.lock().unwrap());

    let defaults = InjectedApp::builder(catalog)
        .resource_type::<MemoryStore>()
        .resource_type::<Legacy>()
        .build()
        .unwrap();
    let legacy = defaults.get_object::<Legacy>().unwrap();
    assert!(!legacy.store.is_injected());
    assert!(!*legacy.started.lock().unwrap());
}

struct Tagging;

impl AspectHandler for Tagging {
    fn needs_aspect(&self, target: &TypeKey) -> bool {
        target.short_name().ends_with("Store")
    }
}

struct TaggedStore {
    inner: Arc<MemoryStore>,
}

impl Store for TaggedStore {
    fn label(&self) -> &'static str {
        match self.inner.label() {
            "memory" => "tagged-memory",
            _ => "tagged",
        }
    }
}

#[derive(Default)]
struct Archive {
    store: Inject<dyn Store>,
}

#[test]
fn test_field_holds_advised_instance() {
    let catalog = ResourceCatalog::new()
        .with(
            Descriptor::builder(|| MemoryStore)
                .assignable_to(|it: Arc<MemoryStore>| it as Arc<dyn Store>)
                .advised_with(|inner, _handler| Arc::new(TaggedStore { inner }) as Arc<dyn Store>)
                .build(),
        )
        .with(Descriptor::builder(|| Tagging).aspect_handler().build())
        .with(
            Descriptor::builder(Archive::default)
                .field("store", |a: &Archive| &a.store)
                .build(),
        );

    let app = InjectedApp::builder(catalog)
        .resource_type::<Archive>()
        .resource_type::<Tagging>()
        .resource_type::<MemoryStore>()
        .build()
        .unwrap();

    let archive = app.get_object::<Archive>().unwrap();
    assert_eq!(archive.store.require().unwrap().label(), "tagged-memory");

    let resource = app.get_resource(&TypeKey::of::<MemoryStore>()).unwrap();
    let advised = resource.instance().downcast::<dyn Store>().unwrap();
    assert!(Arc::ptr_eq(&advised, &archive.store.require().unwrap()));
    assert_eq!(app.get_object::<dyn Store>().unwrap().label(), "tagged-memory");
}
