use std::{
    sync::{mpsc, Arc, Mutex},
    thread,
    time::Duration,
};

use futures::executor::block_on;
use keystone_di::{
    Arguments, Component, Container, ContainerError, ContainerOptions, Dependency, DynError, Lazy,
    Metadata, Provider, RegisterError, RegisterOptions, ResolveError, Scope, Token,
};

/// Records teardown order, registered as value under "journal"
#[derive(Default)]
struct Journal(Mutex<Vec<String>>);
impl Journal {
    fn write(&self, entry: impl Into<String>) {
        if let Ok(mut entries) = self.0.lock() {
            entries.push(entry.into());
        }
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().map(|entries| entries.clone()).unwrap_or_default()
    }
}

struct Pool {
    journal: Arc<Journal>,
}
impl Component for Pool {
    fn metadata() -> Metadata<Self> {
        Metadata::<Self>::new()
            .param::<Arc<Journal>>("journal")
            .pre_destroy("drain", |this| {
                this.journal.write("pool");
                Ok(())
            })
    }

    fn construct(args: &mut Arguments) -> Result<Self, DynError> {
        Ok(Pool {
            journal: args.next()?,
        })
    }
}

struct Repository {
    journal: Arc<Journal>,
    #[allow(dead_code)]
    pool: Arc<Pool>,
}
impl Component for Repository {
    fn metadata() -> Metadata<Self> {
        Metadata::<Self>::new()
            .param::<Arc<Journal>>("journal")
            .param::<Arc<Pool>>(Token::of::<Pool>())
            .pre_destroy("close", |this| {
                this.journal.write("repository");
                Ok(())
            })
            .pre_destroy_async("flush", |this: Arc<Repository>| async move {
                this.journal.write("repository flushed");
                Ok::<(), DynError>(())
            })
    }

    fn construct(args: &mut Arguments) -> Result<Self, DynError> {
        Ok(Repository {
            journal: args.next()?,
            pool: args.next()?,
        })
    }
}

struct Broken;
impl Component for Broken {
    fn metadata() -> Metadata<Self> {
        Metadata::<Self>::new().pre_destroy("explode", |_| Err("still in use".into()))
    }

    fn construct(_: &mut Arguments) -> Result<Self, DynError> {
        Ok(Broken)
    }
}

fn root() -> (Container, Arc<Journal>) {
    let container = Container::with_options(
        ContainerOptions::named("root").with_default_scope(Scope::Singleton),
    );
    container.register_value("journal", Journal::default()).unwrap();
    let journal = container.resolve_as::<Journal>("journal").unwrap();
    (container, journal)
}

#[test]
fn child_registrations_do_not_leak_into_the_parent() {
    let (root, _) = root();
    root.register_value("greeting", "hello".to_string()).unwrap();

    let child = root.create_child(ContainerOptions::named("child")).unwrap();
    child.register_value("greeting", "howdy".to_string()).unwrap();
    child.register_value("only-child", 1_u8).unwrap();

    assert_eq!(*child.resolve_as::<String>("greeting").unwrap(), "howdy");
    assert_eq!(*root.resolve_as::<String>("greeting").unwrap(), "hello");
    assert!(!root.has("only-child"));
    assert!(child.has("journal"));
    assert!(!child.has_local("journal"));

    let services = child.services();
    assert!(services.contains(&Token::name("only-child")));
    assert!(services.contains(&Token::name("journal")));
    assert_eq!(child.local_services().len(), 2);
}

#[test]
fn parent_singletons_are_shared_with_children() {
    let (root, _) = root();
    root.bind_type::<Pool>().to_self().unwrap().register().unwrap();
    let first = root.create_child(ContainerOptions::default()).unwrap();
    let second = root.create_child(ContainerOptions::default()).unwrap();

    let pool = first.get::<Pool>().unwrap();
    assert!(Arc::ptr_eq(&pool, &second.get::<Pool>().unwrap()));
    assert!(Arc::ptr_eq(&pool, &root.get::<Pool>().unwrap()));
    assert_eq!(root.instance_stats(Token::of::<Pool>()).unwrap().access_count, 3);
    assert!(first.instance_stats(Token::of::<Pool>()).is_none());
}

#[test]
fn singletons_resolve_dependencies_from_their_owner() {
    let (root, root_journal) = root();
    root.bind_type::<Pool>().to_self().unwrap().register().unwrap();

    let child = root.create_child(ContainerOptions::default()).unwrap();
    child.register_value("journal", Journal::default()).unwrap();

    let pool = child.get::<Pool>().unwrap();
    assert!(Arc::ptr_eq(&pool.journal, &root_journal));
}

#[test]
fn transients_resolve_dependencies_from_the_requester() {
    let (root, root_journal) = root();
    root.bind_type::<Pool>().to_self().unwrap().in_transient_scope().unwrap();

    let child = root.create_child(ContainerOptions::default()).unwrap();
    child.register_value("journal", Journal::default()).unwrap();

    let pool = child.get::<Pool>().unwrap();
    assert!(!Arc::ptr_eq(&pool.journal, &root_journal));
}

#[test]
fn child_singletons_stay_in_the_child() {
    let (root, _) = root();
    let child = root.create_child(ContainerOptions::default()).unwrap();
    child.bind_type::<Pool>().to_self().unwrap().register().unwrap();

    let pool = child.get::<Pool>().unwrap();
    assert!(Arc::ptr_eq(&pool, &child.get::<Pool>().unwrap()));
    assert!(matches!(
        root.get::<Pool>(),
        Err(ResolveError::ServiceNotFound(_))
    ));
}

#[test]
fn dispose_runs_hooks_once_newest_first() {
    let (root, journal) = root();
    root.bind_type::<Pool>().to_self().unwrap().register().unwrap();
    root.bind_type::<Repository>().to_self().unwrap().register().unwrap();
    let _ = root.get::<Repository>().unwrap();

    block_on(root.dispose()).unwrap();
    assert_eq!(
        journal.entries(),
        vec!["repository", "repository flushed", "pool"]
    );

    block_on(root.dispose()).unwrap();
    assert_eq!(journal.entries().len(), 3);
    assert!(root.instance_stats(Token::of::<Pool>()).unwrap().disposed);
}

#[test]
fn dispose_tears_down_children_first() {
    let (root, journal) = root();
    root.bind_type::<Pool>().to_self().unwrap().register().unwrap();
    let _ = root.get::<Pool>().unwrap();

    let child = root.create_child(ContainerOptions::named("request")).unwrap();
    child.bind_type::<Repository>().to_self().unwrap().register().unwrap();
    let _ = child.get::<Repository>().unwrap();

    block_on(root.dispose()).unwrap();
    assert!(child.is_disposed());
    assert_eq!(
        journal.entries(),
        vec!["repository", "repository flushed", "pool"]
    );
}

#[test]
fn disposed_containers_refuse_work() {
    let (root, _) = root();
    let child = root.create_child(ContainerOptions::default()).unwrap();
    block_on(root.dispose()).unwrap();

    for container in [&root, &child] {
        assert!(matches!(
            container.resolve("journal"),
            Err(ResolveError::Container(ContainerError::Disposed { .. }))
        ));
        assert!(matches!(
            container.register_value("late", 1_u8),
            Err(RegisterError::Container(ContainerError::Disposed { .. }))
        ));
        assert!(container.unbind("journal").is_err());
    }
    assert!(root.services().is_empty());
}

#[test]
fn failing_hooks_do_not_stop_disposal() {
    let (root, journal) = root();
    root.bind_type::<Pool>().to_self().unwrap().register().unwrap();
    root.bind_type::<Broken>().to_self().unwrap().register().unwrap();
    let _ = root.get::<Pool>().unwrap();
    let _ = root.get::<Broken>().unwrap();

    let errors = block_on(root.dispose()).unwrap_err();
    assert_eq!(errors.errors.len(), 1);
    assert_eq!(errors.errors[0].hook, "explode");
    assert_eq!(errors.errors[0].token, Token::of::<Broken>());
    assert_eq!(journal.entries(), vec!["pool"]);
    assert!(root.is_disposed());

    // The failure is reported once
    block_on(root.dispose()).unwrap();
}

#[test]
fn replaced_singletons_are_destroyed_with_the_container() {
    let (root, journal) = root();
    root.bind("pool").to::<Pool>().register().unwrap();
    let old = root.resolve_as::<Pool>("pool").unwrap();

    // Overwriting retires the cached instance, the next resolve builds a new one
    root.bind("pool").to::<Pool>().register().unwrap();
    let new = root.resolve_as::<Pool>("pool").unwrap();
    assert!(!Arc::ptr_eq(&old, &new));
    assert!(journal.entries().is_empty());

    assert!(root.unbind("pool").unwrap());
    assert!(!root.has("pool"));

    block_on(root.dispose()).unwrap();
    assert_eq!(journal.entries(), vec!["pool", "pool"]);
}

struct Watcher {
    pool: Lazy<Pool>,
}
impl Component for Watcher {
    fn metadata() -> Metadata<Self> {
        Metadata::<Self>::new().param::<Lazy<Pool>>(Token::of::<Pool>())
    }

    fn construct(args: &mut Arguments) -> Result<Self, DynError> {
        Ok(Watcher { pool: args.next()? })
    }
}

#[test]
fn lazy_handles_fail_after_disposal() {
    let (root, _) = root();
    root.bind_type::<Pool>().to_self().unwrap().register().unwrap();
    root.bind_type::<Watcher>().to_self().unwrap().register().unwrap();

    let watcher = root.get::<Watcher>().unwrap();
    block_on(root.dispose()).unwrap();

    assert!(matches!(
        watcher.pool.get(),
        Err(ResolveError::Container(ContainerError::Disposed { .. }))
    ));
}

#[test]
fn dispose_waits_for_running_resolutions() {
    let (root, journal) = root();
    root.bind_type::<Pool>().to_self().unwrap().register().unwrap();

    let (started, wait_for_start) = mpsc::channel();
    let started = Mutex::new(started);
    root.register(
        "session",
        Provider::factory(
            vec![Dependency::required(Token::of::<Pool>())],
            move |args: &mut Arguments| {
                let pool: Arc<Pool> = args.next()?;
                if let Ok(started) = started.lock() {
                    let _ = started.send(());
                }
                thread::sleep(Duration::from_millis(50));
                // Entries written by pre-destroy hooks so far
                Ok(pool.journal.entries().len())
            },
        ),
        RegisterOptions::scoped(Scope::Transient),
    )
    .unwrap();

    thread::scope(|scope| {
        let resolving = scope.spawn(|| root.resolve_as::<usize>("session"));
        wait_for_start.recv().unwrap();
        block_on(root.dispose()).unwrap();

        let drained_during_resolve = resolving.join().unwrap().unwrap();
        assert_eq!(*drained_during_resolve, 0);
    });

    assert_eq!(journal.entries(), vec!["pool"]);
    assert!(matches!(
        root.resolve("session"),
        Err(ResolveError::Container(ContainerError::Disposed { .. }))
    ));
}
