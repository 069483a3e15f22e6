use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use autoload::{
    AutoloadConfig, Autoloader, BatchOrigin, BatchReport, Collaborators, Error, MutationBatch,
    MutationSource, MutationSubscription, ObserveOptions,
    test_support::{Fixture, run_async_test},
};
use parking_lot::Mutex;
use tokio::{
    sync::{
        broadcast::Receiver,
        mpsc::{self, UnboundedSender},
    },
    task,
    time::timeout,
};

const ATTR: &str = "data-controller";

fn autoloader(fx: &Fixture) -> Autoloader {
    Autoloader::new(fx.collaborators(), AutoloadConfig::default())
}

async fn next_report(rx: &mut Receiver<BatchReport>) -> BatchReport {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("report in time")
        .expect("report channel open")
}

async fn assert_quiet(rx: &mut Receiver<BatchReport>) {
    let res = timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(res.is_err(), "unexpected batch: {res:?}");
}

/// Fixture with one connected element declaring `value`.
fn seeded(value: &str) -> Fixture {
    let fx = Fixture::new();
    let el = fx.document.create_element("div", &[(ATTR, value)]);
    fx.document.append_child(&fx.document.body(), el);
    fx
}

#[test]
fn enable_waits_for_initial_loads() {
    run_async_test(async {
        let fx = seeded("slow");
        fx.provide("slow_controller");
        let gate = fx.importer.hold("slow_controller");
        let loader = autoloader(&fx);

        let enabling = task::spawn({
            let loader = loader.clone();
            async move { loader.enable().await }
        });
        for _ in 0..10 {
            task::yield_now().await;
        }
        assert!(!enabling.is_finished());
        assert!(fx.registry.registered_names().is_empty());
        assert!(!loader.is_enabled());

        gate.notify_one();
        let report = enabling.await.expect("enable task").expect("enable");
        assert_eq!(report.origin, BatchOrigin::Initial);
        assert_eq!(report.registered(), ["slow"]);
        assert!(loader.is_enabled());
        assert_eq!(fx.document.observer_count(), 1);
    });
}

#[test]
fn initial_failures_do_not_fail_enable() {
    run_async_test(async {
        let fx = seeded("missing ok");
        fx.provide("ok_controller");
        let loader = autoloader(&fx);

        let report = loader.enable().await.expect("enable");

        assert_eq!(report.registered(), ["ok"]);
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].name, "missing");
        assert_eq!(fx.registry.errors().len(), 1);
        assert!(loader.is_enabled());
    });
}

#[test]
fn inserted_element_triggers_one_batch() {
    run_async_test(async {
        let fx = seeded("a");
        fx.provide("a_controller");
        fx.provide("b_controller");
        let loader = autoloader(&fx);
        loader.enable().await.expect("enable");
        let mut rx = loader.reports();

        let el = fx.document.create_element("section", &[(ATTR, "b")]);
        fx.document.append_child(&fx.document.body(), el);
        fx.document.flush();

        let report = next_report(&mut rx).await;
        assert_eq!(report.origin, BatchOrigin::Mutation);
        assert_eq!(report.registered(), ["b"]);
        assert_eq!(fx.registry.registration_count("a"), 1);
        assert_quiet(&mut rx).await;
    });
}

#[test]
fn changed_declaration_reloads_all_names() {
    run_async_test(async {
        let fx = Fixture::new();
        fx.provide("a_controller");
        fx.provide("b_controller");
        let el = fx.document.create_element("div", &[(ATTR, "a")]);
        fx.document.append_child(&fx.document.body(), el.clone());
        let loader = autoloader(&fx);
        loader.enable().await.expect("enable");
        let mut rx = loader.reports();

        fx.document.set_attribute(&el, ATTR, "a b");
        fx.document.flush();

        let report = next_report(&mut rx).await;
        assert_eq!(report.registered(), ["a", "b"]);
        assert_eq!(fx.registry.registration_count("a"), 2);
        assert_eq!(fx.registry.registration_count("b"), 1);
    });
}

#[test]
fn unrelated_mutations_launch_nothing() {
    run_async_test(async {
        let fx = Fixture::new();
        let el = fx.document.create_element("div", &[(ATTR, "a")]);
        fx.document.append_child(&fx.document.body(), el.clone());
        let loader = autoloader(&fx);
        loader.enable().await.expect("enable");
        let mut rx = loader.reports();

        let plain = fx.document.create_element("p", &[]);
        fx.document.append_child(&fx.document.body(), plain.clone());
        fx.document.set_attribute(&plain, "class", "x");
        fx.document.remove_attribute(&el, ATTR);
        assert_eq!(fx.document.flush(), 1);

        assert_quiet(&mut rx).await;
    });
}

#[test]
fn declarations_below_inserted_nodes_are_not_discovered() {
    run_async_test(async {
        let fx = Fixture::new();
        fx.provide("nested_controller");
        let loader = autoloader(&fx);
        loader.enable().await.expect("enable");
        let mut rx = loader.reports();

        let wrapper = fx.document.create_element("div", &[]);
        let nested = fx.document.create_element("span", &[(ATTR, "nested")]);
        fx.document.append_child(&wrapper, nested);
        fx.document.append_child(&fx.document.body(), wrapper);
        fx.document.flush();

        assert_quiet(&mut rx).await;
        assert!(fx.registry.registered_names().is_empty());
    });
}

#[test]
fn disable_stops_mutation_loads() {
    run_async_test(async {
        let fx = Fixture::new();
        fx.provide("b_controller");
        let loader = autoloader(&fx);
        loader.enable().await.expect("enable");
        let mut rx = loader.reports();

        loader.disable();
        assert!(!loader.is_enabled());
        let el = fx.document.create_element("div", &[(ATTR, "b")]);
        fx.document.append_child(&fx.document.body(), el);
        fx.document.flush();

        assert_quiet(&mut rx).await;
        assert!(fx.registry.registered_names().is_empty());
        assert_eq!(fx.document.observer_count(), 0);
    });
}

#[test]
fn disable_async_releases_subscription() {
    run_async_test(async {
        let fx = Fixture::new();
        let loader = autoloader(&fx);
        loader.enable().await.expect("enable");
        assert_eq!(fx.document.observer_count(), 1);

        loader.disable_async().await;

        assert_eq!(fx.document.observer_count(), 0);
        let el = fx.document.create_element("div", &[(ATTR, "b")]);
        fx.document.append_child(&fx.document.body(), el);
        assert_eq!(fx.document.flush(), 0);
    });
}

#[test]
fn enable_twice_keeps_one_subscription() {
    run_async_test(async {
        let fx = seeded("a");
        fx.provide("a_controller");
        let loader = autoloader(&fx);

        loader.enable().await.expect("enable");
        let second = loader.enable().await.expect("enable again");

        assert!(second.outcomes.is_empty());
        assert_eq!(fx.document.observer_count(), 1);
        assert_eq!(fx.registry.registration_count("a"), 1);
    });
}

#[test]
fn enable_after_disable_rediscovers() {
    run_async_test(async {
        let fx = seeded("a");
        fx.provide("a_controller");
        let loader = autoloader(&fx);

        loader.enable().await.expect("enable");
        loader.disable_async().await;
        let report = loader.enable().await.expect("re-enable");

        assert_eq!(report.registered(), ["a"]);
        assert_eq!(fx.registry.registration_count("a"), 2);
        assert_eq!(fx.document.observer_count(), 1);
    });
}

#[test]
fn disable_during_initial_load_skips_subscription() {
    run_async_test(async {
        let fx = seeded("slow");
        fx.provide("slow_controller");
        let gate = fx.importer.hold("slow_controller");
        let loader = autoloader(&fx);

        let enabling = task::spawn({
            let loader = loader.clone();
            async move { loader.enable().await }
        });
        for _ in 0..20 {
            if !fx.importer.requested().is_empty() {
                break;
            }
            task::yield_now().await;
        }
        assert!(!enabling.is_finished());
        loader.disable();
        gate.notify_one();

        let report = enabling.await.expect("enable task").expect("enable");
        assert_eq!(report.registered(), ["slow"]);
        assert!(!loader.is_enabled());
        assert_eq!(fx.document.observer_count(), 0);
    });
}

#[test]
fn in_flight_loads_finish_after_disable() {
    run_async_test(async {
        let fx = Fixture::new();
        fx.provide("late_controller");
        let gate = fx.importer.hold("late_controller");
        let loader = autoloader(&fx);
        loader.enable().await.expect("enable");
        let mut rx = loader.reports();

        let el = fx.document.create_element("div", &[(ATTR, "late")]);
        fx.document.append_child(&fx.document.body(), el);
        fx.document.flush();
        for _ in 0..20 {
            if !fx.importer.requested().is_empty() {
                break;
            }
            task::yield_now().await;
        }
        assert_eq!(fx.importer.requested(), ["late_controller"]);

        loader.disable_async().await;
        gate.notify_one();

        let report = next_report(&mut rx).await;
        assert_eq!(report.registered(), ["late"]);
        assert_eq!(fx.registry.registered_names(), ["late"]);
    });
}

/// Mutation source that refuses every subscription.
struct ClosedSource;

impl MutationSource for ClosedSource {
    fn observe(&self, _options: ObserveOptions) -> autoload::Result<MutationSubscription> {
        Err(Error::Observe("observer unavailable".into()))
    }
}

#[test]
fn subscription_failure_surfaces_after_initial_load() {
    run_async_test(async {
        let fx = seeded("a");
        fx.provide("a_controller");
        let collaborators = Collaborators {
            mutations: Arc::new(ClosedSource),
            ..fx.collaborators()
        };
        let loader = Autoloader::new(collaborators, AutoloadConfig::default());

        let err = loader.enable().await.expect_err("subscribe fails");

        assert!(matches!(err, Error::Observe(_)));
        assert_eq!(fx.registry.registered_names(), ["a"]);
        assert!(!loader.is_enabled());
    });
}

/// Mutation source with scripted subscription behavior.
#[derive(Default)]
struct ScriptedSource {
    /// Number of `observe` calls.
    observed: AtomicUsize,
    /// Drop the sender immediately so the subscription is closed on arrival.
    close_on_observe: bool,
    /// Autoloader to disable from inside `observe`.
    disable_on_observe: Mutex<Option<Autoloader>>,
    /// Senders kept alive for open subscriptions.
    senders: Mutex<Vec<UnboundedSender<MutationBatch>>>,
}

impl MutationSource for ScriptedSource {
    fn observe(&self, _options: ObserveOptions) -> autoload::Result<MutationSubscription> {
        self.observed.fetch_add(1, Ordering::SeqCst);
        if let Some(loader) = self.disable_on_observe.lock().take() {
            loader.disable();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.close_on_observe {
            self.senders.lock().push(tx);
        }
        Ok(MutationSubscription::new(rx))
    }
}

fn scripted(fx: &Fixture, source: &Arc<ScriptedSource>) -> Autoloader {
    let collaborators = Collaborators {
        mutations: source.clone(),
        ..fx.collaborators()
    };
    Autoloader::new(collaborators, AutoloadConfig::default())
}

#[test]
fn closed_source_disables_and_enable_resubscribes() {
    run_async_test(async {
        let fx = seeded("a");
        fx.provide("a_controller");
        let source = Arc::new(ScriptedSource {
            close_on_observe: true,
            ..ScriptedSource::default()
        });
        let loader = scripted(&fx, &source);

        loader.enable().await.expect("enable");
        for _ in 0..10 {
            task::yield_now().await;
        }
        assert!(!loader.is_enabled());

        let report = loader.enable().await.expect("re-enable");
        assert_eq!(report.registered(), ["a"]);
        assert_eq!(source.observed.load(Ordering::SeqCst), 2);
        assert_eq!(fx.registry.registration_count("a"), 2);
    });
}

#[test]
fn disable_while_subscribing_drops_the_subscription() {
    run_async_test(async {
        let fx = seeded("a");
        fx.provide("a_controller");
        let source = Arc::new(ScriptedSource::default());
        let loader = scripted(&fx, &source);
        *source.disable_on_observe.lock() = Some(loader.clone());

        let report = loader.enable().await.expect("enable");

        assert_eq!(report.registered(), ["a"]);
        assert_eq!(source.observed.load(Ordering::SeqCst), 1);
        assert!(!loader.is_enabled());
        let senders = source.senders.lock();
        assert_eq!(senders.len(), 1);
        assert!(senders[0].is_closed());
    });
}
