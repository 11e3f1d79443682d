//! Layered Metadata Cache
//!
//! Fronts the [`BackendClient`] with the persistent [`MetadataStore`] and coalesces concurrent
//! identical requests.
//!
//! ## Invariants
//!
//! 1. **Single flight**: at most one outstanding backend fetch per key. The in-flight entry is
//!    recorded before the shared future is first polled and removed when the fetch settles.
//! 2. **One write per fetch**: a successful fetch updates the store exactly once, however many
//!    callers waited on it. A fetch detached by [`MetadataCache::clear`] never writes.
//! 3. **Failures are `None`**: a rejected fetch is logged, reported to every waiter as `None`,
//!    and the next call retries.

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::backend::{BackendClient, FeatureModel, GraphModel, GraphStructure};
use crate::config::EngineConfig;
use crate::error::{BackendError, BackendResult};
use crate::store::MetadataStore;

const GRAPHS_KEY: &str = "acumate.graphs";
const FEATURES_KEY: &str = "acumate.features";
const STRUCTURE_KEY_PREFIX: &str = "acumate.graphStructure:";

type Outcome<T> = Result<Option<Rc<T>>, BackendError>;
type SharedFetch<T> = Shared<LocalBoxFuture<'static, Outcome<T>>>;

/// In-flight fetches of one metadata kind, keyed by request key. Each entry carries the
/// generation it was started under so a fetch detached by `clear` cannot touch its successor.
struct SingleFlight<T> {
    pending: Rc<RefCell<HashMap<String, (u64, SharedFetch<T>)>>>,
    generation: Cell<u64>,
}

impl<T: 'static> SingleFlight<T> {
    fn new() -> Self {
        Self {
            pending: Rc::new(RefCell::new(HashMap::new())),
            generation: Cell::new(0),
        }
    }

    fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Join the fetch already running for `key`, or start one with `start`. `on_success` runs
    /// only if the fetch is still the registered one when it settles.
    fn join_or_start(
        &self,
        key: &str,
        start: impl FnOnce() -> LocalBoxFuture<'static, BackendResult<Option<T>>>,
        on_success: impl FnOnce(&T) + 'static,
    ) -> SharedFetch<T> {
        if let Some((_, existing)) = self.pending.borrow().get(key) {
            tracing::trace!(key, "joining in-flight metadata fetch");
            return existing.clone();
        }

        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let fetch = start();
        let pending = Rc::downgrade(&self.pending);
        let owned_key = key.to_string();
        let shared = async move {
            let result = fetch.await;
            let current = settle(&pending, &owned_key, generation);
            let outcome = result.map(|value| value.map(Rc::new));
            match &outcome {
                Ok(Some(value)) if current => on_success(&**value),
                Ok(Some(_)) => tracing::debug!(key = %owned_key, "detached metadata fetch settled"),
                _ => {}
            }
            outcome
        }
        .boxed_local()
        .shared();

        self.pending
            .borrow_mut()
            .insert(key.to_string(), (generation, shared.clone()));
        shared
    }

    fn clear(&self) {
        self.pending.borrow_mut().clear();
    }
}

/// Drop the entry for `key` if it still belongs to `generation`. Returns whether it did.
fn settle<T>(
    pending: &Weak<RefCell<HashMap<String, (u64, SharedFetch<T>)>>>,
    key: &str,
    generation: u64,
) -> bool {
    let Some(pending) = pending.upgrade() else {
        return false;
    };
    let mut pending = pending.borrow_mut();
    match pending.get(key) {
        Some((registered, _)) if *registered == generation => {
            pending.remove(key);
            true
        }
        _ => false,
    }
}

pub struct MetadataCache {
    client: Rc<dyn BackendClient>,
    store: Rc<dyn MetadataStore>,
    use_cache: bool,
    use_backend: bool,
    graphs: SingleFlight<Vec<GraphModel>>,
    features: SingleFlight<Vec<FeatureModel>>,
    structures: SingleFlight<GraphStructure>,
}

impl MetadataCache {
    pub fn new(
        config: &EngineConfig,
        client: Rc<dyn BackendClient>,
        store: Rc<dyn MetadataStore>,
    ) -> Self {
        Self {
            client,
            store,
            use_cache: config.use_cache,
            use_backend: config.use_backend,
            graphs: SingleFlight::new(),
            features: SingleFlight::new(),
            structures: SingleFlight::new(),
        }
    }

    pub async fn get_graphs(&self) -> Option<Rc<Vec<GraphModel>>> {
        let client = Rc::clone(&self.client);
        self.layered_fetch(&self.graphs, GRAPHS_KEY, GRAPHS_KEY.to_string(), move || {
            client.get_graphs()
        })
        .await
    }

    pub async fn get_graph_structure(&self, graph_name: &str) -> Option<Rc<GraphStructure>> {
        let graph_name = graph_name.trim();
        if graph_name.is_empty() {
            return None;
        }
        let client = Rc::clone(&self.client);
        let name = graph_name.to_string();
        self.layered_fetch(
            &self.structures,
            graph_name,
            structure_key(graph_name),
            move || client.get_graph_structure(&name),
        )
        .await
    }

    pub async fn get_features(&self) -> Option<Rc<Vec<FeatureModel>>> {
        let client = Rc::clone(&self.client);
        self.layered_fetch(&self.features, FEATURES_KEY, FEATURES_KEY.to_string(), move || {
            client.get_features()
        })
        .await
    }

    pub fn prime_graphs(&self, graphs: &[GraphModel]) {
        self.prime(GRAPHS_KEY, graphs);
    }

    pub fn prime_graph_structure(&self, graph_name: &str, structure: &GraphStructure) {
        self.prime(&structure_key(graph_name.trim()), structure);
    }

    pub fn prime_features(&self, features: &[FeatureModel]) {
        self.prime(FEATURES_KEY, features);
    }

    /// Forget persisted entries for the given graphs plus the graph and feature lists, and
    /// detach any in-flight fetches.
    pub fn clear(&self, graph_names: &[&str]) {
        self.store.remove(GRAPHS_KEY);
        self.store.remove(FEATURES_KEY);
        for name in graph_names {
            self.store.remove(&structure_key(name.trim()));
        }
        self.graphs.clear();
        self.features.clear();
        self.structures.clear();
    }

    /// Number of fetches currently outstanding across all keys.
    pub fn in_flight(&self) -> usize {
        self.graphs.len() + self.features.len() + self.structures.len()
    }

    fn prime<V: Serialize + ?Sized>(&self, store_key: &str, value: &V) {
        match serde_json::to_value(value) {
            Ok(json) => self.store.update(store_key, json),
            Err(e) => tracing::warn!(key = store_key, error = %e, "cannot prime metadata cache"),
        }
    }

    async fn layered_fetch<T>(
        &self,
        flight: &SingleFlight<T>,
        flight_key: &str,
        store_key: String,
        start: impl FnOnce() -> LocalBoxFuture<'static, BackendResult<Option<T>>>,
    ) -> Option<Rc<T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        if self.use_cache {
            if let Some(json) = self.store.get(&store_key) {
                match serde_json::from_value::<T>(json) {
                    Ok(value) => {
                        tracing::trace!(key = %store_key, "metadata cache hit");
                        return Some(Rc::new(value));
                    }
                    Err(e) => {
                        tracing::warn!(key = %store_key, error = %e, "discarding stale metadata cache entry");
                        self.store.remove(&store_key);
                    }
                }
            }
        }

        if !self.use_backend {
            return None;
        }

        let store = Rc::clone(&self.store);
        let use_cache = self.use_cache;
        let write_key = store_key.clone();
        let fetch = flight.join_or_start(flight_key, start, move |value: &T| {
            if !use_cache {
                return;
            }
            match serde_json::to_value(value) {
                Ok(json) => store.update(&write_key, json),
                Err(e) => tracing::warn!(key = %write_key, error = %e, "cannot persist metadata"),
            }
        });

        match fetch.await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %store_key, error = %e, "backend metadata unavailable");
                None
            }
        }
    }
}

fn structure_key(graph_name: &str) -> String {
    format!("{}{}", STRUCTURE_KEY_PREFIX, graph_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    /// Backend double counting requests; each request yields once before answering.
    #[derive(Default)]
    struct CountingClient {
        structure_calls: Rc<Cell<usize>>,
        graph_calls: Rc<Cell<usize>>,
        fail_next: Rc<Cell<bool>>,
    }

    impl BackendClient for CountingClient {
        fn get_graphs(&self) -> LocalBoxFuture<'static, BackendResult<Option<Vec<GraphModel>>>> {
            self.graph_calls.set(self.graph_calls.get() + 1);
            Box::pin(async {
                tokio::task::yield_now().await;
                Ok(Some(vec![GraphModel {
                    name: "PX.Objects.SO.SOOrderEntry".to_string(),
                    text: None,
                }]))
            })
        }

        fn get_graph_structure(
            &self,
            graph_name: &str,
        ) -> LocalBoxFuture<'static, BackendResult<Option<GraphStructure>>> {
            self.structure_calls.set(self.structure_calls.get() + 1);
            let fail = self.fail_next.replace(false);
            let name = graph_name.to_string();
            Box::pin(async move {
                tokio::task::yield_now().await;
                if fail {
                    Err(BackendError::Request("503".to_string()))
                } else {
                    Ok(Some(GraphStructure {
                        name: Some(name),
                        ..Default::default()
                    }))
                }
            })
        }

        fn get_features(&self) -> LocalBoxFuture<'static, BackendResult<Option<Vec<FeatureModel>>>> {
            Box::pin(async { Ok(None) })
        }
    }

    /// Store double counting writes.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        writes: Cell<usize>,
    }

    impl MetadataStore for CountingStore {
        fn get(&self, key: &str) -> Option<serde_json::Value> {
            self.inner.get(key)
        }
        fn update(&self, key: &str, value: serde_json::Value) {
            self.writes.set(self.writes.get() + 1);
            self.inner.update(key, value);
        }
        fn remove(&self, key: &str) {
            self.inner.remove(key);
        }
    }

    fn setup(config: EngineConfig) -> (MetadataCache, Rc<CountingClient>, Rc<CountingStore>) {
        let client = Rc::new(CountingClient::default());
        let store = Rc::new(CountingStore::default());
        let cache = MetadataCache::new(
            &config,
            Rc::clone(&client) as Rc<dyn BackendClient>,
            Rc::clone(&store) as Rc<dyn MetadataStore>,
        );
        (cache, client, store)
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let (cache, client, store) = setup(EngineConfig::default());

        let (first, second) = futures::join!(
            cache.get_graph_structure("X"),
            cache.get_graph_structure("X")
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(client.structure_calls.get(), 1);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(store.writes.get(), 1);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_separately() {
        let (cache, client, _store) = setup(EngineConfig::default());
        let (x, y) = futures::join!(cache.get_graph_structure("X"), cache.get_graph_structure("Y"));
        assert_eq!(x.unwrap().name.as_deref(), Some("X"));
        assert_eq!(y.unwrap().name.as_deref(), Some("Y"));
        assert_eq!(client.structure_calls.get(), 2);
    }

    #[tokio::test]
    async fn test_store_hit_skips_backend() {
        let (cache, client, _store) = setup(EngineConfig::default());
        cache.get_graphs().await.unwrap();
        let graphs = cache.get_graphs().await.unwrap();
        assert_eq!(graphs[0].name, "PX.Objects.SO.SOOrderEntry");
        assert_eq!(client.graph_calls.get(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_none_then_retries() {
        let (cache, client, store) = setup(EngineConfig::default());
        client.fail_next.set(true);

        let (first, second) = futures::join!(
            cache.get_graph_structure("X"),
            cache.get_graph_structure("X")
        );
        assert!(first.is_none() && second.is_none());
        assert_eq!(client.structure_calls.get(), 1);
        assert_eq!(store.writes.get(), 0);
        assert_eq!(cache.in_flight(), 0);

        assert!(cache.get_graph_structure("X").await.is_some());
        assert_eq!(client.structure_calls.get(), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled_never_writes() {
        let config = EngineConfig {
            use_cache: false,
            ..Default::default()
        };
        let (cache, client, store) = setup(config);
        cache.get_graph_structure("X").await.unwrap();
        cache.get_graph_structure("X").await.unwrap();
        assert_eq!(store.writes.get(), 0);
        assert_eq!(client.structure_calls.get(), 2);
    }

    #[tokio::test]
    async fn test_backend_disabled_uses_primed_values_only() {
        let config = EngineConfig {
            use_backend: false,
            ..Default::default()
        };
        let (cache, client, _store) = setup(config);
        assert!(cache.get_graph_structure("X").await.is_none());

        cache.prime_graph_structure("X", &GraphStructure::default());
        assert!(cache.get_graph_structure(" X ").await.is_some());
        assert_eq!(client.structure_calls.get(), 0);

        cache.clear(&["X"]);
        assert!(cache.get_graph_structure("X").await.is_none());
    }

    /// Backend double whose structure requests stay pending until released in order.
    #[derive(Default)]
    struct GatedClient {
        calls: Cell<usize>,
        gates: RefCell<Vec<Option<futures::channel::oneshot::Sender<()>>>>,
    }

    impl GatedClient {
        fn release(&self, index: usize) {
            if let Some(gate) = self.gates.borrow_mut()[index].take() {
                gate.send(()).unwrap();
            }
        }
    }

    impl BackendClient for GatedClient {
        fn get_graphs(&self) -> LocalBoxFuture<'static, BackendResult<Option<Vec<GraphModel>>>> {
            Box::pin(async { Ok(None) })
        }

        fn get_graph_structure(
            &self,
            graph_name: &str,
        ) -> LocalBoxFuture<'static, BackendResult<Option<GraphStructure>>> {
            self.calls.set(self.calls.get() + 1);
            let (sender, receiver) = futures::channel::oneshot::channel();
            self.gates.borrow_mut().push(Some(sender));
            let name = graph_name.to_string();
            Box::pin(async move {
                receiver
                    .await
                    .map_err(|_| BackendError::Request("gate dropped".to_string()))?;
                Ok(Some(GraphStructure {
                    name: Some(name),
                    ..Default::default()
                }))
            })
        }

        fn get_features(&self) -> LocalBoxFuture<'static, BackendResult<Option<Vec<FeatureModel>>>> {
            Box::pin(async { Ok(None) })
        }
    }

    #[tokio::test]
    async fn test_detached_fetch_leaves_successor_in_flight() {
        let client = Rc::new(GatedClient::default());
        let store = Rc::new(CountingStore::default());
        let cache = MetadataCache::new(
            &EngineConfig::default(),
            Rc::clone(&client) as Rc<dyn BackendClient>,
            Rc::clone(&store) as Rc<dyn MetadataStore>,
        );

        let mut first = Box::pin(cache.get_graph_structure("X"));
        assert!(futures::poll!(first.as_mut()).is_pending());
        cache.clear(&["X"]);

        let mut second = Box::pin(cache.get_graph_structure("X"));
        assert!(futures::poll!(second.as_mut()).is_pending());
        assert_eq!(client.calls.get(), 2);

        // The detached fetch settles while the second one is still outstanding.
        client.release(0);
        assert!(futures::poll!(first.as_mut()).is_ready());
        assert_eq!(cache.in_flight(), 1);
        assert_eq!(store.writes.get(), 0);

        let mut third = Box::pin(cache.get_graph_structure("X"));
        assert!(futures::poll!(third.as_mut()).is_pending());
        assert_eq!(client.calls.get(), 2);

        client.release(1);
        let (second, third) = futures::join!(second, third);
        assert!(Rc::ptr_eq(&second.unwrap(), &third.unwrap()));
        assert_eq!(client.calls.get(), 2);
        assert_eq!(store.writes.get(), 1);
        assert_eq!(cache.in_flight(), 0);
    }
}
