//! Common test utilities
//!
//! In-memory stand-ins for the object store, artifact store, cloud adapter
//! and credentials provider, plus builders for connector objects.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use cloud_connectors::config::{ControllerConfig, FatalErrorPolicy};
use cloud_connectors::controller::reconciler::Reconciler;
use cloud_connectors::crd::{
    ManagedResource, YandexContainerRegistry, YandexContainerRegistrySpec, YandexMessageQueue,
    YandexMessageQueueSpec, YandexObjectStorage, YandexObjectStorageSpec,
};
use cloud_connectors::provider::{
    CloudResourceAdapter, Credentials, CredentialsProvider, CredentialsRef, ProviderError,
    RemoteResourceDescriptor, ATTRIBUTE_URL,
};
use cloud_connectors::store::{ArtifactOwner, ArtifactStore, ObjectKey, ObjectStore, StoreError};
use kube::{Resource, ResourceExt};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

pub const NAMESPACE: &str = "shop";

// ============================================================================
// Object store
// ============================================================================

/// Object store with resourceVersion checks and platform-style deletion
pub struct MemoryObjectStore<K> {
    objects: Mutex<HashMap<ObjectKey, K>>,
    next_version: AtomicU32,
    injected_conflicts: AtomicU32,
    pub updates: AtomicU32,
    pub status_updates: AtomicU32,
}

impl<K: ManagedResource> MemoryObjectStore<K> {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            next_version: AtomicU32::new(1),
            injected_conflicts: AtomicU32::new(0),
            updates: AtomicU32::new(0),
            status_updates: AtomicU32::new(0),
        }
    }

    fn bump_version(&self, object: &mut K) {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        object.meta_mut().resource_version = Some(version.to_string());
    }

    pub fn insert(&self, mut object: K) -> ObjectKey {
        self.bump_version(&mut object);
        let key = ObjectKey::new(object.namespace().unwrap_or_default(), object.name_any());
        self.objects.lock().unwrap().insert(key.clone(), object);
        key
    }

    pub fn current(&self, key: &ObjectKey) -> Option<K> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Request deletion the way the platform does: objects without
    /// finalizers vanish, others only get a deletion timestamp
    pub fn request_deletion(&self, key: &ObjectKey) {
        let mut objects = self.objects.lock().unwrap();
        let Some(object) = objects.get_mut(key) else {
            return;
        };
        if object.finalizers().is_empty() {
            objects.remove(key);
            return;
        }
        object.meta_mut().deletion_timestamp = Some(
            serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).expect("timestamp"),
        );
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        object.meta_mut().resource_version = Some(version.to_string());
    }

    /// Apply a spec change and bump the generation
    pub fn edit(&self, key: &ObjectKey, change: impl FnOnce(&mut K)) {
        let mut objects = self.objects.lock().unwrap();
        let object = objects.get_mut(key).expect("object to edit");
        change(object);
        let generation = object.meta().generation.unwrap_or(0) + 1;
        object.meta_mut().generation = Some(generation);
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        object.meta_mut().resource_version = Some(version.to_string());
    }

    /// Make the next `count` writes lose against a concurrent writer
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Common checks for both write paths; returns the stored copy
    fn check_write(&self, objects: &mut HashMap<ObjectKey, K>, object: &K) -> Result<ObjectKey, StoreError> {
        let key = ObjectKey::new(object.namespace().unwrap_or_default(), object.name_any());
        let Some(stored) = objects.get_mut(&key) else {
            return Err(StoreError::NotFound(key.to_string()));
        };
        if self.take_injected_conflict() {
            // A concurrent writer got there first
            let version = self.next_version.fetch_add(1, Ordering::SeqCst);
            stored.meta_mut().resource_version = Some(version.to_string());
            return Err(StoreError::Conflict(key.to_string()));
        }
        if stored.resource_version() != object.resource_version() {
            return Err(StoreError::Conflict(key.to_string()));
        }
        Ok(key)
    }
}

#[async_trait]
impl<K: ManagedResource> ObjectStore<K> for MemoryObjectStore<K> {
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        Ok(self.current(key))
    }

    async fn update(&self, object: &K) -> Result<K, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().unwrap();
        let key = self.check_write(&mut objects, object)?;
        let mut stored = objects.get(&key).cloned().expect("checked above");
        stored.meta_mut().finalizers = object.meta().finalizers.clone();
        self.bump_version(&mut stored);
        if stored.meta().deletion_timestamp.is_some() && stored.finalizers().is_empty() {
            objects.remove(&key);
        } else {
            objects.insert(key, stored.clone());
        }
        Ok(stored)
    }

    async fn update_status(&self, object: &K) -> Result<K, StoreError> {
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().unwrap();
        let key = self.check_write(&mut objects, object)?;
        let stored = objects.get(&key).cloned().expect("checked above");
        let mut value = serde_json::to_value(&stored).expect("serialize stored");
        value["status"] = serde_json::to_value(object)
            .expect("serialize object")
            .get("status")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let mut updated: K = serde_json::from_value(value).expect("deserialize updated");
        self.bump_version(&mut updated);
        objects.insert(key, updated.clone());
        Ok(updated)
    }
}

// ============================================================================
// Artifact store
// ============================================================================

#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<ArtifactOwner, BTreeMap<String, String>>>,
    failing_removals: AtomicU32,
    pub puts: AtomicU32,
    pub removals: AtomicU32,
}

impl MemoryArtifactStore {
    pub fn get(&self, owner: &ArtifactOwner) -> Option<BTreeMap<String, String>> {
        self.artifacts.lock().unwrap().get(owner).cloned()
    }

    pub fn seed(&self, owner: ArtifactOwner, data: BTreeMap<String, String>) {
        self.artifacts.lock().unwrap().insert(owner, data);
    }

    /// Make the next `count` removals fail transiently
    pub fn fail_removals(&self, count: u32) {
        self.failing_removals.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn exists(&self, owner: &ArtifactOwner) -> Result<bool, StoreError> {
        Ok(self.artifacts.lock().unwrap().contains_key(owner))
    }

    async fn put(
        &self,
        owner: &ArtifactOwner,
        data: BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.artifacts
            .lock()
            .unwrap()
            .entry(owner.clone())
            .or_insert(data);
        Ok(())
    }

    async fn remove(&self, owner: &ArtifactOwner) -> Result<(), StoreError> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_removals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Transient(anyhow::anyhow!("artifact store unavailable")));
        }
        self.artifacts.lock().unwrap().remove(owner);
        Ok(())
    }
}

// ============================================================================
// Cloud adapter
// ============================================================================

/// Remote resources keyed by name, with call recording and failure injection
pub struct FakeCloud<P> {
    resources: Mutex<BTreeMap<String, RemoteResourceDescriptor>>,
    /// Created resources that are not listed yet
    pending: Mutex<Vec<RemoteResourceDescriptor>>,
    failures: Mutex<HashMap<&'static str, VecDeque<ProviderError>>>,
    hide_creates: AtomicU32,
    url_prefix: Option<String>,
    next_id: AtomicU32,
    pub lists: AtomicU32,
    pub creates: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<String>>,
    _params: PhantomData<fn() -> P>,
}

impl<P> FakeCloud<P> {
    pub fn new() -> Self {
        Self {
            resources: Mutex::new(BTreeMap::new()),
            pending: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            hide_creates: AtomicU32::new(0),
            url_prefix: None,
            next_id: AtomicU32::new(1),
            lists: AtomicU32::new(0),
            creates: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            _params: PhantomData,
        }
    }

    /// Queue-like cloud: identifiers are URLs under `prefix`
    pub fn with_urls(prefix: &str) -> Self {
        Self {
            url_prefix: Some(prefix.to_string()),
            ..Self::new()
        }
    }

    fn descriptor(&self, name: &str) -> RemoteResourceDescriptor {
        let mut attributes = BTreeMap::new();
        let id = match &self.url_prefix {
            Some(prefix) => {
                let url = format!("{prefix}/{name}");
                attributes.insert(ATTRIBUTE_URL.to_string(), url.clone());
                url
            }
            None => format!("id-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        RemoteResourceDescriptor {
            id,
            name: name.to_string(),
            created_at: Some(
                chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                    .expect("timestamp")
                    .with_timezone(&chrono::Utc),
            ),
            labels: BTreeMap::from([("env".to_string(), "test".to_string())]),
            attributes,
        }
    }

    /// Seed a pre-existing remote resource
    pub fn seed(&self, name: &str) -> RemoteResourceDescriptor {
        let descriptor = self.descriptor(name);
        self.resources
            .lock()
            .unwrap()
            .insert(name.to_string(), descriptor.clone());
        descriptor
    }

    pub fn remote(&self, name: &str) -> Option<RemoteResourceDescriptor> {
        self.resources.lock().unwrap().get(name).cloned()
    }

    pub fn set_labels(&self, name: &str, labels: BTreeMap<String, String>) {
        if let Some(d) = self.resources.lock().unwrap().get_mut(name) {
            d.labels = labels;
        }
    }

    /// Fail the next call of `operation` (`list`, `create`, `delete`) with `error`
    pub fn fail_next(&self, operation: &'static str, error: ProviderError) {
        self.failures
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Keep the next `count` created resources out of listings until revealed
    pub fn hide_creates(&self, count: u32) {
        self.hide_creates.store(count, Ordering::SeqCst);
    }

    pub fn reveal_pending(&self) {
        let pending: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        let mut resources = self.resources.lock().unwrap();
        for d in pending {
            resources.insert(d.name.clone(), d);
        }
    }

    pub fn create_count(&self) -> usize {
        self.creates.lock().unwrap().len()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.lock().unwrap().len()
    }

    fn injected(&self, operation: &'static str) -> Option<ProviderError> {
        self.failures
            .lock()
            .unwrap()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> CloudResourceAdapter for FakeCloud<P> {
    type Params = P;

    async fn list(
        &self,
        _credentials: &Credentials,
        _params: &P,
    ) -> Result<Vec<RemoteResourceDescriptor>, ProviderError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.injected("list") {
            return Err(error);
        }
        Ok(self.resources.lock().unwrap().values().cloned().collect())
    }

    async fn create(
        &self,
        _credentials: &Credentials,
        name: &str,
        _params: &P,
    ) -> Result<(), ProviderError> {
        self.creates.lock().unwrap().push(name.to_string());
        if let Some(error) = self.injected("create") {
            return Err(error);
        }
        let descriptor = self.descriptor(name);
        let hidden = self
            .hide_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hidden {
            self.pending.lock().unwrap().push(descriptor);
        } else {
            self.resources
                .lock()
                .unwrap()
                .insert(name.to_string(), descriptor);
        }
        Ok(())
    }

    async fn delete(
        &self,
        _credentials: &Credentials,
        name: &str,
        _params: &P,
    ) -> Result<(), ProviderError> {
        self.deletes.lock().unwrap().push(name.to_string());
        if let Some(error) = self.injected("delete") {
            return Err(error);
        }
        match self.resources.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(ProviderError::NotFound(name.to_string())),
        }
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Resolves every reference to a fixed static key, or fails when told to
#[derive(Default)]
pub struct StaticCredentials {
    pub resolved: Mutex<Vec<(String, CredentialsRef)>>,
    missing: AtomicU32,
}

impl StaticCredentials {
    /// Make the next `count` resolutions fail as if the secret were missing
    pub fn fail_resolutions(&self, count: u32) {
        self.missing.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    async fn resolve(
        &self,
        namespace: &str,
        reference: &CredentialsRef,
    ) -> Result<Credentials, ProviderError> {
        self.resolved
            .lock()
            .unwrap()
            .push((namespace.to_string(), reference.clone()));
        let missing = self
            .missing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if missing {
            return Err(ProviderError::Transient(anyhow::anyhow!(
                "secret {namespace}/{reference:?} not found"
            )));
        }
        Ok(Credentials::StaticKey {
            key_id: "test-key-id".to_string(),
            secret: "test-secret".to_string(),
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Reconciler for kind `K` wired to in-memory collaborators
pub struct Harness<K: ManagedResource> {
    pub store: Arc<MemoryObjectStore<K>>,
    pub artifacts: Arc<MemoryArtifactStore>,
    pub cloud: Arc<FakeCloud<K::Params>>,
    pub credentials: Arc<StaticCredentials>,
    pub reconciler: Reconciler<K>,
}

pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        conflict_retry_limit: 3,
        fatal_error_policy: FatalErrorPolicy::Requeue,
        ..ControllerConfig::default()
    }
}

impl<K: ManagedResource> Harness<K> {
    pub fn new(cloud: FakeCloud<K::Params>) -> Self {
        Self::with_config(cloud, test_config())
    }

    pub fn with_config(cloud: FakeCloud<K::Params>, config: ControllerConfig) -> Self {
        let store = Arc::new(MemoryObjectStore::<K>::new());
        let artifacts = Arc::new(MemoryArtifactStore::default());
        let cloud = Arc::new(cloud);
        let credentials = Arc::new(StaticCredentials::default());
        let reconciler = Reconciler::new(
            Arc::clone(&store) as Arc<dyn ObjectStore<K>>,
            Arc::clone(&artifacts) as Arc<dyn ArtifactStore>,
            Arc::clone(&cloud) as Arc<dyn CloudResourceAdapter<Params = K::Params>>,
            Arc::clone(&credentials) as Arc<dyn CredentialsProvider>,
            Arc::new(config),
        );
        Self {
            store,
            artifacts,
            cloud,
            credentials,
            reconciler,
        }
    }

    pub fn owner(&self, key: &ObjectKey) -> ArtifactOwner {
        ArtifactOwner {
            name: key.name.clone(),
            namespace: key.namespace.clone(),
            kind: K::KIND_TAG,
        }
    }

    pub fn has_finalizer(&self, key: &ObjectKey) -> bool {
        self.store
            .current(key)
            .is_some_and(|o| o.finalizers().iter().any(|f| f == K::FINALIZER))
    }
}

// ============================================================================
// Object builders
// ============================================================================

fn place<K: Resource>(object: &mut K) {
    object.meta_mut().namespace = Some(NAMESPACE.to_string());
    object.meta_mut().generation = Some(1);
}

pub fn queue(name: &str, remote_name: &str) -> YandexMessageQueue {
    let mut object = YandexMessageQueue::new(
        name,
        YandexMessageQueueSpec {
            name: remote_name.to_string(),
            fifo_queue: false,
            content_based_deduplication: false,
            delay_seconds: None,
            maximum_message_size: None,
            message_retention_period: None,
            receive_message_wait_time_seconds: None,
            visibility_timeout: None,
            sa_key_name: "ymq-access-key".to_string(),
        },
    );
    place(&mut object);
    object
}

pub fn bucket(name: &str, remote_name: &str) -> YandexObjectStorage {
    let mut object = YandexObjectStorage::new(
        name,
        YandexObjectStorageSpec {
            name: remote_name.to_string(),
            acl: None,
            sa_key_name: "yos-access-key".to_string(),
        },
    );
    place(&mut object);
    object
}

pub fn registry(name: &str, remote_name: &str) -> YandexContainerRegistry {
    let mut object = YandexContainerRegistry::new(
        name,
        YandexContainerRegistrySpec {
            name: remote_name.to_string(),
            folder_id: "b1gfolder".to_string(),
        },
    );
    place(&mut object);
    object
}

/// Add the kind's finalizer to a freshly built object
pub fn finalized<K: ManagedResource>(mut object: K) -> K {
    object
        .meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(K::FINALIZER.to_string());
    object
}
