//! The Cask storage provider.
//!
//! [`Cask`] owns the object and metadata stores and the subsystems that
//! operate on them: the multipart upload coordinator and the batch
//! engine. Bucket and policy operations are implemented on [`Cask`] in
//! the `bucket` module; upload and batch operations delegate to their
//! subsystems from here.

use std::sync::Arc;

use bytes::Bytes;

use crate::batch::BatchEngine;
use crate::config::CaskConfig;
use crate::error::CaskResult;
use crate::model::{BatchJobSpec, BatchOperation, Part, UploadOptions};
use crate::multipart::{
    CompletedUpload, InitiatedUpload, MultipartCoordinator, PartRef, UploadSummary, UploadedPart,
};
use crate::store::{
    BatchListFilter, MemoryMetadataStore, MemoryObjectStore, MetadataStore, ObjectStore,
};

/// The storage core: stores plus the subsystems operating on them.
///
/// Construction spawns the batch worker pool, so a Tokio runtime must be
/// running. The provider is cheap to share behind an [`Arc`].
///
/// # Examples
///
/// ```
/// use cask_core::{Cask, CaskConfig};
///
/// tokio_test::block_on(async {
///     let cask = Cask::new(CaskConfig::default());
///     assert_eq!(cask.config().batch_workers, 4);
/// });
/// ```
#[derive(Debug)]
pub struct Cask {
    /// Object payload storage.
    pub(crate) objects: Arc<dyn ObjectStore>,
    /// Record storage for buckets, files, uploads and batch operations.
    pub(crate) metadata: Arc<dyn MetadataStore>,
    /// Multipart upload lifecycle coordination.
    pub(crate) multipart: MultipartCoordinator,
    /// Asynchronous batch job execution.
    pub(crate) batch: BatchEngine,
    /// Provider configuration.
    pub(crate) config: Arc<CaskConfig>,
}

impl Cask {
    /// Create a provider backed by in-memory stores.
    ///
    /// Objects larger than `config.max_memory_object_size` spill to
    /// temporary files on disk.
    #[must_use]
    pub fn new(config: CaskConfig) -> Self {
        let objects = Arc::new(MemoryObjectStore::new(config.max_memory_object_size));
        let metadata = Arc::new(MemoryMetadataStore::new());
        Self::with_stores(objects, metadata, config)
    }

    /// Create a provider over caller-supplied store implementations.
    #[must_use]
    pub fn with_stores(
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        config: CaskConfig,
    ) -> Self {
        let multipart = MultipartCoordinator::new(objects.clone(), metadata.clone());
        let batch = BatchEngine::start(objects.clone(), metadata.clone(), &config);
        Self {
            objects,
            metadata,
            multipart,
            batch,
            config: Arc::new(config),
        }
    }

    /// Returns a reference to the object store.
    #[must_use]
    pub fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }

    /// Returns a reference to the metadata store.
    #[must_use]
    pub fn metadata(&self) -> &dyn MetadataStore {
        self.metadata.as_ref()
    }

    /// Returns a reference to the provider configuration.
    #[must_use]
    pub fn config(&self) -> &CaskConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Multipart upload operations
    // -----------------------------------------------------------------------

    /// Start a multipart upload.
    ///
    /// # Errors
    ///
    /// See [`MultipartCoordinator::initiate`].
    pub async fn initiate_upload(
        &self,
        bucket_id: &str,
        key: &str,
        options: UploadOptions,
    ) -> CaskResult<InitiatedUpload> {
        self.multipart.initiate(bucket_id, key, options).await
    }

    /// Stage one part of a multipart upload.
    ///
    /// # Errors
    ///
    /// See [`MultipartCoordinator::upload_part`].
    pub async fn upload_part(
        &self,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> CaskResult<UploadedPart> {
        self.multipart.upload_part(upload_id, part_number, data).await
    }

    /// Assemble the staged parts into the final object.
    ///
    /// # Errors
    ///
    /// See [`MultipartCoordinator::complete`].
    pub async fn complete_upload(
        &self,
        upload_id: &str,
        parts: &[PartRef],
    ) -> CaskResult<CompletedUpload> {
        self.multipart.complete(upload_id, parts).await
    }

    /// Abandon an upload and discard its staged parts.
    ///
    /// # Errors
    ///
    /// See [`MultipartCoordinator::abort`].
    pub async fn abort_upload(&self, upload_id: &str) -> CaskResult<()> {
        self.multipart.abort(upload_id).await
    }

    /// List the staged parts of an upload.
    ///
    /// # Errors
    ///
    /// See [`MultipartCoordinator::list_parts`].
    pub async fn list_parts(&self, upload_id: &str) -> CaskResult<Vec<Part>> {
        self.multipart.list_parts(upload_id).await
    }

    /// List a bucket's in-progress uploads.
    ///
    /// # Errors
    ///
    /// See [`MultipartCoordinator::list_uploads`].
    pub async fn list_uploads(&self, bucket_id: &str) -> CaskResult<Vec<UploadSummary>> {
        self.multipart.list_uploads(bucket_id).await
    }

    // -----------------------------------------------------------------------
    // Batch operations
    // -----------------------------------------------------------------------

    /// Queue a batch job and return its operation id.
    ///
    /// # Errors
    ///
    /// See [`BatchEngine::submit`].
    pub async fn submit_batch(&self, spec: BatchJobSpec) -> CaskResult<String> {
        self.batch.submit(spec).await
    }

    /// Fetch a batch operation record.
    ///
    /// # Errors
    ///
    /// See [`BatchEngine::get`].
    pub async fn get_batch(&self, operation_id: &str) -> CaskResult<BatchOperation> {
        self.batch.get(operation_id).await
    }

    /// List batch operation records, newest first.
    ///
    /// # Errors
    ///
    /// See [`BatchEngine::list`].
    pub async fn list_batches(&self, filter: &BatchListFilter) -> CaskResult<Vec<BatchOperation>> {
        self.batch.list(filter).await
    }

    /// Request cancellation of a batch operation.
    ///
    /// # Errors
    ///
    /// See [`BatchEngine::cancel`].
    pub async fn cancel_batch(&self, operation_id: &str) -> CaskResult<BatchOperation> {
        self.batch.cancel(operation_id).await
    }

    /// Re-enqueue batch operations left pending by a previous process.
    ///
    /// # Errors
    ///
    /// See [`BatchEngine::recover_queued`].
    pub async fn recover_queued(&self) -> CaskResult<usize> {
        self.batch.recover_queued().await
    }
}
