use crate::keys::{encode_key_path, validate_key};
use crate::traits::{
    ObjectStorage, ObjectStream, ResponseOverrides, StorageError, StorageResult, StoredObject,
};
use crate::StorageBackend;
use async_trait::async_trait;
use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::time::Duration;

/// Smallest part size S3 accepts for every part but the last.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Connection settings for an S3-compatible bucket (R2, MinIO, AWS).
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers; AWS virtual-hosted URLs when unset
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Multipart part size in bytes, raised to [`MIN_PART_SIZE`] if smaller
    pub part_size: usize,
}

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    part_size: usize,
}

/// One in-flight multipart upload.
struct MultipartWriter<'a> {
    client: &'a Client,
    bucket: &'a str,
    key: &'a str,
    upload_id: String,
    parts: Vec<CompletedPart>,
}

impl<'a> MultipartWriter<'a> {
    async fn create(
        client: &'a Client,
        bucket: &'a str,
        key: &'a str,
        content_type: &str,
    ) -> StorageResult<MultipartWriter<'a>> {
        let response = client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("create multipart upload: {}", e)))?;

        let upload_id = response
            .upload_id()
            .ok_or_else(|| StorageError::UploadFailed("No upload ID returned".to_string()))?
            .to_string();

        Ok(Self {
            client,
            bucket,
            key,
            upload_id,
            parts: Vec::new(),
        })
    }

    async fn upload_part(&mut self, data: Bytes) -> StorageResult<()> {
        let part_number = i32::try_from(self.parts.len() + 1)
            .map_err(|_| StorageError::UploadFailed("Too many parts".to_string()))?;

        let response = self
            .client
            .upload_part()
            .bucket(self.bucket)
            .key(self.key)
            .upload_id(&self.upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                StorageError::UploadFailed(format!("upload part {}: {}", part_number, e))
            })?;

        self.parts.push(
            CompletedPart::builder()
                .part_number(part_number)
                .e_tag(response.e_tag().unwrap_or_default())
                .build(),
        );
        Ok(())
    }

    async fn complete(&mut self) -> StorageResult<()> {
        let completed_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(std::mem::take(&mut self.parts)))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(self.bucket)
            .key(self.key)
            .upload_id(&self.upload_id)
            .multipart_upload(completed_upload)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("complete multipart upload: {}", e)))?;

        Ok(())
    }

    /// Best effort; a leftover upload is reclaimed by bucket lifecycle rules.
    async fn abort(&self) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(self.bucket)
            .key(self.key)
            .upload_id(&self.upload_id)
            .send()
            .await
        {
            tracing::warn!(
                error = %e,
                bucket = %self.bucket,
                key = %self.key,
                upload_id = %self.upload_id,
                "Failed to abort multipart upload"
            );
        }
    }
}

impl S3Storage {
    /// Create a new S3Storage instance for an S3-compatible endpoint
    pub async fn new(settings: S3Settings) -> StorageResult<Self> {
        if settings.bucket.trim().is_empty() {
            return Err(StorageError::ConfigError(
                "S3 bucket name is empty".to_string(),
            ));
        }

        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "vidrelay",
        );

        let mut builder = S3ConfigBuilder::new()
            .credentials_provider(credentials)
            .region(Region::new(settings.region.clone()))
            .force_path_style(true);

        if let Some(ref endpoint) = settings.endpoint_url {
            builder = builder.endpoint_url(endpoint.clone());
        }

        Ok(S3Storage {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket,
            region: settings.region,
            endpoint_url: settings.endpoint_url,
            part_size: settings.part_size.max(MIN_PART_SIZE),
        })
    }

    async fn put_single(&self, key: &str, content_type: &str, data: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(())
    }
}

/// Native object URL: path-style on custom endpoints, virtual-hosted on AWS.
fn object_url_for(endpoint_url: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
    let key = encode_key_path(key);
    match endpoint_url {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_stream(
        &self,
        key: &str,
        content_type: &str,
        size_hint: Option<u64>,
        mut body: ObjectStream,
    ) -> StorageResult<StoredObject> {
        validate_key(key)?;
        let start = std::time::Instant::now();

        let mut buffer = BytesMut::with_capacity(self.part_size);
        let mut multipart: Option<MultipartWriter<'_>> = None;
        let mut size: u64 = 0;

        // Parts are cut at exactly `part_size`; the upload only turns multipart
        // once a full part is buffered, so small objects take a single PUT.
        let outcome: StorageResult<()> = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                size += chunk.len() as u64;
                buffer.extend_from_slice(&chunk);

                while buffer.len() >= self.part_size {
                    let part = buffer.split_to(self.part_size).freeze();
                    if multipart.is_none() {
                        multipart = Some(
                            MultipartWriter::create(&self.client, &self.bucket, key, content_type)
                                .await?,
                        );
                    }
                    if let Some(writer) = multipart.as_mut() {
                        writer.upload_part(part).await?;
                    }
                }
            }

            match multipart.as_mut() {
                Some(writer) => {
                    if !buffer.is_empty() {
                        writer.upload_part(buffer.split().freeze()).await?;
                    }
                    writer.complete().await
                }
                None => {
                    self.put_single(key, content_type, buffer.split().freeze())
                        .await
                }
            }
        }
        .await;

        if let Err(e) = outcome {
            if let Some(writer) = multipart.as_ref() {
                writer.abort().await;
            }
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 stream upload failed"
            );
            return Err(e);
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            declared_bytes = ?size_hint,
            multipart = multipart.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 stream upload successful"
        );

        Ok(StoredObject {
            key: key.to_string(),
            url: self.object_url(key),
            size,
        })
    }

    async fn presigned_download_url(
        &self,
        key: &str,
        expires_in: Duration,
        overrides: &ResponseOverrides,
    ) -> StorageResult<String> {
        validate_key(key)?;

        let presigning_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(ref disposition) = overrides.content_disposition {
            request = request.response_content_disposition(disposition);
        }
        if let Some(ref content_type) = overrides.content_type {
            request = request.response_content_type(content_type);
        }

        let presigned_request = request
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned_request.uri().to_string())
    }

    fn object_url(&self, key: &str) -> String {
        object_url_for(self.endpoint_url.as_deref(), &self.bucket, &self.region, key)
    }

    async fn download_stream(&self, key: &str) -> StorageResult<ObjectStream> {
        validate_key(key)?;

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()) == Some(true) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let stream = futures::stream::unfold(output.body, |mut body| async move {
            body.next().await.map(|item| {
                (
                    item.map_err(|e| StorageError::DownloadFailed(e.to_string())),
                    body,
                )
            })
        });

        Ok(Box::pin(stream))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|se| se.is_not_found()) == Some(true) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }

    async fn check_connection(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        Ok(())
    }
}
