//! Vidrelay Services
//!
//! The relay pipeline, its background launcher and the download link resolver.

pub mod download_link;
pub mod error;
pub mod pipeline;
pub mod public_domain;

pub use download_link::{select_object_key, DownloadLinkResolver, ResolvedLink};
pub use error::PipelineError;
pub use pipeline::{
    ByteIntervalPolicy, CompletedUpload, CompletionSink, LedgerSink, ProgressPolicy,
    SourceFetcher, StartedUpload, UploadLauncher, UploadPipeline, UploadRequest,
};
pub use public_domain::{PublicDomain, PublicDomainError};
