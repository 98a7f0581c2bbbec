//! # AWS S3 Object Store Provider

use super::ObjectStoreProvider;
use crate::{Error, Result};
use object_store::aws::AmazonS3Builder;
use std::{collections::HashMap, sync::Arc};
use tracing::warn;
use url::Url;

/// Provider for Amazon S3 and S3-compatible storage (`s3://`, `s3a://`).
///
/// Credentials and region are read from the usual `AWS_*` environment variables and may be
/// overridden per connection through `storage.*` properties, with or without the `aws_` prefix:
/// `access_key_id`, `secret_access_key`, `region`, `endpoint`, `session_token`, `allow_http`.
pub struct S3Provider;

impl ObjectStoreProvider for S3Provider {
    fn supports_scheme(&self, scheme: &str) -> bool {
        matches!(scheme, "s3" | "s3a")
    }

    fn create_store(
        &self,
        location: &Url,
        options: &HashMap<String, String>,
    ) -> Result<Arc<dyn object_store::ObjectStore>> {
        let mut builder = AmazonS3Builder::from_env();

        if let Some(bucket) = location.host_str() {
            builder = builder.with_bucket_name(bucket);
        }

        for (key, value) in options {
            builder = match key.as_str() {
                "aws_access_key_id" | "access_key_id" => builder.with_access_key_id(value),
                "aws_secret_access_key" | "secret_access_key" => {
                    builder.with_secret_access_key(value)
                }
                "aws_region" | "region" => builder.with_region(value),
                "aws_endpoint" | "endpoint" => builder.with_endpoint(value),
                "aws_session_token" | "session_token" => builder.with_token(value),
                "aws_allow_http" | "allow_http" => {
                    builder.with_allow_http(value.parse::<bool>().unwrap_or(false))
                }
                unknown => {
                    warn!("Unknown object_store configuration key: {unknown}");
                    builder
                }
            };
        }

        builder
            .build()
            .map(|store| Arc::new(store) as Arc<dyn object_store::ObjectStore>)
            .map_err(|e| Error::ObjectStoreCreation(e.to_string()))
    }
}
