//! Session configuration and per-call request parameters
//!
//! Session configuration is expressed as a sequence of [`StoreOption`] values
//! applied to a [`StoreOptions`] record by [`compose`], which stops at the
//! first option that fails. Per-call parameters are typed builders that are
//! validated before any backend call is made.

use crate::attributes::{Attributes, IS_PUBLIC};
use crate::crypto::CryptoService;
use crate::error::{Error, Result};
use bytes::Bytes;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A record that accepts configuration values of type `O`
pub trait ApplyOption<O> {
    fn apply_option(&mut self, option: O) -> Result<()>;
}

/// Apply `options` to `record` in order, short-circuiting on the first error
pub fn compose<R, O, I>(record: &mut R, options: I) -> Result<()>
where
    R: ApplyOption<O>,
    I: IntoIterator<Item = O>,
{
    for option in options {
        record.apply_option(option)?;
    }
    Ok(())
}

/// One session configuration value
#[derive(Clone)]
pub enum StoreOption {
    /// Set a session attribute
    Attribute { key: String, value: Value },
    /// Attach a crypto service used on every read and write
    CryptoService(Arc<dyn CryptoService>),
}

impl StoreOption {
    pub fn attribute(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Attribute {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn crypto_service(service: Arc<dyn CryptoService>) -> Self {
        Self::CryptoService(service)
    }
}

impl fmt::Debug for StoreOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute { key, value } => f
                .debug_struct("Attribute")
                .field("key", key)
                .field("value", value)
                .finish(),
            Self::CryptoService(service) => f.debug_tuple("CryptoService").field(service).finish(),
        }
    }
}

/// Session-scoped options: set at construction or `init`, read thereafter
#[derive(Clone, Default)]
pub struct StoreOptions {
    crypto_service: Option<Arc<dyn CryptoService>>,
    attributes: Attributes,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn crypto_service(&self) -> Option<&Arc<dyn CryptoService>> {
        self.crypto_service.as_ref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

impl ApplyOption<StoreOption> for StoreOptions {
    fn apply_option(&mut self, option: StoreOption) -> Result<()> {
        match option {
            StoreOption::Attribute { key, value } => {
                if key.trim().is_empty() {
                    return Err(Error::invalid_config("attribute key must not be empty"));
                }
                self.attributes.set(key, value);
            }
            StoreOption::CryptoService(service) => {
                self.crypto_service = Some(service);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("crypto_service", &self.crypto_service)
            .field("attributes", &self.attributes)
            .finish()
    }
}

fn require_name(operation: &'static str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_option(
            operation,
            format!("{} must not be empty", field),
        ));
    }
    Ok(())
}

/// Parameters for reading one object
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub bucket_name: String,
    pub object_name: String,
}

impl GetOptions {
    pub fn new(bucket_name: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            object_name: object_name.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_name("get", "bucket name", &self.bucket_name)?;
        require_name("get", "object name", &self.object_name)
    }
}

/// Parameters for writing one object
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub bucket_name: String,
    pub object_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
    pub attributes: Attributes,
}

impl SetOptions {
    pub fn new(bucket_name: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            object_name: object_name.into(),
            ..Default::default()
        }
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.set(key, value);
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes.extend(&attributes);
        self
    }

    /// Shorthand for the `is-public` attribute
    pub fn public(self, public: bool) -> Self {
        self.attribute(IS_PUBLIC, public)
    }

    pub fn validate(&self) -> Result<()> {
        require_name("set", "bucket name", &self.bucket_name)?;
        require_name("set", "object name", &self.object_name)?;
        if let Some(content_type) = &self.content_type {
            require_name("set", "content type", content_type)?;
        }
        Ok(())
    }
}

/// Parameters for a server-side copy
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    pub src_bucket_name: String,
    pub src_object_name: String,
    pub dst_bucket_name: String,
    pub dst_object_name: String,
    pub attributes: Attributes,
}

impl CopyOptions {
    pub fn new(
        src_bucket_name: impl Into<String>,
        src_object_name: impl Into<String>,
        dst_bucket_name: impl Into<String>,
        dst_object_name: impl Into<String>,
    ) -> Self {
        Self {
            src_bucket_name: src_bucket_name.into(),
            src_object_name: src_object_name.into(),
            dst_bucket_name: dst_bucket_name.into(),
            dst_object_name: dst_object_name.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.set(key, value);
        self
    }

    /// Shorthand for the `is-public` attribute
    pub fn public(self, public: bool) -> Self {
        self.attribute(IS_PUBLIC, public)
    }

    pub fn validate(&self) -> Result<()> {
        require_name("copy", "source bucket name", &self.src_bucket_name)?;
        require_name("copy", "source object name", &self.src_object_name)?;
        require_name("copy", "destination bucket name", &self.dst_bucket_name)?;
        require_name("copy", "destination object name", &self.dst_object_name)?;
        if self.src_bucket_name == self.dst_bucket_name
            && self.src_object_name == self.dst_object_name
        {
            return Err(Error::invalid_option(
                "copy",
                "source and destination must differ",
            ));
        }
        Ok(())
    }
}

/// Parameters for removing one object
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub bucket_name: String,
    pub object_name: String,
}

impl DeleteOptions {
    pub fn new(bucket_name: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            object_name: object_name.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_name("delete", "bucket name", &self.bucket_name)?;
        require_name("delete", "object name", &self.object_name)
    }
}

/// Parameters for enumerating objects; the default lists everything
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Restrict enumeration to one bucket
    pub bucket_name: Option<String>,
    /// Restrict enumeration to keys starting with this prefix
    pub prefix: Option<String>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket_name(mut self, bucket_name: impl Into<String>) -> Self {
        self.bucket_name = Some(bucket_name.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(bucket_name) = &self.bucket_name {
            require_name("list", "bucket name", bucket_name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ChaChaCryptoService;

    #[test]
    fn test_compose_applies_in_order() {
        let mut options = StoreOptions::new();
        compose(
            &mut options,
            vec![
                StoreOption::attribute("key1", "value"),
                StoreOption::attribute("key1", "override"),
                StoreOption::crypto_service(Arc::new(ChaChaCryptoService::generate())),
            ],
        )
        .unwrap();

        assert_eq!(options.attributes().get_str("key1"), Some("override"));
        assert!(options.crypto_service().is_some());
    }

    #[test]
    fn test_compose_stops_at_first_failure() {
        let mut options = StoreOptions::new();
        let result = compose(
            &mut options,
            vec![
                StoreOption::attribute("first", 1),
                StoreOption::attribute("", 2),
                StoreOption::attribute("third", 3),
            ],
        );

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
        assert!(options.attributes().contains("first"));
        assert!(!options.attributes().contains("third"));
    }

    #[test]
    fn test_get_requires_names() {
        assert!(GetOptions::new("bucket", "object").validate().is_ok());

        let err = GetOptions::new("", "object").validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid get option: bucket name must not be empty");
        assert!(GetOptions::new("bucket", " ").validate().is_err());
    }

    #[test]
    fn test_set_builder() {
        let opts = SetOptions::new("bucket1", "object1")
            .content_type("text/plain")
            .data(&b"objectValue1"[..])
            .public(true);

        assert!(opts.validate().is_ok());
        assert_eq!(opts.data.as_ref(), b"objectValue1");
        assert_eq!(opts.attributes.is_public(), Some(true));
        assert!(SetOptions::new("b", "o").content_type("").validate().is_err());
    }

    #[test]
    fn test_copy_rejects_self_copy() {
        assert!(CopyOptions::new("a", "x", "b", "x").validate().is_ok());
        assert!(CopyOptions::new("a", "x", "a", "x").validate().is_err());
        assert!(CopyOptions::new("a", "x", "", "y").validate().is_err());
    }

    #[test]
    fn test_list_filters() {
        assert!(ListOptions::new().validate().is_ok());
        assert!(ListOptions::new().bucket_name("b").prefix("logs/").validate().is_ok());
        assert!(ListOptions::new().bucket_name("").validate().is_err());
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let option = StoreOption::crypto_service(Arc::new(
            ChaChaCryptoService::new(b"01234567890123456789012345678901").unwrap(),
        ));
        assert!(!format!("{:?}", option).contains("0123456789"));
    }
}
