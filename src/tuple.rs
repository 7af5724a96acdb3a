use std::ops::Deref;
use std::sync::Arc;

/// An opaque, reference-counted, immutable byte record.
///
/// The coordinator never interprets the bytes; it only hands out clones (which bump the
/// refcount) and drops them at terminal transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple(Arc<[u8]>);

impl Tuple {
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl Deref for Tuple {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<u8>> for Tuple {
    fn from(v: Vec<u8>) -> Self {
        Self(v.into())
    }
}

impl From<&[u8]> for Tuple {
    fn from(v: &[u8]) -> Self {
        Self(Arc::from(v))
    }
}
