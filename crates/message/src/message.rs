use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use capnp::message::{Builder, ReaderOptions};
use capnp::serialize_packed;
use proto::message_capnp::payload;

use crate::error::MessageError;

struct Inner {
    content: Vec<u8>,
    properties: HashMap<String, String>,
}

/// An immutable, reference-counted message: content bytes plus a string
/// property map. Clones are O(1) and share storage; the last clone dropped
/// frees it. There is no explicit destroy call, and no mutation after
/// construction.
#[derive(Clone)]
pub struct Message {
    inner: Arc<Inner>,
}

impl Message {
    pub fn create(content: impl Into<Vec<u8>>, properties: HashMap<String, String>) -> Message {
        Message {
            inner: Arc::new(Inner {
                content: content.into(),
                properties,
            }),
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.inner.content
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.inner.properties
    }

    /// Serialize to the wire payload format. Always allocates a fresh
    /// buffer sized to the encoded length; there is no separate
    /// size-query pass.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut builder = Builder::new_default();
        {
            let mut root = builder.init_root::<payload::Builder>();
            root.set_content(&self.inner.content);
            let mut props = root.init_properties(self.inner.properties.len() as u32);
            for (i, (k, v)) in self.inner.properties.iter().enumerate() {
                let mut entry = props.reborrow().get(i as u32);
                entry.set_key(k.as_str().into());
                entry.set_value(v.as_str().into());
            }
        }
        let mut buf = Vec::new();
        serialize_packed::write_message(&mut buf, &builder)
            .expect("writing to an in-memory Vec cannot fail");
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Message, MessageError> {
        let mut cursor = Cursor::new(buf);
        let reader = serialize_packed::read_message(&mut cursor, ReaderOptions::new())?;
        let root = reader.get_root::<payload::Reader>()?;

        let content = root.get_content()?.to_vec();
        let mut properties = HashMap::new();
        for entry in root.get_properties()?.iter() {
            let key = entry.get_key()?.to_string()?;
            let value = entry.get_value()?.to_string()?;
            properties.insert(key, value);
        }

        Ok(Message::create(content, properties))
    }

    /// True if this and `other` are the same allocation (same `Arc`).
    /// Exposed for tests that need to reason about sharing rather than
    /// value equality.
    pub fn ptr_eq(&self, other: &Message) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn round_trip_preserves_content_and_properties() {
        let m = Message::create(b"hello".to_vec(), props(&[("k", "v"), ("a", "b")]));
        let bytes = m.to_bytes();
        let decoded = Message::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded.content(), b"hello");
        assert_eq!(decoded.properties(), m.properties());
    }

    #[test]
    fn round_trip_empty_content_and_properties() {
        let m = Message::create(Vec::new(), HashMap::new());
        let bytes = m.to_bytes();
        let decoded = Message::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded.content(), b"");
        assert!(decoded.properties().is_empty());
    }

    #[test]
    fn clone_shares_storage_and_refcount_drops_to_one() {
        let m = Message::create(b"x".to_vec(), HashMap::new());
        assert_eq!(m.strong_count(), 1);
        let m2 = m.clone();
        assert_eq!(m.strong_count(), 2);
        assert!(m.ptr_eq(&m2));
        drop(m2);
        assert_eq!(m.strong_count(), 1);
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        let err = Message::from_bytes(&[0xff, 0x00, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, MessageError::Malformed(_)));
    }
}
