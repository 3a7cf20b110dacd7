//! Explicit document decoders.
//!
//! A `Decoder<T>` is a shared function `&Document -> Result<T, DecodeError>`.
//! Callers hand one to every subscription; `Decoder::json()` covers any
//! `serde` type.

use crate::document::Document;
use crate::error::DecodeError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

type DecodeFn<T> = dyn Fn(&Document) -> Result<T, DecodeError> + Send + Sync;

/// Maps a document to a typed value.
pub struct Decoder<T> {
    decode: Arc<DecodeFn<T>>,
}

impl<T> Clone for Decoder<T> {
    fn clone(&self) -> Self {
        Self {
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<T> Decoder<T> {
    /// Creates a decoder from a function.
    pub fn new<F>(decode: F) -> Self
    where
        F: Fn(&Document) -> Result<T, DecodeError> + Send + Sync + 'static,
    {
        Self {
            decode: Arc::new(decode),
        }
    }

    /// Decodes one document.
    #[inline]
    pub fn decode(&self, document: &Document) -> Result<T, DecodeError> {
        (self.decode)(document)
    }

    /// Returns a decoder that applies `f` to every decoded value.
    pub fn map<U, F>(self, f: F) -> Decoder<U>
    where
        T: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Decoder::new(move |doc| self.decode(doc).map(&f))
    }
}

impl<T: DeserializeOwned> Decoder<T> {
    /// Decodes the document fields with `serde`.
    pub fn json() -> Self {
        Decoder::new(|doc| {
            T::deserialize(doc.data()).map_err(|err| {
                DecodeError::with_source(format!("document {}: {}", doc.id(), err), err)
            })
        })
    }

    /// Decodes the document fields with `serde`, first copying the document
    /// id into `field` when the fields do not already carry it.
    pub fn json_with_id(field: &'static str) -> Self {
        Decoder::new(move |doc| {
            let mut data = doc.data().clone();
            if let Value::Object(map) = &mut data {
                map.entry(field)
                    .or_insert_with(|| Value::String(doc.id().to_string()));
            }
            T::deserialize(data).map_err(|err| {
                DecodeError::with_source(format!("document {}: {}", doc.id(), err), err)
            })
        })
    }
}
