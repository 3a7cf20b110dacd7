//! Snapshot decoding.
//!
//! Every document is decoded independently; one failure never aborts the
//! others. Successes and failures both keep source order.

use docstream_core::{
    ChangeKind, DecodeFailure, Decoder, Document, DocumentChange, QuerySnapshot,
};

/// Result of decoding one document.
#[derive(Debug)]
pub enum DecodeOutcome<T> {
    /// The document decoded.
    Decoded(T),
    /// The document did not decode.
    Failed(DecodeFailure),
}

impl<T> DecodeOutcome<T> {
    /// Decodes one document.
    pub fn of(document: &Document, decoder: &Decoder<T>) -> Self {
        match decoder.decode(document) {
            Ok(value) => DecodeOutcome::Decoded(value),
            Err(error) => DecodeOutcome::Failed(DecodeFailure::new(document.id(), error)),
        }
    }

    /// Returns true if the document decoded.
    #[inline]
    pub fn is_decoded(&self) -> bool {
        matches!(self, DecodeOutcome::Decoded(_))
    }
}

/// Decoded items of one snapshot, partitioned.
#[derive(Debug)]
pub struct Decoded<T> {
    /// Successfully decoded items, in source order.
    pub items: Vec<T>,
    /// Failures, in source order.
    pub failures: Vec<DecodeFailure>,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Decoded<T> {
    /// Returns the number of items that were attempted.
    #[inline]
    pub fn total(&self) -> usize {
        self.items.len() + self.failures.len()
    }

    /// Returns the number of failures.
    #[inline]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

impl<T> FromIterator<DecodeOutcome<T>> for Decoded<T> {
    fn from_iter<I: IntoIterator<Item = DecodeOutcome<T>>>(iter: I) -> Self {
        let mut decoded = Decoded::default();
        for outcome in iter {
            match outcome {
                DecodeOutcome::Decoded(item) => decoded.items.push(item),
                DecodeOutcome::Failed(failure) => decoded.failures.push(failure),
            }
        }
        decoded
    }
}

/// Decodes a sequence of documents.
pub fn decode_documents<'a, T, I>(documents: I, decoder: &Decoder<T>) -> Decoded<T>
where
    I: IntoIterator<Item = &'a Document>,
{
    documents
        .into_iter()
        .map(|doc| DecodeOutcome::of(doc, decoder))
        .collect()
}

/// Decodes every document of a snapshot.
pub fn decode_snapshot<T>(snapshot: &QuerySnapshot, decoder: &Decoder<T>) -> Decoded<T> {
    decode_documents(snapshot.documents(), decoder)
}

/// Decodes the document changes of a snapshot, pairing each with its kind.
pub fn decode_changes<T>(
    changes: &[DocumentChange],
    decoder: &Decoder<T>,
) -> Decoded<(ChangeKind, T)> {
    changes
        .iter()
        .map(|change| match DecodeOutcome::of(&change.document, decoder) {
            DecodeOutcome::Decoded(value) => DecodeOutcome::Decoded((change.kind, value)),
            DecodeOutcome::Failed(failure) => DecodeOutcome::Failed(failure),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstream_core::DecodeError;
    use serde_json::json;

    fn value_decoder() -> Decoder<i64> {
        Decoder::new(|doc: &Document| {
            doc.field("value")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| DecodeError::new("value is not an integer"))
        })
    }

    fn docs(values: &[serde_json::Value]) -> Vec<Document> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Document::new(format!("d{}", i), json!({ "value": v })))
            .collect()
    }

    #[test]
    fn test_decode_all_succeed() {
        let snapshot = QuerySnapshot::new(docs(&[json!(1), json!(2)]));
        let decoded = decode_snapshot(&snapshot, &value_decoder());

        assert_eq!(decoded.items, vec![1, 2]);
        assert!(decoded.failures.is_empty());
        assert_eq!(decoded.total(), 2);
    }

    #[test]
    fn test_decode_failure_does_not_abort_others() {
        let snapshot = QuerySnapshot::new(docs(&[json!(1), json!("x"), json!(3), json!(null)]));
        let decoded = decode_snapshot(&snapshot, &value_decoder());

        assert_eq!(decoded.items, vec![1, 3]);
        let failed: Vec<_> = decoded
            .failures
            .iter()
            .map(|f| f.document_id.as_str())
            .collect();
        assert_eq!(failed, vec!["d1", "d3"]);
        assert_eq!(decoded.total(), 4);
    }

    #[test]
    fn test_decode_empty_snapshot() {
        let decoded = decode_snapshot(&QuerySnapshot::default(), &value_decoder());
        assert_eq!(decoded.total(), 0);
    }

    #[test]
    fn test_decode_changes_keeps_kind() {
        let changes = vec![
            DocumentChange::new(ChangeKind::Added, Document::new("a", json!({ "value": 1 }))),
            DocumentChange::new(ChangeKind::Removed, Document::new("b", json!({ "value": "?" }))),
            DocumentChange::new(ChangeKind::Modified, Document::new("c", json!({ "value": 3 }))),
        ];
        let decoded = decode_changes(&changes, &value_decoder());

        assert_eq!(
            decoded.items,
            vec![(ChangeKind::Added, 1), (ChangeKind::Modified, 3)]
        );
        assert_eq!(decoded.failure_count(), 1);
        assert_eq!(decoded.failures[0].document_id, "b");
    }

    #[test]
    fn test_outcome() {
        let ok = DecodeOutcome::of(&Document::new("a", json!({ "value": 1 })), &value_decoder());
        assert!(ok.is_decoded());

        let bad = DecodeOutcome::of(&Document::new("b", json!({})), &value_decoder());
        assert!(!bad.is_decoded());
    }
}
