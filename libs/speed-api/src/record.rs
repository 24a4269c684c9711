use std::sync::LazyLock;

use serde::Serialize;

/// Field every benchmark record carries. Deletes and cleanup are scoped to it.
pub const MARKER_FIELD: &str = "marker";

/// Value of [`MARKER_FIELD`] on every record this tool writes.
pub const MARKER_VALUE: &str = "mongo-speed";

/// Field no record has; the read query filters on it so it matches everything.
pub const ABSENT_FIELD: &str = "absent";

const PAYLOAD_LEN: usize = 4096;

static PAYLOAD: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    (0..PAYLOAD_LEN)
        .map(|i| if i % 2 == 0 { "lotsa data!" } else { "yay!" })
        .collect()
});

/// Composite synthetic `_id`: a unique token plus a sequence number.
///
/// Inserts run fast enough that server-generated ids are not relied upon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RecordId {
    pub token: String,
    pub seq: u64,
}

impl RecordId {
    pub fn fresh(seq: u64) -> Self {
        Self {
            token: uuid::Uuid::now_v7().simple().to_string(),
            seq,
        }
    }
}

/// Fixed-shape benchmark document. Only `_id` changes between records.
#[derive(Debug, Clone, Serialize)]
pub struct BenchRecord {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub marker: &'static str,
    pub payload: &'static [&'static str],
    pub nothing: Option<String>,
}

impl BenchRecord {
    pub fn new(seq: u64) -> Self {
        Self {
            id: RecordId::fresh(seq),
            marker: MARKER_VALUE,
            payload: PAYLOAD.as_slice(),
            nothing: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_for_same_seq() {
        let a = BenchRecord::new(3);
        let b = BenchRecord::new(3);
        assert_eq!(a.id.seq, b.id.seq);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn serialized_shape() {
        let value = serde_json::to_value(BenchRecord::new(7)).unwrap();
        assert_eq!(value["_id"]["seq"], 7);
        assert_eq!(value["_id"]["token"].as_str().unwrap().len(), 32);
        assert_eq!(value[MARKER_FIELD], MARKER_VALUE);
        assert_eq!(value["payload"].as_array().unwrap().len(), PAYLOAD_LEN);
        assert!(value["nothing"].is_null());
        assert!(value.get(ABSENT_FIELD).is_none());
    }

    #[test]
    fn seq_past_u32_is_kept() {
        let seq = u64::from(u32::MAX) + 1;
        let value = serde_json::to_value(BenchRecord::new(seq)).unwrap();
        assert_eq!(value["_id"]["seq"], seq);
    }
}
