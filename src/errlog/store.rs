use super::types::DecodedRecord;

/// Ordered collection of decoded records, newest first. Append re-sorts by
/// the derived absolute timestamp with a stable sort, so records sharing a
/// timestamp keep their arrival order.
#[derive(Debug, Default)]
pub struct LogStore {
    records: Vec<DecodedRecord>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: DecodedRecord) {
        self.records.push(record);
        self.records
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[DecodedRecord] {
        &self.records
    }

    pub fn snapshot(&self) -> Vec<DecodedRecord> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
