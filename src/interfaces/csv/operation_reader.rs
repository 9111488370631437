use crate::domain::operation::Operation;
use crate::error::{Result, SyncError};
use std::io::Read;

/// Reads write operations from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<Operation>`.
/// It trims whitespace and tolerates short records, so trailing optional
/// columns may be left off.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes operations.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(SyncError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::operation::OperationType;
    use crate::domain::payment::Side;

    #[test]
    fn test_reader_valid_stream() {
        let data = "collection,operation,key,paid,paid_on,amount,note\n\
                    invoices,insert,INV-1,,,100.00,March retainer\n\
                    payments,update_one,INV-1,true,,,";
        let reader = OperationReader::new(data.as_bytes());
        let results: Vec<Result<Operation>> = reader.operations().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.collection, Side::Source);
        assert_eq!(first.note.as_deref(), Some("March retainer"));
        let second = results[1].as_ref().unwrap();
        assert_eq!(second.operation, OperationType::UpdateOne);
        assert_eq!(second.paid, Some(true));
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "collection,operation,key,paid,paid_on,amount,note\n\
                    ledgers,update_one,INV-1,true,,,\n\
                    invoices,update_one,INV-1,maybe,,,";
        let reader = OperationReader::new(data.as_bytes());
        let results: Vec<Result<Operation>> = reader.operations().collect();

        assert!(results[0].is_err());
        assert!(results[1].is_err());
    }
}
