use crate::domain::payment::PaymentStatus;
use crate::error::Result;
use std::io::Write;

/// Writes the final payment status of both collections as CSV.
pub struct StatusWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StatusWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_statuses(&mut self, statuses: impl IntoIterator<Item = PaymentStatus>) -> Result<()> {
        for status in statuses {
            self.writer.serialize(status)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::Side;
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_statuses() {
        let statuses = vec![
            PaymentStatus {
                collection: Side::Source,
                key: "INV-1".to_owned(),
                amount: Some(dec!(100.00)),
                paid: true,
                paid_on: Some("2024-03-01T00:00:00Z".to_owned()),
            },
            PaymentStatus {
                collection: Side::Mirror,
                key: "INV-1".to_owned(),
                amount: None,
                paid: false,
                paid_on: None,
            },
        ];

        let mut buffer = Vec::new();
        StatusWriter::new(&mut buffer).write_statuses(statuses).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "collection,key,amount,paid,paid_on");
        assert_eq!(lines[1], "invoices,INV-1,100.00,true,2024-03-01T00:00:00Z");
        assert_eq!(lines[2], "payments,INV-1,,false,");
    }
}
