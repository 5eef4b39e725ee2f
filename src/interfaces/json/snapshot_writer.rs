use crate::domain::session::PaymentSession;
use crate::error::Result;
use std::io::Write;

/// Writes session snapshots as JSON lines, flushing after each one.
pub struct SnapshotWriter<W: Write> {
    writer: W,
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_snapshot(&mut self, snapshot: &PaymentSession) -> Result<()> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{PaymentMethod, PaymentStatus};

    #[test]
    fn test_writes_camel_case_lines() {
        let snapshot = PaymentSession {
            payment_id: "pay_1".to_string(),
            tracking_key: None,
            method: PaymentMethod::Mpesa,
            status: PaymentStatus::Failed,
            error_message: Some("Wrong M-Pesa PIN entered".to_string()),
            channel_connected: false,
            channel_error: None,
            fallback_armed: false,
            fallback_fired: true,
            fallback_answered: true,
        };

        let mut buf = Vec::new();
        let mut writer = SnapshotWriter::new(&mut buf);
        writer.write_snapshot(&snapshot).unwrap();
        writer.write_snapshot(&snapshot).unwrap();

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""paymentId":"pay_1""#));
        assert!(lines[0].contains(r#""status":"failed""#));
        assert!(lines[0].contains(r#""errorMessage":"Wrong M-Pesa PIN entered""#));
        assert!(lines[0].contains(r#""fallbackFired":true"#));
    }
}
