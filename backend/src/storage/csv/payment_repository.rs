use anyhow::Result;
use async_trait::async_trait;
use csv::{Reader, Writer};
use log::warn;
use shared::{Payment, PaymentStatus};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};

use super::connection::CsvConnection;
use crate::storage::PaymentStorage;

const PAYMENTS_HEADER: &str = "id,student_id,amount,paid_amount,due_date,paid_date,installment_number,status,notes,created_at,updated_at";

/// CSV-based payment repository
#[derive(Clone)]
pub struct PaymentRepository {
    connection: CsvConnection,
}

impl PaymentRepository {
    /// Create a new CSV payment repository
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    /// Read all payments from the CSV file
    fn read_payments(&self) -> Result<Vec<Payment>> {
        let file_path = self.connection.get_payments_file_path();
        self.connection
            .ensure_csv_file_exists(&file_path, PAYMENTS_HEADER)?;

        let file = File::open(&file_path)?;
        let reader = BufReader::new(file);
        let mut csv_reader = Reader::from_reader(reader);

        let mut payments = Vec::new();

        for result in csv_reader.records() {
            let record = result?;

            let status = match record.get(7).unwrap_or("").parse::<PaymentStatus>() {
                Ok(status) => status,
                Err(_) => {
                    warn!(
                        "Payment {} has unrecognised status '{}', defaulting to pending",
                        record.get(0).unwrap_or(""),
                        record.get(7).unwrap_or("")
                    );
                    PaymentStatus::Pending
                }
            };

            let payment = Payment {
                id: record.get(0).unwrap_or("").to_string(),
                student_id: record.get(1).unwrap_or("").to_string(),
                amount: record.get(2).unwrap_or("0").parse::<f64>().unwrap_or(0.0),
                paid_amount: record.get(3).unwrap_or("0").parse::<f64>().unwrap_or(0.0),
                due_date: record.get(4).unwrap_or("").to_string(),
                paid_date: record
                    .get(5)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string()),
                installment_number: record.get(6).unwrap_or("1").parse::<u32>().unwrap_or(1),
                status,
                notes: record
                    .get(8)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string()),
                created_at: record.get(9).unwrap_or("").to_string(),
                updated_at: record.get(10).unwrap_or("").to_string(),
            };

            payments.push(payment);
        }

        Ok(payments)
    }

    /// Write all payments to the CSV file
    fn write_payments(&self, payments: &[Payment]) -> Result<()> {
        let file_path = self.connection.get_payments_file_path();

        // Create a temporary file for atomic write
        let temp_path = file_path.with_extension("tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;

            let writer = BufWriter::new(file);
            let mut csv_writer = Writer::from_writer(writer);

            csv_writer.write_record([
                "id",
                "student_id",
                "amount",
                "paid_amount",
                "due_date",
                "paid_date",
                "installment_number",
                "status",
                "notes",
                "created_at",
                "updated_at",
            ])?;

            for payment in payments {
                csv_writer.write_record([
                    &payment.id,
                    &payment.student_id,
                    &payment.amount.to_string(),
                    &payment.paid_amount.to_string(),
                    &payment.due_date,
                    payment.paid_date.as_deref().unwrap_or(""),
                    &payment.installment_number.to_string(),
                    payment.status.as_str(),
                    payment.notes.as_deref().unwrap_or(""),
                    &payment.created_at,
                    &payment.updated_at,
                ])?;
            }

            csv_writer.flush()?;
        }

        // Atomic move from temp to final file
        std::fs::rename(&temp_path, &file_path)?;

        Ok(())
    }
}

#[async_trait]
impl PaymentStorage for PaymentRepository {
    async fn store_payment(&self, payment: &Payment) -> Result<()> {
        let mut payments = self.read_payments()?;
        payments.push(payment.clone());
        self.write_payments(&payments)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>> {
        let payments = self.read_payments()?;
        Ok(payments.into_iter().find(|p| p.id == payment_id))
    }

    async fn list_payments(&self) -> Result<Vec<Payment>> {
        let mut payments = self.read_payments()?;
        payments.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        Ok(payments)
    }

    async fn list_payments_by_student(&self, student_id: &str) -> Result<Vec<Payment>> {
        let mut payments = self.read_payments()?;
        payments.retain(|p| p.student_id == student_id);
        payments.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        Ok(payments)
    }

    async fn update_payment(&self, payment: &Payment) -> Result<()> {
        let mut payments = self.read_payments()?;

        match payments.iter_mut().find(|p| p.id == payment.id) {
            Some(existing) => {
                *existing = payment.clone();
                self.write_payments(&payments)
            }
            None => Err(anyhow::anyhow!("Payment not found: {}", payment.id)),
        }
    }

    async fn delete_payment(&self, payment_id: &str) -> Result<bool> {
        let mut payments = self.read_payments()?;
        let original_len = payments.len();
        payments.retain(|p| p.id != payment_id);

        if payments.len() == original_len {
            return Ok(false);
        }

        self.write_payments(&payments)?;
        Ok(true)
    }

    async fn delete_payments_by_student(&self, student_id: &str) -> Result<u32> {
        let mut payments = self.read_payments()?;
        let original_len = payments.len();
        payments.retain(|p| p.student_id != student_id);

        let deleted = (original_len - payments.len()) as u32;
        if deleted > 0 {
            self.write_payments(&payments)?;
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_repo() -> (PaymentRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let connection = CsvConnection::new(temp_dir.path()).unwrap();
        (PaymentRepository::new(connection), temp_dir)
    }

    fn sample_payment(id: &str, student_id: &str, due_date: &str) -> Payment {
        let now = chrono::Utc::now().to_rfc3339();
        Payment {
            id: id.to_string(),
            student_id: student_id.to_string(),
            amount: 5000.0,
            paid_amount: 0.0,
            due_date: due_date.to_string(),
            paid_date: None,
            installment_number: 1,
            status: PaymentStatus::Pending,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_store_and_get_payment() {
        let (repo, _temp_dir) = setup_test_repo();
        let payment = sample_payment("payment::1", "student::1", "2024-06-01");

        repo.store_payment(&payment).await.unwrap();

        let retrieved = repo.get_payment("payment::1").await.unwrap();
        assert_eq!(retrieved, Some(payment));
    }

    #[tokio::test]
    async fn test_list_payments_ordered_by_due_date() {
        let (repo, _temp_dir) = setup_test_repo();
        repo.store_payment(&sample_payment("payment::1", "student::1", "2024-09-01"))
            .await
            .unwrap();
        repo.store_payment(&sample_payment("payment::2", "student::1", "2024-03-01"))
            .await
            .unwrap();

        let payments = repo.list_payments().await.unwrap();
        let due_dates: Vec<&str> = payments.iter().map(|p| p.due_date.as_str()).collect();
        assert_eq!(due_dates, vec!["2024-03-01", "2024-09-01"]);
    }

    #[tokio::test]
    async fn test_notes_with_commas_survive_round_trip() {
        let (repo, _temp_dir) = setup_test_repo();
        let mut payment = sample_payment("payment::1", "student::1", "2024-06-01");
        payment.notes = Some("Paid in cash, receipt #42".to_string());

        repo.store_payment(&payment).await.unwrap();

        let retrieved = repo.get_payment("payment::1").await.unwrap().unwrap();
        assert_eq!(retrieved.notes.as_deref(), Some("Paid in cash, receipt #42"));
    }

    #[tokio::test]
    async fn test_delete_payments_by_student() {
        let (repo, _temp_dir) = setup_test_repo();
        repo.store_payment(&sample_payment("payment::1", "student::1", "2024-03-01"))
            .await
            .unwrap();
        repo.store_payment(&sample_payment("payment::2", "student::1", "2024-04-01"))
            .await
            .unwrap();
        repo.store_payment(&sample_payment("payment::3", "student::2", "2024-05-01"))
            .await
            .unwrap();

        let deleted = repo.delete_payments_by_student("student::1").await.unwrap();
        assert_eq!(deleted, 2);

        let remaining = repo.list_payments().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].student_id, "student::2");

        // Deleting again is a no-op.
        assert_eq!(
            repo.delete_payments_by_student("student::1").await.unwrap(),
            0
        );
    }
}
