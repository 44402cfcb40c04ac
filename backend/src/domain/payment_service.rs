use anyhow::Result;
use chrono::{NaiveDate, Utc};
use log::{info, warn};

use crate::storage::csv::{
    CsvConnection, PaymentRepository, SettingsRepository, StudentRepository,
};
use crate::storage::{PaymentStorage, SettingsStorage, StudentStorage};
use shared::{
    CreatePaymentRequest, EffectivePaymentStatus, Payment, PaymentFilter, PaymentResponse,
    PaymentRow, PaymentStatus, PaymentSummary, RecordPaymentRequest, UpdatePaymentRequest,
};

/// Service for managing payment installments and financial rollups
#[derive(Clone)]
pub struct PaymentService {
    payment_repository: PaymentRepository,
    student_repository: StudentRepository,
    settings_repository: SettingsRepository,
}

impl PaymentService {
    /// Create a new PaymentService
    pub fn new(connection: CsvConnection) -> Self {
        Self {
            payment_repository: PaymentRepository::new(connection.clone()),
            student_repository: StudentRepository::new(connection.clone()),
            settings_repository: SettingsRepository::new(connection),
        }
    }

    /// Classify a payment for display, evaluated in precedence order:
    /// a stored `paid` stays paid, a stored `partial` stays partial even
    /// past its due date, anything else past its due date is overdue, and
    /// the rest is pending. Unparseable due dates classify as pending.
    pub fn classify(payment: &Payment, today: NaiveDate) -> EffectivePaymentStatus {
        match payment.status {
            PaymentStatus::Paid => EffectivePaymentStatus::Paid,
            PaymentStatus::Partial => EffectivePaymentStatus::Partial,
            PaymentStatus::Pending => {
                match NaiveDate::parse_from_str(&payment.due_date, "%Y-%m-%d") {
                    Ok(due_date) if due_date < today => EffectivePaymentStatus::Overdue,
                    _ => EffectivePaymentStatus::Pending,
                }
            }
        }
    }

    /// Create a new payment installment
    pub async fn create_payment(&self, request: CreatePaymentRequest) -> Result<PaymentResponse> {
        info!(
            "Creating payment: student={}, amount={}",
            request.student_id, request.amount
        );

        self.validate_amount(request.amount)?;
        self.validate_notes(request.notes.as_deref()).await?;

        let existing = self.payment_repository.list_payments().await?;

        let now = Utc::now();
        let timestamp_millis = now.timestamp_millis() as u64;
        let timestamp_rfc3339 = now.to_rfc3339();

        let payment = Payment {
            id: Payment::generate_unique_id(timestamp_millis, &existing),
            student_id: request.student_id,
            amount: request.amount,
            paid_amount: 0.0,
            due_date: request.due_date,
            paid_date: None,
            installment_number: request.installment_number.unwrap_or(1),
            status: PaymentStatus::Pending,
            notes: request.notes,
            created_at: timestamp_rfc3339.clone(),
            updated_at: timestamp_rfc3339,
        };

        self.payment_repository.store_payment(&payment).await?;

        info!("Created payment with ID: {}", payment.id);

        Ok(PaymentResponse {
            payment,
            success_message: "Payment installment created successfully".to_string(),
        })
    }

    /// Get a payment by ID
    pub async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>> {
        self.payment_repository.get_payment(payment_id).await
    }

    /// Update an existing payment installment.
    ///
    /// Editing resets collection progress: the stored status returns to
    /// `pending`, the paid amount to 0, and the paid date is cleared, the
    /// same state a freshly created installment starts in.
    pub async fn update_payment(
        &self,
        payment_id: &str,
        request: UpdatePaymentRequest,
    ) -> Result<PaymentResponse> {
        info!("Updating payment: {}", payment_id);

        let mut payment = self
            .payment_repository
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Payment not found: {}", payment_id))?;

        if let Some(student_id) = request.student_id {
            payment.student_id = student_id;
        }
        if let Some(amount) = request.amount {
            self.validate_amount(amount)?;
            payment.amount = amount;
        }
        if let Some(due_date) = request.due_date {
            payment.due_date = due_date;
        }
        if let Some(installment_number) = request.installment_number {
            payment.installment_number = installment_number;
        }
        if let Some(notes) = request.notes {
            self.validate_notes(Some(&notes)).await?;
            payment.notes = Some(notes);
        }

        payment.status = PaymentStatus::Pending;
        payment.paid_amount = 0.0;
        payment.paid_date = None;
        payment.updated_at = Utc::now().to_rfc3339();

        self.payment_repository.update_payment(&payment).await?;

        Ok(PaymentResponse {
            payment,
            success_message: "Payment installment updated successfully".to_string(),
        })
    }

    /// Record money received against an installment.
    ///
    /// The received amount adds to whatever was already paid. Once nothing
    /// remains the installment is paid; otherwise it is partial. Receiving
    /// more than the remaining amount is not rejected, the remainder just
    /// goes negative.
    pub async fn record_payment(&self, request: RecordPaymentRequest) -> Result<PaymentResponse> {
        info!(
            "Recording payment of {} against {}",
            request.amount_received, request.payment_id
        );

        if request.amount_received <= 0.0 || !request.amount_received.is_finite() {
            return Err(anyhow::anyhow!("Received amount must be greater than zero"));
        }
        self.validate_notes(request.notes.as_deref()).await?;

        let mut payment = self
            .payment_repository
            .get_payment(&request.payment_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Payment not found: {}", request.payment_id))?;

        payment.paid_amount += request.amount_received;
        let remaining = payment.remaining();
        payment.status = if remaining <= 0.0 {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        };
        payment.paid_date = Some(request.paid_date);
        if let Some(notes) = request.notes {
            payment.notes = Some(notes);
        }
        payment.updated_at = Utc::now().to_rfc3339();

        if remaining < 0.0 {
            warn!(
                "Payment {} overpaid by {}",
                payment.id,
                -remaining
            );
        }

        self.payment_repository.update_payment(&payment).await?;

        let success_message = if payment.status == PaymentStatus::Paid {
            "Payment completed!".to_string()
        } else {
            "Payment recorded".to_string()
        };

        Ok(PaymentResponse {
            payment,
            success_message,
        })
    }

    /// Delete a payment installment
    pub async fn delete_payment(&self, payment_id: &str) -> Result<String> {
        info!("Deleting payment: {}", payment_id);

        let deleted = self.payment_repository.delete_payment(payment_id).await?;
        if !deleted {
            return Err(anyhow::anyhow!("Payment not found: {}", payment_id));
        }

        Ok("Payment deleted successfully".to_string())
    }

    /// List all payments for one student, ordered by due date
    pub async fn list_student_payments(&self, student_id: &str) -> Result<Vec<Payment>> {
        self.payment_repository
            .list_payments_by_student(student_id)
            .await
    }

    /// List payments prepared for display, filtered and with student
    /// references resolved
    pub async fn list_payment_rows(&self, filter: &PaymentFilter) -> Result<Vec<PaymentRow>> {
        self.list_payment_rows_on(filter, Utc::now().date_naive())
            .await
    }

    /// Same as [`Self::list_payment_rows`] with an explicit notion of today
    pub async fn list_payment_rows_on(
        &self,
        filter: &PaymentFilter,
        today: NaiveDate,
    ) -> Result<Vec<PaymentRow>> {
        let payments = self.payment_repository.list_payments().await?;
        let students = self.student_repository.list_students().await?;

        let mut rows = Vec::with_capacity(payments.len());

        for payment in payments {
            let student = students.iter().find(|s| s.id == payment.student_id);
            let (student_name, student_email) = match student {
                Some(student) => (student.name.clone(), student.email.clone()),
                None => ("Unknown".to_string(), String::new()),
            };

            let effective_status = Self::classify(&payment, today);
            let days_until_due = NaiveDate::parse_from_str(&payment.due_date, "%Y-%m-%d")
                .ok()
                .map(|due_date| (due_date - today).num_days());

            rows.push(PaymentRow {
                remaining: payment.remaining(),
                payment,
                student_name,
                student_email,
                effective_status,
                days_until_due,
            });
        }

        if let Some(status) = filter.status {
            rows.retain(|r| r.effective_status == status);
        }
        if let Some(query) = &filter.query {
            let query = query.to_lowercase();
            rows.retain(|r| r.student_name.to_lowercase().contains(&query));
        }

        Ok(rows)
    }

    /// Build the global financial rollup across all installments
    pub async fn payment_summary(&self) -> Result<PaymentSummary> {
        self.payment_summary_on(Utc::now().date_naive()).await
    }

    /// Same as [`Self::payment_summary`] with an explicit notion of today
    pub async fn payment_summary_on(&self, today: NaiveDate) -> Result<PaymentSummary> {
        let payments = self.payment_repository.list_payments().await?;

        let mut summary = PaymentSummary {
            total_installments: payments.len() as u32,
            ..Default::default()
        };

        for payment in &payments {
            match payment.status {
                PaymentStatus::Paid => {
                    summary.total_collected += payment.paid_amount;
                    summary.completed_count += 1;
                }
                PaymentStatus::Pending | PaymentStatus::Partial => {
                    summary.total_pending += payment.remaining();
                }
            }

            if Self::classify(payment, today) == EffectivePaymentStatus::Overdue {
                summary.overdue_amount += payment.remaining();
                summary.overdue_count += 1;
            }
        }

        Ok(summary)
    }

    fn validate_amount(&self, amount: f64) -> Result<()> {
        if amount <= 0.0 || !amount.is_finite() {
            return Err(anyhow::anyhow!("Payment amount must be greater than zero"));
        }
        Ok(())
    }

    async fn validate_notes(&self, notes: Option<&str>) -> Result<()> {
        if let Some(notes) = notes {
            let config = self.settings_repository.get_config().await?;
            if notes.len() > config.max_notes_length {
                return Err(anyhow::anyhow!(
                    "Notes cannot exceed {} characters",
                    config.max_notes_length
                ));
            }
        }
        Ok(())
    }
}
