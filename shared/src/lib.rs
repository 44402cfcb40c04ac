use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A course offered by the institute.
///
/// Duration is a count of `duration_unit`s; the fee is the full course fee
/// in the configured currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Course ID in format: "course::<epoch_millis>"
    pub id: String,
    pub name: String,
    pub duration: u32,
    pub duration_unit: DurationUnit,
    pub fee: f64,
    pub description: Option<String>,
    /// RFC 3339 timestamp
    pub created_at: String,
    /// RFC 3339 timestamp
    pub updated_at: String,
}

/// Unit for a course duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl DurationUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Days => "days",
            DurationUnit::Weeks => "weeks",
            DurationUnit::Months => "months",
            DurationUnit::Years => "years",
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DurationUnit {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "days" => Ok(DurationUnit::Days),
            "weeks" => Ok(DurationUnit::Weeks),
            "months" => Ok(DurationUnit::Months),
            "years" => Ok(DurationUnit::Years),
            other => Err(ParseEnumError::new("duration unit", other)),
        }
    }
}

/// A student enrolled in a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    /// Student ID in format: "student::<epoch_millis>"
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// References a Course by ID. May dangle; readers resolve missing
    /// courses to "Unknown" instead of failing.
    pub course_id: String,
    /// ISO 8601 date (YYYY-MM-DD)
    pub joining_date: String,
    /// ISO 8601 date (YYYY-MM-DD), derived from the course duration at
    /// creation but editable afterwards.
    pub end_date: Option<String>,
    pub status: StudentStatus,
    /// RFC 3339 timestamp
    pub created_at: String,
    /// RFC 3339 timestamp
    pub updated_at: String,
}

/// Enrollment status of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
    Completed,
}

impl Default for StudentStatus {
    fn default() -> Self {
        StudentStatus::Active
    }
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
            StudentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StudentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(StudentStatus::Active),
            "inactive" => Ok(StudentStatus::Inactive),
            "completed" => Ok(StudentStatus::Completed),
            other => Err(ParseEnumError::new("student status", other)),
        }
    }
}

/// One fee installment owed by a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID in format: "payment::<epoch_millis>"
    pub id: String,
    /// References a Student by ID. May dangle; readers resolve missing
    /// students to "Unknown" instead of failing.
    pub student_id: String,
    /// Total installment amount owed.
    pub amount: f64,
    /// Amount received so far. May exceed `amount`; overpayment is not
    /// rejected and aggregates must tolerate the negative remainder.
    pub paid_amount: f64,
    /// ISO 8601 date (YYYY-MM-DD)
    pub due_date: String,
    /// ISO 8601 date (YYYY-MM-DD) of the most recent recorded payment.
    pub paid_date: Option<String>,
    pub installment_number: u32,
    /// Stored status. Overdue is never stored; it is derived at read time
    /// from `due_date`.
    pub status: PaymentStatus,
    pub notes: Option<String>,
    /// RFC 3339 timestamp
    pub created_at: String,
    /// RFC 3339 timestamp
    pub updated_at: String,
}

/// Stored payment status. Set to `Pending` at creation and only changed by
/// the record-payment operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "partial" => Ok(PaymentStatus::Partial),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(ParseEnumError::new("payment status", other)),
        }
    }
}

/// Payment status as shown to users, derived from the stored status and
/// the due date. A stored `partial` is never reported `overdue`, even past
/// its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectivePaymentStatus {
    Paid,
    Partial,
    Overdue,
    Pending,
}

impl EffectivePaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectivePaymentStatus::Paid => "paid",
            EffectivePaymentStatus::Partial => "partial",
            EffectivePaymentStatus::Overdue => "overdue",
            EffectivePaymentStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for EffectivePaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EffectivePaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(EffectivePaymentStatus::Paid),
            "partial" => Ok(EffectivePaymentStatus::Partial),
            "overdue" => Ok(EffectivePaymentStatus::Overdue),
            "pending" => Ok(EffectivePaymentStatus::Pending),
            other => Err(ParseEnumError::new("payment status filter", other)),
        }
    }
}

/// One attendance entry for a student on a given date. At most one entry
/// exists per (student, date) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendance {
    /// Attendance ID in format: "attendance::<epoch_millis>"
    pub id: String,
    pub student_id: String,
    /// ISO 8601 date (YYYY-MM-DD)
    pub date: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }

    /// Late students still attended; only `absent` counts against the
    /// attendance rate.
    pub fn counts_as_attended(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            other => Err(ParseEnumError::new("attendance status", other)),
        }
    }
}

/// Error returned when an enum field holds an unrecognised string.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid {kind}: '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Error returned when an entity ID string does not match the expected
/// "<prefix>::<epoch_millis>" shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntityIdError {
    #[error("Invalid entity ID format")]
    InvalidFormat,
    #[error("Invalid entity ID prefix")]
    InvalidPrefix,
    #[error("Invalid timestamp in entity ID")]
    InvalidTimestamp,
}

fn generate_entity_id(prefix: &str, epoch_millis: u64) -> String {
    format!("{}::{}", prefix, epoch_millis)
}

fn parse_entity_id(prefix: &str, id: &str) -> Result<u64, EntityIdError> {
    let parts: Vec<&str> = id.split("::").collect();
    if parts.len() != 2 {
        return Err(EntityIdError::InvalidFormat);
    }
    if parts[0] != prefix {
        return Err(EntityIdError::InvalidPrefix);
    }
    parts[1]
        .parse::<u64>()
        .map_err(|_| EntityIdError::InvalidTimestamp)
}

// Several creates can land in the same millisecond; the timestamp must be
// bumped past every ID already taken or they would share an ID.
fn bump_past_existing<'a>(
    prefix: &str,
    epoch_millis: u64,
    existing_ids: impl Iterator<Item = &'a str>,
) -> u64 {
    let mut millis = epoch_millis;
    for id in existing_ids {
        if let Ok(taken) = parse_entity_id(prefix, id) {
            if taken >= millis {
                millis = taken + 1;
            }
        }
    }
    millis
}

impl Course {
    pub fn generate_id(epoch_millis: u64) -> String {
        generate_entity_id("course", epoch_millis)
    }

    /// Generate an ID guaranteed not to collide with any existing course
    pub fn generate_unique_id(epoch_millis: u64, existing: &[Course]) -> String {
        let millis =
            bump_past_existing("course", epoch_millis, existing.iter().map(|c| c.id.as_str()));
        generate_entity_id("course", millis)
    }

    pub fn parse_id(id: &str) -> Result<u64, EntityIdError> {
        parse_entity_id("course", id)
    }
}

impl Student {
    pub fn generate_id(epoch_millis: u64) -> String {
        generate_entity_id("student", epoch_millis)
    }

    /// Generate an ID guaranteed not to collide with any existing student
    pub fn generate_unique_id(epoch_millis: u64, existing: &[Student]) -> String {
        let millis = bump_past_existing(
            "student",
            epoch_millis,
            existing.iter().map(|s| s.id.as_str()),
        );
        generate_entity_id("student", millis)
    }

    pub fn parse_id(id: &str) -> Result<u64, EntityIdError> {
        parse_entity_id("student", id)
    }
}

impl Payment {
    pub fn generate_id(epoch_millis: u64) -> String {
        generate_entity_id("payment", epoch_millis)
    }

    /// Generate an ID guaranteed not to collide with any existing payment
    pub fn generate_unique_id(epoch_millis: u64, existing: &[Payment]) -> String {
        let millis = bump_past_existing(
            "payment",
            epoch_millis,
            existing.iter().map(|p| p.id.as_str()),
        );
        generate_entity_id("payment", millis)
    }

    pub fn parse_id(id: &str) -> Result<u64, EntityIdError> {
        parse_entity_id("payment", id)
    }

    /// Amount still owed on this installment. Negative when overpaid.
    pub fn remaining(&self) -> f64 {
        self.amount - self.paid_amount
    }
}

impl Attendance {
    pub fn generate_id(epoch_millis: u64) -> String {
        generate_entity_id("attendance", epoch_millis)
    }

    /// Generate an ID guaranteed not to collide with any existing entry
    pub fn generate_unique_id(epoch_millis: u64, existing: &[Attendance]) -> String {
        let millis = bump_past_existing(
            "attendance",
            epoch_millis,
            existing.iter().map(|a| a.id.as_str()),
        );
        generate_entity_id("attendance", millis)
    }

    pub fn parse_id(id: &str) -> Result<u64, EntityIdError> {
        parse_entity_id("attendance", id)
    }
}

/// Request for creating a new course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCourseRequest {
    pub name: String,
    pub duration: u32,
    pub duration_unit: DurationUnit,
    pub fee: f64,
    pub description: Option<String>,
}

/// Request for updating an existing course
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateCourseRequest {
    pub name: Option<String>,
    pub duration: Option<u32>,
    pub duration_unit: Option<DurationUnit>,
    pub fee: Option<f64>,
    pub description: Option<String>,
}

/// Response after creating or updating a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseResponse {
    pub course: Course,
    pub success_message: String,
}

/// Request for creating a new student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub course_id: String,
    /// ISO 8601 date (YYYY-MM-DD)
    pub joining_date: String,
    /// Optional explicit end date; when absent it is derived from the
    /// course duration.
    pub end_date: Option<String>,
}

/// Request for updating an existing student.
///
/// Changing `course_id` or `joining_date` recomputes the end date from the
/// course duration, overwriting any `end_date` supplied alongside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateStudentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub course_id: Option<String>,
    pub joining_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<StudentStatus>,
}

/// Response after creating or updating a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResponse {
    pub student: Student,
    pub success_message: String,
}

/// Filter for student listings; all criteria are conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentFilter {
    /// Case-insensitive substring match on name or email, exact substring
    /// on phone.
    pub query: Option<String>,
    pub course_id: Option<String>,
    pub status: Option<StudentStatus>,
}

/// Financial and attendance rollup for a single student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentStats {
    /// Sum of paid_amount over this student's fully paid installments.
    pub total_paid: f64,
    /// Sum of (amount - paid_amount) over this student's unpaid and
    /// partially paid installments.
    pub total_pending: f64,
    /// Days marked present or late.
    pub present_days: u32,
    /// Total recorded attendance days.
    pub total_days: u32,
    /// round(100 * present_days / total_days); 0 when nothing is recorded.
    pub attendance_rate: u32,
}

/// Request for creating a new payment installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub student_id: String,
    pub amount: f64,
    /// ISO 8601 date (YYYY-MM-DD)
    pub due_date: String,
    /// Defaults to 1 when absent.
    pub installment_number: Option<u32>,
    pub notes: Option<String>,
}

/// Request for updating an existing payment installment.
///
/// Editing an installment resets its progress: the stored status returns
/// to `pending` and paid_amount to 0, matching the create path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePaymentRequest {
    pub student_id: Option<String>,
    pub amount: Option<f64>,
    pub due_date: Option<String>,
    pub installment_number: Option<u32>,
    pub notes: Option<String>,
}

/// Response after creating or updating a payment installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub payment: Payment,
    pub success_message: String,
}

/// Request for recording money received against an installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPaymentRequest {
    pub payment_id: String,
    /// Amount received; must be positive. May exceed the remaining amount.
    pub amount_received: f64,
    /// ISO 8601 date (YYYY-MM-DD)
    pub paid_date: String,
    /// When absent the installment keeps its existing notes.
    pub notes: Option<String>,
}

/// Filter for payment listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentFilter {
    /// Case-insensitive substring match on the resolved student name.
    pub query: Option<String>,
    /// Matches the derived status, so `overdue` is a valid filter even
    /// though it is never stored.
    pub status: Option<EffectivePaymentStatus>,
}

/// One payment installment prepared for display, with the student
/// reference resolved and derived values precomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub payment: Payment,
    /// "Unknown" when the student reference dangles.
    pub student_name: String,
    /// Empty when the student reference dangles.
    pub student_email: String,
    pub effective_status: EffectivePaymentStatus,
    /// amount - paid_amount; negative when overpaid.
    pub remaining: f64,
    /// Signed days from today to the due date; None when the due date does
    /// not parse.
    pub days_until_due: Option<i64>,
}

/// Global rollup across all payment installments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
    /// Sum of paid_amount over fully paid installments.
    pub total_collected: f64,
    /// Sum of (amount - paid_amount) over pending and partial installments.
    pub total_pending: f64,
    /// Sum of (amount - paid_amount) over installments derived overdue.
    pub overdue_amount: f64,
    /// Count of installments derived overdue.
    pub overdue_count: u32,
    pub total_installments: u32,
    /// Count of fully paid installments.
    pub completed_count: u32,
}

/// Request for marking attendance; replaces any existing entry for the
/// same student and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkAttendanceRequest {
    pub student_id: String,
    /// ISO 8601 date (YYYY-MM-DD)
    pub date: String,
    pub status: AttendanceStatus,
}

/// Per-course enrollment rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub course: Course,
    pub enrolled_count: u32,
    /// enrolled_count * fee: a projection assuming every enrolled student
    /// pays the full course fee, independent of payment records.
    pub potential_revenue: f64,
}

/// Institute-wide enrollment and revenue overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOverview {
    pub total_courses: u32,
    pub total_students: u32,
    /// Sum of potential revenue across all courses.
    pub potential_revenue: f64,
    pub summaries: Vec<CourseSummary>,
}

/// Institute-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstituteConfig {
    pub institute_name: String,
    pub currency_symbol: String,
    pub max_name_length: usize,
    pub max_notes_length: usize,
}

impl Default for InstituteConfig {
    fn default() -> Self {
        Self {
            institute_name: "My Institute".to_string(),
            currency_symbol: "₹".to_string(),
            max_name_length: 100,
            max_notes_length: 256,
        }
    }
}

impl InstituteConfig {
    /// Format an amount with the configured currency symbol, Indian digit
    /// grouping, and no fraction digits: 1234567 -> "₹12,34,567".
    pub fn format_currency(&self, amount: f64) -> String {
        let rounded = amount.round() as i64;
        let negative = rounded < 0;
        let digits = rounded.unsigned_abs().to_string();

        let grouped = if digits.len() <= 3 {
            digits
        } else {
            // Last three digits form one group; the rest group in pairs.
            let (head, tail) = digits.split_at(digits.len() - 3);
            let mut parts = Vec::new();
            let mut start = head.len() % 2;
            if start == 1 {
                parts.push(head[..1].to_string());
            }
            while start < head.len() {
                parts.push(head[start..start + 2].to_string());
                start += 2;
            }
            parts.push(tail.to_string());
            parts.join(",")
        };

        if negative {
            format!("-{}{}", self.currency_symbol, grouped)
        } else {
            format!("{}{}", self.currency_symbol, grouped)
        }
    }
}
