/// Test utilities module for automatic cleanup and consistent test infrastructure
///
/// This module provides RAII-based cleanup that guarantees test data is removed
/// even if tests panic or fail.
use anyhow::Result;
use chrono::Utc;
use tempfile::TempDir;

use super::attendance_repository::AttendanceRepository;
use super::connection::CsvConnection;
use super::course_repository::CourseRepository;
use super::payment_repository::PaymentRepository;
use super::settings_repository::SettingsRepository;
use super::student_repository::StudentRepository;
use crate::storage::traits::{CourseStorage, PaymentStorage, StudentStorage};
use shared::{Course, DurationUnit, Payment, PaymentStatus, Student, StudentStatus};

/// Test environment that provides a temporary directory and connection
/// that will be automatically cleaned up when the environment is dropped,
/// even if tests panic or fail.
pub struct TestEnvironment {
    pub connection: CsvConnection,
    /// Base directory path for manual inspection if needed
    pub base_path: std::path::PathBuf,
    _temp_dir: TempDir, // Keep alive to prevent cleanup
}

impl TestEnvironment {
    /// Create a new test environment with a temporary directory
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let connection = CsvConnection::new(temp_dir.path())?;
        Ok(Self {
            connection,
            base_path: temp_dir.path().to_path_buf(),
            _temp_dir: temp_dir,
        })
    }
}

/// Test helper that provides repository instances for a test environment
pub struct TestHelper {
    pub env: TestEnvironment,
    pub course_repo: CourseRepository,
    pub student_repo: StudentRepository,
    pub payment_repo: PaymentRepository,
    pub attendance_repo: AttendanceRepository,
    pub settings_repo: SettingsRepository,
}

impl TestHelper {
    /// Create a new test helper with a fresh environment
    pub fn new() -> Result<Self> {
        let env = TestEnvironment::new()?;
        let course_repo = CourseRepository::new(env.connection.clone());
        let student_repo = StudentRepository::new(env.connection.clone());
        let payment_repo = PaymentRepository::new(env.connection.clone());
        let attendance_repo = AttendanceRepository::new(env.connection.clone());
        let settings_repo = SettingsRepository::new(env.connection.clone());

        Ok(Self {
            env,
            course_repo,
            student_repo,
            payment_repo,
            attendance_repo,
            settings_repo,
        })
    }

    /// Create and store a test course with the given name and fee
    pub async fn create_test_course(&self, id: &str, name: &str, fee: f64) -> Result<Course> {
        let now = Utc::now().to_rfc3339();
        let course = Course {
            id: id.to_string(),
            name: name.to_string(),
            duration: 6,
            duration_unit: DurationUnit::Months,
            fee,
            description: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.course_repo.store_course(&course).await?;
        Ok(course)
    }

    /// Create and store a test student enrolled in the given course
    pub async fn create_test_student(
        &self,
        id: &str,
        name: &str,
        course_id: &str,
    ) -> Result<Student> {
        let now = Utc::now().to_rfc3339();
        let student = Student {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            phone: None,
            course_id: course_id.to_string(),
            joining_date: "2024-01-01".to_string(),
            end_date: Some("2024-07-01".to_string()),
            status: StudentStatus::Active,
            created_at: now.clone(),
            updated_at: now,
        };
        self.student_repo.store_student(&student).await?;
        Ok(student)
    }

    /// Create and store a pending test payment for the given student
    pub async fn create_test_payment(
        &self,
        id: &str,
        student_id: &str,
        amount: f64,
        due_date: &str,
    ) -> Result<Payment> {
        let now = Utc::now().to_rfc3339();
        let payment = Payment {
            id: id.to_string(),
            student_id: student_id.to_string(),
            amount,
            paid_amount: 0.0,
            due_date: due_date.to_string(),
            paid_date: None,
            installment_number: 1,
            status: PaymentStatus::Pending,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.payment_repo.store_payment(&payment).await?;
        Ok(payment)
    }
}
