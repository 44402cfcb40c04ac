//! # Storage Traits
//!
//! This module defines the storage abstraction traits that allow different
//! storage backends to be used interchangeably in the domain layer.

use anyhow::Result;
use async_trait::async_trait;
use shared::{Attendance, Course, InstituteConfig, Payment, Student};

/// Trait defining the interface for course storage operations
///
/// This trait abstracts away the specific storage implementation details,
/// allowing the domain layer to work with different storage backends
/// (CSV files, SQL databases, etc.) without modification.
#[async_trait]
pub trait CourseStorage: Send + Sync {
    /// Store a new course
    async fn store_course(&self, course: &Course) -> Result<()>;

    /// Retrieve a specific course by ID
    async fn get_course(&self, course_id: &str) -> Result<Option<Course>>;

    /// List all courses ordered by name
    async fn list_courses(&self) -> Result<Vec<Course>>;

    /// Update an existing course
    async fn update_course(&self, course: &Course) -> Result<()>;

    /// Delete a course by ID
    /// Returns true if the course was found and deleted, false otherwise
    async fn delete_course(&self, course_id: &str) -> Result<bool>;
}

/// Trait defining the interface for student storage operations
#[async_trait]
pub trait StudentStorage: Send + Sync {
    /// Store a new student
    async fn store_student(&self, student: &Student) -> Result<()>;

    /// Retrieve a specific student by ID
    async fn get_student(&self, student_id: &str) -> Result<Option<Student>>;

    /// List all students ordered by name
    async fn list_students(&self) -> Result<Vec<Student>>;

    /// List all students enrolled in a specific course
    async fn list_students_by_course(&self, course_id: &str) -> Result<Vec<Student>>;

    /// Update an existing student
    async fn update_student(&self, student: &Student) -> Result<()>;

    /// Delete a student by ID
    /// Returns true if the student was found and deleted, false otherwise
    async fn delete_student(&self, student_id: &str) -> Result<bool>;
}

/// Trait defining the interface for payment storage operations
#[async_trait]
pub trait PaymentStorage: Send + Sync {
    /// Store a new payment installment
    async fn store_payment(&self, payment: &Payment) -> Result<()>;

    /// Retrieve a specific payment by ID
    async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>>;

    /// List all payments ordered by due date ascending
    async fn list_payments(&self) -> Result<Vec<Payment>>;

    /// List all payments for a specific student
    async fn list_payments_by_student(&self, student_id: &str) -> Result<Vec<Payment>>;

    /// Update an existing payment
    async fn update_payment(&self, payment: &Payment) -> Result<()>;

    /// Delete a payment by ID
    /// Returns true if the payment was found and deleted, false otherwise
    async fn delete_payment(&self, payment_id: &str) -> Result<bool>;

    /// Delete all payments for a specific student
    /// Returns the number of payments actually deleted
    async fn delete_payments_by_student(&self, student_id: &str) -> Result<u32>;
}

/// Trait defining the interface for attendance storage operations
#[async_trait]
pub trait AttendanceStorage: Send + Sync {
    /// Store a new attendance entry, replacing any existing entry for the
    /// same student and date
    async fn upsert_attendance(&self, attendance: &Attendance) -> Result<()>;

    /// Retrieve the attendance entry for a student on a specific date
    async fn get_attendance(&self, student_id: &str, date: &str) -> Result<Option<Attendance>>;

    /// List all attendance entries ordered by date ascending
    async fn list_attendance(&self) -> Result<Vec<Attendance>>;

    /// List all attendance entries for a specific student
    async fn list_attendance_by_student(&self, student_id: &str) -> Result<Vec<Attendance>>;

    /// List all attendance entries for a specific date
    async fn list_attendance_by_date(&self, date: &str) -> Result<Vec<Attendance>>;

    /// Delete an attendance entry by ID
    /// Returns true if the entry was found and deleted, false otherwise
    async fn delete_attendance(&self, attendance_id: &str) -> Result<bool>;

    /// Delete all attendance entries for a specific student
    /// Returns the number of entries actually deleted
    async fn delete_attendance_by_student(&self, student_id: &str) -> Result<u32>;
}

/// Trait defining the interface for institute settings storage
#[async_trait]
pub trait SettingsStorage: Send + Sync {
    /// Load the institute configuration, falling back to defaults when no
    /// config file exists yet
    async fn get_config(&self) -> Result<InstituteConfig>;

    /// Persist the institute configuration
    async fn store_config(&self, config: &InstituteConfig) -> Result<()>;
}
