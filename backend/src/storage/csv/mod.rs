//! # CSV Storage Module
//!
//! This module provides a CSV-based storage implementation for the tuition
//! tracker. Each entity type persists to its own file at the root of the
//! data directory, with institute settings in a YAML file alongside.
//!
//! ## File Structure
//!
//! ```text
//! data/
//! ├── courses.csv
//! ├── students.csv
//! ├── payments.csv
//! ├── attendance.csv
//! └── institute.yaml
//! ```
//!
//! All writes go through a temp file and a rename, so a crash mid-write
//! never leaves a half-written file behind.

pub mod attendance_repository;
pub mod connection;
pub mod course_repository;
pub mod payment_repository;
pub mod settings_repository;
pub mod student_repository;

#[cfg(test)]
pub mod test_utils;

pub use attendance_repository::AttendanceRepository;
pub use connection::CsvConnection;
pub use course_repository::CourseRepository;
pub use payment_repository::PaymentRepository;
pub use settings_repository::SettingsRepository;
pub use student_repository::StudentRepository;
