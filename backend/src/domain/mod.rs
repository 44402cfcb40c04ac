//! # Domain Module
//!
//! Contains all business logic for the tuition tracker application.
//!
//! This module encapsulates the core business rules and services that define
//! how courses, students, payments, and attendance are modeled and managed.
//! It operates independently of any specific UI framework or storage
//! mechanism.
//!
//! ## Module Organization
//!
//! - **course_service**: Course CRUD, the deletion guard, and enrollment rollups
//! - **student_service**: Student CRUD, end-date derivation, and per-student stats
//! - **payment_service**: Installment CRUD, payment recording, and financial rollups
//! - **attendance_service**: Daily attendance marking and queries
//!
//! ## Business Rules
//!
//! - A course cannot be deleted while students are enrolled in it
//! - A student's end date follows from the course duration and joining date
//! - Payment status shown to users is derived from the stored status and the
//!   due date; `overdue` is never stored
//! - Deleting a student removes their payments and attendance too
//! - Dangling references resolve to "Unknown" at read time instead of failing

pub mod attendance_service;
pub mod course_service;
pub mod payment_service;
pub mod student_service;

pub use attendance_service::AttendanceService;
pub use course_service::CourseService;
pub use payment_service::PaymentService;
pub use student_service::StudentService;
