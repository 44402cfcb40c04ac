//! # Tuition Tracker Backend
//!
//! Contains all non-UI logic for the tuition tracker application.
//!
//! This crate serves as the orchestration layer that brings together:
//! - **Domain**: Business logic and rules for institute administration
//! - **Storage**: Data persistence mechanisms (CSV files, config files)
//!
//! The backend is designed to be UI-agnostic, meaning it could support
//! different frontend frameworks or even CLI interfaces without modification.
//!
//! ## Architecture
//!
//! The backend follows a layered architecture:
//! ```text
//! UI Layer
//!     ↓
//! Domain Layer (Business logic, services)
//!     ↓
//! Storage Layer (CSV repositories, persistence)
//! ```

pub mod domain;
pub mod storage;

use std::path::Path;

use anyhow::Result;
use log::info;

use crate::domain::{AttendanceService, CourseService, PaymentService, StudentService};
use crate::storage::csv::CsvConnection;

pub use domain::*;
pub use storage::*;

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub course_service: CourseService,
    pub student_service: StudentService,
    pub payment_service: PaymentService,
    pub attendance_service: AttendanceService,
}

/// Initialize the backend with all required services, storing data under
/// the given directory.
pub fn initialize_backend(data_dir: &Path) -> Result<AppState> {
    info!("Setting up storage in {}", data_dir.display());
    let connection = CsvConnection::new(data_dir)?;

    info!("Setting up domain model");
    let course_service = CourseService::new(connection.clone());
    let student_service = StudentService::new(connection.clone());
    let payment_service = PaymentService::new(connection.clone());
    let attendance_service = AttendanceService::new(connection);

    info!("Setting up application state");
    Ok(AppState {
        course_service,
        student_service,
        payment_service,
        attendance_service,
    })
}
