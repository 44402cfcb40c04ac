use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::storage::csv::{AttendanceRepository, CsvConnection};
use crate::storage::AttendanceStorage;
use shared::{Attendance, MarkAttendanceRequest};

/// Service for marking and querying daily attendance
#[derive(Clone)]
pub struct AttendanceService {
    attendance_repository: AttendanceRepository,
}

impl AttendanceService {
    /// Create a new AttendanceService
    pub fn new(connection: CsvConnection) -> Self {
        Self {
            attendance_repository: AttendanceRepository::new(connection),
        }
    }

    /// Mark attendance for a student on a date. Marking the same student
    /// and date again replaces the earlier entry.
    pub async fn mark_attendance(&self, request: MarkAttendanceRequest) -> Result<Attendance> {
        info!(
            "Marking attendance: student={}, date={}, status={}",
            request.student_id, request.date, request.status
        );

        let existing = self
            .attendance_repository
            .get_attendance(&request.student_id, &request.date)
            .await?;

        // Re-marking keeps the original entry's identity.
        let id = match existing {
            Some(entry) => entry.id,
            None => {
                let entries = self.attendance_repository.list_attendance().await?;
                Attendance::generate_unique_id(Utc::now().timestamp_millis() as u64, &entries)
            }
        };

        let attendance = Attendance {
            id,
            student_id: request.student_id,
            date: request.date,
            status: request.status,
        };

        self.attendance_repository
            .upsert_attendance(&attendance)
            .await?;

        Ok(attendance)
    }

    /// Get the attendance entry for a student on a specific date
    pub async fn get_attendance(
        &self,
        student_id: &str,
        date: &str,
    ) -> Result<Option<Attendance>> {
        self.attendance_repository
            .get_attendance(student_id, date)
            .await
    }

    /// List all attendance entries for a student, ordered by date
    pub async fn list_student_attendance(&self, student_id: &str) -> Result<Vec<Attendance>> {
        self.attendance_repository
            .list_attendance_by_student(student_id)
            .await
    }

    /// List all attendance entries for a date, across students
    pub async fn list_attendance_for_date(&self, date: &str) -> Result<Vec<Attendance>> {
        self.attendance_repository.list_attendance_by_date(date).await
    }

    /// Delete an attendance entry
    pub async fn delete_attendance(&self, attendance_id: &str) -> Result<String> {
        info!("Deleting attendance: {}", attendance_id);

        let deleted = self
            .attendance_repository
            .delete_attendance(attendance_id)
            .await?;
        if !deleted {
            return Err(anyhow::anyhow!("Attendance entry not found: {}", attendance_id));
        }

        Ok("Attendance entry deleted successfully".to_string())
    }
}
