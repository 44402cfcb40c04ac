use anyhow::Result;
use async_trait::async_trait;
use csv::{Reader, Writer};
use log::warn;
use shared::{Attendance, AttendanceStatus};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};

use super::connection::CsvConnection;
use crate::storage::AttendanceStorage;

const ATTENDANCE_HEADER: &str = "id,student_id,date,status";

/// CSV-based attendance repository
#[derive(Clone)]
pub struct AttendanceRepository {
    connection: CsvConnection,
}

impl AttendanceRepository {
    /// Create a new CSV attendance repository
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    /// Read all attendance entries from the CSV file
    fn read_attendance(&self) -> Result<Vec<Attendance>> {
        let file_path = self.connection.get_attendance_file_path();
        self.connection
            .ensure_csv_file_exists(&file_path, ATTENDANCE_HEADER)?;

        let file = File::open(&file_path)?;
        let reader = BufReader::new(file);
        let mut csv_reader = Reader::from_reader(reader);

        let mut entries = Vec::new();

        for result in csv_reader.records() {
            let record = result?;

            let status = match record.get(3).unwrap_or("").parse::<AttendanceStatus>() {
                Ok(status) => status,
                Err(_) => {
                    warn!(
                        "Attendance {} has unrecognised status '{}', defaulting to absent",
                        record.get(0).unwrap_or(""),
                        record.get(3).unwrap_or("")
                    );
                    AttendanceStatus::Absent
                }
            };

            let attendance = Attendance {
                id: record.get(0).unwrap_or("").to_string(),
                student_id: record.get(1).unwrap_or("").to_string(),
                date: record.get(2).unwrap_or("").to_string(),
                status,
            };

            entries.push(attendance);
        }

        Ok(entries)
    }

    /// Write all attendance entries to the CSV file
    fn write_attendance(&self, entries: &[Attendance]) -> Result<()> {
        let file_path = self.connection.get_attendance_file_path();

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

            csv_writer.write_record(["id", "student_id", "date", "status"])?;

            for attendance in entries {
                csv_writer.write_record([
                    &attendance.id,
                    &attendance.student_id,
                    &attendance.date,
                    attendance.status.as_str(),
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
impl AttendanceStorage for AttendanceRepository {
    async fn upsert_attendance(&self, attendance: &Attendance) -> Result<()> {
        let mut entries = self.read_attendance()?;

        // One entry per student per day: replace any existing entry in place.
        match entries
            .iter_mut()
            .find(|a| a.student_id == attendance.student_id && a.date == attendance.date)
        {
            Some(existing) => *existing = attendance.clone(),
            None => entries.push(attendance.clone()),
        }

        self.write_attendance(&entries)
    }

    async fn get_attendance(&self, student_id: &str, date: &str) -> Result<Option<Attendance>> {
        let entries = self.read_attendance()?;
        Ok(entries
            .into_iter()
            .find(|a| a.student_id == student_id && a.date == date))
    }

    async fn list_attendance(&self) -> Result<Vec<Attendance>> {
        let mut entries = self.read_attendance()?;
        entries.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(entries)
    }

    async fn list_attendance_by_student(&self, student_id: &str) -> Result<Vec<Attendance>> {
        let mut entries = self.read_attendance()?;
        entries.retain(|a| a.student_id == student_id);
        entries.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(entries)
    }

    async fn list_attendance_by_date(&self, date: &str) -> Result<Vec<Attendance>> {
        let mut entries = self.read_attendance()?;
        entries.retain(|a| a.date == date);
        Ok(entries)
    }

    async fn delete_attendance(&self, attendance_id: &str) -> Result<bool> {
        let mut entries = self.read_attendance()?;
        let original_len = entries.len();
        entries.retain(|a| a.id != attendance_id);

        if entries.len() == original_len {
            return Ok(false);
        }

        self.write_attendance(&entries)?;
        Ok(true)
    }

    async fn delete_attendance_by_student(&self, student_id: &str) -> Result<u32> {
        let mut entries = self.read_attendance()?;
        let original_len = entries.len();
        entries.retain(|a| a.student_id != student_id);

        let deleted = (original_len - entries.len()) as u32;
        if deleted > 0 {
            self.write_attendance(&entries)?;
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_repo() -> (AttendanceRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let connection = CsvConnection::new(temp_dir.path()).unwrap();
        (AttendanceRepository::new(connection), temp_dir)
    }

    fn sample_attendance(
        id: &str,
        student_id: &str,
        date: &str,
        status: AttendanceStatus,
    ) -> Attendance {
        Attendance {
            id: id.to_string(),
            student_id: student_id.to_string(),
            date: date.to_string(),
            status,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_day_entry() {
        let (repo, _temp_dir) = setup_test_repo();

        repo.upsert_attendance(&sample_attendance(
            "attendance::1",
            "student::1",
            "2024-02-10",
            AttendanceStatus::Absent,
        ))
        .await
        .unwrap();

        // Marking again for the same day replaces the entry instead of
        // adding a second one.
        repo.upsert_attendance(&sample_attendance(
            "attendance::2",
            "student::1",
            "2024-02-10",
            AttendanceStatus::Present,
        ))
        .await
        .unwrap();

        let entries = repo.list_attendance_by_student("student::1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn test_get_attendance_by_student_and_date() {
        let (repo, _temp_dir) = setup_test_repo();
        repo.upsert_attendance(&sample_attendance(
            "attendance::1",
            "student::1",
            "2024-02-10",
            AttendanceStatus::Late,
        ))
        .await
        .unwrap();

        let found = repo.get_attendance("student::1", "2024-02-10").await.unwrap();
        assert_eq!(found.unwrap().status, AttendanceStatus::Late);

        let missing = repo.get_attendance("student::1", "2024-02-11").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_attendance_by_date() {
        let (repo, _temp_dir) = setup_test_repo();
        repo.upsert_attendance(&sample_attendance(
            "attendance::1",
            "student::1",
            "2024-02-10",
            AttendanceStatus::Present,
        ))
        .await
        .unwrap();
        repo.upsert_attendance(&sample_attendance(
            "attendance::2",
            "student::2",
            "2024-02-10",
            AttendanceStatus::Absent,
        ))
        .await
        .unwrap();
        repo.upsert_attendance(&sample_attendance(
            "attendance::3",
            "student::1",
            "2024-02-11",
            AttendanceStatus::Present,
        ))
        .await
        .unwrap();

        let entries = repo.list_attendance_by_date("2024-02-10").await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_attendance_by_student() {
        let (repo, _temp_dir) = setup_test_repo();
        repo.upsert_attendance(&sample_attendance(
            "attendance::1",
            "student::1",
            "2024-02-10",
            AttendanceStatus::Present,
        ))
        .await
        .unwrap();
        repo.upsert_attendance(&sample_attendance(
            "attendance::2",
            "student::1",
            "2024-02-11",
            AttendanceStatus::Present,
        ))
        .await
        .unwrap();

        let deleted = repo
            .delete_attendance_by_student("student::1")
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(repo.list_attendance().await.unwrap().is_empty());
    }
}
