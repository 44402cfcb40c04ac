use anyhow::Result;
use async_trait::async_trait;
use csv::{Reader, Writer};
use log::warn;
use shared::{Student, StudentStatus};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};

use super::connection::CsvConnection;
use crate::storage::StudentStorage;

const STUDENTS_HEADER: &str =
    "id,name,email,phone,course_id,joining_date,end_date,status,created_at,updated_at";

/// CSV-based student repository
#[derive(Clone)]
pub struct StudentRepository {
    connection: CsvConnection,
}

impl StudentRepository {
    /// Create a new CSV student repository
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    /// Read all students from the CSV file
    fn read_students(&self) -> Result<Vec<Student>> {
        let file_path = self.connection.get_students_file_path();
        self.connection
            .ensure_csv_file_exists(&file_path, STUDENTS_HEADER)?;

        let file = File::open(&file_path)?;
        let reader = BufReader::new(file);
        let mut csv_reader = Reader::from_reader(reader);

        let mut students = Vec::new();

        for result in csv_reader.records() {
            let record = result?;

            let status = match record.get(7).unwrap_or("").parse::<StudentStatus>() {
                Ok(status) => status,
                Err(_) => {
                    warn!(
                        "Student {} has unrecognised status '{}', defaulting to active",
                        record.get(0).unwrap_or(""),
                        record.get(7).unwrap_or("")
                    );
                    StudentStatus::Active
                }
            };

            let student = Student {
                id: record.get(0).unwrap_or("").to_string(),
                name: record.get(1).unwrap_or("").to_string(),
                email: record.get(2).unwrap_or("").to_string(),
                phone: record
                    .get(3)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string()),
                course_id: record.get(4).unwrap_or("").to_string(),
                joining_date: record.get(5).unwrap_or("").to_string(),
                end_date: record
                    .get(6)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string()),
                status,
                created_at: record.get(8).unwrap_or("").to_string(),
                updated_at: record.get(9).unwrap_or("").to_string(),
            };

            students.push(student);
        }

        Ok(students)
    }

    /// Write all students to the CSV file
    fn write_students(&self, students: &[Student]) -> Result<()> {
        let file_path = self.connection.get_students_file_path();

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
                "name",
                "email",
                "phone",
                "course_id",
                "joining_date",
                "end_date",
                "status",
                "created_at",
                "updated_at",
            ])?;

            for student in students {
                csv_writer.write_record([
                    &student.id,
                    &student.name,
                    &student.email,
                    student.phone.as_deref().unwrap_or(""),
                    &student.course_id,
                    &student.joining_date,
                    student.end_date.as_deref().unwrap_or(""),
                    student.status.as_str(),
                    &student.created_at,
                    &student.updated_at,
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
impl StudentStorage for StudentRepository {
    async fn store_student(&self, student: &Student) -> Result<()> {
        let mut students = self.read_students()?;
        students.push(student.clone());
        self.write_students(&students)
    }

    async fn get_student(&self, student_id: &str) -> Result<Option<Student>> {
        let students = self.read_students()?;
        Ok(students.into_iter().find(|s| s.id == student_id))
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let mut students = self.read_students()?;
        students.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(students)
    }

    async fn list_students_by_course(&self, course_id: &str) -> Result<Vec<Student>> {
        let mut students = self.read_students()?;
        students.retain(|s| s.course_id == course_id);
        students.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(students)
    }

    async fn update_student(&self, student: &Student) -> Result<()> {
        let mut students = self.read_students()?;

        match students.iter_mut().find(|s| s.id == student.id) {
            Some(existing) => {
                *existing = student.clone();
                self.write_students(&students)
            }
            None => Err(anyhow::anyhow!("Student not found: {}", student.id)),
        }
    }

    async fn delete_student(&self, student_id: &str) -> Result<bool> {
        let mut students = self.read_students()?;
        let original_len = students.len();
        students.retain(|s| s.id != student_id);

        if students.len() == original_len {
            return Ok(false);
        }

        self.write_students(&students)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_repo() -> (StudentRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let connection = CsvConnection::new(temp_dir.path()).unwrap();
        (StudentRepository::new(connection), temp_dir)
    }

    fn sample_student(id: &str, name: &str, course_id: &str) -> Student {
        let now = chrono::Utc::now().to_rfc3339();
        Student {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: Some("9876543210".to_string()),
            course_id: course_id.to_string(),
            joining_date: "2024-01-01".to_string(),
            end_date: Some("2024-07-01".to_string()),
            status: StudentStatus::Active,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_store_and_get_student() {
        let (repo, _temp_dir) = setup_test_repo();
        let student = sample_student("student::1", "Asha", "course::1");

        repo.store_student(&student).await.unwrap();

        let retrieved = repo.get_student("student::1").await.unwrap();
        assert_eq!(retrieved, Some(student));
    }

    #[tokio::test]
    async fn test_optional_fields_survive_round_trip() {
        let (repo, _temp_dir) = setup_test_repo();
        let mut student = sample_student("student::1", "Asha", "course::1");
        student.phone = None;
        student.end_date = None;

        repo.store_student(&student).await.unwrap();

        let retrieved = repo.get_student("student::1").await.unwrap().unwrap();
        assert_eq!(retrieved.phone, None);
        assert_eq!(retrieved.end_date, None);
    }

    #[tokio::test]
    async fn test_list_students_by_course() {
        let (repo, _temp_dir) = setup_test_repo();
        repo.store_student(&sample_student("student::1", "Asha", "course::1"))
            .await
            .unwrap();
        repo.store_student(&sample_student("student::2", "Ravi", "course::2"))
            .await
            .unwrap();
        repo.store_student(&sample_student("student::3", "Meena", "course::1"))
            .await
            .unwrap();

        let enrolled = repo.list_students_by_course("course::1").await.unwrap();
        assert_eq!(enrolled.len(), 2);
        assert!(enrolled.iter().all(|s| s.course_id == "course::1"));
    }

    #[tokio::test]
    async fn test_update_and_delete_student() {
        let (repo, _temp_dir) = setup_test_repo();
        let mut student = sample_student("student::1", "Asha", "course::1");
        repo.store_student(&student).await.unwrap();

        student.status = StudentStatus::Completed;
        repo.update_student(&student).await.unwrap();
        assert_eq!(
            repo.get_student("student::1").await.unwrap().unwrap().status,
            StudentStatus::Completed
        );

        assert!(repo.delete_student("student::1").await.unwrap());
        assert!(!repo.delete_student("student::1").await.unwrap());
    }
}
