use anyhow::Result;
use chrono::{Datelike, Days, Months, NaiveDate, Utc};
use log::{info, warn};

use crate::storage::csv::{
    AttendanceRepository, CourseRepository, CsvConnection, PaymentRepository, SettingsRepository,
    StudentRepository,
};
use crate::storage::{
    AttendanceStorage, CourseStorage, PaymentStorage, SettingsStorage, StudentStorage,
};
use shared::{
    Course, CreateStudentRequest, PaymentStatus, Student, StudentFilter, StudentResponse,
    StudentStats, StudentStatus, UpdateStudentRequest,
};

/// Service for managing students enrolled at the institute
#[derive(Clone)]
pub struct StudentService {
    student_repository: StudentRepository,
    course_repository: CourseRepository,
    payment_repository: PaymentRepository,
    attendance_repository: AttendanceRepository,
    settings_repository: SettingsRepository,
}

impl StudentService {
    /// Create a new StudentService
    pub fn new(connection: CsvConnection) -> Self {
        Self {
            student_repository: StudentRepository::new(connection.clone()),
            course_repository: CourseRepository::new(connection.clone()),
            payment_repository: PaymentRepository::new(connection.clone()),
            attendance_repository: AttendanceRepository::new(connection.clone()),
            settings_repository: SettingsRepository::new(connection),
        }
    }

    /// Compute a student's end date from their joining date and course
    /// duration. Months add calendar months, weeks add 7 days each, and
    /// every other unit adds plain days. Returns None when the joining
    /// date does not parse.
    pub fn calculate_end_date(joining_date: &str, course: &Course) -> Option<String> {
        let start = NaiveDate::parse_from_str(joining_date, "%Y-%m-%d").ok()?;

        let end = match course.duration_unit {
            shared::DurationUnit::Months => start.checked_add_months(Months::new(course.duration))?,
            shared::DurationUnit::Weeks => {
                start.checked_add_days(Days::new(course.duration as u64 * 7))?
            }
            _ => start.checked_add_days(Days::new(course.duration as u64))?,
        };

        Some(format!(
            "{:04}-{:02}-{:02}",
            end.year(),
            end.month(),
            end.day()
        ))
    }

    /// Create a new student.
    ///
    /// When no explicit end date is supplied and the course exists, the end
    /// date is derived from the course duration.
    pub async fn create_student(&self, request: CreateStudentRequest) -> Result<StudentResponse> {
        info!("Creating student: name={}", request.name);

        self.validate_name(&request.name).await?;
        self.validate_email(&request.email)?;

        let end_date = match request.end_date {
            Some(end_date) => Some(end_date),
            None => match self.course_repository.get_course(&request.course_id).await? {
                Some(course) => Self::calculate_end_date(&request.joining_date, &course),
                None => {
                    warn!(
                        "Course {} not found, student created without end date",
                        request.course_id
                    );
                    None
                }
            },
        };

        let existing = self.student_repository.list_students().await?;

        let now = Utc::now();
        let timestamp_millis = now.timestamp_millis() as u64;
        let timestamp_rfc3339 = now.to_rfc3339();

        let student = Student {
            id: Student::generate_unique_id(timestamp_millis, &existing),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            phone: request.phone,
            course_id: request.course_id,
            joining_date: request.joining_date,
            end_date,
            status: StudentStatus::Active,
            created_at: timestamp_rfc3339.clone(),
            updated_at: timestamp_rfc3339,
        };

        self.student_repository.store_student(&student).await?;

        info!("Created student: {} with ID: {}", student.name, student.id);

        Ok(StudentResponse {
            student,
            success_message: "Student created successfully".to_string(),
        })
    }

    /// Get a student by ID
    pub async fn get_student(&self, student_id: &str) -> Result<Option<Student>> {
        self.student_repository.get_student(student_id).await
    }

    /// List students matching the given filter. All criteria are
    /// conjunctive; an empty filter returns everyone.
    pub async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>> {
        let mut students = self.student_repository.list_students().await?;

        if let Some(course_id) = &filter.course_id {
            students.retain(|s| &s.course_id == course_id);
        }
        if let Some(status) = filter.status {
            students.retain(|s| s.status == status);
        }
        if let Some(query) = &filter.query {
            let query = query.to_lowercase();
            students.retain(|s| {
                s.name.to_lowercase().contains(&query)
                    || s.email.to_lowercase().contains(&query)
                    || s.phone.as_deref().is_some_and(|p| p.contains(&query))
            });
        }

        Ok(students)
    }

    /// Update an existing student.
    ///
    /// Changing the course or the joining date recomputes the end date
    /// from the course duration, overwriting any end date supplied in the
    /// same request.
    pub async fn update_student(
        &self,
        student_id: &str,
        request: UpdateStudentRequest,
    ) -> Result<StudentResponse> {
        info!("Updating student: {}", student_id);

        let mut student = self
            .student_repository
            .get_student(student_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Student not found: {}", student_id))?;

        let enrollment_changed = request.course_id.is_some() || request.joining_date.is_some();

        if let Some(name) = request.name {
            self.validate_name(&name).await?;
            student.name = name.trim().to_string();
        }
        if let Some(email) = request.email {
            self.validate_email(&email)?;
            student.email = email.trim().to_string();
        }
        if let Some(phone) = request.phone {
            student.phone = Some(phone);
        }
        if let Some(course_id) = request.course_id {
            student.course_id = course_id;
        }
        if let Some(joining_date) = request.joining_date {
            student.joining_date = joining_date;
        }
        if let Some(status) = request.status {
            student.status = status;
        }

        if enrollment_changed {
            // Recomputation wins over any end date in the same request.
            student.end_date = match self
                .course_repository
                .get_course(&student.course_id)
                .await?
            {
                Some(course) => Self::calculate_end_date(&student.joining_date, &course),
                None => None,
            };
        } else if let Some(end_date) = request.end_date {
            student.end_date = Some(end_date);
        }

        student.updated_at = Utc::now().to_rfc3339();
        self.student_repository.update_student(&student).await?;

        Ok(StudentResponse {
            student,
            success_message: "Student updated successfully".to_string(),
        })
    }

    /// Delete a student along with all of their payments and attendance
    /// entries.
    pub async fn delete_student(&self, student_id: &str) -> Result<String> {
        info!("Deleting student: {}", student_id);

        let deleted = self.student_repository.delete_student(student_id).await?;
        if !deleted {
            return Err(anyhow::anyhow!("Student not found: {}", student_id));
        }

        let payments_removed = self
            .payment_repository
            .delete_payments_by_student(student_id)
            .await?;
        let attendance_removed = self
            .attendance_repository
            .delete_attendance_by_student(student_id)
            .await?;

        info!(
            "Deleted student {} ({} payments, {} attendance entries removed)",
            student_id, payments_removed, attendance_removed
        );

        Ok("Student and associated records deleted successfully".to_string())
    }

    /// Resolve a course name for display. Dangling references come back as
    /// "Unknown" instead of an error.
    pub async fn course_name(&self, course_id: &str) -> Result<String> {
        Ok(self
            .course_repository
            .get_course(course_id)
            .await?
            .map(|c| c.name)
            .unwrap_or_else(|| "Unknown".to_string()))
    }

    /// Build the financial and attendance rollup for one student
    pub async fn student_stats(&self, student_id: &str) -> Result<StudentStats> {
        let payments = self
            .payment_repository
            .list_payments_by_student(student_id)
            .await?;

        let mut total_paid = 0.0;
        let mut total_pending = 0.0;
        for payment in &payments {
            match payment.status {
                PaymentStatus::Paid => total_paid += payment.paid_amount,
                PaymentStatus::Pending | PaymentStatus::Partial => {
                    total_pending += payment.remaining()
                }
            }
        }

        let attendance = self
            .attendance_repository
            .list_attendance_by_student(student_id)
            .await?;
        let total_days = attendance.len() as u32;
        let present_days = attendance
            .iter()
            .filter(|a| a.status.counts_as_attended())
            .count() as u32;

        let attendance_rate = if total_days == 0 {
            0
        } else {
            (100.0 * present_days as f64 / total_days as f64).round() as u32
        };

        Ok(StudentStats {
            total_paid,
            total_pending,
            present_days,
            total_days,
            attendance_rate,
        })
    }

    async fn validate_name(&self, name: &str) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(anyhow::anyhow!("Student name cannot be empty"));
        }

        let config = self.settings_repository.get_config().await?;
        if trimmed.len() > config.max_name_length {
            return Err(anyhow::anyhow!(
                "Student name cannot exceed {} characters",
                config.max_name_length
            ));
        }

        Ok(())
    }

    fn validate_email(&self, email: &str) -> Result<()> {
        let trimmed = email.trim();
        if trimmed.is_empty() || !trimmed.contains('@') {
            return Err(anyhow::anyhow!("A valid email address is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::csv::test_utils::TestHelper;
    use shared::{AttendanceStatus, DurationUnit};

    fn setup() -> (StudentService, TestHelper) {
        let helper = TestHelper::new().unwrap();
        let service = StudentService::new(helper.env.connection.clone());
        (service, helper)
    }

    fn course_with(duration: u32, unit: DurationUnit) -> Course {
        let now = Utc::now().to_rfc3339();
        Course {
            id: "course::1".to_string(),
            name: "Physics".to_string(),
            duration,
            duration_unit: unit,
            fee: 1000.0,
            description: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn create_request(course_id: &str) -> CreateStudentRequest {
        CreateStudentRequest {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: Some("9876543210".to_string()),
            course_id: course_id.to_string(),
            joining_date: "2024-01-01".to_string(),
            end_date: None,
        }
    }

    #[test]
    fn test_calculate_end_date_months() {
        let course = course_with(6, DurationUnit::Months);
        assert_eq!(
            StudentService::calculate_end_date("2024-01-01", &course),
            Some("2024-07-01".to_string())
        );
    }

    #[test]
    fn test_calculate_end_date_weeks() {
        let course = course_with(2, DurationUnit::Weeks);
        assert_eq!(
            StudentService::calculate_end_date("2024-01-01", &course),
            Some("2024-01-15".to_string())
        );
    }

    #[test]
    fn test_calculate_end_date_days() {
        let course = course_with(10, DurationUnit::Days);
        assert_eq!(
            StudentService::calculate_end_date("2024-01-01", &course),
            Some("2024-01-11".to_string())
        );
    }

    #[test]
    fn test_calculate_end_date_years_adds_plain_days() {
        // Years fall through to day addition rather than calendar years.
        let course = course_with(1, DurationUnit::Years);
        assert_eq!(
            StudentService::calculate_end_date("2024-01-01", &course),
            Some("2024-01-02".to_string())
        );
    }

    #[test]
    fn test_calculate_end_date_unparseable_joining_date() {
        let course = course_with(6, DurationUnit::Months);
        assert_eq!(StudentService::calculate_end_date("not-a-date", &course), None);
    }

    #[tokio::test]
    async fn test_create_student_derives_end_date() {
        let (service, helper) = setup();
        let course = helper
            .create_test_course("course::1", "Physics", 1000.0)
            .await
            .unwrap();

        let response = service.create_student(create_request(&course.id)).await.unwrap();
        assert_eq!(response.student.end_date.as_deref(), Some("2024-07-01"));
        assert_eq!(response.student.status, StudentStatus::Active);
    }

    #[tokio::test]
    async fn test_back_to_back_creates_get_distinct_ids() {
        let (service, helper) = setup();
        let course = helper
            .create_test_course("course::1", "Physics", 1000.0)
            .await
            .unwrap();

        let first = service
            .create_student(create_request(&course.id))
            .await
            .unwrap()
            .student;
        let second = service
            .create_student(create_request(&course.id))
            .await
            .unwrap()
            .student;

        assert_ne!(first.id, second.id);
        assert_eq!(
            service
                .list_students(&StudentFilter::default())
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_create_student_explicit_end_date_wins() {
        let (service, helper) = setup();
        let course = helper
            .create_test_course("course::1", "Physics", 1000.0)
            .await
            .unwrap();

        let mut request = create_request(&course.id);
        request.end_date = Some("2025-12-31".to_string());
        let response = service.create_student(request).await.unwrap();
        assert_eq!(response.student.end_date.as_deref(), Some("2025-12-31"));
    }

    #[tokio::test]
    async fn test_update_joining_date_clobbers_end_date() {
        let (service, helper) = setup();
        let course = helper
            .create_test_course("course::1", "Physics", 1000.0)
            .await
            .unwrap();
        let student = service
            .create_student(create_request(&course.id))
            .await
            .unwrap()
            .student;

        // Supplying an end date alongside a joining date change loses to
        // the recomputation.
        let response = service
            .update_student(
                &student.id,
                UpdateStudentRequest {
                    joining_date: Some("2024-02-01".to_string()),
                    end_date: Some("2030-01-01".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(response.student.end_date.as_deref(), Some("2024-08-01"));
    }

    #[tokio::test]
    async fn test_update_end_date_alone_sticks() {
        let (service, helper) = setup();
        let course = helper
            .create_test_course("course::1", "Physics", 1000.0)
            .await
            .unwrap();
        let student = service
            .create_student(create_request(&course.id))
            .await
            .unwrap()
            .student;

        let response = service
            .update_student(
                &student.id,
                UpdateStudentRequest {
                    end_date: Some("2030-01-01".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(response.student.end_date.as_deref(), Some("2030-01-01"));
    }

    #[tokio::test]
    async fn test_delete_student_cascades() {
        let (service, helper) = setup();
        let course = helper
            .create_test_course("course::1", "Physics", 1000.0)
            .await
            .unwrap();
        let student = service
            .create_student(create_request(&course.id))
            .await
            .unwrap()
            .student;

        helper
            .create_test_payment("payment::1", &student.id, 5000.0, "2024-06-01")
            .await
            .unwrap();
        helper
            .attendance_repo
            .upsert_attendance(&shared::Attendance {
                id: "attendance::1".to_string(),
                student_id: student.id.clone(),
                date: "2024-02-10".to_string(),
                status: AttendanceStatus::Present,
            })
            .await
            .unwrap();

        service.delete_student(&student.id).await.unwrap();

        assert!(service.get_student(&student.id).await.unwrap().is_none());
        assert!(helper
            .payment_repo
            .list_payments_by_student(&student.id)
            .await
            .unwrap()
            .is_empty());
        assert!(helper
            .attendance_repo
            .list_attendance_by_student(&student.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_students_filters() {
        let (service, helper) = setup();
        helper
            .create_test_course("course::1", "Physics", 1000.0)
            .await
            .unwrap();
        helper
            .create_test_course("course::2", "Chemistry", 500.0)
            .await
            .unwrap();
        helper
            .create_test_student("student::1", "Asha Patel", "course::1")
            .await
            .unwrap();
        helper
            .create_test_student("student::2", "Ravi Kumar", "course::2")
            .await
            .unwrap();

        let by_query = service
            .list_students(&StudentFilter {
                query: Some("asha".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_query.len(), 1);
        assert_eq!(by_query[0].name, "Asha Patel");

        let by_course = service
            .list_students(&StudentFilter {
                course_id: Some("course::2".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_course.len(), 1);
        assert_eq!(by_course[0].name, "Ravi Kumar");

        let everyone = service.list_students(&StudentFilter::default()).await.unwrap();
        assert_eq!(everyone.len(), 2);
    }

    #[tokio::test]
    async fn test_course_name_falls_back_to_unknown() {
        let (service, helper) = setup();
        helper
            .create_test_course("course::1", "Physics", 1000.0)
            .await
            .unwrap();

        assert_eq!(service.course_name("course::1").await.unwrap(), "Physics");
        assert_eq!(service.course_name("course::404").await.unwrap(), "Unknown");
    }

    #[tokio::test]
    async fn test_student_stats_attendance_rate() {
        let (service, helper) = setup();
        helper
            .create_test_course("course::1", "Physics", 1000.0)
            .await
            .unwrap();
        let student = helper
            .create_test_student("student::1", "Asha", "course::1")
            .await
            .unwrap();

        // No attendance yet: rate is 0, not a division error.
        let stats = service.student_stats(&student.id).await.unwrap();
        assert_eq!(stats.attendance_rate, 0);
        assert_eq!(stats.total_days, 0);

        // 8 attended (6 present + 2 late) out of 10 recorded days.
        for day in 1..=10u32 {
            let status = match day {
                1..=6 => AttendanceStatus::Present,
                7 | 8 => AttendanceStatus::Late,
                _ => AttendanceStatus::Absent,
            };
            helper
                .attendance_repo
                .upsert_attendance(&shared::Attendance {
                    id: format!("attendance::{}", day),
                    student_id: student.id.clone(),
                    date: format!("2024-02-{:02}", day),
                    status,
                })
                .await
                .unwrap();
        }

        let stats = service.student_stats(&student.id).await.unwrap();
        assert_eq!(stats.present_days, 8);
        assert_eq!(stats.total_days, 10);
        assert_eq!(stats.attendance_rate, 80);
    }

    #[tokio::test]
    async fn test_student_stats_payment_totals() {
        let (service, helper) = setup();
        helper
            .create_test_course("course::1", "Physics", 1000.0)
            .await
            .unwrap();
        let student = helper
            .create_test_student("student::1", "Asha", "course::1")
            .await
            .unwrap();

        let mut paid = helper
            .create_test_payment("payment::1", &student.id, 5000.0, "2024-03-01")
            .await
            .unwrap();
        paid.paid_amount = 5000.0;
        paid.status = PaymentStatus::Paid;
        helper.payment_repo.update_payment(&paid).await.unwrap();

        let mut partial = helper
            .create_test_payment("payment::2", &student.id, 5000.0, "2024-04-01")
            .await
            .unwrap();
        partial.paid_amount = 2000.0;
        partial.status = PaymentStatus::Partial;
        helper.payment_repo.update_payment(&partial).await.unwrap();

        let stats = service.student_stats(&student.id).await.unwrap();
        assert_eq!(stats.total_paid, 5000.0);
        assert_eq!(stats.total_pending, 3000.0);
    }
}
