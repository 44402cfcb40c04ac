use anyhow::Result;
use chrono::Utc;
use log::{info, warn};

use crate::storage::csv::{CourseRepository, CsvConnection, SettingsRepository, StudentRepository};
use crate::storage::{CourseStorage, SettingsStorage, StudentStorage};
use shared::{
    Course, CourseOverview, CourseResponse, CourseSummary, CreateCourseRequest,
    UpdateCourseRequest,
};

/// Service for managing courses offered by the institute
#[derive(Clone)]
pub struct CourseService {
    course_repository: CourseRepository,
    student_repository: StudentRepository,
    settings_repository: SettingsRepository,
}

impl CourseService {
    /// Create a new CourseService
    pub fn new(connection: CsvConnection) -> Self {
        Self {
            course_repository: CourseRepository::new(connection.clone()),
            student_repository: StudentRepository::new(connection.clone()),
            settings_repository: SettingsRepository::new(connection),
        }
    }

    /// Create a new course
    pub async fn create_course(&self, request: CreateCourseRequest) -> Result<CourseResponse> {
        info!("Creating course: name={}", request.name);

        self.validate_name(&request.name).await?;
        self.validate_numbers(request.duration, request.fee)?;

        let existing = self.course_repository.list_courses().await?;

        let now = Utc::now();
        let timestamp_millis = now.timestamp_millis() as u64;
        let timestamp_rfc3339 = now.to_rfc3339();

        let course = Course {
            id: Course::generate_unique_id(timestamp_millis, &existing),
            name: request.name.trim().to_string(),
            duration: request.duration,
            duration_unit: request.duration_unit,
            fee: request.fee,
            description: request.description,
            created_at: timestamp_rfc3339.clone(),
            updated_at: timestamp_rfc3339,
        };

        self.course_repository.store_course(&course).await?;

        info!("Created course: {} with ID: {}", course.name, course.id);

        Ok(CourseResponse {
            course,
            success_message: "Course created successfully".to_string(),
        })
    }

    /// Get a course by ID
    pub async fn get_course(&self, course_id: &str) -> Result<Option<Course>> {
        self.course_repository.get_course(course_id).await
    }

    /// List all courses
    pub async fn list_courses(&self) -> Result<Vec<Course>> {
        self.course_repository.list_courses().await
    }

    /// List courses whose name or description contains the query,
    /// case-insensitively
    pub async fn search_courses(&self, query: &str) -> Result<Vec<Course>> {
        let query = query.to_lowercase();
        let mut courses = self.course_repository.list_courses().await?;
        courses.retain(|c| {
            c.name.to_lowercase().contains(&query)
                || c.description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&query))
        });
        Ok(courses)
    }

    /// Update an existing course
    pub async fn update_course(
        &self,
        course_id: &str,
        request: UpdateCourseRequest,
    ) -> Result<CourseResponse> {
        info!("Updating course: {}", course_id);

        let mut course = self
            .course_repository
            .get_course(course_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Course not found: {}", course_id))?;

        if let Some(name) = request.name {
            self.validate_name(&name).await?;
            course.name = name.trim().to_string();
        }
        if let Some(duration) = request.duration {
            course.duration = duration;
        }
        if let Some(duration_unit) = request.duration_unit {
            course.duration_unit = duration_unit;
        }
        if let Some(fee) = request.fee {
            course.fee = fee;
        }
        if let Some(description) = request.description {
            course.description = Some(description);
        }
        self.validate_numbers(course.duration, course.fee)?;
        course.updated_at = Utc::now().to_rfc3339();

        self.course_repository.update_course(&course).await?;

        Ok(CourseResponse {
            course,
            success_message: "Course updated successfully".to_string(),
        })
    }

    /// Delete a course. Rejected while any student is still enrolled in it.
    pub async fn delete_course(&self, course_id: &str) -> Result<String> {
        info!("Deleting course: {}", course_id);

        let enrolled = self.enrolled_count(course_id).await?;
        if enrolled > 0 {
            warn!(
                "Refusing to delete course {} with {} enrolled students",
                course_id, enrolled
            );
            return Err(anyhow::anyhow!(
                "Cannot delete course with {} enrolled students",
                enrolled
            ));
        }

        let deleted = self.course_repository.delete_course(course_id).await?;
        if !deleted {
            return Err(anyhow::anyhow!("Course not found: {}", course_id));
        }

        Ok("Course deleted successfully".to_string())
    }

    /// Count students currently enrolled in a course
    pub async fn enrolled_count(&self, course_id: &str) -> Result<u32> {
        let students = self
            .student_repository
            .list_students_by_course(course_id)
            .await?;
        Ok(students.len() as u32)
    }

    /// Build the per-course enrollment and revenue summary
    pub async fn course_summary(&self, course_id: &str) -> Result<CourseSummary> {
        let course = self
            .course_repository
            .get_course(course_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Course not found: {}", course_id))?;

        let enrolled_count = self.enrolled_count(course_id).await?;
        let potential_revenue = enrolled_count as f64 * course.fee;

        Ok(CourseSummary {
            course,
            enrolled_count,
            potential_revenue,
        })
    }

    /// Build the institute-wide enrollment and revenue overview.
    ///
    /// Potential revenue assumes every enrolled student pays the full
    /// course fee; actual payment records play no part here.
    pub async fn course_overview(&self) -> Result<CourseOverview> {
        let courses = self.course_repository.list_courses().await?;
        let students = self.student_repository.list_students().await?;

        let mut summaries = Vec::with_capacity(courses.len());
        let mut potential_revenue = 0.0;

        for course in courses {
            let enrolled_count =
                students.iter().filter(|s| s.course_id == course.id).count() as u32;
            let revenue = enrolled_count as f64 * course.fee;
            potential_revenue += revenue;
            summaries.push(CourseSummary {
                course,
                enrolled_count,
                potential_revenue: revenue,
            });
        }

        Ok(CourseOverview {
            total_courses: summaries.len() as u32,
            total_students: students.len() as u32,
            potential_revenue,
            summaries,
        })
    }

    async fn validate_name(&self, name: &str) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(anyhow::anyhow!("Course name cannot be empty"));
        }

        let config = self.settings_repository.get_config().await?;
        if trimmed.len() > config.max_name_length {
            return Err(anyhow::anyhow!(
                "Course name cannot exceed {} characters",
                config.max_name_length
            ));
        }

        Ok(())
    }

    fn validate_numbers(&self, duration: u32, fee: f64) -> Result<()> {
        if duration == 0 {
            return Err(anyhow::anyhow!("Course duration must be at least 1"));
        }
        if fee < 0.0 || !fee.is_finite() {
            return Err(anyhow::anyhow!("Course fee cannot be negative"));
        }
        Ok(())
    }
}
