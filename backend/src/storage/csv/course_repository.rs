use anyhow::Result;
use async_trait::async_trait;
use csv::{Reader, Writer};
use log::warn;
use shared::{Course, DurationUnit};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};

use super::connection::CsvConnection;
use crate::storage::CourseStorage;

const COURSES_HEADER: &str =
    "id,name,duration,duration_unit,fee,description,created_at,updated_at";

/// CSV-based course repository
#[derive(Clone)]
pub struct CourseRepository {
    connection: CsvConnection,
}

impl CourseRepository {
    /// Create a new CSV course repository
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    /// Read all courses from the CSV file
    fn read_courses(&self) -> Result<Vec<Course>> {
        let file_path = self.connection.get_courses_file_path();
        self.connection
            .ensure_csv_file_exists(&file_path, COURSES_HEADER)?;

        let file = File::open(&file_path)?;
        let reader = BufReader::new(file);
        let mut csv_reader = Reader::from_reader(reader);

        let mut courses = Vec::new();

        for result in csv_reader.records() {
            let record = result?;

            let duration_unit = match record.get(3).unwrap_or("").parse::<DurationUnit>() {
                Ok(unit) => unit,
                Err(_) => {
                    warn!(
                        "Course {} has unrecognised duration unit '{}', defaulting to days",
                        record.get(0).unwrap_or(""),
                        record.get(3).unwrap_or("")
                    );
                    DurationUnit::Days
                }
            };

            let course = Course {
                id: record.get(0).unwrap_or("").to_string(),
                name: record.get(1).unwrap_or("").to_string(),
                duration: record.get(2).unwrap_or("0").parse::<u32>().unwrap_or(0),
                duration_unit,
                fee: record.get(4).unwrap_or("0").parse::<f64>().unwrap_or(0.0),
                description: record
                    .get(5)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string()),
                created_at: record.get(6).unwrap_or("").to_string(),
                updated_at: record.get(7).unwrap_or("").to_string(),
            };

            courses.push(course);
        }

        Ok(courses)
    }

    /// Write all courses to the CSV file
    fn write_courses(&self, courses: &[Course]) -> Result<()> {
        let file_path = self.connection.get_courses_file_path();

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
                "duration",
                "duration_unit",
                "fee",
                "description",
                "created_at",
                "updated_at",
            ])?;

            for course in courses {
                csv_writer.write_record([
                    &course.id,
                    &course.name,
                    &course.duration.to_string(),
                    &course.duration_unit.to_string(),
                    &course.fee.to_string(),
                    course.description.as_deref().unwrap_or(""),
                    &course.created_at,
                    &course.updated_at,
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
impl CourseStorage for CourseRepository {
    async fn store_course(&self, course: &Course) -> Result<()> {
        let mut courses = self.read_courses()?;
        courses.push(course.clone());
        self.write_courses(&courses)
    }

    async fn get_course(&self, course_id: &str) -> Result<Option<Course>> {
        let courses = self.read_courses()?;
        Ok(courses.into_iter().find(|c| c.id == course_id))
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let mut courses = self.read_courses()?;
        courses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(courses)
    }

    async fn update_course(&self, course: &Course) -> Result<()> {
        let mut courses = self.read_courses()?;

        match courses.iter_mut().find(|c| c.id == course.id) {
            Some(existing) => {
                *existing = course.clone();
                self.write_courses(&courses)
            }
            None => Err(anyhow::anyhow!("Course not found: {}", course.id)),
        }
    }

    async fn delete_course(&self, course_id: &str) -> Result<bool> {
        let mut courses = self.read_courses()?;
        let original_len = courses.len();
        courses.retain(|c| c.id != course_id);

        if courses.len() == original_len {
            return Ok(false);
        }

        self.write_courses(&courses)?;
        Ok(true)
    }
}
