use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// CsvConnection manages file paths and ensures CSV files exist for each
/// entity type. All entity files live directly under the base directory.
#[derive(Clone)]
pub struct CsvConnection {
    base_directory: PathBuf,
}

impl CsvConnection {
    /// Create a new CSV connection with a base directory
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }

        Ok(Self {
            base_directory: base_path,
        })
    }

    /// Get the base directory path
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Get the file path for the courses CSV
    pub fn get_courses_file_path(&self) -> PathBuf {
        self.base_directory.join("courses.csv")
    }

    /// Get the file path for the students CSV
    pub fn get_students_file_path(&self) -> PathBuf {
        self.base_directory.join("students.csv")
    }

    /// Get the file path for the payments CSV
    pub fn get_payments_file_path(&self) -> PathBuf {
        self.base_directory.join("payments.csv")
    }

    /// Get the file path for the attendance CSV
    pub fn get_attendance_file_path(&self) -> PathBuf {
        self.base_directory.join("attendance.csv")
    }

    /// Get the file path for the institute settings YAML
    pub fn get_settings_file_path(&self) -> PathBuf {
        self.base_directory.join("institute.yaml")
    }

    /// Ensure a CSV file exists with the given header line
    pub fn ensure_csv_file_exists(&self, file_path: &Path, header: &str) -> Result<()> {
        if !self.base_directory.exists() {
            fs::create_dir_all(&self.base_directory)?;
        }

        if !file_path.exists() {
            fs::write(file_path, format!("{}\n", header))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_creates_base_directory() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("institute_data");
        assert!(!data_dir.exists());

        let connection = CsvConnection::new(&data_dir).unwrap();
        assert!(data_dir.exists());
        assert_eq!(connection.base_directory(), data_dir.as_path());
    }

    #[test]
    fn test_ensure_csv_file_exists_writes_header_once() {
        let temp_dir = TempDir::new().unwrap();
        let connection = CsvConnection::new(temp_dir.path()).unwrap();
        let file_path = connection.get_courses_file_path();

        connection
            .ensure_csv_file_exists(&file_path, "id,name")
            .unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "id,name\n");

        // Existing content must not be overwritten on a second call.
        fs::write(&file_path, "id,name\ncourse::1,Physics\n").unwrap();
        connection
            .ensure_csv_file_exists(&file_path, "id,name")
            .unwrap();
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "id,name\ncourse::1,Physics\n"
        );
    }
}
