//! Well-known locations under the application root.

use std::path::{Path, PathBuf};

pub const ROOT_ENV: &str = "HOSPITAL_SCHEDULER_ROOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Three levels above the executable's directory, else the working directory.
    pub fn discover() -> Self {
        let from_exe = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.ancestors().nth(4).map(Path::to_path_buf));
        let root = from_exe
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("Backend").join("PythonScripts")
    }

    pub fn request_file(&self) -> PathBuf {
        self.scripts_dir().join("input.json")
    }

    pub fn scheduler_script(&self) -> PathBuf {
        self.scripts_dir().join("scheduler.py")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("Results")
    }

    pub fn predictor_script(&self) -> PathBuf {
        self.scripts_dir().join("disease_predictor.py")
    }

    pub fn prediction_input(&self) -> PathBuf {
        self.scripts_dir().join("disease_input.json")
    }

    pub fn symptom_catalog(&self) -> PathBuf {
        self.scripts_dir().join("symptom_columns.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_hang_off_the_root() {
        let paths = AppPaths::new("/srv/hospital");
        assert_eq!(
            paths.request_file(),
            PathBuf::from("/srv/hospital/Backend/PythonScripts/input.json")
        );
        assert_eq!(
            paths.scheduler_script(),
            PathBuf::from("/srv/hospital/Backend/PythonScripts/scheduler.py")
        );
        assert_eq!(paths.results_dir(), PathBuf::from("/srv/hospital/Results"));
        assert_eq!(
            paths.symptom_catalog().file_name().unwrap(),
            "symptom_columns.json"
        );
    }
}
