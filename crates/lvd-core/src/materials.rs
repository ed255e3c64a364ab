//! Course materials: file and folder activities downloaded with the session.
//!
//! Runs one course at a time, sequentially, through the authenticated
//! transport. Files already on disk are left alone. Assignments and quizzes
//! are listed by discovery but not fetched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::DiscoveryError;
use crate::http::HttpTransport;
use crate::model::{Course, Material, MaterialKind};
use crate::page_model::{self, FolderFile};
use crate::paths;
use crate::retry::{get_with_retry, RetryPolicy};

/// Outcome of one materials run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialsReport {
    /// Files written by this run.
    pub saved: Vec<PathBuf>,
    /// Files already present at their destination.
    pub existing: usize,
    pub failed: usize,
    /// Assignment and quiz activities.
    pub skipped: usize,
    pub log: Vec<String>,
}

impl MaterialsReport {
    fn note(&mut self, line: String) {
        tracing::info!("{}", line);
        self.log.push(line);
    }
}

#[derive(Clone)]
pub struct MaterialFetcher {
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
    platform_base: String,
    root: PathBuf,
}

impl MaterialFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        retry: RetryPolicy,
        platform_base: String,
        root: PathBuf,
    ) -> Self {
        Self {
            transport,
            retry,
            platform_base,
            root,
        }
    }

    /// Download every file and folder material of `course`. A failed file is
    /// counted and the run continues; an expired session aborts it.
    pub async fn download_course(&self, course: &Course) -> Result<MaterialsReport, DiscoveryError> {
        let mut report = MaterialsReport::default();
        for material in &course.materials {
            match material.kind {
                MaterialKind::File => {
                    let dest = paths::material_destination(
                        &self.root,
                        course,
                        &material.week,
                        None,
                        &material.title,
                    );
                    self.fetch(&material.url, &dest, &mut report).await;
                }
                MaterialKind::Folder => self.fetch_folder(course, material, &mut report).await?,
                MaterialKind::Assignment | MaterialKind::Quiz => {
                    tracing::debug!(title = %material.title, kind = %material.kind, "not downloadable");
                    report.skipped += 1;
                }
            }
        }
        report.note(format!(
            "materials of {}: {} saved, {} already present, {} failed, {} skipped",
            course.name,
            report.saved.len(),
            report.existing,
            report.failed,
            report.skipped
        ));
        Ok(report)
    }

    async fn fetch_folder(
        &self,
        course: &Course,
        folder: &Material,
        report: &mut MaterialsReport,
    ) -> Result<(), DiscoveryError> {
        let page = match get_with_retry(self.transport.as_ref(), &self.retry, &folder.url).await {
            Ok(page) => page,
            Err(e) => {
                report.failed += 1;
                report.note(format!("folder {}: {}", folder.title, e));
                return Ok(());
            }
        };
        if page_model::is_login_page(&page.url, &page.body) {
            return Err(DiscoveryError::SessionExpired);
        }
        let files = page_model::parse_folder_page(&page.body, &self.platform_base);
        if files.is_empty() {
            report.note(format!("folder {}: no files", folder.title));
        }
        for FolderFile { name, url } in files {
            let dest = paths::material_destination(
                &self.root,
                course,
                &folder.week,
                Some(&folder.title),
                &name,
            );
            self.fetch(&url, &dest, report).await;
        }
        Ok(())
    }

    async fn fetch(&self, url: &str, dest: &Path, report: &mut MaterialsReport) {
        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            report.existing += 1;
            return;
        }
        match self.transport.download_to(url, dest).await {
            Ok(bytes) => {
                report.note(format!("saved {} ({} bytes)", dest.display(), bytes));
                report.saved.push(dest.to_path_buf());
            }
            Err(e) => {
                report.failed += 1;
                report.note(format!("failed {}: {}", dest.display(), e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{Reply, ScriptedTransport};

    const BASE: &str = "https://ys.learnus.org";

    fn material(title: &str, kind: MaterialKind, url: &str) -> Material {
        Material {
            title: title.into(),
            kind,
            url: url.into(),
            week: "Week 1".into(),
        }
    }

    fn course(materials: Vec<Material>) -> Course {
        Course {
            id: "7".into(),
            name: "Networks".into(),
            professor: String::new(),
            year: "2024".into(),
            semester: "20".into(),
            url: format!("{BASE}/course/view.php?id=7"),
            lectures: vec![],
            materials,
        }
    }

    fn fetcher(t: Arc<ScriptedTransport>, root: &Path) -> MaterialFetcher {
        MaterialFetcher::new(t, RetryPolicy::none(), BASE.into(), root.to_path_buf())
    }

    const FOLDER: &str = r#"<div class="foldertree">
        <a href="/pluginfile.php/1/mod_folder/content/0/a.pdf?forcedownload=1"><span class="fp-filename">a.pdf</span></a>
        <a href="/pluginfile.php/1/mod_folder/content/0/b.zip?forcedownload=1"><span class="fp-filename">b.zip</span></a>
      </div>"#;

    #[tokio::test]
    async fn files_and_folders_land_in_the_course_tree() {
        let dir = tempfile::tempdir().unwrap();
        let t = Arc::new(
            ScriptedTransport::new()
                .route(&format!("{BASE}/mod/resource/view.php?id=9"), Reply::Bytes(b"syllabus".to_vec()))
                .html(&format!("{BASE}/mod/folder/view.php?id=90"), FOLDER)
                .route(
                    &format!("{BASE}/pluginfile.php/1/mod_folder/content/0/a.pdf?forcedownload=1"),
                    Reply::Bytes(b"pdf".to_vec()),
                )
                .route(
                    &format!("{BASE}/pluginfile.php/1/mod_folder/content/0/b.zip?forcedownload=1"),
                    Reply::Status(403),
                ),
        );
        let c = course(vec![
            material("Syllabus", MaterialKind::File, &format!("{BASE}/mod/resource/view.php?id=9")),
            material("Slides", MaterialKind::Folder, &format!("{BASE}/mod/folder/view.php?id=90")),
            material("HW1", MaterialKind::Assignment, &format!("{BASE}/mod/assign/view.php?id=77")),
        ]);

        let report = fetcher(t.clone(), dir.path()).download_course(&c).await.unwrap();

        let course_dir = dir.path().join("2024-20-Networks");
        assert_eq!(
            report.saved,
            vec![
                course_dir.join("Week_1_Syllabus"),
                course_dir.join("Week_1_Slides").join("a.pdf"),
            ]
        );
        assert_eq!(std::fs::read(course_dir.join("Week_1_Slides").join("a.pdf")).unwrap(), b"pdf");
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert!(!course_dir.join("Week_1_Slides").join("b.zip").exists());
        assert_eq!(t.calls_to(&format!("{BASE}/mod/assign/view.php?id=77")), 0);
        assert!(report.log.last().unwrap().contains("1 failed"));
    }

    #[tokio::test]
    async fn existing_files_are_not_fetched_again() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{BASE}/mod/resource/view.php?id=9");
        let t = Arc::new(ScriptedTransport::new().route(&url, Reply::Bytes(b"new".to_vec())));
        let c = course(vec![material("Syllabus", MaterialKind::File, &url)]);
        let dest = dir.path().join("2024-20-Networks").join("Week_1_Syllabus");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"old").unwrap();

        let report = fetcher(t.clone(), dir.path()).download_course(&c).await.unwrap();
        assert_eq!(report.existing, 1);
        assert!(report.saved.is_empty());
        assert_eq!(t.call_count(), 0);
        assert_eq!(std::fs::read(&dest).unwrap(), b"old");
    }

    #[tokio::test]
    async fn login_page_instead_of_folder_is_session_expired() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{BASE}/mod/folder/view.php?id=90");
        let t = Arc::new(ScriptedTransport::new().route(
            &url,
            Reply::Redirected {
                to: format!("{BASE}/login/index.php"),
                body: r#"<input type="password" name="password">"#.into(),
            },
        ));
        let c = course(vec![material("Slides", MaterialKind::Folder, &url)]);
        let err = fetcher(t, dir.path()).download_course(&c).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::SessionExpired));
    }
}
