//! Persistence layer for the Project State Store

use crate::error::StorageError;
use crate::store::{
    NewProject, OutlinePage, PageOutcome, PageRecord, Project, ProjectStore, StyleTemplate,
};
use crate::types::{PageNumber, PageStatus, ProjectId, ProjectStatus};
use bincode;
use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled;
use std::collections::HashMap;
use std::path::Path;

const TREE_PROJECTS: &str = "projects";
const TREE_OUTLINES: &str = "outline_pages";
const TREE_STYLES: &str = "style_templates";
const TREE_PAGES: &str = "page_records";

/// Sled-based implementation of ProjectStore
///
/// Row keys are big-endian so that a prefix scan over one project yields rows in
/// ascending page-number (or template-index) order.
pub struct SledProjectStore {
    db: sled::Db,
    projects: sled::Tree,
    outlines: sled::Tree,
    styles: sled::Tree,
    pages: sled::Tree,
    /// Serializes read-modify-write updates so concurrent writers never lose a field
    write_lock: Mutex<()>,
}

impl SledProjectStore {
    /// Open (or create) a store at the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::from_db(db)
    }

    /// Build a store on an already-open database
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            projects: db.open_tree(TREE_PROJECTS)?,
            outlines: db.open_tree(TREE_OUTLINES)?,
            styles: db.open_tree(TREE_STYLES)?,
            pages: db.open_tree(TREE_PAGES)?,
            db,
            write_lock: Mutex::new(()),
        })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn put_project(&self, project: &Project) -> Result<(), StorageError> {
        self.projects
            .insert(project.id.to_be_bytes(), encode(project)?)?;
        self.db.flush()?;
        Ok(())
    }

    fn modify_project<F>(&self, project_id: ProjectId, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Project),
    {
        let _guard = self.write_lock.lock();
        let mut project = self
            .get_project(project_id)?
            .ok_or(StorageError::ProjectNotFound(project_id))?;
        f(&mut project);
        project.updated_at = Utc::now();
        self.put_project(&project)
    }

    fn modify_page_record<F>(
        &self,
        project_id: ProjectId,
        page_number: PageNumber,
        f: F,
    ) -> Result<PageRecord, StorageError>
    where
        F: FnOnce(&mut PageRecord),
    {
        let _guard = self.write_lock.lock();
        let key = row_key(project_id, page_number);
        let raw = self
            .pages
            .get(key)?
            .ok_or(StorageError::PageRecordNotFound {
                project_id,
                page_number,
            })?;
        let mut record: PageRecord = decode(&raw)?;
        f(&mut record);
        record.updated_at = Utc::now();
        self.pages.insert(key, encode(&record)?)?;
        self.db.flush()?;
        Ok(record)
    }

    fn clear_prefix(tree: &sled::Tree, project_id: ProjectId) -> Result<(), StorageError> {
        let keys: Vec<sled::IVec> = tree
            .scan_prefix(project_id.to_be_bytes())
            .keys()
            .collect::<Result<_, _>>()?;
        for key in keys {
            tree.remove(key)?;
        }
        Ok(())
    }
}

impl ProjectStore for SledProjectStore {
    fn create_project(&self, new: &NewProject) -> Result<ProjectId, StorageError> {
        // sled ids start at 0; keep project ids 1-based
        let id = self.db.generate_id()? + 1;
        let now = Utc::now();
        let project = Project {
            id,
            workspace_id: new.workspace_id,
            title: new.title.clone(),
            user_prompt: new.user_prompt.clone(),
            expected_pages: new.expected_pages,
            status: ProjectStatus::Draft,
            selected_style_index: None,
            page_overrides: HashMap::new(),
            created_at: now,
            updated_at: now,
        };
        self.put_project(&project)?;
        Ok(id)
    }

    fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>, StorageError> {
        match self.projects.get(project_id.to_be_bytes())? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        self.projects
            .iter()
            .values()
            .map(|value| decode(&value?))
            .collect()
    }

    fn update_project_status(
        &self,
        project_id: ProjectId,
        status: ProjectStatus,
    ) -> Result<(), StorageError> {
        self.modify_project(project_id, |project| project.status = status)
    }

    fn update_project_style(
        &self,
        project_id: ProjectId,
        style_index: usize,
    ) -> Result<(), StorageError> {
        self.modify_project(project_id, |project| {
            project.selected_style_index = Some(style_index)
        })
    }

    fn update_project_overrides(
        &self,
        project_id: ProjectId,
        overrides: &HashMap<PageNumber, String>,
    ) -> Result<(), StorageError> {
        self.modify_project(project_id, |project| {
            project.page_overrides = overrides.clone()
        })
    }

    fn put_outline_page(&self, page: &OutlinePage) -> Result<(), StorageError> {
        self.outlines
            .insert(row_key(page.project_id, page.page_number), encode(page)?)?;
        Ok(())
    }

    fn get_outline_pages(&self, project_id: ProjectId) -> Result<Vec<OutlinePage>, StorageError> {
        scan_project(&self.outlines, project_id)
    }

    fn add_style_template(
        &self,
        project_id: ProjectId,
        template_index: usize,
        image_path: &Path,
    ) -> Result<StyleTemplate, StorageError> {
        let template = StyleTemplate {
            project_id,
            template_index,
            image_path: image_path.to_path_buf(),
            created_at: Utc::now(),
        };
        self.styles
            .insert(row_key(project_id, template_index as u32), encode(&template)?)?;
        self.db.flush()?;
        Ok(template)
    }

    fn get_style_templates(&self, project_id: ProjectId) -> Result<Vec<StyleTemplate>, StorageError> {
        scan_project(&self.styles, project_id)
    }

    fn delete_style_templates(&self, project_id: ProjectId) -> Result<(), StorageError> {
        Self::clear_prefix(&self.styles, project_id)?;
        self.db.flush()?;
        Ok(())
    }

    fn add_page_record(
        &self,
        project_id: ProjectId,
        page_number: PageNumber,
    ) -> Result<(), StorageError> {
        let record = PageRecord::pending(project_id, page_number);
        self.pages
            .insert(row_key(project_id, page_number), encode(&record)?)?;
        Ok(())
    }

    fn get_page_records(&self, project_id: ProjectId) -> Result<Vec<PageRecord>, StorageError> {
        scan_project(&self.pages, project_id)
    }

    fn update_page_record(
        &self,
        project_id: ProjectId,
        page_number: PageNumber,
        outcome: PageOutcome<'_>,
    ) -> Result<(), StorageError> {
        self.modify_page_record(project_id, page_number, |record| match outcome {
            PageOutcome::Completed { image_path } => {
                record.status = PageStatus::Completed;
                record.image_path = Some(image_path.to_path_buf());
                record.error_message = None;
            }
            PageOutcome::Failed { error } => {
                record.status = PageStatus::Failed;
                record.image_path = None;
                record.error_message = Some(error.to_string());
            }
        })?;
        Ok(())
    }

    fn increment_page_retry_count(
        &self,
        project_id: ProjectId,
        page_number: PageNumber,
    ) -> Result<u32, StorageError> {
        let record = self.modify_page_record(project_id, page_number, |record| {
            record.retry_count += 1
        })?;
        Ok(record.retry_count)
    }

    fn delete_page_records(&self, project_id: ProjectId) -> Result<(), StorageError> {
        Self::clear_prefix(&self.pages, project_id)?;
        self.db.flush()?;
        Ok(())
    }
}

fn row_key(project_id: ProjectId, index: u32) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&project_id.to_be_bytes());
    key[8..].copy_from_slice(&index.to_be_bytes());
    key
}

fn scan_project<T: DeserializeOwned>(
    tree: &sled::Tree,
    project_id: ProjectId,
) -> Result<Vec<T>, StorageError> {
    tree.scan_prefix(project_id.to_be_bytes())
        .values()
        .map(|value| decode(&value?))
        .collect()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T, StorageError> {
    Ok(bincode::deserialize(raw)?)
}
