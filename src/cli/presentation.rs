//! CLI presentation: text formatting for projects, pages, styles and progress
//! (comfy-table + styled headings). Pure functions of their inputs.

use crate::generation::{JobProgress, PagePrompt, ProgressEvent, RecoveryReport, StyleProgress};
use crate::store::{PageRecord, Project, StyleTemplate};
use crate::types::{JobStatus, PageStatus};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn page_status_cell(status: PageStatus) -> String {
    match status {
        PageStatus::Completed => status.as_str().green().to_string(),
        PageStatus::Failed => status.as_str().red().to_string(),
        PageStatus::Pending => status.as_str().yellow().to_string(),
    }
}

pub fn format_project_list_text(projects: &[Project]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Projects")));
    if projects.is_empty() {
        out.push_str("No projects.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Id", "Workspace", "Title", "Pages", "Status", "Style"]);
    for project in projects {
        table.add_row(vec![
            project.id.to_string(),
            project.workspace_id.to_string(),
            project.title.clone(),
            project.expected_pages.to_string(),
            project.status.to_string(),
            project
                .selected_style_index
                .map(|i| i.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

/// Project header plus one row per page record
pub fn format_project_text(project: &Project, records: &[PageRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!("Project {}: {}", project.id, project.title))
    ));
    out.push_str(&format!("  Workspace: {}\n", project.workspace_id));
    out.push_str(&format!("  Status: {}\n", project.status));
    if let Some(index) = project.selected_style_index {
        out.push_str(&format!("  Selected style: {}\n", index));
    }
    out.push_str(&format!(
        "  Updated: {}\n\n",
        project.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format_page_records(records));
    out
}

/// Completed/failed/pending counts and the page table
pub fn format_page_records(records: &[PageRecord]) -> String {
    if records.is_empty() {
        return "No pages generated yet.\n".to_string();
    }
    let count = |status: PageStatus| records.iter().filter(|r| r.status == status).count();
    let mut out = format!(
        "  Pages: {} completed, {} failed, {} pending\n\n",
        count(PageStatus::Completed),
        count(PageStatus::Failed),
        count(PageStatus::Pending)
    );

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Page", "Status", "Retries", "Image / Error"]);
    for record in records {
        let detail = match (&record.image_path, &record.error_message) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(error)) => error.clone(),
            (None, None) => "-".to_string(),
        };
        table.add_row(vec![
            record.page_number.to_string(),
            page_status_cell(record.status),
            record.retry_count.to_string(),
            detail,
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

fn format_job_progress(progress: &JobProgress) -> String {
    let status = match progress.status {
        JobStatus::Generating => progress.status.as_str().cyan().to_string(),
        JobStatus::Completed => progress.status.as_str().green().to_string(),
        JobStatus::Failed => progress.status.as_str().red().to_string(),
    };
    let mut line = format!(
        "[{}/{}] {}",
        progress.current_page, progress.total_pages, status
    );
    if let Some(ref error) = progress.error {
        line.push_str(&format!(": {}", error));
    }
    line
}

/// One line per progress snapshot
pub fn format_progress_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::NotStarted => "generation job has not started".to_string(),
        ProgressEvent::Snapshot(progress) => format_job_progress(progress),
    }
}

pub fn format_style_status_text(
    progress: &StyleProgress,
    templates: &[StyleTemplate],
    selected: Option<usize>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Style templates")));
    out.push_str(&format!(
        "  Run: {} ({}/{}) {}\n\n",
        progress.status.as_str(),
        progress.current,
        progress.total,
        progress.message
    ));
    if templates.is_empty() {
        out.push_str("No style templates available.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Index", "Image", "Selected"]);
    for template in templates {
        let mark = if selected == Some(template.template_index) {
            "*"
        } else {
            ""
        };
        table.add_row(vec![
            template.template_index.to_string(),
            template.image_path.display().to_string(),
            mark.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_prompts_text(prompts: &[PagePrompt]) -> String {
    if prompts.is_empty() {
        return "Project has no outline pages.\n".to_string();
    }
    let mut out = String::new();
    for prompt in prompts {
        let reference = if prompt.uses_style_reference {
            "with style reference"
        } else {
            "no style reference"
        };
        out.push_str(&format!(
            "{}\n{}\n\n",
            format_section_heading(&format!(
                "Page {}: {} ({})",
                prompt.page_number, prompt.title, reference
            )),
            prompt.prompt
        ));
    }
    out
}

pub fn format_recovery_report(report: &RecoveryReport) -> String {
    if report.interrupted.is_empty() {
        return "No interrupted jobs.".to_string();
    }
    let mut out = format!(
        "Interrupted jobs: {} (resumed {}, settled {}, failed {})",
        report.interrupted.len(),
        report.resumed.len(),
        report.settled.len(),
        report.failed.len()
    );
    for (project_id, error) in &report.failed {
        out.push_str(&format!("\n  project {}: {}", project_id, error.red()));
    }
    out
}
