//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; single route table dispatches to the generation API.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, ProjectCommands, StyleCommands};
pub use presentation::{
    format_page_records, format_progress_event, format_project_list_text, format_project_text,
    format_prompts_text, format_recovery_report, format_section_heading,
    format_style_status_text,
};
pub use route::RunContext;
