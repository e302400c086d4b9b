//! CLI parse: clap types for slidegen. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Slidegen CLI - resumable slide image generation
#[derive(Parser)]
#[command(name = "slidegen")]
#[command(about = "Generate slide images from stored outlines, with resumable jobs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage projects and their outlines
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Generate, inspect and select style templates
    Styles {
        #[command(subcommand)]
        command: StyleCommands,
    },
    /// Generate page images (resumes an interrupted job when there is one)
    Generate {
        /// Project id
        project_id: u64,
        /// Per-page custom prompts as a JSON object, e.g. '{"2": "use a chart"}'
        #[arg(long)]
        overrides: Option<String>,
    },
    /// Resume an interrupted generation job
    Resume {
        /// Project id
        project_id: u64,
    },
    /// Show persisted page generation status
    Progress {
        /// Project id
        project_id: u64,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Regenerate a single page
    Regenerate {
        /// Project id
        project_id: u64,
        /// Page number (1-based)
        page_number: u32,
        /// Extra requirement appended to the page description
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Show the prompt each page would be rendered with
    Prompts {
        /// Project id
        project_id: u64,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Copy completed page images into a directory
    Export {
        /// Project id
        project_id: u64,
        /// Destination directory
        dest: PathBuf,
    },
    /// Resume every job interrupted by a previous process exit
    Recover,
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a project and its outline from a JSON file
    Import {
        /// Path to a JSON file: {"workspace_id", "title", "user_prompt", "pages": [...]}
        file: PathBuf,
    },
    /// Show one project with its page records
    Show {
        /// Project id
        project_id: u64,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List all projects
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum StyleCommands {
    /// Generate a fresh set of style templates
    Generate {
        /// Project id
        project_id: u64,
        /// Extra requirement appended to every style description
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Show style generation progress and available templates
    Status {
        /// Project id
        project_id: u64,
    },
    /// Select the style used for page generation
    Select {
        /// Project id
        project_id: u64,
        /// Template index (0, 1 or 2)
        index: usize,
    },
}
