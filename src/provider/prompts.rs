//! Prompt templates for style and page rendering.
//!
//! Templates use `{style_description}`, `{page_content}` and `{style_reference}`
//! placeholders. Built-in defaults can be replaced by `style_template.txt` and
//! `page_generation.txt` in a prompts directory.

use crate::error::ApiError;
use std::path::Path;
use tracing::debug;

const STYLE_TEMPLATE_FILE: &str = "style_template.txt";
const PAGE_TEMPLATE_FILE: &str = "page_generation.txt";

const DEFAULT_STYLE_TEMPLATE: &str = "\
Design a single 16:9 presentation slide that serves as a visual style template.
Style: {style_description}
Show a title area, a body text area and decorative elements that define the palette,
typography and layout language. Use placeholder text only.";

const DEFAULT_PAGE_TEMPLATE: &str = "\
Render one 16:9 presentation slide with the following content.
{page_content}

Style guidance: {style_reference}
Keep text legible, preserve the hierarchy of title and body, and keep the look consistent
across slides.";

/// Wording passed for `{style_reference}` when a reference image is attached
pub const STYLE_REFERENCE_ATTACHED: &str = "match the attached style template image";
/// Wording passed for `{style_reference}` when no reference is available
pub const STYLE_REFERENCE_NONE: &str = "no style reference; choose a clean, professional look";

/// Loaded prompt templates
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    style_template: String,
    page_template: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            style_template: DEFAULT_STYLE_TEMPLATE.to_string(),
            page_template: DEFAULT_PAGE_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Load templates, replacing each default whose override file exists in `dir`
    pub fn load(dir: Option<&Path>) -> Result<Self, ApiError> {
        let mut templates = Self::default();
        let Some(dir) = dir else {
            return Ok(templates);
        };

        if let Some(text) = read_override(dir, STYLE_TEMPLATE_FILE)? {
            templates.style_template = text;
        }
        if let Some(text) = read_override(dir, PAGE_TEMPLATE_FILE)? {
            templates.page_template = text;
        }
        Ok(templates)
    }

    /// Full prompt for one style archetype
    pub fn style_prompt(&self, style_description: &str) -> String {
        self.style_template
            .replace("{style_description}", style_description)
    }

    /// Full prompt for one page
    pub fn page_prompt(&self, page_content: &str, has_style_reference: bool) -> String {
        let reference = if has_style_reference {
            STYLE_REFERENCE_ATTACHED
        } else {
            STYLE_REFERENCE_NONE
        };
        self.page_template
            .replace("{page_content}", page_content)
            .replace("{style_reference}", reference)
    }
}

fn read_override(dir: &Path, file_name: &str) -> Result<Option<String>, ApiError> {
    let path = dir.join(file_name);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(|e| {
        ApiError::ConfigError(format!("Failed to read prompt template {:?}: {}", path, e))
    })?;
    debug!(template = %path.display(), "Loaded prompt template override");
    Ok(Some(text))
}
