//! Page content descriptions and prompt previews.

use crate::provider::PromptTemplates;
use crate::store::OutlinePage;
use crate::types::PageNumber;
use serde::Serialize;

/// Textual description of one outline page, optionally with a custom requirement line
pub fn page_content(page: &OutlinePage, custom_prompt: Option<&str>) -> String {
    let mut content = format!("Title: {}\nContent: {}", page.title, page.content);
    if let Some(image_prompt) = page
        .image_prompt
        .as_deref()
        .filter(|prompt| !prompt.trim().is_empty())
    {
        content.push_str("\nImage prompt: ");
        content.push_str(image_prompt);
    }
    if let Some(custom) = custom_prompt.filter(|custom| !custom.trim().is_empty()) {
        content.push_str("\nAdditional requirements: ");
        content.push_str(custom);
    }
    content
}

/// Style archetype description with the optional augmentation appended
pub fn style_description(archetype: &str, augmentation: Option<&str>) -> String {
    match augmentation.filter(|extra| !extra.trim().is_empty()) {
        Some(extra) => format!("{}. Additional requirements: {}", archetype, extra),
        None => archetype.to_string(),
    }
}

/// The prompt a page would be rendered with
#[derive(Debug, Clone, Serialize)]
pub struct PagePrompt {
    pub page_number: PageNumber,
    pub title: String,
    pub prompt: String,
    pub uses_style_reference: bool,
}

/// Build the full prompt for every outline page
pub fn preview_prompts(
    templates: &PromptTemplates,
    outline: &[OutlinePage],
    uses_style_reference: bool,
) -> Vec<PagePrompt> {
    outline
        .iter()
        .map(|page| PagePrompt {
            page_number: page.page_number,
            title: page.title.clone(),
            prompt: templates.page_prompt(&page_content(page, None), uses_style_reference),
            uses_style_reference,
        })
        .collect()
}
