//! Image prompt construction
//!
//! Two template variants exist: the full template carries the whole
//! outline and the user's topic for cross-page consistency, the short
//! one only the page itself for providers with tight prompt limits.

use crate::task::{ImageStyle, Page};

const FULL_TEMPLATE: &str = "\
Create a single illustration for one page of a blog post.

Page type: {page_type}
Page content:
{page_content}

Full outline of the post, for visual consistency across pages:
{full_outline}

Original topic request: {user_topic}

Visual style: {image_style}

The image must stand on its own without embedded captions or paragraphs \
of text, and must stay visually consistent with the other pages of the \
series.";

const SHORT_TEMPLATE: &str = "\
Illustration for the {page_type} page of a blog post.
Page content: {page_content}
Visual style: {image_style}
No embedded captions or paragraphs of text.";

/// Render the generation prompt for one page
pub fn render(
    page: &Page,
    full_outline: &str,
    user_topic: &str,
    style: ImageStyle,
    short: bool,
) -> String {
    let topic = if user_topic.is_empty() {
        "Not provided"
    } else {
        user_topic
    };

    let template = if short { SHORT_TEMPLATE } else { FULL_TEMPLATE };

    template
        .replace("{page_type}", page.kind.as_str())
        .replace("{page_content}", &page.content)
        .replace("{full_outline}", full_outline)
        .replace("{user_topic}", topic)
        .replace("{image_style}", style.descriptive_phrase())
}
