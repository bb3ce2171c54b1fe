//! Templated documents used when generation fails, and the package guide

use std::path::PathBuf;

use super::BlogContent;

pub const FALLBACK_TITLE: &str = "Video Analysis: Key Insights and Takeaways";
pub const DEFAULT_AUTHOR: &str = "AI Video Analyst";

/// Placeholder for a variant the model left out
pub fn missing_variant(title: &str, key: &str) -> String {
    format!("# {}\n\nContent generation failed for {} format.", title, key)
}

/// Build all three variants from the report itself
pub fn fallback_content(title: &str, author: &str, date: &str, report: &str, frame_descriptions: &[String]) -> BlogContent {
    let insights: Vec<&String> = frame_descriptions.iter().take(5).collect();

    let bullets = insights
        .iter()
        .map(|desc| format!("• {}", desc))
        .collect::<Vec<_>>()
        .join("\n");

    let medium = format!(
        "# {title}\n\n\
*By {author} • {date}*\n\n\
## Overview\n\n\
This article provides insights from an AI-powered video analysis, breaking down key moments and extracting valuable information from the content.\n\n\
## Key Insights\n\n\
{bullets}\n\n\
## Full Analysis\n\n\
{report}\n\n\
## Conclusion\n\n\
This analysis demonstrates the power of AI in extracting meaningful insights from video content, providing structured summaries and key takeaways.\n\n\
---\n\n\
*Generated using AI Video Analysis Tools*\n"
    );

    let items: String = insights
        .iter()
        .map(|desc| format!("<li>{}</li>", escape_html(desc)))
        .collect();
    let analysis = escape_html(report).replace('\n', "<br>");

    let newsletter = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title_html}</title>
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
    <div style="background: #f8f9fa; padding: 20px; text-align: center;">
        <h1>{title_html}</h1>
        <p>By {author_html} • {date}</p>
    </div>
    <div style="padding: 20px;">
        <h2>Key Insights</h2>
        <ul>
        {items}
        </ul>
        <h2>Full Analysis</h2>
        <div>{analysis}</div>
    </div>
    <div style="background: #e9ecef; padding: 15px; text-align: center; font-size: 12px;">
        Generated using AI Video Analysis Tools
    </div>
</body>
</html>"#,
        title_html = escape_html(title),
        author_html = escape_html(author),
    );

    BlogContent {
        wordpress: medium.clone(),
        medium,
        newsletter,
    }
}

/// README shipped with the blog package
pub fn package_readme(generated_at: &str, images: &[PathBuf]) -> String {
    let image_list = images
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| format!("- {}", name.to_string_lossy()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "# Blog Post Package

Generated on: {generated_at}

## Contents

- `blog_post_medium.md` - Medium.com compatible markdown
- `newsletter.html` - HTML newsletter format
- `blog_post_wordpress.md` - WordPress/Ghost compatible markdown
- `images/` - Frame images from video analysis

## Publishing Instructions

### Medium.com
1. Copy content from `blog_post_medium.md`
2. Upload images from `images/` folder
3. Replace image placeholders with uploaded images

### Newsletter (Mailchimp, ConvertKit, etc.)
1. Use `newsletter.html` as template
2. Upload images to your newsletter platform
3. Update image URLs in the HTML

### WordPress/Ghost
1. Copy content from `blog_post_wordpress.md`
2. Upload images to media library
3. Update image URLs in the markdown

## Image Files
{image_list}

## Tips
- Optimize images for web (compress if needed)
- Add alt text for accessibility
- Customize content to match your brand voice
- Add your own CTAs and links
"
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
