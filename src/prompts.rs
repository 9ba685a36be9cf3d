//! Prompt construction for slide image generation.
//!
//! Every prompt the backend sees is assembled here from fixed template
//! sections plus slide-specific substitutions. Nothing in this module does
//! I/O, so the same slide, outline context and flags always produce
//! byte-identical prompts.

use crate::pipeline::outline::Slide;

/// Title keywords (lowercase) marking the outline's global style section.
pub const STYLE_SECTION_KEYWORDS: [&str; 3] =
    ["global visual requirements", "visual style", "design standards"];

/// Content preview length per slide in the outline context.
const PREVIEW_CHARS: usize = 200;

const SYSTEM_HEADER: &str = "You are an elite Presentation Designer and Data Visualization Expert.
Your task is to generate a pixel-perfect 1920x1080 (16:9) slide image.

# GLOBAL DESIGN STANDARDS
1. **Aspect Ratio**: 16:9 (Landscape).
2. **Typography**: Use professional, highly legible sans-serif fonts. Title size: 60pt+. Body size: 24pt+.
3. **Margins**: Maintain 5% safety margin on all sides. No content touching edges.
4. **Consistency**: Maintain a cohesive visual identity throughout the presentation.";

const ARTICLE_SECTION: &str = "
# REFERENCE ARTICLE
An original article is provided as context. Use insights, data, and themes from this article to inform slide content and ensure accuracy.
";

const STYLE_REFERENCE_SECTION: &str = "
# VISUAL STYLE REFERENCE (STRICT ADHERENCE REQUIRED):
1. **Analyze the Reference Image**: Extract the color palette (background, accents, text), font style, layout grid, and graphic mood.
2. **Style Transfer**: Replicate the exact visual style. Match the background texture and color hex codes EXACTLY.
3. **Consistency**: The new slide MUST look like it belongs to the same deck as the reference.
4. **Content Adaptation**: Keep the reference's LOOK, but replace the content with the new text provided below.";

const ADAPTIVE_STYLE_SECTION: &str = "
# VISUAL STYLE SPECIFICATION (Adaptive Professional):
- **Palette**: Derive a professional color palette that fits the *subject matter* (e.g., Tech = Blue/Grey, Nature = Green/Earth, Finance = Navy/Gold).
- **Background**: Clean, solid or subtle gradient. High contrast with text.
- **Graphics**: Modern, flat, or semi-flat vector illustrations. Minimal shadows.
- **Mood**: Professional, trustworthy, clear.
";

const LAYOUT_AND_CONSTRAINTS: &str = "# LAYOUT STRATEGY (Choose one based on content)
- **Title Slide**: Bold, centered title, minimal visual, strong background.
- **Split Screen**: Text on left/right, Image/Chart on opposite side. Best for \"Introduction\" or \"Concept vs. Reality\".
- **Bento Grid**: 2-4 distinct rectangular content blocks. Best for \"Key Points\" or \"Features\".
- **Data Focus**: Large chart/graph in center, key takeaway text below/side. Best for \"Statistics\" or \"Trends\".
- **Statement**: One powerful sentence or quote in center. Best for \"Vision\" or \"Impact\".

# VISUAL INTERPRETATION
- If the content contains a `[Visual: ...]` tag, PRIORITIZE that instruction for the imagery/layout.
- Visualize the core concept. Do not just paste the text.
- If the content contains a list, use a clean list layout with custom bullets or icons.
- If the content contains data, visualize it as a chart or infographic.

# NEGATIVE CONSTRAINTS
- NO spelling errors.
- NO lorem ipsum or placeholder text.
- NO cluttered \"wall of text\" (max 30 words per slide unless a list).
- NO cropped elements.
- NO low-contrast text (e.g., light gray on white).
- NO photorealistic human faces (use silhouettes or stylized avatars if needed).";

const DESIGN_INSTRUCTIONS: &str = "**Design Instructions**:
1. Select the most appropriate layout from the LAYOUT STRATEGY list above.
2. Visualize the core concept. Do not just paste the text.
3. If the content contains a list, use a clean list layout with custom bullets or icons.
4. If the content contains data, visualize it as a chart or infographic.
5. ENSURE the Title is the most prominent text element.
";

/// Which style instruction a prompt carries. Exactly one applies per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleDirective<'a> {
    /// A reference image accompanies every request: strict style transfer.
    ReferenceImage,
    /// The outline defines its own style section, embedded verbatim.
    GlobalStyle(&'a str),
    /// No style input: let the model derive a palette from the subject.
    Adaptive,
}

impl<'a> StyleDirective<'a> {
    /// Resolve the directive by precedence: reference image, then global
    /// style text, then adaptive.
    pub fn resolve(with_style_reference: bool, global_style: Option<&'a str>) -> Self {
        match (with_style_reference, global_style) {
            (true, _) => StyleDirective::ReferenceImage,
            (false, Some(style)) => StyleDirective::GlobalStyle(style),
            (false, None) => StyleDirective::Adaptive,
        }
    }

    fn render(&self) -> String {
        match self {
            StyleDirective::ReferenceImage => STYLE_REFERENCE_SECTION.to_string(),
            StyleDirective::GlobalStyle(style) => format!(
                "\n# GLOBAL VISUAL REQUIREMENTS (STRICT ADHERENCE REQUIRED):\n{style}\n\n\
                 - **Consistency**: Ensure this slide matches the defined theme, fonts, and palette exactly."
            ),
            StyleDirective::Adaptive => ADAPTIVE_STYLE_SECTION.to_string(),
        }
    }
}

/// Whether a slide title marks the global style section (case-insensitive).
pub fn is_style_section(title: &str) -> bool {
    let title = title.to_lowercase();
    STYLE_SECTION_KEYWORDS.iter().any(|k| title.contains(k))
}

/// Split the global style section out of the slide list.
///
/// Returns the style text (content of the first matching slide, if any) and
/// the renderable slides, which exclude that one slide. Other slides keep
/// their original indices.
pub fn extract_global_style(slides: &[Slide]) -> (Option<String>, Vec<Slide>) {
    let Some(style_slide) = slides.iter().find(|s| is_style_section(&s.title)) else {
        return (None, slides.to_vec());
    };

    let renderable = slides
        .iter()
        .filter(|s| s.index != style_slide.index)
        .cloned()
        .collect();

    (Some(style_slide.content.clone()), renderable)
}

/// Summarise the whole outline for cross-slide visual consistency.
///
/// Built once per batch and shared by every request in it.
pub fn build_outline_context(slides: &[Slide]) -> String {
    let mut parts = vec!["# PRESENTATION OUTLINE (Context for visual flow):".to_string()];
    for slide in slides {
        parts.push(format!("- Slide {}: {}", slide.index, slide.title));
        parts.push(format!("  Content: {}", content_preview(&slide.content)));
    }
    parts.join("\n")
}

fn content_preview(content: &str) -> String {
    let flat = content.replace('\n', " ");
    if flat.chars().count() > PREVIEW_CHARS {
        let truncated: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{truncated}...")
    } else {
        flat
    }
}

/// A `(user, system)` prompt pair for one slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidePrompt {
    pub user: String,
    pub system: String,
}

/// Build the prompts for one slide.
///
/// `outline_context` comes from [`build_outline_context`]; `with_article`
/// adds the reference-article section announcing the assistant context
/// message sent alongside the request.
pub fn build_prompt(
    slide: &Slide,
    outline_context: &str,
    style: StyleDirective<'_>,
    with_article: bool,
) -> SlidePrompt {
    let article_section = if with_article { ARTICLE_SECTION } else { "" };

    let system = format!(
        "{SYSTEM_HEADER}\n\n{outline_context}\n{article_section}\n{style}\n\n{LAYOUT_AND_CONSTRAINTS}",
        style = style.render(),
    );

    let user = format!(
        "GENERATE SLIDE {index}\n**Title**: {title}\n\n**Content**:\n{content}\n\n{DESIGN_INSTRUCTIONS}",
        index = slide.index,
        title = slide.title,
        content = slide.content,
    );

    SlidePrompt { user, system }
}
