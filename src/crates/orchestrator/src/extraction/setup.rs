//! Setup instructions: a markdown section lifted from the answer, or steps
//! synthesized from dependencies and env vars.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static SETUP_HEADING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?im)^(#{1,6})\s*(?:\d+\.\s*)?",
        r"(setup|installation|install|getting started|quick ?start|running locally)\b.*$",
    ))
    .expect("setup heading pattern")
});

static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,6})\s+\S").expect("heading pattern"));

/// Setup instructions for the generated app.
///
/// Uses the response's own "Setup"/"Installation"/"Getting Started" section
/// when there is one; otherwise writes minimal steps from the dependency
/// map and environment variables.
pub fn extract_setup_instructions(
    text: &str,
    dependencies: &BTreeMap<String, String>,
    env_vars: &[String],
) -> String {
    if let Some(section) = setup_section(text) {
        return section;
    }

    let mut steps = Vec::new();
    if !dependencies.is_empty() {
        steps.push("Install dependencies: `npm install`".to_string());
    }
    if !env_vars.is_empty() {
        steps.push(format!(
            "Copy `.env.example` to `.env` and set: {}",
            env_vars.join(", ")
        ));
    }
    if !dependencies.is_empty() {
        steps.push("Start the app: `npm start`".to_string());
    } else {
        steps.push("Open the generated files in your editor and run the entry point".to_string());
    }

    let mut out = String::from("## Setup\n\n");
    for (i, step) in steps.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, step));
    }
    out
}

/// The body of the first setup-like section, ending at the next heading of
/// the same or a higher level. Headings inside code fences are ignored.
fn setup_section(text: &str) -> Option<String> {
    let fences = fence_spans(text);
    let in_fence = |pos: usize| fences.iter().any(|(s, e)| pos > *s && pos < *e);

    let heading = SETUP_HEADING_REGEX
        .captures_iter(text)
        .find(|c| c.get(0).is_some_and(|m| !in_fence(m.start())))?;
    let whole = heading.get(0)?;
    let level = heading.get(1)?.as_str().len();

    let end = HEADING_REGEX
        .captures_iter(&text[whole.end()..])
        .filter_map(|c| {
            let m = c.get(1)?;
            let pos = whole.end() + m.start();
            (m.as_str().len() <= level && !in_fence(pos)).then_some(pos)
        })
        .next()
        .unwrap_or(text.len());

    let section = text[whole.start()..end].trim();
    (!section.is_empty()).then(|| format!("{}\n", section))
}

/// Byte ranges between opening and closing fence markers.
fn fence_spans(text: &str) -> Vec<(usize, usize)> {
    let markers: Vec<usize> = text.match_indices("```").map(|(i, _)| i).collect();
    markers
        .chunks(2)
        .filter_map(|pair| match pair {
            [start, end] => Some((*start, *end)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uses_existing_section() {
        let text = "# App\n\nIntro.\n\n## Getting Started\n\n1. npm install\n2. npm run dev\n\n\
                    ## Architecture\n\nDetails.";
        let setup = extract_setup_instructions(text, &BTreeMap::new(), &[]);
        assert!(setup.starts_with("## Getting Started"));
        assert!(setup.contains("npm run dev"));
        assert!(!setup.contains("Architecture"));
    }

    #[test]
    fn test_section_keeps_subheadings_and_fences() {
        let text = "## Setup\n\n### Prerequisites\n\nNode 20.\n\n\
                    ```bash\n# install deps\nnpm i\n```\n\n## Usage\nrun it";
        let setup = extract_setup_instructions(text, &BTreeMap::new(), &[]);
        assert!(setup.contains("### Prerequisites"));
        assert!(setup.contains("# install deps"));
        assert!(!setup.contains("## Usage"));
    }

    #[test]
    fn test_synthesized_steps() {
        let mut deps = BTreeMap::new();
        deps.insert("react".to_string(), "^18".to_string());
        let setup = extract_setup_instructions("no headings", &deps, &["API_KEY".to_string()]);
        assert!(setup.contains("1. Install dependencies"));
        assert!(setup.contains("2. Copy `.env.example` to `.env` and set: API_KEY"));
        assert!(setup.contains("3. Start the app"));
    }

    #[test]
    fn test_synthesized_without_dependencies() {
        let setup = extract_setup_instructions("", &BTreeMap::new(), &[]);
        assert!(setup.starts_with("## Setup"));
        assert!(setup.contains("1. Open the generated files"));
    }
}
