//! Markdown guide parser.
//!
//! Reads the routing guide (`MODELS.md`) and extracts three sections:
//!
//! ```text
//! ### Code Tasks
//! - **Code Generation**: codellama:34b > grok-code-fast-1
//!
//! ### Fallback Chains
//! - debugging: gpt-4o → grok-3 → gemini-2.5-flash
//!
//! ### Blocked Models
//! - llama3.2: too weak for tool calls
//! ```
//!
//! A section runs until the next `##`/`###` heading or end of file.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use super::GuidanceRules;

static TASKS_SECTION: Lazy<Regex> = Lazy::new(|| section_regex("Code Tasks"));
static FALLBACK_SECTION: Lazy<Regex> = Lazy::new(|| section_regex("Fallback Chains"));
static BLOCKED_SECTION: Lazy<Regex> = Lazy::new(|| section_regex("Blocked Models"));

/// `- **Task Name**: a > b > c`
static TASK_LINE: Lazy<Regex> = Lazy::new(|| compile(r"^\s*-\s+\*\*(.+?)\*\*:\s*(.+)$"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("Bad regex pattern `{pattern}`: {e}"))
}

/// The heading's own newline stays outside the consumed prefix so an empty
/// section still ends at a heading on the very next line.
fn section_regex(title: &str) -> Regex {
    compile(&format!(
        r"(?s)###[ \t]+{}[^\n]*(.*?)(?:\n##|\z)",
        regex::escape(title)
    ))
}

fn section<'a>(re: &Regex, content: &'a str) -> Option<&'a str> {
    re.captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn split_models(list: &str, separator: char) -> Vec<String> {
    list.split(separator)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

/// Parse guide markdown into rules. Sections that are missing simply
/// contribute nothing.
pub fn parse_guide(content: &str) -> GuidanceRules {
    let content = content.replace("\r\n", "\n");
    let mut rules = GuidanceRules::new();

    if let Some(body) = section(&TASKS_SECTION, &content) {
        for line in body.lines() {
            if let Some(caps) = TASK_LINE.captures(line) {
                let models = split_models(&caps[2], '>');
                if !models.is_empty() {
                    rules.set_preferred(&caps[1], models);
                }
            }
        }
    }

    if let Some(body) = section(&FALLBACK_SECTION, &content) {
        for line in body.lines().filter(|l| l.contains('→')) {
            // Task names never contain a colon; model ids may (`codellama:34b`).
            let Some((task, chain)) = line.split_once(':') else {
                continue;
            };
            let task = task.trim().trim_start_matches('-').trim();
            let models = split_models(chain, '→');
            if !task.is_empty() && !models.is_empty() {
                rules.set_fallback(task, models);
            }
        }
    }

    if let Some(body) = section(&BLOCKED_SECTION, &content) {
        for line in body.lines() {
            let Some(entry) = line.strip_prefix("- ") else {
                continue;
            };
            let model = entry.split_once(": ").map_or(entry, |(m, _)| m).trim();
            if !model.is_empty() {
                rules.block(model);
            }
        }
    }

    rules
}

/// Load and parse the guide at `path`. A missing path, missing file or
/// unreadable file yields [`GuidanceRules::builtin`].
pub fn load_guide(path: Option<&Path>) -> GuidanceRules {
    let Some(path) = path else {
        return GuidanceRules::builtin();
    };

    if !path.exists() {
        warn!("Routing guide not found at {}", path.display());
        return GuidanceRules::builtin();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => {
            let rules = parse_guide(&content);
            info!(
                tasks = rules.mapped_tasks().count(),
                blocked = rules.blocked().count(),
                "Loaded routing guide from {}",
                path.display()
            );
            rules
        }
        Err(e) => {
            warn!("Failed to read routing guide {}: {e}", path.display());
            GuidanceRules::builtin()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUIDE: &str = "\
# Models

## Selection

### Code Tasks
- **Code Generation**: grok-code-fast-1 > claude-3-5-sonnet > codellama:34b
- **Debugging**: gpt-4o > grok-3
- plain line without markup
- **Architectural Design**: claude-3-opus

### Fallback Chains
- debugging: gpt-4o → grok-3 → gemini-2.5-flash
- Data Analysis: gemini-2.5-pro → gpt-4o
- reasoning: o1-pro
- local: codellama:34b → qwen2.5:32b

### Blocked Models
- llama3.2: too weak for tool calls
- phi3
- codellama:34b: slow on laptops
not a list item

## Notes
- **Ignored**: nothing > here
";

    #[test]
    fn parses_task_mappings() {
        let rules = parse_guide(GUIDE);
        assert_eq!(
            rules.preferred_for("code_generation"),
            ["grok-code-fast-1", "claude-3-5-sonnet", "codellama:34b"]
        );
        assert_eq!(rules.preferred_for("debugging"), ["gpt-4o", "grok-3"]);
        assert_eq!(rules.preferred_for("architectural_design"), ["claude-3-opus"]);
        assert!(rules.preferred_for("ignored").is_empty());
    }

    #[test]
    fn parses_fallback_chains() {
        let rules = parse_guide(GUIDE);
        assert_eq!(
            rules.fallback_for("debugging"),
            ["gpt-4o", "grok-3", "gemini-2.5-flash"]
        );
        assert_eq!(rules.fallback_for("data_analysis"), ["gemini-2.5-pro", "gpt-4o"]);
        // No arrow: not a chain line.
        assert!(rules.fallback_for("reasoning").is_empty());
        assert_eq!(rules.fallback_for("local"), ["codellama:34b", "qwen2.5:32b"]);
    }

    #[test]
    fn parses_blocked_models() {
        let rules = parse_guide(GUIDE);
        assert!(rules.is_blocked("llama3.2"));
        assert!(rules.is_blocked("phi3"));
        assert!(rules.is_blocked("codellama:34b"));
        assert!(!rules.is_blocked("not a list item"));
        assert_eq!(rules.blocked().count(), 3);
    }

    #[test]
    fn missing_sections_yield_empty_rules() {
        let rules = parse_guide("# Just a title\n\nSome prose.\n");
        assert!(rules.is_empty());
    }

    #[test]
    fn last_section_runs_to_end_of_file() {
        let rules = parse_guide("### Blocked Models\n- grok-3: retired");
        assert!(rules.is_blocked("grok-3"));
    }

    #[test]
    fn empty_section_stops_at_next_heading() {
        let rules = parse_guide(
            "### Blocked Models\n### Fallback Chains\n- debugging: gpt-4o → grok-3\n",
        );
        assert_eq!(rules.blocked().count(), 0);
        assert_eq!(rules.fallback_for("debugging"), ["gpt-4o", "grok-3"]);

        let rules = parse_guide("### Code Tasks\n### Notes\n- **Reasoning**: gpt-4o > grok-3\n");
        assert!(rules.preferred_for("reasoning").is_empty());
    }

    #[test]
    fn crlf_line_endings() {
        let rules = parse_guide("### Code Tasks\r\n- **Testing**: gpt-4o > grok-3\r\n");
        assert_eq!(rules.preferred_for("testing"), ["gpt-4o", "grok-3"]);
    }

    #[test]
    fn load_guide_falls_back_to_builtin() {
        assert_eq!(load_guide(None), GuidanceRules::builtin());

        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("MODELS.md");
        assert_eq!(load_guide(Some(&missing)), GuidanceRules::builtin());
    }

    #[test]
    fn load_guide_reads_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("MODELS.md");
        std::fs::write(&path, GUIDE).unwrap();

        let rules = load_guide(Some(&path));
        assert_eq!(rules, parse_guide(GUIDE));
        assert!(!rules.is_blocked("magicoder:7b"));
    }
}
