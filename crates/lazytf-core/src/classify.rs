use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineCategory {
    Info,
    Notice,
    Warning,
    Error,
    ResourceAdded,
    ResourceChanged,
    ResourceDestroyed,
    ResourceReplaced,
    Summary,
}

impl LineCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::ResourceAdded => "added",
            Self::ResourceChanged => "changed",
            Self::ResourceDestroyed => "destroyed",
            Self::ResourceReplaced => "replaced",
            Self::Summary => "summary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub category: LineCategory,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Diagnostic(Option<LineCategory>),
    Resource(LineCategory),
}

#[derive(Debug, Clone)]
pub struct OutputClassifier {
    block: Block,
}

impl Default for OutputClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn ansi_pattern() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("valid ansi regex"))
}

fn resource_header_pattern() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(
            r"^#\s+\S+.*\b(will be created|will be updated in-place|will be destroyed|must be replaced|will be replaced)",
        )
        .expect("valid resource header regex")
    })
}

fn summary_pattern() -> &'static Regex {
    static SUMMARY: OnceLock<Regex> = OnceLock::new();
    SUMMARY.get_or_init(|| {
        Regex::new(
            r"^(Plan: \d+ to (add|import)|Apply complete!|Destroy complete!|No changes\.|Changes to Outputs:|Terraform has been successfully initialized!)",
        )
        .expect("valid summary regex")
    })
}

impl OutputClassifier {
    pub fn new() -> Self {
        Self { block: Block::None }
    }

    pub fn reset(&mut self) {
        self.block = Block::None;
    }

    pub fn classify_line(&mut self, text: String) -> ClassifiedLine {
        let category = self.classify(&text);
        ClassifiedLine { category, text }
    }

    pub fn classify(&mut self, raw: &str) -> LineCategory {
        let plain = ansi_pattern().replace_all(raw, "");
        let trimmed = plain.trim();

        match self.block {
            Block::Diagnostic(current) => {
                if trimmed.starts_with('╵') {
                    self.block = Block::None;
                    return current.unwrap_or(LineCategory::Info);
                }
                let body = trimmed.trim_start_matches('│').trim_start();
                let category = match heading_category(body) {
                    Some(heading) => {
                        self.block = Block::Diagnostic(Some(heading));
                        heading
                    }
                    None => current.unwrap_or(LineCategory::Info),
                };
                return category;
            }
            Block::Resource(current) => {
                if trimmed.is_empty() {
                    self.block = Block::None;
                    return LineCategory::Info;
                }
                if let Some(next) = resource_header(trimmed) {
                    self.block = Block::Resource(next);
                    return next;
                }
                if summary_pattern().is_match(trimmed) {
                    self.block = Block::None;
                    return LineCategory::Summary;
                }
                return current;
            }
            Block::None => {}
        }

        if trimmed.starts_with('╷') {
            self.block = Block::Diagnostic(None);
            return LineCategory::Info;
        }
        if let Some(category) = resource_header(trimmed) {
            self.block = Block::Resource(category);
            return category;
        }
        classify_single(trimmed)
    }
}

fn heading_category(body: &str) -> Option<LineCategory> {
    if body.starts_with("Error:") {
        Some(LineCategory::Error)
    } else if body.starts_with("Warning:") {
        Some(LineCategory::Warning)
    } else {
        None
    }
}

fn resource_header(trimmed: &str) -> Option<LineCategory> {
    let captures = resource_header_pattern().captures(trimmed)?;
    let category = match captures.get(1)?.as_str() {
        "will be created" => LineCategory::ResourceAdded,
        "will be updated in-place" => LineCategory::ResourceChanged,
        "will be destroyed" => LineCategory::ResourceDestroyed,
        _ => LineCategory::ResourceReplaced,
    };
    Some(category)
}

fn classify_single(trimmed: &str) -> LineCategory {
    if let Some(category) = heading_category(trimmed) {
        return category;
    }
    if trimmed.starts_with("error:") {
        return LineCategory::Error;
    }
    if trimmed.starts_with("warning:") {
        return LineCategory::Warning;
    }
    if summary_pattern().is_match(trimmed) {
        return LineCategory::Summary;
    }
    if trimmed.starts_with("-/+") || trimmed.starts_with("+/-") {
        return LineCategory::ResourceReplaced;
    }
    if trimmed.starts_with("+ ") {
        return LineCategory::ResourceAdded;
    }
    if trimmed.starts_with("~ ") {
        return LineCategory::ResourceChanged;
    }
    if trimmed.starts_with("- ") {
        return LineCategory::ResourceDestroyed;
    }
    if trimmed.starts_with("Running `") || trimmed.starts_with("Using var files:") {
        return LineCategory::Notice;
    }
    LineCategory::Info
}
