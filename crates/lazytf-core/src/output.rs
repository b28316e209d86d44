use super::classify::ClassifiedLine;
use super::classify::LineCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSource {
    Process,
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub seq: u64,
    pub source: LineSource,
    pub category: LineCategory,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct OutputBuffer {
    next_seq: u64,
    lines: Vec<OutputLine>,
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self {
            next_seq: 1,
            lines: Vec::new(),
        }
    }

    pub fn push_process(&mut self, line: ClassifiedLine) {
        self.push(LineSource::Process, line.category, line.text);
    }

    pub fn push_notice(&mut self, category: LineCategory, text: impl Into<String>) {
        self.push(LineSource::Notice, category, text.into());
    }

    fn push(&mut self, source: LineSource, category: LineCategory, text: String) {
        self.lines.push(OutputLine {
            seq: self.next_seq,
            source,
            category,
            text,
        });
        self.next_seq += 1;
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.next_seq = 1;
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }
}
