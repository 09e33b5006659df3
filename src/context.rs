/// Inlined text with enough metadata to label and fence it in a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub filepath: String,
    pub filetype: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextItem {
    /// File path or URL handed to the tool as a reference.
    Fragment(String),
    Snippet(Snippet),
    Tool(String),
    Function(String),
}

/// Context collected between prompts.
///
/// Fragments, tools and functions are unique and keep insertion order.
/// Snippets are kept as added, duplicates included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextAccumulator {
    fragments: Vec<String>,
    snippets: Vec<Snippet>,
    tools: Vec<String>,
    functions: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|existing| existing == value) {
        return false;
    }
    list.push(value.to_string());
    true
}

impl ContextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the fragment was already present.
    pub fn add_fragment(&mut self, path: &str) -> bool {
        push_unique(&mut self.fragments, path)
    }

    pub fn add_snippet(&mut self, text: &str, filepath: &str, filetype: &str) {
        self.snippets.push(Snippet {
            filepath: filepath.to_string(),
            filetype: filetype.to_string(),
            text: text.trim().to_string(),
        });
    }

    pub fn add_tool(&mut self, name: &str) -> bool {
        push_unique(&mut self.tools, name)
    }

    pub fn add_function(&mut self, text: &str) -> bool {
        push_unique(&mut self.functions, text)
    }

    /// Adds any item kind. Returns whether the collection changed.
    pub fn add(&mut self, item: ContextItem) -> bool {
        match item {
            ContextItem::Fragment(path) => self.add_fragment(&path),
            ContextItem::Snippet(snippet) => {
                self.add_snippet(&snippet.text, &snippet.filepath, &snippet.filetype);
                true
            }
            ContextItem::Tool(name) => self.add_tool(&name),
            ContextItem::Function(text) => self.add_function(&text),
        }
    }

    pub fn reset(&mut self) {
        self.fragments.clear();
        self.snippets.clear();
        self.tools.clear();
        self.functions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
            && self.snippets.is_empty()
            && self.tools.is_empty()
            && self.functions.is_empty()
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn snippets(&self) -> &[Snippet] {
        &self.snippets
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    /// Every item, grouped by kind: fragments, snippets, tools, functions.
    pub fn items(&self) -> Vec<ContextItem> {
        self.fragments
            .iter()
            .cloned()
            .map(ContextItem::Fragment)
            .chain(self.snippets.iter().cloned().map(ContextItem::Snippet))
            .chain(self.tools.iter().cloned().map(ContextItem::Tool))
            .chain(self.functions.iter().cloned().map(ContextItem::Function))
            .collect()
    }

    /// User text first, then the snippets, then the fragment list. Tools and
    /// functions travel as command flags and are not rendered here.
    pub fn render_prompt(&self, user_input: &str) -> String {
        let mut sections = vec![user_input.to_string()];

        if !self.snippets.is_empty() {
            let blocks: Vec<String> = self.snippets.iter().map(render_snippet).collect();
            sections.push(format!("Snippets:\n\n{}", blocks.join("\n\n")));
        }

        if !self.fragments.is_empty() {
            let bullets: Vec<String> = self
                .fragments
                .iter()
                .map(|path| format!("- {path}"))
                .collect();
            sections.push(format!("Fragments:\n{}", bullets.join("\n")));
        }

        sections.join("\n\n").trim().to_string()
    }
}

fn render_snippet(snippet: &Snippet) -> String {
    format!(
        "`{}`:\n```{}\n{}\n```",
        snippet.filepath, snippet.filetype, snippet.text
    )
}
