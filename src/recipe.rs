//! Recipe parsing.
//!
//! A recipe is plain text: one stage per line, with `;` accepted as an
//! alternative separator. Each stage is `<tool-token> <args>` where the
//! leading whitespace-delimited token selects the tool. Blank stages are
//! discarded; order is preserved and defines execution order.

/// One external-tool invocation template within a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// The unresolved command template, placeholders intact.
    pub template: String,
    /// The leading token identifying the tool.
    pub tool_token: String,
}

/// An ordered sequence of stages for one job.
#[derive(Debug, Clone, Default)]
pub struct Recipe {
    pub stages: Vec<Stage>,
}

impl Recipe {
    /// Split recipe text into stages on newlines and semicolons.
    pub fn parse(text: &str) -> Self {
        let stages = text
            .split(['\n', ';'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Stage {
                template: s.to_string(),
                tool_token: s.split_whitespace().next().unwrap_or_default().to_string(),
            })
            .collect();

        Self { stages }
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the recipe contains no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
