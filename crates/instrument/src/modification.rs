// TypeTrace - Runtime Type Profiler
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Byte-offset splicing of instrumentation into the original source.
//!
//! Instrumentation is collected as a set of insertions keyed by their
//! location in the original text and applied in reverse order, so earlier
//! insertions never shift later ones. Insertions never remove or reorder
//! original bytes, which keeps every pre-existing statement on its original
//! line.

use std::{collections::BTreeMap, fmt::Display};

use typetrace_common::ObservationMetadata;

use crate::analysis::{BodySite, SourceAnalysis};
use crate::codegen;

const OPEN_BLOCK_PRIORITY: u8 = 255; // the `{` opening a rewritten arrow body
const ENTRY_HOOK_PRIORITY: u8 = 191; // the function-entry hook
const PARAM_HOOK_BASE_PRIORITY: u8 = 190; // parameter hooks, descending by index
const RETURN_PRIORITY: u8 = 63; // the `return ` of a rewritten arrow body
const CLOSE_BLOCK_PRIORITY: u8 = 0; // the `; }` closing a rewritten arrow body

/// The collection of insertions on a single source file.
pub struct SourceModifications {
    /// Keyed by the insertion location in the original source.
    modifications: BTreeMap<usize, InstrumentAction>,
}

/// An action to insert instrumentation text into the source file.
#[derive(Debug, Clone)]
pub struct InstrumentAction {
    /// Offset in the original source at which the text is inserted
    pub loc: usize,
    /// The content to insert
    pub content: InstrumentContent,
    /// If two actions share a `loc`, the one with higher priority is
    /// emitted first.
    pub priority: u8,
}

/// The content to insert.
#[derive(Debug, Clone)]
pub enum InstrumentContent {
    /// Literal text, inserted as-is.
    Plain(String),
    /// A guarded `twiz(..)` observation hook.
    Hook(Box<HookData>),
    /// The `return ` keyword of a rewritten expression-bodied arrow.
    Return,
    /// The `{` opening a rewritten expression-bodied arrow.
    OpenBlock,
    /// The `; }` closing a rewritten expression-bodied arrow.
    CloseBlock,
}

/// Everything needed to render one observation hook.
#[derive(Debug, Clone)]
pub struct HookData {
    /// Entity label, e.g. `addTodo_param_todo`
    pub label: String,
    /// Source expression evaluating to the observed value
    pub value_expr: String,
    /// Byte offset identifying the entity
    pub offset: usize,
    /// Logical filename identifying the entity
    pub filename: String,
    /// Static metadata shipped with every observation
    pub metadata: ObservationMetadata,
}

impl Display for InstrumentContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let content = match self {
            Self::Plain(content) => content.clone(),
            Self::Hook(data) => codegen::render_hook(data),
            Self::Return => "return ".to_string(),
            Self::OpenBlock => "{".to_string(),
            Self::CloseBlock => "; }".to_string(),
        };
        write!(f, "{content}")
    }
}

impl Default for SourceModifications {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceModifications {
    /// Creates an empty modification set.
    pub fn new() -> Self {
        Self { modifications: BTreeMap::new() }
    }

    /// Whether no insertions were collected.
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    /// Adds an insertion.
    ///
    /// Two insertions at the same location are merged into one, ordered by
    /// priority; the later-coming one is appended after or before the
    /// existing one accordingly.
    pub fn add_modification(&mut self, modification: InstrumentAction) {
        let loc = modification.loc;
        if let Some(existing) = self.modifications.get_mut(&loc) {
            existing.content = if existing.priority >= modification.priority {
                InstrumentContent::Plain(format!("{} {}", existing.content, modification.content))
            } else {
                InstrumentContent::Plain(format!("{} {}", modification.content, existing.content))
            };
            existing.priority = existing.priority.max(modification.priority);
            return;
        }
        self.modifications.insert(loc, modification);
    }

    /// Extends the set with the given insertions.
    pub fn extend_modifications(&mut self, modifications: Vec<InstrumentAction>) {
        for modification in modifications {
            self.add_modification(modification);
        }
    }

    /// Collects the insertions for every instrumentable site of the analysis.
    pub fn collect_instrumentation(&mut self, filename: &str, analysis: &SourceAnalysis) {
        for site in &analysis.sites {
            let mut actions = Vec::new();

            let hook_at = match site.body {
                BodySite::Block { insert_at } => insert_at,
                BodySite::Expression { start, .. } => {
                    actions.push(InstrumentAction {
                        loc: start,
                        content: InstrumentContent::OpenBlock,
                        priority: OPEN_BLOCK_PRIORITY,
                    });
                    start
                }
            };

            actions.push(InstrumentAction {
                loc: hook_at,
                content: InstrumentContent::Hook(Box::new(codegen::entry_hook(
                    site, hook_at, filename,
                ))),
                priority: ENTRY_HOOK_PRIORITY,
            });

            for param in &site.params {
                actions.push(InstrumentAction {
                    loc: hook_at,
                    content: InstrumentContent::Hook(Box::new(codegen::param_hook(
                        site, param, filename,
                    ))),
                    // Parameter hooks keep declaration order at a shared
                    // insertion point.
                    priority: PARAM_HOOK_BASE_PRIORITY
                        .saturating_sub(param.index.min(120) as u8)
                        .max(RETURN_PRIORITY + 1),
                });
            }

            // Same-location merges append in arrival order, so the arrow
            // rewrite pieces go in last: `{ <hooks> return <expr>; }`.
            if let BodySite::Expression { start, end } = site.body {
                actions.push(InstrumentAction {
                    loc: start,
                    content: InstrumentContent::Return,
                    priority: RETURN_PRIORITY,
                });
                actions.push(InstrumentAction {
                    loc: end,
                    content: InstrumentContent::CloseBlock,
                    priority: CLOSE_BLOCK_PRIORITY,
                });
            }

            self.extend_modifications(actions);
        }
    }

    /// Applies the insertions to the source code.
    pub fn modify_source(&self, source: &str) -> String {
        let mut modified_source = source.to_string();
        // Apply the insertions in reverse order to avoid index shifting.
        for (_, action) in self.modifications.iter().rev() {
            modified_source.insert_str(action.loc, action.content.to_string().as_str());
        }
        modified_source
    }
}
