use crate::ir::NodeKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub text_color: String,
    pub goal_fill: String,
    pub strategy_fill: String,
    pub solution_fill: String,
    pub context_fill: String,
    pub assumption_fill: String,
    pub defeater_fill: String,
    pub border_color: String,
    pub line_color: String,
    pub extra_line_color: String,
    pub context_line_color: String,
    pub defeater_line_color: String,
    pub highlight_color: String,
    pub in_context_color: String,
    pub defeater_propagation_color: String,
    pub undeveloped_color: String,
    pub collection_color: String,
    pub background: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 12.0,
            text_color: "#222222".to_string(),
            goal_fill: "#FFFFFF".to_string(),
            strategy_fill: "#FFFFFF".to_string(),
            solution_fill: "#FFFFFF".to_string(),
            context_fill: "#FFFFFF".to_string(),
            assumption_fill: "#FFFFFF".to_string(),
            defeater_fill: "#FFFFFF".to_string(),
            border_color: "#222222".to_string(),
            line_color: "#222222".to_string(),
            extra_line_color: "#555555".to_string(),
            context_line_color: "#222222".to_string(),
            defeater_line_color: "#B00020".to_string(),
            highlight_color: "#FF8C00".to_string(),
            in_context_color: "#1E88E5".to_string(),
            defeater_propagation_color: "#D81B60".to_string(),
            undeveloped_color: "#222222".to_string(),
            collection_color: "#6D4C41".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 12.0,
            text_color: "#1C2430".to_string(),
            goal_fill: "#F8FAFF".to_string(),
            strategy_fill: "#EEF6EE".to_string(),
            solution_fill: "#FFF8E6".to_string(),
            context_fill: "#F4F4F4".to_string(),
            assumption_fill: "#F3EEFA".to_string(),
            defeater_fill: "#FDECEC".to_string(),
            border_color: "#7A8AA6".to_string(),
            line_color: "#7A8AA6".to_string(),
            extra_line_color: "#A9B4C8".to_string(),
            context_line_color: "#9AA5B8".to_string(),
            defeater_line_color: "#C62828".to_string(),
            highlight_color: "#F59E0B".to_string(),
            in_context_color: "#2563EB".to_string(),
            defeater_propagation_color: "#DB2777".to_string(),
            undeveloped_color: "#1C2430".to_string(),
            collection_color: "#8D6E63".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn fill_for(&self, kind: NodeKind) -> &str {
        match kind {
            NodeKind::Goal => &self.goal_fill,
            NodeKind::Strategy => &self.strategy_fill,
            NodeKind::Solution => &self.solution_fill,
            NodeKind::Context => &self.context_fill,
            NodeKind::Assumption | NodeKind::Justification => &self.assumption_fill,
            NodeKind::Defeater => &self.defeater_fill,
        }
    }

    /// Stroke used for a highlight class; unknown classes share the generic
    /// highlight color.
    pub fn highlight_stroke(&self, class: &str) -> &str {
        match class {
            crate::controller::IN_CONTEXT_CLASS => &self.in_context_color,
            crate::controller::DEFEATER_PROPAGATION_CLASS => &self.defeater_propagation_color,
            _ => &self.highlight_color,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::modern()
    }
}
