use crate::error::DiagramError;
use crate::ir::local_name;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ONTOGSN: &str = "https://w3id.org/OntoGSN/ontology#";

/// Predicate aliases for the three relation categories. Each list tolerates
/// several IRI spellings and human-readable synonyms for the same relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Vocabulary {
    pub supported_by_aliases: Vec<String>,
    pub context_of_aliases: Vec<String>,
    pub challenges_aliases: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            supported_by_aliases: vec![
                format!("{ONTOGSN}supportedBy"),
                "gsn:supportedBy".to_string(),
                "supportedBy".to_string(),
                "supported by".to_string(),
                "is supported by".to_string(),
            ],
            context_of_aliases: vec![
                format!("{ONTOGSN}inContextOf"),
                "gsn:inContextOf".to_string(),
                "inContextOf".to_string(),
                "in context of".to_string(),
                "is in context of".to_string(),
            ],
            challenges_aliases: vec![
                format!("{ONTOGSN}challenges"),
                "gsn:challenges".to_string(),
                "challenges".to_string(),
                "challenge".to_string(),
            ],
        }
    }
}

/// Trims whitespace and angle brackets from a predicate or alias.
pub fn normalize_predicate(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}

pub(crate) fn alias_matches(aliases: &[String], predicate: &str) -> bool {
    let normalized = normalize_predicate(predicate);
    if normalized.is_empty() {
        return false;
    }
    let short = local_name(&normalized);
    aliases.iter().any(|alias| {
        let alias = normalize_predicate(alias);
        if alias.eq_ignore_ascii_case(&normalized) {
            return true;
        }
        // Bare aliases also match any namespaced form of the same local name.
        let bare = !alias.contains(['#', '/', ':']);
        bare && !alias.is_empty() && alias.eq_ignore_ascii_case(short)
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneConfig {
    pub node_height: f32,
    pub node_spacing: f32,
    pub rank_spacing: f32,
    pub satellite_gap: f32,
    pub satellite_stride: f32,
    pub width_per_char: f32,
    pub width_base: f32,
    pub min_node_width: f32,
    pub max_node_width: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            node_height: 36.0,
            node_spacing: 24.0,
            rank_spacing: 56.0,
            satellite_gap: 28.0,
            satellite_stride: 44.0,
            width_per_char: 7.2,
            width_base: 12.0,
            min_node_width: 44.0,
            max_node_width: 180.0,
        }
    }
}

impl SceneConfig {
    pub fn node_width(&self, label: &str) -> f32 {
        let len = label.chars().count() as f32;
        (self.width_per_char * len + self.width_base).clamp(self.min_node_width, self.max_node_width)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectionLayout {
    pub hub_offset_x: f32,
    pub hub_offset_y: f32,
    pub hub_stack_gap: f32,
    pub hub_radius: f32,
    pub item_radius: f32,
    pub ring_radius: f32,
    pub ring_gap: f32,
    pub max_per_row: usize,
    pub start_angle_deg: f32,
}

impl Default for CollectionLayout {
    fn default() -> Self {
        Self {
            hub_offset_x: 60.0,
            hub_offset_y: 48.0,
            hub_stack_gap: 120.0,
            hub_radius: 6.0,
            item_radius: 4.0,
            ring_radius: 48.0,
            ring_gap: 36.0,
            max_per_row: 8,
            start_angle_deg: -90.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewportConfig {
    pub fit_padding: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub transition_ms: u64,
    pub double_click_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            fit_padding: 24.0,
            min_scale: 0.25,
            max_scale: 2.5,
            transition_ms: 300,
            double_click_ms: 250,
        }
    }
}

/// Query templates run when a context or defeater is activated. `{id}` is
/// replaced by the activated node's IRI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropagationQueries {
    pub context: String,
    pub defeater: String,
}

impl Default for PropagationQueries {
    fn default() -> Self {
        Self {
            context: format!(
                "PREFIX gsn: <{ONTOGSN}>\n\
                 SELECT DISTINCT ?s WHERE {{ ?host gsn:inContextOf <{{id}}> . ?host gsn:supportedBy* ?s . }}"
            ),
            defeater: format!(
                "PREFIX gsn: <{ONTOGSN}>\n\
                 SELECT DISTINCT ?s WHERE {{ <{{id}}> gsn:challenges ?target . ?s gsn:supportedBy* ?target . }}"
            ),
        }
    }
}

impl PropagationQueries {
    pub fn context_query(&self, id: &str) -> String {
        self.context.replace("{id}", id)
    }

    pub fn defeater_query(&self, id: &str) -> String {
        self.defeater.replace("{id}", id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub vocabulary: Vocabulary,
    pub scene: SceneConfig,
    pub collections: CollectionLayout,
    pub viewport: ViewportConfig,
    pub propagation: PropagationQueries,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn as_f32(&self) -> Option<f32> {
        match self {
            NumberOrString::Number(value) => Some(*value as f32),
            NumberOrString::String(value) => value.trim().trim_end_matches("px").parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<serde_json::Value>,
    height: Option<NumberOrString>,
    width: Option<NumberOrString>,
    supported_by_aliases: Option<Vec<String>>,
    context_of_aliases: Option<Vec<String>>,
    challenges_aliases: Option<Vec<String>>,
    scene: Option<SceneConfig>,
    collections: Option<CollectionLayout>,
    viewport: Option<ViewportConfig>,
    propagation: Option<PropagationQueries>,
}

/// Loads a JSON or JSON5 config file on top of the defaults. Every key is
/// optional and unknown keys are ignored.
pub fn load_config(path: Option<&Path>) -> Result<Config, DiagramError> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let config_error = |message: String| DiagramError::Config {
        path: path.to_path_buf(),
        message,
    };
    let contents = std::fs::read_to_string(path).map_err(|err| config_error(err.to_string()))?;
    let parsed: ConfigFile = match serde_json::from_str(&contents) {
        Ok(parsed) => parsed,
        Err(_) => json5::from_str(&contents).map_err(|err| config_error(err.to_string()))?,
    };
    apply_config_file(&mut config, parsed).map_err(config_error)?;
    Ok(config)
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) -> Result<(), String> {
    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "modern" => config.theme = Theme::modern(),
            "classic" | "default" | "base" => config.theme = Theme::classic(),
            _ => {}
        }
    }

    if let Some(vars) = parsed.theme_variables {
        // Overlay only the keys present on top of the selected theme.
        let mut base = serde_json::to_value(&config.theme).map_err(|err| err.to_string())?;
        if let (Some(base_map), Some(vars_map)) = (base.as_object_mut(), vars.as_object()) {
            for (key, value) in vars_map {
                if base_map.contains_key(key) {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        config.theme = serde_json::from_value(base).map_err(|err| err.to_string())?;
    }

    if let Some(v) = parsed.height.as_ref().and_then(NumberOrString::as_f32) {
        config.render.height = v;
    }
    if let Some(v) = parsed.width.as_ref().and_then(NumberOrString::as_f32) {
        config.render.width = v;
    }
    if let Some(v) = parsed.supported_by_aliases {
        config.vocabulary.supported_by_aliases = v;
    }
    if let Some(v) = parsed.context_of_aliases {
        config.vocabulary.context_of_aliases = v;
    }
    if let Some(v) = parsed.challenges_aliases {
        config.vocabulary.challenges_aliases = v;
    }
    if let Some(v) = parsed.scene {
        config.scene = v;
    }
    if let Some(v) = parsed.collections {
        config.collections = v;
    }
    if let Some(v) = parsed.viewport {
        config.viewport = v;
    }
    if let Some(v) = parsed.propagation {
        config.propagation = v;
    }
    Ok(())
}
