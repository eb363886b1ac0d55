use gsn_diagram::{RenderOptions, render_with_options};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GsnRenderOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    width: Option<f32>,
    height: Option<f32>,
    supported_by_aliases: Option<Vec<String>>,
    context_of_aliases: Option<Vec<String>>,
    challenges_aliases: Option<Vec<String>>,
}

fn build_render_options(options: GsnRenderOptions) -> RenderOptions {
    let mut render_options = if options.theme.as_deref() == Some("classic") {
        RenderOptions::classic()
    } else {
        RenderOptions::modern()
    };

    if let Some(font_family) = options.font_family {
        render_options.theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        render_options.theme.font_size = font_size;
    }
    if let Some(width) = options.width {
        render_options.width = width;
    }
    if let Some(height) = options.height {
        render_options.height = height;
    }
    if let Some(aliases) = options.supported_by_aliases {
        render_options.vocabulary.supported_by_aliases = aliases;
    }
    if let Some(aliases) = options.context_of_aliases {
        render_options.vocabulary.context_of_aliases = aliases;
    }
    if let Some(aliases) = options.challenges_aliases {
        render_options.vocabulary.challenges_aliases = aliases;
    }

    render_options
}

#[wasm_bindgen]
pub fn render_gsn_svg(rows_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<GsnRenderOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        GsnRenderOptions::default()
    };

    let render_options = build_render_options(options);
    render_with_options(rows_json, render_options).map_err(|error| JsValue::from_str(&error.to_string()))
}

#[cfg(test)]
mod tests {
    use gsn_diagram::render_with_options;

    use crate::{GsnRenderOptions, build_render_options};

    #[test]
    fn renders_case_with_custom_vocabulary() {
        let rows = r#"[
            {"s": "G1", "p": "backs", "o": "S1"},
            {"s": "S1", "p": "backs", "o": "Sn1"},
            {"s": "G1", "p": "inContextOf", "o": "C1"}
        ]"#;
        let options: GsnRenderOptions =
            serde_json::from_str(r#"{"theme": "classic", "supportedByAliases": ["backs"]}"#).unwrap();

        let svg = render_with_options(rows, build_render_options(options))
            .expect("case with custom vocabulary should render");

        assert!(svg.contains("<svg"));
        assert!(svg.contains(">Sn1</text>"));
        assert!(svg.contains(">C1</text>"));
    }
}
