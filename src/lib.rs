#[cfg(feature = "cli")]
pub mod cli;
pub mod collections;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod ir;
pub mod layout;
pub mod parser;
pub mod render;
pub mod scene_dump;
pub mod theme;
pub mod viewport;

#[cfg(feature = "cli")]
pub use cli::run;
pub use controller::{DiagramController, DiagramHandle, MountOptions, QueryRunner, RenderOutcome, Surface, mount};
pub use error::DiagramError;
pub use events::{DiagramEvent, EventSink};
pub use layout::{Scene, build_scene};

use config::{Config, SceneConfig, ViewportConfig, Vocabulary};
use theme::Theme;

/// One-shot rendering settings for callers that do not need a controller.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub theme: Theme,
    pub vocabulary: Vocabulary,
    pub scene: SceneConfig,
    pub viewport: ViewportConfig,
    pub width: f32,
    pub height: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::modern()
    }
}

impl RenderOptions {
    pub fn modern() -> Self {
        Self::from_config(&Config::default())
    }

    pub fn classic() -> Self {
        Self {
            theme: Theme::classic(),
            ..Self::modern()
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            theme: config.theme.clone(),
            vocabulary: config.vocabulary.clone(),
            scene: config.scene.clone(),
            viewport: config.viewport.clone(),
            width: config.render.width,
            height: config.render.height,
        }
    }

    fn mount_options(self) -> MountOptions {
        MountOptions {
            height: self.height,
            width: Some(self.width),
            vocabulary: self.vocabulary,
            scene: self.scene,
            viewport: self.viewport,
            theme: self.theme,
            ..MountOptions::default()
        }
    }
}

/// Parses a rows document and renders it to a standalone SVG.
pub fn render_with_options(input: &str, options: RenderOptions) -> anyhow::Result<String> {
    let rows = parser::parse_rows(input)?;
    let surface = Surface::new("inline", options.width, options.height);
    let handle = mount(Some(&surface), &rows, options.mount_options())?;
    Ok(handle.to_svg())
}

pub fn render(input: &str) -> anyhow::Result<String> {
    render_with_options(input, RenderOptions::default())
}
