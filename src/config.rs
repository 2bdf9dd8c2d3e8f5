use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

pub const DEFAULT_MAX_HISTORY_SIZE: NonZeroUsize = NonZeroUsize::new(50).unwrap();
pub const DEFAULT_CURVATURE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spacing {
    pub horizontal: f32,
    pub vertical: f32,
}

impl Default for Spacing {
    fn default() -> Self {
        Self {
            horizontal: 120.0,
            vertical: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub spacing: Spacing,
    pub min_text_width: f32,
    pub max_text_width: f32,
    /// Control point offset for connectors, as a fraction of the horizontal gap.
    pub curvature: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spacing: Spacing::default(),
            min_text_width: 80.0,
            max_text_width: 300.0,
            curvature: DEFAULT_CURVATURE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FontDescription {
    pub size: f32,
    pub weight: u16,
    pub family: String,
    pub line_height: f32,
    pub padding_x: f32,
    pub padding_y: f32,
    #[serde(alias = "radius")]
    pub corner_radius: f32,
}

impl FontDescription {
    /// CSS `font` shorthand, e.g. `600 14px Inter, sans-serif`.
    pub fn css_shorthand(&self) -> String {
        format!("{} {}px {}", self.weight, self.size, self.family)
    }
}

impl Default for FontDescription {
    fn default() -> Self {
        Self {
            size: 14.0,
            weight: 600,
            family: "Inter, sans-serif".to_string(),
            line_height: 20.0,
            padding_x: 16.0,
            padding_y: 12.0,
            corner_radius: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Number of history snapshots kept for undo/redo; zero is rejected.
    pub max_history_size: NonZeroUsize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub layout: LayoutConfig,
    pub font: FontDescription,
    pub runtime: RuntimeConfig,
}

/// Loads an editor config file (JSON or JSON5). Keys that are absent keep
/// their defaults; without a path the defaults are returned as is.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };

    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<EditorConfig> {
    let config: EditorConfig = json5::from_str(contents)?;
    for (name, value) in [
        ("layout.spacing.horizontal", config.layout.spacing.horizontal),
        ("layout.spacing.vertical", config.layout.spacing.vertical),
        ("layout.minTextWidth", config.layout.min_text_width),
        ("layout.maxTextWidth", config.layout.max_text_width),
        ("font.lineHeight", config.font.line_height),
    ] {
        if !value.is_finite() {
            anyhow::bail!("{name} must be a finite number");
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_keeps_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.runtime.max_history_size.get(), 50);
    }

    #[test]
    fn partial_overrides_merge_with_defaults() {
        let config = parse_config(
            r#"{
                // json5 comments are accepted
                layout: { spacing: { horizontal: 60 }, maxTextWidth: 200 },
                font: { family: "Mono", radius: 4 },
                runtime: { maxHistorySize: 5 },
            }"#,
        )
        .unwrap();
        assert_eq!(config.layout.spacing.horizontal, 60.0);
        assert_eq!(config.layout.spacing.vertical, 40.0);
        assert_eq!(config.layout.max_text_width, 200.0);
        assert_eq!(config.layout.min_text_width, 80.0);
        assert_eq!(config.font.family, "Mono");
        assert_eq!(config.font.corner_radius, 4.0);
        assert_eq!(config.font.size, 14.0);
        assert_eq!(config.runtime.max_history_size.get(), 5);
    }

    #[test]
    fn zero_history_size_is_rejected() {
        assert!(parse_config(r#"{"runtime": {"maxHistorySize": 0}}"#).is_err());
    }

    #[test]
    fn css_shorthand_matches_canvas_font() {
        assert_eq!(
            FontDescription::default().css_shorthand(),
            "600 14px Inter, sans-serif"
        );
    }
}
