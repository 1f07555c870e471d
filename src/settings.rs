// settings.rs
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Leading segment of every program hash.
    #[serde(default = "RenderSettings::default_canvas_id")]
    pub canvas_id: String,
    #[serde(default)]
    pub gamma_output: bool,
    #[serde(default = "RenderSettings::default_gamma_factor")]
    pub gamma_factor: f32,
    #[serde(default = "RenderSettings::default_true")]
    pub shadows: bool,
    /// Overrides the unit count reported by the GPU.
    #[serde(default)]
    pub max_texture_units: Option<u32>,
    #[serde(default = "RenderSettings::default_true")]
    pub transparent_sort: bool,
    #[serde(default = "RenderSettings::default_true")]
    pub pick_enabled: bool,
    #[serde(default = "RenderSettings::default_clear_color")]
    pub clear_color: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            canvas_id: Self::default_canvas_id(),
            gamma_output: false,
            gamma_factor: Self::default_gamma_factor(),
            shadows: true,
            max_texture_units: None,
            transparent_sort: true,
            pick_enabled: true,
            clear_color: Self::default_clear_color(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            info!("Using default render settings for WebAssembly build");
            Self::default()
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            Self::load_from_path("render_settings.json")
        }
    }

    /// Reads settings, falling back to defaults when the file is missing or
    /// malformed.
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load_from_path(path) {
            Ok(settings) => {
                info!("Loaded render settings from {:?}", path);
                settings
            }
            Err(crate::error::RenderError::Io(err))
                if err.kind() == std::io::ErrorKind::NotFound =>
            {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    "Failed to load {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                Self::default()
            }
        }
    }

    pub fn try_load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings: RenderSettings = serde_json::from_str(json)?;
        Ok(settings.validate())
    }

    pub fn validate(mut self) -> Self {
        if self.canvas_id.is_empty() {
            warn!("Canvas id must not be empty. Using default.");
            self.canvas_id = Self::default_canvas_id();
        }

        if self.gamma_factor.is_nan() || self.gamma_factor <= 0.0 {
            warn!("Gamma factor must be positive. Using default value.");
            self.gamma_factor = Self::default_gamma_factor();
        }

        if self.max_texture_units == Some(0) {
            warn!("Texture unit override must be greater than zero. Using the GPU limit.");
            self.max_texture_units = None;
        }

        self
    }

    fn default_canvas_id() -> String {
        "canvas".to_string()
    }

    const fn default_gamma_factor() -> f32 {
        2.2
    }

    const fn default_true() -> bool {
        true
    }

    const fn default_clear_color() -> [f32; 4] {
        [0.0, 0.0, 0.0, 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings = RenderSettings::from_json(r#"{ "gamma_output": true }"#).unwrap();
        assert!(settings.gamma_output);
        assert_eq!(settings.canvas_id, "canvas");
        assert!(settings.shadows);
        assert_eq!(settings.max_texture_units, None);
    }

    #[test]
    fn validate_rejects_zero_texture_units() {
        let settings =
            RenderSettings::from_json(r#"{ "max_texture_units": 0, "canvas_id": "" }"#).unwrap();
        assert_eq!(settings.max_texture_units, None);
        assert_eq!(settings.canvas_id, "canvas");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            RenderSettings::from_json("{ not json"),
            Err(crate::error::RenderError::Settings(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = RenderSettings::load_from_path("does/not/exist/render_settings.json");
        assert_eq!(settings, RenderSettings::default());
    }
}
