use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// FIXED TEXT ASSETS
// ============================================================================

/// Style instruction sent alongside every prompt when `style_preamble` is on.
pub const SYSTEM_PROMPT: &str = "You are a coloring book illustrator. Your task is to generate simple, clean, black and white line art coloring pages for children.
Guidelines:
- Only use black lines on a pure white background.
- No shading, no gradients, no grey colors.
- Bold, thick, continuous outlines.
- Large areas for kids to color in.
- Friendly, cute, and child-safe subjects.
- Avoid overly complex details.";

/// Quick-pick prompts shown under the prompt bar.
pub const SUGGESTIONS: &[&str] = &[
    "A happy dinosaur",
    "A space cat",
    "A princess castle",
    "A magic garden",
];

pub const PROMPT_PLACEHOLDER: &str = "What should we color today? (e.g. A flying turtle)";

pub const MSG_GENERATION_FAILED: &str = "Oops! The magic pencil broke. Try again?";
pub const MSG_BACKGROUND_FAILED: &str = "We couldn't load the picture. Try again?";

// ============================================================================
// SETTINGS
// ============================================================================

/// Application settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Base URL of the generation REST API (without the `/models/...` suffix)
    pub api_endpoint: String,
    /// Image-capable model name
    pub model: String,
    /// API key; empty = read `GEMINI_API_KEY` / `API_KEY` from the environment
    pub api_key: String,
    /// Timeout for one generation call or background fetch, in seconds
    pub request_timeout_secs: u64,
    /// Send the coloring-book style instruction with every prompt
    pub style_preamble: bool,
    /// Background shown before the first page is generated (empty = none)
    pub placeholder_background: String,
    /// File name offered by the save dialog
    pub export_file_name: String,
    /// Brush color at startup, `#rrggbb`
    pub default_color: String,
    /// Brush size at startup, in backing pixels
    pub default_brush_size: u32,
    /// Mark remote backgrounds without an anonymous CORS grant as not exportable
    pub strict_cross_origin: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash-image".to_string(),
            api_key: String::new(),
            request_timeout_secs: 60,
            style_preamble: true,
            placeholder_background: "https://picsum.photos/1024/1024?grayscale&blur=10".to_string(),
            export_file_name: "my-gemini-masterpiece.png".to_string(),
            default_color: "#ef4444".to_string(),
            default_brush_size: 15,
            strict_cross_origin: true,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/colormagic/colormagic_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\ColorMagic\colormagic_settings.cfg
    /// On macOS:   ~/Library/Application Support/ColorMagic/colormagic_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("colormagic");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("colormagic_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("ColorMagic");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("colormagic_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("ColorMagic");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("colormagic_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("colormagic_settings.cfg")))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Configured key, falling back to the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        ["GEMINI_API_KEY", "API_KEY"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.trim().is_empty())
    }

    /// Serialize to the `key=value` settings format.
    pub fn to_config_string(&self) -> String {
        format!(
            "api_endpoint={}\n\
             model={}\n\
             api_key={}\n\
             request_timeout_secs={}\n\
             style_preamble={}\n\
             placeholder_background={}\n\
             export_file_name={}\n\
             default_color={}\n\
             default_brush_size={}\n\
             strict_cross_origin={}\n",
            self.api_endpoint,
            self.model,
            self.api_key,
            self.request_timeout_secs,
            self.style_preamble,
            self.placeholder_background,
            self.export_file_name,
            self.default_color,
            self.default_brush_size,
            self.strict_cross_origin,
        )
    }

    /// Parse settings text. Missing or malformed keys keep their defaults;
    /// unknown keys are ignored.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "api_endpoint" => {
                    if !val.is_empty() {
                        s.api_endpoint = val.trim_end_matches('/').to_string();
                    }
                }
                "model" => {
                    if !val.is_empty() {
                        s.model = val.to_string();
                    }
                }
                "api_key" => {
                    s.api_key = val.to_string();
                }
                "request_timeout_secs" => {
                    s.request_timeout_secs = val.parse().unwrap_or(60);
                }
                "style_preamble" => {
                    s.style_preamble = val == "true";
                }
                "placeholder_background" => {
                    s.placeholder_background = val.to_string();
                }
                "export_file_name" => {
                    if !val.is_empty() {
                        s.export_file_name = val.to_string();
                    }
                }
                "default_color" => {
                    if crate::components::colors::HexColor::parse(val).is_some() {
                        s.default_color = val.to_string();
                    }
                }
                "default_brush_size" => {
                    s.default_brush_size = val.parse().ok().filter(|&v| v > 0).unwrap_or(15);
                }
                "strict_cross_origin" => {
                    s.strict_cross_origin = val == "true";
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("Could not write settings {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else {
            // First run: write the defaults so there is a file to edit
            let s = Self::default();
            s.save();
            return s;
        };
        Self::from_config_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_text_survives_a_save_load_cycle() {
        let mut s = AppSettings::default();
        s.model = "some-image-model".to_string();
        s.default_brush_size = 25;
        s.style_preamble = false;
        s.strict_cross_origin = false;
        assert_eq!(AppSettings::from_config_str(&s.to_config_string()), s);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let s = AppSettings::from_config_str(
            "default_brush_size=0\n\
             default_color=purple\n\
             request_timeout_secs=soon\n\
             garbage line\n\
             unknown_key=1\n\
             api_endpoint=http://localhost:9000/v1/\n",
        );
        let d = AppSettings::default();
        assert_eq!(s.default_brush_size, d.default_brush_size);
        assert_eq!(s.default_color, d.default_color);
        assert_eq!(s.request_timeout_secs, 60);
        assert_eq!(s.api_endpoint, "http://localhost:9000/v1");
    }

    #[test]
    fn configured_key_wins_over_environment() {
        let s = AppSettings { api_key: "from-settings".to_string(), ..Default::default() };
        assert_eq!(s.resolved_api_key().as_deref(), Some("from-settings"));
    }
}
