//! Theme projection
//!
//! Maps a tenant's branding settings to a canonical set of presentation
//! tokens. Unset or invalid settings fall back to platform defaults, so the
//! same tenant settings always project to the same descriptor.

use campfire_shared::{features, Branding, Tenant};
use serde::Serialize;
use std::fmt::Write;

pub const DEFAULT_PRIMARY_COLOR: &str = "#1f6feb";
pub const DEFAULT_SECONDARY_COLOR: &str = "#0d1117";
pub const DEFAULT_ACCENT_COLOR: &str = "#f78166";
pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";
pub const DEFAULT_TEXT_COLOR: &str = "#1f2328";
pub const DEFAULT_HEADING_FONT: &str = "Inter, system-ui, sans-serif";
pub const DEFAULT_BODY_FONT: &str = "Inter, system-ui, sans-serif";

/// Presentation-ready theme for a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeDescriptor {
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub background_color: String,
    pub text_color: String,
    pub heading_font: String,
    pub body_font: String,
    pub logo_url: Option<String>,
    /// Only present when the tenant has the custom CSS feature
    pub custom_css: Option<String>,
}

impl Default for ThemeDescriptor {
    fn default() -> Self {
        Self::from_branding(&Branding::default(), false)
    }
}

impl ThemeDescriptor {
    /// Project a tenant's branding into a theme
    pub fn project(tenant: &Tenant) -> Self {
        let custom_css_enabled = tenant
            .effective_features()
            .get(features::CUSTOM_CSS)
            .copied()
            .unwrap_or(false);

        Self::from_branding(&tenant.settings.branding, custom_css_enabled)
    }

    fn from_branding(branding: &Branding, custom_css_enabled: bool) -> Self {
        Self {
            primary_color: color_or(&branding.primary_color, DEFAULT_PRIMARY_COLOR),
            secondary_color: color_or(&branding.secondary_color, DEFAULT_SECONDARY_COLOR),
            accent_color: color_or(&branding.accent_color, DEFAULT_ACCENT_COLOR),
            background_color: color_or(&branding.background_color, DEFAULT_BACKGROUND_COLOR),
            text_color: color_or(&branding.text_color, DEFAULT_TEXT_COLOR),
            heading_font: font_or(&branding.heading_font, DEFAULT_HEADING_FONT),
            body_font: font_or(&branding.body_font, DEFAULT_BODY_FONT),
            logo_url: branding.logo_url.as_deref().and_then(sanitize_logo_url),
            custom_css: branding
                .custom_css
                .as_deref()
                .filter(|_| custom_css_enabled)
                .map(sanitize_custom_css)
                .filter(|css| !css.trim().is_empty()),
        }
    }

    /// Render the theme as CSS custom properties followed by any custom CSS
    pub fn css_variables(&self) -> String {
        let mut css = String::from(":root {\n");
        let tokens = [
            ("--color-primary", &self.primary_color),
            ("--color-secondary", &self.secondary_color),
            ("--color-accent", &self.accent_color),
            ("--color-background", &self.background_color),
            ("--color-text", &self.text_color),
            ("--font-heading", &self.heading_font),
            ("--font-body", &self.body_font),
        ];
        for (name, value) in tokens {
            // Writing to a String cannot fail
            let _ = writeln!(css, "  {}: {};", name, value);
        }
        css.push_str("}\n");

        if let Some(custom) = &self.custom_css {
            css.push('\n');
            css.push_str(custom);
            if !custom.ends_with('\n') {
                css.push('\n');
            }
        }

        css
    }
}

fn color_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .and_then(normalize_hex_color)
        .unwrap_or_else(|| default.to_string())
}

fn font_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(sanitize_font)
        .filter(|font| !font.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Accepts `#rgb` and `#rrggbb`; returns the lowercase form
fn normalize_hex_color(value: &str) -> Option<String> {
    let value = value.trim();
    let hex = value.strip_prefix('#')?;
    if matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(value.to_ascii_lowercase())
    } else {
        None
    }
}

/// Font stacks end up inside a CSS declaration; drop anything that could end it
fn sanitize_font(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ';' | '{' | '}' | '<' | '>' | '\\'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn sanitize_logo_url(value: &str) -> Option<String> {
    let value = value.trim();
    let allowed = value.starts_with("https://")
        || value.starts_with("http://")
        || (value.starts_with('/') && !value.starts_with("//"));
    (allowed && !value.contains(['"', '\'', '<', '>', ' '])).then(|| value.to_string())
}

/// Custom CSS is embedded in a style element; `<` would allow closing it
fn sanitize_custom_css(value: &str) -> String {
    value.replace('<', "")
}
