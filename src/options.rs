//! Fixed option tables offered to the user: icon sizes, corner styles and
//! prompt templates.
//!
//! Each table is an enum so that a resolved option can never hold a value
//! outside its table. Labels coming from the outside world go through
//! `from_label`, which is the only place an [`Error::UnknownOption`] can
//! originate.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Prompt used when neither a custom prompt nor a template was supplied.
pub const DEFAULT_PROMPT: &str = "Cute minimalist chatbot avatar, clean design, friendly expression";

/// Negative prompt sent with every request unless overridden.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "low quality, bad composition, blurry, ugly, deformed";

fn find<T: Copy>(table: &'static str, all: &[T], label: &str, key: impl Fn(T) -> &'static str) -> Result<T> {
    all.iter()
        .copied()
        .find(|option| key(*option) == label)
        .ok_or_else(|| Error::UnknownOption {
            table,
            label: label.to_string(),
        })
}

/// Square output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IconSize {
    Small,
    #[default]
    Medium,
    Large,
    ExtraLarge,
}

impl IconSize {
    /// Every size, in display order.
    pub const ALL: [Self; 4] = [Self::Small, Self::Medium, Self::Large, Self::ExtraLarge];

    /// Human-readable label shown in selection controls.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Small => "Small (128x128)",
            Self::Medium => "Medium (256x256)",
            Self::Large => "Large (512x512)",
            Self::ExtraLarge => "Extra Large (1024x1024)",
        }
    }

    /// Edge length of the square icon in pixels.
    #[must_use]
    pub const fn edge(self) -> u32 {
        match self {
            Self::Small => 128,
            Self::Medium => 256,
            Self::Large => 512,
            Self::ExtraLarge => 1024,
        }
    }

    /// Look up a size by its label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] if no size carries this label.
    pub fn from_label(label: &str) -> Result<Self> {
        find("size", &Self::ALL, label, Self::label)
    }
}

/// How strongly the icon corners are rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CornerStyle {
    None,
    #[default]
    Slight,
    Medium,
    Full,
}

impl CornerStyle {
    /// Every corner style, in display order.
    pub const ALL: [Self; 4] = [Self::None, Self::Slight, Self::Medium, Self::Full];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "No Rounding",
            Self::Slight => "Slight Rounding",
            Self::Medium => "Medium Rounding",
            Self::Full => "Full Rounded",
        }
    }

    /// Corner radius in pixels. Zero leaves the image untouched.
    #[must_use]
    pub const fn radius(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Slight => 20,
            Self::Medium => 50,
            Self::Full => 100,
        }
    }

    /// Look up a corner style by its label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] if no style carries this label.
    pub fn from_label(label: &str) -> Result<Self> {
        find("corner style", &Self::ALL, label, Self::label)
    }
}

/// Ready-made prompts for common icon looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptTemplate {
    CartoonMascot,
    Professional,
    Futuristic,
    AbstractGeometric,
    Watercolor,
    RobotCharacter,
    UltraMinimalist,
    Cyberpunk,
    ElegantCorporate,
    Sketch,
}

impl PromptTemplate {
    pub const ALL: [Self; 10] = [
        Self::CartoonMascot,
        Self::Professional,
        Self::Futuristic,
        Self::AbstractGeometric,
        Self::Watercolor,
        Self::RobotCharacter,
        Self::UltraMinimalist,
        Self::Cyberpunk,
        Self::ElegantCorporate,
        Self::Sketch,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CartoonMascot => "Cartoon Mascot",
            Self::Professional => "Professional Avatar",
            Self::Futuristic => "Futuristic Circuit",
            Self::AbstractGeometric => "Abstract Geometric",
            Self::Watercolor => "Watercolor",
            Self::RobotCharacter => "Robot Character",
            Self::UltraMinimalist => "Ultra-Minimalist",
            Self::Cyberpunk => "Cyberpunk",
            Self::ElegantCorporate => "Elegant Corporate",
            Self::Sketch => "Sketch",
        }
    }

    /// Prompt text passed verbatim to the model.
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::CartoonMascot => {
                "Cute cartoon chatbot mascot, big eyes, friendly smile, pastel colors, kawaii style"
            }
            Self::Professional => {
                "Professional AI chatbot avatar, minimalist design, sleek geometric shapes, corporate blue and white"
            }
            Self::Futuristic => {
                "Futuristic AI chatbot icon, glowing circuit patterns, metallic blue and silver"
            }
            Self::AbstractGeometric => {
                "Abstract geometric chatbot avatar, clean lines, single color gradient background"
            }
            Self::Watercolor => {
                "Watercolor style chatbot icon, soft brush strokes, dreamy color blend"
            }
            Self::RobotCharacter => {
                "Adorable robot character avatar, round shape, soft colors, playful expression"
            }
            Self::UltraMinimalist => {
                "Ultra-minimalist chatbot icon, simple geometric face, monochrome color scheme"
            }
            Self::Cyberpunk => "Cyberpunk chatbot avatar, neon accents, digital glitch effects",
            Self::ElegantCorporate => {
                "Elegant corporate chatbot icon, modern flat design, clean lines"
            }
            Self::Sketch => "Sketch-style chatbot avatar, hand-drawn look, pencil texture",
        }
    }

    /// Look up a template by its label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] if no template carries this label.
    pub fn from_label(label: &str) -> Result<Self> {
        find("prompt template", &Self::ALL, label, Self::label)
    }
}

macro_rules! label_traits {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_label(s)
            }
        }
    )*};
}

label_traits!(IconSize, CornerStyle, PromptTemplate);

/// Pick the prompt for a request.
///
/// Non-blank custom text wins; otherwise the template text is used
/// verbatim; with neither, [`DEFAULT_PROMPT`] is used.
#[must_use]
pub fn resolve_prompt(custom: Option<&str>, template: Option<PromptTemplate>) -> String {
    match (custom.filter(|text| !text.trim().is_empty()), template) {
        (Some(text), _) => text.to_string(),
        (None, Some(template)) => template.text().to_string(),
        (None, None) => DEFAULT_PROMPT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_labels_resolve() {
        for size in IconSize::ALL {
            assert_eq!(IconSize::from_label(size.label()).unwrap(), size);
        }
        assert_eq!(IconSize::from_label("Medium (256x256)").unwrap().edge(), 256);
    }

    #[test]
    fn test_corner_radii() {
        let radii: Vec<u32> = CornerStyle::ALL.iter().map(|c| c.radius()).collect();
        assert_eq!(radii, vec![0, 20, 50, 100]);
        assert_eq!(CornerStyle::from_label("Slight Rounding").unwrap(), CornerStyle::Slight);
    }

    #[test]
    fn test_unknown_label() {
        let err = IconSize::from_label("Huge (4096x4096)").unwrap_err();
        assert!(matches!(err, Error::UnknownOption { table: "size", .. }));

        let err = "Sharp".parse::<CornerStyle>().unwrap_err();
        assert!(matches!(err, Error::UnknownOption { ref label, .. } if label == "Sharp"));

        assert!(PromptTemplate::from_label("").is_err());
    }

    #[test]
    fn test_templates_are_distinct_and_non_empty() {
        for (i, a) in PromptTemplate::ALL.iter().enumerate() {
            assert!(!a.text().is_empty());
            assert_eq!(PromptTemplate::from_label(a.label()).unwrap(), *a);
            for b in &PromptTemplate::ALL[i + 1..] {
                assert_ne!(a.label(), b.label());
            }
        }
    }

    #[test]
    fn test_defaults_match_ui_preselection() {
        assert_eq!(IconSize::default().label(), "Medium (256x256)");
        assert_eq!(CornerStyle::default().label(), "Slight Rounding");
    }

    #[test]
    fn test_resolve_prompt() {
        let template = PromptTemplate::Cyberpunk;
        assert_eq!(resolve_prompt(Some(""), Some(template)), template.text());
        assert_eq!(resolve_prompt(Some("   "), Some(template)), template.text());
        assert_eq!(resolve_prompt(None, Some(template)), template.text());
        assert_eq!(resolve_prompt(Some("a red fox"), Some(template)), "a red fox");
        assert_eq!(resolve_prompt(None, None), DEFAULT_PROMPT);
    }
}
