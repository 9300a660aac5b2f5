//! Print job options: paper size, color and duplex style.
//!
//! Each option has three spellings:
//! - the wire name exchanged with the backend (`BlackAndWhite`, `TwoSided`),
//! - a display label shown in forms (`Black & White`, `Double-sided`),
//! - loose aliases accepted from forms and the CLI (`bw`, `duplex`).
//!
//! `from_label` maps any of them to the wire value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a print option label cannot be mapped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct OptionParseError {
    /// Which option dimension failed to parse.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl OptionParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

fn normalize(label: &str) -> String {
    label
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Paper size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaperType {
    A3,
    A4,
    A5,
    Letter,
    Legal,
}

impl PaperType {
    /// All paper sizes in display order.
    pub const ALL: [Self; 5] = [Self::A4, Self::A3, Self::A5, Self::Letter, Self::Legal];

    /// Name used by the backend.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::A5 => "A5",
            Self::Letter => "Letter",
            Self::Legal => "Legal",
        }
    }

    /// Label shown in forms.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::A3 => "A3 (297 × 420 mm)",
            Self::A4 => "A4 (210 × 297 mm)",
            Self::A5 => "A5 (148 × 210 mm)",
            Self::Letter => "US Letter",
            Self::Legal => "US Legal",
        }
    }

    /// Map a form label, wire name or alias to a paper size.
    ///
    /// # Errors
    ///
    /// Returns [`OptionParseError`] for unknown sizes.
    pub fn from_label(label: &str) -> Result<Self, OptionParseError> {
        let key = normalize(label);
        if let Some(paper) = Self::ALL.into_iter().find(|p| key == normalize(p.label())) {
            return Ok(paper);
        }
        match key.as_str() {
            "a3" => Ok(Self::A3),
            "a4" => Ok(Self::A4),
            "a5" => Ok(Self::A5),
            "letter" | "usletter" => Ok(Self::Letter),
            "legal" | "uslegal" => Ok(Self::Legal),
            _ => Err(OptionParseError::new("paper type", label)),
        }
    }
}

/// Color option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorOption {
    BlackAndWhite,
    Color,
}

impl ColorOption {
    /// All color options in display order.
    pub const ALL: [Self; 2] = [Self::BlackAndWhite, Self::Color];

    /// Name used by the backend.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::BlackAndWhite => "BlackAndWhite",
            Self::Color => "Color",
        }
    }

    /// Label shown in forms.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BlackAndWhite => "Black & White",
            Self::Color => "Color",
        }
    }

    /// Map a form label, wire name or alias to a color option.
    ///
    /// # Errors
    ///
    /// Returns [`OptionParseError`] for unknown options.
    pub fn from_label(label: &str) -> Result<Self, OptionParseError> {
        match normalize(label).as_str() {
            "blackandwhite" | "blackwhite" | "bw" | "mono" | "monochrome" | "grayscale" => {
                Ok(Self::BlackAndWhite)
            }
            "color" | "colour" | "fullcolor" => Ok(Self::Color),
            _ => Err(OptionParseError::new("color option", label)),
        }
    }
}

/// Duplex style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrintType {
    OneSided,
    TwoSided,
}

impl PrintType {
    /// All duplex styles in display order.
    pub const ALL: [Self; 2] = [Self::OneSided, Self::TwoSided];

    /// Name used by the backend.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::OneSided => "OneSided",
            Self::TwoSided => "TwoSided",
        }
    }

    /// Label shown in forms.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OneSided => "Single-sided",
            Self::TwoSided => "Double-sided",
        }
    }

    /// Map a form label, wire name or alias to a duplex style.
    ///
    /// # Errors
    ///
    /// Returns [`OptionParseError`] for unknown styles.
    pub fn from_label(label: &str) -> Result<Self, OptionParseError> {
        match normalize(label).as_str() {
            "onesided" | "singlesided" | "single" | "simplex" => Ok(Self::OneSided),
            "twosided" | "doublesided" | "double" | "duplex" => Ok(Self::TwoSided),
            _ => Err(OptionParseError::new("print type", label)),
        }
    }
}

macro_rules! label_impls {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = OptionParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_label(s)
            }
        }
    )*};
}

label_impls!(PaperType, ColorOption, PrintType);

/// A fully specified set of print options.
///
/// This triple is the key an agency prices: every [`crate::AgencyProduct`]
/// carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintOptions {
    pub paper_type: PaperType,
    pub color_option: ColorOption,
    pub print_type: PrintType,
}

impl PrintOptions {
    #[must_use]
    pub const fn new(paper_type: PaperType, color_option: ColorOption, print_type: PrintType) -> Self {
        Self {
            paper_type,
            color_option,
            print_type,
        }
    }
}

impl fmt::Display for PrintOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}",
            self.paper_type.wire_name(),
            self.color_option,
            self.print_type
        )
    }
}
