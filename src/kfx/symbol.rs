//! KFX symbol definitions.
//!
//! KFX identifies every style property, keyword value, and unit by a numeric
//! symbol from the YJ_symbols shared table. The engine works with a closed
//! subset of that table: each [`Sym`] carries its numeric ID and its human
//! name. Incoming names that are not in the table produce warnings at the
//! call site; outgoing symbols always have a name.

macro_rules! symbols {
    ($( $variant:ident = $id:literal => $name:literal, )*) => {
        /// A symbol from the KFX shared table subset used by the engine.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum Sym {
            $( $variant = $id, )*
        }

        impl Sym {
            /// All symbols, in declaration order.
            pub const ALL: &'static [Sym] = &[ $( Sym::$variant, )* ];

            /// The human name for this symbol.
            pub fn name(self) -> &'static str {
                match self {
                    $( Sym::$variant => $name, )*
                }
            }

            /// Look up a symbol by its human name.
            pub fn from_name(name: &str) -> Option<Sym> {
                match name {
                    $( $name => Some(Sym::$variant), )*
                    _ => None,
                }
            }

            /// The numeric ID in the shared table.
            pub fn id(self) -> u16 {
                self as u16
            }
        }
    };
}

symbols! {
    // Generic fields
    Id = 4 => "id",

    // Font properties
    FontFamily = 11 => "font-family",
    FontStyle = 12 => "font-style",
    FontWeight = 13 => "font-weight",
    FontSize = 16 => "font-size",
    Color = 19 => "color",
    BackgroundColor = 21 => "background-color",
    Underline = 23 => "underline",
    BackgroundRepeat = 24 => "background-repeat",
    Strikethrough = 27 => "strikethrough",

    // Text layout
    LetterSpacing = 32 => "letter-spacing",
    WordSpacing = 33 => "word-spacing",
    TextAlign = 34 => "text-align",
    TextIndent = 36 => "text-indent",
    TextTransform = 41 => "text-transform",
    LineHeight = 42 => "line-height",
    BaselineStyle = 44 => "baseline-style",
    WhiteSpace = 45 => "white-space",

    // Box model
    MarginTop = 47 => "margin-top",
    MarginLeft = 48 => "margin-left",
    MarginBottom = 49 => "margin-bottom",
    MarginRight = 50 => "margin-right",
    PaddingTop = 52 => "padding-top",
    PaddingRight = 53 => "padding-right",
    PaddingBottom = 54 => "padding-bottom",
    PaddingLeft = 55 => "padding-left",
    Width = 56 => "width",
    Height = 57 => "height",
    MaxHeight = 64 => "max-height",
    MinHeight = 62 => "min-height",
    MinWidth = 63 => "min-width",
    MaxWidth = 65 => "max-width",

    // Borders (collapsed per-side model; shorthand expansion targets these)
    BorderStyle = 90 => "border-style",
    BorderWidth = 91 => "border-width",
    BorderColor = 92 => "border-color",
    BorderCollapse = 96 => "border-collapse",
    BorderSpacingHorizontal = 97 => "border-spacing-horizontal",
    BorderSpacingVertical = 98 => "border-spacing-vertical",

    // Display and positioning
    Display = 127 => "display",
    Float = 628 => "float",
    BoxAlign = 633 => "box-align",

    // Break control
    BreakInside = 135 => "break-inside",
    YjBreakAfter = 788 => "yj-break-after",
    YjBreakBefore = 789 => "yj-break-before",

    // Amazon layout extensions
    LayoutHints = 671 => "layout-hints",
    KeepLinesTogether = 672 => "keep-lines-together",

    // Keyword values
    Top = 58 => "top",
    Left = 59 => "left",
    Bottom = 60 => "bottom",
    Right = 61 => "right",
    Center = 320 => "center",
    Justify = 321 => "justify",
    None = 349 => "none",
    Normal = 350 => "normal",
    Avoid = 353 => "avoid",
    Bold = 361 => "bold",
    Superscript = 370 => "superscript",
    Subscript = 371 => "subscript",
    Oblique = 381 => "oblique",
    Italic = 382 => "italic",
    Auto = 383 => "auto",
    Both = 421 => "both",
    Nowrap = 424 => "nowrap",
    Solid = 425 => "solid",
    Hidden = 426 => "hidden",
    Uppercase = 372 => "uppercase",
    Lowercase = 373 => "lowercase",
    Capitalize = 374 => "capitalize",
    Collapse = 427 => "collapse",
    Always = 428 => "always",
    Repeat = 730 => "repeat",
    RepeatX = 731 => "repeat-x",
    RepeatY = 732 => "repeat-y",
    NoRepeat = 733 => "no-repeat",
    TreatAsTitle = 734 => "treat_as_title",
    KeepFirst = 735 => "keep-first",
    KeepLast = 736 => "keep-last",

    // Units
    Unit = 306 => "unit",
    ValueField = 307 => "value",
    Em = 308 => "em",
    Lh = 310 => "lh",
    Ratio = 311 => "ratio",
    Percent = 314 => "%",
    Cm = 315 => "cm",
    Mm = 316 => "mm",
    Px = 318 => "px",
    Pt = 319 => "pt",
    Rem = 505 => "rem",
    Vh = 781 => "vh",
    Vw = 782 => "vw",

    // Fragment types and structural fields
    StyleEvents = 142 => "style_events",
    Offset = 143 => "offset",
    Length = 144 => "length",
    Content = 145 => "content",
    Style = 157 => "style",
    Format = 161 => "format",
    Mime = 162 => "mime",
    ExternalResource = 164 => "external-resource",
    Location = 165 => "location",
    StyleName = 173 => "style_name",
    ResourceName = 175 => "resource_name",
    StoryName = 176 => "story_name",
    Anchor = 179 => "anchor",
    AnchorName = 180 => "anchor_name",
    ExternalUrl = 186 => "external_url",
    Storyline = 259 => "storyline",
    TypeField = 159 => "type",
    TypeText = 269 => "text",
    TypeImage = 271 => "image",
    RawMedia = 417 => "raw-media",
    ResourceWidth = 422 => "resource_width",
    ResourceHeight = 423 => "resource_height",
    AltText = 584 => "alt_text",
    First = 610 => "first",
    Last = 611 => "last",
}

impl std::fmt::Display for Sym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Sym {
    /// The four margin sides.
    pub const MARGINS: [Sym; 4] = [
        Sym::MarginTop,
        Sym::MarginLeft,
        Sym::MarginBottom,
        Sym::MarginRight,
    ];

    /// True for `margin-*` properties.
    pub fn is_margin(self) -> bool {
        Self::MARGINS.contains(&self)
    }

    /// Properties inherited through standard CSS inheritance.
    pub fn is_css_inherited(self) -> bool {
        matches!(
            self,
            Sym::FontFamily
                | Sym::FontStyle
                | Sym::FontWeight
                | Sym::FontSize
                | Sym::Color
                | Sym::LetterSpacing
                | Sym::WordSpacing
                | Sym::TextAlign
                | Sym::TextIndent
                | Sym::TextTransform
                | Sym::LineHeight
                | Sym::WhiteSpace
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_and_names_unique() {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for sym in Sym::ALL {
            assert!(ids.insert(sym.id()), "duplicate id {}", sym.id());
            assert!(names.insert(sym.name()), "duplicate name {}", sym.name());
        }
    }

    #[test]
    fn test_round_trip_by_name() {
        for sym in Sym::ALL {
            assert_eq!(Sym::from_name(sym.name()), Some(*sym));
        }
        assert_eq!(Sym::from_name("no-such-symbol"), None);
    }

    #[test]
    fn test_required_names_present() {
        for name in [
            "treat_as_title",
            "auto",
            "avoid",
            "lh",
            "em",
            "%",
            "pt",
            "px",
            "rem",
            "ratio",
            "center",
            "justify",
            "superscript",
            "subscript",
        ] {
            assert!(Sym::from_name(name).is_some(), "missing symbol {name}");
        }
    }
}
