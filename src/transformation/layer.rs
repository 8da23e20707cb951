//! Layer Compiler
//!
//! Overlay/underlay sub-expressions: image, video, text, and subtitle
//! layers embedded into a transformation as `l_...` / `u_...` values.
//!
//! Layers compile to colon-joined components. Commas and slashes are
//! reserved by the outer transformation grammar, so literal text is run
//! through [`encode_overlay_text`] before it is embedded; that step is
//! load-bearing, not cosmetic (a raw `,` or `/` would be misparsed as a
//! parameter or segment delimiter by the delivery service).
//!
//! The variant set is closed on purpose: a text layer has no `format` or
//! `delivery type` field at all, so the misuse the service would reject at
//! request time is simply unrepresentable here.

use crate::error::{MediaError, Result};

/// An overlay/underlay sub-expression
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// An image resource referenced by public id
    Image(ImageLayer),
    /// A video resource referenced by public id
    Video(VideoLayer),
    /// Literal styled text, or a text resource referenced by public id
    Text(TextLayer),
    /// A subtitle file with optional text styling
    Subtitles(SubtitlesLayer),
}

impl Layer {
    /// Render the layer to its colon-joined wire form
    pub fn compile(&self) -> Result<String> {
        match self {
            Self::Image(l) => l.compile(),
            Self::Video(l) => l.compile(),
            Self::Text(l) => l.compile(),
            Self::Subtitles(l) => l.compile(),
        }
    }
}

impl From<ImageLayer> for Layer {
    fn from(l: ImageLayer) -> Self {
        Self::Image(l)
    }
}

impl From<VideoLayer> for Layer {
    fn from(l: VideoLayer) -> Self {
        Self::Video(l)
    }
}

impl From<TextLayer> for Layer {
    fn from(l: TextLayer) -> Self {
        Self::Text(l)
    }
}

impl From<SubtitlesLayer> for Layer {
    fn from(l: SubtitlesLayer) -> Self {
        Self::Subtitles(l)
    }
}

/// Image overlay: `[resource_type]:[type]:public_id[.format]`, with the
/// `image` resource type and `upload` delivery type elided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageLayer {
    resource_type: Option<String>,
    delivery_type: Option<String>,
    public_id: Option<String>,
    format: Option<String>,
}

impl ImageLayer {
    /// Layer over the image with the given public id
    pub fn new(public_id: impl Into<String>) -> Self {
        Self {
            public_id: Some(public_id.into()),
            ..Self::default()
        }
    }

    /// Override the resource type (defaults to `image`)
    pub fn resource_type(mut self, rt: impl Into<String>) -> Self {
        self.resource_type = Some(rt.into());
        self
    }

    /// Override the delivery type (defaults to `upload`)
    pub fn delivery_type(mut self, t: impl Into<String>) -> Self {
        self.delivery_type = Some(t.into());
        self
    }

    /// Request a specific format for the layered resource
    pub fn format(mut self, fmt: impl Into<String>) -> Self {
        self.format = Some(fmt.into());
        self
    }

    fn compile(&self) -> Result<String> {
        let public_id = self
            .public_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MediaError::InvalidLayer("image layer requires a public id".into()))?;

        let mut components: Vec<String> = Vec::new();
        if let Some(rt) = self.resource_type.as_deref()
            && rt != "image"
        {
            components.push(rt.to_string());
        }
        if let Some(t) = self.delivery_type.as_deref()
            && t != "upload"
        {
            components.push(t.to_string());
        }
        let mut id = format_public_id(public_id);
        if let Some(fmt) = self.format.as_deref() {
            id = format!("{id}.{fmt}");
        }
        components.push(id);
        Ok(components.join(":"))
    }
}

/// Video overlay: `video:public_id`. Videos carry no format or delivery
/// type override.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoLayer {
    public_id: String,
}

impl VideoLayer {
    /// Layer over the video with the given public id
    pub fn new(public_id: impl Into<String>) -> Self {
        Self {
            public_id: public_id.into(),
        }
    }

    fn compile(&self) -> Result<String> {
        if self.public_id.is_empty() {
            return Err(MediaError::InvalidLayer(
                "video layer requires a public id".into(),
            ));
        }
        Ok(format!("video:{}", format_public_id(&self.public_id)))
    }
}

/// Font styling for text and subtitle layers.
///
/// Modifiers render in a fixed order after `family_size`; defaults
/// (`normal` weight/style, `none` decoration/stroke) are elided.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    font_family: Option<String>,
    font_size: u32,
    font_weight: Option<String>,
    font_style: Option<String>,
    text_decoration: Option<String>,
    text_align: Option<String>,
    stroke: Option<String>,
    letter_spacing: Option<f32>,
    line_spacing: Option<f32>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: None,
            font_size: 12,
            font_weight: None,
            font_style: None,
            text_decoration: None,
            text_align: None,
            stroke: None,
            letter_spacing: None,
            line_spacing: None,
        }
    }
}

impl TextStyle {
    /// `family_size[_mods]`, or `None` when no family and no modifiers are
    /// set (the font size alone is not emitted).
    fn identifier(&self) -> Result<Option<String>> {
        let mods = self.modifiers();
        match self.font_family.as_deref() {
            Some(family) => {
                let mut ident = format!("{}_{}", family, self.font_size);
                if !mods.is_empty() {
                    ident.push('_');
                    ident.push_str(&mods.join("_"));
                }
                Ok(Some(ident))
            }
            None if mods.is_empty() => Ok(None),
            None => Err(MediaError::InvalidLayer(
                "text style modifiers require a font family".into(),
            )),
        }
    }

    fn modifiers(&self) -> Vec<String> {
        let mut mods = Vec::new();
        if let Some(w) = self.font_weight.as_deref()
            && w != "normal"
        {
            mods.push(w.to_string());
        }
        if let Some(s) = self.font_style.as_deref()
            && s != "normal"
        {
            mods.push(s.to_string());
        }
        if let Some(d) = self.text_decoration.as_deref()
            && d != "none"
        {
            mods.push(d.to_string());
        }
        if let Some(a) = self.text_align.as_deref() {
            mods.push(a.to_string());
        }
        if let Some(s) = self.stroke.as_deref()
            && s != "none"
        {
            mods.push(s.to_string());
        }
        if let Some(v) = self.letter_spacing {
            mods.push(format!("letter_spacing_{}", trim_float(v)));
        }
        if let Some(v) = self.line_spacing {
            mods.push(format!("line_spacing_{}", trim_float(v)));
        }
        mods
    }
}

macro_rules! text_style_setters {
    ($target:ident) => {
        impl $target {
            /// Font family, required once any other style modifier is set
            pub fn font_family(mut self, family: impl Into<String>) -> Self {
                self.style.font_family = Some(family.into());
                self
            }

            /// Font size in points (default 12)
            pub fn font_size(mut self, size: u32) -> Self {
                self.style.font_size = size;
                self
            }

            /// Font weight (`bold`, ...); `normal` is elided
            pub fn font_weight(mut self, weight: impl Into<String>) -> Self {
                self.style.font_weight = Some(weight.into());
                self
            }

            /// Font style (`italic`, ...); `normal` is elided
            pub fn font_style(mut self, style: impl Into<String>) -> Self {
                self.style.font_style = Some(style.into());
                self
            }

            /// Text decoration (`underline`, `strikethrough`); `none` is elided
            pub fn text_decoration(mut self, decoration: impl Into<String>) -> Self {
                self.style.text_decoration = Some(decoration.into());
                self
            }

            /// Text alignment (`left`, `center`, ...)
            pub fn text_align(mut self, align: impl Into<String>) -> Self {
                self.style.text_align = Some(align.into());
                self
            }

            /// Stroke rendering (`stroke`); `none` is elided
            pub fn stroke(mut self, stroke: impl Into<String>) -> Self {
                self.style.stroke = Some(stroke.into());
                self
            }

            /// Spacing between letters, in pixels
            pub fn letter_spacing(mut self, spacing: f32) -> Self {
                self.style.letter_spacing = Some(spacing);
                self
            }

            /// Spacing between lines, in pixels
            pub fn line_spacing(mut self, spacing: f32) -> Self {
                self.style.line_spacing = Some(spacing);
                self
            }
        }
    };
}

/// Text overlay: `text:style:public_id:encoded_text`, empty parts omitted.
///
/// Either literal text or a public id (a stored text resource) must be
/// supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayer {
    text: Option<String>,
    public_id: Option<String>,
    style: TextStyle,
}

impl TextLayer {
    /// Layer with literal text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Layer referencing a stored text resource
    pub fn from_public_id(public_id: impl Into<String>) -> Self {
        Self {
            public_id: Some(public_id.into()),
            ..Self::default()
        }
    }

    fn compile(&self) -> Result<String> {
        let text = self.text.as_deref().filter(|t| !t.is_empty());
        let public_id = self.public_id.as_deref().filter(|id| !id.is_empty());
        if text.is_none() && public_id.is_none() {
            return Err(MediaError::InvalidLayer(
                "text layer requires either literal text or a public id".into(),
            ));
        }

        let mut components = vec!["text".to_string()];
        if let Some(style) = self.style.identifier()? {
            components.push(style);
        }
        if let Some(id) = public_id {
            components.push(format_public_id(id));
        }
        if let Some(text) = text {
            components.push(encode_overlay_text(text));
        }
        Ok(components.join(":"))
    }
}

text_style_setters!(TextLayer);

/// Subtitle overlay: a stored subtitle file with optional text styling,
/// pinned to the `subtitles` resource type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitlesLayer {
    public_id: Option<String>,
    style: TextStyle,
}

impl SubtitlesLayer {
    /// Layer over the subtitle file with the given public id
    pub fn new(public_id: impl Into<String>) -> Self {
        Self {
            public_id: Some(public_id.into()),
            ..Self::default()
        }
    }

    fn compile(&self) -> Result<String> {
        let public_id = self
            .public_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                MediaError::InvalidLayer("subtitles layer requires a public id".into())
            })?;

        let mut components = vec!["subtitles".to_string()];
        if let Some(style) = self.style.identifier()? {
            components.push(style);
        }
        components.push(format_public_id(public_id));
        Ok(components.join(":"))
    }
}

text_style_setters!(SubtitlesLayer);

/// Folder separators inside a layer reference use `:`, not `/`.
fn format_public_id(public_id: &str) -> String {
    public_id.replace('/', ":")
}

/// Encode literal overlay text for embedding in a URL path.
///
/// URL-encodes the string, then applies substitutions in this exact
/// order: restore the slashes and colons the encoder escaped, re-encode
/// spaces, and defuse raw `,` and `/` (which the outer grammar reserves)
/// into typographic lookalikes (U+201A and U+2044).
pub fn encode_overlay_text(text: &str) -> String {
    urlencoding::encode(text)
        .replace("%2F", "/")
        .replace("%3A", ":")
        .replace('+', "%20")
        .replace("%2C", "%E2%80%9A")
        .replace('/', "%E2%81%84")
}

fn trim_float(v: f32) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_layer_elides_defaults() {
        let l = ImageLayer::new("badge");
        assert_eq!(l.compile().unwrap(), "badge");

        let l = ImageLayer::new("badge")
            .resource_type("image")
            .delivery_type("upload");
        assert_eq!(l.compile().unwrap(), "badge");
    }

    #[test]
    fn image_layer_emits_non_default_types_and_format() {
        let l = ImageLayer::new("docs/badge")
            .resource_type("raw")
            .delivery_type("fetch")
            .format("png");
        assert_eq!(l.compile().unwrap(), "raw:fetch:docs:badge.png");
    }

    #[test]
    fn image_layer_requires_public_id() {
        let err = ImageLayer::default().compile().unwrap_err();
        assert!(err.to_string().contains("public id"));
    }

    #[test]
    fn text_layer_with_family_and_size() {
        let l = TextLayer::new("Hello").font_size(18).font_family("Arial");
        assert_eq!(l.compile().unwrap(), "text:Arial_18:Hello");
    }

    #[test]
    fn text_layer_without_style_omits_size() {
        // Font size alone does not produce a style identifier.
        let l = TextLayer::new("Hello").font_size(40);
        assert_eq!(l.compile().unwrap(), "text:Hello");
    }

    #[test]
    fn text_layer_modifier_order_is_fixed() {
        let l = TextLayer::new("Hi")
            .line_spacing(1.5)
            .text_decoration("underline")
            .font_weight("bold")
            .font_family("Verdana")
            .font_size(20)
            .letter_spacing(2.0);
        assert_eq!(
            l.compile().unwrap(),
            "text:Verdana_20_bold_underline_letter_spacing_2_line_spacing_1.5:Hi"
        );
    }

    #[test]
    fn text_layer_normal_weight_is_elided() {
        let l = TextLayer::new("Hi")
            .font_family("Arial")
            .font_size(14)
            .font_weight("normal")
            .font_style("italic");
        assert_eq!(l.compile().unwrap(), "text:Arial_14_italic:Hi");
    }

    #[test]
    fn modifiers_without_family_are_rejected() {
        let err = TextLayer::new("Hi").font_weight("bold").compile().unwrap_err();
        assert!(err.to_string().contains("font family"));
    }

    #[test]
    fn text_layer_requires_text_or_public_id() {
        assert!(TextLayer::default().compile().is_err());
        let l = TextLayer::from_public_id("snippets/greeting");
        assert_eq!(l.compile().unwrap(), "text:snippets:greeting");
    }

    #[test]
    fn text_layer_emits_public_id_before_text() {
        let l = TextLayer::new("caption");
        let l = TextLayer {
            public_id: Some("snippets/base".into()),
            ..l
        };
        assert_eq!(l.compile().unwrap(), "text:snippets:base:caption");

        // Empty strings count as absent, not as empty components.
        let l = TextLayer {
            text: Some(String::new()),
            public_id: Some("snippets/base".into()),
            ..TextLayer::default()
        };
        assert_eq!(l.compile().unwrap(), "text:snippets:base");
    }

    #[test]
    fn overlay_text_defuses_reserved_delimiters() {
        assert_eq!(encode_overlay_text("a,b"), "a%E2%80%9Ab");
        assert_eq!(encode_overlay_text("a/b"), "a%E2%81%84b");
        assert_eq!(encode_overlay_text("a:b"), "a:b");
        assert_eq!(encode_overlay_text("Flowers & Colors"), "Flowers%20%26%20Colors");
    }

    #[test]
    fn subtitles_layer_pins_resource_type() {
        let l = SubtitlesLayer::new("sample_sub_en.srt")
            .font_family("Arial")
            .font_size(40);
        assert_eq!(l.compile().unwrap(), "subtitles:Arial_40:sample_sub_en.srt");
    }
}
