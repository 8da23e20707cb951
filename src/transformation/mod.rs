//! Transformation Compiler
//!
//! A [`Transformation`] is an ordered stack of parameter segments. Each
//! segment maps short parameter keys (`w`, `h`, `c`, `e`, ...) to values;
//! [`Transformation::chain`] closes the current segment and starts the
//! next. [`Transformation::generate`] renders each segment as its
//! comma-joined tokens and joins segments with `/`, producing the string
//! embedded into delivery URLs and upload parameters.
//!
//! Per-segment token order is part of the wire contract:
//!
//! 1. explicitly named variables, sorted lexicographically,
//! 2. bulk-declared variables, in call order,
//! 3. remaining parameters, sorted by key.
//!
//! All state is owned (no shared child references), so `Clone` is a deep
//! structural copy and a clone never observes later mutation of the
//! original.

pub mod layer;

use std::collections::BTreeMap;

use base64::Engine;

use crate::error::{MediaError, Result};
use crate::expression::Expression;

pub use layer::{ImageLayer, Layer, SubtitlesLayer, TextLayer, VideoLayer};

/// A parameter value inside one transformation segment
#[derive(Debug, Clone, PartialEq)]
pub enum TransformValue {
    /// Verbatim string, emitted as-is
    Str(String),
    /// Integer, invariant formatting
    Int(i64),
    /// Float, invariant formatting with trailing zeros trimmed
    Float(f64),
    /// List of values, dot-joined
    List(Vec<String>),
    /// Overlay/underlay layer sub-expression
    Layer(Box<Layer>),
    /// A nested transformation rendered recursively
    Nested(Box<Transformation>),
    /// Dictionary value (codec options and similar), `k_v` pairs colon-joined
    Map(BTreeMap<String, String>),
}

impl TransformValue {
    fn render(&self) -> Result<String> {
        match self {
            Self::Str(s) => Ok(s.clone()),
            Self::Int(i) => Ok(i.to_string()),
            Self::Float(f) => Ok(trim_float(*f)),
            Self::List(items) => Ok(items.join(".")),
            Self::Layer(layer) => layer.compile(),
            Self::Nested(t) => t.generate(),
            Self::Map(map) => Ok(map
                .iter()
                .map(|(k, v)| format!("{k}_{v}"))
                .collect::<Vec<_>>()
                .join(":")),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Str(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for TransformValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for TransformValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for TransformValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for TransformValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for TransformValue {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for TransformValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<Layer> for TransformValue {
    fn from(l: Layer) -> Self {
        Self::Layer(Box::new(l))
    }
}

impl From<Transformation> for TransformValue {
    fn from(t: Transformation) -> Self {
        Self::Nested(Box::new(t))
    }
}

/// The value bound to a declared variable
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// Expression, normalized at generation time
    Expr(String),
}

impl VarValue {
    fn render(&self) -> Result<String> {
        match self {
            Self::Int(i) => Ok(i.to_string()),
            Self::Float(f) => Ok(trim_float(*f)),
            Self::Expr(e) => Expression::normalize(e),
        }
    }
}

impl From<i64> for VarValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for VarValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for VarValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for VarValue {
    fn from(s: &str) -> Self {
        Self::Expr(s.to_string())
    }
}

impl From<String> for VarValue {
    fn from(s: String) -> Self {
        Self::Expr(s)
    }
}

impl From<Expression> for VarValue {
    fn from(e: Expression) -> Self {
        Self::Expr(e.compile())
    }
}

/// A named variable declaration, `$name` bound to a literal or expression
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    name: String,
    value: VarValue,
}

impl Var {
    /// Bind `$name` to a value; the `$` prefix is added when missing
    pub fn new(name: &str, value: impl Into<VarValue>) -> Self {
        let name = name.strip_prefix('$').unwrap_or(name);
        Self {
            name: format!("${name}"),
            value: value.into(),
        }
    }

    fn render(&self) -> Result<String> {
        Ok(format!("{}_{}", self.name, self.value.render()?))
    }
}

/// A user-defined function applied server-side via the `fn` parameter
#[derive(Debug, Clone, PartialEq)]
pub enum CustomFunction {
    /// A WASM function stored as a raw resource
    Wasm(String),
    /// A remote HTTP endpoint, base64url-encoded on the wire
    Remote(String),
}

impl CustomFunction {
    fn render(&self) -> String {
        match self {
            Self::Wasm(id) => format!("wasm:{id}"),
            Self::Remote(url) => format!(
                "remote:{}",
                base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(url.as_bytes())
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CondState {
    None,
    If,
    Else,
    End,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ParamSegment {
    params: BTreeMap<String, TransformValue>,
    named_vars: Vec<Var>,
    bulk_vars: Vec<Var>,
}

impl ParamSegment {
    fn is_empty(&self) -> bool {
        self.params.is_empty() && self.named_vars.is_empty() && self.bulk_vars.is_empty()
    }

    fn render(&self) -> Result<String> {
        let mut tokens = Vec::new();
        let mut named = self.named_vars.clone();
        named.sort_by(|a, b| a.name.cmp(&b.name));
        for var in &named {
            tokens.push(var.render()?);
        }
        for var in &self.bulk_vars {
            tokens.push(var.render()?);
        }
        for (key, value) in &self.params {
            if value.is_empty() {
                continue;
            }
            tokens.push(format!("{}_{}", key, value.render()?));
        }
        Ok(tokens.join(","))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Params(ParamSegment),
    /// A condition pseudo-segment: `if_<expr>`, `if_else` or `if_end`
    Marker(String),
}

impl Segment {
    fn render(&self) -> Result<String> {
        match self {
            Self::Params(seg) => seg.render(),
            Self::Marker(m) => Ok(m.clone()),
        }
    }
}

/// An ordered, chainable stack of transformation parameter segments.
///
/// ```
/// use mediaflow::transformation::Transformation;
///
/// let t = Transformation::new()
///     .width(300)
///     .height(200)
///     .crop("fill")
///     .chain()
///     .effect("sepia");
/// assert_eq!(t.generate().unwrap(), "c_fill,h_200,w_300/e_sepia");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Transformation {
    segments: Vec<Segment>,
    current: ParamSegment,
    cond_state: CondState,
}

impl Default for Transformation {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformation {
    /// An empty transformation
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            current: ParamSegment::default(),
            cond_state: CondState::None,
        }
    }

    /// Set an arbitrary parameter by its short key. Ad-hoc parameters
    /// bypass validation and are emitted verbatim.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<TransformValue>) -> Self {
        self.current.params.insert(key.into(), value.into());
        self
    }

    /// Close the current segment and start a new one
    pub fn chain(mut self) -> Self {
        self.flush_current();
        self
    }

    // -- sizing and placement ------------------------------------------------

    /// Target width; accepts a number, `auto`, or an expression string
    pub fn width(self, w: impl Into<TransformValue>) -> Self {
        self.param("w", w)
    }

    /// Target height
    pub fn height(self, h: impl Into<TransformValue>) -> Self {
        self.param("h", h)
    }

    /// Crop mode (`fill`, `fit`, `scale`, ...)
    pub fn crop(self, mode: impl Into<String>) -> Self {
        self.param("c", mode.into())
    }

    /// Gravity for cropping and overlay placement
    pub fn gravity(self, g: impl Into<String>) -> Self {
        self.param("g", g.into())
    }

    /// Horizontal offset
    pub fn x(self, x: impl Into<TransformValue>) -> Self {
        self.param("x", x)
    }

    /// Vertical offset
    pub fn y(self, y: impl Into<TransformValue>) -> Self {
        self.param("y", y)
    }

    /// Rotation angle in degrees, or a mode such as `auto_right`
    pub fn angle(self, a: impl Into<TransformValue>) -> Self {
        self.param("a", a)
    }

    /// Corner radius, or `max` for a circular crop
    pub fn radius(self, r: impl Into<TransformValue>) -> Self {
        self.param("r", r)
    }

    /// Device pixel ratio
    pub fn dpr(self, dpr: impl Into<TransformValue>) -> Self {
        self.param("dpr", dpr)
    }

    /// Zoom factor applied to face/custom-gravity crops
    pub fn zoom(self, z: impl Into<TransformValue>) -> Self {
        self.param("z", z)
    }

    // -- appearance ----------------------------------------------------------

    /// Effect filter, e.g. `sepia` or `blur:300`
    pub fn effect(self, e: impl Into<String>) -> Self {
        self.param("e", e.into())
    }

    /// Opacity, 0-100
    pub fn opacity(self, o: impl Into<TransformValue>) -> Self {
        self.param("o", o)
    }

    /// Delivery quality, e.g. `80` or `auto:eco`
    pub fn quality(self, q: impl Into<TransformValue>) -> Self {
        self.param("q", q)
    }

    /// Delivery format conversion (`f_` parameter)
    pub fn fetch_format(self, f: impl Into<String>) -> Self {
        self.param("f", f.into())
    }

    /// Set delivery flags, dot-joined on the wire
    pub fn flags(self, flags: &[&str]) -> Self {
        self.param(
            "fl",
            TransformValue::List(flags.iter().map(|f| f.to_string()).collect()),
        )
    }

    /// Apply a named (stored) transformation
    pub fn named(self, name: impl Into<String>) -> Self {
        self.param("t", name.into())
    }

    // -- layers --------------------------------------------------------------

    /// Place a layer on top of the base resource
    pub fn overlay(self, layer: impl Into<Layer>) -> Self {
        self.param("l", layer.into())
    }

    /// Place a layer underneath the base resource
    pub fn underlay(self, layer: impl Into<Layer>) -> Self {
        self.param("u", layer.into())
    }

    // -- video ---------------------------------------------------------------

    /// Frame-rate constraint. `fps(Some(24.0), Some(29.97))` renders as
    /// `fps_24-29.97`; an open lower bound renders as `fps_-29.97`.
    pub fn fps(self, min: Option<f64>, max: Option<f64>) -> Self {
        let value = match (min, max) {
            (None, None) => return self,
            (Some(min), None) => trim_float(min),
            (Some(min), Some(max)) => format!("{}-{}", trim_float(min), trim_float(max)),
            (None, Some(max)) => format!("-{}", trim_float(max)),
        };
        self.param("fps", value)
    }

    /// Trim range given as `start..end`; values may be seconds (`2.66`) or
    /// percentages (`10%`, normalized to `10p`)
    pub fn offset(self, range: &str) -> Result<Self> {
        let (start, end) = range.split_once("..").ok_or_else(|| {
            MediaError::InvalidTransformation(format!("offset range `{range}` must be `start..end`"))
        })?;
        Ok(self
            .start_offset(start.trim())
            .end_offset(end.trim()))
    }

    /// Trim range given as a numeric pair of seconds
    pub fn offset_range(self, start: f64, end: f64) -> Self {
        self.param("so", trim_float(start)).param("eo", trim_float(end))
    }

    /// Where playback starts (`so`); `%` suffix is normalized to `p`
    pub fn start_offset(self, offset: impl Into<TransformValue>) -> Self {
        self.param("so", normalize_range_value(offset.into()))
    }

    /// Where playback ends (`eo`); `%` suffix is normalized to `p`
    pub fn end_offset(self, offset: impl Into<TransformValue>) -> Self {
        self.param("eo", normalize_range_value(offset.into()))
    }

    /// Clip duration (`du`); `%` suffix is normalized to `p`
    pub fn duration(self, duration: impl Into<TransformValue>) -> Self {
        self.param("du", normalize_range_value(duration.into()))
    }

    /// Keyframe interval in seconds. Must be strictly positive; a numeric
    /// value always renders with at least one fractional digit (`ki_2.0`).
    /// Use [`Transformation::param`] with a string to pass a caller-crafted
    /// value through verbatim.
    pub fn keyframe_interval(self, interval: f64) -> Result<Self> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(MediaError::validation(
                "keyframe_interval",
                "must be a positive number",
            ));
        }
        Ok(self.param("ki", format_fractional(interval)))
    }

    /// Video codec with optional profile and level, colon-joined in that
    /// fixed order (`vc_h264:baseline:3.1`)
    pub fn video_codec(
        self,
        codec: impl Into<String>,
        profile: Option<&str>,
        level: Option<&str>,
    ) -> Self {
        let mut value = codec.into();
        if let Some(profile) = profile {
            value = format!("{value}:{profile}");
            if let Some(level) = level {
                value = format!("{value}:{level}");
            }
        }
        self.param("vc", value)
    }

    /// Target bit rate, e.g. `500k` or a plain number of bits per second
    pub fn bit_rate(self, rate: impl Into<TransformValue>) -> Self {
        self.param("br", rate)
    }

    /// Predefined streaming profile (`sp`)
    pub fn streaming_profile(self, profile: impl Into<String>) -> Self {
        self.param("sp", profile.into())
    }

    /// Audio codec (`ac`)
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.param("ac", codec.into())
    }

    /// Server-side custom function (`fn`), WASM or remote
    pub fn custom_function(self, function: CustomFunction) -> Self {
        self.param("fn", function.render())
    }

    // -- variables -----------------------------------------------------------

    /// Declare a single named variable. Named declarations are collected
    /// and emitted first in the segment, sorted by name.
    pub fn variable(mut self, name: &str, value: impl Into<VarValue>) -> Self {
        self.current.named_vars.push(Var::new(name, value));
        self
    }

    /// Declare variables in bulk. Bulk declarations keep call order and
    /// are emitted after the sorted named block.
    pub fn variables(mut self, vars: impl IntoIterator<Item = Var>) -> Self {
        self.current.bulk_vars.extend(vars);
        self
    }

    // -- conditions ----------------------------------------------------------

    /// Open a conditional block. The condition is normalized through the
    /// expression language and emitted as an `if_<expr>` pseudo-segment;
    /// subsequent parameters apply only when it holds.
    pub fn if_condition(mut self, condition: impl AsRef<str>) -> Result<Self> {
        if self.cond_state == CondState::If || self.cond_state == CondState::Else {
            return Err(MediaError::InvalidTransformation(
                "nested if_condition: close the open condition with end_if first".into(),
            ));
        }
        let compiled = Expression::normalize(condition.as_ref())?;
        self.flush_current();
        self.segments.push(Segment::Marker(format!("if_{compiled}")));
        self.cond_state = CondState::If;
        Ok(self)
    }

    /// Switch to the else-branch of the open conditional block
    pub fn if_else(mut self) -> Result<Self> {
        if self.cond_state != CondState::If {
            return Err(MediaError::InvalidTransformation(
                "if_else without an open if_condition".into(),
            ));
        }
        self.flush_current();
        self.segments.push(Segment::Marker("if_else".into()));
        self.cond_state = CondState::Else;
        Ok(self)
    }

    /// Close the open conditional block
    pub fn end_if(mut self) -> Result<Self> {
        if self.cond_state != CondState::If && self.cond_state != CondState::Else {
            return Err(MediaError::InvalidTransformation(
                "end_if without an open if_condition".into(),
            ));
        }
        self.flush_current();
        self.segments.push(Segment::Marker("if_end".into()));
        self.cond_state = CondState::End;
        Ok(self)
    }

    // -- generation ----------------------------------------------------------

    /// Compile the transformation to its URL path form. Compilation is
    /// read-only: generating twice yields byte-identical output and the
    /// builder stays reusable.
    pub fn generate(&self) -> Result<String> {
        if self.cond_state == CondState::If || self.cond_state == CondState::Else {
            return Err(MediaError::InvalidTransformation(
                "unterminated condition: missing end_if".into(),
            ));
        }
        let mut parts = Vec::with_capacity(self.segments.len() + 1);
        for segment in &self.segments {
            let rendered = segment.render()?;
            if !rendered.is_empty() {
                parts.push(rendered);
            }
        }
        if !self.current.is_empty() {
            parts.push(self.current.render()?);
        }
        Ok(parts.join("/"))
    }

    /// Whether nothing has been declared yet
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.current.is_empty()
    }

    fn flush_current(&mut self) {
        if !self.current.is_empty() {
            let seg = std::mem::take(&mut self.current);
            self.segments.push(Segment::Params(seg));
        }
    }
}

/// Invariant float formatting with trailing `.0` trimmed (`24.0` -> `24`)
fn trim_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Invariant float formatting with at least one fractional digit
/// (`2.0` -> `"2.0"`, `0.05` -> `"0.05"`)
fn format_fractional(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn normalize_range_value(value: TransformValue) -> TransformValue {
    match value {
        TransformValue::Str(s) => {
            if let Some(body) = s.strip_suffix('%') {
                TransformValue::Str(format!("{body}p"))
            } else {
                TransformValue::Str(s)
            }
        }
        other => other,
    }
}
