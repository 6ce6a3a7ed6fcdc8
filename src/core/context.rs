//! Ambient execution context carried by every log call
//!
//! A [`Context`] is the value handed to each write operation. The pipeline
//! reads correlation data from it; the default trace-id extractor returns the
//! W3C trace id of the span the context carries.

use rand::Rng;
use std::fmt;

/// 16-byte W3C trace id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TraceId([u8; 16]);

/// 8-byte W3C span id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpanId([u8; 8]);

impl TraceId {
    pub const INVALID: TraceId = TraceId([0; 16]);

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        TraceId(bytes)
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let mut bytes = [0u8; 16];
        decode_hex(hex, &mut bytes)?;
        Some(TraceId(bytes))
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl SpanId {
    pub const INVALID: SpanId = SpanId([0; 8]);

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        SpanId(bytes)
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let mut bytes = [0u8; 8];
        decode_hex(hex, &mut bytes)?;
        Some(SpanId(bytes))
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))
    }
}

fn decode_hex(hex: &str, out: &mut [u8]) -> Option<()> {
    if hex.len() != out.len() * 2 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(())
}

/// Identity of the span a log call happens in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub sampled: bool,
}

impl SpanContext {
    pub fn new(trace_id: TraceId, span_id: SpanId, sampled: bool) -> Self {
        Self {
            trace_id,
            span_id,
            sampled,
        }
    }

    /// Start a new trace with random, non-zero ids
    pub fn new_root() -> Self {
        let mut rng = rand::thread_rng();
        let mut trace = [0u8; 16];
        let mut span = [0u8; 8];
        loop {
            rng.fill(&mut trace);
            rng.fill(&mut span);
            let ctx = Self::new(TraceId(trace), SpanId(span), true);
            if ctx.is_valid() {
                return ctx;
            }
        }
    }

    /// Both ids must be non-zero
    pub fn is_valid(&self) -> bool {
        self.trace_id.is_valid() && self.span_id.is_valid()
    }

    /// Parse a W3C `traceparent` header value (`00-<trace>-<span>-<flags>`)
    pub fn from_traceparent(header: &str) -> Option<Self> {
        let mut parts = header.trim().split('-');
        let version = parts.next()?;
        let trace_id = TraceId::from_hex(parts.next()?)?;
        let span_id = SpanId::from_hex(parts.next()?)?;
        let flags = parts.next()?;
        let mut version_byte = [0u8; 1];
        decode_hex(version, &mut version_byte)?;
        if version_byte[0] == 0xff {
            return None;
        }
        // Version 00 has exactly four parts; later versions may append more.
        if version == "00" && parts.next().is_some() {
            return None;
        }
        let mut flags_byte = [0u8; 1];
        decode_hex(flags, &mut flags_byte)?;
        let ctx = Self::new(trace_id, span_id, flags_byte[0] & 0x01 == 0x01);
        ctx.is_valid().then_some(ctx)
    }

    pub fn to_traceparent(&self) -> String {
        format!(
            "00-{}-{}-{:02x}",
            self.trace_id,
            self.span_id,
            u8::from(self.sampled)
        )
    }
}

/// Ambient context passed to every write call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    span: Option<SpanContext>,
}

impl Context {
    /// Empty context with no correlation data
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_span(mut self, span: SpanContext) -> Self {
        self.span = Some(span);
        self
    }

    pub fn from_traceparent(header: &str) -> Option<Self> {
        SpanContext::from_traceparent(header).map(|span| Self::background().with_span(span))
    }

    pub fn span_context(&self) -> Option<&SpanContext> {
        self.span.as_ref()
    }
}

/// Default trace-id extractor: the hex trace id of a valid span, else empty
pub fn default_trace_id(ctx: &Context) -> String {
    match ctx.span_context() {
        Some(span) if span.is_valid() => span.trace_id.to_string(),
        _ => String::new(),
    }
}
