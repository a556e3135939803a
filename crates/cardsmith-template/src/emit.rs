use crate::error::ExecError;

/// Append-only output buffer for one template execution, plus the
/// single-slot pending-attribute state used while an attribute value is
/// being assembled from literal and computed fragments.
///
/// Protocol misuse (a chunk or end with no slot open, a begin while one
/// is) is a fault in the compiled unit, not in card data, so it surfaces
/// as an error instead of panicking the generation run.
#[derive(Debug, Default)]
pub struct Emitter {
    out: String,
    pending: Option<String>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends template-authored markup verbatim.
    pub fn write_literal(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// Appends computed text with markup-special characters escaped.
    /// Writing an empty string is a no-op.
    pub fn write_escaped(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        escape_into(&mut self.out, text);
    }

    /// Opens an attribute slot. `prefix` is the literal markup from the
    /// space before the attribute name through the opening quote.
    pub fn begin_attribute(&mut self, name: &str, prefix: &str) -> Result<(), ExecError> {
        if let Some(open) = &self.pending {
            return Err(ExecError::new(format!(
                "attribute '{name}' opened while attribute '{open}' is still open"
            )));
        }
        self.pending = Some(name.to_string());
        self.out.push_str(prefix);
        Ok(())
    }

    /// Appends one fragment of the open attribute's value. Literal
    /// fragments are written verbatim, computed ones escaped.
    pub fn attribute_chunk(&mut self, value: &str, is_literal: bool) -> Result<(), ExecError> {
        if self.pending.is_none() {
            return Err(ExecError::new("attribute fragment written with no attribute open"));
        }
        if is_literal {
            self.out.push_str(value);
        } else {
            self.write_escaped(value);
        }
        Ok(())
    }

    /// Closes the open attribute slot, writing the closing quote.
    pub fn end_attribute(&mut self, suffix: &str) -> Result<(), ExecError> {
        if self.pending.take().is_none() {
            return Err(ExecError::new("attribute closed with no attribute open"));
        }
        self.out.push_str(suffix);
        Ok(())
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// The five markup-special characters, matching the record serializer.
fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
}
