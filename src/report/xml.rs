//! # Report document building blocks.
//!
//! A small element tree plus the text rules the report format demands:
//!
//! - every `time` value renders as fixed-point with exactly three fractional
//!   digits, `.` separator regardless of host locale, midpoints rounded away
//!   from zero;
//! - control characters 0x00-0x1F render as two-character hex escapes
//!   (`\xHH`) except the conventional escapes `\0 \a \b \t \n \v \f \r`;
//! - UTF-16 code units that are not part of a valid surrogate pair render as
//!   `\xHHHH`, valid pairs pass through unescaped.
//!
//! Escaping happens here, at serialization time, never at event capture
//! time, so in-memory event data keeps full fidelity for other consumers.
//! Strict document parsers reject raw control bytes and unpaired surrogates;
//! the escapes keep the document loadable.

/// One element in the report document.
pub(crate) struct XmlElement {
    name: &'static str,
    attrs: Vec<(&'static str, String)>,
    children: Vec<XmlNode>,
}

pub(crate) enum XmlNode {
    Element(XmlElement),
    CData(String),
}

impl XmlElement {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Appends an attribute. Values are entity-escaped at render time; free
    /// text must already be escaped via [`escape_text`].
    pub fn attr(&mut self, name: &'static str, value: impl Into<String>) -> &mut Self {
        self.attrs.push((name, value.into()));
        self
    }

    pub fn child(&mut self, element: XmlElement) -> &mut Self {
        self.children.push(XmlNode::Element(element));
        self
    }

    /// Appends a CDATA text child (already escaped via [`escape_text`]).
    pub fn cdata(&mut self, text: impl Into<String>) -> &mut Self {
        self.children.push(XmlNode::CData(text.into()));
        self
    }

    /// Renders the whole document: declaration plus this element, single
    /// line, no indentation.
    pub fn to_document(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>");
        self.render(&mut out);
        out
    }

    pub fn render(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.name);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            entity_escape(out, value);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.render(out),
                XmlNode::CData(text) => write_cdata(out, text),
            }
        }
        out.push_str("</");
        out.push_str(self.name);
        out.push('>');
    }
}

fn entity_escape(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Writes a CDATA section, splitting any `]]>` inside the text across two
/// sections so the document stays well-formed.
fn write_cdata(out: &mut String, text: &str) {
    out.push_str("<![CDATA[");
    let mut rest = text;
    while let Some(pos) = rest.find("]]>") {
        out.push_str(&rest[..pos + 2]);
        out.push_str("]]><![CDATA[");
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out.push_str("]]>");
}

/// Renders a duration in seconds with exactly three fractional digits and a
/// `.` separator, midpoints rounded away from zero.
pub(crate) fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "0.000".to_string();
    }
    // f64::round rounds half away from zero.
    let millis = (seconds.abs() * 1000.0).round() as u64;
    let sign = if seconds < 0.0 && millis > 0 { "-" } else { "" };
    format!("{sign}{}.{:03}", millis / 1000, millis % 1000)
}

/// Escapes free text for the report document.
///
/// `escape_newlines` is `true` for every field except stack traces, where
/// `\r` and `\n` pass through raw.
pub(crate) fn escape_text(text: &str, escape_newlines: bool) -> String {
    let units: Vec<u16> = text.encode_utf16().collect();
    escape_utf16(&units, escape_newlines)
}

/// Escapes a UTF-16 code unit sequence for the report document.
///
/// This is the entry point for text that arrives from foreign producers and
/// may contain unpaired surrogates, which safe strings cannot carry.
pub(crate) fn escape_utf16(units: &[u16], escape_newlines: bool) -> String {
    let mut out = String::with_capacity(units.len());
    let mut i = 0;
    while i < units.len() {
        let unit = units[i];
        let is_high = (0xD800..=0xDBFF).contains(&unit);
        let is_low = (0xDC00..=0xDFFF).contains(&unit);

        if is_high && i + 1 < units.len() && (0xDC00..=0xDFFF).contains(&units[i + 1]) {
            let code = 0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(units[i + 1]) - 0xDC00);
            // A valid pair always decodes to a scalar value.
            if let Some(ch) = char::from_u32(code) {
                out.push(ch);
            }
            i += 2;
            continue;
        }
        if is_high || is_low {
            out.push_str(&format!("\\x{unit:04x}"));
            i += 1;
            continue;
        }

        match char::from_u32(u32::from(unit)) {
            Some(ch) => escape_char(&mut out, ch, escape_newlines),
            None => out.push_str(&format!("\\x{unit:04x}")),
        }
        i += 1;
    }
    out
}

fn escape_char(out: &mut String, ch: char, escape_newlines: bool) {
    match ch {
        '\0' => out.push_str("\\0"),
        '\u{07}' => out.push_str("\\a"),
        '\u{08}' => out.push_str("\\b"),
        '\t' => out.push_str("\\t"),
        '\n' if escape_newlines => out.push_str("\\n"),
        '\u{0B}' => out.push_str("\\v"),
        '\u{0C}' => out.push_str("\\f"),
        '\r' if escape_newlines => out.push_str("\\r"),
        '\n' | '\r' => out.push(ch),
        ch if (ch as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", ch as u32)),
        ch => out.push(ch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_characters_escape_exactly() {
        let input: String = (0u32..32).map(|c| char::from_u32(c).unwrap()).collect();
        assert_eq!(
            escape_text(&input, true),
            "\\0\\x01\\x02\\x03\\x04\\x05\\x06\\a\\b\\t\\n\\v\\f\\r\\x0e\\x0f\\x10\\x11\\x12\\x13\\x14\\x15\\x16\\x17\\x18\\x19\\x1a\\x1b\\x1c\\x1d\\x1e\\x1f"
        );
    }

    #[test]
    fn test_newlines_pass_through_when_not_escaped() {
        assert_eq!(escape_text("a\r\nb\tc", false), "a\r\nb\\tc");
        assert_eq!(escape_text("a\r\nb\tc", true), "a\\r\\nb\\tc");
    }

    #[test]
    fn test_unpaired_surrogates_escape() {
        assert_eq!(escape_utf16(&[0xD800], true), "\\xd800");
        assert_eq!(escape_utf16(&[0xDC00], true), "\\xdc00");

        // "\xd800 Hello.World \xdc00" with lone surrogates at both ends.
        let mut units = vec![0xD800];
        units.extend(" Hello.World ".encode_utf16());
        units.push(0xDC00);
        assert_eq!(escape_utf16(&units, true), "\\xd800 Hello.World \\xdc00");
    }

    #[test]
    fn test_valid_surrogate_pairs_pass_through() {
        // D800/DFFF and DA00/DD00 are valid pairs.
        let units = [0xD800, 0xDFFF, 0x20, 0xDA00, 0xDD00];
        let escaped = escape_utf16(&units, true);
        assert_eq!(escaped, "\u{103FF} \u{90100}");
    }

    #[test]
    fn test_time_three_digits_away_from_zero() {
        assert_eq!(format_time(123.4567809), "123.457");
        assert_eq!(format_time(0.0), "0.000");
        assert_eq!(format_time(0.0005), "0.001");
        assert_eq!(format_time(2.0), "2.000");
        assert_eq!(format_time(-1.2345), "-1.235");
        assert_eq!(format_time(f64::NAN), "0.000");
    }

    #[test]
    fn test_empty_element_self_closes() {
        let errors = XmlElement::new("errors");
        let mut out = String::new();
        errors.render(&mut out);
        assert_eq!(out, "<errors />");
    }

    #[test]
    fn test_attribute_entity_escaping() {
        let mut el = XmlElement::new("test");
        el.attr("name", "a<b>&\"c\"");
        let mut out = String::new();
        el.render(&mut out);
        assert_eq!(out, "<test name=\"a&lt;b&gt;&amp;&quot;c&quot;\" />");
    }

    #[test]
    fn test_cdata_split_keeps_document_well_formed() {
        let mut el = XmlElement::new("output");
        el.cdata("a]]>b");
        let mut out = String::new();
        el.render(&mut out);
        assert_eq!(out, "<output><![CDATA[a]]]]><![CDATA[>b]]></output>");
    }

    #[test]
    fn test_document_has_declaration_and_single_line() {
        let mut root = XmlElement::new("assembly");
        root.attr("total", "0");
        root.child(XmlElement::new("errors"));
        assert_eq!(
            root.to_document(),
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><assembly total=\"0\"><errors /></assembly>"
        );
    }
}
