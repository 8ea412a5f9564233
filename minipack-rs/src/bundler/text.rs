//! Built-in text transforms.
//!
//! These are the transforms a configuration file can name in a rule's `use`
//! list without registering anything from code. Most of them turn a file's text
//! into a CommonJS module body.

use std::collections::HashMap;

use anyhow::Context;

/// Signature shared by the built-in transforms.
pub type BuiltinTransform = fn(&str) -> anyhow::Result<String>;

lazy_static! {
    pub static ref BUILTIN_TRANSFORMS: HashMap<&'static str, BuiltinTransform> = {
        let mut map: HashMap<&'static str, BuiltinTransform> = HashMap::new();
        map.insert("strip-bom", strip_bom_transform);
        map.insert("json", transform_json_source);
        map.insert("raw", transform_raw_source);
        map.insert("style", transform_style_source);
        map.insert("uppercase", uppercase);
        map
    };
}

/// Strips the UTF-8 BOM (byte order mark) from the beginning of text if present.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}

fn strip_bom_transform(text: &str) -> anyhow::Result<String> {
    Ok(strip_bom(text).to_string())
}

/// Transforms JSON source into a module that exports the parsed value.
///
/// # Example
/// ```ignore
/// // Input: {"key": "value"}
/// // Output: module.exports = JSON.parse("{\"key\": \"value\"}");
/// ```
pub fn transform_json_source(source: &str) -> anyhow::Result<String> {
    let source = strip_bom(source);
    serde_json::from_str::<serde_json::Value>(source).context("invalid JSON")?;
    Ok(format!("module.exports = JSON.parse({});", quote(source)?))
}

/// Exports the file contents as a string.
pub fn transform_raw_source(source: &str) -> anyhow::Result<String> {
    Ok(format!("module.exports = {};", quote(source)?))
}

/// Injects the file contents into the document as a `<style>` element.
pub fn transform_style_source(source: &str) -> anyhow::Result<String> {
    Ok(format!(
        "var style = document.createElement(\"style\");\n\
         style.textContent = {};\n\
         document.head.appendChild(style);\n\
         module.exports = style;",
        quote(source)?
    ))
}

pub fn uppercase(source: &str) -> anyhow::Result<String> {
    Ok(source.to_uppercase())
}

/// Quotes text as a JavaScript string literal.
pub fn quote(text: &str) -> anyhow::Result<String> {
    Ok(serde_json::to_string(text)?)
}
