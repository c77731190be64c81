//! `{{ expr }}` interpolation over strings and nested props.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use super::context::Context;
use super::expression::ExpressionEvaluator;
use crate::value::Value;

lazy_static! {
    static ref SOLE_TEMPLATE: Regex = Regex::new(r"^\{\{([^{}]*)\}\}$").unwrap();
    static ref TEMPLATE_SPAN: Regex = Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap();
}

impl ExpressionEvaluator {
    /// Interpolates a string.
    ///
    /// A template that is exactly one `{{ expr }}` keeps the type of its
    /// result; when the result is undefined or the expression does not
    /// parse, the original text is returned so unresolved placeholders stay
    /// visible. Anything else renders every span left to right and always
    /// yields a string.
    pub fn interpolate_string(&self, template: &str, context: &Context) -> Value {
        if !template.contains("{{") {
            return Value::String(template.to_string());
        }

        if let Some(captures) = SOLE_TEMPLATE.captures(template.trim()) {
            let source = captures.get(1).map_or("", |m| m.as_str()).trim();
            return match self.evaluate(source, context) {
                Ok(Value::Undefined) => Value::String(template.to_string()),
                Ok(value) => value,
                Err(e) => {
                    warn!("Template '{}' left unresolved: {}", template, e);
                    Value::String(template.to_string())
                }
            };
        }

        let mut rendered = String::with_capacity(template.len());
        let mut last = 0;
        for captures in TEMPLATE_SPAN.captures_iter(template) {
            let Some(span) = captures.get(0) else {
                continue;
            };
            rendered.push_str(&template[last..span.start()]);
            let source = captures.get(1).map_or("", |m| m.as_str()).trim();
            match self.evaluate(source, context) {
                Ok(Value::Undefined) => {}
                Ok(value) => rendered.push_str(&value.to_display_string()),
                Err(e) => {
                    warn!("Template span '{}' left verbatim: {}", span.as_str(), e);
                    rendered.push_str(span.as_str());
                }
            }
            last = span.end();
        }
        rendered.push_str(&template[last..]);
        Value::String(rendered)
    }

    /// Interpolates every string leaf of a props tree. Other leaves are kept.
    pub fn interpolate_props(&self, props: &Value, context: &Context) -> Value {
        match props {
            Value::String(s) => self.interpolate_string(s, context),
            Value::Array(items) => Value::array(
                items
                    .iter()
                    .map(|item| self.interpolate_props(item, context))
                    .collect(),
            ),
            Value::Object(record) => Value::object(
                record
                    .iter()
                    .map(|(key, value)| (key.clone(), self.interpolate_props(value, context)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
