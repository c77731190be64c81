use tracing::warn;

use super::context::Context;
use super::expression::ExpressionEvaluator;

impl ExpressionEvaluator {
    /// Boolean evaluation of a visibility or `while` condition.
    ///
    /// An optional single `{{ }}` wrapper is stripped. Text that does not
    /// parse as a condition is looked up as a plain top-level key instead,
    /// so bare state-key names keep working.
    pub fn evaluate_condition(&self, source: &str, context: &Context) -> bool {
        let text = strip_template_wrapper(source);
        match self.compile_condition(text) {
            Ok(expression) => self.eval_expression(&expression, context).to_bool(),
            Err(e) => {
                warn!("Condition '{}' treated as a key lookup: {}", text, e);
                context.lookup(text).to_bool()
            }
        }
    }
}

fn strip_template_wrapper(source: &str) -> &str {
    let trimmed = source.trim();
    trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .filter(|inner| !inner.contains("{{") && !inner.contains("}}"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(source: &str, ctx: serde_json::Value) -> bool {
        ExpressionEvaluator::default().evaluate_condition(source, &Context::from(ctx))
    }

    #[test]
    fn test_boolean_grammar() {
        let ctx = json!({"count": 2, "running": true, "mode": "edit"});
        assert!(check("count < 3 && running", ctx.clone()));
        assert!(check("mode == 'edit' || missing", ctx.clone()));
        assert!(!check("!running", ctx.clone()));
        assert!(check("{{ count >= 2 }}", ctx));
    }

    #[test]
    fn test_truthiness_of_values() {
        assert!(!check("name", json!({"name": ""})));
        assert!(check("items", json!({"items": []})));
        assert!(!check("missing", json!({})));
    }

    #[test]
    fn test_unparseable_falls_back_to_key_lookup() {
        // arithmetic is outside the condition grammar
        assert!(check("a + b", json!({"a + b": true})));
        assert!(!check("a + b", json!({"a": 1, "b": 2})));
        assert!(check("show-panel", json!({"show-panel": 1})));
    }

    #[test]
    fn test_wrapper_stripping() {
        assert_eq!(strip_template_wrapper(" {{ a && b }} "), "a && b");
        assert_eq!(strip_template_wrapper("a && b"), "a && b");
        assert_eq!(strip_template_wrapper("{{ a }} {{ b }}"), "{{ a }} {{ b }}");
    }
}
