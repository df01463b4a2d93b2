//! Text entry into the focused element.

/// Input types that do not take free text.
const NON_TEXT_INPUTS: &str =
    "['button','checkbox','radio','submit','reset','file','image','hidden','range','color']";

/// Script that replaces the focused editable element's value with `text`
/// and fires `input` and `change`. Resolves to `false` when nothing
/// editable has focus.
pub fn type_text_script(text: &str) -> String {
    // JSON string literals are valid JS string literals.
    let literal = serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_owned());
    format!(
        "(() => {{ \
         const el = document.activeElement; \
         if (!el) return false; \
         const tag = el.tagName; \
         const editable = el.isContentEditable || tag === 'TEXTAREA' || \
         (tag === 'INPUT' && !{NON_TEXT_INPUTS}.includes((el.type || '').toLowerCase())); \
         if (!editable) return false; \
         if (el.isContentEditable) {{ el.textContent = {literal}; }} else {{ el.value = {literal}; }} \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
         return true; \
         }})()"
    )
}
