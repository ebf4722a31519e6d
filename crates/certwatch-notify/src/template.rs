//! Message templating.
//!
//! Templates use `{{.Name}}` placeholders resolved against the variable map
//! carried by a [`NotificationEvent`](certwatch_common::types::NotificationEvent).
//! Unknown placeholders render as the empty string so an outdated template
//! never blocks delivery; structural problems are rejected up front by
//! [`validate`] when settings are saved.

use std::collections::HashMap;

use certwatch_common::types::EventKind;

use crate::error::{NotifyError, Result};

/// Render `template` against `vars`. Placeholders without a binding produce
/// an empty string. Rendering never fails on valid input; call [`validate`]
/// before persisting user templates.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let inner = after[..end].trim();
                if let Some(name) = inner.strip_prefix('.') {
                    if let Some(value) = vars.get(name) {
                        out.push_str(value);
                    }
                } else {
                    // not a placeholder form we understand, emit verbatim
                    out.push_str("{{");
                    out.push_str(&after[..end]);
                    out.push_str("}}");
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Check a user-supplied template for structural errors: unbalanced
/// delimiters or placeholders that are not of the `{{.Identifier}}` form.
pub fn validate(template: &str) -> Result<()> {
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            NotifyError::TemplateError("unbalanced '{{' in template".to_string())
        })?;
        let inner = after[..end].trim();
        let name = inner.strip_prefix('.').ok_or_else(|| {
            NotifyError::TemplateError(format!(
                "invalid placeholder '{{{{{inner}}}}}': expected '{{{{.Name}}}}'"
            ))
        })?;
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(NotifyError::TemplateError(format!(
                "invalid placeholder name '{name}'"
            )));
        }
        rest = &after[end + 2..];
    }
    if rest.contains("}}") {
        return Err(NotifyError::TemplateError(
            "unbalanced '}}' in template".to_string(),
        ));
    }
    Ok(())
}

/// Built-in template used when neither the channel nor the event carries a
/// custom one.
pub fn default_template(kind: EventKind) -> &'static str {
    match kind {
        EventKind::StatusAlert => {
            "[certwatch] {{.Domain}} status changed: {{.OldStatus}} -> {{.NewStatus}} \
             ({{.DaysRemaining}} days remaining, expires {{.ExpiryDate}})"
        }
        EventKind::DomainAdded => "[certwatch] domain added: {{.Domain}} (zone {{.Zone}})",
        EventKind::DomainRemoved => "[certwatch] domain removed: {{.Domain}} (zone {{.Zone}})",
        EventKind::RenewResult => {
            "[certwatch] renewal for {{.Domain}}: {{.Result}} {{.Detail}}"
        }
    }
}
