use scraper::{ElementRef, Html, Selector};
use url::Url;

/// One way of recognising the credential form on a login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMatcher {
    /// The form's `action` attribute contains this substring.
    ActionContains(String),
    /// The form has an `<input>` with exactly this `name`.
    HasInputNamed(String),
}

impl FormMatcher {
    fn matches(&self, form: ElementRef<'_>, input_sel: &Selector) -> bool {
        match self {
            FormMatcher::ActionContains(needle) => form
                .value()
                .attr("action")
                .is_some_and(|action| action.contains(needle.as_str())),
            FormMatcher::HasInputNamed(name) => form
                .select(input_sel)
                .any(|input| input.value().attr("name") == Some(name.as_str())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Absolute submission target.
    pub action: Url,
    /// Named hidden inputs in document order.
    pub hidden_fields: Vec<(String, String)>,
    /// The matcher that found the form.
    pub matched_by: FormMatcher,
}

impl LoginForm {
    /// Hidden fields followed by the credentials. A hidden field that shares a
    /// name with a credential field is dropped.
    pub fn submission_fields(
        &self,
        username: (&str, &str),
        password: (&str, &str),
    ) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = self
            .hidden_fields
            .iter()
            .filter(|(name, _)| name != username.0 && name != password.0)
            .cloned()
            .collect();
        fields.push((username.0.to_string(), username.1.to_string()));
        fields.push((password.0.to_string(), password.1.to_string()));
        fields
    }
}

/// Locate the credential form. Matchers are tried in order and the first one
/// that matches any form wins; within a matcher the first form in the document
/// is taken.
pub fn find_login_form(html: &str, page_url: &Url, matchers: &[FormMatcher]) -> Option<LoginForm> {
    let doc = Html::parse_document(html);
    let form_sel = Selector::parse("form").ok()?;
    let input_sel = Selector::parse("input").ok()?;
    let hidden_sel = Selector::parse(r#"input[type="hidden"]"#).ok()?;

    let forms: Vec<ElementRef<'_>> = doc.select(&form_sel).collect();
    let (form, matcher) = matchers.iter().find_map(|matcher| {
        forms
            .iter()
            .copied()
            .find(|form| matcher.matches(*form, &input_sel))
            .map(|form| (form, matcher))
    })?;

    let action = match form.value().attr("action") {
        Some(action) => page_url.join(action.trim()).ok()?,
        None => page_url.clone(),
    };

    let hidden_fields = form
        .select(&hidden_sel)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    Some(LoginForm {
        action,
        hidden_fields,
        matched_by: matcher.clone(),
    })
}
