//! Server-rendered HTML pages.

use heartwise_model::Outcome;

/// A one-shot notice rendered inline on the page, standing in for the
/// original flash-message mechanism.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
pub enum NoticeKind {
    Success,
    Warning,
    Danger,
}

impl Notice {
    pub fn success<S: Into<String>>(text: S) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    pub fn warning<S: Into<String>>(text: S) -> Self {
        Self {
            kind: NoticeKind::Warning,
            text: text.into(),
        }
    }

    pub fn danger<S: Into<String>>(text: S) -> Self {
        Self {
            kind: NoticeKind::Danger,
            text: text.into(),
        }
    }

    fn css_class(&self) -> &'static str {
        match self.kind {
            NoticeKind::Success => "notice notice-success",
            NoticeKind::Warning => "notice notice-warning",
            NoticeKind::Danger => "notice notice-danger",
        }
    }
}

/// Clinical form fields, in the positional order the artifacts were
/// fitted on.
const FEATURE_FIELDS: [(&str, &str); 13] = [
    ("age", "Age (years)"),
    ("sex", "Sex (1 = male, 0 = female)"),
    ("cp", "Chest pain type (0-3)"),
    ("trestbps", "Resting blood pressure (mm Hg)"),
    ("chol", "Serum cholesterol (mg/dl)"),
    ("fbs", "Fasting blood sugar > 120 mg/dl (1/0)"),
    ("restecg", "Resting ECG result (0-2)"),
    ("thalach", "Maximum heart rate achieved"),
    ("exang", "Exercise-induced angina (1/0)"),
    ("oldpeak", "ST depression induced by exercise"),
    ("slope", "Slope of peak exercise ST segment (0-2)"),
    ("ca", "Major vessels colored by fluoroscopy (0-3)"),
    ("thal", "Thalassemia (1-3)"),
];

/// Escape text that may echo user-submitted content.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn render_notice(notice: Option<&Notice>) -> String {
    match notice {
        Some(n) => format!(
            r#"<div class="{}">{}</div>"#,
            n.css_class(),
            escape_html(&n.text)
        ),
        None => String::new(),
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title} - HeartWise</title>
    <style>
        body {{ font-family: Arial, sans-serif; max-width: 720px; margin: 50px auto; padding: 20px; background: #f5f5f5; }}
        .container {{ background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        h1 {{ color: #333; border-bottom: 3px solid #c62828; padding-bottom: 10px; }}
        label {{ display: block; margin: 10px 0 4px; color: #444; }}
        input {{ width: 100%; padding: 8px; box-sizing: border-box; }}
        button {{ margin-top: 16px; padding: 10px 24px; background: #c62828; color: white; border: none; border-radius: 4px; cursor: pointer; }}
        .notice {{ padding: 10px; margin: 12px 0; border-radius: 4px; }}
        .notice-success {{ background: #e8f5e9; border-left: 4px solid #2e7d32; }}
        .notice-warning {{ background: #fff8e1; border-left: 4px solid #f9a825; }}
        .notice-danger {{ background: #ffebee; border-left: 4px solid #c62828; }}
        .result-alert {{ color: #c62828; font-weight: bold; }}
        .result-ok {{ color: #2e7d32; font-weight: bold; }}
        .nav {{ margin-bottom: 16px; }}
        .nav a {{ margin-right: 12px; color: #c62828; }}
    </style>
</head>
<body>
    <div class="container">
    {body}
    </div>
</body>
</html>"#
    )
}

pub fn login_page(notice: Option<&Notice>) -> String {
    let notice = render_notice(notice);
    layout(
        "Login",
        &format!(
            r#"<h1>HeartWise Login</h1>
    {notice}
    <form method="post" action="/login">
        <label for="username">Username</label>
        <input type="text" id="username" name="username" required>
        <label for="password">Password</label>
        <input type="password" id="password" name="password" required>
        <button type="submit">Login</button>
    </form>
    <p>No account? <a href="/register">Register here</a>.</p>"#
        ),
    )
}

pub fn register_page(notice: Option<&Notice>) -> String {
    let notice = render_notice(notice);
    layout(
        "Register",
        &format!(
            r#"<h1>Create an Account</h1>
    {notice}
    <form method="post" action="/register">
        <label for="username">Username</label>
        <input type="text" id="username" name="username" required>
        <label for="password">Password</label>
        <input type="password" id="password" name="password" required>
        <button type="submit">Register</button>
    </form>
    <p>Already registered? <a href="/login">Login here</a>.</p>"#
        ),
    )
}

pub fn predictor_page(outcome: Option<&Outcome>, notice: Option<&Notice>) -> String {
    let notice = render_notice(notice);
    let result = match outcome {
        Some(outcome) => format!(
            r#"<p class="{}">{}</p>"#,
            outcome.tag.css_class(),
            outcome.message()
        ),
        None => String::new(),
    };

    let mut inputs = String::new();
    for (name, label) in FEATURE_FIELDS {
        inputs.push_str(&format!(
            r#"        <label for="{name}">{label}</label>
        <input type="text" id="{name}" name="{name}" required>
"#
        ));
    }

    layout(
        "Predictor",
        &format!(
            r#"<div class="nav"><a href="/predictor">Predictor</a><a href="/logout">Logout</a></div>
    <h1>Heart Disease Predictor</h1>
    {notice}
    {result}
    <form method="post" action="/predict">
{inputs}        <button type="submit">Predict</button>
    </form>"#
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use heartwise_model::{Diagnosis, DisplayTag};

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn notice_text_is_escaped() {
        let page = login_page(Some(&Notice::danger("<b>bad</b>")));
        assert!(page.contains("&lt;b&gt;bad&lt;/b&gt;"));
        assert!(!page.contains("<b>bad</b>"));
    }

    #[test]
    fn predictor_page_renders_all_feature_fields() {
        let page = predictor_page(None, None);
        for (name, _) in FEATURE_FIELDS {
            assert!(page.contains(&format!(r#"name="{name}""#)), "missing {name}");
        }
    }

    #[test]
    fn predictor_page_renders_outcome_with_tag_class() {
        let outcome = Outcome {
            diagnosis: Diagnosis::Positive,
            tag: DisplayTag::Alert,
        };
        let page = predictor_page(Some(&outcome), None);
        assert!(page.contains("Patient Diagnosed With Heart Disease"));
        assert!(page.contains("result-alert"));
    }
}
