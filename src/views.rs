//! Server-rendered pages.
//!
//! Handlers and the error renderer hand a view name and a JSON context to a
//! [`ViewRenderer`]. [`ShellRenderer`] is the built-in implementation: plain
//! HTML pages with every interpolated value escaped.

use std::fmt::Write;

use serde_json::Value;

use crate::error::AppError;

pub const OVERVIEW: &str = "overview";
pub const TOUR: &str = "tour";
pub const ERROR: &str = "error";

/// Renders a named view with a JSON context into HTML.
pub trait ViewRenderer: Send + Sync {
    fn render(&self, view: &str, context: &Value) -> Result<String, AppError>;
}

/// Minimal built-in page templates.
#[derive(Debug, Clone)]
pub struct ShellRenderer {
    site_name: String,
}

impl ShellRenderer {
    pub fn new(site_name: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
        }
    }

    fn page(&self, title: &str, body: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{site} | {title}</title>\n</head>\n<body>\n{body}</body>\n</html>\n",
            site = escape_html(&self.site_name),
            title = escape_html(title),
        )
    }

    fn overview(&self, context: &Value) -> String {
        let mut body = String::from("<main class=\"overview\">\n");
        for tour in context["tours"].as_array().into_iter().flatten() {
            let _ = writeln!(
                body,
                "<a class=\"card\" href=\"/tour/{slug}\">{name}</a>",
                slug = escape_html(text(&tour["slug"])),
                name = escape_html(text(&tour["name"])),
            );
        }
        body.push_str("</main>\n");
        self.page(text_or(&context["title"], "All Tours"), &body)
    }

    fn tour(&self, context: &Value) -> String {
        let tour = &context["tour"];
        let mut body = String::from("<main class=\"tour\">\n");
        let _ = writeln!(body, "<h1>{}</h1>", escape_html(text(&tour["name"])));
        for field in ["duration", "difficulty", "maxGroupSize", "price"] {
            if let Some(value) = scalar(&tour[field]) {
                let _ = writeln!(
                    body,
                    "<p class=\"{field}\">{field}: {}</p>",
                    escape_html(&value)
                );
            }
        }
        body.push_str("</main>\n");
        self.page(text(&context["title"]), &body)
    }

    fn error(&self, context: &Value) -> String {
        let body = format!(
            "<main class=\"error\">\n<h2>{}</h2>\n<p>{}</p>\n</main>\n",
            escape_html(text_or(&context["title"], "Something went wrong!")),
            escape_html(text(&context["msg"])),
        );
        self.page(text_or(&context["title"], "Something went wrong!"), &body)
    }
}

impl ViewRenderer for ShellRenderer {
    fn render(&self, view: &str, context: &Value) -> Result<String, AppError> {
        match view {
            OVERVIEW => Ok(self.overview(context)),
            TOUR => Ok(self.tour(context)),
            ERROR => Ok(self.error(context)),
            other => Err(AppError::Internal(anyhow::anyhow!("unknown view '{other}'"))),
        }
    }
}

fn text(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn text_or<'a>(value: &'a Value, fallback: &'a str) -> &'a str {
    value.as_str().unwrap_or(fallback)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
