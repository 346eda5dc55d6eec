//! Rewriting of email layout tags into table markup.
//!
//! Most email clients ignore CSS layout, so the four semantic tags templates
//! are written with are turned into the nested tables every client renders:
//!
//! | Tag           | Output                    |
//! |---------------|---------------------------|
//! | `<container>` | `<table><tbody>...`       |
//! | `<row>`       | `<tr>`                    |
//! | `<columns>`   | `<td>`                    |
//! | `<button>`    | `<a>`                     |
//!
//! Only a whitelist of attributes survives each rewrite. The output never
//! contains the source tag names, so running the transform twice is a no-op.

use std::cell::Cell;
use std::rc::Rc;

use lol_html::html_content::{ContentType, Element, EndTag};
use lol_html::{element, rewrite_str, RewriteStrSettings};

use super::error::TransformError;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Inline style given to buttons that do not carry their own
pub const DEFAULT_BUTTON_STYLE: &str =
    "display: inline-block; padding: 8px 16px; border-radius: 3px; text-decoration: none;";

/// A rewrite applied to protected template markup
pub trait MarkupTransform {
    fn transform(&self, html: &str) -> Result<String, TransformError>;
}

/// Rewrites `container`, `row`, `columns` and `button` into table markup
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutTagTransformer;

impl LayoutTagTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl MarkupTransform for LayoutTagTransformer {
    fn transform(&self, html: &str) -> Result<String, TransformError> {
        let open_containers = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&open_containers);

        let element_content_handlers = vec![
            element!("container", move |el| rewrite_container(el, &counter)),
            element!("row", |el| rewrite_row(el)),
            element!("columns", |el| rewrite_columns(el)),
            element!("button", |el| rewrite_button(el)),
        ];

        let output = rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers,
                ..RewriteStrSettings::new()
            },
        )?;

        // the closing `</tbody>` is only written when `</container>` is seen
        let unclosed = open_containers.get();
        if unclosed > 0 {
            return Err(TransformError::new(format!(
                "{} <container> element(s) never closed",
                unclosed
            )));
        }
        Ok(output)
    }
}

/// `<container>` -> centered full-width `<table>` with a `<tbody>`
///
/// `open` counts containers whose end tag has not been reached yet.
fn rewrite_container(el: &mut Element<'_, '_>, open: &Rc<Cell<usize>>) -> HandlerResult {
    let class = el.get_attribute("class");
    clear_attributes(el);

    el.set_tag_name("table")?;
    el.set_attribute("align", "center")?;
    if let Some(class) = class {
        el.set_attribute("class", &class)?;
    }
    el.set_attribute("width", "100%")?;
    el.set_attribute("cellpadding", "0")?;
    el.set_attribute("cellspacing", "0")?;
    el.set_attribute("border", "0")?;

    el.prepend("<tbody>", ContentType::Html);
    el.append("</tbody>", ContentType::Html);

    if let Some(handlers) = el.end_tag_handlers() {
        open.set(open.get() + 1);
        let open = Rc::clone(open);
        handlers.push(Box::new(move |_end: &mut EndTag<'_>| -> HandlerResult {
            open.set(open.get().saturating_sub(1));
            Ok(())
        }));
    }
    Ok(())
}

/// `<row>` -> `<tr>`, a `background` attribute becomes an inline style
fn rewrite_row(el: &mut Element<'_, '_>) -> HandlerResult {
    let class = el.get_attribute("class");
    let background = el.get_attribute("background").filter(|b| !b.is_empty());
    clear_attributes(el);

    el.set_tag_name("tr")?;
    if let Some(class) = class {
        el.set_attribute("class", &class)?;
    }
    if let Some(background) = background {
        el.set_attribute("style", &format!("background: {};", background))?;
    }
    Ok(())
}

/// `<columns>` -> `<td>` with an inline padding (0 unless given)
fn rewrite_columns(el: &mut Element<'_, '_>) -> HandlerResult {
    let class = el.get_attribute("class");
    let padding = el
        .get_attribute("padding")
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "0".to_string());
    clear_attributes(el);

    el.set_tag_name("td")?;
    if let Some(class) = class {
        el.set_attribute("class", &class)?;
    }
    el.set_attribute("style", &format!("padding: {};", padding))?;
    Ok(())
}

/// `<button>` -> `<a>`, `href` defaults to `#`
fn rewrite_button(el: &mut Element<'_, '_>) -> HandlerResult {
    let href = el
        .get_attribute("href")
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "#".to_string());
    let class = el.get_attribute("class");
    let style = el
        .get_attribute("style")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_BUTTON_STYLE.to_string());
    clear_attributes(el);

    el.set_tag_name("a")?;
    el.set_attribute("href", &href)?;
    if let Some(class) = class {
        el.set_attribute("class", &class)?;
    }
    el.set_attribute("style", &style)?;
    Ok(())
}

fn clear_attributes(el: &mut Element<'_, '_>) {
    let names: Vec<String> = el.attributes().iter().map(|a| a.name()).collect();
    for name in names {
        el.remove_attribute(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn transform(html: &str) -> String {
        LayoutTagTransformer::new()
            .transform(html)
            .expect("Should transform")
    }

    #[test]
    fn test_nested_layout_tags() {
        let out = transform("<container><row><columns>Hi there</columns></row></container>");
        assert_snapshot!(out, @r#"<table align="center" width="100%" cellpadding="0" cellspacing="0" border="0"><tbody><tr><td style="padding: 0;">Hi there</td></tr></tbody></table>"#);
    }

    #[test]
    fn test_container_keeps_class_only() {
        let out = transform(r#"<container class="body" id="main" data-x="1"></container>"#);
        assert_snapshot!(out, @r#"<table align="center" class="body" width="100%" cellpadding="0" cellspacing="0" border="0"><tbody></tbody></table>"#);
    }

    #[test]
    fn test_row_background_becomes_style() {
        let out = transform(r##"<row class="header" background="#eeeeee">x</row>"##);
        assert_eq!(out, r##"<tr class="header" style="background: #eeeeee;">x</tr>"##);
    }

    #[test]
    fn test_columns_padding() {
        let out = transform(r#"<columns large="6" padding="10px 20px">x</columns>"#);
        assert_eq!(out, r#"<td style="padding: 10px 20px;">x</td>"#);
    }

    #[test]
    fn test_button_default_style() {
        let out = transform(r#"<button href="https://x">Go</button>"#);
        assert_eq!(
            out,
            format!(r#"<a href="https://x" style="{}">Go</a>"#, DEFAULT_BUTTON_STYLE)
        );
    }

    #[test]
    fn test_button_keeps_explicit_style_and_class() {
        let out = transform(r#"<button class="cta" style="color: red;">Go</button>"#);
        assert_eq!(out, r##"<a href="#" class="cta" style="color: red;">Go</a>"##);
    }

    #[test]
    fn test_unclosed_container_fails() {
        let err = LayoutTagTransformer::new()
            .transform("<container><row>unclosed")
            .unwrap_err();
        assert_eq!(err.message(), "1 <container> element(s) never closed");
    }

    #[test]
    fn test_sibling_containers_all_closed() {
        let out = transform("<container>a</container><container>b</container>");
        assert_eq!(out.matches("</tbody></table>").count(), 2);
    }

    #[test]
    fn test_placeholders_survive() {
        let html = "<columns><!--VAR:e3sgdXNlci5uYW1lIH19--></columns>";
        assert_eq!(
            transform(html),
            r#"<td style="padding: 0;"><!--VAR:e3sgdXNlci5uYW1lIH19--></td>"#
        );
    }

    #[test]
    fn test_transform_is_idempotent() {
        let html = r#"<container><row background="red"><columns padding="4px"><button href="/a">A</button></columns></row></container>"#;
        let once = transform(html);
        let twice = transform(&once);
        assert_eq!(once, twice);
        for tag in ["<container", "<row", "<columns", "<button"] {
            assert!(!once.contains(tag), "{tag} left in {once}");
        }
    }

    #[test]
    fn test_unrelated_markup_untouched() {
        let html = "<p class=\"x\">Hello <b>world</b></p><div><unknown-tag></div>";
        assert_eq!(transform(html), html);
    }
}
