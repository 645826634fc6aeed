//! Shared HTML page scaffold: CSS, clipboard script, and the outer
//! document structure. The page is fully self-contained: no external
//! assets, no scripts beyond the clipboard helper.

use maud::{html, Markup, PreEscaped, DOCTYPE};

/// Base styles: typography, summary cards, tables, copy button, JSON blocks.
pub const BASE_CSS: &str = r#"
  *, *::before, *::after { box-sizing: border-box; }
  body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
         margin: 2rem; color: #1a1a1a; background: #f8f9fa; }
  h1 { color: #0d6efd; margin-bottom: 0.25rem; }
  h2 { color: #333; margin-top: 2rem; margin-bottom: 1rem; }
  .meta { color: #555; font-size: 0.9rem; margin-bottom: 1.5rem; }

  .summary { display: flex; flex-wrap: wrap; gap: 1rem; margin-bottom: 1.5rem; }
  .summary .card { background: #fff; border: 1px solid #dee2e6; border-radius: 8px;
                    padding: 0.75rem 1.25rem; min-width: 110px; text-align: center;
                    box-shadow: 0 1px 3px rgba(0,0,0,0.04); }
  .summary .card .num { font-size: 1.6rem; font-weight: 700; }
  .summary .card .label { font-size: 0.75rem; color: #666; text-transform: uppercase;
                           letter-spacing: 0.03em; margin-top: 0.15rem; }

  table { border-collapse: collapse; width: 100%; background: #fff;
           border: 1px solid #dee2e6; border-radius: 8px; overflow: hidden;
           margin-bottom: 2rem; box-shadow: 0 1px 3px rgba(0,0,0,0.04); }
  th { background: #0d6efd; color: #fff; padding: 0.6rem 0.75rem;
       text-align: left; font-size: 0.8rem; text-transform: uppercase;
       letter-spacing: 0.03em; }
  td { padding: 0.45rem 0.75rem; border-top: 1px solid #e9ecef; font-size: 0.85rem; }
  tr:hover td { background: #f0f4ff; }

  .copy-btn { background: #495057; color: #fff; border: 1px solid #6c757d;
              border-radius: 4px; padding: 0.25rem 0.6rem; font-size: 0.75rem;
              cursor: pointer; font-family: inherit;
              transition: background 0.15s, border-color 0.15s; }
  .copy-btn:hover { background: #6c757d; border-color: #adb5bd; }
  .copy-btn.copied { background: #198754; border-color: #198754; }

  .json-block { background: #1e1e1e; color: #d4d4d4; padding: 1rem;
                border-radius: 0 0 6px 6px; overflow-x: auto; font-size: 0.8rem;
                line-height: 1.4; margin-top: 0; border: 1px solid #dee2e6;
                border-top: none; white-space: pre; }
  .json-block-wrapper { position: relative; }
  .json-block-wrapper .copy-btn { position: absolute; top: 0.5rem; right: 0.5rem; z-index: 10; }

  footer { margin-top: 2rem; font-size: 0.8rem; color: #888; }
"#;

/// Clipboard-copy helper; the only script on the page.
const CLIPBOARD_JS: &str = r#"
function _doCopy(btn, text, labelOk, labelFail) {
  navigator.clipboard.writeText(text).then(function() {
    btn.textContent = 'Copied!';
    btn.classList.add('copied');
    setTimeout(function() {
      btn.textContent = labelOk;
      btn.classList.remove('copied');
    }, 2000);
  }, function() {
    var ta = document.createElement('textarea');
    ta.value = text;
    ta.style.position = 'fixed';
    ta.style.opacity = '0';
    document.body.appendChild(ta);
    ta.select();
    try {
      document.execCommand('copy');
      btn.textContent = 'Copied!';
      btn.classList.add('copied');
      setTimeout(function() {
        btn.textContent = labelOk;
        btn.classList.remove('copied');
      }, 2000);
    } catch(e) {
      btn.textContent = labelFail;
      setTimeout(function() { btn.textContent = labelOk; }, 2000);
    }
    document.body.removeChild(ta);
  });
}
function copyJson(btn) {
  var pre = btn.parentElement.querySelector('pre.json-block');
  if (!pre) return;
  _doCopy(btn, pre.textContent || pre.innerText, 'Copy JSON', 'Failed');
}
function copyCsv(btn) {
  var pre = document.getElementById('csv-content');
  if (!pre) return;
  _doCopy(btn, pre.textContent || pre.innerText, 'Copy CSV', 'Failed');
}
"#;

/// Wrap `body` in a full HTML page with shared styles and scripts.
pub fn render_page(title: &str, meta_line: Markup, body: Markup, extra_css: &str) -> String {
    let page = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (title) }
                style { (PreEscaped(BASE_CSS)) (PreEscaped(extra_css)) }
            }
            body {
                h1 { (title) }
                div class="meta" { (meta_line) }
                (body)
                footer { "Generated by xc-ns-mover" }
                script { (PreEscaped(CLIPBOARD_JS)) }
            }
        }
    };
    page.into_string()
}

/// A JSON block with its copy button.
pub fn json_block(json: &str) -> Markup {
    html! {
        div class="json-block-wrapper" {
            button class="copy-btn" onclick="copyJson(this)" { "Copy JSON" }
            pre class="json-block" { (json) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_self_contained_and_escaped() {
        let body = html! { p { "hello <world>" } };
        let page = render_page("T & T", html! { "meta" }, body, "");
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("T &amp; T"));
        assert!(page.contains("hello &lt;world&gt;"));
        assert!(page.contains("copyJson"));
        // No external references.
        assert!(!page.contains("http://"));
        assert!(!page.contains("https://"));
    }

    #[test]
    fn json_block_escapes_content() {
        let markup = json_block("{\"a\": \"<script>\"}");
        let rendered = markup.into_string();
        assert!(rendered.contains("&lt;script&gt;"));
        assert!(rendered.contains("copy-btn"));
    }
}
