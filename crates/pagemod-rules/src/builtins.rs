//! Built-in functions and selectors
//!
//! Functions take their substituted arguments and return the new property
//! value. Missing arguments read as empty strings.

use crate::error::FunctionError;
use crate::registry::{FunctionContext, FunctionRegistry};
use pagemod_html::is_semantically_empty;

/// Register every built-in into `registry`
pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register_function("HtmlEncode", |_, args| Ok(html_encode(arg(args, 0))));
    registry.register_function("HtmlEncodeForJson", |_, args| {
        Ok(json_escape(&html_encode(arg(args, 0))))
    });
    registry.register_function("ToLower", |_, args| Ok(arg(args, 0).to_lowercase()));
    registry.register_function("StaticString", |_, args| Ok(arg(args, 0).to_string()));
    registry.register_function("ReturnTrue", |_, _| Ok("true".to_string()));
    registry.register_function("ReturnFalse", |_, _| Ok("false".to_string()));
    registry.register_function("EmptyString", |_, _| Ok(String::new()));
    registry.register_function("TextCleanup", text_cleanup);
    registry.register_function("UrlRewrite", url_rewrite);
    registry.register_function("AssetLookup", asset_lookup);

    registry.register_selector("TextSelector", |_, args| {
        let selected = if is_semantically_empty(arg(args, 0)) { "Empty" } else { "Text" };
        Ok(Some(selected.to_string()))
    });
    registry.register_selector("MediaSelector", media_selector);
    registry.register_selector("PropertyValueSelector", |_, args| {
        let value = arg(args, 0).trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    });
}

fn arg(args: &[String], index: usize) -> &str {
    args.get(index).map_or("", String::as_str)
}

fn html_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Rewrite source links inside rich text
fn text_cleanup(ctx: &FunctionContext<'_>, args: &[String]) -> Result<String, FunctionError> {
    let html = arg(args, 0);
    Ok(match &ctx.env.urls {
        Some(urls) => urls.transform(html),
        None => html.to_string(),
    })
}

/// Rewrite a single link
fn url_rewrite(ctx: &FunctionContext<'_>, args: &[String]) -> Result<String, FunctionError> {
    let url = arg(args, 0).trim();
    Ok(match &ctx.env.urls {
        Some(urls) if !url.is_empty() => urls.transform(url),
        _ => url.to_string(),
    })
}

/// Copy an asset to the target and return its new location
fn asset_lookup(ctx: &FunctionContext<'_>, args: &[String]) -> Result<String, FunctionError> {
    let source = arg(args, 0).trim();
    if source.is_empty() {
        return Err(FunctionError::MediaConfiguration("asset url is empty".to_string()));
    }
    match &ctx.env.assets {
        Some(assets) => assets.transfer_asset(source),
        None => Ok(source.to_string()),
    }
}

/// `Embed` for iframes, `Link` for anchored images, else `Image`
fn media_selector(_: &FunctionContext<'_>, args: &[String]) -> Result<Option<String>, FunctionError> {
    let kind = arg(args, 0);
    let anchor = arg(args, 1).trim();
    let selected = if kind.eq_ignore_ascii_case("Embed") {
        "Embed"
    } else if !anchor.is_empty() {
        "Link"
    } else {
        "Image"
    };
    Ok(Some(selected.to_string()))
}
