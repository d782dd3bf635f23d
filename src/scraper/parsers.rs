use crate::models::{Diagnostic, DiagnosticKind, RawFragment};
use crate::scraper::http_client::RawPage;
use crate::scraper::schemas::{FieldSpec, Layout, Locator, Schema, ValueSource};
use crate::utils::{fold, non_empty, normalize_text};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

// ── Schema-driven extraction ──────────────────────────────────────────────────

/// Fragments found on one page, plus the records that had to be dropped.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    pub fragments: Vec<RawFragment>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Apply a schema to a page. Never fails: missing optional fields are simply
/// absent, records without identity are reported and skipped.
pub fn extract(page: &RawPage, schema: &Schema) -> Extraction {
    let doc = Html::parse_document(&page.body);
    let mut out = Extraction::default();

    match schema.layout {
        Layout::Page { root } => {
            let Some(root_sel) = compile(root, schema, &mut out) else {
                return out;
            };
            match doc.select(&root_sel).next() {
                Some(region) => {
                    let fragment = read_region(page, schema, region, &[], &mut out);
                    keep_if_identified(schema, fragment, 1, &mut out);
                }
                None => protocol(&mut out, format!("{}: no `{}` on page", schema.name, root)),
            }
        }
        Layout::Table { table, header, rows } => {
            let Some(table_sel) = compile(table, schema, &mut out) else {
                return out;
            };
            let Some(header_sel) = compile(header, schema, &mut out) else {
                return out;
            };
            let Some(row_sel) = compile(rows, schema, &mut out) else {
                return out;
            };

            let Some(table_el) = doc.select(&table_sel).next() else {
                debug!("{}: no results table on {}", schema.name, page.url);
                return out;
            };

            let headers: Vec<String> = table_el
                .select(&header_sel)
                .map(|th| fold(&th.text().collect::<String>()))
                .collect();

            for (i, row) in table_el.select(&row_sel).enumerate() {
                let fragment = read_region(page, schema, row, &headers, &mut out);
                keep_if_identified(schema, fragment, i + 1, &mut out);
            }
        }
    }

    out
}

fn compile(sel: &str, schema: &Schema, out: &mut Extraction) -> Option<Selector> {
    match Selector::parse(sel) {
        Ok(s) => Some(s),
        Err(e) => {
            protocol(out, format!("{}: invalid selector `{}`: {:?}", schema.name, sel, e));
            None
        }
    }
}

fn protocol(out: &mut Extraction, message: String) {
    warn!("{}", message);
    out.diagnostics.push(Diagnostic::new(DiagnosticKind::Protocol, message));
}

fn keep_if_identified(schema: &Schema, fragment: RawFragment, n: usize, out: &mut Extraction) {
    let missing: Vec<&str> = schema
        .identity_fields()
        .filter(|f| !fragment.contains(f.name))
        .map(|f| f.name)
        .collect();

    if missing.is_empty() {
        out.fragments.push(fragment);
    } else {
        protocol(
            out,
            format!("{}: record #{} dropped, no {}", schema.name, n, missing.join(", ")),
        );
    }
}

fn read_region(
    page: &RawPage,
    schema: &Schema,
    region: ElementRef<'_>,
    headers: &[String],
    out: &mut Extraction,
) -> RawFragment {
    let cells: Vec<ElementRef<'_>> = region
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "td")
        .collect();

    let mut fragment = RawFragment::new();
    for spec in schema.fields {
        let element = match spec.locator {
            Locator::Css(sel) => {
                let Some(sel) = compile(sel, schema, out) else {
                    continue;
                };
                region.select(&sel).next()
            }
            Locator::Column(label) => {
                column_index(headers, label).and_then(|i| cells.get(i).copied())
            }
        };

        if let Some(value) = element.and_then(|el| read_value(page, spec, el)) {
            fragment.insert(spec.name, value);
        }
    }
    fragment
}

/// Exact label match first, then prefix (headers sometimes carry sort arrows).
fn column_index(headers: &[String], label: &str) -> Option<usize> {
    let label = fold(label);
    headers
        .iter()
        .position(|h| *h == label)
        .or_else(|| headers.iter().position(|h| h.starts_with(&label)))
}

fn read_value(page: &RawPage, spec: &FieldSpec, el: ElementRef<'_>) -> Option<String> {
    match spec.value {
        ValueSource::Text => non_empty(&el.text().collect::<String>()),
        ValueSource::QueryParam { attr, param } => {
            let raw = attr_in(el, attr)?;
            let url = page.url.join(raw.trim()).ok()?;
            url.query_pairs()
                .find(|(k, _)| k == param)
                .and_then(|(_, v)| non_empty(&v))
        }
    }
}

/// The attribute on the element itself, or on its first descendant carrying it
/// (a `<td>` wrapping an `<a href>`).
fn attr_in<'a>(el: ElementRef<'a>, attr: &str) -> Option<&'a str> {
    if let Some(v) = el.value().attr(attr) {
        return Some(v);
    }
    let sel = Selector::parse(&format!("[{}]", attr)).ok()?;
    el.select(&sel).next().and_then(|d| d.value().attr(attr))
}

// ── Page probes ───────────────────────────────────────────────────────────────

/// Whether any element on the page matches `selector`.
pub fn has_match(page: &RawPage, selector: &str) -> bool {
    let Ok(sel) = Selector::parse(selector) else {
        return false;
    };
    Html::parse_document(&page.body).select(&sel).next().is_some()
}

/// Normalised text of the first element matching `selector`, if non-empty.
pub fn first_text(page: &RawPage, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let doc = Html::parse_document(&page.body);
    let el = doc.select(&sel).next()?;
    non_empty(&el.text().collect::<String>())
}

// ── Grid pager ────────────────────────────────────────────────────────────────

/// Position in an ASP.NET GridView pager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub current: u32,
    pub last: u32,
}

impl Pager {
    pub fn next(&self) -> Option<u32> {
        (self.current < self.last).then_some(self.current + 1)
    }
}

/// Read the pager row of the grid named `table_name` (`ctl00$...$_gvX`).
/// The current page is the only `<span>` among the page links; other pages
/// are `__doPostBack(..., 'Page$N')` links. `None` means no pager: a
/// single-page listing.
pub fn parse_pager(page: &RawPage, table_name: &str) -> Option<Pager> {
    let table_id = table_name.replace('$', "_");
    let row_sel = Selector::parse(&format!(r#"table[id="{}"] tr.pagination"#, table_id)).ok()?;
    let span_sel = Selector::parse("span").ok()?;
    let link_sel = Selector::parse("a[href]").ok()?;

    let doc = Html::parse_document(&page.body);
    let row = doc.select(&row_sel).next()?;

    let current: u32 = row
        .select(&span_sel)
        .find_map(|s| normalize_text(&s.text().collect::<String>()).parse().ok())?;

    let last = row
        .select(&link_sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(page_argument)
        .max()
        .unwrap_or(current)
        .max(current);

    Some(Pager { current, last })
}

/// `javascript:__doPostBack('grid','Page$12')` → 12
fn page_argument(href: &str) -> Option<u32> {
    let rest = &href[href.find("Page$")? + "Page$".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
