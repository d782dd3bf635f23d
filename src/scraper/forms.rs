//! The intranet is an ASP.NET WebForms site: every page is one big `<form>`
//! carrying hidden state (`__VIEWSTATE`, `__EVENTVALIDATION`, ...), and every
//! action (login, search, "next page") is a POST of that whole form with
//! `__EVENTTARGET` / `__EVENTARGUMENT` naming the control that fired.

use crate::error::{Error, Result};
use crate::scraper::http_client::{PageRequest, RawPage};
use scraper::{ElementRef, Html, Selector};

pub const EVENT_TARGET: &str = "__EVENTTARGET";
pub const EVENT_ARGUMENT: &str = "__EVENTARGUMENT";
const LAST_FOCUS: &str = "__LASTFOCUS";

/// Snapshot of a page form's successful controls, ready to be resubmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AspForm {
    action: String,
    fields: Vec<(String, String)>,
    /// Submit buttons, only sent when clicked.
    buttons: Vec<Button>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Button {
    id: Option<String>,
    name: String,
    value: String,
}

impl AspForm {
    /// Read the main form of a page (`#aspnetForm` when present, else the first).
    pub fn from_page(page: &RawPage) -> Result<Self> {
        let doc = Html::parse_document(&page.body);
        let form_sel = selector("form#aspnetForm")?;
        let any_form_sel = selector("form")?;

        let form = doc
            .select(&form_sel)
            .next()
            .or_else(|| doc.select(&any_form_sel).next())
            .ok_or_else(|| Error::Protocol(format!("no form on {}", page.url)))?;

        let action = form.value().attr("action").unwrap_or("");
        let action = page
            .url
            .join(action)
            .map_err(|e| Error::Protocol(format!("bad form action {:?}: {}", action, e)))?
            .to_string();

        let (fields, buttons) = collect_controls(form)?;
        Ok(Self {
            action,
            fields,
            buttons,
        })
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Full name of the control called `short`, exactly or as the last
    /// segment of its naming-container chain (`ctl00$MainContent$login`).
    pub fn field_name(&self, short: &str) -> Option<&str> {
        self.fields
            .iter()
            .map(|(k, _)| k.as_str())
            .find(|k| is_control(k, short))
    }

    /// Set a control's value, adding a hidden field if the control is unknown.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// `__doPostBack(target, argument)` as a full-page submit.
    pub fn postback(mut self, target: &str, argument: &str) -> PageRequest {
        self.set(EVENT_TARGET, target);
        self.set(EVENT_ARGUMENT, argument);
        self.set(LAST_FOCUS, "");
        PageRequest::post(self.action, self.fields)
    }

    /// Submit through a button, matched on its `id` or `name` (see `field_name`).
    pub fn click(mut self, button: &str) -> Result<PageRequest> {
        let b = self
            .buttons
            .iter()
            .find(|b| {
                b.id.as_deref().is_some_and(|id| is_control(id, button))
                    || is_control(&b.name, button)
            })
            .cloned()
            .ok_or_else(|| Error::Protocol(format!("no button {:?} in form", button)))?;

        self.set(&b.name, b.value);
        Ok(self.postback("", ""))
    }
}

fn is_control(full: &str, short: &str) -> bool {
    full == short
        || full
            .strip_suffix(short)
            .is_some_and(|head| head.ends_with('$') || head.ends_with('_'))
}

fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| Error::Protocol(format!("selector {:?}: {:?}", s, e)))
}

fn collect_controls(form: ElementRef<'_>) -> Result<(Vec<(String, String)>, Vec<Button>)> {
    let control_sel = selector("input, select, textarea")?;
    let option_sel = selector("option")?;

    let mut fields: Vec<(String, String)> = Vec::new();
    let mut buttons = Vec::new();

    for control in form.select(&control_sel) {
        let el = control.value();
        if el.attr("disabled").is_some() {
            continue;
        }
        let Some(name) = el.attr("name") else { continue };

        match el.name() {
            "select" => {
                let options: Vec<_> = control.select(&option_sel).collect();
                let chosen = options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| options.first());
                if let Some(opt) = chosen {
                    let value = opt
                        .value()
                        .attr("value")
                        .map(str::to_string)
                        .unwrap_or_else(|| opt.text().collect::<String>().trim().to_string());
                    fields.push((name.to_string(), value));
                }
            }
            "textarea" => {
                fields.push((name.to_string(), control.text().collect()));
            }
            _ => {
                let kind = el.attr("type").unwrap_or("text").to_lowercase();
                let value = el.attr("value").unwrap_or("").to_string();
                match kind.as_str() {
                    "checkbox" | "radio" => {
                        if el.attr("checked").is_some() {
                            let value = if value.is_empty() { "on".to_string() } else { value };
                            fields.push((name.to_string(), value));
                        }
                    }
                    "submit" | "image" | "button" => buttons.push(Button {
                        id: el.attr("id").map(str::to_string),
                        name: name.to_string(),
                        value,
                    }),
                    "file" | "reset" => {}
                    _ => fields.push((name.to_string(), value)),
                }
            }
        }
    }

    Ok((fields, buttons))
}
