//! Page-side helpers evaluated by [`crate::ChromiumPage`].
//!
//! The prelude installs `window.__sw` once per document. Elements handed out to
//! Rust are registered under an expando id (`sw-N`) so later commands can find them
//! without touching DOM attributes.

use serde::Deserialize;
use stepwright_core_types::{ElementRef, Point};

use crate::ElementInfo;

const PRELUDE: &str = r#"(() => {
  if (window.__sw) return window.__sw;
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const menuRoot = '[role="menu"], .dropdown-menu, .dropdown-content, [data-testid*="menu"], [data-testid*="dropdown"]';
  const state = { next: 1, byId: new Map() };
  const register = (el) => {
    if (!el.__swId) { el.__swId = 'sw-' + (state.next++); }
    state.byId.set(el.__swId, el);
    return el.__swId;
  };
  const textOf = (el) => norm(el.innerText !== undefined ? el.innerText : el.textContent);
  const isEditable = (el) => {
    const tag = el.tagName.toLowerCase();
    if (tag === 'textarea') return true;
    if (tag === 'input') {
      const t = (el.getAttribute('type') || 'text').toLowerCase();
      return !['hidden', 'submit', 'button', 'checkbox', 'radio', 'file', 'image', 'reset'].includes(t);
    }
    return !!el.isContentEditable;
  };
  const describe = (el) => {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    const attr = (n) => el.getAttribute(n);
    const expanded = attr('aria-expanded');
    const tag = el.tagName.toLowerCase();
    return {
      handle: register(el),
      tag,
      role: attr('role'),
      text: textOf(el).slice(0, 500),
      ariaLabel: attr('aria-label'),
      ariaExpanded: expanded === null ? null : expanded === 'true',
      testId: attr('data-testid'),
      className: typeof el.className === 'string' ? el.className : (attr('class') || ''),
      placeholder: attr('placeholder'),
      title: attr('title'),
      inputType: tag === 'input' ? (attr('type') || 'text') : null,
      href: attr('href'),
      dataTarget: attr('data-target'),
      boundingBox: { x: rect.x, y: rect.y, width: rect.width, height: rect.height },
      visible: rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden'
        && style.display !== 'none' && parseFloat(style.opacity || '1') > 0,
      enabled: !el.disabled && attr('aria-disabled') !== 'true',
      editable: isEditable(el),
      hasOnclick: typeof el.onclick === 'function' || el.hasAttribute('onclick'),
      cursorPointer: style.cursor === 'pointer',
      inMenu: !!el.closest(menuRoot),
    };
  };
  const innermost = (els) => els.filter((el) => !els.some((o) => o !== el && el.contains(o)));
  const matches = (el, text, exact) => {
    const t = textOf(el);
    return exact ? t === norm(text) : t.toLowerCase().includes(norm(text).toLowerCase());
  };
  const implicitRoles = {
    button: 'button, input[type="button"], input[type="submit"]',
    link: 'a[href]',
    textbox: 'input:not([type]), input[type="text"], input[type="email"], input[type="search"], textarea',
    option: 'option',
  };
  const all = (css) => { try { return Array.from(document.querySelectorAll(css)); } catch (e) { return []; } };
  const query = (anchor) => {
    let found = [];
    switch (anchor.kind) {
      case 'css':
        found = all(anchor.css);
        break;
      case 'css_text':
        found = innermost(all(anchor.css).filter((el) => matches(el, anchor.text, anchor.exact)));
        break;
      case 'text':
        found = innermost(all('body *').filter((el) => matches(el, anchor.content, anchor.exact)));
        break;
      case 'aria': {
        let css = '[role="' + anchor.role + '"]';
        if (implicitRoles[anchor.role]) css += ', ' + implicitRoles[anchor.role];
        const name = norm(anchor.name).toLowerCase();
        found = all(css).filter((el) => {
          const label = norm(el.getAttribute('aria-label') || textOf(el) || el.getAttribute('title')).toLowerCase();
          return name === '' || label.includes(name);
        });
        break;
      }
      case 'label': {
        const wanted = norm(anchor.text).toLowerCase();
        for (const label of all('label')) {
          if (!textOf(label).toLowerCase().includes(wanted)) continue;
          const control = label.control || label.querySelector('input, textarea, select');
          if (control) found.push(control);
        }
        for (const el of all('[aria-labelledby]')) {
          const ids = el.getAttribute('aria-labelledby').split(/\s+/);
          if (ids.some((id) => { const ref = document.getElementById(id); return ref && textOf(ref).toLowerCase().includes(wanted); })) {
            found.push(el);
          }
        }
        break;
      }
    }
    return found.slice(0, 50).map(describe);
  };
  const byId = (id) => state.byId.get(id) || null;
  window.__sw = { query, describe, byId };
  return window.__sw;
})()"#;

/// Uniform reply of element-scoped scripts.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScriptReply {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub hit: Option<bool>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub element: Option<ElementInfo>,
}

pub(crate) fn query(spec_json: &str) -> String {
    format!("{}.query({})", PRELUDE, spec_json)
}

pub(crate) fn element_at(point: Point) -> String {
    format!(
        "(() => {{ const sw = {}; const el = document.elementFromPoint({}, {}); \
         return {{ ok: true, element: el ? sw.describe(el) : null }}; }})()",
        PRELUDE, point.x, point.y
    )
}

pub(crate) fn script_click_at(point: Point) -> String {
    format!(
        "(() => {{ const el = document.elementFromPoint({}, {}); \
         if (!el) return {{ ok: false, error: 'no element at point' }}; \
         el.click(); return {{ ok: true }}; }})()",
        point.x, point.y
    )
}

/// Runs `body` with `el` bound to the registered element.
pub(crate) fn with_element(element: &ElementRef, body: &str) -> String {
    let id = serde_json::to_string(&element.0).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(() => {{ const sw = {}; const el = sw.byId({}); \
         if (!el || !el.isConnected) return {{ ok: false, error: 'stale element handle' }}; {} }})()",
        PRELUDE, id, body
    )
}

pub(crate) const PARENT: &str =
    "const p = el.parentElement; return { ok: true, element: p ? sw.describe(p) : null };";

pub(crate) const SCROLL_AND_HIT_TEST: &str = r#"
  el.scrollIntoView({ block: 'center', inline: 'center' });
  const r = el.getBoundingClientRect();
  const x = r.x + r.width / 2, y = r.y + r.height / 2;
  const hit = document.elementFromPoint(x, y);
  return { ok: true, x, y, hit: !!hit && (hit === el || el.contains(hit)) };"#;

pub(crate) const SCRIPT_CLICK: &str = "el.click(); return { ok: true };";

pub(crate) const FOCUS: &str = "el.focus(); return { ok: true };";

pub(crate) const CLEAR: &str = r#"
  el.focus();
  if (el.isContentEditable) {
    el.textContent = '';
  } else {
    const proto = el.tagName.toLowerCase() === 'textarea' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
    setter.call(el, '');
  }
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return { ok: true };"#;

pub(crate) const INPUT_VALUE: &str =
    "return { ok: true, value: el.isContentEditable ? el.innerText : String(el.value ?? '') };";

pub(crate) fn dispatch_events(events: &[&str]) -> String {
    let list = serde_json::to_string(events).unwrap_or_else(|_| "[]".to_string());
    format!(
        "for (const type of {}) {{ el.dispatchEvent(new MouseEvent(type, {{ bubbles: true, cancelable: true, view: window }})); }} \
         if (el.focus) el.focus(); return {{ ok: true }};",
        list
    )
}

pub(crate) fn mark_upload(token: &str) -> String {
    let token = serde_json::to_string(token).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "el.setAttribute('data-sw-upload', {}); return {{ ok: true }};",
        token
    )
}

pub(crate) const VIEWPORT: &str = "({ width: window.innerWidth, height: window.innerHeight, devicePixelRatio: window.devicePixelRatio || 1 })";

pub(crate) const READY_STATE: &str = "document.readyState";
